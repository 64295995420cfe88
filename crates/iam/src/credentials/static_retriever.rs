use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    CertificateRetriever, CredentialMaterial, LoadedCertificate, LoadedPrivateKey, MaterialStore,
};
use crate::error::IamError;

/// Retriever for credentials embedded in configuration.
///
/// `refresh` re-parses the fixed PEM blobs; it is normally called once.
#[derive(Debug)]
pub struct StaticCertificateRetriever {
    certificate_pem: Bytes,
    private_key_pem: Option<Bytes>,
    passphrase: Option<Vec<u8>>,
    store: MaterialStore,
}

impl StaticCertificateRetriever {
    pub fn new(
        certificate_pem: impl Into<Bytes>,
        private_key_pem: Option<Bytes>,
        passphrase: Option<Vec<u8>>,
    ) -> Self {
        Self {
            certificate_pem: certificate_pem.into(),
            private_key_pem,
            passphrase,
            store: MaterialStore::default(),
        }
    }

    fn load_material(&self) -> Result<CredentialMaterial, IamError> {
        let certificate = LoadedCertificate::from_pem(self.certificate_pem.clone())?;
        let private_key = self
            .private_key_pem
            .clone()
            .map(|pem| LoadedPrivateKey::from_pem(pem, self.passphrase.as_deref()))
            .transpose()?;

        Ok(CredentialMaterial {
            certificate: Some(Arc::new(certificate)),
            private_key: private_key.map(Arc::new),
        })
    }
}

#[async_trait]
impl CertificateRetriever for StaticCertificateRetriever {
    async fn refresh(&self) -> Result<(), IamError> {
        let _guard = self.store.lock_refresh().await;
        match self.load_material() {
            Ok(material) => {
                self.store.publish(material);
                tracing::debug!("loaded static certificate material");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "static certificate material is invalid");
                Err(error)
            }
        }
    }

    fn material(&self) -> Arc<CredentialMaterial> {
        self.store.load()
    }
}
