use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    CertificateRetriever, CredentialMaterial, LoadedCertificate, LoadedPrivateKey, MaterialStore,
};
use crate::error::IamError;
use crate::transport::Transport;

/// Retriever that downloads a certificate, and optionally its private key,
/// from a pair of URLs.
///
/// A refresh is all-or-nothing: if any fetch or parse fails, the previously
/// published material stays exactly as it was.
pub struct UrlCertificateRetriever {
    transport: Arc<dyn Transport>,
    certificate_url: String,
    private_key_url: Option<String>,
    passphrase: Option<Vec<u8>>,
    store: MaterialStore,
}

impl UrlCertificateRetriever {
    pub fn new(
        transport: Arc<dyn Transport>,
        certificate_url: impl Into<String>,
        private_key_url: Option<String>,
        passphrase: Option<Vec<u8>>,
    ) -> Self {
        Self {
            transport,
            certificate_url: certificate_url.into(),
            private_key_url: private_key_url.filter(|url| !url.is_empty()),
            passphrase,
            store: MaterialStore::default(),
        }
    }

    pub fn certificate_url(&self) -> &str {
        &self.certificate_url
    }

    pub fn private_key_url(&self) -> Option<&str> {
        self.private_key_url.as_deref()
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, IamError> {
        let response = self.transport.get(url).await?;
        if !response.status.is_success() {
            return Err(IamError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }

    async fn load_material(&self) -> Result<CredentialMaterial, IamError> {
        let certificate_pem = self.fetch(&self.certificate_url).await?;
        let certificate = LoadedCertificate::from_pem(certificate_pem)?;

        let private_key = match &self.private_key_url {
            Some(url) => {
                let key_pem = self.fetch(url).await?;
                Some(LoadedPrivateKey::from_pem(key_pem, self.passphrase.as_deref())?)
            }
            None => None,
        };

        Ok(CredentialMaterial {
            certificate: Some(Arc::new(certificate)),
            private_key: private_key.map(Arc::new),
        })
    }
}

impl std::fmt::Debug for UrlCertificateRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlCertificateRetriever")
            .field("certificate_url", &self.certificate_url)
            .field("private_key_url", &self.private_key_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CertificateRetriever for UrlCertificateRetriever {
    async fn refresh(&self) -> Result<(), IamError> {
        let _guard = self.store.lock_refresh().await;
        match self.load_material().await {
            Ok(material) => {
                self.store.publish(material);
                tracing::debug!(
                    certificate_url = %self.certificate_url,
                    with_private_key = self.private_key_url.is_some(),
                    "refreshed certificate material"
                );
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    certificate_url = %self.certificate_url,
                    %error,
                    "certificate refresh failed, keeping previous material"
                );
                Err(error)
            }
        }
    }

    fn material(&self) -> Arc<CredentialMaterial> {
        self.store.load()
    }
}
