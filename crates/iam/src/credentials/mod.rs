mod parse;
mod static_retriever;
mod store;
mod url_retriever;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use rsa::RsaPrivateKey;
use x509_cert::Certificate;

use crate::error::IamError;

pub use parse::{parse_certificate, parse_private_key};
pub use static_retriever::StaticCertificateRetriever;
pub use url_retriever::UrlCertificateRetriever;
pub(crate) use store::MaterialStore;

/// A certificate together with the exact PEM bytes it was decoded from.
#[derive(Debug)]
pub struct LoadedCertificate {
    pub pem: Bytes,
    pub parsed: Arc<Certificate>,
}

impl LoadedCertificate {
    pub fn from_pem(pem: Bytes) -> Result<Self, IamError> {
        let parsed = Arc::new(parse_certificate(&pem)?);
        Ok(Self { pem, parsed })
    }
}

/// An RSA private key together with the exact PEM bytes it was decoded from.
pub struct LoadedPrivateKey {
    pub pem: Bytes,
    pub parsed: Arc<RsaPrivateKey>,
}

impl LoadedPrivateKey {
    pub fn from_pem(pem: Bytes, passphrase: Option<&[u8]>) -> Result<Self, IamError> {
        let parsed = Arc::new(parse_private_key(&pem, passphrase)?);
        Ok(Self { pem, parsed })
    }
}

impl std::fmt::Debug for LoadedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPrivateKey")
            .field("pem_len", &self.pem.len())
            .finish_non_exhaustive()
    }
}

/// One snapshot of credential material.
///
/// A snapshot is never modified after it is published; a refresh replaces
/// the whole value, so the certificate and key always come from the same
/// successful refresh.
#[derive(Debug, Default)]
pub struct CredentialMaterial {
    pub certificate: Option<Arc<LoadedCertificate>>,
    pub private_key: Option<Arc<LoadedPrivateKey>>,
}

impl CredentialMaterial {
    pub fn is_empty(&self) -> bool {
        self.certificate.is_none() && self.private_key.is_none()
    }
}

/// Source of a certificate and its private key.
///
/// Accessors never fail: before the first successful refresh they return
/// `None`.
#[async_trait]
pub trait CertificateRetriever: Send + Sync {
    /// Load fresh material and publish it only if every step succeeded.
    async fn refresh(&self) -> Result<(), IamError>;

    /// The current snapshot.
    fn material(&self) -> Arc<CredentialMaterial>;

    fn certificate_pem_raw(&self) -> Option<Bytes> {
        self.material().certificate.as_ref().map(|c| c.pem.clone())
    }

    fn certificate(&self) -> Option<Arc<Certificate>> {
        self.material().certificate.as_ref().map(|c| c.parsed.clone())
    }

    fn private_key_pem_raw(&self) -> Option<Bytes> {
        self.material().private_key.as_ref().map(|k| k.pem.clone())
    }

    fn private_key(&self) -> Option<Arc<RsaPrivateKey>> {
        self.material().private_key.as_ref().map(|k| k.parsed.clone())
    }
}
