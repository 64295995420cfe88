use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rsa::RsaPrivateKey;

use crate::credentials::CertificateRetriever;
use crate::error::IamError;

/// Supplies the signing key and the identifier the server uses to find the
/// matching public key.
pub trait KeyProvider: Send + Sync {
    fn private_rsa_key(&self) -> Result<Arc<RsaPrivateKey>, IamError>;

    fn key_id(&self) -> Result<String, IamError>;

    /// When the current material should be considered stale.
    fn expiration_time(&self) -> SystemTime;
}

/// [`KeyProvider`] reading from a retriever's current snapshot.
///
/// The key id is supplied by the caller; refreshing the retriever is also
/// left to the caller.
pub struct RetrieverKeyProvider {
    retriever: Arc<dyn CertificateRetriever>,
    key_id: String,
}

impl RetrieverKeyProvider {
    pub fn new(retriever: Arc<dyn CertificateRetriever>, key_id: impl Into<String>) -> Self {
        Self {
            retriever,
            key_id: key_id.into(),
        }
    }

    pub fn retriever(&self) -> &Arc<dyn CertificateRetriever> {
        &self.retriever
    }
}

impl KeyProvider for RetrieverKeyProvider {
    fn private_rsa_key(&self) -> Result<Arc<RsaPrivateKey>, IamError> {
        self.retriever
            .private_key()
            .ok_or_else(|| IamError::KeyUnavailable("no private key has been loaded".into()))
    }

    fn key_id(&self) -> Result<String, IamError> {
        if self.retriever.certificate().is_none() {
            return Err(IamError::KeyUnavailable(
                "no certificate has been loaded".into(),
            ));
        }
        Ok(self.key_id.clone())
    }

    fn expiration_time(&self) -> SystemTime {
        self.retriever
            .certificate()
            .map(|cert| {
                cert.tbs_certificate
                    .validity
                    .not_after
                    .to_system_time()
            })
            .unwrap_or(UNIX_EPOCH)
    }
}
