//! Request signing for the NoSQL database client.
//!
//! Credential material (an X.509 certificate and its RSA private key) is
//! loaded by a [`CertificateRetriever`] and read through a [`KeyProvider`];
//! a [`RequestSigner`] uses it to add a draft-cavage `Authorization` header
//! to outgoing requests.

pub mod credentials;
pub mod error;
pub mod signing;
pub mod transport;

#[cfg(test)]
pub(crate) mod fixtures;

pub use credentials::{
    CertificateRetriever, CredentialMaterial, StaticCertificateRetriever, UrlCertificateRetriever,
};
pub use error::IamError;
pub use signing::{
    BodyHashPredicate, KeyProvider, RequestSigner, RetrieverKeyProvider, SigningConfig,
};
pub use transport::{FetchResponse, HyperTransport, Transport};
