mod body_hash;
mod canonical;
mod key_provider;
mod predicate;
mod signer;

pub use body_hash::{compute_body_hash, install_body_hash};
pub use canonical::{request_target, signing_headers, signing_string};
pub use key_provider::{KeyProvider, RetrieverKeyProvider};
pub use predicate::BodyHashPredicate;
pub use signer::{RequestSigner, SigningConfig};

/// Version reported in the `Authorization` header.
pub const SIGNER_VERSION: &str = "1";

/// Header carrying the base64 SHA-256 of the request body.
pub const CONTENT_SHA256_HEADER: &str = "x-content-sha256";

/// Header a caller sets to `"true"` to force body hashing.
pub const HASH_BODY_MARKER_HEADER: &str = "x-nosql-hash-body";

pub const REQUEST_TARGET: &str = "(request-target)";

pub const DEFAULT_GENERIC_HEADERS: &[&str] = &["date", REQUEST_TARGET, "host"];
pub const DEFAULT_DELEGATION_HEADERS: &[&str] =
    &["date", REQUEST_TARGET, "host", "opc-obo-token"];
pub const DEFAULT_BODY_HEADERS: &[&str] =
    &["content-length", "content-type", CONTENT_SHA256_HEADER];

pub fn default_generic_headers() -> Vec<String> {
    to_owned(DEFAULT_GENERIC_HEADERS)
}

/// Generic headers plus the delegation (on-behalf-of) token header.
pub fn default_delegation_headers() -> Vec<String> {
    to_owned(DEFAULT_DELEGATION_HEADERS)
}

pub fn default_body_headers() -> Vec<String> {
    to_owned(DEFAULT_BODY_HEADERS)
}

fn to_owned(headers: &[&str]) -> Vec<String> {
    headers.iter().map(|h| h.to_string()).collect()
}
