use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, Method};

use super::HASH_BODY_MARKER_HEADER;

/// Decides whether a request's body (and the body headers) are part of the
/// signature.
#[derive(Clone)]
pub struct BodyHashPredicate(Arc<dyn Fn(&Method, &HeaderMap) -> bool + Send + Sync>);

impl BodyHashPredicate {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Method, &HeaderMap) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Hash when explicitly requested, or for POST, PUT and PATCH.
    pub fn state_changing() -> Self {
        Self::from_fn(|method, headers| {
            explicitly_requested(headers)
                || *method == Method::POST
                || *method == Method::PUT
                || *method == Method::PATCH
        })
    }

    /// Hash only when the marker header asks for it.
    pub fn explicit_only() -> Self {
        Self::from_fn(|_, headers| explicitly_requested(headers))
    }

    pub fn should_hash(&self, method: &Method, headers: &HeaderMap) -> bool {
        (self.0)(method, headers)
    }
}

impl Default for BodyHashPredicate {
    fn default() -> Self {
        Self::state_changing()
    }
}

impl fmt::Debug for BodyHashPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BodyHashPredicate")
    }
}

fn explicitly_requested(headers: &HeaderMap) -> bool {
    headers
        .get(HASH_BODY_MARKER_HEADER)
        .is_some_and(|value| value.as_bytes() == b"true")
}
