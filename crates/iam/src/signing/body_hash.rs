use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderValue, Request};
use http_body::Body;
use http_body_util::BodyExt;
use sha2::{Digest, Sha256};

use super::CONTENT_SHA256_HEADER;
use crate::error::IamError;

/// Hash the request body without consuming it.
///
/// The body is collected once into a single buffer which is then handed back
/// to the request as a fresh body, so the request can still be sent. Sets
/// `Content-Length` to the measured length and returns the base64 encoded
/// SHA-256 of the bytes. An absent body hashes as empty.
pub async fn compute_body_hash<B>(request: &mut Request<B>) -> Result<String, IamError>
where
    B: Body + From<Bytes> + Default,
    B::Error: std::fmt::Display,
{
    let body = std::mem::take(request.body_mut());
    let bytes = body
        .collect()
        .await
        .map_err(|e| IamError::BodyRead(e.to_string()))?
        .to_bytes();

    let hash = hash_and_encode(&bytes);
    request
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    *request.body_mut() = B::from(bytes);

    Ok(hash)
}

/// Compute the body hash and store it in the `x-content-sha256` header.
pub async fn install_body_hash<B>(request: &mut Request<B>) -> Result<(), IamError>
where
    B: Body + From<Bytes> + Default,
    B::Error: std::fmt::Display,
{
    let hash = compute_body_hash(request).await?;
    request
        .headers_mut()
        .insert(CONTENT_SHA256_HEADER, HeaderValue::from_str(&hash)?);
    Ok(())
}

fn hash_and_encode(data: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(data))
}
