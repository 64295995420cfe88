use std::sync::Arc;
use std::time::{Duration, SystemTime};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request};
use http_body::Body;
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};

use super::body_hash::install_body_hash;
use super::canonical::{signing_headers, signing_string};
use super::key_provider::KeyProvider;
use super::predicate::BodyHashPredicate;
use super::{
    SIGNER_VERSION, default_body_headers, default_delegation_headers, default_generic_headers,
};
use crate::error::IamError;

/// Which headers are signed, and when the body is.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub generic_headers: Vec<String>,
    pub body_headers: Vec<String>,
    pub should_hash_body: BodyHashPredicate,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            generic_headers: default_generic_headers(),
            body_headers: default_body_headers(),
            should_hash_body: BodyHashPredicate::state_changing(),
        }
    }
}

/// Signs requests following draft-cavage HTTP signatures with `rsa-sha256`.
///
/// Signing only reads the key provider, so one signer can be shared across
/// tasks.
#[derive(Clone)]
pub struct RequestSigner {
    key_provider: Option<Arc<dyn KeyProvider>>,
    config: SigningConfig,
}

impl RequestSigner {
    pub fn new(key_provider: Option<Arc<dyn KeyProvider>>, config: SigningConfig) -> Self {
        Self {
            key_provider,
            config,
        }
    }

    /// Default generic and body headers, hashing state-changing requests.
    pub fn default_signer(key_provider: Arc<dyn KeyProvider>) -> Self {
        Self::new(Some(key_provider), SigningConfig::default())
    }

    /// Like [`RequestSigner::default_signer`] but also signs the delegation
    /// token header.
    pub fn delegation(key_provider: Arc<dyn KeyProvider>) -> Self {
        Self::with_headers(
            key_provider,
            default_delegation_headers(),
            default_body_headers(),
        )
    }

    /// Hashes the body only when the request carries the marker header.
    pub fn exclude_body(key_provider: Arc<dyn KeyProvider>) -> Self {
        Self::with_headers_and_predicate(
            key_provider,
            default_generic_headers(),
            default_body_headers(),
            BodyHashPredicate::explicit_only(),
        )
    }

    pub fn delegation_exclude_body(key_provider: Arc<dyn KeyProvider>) -> Self {
        Self::with_headers_and_predicate(
            key_provider,
            default_delegation_headers(),
            default_body_headers(),
            BodyHashPredicate::explicit_only(),
        )
    }

    pub fn with_headers(
        key_provider: Arc<dyn KeyProvider>,
        generic_headers: Vec<String>,
        body_headers: Vec<String>,
    ) -> Self {
        Self::with_headers_and_predicate(
            key_provider,
            generic_headers,
            body_headers,
            BodyHashPredicate::state_changing(),
        )
    }

    pub fn with_headers_and_predicate(
        key_provider: Arc<dyn KeyProvider>,
        generic_headers: Vec<String>,
        body_headers: Vec<String>,
        should_hash_body: BodyHashPredicate,
    ) -> Self {
        Self::new(
            Some(key_provider),
            SigningConfig {
                generic_headers,
                body_headers,
                should_hash_body,
            },
        )
    }

    /// Copy of this signer with a different body hash predicate.
    pub fn with_body_hash_predicate(&self, should_hash_body: BodyHashPredicate) -> Self {
        Self {
            key_provider: self.key_provider.clone(),
            config: SigningConfig {
                should_hash_body,
                ..self.config.clone()
            },
        }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Expiration of the current key material. Without a key provider the
    /// signer is already expired.
    pub fn expiration_time(&self) -> SystemTime {
        match &self.key_provider {
            Some(provider) => provider.expiration_time(),
            None => SystemTime::now() - Duration::from_secs(1),
        }
    }

    fn should_hash_body<B>(&self, request: &Request<B>) -> bool {
        self.config
            .should_hash_body
            .should_hash(request.method(), request.headers())
    }

    fn headers_to_sign<B>(&self, request: &Request<B>) -> Vec<&str> {
        signing_headers(
            &self.config.generic_headers,
            &self.config.body_headers,
            self.should_hash_body(request),
        )
    }

    /// The canonical string [`RequestSigner::sign`] would sign for `request`
    /// in its current state.
    pub fn signing_string<B>(&self, request: &Request<B>) -> String {
        signing_string(request, &self.headers_to_sign(request))
    }

    fn key_provider(&self) -> Result<&Arc<dyn KeyProvider>, IamError> {
        self.key_provider
            .as_ref()
            .ok_or_else(|| IamError::KeyUnavailable("signer has no key provider".into()))
    }

    fn compute_signature(&self, signing_string: &str) -> Result<String, IamError> {
        let digest = Sha256::digest(signing_string.as_bytes());
        let private_key = self.key_provider()?.private_rsa_key()?;
        let signature = private_key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)?;
        Ok(STANDARD.encode(signature))
    }

    /// Sign `request`, setting its `Authorization` header.
    ///
    /// When the body is part of the signature, `Content-Length` and
    /// `x-content-sha256` are set first. If signing fails after that, those
    /// two headers stay on the request but `Authorization` is not written.
    pub async fn sign<B>(&self, request: &mut Request<B>) -> Result<(), IamError>
    where
        B: Body + From<Bytes> + Default,
        B::Error: std::fmt::Display,
    {
        let hash_body = self.should_hash_body(request);
        if hash_body {
            install_body_hash(request).await?;
        }

        let headers = signing_headers(
            &self.config.generic_headers,
            &self.config.body_headers,
            hash_body,
        );
        let signature = self.compute_signature(&signing_string(request, &headers))?;
        let key_id = self.key_provider()?.key_id()?;

        let header_list = headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let authorization = format!(
            "Signature version=\"{SIGNER_VERSION}\",headers=\"{header_list}\",keyId=\"{key_id}\",algorithm=\"rsa-sha256\",signature=\"{signature}\""
        );

        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);

        tracing::debug!(
            method = %request.method(),
            headers = %header_list,
            "signed request"
        );
        Ok(())
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("has_key_provider", &self.key_provider.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{CONTENT_SHA256_HEADER, HASH_BODY_MARKER_HEADER};
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
    use http_body_util::Full;
    use rsa::RsaPrivateKey;
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    use crate::fixtures::KEY_A;
    const DATE: &str = "Thu, 05 Jan 2014 21:31:40 GMT";

    struct FixedKeyProvider {
        key: Option<Arc<RsaPrivateKey>>,
        key_id: Result<String, String>,
    }

    impl FixedKeyProvider {
        fn valid() -> Arc<dyn KeyProvider> {
            Arc::new(Self {
                key: Some(Arc::new(RsaPrivateKey::from_pkcs1_pem(KEY_A).unwrap())),
                key_id: Ok("test-key".into()),
            })
        }
    }

    impl KeyProvider for FixedKeyProvider {
        fn private_rsa_key(&self) -> Result<Arc<RsaPrivateKey>, IamError> {
            self.key
                .clone()
                .ok_or_else(|| IamError::KeyUnavailable("no key".into()))
        }

        fn key_id(&self) -> Result<String, IamError> {
            self.key_id.clone().map_err(IamError::KeyUnavailable)
        }

        fn expiration_time(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH + Duration::from_secs(4_000_000_000)
        }
    }

    fn get_request() -> Request<Full<Bytes>> {
        Request::get("https://example.com/v1/x")
            .header("date", DATE)
            .body(Full::default())
            .unwrap()
    }

    fn post_request(body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::post("https://example.com/v1/tables")
            .header("date", DATE)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    fn authorization(request: &Request<Full<Bytes>>) -> &str {
        request.headers()[AUTHORIZATION].to_str().unwrap()
    }

    fn extract_signature(authorization: &str) -> Vec<u8> {
        let start = authorization.find("signature=\"").unwrap() + "signature=\"".len();
        let end = authorization.len() - 1;
        STANDARD.decode(&authorization[start..end]).unwrap()
    }

    #[tokio::test]
    async fn get_request_authorization_shape() {
        let signer = RequestSigner::default_signer(FixedKeyProvider::valid());
        let mut request = get_request();
        signer.sign(&mut request).await.unwrap();

        let auth = authorization(&request);
        assert!(auth.starts_with(
            "Signature version=\"1\",headers=\"date (request-target) host\",keyId=\"test-key\",algorithm=\"rsa-sha256\",signature=\""
        ));
        assert!(auth.ends_with('"'));
        assert!(request.headers().get(CONTENT_SHA256_HEADER).is_none());
    }

    #[tokio::test]
    async fn signature_verifies_against_signing_string() {
        let provider = FixedKeyProvider::valid();
        let public_key = provider.private_rsa_key().unwrap().to_public_key();
        let signer = RequestSigner::default_signer(provider);

        let mut request = get_request();
        signer.sign(&mut request).await.unwrap();

        let signing_string = signer.signing_string(&request);
        assert_eq!(
            signing_string,
            format!("date: {DATE}\n(request-target): get /v1/x\nhost: example.com")
        );

        let signature = extract_signature(authorization(&request));
        let verifying_key = VerifyingKey::<Sha256>::new(public_key);
        let signature = Signature::try_from(signature.as_slice()).unwrap();
        verifying_key
            .verify(signing_string.as_bytes(), &signature)
            .unwrap();
    }

    #[tokio::test]
    async fn post_request_signs_body_headers() {
        let signer = RequestSigner::default_signer(FixedKeyProvider::valid());
        let mut request = post_request(br#"{"compartmentId":"c1"}"#);
        signer.sign(&mut request).await.unwrap();

        assert_eq!(
            request.headers()[CONTENT_SHA256_HEADER],
            "o86pKxn+WqhPXryhunWGdxVTmlVjQQqcPb3x50N6f8g="
        );
        assert_eq!(request.headers()[CONTENT_LENGTH], "22");
        assert!(authorization(&request).contains(
            "headers=\"date (request-target) host content-length content-type x-content-sha256\""
        ));
        assert!(signer.signing_string(&request).ends_with(
            "content-length: 22\ncontent-type: application/json\nx-content-sha256: o86pKxn+WqhPXryhunWGdxVTmlVjQQqcPb3x50N6f8g="
        ));
    }

    #[tokio::test]
    async fn exclude_body_skips_hash_for_post() {
        let signer = RequestSigner::exclude_body(FixedKeyProvider::valid());
        let mut request = post_request(b"{}");
        signer.sign(&mut request).await.unwrap();

        assert!(request.headers().get(CONTENT_SHA256_HEADER).is_none());
        assert!(authorization(&request).contains("headers=\"date (request-target) host\""));
    }

    #[tokio::test]
    async fn exclude_body_honours_marker() {
        let signer = RequestSigner::exclude_body(FixedKeyProvider::valid());
        let mut request = post_request(b"{}");
        request
            .headers_mut()
            .insert(HASH_BODY_MARKER_HEADER, HeaderValue::from_static("true"));
        signer.sign(&mut request).await.unwrap();

        assert!(request.headers().get(CONTENT_SHA256_HEADER).is_some());
    }

    #[tokio::test]
    async fn delegation_signs_obo_token() {
        let signer = RequestSigner::delegation(FixedKeyProvider::valid());
        let mut request = get_request();
        request
            .headers_mut()
            .insert("opc-obo-token", HeaderValue::from_static("delegation-token"));
        signer.sign(&mut request).await.unwrap();

        assert!(
            authorization(&request)
                .contains("headers=\"date (request-target) host opc-obo-token\"")
        );
        assert!(signer
            .signing_string(&request)
            .ends_with("opc-obo-token: delegation-token"));
    }

    #[tokio::test]
    async fn delegation_exclude_body_keeps_token_header() {
        let signer = RequestSigner::delegation_exclude_body(FixedKeyProvider::valid());
        let mut request = post_request(b"{}");
        signer.sign(&mut request).await.unwrap();

        assert!(
            authorization(&request)
                .contains("headers=\"date (request-target) host opc-obo-token\"")
        );
    }

    #[tokio::test]
    async fn repeated_signing_is_deterministic() {
        let signer = RequestSigner::default_signer(FixedKeyProvider::valid());
        let mut first = post_request(b"payload");
        let mut second = post_request(b"payload");
        signer.sign(&mut first).await.unwrap();
        signer.sign(&mut second).await.unwrap();

        assert_eq!(signer.signing_string(&first), signer.signing_string(&second));
        assert_eq!(authorization(&first), authorization(&second));
    }

    #[tokio::test]
    async fn swapped_predicate_keeps_headers_and_provider() {
        let signer = RequestSigner::delegation(FixedKeyProvider::valid());
        let never = signer.with_body_hash_predicate(BodyHashPredicate::from_fn(|_, _| false));

        assert_eq!(never.config().generic_headers, signer.config().generic_headers);
        assert_eq!(never.config().body_headers, signer.config().body_headers);
        assert_eq!(never.expiration_time(), signer.expiration_time());

        let mut request = post_request(b"{}");
        never.sign(&mut request).await.unwrap();
        assert!(request.headers().get(CONTENT_SHA256_HEADER).is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_without_authorization() {
        let provider: Arc<dyn KeyProvider> = Arc::new(FixedKeyProvider {
            key: None,
            key_id: Ok("test-key".into()),
        });
        let signer = RequestSigner::default_signer(provider);
        let mut request = get_request();

        let err = signer.sign(&mut request).await.unwrap_err();
        assert!(matches!(err, IamError::KeyUnavailable(_)));
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn key_id_failure_fails_without_authorization() {
        let provider: Arc<dyn KeyProvider> = Arc::new(FixedKeyProvider {
            key: Some(Arc::new(RsaPrivateKey::from_pkcs1_pem(KEY_A).unwrap())),
            key_id: Err("token expired".into()),
        });
        let signer = RequestSigner::default_signer(provider);
        let mut request = post_request(b"{}");

        assert!(signer.sign(&mut request).await.is_err());
        assert!(request.headers().get(AUTHORIZATION).is_none());
        // body headers were written before the failure
        assert!(request.headers().get(CONTENT_SHA256_HEADER).is_some());
    }

    #[tokio::test]
    async fn unbound_signer_is_expired_and_cannot_sign() {
        let signer = RequestSigner::new(None, SigningConfig::default());
        assert!(signer.expiration_time() < SystemTime::now());

        let mut request = get_request();
        assert!(matches!(
            signer.sign(&mut request).await,
            Err(IamError::KeyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn invalid_key_id_is_rejected() {
        let provider: Arc<dyn KeyProvider> = Arc::new(FixedKeyProvider {
            key: Some(Arc::new(RsaPrivateKey::from_pkcs1_pem(KEY_A).unwrap())),
            key_id: Ok("bad\nid".into()),
        });
        let signer = RequestSigner::default_signer(provider);
        let mut request = get_request();

        assert!(matches!(
            signer.sign(&mut request).await,
            Err(IamError::InvalidHeader(_))
        ));
    }
}
