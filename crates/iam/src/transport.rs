use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use crate::error::IamError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and fully read body of a GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// HTTP client used to download certificates and keys.
///
/// Implementations own their timeout and retry configuration.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, IamError>;
}

/// [`Transport`] over a pooled hyper client, supporting `http` and `https`.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    timeout: Duration,
}

impl HyperTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpsConnector::new());
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn get(&self, url: &str) -> Result<FetchResponse, IamError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| IamError::transport(url, e))?;
        let request = Request::get(uri)
            .body(Empty::<Bytes>::new())
            .map_err(|e| IamError::transport(url, e))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| IamError::transport(url, e))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| IamError::transport(url, e))?
                .to_bytes();
            Ok::<_, IamError>(FetchResponse { status, body })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|e| IamError::transport(url, e))?
    }
}
