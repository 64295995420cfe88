use http::StatusCode;
use http::header::InvalidHeaderValue;
use std::error::Error;

#[derive(Debug, thiserror::Error)]
pub enum IamError {
    #[error("Failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn Error + Send + Sync + 'static>,
    },
    #[error("Unexpected status {status} fetching {url}")]
    UnexpectedStatus { url: String, status: StatusCode },
    #[error("Failed to parse credential material: {0}")]
    Parse(String),
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(String),
    #[error("Can not compute signature while signing the request: {0}")]
    Signing(#[from] rsa::Error),
    #[error("Can not read body of request while calculating body hash: {0}")]
    BodyRead(String),
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl IamError {
    pub(crate) fn transport(
        url: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            IamError::Transport { .. } => true,
            IamError::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<InvalidHeaderValue> for IamError {
    fn from(error: InvalidHeaderValue) -> Self {
        Self::InvalidHeader(error.to_string())
    }
}
