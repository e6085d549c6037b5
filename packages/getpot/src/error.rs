use thiserror::Error;

use crate::core::GetPotProvider;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Provider(Box<ProviderError>),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider {0} is already registered")]
    DuplicateProvider(String),

    #[error("Provider {0} is not registered")]
    UnknownProvider(String),

    #[error("No provider could handle the request ({} declined)", .0.len())]
    NoSupportingProviders(Vec<ProviderError>),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Error::Provider(Box::new(err))
    }
}

impl Error {
    /// The provider declined the request; another provider may still handle it.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Provider(err) if err.kind == ProviderErrorKind::Unsupported)
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Error::Provider(err) if err.kind == ProviderErrorKind::Request)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, Error)]
#[error("[{provider}] {kind:?}: {message}")]
pub struct ProviderError {
    kind: ProviderErrorKind,
    provider: String,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The request should be skipped by this provider, not retried.
    Unsupported,
    /// The provider accepted the request but could not produce a token.
    Request,
}

impl ProviderError {
    pub fn unsupported<T: GetPotProvider>(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unsupported,
            provider: T::PROVIDER_NAME.to_string(),
            message: message.into(),
        }
    }

    pub fn request<T: GetPotProvider>(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Request,
            provider: T::PROVIDER_NAME.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
