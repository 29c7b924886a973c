use skillhub_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    #[error("GitHub API rate limit exhausted (resets at unix time {reset})")]
    RateLimited { reset: u64 },
    #[error("unsafe path in repository listing: {path}")]
    InvalidPath { path: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

skillhub_common::impl_context!();
