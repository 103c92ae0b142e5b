use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("http client build failed: {0}")]
    ClientInit(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("profile not found")]
    NotFound,

    #[error("http {0}")]
    Status(u16),

    #[error("failed reading body: {0}")]
    Body(String),

    #[error("run interrupted before request was sent")]
    Interrupted,
}

impl FetchError {
    /// Outcomes that are routine for this provider and not worth a warning.
    pub fn is_expected(&self) -> bool {
        matches!(self, FetchError::NotFound | FetchError::Interrupted)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
