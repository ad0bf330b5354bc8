use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed is already active; disconnect before connecting again")]
    AlreadyActive,

    #[error("feed period must be non-zero")]
    InvalidPeriod,
}

pub type Result<T> = std::result::Result<T, DashboardError>;
