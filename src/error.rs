use thiserror::Error;

/// Required configuration is absent or unusable. Aborts card activation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one data source must be configured")]
    NoDataSource,

    #[error("config must be a mapping of keys to values")]
    NotAMapping,

    #[error("pull mode requires '{missing}' (set both 'emby_url' and 'api_key')")]
    MissingCredential { missing: &'static str },

    #[error("invalid emby_url '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// A recoverable failure of one data-source request. Never escapes the adapter boundary
/// as anything but an empty section.
#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server answered with status {status}")]
    Status { status: u16 },

    #[error("unparseable response body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("entity '{0}' is not present in the host snapshot")]
    EntityUnavailable(String),

    #[error("no {0} data source is configured for this section")]
    Unbound(&'static str),
}

/// Registry and enabling-key table disagree. This is a defect, not a runtime condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no section registered under key '{0}'")]
pub struct UnknownSectionError(pub String);
