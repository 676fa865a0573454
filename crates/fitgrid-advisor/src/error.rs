use thiserror::Error;

pub type SetupResult<T> = Result<T, SetupError>;

/// Errors raised while configuring an advisor client.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid advisor url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported advisor url scheme: {0} (only http is supported)")]
    UnsupportedScheme(String),
}
