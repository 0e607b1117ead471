//! Outbound HTTP helpers.

use std::time::Duration;

use reqwest::Url;

use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;

/// Build an HTTP client with a total request timeout.
pub fn build_client(timeout: Duration, user_agent: &str) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to build HTTP client", e))
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn validate_external_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AppError::with_source(ErrorKind::Validation, format!("Invalid URL '{raw}'"), e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::validation(format!(
            "URL '{raw}' must use http or https"
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::validation(format!("URL '{raw}' has no host")));
    }
    Ok(url)
}

/// Map a transport or status error from an external host.
pub fn external_error(context: &str, url: &str, err: reqwest::Error) -> AppError {
    AppError::with_source(
        ErrorKind::ExternalService,
        format!("{context} '{url}': {err}"),
        err,
    )
}
