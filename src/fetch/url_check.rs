//! URL normalization and validation for request targets.

use url::Url;

use super::error::FetchError;

/// Returns true for the schemes this crate fetches.
#[must_use]
pub fn is_fetchable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Normalizes user input into an absolute http(s) URL.
///
/// Surrounding whitespace is trimmed and input without a scheme gets `http://`.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] if the input is empty, does not parse,
/// uses another scheme, or has no host.
pub fn normalize_url(input: &str) -> Result<Url, FetchError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FetchError::invalid_url(input, "empty URL"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| FetchError::invalid_url(trimmed, e.to_string()))?;
    validate_target(&url)?;
    Ok(url)
}

/// Checks that an already-parsed URL can be fetched.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] for non-http(s) schemes or a missing host.
pub fn validate_target(url: &Url) -> Result<(), FetchError> {
    if !is_fetchable_scheme(url) {
        return Err(FetchError::invalid_url(
            url.as_str(),
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::invalid_url(url.as_str(), "missing host"));
    }
    Ok(())
}
