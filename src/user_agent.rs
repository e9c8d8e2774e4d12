//! Default User-Agent sent with every request unless the caller overrides it.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/lazyfetch/lazyfetch";

/// Default User-Agent for fetch requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("lazyfetch/{version} (+{PROJECT_UA_URL})")
}
