//! Redirect following decisions with a bounded hop budget.
//!
//! [`RedirectPolicy::next`] looks at one response and either names the next
//! absolute target or declares the response terminal. The accompanying
//! [`RedirectContext`] tracks the remaining budget and the cookie forwarded
//! to the next hop.

use tracing::debug;
use url::Url;

use super::error::FetchError;
use super::metadata::ResponseMetadata;
use super::url_check::validate_target;

/// State carried across the hops of one redirect chain.
#[derive(Debug, Clone)]
pub struct RedirectContext {
    original: Url,
    current: Url,
    limit: u32,
    remaining: u32,
    cookie: Option<String>,
}

impl RedirectContext {
    /// Starts a chain at `url` with a budget of `max_redirects` hops.
    #[must_use]
    pub fn new(url: Url, max_redirects: u32) -> Self {
        Self {
            current: url.clone(),
            original: url,
            limit: max_redirects,
            remaining: max_redirects,
            cookie: None,
        }
    }

    /// URL the chain started from.
    #[must_use]
    pub fn original(&self) -> &Url {
        &self.original
    }

    /// URL of the hop currently being processed.
    #[must_use]
    pub fn current(&self) -> &Url {
        &self.current
    }

    /// Redirects that may still be followed.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Cookie to send on the next hop (last Set-Cookie seen).
    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }
}

/// Outcome of inspecting one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Issue the next hop against this absolute URL.
    Follow(Url),
    /// The response ends the chain.
    Terminal,
}

/// Decides whether a response is followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectPolicy;

impl RedirectPolicy {
    /// Inspects `response` and advances `context` when it is a followable redirect.
    ///
    /// Only 3xx responses carrying a Location header are followed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::TooManyRedirects`] when the budget is already spent
    /// - [`FetchError::InvalidRedirect`] when Location is unresolvable or not http(s)
    pub fn next(
        &self,
        response: &ResponseMetadata,
        context: &mut RedirectContext,
    ) -> Result<RedirectDecision, FetchError> {
        if !response.is_redirect() {
            return Ok(RedirectDecision::Terminal);
        }
        let Some(location) = response.location() else {
            return Ok(RedirectDecision::Terminal);
        };

        if context.remaining == 0 {
            debug!(url = %context.original, limit = context.limit, "redirect budget exhausted");
            return Err(FetchError::TooManyRedirects {
                url: context.original.to_string(),
                limit: context.limit,
                response: Box::new(response.clone()),
            });
        }
        context.remaining -= 1;

        let target = resolve_location(&context.current, location).map_err(|source| {
            FetchError::InvalidRedirect {
                location: location.to_string(),
                response: Box::new(response.clone()),
                source: Box::new(source),
            }
        })?;

        if let Some(set_cookie) = response.last_set_cookie() {
            context.cookie = Some(cookie_pair(set_cookie).to_string());
        }

        debug!(
            status = response.status(),
            from = %context.current,
            to = %target,
            remaining = context.remaining,
            "following redirect"
        );
        context.current = target.clone();
        Ok(RedirectDecision::Follow(target))
    }
}

/// Resolves a Location value against the URL that produced it.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] when the value cannot be resolved or the
/// result is not an http(s) URL with a host.
pub fn resolve_location(current: &Url, location: &str) -> Result<Url, FetchError> {
    let trimmed = location.trim();
    let resolved = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => current
            .join(trimmed)
            .map_err(|e| FetchError::invalid_url(trimmed, e.to_string()))?,
        Err(e) => return Err(FetchError::invalid_url(trimmed, e.to_string())),
    };
    validate_target(&resolved)?;
    Ok(resolved)
}

/// The `name=value` part of a Set-Cookie value; attributes are dropped.
fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or("").trim()
}
