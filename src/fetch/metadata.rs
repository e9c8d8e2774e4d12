//! Response metadata captured once per hop, before any body byte is read.

use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LOCATION, SET_COOKIE};
use url::Url;

/// Status, headers and declared body properties of one response.
///
/// Header lookups are case-insensitive; [`canonical_headers`](Self::canonical_headers)
/// exposes names in their conventional capitalization (`Content-Type`).
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    url: Url,
    status: u16,
    headers: HeaderMap,
    content_length: Option<u64>,
    encoding: Option<String>,
}

impl ResponseMetadata {
    /// Captures metadata from a live response without touching its body.
    #[must_use]
    pub fn from_response(response: &reqwest::Response) -> Self {
        Self::from_parts(
            response.url().clone(),
            response.status().as_u16(),
            response.headers().clone(),
        )
    }

    /// Builds metadata from its raw parts.
    #[must_use]
    pub fn from_parts(url: Url, status: u16, headers: HeaderMap) -> Self {
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let encoding = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        Self {
            url,
            status,
            headers,
            content_length,
            encoding,
        }
    }

    /// URL this response was received from.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Numeric HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Canonical reason phrase for the status, or an empty string.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("")
    }

    /// Raw header map.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive lookup of a header value that is valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Headers with canonically capitalized names, in map order.
    #[must_use]
    pub fn canonical_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(name, value)| {
                (
                    canonical_header_name(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    /// Declared Content-Length, if the server sent one.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Declared character encoding (lowercased `charset` parameter of Content-Type).
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for 3xx statuses.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Location header value.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION.as_str())
    }

    /// Last Set-Cookie header value, if any.
    #[must_use]
    pub fn last_set_cookie(&self) -> Option<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .next_back()
    }
}

/// Capitalizes each dash-separated word of a header name (`x-request-id` -> `X-Request-Id`).
#[must_use]
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_ascii_lowercase())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn build(headers: &[(&'static str, &'static str)]) -> ResponseMetadata {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(value));
        }
        ResponseMetadata::from_parts(Url::parse("https://example.com/a").unwrap(), 200, map)
    }

    #[test]
    fn test_canonical_header_name_capitalizes_words() {
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_header_name("ETAG"), "Etag");
    }

    #[test]
    fn test_canonical_headers_normalizes_names() {
        let meta = build(&[("content-length", "12"), ("x-custom-header", "yes")]);
        let headers = meta.canonical_headers();
        assert!(headers.contains(&("Content-Length".to_string(), "12".to_string())));
        assert!(headers.contains(&("X-Custom-Header".to_string(), "yes".to_string())));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let meta = build(&[("content-type", "text/plain")]);
        assert_eq!(meta.header("Content-Type"), Some("text/plain"));
        assert_eq!(meta.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_content_length_parsed_when_declared() {
        assert_eq!(build(&[("content-length", "1024")]).content_length(), Some(1024));
        assert_eq!(build(&[]).content_length(), None);
        assert_eq!(build(&[("content-length", "abc")]).content_length(), None);
    }

    #[test]
    fn test_encoding_from_charset_parameter() {
        let meta = build(&[("content-type", "text/html; charset=\"UTF-8\"")]);
        assert_eq!(meta.encoding(), Some("utf-8"));
        let meta = build(&[("content-type", "text/html; boundary=x; Charset=ISO-8859-1")]);
        assert_eq!(meta.encoding(), Some("iso-8859-1"));
        assert_eq!(build(&[("content-type", "application/pdf")]).encoding(), None);
    }

    #[test]
    fn test_last_set_cookie_wins() {
        let meta = build(&[("set-cookie", "a=1; Path=/"), ("set-cookie", "b=2; HttpOnly")]);
        assert_eq!(meta.last_set_cookie(), Some("b=2; HttpOnly"));
    }

    #[test]
    fn test_status_classes_and_reason() {
        let meta = ResponseMetadata::from_parts(
            Url::parse("https://example.com/").unwrap(),
            301,
            HeaderMap::new(),
        );
        assert!(meta.is_redirect());
        assert!(!meta.is_success());
        assert_eq!(meta.reason(), "Moved Permanently");
    }
}
