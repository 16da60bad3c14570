//! Transport-ready request value.

use std::collections::BTreeMap;
use std::fmt;

use url::{Position, Url};

use super::endpoint::HttpMethod;
use crate::constants::{AUTHORIZATION_HEADER, BEARER_PREFIX, CONTENT_TYPE_HEADER};

/// String-to-string argument map. Ordered so encoded output is stable.
pub type Arguments = BTreeMap<String, String>;

/// A fully built request: method, URL, headers and optional body.
///
/// Requests flagged as *authorized* get an `Authorization: Bearer <token>`
/// header written by the call engine on every dispatch.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: HttpMethod,
    url: Url,
    headers: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
    authorized: bool,
}

impl HttpRequest {
    #[must_use]
    pub const fn new(method: HttpMethod, url: Url) -> Self {
        Self { method, url, headers: BTreeMap::new(), body: None, authorized: false }
    }

    /// Attach a body together with its content type.
    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.set_header(CONTENT_TYPE_HEADER, content_type);
        self.body = Some(body);
        self
    }

    /// Mark the request as needing the session's bearer token.
    #[must_use]
    pub const fn authorized(mut self) -> Self {
        self.authorized = true;
        self
    }

    /// Insert or replace a header; names compare case-insensitively.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Write (or with an empty token, remove) the bearer header.
    pub fn set_bearer(&mut self, token: &str) {
        if token.is_empty() {
            self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
        } else {
            self.set_header(AUTHORIZATION_HEADER, &format!("{BEARER_PREFIX}{token}"));
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(AUTHORIZATION_HEADER).and_then(|value| value.strip_prefix(BEARER_PREFIX))
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE_HEADER)
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Whether this request addresses `endpoint`, ignoring query and fragment.
    #[must_use]
    pub fn targets(&self, endpoint: &Url) -> bool {
        self.url[..Position::AfterPath] == endpoint[..Position::AfterPath]
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION_HEADER) {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("authorized", &self.authorized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, Url::parse(url).unwrap())
    }

    #[test]
    fn headers_are_case_insensitive() {
        let mut req = request("https://api.example.com/items");
        req.set_header("content-type", "text/plain");
        req.set_header("Content-Type", "application/json");

        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.content_type(), Some("application/json"));
    }

    #[test]
    fn bearer_round_trip_and_removal() {
        let mut req = request("https://api.example.com/items").authorized();
        req.set_bearer("abc");
        assert_eq!(req.bearer_token(), Some("abc"));
        assert_eq!(req.header("authorization"), Some("Bearer abc"));

        req.set_bearer("");
        assert_eq!(req.bearer_token(), None);
        assert!(req.is_authorized());
    }

    #[test]
    fn targets_ignores_query() {
        let endpoint = Url::parse("https://id.example.com/refresh").unwrap();

        assert!(request("https://id.example.com/refresh?x=1").targets(&endpoint));
        assert!(!request("https://id.example.com/refresh/now").targets(&endpoint));
        assert!(!request("https://api.example.com/refresh").targets(&endpoint));
    }

    #[test]
    fn debug_redacts_authorization() {
        let mut req = request("https://api.example.com/items");
        req.set_bearer("super-secret-token");

        let rendered = format!("{req:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
