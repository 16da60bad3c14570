//! Request builder
//!
//! Turns a URL, a method and an argument map into an [`HttpRequest`]. Pure
//! transformation, no I/O and no knowledge of authentication.

use serde::Serialize;
use tokenrelay_domain::{
    ArgumentEncoding, Arguments, BodyEncoding, CallError, CallResult, EndpointDescriptor,
    HttpMethod, HttpRequest,
};
use tokenrelay_domain::constants::JSON_CONTENT_TYPE;
use url::Url;

/// Builds transport-ready requests
pub struct RequestBuilder;

impl RequestBuilder {
    /// Parse `url` and build a request carrying `arguments` per `encoding`.
    ///
    /// # Errors
    /// - `CallError::InvalidUrl` if `url` cannot be parsed
    /// - `CallError::InvalidComponents` if it has no host or cannot be a base
    /// - `CallError::SerializationFailed` if the JSON body cannot be written
    pub fn build(
        url: &str,
        method: HttpMethod,
        arguments: Option<&Arguments>,
        encoding: ArgumentEncoding,
    ) -> CallResult<HttpRequest> {
        let parsed = Url::parse(url).map_err(|e| CallError::InvalidUrl(format!("{url}: {e}")))?;
        Self::build_url(parsed, method, arguments, encoding)
    }

    /// Same as [`RequestBuilder::build`] for an already parsed URL.
    ///
    /// # Errors
    /// See [`RequestBuilder::build`].
    pub fn build_url(
        mut url: Url,
        method: HttpMethod,
        arguments: Option<&Arguments>,
        encoding: ArgumentEncoding,
    ) -> CallResult<HttpRequest> {
        ensure_components(&url)?;

        match encoding {
            ArgumentEncoding::QueryString => {
                if let Some(arguments) = arguments.filter(|a| !a.is_empty()) {
                    let mut pairs = url.query_pairs_mut();
                    for (key, value) in arguments {
                        pairs.append_pair(key, value);
                    }
                }
                Ok(HttpRequest::new(method, url))
            }
            ArgumentEncoding::Body(body_encoding) => {
                let request = HttpRequest::new(method, url);
                let Some(arguments) = arguments else {
                    return Ok(request);
                };
                let body = match body_encoding {
                    BodyEncoding::Form => Self::form_encode(arguments).into_bytes(),
                    BodyEncoding::Json => {
                        serde_json::to_vec(arguments).map_err(CallError::SerializationFailed)?
                    }
                };
                Ok(request.with_body(body_encoding.content_type(), body))
            }
        }
    }

    /// Build the request described by `descriptor`.
    ///
    /// # Errors
    /// See [`RequestBuilder::build`].
    pub fn from_descriptor(
        descriptor: &EndpointDescriptor,
        arguments: Option<&Arguments>,
    ) -> CallResult<HttpRequest> {
        Self::build_url(
            descriptor.base_url().clone(),
            descriptor.method(),
            arguments,
            descriptor.argument_encoding(),
        )
    }

    /// Build a request whose JSON body is any serialisable value.
    ///
    /// # Errors
    /// - `CallError::InvalidComponents` if `url` has no host
    /// - `CallError::SerializationFailed` if `value` cannot be serialised
    pub fn json_object<T>(url: &Url, value: &T, method: HttpMethod) -> CallResult<HttpRequest>
    where
        T: Serialize + ?Sized,
    {
        ensure_components(url)?;
        let body = serde_json::to_vec(value).map_err(CallError::SerializationFailed)?;
        Ok(HttpRequest::new(method, url.clone()).with_body(JSON_CONTENT_TYPE, body))
    }

    /// `key=value` pairs, percent-encoded and joined with `&`.
    #[must_use]
    pub fn form_encode(arguments: &Arguments) -> String {
        arguments
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn ensure_components(url: &Url) -> CallResult<()> {
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(CallError::InvalidComponents(format!("{url} has no host or path")));
    }
    Ok(())
}
