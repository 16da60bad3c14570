//! Endpoint descriptors: immutable descriptions of one remote operation.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{FORM_CONTENT_TYPE, JSON_CONTENT_TYPE};
use crate::errors::CallError;
use crate::impl_domain_enum_conversions;

/// HTTP verb of an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl_domain_enum_conversions!(HttpMethod {
    Get => "GET",
    Post => "POST",
    Put => "PUT",
    Patch => "PATCH",
    Delete => "DELETE",
});

/// How a body-encoded argument map is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    Form,
    Json,
}

impl_domain_enum_conversions!(BodyEncoding {
    Form => "form",
    Json => "json",
});

impl BodyEncoding {
    /// Content-Type header value for this encoding
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Form => FORM_CONTENT_TYPE,
            Self::Json => JSON_CONTENT_TYPE,
        }
    }
}

/// Where the arguments of a call travel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentEncoding {
    #[default]
    QueryString,
    Body(BodyEncoding),
}

impl ArgumentEncoding {
    /// `application/x-www-form-urlencoded` body
    pub const FORM: Self = Self::Body(BodyEncoding::Form);
    /// `application/json` body
    pub const JSON: Self = Self::Body(BodyEncoding::Json);
}

/// Immutable description of one remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    base_url: Url,
    method: HttpMethod,
    #[serde(default)]
    argument_encoding: ArgumentEncoding,
}

impl EndpointDescriptor {
    #[must_use]
    pub const fn new(base_url: Url, method: HttpMethod, argument_encoding: ArgumentEncoding) -> Self {
        Self { base_url, method, argument_encoding }
    }

    /// Parse `base_url` and build a descriptor.
    ///
    /// # Errors
    /// Returns `CallError::InvalidUrl` if `base_url` is not an absolute URL.
    pub fn parse(
        base_url: &str,
        method: HttpMethod,
        argument_encoding: ArgumentEncoding,
    ) -> Result<Self, CallError> {
        let url = Url::parse(base_url).map_err(|e| CallError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self::new(url, method, argument_encoding))
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub const fn argument_encoding(&self) -> ArgumentEncoding {
        self.argument_encoding
    }
}

/// Append `route` to the path of `base`, one segment per `/`-separated part.
///
/// Unlike [`Url::join`], a leading slash in `route` does not discard the
/// path already present in `base`.
///
/// # Errors
/// Returns `CallError::InvalidComponents` if `base` cannot carry a path
/// (e.g. `mailto:` URLs).
pub fn append_path(base: &Url, route: &str) -> Result<Url, CallError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| CallError::InvalidComponents(format!("{base} cannot be a base URL")))?;
        segments.pop_if_empty();
        for segment in route.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
    }
    Ok(url)
}
