//! Domain types for authenticated calls

pub mod auth;
pub mod credentials;
pub mod endpoint;
pub mod request;

pub use auth::{AuthContext, AuthDescriptors};
pub use credentials::{CredentialKey, Credentials};
pub use endpoint::{append_path, ArgumentEncoding, BodyEncoding, EndpointDescriptor, HttpMethod};
pub use request::{Arguments, HttpRequest};
