pub mod url_validation;
pub use url_validation::{UrlValidationError, build_endpoint_url, validate_endpoint_url};
