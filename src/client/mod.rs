//! Bearer-authenticated Web API client.

pub mod executor;
pub mod request;

pub use executor::{ApiClient, EmptyResponse};
pub use request::ApiRequest;
