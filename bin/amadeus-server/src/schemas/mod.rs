//! Request / response types of the public API, annotated for OpenAPI.

pub mod chat;
pub mod upload;
