//! Legacy signed parameter convention.
//!
//! Calls of the older API are authenticated by signing their parameters in a
//! server-defined order instead of presenting a bearer token.

pub mod encode;
pub mod models;
pub mod params;
pub mod request;
