//! authgate library crate.
//!
//! OAuth 2.0 authorization server core: composite grant dispatch, single-use
//! authorization codes, authorization request validation and the
//! authorization and token endpoints, with a thin axum adapter.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod templates;
