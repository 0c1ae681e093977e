//! Extractors whose rejections render through [`ApiError`], so malformed
//! bodies and path segments answer 400 with the usual `{"error": ...}` body.

use axum::extract::{FromRequest, FromRequestParts};
use super::ApiError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

/// Typed path segment such as an order or line id.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ValidPath<T>(pub T);
