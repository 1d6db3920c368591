//! Request extractors whose rejections use the application's error body.
//!
//! axum's own `Json` and `Path` reject malformed input with plain-text
//! responses; these wrappers route the rejection through [`AppError`] so a
//! bad body or path parameter becomes a 400 `invalid_request`.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// URL path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);
