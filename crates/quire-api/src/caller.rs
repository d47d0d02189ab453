//! The [`Caller`] extractor: who is making the request.
//!
//! Authentication happens upstream; by the time a request reaches this API
//! the user id has been placed in a trusted header (`x-quire-user` unless
//! configured otherwise). A missing header is not rejected here. It yields
//! an anonymous identity, which the engine refuses for anything touching
//! persistence.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use quire_core::identity::Identity;

use crate::ApiState;

pub struct Caller(pub Identity);

impl<S, B> FromRequestParts<ApiState<S, B>> for Caller
where
  S: Send + Sync,
  B: Send + Sync,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S, B>,
  ) -> Result<Self, Self::Rejection> {
    let user_id = parts
      .headers
      .get(&state.identity_header)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned);
    Ok(Caller(Identity { user_id }))
  }
}
