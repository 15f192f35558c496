// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Response,
};

use super::routes::error_response;
use crate::models::UserId;

pub const USER_HEADER: &str = "x-user-id";

/// The acting user, resolved from the session header set by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Login required."))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .map(CurrentUser)
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Invalid session."))
    }
}
