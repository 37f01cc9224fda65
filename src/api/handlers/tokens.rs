//! Issue and refresh endpoints.

use axum::{
    extract::{Extension, Query},
    http::{
        header::{HOST, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::{IntoParams, ToSchema};

use super::cookies::{extract_cookie, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use crate::{
    api::ApiState,
    credentials::{CredentialError, ErrorKind, TokenPair},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubjectQuery {
    /// Subject identifier the pair is issued for.
    guid: Option<String>,
}

/// Expiry of the pair just set in the `at`/`rt` cookies (RFC 3339).
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenExpiry {
    pub access_expires_at: String,
    pub refresh_expires_at: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/tokens",
    params(SubjectQuery),
    responses(
        (status = 200, description = "Pair issued; `at` and `rt` cookies set", body = TokenExpiry),
        (status = 400, description = "Missing or invalid subject"),
        (status = 401, description = "Unknown subject"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state))]
pub async fn issue(
    Query(query): Query<SubjectQuery>,
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
) -> Response {
    let subject = query.guid.unwrap_or_default();
    let host = request_host(&headers);

    match state.rotator().issue(&subject, &host).await {
        Ok(pair) => pair_response(&state, &pair),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    params(SubjectQuery),
    responses(
        (status = 200, description = "Pair rotated; `at` and `rt` cookies replaced", body = TokenExpiry),
        (status = 400, description = "Missing subject or malformed `rt` cookie"),
        (status = 401, description = "Refresh credential missing or rejected"),
        (status = 409, description = "Another refresh for this subject won"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state))]
pub async fn refresh(
    Query(query): Query<SubjectQuery>,
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
) -> Response {
    let subject = query.guid.unwrap_or_default();
    let host = request_host(&headers);
    // Absent cookies become empty values; the rotator rejects them as unauthorized.
    let presented = extract_cookie(&headers, REFRESH_COOKIE_NAME).unwrap_or_default();
    let prior_access = extract_cookie(&headers, ACCESS_COOKIE_NAME).unwrap_or_default();

    match state
        .rotator()
        .refresh(&subject, &presented, &prior_access, &host)
        .await
    {
        Ok(pair) => pair_response(&state, &pair),
        Err(err) => error_response(&err),
    }
}

fn request_host(headers: &HeaderMap) -> String {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn pair_response(state: &ApiState, pair: &TokenPair) -> Response {
    let cookies = state.cookies();
    let (Ok(access), Ok(refresh)) = (
        cookies.access(&pair.access_token),
        cookies.refresh(&pair.refresh_transport()),
    ) else {
        error!("Failed to build credential cookies");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, access);
    headers.append(SET_COOKIE, refresh);

    let body = TokenExpiry {
        access_expires_at: pair.access_expires_at.to_rfc3339(),
        refresh_expires_at: pair.refresh_expires_at.to_rfc3339(),
    };

    (StatusCode::OK, headers, Json(body)).into_response()
}

/// Map a credential error to a status. Internal detail stays in the logs.
pub(crate) fn error_response(err: &CredentialError) -> Response {
    match err.kind() {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        ErrorKind::Authentication => {
            (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()).into_response()
        }
        ErrorKind::Conflict => (
            StatusCode::CONFLICT,
            "Credential was rotated concurrently".to_string(),
        )
            .into_response(),
        ErrorKind::Internal => {
            error!("Credential operation failed: {err:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
                .into_response()
        }
    }
}
