//! Identity extractors.
//!
//! Authentication happens upstream. Customers arrive with the identity
//! headers set by the authenticator; staff present the admin bearer token.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::Redirect;
use common::{CustomerId, SessionId};
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the authenticated customer's id.
pub const CUSTOMER_HEADER: &str = "x-customer-id";

/// Header carrying the browser session id. Defaults to the customer id.
pub const SESSION_HEADER: &str = "x-session-id";

/// The customer making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentCustomer {
    pub customer_id: CustomerId,
    pub session_id: SessionId,
}

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for CurrentCustomer {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(customer_id) = header_uuid(parts, CUSTOMER_HEADER).map(CustomerId::from_uuid)
        else {
            tracing::debug!(uri = %parts.uri, "anonymous request, redirecting to login");
            return Err(login_redirect(&state.login_url, &parts.uri));
        };

        let session_id = header_uuid(parts, SESSION_HEADER)
            .map(SessionId::from_uuid)
            .unwrap_or_else(|| SessionId::from(customer_id));

        Ok(Self {
            customer_id,
            session_id,
        })
    }
}

/// A staff member authenticated with the admin token.
#[derive(Debug, Clone, Copy)]
pub struct StaffMember;

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for StaffMember {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            tracing::warn!(uri = %parts.uri, "staff route called but no admin token is configured");
            return Err(ApiError::Unauthorized);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if token == expected => Ok(StaffMember),
            _ => {
                tracing::warn!(uri = %parts.uri, "staff authentication failed");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Option<Uuid> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

/// `303 See Other` to the login page, asking it to come back to `uri`.
pub fn login_redirect(login_url: &str, uri: &axum::http::Uri) -> Redirect {
    let next = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    // Slashes stay readable in the login URL
    let next = urlencoding::encode(next).replace("%2F", "/");
    Redirect::to(&format!("{login_url}?next={next}"))
}
