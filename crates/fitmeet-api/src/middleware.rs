use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::TypedHeaderRejection;
use tracing::debug;

use crate::auth::{AppState, verify_token};
use crate::error::ApiError;

/// Extract and validate JWT from Authorization header.
///
/// On success the `Claims` are available to handlers as
/// `Extension<Claims>`.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| ApiError::Unauthenticated)?;

    let claims = verify_token(&state.jwt_secret, bearer.token()).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthenticated
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
