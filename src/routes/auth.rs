use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, services::auth_service::bearer_token, state::SharedState};

/// Reject requests without a valid `Authorization: Bearer` token and attach the
/// authenticated operator to the request extensions.
pub async fn require_operator(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let user = state.authenticator().authenticate(&token).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
