use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use constant_time_eq::constant_time_eq;
use std::sync::Arc;

use crate::infrastructure::config::Config;
use crate::{
    domain::auth::{Caller, JwtManager},
    error::AppError,
};

/// Authentication middleware.
///
/// The bearer token is either the internal service token, which marks a
/// trusted backend caller, or a user access token. The resolved `Caller`
/// is injected into request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<Config>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    // Check Bearer token format
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?;

    let caller = resolve_caller(&config, token)?;

    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

fn resolve_caller(config: &Config, token: &str) -> Result<Caller, AppError> {
    if let Some(service_token) = config.internal_service_token.as_deref() {
        if is_service_token(token, service_token) {
            return Ok(Caller::Internal);
        }
    }

    let jwt_manager = JwtManager::new(config.jwt_secret.clone());
    let user_id = jwt_manager.extract_user_id(token)?;

    Ok(Caller::User { user_id })
}

fn is_service_token(token: &str, service_token: &str) -> bool {
    let (token, service_token) = (token.as_bytes(), service_token.as_bytes());
    token.len() == service_token.len() && constant_time_eq(token, service_token)
}
