use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Legacy header used by older web clients instead of `Authorization`.
pub const LEGACY_TOKEN_HEADER: &str = "token";

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let user = validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    if let Some(auth_header) = headers.get("Authorization") {
        let auth_value = auth_header
            .to_str()
            .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

        return auth_value
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
            .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()));
    }

    headers
        .get(LEGACY_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Not Authorized. Login Again".to_string()))
}

/// `axum::Json` whose rejections answer with the typed error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Path` whose rejections answer with the typed error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

/// Patient id of the authenticated caller.
pub fn patient_id(user: &User) -> Result<Uuid, AppError> {
    user.patient_id()
        .ok_or_else(|| AppError::Auth("Token subject is not a patient id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_prefers_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(LEGACY_TOKEN_HEADER, HeaderValue::from_static("legacy"));

        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_accepts_legacy_header() {
        let mut headers = HeaderMap::new();
        headers.insert(LEGACY_TOKEN_HEADER, HeaderValue::from_static("abc.def.ghi"));

        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_missing() {
        let headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AppError::Auth(_))));

        let mut basic = HeaderMap::new();
        basic.insert("Authorization", HeaderValue::from_static("Basic xyz"));
        assert!(matches!(bearer_token(&basic), Err(AppError::Auth(_))));
    }
}
