/// Authentication Routes
///
/// Thin HTTP binding over `AuthService`: login, token refresh, logout, and
/// introspection of the caller's current access token.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, Claims};
use crate::domain::TokenOrigin;
use crate::error::{AppError, ErrorContext};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub account_id: String,
    pub username: String,
    pub expires_at: Option<String>,
}

/// POST /auth/login
///
/// # Errors
/// - 400: blank username or password
/// - 401: unknown user, wrong password, or inactive account (one response for all)
/// - 500/503: storage failure
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("login");

    let result = service
        .authenticate(&form.username, &form.password, &token_origin(&req))
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /auth/refresh
///
/// Rotates the presented refresh token. The old token is dead after this call
/// whether or not the client receives the response.
pub async fn refresh(
    req: HttpRequest,
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let result = service
        .refresh(&form.refresh_token, &token_origin(&req))
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /auth/logout
///
/// Always 204 for a non-blank token, known or not.
pub async fn logout(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    service.revoke(&form.refresh_token).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/session
///
/// Claims are injected by `JwtMiddleware`.
pub async fn current_session(claims: web::ReqData<Claims>) -> Result<HttpResponse, AppError> {
    let account_id = claims.account_id()?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        account_id: account_id.to_string(),
        username: claims.name.clone(),
        expires_at: claims.expires_at().map(|at| at.to_rfc3339()),
    }))
}

fn token_origin(req: &HttpRequest) -> TokenOrigin {
    let ip = req.peer_addr().map(|addr| addr.ip().to_string());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    TokenOrigin::new(ip, user_agent)
}
