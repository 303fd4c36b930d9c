/// Authentication Routes
///
/// Cookie transport for the session core. The refresh token only ever travels
/// in the `refresh_token` cookie; response bodies carry the access token.

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthCoordinator, AuthTokens, Claims};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::users::{User, UserRole, UserStatus};
use crate::validators::{validate_login, validate_password_change, validate_registration};

pub const REFRESH_COOKIE: &str = "refresh_token";
/// Cookie scope: every API route, nothing else on the origin
pub const REFRESH_COOKIE_PATH: &str = "/api";

/// Missing fields deserialize as empty strings so validation can name them
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirm: String,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            role: user.role,
            status: user.status,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

fn refresh_cookie(value: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, value)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(time::Duration::seconds(max_age_seconds))
        .finish()
}

fn expired_refresh_cookie() -> Cookie<'static> {
    let mut cookie = refresh_cookie(String::new(), 0);
    cookie.make_removal();
    cookie
}

fn presented_refresh_token(req: &HttpRequest) -> String {
    req.cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default()
}

/// Body with the access token, cookie with the refresh token
fn token_response(
    mut builder: actix_web::HttpResponseBuilder,
    tokens: AuthTokens,
    coordinator: &AuthCoordinator,
) -> HttpResponse {
    builder
        .cookie(refresh_cookie(
            tokens.refresh,
            coordinator.refresh_ttl().num_seconds(),
        ))
        .json(AccessTokenResponse {
            access_token: tokens.access,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        })
}

/// POST /api/auth/registration
///
/// # Errors
/// - 400: offending fields listed in `fields`
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let email = validate_registration(&form.email, &form.password, &form.password_confirm)?;

    let tokens = coordinator.register(&email, &form.password).await?;

    context.log_success("Registration completed");
    Ok(token_response(HttpResponse::Created(), tokens, &coordinator))
}

/// POST /api/auth/login
///
/// # Errors
/// - 401: one message for unknown email, wrong password and inactive account
pub async fn login(
    form: web::Json<LoginRequest>,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let email = validate_login(&form.email, &form.password)?;

    let tokens = coordinator.login(&email, &form.password).await?;

    context.log_success("Login completed");
    Ok(token_response(HttpResponse::Ok(), tokens, &coordinator))
}

/// POST /api/auth/refresh
///
/// Rotates the cookie's refresh token.
///
/// # Errors
/// - 401: cookie missing, or token unknown, expired, revoked or reused
pub async fn refresh(
    req: HttpRequest,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    let presented = presented_refresh_token(&req);

    let tokens = coordinator.refresh(&presented).await?;

    context.log_success("Token refresh completed");
    Ok(token_response(HttpResponse::Ok(), tokens, &coordinator))
}

/// POST /api/auth/logout
///
/// Ends the session behind the cookie. Always succeeds.
pub async fn logout(
    req: HttpRequest,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    coordinator.revoke(&presented_refresh_token(&req)).await?;

    Ok(HttpResponse::NoContent()
        .cookie(expired_refresh_cookie())
        .finish())
}

/// POST /api/auth/logout-all
///
/// **Requires a valid access token.** Ends every session of the caller.
pub async fn logout_all(
    claims: web::ReqData<Claims>,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("logout_all").with_user_id(user_id.to_string());

    coordinator.logout(user_id).await?;

    context.log_success("Logout everywhere completed");
    Ok(HttpResponse::NoContent()
        .cookie(expired_refresh_cookie())
        .finish())
}

/// POST /api/auth/password
///
/// **Requires a valid access token.** Every other session is ended; the
/// caller gets a fresh pair.
///
/// # Errors
/// - 400: offending fields listed in `fields`
/// - 401: current password does not match
pub async fn change_password(
    claims: web::ReqData<Claims>,
    form: web::Json<ChangePasswordRequest>,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("password_change").with_user_id(user_id.to_string());
    validate_password_change(
        &form.current_password,
        &form.new_password,
        &form.new_password_confirm,
    )?;

    let tokens = coordinator
        .change_password(user_id, &form.current_password, &form.new_password)
        .await?;

    context.log_success("Password change completed");
    Ok(token_response(HttpResponse::Ok(), tokens, &coordinator))
}

/// GET /api/auth/me
///
/// **Requires a valid access token.**
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let user = coordinator
        .credentials()
        .find_by_id(claims.user_id()?)
        .await?
        .ok_or(AppError::Auth(AuthError::TokenInvalid))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("value".to_string(), 864_000);

        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.value(), "value");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/api"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(864_000)));
    }

    #[test]
    fn test_expired_cookie_clears_value() {
        let cookie = expired_refresh_cookie();

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(cookie.path(), Some("/api"));
    }

    #[test]
    fn test_register_request_accepts_camel_case() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@x.com","password":"pw1","passwordConfirm":"pw1"}"#,
        )
        .unwrap();
        assert_eq!(req.password_confirm, "pw1");

        let missing: RegisterRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert!(missing.password.is_empty());
    }
}
