/// Account administration routes
///
/// Every handler here sits behind `RequireRole` with the admin role, which
/// leaves the acting `User` in request extensions.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::AuthCoordinator;
use crate::error::{AppError, ErrorContext, ValidationErrors};
use crate::routes::UserResponse;
use crate::users::User;
use crate::validators::{parse_id, parse_role};

#[derive(Deserialize)]
pub struct BanRequest {
    #[serde(default)]
    pub banned: Option<bool>,
}

#[derive(Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub role: String,
}

/// PUT /api/users/{user_id}/ban
///
/// **Admin only.** `{"banned": true}` bans the account and ends all of its
/// sessions; `false` makes it active again.
///
/// # Errors
/// - 400: bad id or missing `banned`
/// - 404: no such user
pub async fn set_user_ban(
    admin: web::ReqData<User>,
    path: web::Path<String>,
    form: web::Json<BanRequest>,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_ban").with_user_id(admin.id.to_string());
    let user_id = parse_id("userId", &path)?;
    let banned = form
        .banned
        .ok_or_else(|| ValidationErrors::single("banned", "Banned is required"))?;

    let user = coordinator.set_banned(user_id, banned).await?;

    tracing::info!(target_user = %user.id, banned, "Account status changed by admin");
    context.log_success("User ban updated");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// PUT /api/users/{user_id}/role
///
/// **Admin only.**
///
/// # Errors
/// - 400: bad id or unknown role
/// - 404: no such user
pub async fn set_user_role(
    admin: web::ReqData<User>,
    path: web::Path<String>,
    form: web::Json<RoleRequest>,
    coordinator: web::Data<AuthCoordinator>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_role").with_user_id(admin.id.to_string());
    let user_id = parse_id("userId", &path)?;
    let role = parse_role(&form.role)?;

    let user = coordinator.set_role(user_id, role).await?;

    tracing::info!(target_user = %user.id, role = role.as_str(), "Role changed by admin");
    context.log_success("User role updated");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_request_without_flag() {
        let req: BanRequest = serde_json::from_str("{}").unwrap();
        assert!(req.banned.is_none());

        let req: BanRequest = serde_json::from_str(r#"{"banned":false}"#).unwrap();
        assert_eq!(req.banned, Some(false));
    }
}
