/// Middleware module
///
/// Bearer-token authentication for protected routes, and the role check
/// layered behind it.

mod jwt_middleware;
mod role_middleware;

pub use jwt_middleware::JwtMiddleware;
pub use role_middleware::RequireRole;
