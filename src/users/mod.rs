/// Users module
///
/// User model and its persistence seam.

mod models;
mod repository;

pub use models::{User, UserRecord, UserRole, UserStatus};
pub use repository::{InMemoryUserRepository, PgUserRepository, UserRepository};
