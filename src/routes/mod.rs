mod auth;
mod dictionary;
mod health_check;
mod users;

pub use auth::{
    change_password, get_current_user, login, logout, logout_all, refresh, register,
    AccessTokenResponse, UserResponse, REFRESH_COOKIE, REFRESH_COOKIE_PATH,
};
pub use dictionary::{
    create_word, create_word_group, delete_word, delete_word_group, find_word, get_word_group,
    list_word_groups, update_word, update_word_group,
};
pub use health_check::health_check;
pub use users::{set_user_ban, set_user_role};
