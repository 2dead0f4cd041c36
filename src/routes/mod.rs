mod auth;
mod health_check;
mod users;

pub use auth::{get_current_user, login, logout, refresh, register};
pub use health_check::health_check;
pub use users::{create_user, delete_user, get_user, update_user};
