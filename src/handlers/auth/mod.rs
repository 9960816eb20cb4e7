pub mod password;
pub mod session;

pub use password::{change_password, confirm_password_reset, request_password_reset};
pub use session::{login, logout, refresh, verify};
