pub mod handler;
pub mod types;

pub use handler::{handle_login, handle_logout, handle_validate_session};
pub use types::{LoginRequest, LoginResponse, LogoutResponse, ValidateSessionRequest, ValidateSessionResponse};
