pub mod auth;
pub mod logs;
pub mod system;
