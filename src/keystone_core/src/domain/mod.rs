pub mod email;
pub mod password;
pub mod session;
pub mod session_token;
pub mod user;
