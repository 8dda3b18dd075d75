pub mod authenticate_session;
pub mod login;
pub mod logout;
pub mod signup;
