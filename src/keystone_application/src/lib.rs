pub mod background;
pub mod use_cases;
pub mod user_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use background::BackgroundTasks;
pub use use_cases::{
    authenticate_session::{AuthenticateSessionUseCase, SessionError},
    login::{LoginError, LoginUseCase},
    logout::{LogoutError, LogoutUseCase},
    signup::{SignupError, SignupUseCase},
};
pub use user_service::UserService;
