pub mod context;
pub mod domain;
pub mod ports;

// Re-export commonly used types for convenience
pub use context::RequestContext;

pub use domain::{
    email::Email,
    password::{MIN_PASSWORD_LENGTH, Password},
    session::{SessionState, UserSession},
    session_token::{SESSION_TOKEN_LENGTH, SessionToken, SessionTokenError},
    user::{AuthProvider, User, UserAuth, UserError},
};

pub use ports::{
    repositories::{BoxError, CreateUserArgs, CreateUserSessionArgs, UserStore, UserStoreError},
    services::{EmailClient, EmailClientError},
};
