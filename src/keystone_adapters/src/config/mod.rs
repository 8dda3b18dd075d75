pub mod constants;
pub mod settings;

pub use constants::*;
pub use settings::{
    DatabaseSettings, Environment, LoggingSettings, PasswordHashingSettings, RepositorySettings,
    SessionSettings, Settings,
};
