//! # Keystone - user and session identity core
//!
//! Facade over the workspace crates. Depend on this crate alone to get the
//! domain types, the store port, the use cases and the ready-made adapters.
//!
//! ## Structure
//!
//! - **Domain**: `Email`, `Password`, `User`, `UserSession`, `SessionToken`
//! - **Context**: `RequestContext` carries the correlation id, client IP and
//!   session token into every log line of a request
//! - **Ports**: `UserStore`, `EmailClient`
//! - **Use cases**: signup, login, logout and session authentication, composed
//!   by `UserService`
//! - **Adapters**: `PostgresUserStore`, `HashMapUserStore`, settings, telemetry
//! - **Service**: `Keystone` wires everything from `Settings`

// ============================================================================
// Core Domain Types
// ============================================================================

/// Core domain types, request context and ports
pub mod core {
    pub use keystone_core::*;
}

pub use keystone_core::{
    AuthProvider, Email, Password, RequestContext, SessionState, SessionToken, User, UserAuth,
    UserError, UserSession,
};

// ============================================================================
// Ports
// ============================================================================

pub use keystone_core::{
    CreateUserArgs, CreateUserSessionArgs, EmailClient, EmailClientError, UserStore,
    UserStoreError,
};

// ============================================================================
// Use Cases (Application Layer)
// ============================================================================

/// Application use cases and the background task supervisor
pub mod application {
    pub use keystone_application::*;
}

pub use keystone_application::{
    BackgroundTasks, LoginError, LogoutError, SessionError, SignupError, UserService,
};

// ============================================================================
// Adapters (Infrastructure)
// ============================================================================

/// Infrastructure adapters
pub mod adapters {
    pub use keystone_adapters::{config, db, email, password_hashing, persistence, telemetry};
}

pub use keystone_adapters::{
    Argon2PasswordHasher, HashMapUserStore, PostgresUserStore, Settings, TracingEmailClient,
};

// ============================================================================
// Service (Main Entry Point)
// ============================================================================

pub use keystone_service::{InMemoryKeystone, Keystone, PostgresKeystone, bootstrap};

// ============================================================================
// Re-export common external dependencies
// ============================================================================

/// Re-export async-trait for implementing the ports
pub use async_trait::async_trait;

/// Re-export secrecy for working with secrets
pub use secrecy::{ExposeSecret, Secret};
