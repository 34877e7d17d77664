pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod messages;
pub mod models;
pub mod router;
pub mod services;
pub mod store;
pub mod targets;
pub mod token;
pub mod triggers;

#[cfg(test)]
pub mod test_support;

pub use config::Config;
pub use error::CognitoError;

use std::sync::Arc;

/// Shared application state: the collaborator graph every operation
/// handler works against, assembled once at startup.
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn services::Clock>,
    pub otp: Arc<dyn services::OtpGenerator>,
    pub cognito: services::CognitoService,
    pub triggers: Arc<triggers::Triggers>,
    pub messages: messages::Messages,
    pub tokens: token::TokenGenerator,
}

pub type SharedState = Arc<AppState>;
