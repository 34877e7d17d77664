use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::triggers::TriggerName;

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Storage ─────────────────────────────────────────────────────────
    /// Directory holding one JSON file per user pool plus the shared
    /// clients file.
    pub data_dir: PathBuf,

    // ── Tokens ──────────────────────────────────────────────────────────
    /// Host part of the `iss` claim; the pool id is appended per token.
    pub token_issuer_host: String,

    // ── Triggers ────────────────────────────────────────────────────────
    /// Base URL of the local function host the invoker POSTs to.
    pub lambda_endpoint: String,
    pub pre_sign_up_function: Option<String>,
    pub post_confirmation_function: Option<String>,
    pub post_authentication_function: Option<String>,
    pub user_migration_function: Option<String>,
    pub custom_message_function: Option<String>,
    pub pre_token_generation_function: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "9229".into())
                .parse()
                .context("Invalid PORT")?,

            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| ".userpool-local".into())
                .into(),

            token_issuer_host: std::env::var("TOKEN_ISSUER_HOST")
                .unwrap_or_else(|_| "http://localhost:9229".into()),

            lambda_endpoint: std::env::var("LAMBDA_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:3002".into()),
            pre_sign_up_function: std::env::var("TRIGGER_PRE_SIGN_UP").ok(),
            post_confirmation_function: std::env::var("TRIGGER_POST_CONFIRMATION").ok(),
            post_authentication_function: std::env::var("TRIGGER_POST_AUTHENTICATION").ok(),
            user_migration_function: std::env::var("TRIGGER_USER_MIGRATION").ok(),
            custom_message_function: std::env::var("TRIGGER_CUSTOM_MESSAGE").ok(),
            pre_token_generation_function: std::env::var("TRIGGER_PRE_TOKEN_GENERATION").ok(),
        })
    }

    /// The configured hook functions, keyed the way the invoker looks
    /// them up.
    pub fn trigger_functions(&self) -> HashMap<TriggerName, String> {
        let mut functions = HashMap::new();
        let entries = [
            (TriggerName::PreSignUp, &self.pre_sign_up_function),
            (TriggerName::PostConfirmation, &self.post_confirmation_function),
            (
                TriggerName::PostAuthentication,
                &self.post_authentication_function,
            ),
            (TriggerName::UserMigration, &self.user_migration_function),
            (TriggerName::CustomMessage, &self.custom_message_function),
            (
                TriggerName::PreTokenGeneration,
                &self.pre_token_generation_function,
            ),
        ];
        for (trigger, function) in entries {
            if let Some(name) = function {
                functions.insert(trigger, name.clone());
            }
        }
        functions
    }
}

impl Default for Config {
    /// Defaults used by tests; `main` always goes through `from_env`.
    fn default() -> Self {
        Config {
            host: "127.0.0.1".into(),
            port: 9229,
            data_dir: ".userpool-local".into(),
            token_issuer_host: "http://localhost:9229".into(),
            lambda_endpoint: "http://localhost:3002".into(),
            pre_sign_up_function: None,
            post_confirmation_function: None,
            post_authentication_function: None,
            user_migration_function: None,
            custom_message_function: None,
            pre_token_generation_function: None,
        }
    }
}
