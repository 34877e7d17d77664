//! Event envelopes for user-supplied hooks.
//!
//! External hook code sees exactly this wire shape, so field names and the
//! hard-coded `version`/`region` literals are part of the contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The hook kinds a pool can configure, keyed by name in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerName {
    PreSignUp,
    PostConfirmation,
    PostAuthentication,
    UserMigration,
    CustomMessage,
    PreTokenGeneration,
}

impl TriggerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerName::PreSignUp => "PreSignUp",
            TriggerName::PostConfirmation => "PostConfirmation",
            TriggerName::PostAuthentication => "PostAuthentication",
            TriggerName::UserMigration => "UserMigration",
            TriggerName::CustomMessage => "CustomMessage",
            TriggerName::PreTokenGeneration => "PreTokenGeneration",
        }
    }
}

/// Every trigger-source string the service can synthesize. The
/// `triggerSource` field of an envelope is always one of these; callers
/// pick the variant matching the flow they are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    PreSignUpSignUp,
    PreSignUpAdminCreateUser,
    PostConfirmationConfirmSignUp,
    PostConfirmationConfirmForgotPassword,
    PostAuthenticationAuthentication,
    UserMigrationAuthentication,
    UserMigrationForgotPassword,
    CustomMessageSignUp,
    CustomMessageAdminCreateUser,
    CustomMessageResendCode,
    CustomMessageForgotPassword,
    CustomMessageUpdateUserAttribute,
    CustomMessageVerifyUserAttribute,
    CustomMessageAuthentication,
    TokenGenerationAuthentication,
    TokenGenerationNewPasswordChallenge,
    TokenGenerationRefreshTokens,
    TokenGenerationHostedAuth,
    TokenGenerationAuthenticateDevice,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::PreSignUpSignUp => "PreSignUp_SignUp",
            TriggerSource::PreSignUpAdminCreateUser => "PreSignUp_AdminCreateUser",
            TriggerSource::PostConfirmationConfirmSignUp => "PostConfirmation_ConfirmSignUp",
            TriggerSource::PostConfirmationConfirmForgotPassword => {
                "PostConfirmation_ConfirmForgotPassword"
            }
            TriggerSource::PostAuthenticationAuthentication => "PostAuthentication_Authentication",
            TriggerSource::UserMigrationAuthentication => "UserMigration_Authentication",
            TriggerSource::UserMigrationForgotPassword => "UserMigration_ForgotPassword",
            TriggerSource::CustomMessageSignUp => "CustomMessage_SignUp",
            TriggerSource::CustomMessageAdminCreateUser => "CustomMessage_AdminCreateUser",
            TriggerSource::CustomMessageResendCode => "CustomMessage_ResendCode",
            TriggerSource::CustomMessageForgotPassword => "CustomMessage_ForgotPassword",
            TriggerSource::CustomMessageUpdateUserAttribute => "CustomMessage_UpdateUserAttribute",
            TriggerSource::CustomMessageVerifyUserAttribute => "CustomMessage_VerifyUserAttribute",
            TriggerSource::CustomMessageAuthentication => "CustomMessage_Authentication",
            TriggerSource::TokenGenerationAuthentication => "TokenGeneration_Authentication",
            TriggerSource::TokenGenerationNewPasswordChallenge => {
                "TokenGeneration_NewPasswordChallenge"
            }
            TriggerSource::TokenGenerationRefreshTokens => "TokenGeneration_RefreshTokens",
            TriggerSource::TokenGenerationHostedAuth => "TokenGeneration_HostedAuth",
            TriggerSource::TokenGenerationAuthenticateDevice => {
                "TokenGeneration_AuthenticateDevice"
            }
        }
    }

    /// The hook kind this source belongs to.
    pub fn trigger(&self) -> TriggerName {
        match self {
            TriggerSource::PreSignUpSignUp | TriggerSource::PreSignUpAdminCreateUser => {
                TriggerName::PreSignUp
            }
            TriggerSource::PostConfirmationConfirmSignUp
            | TriggerSource::PostConfirmationConfirmForgotPassword => TriggerName::PostConfirmation,
            TriggerSource::PostAuthenticationAuthentication => TriggerName::PostAuthentication,
            TriggerSource::UserMigrationAuthentication
            | TriggerSource::UserMigrationForgotPassword => TriggerName::UserMigration,
            TriggerSource::CustomMessageSignUp
            | TriggerSource::CustomMessageAdminCreateUser
            | TriggerSource::CustomMessageResendCode
            | TriggerSource::CustomMessageForgotPassword
            | TriggerSource::CustomMessageUpdateUserAttribute
            | TriggerSource::CustomMessageVerifyUserAttribute
            | TriggerSource::CustomMessageAuthentication => TriggerName::CustomMessage,
            TriggerSource::TokenGenerationAuthentication
            | TriggerSource::TokenGenerationNewPasswordChallenge
            | TriggerSource::TokenGenerationRefreshTokens
            | TriggerSource::TokenGenerationHostedAuth
            | TriggerSource::TokenGenerationAuthenticateDevice => TriggerName::PreTokenGeneration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerContext {
    pub aws_sdk_version: String,
    pub client_id: String,
}

/// The envelope handed to external hook code, and received back from it
/// with a populated `response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitoUserPoolEvent {
    pub version: String,
    pub trigger_source: String,
    pub region: String,
    pub user_pool_id: String,
    pub user_name: String,
    pub caller_context: CallerContext,
    pub request: Value,
    pub response: Value,
}

impl CognitoUserPoolEvent {
    /// Total constructor: every synthesized envelope goes through here, so
    /// the version and region literals have one home.
    pub fn new(
        source: TriggerSource,
        client_id: &str,
        user_pool_id: &str,
        username: &str,
        request: Value,
    ) -> Self {
        Self {
            version: "0".into(),
            trigger_source: source.as_str().into(),
            region: "local".into(),
            user_pool_id: user_pool_id.into(),
            user_name: username.into(),
            caller_context: CallerContext {
                aws_sdk_version: "local".into(),
                client_id: client_id.into(),
            },
            request,
            response: Value::Object(Default::default()),
        }
    }
}
