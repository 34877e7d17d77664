//! Typed façade over the user-supplied hooks.
//!
//! One method per supported hook. Each adapts ergonomic caller arguments
//! (attribute lists, option maps) into the structured envelope external
//! code expects, invokes it through the [`Lambda`] seam, and decodes the
//! hook's `response` into a typed outcome.

pub mod events;
pub mod lambda;

pub use events::{CognitoUserPoolEvent, TriggerName, TriggerSource};
pub use lambda::{Lambda, LambdaClient};

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::{AttributeType, User, UserStatus};
use crate::services::clock::Clock;

/// What a PreSignUp hook may decide about the new user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreSignUpOutcome {
    pub auto_confirm_user: bool,
    pub auto_verify_email: bool,
    pub auto_verify_phone: bool,
}

/// Message bodies a CustomMessage hook may supply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomMessageOutcome {
    pub sms_message: Option<String>,
    pub email_message: Option<String>,
    pub email_subject: Option<String>,
}

/// Claim overrides a PreTokenGeneration hook may request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimsOverrideDetails {
    pub claims_to_add_or_override: Map<String, Value>,
    pub claims_to_suppress: Vec<String>,
}

pub struct Triggers {
    lambda: Arc<dyn Lambda>,
    clock: Arc<dyn Clock>,
}

impl Triggers {
    pub fn new(lambda: Arc<dyn Lambda>, clock: Arc<dyn Clock>) -> Self {
        Self { lambda, clock }
    }

    pub fn enabled(&self, trigger: TriggerName) -> bool {
        self.lambda.enabled(trigger)
    }

    pub async fn pre_sign_up(
        &self,
        ctx: &Context,
        source: TriggerSource,
        client_id: &str,
        user_pool_id: &str,
        username: &str,
        user_attributes: &[AttributeType],
        validation_data: Option<&Map<String, Value>>,
        client_metadata: Option<&Map<String, Value>>,
    ) -> Result<PreSignUpOutcome, CognitoError> {
        let mut request = Map::new();
        request.insert(
            "userAttributes".into(),
            crate::models::attributes_to_map(user_attributes).into(),
        );
        if let Some(data) = validation_data {
            request.insert("validationData".into(), data.clone().into());
        }
        if let Some(metadata) = client_metadata {
            request.insert("clientMetadata".into(), metadata.clone().into());
        }

        let event =
            CognitoUserPoolEvent::new(source, client_id, user_pool_id, username, request.into());
        let response = self.lambda.invoke(ctx, TriggerName::PreSignUp, event).await?;

        Ok(decode_outcome(response))
    }

    pub async fn post_confirmation(
        &self,
        ctx: &Context,
        source: TriggerSource,
        client_id: &str,
        user_pool_id: &str,
        username: &str,
        user_attributes: &[AttributeType],
        client_metadata: Option<&Map<String, Value>>,
    ) -> Result<(), CognitoError> {
        let mut request = Map::new();
        request.insert(
            "userAttributes".into(),
            crate::models::attributes_to_map(user_attributes).into(),
        );
        if let Some(metadata) = client_metadata {
            request.insert("clientMetadata".into(), metadata.clone().into());
        }

        let event =
            CognitoUserPoolEvent::new(source, client_id, user_pool_id, username, request.into());
        self.lambda
            .invoke(ctx, TriggerName::PostConfirmation, event)
            .await?;
        Ok(())
    }

    pub async fn post_authentication(
        &self,
        ctx: &Context,
        client_id: &str,
        user_pool_id: &str,
        username: &str,
        user_attributes: &[AttributeType],
        client_metadata: Option<&Map<String, Value>>,
    ) -> Result<(), CognitoError> {
        let mut request = Map::new();
        request.insert(
            "userAttributes".into(),
            crate::models::attributes_to_map(user_attributes).into(),
        );
        request.insert("newDeviceUsed".into(), false.into());
        if let Some(metadata) = client_metadata {
            request.insert("clientMetadata".into(), metadata.clone().into());
        }

        let event = CognitoUserPoolEvent::new(
            TriggerSource::PostAuthenticationAuthentication,
            client_id,
            user_pool_id,
            username,
            request.into(),
        );
        self.lambda
            .invoke(ctx, TriggerName::PostAuthentication, event)
            .await?;
        Ok(())
    }

    /// Invoke UserMigration and build the migrated user record from its
    /// response. The caller persists it.
    pub async fn user_migration(
        &self,
        ctx: &Context,
        source: TriggerSource,
        client_id: &str,
        user_pool_id: &str,
        username: &str,
        password: &str,
        validation_data: Option<&Map<String, Value>>,
        client_metadata: Option<&Map<String, Value>>,
    ) -> Result<User, CognitoError> {
        let mut request = Map::new();
        request.insert("password".into(), password.into());
        if let Some(data) = validation_data {
            request.insert("validationData".into(), data.clone().into());
        }
        if let Some(metadata) = client_metadata {
            request.insert("clientMetadata".into(), metadata.clone().into());
        }

        let event =
            CognitoUserPoolEvent::new(source, client_id, user_pool_id, username, request.into());
        let response = self
            .lambda
            .invoke(ctx, TriggerName::UserMigration, event)
            .await?;

        #[derive(Default, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        struct MigrationOutcome {
            user_attributes: Map<String, Value>,
            final_user_status: Option<UserStatus>,
        }

        let outcome: MigrationOutcome = decode_outcome(response);

        let mut attributes: Vec<AttributeType> = outcome
            .user_attributes
            .iter()
            .map(|(name, value)| {
                AttributeType::new(name.clone(), value.as_str().unwrap_or_default())
            })
            .collect();
        if crate::models::attribute_value(&attributes, "sub").is_none() {
            attributes.insert(0, AttributeType::new("sub", uuid::Uuid::new_v4().to_string()));
        }

        let now = self.clock.now();
        Ok(User {
            username: username.to_string(),
            password: password.to_string(),
            attributes,
            user_status: outcome.final_user_status.unwrap_or(UserStatus::Confirmed),
            enabled: true,
            mfa_options: vec![],
            confirmation_code: None,
            mfa_code: None,
            attribute_verification_code: None,
            refresh_tokens: vec![],
            user_create_date: now,
            user_last_modified_date: now,
        })
    }

    pub async fn custom_message(
        &self,
        ctx: &Context,
        source: TriggerSource,
        client_id: &str,
        user_pool_id: &str,
        username: &str,
        user_attributes: &[AttributeType],
        client_metadata: Option<&Map<String, Value>>,
    ) -> Result<CustomMessageOutcome, CognitoError> {
        let mut request = Map::new();
        request.insert(
            "userAttributes".into(),
            crate::models::attributes_to_map(user_attributes).into(),
        );
        request.insert("codeParameter".into(), "{####}".into());
        request.insert("usernameParameter".into(), "{username}".into());
        if let Some(metadata) = client_metadata {
            request.insert("clientMetadata".into(), metadata.clone().into());
        }

        let event =
            CognitoUserPoolEvent::new(source, client_id, user_pool_id, username, request.into());
        let response = self
            .lambda
            .invoke(ctx, TriggerName::CustomMessage, event)
            .await?;

        Ok(decode_outcome(response))
    }

    pub async fn pre_token_generation(
        &self,
        ctx: &Context,
        source: TriggerSource,
        client_id: &str,
        user_pool_id: &str,
        username: &str,
        user_attributes: &[AttributeType],
        client_metadata: Option<&Map<String, Value>>,
    ) -> Result<ClaimsOverrideDetails, CognitoError> {
        let mut request = Map::new();
        request.insert(
            "userAttributes".into(),
            crate::models::attributes_to_map(user_attributes).into(),
        );
        request.insert("groupConfiguration".into(), Value::Object(Map::new()));
        if let Some(metadata) = client_metadata {
            request.insert("clientMetadata".into(), metadata.clone().into());
        }

        let event =
            CognitoUserPoolEvent::new(source, client_id, user_pool_id, username, request.into());
        let response = self
            .lambda
            .invoke(ctx, TriggerName::PreTokenGeneration, event)
            .await?;

        #[derive(Default, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        struct Wrapper {
            claims_override_details: ClaimsOverrideDetails,
        }

        let wrapper: Wrapper = decode_outcome(response);
        Ok(wrapper.claims_override_details)
    }
}

/// Hooks are free to omit the response body or individual fields; absent
/// or malformed pieces fall back to defaults rather than failing the flow.
fn decode_outcome<T: Default + serde::de::DeserializeOwned>(response: Value) -> T {
    serde_json::from_value(response).unwrap_or_default()
}
