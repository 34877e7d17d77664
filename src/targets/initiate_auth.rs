//! The sign-in surface: InitiateAuth, AdminInitiateAuth and the challenge
//! continuations consumed through RespondToAuthChallenge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::Context;
use crate::error::CognitoError;
use crate::messages::MessageSource;
use crate::models::{attributes_to_map, DeliveryDetails, DeliveryMedium, MfaConfiguration, User, UserStatus};
use crate::services::UserPoolService;
use crate::token::AuthenticationResult;
use crate::triggers::{TriggerName, TriggerSource};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthRequest {
    pub client_id: String,
    pub auth_flow: String,
    #[serde(default)]
    pub auth_parameters: HashMap<String, String>,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminInitiateAuthRequest {
    pub user_pool_id: String,
    pub client_id: String,
    pub auth_flow: String,
    #[serde(default)]
    pub auth_parameters: HashMap<String, String>,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RespondToAuthChallengeRequest {
    pub client_id: String,
    pub challenge_name: String,
    #[serde(default)]
    pub challenge_responses: HashMap<String, String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

/// Shared response shape for the whole sign-in surface: either a challenge
/// continuation or an `AuthenticationResult`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_parameters: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_result: Option<AuthenticationResult>,
}

pub async fn initiate_auth(
    state: &AppState,
    ctx: &Context,
    req: InitiateAuthRequest,
) -> Result<InitiateAuthResponse, CognitoError> {
    match req.auth_flow.as_str() {
        "USER_PASSWORD_AUTH" => {
            let pool = state
                .cognito
                .get_user_pool_for_client_id(ctx, &req.client_id)
                .await?;
            password_auth(
                state,
                ctx,
                &pool,
                &req.client_id,
                &req.auth_parameters,
                req.client_metadata.as_ref(),
                true,
            )
            .await
        }
        "REFRESH_TOKEN" | "REFRESH_TOKEN_AUTH" => {
            let token = require_parameter(&req.auth_parameters, "REFRESH_TOKEN")?.to_string();
            let pool = state
                .cognito
                .get_user_pool_for_client_id(ctx, &req.client_id)
                .await?;
            refresh_token_auth(
                state,
                ctx,
                &pool,
                &req.client_id,
                &token,
                req.client_metadata.as_ref(),
            )
            .await
        }
        flow => Err(CognitoError::Unsupported(format!("AuthFlow {flow}"))),
    }
}

pub async fn admin_initiate_auth(
    state: &AppState,
    ctx: &Context,
    req: AdminInitiateAuthRequest,
) -> Result<InitiateAuthResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    state
        .cognito
        .get_app_client(ctx, &req.client_id)
        .await?
        .filter(|c| c.user_pool_id == req.user_pool_id)
        .ok_or_else(|| {
            CognitoError::ResourceNotFound(format!("Client {} does not exist.", req.client_id))
        })?;

    match req.auth_flow.as_str() {
        // Admin flows skip UserMigration: a missing user is authoritative.
        "ADMIN_USER_PASSWORD_AUTH" | "ADMIN_NO_SRP_AUTH" => {
            password_auth(
                state,
                ctx,
                &pool,
                &req.client_id,
                &req.auth_parameters,
                req.client_metadata.as_ref(),
                false,
            )
            .await
        }
        "REFRESH_TOKEN" | "REFRESH_TOKEN_AUTH" => {
            let token = require_parameter(&req.auth_parameters, "REFRESH_TOKEN")?.to_string();
            refresh_token_auth(
                state,
                ctx,
                &pool,
                &req.client_id,
                &token,
                req.client_metadata.as_ref(),
            )
            .await
        }
        flow => Err(CognitoError::Unsupported(format!("AuthFlow {flow}"))),
    }
}

pub async fn respond_to_auth_challenge(
    state: &AppState,
    ctx: &Context,
    req: RespondToAuthChallengeRequest,
) -> Result<InitiateAuthResponse, CognitoError> {
    let pool = state
        .cognito
        .get_user_pool_for_client_id(ctx, &req.client_id)
        .await?;

    let username = require_parameter(&req.challenge_responses, "USERNAME")?.to_string();
    let mut user = pool
        .get_user_by_username(ctx, &username)
        .await?
        .ok_or_else(|| CognitoError::NotAuthorized("Incorrect username or password".into()))?;

    let token_source = match req.challenge_name.as_str() {
        "SMS_MFA" => {
            let code = require_parameter(&req.challenge_responses, "SMS_MFA_CODE")?;
            if user.mfa_code.as_deref() != Some(code) {
                return Err(CognitoError::CodeMismatch);
            }
            user.mfa_code = None;
            TriggerSource::TokenGenerationAuthentication
        }
        "NEW_PASSWORD_REQUIRED" => {
            let new_password = require_parameter(&req.challenge_responses, "NEW_PASSWORD")?;
            user.password = new_password.to_string();
            user.user_status = UserStatus::Confirmed;
            user.user_last_modified_date = state.clock.now();
            TriggerSource::TokenGenerationNewPasswordChallenge
        }
        challenge => {
            return Err(CognitoError::Unsupported(format!(
                "Challenge {challenge}"
            )))
        }
    };
    pool.save_user(ctx, &user).await?;

    let result = issue_tokens(state, ctx, &pool, &mut user, &req.client_id, token_source).await?;
    Ok(InitiateAuthResponse {
        challenge_parameters: Some(Map::new()),
        authentication_result: Some(result),
        ..Default::default()
    })
}

/// USER_PASSWORD_AUTH (and its admin variants): resolve the user, walk the
/// status machine, check the password, then either challenge or issue
/// tokens.
async fn password_auth(
    state: &AppState,
    ctx: &Context,
    pool: &UserPoolService,
    client_id: &str,
    parameters: &HashMap<String, String>,
    client_metadata: Option<&Map<String, Value>>,
    allow_migration: bool,
) -> Result<InitiateAuthResponse, CognitoError> {
    let username = require_parameter(parameters, "USERNAME")?;
    let password = require_parameter(parameters, "PASSWORD")?;

    let mut user = pool.get_user_by_username(ctx, username).await?;

    if user.is_none() && allow_migration && state.triggers.enabled(TriggerName::UserMigration) {
        // Caller metadata travels as validationData on this event; the
        // event's own clientMetadata stays unset.
        let migrated = state
            .triggers
            .user_migration(
                ctx,
                TriggerSource::UserMigrationAuthentication,
                client_id,
                pool.id(),
                username,
                password,
                client_metadata,
                None,
            )
            .await
            .map_err(|e| {
                tracing::warn!(request_id = %ctx.request_id, error = %e, "user migration failed");
                CognitoError::NotAuthorized("Incorrect username or password".into())
            })?;
        pool.save_user(ctx, &migrated).await?;
        user = Some(migrated);
    }

    let mut user = user
        .ok_or_else(|| CognitoError::NotAuthorized("Incorrect username or password".into()))?;

    if !user.enabled {
        return Err(CognitoError::NotAuthorized("User is disabled".into()));
    }
    match user.user_status {
        UserStatus::ResetRequired => return Err(CognitoError::PasswordResetRequired),
        UserStatus::ForceChangePassword => return Ok(new_password_challenge(&user)),
        _ => {}
    }
    if user.password != password {
        return Err(CognitoError::InvalidPassword);
    }

    let mfa_required = match pool.options().mfa_configuration {
        MfaConfiguration::On => true,
        MfaConfiguration::Optional => !user.mfa_options.is_empty(),
        MfaConfiguration::Off => false,
    };
    if mfa_required {
        return sms_mfa_challenge(state, ctx, pool, &mut user, client_id, client_metadata).await;
    }

    let result = issue_tokens(
        state,
        ctx,
        pool,
        &mut user,
        client_id,
        TriggerSource::TokenGenerationAuthentication,
    )
    .await?;

    Ok(InitiateAuthResponse {
        challenge_name: Some("PASSWORD_VERIFIER".into()),
        challenge_parameters: Some(Map::new()),
        authentication_result: Some(result),
        ..Default::default()
    })
}

async fn refresh_token_auth(
    state: &AppState,
    ctx: &Context,
    pool: &UserPoolService,
    client_id: &str,
    token: &str,
    client_metadata: Option<&Map<String, Value>>,
) -> Result<InitiateAuthResponse, CognitoError> {
    let user = pool
        .get_user_by_refresh_token(ctx, token)
        .await?
        .ok_or_else(|| CognitoError::NotAuthorized("Invalid Refresh Token".into()))?;

    let tokens = state
        .tokens
        .regenerate(ctx, &user, client_id, pool.id(), client_metadata)
        .await?;

    Ok(InitiateAuthResponse {
        authentication_result: Some(tokens.into()),
        ..Default::default()
    })
}

/// Success tail of every authentication: mint tokens, remember the refresh
/// token, then PostAuthentication if configured.
async fn issue_tokens(
    state: &AppState,
    ctx: &Context,
    pool: &UserPoolService,
    user: &mut User,
    client_id: &str,
    source: TriggerSource,
) -> Result<AuthenticationResult, CognitoError> {
    let tokens = state
        .tokens
        .generate(ctx, user, client_id, pool.id(), None, source)
        .await?;

    if let Some(refresh_token) = &tokens.refresh_token {
        pool.store_refresh_token(ctx, refresh_token, user).await?;
    }

    if state.triggers.enabled(TriggerName::PostAuthentication) {
        state
            .triggers
            .post_authentication(
                ctx,
                client_id,
                pool.id(),
                &user.username,
                &user.attributes,
                None,
            )
            .await?;
    }

    Ok(tokens.into())
}

fn new_password_challenge(user: &User) -> InitiateAuthResponse {
    let mut parameters = Map::new();
    parameters.insert("USER_ID_FOR_SRP".into(), user.username.clone().into());
    parameters.insert("requiredAttributes".into(), "[]".into());
    parameters.insert(
        "userAttributes".into(),
        serde_json::to_string(&attributes_to_map(&user.attributes))
            .unwrap_or_default()
            .into(),
    );

    InitiateAuthResponse {
        challenge_name: Some("NEW_PASSWORD_REQUIRED".into()),
        challenge_parameters: Some(parameters),
        session: Some(Uuid::new_v4().to_string()),
        ..Default::default()
    }
}

async fn sms_mfa_challenge(
    state: &AppState,
    ctx: &Context,
    pool: &UserPoolService,
    user: &mut User,
    client_id: &str,
    client_metadata: Option<&Map<String, Value>>,
) -> Result<InitiateAuthResponse, CognitoError> {
    let attribute_name = user
        .sms_mfa_option()
        .map(|o| o.attribute_name.clone())
        .ok_or_else(|| CognitoError::NotAuthorized("User has no SMS MFA option".into()))?;
    let destination = user
        .attribute(&attribute_name)
        .map(str::to_owned)
        .ok_or_else(|| {
            CognitoError::NotAuthorized(format!("User has no {attribute_name} attribute"))
        })?;

    let code = state.otp.generate();
    user.mfa_code = Some(code.clone());
    pool.save_user(ctx, user).await?;

    let details = DeliveryDetails {
        attribute_name,
        delivery_medium: DeliveryMedium::Sms,
        destination: destination.clone(),
    };
    state
        .messages
        .deliver(
            ctx,
            MessageSource::Authentication,
            client_id,
            pool.id(),
            user,
            &code,
            client_metadata,
            &details,
        )
        .await?;

    let mut parameters = Map::new();
    parameters.insert("CODE_DELIVERY_DELIVERY_MEDIUM".into(), "SMS".into());
    parameters.insert("CODE_DELIVERY_DESTINATION".into(), destination.into());

    Ok(InitiateAuthResponse {
        challenge_name: Some("SMS_MFA".into()),
        challenge_parameters: Some(parameters),
        session: Some(Uuid::new_v4().to_string()),
        ..Default::default()
    })
}

fn require_parameter<'a>(
    parameters: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, CognitoError> {
    parameters
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| CognitoError::InvalidParameter(format!("Missing required parameter {name}")))
}
