//! Password lifecycle: forgot/confirm-forgot, self-service change, and
//! the admin override.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::CognitoError;
use crate::messages::MessageSource;
use crate::models::{AliasAttribute, AttributeType, DeliveryDetails, User, UserStatus};
use crate::triggers::{TriggerName, TriggerSource};
use crate::AppState;

use super::Empty;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForgotPasswordRequest {
    pub client_id: String,
    pub username: String,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForgotPasswordResponse {
    pub code_delivery_details: DeliveryDetails,
}

pub async fn forgot_password(
    state: &AppState,
    ctx: &Context,
    req: ForgotPasswordRequest,
) -> Result<ForgotPasswordResponse, CognitoError> {
    let pool = state
        .cognito
        .get_user_pool_for_client_id(ctx, &req.client_id)
        .await?;

    let mut user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    let details = reset_delivery_target(&user)?;
    let code = state.otp.generate();
    user.confirmation_code = Some(code.clone());
    user.user_status = UserStatus::ResetRequired;
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    state
        .messages
        .deliver(
            ctx,
            MessageSource::ForgotPassword,
            &req.client_id,
            pool.id(),
            &user,
            &code,
            req.client_metadata.as_ref(),
            &details,
        )
        .await?;

    Ok(ForgotPasswordResponse {
        code_delivery_details: details,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmForgotPasswordRequest {
    pub client_id: String,
    pub username: String,
    pub confirmation_code: String,
    pub password: String,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

pub async fn confirm_forgot_password(
    state: &AppState,
    ctx: &Context,
    req: ConfirmForgotPasswordRequest,
) -> Result<Empty, CognitoError> {
    let pool = state
        .cognito
        .get_user_pool_for_client_id(ctx, &req.client_id)
        .await?;

    let mut user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    if user.confirmation_code.as_deref() != Some(req.confirmation_code.as_str()) {
        return Err(CognitoError::CodeMismatch);
    }

    user.password = req.password;
    user.confirmation_code = None;
    user.user_status = UserStatus::Confirmed;
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    if state.triggers.enabled(TriggerName::PostConfirmation) {
        let mut attributes = user.attributes.clone();
        attributes.push(AttributeType::new("cognito:user_status", "CONFIRMED"));
        state
            .triggers
            .post_confirmation(
                ctx,
                TriggerSource::PostConfirmationConfirmForgotPassword,
                &req.client_id,
                pool.id(),
                &user.username,
                &attributes,
                req.client_metadata.as_ref(),
            )
            .await?;
    }

    Ok(Empty {})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangePasswordRequest {
    pub access_token: String,
    pub previous_password: String,
    pub proposed_password: String,
}

pub async fn change_password(
    state: &AppState,
    ctx: &Context,
    req: ChangePasswordRequest,
) -> Result<Empty, CognitoError> {
    let claims = state.tokens.verify_access_token(&req.access_token)?;
    let pool = state
        .cognito
        .get_user_pool(ctx, claims.user_pool_id())
        .await?;

    let mut user = pool
        .get_user_by_username(ctx, &claims.username)
        .await?
        .ok_or_else(|| CognitoError::NotAuthorized("Invalid token".into()))?;

    if user.password != req.previous_password {
        return Err(CognitoError::InvalidPassword);
    }

    user.password = req.proposed_password;
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    Ok(Empty {})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminSetUserPasswordRequest {
    pub user_pool_id: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub permanent: bool,
}

pub async fn admin_set_user_password(
    state: &AppState,
    ctx: &Context,
    req: AdminSetUserPasswordRequest,
) -> Result<Empty, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;

    let mut user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    user.password = req.password;
    user.user_status = if req.permanent {
        UserStatus::Confirmed
    } else {
        UserStatus::ForceChangePassword
    };
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    Ok(Empty {})
}

/// Reset codes go to email when the user has one, otherwise to the phone
/// number.
fn reset_delivery_target(user: &User) -> Result<DeliveryDetails, CognitoError> {
    for alias in [AliasAttribute::Email, AliasAttribute::PhoneNumber] {
        if let Some(destination) = user.attribute(alias.attribute_name()) {
            return Ok(DeliveryDetails {
                attribute_name: alias.attribute_name().into(),
                delivery_medium: alias.delivery_medium(),
                destination: destination.into(),
            });
        }
    }
    Err(CognitoError::InvalidParameter(
        "User has no delivery channel for the reset code".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryMedium;
    use crate::test_support::{confirmed_user, pool_options, test_env, FakeLambda, TestEnv};
    use crate::triggers::TriggerSource;

    async fn env_with_user() -> (TestEnv, String) {
        let env = test_env(FakeLambda::disabled()).await;
        env.create_pool(pool_options("local_a")).await;
        let client = env.create_client("local_a").await;
        let mut user = confirmed_user("alice");
        user.set_attribute("email", "alice@example.com");
        env.save_user("local_a", &user).await;
        (env, client.client_id)
    }

    #[tokio::test]
    async fn forgot_then_confirm_resets_the_password() {
        let (env, client_id) = env_with_user().await;

        let response = forgot_password(
            &env.state,
            &env.ctx(),
            ForgotPasswordRequest {
                client_id: client_id.clone(),
                username: "alice".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            response.code_delivery_details.delivery_medium,
            DeliveryMedium::Email
        );

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::ResetRequired);
        assert_eq!(user.confirmation_code.as_deref(), Some("1234"));

        confirm_forgot_password(
            &env.state,
            &env.ctx(),
            ConfirmForgotPasswordRequest {
                client_id,
                username: "alice".into(),
                confirmation_code: "1234".into(),
                password: "fresh-password".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap();

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Confirmed);
        assert_eq!(user.password, "fresh-password");
        assert!(user.confirmation_code.is_none());
    }

    #[tokio::test]
    async fn confirm_forgot_rejects_wrong_code() {
        let (env, client_id) = env_with_user().await;

        forgot_password(
            &env.state,
            &env.ctx(),
            ForgotPasswordRequest {
                client_id: client_id.clone(),
                username: "alice".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap();

        let err = confirm_forgot_password(
            &env.state,
            &env.ctx(),
            ConfirmForgotPasswordRequest {
                client_id,
                username: "alice".into(),
                confirmation_code: "0000".into(),
                password: "fresh-password".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "CodeMismatchError");

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::ResetRequired);
        assert_eq!(user.password, "hunter2");
    }

    #[tokio::test]
    async fn confirm_forgot_fires_post_confirmation() {
        let env = test_env(FakeLambda::with_response(
            crate::triggers::TriggerName::PostConfirmation,
            serde_json::json!({}),
        ))
        .await;
        env.create_pool(pool_options("local_a")).await;
        let client = env.create_client("local_a").await;
        let mut user = confirmed_user("alice");
        user.set_attribute("email", "alice@example.com");
        user.confirmation_code = Some("1234".into());
        env.save_user("local_a", &user).await;

        confirm_forgot_password(
            &env.state,
            &env.ctx(),
            ConfirmForgotPasswordRequest {
                client_id: client.client_id,
                username: "alice".into(),
                confirmation_code: "1234".into(),
                password: "fresh".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap();

        let event = env.lambda.last_event().unwrap();
        assert_eq!(
            event.trigger_source,
            TriggerSource::PostConfirmationConfirmForgotPassword.as_str()
        );
    }

    #[tokio::test]
    async fn change_password_verifies_previous() {
        let (env, client_id) = env_with_user().await;
        let user = env.get_user("local_a", "alice").await.unwrap();
        let tokens = env
            .state
            .tokens
            .generate(
                &env.ctx(),
                &user,
                &client_id,
                "local_a",
                None,
                TriggerSource::TokenGenerationAuthentication,
            )
            .await
            .unwrap();

        let err = change_password(
            &env.state,
            &env.ctx(),
            ChangePasswordRequest {
                access_token: tokens.access_token.clone(),
                previous_password: "wrong".into(),
                proposed_password: "next".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "InvalidPasswordError");

        change_password(
            &env.state,
            &env.ctx(),
            ChangePasswordRequest {
                access_token: tokens.access_token,
                previous_password: "hunter2".into(),
                proposed_password: "next".into(),
            },
        )
        .await
        .unwrap();

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.password, "next");
    }

    #[tokio::test]
    async fn change_password_rejects_garbage_token() {
        let (env, _) = env_with_user().await;
        let err = change_password(
            &env.state,
            &env.ctx(),
            ChangePasswordRequest {
                access_token: "garbage".into(),
                previous_password: "a".into(),
                proposed_password: "b".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "NotAuthorizedError");
    }

    #[tokio::test]
    async fn admin_set_password_controls_status() {
        let (env, _) = env_with_user().await;

        admin_set_user_password(
            &env.state,
            &env.ctx(),
            AdminSetUserPasswordRequest {
                user_pool_id: "local_a".into(),
                username: "alice".into(),
                password: "temp".into(),
                permanent: false,
            },
        )
        .await
        .unwrap();
        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::ForceChangePassword);
        assert_eq!(user.password, "temp");

        admin_set_user_password(
            &env.state,
            &env.ctx(),
            AdminSetUserPasswordRequest {
                user_pool_id: "local_a".into(),
                username: "alice".into(),
                password: "final".into(),
                permanent: true,
            },
        )
        .await
        .unwrap();
        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Confirmed);
    }

    #[tokio::test]
    async fn admin_set_password_on_missing_user() {
        let (env, _) = env_with_user().await;
        let err = admin_set_user_password(
            &env.state,
            &env.ctx(),
            AdminSetUserPasswordRequest {
                user_pool_id: "local_a".into(),
                username: "ghost".into(),
                password: "x".into(),
                permanent: true,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "UserNotFoundError");
    }
}
