//! User lifecycle targets: admin create/confirm/delete/read, the
//! token-authenticated self-service reads, and listing.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::Context;
use crate::error::CognitoError;
use crate::messages::MessageSource;
use crate::models::{
    AliasAttribute, AttributeType, DeliveryDetails, MfaOption, User, UserStatus, UserSummary,
};
use crate::triggers::{TriggerName, TriggerSource};
use crate::AppState;

use super::Empty;

// ── AdminCreateUser ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminCreateUserRequest {
    pub user_pool_id: String,
    pub username: String,
    #[serde(default)]
    pub temporary_password: Option<String>,
    #[serde(default)]
    pub user_attributes: Vec<AttributeType>,
    #[serde(default)]
    pub message_action: Option<String>,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminCreateUserResponse {
    pub user: UserSummary,
}

pub async fn admin_create_user(
    state: &AppState,
    ctx: &Context,
    req: AdminCreateUserRequest,
) -> Result<AdminCreateUserResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;

    if pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .is_some()
    {
        return Err(CognitoError::UsernameExists);
    }

    let now = state.clock.now();
    let temporary_password = req
        .temporary_password
        .unwrap_or_else(generate_temporary_password);

    let mut attributes = vec![AttributeType::new("sub", Uuid::new_v4().to_string())];
    attributes.extend(req.user_attributes.into_iter().filter(|a| a.name != "sub"));

    let user = User {
        username: req.username.clone(),
        password: temporary_password.clone(),
        attributes,
        user_status: UserStatus::ForceChangePassword,
        enabled: true,
        mfa_options: vec![],
        confirmation_code: None,
        mfa_code: None,
        attribute_verification_code: None,
        refresh_tokens: vec![],
        user_create_date: now,
        user_last_modified_date: now,
    };
    pool.save_user(ctx, &user).await?;

    let suppressed = req.message_action.as_deref() == Some("SUPPRESS");
    if !suppressed {
        if let Some(details) = invite_target(&user) {
            state
                .messages
                .deliver(
                    ctx,
                    MessageSource::AdminCreateUser,
                    "",
                    pool.id(),
                    &user,
                    &temporary_password,
                    req.client_metadata.as_ref(),
                    &details,
                )
                .await?;
        }
    }

    Ok(AdminCreateUserResponse {
        user: user.to_summary(),
    })
}

/// Invitations go to email first, then phone; a user with neither simply
/// gets no message.
fn invite_target(user: &User) -> Option<DeliveryDetails> {
    for alias in [AliasAttribute::Email, AliasAttribute::PhoneNumber] {
        if let Some(destination) = user.attribute(alias.attribute_name()) {
            return Some(DeliveryDetails {
                attribute_name: alias.attribute_name().into(),
                delivery_medium: alias.delivery_medium(),
                destination: destination.into(),
            });
        }
    }
    None
}

fn generate_temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

// ── AdminConfirmSignUp ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminConfirmSignUpRequest {
    pub user_pool_id: String,
    pub username: String,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

pub async fn admin_confirm_sign_up(
    state: &AppState,
    ctx: &Context,
    req: AdminConfirmSignUpRequest,
) -> Result<Empty, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let mut user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    if user.user_status != UserStatus::Unconfirmed {
        return Err(CognitoError::NotAuthorized(format!(
            "User cannot be confirmed. Current status: {}",
            serde_json::to_value(user.user_status)?
                .as_str()
                .unwrap_or_default()
        )));
    }

    user.user_status = UserStatus::Confirmed;
    user.confirmation_code = None;
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    if state.triggers.enabled(TriggerName::PostConfirmation) {
        let mut attributes = user.attributes.clone();
        attributes.push(AttributeType::new("cognito:user_status", "CONFIRMED"));
        state
            .triggers
            .post_confirmation(
                ctx,
                TriggerSource::PostConfirmationConfirmSignUp,
                "",
                pool.id(),
                &user.username,
                &attributes,
                req.client_metadata.as_ref(),
            )
            .await?;
    }

    Ok(Empty {})
}

// ── Reads ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminGetUserRequest {
    pub user_pool_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminGetUserResponse {
    pub username: String,
    pub user_attributes: Vec<AttributeType>,
    pub user_status: UserStatus,
    pub enabled: bool,
    #[serde(rename = "MFAOptions", skip_serializing_if = "Vec::is_empty")]
    pub mfa_options: Vec<MfaOption>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub user_create_date: chrono::DateTime<chrono::Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub user_last_modified_date: chrono::DateTime<chrono::Utc>,
}

pub async fn admin_get_user(
    state: &AppState,
    ctx: &Context,
    req: AdminGetUserRequest,
) -> Result<AdminGetUserResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    Ok(AdminGetUserResponse {
        username: user.username.clone(),
        user_attributes: user.attributes.clone(),
        user_status: user.user_status,
        enabled: user.enabled,
        mfa_options: user.mfa_options.clone(),
        user_create_date: user.user_create_date,
        user_last_modified_date: user.user_last_modified_date,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetUserRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetUserResponse {
    pub username: String,
    pub user_attributes: Vec<AttributeType>,
    #[serde(rename = "MFAOptions", skip_serializing_if = "Vec::is_empty")]
    pub mfa_options: Vec<MfaOption>,
}

pub async fn get_user(
    state: &AppState,
    ctx: &Context,
    req: GetUserRequest,
) -> Result<GetUserResponse, CognitoError> {
    let claims = state.tokens.verify_access_token(&req.access_token)?;
    let pool = state
        .cognito
        .get_user_pool(ctx, claims.user_pool_id())
        .await?;
    let user = pool
        .get_user_by_username(ctx, &claims.username)
        .await?
        .ok_or_else(|| CognitoError::NotAuthorized("Invalid token".into()))?;

    Ok(GetUserResponse {
        username: user.username.clone(),
        user_attributes: user.attributes.clone(),
        mfa_options: user.mfa_options.clone(),
    })
}

// ── Deletes ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminDeleteUserRequest {
    pub user_pool_id: String,
    pub username: String,
}

pub async fn admin_delete_user(
    state: &AppState,
    ctx: &Context,
    req: AdminDeleteUserRequest,
) -> Result<Empty, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    pool.delete_user(ctx, &user).await?;
    Ok(Empty {})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteUserRequest {
    pub access_token: String,
}

pub async fn delete_user(
    state: &AppState,
    ctx: &Context,
    req: DeleteUserRequest,
) -> Result<Empty, CognitoError> {
    let claims = state.tokens.verify_access_token(&req.access_token)?;
    let pool = state
        .cognito
        .get_user_pool(ctx, claims.user_pool_id())
        .await?;
    let user = pool
        .get_user_by_username(ctx, &claims.username)
        .await?
        .ok_or_else(|| CognitoError::NotAuthorized("Invalid token".into()))?;

    pool.delete_user(ctx, &user).await?;
    Ok(Empty {})
}

// ── ListUsers ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersRequest {
    pub user_pool_id: String,
    // Filter/Limit/PaginationToken are accepted and ignored: the local
    // store always returns the full set.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub pagination_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersResponse {
    pub users: Vec<UserSummary>,
}

pub async fn list_users(
    state: &AppState,
    ctx: &Context,
    req: ListUsersRequest,
) -> Result<ListUsersResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let users = pool.list_users(ctx).await?;

    Ok(ListUsersResponse {
        users: users.iter().map(User::to_summary).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{confirmed_user, pool_options, test_env, FakeLambda, TestEnv};

    async fn env() -> TestEnv {
        let env = test_env(FakeLambda::disabled()).await;
        env.create_pool(pool_options("local_a")).await;
        env
    }

    #[tokio::test]
    async fn admin_create_user_starts_in_force_change_password() {
        let env = env().await;

        let response = admin_create_user(
            &env.state,
            &env.ctx(),
            AdminCreateUserRequest {
                user_pool_id: "local_a".into(),
                username: "invited".into(),
                temporary_password: Some("Temp123!".into()),
                user_attributes: vec![AttributeType::new("email", "invited@example.com")],
                message_action: None,
                client_metadata: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.user.user_status, UserStatus::ForceChangePassword);
        let user = env.get_user("local_a", "invited").await.unwrap();
        assert_eq!(user.password, "Temp123!");
        assert!(!user.sub().is_empty());

        // invitation carried the temporary password
        let sent = env.delivery.last().unwrap();
        assert!(sent
            .message
            .email_message
            .as_deref()
            .unwrap()
            .contains("Temp123!"));
    }

    #[tokio::test]
    async fn admin_create_user_generates_password_and_suppresses_message() {
        let env = env().await;

        admin_create_user(
            &env.state,
            &env.ctx(),
            AdminCreateUserRequest {
                user_pool_id: "local_a".into(),
                username: "quiet".into(),
                temporary_password: None,
                user_attributes: vec![AttributeType::new("email", "quiet@example.com")],
                message_action: Some("SUPPRESS".into()),
                client_metadata: None,
            },
        )
        .await
        .unwrap();

        let user = env.get_user("local_a", "quiet").await.unwrap();
        assert_eq!(user.password.len(), 12);
        assert!(env.delivery.all().is_empty());
    }

    #[tokio::test]
    async fn admin_create_duplicate_is_rejected() {
        let env = env().await;
        env.save_user("local_a", &confirmed_user("alice")).await;

        let err = admin_create_user(
            &env.state,
            &env.ctx(),
            AdminCreateUserRequest {
                user_pool_id: "local_a".into(),
                username: "alice".into(),
                temporary_password: None,
                user_attributes: vec![],
                message_action: None,
                client_metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "UsernameExistsError");
    }

    #[tokio::test]
    async fn admin_confirm_transitions_unconfirmed_only() {
        let env = env().await;
        let mut user = confirmed_user("pending");
        user.user_status = UserStatus::Unconfirmed;
        user.confirmation_code = Some("1234".into());
        env.save_user("local_a", &user).await;

        admin_confirm_sign_up(
            &env.state,
            &env.ctx(),
            AdminConfirmSignUpRequest {
                user_pool_id: "local_a".into(),
                username: "pending".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap();

        let user = env.get_user("local_a", "pending").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Confirmed);
        assert!(user.confirmation_code.is_none());

        let err = admin_confirm_sign_up(
            &env.state,
            &env.ctx(),
            AdminConfirmSignUpRequest {
                user_pool_id: "local_a".into(),
                username: "pending".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "NotAuthorizedError");
    }

    #[tokio::test]
    async fn admin_get_user_returns_full_record() {
        let env = env().await;
        env.save_user("local_a", &confirmed_user("alice")).await;

        let response = admin_get_user(
            &env.state,
            &env.ctx(),
            AdminGetUserRequest {
                user_pool_id: "local_a".into(),
                username: "alice".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(response.username, "alice");
        assert_eq!(response.user_status, UserStatus::Confirmed);
        assert!(response.enabled);

        let err = admin_get_user(
            &env.state,
            &env.ctx(),
            AdminGetUserRequest {
                user_pool_id: "local_a".into(),
                username: "ghost".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "UserNotFoundError");
    }

    #[tokio::test]
    async fn self_service_get_and_delete_via_access_token() {
        let env = env().await;
        let client = env.create_client("local_a").await;
        let user = confirmed_user("alice");
        env.save_user("local_a", &user).await;

        let tokens = env
            .state
            .tokens
            .generate(
                &env.ctx(),
                &user,
                &client.client_id,
                "local_a",
                None,
                crate::triggers::TriggerSource::TokenGenerationAuthentication,
            )
            .await
            .unwrap();

        let me = get_user(
            &env.state,
            &env.ctx(),
            GetUserRequest {
                access_token: tokens.access_token.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(me.username, "alice");

        delete_user(
            &env.state,
            &env.ctx(),
            DeleteUserRequest {
                access_token: tokens.access_token,
            },
        )
        .await
        .unwrap();
        assert!(env.get_user("local_a", "alice").await.is_none());
    }

    #[tokio::test]
    async fn list_users_returns_summaries_without_secrets() {
        let env = env().await;
        env.save_user("local_a", &confirmed_user("alice")).await;
        env.save_user("local_a", &confirmed_user("bob")).await;

        let response = list_users(
            &env.state,
            &env.ctx(),
            ListUsersRequest {
                user_pool_id: "local_a".into(),
                filter: None,
                limit: None,
                pagination_token: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.users.len(), 2);
        let wire = serde_json::to_value(&response).unwrap();
        assert!(wire["Users"][0].get("Password").is_none());
    }
}
