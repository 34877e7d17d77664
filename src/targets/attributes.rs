//! Attribute mutators: schema-checked updates, deletes, and the
//! attribute-verification code round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::CognitoError;
use crate::messages::MessageSource;
use crate::models::{
    attributes_append, attributes_remove, AliasAttribute, AttributeType, DeliveryDetails, User,
    UserPool,
};
use crate::services::UserPoolService;
use crate::token::AccessTokenClaims;
use crate::AppState;

use super::Empty;

/// Enforce the pool schema on a requested attribute change set: every name
/// must exist in the schema and be mutable, and a `*_verified` flag is
/// only meaningful when its channel attribute is present.
pub fn validate_permitted_attribute_changes(
    updates: &[AttributeType],
    user: &User,
    pool: &UserPool,
) -> Result<(), CognitoError> {
    for attr in updates {
        let schema = pool.schema_attribute(&attr.name).ok_or_else(|| {
            CognitoError::InvalidParameter(format!(
                "user.{}: Attribute does not exist in the schema.",
                attr.name
            ))
        })?;
        if !schema.mutable {
            return Err(CognitoError::InvalidParameter(format!(
                "user.{}: Attribute cannot be updated. (changing an immutable attribute)",
                attr.name
            )));
        }
    }

    let supplied = |name: &str| updates.iter().any(|a| a.name == name);
    for alias in [AliasAttribute::Email, AliasAttribute::PhoneNumber] {
        let channel = alias.attribute_name();
        let flag = format!("{channel}_verified");
        if supplied(&flag) && !supplied(channel) && !user.has_attribute(channel) {
            return Err(CognitoError::InvalidParameter(format!(
                "user.{flag}: Attribute cannot be verified without a {channel} attribute."
            )));
        }
    }

    Ok(())
}

/// Apply an update set. Changing a channel attribute un-verifies it unless
/// the same request supplies the flag explicitly.
fn apply_attribute_updates(user: &mut User, updates: &[AttributeType]) {
    let supplied = |name: &str| updates.iter().any(|a| a.name == name);
    for attr in updates {
        attributes_append(&mut user.attributes, attr.clone());
    }
    for alias in [AliasAttribute::Email, AliasAttribute::PhoneNumber] {
        let channel = alias.attribute_name();
        let flag = format!("{channel}_verified");
        if supplied(channel) && !supplied(&flag) {
            user.set_attribute(flag, "false");
        }
    }
}

fn validate_attribute_deletes(
    names: &[String],
    pool: &UserPool,
) -> Result<(), CognitoError> {
    for name in names {
        let schema = pool.schema_attribute(name).ok_or_else(|| {
            CognitoError::InvalidParameter(format!(
                "user.{name}: Attribute does not exist in the schema."
            ))
        })?;
        if !schema.mutable {
            return Err(CognitoError::InvalidParameter(format!(
                "user.{name}: Attribute cannot be deleted. (changing an immutable attribute)"
            )));
        }
    }
    Ok(())
}

async fn resolve_by_access_token(
    state: &AppState,
    ctx: &Context,
    access_token: &str,
) -> Result<(UserPoolService, User, AccessTokenClaims), CognitoError> {
    let claims = state.tokens.verify_access_token(access_token)?;
    let pool = state
        .cognito
        .get_user_pool(ctx, claims.user_pool_id())
        .await?;
    let user = pool
        .get_user_by_username(ctx, &claims.username)
        .await?
        .ok_or_else(|| CognitoError::NotAuthorized("Invalid token".into()))?;
    Ok((pool, user, claims))
}

// ── UpdateUserAttributes / AdminUpdateUserAttributes ────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateUserAttributesRequest {
    pub access_token: String,
    #[serde(default)]
    pub user_attributes: Vec<AttributeType>,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateUserAttributesResponse {
    pub code_delivery_details_list: Vec<DeliveryDetails>,
}

pub async fn update_user_attributes(
    state: &AppState,
    ctx: &Context,
    req: UpdateUserAttributesRequest,
) -> Result<UpdateUserAttributesResponse, CognitoError> {
    let (pool, mut user, _claims) = resolve_by_access_token(state, ctx, &req.access_token).await?;

    validate_permitted_attribute_changes(&req.user_attributes, &user, pool.options())?;
    apply_attribute_updates(&mut user, &req.user_attributes);
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    Ok(UpdateUserAttributesResponse {
        code_delivery_details_list: vec![],
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminUpdateUserAttributesRequest {
    pub user_pool_id: String,
    pub username: String,
    #[serde(default)]
    pub user_attributes: Vec<AttributeType>,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

pub async fn admin_update_user_attributes(
    state: &AppState,
    ctx: &Context,
    req: AdminUpdateUserAttributesRequest,
) -> Result<Empty, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let mut user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    validate_permitted_attribute_changes(&req.user_attributes, &user, pool.options())?;
    apply_attribute_updates(&mut user, &req.user_attributes);
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    Ok(Empty {})
}

// ── DeleteUserAttributes / AdminDeleteUserAttributes ────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteUserAttributesRequest {
    pub access_token: String,
    #[serde(default)]
    pub user_attribute_names: Vec<String>,
}

pub async fn delete_user_attributes(
    state: &AppState,
    ctx: &Context,
    req: DeleteUserAttributesRequest,
) -> Result<Empty, CognitoError> {
    let (pool, mut user, _claims) = resolve_by_access_token(state, ctx, &req.access_token).await?;

    validate_attribute_deletes(&req.user_attribute_names, pool.options())?;
    attributes_remove(&mut user.attributes, &req.user_attribute_names);
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    Ok(Empty {})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminDeleteUserAttributesRequest {
    pub user_pool_id: String,
    pub username: String,
    #[serde(default)]
    pub user_attribute_names: Vec<String>,
}

pub async fn admin_delete_user_attributes(
    state: &AppState,
    ctx: &Context,
    req: AdminDeleteUserAttributesRequest,
) -> Result<Empty, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let mut user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or(CognitoError::UserNotFound)?;

    validate_attribute_deletes(&req.user_attribute_names, pool.options())?;
    attributes_remove(&mut user.attributes, &req.user_attribute_names);
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    Ok(Empty {})
}

// ── Verification codes ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetUserAttributeVerificationCodeRequest {
    pub access_token: String,
    pub attribute_name: String,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetUserAttributeVerificationCodeResponse {
    pub code_delivery_details: DeliveryDetails,
}

pub async fn get_user_attribute_verification_code(
    state: &AppState,
    ctx: &Context,
    req: GetUserAttributeVerificationCodeRequest,
) -> Result<GetUserAttributeVerificationCodeResponse, CognitoError> {
    let (pool, mut user, claims) = resolve_by_access_token(state, ctx, &req.access_token).await?;

    let alias = verifiable_alias(&req.attribute_name)?;
    let destination = user
        .attribute(alias.attribute_name())
        .map(str::to_owned)
        .ok_or_else(|| {
            CognitoError::InvalidParameter(format!(
                "User has no {} attribute",
                alias.attribute_name()
            ))
        })?;

    let code = state.otp.generate();
    user.attribute_verification_code = Some(code.clone());
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    let details = DeliveryDetails {
        attribute_name: alias.attribute_name().into(),
        delivery_medium: alias.delivery_medium(),
        destination,
    };

    state
        .messages
        .deliver(
            ctx,
            MessageSource::VerifyUserAttribute,
            &claims.aud,
            pool.id(),
            &user,
            &code,
            req.client_metadata.as_ref(),
            &details,
        )
        .await?;

    Ok(GetUserAttributeVerificationCodeResponse {
        code_delivery_details: details,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerifyUserAttributeRequest {
    pub access_token: String,
    pub attribute_name: String,
    pub code: String,
}

pub async fn verify_user_attribute(
    state: &AppState,
    ctx: &Context,
    req: VerifyUserAttributeRequest,
) -> Result<Empty, CognitoError> {
    let (pool, mut user, _claims) = resolve_by_access_token(state, ctx, &req.access_token).await?;

    let alias = verifiable_alias(&req.attribute_name)?;
    if user.attribute_verification_code.as_deref() != Some(req.code.as_str()) {
        return Err(CognitoError::CodeMismatch);
    }

    user.set_attribute(format!("{}_verified", alias.attribute_name()), "true");
    user.attribute_verification_code = None;
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    Ok(Empty {})
}

fn verifiable_alias(attribute_name: &str) -> Result<AliasAttribute, CognitoError> {
    match attribute_name {
        "email" => Ok(AliasAttribute::Email),
        "phone_number" => Ok(AliasAttribute::PhoneNumber),
        other => Err(CognitoError::InvalidParameter(format!(
            "Cannot send a verification code for attribute {other}"
        ))),
    }
}
