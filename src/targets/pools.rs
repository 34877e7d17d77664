//! Pool lifecycle: create/describe/delete/list and the MFA config read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::{
    default_schema, AliasAttribute, MfaConfiguration, SchemaAttribute, UserPool,
};
use crate::services::cognito::new_pool_id;
use crate::AppState;

use super::Empty;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserPoolRequest {
    pub pool_name: String,
    #[serde(default)]
    pub username_attributes: Vec<AliasAttribute>,
    #[serde(default)]
    pub auto_verified_attributes: Vec<AliasAttribute>,
    #[serde(default)]
    pub mfa_configuration: Option<MfaConfiguration>,
    #[serde(default)]
    pub schema: Vec<SchemaAttribute>,
    #[serde(default)]
    pub sms_verification_message: Option<String>,
    #[serde(default)]
    pub sms_configuration: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolResponse {
    pub user_pool: UserPool,
}

pub async fn create_user_pool(
    state: &AppState,
    ctx: &Context,
    req: CreateUserPoolRequest,
) -> Result<UserPoolResponse, CognitoError> {
    let now = state.clock.now();

    // caller schema entries override the standard ones by name
    let mut schema_attributes = default_schema();
    for attr in req.schema {
        match schema_attributes.iter_mut().find(|s| s.name == attr.name) {
            Some(existing) => *existing = attr,
            None => schema_attributes.push(attr),
        }
    }

    let options = UserPool {
        id: new_pool_id(),
        name: Some(req.pool_name),
        username_attributes: req.username_attributes,
        auto_verified_attributes: req.auto_verified_attributes,
        mfa_configuration: req.mfa_configuration.unwrap_or_default(),
        schema_attributes,
        sms_verification_message: req.sms_verification_message,
        sms_configuration: req.sms_configuration,
        creation_date: now,
        last_modified_date: now,
    };

    let user_pool = state.cognito.create_user_pool(ctx, options).await?;
    Ok(UserPoolResponse { user_pool })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeUserPoolRequest {
    pub user_pool_id: String,
}

pub async fn describe_user_pool(
    state: &AppState,
    ctx: &Context,
    req: DescribeUserPoolRequest,
) -> Result<UserPoolResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    Ok(UserPoolResponse {
        user_pool: pool.options().clone(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteUserPoolRequest {
    pub user_pool_id: String,
}

pub async fn delete_user_pool(
    state: &AppState,
    ctx: &Context,
    req: DeleteUserPoolRequest,
) -> Result<Empty, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let options = pool.options().clone();
    state.cognito.delete_user_pool(ctx, &options).await?;
    Ok(Empty {})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUserPoolsRequest {
    #[serde(default)]
    pub max_results: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUserPoolsResponse {
    pub user_pools: Vec<UserPool>,
}

pub async fn list_user_pools(
    state: &AppState,
    ctx: &Context,
    _req: ListUserPoolsRequest,
) -> Result<ListUserPoolsResponse, CognitoError> {
    Ok(ListUserPoolsResponse {
        user_pools: state.cognito.list_user_pools(ctx).await?,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetUserPoolMfaConfigRequest {
    pub user_pool_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsMfaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_authentication_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetUserPoolMfaConfigResponse {
    pub mfa_configuration: MfaConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_mfa_configuration: Option<SmsMfaConfig>,
}

pub async fn get_user_pool_mfa_config(
    state: &AppState,
    ctx: &Context,
    req: GetUserPoolMfaConfigRequest,
) -> Result<GetUserPoolMfaConfigResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let options = pool.options();

    let sms_mfa_configuration = options.sms_configuration.as_ref().map(|config| SmsMfaConfig {
        sms_configuration: Some(config.clone()),
        sms_authentication_message: options.sms_verification_message.clone(),
    });

    Ok(GetUserPoolMfaConfigResponse {
        mfa_configuration: options.mfa_configuration,
        sms_mfa_configuration,
    })
}
