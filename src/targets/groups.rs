//! Group lifecycle within a pool.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::Group;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateGroupRequest {
    pub group_name: String,
    pub user_pool_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub precedence: Option<u32>,
    #[serde(default)]
    pub role_arn: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateGroupResponse {
    pub group: Group,
}

pub async fn create_group(
    state: &AppState,
    ctx: &Context,
    req: CreateGroupRequest,
) -> Result<CreateGroupResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;

    let now = state.clock.now();
    let group = Group {
        group_name: req.group_name,
        user_pool_id: req.user_pool_id,
        description: req.description,
        precedence: req.precedence,
        role_arn: req.role_arn,
        creation_date: now,
        last_modified_date: now,
    };
    pool.save_group(ctx, &group).await?;

    Ok(CreateGroupResponse { group })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListGroupsRequest {
    pub user_pool_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListGroupsResponse {
    pub groups: Vec<Group>,
}

pub async fn list_groups(
    state: &AppState,
    ctx: &Context,
    req: ListGroupsRequest,
) -> Result<ListGroupsResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    Ok(ListGroupsResponse {
        groups: pool.list_groups(ctx).await?,
    })
}
