//! App client lifecycle within a pool.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::AppClient;
use crate::AppState;

use super::Empty;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserPoolClientRequest {
    pub user_pool_id: String,
    pub client_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolClientResponse {
    pub user_pool_client: AppClient,
}

pub async fn create_user_pool_client(
    state: &AppState,
    ctx: &Context,
    req: CreateUserPoolClientRequest,
) -> Result<UserPoolClientResponse, CognitoError> {
    let pool = state.cognito.get_user_pool(ctx, &req.user_pool_id).await?;
    let client = pool.create_app_client(ctx, &req.client_name).await?;
    Ok(UserPoolClientResponse {
        user_pool_client: client,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeUserPoolClientRequest {
    pub user_pool_id: String,
    pub client_id: String,
}

pub async fn describe_user_pool_client(
    state: &AppState,
    ctx: &Context,
    req: DescribeUserPoolClientRequest,
) -> Result<UserPoolClientResponse, CognitoError> {
    let client = resolve_client(state, ctx, &req.user_pool_id, &req.client_id).await?;
    Ok(UserPoolClientResponse {
        user_pool_client: client,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteUserPoolClientRequest {
    pub user_pool_id: String,
    pub client_id: String,
}

pub async fn delete_user_pool_client(
    state: &AppState,
    ctx: &Context,
    req: DeleteUserPoolClientRequest,
) -> Result<Empty, CognitoError> {
    let client = resolve_client(state, ctx, &req.user_pool_id, &req.client_id).await?;
    state.cognito.delete_app_client(ctx, &client).await?;
    Ok(Empty {})
}

/// A client is only visible through the pool it belongs to.
async fn resolve_client(
    state: &AppState,
    ctx: &Context,
    user_pool_id: &str,
    client_id: &str,
) -> Result<AppClient, CognitoError> {
    state
        .cognito
        .get_app_client(ctx, client_id)
        .await?
        .filter(|c| c.user_pool_id == user_pool_id)
        .ok_or_else(|| {
            CognitoError::ResourceNotFound(format!("Client {client_id} does not exist."))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_REFRESH_TOKEN_VALIDITY_DAYS;
    use crate::test_support::{pool_options, test_env, FakeLambda};

    #[tokio::test]
    async fn create_describe_delete_round_trip() {
        let env = test_env(FakeLambda::disabled()).await;
        env.create_pool(pool_options("local_a")).await;

        let created = create_user_pool_client(
            &env.state,
            &env.ctx(),
            CreateUserPoolClientRequest {
                user_pool_id: "local_a".into(),
                client_name: "web".into(),
            },
        )
        .await
        .unwrap();
        let client = created.user_pool_client;
        assert_eq!(client.client_name, "web");
        assert_eq!(
            client.refresh_token_validity,
            DEFAULT_REFRESH_TOKEN_VALIDITY_DAYS
        );

        let described = describe_user_pool_client(
            &env.state,
            &env.ctx(),
            DescribeUserPoolClientRequest {
                user_pool_id: "local_a".into(),
                client_id: client.client_id.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(described.user_pool_client.client_id, client.client_id);

        delete_user_pool_client(
            &env.state,
            &env.ctx(),
            DeleteUserPoolClientRequest {
                user_pool_id: "local_a".into(),
                client_id: client.client_id.clone(),
            },
        )
        .await
        .unwrap();

        let err = describe_user_pool_client(
            &env.state,
            &env.ctx(),
            DescribeUserPoolClientRequest {
                user_pool_id: "local_a".into(),
                client_id: client.client_id,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "ResourceNotFoundError");
    }

    #[tokio::test]
    async fn client_is_scoped_to_its_pool() {
        let env = test_env(FakeLambda::disabled()).await;
        env.create_pool(pool_options("local_a")).await;
        env.create_pool(pool_options("local_b")).await;
        let client = env.create_client("local_a").await;

        let err = describe_user_pool_client(
            &env.state,
            &env.ctx(),
            DescribeUserPoolClientRequest {
                user_pool_id: "local_b".into(),
                client_id: client.client_id,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "ResourceNotFoundError");
    }
}
