//! Refresh token revocation.

use serde::Deserialize;

use crate::context::Context;
use crate::error::CognitoError;
use crate::AppState;

use super::Empty;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RevokeTokenRequest {
    pub client_id: String,
    pub token: String,
}

/// Remove the token from its holder's list. Revoking a token nobody holds
/// is a silent success.
pub async fn revoke_token(
    state: &AppState,
    ctx: &Context,
    req: RevokeTokenRequest,
) -> Result<Empty, CognitoError> {
    let pool = state
        .cognito
        .get_user_pool_for_client_id(ctx, &req.client_id)
        .await?;

    if let Some(mut user) = pool.get_user_by_refresh_token(ctx, &req.token).await? {
        user.refresh_tokens.retain(|t| t != &req.token);
        pool.save_user(ctx, &user).await?;
    }

    Ok(Empty {})
}
