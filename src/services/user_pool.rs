//! Per-pool service: owns one pool's document, borrows the shared clients
//! document, and implements user/group/client accessors over them.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::{AliasAttribute, AppClient, Group, User, UserPool};
use crate::services::clock::Clock;
use crate::store::DataStore;

pub struct UserPoolService {
    options: UserPool,
    pool: Arc<dyn DataStore>,
    clients: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for UserPoolService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPoolService")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl UserPoolService {
    pub fn new(
        options: UserPool,
        pool: Arc<dyn DataStore>,
        clients: Arc<dyn DataStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            options,
            pool,
            clients,
            clock,
        }
    }

    pub fn options(&self) -> &UserPool {
        &self.options
    }

    pub fn id(&self) -> &str {
        &self.options.id
    }

    // ── Users ───────────────────────────────────────────────────────────

    /// Upsert under `Users/<Username>`. The caller is responsible for
    /// setting `UserLastModifiedDate` before saving.
    pub async fn save_user(&self, ctx: &Context, user: &User) -> Result<(), CognitoError> {
        tracing::debug!(request_id = %ctx.request_id, username = %user.username, pool = %self.options.id, "saving user");
        self.pool
            .set(ctx, &["Users", &user.username], serde_json::to_value(user)?)
            .await
    }

    pub async fn delete_user(&self, ctx: &Context, user: &User) -> Result<(), CognitoError> {
        tracing::debug!(request_id = %ctx.request_id, username = %user.username, pool = %self.options.id, "deleting user");
        self.pool.delete(ctx, &["Users", &user.username]).await
    }

    /// Direct key lookup first; on miss, scan users in insertion order and
    /// match `sub`, then (when the alias is enabled on the pool) `email`,
    /// then `phone_number`.
    pub async fn get_user_by_username(
        &self,
        ctx: &Context,
        username: &str,
    ) -> Result<Option<User>, CognitoError> {
        if let Some(value) = self.pool.get(ctx, &["Users", username]).await? {
            return Ok(Some(serde_json::from_value(value)?));
        }

        let users = self.list_users(ctx).await?;

        if let Some(user) = users.iter().find(|u| u.sub() == username) {
            return Ok(Some(user.clone()));
        }
        if self.options.alias_enabled(AliasAttribute::Email) {
            if let Some(user) = users.iter().find(|u| u.attribute("email") == Some(username)) {
                return Ok(Some(user.clone()));
            }
        }
        if self.options.alias_enabled(AliasAttribute::PhoneNumber) {
            if let Some(user) = users
                .iter()
                .find(|u| u.attribute("phone_number") == Some(username))
            {
                return Ok(Some(user.clone()));
            }
        }

        Ok(None)
    }

    /// Linear scan for a user holding this refresh token.
    pub async fn get_user_by_refresh_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<User>, CognitoError> {
        let users = self.list_users(ctx).await?;
        Ok(users
            .into_iter()
            .find(|u| u.refresh_tokens.iter().any(|t| t == token)))
    }

    pub async fn list_users(&self, ctx: &Context) -> Result<Vec<User>, CognitoError> {
        let users = self
            .pool
            .get(ctx, &["Users"])
            .await?
            .unwrap_or_else(|| json!({}));
        let map = users.as_object().cloned().unwrap_or_default();
        map.into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(CognitoError::from))
            .collect()
    }

    /// Append a refresh token to the user's list and persist.
    pub async fn store_refresh_token(
        &self,
        ctx: &Context,
        token: &str,
        user: &mut User,
    ) -> Result<(), CognitoError> {
        user.refresh_tokens.push(token.to_string());
        self.save_user(ctx, user).await
    }

    // ── Groups ──────────────────────────────────────────────────────────

    pub async fn save_group(&self, ctx: &Context, group: &Group) -> Result<(), CognitoError> {
        self.pool
            .set(
                ctx,
                &["Groups", &group.group_name],
                serde_json::to_value(group)?,
            )
            .await
    }

    pub async fn list_groups(&self, ctx: &Context) -> Result<Vec<Group>, CognitoError> {
        let groups = self
            .pool
            .get(ctx, &["Groups"])
            .await?
            .unwrap_or_else(|| json!({}));
        let map = groups.as_object().cloned().unwrap_or_default();
        map.into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(CognitoError::from))
            .collect()
    }

    // ── App clients ─────────────────────────────────────────────────────

    /// Generate a client id, record the client in the shared clients store,
    /// and return it.
    pub async fn create_app_client(
        &self,
        ctx: &Context,
        name: &str,
    ) -> Result<AppClient, CognitoError> {
        let now = self.clock.now();
        let client = AppClient {
            client_id: new_client_id(),
            client_name: name.to_string(),
            user_pool_id: self.options.id.clone(),
            refresh_token_validity: crate::models::DEFAULT_REFRESH_TOKEN_VALIDITY_DAYS,
            creation_date: now,
            last_modified_date: now,
        };

        self.clients
            .set(
                ctx,
                &["Clients", &client.client_id],
                serde_json::to_value(&client)?,
            )
            .await?;

        Ok(client)
    }
}

/// 25 random alphanumerics, the shape hosted app client ids take.
pub fn new_client_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(25)
        .map(char::from)
        .collect()
}
