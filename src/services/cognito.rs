//! Registry of user pools. Owns the shared clients document and hands out
//! [`UserPoolService`] instances bound to individual pool documents.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::{AppClient, UserPool};
use crate::services::clock::Clock;
use crate::services::user_pool::UserPoolService;
use crate::store::{DataStore, DataStoreFactory};

/// Document id of the shared clients store. Not a valid pool id, so it can
/// never collide with one.
const CLIENTS_STORE_ID: &str = "clients";

pub struct CognitoService {
    factory: Arc<DataStoreFactory>,
    clients: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
}

impl CognitoService {
    /// Open (or create) the shared clients store and build the registry.
    pub async fn open(
        ctx: &Context,
        factory: Arc<DataStoreFactory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CognitoError> {
        let clients = factory
            .create(ctx, CLIENTS_STORE_ID, json!({ "Clients": {} }))
            .await?;
        Ok(Self {
            factory,
            clients,
            clock,
        })
    }

    fn missing_pool(pool_id: &str) -> CognitoError {
        CognitoError::ResourceNotFound(format!("User pool {pool_id} does not exist."))
    }

    /// A [`UserPoolService`] bound to `pool_id`, or `ResourceNotFoundError`.
    pub async fn get_user_pool(
        &self,
        ctx: &Context,
        pool_id: &str,
    ) -> Result<UserPoolService, CognitoError> {
        let store = self
            .factory
            .get(ctx, pool_id)
            .await?
            .ok_or_else(|| Self::missing_pool(pool_id))?;

        let options = store
            .get(ctx, &["Options"])
            .await?
            .ok_or_else(|| Self::missing_pool(pool_id))?;

        Ok(UserPoolService::new(
            serde_json::from_value(options)?,
            store,
            self.clients.clone(),
            self.clock.clone(),
        ))
    }

    /// Resolve a pool through the shared clients store.
    pub async fn get_user_pool_for_client_id(
        &self,
        ctx: &Context,
        client_id: &str,
    ) -> Result<UserPoolService, CognitoError> {
        let client = self
            .get_app_client(ctx, client_id)
            .await?
            .ok_or_else(|| CognitoError::ResourceNotFound(format!("Client {client_id} does not exist.")))?;

        self.get_user_pool(ctx, &client.user_pool_id).await
    }

    pub async fn get_app_client(
        &self,
        ctx: &Context,
        client_id: &str,
    ) -> Result<Option<AppClient>, CognitoError> {
        match self.clients.get(ctx, &["Clients", client_id]).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_app_client(
        &self,
        ctx: &Context,
        client: &AppClient,
    ) -> Result<(), CognitoError> {
        self.clients
            .delete(ctx, &["Clients", &client.client_id])
            .await
    }

    /// Create the pool document and return its service.
    pub async fn create_user_pool(
        &self,
        ctx: &Context,
        options: UserPool,
    ) -> Result<UserPool, CognitoError> {
        tracing::info!(request_id = %ctx.request_id, pool = %options.id, "creating user pool");
        self.factory
            .create(
                ctx,
                &options.id,
                json!({
                    "Options": serde_json::to_value(&options)?,
                    "Users": {},
                    "Groups": {},
                }),
            )
            .await?;
        Ok(options)
    }

    /// Remove the pool's file and evict its cached store.
    pub async fn delete_user_pool(
        &self,
        ctx: &Context,
        pool: &UserPool,
    ) -> Result<(), CognitoError> {
        tracing::info!(request_id = %ctx.request_id, pool = %pool.id, "deleting user pool");
        self.factory.delete(ctx, &pool.id).await
    }

    pub async fn list_user_pools(&self, ctx: &Context) -> Result<Vec<UserPool>, CognitoError> {
        let mut pools = Vec::new();
        for id in self.factory.list_ids().await? {
            if id == CLIENTS_STORE_ID {
                continue;
            }
            let service = self.get_user_pool(ctx, &id).await?;
            pools.push(service.options().clone());
        }
        Ok(pools)
    }
}

/// Pool ids look like `local_` plus a short random suffix.
pub fn new_pool_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("local_{suffix}")
}
