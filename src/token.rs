//! Token issuance: RS256-signed id/access tokens plus opaque refresh
//! tokens.
//!
//! Signing uses a committed local development keypair — generating key
//! material is deliberately outside this service; anything that can read
//! the JWKS document can verify what we sign.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::User;
use crate::services::clock::Clock;
use crate::triggers::{TriggerName, TriggerSource, Triggers};

/// Id/access token lifetime.
const TOKEN_VALIDITY_HOURS: i64 = 24;

/// Claims a PreTokenGeneration hook can neither override nor suppress.
const PROTECTED_CLAIMS: &[&str] = &[
    "sub",
    "iss",
    "aud",
    "exp",
    "iat",
    "token_use",
    "auth_time",
    "jti",
];

/// The committed local signing key: PEM pair plus the precomputed public
/// JWK served at the JWKS endpoint.
pub struct KeyMaterial {
    encoding: EncodingKey,
    decoding: DecodingKey,
    kid: String,
    jwk: Value,
}

impl KeyMaterial {
    pub fn local() -> Result<Self, CognitoError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct KeyFile {
            private_key_pem: String,
            public_key_pem: String,
            jwk: Value,
        }

        let file: KeyFile = serde_json::from_str(include_str!("keys/local.json"))?;

        let encoding = EncodingKey::from_rsa_pem(file.private_key_pem.as_bytes())
            .map_err(|e| CognitoError::Internal(format!("bad private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(file.public_key_pem.as_bytes())
            .map_err(|e| CognitoError::Internal(format!("bad public key: {e}")))?;
        let kid = file.jwk["kid"].as_str().unwrap_or_default().to_string();

        Ok(Self {
            encoding,
            decoding,
            kid,
            jwk: file.jwk,
        })
    }
}

/// The three tokens a successful authentication yields. Refresh flows omit
/// the refresh token.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// Wire shape of the `AuthenticationResult` response field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenSet> for AuthenticationResult {
    fn from(tokens: TokenSet) -> Self {
        Self {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".into(),
            expires_in: TOKEN_VALIDITY_HOURS * 3600,
        }
    }
}

/// Claims extracted from a verified access token.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(rename = "cognito:username")]
    pub username: String,
    pub iss: String,
    /// The app client the token was issued to.
    pub aud: String,
}

impl AccessTokenClaims {
    /// The pool id is the trailing segment of the issuer.
    pub fn user_pool_id(&self) -> &str {
        self.iss.rsplit('/').next().unwrap_or_default()
    }
}

pub struct TokenGenerator {
    keys: KeyMaterial,
    triggers: Arc<Triggers>,
    clock: Arc<dyn Clock>,
    issuer_host: String,
}

impl TokenGenerator {
    pub fn new(
        keys: KeyMaterial,
        triggers: Arc<Triggers>,
        clock: Arc<dyn Clock>,
        issuer_host: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            triggers,
            clock,
            issuer_host: issuer_host.into(),
        }
    }

    fn issuer(&self, user_pool_id: &str) -> String {
        format!("{}/{}", self.issuer_host, user_pool_id)
    }

    /// Issue a full token triple for an authenticated user.
    pub async fn generate(
        &self,
        ctx: &Context,
        user: &User,
        client_id: &str,
        user_pool_id: &str,
        client_metadata: Option<&Map<String, Value>>,
        source: TriggerSource,
    ) -> Result<TokenSet, CognitoError> {
        let mut tokens = self
            .generate_access_and_id(ctx, user, client_id, user_pool_id, client_metadata, source)
            .await?;
        tokens.refresh_token = Some(new_refresh_token());
        Ok(tokens)
    }

    /// Issue new access and id tokens against an existing refresh token.
    pub async fn regenerate(
        &self,
        ctx: &Context,
        user: &User,
        client_id: &str,
        user_pool_id: &str,
        client_metadata: Option<&Map<String, Value>>,
    ) -> Result<TokenSet, CognitoError> {
        self.generate_access_and_id(
            ctx,
            user,
            client_id,
            user_pool_id,
            client_metadata,
            TriggerSource::TokenGenerationRefreshTokens,
        )
        .await
    }

    async fn generate_access_and_id(
        &self,
        ctx: &Context,
        user: &User,
        client_id: &str,
        user_pool_id: &str,
        client_metadata: Option<&Map<String, Value>>,
        source: TriggerSource,
    ) -> Result<TokenSet, CognitoError> {
        let now = self.clock.now();
        let auth_time = now.timestamp();
        let exp = (now + Duration::hours(TOKEN_VALIDITY_HOURS)).timestamp();
        let iss = self.issuer(user_pool_id);

        let mut id_claims = Map::new();
        for attr in &user.attributes {
            id_claims.insert(attr.name.clone(), attr.value.clone().into());
        }
        id_claims.insert("cognito:username".into(), user.username.clone().into());

        if self.triggers.enabled(TriggerName::PreTokenGeneration) {
            let overrides = self
                .triggers
                .pre_token_generation(
                    ctx,
                    source,
                    client_id,
                    user_pool_id,
                    &user.username,
                    &user.attributes,
                    client_metadata,
                )
                .await?;

            for (claim, value) in overrides.claims_to_add_or_override {
                if !PROTECTED_CLAIMS.contains(&claim.as_str()) {
                    id_claims.insert(claim, value);
                }
            }
            for claim in overrides.claims_to_suppress {
                if !PROTECTED_CLAIMS.contains(&claim.as_str()) {
                    id_claims.remove(&claim);
                }
            }
        }

        // Reserved claims land after overrides so hooks cannot shadow them.
        id_claims.insert("sub".into(), user.sub().into());
        id_claims.insert("aud".into(), client_id.into());
        id_claims.insert("iss".into(), iss.clone().into());
        id_claims.insert("token_use".into(), "id".into());
        id_claims.insert("auth_time".into(), auth_time.into());
        id_claims.insert("iat".into(), auth_time.into());
        id_claims.insert("exp".into(), exp.into());
        id_claims.insert("jti".into(), Uuid::new_v4().to_string().into());

        let mut access_claims = Map::new();
        access_claims.insert("sub".into(), user.sub().into());
        access_claims.insert("cognito:username".into(), user.username.clone().into());
        access_claims.insert("aud".into(), client_id.into());
        access_claims.insert("iss".into(), iss.into());
        access_claims.insert("token_use".into(), "access".into());
        access_claims.insert("auth_time".into(), auth_time.into());
        access_claims.insert("iat".into(), auth_time.into());
        access_claims.insert("exp".into(), exp.into());
        access_claims.insert("jti".into(), Uuid::new_v4().to_string().into());

        Ok(TokenSet {
            access_token: self.encode(&access_claims)?,
            id_token: self.encode(&id_claims)?,
            refresh_token: None,
        })
    }

    fn encode(&self, claims: &Map<String, Value>) -> Result<String, CognitoError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.keys.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.keys.encoding)
            .map_err(|e| CognitoError::Internal(format!("JWT encode: {e}")))
    }

    /// Verify signature and expiry, returning the raw claims.
    pub fn decode(&self, token: &str) -> Result<Map<String, Value>, CognitoError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;

        jsonwebtoken::decode::<Map<String, Value>>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    CognitoError::NotAuthorized("Access token has expired".into())
                }
                _ => CognitoError::NotAuthorized("Invalid token".into()),
            })
    }

    /// Verify an access token presented by an SDK client and extract the
    /// claims targets need to resolve the caller.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, CognitoError> {
        let claims = self.decode(token)?;
        serde_json::from_value(Value::Object(claims))
            .map_err(|_| CognitoError::NotAuthorized("Invalid token".into()))
    }

    /// The public JWKS document for this signing key.
    pub fn jwks(&self) -> Value {
        json!({ "keys": [self.keys.jwk] })
    }
}

/// Opaque refresh token: 32 random bytes, base64url, no padding.
pub fn new_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
