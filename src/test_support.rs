//! Fakes and fixtures shared by the in-file test modules.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::config::Config;
use crate::context::Context;
use crate::error::CognitoError;
use crate::messages::{Message, MessageDelivery, Messages};
use crate::models::{
    default_schema, AppClient, AttributeType, DeliveryDetails, MfaConfiguration, User, UserPool,
    UserStatus,
};
use crate::services::clock::Clock;
use crate::services::otp::OtpGenerator;
use crate::services::CognitoService;
use crate::store::DataStoreFactory;
use crate::token::{KeyMaterial, TokenGenerator};
use crate::triggers::{CognitoUserPoolEvent, Lambda, TriggerName, Triggers};
use crate::AppState;

const ALL_TRIGGERS: [TriggerName; 6] = [
    TriggerName::PreSignUp,
    TriggerName::PostConfirmation,
    TriggerName::PostAuthentication,
    TriggerName::UserMigration,
    TriggerName::CustomMessage,
    TriggerName::PreTokenGeneration,
];

/// Scriptable [`Lambda`] that records every envelope it receives.
pub struct FakeLambda {
    enabled: HashSet<TriggerName>,
    responses: HashMap<TriggerName, Value>,
    default_response: Value,
    fail_message: Option<String>,
    events: Mutex<Vec<CognitoUserPoolEvent>>,
}

impl FakeLambda {
    /// No hooks configured.
    pub fn disabled() -> Self {
        Self {
            enabled: HashSet::new(),
            responses: HashMap::new(),
            default_response: Value::Null,
            fail_message: None,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Every hook configured; every invocation returns `response`.
    pub fn returning(response: Value) -> Self {
        Self {
            enabled: ALL_TRIGGERS.into_iter().collect(),
            responses: HashMap::new(),
            default_response: response,
            fail_message: None,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Only the given hook is configured, returning `response`.
    pub fn with_response(trigger: TriggerName, response: Value) -> Self {
        let mut fake = Self::disabled();
        fake.enabled.insert(trigger);
        fake.responses.insert(trigger, response);
        fake
    }

    /// Add another configured hook to an existing fake.
    pub fn and_response(mut self, trigger: TriggerName, response: Value) -> Self {
        self.enabled.insert(trigger);
        self.responses.insert(trigger, response);
        self
    }

    /// Every hook configured; every invocation fails like a hook that
    /// raised.
    pub fn failing(message: impl Into<String>) -> Self {
        let mut fake = Self::returning(Value::Null);
        fake.fail_message = Some(message.into());
        fake
    }

    pub fn events(&self) -> Vec<CognitoUserPoolEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn last_event(&self) -> Option<CognitoUserPoolEvent> {
        self.events.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Lambda for FakeLambda {
    fn enabled(&self, trigger: TriggerName) -> bool {
        self.enabled.contains(&trigger)
    }

    async fn invoke(
        &self,
        _ctx: &Context,
        trigger: TriggerName,
        event: CognitoUserPoolEvent,
    ) -> Result<Value, CognitoError> {
        self.events.lock().unwrap().push(event);
        if let Some(message) = &self.fail_message {
            return Err(CognitoError::UserLambdaValidation(message.clone()));
        }
        Ok(self
            .responses
            .get(&trigger)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

/// A delivered message captured for assertions.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub username: String,
    pub details: DeliveryDetails,
    pub message: Message,
}

#[derive(Default)]
pub struct CapturingDelivery {
    records: Mutex<Vec<Delivered>>,
}

impl CapturingDelivery {
    pub fn all(&self) -> Vec<Delivered> {
        self.records.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Delivered> {
        self.records.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MessageDelivery for CapturingDelivery {
    async fn deliver(
        &self,
        _ctx: &Context,
        user: &User,
        details: &DeliveryDetails,
        message: &Message,
    ) -> Result<(), CognitoError> {
        self.records.lock().unwrap().push(Delivered {
            username: user.username.clone(),
            details: details.clone(),
            message: message.clone(),
        });
        Ok(())
    }
}

/// OTP source that always yields the same code.
pub struct FixedOtp(pub String);

impl OtpGenerator for FixedOtp {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// A fully assembled application over a temp directory, fake lambda, fixed
/// OTP and capturing delivery sink.
pub struct TestEnv {
    pub state: Arc<AppState>,
    pub lambda: Arc<FakeLambda>,
    pub delivery: Arc<CapturingDelivery>,
    pub factory: Arc<DataStoreFactory>,
    _dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn ctx(&self) -> Context {
        Context::internal()
    }

    pub async fn create_pool(&self, options: UserPool) -> UserPool {
        self.state
            .cognito
            .create_user_pool(&self.ctx(), options)
            .await
            .unwrap()
    }

    pub async fn create_client(&self, pool_id: &str) -> AppClient {
        let pool = self
            .state
            .cognito
            .get_user_pool(&self.ctx(), pool_id)
            .await
            .unwrap();
        pool.create_app_client(&self.ctx(), "test-app").await.unwrap()
    }

    /// Replace an existing pool's stored configuration.
    pub async fn set_pool_options(&self, options: UserPool) {
        let store = self
            .factory
            .get(&self.ctx(), &options.id)
            .await
            .unwrap()
            .expect("pool must exist");
        store
            .set(
                &self.ctx(),
                &["Options"],
                serde_json::to_value(&options).unwrap(),
            )
            .await
            .unwrap();
    }

    pub async fn save_user(&self, pool_id: &str, user: &User) {
        let pool = self
            .state
            .cognito
            .get_user_pool(&self.ctx(), pool_id)
            .await
            .unwrap();
        pool.save_user(&self.ctx(), user).await.unwrap();
    }

    pub async fn get_user(&self, pool_id: &str, username: &str) -> Option<User> {
        let pool = self
            .state
            .cognito
            .get_user_pool(&self.ctx(), pool_id)
            .await
            .unwrap();
        pool.get_user_by_username(&self.ctx(), username)
            .await
            .unwrap()
    }
}

/// Assemble an [`AppState`] the way `main` does, with test seams swapped
/// in. The OTP source always yields `"1234"`.
pub async fn test_env(lambda: FakeLambda) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::internal();

    let lambda = Arc::new(lambda);
    let clock: Arc<dyn Clock> = Arc::new(crate::services::SystemClock);
    let otp: Arc<dyn OtpGenerator> = Arc::new(FixedOtp("1234".into()));
    let delivery = Arc::new(CapturingDelivery::default());

    let factory = Arc::new(DataStoreFactory::new(dir.path()));
    let cognito = CognitoService::open(&ctx, factory.clone(), clock.clone())
        .await
        .unwrap();
    let triggers = Arc::new(Triggers::new(lambda.clone(), clock.clone()));
    let messages = Messages::new(triggers.clone(), delivery.clone());
    let tokens = TokenGenerator::new(
        KeyMaterial::local().unwrap(),
        triggers.clone(),
        clock.clone(),
        "http://localhost:9229",
    );

    let state = Arc::new(AppState {
        config: Config::default(),
        clock,
        otp,
        cognito,
        triggers,
        messages,
        tokens,
    });

    TestEnv {
        state,
        lambda,
        delivery,
        factory,
        _dir: dir,
    }
}

/// Pool options with the standard schema and nothing else configured.
pub fn pool_options(id: &str) -> UserPool {
    let now = Utc::now();
    UserPool {
        id: id.into(),
        name: Some(format!("{id}-pool")),
        username_attributes: vec![],
        auto_verified_attributes: vec![],
        mfa_configuration: MfaConfiguration::Off,
        schema_attributes: default_schema(),
        sms_verification_message: None,
        sms_configuration: None,
        creation_date: now,
        last_modified_date: now,
    }
}

/// A confirmed, enabled user with a `sub` and password `"hunter2"`.
pub fn confirmed_user(username: &str) -> User {
    let now = Utc::now();
    User {
        username: username.into(),
        password: "hunter2".into(),
        attributes: vec![AttributeType::new(
            "sub",
            uuid::Uuid::new_v4().to_string(),
        )],
        user_status: UserStatus::Confirmed,
        enabled: true,
        mfa_options: vec![],
        confirmation_code: None,
        mfa_code: None,
        attribute_verification_code: None,
        refresh_tokens: vec![],
        user_create_date: now,
        user_last_modified_date: now,
    }
}
