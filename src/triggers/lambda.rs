//! External function invoker.
//!
//! Hooks run behind the standard invoke wire: a synchronous POST to
//! `{endpoint}/2015-03-31/functions/{name}/invocations`. Local function
//! emulators (serverless-offline and friends) speak this protocol, so
//! user hook code runs unmodified against the emulator.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::error::CognitoError;
use crate::triggers::events::{CognitoUserPoolEvent, TriggerName};

const INVOKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Seam for invoking external hook functions. Tests swap in a fake that
/// records envelopes and scripts responses.
#[async_trait]
pub trait Lambda: Send + Sync {
    /// Whether a function is configured for this hook kind.
    fn enabled(&self, trigger: TriggerName) -> bool;

    /// Invoke the configured function synchronously and return the
    /// `response` field of the envelope it echoes back.
    async fn invoke(
        &self,
        ctx: &Context,
        trigger: TriggerName,
        event: CognitoUserPoolEvent,
    ) -> Result<Value, CognitoError>;
}

/// HTTP client for a local function host.
pub struct LambdaClient {
    endpoint: String,
    functions: HashMap<TriggerName, String>,
    http: reqwest::Client,
}

impl LambdaClient {
    pub fn new(endpoint: impl Into<String>, functions: HashMap<TriggerName, String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            functions,
            http: reqwest::Client::builder()
                .timeout(INVOKE_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }
}

#[async_trait]
impl Lambda for LambdaClient {
    fn enabled(&self, trigger: TriggerName) -> bool {
        self.functions.contains_key(&trigger)
    }

    async fn invoke(
        &self,
        ctx: &Context,
        trigger: TriggerName,
        event: CognitoUserPoolEvent,
    ) -> Result<Value, CognitoError> {
        let name = self.functions.get(&trigger).ok_or_else(|| {
            CognitoError::UnexpectedLambdaException(format!(
                "{} trigger is not configured",
                trigger.as_str()
            ))
        })?;

        let url = format!("{}/2015-03-31/functions/{}/invocations", self.endpoint, name);
        tracing::info!(
            request_id = %ctx.request_id,
            function = %name,
            source = %event.trigger_source,
            "invoking trigger"
        );

        let response = self
            .http
            .post(&url)
            .header("X-Amz-Invocation-Type", "RequestResponse")
            .json(&event)
            .send()
            .await
            .map_err(|e| CognitoError::UnexpectedLambdaException(e.to_string()))?;

        let function_error = response
            .headers()
            .get("x-amz-function-error")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let status = response.status();
        let payload = response
            .bytes()
            .await
            .map_err(|e| CognitoError::UnexpectedLambdaException(e.to_string()))?;

        if let Some(kind) = function_error {
            let detail = String::from_utf8_lossy(&payload).into_owned();
            tracing::warn!(request_id = %ctx.request_id, function = %name, %kind, "trigger returned an error");
            return Err(CognitoError::UserLambdaValidation(detail));
        }
        if !status.is_success() {
            return Err(CognitoError::UserLambdaValidation(format!(
                "{} returned status {}",
                name, status
            )));
        }

        let echoed: Value = serde_json::from_slice(&payload).map_err(|e| {
            CognitoError::InvalidLambdaResponse(format!("{name} returned unparseable payload: {e}"))
        })?;

        Ok(echoed.get("response").cloned().unwrap_or(Value::Null))
    }
}
