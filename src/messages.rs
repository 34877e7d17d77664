//! Code delivery: renders the message for an OTP (via the CustomMessage
//! hook when configured, built-in templates otherwise) and hands it to a
//! pluggable delivery sink.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::CognitoError;
use crate::models::{DeliveryDetails, DeliveryMedium, User};
use crate::triggers::{TriggerName, TriggerSource, Triggers};

/// The flow a code belongs to; becomes the `CustomMessage_<Source>`
/// trigger source when the hook is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    SignUp,
    AdminCreateUser,
    ResendCode,
    ForgotPassword,
    UpdateUserAttribute,
    VerifyUserAttribute,
    Authentication,
}

impl MessageSource {
    fn custom_message_source(&self) -> TriggerSource {
        match self {
            MessageSource::SignUp => TriggerSource::CustomMessageSignUp,
            MessageSource::AdminCreateUser => TriggerSource::CustomMessageAdminCreateUser,
            MessageSource::ResendCode => TriggerSource::CustomMessageResendCode,
            MessageSource::ForgotPassword => TriggerSource::CustomMessageForgotPassword,
            MessageSource::UpdateUserAttribute => TriggerSource::CustomMessageUpdateUserAttribute,
            MessageSource::VerifyUserAttribute => TriggerSource::CustomMessageVerifyUserAttribute,
            MessageSource::Authentication => TriggerSource::CustomMessageAuthentication,
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            MessageSource::AdminCreateUser => {
                "Your username is {username} and temporary password is {####}."
            }
            MessageSource::Authentication => "Your authentication code is {####}.",
            _ => "Your confirmation code is {####}",
        }
    }
}

/// A rendered message ready for a sink.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub sms_message: Option<String>,
    pub email_message: Option<String>,
    pub email_subject: Option<String>,
    /// The raw code, kept alongside the rendered bodies so sinks can
    /// surface it prominently for local development.
    pub code: String,
}

/// Final hop of code delivery. The default sink logs; tests capture.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn deliver(
        &self,
        ctx: &Context,
        user: &User,
        details: &DeliveryDetails,
        message: &Message,
    ) -> Result<(), CognitoError>;
}

/// Writes deliveries to the log, which is where local development reads
/// its codes.
pub struct ConsoleMessageDelivery;

#[async_trait]
impl MessageDelivery for ConsoleMessageDelivery {
    async fn deliver(
        &self,
        ctx: &Context,
        user: &User,
        details: &DeliveryDetails,
        message: &Message,
    ) -> Result<(), CognitoError> {
        let body = match details.delivery_medium {
            DeliveryMedium::Sms => message.sms_message.as_deref(),
            DeliveryMedium::Email => message.email_message.as_deref(),
        };
        tracing::info!(
            request_id = %ctx.request_id,
            username = %user.username,
            medium = ?details.delivery_medium,
            destination = %details.destination,
            code = %message.code,
            body = body.unwrap_or_default(),
            "message delivered"
        );
        Ok(())
    }
}

pub struct Messages {
    triggers: Arc<Triggers>,
    delivery: Arc<dyn MessageDelivery>,
}

impl Messages {
    pub fn new(triggers: Arc<Triggers>, delivery: Arc<dyn MessageDelivery>) -> Self {
        Self { triggers, delivery }
    }

    /// Render and deliver a code for a flow. When the CustomMessage hook is
    /// configured it supplies the bodies; `{####}` and `{username}` are
    /// interpolated either way.
    #[allow(clippy::too_many_arguments)]
    pub async fn deliver(
        &self,
        ctx: &Context,
        source: MessageSource,
        client_id: &str,
        user_pool_id: &str,
        user: &User,
        code: &str,
        client_metadata: Option<&Map<String, Value>>,
        details: &DeliveryDetails,
    ) -> Result<(), CognitoError> {
        let message = if self.triggers.enabled(TriggerName::CustomMessage) {
            let outcome = self
                .triggers
                .custom_message(
                    ctx,
                    source.custom_message_source(),
                    client_id,
                    user_pool_id,
                    &user.username,
                    &user.attributes,
                    client_metadata,
                )
                .await?;

            Message {
                sms_message: outcome
                    .sms_message
                    .map(|m| interpolate(&m, code, &user.username)),
                email_message: outcome
                    .email_message
                    .map(|m| interpolate(&m, code, &user.username)),
                email_subject: outcome.email_subject,
                code: code.to_string(),
            }
        } else {
            let body = interpolate(source.default_template(), code, &user.username);
            Message {
                sms_message: Some(body.clone()),
                email_message: Some(body),
                email_subject: None,
                code: code.to_string(),
            }
        };

        self.delivery.deliver(ctx, user, details, &message).await
    }
}

fn interpolate(template: &str, code: &str, username: &str) -> String {
    template
        .replace("{####}", code)
        .replace("{username}", username)
}
