//! SignUp and ConfirmSignUp: the self-service registration flow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::Context;
use crate::error::CognitoError;
use crate::messages::MessageSource;
use crate::models::{
    AliasAttribute, AttributeType, DeliveryDetails, User, UserPool, UserStatus,
};
use crate::triggers::{TriggerName, TriggerSource};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpRequest {
    pub client_id: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub user_attributes: Vec<AttributeType>,
    /// Accepted for wire compatibility. The PreSignUp envelope carries no
    /// validation data, matching what hooks see against the hosted service.
    #[serde(default)]
    pub validation_data: Option<Vec<AttributeType>>,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpResponse {
    pub user_confirmed: bool,
    pub user_sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_delivery_details: Option<DeliveryDetails>,
}

pub async fn sign_up(
    state: &AppState,
    ctx: &Context,
    req: SignUpRequest,
) -> Result<SignUpResponse, CognitoError> {
    let pool = state
        .cognito
        .get_user_pool_for_client_id(ctx, &req.client_id)
        .await?;

    if pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .is_some()
    {
        return Err(CognitoError::UsernameExists);
    }

    let now = state.clock.now();
    let sub = Uuid::new_v4().to_string();
    // sub is always service-assigned; a caller-supplied one is dropped
    let mut attributes = vec![AttributeType::new("sub", sub.clone())];
    attributes.extend(req.user_attributes.into_iter().filter(|a| a.name != "sub"));

    let mut user = User {
        username: req.username.clone(),
        password: req.password,
        attributes,
        user_status: UserStatus::Unconfirmed,
        enabled: true,
        mfa_options: vec![],
        confirmation_code: None,
        mfa_code: None,
        attribute_verification_code: None,
        refresh_tokens: vec![],
        user_create_date: now,
        user_last_modified_date: now,
    };

    let mut auto_confirmed = false;
    if state.triggers.enabled(TriggerName::PreSignUp) {
        // validationData is deliberately not forwarded here; hooks written
        // against the hosted service see the same omission.
        let outcome = state
            .triggers
            .pre_sign_up(
                ctx,
                TriggerSource::PreSignUpSignUp,
                &req.client_id,
                pool.id(),
                &user.username,
                &user.attributes,
                None,
                req.client_metadata.as_ref(),
            )
            .await?;

        if outcome.auto_confirm_user {
            user.user_status = UserStatus::Confirmed;
            auto_confirmed = true;
        }
        if outcome.auto_verify_email && user.has_attribute("email") {
            user.set_attribute("email_verified", "true");
        }
        if outcome.auto_verify_phone && user.has_attribute("phone_number") {
            user.set_attribute("phone_number_verified", "true");
        }
    }

    let delivery = delivery_target(pool.options(), &user)?;
    if let Some(details) = &delivery {
        let code = state.otp.generate();
        user.confirmation_code = Some(code.clone());
        state
            .messages
            .deliver(
                ctx,
                MessageSource::SignUp,
                &req.client_id,
                pool.id(),
                &user,
                &code,
                req.client_metadata.as_ref(),
                details,
            )
            .await?;
    }

    pool.save_user(ctx, &user).await?;

    if auto_confirmed && state.triggers.enabled(TriggerName::PostConfirmation) {
        let mut attributes = user.attributes.clone();
        attributes.push(AttributeType::new("cognito:user_status", "CONFIRMED"));
        state
            .triggers
            .post_confirmation(
                ctx,
                TriggerSource::PostConfirmationConfirmSignUp,
                &req.client_id,
                pool.id(),
                &user.username,
                &attributes,
                req.client_metadata.as_ref(),
            )
            .await?;
    }

    Ok(SignUpResponse {
        user_confirmed: user.user_status == UserStatus::Confirmed,
        user_sub: sub,
        code_delivery_details: delivery,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmSignUpRequest {
    pub client_id: String,
    pub username: String,
    pub confirmation_code: String,
    #[serde(default)]
    pub client_metadata: Option<Map<String, Value>>,
}

pub async fn confirm_sign_up(
    state: &AppState,
    ctx: &Context,
    req: ConfirmSignUpRequest,
) -> Result<super::Empty, CognitoError> {
    let pool = state
        .cognito
        .get_user_pool_for_client_id(ctx, &req.client_id)
        .await?;

    let mut user = pool
        .get_user_by_username(ctx, &req.username)
        .await?
        .ok_or_else(|| CognitoError::NotAuthorized("User not found".into()))?;

    if user.user_status != UserStatus::Unconfirmed {
        return Err(CognitoError::NotAuthorized(format!(
            "User cannot be confirmed. Current status: {}",
            serde_json::to_value(user.user_status)?.as_str().unwrap_or_default()
        )));
    }
    if user.confirmation_code.as_deref() != Some(req.confirmation_code.as_str()) {
        return Err(CognitoError::CodeMismatch);
    }

    user.user_status = UserStatus::Confirmed;
    user.confirmation_code = None;
    for alias in &pool.options().auto_verified_attributes {
        if user.has_attribute(alias.attribute_name()) {
            user.set_attribute(format!("{}_verified", alias.attribute_name()), "true");
        }
    }
    user.user_last_modified_date = state.clock.now();
    pool.save_user(ctx, &user).await?;

    if state.triggers.enabled(TriggerName::PostConfirmation) {
        let mut attributes = user.attributes.clone();
        attributes.push(AttributeType::new("cognito:user_status", "CONFIRMED"));
        state
            .triggers
            .post_confirmation(
                ctx,
                TriggerSource::PostConfirmationConfirmSignUp,
                &req.client_id,
                pool.id(),
                &user.username,
                &attributes,
                req.client_metadata.as_ref(),
            )
            .await?;
    }

    Ok(super::Empty {})
}

/// Pick the confirmation delivery channel from the pool's auto-verified
/// attributes. Phone wins when both channels are configured and present on
/// the user; a configured pool whose user has no matching attribute is an
/// error.
fn delivery_target(
    pool: &UserPool,
    user: &User,
) -> Result<Option<DeliveryDetails>, CognitoError> {
    if pool.auto_verified_attributes.is_empty() {
        return Ok(None);
    }

    for alias in [AliasAttribute::PhoneNumber, AliasAttribute::Email] {
        if !pool.auto_verified_attributes.contains(&alias) {
            continue;
        }
        if let Some(destination) = user.attribute(alias.attribute_name()) {
            return Ok(Some(DeliveryDetails {
                attribute_name: alias.attribute_name().into(),
                delivery_medium: alias.delivery_medium(),
                destination: destination.into(),
            }));
        }
    }

    Err(CognitoError::InvalidParameter(
        "User has no attribute matching desired auto verified attributes".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryMedium;
    use crate::test_support::{pool_options, test_env, FakeLambda};
    use serde_json::json;

    fn request(client_id: &str) -> SignUpRequest {
        SignUpRequest {
            client_id: client_id.into(),
            username: "alice".into(),
            password: "hunter2".into(),
            user_attributes: vec![AttributeType::new("email", "alice@example.com")],
            validation_data: None,
            client_metadata: None,
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let env = test_env(FakeLambda::disabled()).await;
        env.create_pool(pool_options("local_a")).await;
        let client = env.create_client("local_a").await;

        sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap();
        let err = sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "UsernameExistsError");
    }

    #[tokio::test]
    async fn auto_verified_email_delivers_code_and_persists_unconfirmed() {
        let env = test_env(FakeLambda::disabled()).await;
        let mut options = pool_options("local_a");
        options.auto_verified_attributes = vec![AliasAttribute::Email];
        env.create_pool(options).await;
        let client = env.create_client("local_a").await;

        let response = sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap();

        assert!(!response.user_confirmed);
        let details = response.code_delivery_details.unwrap();
        assert_eq!(details.delivery_medium, DeliveryMedium::Email);
        assert_eq!(details.destination, "alice@example.com");

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Unconfirmed);
        assert_eq!(user.confirmation_code.as_deref(), Some("1234"));
        assert_eq!(user.sub(), response.user_sub);

        let sent = env.delivery.last().unwrap();
        assert_eq!(sent.message.code, "1234");
    }

    #[tokio::test]
    async fn caller_supplied_sub_is_ignored() {
        let env = test_env(FakeLambda::disabled()).await;
        env.create_pool(pool_options("local_a")).await;
        let client = env.create_client("local_a").await;

        let mut req = request(&client.client_id);
        req.user_attributes.push(AttributeType::new("sub", "forged"));

        let response = sign_up(&env.state, &env.ctx(), req).await.unwrap();
        assert_ne!(response.user_sub, "forged");

        let user = env.get_user("local_a", "alice").await.unwrap();
        let subs: Vec<_> = user.attributes.iter().filter(|a| a.name == "sub").collect();
        assert_eq!(subs.len(), 1);
        assert!(uuid::Uuid::parse_str(&subs[0].value).is_ok());
    }

    #[tokio::test]
    async fn phone_preferred_when_both_channels_configured() {
        let env = test_env(FakeLambda::disabled()).await;
        let mut options = pool_options("local_a");
        options.auto_verified_attributes =
            vec![AliasAttribute::Email, AliasAttribute::PhoneNumber];
        env.create_pool(options).await;
        let client = env.create_client("local_a").await;

        let mut req = request(&client.client_id);
        req.user_attributes
            .push(AttributeType::new("phone_number", "+15551234567"));

        let response = sign_up(&env.state, &env.ctx(), req).await.unwrap();
        let details = response.code_delivery_details.unwrap();
        assert_eq!(details.delivery_medium, DeliveryMedium::Sms);
        assert_eq!(details.destination, "+15551234567");
    }

    #[tokio::test]
    async fn missing_auto_verified_attribute_is_invalid_parameter() {
        let env = test_env(FakeLambda::disabled()).await;
        let mut options = pool_options("local_a");
        options.auto_verified_attributes = vec![AliasAttribute::PhoneNumber];
        env.create_pool(options).await;
        let client = env.create_client("local_a").await;

        let err = sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "InvalidParameterError");
        assert!(env.get_user("local_a", "alice").await.is_none());
    }

    #[tokio::test]
    async fn no_auto_verified_attributes_skips_delivery() {
        let env = test_env(FakeLambda::disabled()).await;
        env.create_pool(pool_options("local_a")).await;
        let client = env.create_client("local_a").await;

        let response = sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap();
        assert!(response.code_delivery_details.is_none());
        assert!(env.delivery.all().is_empty());

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert!(user.confirmation_code.is_none());
    }

    #[tokio::test]
    async fn pre_sign_up_auto_confirm_and_verify() {
        let lambda = FakeLambda::with_response(
            TriggerName::PreSignUp,
            json!({
                "autoConfirmUser": true,
                "autoVerifyEmail": true,
                "autoVerifyPhone": false,
            }),
        )
        .and_response(TriggerName::PostConfirmation, json!({}));
        let env = test_env(lambda).await;
        env.create_pool(pool_options("local_a")).await;
        let client = env.create_client("local_a").await;

        let response = sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap();
        assert!(response.user_confirmed);

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Confirmed);
        assert_eq!(user.attribute("email_verified"), Some("true"));
        assert!(user.attribute("phone_number_verified").is_none());

        let events = env.lambda.events();
        let post_confirmation = events
            .iter()
            .find(|e| e.trigger_source == "PostConfirmation_ConfirmSignUp")
            .unwrap();
        assert_eq!(
            post_confirmation.request["userAttributes"]["cognito:user_status"],
            "CONFIRMED"
        );
    }

    #[tokio::test]
    async fn failing_pre_sign_up_surfaces_validation_error() {
        let env = test_env(FakeLambda::failing("rejected by hook")).await;
        env.create_pool(pool_options("local_a")).await;
        let client = env.create_client("local_a").await;

        let err = sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "UserLambdaValidationError");
        assert!(env.get_user("local_a", "alice").await.is_none());
    }

    #[tokio::test]
    async fn confirm_with_stored_code_clears_it_and_confirms() {
        let env = test_env(FakeLambda::disabled()).await;
        let mut options = pool_options("local_a");
        options.auto_verified_attributes = vec![AliasAttribute::Email];
        env.create_pool(options).await;
        let client = env.create_client("local_a").await;

        sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap();

        confirm_sign_up(
            &env.state,
            &env.ctx(),
            ConfirmSignUpRequest {
                client_id: client.client_id.clone(),
                username: "alice".into(),
                confirmation_code: "1234".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap();

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Confirmed);
        assert!(user.confirmation_code.is_none());
        assert_eq!(user.attribute("email_verified"), Some("true"));

        // replay with the same code: the user is already confirmed
        let err = confirm_sign_up(
            &env.state,
            &env.ctx(),
            ConfirmSignUpRequest {
                client_id: client.client_id.clone(),
                username: "alice".into(),
                confirmation_code: "1234".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "NotAuthorizedError");
    }

    #[tokio::test]
    async fn wrong_code_leaves_user_unconfirmed() {
        let env = test_env(FakeLambda::disabled()).await;
        let mut options = pool_options("local_a");
        options.auto_verified_attributes = vec![AliasAttribute::Email];
        env.create_pool(options).await;
        let client = env.create_client("local_a").await;

        sign_up(&env.state, &env.ctx(), request(&client.client_id))
            .await
            .unwrap();

        let err = confirm_sign_up(
            &env.state,
            &env.ctx(),
            ConfirmSignUpRequest {
                client_id: client.client_id.clone(),
                username: "alice".into(),
                confirmation_code: "9999".into(),
                client_metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), "CodeMismatchError");

        let user = env.get_user("local_a", "alice").await.unwrap();
        assert_eq!(user.user_status, UserStatus::Unconfirmed);
        assert_eq!(user.confirmation_code.as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn unknown_client_is_resource_not_found() {
        let env = test_env(FakeLambda::disabled()).await;
        let err = sign_up(&env.state, &env.ctx(), request("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ResourceNotFoundError");
    }
}
