//! Operation router: a closed map from wire operation names to typed
//! target handlers.
//!
//! The HTTP boundary hands in `(operation, json-body)`; this is the last
//! point where requests are untyped. Each arm deserializes into the
//! target's request shape, runs it, and serializes the typed response.

use serde_json::Value;

use crate::context::Context;
use crate::error::CognitoError;
use crate::targets;
use crate::AppState;

pub async fn route(
    state: &AppState,
    ctx: &Context,
    operation: &str,
    body: Value,
) -> Result<Value, CognitoError> {
    tracing::info!(request_id = %ctx.request_id, operation, "handling request");

    macro_rules! target {
        ($handler:path) => {{
            let request = serde_json::from_value(body).map_err(|e| {
                CognitoError::InvalidParameter(format!("Invalid request body: {e}"))
            })?;
            let response = $handler(state, ctx, request).await?;
            serde_json::to_value(response)?
        }};
    }

    Ok(match operation {
        "AdminConfirmSignUp" => target!(targets::users::admin_confirm_sign_up),
        "AdminCreateUser" => target!(targets::users::admin_create_user),
        "AdminDeleteUser" => target!(targets::users::admin_delete_user),
        "AdminDeleteUserAttributes" => target!(targets::attributes::admin_delete_user_attributes),
        "AdminGetUser" => target!(targets::users::admin_get_user),
        "AdminInitiateAuth" => target!(targets::initiate_auth::admin_initiate_auth),
        "AdminSetUserPassword" => target!(targets::password::admin_set_user_password),
        "AdminUpdateUserAttributes" => target!(targets::attributes::admin_update_user_attributes),
        "ChangePassword" => target!(targets::password::change_password),
        "ConfirmForgotPassword" => target!(targets::password::confirm_forgot_password),
        "ConfirmSignUp" => target!(targets::sign_up::confirm_sign_up),
        "CreateGroup" => target!(targets::groups::create_group),
        "CreateUserPool" => target!(targets::pools::create_user_pool),
        "CreateUserPoolClient" => target!(targets::clients::create_user_pool_client),
        "DeleteUser" => target!(targets::users::delete_user),
        "DeleteUserAttributes" => target!(targets::attributes::delete_user_attributes),
        "DeleteUserPool" => target!(targets::pools::delete_user_pool),
        "DeleteUserPoolClient" => target!(targets::clients::delete_user_pool_client),
        "DescribeUserPool" => target!(targets::pools::describe_user_pool),
        "DescribeUserPoolClient" => target!(targets::clients::describe_user_pool_client),
        "ForgotPassword" => target!(targets::password::forgot_password),
        "GetUser" => target!(targets::users::get_user),
        "GetUserAttributeVerificationCode" => {
            target!(targets::attributes::get_user_attribute_verification_code)
        }
        "GetUserPoolMfaConfig" => target!(targets::pools::get_user_pool_mfa_config),
        "InitiateAuth" => target!(targets::initiate_auth::initiate_auth),
        "ListGroups" => target!(targets::groups::list_groups),
        "ListUserPools" => target!(targets::pools::list_user_pools),
        "ListUsers" => target!(targets::users::list_users),
        "RespondToAuthChallenge" => target!(targets::initiate_auth::respond_to_auth_challenge),
        "RevokeToken" => target!(targets::tokens::revoke_token),
        "SignUp" => target!(targets::sign_up::sign_up),
        "UpdateUserAttributes" => target!(targets::attributes::update_user_attributes),
        "VerifyUserAttribute" => target!(targets::attributes::verify_user_attribute),
        _ => return Err(CognitoError::Unsupported(operation.to_string())),
    })
}
