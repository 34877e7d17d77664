//! Domain model for user pools, app clients, users and groups.
//!
//! These are both the persisted document shapes and (modulo a few
//! transient fields) the wire shapes, so everything serializes with the
//! AWS-style PascalCase field names SDK clients expect. Timestamps go over
//! the wire as epoch seconds, matching `application/x-amz-json-1.1`.

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Attributes
// ─────────────────────────────────────────────────────────────────────────────

/// A single `{Name, Value}` user attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeType {
    pub name: String,
    pub value: String,
}

impl AttributeType {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Look up an attribute value by name in an attribute list.
pub fn attribute_value<'a>(attributes: &'a [AttributeType], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
}

/// Upsert an attribute: replace the value if the name exists, append
/// otherwise. Keeps insertion order for new names.
pub fn attributes_append(attributes: &mut Vec<AttributeType>, attr: AttributeType) {
    match attributes.iter_mut().find(|a| a.name == attr.name) {
        Some(existing) => existing.value = attr.value,
        None => attributes.push(attr),
    }
}

/// Remove attributes by name. Unknown names are ignored.
pub fn attributes_remove(attributes: &mut Vec<AttributeType>, names: &[String]) {
    attributes.retain(|a| !names.iter().any(|n| n == &a.name));
}

/// Flatten an attribute list into a `{name: value}` JSON object, the shape
/// trigger event envelopes carry.
pub fn attributes_to_map(attributes: &[AttributeType]) -> serde_json::Map<String, serde_json::Value> {
    attributes
        .iter()
        .map(|a| (a.name.clone(), serde_json::Value::String(a.value.clone())))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Unconfirmed,
    Confirmed,
    ForceChangePassword,
    ResetRequired,
    Archived,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MfaConfiguration {
    #[default]
    Off,
    Optional,
    On,
}

/// Attributes that may alias the login name, and channels that auto-receive
/// confirmation codes. The service only recognizes these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAttribute {
    Email,
    PhoneNumber,
}

impl AliasAttribute {
    pub fn attribute_name(&self) -> &'static str {
        match self {
            AliasAttribute::Email => "email",
            AliasAttribute::PhoneNumber => "phone_number",
        }
    }

    pub fn delivery_medium(&self) -> DeliveryMedium {
        match self {
            AliasAttribute::Email => DeliveryMedium::Email,
            AliasAttribute::PhoneNumber => DeliveryMedium::Sms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMedium {
    Sms,
    Email,
}

// ─────────────────────────────────────────────────────────────────────────────
// User pool
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of a pool's attribute schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaAttribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_data_type: Option<String>,
    #[serde(default = "default_true")]
    pub mutable: bool,
    #[serde(default)]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

impl SchemaAttribute {
    fn standard(name: &str) -> Self {
        Self {
            name: name.into(),
            attribute_data_type: Some("String".into()),
            mutable: true,
            required: false,
        }
    }
}

/// The standard attribute schema every new pool starts from. `sub` is the
/// only immutable entry; caller-supplied schema attributes merge over these
/// by name.
pub fn default_schema() -> Vec<SchemaAttribute> {
    let mut schema = vec![SchemaAttribute {
        name: "sub".into(),
        attribute_data_type: Some("String".into()),
        mutable: false,
        required: true,
    }];
    for name in [
        "name",
        "given_name",
        "family_name",
        "middle_name",
        "nickname",
        "preferred_username",
        "profile",
        "picture",
        "website",
        "email",
        "email_verified",
        "gender",
        "birthdate",
        "zoneinfo",
        "locale",
        "phone_number",
        "phone_number_verified",
        "address",
        "updated_at",
    ] {
        schema.push(SchemaAttribute::standard(name));
    }
    schema
}

/// Top-level tenant configuration, persisted under the pool document's
/// `Options` key and returned verbatim by DescribeUserPool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPool {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub username_attributes: Vec<AliasAttribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_verified_attributes: Vec<AliasAttribute>,
    #[serde(default)]
    pub mfa_configuration: MfaConfiguration,
    #[serde(default = "default_schema")]
    pub schema_attributes: Vec<SchemaAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms_verification_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms_configuration: Option<serde_json::Value>,
    #[serde(with = "ts_seconds")]
    pub creation_date: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub last_modified_date: DateTime<Utc>,
}

impl UserPool {
    /// Whether an attribute name may be used as a login alias in this pool.
    pub fn alias_enabled(&self, alias: AliasAttribute) -> bool {
        self.username_attributes.contains(&alias)
    }

    pub fn schema_attribute(&self, name: &str) -> Option<&SchemaAttribute> {
        self.schema_attributes.iter().find(|s| s.name == name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// App client
// ─────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_REFRESH_TOKEN_VALIDITY_DAYS: u32 = 30;

/// A credential holder scoped to exactly one user pool, stored in the
/// shared clients document keyed by `ClientId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppClient {
    pub client_id: String,
    pub client_name: String,
    pub user_pool_id: String,
    #[serde(default = "default_refresh_token_validity")]
    pub refresh_token_validity: u32,
    #[serde(with = "ts_seconds")]
    pub creation_date: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub last_modified_date: DateTime<Utc>,
}

fn default_refresh_token_validity() -> u32 {
    DEFAULT_REFRESH_TOKEN_VALIDITY_DAYS
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MfaOption {
    pub delivery_medium: DeliveryMedium,
    pub attribute_name: String,
}

/// A user record as persisted under `Users/<Username>`. Transient challenge
/// secrets (`ConfirmationCode`, `MFACode`, `AttributeVerificationCode`)
/// live here too; they are cleared on successful use and never leave the
/// process on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub username: String,
    pub password: String,
    pub attributes: Vec<AttributeType>,
    pub user_status: UserStatus,
    pub enabled: bool,
    #[serde(rename = "MFAOptions", default, skip_serializing_if = "Vec::is_empty")]
    pub mfa_options: Vec<MfaOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_code: Option<String>,
    #[serde(rename = "MFACode", default, skip_serializing_if = "Option::is_none")]
    pub mfa_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_verification_code: Option<String>,
    #[serde(default)]
    pub refresh_tokens: Vec<String>,
    #[serde(with = "ts_seconds")]
    pub user_create_date: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub user_last_modified_date: DateTime<Utc>,
}

impl User {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        attribute_value(&self.attributes, name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// The immutable `sub` attribute assigned at creation.
    pub fn sub(&self) -> &str {
        self.attribute("sub").unwrap_or_default()
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        attributes_append(&mut self.attributes, AttributeType::new(name, value));
    }

    /// An SMS MFA option bound to an attribute holding a phone number, if
    /// the user has one configured.
    pub fn sms_mfa_option(&self) -> Option<&MfaOption> {
        self.mfa_options
            .iter()
            .find(|o| o.delivery_medium == DeliveryMedium::Sms)
    }

    /// Wire shape for list/admin-create responses.
    pub fn to_summary(&self) -> UserSummary {
        UserSummary {
            username: self.username.clone(),
            attributes: self.attributes.clone(),
            enabled: self.enabled,
            user_status: self.user_status,
            mfa_options: self.mfa_options.clone(),
            user_create_date: self.user_create_date,
            user_last_modified_date: self.user_last_modified_date,
        }
    }
}

/// The public `UserType` wire shape: what ListUsers and AdminCreateUser
/// return. Passwords and challenge secrets never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserSummary {
    pub username: String,
    pub attributes: Vec<AttributeType>,
    pub enabled: bool,
    pub user_status: UserStatus,
    #[serde(rename = "MFAOptions", default, skip_serializing_if = "Vec::is_empty")]
    pub mfa_options: Vec<MfaOption>,
    #[serde(with = "ts_seconds")]
    pub user_create_date: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub user_last_modified_date: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Group
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    pub group_name: String,
    pub user_pool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precedence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(with = "ts_seconds")]
    pub creation_date: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub last_modified_date: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Code delivery
// ─────────────────────────────────────────────────────────────────────────────

/// The `CodeDeliveryDetails` wire shape attached to responses that send an
/// OTP somewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeliveryDetails {
    pub attribute_name: String,
    pub delivery_medium: DeliveryMedium,
    pub destination: String,
}
