//! Operation handlers, one function per wire operation, grouped by flow.
//!
//! Each handler follows the same pattern: resolve the pool (404 on miss),
//! resolve or mutate the user/group/client, persist, and fire the triggers
//! the flow calls for.

pub mod attributes;
pub mod clients;
pub mod groups;
pub mod initiate_auth;
pub mod password;
pub mod pools;
pub mod sign_up;
pub mod tokens;
pub mod users;

use serde::Serialize;

/// Response for operations whose wire shape is an empty JSON object.
#[derive(Debug, Serialize)]
pub struct Empty {}
