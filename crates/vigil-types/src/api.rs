use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::{Role, UserRecord};

// -- Identity --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElevateRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ElevateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

// -- Admin control --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetLimitRequest {
    /// Daily limit in minutes. Must be positive.
    pub minutes: u32,
}

#[derive(Debug, Serialize)]
pub struct ListRecordsResponse {
    pub users: BTreeMap<String, UserRecord>,
}

// -- Comments --

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub author_display_name: String,
    pub author_profile_image_url: String,
    pub text_display: String,
    pub like_count: u64,
    pub published_at: String,
}
