use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display summary of a user, read through the gateway for event payloads.
/// Account management itself lives outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}
