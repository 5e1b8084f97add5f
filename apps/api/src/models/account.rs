use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A connected publishing account. Owns the remote credentials and the
/// default posting slot used when an automation does not override it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub ig_user_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub timezone: Option<String>,
    /// Local `HH:MM`.
    pub daily_post_time: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
