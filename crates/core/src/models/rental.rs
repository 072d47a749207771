//! Rental plans and entitlement grants

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rental plan: how long a grant lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    #[serde(rename = "24")]
    Hours24,
    #[serde(rename = "48")]
    Hours48,
    #[serde(rename = "72")]
    Hours72,
}

impl Plan {
    pub fn duration(&self) -> Duration {
        match self {
            Plan::Hours24 => Duration::hours(24),
            Plan::Hours48 => Duration::hours(48),
            Plan::Hours72 => Duration::hours(72),
        }
    }

    pub fn price_cents(&self) -> u32 {
        match self {
            Plan::Hours24 => 399,
            Plan::Hours48 => 499,
            Plan::Hours72 => 599,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Hours24 => "24",
            Plan::Hours48 => "48",
            Plan::Hours72 => "72",
        }
    }

    /// Parse the stored plan label ("24"/"48"/"72")
    pub fn parse(s: &str) -> Option<Plan> {
        match s {
            "24" => Some(Plan::Hours24),
            "48" => Some(Plan::Hours48),
            "72" => Some(Plan::Hours72),
            _ => None,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed entitlement to view one video
///
/// Lifecycle: nonexistent → active (on grant) → expired (time passes,
/// irreversible). A re-grant is a new instance, never a resurrection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rental {
    pub id: Uuid,
    pub video_id: String,
    /// None for device-scoped grants made with no resolved identity
    pub user_id: Option<Uuid>,
    pub plan: Plan,
    pub price_cents: u32,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Rental {
    /// Grant at an explicit instant; `expires_at = at + plan.duration()`
    pub fn grant_at(
        video_id: String,
        user_id: Option<Uuid>,
        plan: Plan,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id,
            user_id,
            plan,
            price_cents: plan.price_cents(),
            granted_at: at,
            expires_at: at + plan.duration(),
        }
    }

    pub fn grant(video_id: String, user_id: Option<Uuid>, plan: Plan) -> Self {
        Self::grant_at(video_id, user_id, plan, Utc::now())
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        at < self.expires_at
    }
}
