use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    Remote,
    OnSite,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Remote => "remote",
            LocationType::OnSite => "on-site",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct Position {
    #[schema(example = "f1e2d3c4-b5a6-7890-1234-567890abcdef")]
    pub pid: Uuid,
    /// Uid of the owning organization account.
    pub oid: String,
    #[schema(example = "Riverside Food Bank")]
    pub organization_name: String,
    pub organization_email: String,
    #[schema(example = "Weekend Pantry Helper")]
    pub title: String,
    pub description: String,
    pub requirements: String,
    #[schema(example = "community service")]
    pub position_type: String,
    /// Absent for remote positions.
    pub location: Option<String>,
    pub location_type: LocationType,
    pub questions: Vec<String>,
    pub require_resume: bool,
    pub visible: bool,
    pub locked: bool,
    pub total_slots: u32,
    pub open_slots: u32,
    pub committed_applicants: u32,
    pub total_applicants: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Zero until first persisted; bumped by the store on every write.
    #[serde(default)]
    pub revision: u64,
}

impl Position {
    /// Visible and still taking applications.
    pub fn is_active(&self) -> bool {
        self.visible && !self.locked
    }

    pub fn is_hidden(&self) -> bool {
        !self.visible && !self.locked
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePositionRequest {
    #[schema(example = "Weekend Pantry Helper")]
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    pub position_type: String,
    pub location: Option<String>,
    pub location_type: LocationType,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub require_resume: bool,
    #[schema(example = 4)]
    pub total_slots: u32,
}

/// Editable fields of a position. Slot counts are not editable.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdatePositionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub position_type: Option<String>,
    pub location: Option<String>,
    pub location_type: Option<LocationType>,
    pub questions: Option<Vec<String>>,
    pub require_resume: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct VisibilityRequest {
    pub visible: bool,
}
