use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    /// Position in the applicant list: accepted first, rejected last.
    pub fn priority(&self) -> u8 {
        match self {
            ApplicationStatus::Accepted => 0,
            ApplicationStatus::Pending => 1,
            ApplicationStatus::Rejected => 2,
        }
    }
}

/// What views show. A rescinded offer keeps `status == accepted` in storage
/// but never displays as plainly accepted.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Pending,
    Accepted,
    Rescinded,
    Rejected,
}

/// The applicant's answer to an acceptance.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentState {
    Awaiting,
    Committed,
    Withdrawn,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct Application {
    pub pid: Uuid,
    /// Uid of the applicant.
    pub uid: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    pub email: Option<String>,
    pub education: String,
    pub current_employment: Option<String>,
    pub resume: Option<String>,
    pub resume_link: Option<String>,
    pub portfolio_link: Option<String>,
    /// Aligned positionally with the position's questions.
    pub answers: Vec<String>,
    pub status: ApplicationStatus,
    /// None until the applicant responds to an acceptance.
    pub committed: Option<bool>,
    pub bookmarked: bool,
    pub rescinded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

impl Application {
    pub fn display_status(&self) -> DisplayStatus {
        match self.status {
            ApplicationStatus::Pending => DisplayStatus::Pending,
            ApplicationStatus::Accepted if self.rescinded => DisplayStatus::Rescinded,
            ApplicationStatus::Accepted => DisplayStatus::Accepted,
            ApplicationStatus::Rejected => DisplayStatus::Rejected,
        }
    }

    pub fn commitment(&self) -> CommitmentState {
        match self.committed {
            None => CommitmentState::Awaiting,
            Some(true) => CommitmentState::Committed,
            Some(false) => CommitmentState::Withdrawn,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SubmitApplicationRequest {
    /// Defaults to the name on the caller's account.
    pub full_name: Option<String>,
    #[serde(default)]
    pub education: String,
    pub current_employment: Option<String>,
    pub resume: Option<String>,
    pub resume_link: Option<String>,
    pub portfolio_link: Option<String>,
    #[serde(default)]
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct StatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CommitmentRequest {
    pub committed: bool,
}
