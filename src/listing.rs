//! Filtered, sorted views over positions and applications.
//!
//! Everything here is a pure projection of already-loaded records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::model::{Application, ApplicationStatus, CommitmentState, DisplayStatus};
use crate::lifecycle::can_rescind;
use crate::position::model::Position;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatusFilter {
    #[default]
    All,
    Active,
    Hidden,
    Locked,
}

impl PositionStatusFilter {
    fn accepts(&self, position: &Position) -> bool {
        match self {
            PositionStatusFilter::All => true,
            PositionStatusFilter::Active => position.is_active(),
            PositionStatusFilter::Hidden => position.is_hidden(),
            PositionStatusFilter::Locked => position.locked,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PositionFilter {
    /// Case-insensitive match on title, description, organization, requirements and type.
    pub search: Option<String>,
    /// `remote` or `on-site`.
    pub location_type: Option<String>,
    pub position_type: Option<String>,
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub status: PositionStatusFilter,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApplicationFilter {
    #[param(value_type = Option<String>)]
    pub status: Option<DisplayStatus>,
    #[serde(default)]
    pub bookmarked: bool,
    /// Case-insensitive match on the applicant's name.
    pub search: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

pub fn filter_positions(positions: &[Position], filter: &PositionFilter) -> Vec<Position> {
    let search = non_empty(&filter.search);
    let location_type = non_empty(&filter.location_type);
    let position_type = non_empty(&filter.position_type);

    positions
        .iter()
        .filter(|p| {
            search.as_deref().map_or(true, |term| {
                contains(&p.title, term)
                    || contains(&p.description, term)
                    || contains(&p.organization_name, term)
                    || contains(&p.requirements, term)
                    || contains(&p.position_type, term)
            })
        })
        .filter(|p| {
            location_type
                .as_deref()
                .map_or(true, |lt| p.location_type.as_str() == lt)
        })
        .filter(|p| {
            position_type
                .as_deref()
                .map_or(true, |pt| p.position_type.to_lowercase() == pt)
        })
        .filter(|p| filter.status.accepts(p))
        .cloned()
        .collect()
}

pub fn filter_applications(
    applications: &[Application],
    filter: &ApplicationFilter,
) -> Vec<Application> {
    let search = non_empty(&filter.search);

    let mut matched: Vec<Application> = applications
        .iter()
        .filter(|a| filter.status.map_or(true, |s| a.display_status() == s))
        .filter(|a| !filter.bookmarked || a.bookmarked)
        .filter(|a| {
            search
                .as_deref()
                .map_or(true, |term| contains(&a.full_name, term))
        })
        .cloned()
        .collect();
    // sort_by_key is stable, so equal priorities keep their input order.
    matched.sort_by_key(|a| a.status.priority());
    matched
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardMetrics {
    pub active_positions: usize,
    pub completed_positions: usize,
    pub total_applications: usize,
    pub pending_reviews: usize,
}

pub fn dashboard_metrics(positions: &[Position], applications: &[Application]) -> DashboardMetrics {
    DashboardMetrics {
        active_positions: positions.iter().filter(|p| p.is_active()).count(),
        completed_positions: positions.iter().filter(|p| p.locked).count(),
        total_applications: applications.len(),
        pending_reviews: applications
            .iter()
            .filter(|a| a.status == ApplicationStatus::Pending)
            .count(),
    }
}

/// One accepted applicant on the review overview.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OverviewEntry {
    pub uid: String,
    pub full_name: String,
    pub email: Option<String>,
    pub status: DisplayStatus,
    pub commitment: CommitmentState,
    pub can_rescind: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PositionOverview {
    pub pid: Uuid,
    pub title: String,
    pub locked: bool,
    pub total_slots: u32,
    pub open_slots: u32,
    pub committed_applicants: u32,
    pub total_applicants: u32,
    pub accepted: Vec<OverviewEntry>,
}

pub fn position_overview(
    position: &Position,
    applications: &[Application],
    now: DateTime<Utc>,
) -> PositionOverview {
    let accepted = applications
        .iter()
        .filter(|a| a.pid == position.pid && a.status == ApplicationStatus::Accepted)
        .map(|a| OverviewEntry {
            uid: a.uid.clone(),
            full_name: a.full_name.clone(),
            email: a.email.clone(),
            status: a.display_status(),
            commitment: a.commitment(),
            can_rescind: can_rescind(a, now),
            updated_at: a.updated_at,
        })
        .collect();

    PositionOverview {
        pid: position.pid,
        title: position.title.clone(),
        locked: position.locked,
        total_slots: position.total_slots,
        open_slots: position.open_slots,
        committed_applicants: position.committed_applicants,
        total_applicants: position.total_applicants,
        accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::model::LocationType;
    use chrono::Duration;

    fn position(title: &str, position_type: &str, location_type: LocationType) -> Position {
        let now = Utc::now();
        Position {
            pid: Uuid::new_v4(),
            oid: "org-1".to_string(),
            organization_name: "Riverside Food Bank".to_string(),
            organization_email: String::new(),
            title: title.to_string(),
            description: "Help the community".to_string(),
            requirements: "Friendly attitude".to_string(),
            position_type: position_type.to_string(),
            location: None,
            location_type,
            questions: vec![],
            require_resume: false,
            visible: true,
            locked: false,
            total_slots: 2,
            open_slots: 2,
            committed_applicants: 0,
            total_applicants: 0,
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }

    fn application(pid: Uuid, uid: &str, name: &str, status: ApplicationStatus) -> Application {
        let now = Utc::now();
        Application {
            pid,
            uid: uid.to_string(),
            full_name: name.to_string(),
            email: None,
            education: String::new(),
            current_employment: None,
            resume: None,
            resume_link: None,
            portfolio_link: None,
            answers: vec![],
            status,
            committed: None,
            bookmarked: false,
            rescinded: false,
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }

    fn sample_positions() -> Vec<Position> {
        let active = position("Pantry Helper", "Community Service", LocationType::OnSite);
        let mut hidden = position("Remote Tutor", "Education", LocationType::Remote);
        hidden.visible = false;
        let mut locked = position("Park Cleanup", "Environment", LocationType::OnSite);
        locked.locked = true;
        vec![active, hidden, locked]
    }

    #[test]
    fn test_status_filter_partitions_positions() {
        let positions = sample_positions();
        let titles = |status| {
            let filter = PositionFilter {
                status,
                ..Default::default()
            };
            filter_positions(&positions, &filter)
                .into_iter()
                .map(|p| p.title)
                .collect::<Vec<_>>()
        };

        assert_eq!(titles(PositionStatusFilter::All).len(), 3);
        assert_eq!(titles(PositionStatusFilter::Active), vec!["Pantry Helper"]);
        assert_eq!(titles(PositionStatusFilter::Hidden), vec!["Remote Tutor"]);
        assert_eq!(titles(PositionStatusFilter::Locked), vec!["Park Cleanup"]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let positions = sample_positions();
        let search = |term: &str| {
            let filter = PositionFilter {
                search: Some(term.to_string()),
                ..Default::default()
            };
            filter_positions(&positions, &filter).len()
        };

        assert_eq!(search("TUTOR"), 1);
        assert_eq!(search("riverside"), 3);
        assert_eq!(search("environment"), 1);
        assert_eq!(search("nothing like this"), 0);
        assert_eq!(search("   "), 3);
    }

    #[test]
    fn test_type_filters_use_case_insensitive_equality() {
        let positions = sample_positions();
        let filter = PositionFilter {
            location_type: Some("ON-SITE".to_string()),
            position_type: Some("community service".to_string()),
            ..Default::default()
        };
        let found = filter_positions(&positions, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Pantry Helper");

        let partial = PositionFilter {
            position_type: Some("community".to_string()),
            ..Default::default()
        };
        assert!(filter_positions(&positions, &partial).is_empty());
    }

    #[test]
    fn test_filter_positions_is_idempotent_and_keeps_order() {
        let positions = sample_positions();
        let filter = PositionFilter {
            search: Some("e".to_string()),
            ..Default::default()
        };
        let once = filter_positions(&positions, &filter);
        let twice = filter_positions(&once, &filter);
        assert_eq!(once, twice);
        let pids: Vec<Uuid> = positions.iter().map(|p| p.pid).collect();
        let kept: Vec<Uuid> = once.iter().map(|p| p.pid).collect();
        assert_eq!(kept, pids);
    }

    #[test]
    fn test_applications_sorted_by_priority_stably() {
        let pid = Uuid::new_v4();
        let apps = vec![
            application(pid, "u1", "Rita", ApplicationStatus::Rejected),
            application(pid, "u2", "Pat", ApplicationStatus::Pending),
            application(pid, "u3", "Ada", ApplicationStatus::Accepted),
            application(pid, "u4", "Paul", ApplicationStatus::Pending),
            application(pid, "u5", "Alan", ApplicationStatus::Accepted),
        ];

        let sorted = filter_applications(&apps, &ApplicationFilter::default());
        let uids: Vec<&str> = sorted.iter().map(|a| a.uid.as_str()).collect();
        assert_eq!(uids, vec!["u3", "u5", "u2", "u4", "u1"]);
        assert_eq!(filter_applications(&sorted, &ApplicationFilter::default()), sorted);
    }

    #[test]
    fn test_application_filters() {
        let pid = Uuid::new_v4();
        let mut bookmarked = application(pid, "u1", "Grace Hopper", ApplicationStatus::Pending);
        bookmarked.bookmarked = true;
        let mut rescinded = application(pid, "u2", "Alan Turing", ApplicationStatus::Accepted);
        rescinded.rescinded = true;
        let accepted = application(pid, "u3", "Ada Lovelace", ApplicationStatus::Accepted);
        let apps = vec![bookmarked, rescinded, accepted];

        let only_bookmarked = ApplicationFilter {
            bookmarked: true,
            ..Default::default()
        };
        assert_eq!(filter_applications(&apps, &only_bookmarked).len(), 1);

        let accepted_only = ApplicationFilter {
            status: Some(DisplayStatus::Accepted),
            ..Default::default()
        };
        let found = filter_applications(&apps, &accepted_only);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uid, "u3");

        let by_name = ApplicationFilter {
            search: Some("TURING".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_applications(&apps, &by_name)[0].uid, "u2");
    }

    #[test]
    fn test_dashboard_metrics_counts() {
        let positions = sample_positions();
        let pid = positions[0].pid;
        let apps = vec![
            application(pid, "u1", "A", ApplicationStatus::Pending),
            application(pid, "u2", "B", ApplicationStatus::Pending),
            application(pid, "u3", "C", ApplicationStatus::Accepted),
        ];

        let metrics = dashboard_metrics(&positions, &apps);
        assert_eq!(
            metrics,
            DashboardMetrics {
                active_positions: 1,
                completed_positions: 1,
                total_applications: 3,
                pending_reviews: 2,
            }
        );
    }

    #[test]
    fn test_overview_lists_accepted_with_rescind_flag() {
        let p = position("Pantry Helper", "Community Service", LocationType::OnSite);
        let now = Utc::now();
        let mut stale = application(p.pid, "u1", "Old Offer", ApplicationStatus::Accepted);
        stale.updated_at = now - Duration::days(4);
        let fresh = application(p.pid, "u2", "New Offer", ApplicationStatus::Accepted);
        let pending = application(p.pid, "u3", "Waiting", ApplicationStatus::Pending);

        let overview = position_overview(&p, &[stale, fresh, pending], now);
        assert_eq!(overview.accepted.len(), 2);
        assert!(overview.accepted[0].can_rescind);
        assert!(!overview.accepted[1].can_rescind);
        assert_eq!(overview.accepted[0].commitment, CommitmentState::Awaiting);
        assert_eq!(overview.open_slots, 2);
    }
}
