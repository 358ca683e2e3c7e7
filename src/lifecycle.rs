//! Lifecycle reconciliation for positions and applications.
//!
//! Every function here is pure. It takes the latest persisted records, the
//! caller and the current time, and returns either the next records or the
//! reason the transition is refused. Persisting the result is the caller's job.
//!
//! Slot accounting is decoupled from review: accepting or rejecting an
//! applicant never touches `open_slots` or `committed_applicants`. Only an
//! applicant's commitment consumes a slot.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::application::model::{Application, ApplicationStatus, SubmitApplicationRequest};
use crate::auth::model::ActorContext;
use crate::error::CoreError;
use crate::position::model::{CreatePositionRequest, LocationType, Position, UpdatePositionRequest};

/// Days an accepted applicant has to respond before the offer can be rescinded.
pub const RESCIND_WINDOW_DAYS: i64 = 3;

lazy_static! {
    static ref HTTP_URL: Regex =
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url pattern");
}

/// Result of a successful submission: the new application and the position
/// with its applicant counter bumped.
#[derive(Debug, Clone)]
pub struct Submission {
    pub position: Position,
    pub application: Application,
}

/// Result of an applicant responding to an acceptance. `position` is only
/// present when a slot was consumed.
#[derive(Debug, Clone)]
pub struct Commitment {
    pub position: Option<Position>,
    pub application: Application,
}

pub fn rescind_window() -> Duration {
    Duration::days(RESCIND_WINDOW_DAYS)
}

/// Organization account owning `position`.
pub fn ensure_owner(actor: &ActorContext, position: &Position) -> Result<(), CoreError> {
    if !actor.is_organization() {
        return Err(CoreError::authorization(
            "only organization accounts can manage positions",
        ));
    }
    if actor.uid != position.oid {
        return Err(CoreError::authorization(format!(
            "position {} belongs to another organization",
            position.pid
        )));
    }
    Ok(())
}

fn ensure_unlocked(position: &Position) -> Result<(), CoreError> {
    if position.locked {
        return Err(CoreError::Locked(position.pid));
    }
    Ok(())
}

fn ensure_belongs(position: &Position, application: &Application) -> Result<(), CoreError> {
    if application.pid != position.pid {
        return Err(CoreError::validation(format!(
            "application of {} does not belong to position {}",
            application.uid, position.pid
        )));
    }
    Ok(())
}

fn required(value: &str, message: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(message));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_link(field: &str, value: Option<String>) -> Result<Option<String>, CoreError> {
    match optional_text(value) {
        Some(link) if !HTTP_URL.is_match(&link) => Err(CoreError::validation(format!(
            "{} must be an http(s) URL",
            field
        ))),
        other => Ok(other),
    }
}

fn normalize_location(
    location_type: LocationType,
    location: Option<String>,
) -> Result<Option<String>, CoreError> {
    match location_type {
        LocationType::Remote => Ok(None),
        LocationType::OnSite => optional_text(location)
            .map(Some)
            .ok_or_else(|| {
                CoreError::validation("Please provide a location for on-site positions.")
            }),
    }
}

fn normalize_questions(questions: Vec<String>) -> Vec<String> {
    questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

pub fn create_position(
    actor: &ActorContext,
    draft: CreatePositionRequest,
    now: DateTime<Utc>,
) -> Result<Position, CoreError> {
    if !actor.is_organization() {
        return Err(CoreError::authorization(
            "only organization accounts can create positions",
        ));
    }
    let title = required(&draft.title, "Position title is required.")?;
    let position_type = required(&draft.position_type, "Please select a position type.")?;
    if draft.total_slots == 0 {
        return Err(CoreError::validation(
            "A position needs at least one open slot.",
        ));
    }
    let location = normalize_location(draft.location_type, draft.location)?;

    Ok(Position {
        pid: Uuid::new_v4(),
        oid: actor.uid.clone(),
        organization_name: actor.name.clone().unwrap_or_default(),
        organization_email: actor.email.clone().unwrap_or_default(),
        title,
        description: draft.description.trim().to_string(),
        requirements: draft.requirements.trim().to_string(),
        position_type,
        location,
        location_type: draft.location_type,
        questions: normalize_questions(draft.questions),
        require_resume: draft.require_resume,
        visible: true,
        locked: false,
        total_slots: draft.total_slots,
        open_slots: draft.total_slots,
        committed_applicants: 0,
        total_applicants: 0,
        created_at: now,
        updated_at: now,
        revision: 0,
    })
}

pub fn edit_position(
    actor: &ActorContext,
    position: &Position,
    changes: UpdatePositionRequest,
    now: DateTime<Utc>,
) -> Result<Position, CoreError> {
    ensure_unlocked(position)?;
    ensure_owner(actor, position)?;

    let mut next = position.clone();
    if let Some(title) = changes.title {
        next.title = required(&title, "Position title is required.")?;
    }
    if let Some(description) = changes.description {
        next.description = description.trim().to_string();
    }
    if let Some(requirements) = changes.requirements {
        next.requirements = requirements.trim().to_string();
    }
    if let Some(position_type) = changes.position_type {
        next.position_type = required(&position_type, "Please select a position type.")?;
    }
    if let Some(questions) = changes.questions {
        let questions = normalize_questions(questions);
        // Answers are stored positionally against the question list.
        if questions != position.questions && position.total_applicants > 0 {
            return Err(CoreError::validation(
                "Application questions cannot change once applications have been received.",
            ));
        }
        next.questions = questions;
    }
    if let Some(require_resume) = changes.require_resume {
        next.require_resume = require_resume;
    }
    let location_type = changes.location_type.unwrap_or(position.location_type);
    let location = changes.location.or_else(|| position.location.clone());
    next.location = normalize_location(location_type, location)?;
    next.location_type = location_type;
    next.updated_at = now;
    Ok(next)
}

pub fn update_visibility(
    actor: &ActorContext,
    position: &Position,
    visible: bool,
    now: DateTime<Utc>,
) -> Result<Position, CoreError> {
    ensure_unlocked(position)?;
    ensure_owner(actor, position)?;

    let mut next = position.clone();
    next.visible = visible;
    next.updated_at = now;
    Ok(next)
}

/// Marks a position complete. Once locked it can no longer be edited,
/// hidden, shown, or deleted.
pub fn complete_position(
    actor: &ActorContext,
    position: &Position,
    now: DateTime<Utc>,
) -> Result<Position, CoreError> {
    ensure_unlocked(position)?;
    ensure_owner(actor, position)?;

    let mut next = position.clone();
    next.locked = true;
    next.updated_at = now;
    Ok(next)
}

pub fn delete_position(actor: &ActorContext, position: &Position) -> Result<(), CoreError> {
    ensure_unlocked(position)?;
    ensure_owner(actor, position)
}

pub fn submit_application(
    actor: &ActorContext,
    position: &Position,
    existing: Option<&Application>,
    draft: SubmitApplicationRequest,
    now: DateTime<Utc>,
) -> Result<Submission, CoreError> {
    if actor.is_organization() {
        return Err(CoreError::authorization(
            "organization accounts cannot apply to positions",
        ));
    }
    if position.locked {
        return Err(CoreError::validation(
            "This position is complete and no longer accepts applications.",
        ));
    }
    if !position.visible {
        return Err(CoreError::validation(
            "This position is not open for applications.",
        ));
    }
    if existing.is_some() {
        return Err(CoreError::validation(
            "You have already applied to this position.",
        ));
    }

    let full_name = draft
        .full_name
        .or_else(|| actor.name.clone())
        .unwrap_or_default();
    let full_name = required(&full_name, "Full name is required.")?;

    if draft.answers.len() != position.questions.len() {
        return Err(CoreError::validation(format!(
            "Expected {} answers but received {}.",
            position.questions.len(),
            draft.answers.len()
        )));
    }
    let answers = draft
        .answers
        .iter()
        .map(|answer| required(answer, "Every application question needs an answer."))
        .collect::<Result<Vec<_>, _>>()?;

    let resume = optional_text(draft.resume);
    let resume_link = optional_link("resume_link", draft.resume_link)?;
    let portfolio_link = optional_link("portfolio_link", draft.portfolio_link)?;
    if position.require_resume && resume.is_none() && resume_link.is_none() {
        return Err(CoreError::validation(
            "This position requires a resume or a resume link.",
        ));
    }

    let application = Application {
        pid: position.pid,
        uid: actor.uid.clone(),
        full_name,
        email: actor.email.clone(),
        education: draft.education.trim().to_string(),
        current_employment: optional_text(draft.current_employment),
        resume,
        resume_link,
        portfolio_link,
        answers,
        status: ApplicationStatus::Pending,
        committed: None,
        bookmarked: false,
        rescinded: false,
        created_at: now,
        updated_at: now,
        revision: 0,
    };

    let mut next = position.clone();
    next.total_applicants += 1;
    next.updated_at = now;

    Ok(Submission {
        position: next,
        application,
    })
}

pub fn set_status(
    actor: &ActorContext,
    position: &Position,
    application: &Application,
    status: ApplicationStatus,
    now: DateTime<Utc>,
) -> Result<Application, CoreError> {
    ensure_owner(actor, position)?;
    ensure_belongs(position, application)?;

    if status == ApplicationStatus::Pending {
        return Err(CoreError::invalid_transition(
            "an application can only be accepted or rejected",
        ));
    }
    if application.status != ApplicationStatus::Pending {
        return Err(CoreError::invalid_transition(format!(
            "application of {} was already {:?}",
            application.uid, application.status
        )));
    }

    let mut next = application.clone();
    next.status = status;
    next.updated_at = now;
    Ok(next)
}

pub fn toggle_bookmark(
    actor: &ActorContext,
    position: &Position,
    application: &Application,
) -> Result<Application, CoreError> {
    ensure_owner(actor, position)?;
    ensure_belongs(position, application)?;

    if application.status != ApplicationStatus::Pending {
        return Err(CoreError::invalid_transition(
            "only pending applications can be bookmarked",
        ));
    }

    let mut next = application.clone();
    next.bookmarked = !application.bookmarked;
    Ok(next)
}

pub fn set_commitment(
    actor: &ActorContext,
    position: &Position,
    application: &Application,
    committed: bool,
    now: DateTime<Utc>,
) -> Result<Commitment, CoreError> {
    ensure_belongs(position, application)?;
    if actor.uid != application.uid {
        return Err(CoreError::authorization(
            "only the applicant can respond to an acceptance",
        ));
    }
    if application.status != ApplicationStatus::Accepted {
        return Err(CoreError::invalid_transition(
            "only accepted applications can be committed to or withdrawn",
        ));
    }
    if application.committed.is_some() {
        return Err(CoreError::invalid_transition(
            "the applicant has already responded to this acceptance",
        ));
    }
    if application.rescinded {
        return Err(CoreError::not_eligible(
            "this offer was rescinded by the organization",
        ));
    }

    let next_position = if committed {
        if position.open_slots == 0 || position.committed_applicants >= position.total_slots {
            return Err(CoreError::not_eligible(
                "no open slots remain for this position",
            ));
        }
        let mut next = position.clone();
        next.open_slots -= 1;
        next.committed_applicants += 1;
        next.updated_at = now;
        Some(next)
    } else {
        None
    };

    let mut next = application.clone();
    next.committed = Some(committed);
    next.updated_at = now;

    Ok(Commitment {
        position: next_position,
        application: next,
    })
}

/// Why `application` cannot be rescinded at `now`, if anything.
pub fn rescind_eligibility(application: &Application, now: DateTime<Utc>) -> Result<(), CoreError> {
    if application.status != ApplicationStatus::Accepted {
        return Err(CoreError::not_eligible(
            "only accepted applicants can be rescinded",
        ));
    }
    if application.committed.is_some() {
        return Err(CoreError::not_eligible(
            "the applicant has already responded to this acceptance",
        ));
    }
    if application.rescinded {
        return Err(CoreError::not_eligible("this offer was already rescinded"));
    }
    if now - application.updated_at < rescind_window() {
        return Err(CoreError::not_eligible(format!(
            "applicants have {} days to respond before an offer can be rescinded",
            RESCIND_WINDOW_DAYS
        )));
    }
    Ok(())
}

pub fn can_rescind(application: &Application, now: DateTime<Utc>) -> bool {
    rescind_eligibility(application, now).is_ok()
}

pub fn rescind(
    actor: &ActorContext,
    position: &Position,
    application: &Application,
    now: DateTime<Utc>,
) -> Result<Application, CoreError> {
    ensure_owner(actor, position)?;
    ensure_belongs(position, application)?;
    rescind_eligibility(application, now)?;

    let mut next = application.clone();
    next.rescinded = true;
    next.updated_at = now;
    Ok(next)
}
