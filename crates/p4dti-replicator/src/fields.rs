//! Field-level translation between an [`Issue`] and a [`Job`].
//!
//! The target jobspec's non-reserved fields are a fixed set allocated
//! from [`p4dti_jobstore::jobspec::USER_FIELD_FLOOR`] upward: `Status`,
//! `Summary`, `Description`, `Owner`, `ReportedBy`, `Component`,
//! `Version`, `Product`, `Resolution`. Dynamic provisioning of
//! site-specific extra fields is out of scope (see DESIGN.md); an
//! `Issue.extra` entry still replicates if the jobspec already carries a
//! same-named field, via a best-effort keyword/int translation picked by
//! the stored [`FieldValue`] variant.

use std::collections::BTreeMap;

use p4dti_core::enums::{DataType, Persistence};
use p4dti_core::issue::{FieldValue, Issue, IssueUpdates};
use p4dti_core::job::{FieldDescriptor, Job};
use p4dti_translate::{keyword, status::StatusTranslator, text, user::Mode as UserMode, UserTranslator};

use crate::error::Result;

pub const FIELD_STATUS: &str = "Status";
pub const FIELD_SUMMARY: &str = "Summary";
pub const FIELD_DESCRIPTION: &str = "Description";
pub const FIELD_OWNER: &str = "Owner";
pub const FIELD_REPORTED_BY: &str = "ReportedBy";
pub const FIELD_COMPONENT: &str = "Component";
pub const FIELD_VERSION: &str = "Version";
pub const FIELD_PRODUCT: &str = "Product";
pub const FIELD_RESOLUTION: &str = "Resolution";

const FIRST_EXTRA_CODE: i32 = 106;

/// The fixed set of non-reserved jobspec fields this replicator owns,
/// starting at [`FIRST_EXTRA_CODE`]. `status_values` becomes the
/// `Status` field's select value set.
pub fn known_field_descriptors(status_values: &[String]) -> Vec<FieldDescriptor> {
    let mut code = FIRST_EXTRA_CODE;
    let mut next = || {
        let c = code;
        code += 1;
        c
    };

    vec![
        FieldDescriptor {
            code: next(),
            name: FIELD_STATUS.to_string(),
            datatype: DataType::Select,
            length: 32,
            persistence: Persistence::Required,
            preset: None,
            values: status_values.to_vec(),
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_SUMMARY.to_string(),
            datatype: DataType::Line,
            length: 128,
            persistence: Persistence::Required,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_DESCRIPTION.to_string(),
            datatype: DataType::Text,
            length: 0,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_OWNER.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_REPORTED_BY.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_COMPONENT.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_VERSION.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_PRODUCT.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: next(),
            name: FIELD_RESOLUTION.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
    ]
}

/// Bundles the translators built once per poll cycle (user) or once at
/// startup (status), and applies them field-by-field between an issue
/// and a job. Borrows rather than owns, since the status translator
/// outlives the replicator and the user translator outlives one cycle.
pub struct FieldTranslators<'a> {
    pub status: &'a StatusTranslator,
    pub user: &'a UserTranslator,
    pub user_mode: UserMode,
}

impl<'a> FieldTranslators<'a> {
    /// Populates a job's non-reserved field map from `issue`, and
    /// returns the side-1 owner name (used as the job's `user` field by
    /// the caller, matching the original's "job owner drives P4DTI-user"
    /// convention only when the issue itself changed -- callers that
    /// need `P4DTI-user` semantics decide separately).
    pub fn issue_to_job_fields(&self, issue: &Issue) -> Result<BTreeMap<String, String>> {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_STATUS.to_string(), self.status.to_1(issue.status.as_str())?.to_string());
        fields.insert(FIELD_SUMMARY.to_string(), keyword::to_1(&issue.summary));
        fields.insert(FIELD_DESCRIPTION.to_string(), text::to_1(&issue.description));
        fields.insert(FIELD_OWNER.to_string(), self.user.to_1(&issue.assignee, self.user_mode)?);
        fields.insert(FIELD_REPORTED_BY.to_string(), self.user.to_1(&issue.reporter, self.user_mode)?);
        fields.insert(FIELD_COMPONENT.to_string(), keyword::to_1(&issue.component));
        fields.insert(FIELD_VERSION.to_string(), keyword::to_1(&issue.version));
        fields.insert(FIELD_PRODUCT.to_string(), keyword::to_1(&issue.product));
        fields.insert(FIELD_RESOLUTION.to_string(), keyword::to_1(&issue.resolution));

        for (key, value) in &issue.extra {
            if let Some(text_value) = value.as_text() {
                fields.insert(key.clone(), keyword::to_1(text_value));
            }
        }

        Ok(fields)
    }

    /// Translates a job's field map into a partial issue update.
    /// Fields missing from the job (e.g. never provisioned on an older
    /// jobspec) are left untouched rather than cleared.
    pub fn job_to_issue_updates(&self, job: &Job) -> Result<IssueUpdates> {
        let mut updates = IssueUpdates::default();

        if let Some(v) = job.field(FIELD_STATUS) {
            updates.status = Some(self.status.to_0(v)?.into());
        }
        if let Some(v) = job.field(FIELD_SUMMARY) {
            updates.summary = Some(keyword::to_0(v)?);
        }
        if let Some(v) = job.field(FIELD_DESCRIPTION) {
            updates.description = Some(text::to_0(v));
        }
        if let Some(v) = job.field(FIELD_OWNER) {
            updates.assignee = Some(self.user.to_0(v, self.user_mode)?);
        }
        if let Some(v) = job.field(FIELD_REPORTED_BY) {
            updates.reporter = Some(self.user.to_0(v, self.user_mode)?);
        }
        if let Some(v) = job.field(FIELD_COMPONENT) {
            updates.component = Some(keyword::to_0(v)?);
        }
        if let Some(v) = job.field(FIELD_VERSION) {
            updates.version = Some(keyword::to_0(v)?);
        }
        if let Some(v) = job.field(FIELD_PRODUCT) {
            updates.product = Some(keyword::to_0(v)?);
        }
        if let Some(v) = job.field(FIELD_RESOLUTION) {
            updates.resolution = Some(keyword::to_0(v)?);
        }

        for (key, value) in &job.fields {
            if is_known_or_reserved(key) {
                continue;
            }
            updates.extra.insert(key.clone(), FieldValue::Text(keyword::to_0(value)?));
        }

        Ok(updates)
    }
}

fn is_known_or_reserved(name: &str) -> bool {
    const KNOWN: &[&str] = &[
        FIELD_STATUS,
        FIELD_SUMMARY,
        FIELD_DESCRIPTION,
        FIELD_OWNER,
        FIELD_REPORTED_BY,
        FIELD_COMPONENT,
        FIELD_VERSION,
        FIELD_PRODUCT,
        FIELD_RESOLUTION,
    ];
    KNOWN.contains(&name)
        || name == p4dti_core::job::FIELD_NAME_JOB
        || name == p4dti_core::job::FIELD_NAME_DATE
        || name.starts_with("P4DTI-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4dti_translate::user::{Side0User, Side1User};
    use std::collections::BTreeMap as Map;

    fn translators() -> (StatusTranslator, UserTranslator) {
        let status = StatusTranslator::build(&["open".to_string(), "closed".to_string()], &[], "dt");
        let s0 = vec![Side0User { id: "alice".into(), email: "alice@example.com".into() }];
        let s1 = vec![Side1User { name: "alice".into(), email: "alice@example.com".into() }];
        let user = UserTranslator::build(&s0, &s1, "alice", "alice").unwrap();
        (status, user)
    }

    fn issue() -> Issue {
        use chrono::Utc;
        use p4dti_core::enums::Status;
        Issue {
            issue_id: 1,
            status: Status::Open,
            assignee: "alice".into(),
            reporter: "alice".into(),
            summary: "A summary".into(),
            description: "Some text".into(),
            component: "core".into(),
            version: "1.0".into(),
            product: "widgets".into(),
            resolution: String::new(),
            extra: Map::new(),
            creation_ts: Utc::now(),
            delta_ts: Utc::now(),
        }
    }

    #[test]
    fn issue_to_job_translates_known_fields() {
        let (status, user) = translators();
        let t = FieldTranslators { status: &status, user: &user, user_mode: UserMode::Lax };
        let fields = t.issue_to_job_fields(&issue()).unwrap();
        assert_eq!(fields.get(FIELD_STATUS).unwrap(), "open");
        assert_eq!(fields.get(FIELD_OWNER).unwrap(), "alice");
        assert_eq!(fields.get(FIELD_SUMMARY).unwrap(), "A_summary");
    }

    #[test]
    fn round_trip_through_job_updates() {
        let (status, user) = translators();
        let t = FieldTranslators { status: &status, user: &user, user_mode: UserMode::Lax };
        let issue = issue();
        let fields = t.issue_to_job_fields(&issue).unwrap();
        let job = Job { name: "job1".into(), rid: None, issue_id: None, user: "alice".into(), fields };
        let updates = t.job_to_issue_updates(&job).unwrap();
        assert_eq!(updates.summary.as_deref(), Some("A summary"));
        assert_eq!(updates.assignee.as_deref(), Some("alice"));
        assert_eq!(updates.component.as_deref(), Some("core"));
    }
}
