//! The issue-side domain record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::Status;

/// A scalar field value held in an issue's extra-field map.
///
/// Configured extra fields are untyped at the storage boundary (the
/// adapter doesn't know in advance which custom fields a site has
/// configured), so they're kept as a small closed set of primitives
/// rather than an arbitrary JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    None,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// An issue record on side 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_id: i64,

    pub status: Status,

    #[serde(default)]
    pub assignee: String,

    #[serde(default)]
    pub reporter: String,

    pub summary: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub component: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub product: String,

    /// Resolution, required non-empty when `status` enters a resolved
    /// state, required empty otherwise (checked by [`crate::validation`]).
    #[serde(default)]
    pub resolution: String,

    /// Site-configured fields beyond the fixed set above.
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,

    pub creation_ts: DateTime<Utc>,

    pub delta_ts: DateTime<Utc>,
}

impl Issue {
    /// Returns true if the value of `field` would change under `new`,
    /// comparing against the fixed fields and then the extra map.
    pub fn differs(&self, field: &str, new: &str) -> bool {
        match field {
            "status" => self.status.as_str() != new,
            "assignee" => self.assignee != new,
            "reporter" => self.reporter != new,
            "summary" => self.summary != new,
            "description" => self.description != new,
            "component" => self.component != new,
            "version" => self.version != new,
            "product" => self.product != new,
            "resolution" => self.resolution != new,
            other => self
                .extra
                .get(other)
                .and_then(FieldValue::as_text)
                .map(|v| v != new)
                .unwrap_or(true),
        }
    }

    /// Returns the current text value of `field`, by name, across both
    /// the fixed fields and the extra map. Unknown or non-text extra
    /// fields read as empty.
    pub fn field_value(&self, field: &str) -> Option<String> {
        Some(match field {
            "status" => self.status.as_str().to_owned(),
            "assignee" => self.assignee.clone(),
            "reporter" => self.reporter.clone(),
            "summary" => self.summary.clone(),
            "description" => self.description.clone(),
            "component" => self.component.clone(),
            "version" => self.version.clone(),
            "product" => self.product.clone(),
            "resolution" => self.resolution.clone(),
            other => self
                .extra
                .get(other)
                .and_then(FieldValue::as_text)
                .map(str::to_owned)
                .unwrap_or_default(),
        })
    }
}

/// A partial update to an issue: every field is optional, and only the
/// fields present are written. Mirrors the typed-partial-update pattern
/// used throughout the rest of this codebase instead of an untyped map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
}

impl IssueUpdates {
    /// Returns the proposed new text value of `field`, if this update
    /// touches it, across both the fixed fields and the extra map.
    pub fn get(&self, field: &str) -> Option<String> {
        match field {
            "status" => self.status.as_ref().map(|s| s.as_str().to_owned()),
            "assignee" => self.assignee.clone(),
            "reporter" => self.reporter.clone(),
            "summary" => self.summary.clone(),
            "description" => self.description.clone(),
            "component" => self.component.clone(),
            "version" => self.version.clone(),
            "product" => self.product.clone(),
            "resolution" => self.resolution.clone(),
            other => self.extra.get(other).and_then(FieldValue::as_text).map(str::to_owned),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assignee.is_none()
            && self.reporter.is_none()
            && self.summary.is_none()
            && self.description.is_none()
            && self.component.is_none()
            && self.version.is_none()
            && self.product.is_none()
            && self.resolution.is_none()
            && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Issue {
        Issue {
            issue_id: 1,
            status: Status::Open,
            assignee: "alice".into(),
            reporter: "bob".into(),
            summary: "Widget is broken".into(),
            description: String::new(),
            component: String::new(),
            version: String::new(),
            product: String::new(),
            resolution: String::new(),
            extra: BTreeMap::new(),
            creation_ts: Utc::now(),
            delta_ts: Utc::now(),
        }
    }

    #[test]
    fn differs_detects_fixed_field_change() {
        let issue = sample();
        assert!(issue.differs("assignee", "carol"));
        assert!(!issue.differs("assignee", "alice"));
    }

    #[test]
    fn differs_detects_extra_field_change() {
        let mut issue = sample();
        issue
            .extra
            .insert("custom_field".into(), FieldValue::Text("x".into()));
        assert!(!issue.differs("custom_field", "x"));
        assert!(issue.differs("custom_field", "y"));
        assert!(issue.differs("missing_field", "anything"));
    }

    #[test]
    fn issue_updates_empty_by_default() {
        assert!(IssueUpdates::default().is_empty());
    }
}
