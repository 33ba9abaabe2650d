//! Enum types shared by the issue-side and job-side domain models.
//!
//! Each enum has:
//! - Custom Serialize (as snake_case string)
//! - Custom Deserialize (known variants + catch-all Custom fallback where
//!   the set of values is genuinely open, e.g. issue status)
//! - `as_str()`, `Display` impl

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Macro: defines an enum with known string variants + a Custom(String) fallback.
// ---------------------------------------------------------------------------
macro_rules! define_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, custom_variant = $custom_variant:ident,
        variants: [
            $( ($variant:ident, $str:expr) ),+ $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
            $custom_variant(String),
        }

        impl $name {
            /// Returns the string representation.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $str, )+
                    Self::$custom_variant(s) => s.as_str(),
                }
            }

            /// Returns `true` if this is a known built-in (non-custom) variant.
            pub fn is_builtin(&self) -> bool {
                !matches!(self, Self::$custom_variant(_))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from(s.as_str()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $( $str => Self::$variant, )+
                    other => Self::$custom_variant(other.to_owned()),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                match s.as_str() {
                    $( $str => Self::$variant, )+
                    _ => Self::$custom_variant(s),
                }
            }
        }
    };
}

define_enum!(
    /// Issue lifecycle state on side 0. Open-ended: sites configure
    /// additional statuses beyond the built-in closed-state convention.
    Status, default = Open, custom_variant = Custom,
    variants: [
        (Open, "open"),
        (InProgress, "in_progress"),
        (Resolved, "resolved"),
        (Closed, "closed"),
    ]
);

impl Status {
    /// Whether this status belongs to the configured closed-state set.
    pub fn is_closed(&self, closed_states: &[String]) -> bool {
        self == &Status::Closed || closed_states.iter().any(|s| s == self.as_str())
    }
}

define_enum!(
    /// Jobspec field datatype, ordered by restrictiveness
    /// (text < line < word < select, date incompatible with all three).
    DataType, default = Word, custom_variant = Custom,
    variants: [
        (Word, "word"),
        (Line, "line"),
        (Text, "text"),
        (Select, "select"),
        (Date, "date"),
    ]
);

impl DataType {
    /// Restrictiveness rank used to compare an installed field's datatype
    /// against the target. Lower is less restrictive. `Date` has no
    /// meaningful rank relative to the others -- callers must special-case it.
    pub fn restrictiveness(&self) -> Option<u8> {
        match self {
            DataType::Text => Some(0),
            DataType::Line => Some(1),
            DataType::Word => Some(2),
            DataType::Select => Some(3),
            DataType::Date => None,
            DataType::Custom(_) => None,
        }
    }
}

define_enum!(
    /// Jobspec field persistence rule.
    Persistence, default = Optional, custom_variant = Custom,
    variants: [
        (Optional, "optional"),
        (Default, "default"),
        (Required, "required"),
        (Once, "once"),
        (Always, "always"),
    ]
);

define_enum!(
    /// Status of a fix (issue/changelist association).
    FixStatus, default = Open, custom_variant = Custom,
    variants: [
        (Open, "open"),
        (Closed, "closed"),
        (Suspended, "suspended"),
    ]
);

/// Outcome of a job-store write, parsed from the server acknowledgement.
///
/// Kept as a fixed enum rather than a string match scattered through the
/// call sites: `update_job`'s correctness depends entirely on telling
/// `Saved` apart from `Unchanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAckKind {
    Saved,
    Unchanged,
}

/// One of the three poll-cycle dispatch classes for a paired
/// (issue, job) candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    /// Changed on side 0 only.
    IssueOnly,
    /// Changed on side 1 only.
    JobOnly,
    /// Changed on both sides since the last mark.
    Both,
}

/// Conflict-resolution outcome when both sides changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Side 0 (issue store) wins; the job is overwritten.
    Dt,
    /// Side 1 (job store) wins; the issue is overwritten.
    P4,
    /// Neither side is overwritten this cycle.
    NoAction,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::Dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        assert_eq!(Status::from("open"), Status::Open);
        assert_eq!(Status::Open.as_str(), "open");
        assert!(matches!(Status::from("triaged"), Status::Custom(s) if s == "triaged"));
    }

    #[test]
    fn datatype_restrictiveness_orders_text_below_select() {
        assert!(DataType::Text.restrictiveness() < DataType::Select.restrictiveness());
        assert!(DataType::Date.restrictiveness().is_none());
    }

    #[test]
    fn default_conflict_policy_is_dt() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Dt);
    }
}
