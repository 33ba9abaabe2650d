//! The job-side domain record and its schema descriptor (jobspec).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{DataType, Persistence};

/// Reserved field codes the replicator owns on the jobspec.
pub const FIELD_CODE_JOB: i32 = 101;
pub const FIELD_CODE_DATE: i32 = 104;
pub const FIELD_CODE_FILESPECS: i32 = 191;
pub const FIELD_CODE_RID: i32 = 192;
pub const FIELD_CODE_ISSUE_ID: i32 = 193;
pub const FIELD_CODE_USER: i32 = 194;

/// Sentinel value written into P4DTI-rid / P4DTI-issue-id when a job has
/// not yet been linked to an issue.
pub const UNLINKED_SENTINEL: &str = "None";

/// Reserved job name requesting server-side name allocation on create.
pub const NEW_JOB_NAME: &str = "new";

/// The name of the field the job store uses to hold the primary key.
pub const FIELD_NAME_JOB: &str = "Job";
pub const FIELD_NAME_DATE: &str = "Date";
pub const FIELD_NAME_FILESPECS: &str = "P4DTI-filespecs";
pub const FIELD_NAME_RID: &str = "P4DTI-rid";
pub const FIELD_NAME_ISSUE_ID: &str = "P4DTI-issue-id";
pub const FIELD_NAME_USER: &str = "P4DTI-user";

/// One field descriptor inside a jobspec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub code: i32,
    pub name: String,
    pub datatype: DataType,
    pub length: u32,
    pub persistence: Persistence,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

/// The schema descriptor for side-1 records: an ordered list of field
/// descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jobspec {
    pub fields: Vec<FieldDescriptor>,
}

impl Jobspec {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_link_fields(&self) -> bool {
        self.field(FIELD_NAME_RID).is_some() && self.field(FIELD_NAME_ISSUE_ID).is_some()
    }

    /// Lowest unused code at or above `floor`, scanning upward.
    pub fn next_free_code_from(&self, floor: i32) -> i32 {
        let mut code = floor;
        while self.fields.iter().any(|f| f.code == code) {
            code += 1;
        }
        code
    }

    /// Highest unused code at or below `ceiling`, scanning downward.
    pub fn next_free_code_below(&self, ceiling: i32) -> i32 {
        let mut code = ceiling;
        while self.fields.iter().any(|f| f.code == code) {
            code -= 1;
        }
        code
    }
}

/// A job record on side 1, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,

    #[serde(default)]
    pub rid: Option<String>,

    #[serde(default)]
    pub issue_id: Option<i64>,

    #[serde(default)]
    pub user: String,

    /// All fields as read from the server, including the reserved
    /// P4DTI-* fields and any site-specific fields, keyed by field name.
    pub fields: BTreeMap<String, String>,
}

impl Job {
    pub fn is_linked(&self) -> bool {
        self.rid.is_some() && self.issue_id.is_some()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobspec_with(codes: &[i32]) -> Jobspec {
        Jobspec {
            fields: codes
                .iter()
                .map(|&code| FieldDescriptor {
                    code,
                    name: format!("Field{code}"),
                    datatype: DataType::Word,
                    length: 32,
                    persistence: Persistence::Optional,
                    preset: None,
                    values: vec![],
                })
                .collect(),
        }
    }

    #[test]
    fn next_free_code_from_skips_taken_codes() {
        let spec = jobspec_with(&[106, 107]);
        assert_eq!(spec.next_free_code_from(106), 108);
    }

    #[test]
    fn next_free_code_below_skips_taken_codes() {
        let spec = jobspec_with(&[194, 193]);
        assert_eq!(spec.next_free_code_below(194), 192);
    }

    #[test]
    fn has_link_fields_requires_both() {
        let mut spec = jobspec_with(&[]);
        assert!(!spec.has_link_fields());
        spec.fields.push(FieldDescriptor {
            code: FIELD_CODE_RID,
            name: FIELD_NAME_RID.into(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Required,
            preset: Some(UNLINKED_SENTINEL.into()),
            values: vec![],
        });
        assert!(!spec.has_link_fields());
        spec.fields.push(FieldDescriptor {
            code: FIELD_CODE_ISSUE_ID,
            name: FIELD_NAME_ISSUE_ID.into(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Required,
            preset: Some(UNLINKED_SENTINEL.into()),
            values: vec![],
        });
        assert!(spec.has_link_fields());
    }
}
