//! Jobspec install / extend / validate lifecycle.
//!
//! The jobspec is either installed verbatim or extended by adding
//! missing fields with auto-allocated codes (user fields from 106 up;
//! P4DTI-reserved fields from 194 down), renumbering only on clash
//! unless forced. In either mode the installed jobspec is re-read and
//! validated against the target.

use p4dti_core::enums::{DataType, Persistence};
use p4dti_core::job::{
    FieldDescriptor, Jobspec, FIELD_CODE_DATE, FIELD_CODE_FILESPECS, FIELD_CODE_ISSUE_ID,
    FIELD_CODE_JOB, FIELD_CODE_RID, FIELD_CODE_USER, FIELD_NAME_DATE, FIELD_NAME_FILESPECS,
    FIELD_NAME_ISSUE_ID, FIELD_NAME_JOB, FIELD_NAME_RID, FIELD_NAME_USER, UNLINKED_SENTINEL,
};

use crate::error::{JobStoreError, Result};

/// Lowest code available for user-configured extra fields.
pub const USER_FIELD_FLOOR: i32 = 106;
/// Highest code available for P4DTI-reserved fields, counting downward.
pub const RESERVED_FIELD_CEILING: i32 = 194;

/// The severity of a jobspec validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One discrepancy between the installed jobspec and the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobspecIssue {
    pub field: String,
    pub severity: Severity,
    pub reason: String,
}

/// Builds the target jobspec: the reserved P4DTI-* fields plus any
/// site-configured extra fields.
pub fn target_jobspec(extra_fields: &[FieldDescriptor]) -> Jobspec {
    let mut fields = vec![
        FieldDescriptor {
            code: FIELD_CODE_JOB,
            name: FIELD_NAME_JOB.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Required,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: FIELD_CODE_DATE,
            name: FIELD_NAME_DATE.to_string(),
            datatype: DataType::Date,
            length: 20,
            persistence: Persistence::Always,
            preset: Some("$now".to_string()),
            values: vec![],
        },
        FieldDescriptor {
            code: FIELD_CODE_FILESPECS,
            name: FIELD_NAME_FILESPECS.to_string(),
            datatype: DataType::Text,
            length: 0,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        },
        FieldDescriptor {
            code: FIELD_CODE_RID,
            name: FIELD_NAME_RID.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Required,
            preset: Some(UNLINKED_SENTINEL.to_string()),
            values: vec![],
        },
        FieldDescriptor {
            code: FIELD_CODE_ISSUE_ID,
            name: FIELD_NAME_ISSUE_ID.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Required,
            preset: Some(UNLINKED_SENTINEL.to_string()),
            values: vec![],
        },
        FieldDescriptor {
            code: FIELD_CODE_USER,
            name: FIELD_NAME_USER.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Always,
            preset: Some("$user".to_string()),
            values: vec![],
        },
    ];
    fields.extend(extra_fields.iter().cloned());
    Jobspec { fields }
}

/// Adds fields present in `target` but missing from `installed`,
/// auto-allocating a code for each: user-configured fields (anything
/// outside the P4DTI-reserved name set) get the lowest free code at or
/// above [`USER_FIELD_FLOOR`]; P4DTI-reserved fields get the highest
/// free code at or below [`RESERVED_FIELD_CEILING`]. An exact code
/// clash with an existing, differently-named field is only resolved by
/// renumbering when `force` is set; otherwise it is reported as an
/// error by the subsequent validation pass.
pub fn extend_jobspec(installed: &Jobspec, target: &Jobspec, force: bool) -> Jobspec {
    let mut result = installed.clone();

    for field in &target.fields {
        if result.field(&field.name).is_some() {
            continue;
        }

        let mut new_field = field.clone();
        let is_reserved = field.name.starts_with("P4DTI-") || field.name == FIELD_NAME_JOB || field.name == FIELD_NAME_DATE;
        let code_taken = result.fields.iter().any(|f| f.code == new_field.code);

        if code_taken {
            if force || !is_reserved {
                new_field.code = if is_reserved {
                    result.next_free_code_below(RESERVED_FIELD_CEILING)
                } else {
                    result.next_free_code_from(USER_FIELD_FLOOR)
                };
            }
            // else: leave the clashing code as-is; validation will flag it.
        }

        result.fields.push(new_field);
    }

    result
}

/// Validates `installed` against `target`: every P4DTI-* field must have
/// exactly the prescribed datatype/persistence/preset; select fields are
/// checked for value-set containment; a datatype mismatch is ranked on
/// the restrictiveness lattice (text < line < word < select, date
/// incompatible with all of those) and reported as a warning if the
/// installed type is *more* restrictive than the target (existing data
/// still fits) or an error otherwise.
pub fn validate_against_target(installed: &Jobspec, target: &Jobspec) -> Vec<JobspecIssue> {
    let mut issues = Vec::new();

    for target_field in &target.fields {
        let Some(installed_field) = installed.field(&target_field.name) else {
            issues.push(JobspecIssue {
                field: target_field.name.clone(),
                severity: Severity::Error,
                reason: "field is missing from the installed jobspec".to_string(),
            });
            continue;
        };

        if installed_field.datatype != target_field.datatype {
            let is_p4dti_reserved = target_field.name.starts_with("P4DTI-");
            match (
                installed_field.datatype.restrictiveness(),
                target_field.datatype.restrictiveness(),
            ) {
                (Some(have), Some(want)) if have > want && !is_p4dti_reserved => {
                    issues.push(JobspecIssue {
                        field: target_field.name.clone(),
                        severity: Severity::Warning,
                        reason: format!(
                            "installed datatype {:?} is more restrictive than target {:?}",
                            installed_field.datatype, target_field.datatype
                        ),
                    });
                }
                _ => {
                    issues.push(JobspecIssue {
                        field: target_field.name.clone(),
                        severity: Severity::Error,
                        reason: format!(
                            "datatype mismatch: installed {:?}, target {:?}",
                            installed_field.datatype, target_field.datatype
                        ),
                    });
                }
            }
        }

        if target_field.name.starts_with("P4DTI-") || target_field.name == FIELD_NAME_JOB || target_field.name == FIELD_NAME_DATE {
            if installed_field.persistence != target_field.persistence {
                issues.push(JobspecIssue {
                    field: target_field.name.clone(),
                    severity: Severity::Error,
                    reason: format!(
                        "persistence mismatch: installed {:?}, target {:?}",
                        installed_field.persistence, target_field.persistence
                    ),
                });
            }
            if installed_field.preset != target_field.preset {
                issues.push(JobspecIssue {
                    field: target_field.name.clone(),
                    severity: Severity::Error,
                    reason: format!(
                        "preset mismatch: installed {:?}, target {:?}",
                        installed_field.preset, target_field.preset
                    ),
                });
            }
        }

        if target_field.datatype == DataType::Select && !target_field.values.is_empty() {
            let missing: Vec<&String> = target_field
                .values
                .iter()
                .filter(|v| !installed_field.values.contains(v))
                .collect();
            if !missing.is_empty() {
                issues.push(JobspecIssue {
                    field: target_field.name.clone(),
                    severity: Severity::Error,
                    reason: format!("select values missing from installed field: {missing:?}"),
                });
            }
        }
    }

    issues
}

/// Returns an error if any validation issue has [`Severity::Error`].
pub fn require_no_errors(issues: &[JobspecIssue]) -> Result<()> {
    if let Some(issue) = issues.iter().find(|i| i.severity == Severity::Error) {
        return Err(JobStoreError::JobspecInvalid {
            field: issue.field.clone(),
            reason: issue.reason.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_field(code: i32, name: &str) -> FieldDescriptor {
        FieldDescriptor {
            code,
            name: name.to_string(),
            datatype: DataType::Word,
            length: 32,
            persistence: Persistence::Optional,
            preset: None,
            values: vec![],
        }
    }

    #[test]
    fn extend_adds_missing_reserved_fields_from_ceiling_down() {
        let installed = Jobspec { fields: vec![word_field(101, FIELD_NAME_JOB)] };
        let target = target_jobspec(&[]);
        let extended = extend_jobspec(&installed, &target, false);
        assert!(extended.has_link_fields());
        let rid_field = extended.field(FIELD_NAME_RID).unwrap();
        assert_eq!(rid_field.code, FIELD_CODE_RID);
    }

    #[test]
    fn extend_adds_user_field_from_floor_up() {
        let installed = Jobspec { fields: vec![] };
        let target = Jobspec {
            fields: vec![word_field(106, "Severity")],
        };
        let extended = extend_jobspec(&installed, &target, false);
        assert_eq!(extended.field("Severity").unwrap().code, USER_FIELD_FLOOR);
    }

    #[test]
    fn validate_reports_missing_field_as_error() {
        let installed = Jobspec { fields: vec![] };
        let target = target_jobspec(&[]);
        let issues = validate_against_target(&installed, &target);
        assert!(issues.iter().any(|i| i.field == FIELD_NAME_RID && i.severity == Severity::Error));
    }

    #[test]
    fn validate_passes_on_exact_target() {
        let target = target_jobspec(&[]);
        let issues = validate_against_target(&target, &target);
        assert!(issues.is_empty());
    }

    #[test]
    fn validate_flags_persistence_mismatch_on_reserved_field() {
        let target = target_jobspec(&[]);
        let mut installed = target.clone();
        installed.fields.iter_mut().find(|f| f.name == FIELD_NAME_RID).unwrap().persistence = Persistence::Optional;
        let issues = validate_against_target(&installed, &target);
        assert!(issues.iter().any(|i| i.field == FIELD_NAME_RID && i.severity == Severity::Error));
    }

    #[test]
    fn require_no_errors_passes_warnings() {
        let issues = vec![JobspecIssue {
            field: "X".into(),
            severity: Severity::Warning,
            reason: "benign".into(),
        }];
        assert!(require_no_errors(&issues).is_ok());
    }
}
