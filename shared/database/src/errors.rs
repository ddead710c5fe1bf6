//! Translation of PostgreSQL errors into consistency violations.

use sqlx::postgres::PgDatabaseError;
use strata_models::{ConsistencyViolation, Dependent, RecordKind, RecordRef};
use uuid::Uuid;

use crate::migrations::CONSISTENCY_CONSTRAINT;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Recovers the violation behind a failed write, if the database rejected it
/// for a consistency reason. `target` is the record being written or deleted
/// and fills gaps PostgreSQL does not report.
pub fn consistency_violation(
    error: &sqlx::Error,
    target: Option<RecordRef>,
) -> Option<ConsistencyViolation> {
    let db_error = error.as_database_error()?;
    let pg_error = db_error.try_downcast_ref::<PgDatabaseError>()?;

    if pg_error.constraint() == Some(CONSISTENCY_CONSTRAINT) {
        return pg_error
            .detail()
            .and_then(|detail| serde_json::from_str(detail).ok());
    }

    match pg_error.code() {
        UNIQUE_VIOLATION => unique_violation(pg_error),
        FOREIGN_KEY_VIOLATION => foreign_key_violation(pg_error, target),
        _ => None,
    }
}

/// Walks an `anyhow` chain (as returned by repositories) looking for a
/// database-raised violation.
pub fn violation_in_chain(
    error: &anyhow::Error,
    target: Option<RecordRef>,
) -> Option<ConsistencyViolation> {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .find_map(|sqlx_error| consistency_violation(sqlx_error, target))
}

fn unique_violation(error: &PgDatabaseError) -> Option<ConsistencyViolation> {
    let constraint = error.constraint()?;
    let key = error.detail().and_then(KeyDetail::parse);

    let record = match constraint {
        "uq_sites_code" | "uq_sites_name" => RecordKind::Site,
        "uq_stratigraphic_units_identity" => RecordKind::StratigraphicUnit,
        "uq_contexts_name" => RecordKind::Context,
        "uq_samples_identity" => RecordKind::Sample,
        "uq_analyses_identity" => RecordKind::Analysis,
        "uq_media_objects_sha256" => RecordKind::MediaObject,
        "uq_stratigraphic_relationships_pair" => {
            let key = key?;
            return Some(ConsistencyViolation::DuplicateRelationship {
                lft_su_id: key.uuid(0)?,
                rgt_su_id: key.uuid(1)?,
                existing: None,
            });
        }
        "uq_context_stratigraphic_units" => {
            let key = key?;
            return Some(ConsistencyViolation::DuplicateLink {
                left: RecordRef::new(RecordKind::Context, key.uuid(0)?),
                right: RecordRef::new(RecordKind::StratigraphicUnit, key.uuid(1)?),
            });
        }
        "uq_sample_stratigraphic_units" => {
            let key = key?;
            return Some(ConsistencyViolation::DuplicateLink {
                left: RecordRef::new(RecordKind::Sample, key.uuid(0)?),
                right: RecordRef::new(RecordKind::StratigraphicUnit, key.uuid(1)?),
            });
        }
        "uq_analysis_subjects" | "uq_media_object_subjects" => {
            let key = key?;
            let owner_kind = if constraint == "uq_analysis_subjects" {
                RecordKind::Analysis
            } else {
                RecordKind::MediaObject
            };
            let subject_kind = key.values.get(1)?.parse().ok()?;
            return Some(ConsistencyViolation::DuplicateLink {
                left: RecordRef::new(owner_kind, key.uuid(0)?),
                right: RecordRef::new(subject_kind, key.uuid(2)?),
            });
        }
        _ => return None,
    };

    let identity = match key {
        Some(key) => key.identity(),
        None => constraint.to_string(),
    };
    Some(ConsistencyViolation::DuplicateIdentity { record, identity })
}

fn foreign_key_violation(
    error: &PgDatabaseError,
    target: Option<RecordRef>,
) -> Option<ConsistencyViolation> {
    let detail = error.detail()?;
    let referenced_table = quoted_table(detail);

    if detail.contains("is still referenced from table") {
        let record = match target {
            Some(record) => record,
            None => {
                let key = KeyDetail::parse(detail)?;
                RecordRef::new(record_kind_for_table(error.table()?)?, key.uuid(0)?)
            }
        };
        return Some(ConsistencyViolation::DeletionBlocked {
            record,
            dependents: vec![Dependent {
                relation: referenced_table?.to_string(),
                count: None,
            }],
        });
    }

    if detail.contains("is not present in table") {
        let key = KeyDetail::parse(detail)?;
        let kind = record_kind_for_table(referenced_table?)?;
        return Some(ConsistencyViolation::missing(kind, key.uuid(0)?));
    }

    None
}

pub fn record_kind_for_table(table: &str) -> Option<RecordKind> {
    let kind = match table {
        "sites" => RecordKind::Site,
        "stratigraphic_units" => RecordKind::StratigraphicUnit,
        "stratigraphic_relationships" => RecordKind::StratigraphicRelationship,
        "contexts" => RecordKind::Context,
        "samples" => RecordKind::Sample,
        "potteries" => RecordKind::Pottery,
        "zoo_bones" => RecordKind::ZooBone,
        "zoo_teeth" => RecordKind::ZooTooth,
        "botany_charcoals" => RecordKind::BotanyCharcoal,
        "botany_seeds" => RecordKind::BotanySeed,
        "analyses" => RecordKind::Analysis,
        "media_objects" => RecordKind::MediaObject,
        _ => return None,
    };
    Some(kind)
}

/// The last double-quoted identifier in a PostgreSQL detail message.
fn quoted_table(detail: &str) -> Option<&str> {
    let end = detail.rfind('"')?;
    let start = detail[..end].rfind('"')?;
    Some(&detail[start + 1..end])
}

/// Parsed `Key (a, b)=(x, y) ...` detail.
#[derive(Debug, PartialEq)]
struct KeyDetail {
    columns: Vec<String>,
    values: Vec<String>,
}

impl KeyDetail {
    fn parse(detail: &str) -> Option<Self> {
        let rest = detail.strip_prefix("Key (")?;
        let split = rest.find(")=(")?;
        let columns_part = &rest[..split];
        let values_rest = &rest[split + 3..];
        let values_end = values_rest.rfind(')')?;
        let values_part = &values_rest[..values_end];

        let columns = columns_part.split(", ").map(str::to_string).collect();
        let values = values_part.split(", ").map(str::to_string).collect();
        Some(Self { columns, values })
    }

    fn uuid(&self, index: usize) -> Option<Uuid> {
        self.values.get(index)?.parse().ok()
    }

    /// `column=value` pairs, matching the identities the engine reports.
    fn identity(&self) -> String {
        if self.columns.len() != self.values.len() {
            return format!("({})=({})", self.columns.join(", "), self.values.join(", "));
        }
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| format!("{}={}", column, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_detail() {
        let key = KeyDetail::parse("Key (site_id, year, number)=(7f1c0f43-6a55-4c1e-9c55-8d4c8b1a0001, 2019, 104) already exists.")
            .unwrap();
        assert_eq!(key.columns, vec!["site_id", "year", "number"]);
        assert_eq!(
            key.identity(),
            "site_id=7f1c0f43-6a55-4c1e-9c55-8d4c8b1a0001 year=2019 number=104"
        );
        assert!(key.uuid(0).is_some());
        assert!(key.uuid(1).is_none());
    }

    #[test]
    fn test_parse_key_detail_referenced() {
        let detail = "Key (id)=(7f1c0f43-6a55-4c1e-9c55-8d4c8b1a0001) is still referenced from table \"stratigraphic_units\".";
        let key = KeyDetail::parse(detail).unwrap();
        assert_eq!(key.values.len(), 1);
        assert_eq!(quoted_table(detail), Some("stratigraphic_units"));
    }

    #[test]
    fn test_mismatched_identity_falls_back_to_raw_key() {
        let key = KeyDetail::parse("Key (name)=(North, trench) already exists.").unwrap();
        assert_eq!(key.identity(), "(name)=(North, trench)");
    }

    #[test]
    fn test_record_kind_for_table() {
        for kind in strata_models::SubjectKind::ALL {
            assert_eq!(
                record_kind_for_table(kind.table_name()),
                Some(RecordKind::from(*kind))
            );
        }
        assert_eq!(record_kind_for_table("schema_migrations"), None);
    }

    #[test]
    fn test_non_database_errors_are_not_violations() {
        assert!(consistency_violation(&sqlx::Error::RowNotFound, None).is_none());
    }
}
