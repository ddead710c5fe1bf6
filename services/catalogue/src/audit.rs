//! Consistency audit.
//!
//! Scans the whole catalogue for rows breaking cross-record rules. In normal
//! operation the triggers keep every check empty, so a finding points at data
//! written around them (bulk loads, disabled triggers, manual repair).

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use strata_database::{
    AuditRepository, DuplicateInventoryRow, LinkMismatchRow, SubjectLinkRow, UnadmittedSubjectRow,
};
use strata_utils::StrataResult;

use crate::stratigraphy::StratigraphicGraph;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditFinding {
    /// Same codes as the violations the write path reports.
    pub code: &'static str,
    pub message: String,
    pub records: Vec<Uuid>,
}

impl AuditFinding {
    fn site_mismatch(what: &str, row: &LinkMismatchRow) -> Self {
        Self {
            code: "site_mismatch",
            message: format!(
                "{} {} joins {} (site {}) and {} (site {})",
                what, row.link_id, row.left_id, row.left_site, row.right_id, row.right_site
            ),
            records: vec![row.link_id, row.left_id, row.right_id],
        }
    }

    fn duplicate_inventory(row: &DuplicateInventoryRow) -> Self {
        Self {
            code: "duplicate_identity",
            message: format!(
                "inventory {} used by {} potteries in site {}",
                row.inventory,
                row.pottery_ids.len(),
                row.site_id
            ),
            records: row.pottery_ids.clone(),
        }
    }

    fn orphaned(owner: &str, row: &SubjectLinkRow) -> Self {
        Self {
            code: "missing_reference",
            message: format!(
                "{} {} refers to missing {} {}",
                owner, row.owner_id, row.subject_kind, row.subject_id
            ),
            records: vec![row.link_id, row.owner_id, row.subject_id],
        }
    }

    fn unadmitted(row: &UnadmittedSubjectRow) -> Self {
        Self {
            code: "subject_not_admitted",
            message: format!(
                "{} analysis {} is linked to {} {}",
                row.analysis_type, row.analysis_id, row.subject_kind, row.subject_id
            ),
            records: vec![row.link_id, row.analysis_id, row.subject_id],
        }
    }

    fn cycle(site_id: Uuid, path: Vec<Uuid>) -> Self {
        let chain: Vec<String> = path.iter().map(Uuid::to_string).collect();
        Self {
            code: "stratigraphic_cycle",
            message: format!("stratigraphic cycle in site {}: {}", site_id, chain.join(" > ")),
            records: path,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Finding counts per code.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.code).or_insert(0) += 1;
        }
        counts
    }

    fn extend(&mut self, findings: impl IntoIterator<Item = AuditFinding>) {
        self.findings.extend(findings);
    }
}

/// One cycle per site at most; a site with several loops shows the first.
pub fn precedence_cycles(edges: impl IntoIterator<Item = (Uuid, Uuid, Uuid)>) -> Vec<AuditFinding> {
    let mut graphs: BTreeMap<Uuid, StratigraphicGraph> = BTreeMap::new();
    for (site_id, later, earlier) in edges {
        graphs.entry(site_id).or_default().add_edge(later, earlier);
    }

    graphs
        .into_iter()
        .filter_map(|(site_id, graph)| graph.find_cycle().map(|path| AuditFinding::cycle(site_id, path)))
        .collect()
}

pub struct ConsistencyAuditor {
    repository: AuditRepository,
    limit: i64,
}

impl ConsistencyAuditor {
    pub fn new(repository: AuditRepository, limit: i64) -> Self {
        Self {
            repository,
            limit: limit.max(1),
        }
    }

    pub async fn run(&self) -> StrataResult<AuditReport> {
        let mut report = AuditReport::default();
        let limit = self.limit;

        let rows = self.repository.cross_site_context_links(limit).await?;
        report.extend(rows.iter().map(|row| AuditFinding::site_mismatch("context link", row)));

        let rows = self.repository.cross_site_sample_links(limit).await?;
        report.extend(rows.iter().map(|row| AuditFinding::site_mismatch("sample link", row)));

        let rows = self.repository.cross_site_relationships(limit).await?;
        report.extend(rows.iter().map(|row| AuditFinding::site_mismatch("relationship", row)));

        let rows = self.repository.duplicate_inventories(limit).await?;
        report.extend(rows.iter().map(AuditFinding::duplicate_inventory));

        let rows = self.repository.orphaned_analysis_subjects(limit).await?;
        report.extend(rows.iter().map(|row| AuditFinding::orphaned("analysis", row)));

        let rows = self.repository.orphaned_media_subjects(limit).await?;
        report.extend(rows.iter().map(|row| AuditFinding::orphaned("media object", row)));

        let rows = self.repository.unadmitted_analysis_subjects(limit).await?;
        report.extend(rows.iter().map(AuditFinding::unadmitted));

        let edges = self.repository.precedence_edges().await?;
        let cycles = precedence_cycles(
            edges
                .into_iter()
                .map(|edge| (edge.site_id, edge.later_su_id, edge.earlier_su_id)),
        );
        report.extend(cycles);

        if report.is_clean() {
            info!("Consistency audit found no problems");
        } else {
            for (code, count) in report.summary() {
                warn!(code, count, "Consistency audit findings");
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_are_reported_per_site() {
        let (site_a, site_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (x, y, z) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let findings = precedence_cycles([
            (site_a, x, y),
            (site_a, y, x),
            (site_b, z, Uuid::new_v4()),
        ]);

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.code, "stratigraphic_cycle");
        assert!(finding.message.contains(&site_a.to_string()));
        assert_eq!(finding.records.first(), finding.records.last());
    }

    #[test]
    fn test_acyclic_sites_are_clean() {
        let site = Uuid::new_v4();
        let su: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let findings = precedence_cycles([(site, su[0], su[1]), (site, su[1], su[2]), (site, su[0], su[3])]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_summary_counts_by_code() {
        let row = LinkMismatchRow {
            link_id: Uuid::new_v4(),
            left_id: Uuid::new_v4(),
            left_site: Uuid::new_v4(),
            right_id: Uuid::new_v4(),
            right_site: Uuid::new_v4(),
        };
        let duplicate = DuplicateInventoryRow {
            site_id: Uuid::new_v4(),
            inventory: "INV-1".to_string(),
            pottery_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
        };

        let mut report = AuditReport::default();
        assert!(report.is_clean());
        report.extend([
            AuditFinding::site_mismatch("context link", &row),
            AuditFinding::site_mismatch("sample link", &row),
            AuditFinding::duplicate_inventory(&duplicate),
        ]);

        let summary = report.summary();
        assert_eq!(summary.get("site_mismatch"), Some(&2));
        assert_eq!(summary.get("duplicate_identity"), Some(&1));
        assert_eq!(report.findings[2].records, duplicate.pottery_ids);
    }

    #[test]
    fn test_orphan_message_names_subject() {
        let row = SubjectLinkRow {
            link_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            subject_kind: "zoo_bone".to_string(),
            subject_id: Uuid::new_v4(),
        };
        let finding = AuditFinding::orphaned("analysis", &row);
        assert_eq!(finding.code, "missing_reference");
        assert!(finding.message.contains("missing zoo_bone"));
    }
}
