//! Compliance reporting over the audit chains.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::log::AuditLog;
use crate::record::{AuditCategory, AuditSeverity};

/// Inclusive time window a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Optional narrowing of a report.
#[derive(Debug, Clone, Default)]
pub struct ReportFilters {
    pub categories: Option<Vec<AuditCategory>>,
    pub min_severity: Option<AuditSeverity>,
    /// Defaults to every partition the store knows.
    pub partitions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionIntegrity {
    pub partition: String,
    pub valid: bool,
    pub broken_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFinding {
    pub severity: AuditSeverity,
    pub message: String,
}

/// Plain serializable aggregate handed to the compliance consumer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub range: ReportRange,
    pub totals_by_category: BTreeMap<String, u64>,
    pub totals_by_severity: BTreeMap<String, u64>,
    pub total_records: u64,
    pub chain_integrity: Vec<PartitionIntegrity>,
    pub findings: Vec<ReportFinding>,
    pub generated_at: DateTime<Utc>,
}

impl AuditLog {
    /// Aggregate counts by category and severity over `range`, verifying
    /// every covered partition's chain. A broken chain is itself a
    /// reportable security event, so it lands in `findings` as CRITICAL.
    pub fn generate_compliance_report(
        &self,
        range: ReportRange,
        filters: &ReportFilters,
    ) -> Result<ComplianceReport, AuditError> {
        let partitions = match &filters.partitions {
            Some(named) => named.clone(),
            None => self.store().partitions()?,
        };

        let mut totals_by_category: BTreeMap<String, u64> = BTreeMap::new();
        let mut totals_by_severity: BTreeMap<String, u64> = BTreeMap::new();
        let mut total_records = 0u64;
        let mut chain_integrity = Vec::new();
        let mut findings = Vec::new();

        for partition in &partitions {
            let verification = self.verify_chain(partition)?;
            if let Some(position) = verification.broken_at {
                findings.push(ReportFinding {
                    severity: AuditSeverity::Critical,
                    message: format!(
                        "audit chain for partition {:?} fails verification at position {}",
                        partition, position
                    ),
                });
            }
            chain_integrity.push(PartitionIntegrity {
                partition: partition.clone(),
                valid: verification.valid,
                broken_at: verification.broken_at,
            });

            for record in self.store().records(partition)? {
                if !range.contains(record.timestamp) {
                    continue;
                }
                if let Some(categories) = &filters.categories {
                    if !categories.contains(&record.category) {
                        continue;
                    }
                }
                if let Some(min) = filters.min_severity {
                    if record.severity < min {
                        continue;
                    }
                }
                *totals_by_category
                    .entry(record.category.as_str().to_string())
                    .or_default() += 1;
                *totals_by_severity
                    .entry(record.severity.as_str().to_string())
                    .or_default() += 1;
                total_records += 1;
            }
        }

        Ok(ComplianceReport {
            range,
            totals_by_category,
            totals_by_severity,
            total_records,
            chain_integrity,
            findings,
            generated_at: Utc::now(),
        })
    }
}
