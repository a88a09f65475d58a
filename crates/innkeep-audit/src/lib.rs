pub mod error;
pub mod log;
pub mod record;
pub mod report;
pub mod sanitize;
pub mod store;

pub use error::AuditError;
pub use log::{AuditLog, ChainVerification};
pub use record::{
    canonical_json, compute_self_hash, AuditCategory, AuditRecord, AuditSeverity,
};
pub use report::{
    ComplianceReport, PartitionIntegrity, ReportFilters, ReportFinding, ReportRange,
};
pub use sanitize::{contains_pii, is_sensitive_key, sanitize_for_logging, REDACTION_MARKER};
pub use store::{AuditStore, MemoryAuditStore};
