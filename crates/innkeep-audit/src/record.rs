//! Audit record types, canonical serialization, and chain hashing.
//!
//! `selfHash = hex(SHA-256(prevHash ‖ canonical_json(other fields)))`,
//! where the canonical form sorts object keys and elides whitespace so the
//! hash is independent of serializer quirks.

use chrono::{DateTime, Utc};
use innkeep_crypto::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AuditError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    Auth,
    DataAccess,
    Admin,
    Security,
    Compliance,
    System,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Auth => "AUTH",
            AuditCategory::DataAccess => "DATA_ACCESS",
            AuditCategory::Admin => "ADMIN",
            AuditCategory::Security => "SECURITY",
            AuditCategory::Compliance => "COMPLIANCE",
            AuditCategory::System => "SYSTEM",
        }
    }
}

/// Ordered: INFO < WARNING < ERROR < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "INFO",
            AuditSeverity::Warning => "WARNING",
            AuditSeverity::Error => "ERROR",
            AuditSeverity::Critical => "CRITICAL",
        }
    }
}

/// One immutable entry in a partition's hash chain.
///
/// Never updated or deleted: corrections are appended as new compensating
/// records referencing the original `id` in their details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub partition: String,
    /// 1-based position within the partition.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    pub severity: AuditSeverity,
    pub actor: String,
    pub target: String,
    /// Sanitized before the record is built.
    pub details: Value,
    /// `selfHash` of the previous record; `None` only for the first.
    pub prev_hash: Option<String>,
    pub self_hash: String,
}

/// Canonical JSON: sorted keys, no whitespace. Deterministic regardless of
/// map ordering.
pub fn canonical_json(value: &Value) -> Result<String, AuditError> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(AuditError::NonFiniteNumber);
            }
            Ok(serde_json::to_string(n).unwrap())
        }
        Value::String(s) => Ok(serde_json::to_string(s).unwrap()),
        Value::Array(arr) => {
            let items: Result<Vec<String>, _> = arr.iter().map(canonical_json).collect();
            Ok(format!("[{}]", items?.join(",")))
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let pairs: Result<Vec<String>, _> = keys
                .iter()
                .map(|k| {
                    let v = canonical_json(&obj[*k])?;
                    Ok(format!("{}:{}", serde_json::to_string(*k).unwrap(), v))
                })
                .collect();
            Ok(format!("{{{}}}", pairs?.join(",")))
        }
    }
}

fn hashing_input(record: &AuditRecord) -> Result<String, AuditError> {
    let fields = serde_json::json!({
        "id": record.id,
        "partition": record.partition,
        "seq": record.seq,
        "timestamp": record.timestamp.to_rfc3339(),
        "category": record.category.as_str(),
        "severity": record.severity.as_str(),
        "actor": record.actor,
        "target": record.target,
        "details": record.details,
    });
    Ok(format!(
        "{}{}",
        record.prev_hash.as_deref().unwrap_or(""),
        canonical_json(&fields)?
    ))
}

/// Recompute the record's `selfHash` from its other fields.
pub fn compute_self_hash(record: &AuditRecord) -> Result<String, AuditError> {
    Ok(sha256_hex(hashing_input(record)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> AuditRecord {
        let mut record = AuditRecord {
            id: Uuid::new_v4(),
            partition: "security".to_string(),
            seq: 1,
            timestamp: Utc::now(),
            category: AuditCategory::DataAccess,
            severity: AuditSeverity::Info,
            actor: "svc-booking".to_string(),
            target: "guest-17".to_string(),
            details: json!({"action": "read"}),
            prev_hash: None,
            self_hash: String::new(),
        };
        record.self_hash = compute_self_hash(&record).unwrap();
        record
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let a = canonical_json(&json!({"z": 1, "a": 2, "m": 3})).unwrap();
        let b = canonical_json(&json!({"a": 2, "m": 3, "z": 1})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn canonical_json_nested() {
        let result = canonical_json(&json!({"b": {"d": 1, "c": 2}, "a": 3})).unwrap();
        assert_eq!(result, r#"{"a":3,"b":{"c":2,"d":1}}"#);
    }

    #[test]
    fn canonical_json_primitives() {
        assert_eq!(canonical_json(&Value::Null).unwrap(), "null");
        assert_eq!(canonical_json(&json!(true)).unwrap(), "true");
        assert_eq!(canonical_json(&json!(42)).unwrap(), "42");
        assert_eq!(canonical_json(&json!("hi")).unwrap(), r#""hi""#);
        assert_eq!(canonical_json(&json!([3, 1])).unwrap(), "[3,1]");
    }

    #[test]
    fn self_hash_is_stable() {
        let record = record();
        assert_eq!(compute_self_hash(&record).unwrap(), record.self_hash);
    }

    #[test]
    fn self_hash_covers_details() {
        let mut record = record();
        record.details = json!({"action": "write"});
        assert_ne!(compute_self_hash(&record).unwrap(), record.self_hash);
    }

    #[test]
    fn self_hash_covers_prev_hash() {
        let mut record = record();
        record.prev_hash = Some("ff".repeat(32));
        assert_ne!(compute_self_hash(&record).unwrap(), record.self_hash);
    }

    #[test]
    fn severity_is_ordered() {
        assert!(AuditSeverity::Info < AuditSeverity::Warning);
        assert!(AuditSeverity::Warning < AuditSeverity::Error);
        assert!(AuditSeverity::Error < AuditSeverity::Critical);
    }

    #[test]
    fn enums_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&AuditCategory::DataAccess).unwrap(),
            "\"DATA_ACCESS\""
        );
        assert_eq!(
            serde_json::to_string(&AuditSeverity::Warning).unwrap(),
            "\"WARNING\""
        );
        assert_eq!(AuditCategory::DataAccess.as_str(), "DATA_ACCESS");
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(json.contains("\"prevHash\""));
        assert!(json.contains("\"selfHash\""));
    }
}
