//! Append-only audit storage
//!
//! The `AuditStore` trait has no update or delete operation, and the SQLite
//! implementation installs triggers that abort any UPDATE or DELETE on the
//! audit table, so rows stay immutable even for raw SQL clients.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};

use crate::contracts::{AuditRecord, AuditStatus};
use crate::error::AuditError;

pub type AuditResult<T> = std::result::Result<T, AuditError>;

/// Insert-only record store
pub trait AuditStore: Send + Sync {
    /// Insert a new record. Fails if the entry id already exists.
    fn insert(&self, record: &AuditRecord) -> AuditResult<()>;

    /// Latest record for a correlation id
    fn get_by_correlation_id(&self, correlation_id: &str) -> AuditResult<Option<AuditRecord>>;

    /// Up to `limit` records for an actor, newest first
    fn recent_by_actor(&self, actor_id: &str, limit: usize) -> AuditResult<Vec<AuditRecord>>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS decision_audit_log (
  entry_id TEXT PRIMARY KEY,
  event_at TEXT NOT NULL,
  stored_at TEXT NOT NULL,
  correlation_id TEXT NOT NULL,
  actor_id TEXT NOT NULL,
  message TEXT NOT NULL,
  message_length INTEGER NOT NULL,
  query_plan_json TEXT,
  decision_json TEXT,
  document_json TEXT,
  query_plan_id TEXT,
  decision_id TEXT,
  output_id TEXT,
  policy_mode_version TEXT NOT NULL,
  domain_pack_version TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('success', 'error', 'partial')),
  error_message TEXT,
  warnings_json TEXT NOT NULL,
  output_ai INTEGER NOT NULL CHECK (output_ai IN (0, 1)),
  routing_ms INTEGER,
  governing_ms INTEGER,
  synthesizing_ms INTEGER,
  total_ms INTEGER NOT NULL,
  checksum TEXT NOT NULL,
  signature TEXT NOT NULL,
  retention_policy TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_correlation ON decision_audit_log(correlation_id);
CREATE INDEX IF NOT EXISTS idx_audit_actor ON decision_audit_log(actor_id, stored_at);

CREATE TRIGGER IF NOT EXISTS trg_decision_audit_log_no_update
BEFORE UPDATE ON decision_audit_log
BEGIN
  SELECT RAISE(ABORT, 'decision_audit_log is append-only');
END;
CREATE TRIGGER IF NOT EXISTS trg_decision_audit_log_no_delete
BEFORE DELETE ON decision_audit_log
BEGIN
  SELECT RAISE(ABORT, 'decision_audit_log is append-only');
END;
"#;

const COLUMNS: &str = "entry_id, event_at, stored_at, correlation_id, actor_id, message, \
     message_length, query_plan_json, decision_json, document_json, query_plan_id, decision_id, \
     output_id, policy_mode_version, domain_pack_version, status, error_message, warnings_json, \
     output_ai, routing_ms, governing_ms, synthesizing_ms, total_ms, checksum, signature, \
     retention_policy";

/// SQLite-backed audit store
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Open or create the audit database and apply the schema
    pub fn open(path: &Path) -> AuditResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        tracing::info!(path = %path.display(), "Opened audit store");
        Ok(store)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> AuditResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> AuditResult<()> {
        self.lock()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Unavailable("audit store lock poisoned".to_string()))
    }

    /// Raw statement against the store, for integrity tests
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> AuditResult<usize> {
        Ok(self.lock()?.execute(sql, [])?)
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> AuditResult<()> {
        let query_plan = record.query_plan.as_ref().map(serde_json::to_string).transpose()?;
        let decision = record.decision.as_ref().map(serde_json::to_string).transpose()?;
        let document = record.document.as_ref().map(serde_json::to_string).transpose()?;
        let warnings = serde_json::to_string(&record.warnings)?;

        let conn = self.lock()?;
        let result = conn.execute(
            &format!(
                "INSERT INTO decision_audit_log ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
                  ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
                COLUMNS
            ),
            params![
                record.entry_id,
                format_timestamp(&record.event_at),
                format_timestamp(&record.stored_at),
                record.correlation_id,
                record.actor_id,
                record.message,
                record.message_length as i64,
                query_plan,
                decision,
                document,
                record.query_plan_id,
                record.decision_id,
                record.output_id,
                record.policy_mode_version,
                record.domain_pack_version,
                record.status.as_str(),
                record.error_message,
                warnings,
                record.output_ai,
                record.routing_ms.map(|v| v as i64),
                record.governing_ms.map(|v| v as i64),
                record.synthesizing_ms.map(|v| v as i64),
                record.total_ms as i64,
                record.checksum,
                record.signature,
                record.retention_policy,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Err(AuditError::ImmutableRecord(record.entry_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_by_correlation_id(&self, correlation_id: &str) -> AuditResult<Option<AuditRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM decision_audit_log WHERE correlation_id = ?1 \
             ORDER BY stored_at DESC, rowid DESC LIMIT 1",
            COLUMNS
        ))?;
        let row = stmt
            .query_row(params![correlation_id], StoredRow::read)
            .optional()?;
        row.map(StoredRow::into_record).transpose()
    }

    fn recent_by_actor(&self, actor_id: &str, limit: usize) -> AuditResult<Vec<AuditRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM decision_audit_log WHERE actor_id = ?1 \
             ORDER BY stored_at DESC, rowid DESC LIMIT ?2",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![actor_id, limit as i64], StoredRow::read)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

impl std::fmt::Debug for SqliteAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAuditStore").finish_non_exhaustive()
    }
}

/// Raw column values, decoded into an `AuditRecord` outside the rusqlite
/// row callback so JSON and timestamp errors keep their own error variants.
struct StoredRow {
    entry_id: String,
    event_at: String,
    stored_at: String,
    correlation_id: String,
    actor_id: String,
    message: String,
    message_length: i64,
    query_plan: Option<String>,
    decision: Option<String>,
    document: Option<String>,
    query_plan_id: Option<String>,
    decision_id: Option<String>,
    output_id: Option<String>,
    policy_mode_version: String,
    domain_pack_version: String,
    status: String,
    error_message: Option<String>,
    warnings: String,
    output_ai: bool,
    routing_ms: Option<i64>,
    governing_ms: Option<i64>,
    synthesizing_ms: Option<i64>,
    total_ms: i64,
    checksum: String,
    signature: String,
    retention_policy: String,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entry_id: row.get(0)?,
            event_at: row.get(1)?,
            stored_at: row.get(2)?,
            correlation_id: row.get(3)?,
            actor_id: row.get(4)?,
            message: row.get(5)?,
            message_length: row.get(6)?,
            query_plan: row.get(7)?,
            decision: row.get(8)?,
            document: row.get(9)?,
            query_plan_id: row.get(10)?,
            decision_id: row.get(11)?,
            output_id: row.get(12)?,
            policy_mode_version: row.get(13)?,
            domain_pack_version: row.get(14)?,
            status: row.get(15)?,
            error_message: row.get(16)?,
            warnings: row.get(17)?,
            output_ai: row.get(18)?,
            routing_ms: row.get(19)?,
            governing_ms: row.get(20)?,
            synthesizing_ms: row.get(21)?,
            total_ms: row.get(22)?,
            checksum: row.get(23)?,
            signature: row.get(24)?,
            retention_policy: row.get(25)?,
        })
    }

    fn into_record(self) -> AuditResult<AuditRecord> {
        let json = |value: Option<String>| -> AuditResult<Option<serde_json::Value>> {
            Ok(value.map(|s| serde_json::from_str(&s)).transpose()?)
        };

        Ok(AuditRecord {
            event_at: parse_timestamp(&self.event_at)?,
            stored_at: parse_timestamp(&self.stored_at)?,
            status: self
                .status
                .parse::<AuditStatus>()
                .map_err(AuditError::Corrupt)?,
            query_plan: json(self.query_plan)?,
            decision: json(self.decision)?,
            document: json(self.document)?,
            warnings: serde_json::from_str(&self.warnings)?,
            entry_id: self.entry_id,
            correlation_id: self.correlation_id,
            actor_id: self.actor_id,
            message: self.message,
            message_length: self.message_length.max(0) as u64,
            query_plan_id: self.query_plan_id,
            decision_id: self.decision_id,
            output_id: self.output_id,
            policy_mode_version: self.policy_mode_version,
            domain_pack_version: self.domain_pack_version,
            error_message: self.error_message,
            output_ai: self.output_ai,
            routing_ms: self.routing_ms.map(|v| v.max(0) as u64),
            governing_ms: self.governing_ms.map(|v| v.max(0) as u64),
            synthesizing_ms: self.synthesizing_ms.map(|v| v.max(0) as u64),
            total_ms: self.total_ms.max(0) as u64,
            checksum: self.checksum,
            signature: self.signature,
            retention_policy: self.retention_policy,
        })
    }
}

/// Fixed-width RFC 3339 with nanoseconds, so values round-trip exactly and
/// sort lexicographically.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> AuditResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AuditError::Corrupt(format!("invalid timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(entry_id: &str, actor_id: &str, stored_at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            entry_id: entry_id.to_string(),
            event_at: stored_at,
            stored_at,
            correlation_id: format!("corr-{}", entry_id),
            actor_id: actor_id.to_string(),
            message: "hola".to_string(),
            message_length: 4,
            query_plan: Some(serde_json::json!({"plan_id": "p"})),
            decision: None,
            document: None,
            query_plan_id: Some("p".to_string()),
            decision_id: None,
            output_id: None,
            policy_mode_version: "policy-mode-v1".to_string(),
            domain_pack_version: "pack".to_string(),
            status: AuditStatus::Partial,
            error_message: Some("governor failed".to_string()),
            warnings: vec!["w".to_string()],
            output_ai: false,
            routing_ms: Some(1),
            governing_ms: None,
            synthesizing_ms: None,
            total_ms: 3,
            checksum: "c".to_string(),
            signature: "s".to_string(),
            retention_policy: "retain-7y".to_string(),
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let original = record("e1", "actor", Utc::now());
        store.insert(&original).unwrap();

        let loaded = store.get_by_correlation_id("corr-e1").unwrap().unwrap();
        assert_eq!(loaded.entry_id, "e1");
        assert_eq!(loaded.status, AuditStatus::Partial);
        assert_eq!(loaded.query_plan, original.query_plan);
        assert_eq!(loaded.warnings, original.warnings);
        assert_eq!(loaded.routing_ms, Some(1));
        assert_eq!(loaded.governing_ms, None);
        assert!(store.get_by_correlation_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_is_rejected() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.insert(&record("e1", "actor", Utc::now())).unwrap();

        let err = store
            .execute_raw("UPDATE decision_audit_log SET status = 'success' WHERE entry_id = 'e1'")
            .unwrap_err();
        assert!(err.to_string().contains("append-only"));

        let loaded = store.get_by_correlation_id("corr-e1").unwrap().unwrap();
        assert_eq!(loaded.status, AuditStatus::Partial);
    }

    #[test]
    fn test_delete_is_rejected() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.insert(&record("e1", "actor", Utc::now())).unwrap();

        let err = store
            .execute_raw("DELETE FROM decision_audit_log")
            .unwrap_err();
        assert!(err.to_string().contains("append-only"));
        assert!(store.get_by_correlation_id("corr-e1").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_entry_is_rejected() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let r = record("e1", "actor", Utc::now());
        store.insert(&r).unwrap();

        let err = store.insert(&r).unwrap_err();
        assert!(matches!(err, AuditError::ImmutableRecord(id) if id == "e1"));
    }

    #[test]
    fn test_recent_by_actor_newest_first() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.insert(&record("old", "ana", now - chrono::Duration::seconds(10))).unwrap();
        store.insert(&record("new", "ana", now)).unwrap();
        store.insert(&record("other", "luis", now)).unwrap();

        let records = store.recent_by_actor("ana", 10).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        assert_eq!(store.recent_by_actor("ana", 1).unwrap().len(), 1);
    }
}
