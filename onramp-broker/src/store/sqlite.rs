//! SQLite-based storage implementation

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use onramp_core::{VerificationOutcome, VerificationState};
use rusqlite::{params, Connection, OptionalExtension};

use super::{StoreResult, VerificationRecord, VerificationStore, WebhookEventRecord, WebhookStore};
use crate::error::BrokerError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based store implementing both VerificationStore and WebhookStore
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, BrokerError> {
        let conn = Connection::open(path).map_err(|e| BrokerError::Store(e.to_string()))?;
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), BrokerError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(|e| BrokerError::Store(e.to_string()))?;
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, BrokerError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(|e| BrokerError::Store(e.to_string()))?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(|e| BrokerError::Store(e.to_string()))
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), BrokerError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS verifications (
                verification_id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                state TEXT NOT NULL,
                outcome TEXT,
                inquiry_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_verifications_customer
                ON verifications(customer_id);

            CREATE TABLE IF NOT EXISTS webhook_events (
                event_id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                processed_at TEXT NOT NULL
            );",
        )
        .map_err(|e| BrokerError::Store(e.to_string()))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<VerificationRecord> {
    let state: String = row.get(2)?;
    let outcome: Option<String> = row.get(3)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(VerificationRecord {
        verification_id: row.get(0)?,
        customer_id: row.get(1)?,
        state: VerificationState::parse(&state),
        outcome: outcome.as_deref().and_then(VerificationOutcome::from_str),
        inquiry_url: row.get(4)?,
        created_at: parse_instant(&created_at),
        updated_at: parse_instant(&updated_at),
    })
}

fn parse_instant(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const RECORD_COLUMNS: &str =
    "verification_id, customer_id, state, outcome, inquiry_url, created_at, updated_at";

impl VerificationStore for SqliteStore {
    fn find_reusable(&self, customer_id: &str) -> StoreResult<Option<VerificationRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM verifications
                 WHERE customer_id = ?1 AND state != 'completed'
                 ORDER BY created_at DESC LIMIT 1"
            ),
            params![customer_id],
            row_to_record,
        )
        .optional()
        .map_err(|e| BrokerError::Store(e.to_string()))
    }

    fn get(&self, verification_id: &str) -> StoreResult<Option<VerificationRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM verifications WHERE verification_id = ?1"),
            params![verification_id],
            row_to_record,
        )
        .optional()
        .map_err(|e| BrokerError::Store(e.to_string()))
    }

    fn save_snapshot(&self, record: VerificationRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        let existing = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM verifications WHERE verification_id = ?1"),
                params![record.verification_id],
                row_to_record,
            )
            .optional()
            .map_err(|e| BrokerError::Store(e.to_string()))?;

        let merged = record.merged_over(existing.as_ref());

        conn.execute(
            "INSERT OR REPLACE INTO verifications
             (verification_id, customer_id, state, outcome, inquiry_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                merged.verification_id,
                merged.customer_id,
                merged.state.as_str(),
                merged.outcome.map(|o| o.as_str()),
                merged.inquiry_url,
                merged.created_at.to_rfc3339(),
                merged.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| BrokerError::Store(e.to_string()))?;

        Ok(())
    }
}

impl WebhookStore for SqliteStore {
    fn claim_event(&self, record: WebhookEventRecord) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();

        // INSERT OR IGNORE changes no rows when the id is already claimed,
        // which makes the claim atomic under the connection lock.
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO webhook_events
                 (event_id, event_type, payload, processed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.event_id,
                    record.event_type,
                    record.payload.to_string(),
                    record.processed_at.to_rfc3339(),
                ],
            )
            .map_err(|e| BrokerError::Store(e.to_string()))?;

        Ok(changed == 1)
    }
}
