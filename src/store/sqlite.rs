//! SQLite-backed workflow store
//!
//! One bundled connection behind a mutex. Write transactions are opened
//! with `BEGIN IMMEDIATE` so the reserved lock is taken up front: the first
//! committer wins and a concurrent writer surfaces as Conflict instead of
//! silently overwriting a claim.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::traits::{SignatureRepository, StoreTransaction, WorkflowStore};
use crate::claim::{ClaimState, StageClaim};
use crate::document::{Document, HistoryEntry};
use crate::error::{ConformaError, ConformaResult};
use crate::pdf::SignatureKind;
use crate::status::{DocumentStatus, Stage};
use crate::vault::StoredSignature;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id          TEXT PRIMARY KEY,
    reference   TEXT NOT NULL,
    status      TEXT NOT NULL,
    holder_id   TEXT,
    root_path   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS history (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT NOT NULL REFERENCES documents(id),
    at          TEXT NOT NULL,
    status      TEXT NOT NULL,
    actor_id    TEXT NOT NULL,
    actor_name  TEXT NOT NULL,
    actor_role  TEXT NOT NULL,
    note        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS claims (
    id          TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id),
    stage       TEXT NOT NULL,
    actor_id    TEXT NOT NULL,
    state       TEXT NOT NULL,
    observation TEXT,
    slots       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    claimed_at  TEXT,
    ended_at    TEXT,
    UNIQUE(document_id, stage, actor_id)
);

CREATE INDEX IF NOT EXISTS idx_claims_active
    ON claims(document_id, stage, state);

CREATE TABLE IF NOT EXISTS signatures (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    kind        TEXT NOT NULL,
    algorithm   TEXT NOT NULL,
    nonce       BLOB NOT NULL,
    tag         BLOB NOT NULL,
    ciphertext  BLOB NOT NULL
);
";

/// SQLite store for documents, claims, history, and signatures
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> ConformaResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (tests and ephemeral use)
    pub fn open_in_memory() -> ConformaResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl WorkflowStore for SqliteStore {
    fn transaction(&self) -> ConformaResult<Box<dyn StoreTransaction + '_>> {
        let guard = self.conn.lock()?;
        if let Err(err) = guard.execute_batch("BEGIN IMMEDIATE") {
            return Err(map_busy(err));
        }
        Ok(Box::new(SqliteTransaction { guard, done: false }))
    }

    fn insert_document(&self, document: &Document) -> ConformaResult<()> {
        let conn = self.conn.lock()?;
        write_new_document(&conn, document)
    }

    fn document(&self, id: Uuid) -> ConformaResult<Option<Document>> {
        let conn = self.conn.lock()?;
        fetch_document(&conn, id)
    }

    fn history(&self, id: Uuid) -> ConformaResult<Vec<HistoryEntry>> {
        let conn = self.conn.lock()?;
        fetch_history(&conn, id)
    }

    fn claims_for(&self, id: Uuid, stage: Stage) -> ConformaResult<Vec<StageClaim>> {
        let conn = self.conn.lock()?;
        fetch_claims(&conn, id, stage)
    }
}

impl SignatureRepository for SqliteStore {
    fn save_signature(&self, signature: &StoredSignature) -> ConformaResult<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO signatures (id, owner_id, kind, algorithm, nonce, tag, ciphertext)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                signature.id.to_string(),
                signature.owner_id,
                signature.kind.as_str(),
                signature.algorithm,
                signature.nonce,
                signature.tag,
                signature.ciphertext,
            ],
        )?;
        Ok(())
    }

    fn load_signature(&self, id: Uuid) -> ConformaResult<Option<StoredSignature>> {
        let conn = self.conn.lock()?;
        let row: Option<(String, String, String, Vec<u8>, Vec<u8>, Vec<u8>)> = conn
            .query_row(
                "SELECT owner_id, kind, algorithm, nonce, tag, ciphertext
                 FROM signatures WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((owner_id, kind, algorithm, nonce, tag, ciphertext)) = row else {
            return Ok(None);
        };
        let kind = SignatureKind::parse(&kind)
            .ok_or_else(|| ConformaError::CorruptRecord(format!("signature kind '{}'", kind)))?;
        Ok(Some(StoredSignature {
            id,
            owner_id,
            kind,
            algorithm,
            nonce,
            tag,
            ciphertext,
        }))
    }
}

/// One open `BEGIN IMMEDIATE` transaction
///
/// Rolls back on drop unless committed.
struct SqliteTransaction<'a> {
    guard: MutexGuard<'a, Connection>,
    done: bool,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn document(&mut self, id: Uuid) -> ConformaResult<Option<Document>> {
        fetch_document(&self.guard, id)
    }

    fn update_document(&mut self, document: &Document) -> ConformaResult<()> {
        self.guard.execute(
            "UPDATE documents SET status = ?2, holder_id = ?3 WHERE id = ?1",
            params![
                document.id.to_string(),
                document.status.as_str(),
                document.holder_id,
            ],
        )?;
        Ok(())
    }

    fn append_history(&mut self, document_id: Uuid, entry: &HistoryEntry) -> ConformaResult<()> {
        self.guard.execute(
            "INSERT INTO history (document_id, at, status, actor_id, actor_name, actor_role, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document_id.to_string(),
                entry.at.to_rfc3339(),
                entry.status.as_str(),
                entry.actor_id,
                entry.actor_name,
                entry.actor_role,
                entry.note,
            ],
        )?;
        Ok(())
    }

    fn active_claim(
        &mut self,
        document_id: Uuid,
        stage: Stage,
    ) -> ConformaResult<Option<StageClaim>> {
        let mut stmt = self.guard.prepare(
            "SELECT id, document_id, stage, actor_id, state, observation, slots,
                    created_at, claimed_at, ended_at
             FROM claims
             WHERE document_id = ?1 AND stage = ?2 AND state = 'claimed'
             LIMIT 1",
        )?;
        let raw = stmt
            .query_row(params![document_id.to_string(), stage.as_str()], claim_row)
            .optional()?;
        raw.map(raw_to_claim).transpose()
    }

    fn claim_by_actor(
        &mut self,
        document_id: Uuid,
        stage: Stage,
        actor_id: &str,
    ) -> ConformaResult<Option<StageClaim>> {
        let mut stmt = self.guard.prepare(
            "SELECT id, document_id, stage, actor_id, state, observation, slots,
                    created_at, claimed_at, ended_at
             FROM claims
             WHERE document_id = ?1 AND stage = ?2 AND actor_id = ?3",
        )?;
        let raw = stmt
            .query_row(
                params![document_id.to_string(), stage.as_str(), actor_id],
                claim_row,
            )
            .optional()?;
        raw.map(raw_to_claim).transpose()
    }

    fn upsert_claim(&mut self, claim: &StageClaim) -> ConformaResult<()> {
        let slots = serde_json::to_string(&claim.slots)?;
        self.guard.execute(
            "INSERT INTO claims
                 (id, document_id, stage, actor_id, state, observation, slots,
                  created_at, claimed_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(document_id, stage, actor_id) DO UPDATE SET
                 state = excluded.state,
                 observation = excluded.observation,
                 slots = excluded.slots,
                 claimed_at = excluded.claimed_at,
                 ended_at = excluded.ended_at",
            params![
                claim.id.to_string(),
                claim.document_id.to_string(),
                claim.stage.as_str(),
                claim.actor_id,
                claim.state.as_str(),
                claim.observation,
                slots,
                claim.created_at.to_rfc3339(),
                claim.claimed_at.map(|t| t.to_rfc3339()),
                claim.ended_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> ConformaResult<()> {
        self.guard.execute_batch("COMMIT")?;
        self.done = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.guard.execute_batch("ROLLBACK");
        }
    }
}

// ============================================================================
// Row mapping
// ============================================================================

type RawClaim = (
    String,         // id
    String,         // document_id
    String,         // stage
    String,         // actor_id
    String,         // state
    Option<String>, // observation
    String,         // slots json
    String,         // created_at
    Option<String>, // claimed_at
    Option<String>, // ended_at
);

fn claim_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawClaim> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn raw_to_claim(raw: RawClaim) -> ConformaResult<StageClaim> {
    let (id, document_id, stage, actor_id, state, observation, slots, created, claimed, ended) =
        raw;
    let slots: BTreeMap<String, String> = serde_json::from_str(&slots)?;
    Ok(StageClaim {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        stage: Stage::parse(&stage)
            .ok_or_else(|| ConformaError::CorruptRecord(format!("stage '{}'", stage)))?,
        actor_id,
        state: ClaimState::parse(&state)
            .ok_or_else(|| ConformaError::CorruptRecord(format!("claim state '{}'", state)))?,
        observation,
        slots,
        created_at: parse_ts(&created)?,
        claimed_at: claimed.as_deref().map(parse_ts).transpose()?,
        ended_at: ended.as_deref().map(parse_ts).transpose()?,
    })
}

fn fetch_document(conn: &Connection, id: Uuid) -> ConformaResult<Option<Document>> {
    let row: Option<(String, String, Option<String>, String)> = conn
        .query_row(
            "SELECT reference, status, holder_id, root_path FROM documents WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((reference, status, holder_id, root_path)) = row else {
        return Ok(None);
    };
    let status = DocumentStatus::parse(&status)
        .ok_or_else(|| ConformaError::CorruptRecord(format!("document status '{}'", status)))?;
    Ok(Some(Document {
        id,
        reference,
        status,
        holder_id,
        root_path: PathBuf::from(root_path),
    }))
}

fn write_new_document(conn: &Connection, document: &Document) -> ConformaResult<()> {
    conn.execute(
        "INSERT INTO documents (id, reference, status, holder_id, root_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            document.id.to_string(),
            document.reference,
            document.status.as_str(),
            document.holder_id,
            document.root_path.to_string_lossy(),
        ],
    )?;
    Ok(())
}

fn fetch_history(conn: &Connection, id: Uuid) -> ConformaResult<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT at, status, actor_id, actor_name, actor_role, note
         FROM history WHERE document_id = ?1 ORDER BY seq",
    )?;
    let raw: Vec<(String, String, String, String, String, String)> = stmt
        .query_map(params![id.to_string()], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<rusqlite::Result<_>>()?;

    raw.into_iter()
        .map(|(at, status, actor_id, actor_name, actor_role, note)| {
            Ok(HistoryEntry {
                at: parse_ts(&at)?,
                status: DocumentStatus::parse(&status).ok_or_else(|| {
                    ConformaError::CorruptRecord(format!("history status '{}'", status))
                })?,
                actor_id,
                actor_name,
                actor_role,
                note,
            })
        })
        .collect()
}

fn fetch_claims(conn: &Connection, id: Uuid, stage: Stage) -> ConformaResult<Vec<StageClaim>> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, stage, actor_id, state, observation, slots,
                created_at, claimed_at, ended_at
         FROM claims WHERE document_id = ?1 AND stage = ?2 ORDER BY created_at",
    )?;
    let raw: Vec<RawClaim> = stmt
        .query_map(params![id.to_string(), stage.as_str()], claim_row)?
        .collect::<rusqlite::Result<_>>()?;
    raw.into_iter().map(raw_to_claim).collect()
}

fn parse_uuid(s: &str) -> ConformaResult<Uuid> {
    Uuid::parse_str(s).map_err(|_| ConformaError::CorruptRecord(format!("uuid '{}'", s)))
}

fn parse_ts(s: &str) -> ConformaResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ConformaError::CorruptRecord(format!("timestamp '{}'", s)))
}

/// A busy database on a claim attempt is a lost race, not an I/O failure
fn map_busy(err: rusqlite::Error) -> ConformaError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked =>
        {
            ConformaError::ClaimConflict("store is locked by another writer".to_string())
        }
        _ => ConformaError::Database(err),
    }
}
