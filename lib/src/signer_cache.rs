//! Local Signer Cache: a small key-value table holding, per managed FID, the
//! signers this machine created and attached.
//!
//! Values are JSON arrays of [`StoredSigner`] without a version field, so
//! loading skips entries it cannot read instead of failing, and appending
//! writes every existing entry back untouched.

use crate::types::StoredSigner;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

pub const SIGNER_CACHE_FILE: &str = "signers.sqlite";

#[derive(Debug, Error)]
pub enum SignerCacheError {
    #[error("signer cache database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("failed to serialize signers: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to create signer cache directory: {0}")]
    Io(#[from] std::io::Error),
}

impl SignerCacheError {
    pub fn kind(&self) -> &str {
        match *self {
            SignerCacheError::Db(_) => "Db",
            SignerCacheError::Serialize(_) => "Serialize",
            SignerCacheError::Io(_) => "Io",
        }
    }
}

pub struct SignerCache {
    conn: Connection,
}

impl SignerCache {
    pub fn open(path: &Path) -> Result<Self, SignerCacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::init(conn)
    }

    /// Open an existing cache for listing. Appends fail.
    pub fn open_read_only(path: &Path) -> Result<Self, SignerCacheError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, SignerCacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SignerCacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn key_for(fid: u64) -> String {
        format!("signers_{fid}")
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>, SignerCacheError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Every stored entry as raw JSON, readable or not.
    fn load_entries(&self, fid: u64) -> Result<Vec<Value>, SignerCacheError> {
        let Some(raw) = self.get_raw(&Self::key_for(fid))? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(fid, "ignoring unreadable signer cache entry: {e}");
                Ok(Vec::new())
            }
        }
    }

    pub fn load(&self, fid: u64) -> Result<Vec<StoredSigner>, SignerCacheError> {
        Ok(self
            .load_entries(fid)?
            .iter()
            .filter_map(stored_signer)
            .collect())
    }

    /// Append unless a signer with the same uuid is already stored.
    /// Returns whether the signer was added.
    pub fn append(&self, fid: u64, signer: StoredSigner) -> Result<bool, SignerCacheError> {
        let mut entries = self.load_entries(fid)?;
        if entries
            .iter()
            .any(|entry| entry_uuid(entry) == Some(signer.signer_uuid.as_str()))
        {
            return Ok(false);
        }
        entries.push(serde_json::to_value(&signer)?);
        let value = serde_json::to_string(&entries)?;
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![Self::key_for(fid), value],
        )?;
        Ok(true)
    }

    /// Signer uuid to act with: the override when given, else the first stored.
    pub fn select_signer(
        &self,
        fid: u64,
        override_uuid: Option<&str>,
    ) -> Result<Option<String>, SignerCacheError> {
        if let Some(uuid) = override_uuid.map(str::trim).filter(|u| !u.is_empty()) {
            return Ok(Some(uuid.to_string()));
        }
        Ok(self.load(fid)?.into_iter().next().map(|s| s.signer_uuid))
    }
}

fn entry_uuid(entry: &Value) -> Option<&str> {
    entry
        .get("signer_uuid")
        .and_then(Value::as_str)
        .filter(|uuid| !uuid.is_empty())
}

/// Read the fields this version knows. Anything else in the entry is left
/// alone in storage.
fn stored_signer(entry: &Value) -> Option<StoredSigner> {
    let text = |field: &str| match entry.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Some(StoredSigner {
        signer_uuid: entry_uuid(entry)?.to_string(),
        public_key: text("public_key"),
        created_at: text("created_at"),
    })
}
