//! SQLite persistence for the two things Proxmox cannot give back to us:
//! generated guest passwords and REST API users.

use crate::proxmox::ResourceKind;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A guest created by this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub vmid: i64,
    pub kind: ResourceKind,
    pub name: String,
    pub os: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database {:?}", path.as_ref()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(store)
    }

    /// In-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                vmid INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                os TEXT,
                password TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .context("Failed to initialize schema")?;
        Ok(())
    }

    /// Records a created guest. An existing password for the same id is
    /// never overwritten.
    pub fn record_resource(&self, record: &ResourceRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO resources (vmid, kind, name, os, password, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(vmid) DO UPDATE SET
                kind = excluded.kind,
                name = excluded.name,
                os = excluded.os,
                password = COALESCE(resources.password, excluded.password)
            "#,
            params![
                record.vmid,
                record.kind.as_str(),
                record.name,
                record.os,
                record.password,
                chrono::Utc::now().timestamp(),
            ],
        )
        .context("Failed to record resource")?;
        Ok(())
    }

    /// Records a guest Proxmox has just created. Any existing row for the id
    /// belonged to a guest that is gone, so it is replaced wholesale.
    pub fn register_created(&self, record: &ResourceRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO resources (vmid, kind, name, os, password, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(vmid) DO UPDATE SET
                kind = excluded.kind,
                name = excluded.name,
                os = excluded.os,
                password = excluded.password,
                created_at = excluded.created_at
            "#,
            params![
                record.vmid,
                record.kind.as_str(),
                record.name,
                record.os,
                record.password,
                chrono::Utc::now().timestamp(),
            ],
        )
        .context("Failed to register created resource")?;
        Ok(())
    }

    pub fn resource(&self, vmid: i64) -> Result<Option<ResourceRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT vmid, kind, name, os, password FROM resources WHERE vmid = ?1",
                params![vmid],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(vmid, kind, name, os, password)| {
            Ok(ResourceRecord {
                vmid,
                kind: kind.parse().map_err(anyhow::Error::msg)?,
                name,
                os,
                password,
            })
        })
        .transpose()
    }

    pub fn resource_password(&self, vmid: i64) -> Result<Option<String>> {
        Ok(self.resource(vmid)?.and_then(|r| r.password))
    }

    /// Drops the local row once the guest itself is gone, so a reused id starts clean.
    pub fn forget_resource(&self, vmid: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM resources WHERE vmid = ?1", params![vmid])?;
        Ok(())
    }

    /// Returns `false` when the username is already taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO NOTHING",
                params![username, password_hash, chrono::Utc::now().timestamp()],
            )
            .context("Failed to create user")?;
        Ok(inserted == 1)
    }

    pub fn user_password_hash(&self, username: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let hash = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.user_password_hash(username)?.is_some())
    }
}
