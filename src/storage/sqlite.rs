//! SQLite 任务存储
//!
//! Same full-list contract as the JSON file: `save_tasks` replaces the table
//! contents in one transaction. Schema version lives in `PRAGMA user_version`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use super::tasks::{Task, TaskStorage};
use crate::error::{Result, TrellisError};

const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS tasks (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status      TEXT NOT NULL,
    priority    TEXT NOT NULL,
    due_date    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);";

/// SQLite-backed task storage.
pub struct SqliteStorage {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// 打开（或创建）数据库文件并应用 schema
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        super::ensure_parent_dir(&path)?;
        let conn = Connection::open(&path)?;
        Self::from_connection(path, conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(PathBuf::from(":memory:"), conn)
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite task storage");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrellisError::storage("sqlite connection lock poisoned"))
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(TrellisError::storage(format!(
            "database schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }
    if version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TrellisError::invalid_data(format!("bad timestamp '{}': {}", raw, e)))
}

struct RawRow {
    id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    due_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            status: row.get(3)?,
            priority: row.get(4)?,
            due_date: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    // 读路径拒绝无效数据，而不是静默修正
    fn into_task(self) -> Result<Task> {
        let due_date = match self.due_date {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                TrellisError::invalid_data(format!("bad due date '{}': {}", raw, e))
            })?),
            None => None,
        };
        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status.parse()?,
            priority: self.priority.parse()?,
            due_date,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

impl TaskStorage for SqliteStorage {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, status, priority, due_date, created_at, updated_at
             FROM tasks ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([], RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawRow::into_task).collect()
    }

    fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO tasks (id, title, description, status, priority, due_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for task in tasks {
                insert.execute(params![
                    task.id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(path = %self.path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.execute("DELETE FROM tasks", [])?;
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
