use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context as _, Result};
use rusqlite::{Connection, OptionalExtension as _, params};

use super::SessionStore;

const KEY_MNEMONIC_SAVED: &str = "mnemonic_saved";
const KEY_MARKET_TOKEN: &str = "market_token";

/// Sqlite-backed key-value session store.
#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteSessionStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create session store dir {}", dir.display()))?;
        }

        let conn =
            Connection::open(&path).with_context(|| format!("open sqlite {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set sqlite busy_timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .context("configure sqlite pragmas")?;

        migrate(&conn).context("migrate sqlite schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .expect("session store mutex poisoned")
            .query_row(
                "SELECT value FROM session WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("get session value {key}"))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .lock()
            .expect("session store mutex poisoned")
            .execute(
                r#"
INSERT INTO session (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
                params![key, value],
            )
            .with_context(|| format!("put session value {key}"))?;
        Ok(())
    }
}

impl SessionStore for SqliteSessionStore {
    fn mnemonic_saved(&self) -> Result<bool> {
        Ok(self.get(KEY_MNEMONIC_SAVED)?.as_deref() == Some("1"))
    }

    fn set_mnemonic_saved(&self, saved: bool) -> Result<()> {
        self.put(KEY_MNEMONIC_SAVED, if saved { "1" } else { "0" })
    }

    fn market_token(&self) -> Result<Option<String>> {
        Ok(self
            .get(KEY_MARKET_TOKEN)?
            .map(|token| token.to_ascii_lowercase()))
    }

    fn set_market_token(&self, token: &str) -> Result<()> {
        self.put(KEY_MARKET_TOKEN, &token.to_ascii_lowercase())
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS session (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
    )
    .context("create tables")?;
    Ok(())
}
