#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

pub const USERS_SCHEMA: &str = "CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT,
    email TEXT,
    password TEXT,
    role TEXT,
    created_at TEXT,
    updated_at TEXT
);";

/// Scratch directory holding source files and databases for one test case.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Creates a SQLite database from `schema` and returns its path.
    pub fn database(&self, name: &str, schema: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let conn = Connection::open(&path).expect("create database");
        conn.execute_batch(schema).expect("apply schema");
        path
    }
}

pub fn count_rows(database: &Path, table: &str) -> i64 {
    let conn = Connection::open(database).expect("open database");
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

/// Every row of `column` in `table` ordered by rowid, NULL as `None`.
pub fn column_values(database: &Path, table: &str, column: &str) -> Vec<Option<String>> {
    let conn = Connection::open(database).expect("open database");
    let mut stmt = conn
        .prepare(&format!(
            "SELECT CAST(\"{column}\" AS TEXT) FROM \"{table}\" ORDER BY rowid"
        ))
        .expect("prepare select");
    stmt.query_map([], |row| row.get::<_, Option<String>>(0))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("read rows")
}

/// `count` data lines of `id;name;email`, preceded by a header.
pub fn users_csv(count: usize) -> String {
    let mut csv = String::from("id;name;email\n");
    for id in 1..=count {
        csv.push_str(&format!("{id};user{id};user{id}@example.com\n"));
    }
    csv
}
