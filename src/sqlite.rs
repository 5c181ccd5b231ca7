use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::report::MutationReport;

pub fn default_db_path() -> PathBuf {
    Path::new("db").join("mutants.db")
}

/// Open `db_path`, creating the file, its folder and the schema on first use
/// and verifying the schema otherwise.
pub fn check_db(db_path: &Path) -> Result<()> {
    debug!(path = %db_path.display(), "checking sqlite database");
    let is_new_db = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let connection = Connection::open(db_path)?;
    if is_new_db {
        create_db(&connection)?;
    } else {
        check_schema(&connection)?;
    }
    Ok(())
}

fn create_db(connection: &Connection) -> Result<()> {
    info!("initializing new mutants database");

    connection.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS runs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            source          TEXT NOT NULL,
            created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            tool_version    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_runs_created ON runs(created_at DESC);

        CREATE TABLE IF NOT EXISTS mutants (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            file_path           TEXT NOT NULL,
            function            TEXT NOT NULL,
            node_id             INTEGER NOT NULL,
            operator            TEXT NOT NULL,
            patch_hash          TEXT NOT NULL,
            code                TEXT NOT NULL,
            FOREIGN KEY(run_id) REFERENCES runs(id)
        );

        CREATE INDEX IF NOT EXISTS idx_mutants_run ON mutants(run_id);
        CREATE INDEX IF NOT EXISTS idx_mutants_function ON mutants(file_path, function);
        CREATE INDEX IF NOT EXISTS idx_mutants_operator ON mutants(operator);
        CREATE INDEX IF NOT EXISTS idx_mutants_hash ON mutants(patch_hash);
        ",
    )?;
    Ok(())
}

const TABLE_COLUMNS: [(&str, &[&str]); 2] = [
    ("runs", &["id", "source", "created_at", "tool_version"]),
    (
        "mutants",
        &[
            "id", "run_id", "file_path", "function", "node_id", "operator", "patch_hash", "code",
        ],
    ),
];

fn check_schema(connection: &Connection) -> Result<()> {
    for (table, columns) in TABLE_COLUMNS {
        let mut stmt = connection.prepare(&format!("PRAGMA table_xinfo({});", table))?;
        let column_names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(std::result::Result::ok)
            .collect();

        if column_names.is_empty() {
            return Err(schema_error(format!("Missing table: {}", table)));
        }
        for col in columns.iter() {
            if !column_names.iter().any(|name| name == col) {
                return Err(schema_error(format!(
                    "Missing column '{}' in table '{}'",
                    col, table
                )));
            }
        }
    }

    debug!("sqlite schema verified");
    Ok(())
}

fn schema_error(message: String) -> crate::error::MutationError {
    rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some(message)).into()
}

/// Insert a run row and return its id.
pub fn store_run(db_path: &Path, source: &str) -> Result<i64> {
    let connection = Connection::open(db_path)?;
    let tool_version = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    connection.execute(
        "INSERT INTO runs (source, tool_version) VALUES (?1, ?2);",
        params![source, tool_version],
    )?;

    let run_id = connection.last_insert_rowid();
    info!(run_id, source, "stored run");
    Ok(run_id)
}

/// Insert one row per mutant of `report` under `run_id`.
pub fn store_mutants(db_path: &Path, run_id: i64, report: &MutationReport) -> Result<usize> {
    let mut connection = Connection::open(db_path)?;
    let tx = connection.transaction()?;
    let mut stored = 0;
    {
        let mut insert = tx.prepare(
            "INSERT INTO mutants (run_id, file_path, function, node_id, operator, patch_hash, code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        )?;
        for function in &report.functions {
            for mutant in &function.mutants {
                insert.execute(params![
                    run_id,
                    function.file,
                    function.function,
                    mutant.node_id,
                    mutant.operator,
                    mutant.patch_hash,
                    mutant.code,
                ])?;
                stored += 1;
            }
        }
    }
    tx.commit()?;

    info!(run_id, stored, "stored mutants");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FunctionReport, MutantRecord};
    use tempfile::tempdir;

    fn report() -> MutationReport {
        MutationReport::new(vec![FunctionReport {
            file: "calc.py".into(),
            function: "add".into(),
            original_code: "def add(a, b):\n    return a + b\n".into(),
            dropped: 0,
            mutants: vec![MutantRecord {
                index: 0,
                node_id: 1,
                operator: "RSD".into(),
                patch_hash: "abc".into(),
                code: "def add(a, b):\n    pass\n".into(),
            }],
        }])
    }

    #[test]
    fn test_check_db_creates_schema() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("db").join("mutants.db");
        check_db(&db_path).unwrap();
        assert!(db_path.exists());
        // second call verifies the existing schema
        check_db(&db_path).unwrap();
    }

    #[test]
    fn test_check_db_rejects_foreign_schema() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("other.db");
        let connection = Connection::open(&db_path).unwrap();
        connection
            .execute_batch("CREATE TABLE runs (id INTEGER PRIMARY KEY);")
            .unwrap();
        drop(connection);
        assert!(check_db(&db_path).is_err());
    }

    #[test]
    fn test_store_run_and_mutants() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("mutants.db");
        check_db(&db_path).unwrap();

        let run_id = store_run(&db_path, "calc.py").unwrap();
        assert_eq!(store_mutants(&db_path, run_id, &report()).unwrap(), 1);

        let connection = Connection::open(&db_path).unwrap();
        let (operator, node_id): (String, u32) = connection
            .query_row(
                "SELECT operator, node_id FROM mutants WHERE run_id = ?1;",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(operator, "RSD");
        assert_eq!(node_id, 1);
    }

    #[test]
    fn test_mutants_table_holds_generation_data_only() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("mutants.db");
        check_db(&db_path).unwrap();

        let connection = Connection::open(&db_path).unwrap();
        let mut stmt = connection.prepare("PRAGMA table_info(mutants);").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(columns, TABLE_COLUMNS[1].1);
        assert!(!columns.iter().any(|c| c == "status"));
    }
}
