//! Upload artifacts for a downstream clinical data-capture system.
//!
//! The interface is just a table with columns
//! `identifier, stratum, treatment_assignment`. Two forms are written:
//! CSV for hand upload, and a SQLite file for platforms that import one.
//!
//! RULE: Only this module talks to the database.
//! The consumption flag is never exported; the upload is one-way.

use crate::{error::RandResult, table::AssignmentTable};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::io::Write;

pub const UPLOAD_COLUMNS: [&str; 3] = ["identifier", "stratum", "treatment_assignment"];

#[derive(Debug, Serialize)]
struct UploadRecord<'a> {
    identifier:           &'a str,
    stratum:              &'a str,
    treatment_assignment: u8,
}

/// Write the table as CSV. Unstratified rows get an empty stratum cell.
pub fn write_csv<W: Write>(table: &AssignmentTable, writer: W) -> RandResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in table.rows() {
        wtr.serialize(UploadRecord {
            identifier:           &row.identifier,
            stratum:              row.stratum.as_deref().unwrap_or(""),
            treatment_assignment: row.treatment.as_code(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// A row as read back from the upload database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedRow {
    pub identifier:           String,
    pub stratum:              Option<String>,
    pub treatment_assignment: u8,
}

pub struct UploadStore {
    conn: Connection,
}

impl UploadStore {
    /// Open (or create) the upload database at `path`.
    pub fn open(path: &str) -> RandResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RandResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> RandResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_assignment_upload.sql"))?;
        Ok(())
    }

    /// Replace the upload contents with `table`, in table order.
    pub fn write_table(&mut self, table: &AssignmentTable) -> RandResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM assignment_upload", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO assignment_upload (seq, identifier, stratum, treatment_assignment)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (seq, row) in table.rows().iter().enumerate() {
                stmt.execute(params![
                    seq as i64,
                    row.identifier,
                    row.stratum,
                    row.treatment.as_code() as i64,
                ])?;
            }
        }
        tx.commit()?;
        log::info!("wrote {} rows to assignment_upload", table.len());
        Ok(table.len())
    }

    pub fn row_count(&self) -> RandResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM assignment_upload", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn uploaded_rows(&self) -> RandResult<Vec<UploadedRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, stratum, treatment_assignment
             FROM assignment_upload ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UploadedRow {
                identifier:           row.get(0)?,
                stratum:              row.get(1)?,
                treatment_assignment: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
