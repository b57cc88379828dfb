//! Upload artifact tests: CSV and SQLite.

use randomization_core::{
    error::RandError,
    export::{write_csv, UploadStore, UPLOAD_COLUMNS},
    generator::{generate, GeneratorParams, StratificationFactor, Strata},
};

fn table(strata: &Strata) -> randomization_core::table::AssignmentTable {
    let params = GeneratorParams { total_target_n: 8, block_size: 4, oversample_factor: 1.0 };
    generate(&params, strata, 21).unwrap()
}

#[test]
fn csv_has_upload_columns_and_every_row() {
    let strata = Strata::cross(&[StratificationFactor::new("site", &["1", "2"])]).unwrap();
    let mut table = table(&strata);
    // Consumption state is not part of the upload.
    table.consume(Some("1")).unwrap();

    let mut buf = Vec::new();
    write_csv(&table, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], UPLOAD_COLUMNS.join(","));
    assert_eq!(lines.len(), table.len() + 1);

    let first = &table.rows()[0];
    assert_eq!(
        lines[1],
        format!("{},1,{}", first.identifier, first.treatment.as_code())
    );
    assert!(!text.contains("true") && !text.contains("false"));
}

#[test]
fn csv_unstratified_has_empty_stratum() {
    let table = table(&Strata::Unstratified);
    let mut buf = Vec::new();
    write_csv(&table, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let second = text.lines().nth(1).unwrap();
    assert!(second.starts_with("001,,"), "got {second}");
}

#[test]
fn sqlite_upload_preserves_order_and_values() {
    let strata = Strata::cross(&[StratificationFactor::new("site", &["1", "2"])]).unwrap();
    let table = table(&strata);

    let mut store = UploadStore::in_memory().unwrap();
    store.migrate().unwrap();
    assert_eq!(store.write_table(&table).unwrap(), table.len());
    assert_eq!(store.row_count().unwrap(), table.len() as i64);

    let uploaded = store.uploaded_rows().unwrap();
    for (row, up) in table.rows().iter().zip(&uploaded) {
        assert_eq!(up.identifier, row.identifier);
        assert_eq!(up.stratum, row.stratum);
        assert_eq!(up.treatment_assignment, row.treatment.as_code());
    }
}

#[test]
fn sqlite_rewrite_replaces_previous_upload() {
    let mut store = UploadStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.write_table(&table(&Strata::Unstratified)).unwrap();
    store.write_table(&table(&Strata::Unstratified)).unwrap();
    assert_eq!(store.row_count().unwrap(), 8);
}

/// A foreign upload file holding a code outside u8 range is reported
/// as an error, never truncated.
#[test]
fn out_of_range_treatment_code_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE assignment_upload (
             seq INTEGER PRIMARY KEY, identifier TEXT, stratum TEXT,
             treatment_assignment INTEGER);
         INSERT INTO assignment_upload VALUES (0, '001', NULL, 257);",
    )
    .unwrap();
    drop(conn);

    let store = UploadStore::open(path.to_str().unwrap()).unwrap();
    assert!(matches!(store.uploaded_rows(), Err(RandError::Database(_))));
}
