// Drives a whole import invocation and records it in the audit log.

use std::error::Error;

use log::{info, warn};
use snafu::ResultExt;

use crate::config::*;
use crate::model::NewImportLog;
use crate::resolver::ImportSession;
use crate::schema::validate;
use crate::store::{AuditLog, DataStore};
use crate::table::Table;

/// The number of rows shown by a dry run.
pub const PREVIEW_ROWS: usize = 10;

/// Runs the full pipeline on an uploaded file.
///
/// - dry run: validation only, the store is not touched and nothing is logged.
/// - validation errors: the import is logged as failed and rejected with all the errors.
/// - otherwise the rows are imported, the import is logged as completed and the
///   report is returned, even if some rows failed.
///
/// A file that cannot be read at all is logged as failed and reported as a
/// processing error. Files with an unsupported extension are rejected before
/// anything is logged.
pub fn run_import<S: DataStore>(store: &mut S, request: &ImportRequest) -> ImportResult<ImportOutcome> {
    let format = match TableFormat::from_file_name(&request.file_name) {
        Some(f) => f,
        None => {
            return UnsupportedFileSnafu {
                file_name: request.file_name.clone(),
            }
            .fail()
        }
    };
    info!(
        "run_import: {} from {} ({:?}, dry run: {})",
        request.kind, request.file_name, format, request.dry_run
    );

    let parsed = match format {
        TableFormat::Csv => Table::from_csv(&request.content),
        TableFormat::Xlsx => Table::from_xlsx(&request.content, request.worksheet.as_deref()),
    };
    let table = match parsed {
        Ok(t) => t,
        Err(e) => {
            let message = error_chain(&e);
            warn!("run_import: could not read {}: {}", request.file_name, message);
            audit(
                store,
                request,
                0,
                0,
                vec![RowError::new(0, None, message.clone())],
                ImportStatus::Failed,
            )?;
            return ProcessingSnafu { message }.fail();
        }
    };

    let errors = validate(&table, request.kind);

    if request.dry_run {
        info!(
            "run_import: dry run: {} rows, {} error(s)",
            table.len(),
            errors.len()
        );
        return Ok(ImportOutcome::Preview(DryRunReport {
            total_rows: table.len(),
            successful_rows: table.len().saturating_sub(errors.len()),
            failed_rows: errors.len(),
            errors,
            preview_data: table.preview(PREVIEW_ROWS),
        }));
    }

    if !errors.is_empty() {
        warn!(
            "run_import: {} rejected with {} validation error(s)",
            request.file_name,
            errors.len()
        );
        audit(
            store,
            request,
            table.len(),
            0,
            errors.clone(),
            ImportStatus::Failed,
        )?;
        return SchemaRejectedSnafu { errors }.fail();
    }

    let report = ImportSession::new(store, request.kind, request.operator_id).import_table(&table);
    audit(
        store,
        request,
        report.total_rows,
        report.successful_rows,
        report.errors.clone(),
        ImportStatus::Completed,
    )?;
    Ok(ImportOutcome::Completed(report))
}

fn audit<S: DataStore>(
    store: &mut S,
    request: &ImportRequest,
    total_rows: usize,
    successful_rows: usize,
    errors: Vec<RowError>,
    status: ImportStatus,
) -> ImportResult<()> {
    let log = store
        .append_import_log(NewImportLog {
            import_type: request.kind,
            file_name: request.file_name.clone(),
            total_rows,
            successful_rows,
            failed_rows: total_rows - successful_rows,
            errors,
            user_id: request.operator_id,
            status,
        })
        .context(AuditSnafu {})?;
    info!("audit: import log {} ({:?})", log.id, log.status);
    Ok(())
}

/// The message of an error followed by its causes, separated by colons.
pub fn error_chain(e: &dyn Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(": ");
        message.push_str(&s.to_string());
        source = s.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::store::{MemoryStore, Repository};

    fn request(kind: EntityKind, file_name: &str, content: &str, dry_run: bool) -> ImportRequest {
        ImportRequest {
            kind,
            file_name: file_name.to_string(),
            content: content.as_bytes().to_vec(),
            worksheet: None,
            dry_run,
            operator_id: 3,
        }
    }

    #[test]
    fn completed_import_is_logged() {
        let mut store = MemoryStore::new();
        let req = request(
            EntityKind::Division,
            "divisions.csv",
            "name,code\nDhaka,D1\nKhulna,D2\n",
            false,
        );
        let outcome = run_import(&mut store, &req).unwrap();
        match outcome {
            ImportOutcome::Completed(r) => {
                assert_eq!((r.total_rows, r.created_rows), (2, 2));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let logs = store.import_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, ImportStatus::Completed);
        assert_eq!(logs[0].user_id, 3);
        assert_eq!(logs[0].import_type, EntityKind::Division);
    }

    #[test]
    fn partial_failures_still_complete() {
        let mut store = MemoryStore::new();
        let req = request(
            EntityKind::District,
            "districts.csv",
            "name,code,division_name\nGazipur,GZ,Dhaka\n",
            false,
        );
        match run_import(&mut store, &req).unwrap() {
            ImportOutcome::Completed(r) => assert_eq!(r.failed_rows, 1),
            other => panic!("unexpected outcome {:?}", other),
        }
        let logs = store.import_logs();
        assert_eq!(logs[0].status, ImportStatus::Completed);
        assert_eq!(logs[0].failed_rows, 1);
    }

    #[test]
    fn schema_errors_are_rejected() {
        let mut store = MemoryStore::new();
        let req = request(
            EntityKind::Division,
            "divisions.csv",
            "name,code\nDhaka,D1\nOther,D1\n",
            false,
        );
        match run_import(&mut store, &req) {
            Err(ImportError::SchemaRejected { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(Repository::<Division>::all(&store).is_empty());
        let logs = store.import_logs();
        assert_eq!(logs[0].status, ImportStatus::Failed);
        assert_eq!((logs[0].total_rows, logs[0].failed_rows), (2, 2));
    }

    #[test]
    fn missing_column_stops_everything() {
        let mut store = MemoryStore::new();
        let req = request(EntityKind::Party, "parties.csv", "acronym\nGP\n", false);
        match run_import(&mut store, &req) {
            Err(ImportError::SchemaRejected { errors }) => {
                assert_eq!(errors, vec![RowError::new(0, Some("name"), "Missing required columns: name")])
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(Repository::<Party>::all(&store).is_empty());
    }

    #[test]
    fn dry_run_leaves_store_alone() {
        let mut store = MemoryStore::new();
        let mut content = String::from("name\n");
        for i in 0..12 {
            content.push_str(&format!("Party {}\n", i));
        }
        let req = request(EntityKind::Party, "parties.csv", &content, true);
        match run_import(&mut store, &req).unwrap() {
            ImportOutcome::Preview(p) => {
                assert_eq!((p.total_rows, p.successful_rows, p.failed_rows), (12, 12, 0));
                assert_eq!(p.preview_data.len(), PREVIEW_ROWS);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(Repository::<Party>::all(&store).is_empty());
        assert!(store.import_logs().is_empty());
    }

    #[test]
    fn dry_run_counts_errors() {
        let mut store = MemoryStore::new();
        // One row, two errors: the count of successes cannot go negative.
        let req = request(
            EntityKind::PollingCenter,
            "centers.csv",
            "code,name,constituency_number\n,,101\n",
            true,
        );
        match run_import(&mut store, &req).unwrap() {
            ImportOutcome::Preview(p) => {
                assert_eq!((p.total_rows, p.successful_rows, p.failed_rows), (1, 0, 2));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn unreadable_files() {
        let mut store = MemoryStore::new();
        let req = request(EntityKind::Party, "parties.csv", "", false);
        match run_import(&mut store, &req) {
            Err(ImportError::Processing { message }) => assert_eq!(message, "The file is empty"),
            other => panic!("unexpected outcome {:?}", other),
        }
        let req = request(EntityKind::Party, "parties.xlsx", "garbage", false);
        assert!(matches!(
            run_import(&mut store, &req),
            Err(ImportError::Processing { .. })
        ));
        let logs = store.import_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].total_rows, 0);
        assert_eq!(logs[0].errors[0].row, 0);
        assert_eq!(logs[0].status, ImportStatus::Failed);
    }

    #[test]
    fn malformed_encoding() {
        let mut store = MemoryStore::new();
        let req = ImportRequest {
            kind: EntityKind::Party,
            file_name: "parties.csv".to_string(),
            content: b"name,acronym\nCaf\xE9 Party,CP\n".to_vec(),
            worksheet: None,
            dry_run: false,
            operator_id: 3,
        };
        match run_import(&mut store, &req) {
            Err(ImportError::Processing { message }) => {
                assert!(message.starts_with("Invalid CSV format: "), "{}", message)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(Repository::<Party>::all(&store).is_empty());
        let logs = store.import_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].total_rows, 0);
        assert_eq!(logs[0].status, ImportStatus::Failed);
        assert_eq!(logs[0].errors.len(), 1);
        assert_eq!(logs[0].errors[0].row, 0);
    }

    #[test]
    fn unsupported_extension() {
        let mut store = MemoryStore::new();
        let req = request(EntityKind::Party, "parties.txt", "name\nA\n", false);
        assert!(matches!(
            run_import(&mut store, &req),
            Err(ImportError::UnsupportedFile { .. })
        ));
        assert!(store.import_logs().is_empty());
    }
}
