use log::{debug, info, warn};

use bulk_import::store::{MemoryStore, StoreError};
use bulk_import::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::admin::config_reader::*;
use crate::admin::export::{export, export_file_name, DataType, ExportFormat, Filters};
use crate::admin::io_common::{read_bytes, resolve_path, simplify_file_name, write_output};
use crate::admin::io_csv::table_to_csv;
use crate::admin::json_store::{load_store, save_store};
use crate::args::{ExportArgs, ImportArgs, TemplateArgs};

mod config_reader;
mod export;
mod io_common;
mod io_csv;
mod json_store;

/// The operator recorded in the import history when none is given.
const DEFAULT_OPERATOR: u64 = 1;

#[derive(Debug, Snafu)]
pub enum AdminError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error writing CSV"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Error flushing CSV"))]
    FlushingCsv { source: std::io::Error },
    #[snafu(display("The store {path} is inconsistent"))]
    LoadingStore { source: StoreError, path: String },
    #[snafu(display("Import of {file_name} failed"))]
    Import {
        source: ImportError,
        file_name: String,
    },
    #[snafu(display("Unknown kind of data: {name}"))]
    UnknownKind { source: ImportError, name: String },
    #[snafu(display("Cannot find the directory of {path}"))]
    MissingParentDir { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AdminResult<T> = Result<T, AdminError>;

pub fn parse_kind(name: &str) -> AdminResult<EntityKind> {
    name.parse::<EntityKind>().context(UnknownKindSnafu { name })
}

// A file to import, with all the options of the job and the command line applied.
#[derive(Eq, PartialEq, Debug, Clone)]
struct ResolvedSource {
    kind: EntityKind,
    path: String,
    dry_run: bool,
    worksheet: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct ResolvedJob {
    store_path: String,
    operator_id: u64,
    sources: Vec<ResolvedSource>,
}

fn resolve_job(args: &ImportArgs) -> AdminResult<ResolvedJob> {
    let (job, root) = match &args.config {
        Some(p) => {
            let job = read_job(p)?;
            let root = Path::new(p)
                .parent()
                .context(MissingParentDirSnafu { path: p })?;
            (job, root.to_path_buf())
        }
        None => (
            ImportJob {
                store_path: None,
                operator_id: None,
                sources: vec![],
            },
            Path::new(".").to_path_buf(),
        ),
    };

    let store_path = match (&args.store, &job.store_path) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => resolve_path(&root, p),
        (None, None) => {
            whatever!("No store given: use --store or set storePath in the job file")
        }
    };

    let sources: Vec<ResolvedSource> = if let Some(input) = &args.input {
        let kind = match &args.kind {
            Some(k) => parse_kind(k)?,
            None => whatever!("--input requires --kind"),
        };
        vec![ResolvedSource {
            kind,
            path: input.clone(),
            dry_run: args.dry_run,
            worksheet: args.excel_worksheet_name.clone(),
        }]
    } else {
        let mut res = Vec::new();
        for s in job.sources.iter() {
            res.push(ResolvedSource {
                kind: s.entity_kind()?,
                path: resolve_path(&root, &s.file_path),
                dry_run: args.dry_run || s.dry_run.unwrap_or(false),
                worksheet: args
                    .excel_worksheet_name
                    .clone()
                    .or_else(|| s.excel_worksheet_name.clone()),
            });
        }
        res
    };
    if sources.is_empty() {
        whatever!("No file to import: use --input or list the sources in the job file")
    }

    Ok(ResolvedJob {
        store_path,
        operator_id: args.operator.or(job.operator_id).unwrap_or(DEFAULT_OPERATOR),
        sources,
    })
}

fn import_source(
    store: &mut MemoryStore,
    source: &ResolvedSource,
    operator_id: u64,
) -> AdminResult<ImportOutcome> {
    let file_name = simplify_file_name(&source.path);
    let content = read_bytes(&source.path)?;
    let request = ImportRequest {
        kind: source.kind,
        file_name: file_name.clone(),
        content,
        worksheet: source.worksheet.clone(),
        dry_run: source.dry_run,
        operator_id,
    };
    run_import(store, &request).context(ImportSnafu { file_name })
}

// The JSON entry of one source in the output, and whether the source was imported.
fn source_entry(source: &ResolvedSource, res: &AdminResult<ImportOutcome>) -> (JSValue, bool) {
    let file_name = simplify_file_name(&source.path);
    match res {
        Ok(ImportOutcome::Preview(r)) => (
            json!({"kind": source.kind, "fileName": file_name, "status": "preview", "report": r}),
            true,
        ),
        Ok(ImportOutcome::Completed(r)) => (
            json!({"kind": source.kind, "fileName": file_name, "status": "completed", "report": r}),
            true,
        ),
        Err(AdminError::Import {
            source: ImportError::SchemaRejected { errors },
            ..
        }) => (
            json!({"kind": source.kind, "fileName": file_name, "status": "rejected", "errors": errors}),
            false,
        ),
        Err(e) => (
            json!({"kind": source.kind, "fileName": file_name, "status": "failed", "error": error_chain(e)}),
            false,
        ),
    }
}

/// Runs all the imports of a job against a single store.
///
/// A source that cannot be imported does not stop the job: it is reported and
/// the next source is processed. The store is saved unless every source is a
/// dry run, and the command fails at the end if any source failed or if the
/// output differs from the reference.
pub fn run_import_job(args: &ImportArgs) -> AdminResult<()> {
    let job = resolve_job(args)?;
    info!(
        "run_import_job: {} source(s) into {} (operator {})",
        job.sources.len(),
        job.store_path,
        job.operator_id
    );
    let mut store = load_store(&job.store_path)?;

    let mut entries: Vec<JSValue> = Vec::new();
    let mut failures = 0;
    for source in job.sources.iter() {
        info!("run_import_job: importing {} from {:?}", source.kind, source.path);
        let res = import_source(&mut store, source, job.operator_id);
        let (entry, imported) = source_entry(source, &res);
        if !imported {
            warn!("run_import_job: {:?} failed: {}", source.path, entry["status"]);
            failures += 1;
        }
        debug!("run_import_job: entry: {:?}", entry);
        entries.push(entry);
    }

    if job.sources.iter().any(|s| !s.dry_run) {
        save_store(&job.store_path, &store)?;
    }

    let result_js = json!({ "imports": entries });
    let pretty_js = serde_json::to_string_pretty(&result_js).context(SerializingJsonSnafu {})?;
    write_output(args.out.as_deref(), &pretty_js)?;

    // The reference output, if provided for comparison
    if let Some(reference_p) = &args.reference {
        let reference = read_reference(reference_p)?;
        let pretty_js_ref =
            serde_json::to_string_pretty(&reference).context(SerializingJsonSnafu {})?;
        if pretty_js_ref != pretty_js {
            warn!("Found differences with the reference string");
            print_diff(pretty_js_ref.as_str(), pretty_js.as_str(), "\n");
            whatever!("Difference detected between the import reports and the reference")
        }
    }

    if failures > 0 {
        whatever!(
            "{} of {} file(s) could not be imported",
            failures,
            job.sources.len()
        )
    }
    Ok(())
}

pub fn run_template(args: &TemplateArgs) -> AdminResult<()> {
    let kind = parse_kind(&args.kind)?;
    let t = template(kind);
    info!("run_template: {}: {}", kind, t.description);
    let content = table_to_csv(&t.to_table())?;
    write_output(args.out.as_deref(), &content)
}

pub fn run_export(args: &ExportArgs) -> AdminResult<()> {
    let data_type: DataType = args.data_type.parse()?;
    let format: ExportFormat = args.format.parse()?;
    if !Path::new(&args.store).exists() {
        whatever!("Store not found: {}", args.store)
    }
    let store = load_store(&args.store)?;
    let filters = Filters {
        election_year: args.election_year,
        constituency_id: args.constituency_id,
    };
    let content = export(&store, data_type, format, &filters)?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| export_file_name(data_type, format, Utc::now()));
    write_output(Some(out.as_str()), &content)
}

/// Prints an error with its causes to the standard error.
pub fn report_error(e: &AdminError) {
    eprintln!("An error occured: {}", error_chain(e));
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulk_import::store::AuditLog;
    use std::path::PathBuf;

    fn import_args(config: Option<&Path>) -> ImportArgs {
        ImportArgs {
            config: config.map(|p| p.to_str().unwrap().to_string()),
            input: None,
            kind: None,
            store: None,
            operator: None,
            dry_run: false,
            excel_worksheet_name: None,
            out: None,
            reference: None,
        }
    }

    // A job with a division and a district file, in a fresh directory.
    fn write_job(dir: &Path, districts: &str) -> PathBuf {
        fs::write(dir.join("divisions.csv"), "name,code\nDhaka,DHK\nKhulna,KHL\n").unwrap();
        fs::write(dir.join("districts.csv"), districts).unwrap();
        let job = r#"{
            "storePath": "store.json",
            "operatorId": 7,
            "sources": [
                {"kind": "division", "filePath": "divisions.csv"},
                {"kind": "district", "filePath": "districts.csv"}
            ]
        }"#;
        let p = dir.join("job.json");
        fs::write(&p, job).unwrap();
        p
    }

    #[test]
    fn resolve_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let job_p = write_job(dir.path(), "name,code,division_name\n");
        let mut args = import_args(Some(&job_p));
        args.operator = Some(3);
        args.excel_worksheet_name = Some("Sheet2".to_string());
        let job = resolve_job(&args).unwrap();
        assert_eq!(job.operator_id, 3);
        assert_eq!(
            job.store_path,
            dir.path().join("store.json").to_str().unwrap()
        );
        assert_eq!(job.sources.len(), 2);
        assert_eq!(job.sources[1].kind, EntityKind::District);
        assert_eq!(job.sources[1].worksheet.as_deref(), Some("Sheet2"));

        args.input = Some("parties.csv".to_string());
        assert!(resolve_job(&args).is_err());
        args.kind = Some("party".to_string());
        let job = resolve_job(&args).unwrap();
        assert_eq!(job.sources.len(), 1);
        assert_eq!(job.sources[0].kind, EntityKind::Party);
    }

    #[test]
    fn missing_store_or_sources() {
        let args = import_args(None);
        assert!(matches!(
            resolve_job(&args),
            Err(AdminError::Whatever { .. })
        ));
    }

    #[test]
    fn import_job() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let job_p = write_job(
            dir.path(),
            "name,code,division_name\nDhaka,DHA,Dhaka\nKhulna,KHU,Nowhere\n",
        );
        let out_p = dir.path().join("out.json");
        let mut args = import_args(Some(&job_p));
        args.out = Some(out_p.to_str().unwrap().to_string());
        run_import_job(&args).unwrap();

        let store = load_store(dir.path().join("store.json").to_str().unwrap()).unwrap();
        let logs = store.import_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].user_id, 7);
        assert_eq!(logs[1].failed_rows, 1);

        let out: JSValue = serde_json::from_str(&fs::read_to_string(&out_p).unwrap()).unwrap();
        assert_eq!(out["imports"][0]["status"], "completed");
        assert_eq!(out["imports"][0]["report"]["created_rows"], 2);
        assert_eq!(out["imports"][1]["report"]["failed_rows"], 1);
        assert_eq!(
            out["imports"][1]["report"]["errors"][0]["error"],
            "Division not found: Nowhere"
        );

        // A second run updates the records instead of creating them.
        let ref_p = dir.path().join("reference.json");
        fs::copy(&out_p, &ref_p).unwrap();
        args.reference = Some(ref_p.to_str().unwrap().to_string());
        assert!(run_import_job(&args).is_err());
    }

    #[test]
    fn dry_run_does_not_save() {
        let dir = tempfile::tempdir().unwrap();
        let job_p = write_job(dir.path(), "name,code,division_name\nDhaka,DHA,Dhaka\n");
        let out_p = dir.path().join("out.json");
        let mut args = import_args(Some(&job_p));
        args.dry_run = true;
        args.out = Some(out_p.to_str().unwrap().to_string());
        run_import_job(&args).unwrap();
        assert!(!dir.path().join("store.json").exists());

        let out: JSValue = serde_json::from_str(&fs::read_to_string(&out_p).unwrap()).unwrap();
        assert_eq!(out["imports"][1]["status"], "preview");
        assert_eq!(out["imports"][1]["report"]["preview_data"][0]["code"], "DHA");
    }

    #[test]
    fn failed_source_does_not_stop_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let job_p = write_job(dir.path(), "name,division_name\nDhaka,Dhaka\n");
        fs::remove_file(dir.path().join("divisions.csv")).unwrap();
        let out_p = dir.path().join("out.json");
        let mut args = import_args(Some(&job_p));
        args.out = Some(out_p.to_str().unwrap().to_string());
        assert!(run_import_job(&args).is_err());

        let out: JSValue = serde_json::from_str(&fs::read_to_string(&out_p).unwrap()).unwrap();
        assert_eq!(out["imports"][0]["status"], "failed");
        assert_eq!(out["imports"][1]["status"], "rejected");
        assert_eq!(out["imports"][1]["errors"][0]["column"], "code");

        // The rejection is in the history.
        let store = load_store(dir.path().join("store.json").to_str().unwrap()).unwrap();
        assert_eq!(store.import_logs().len(), 1);
        assert_eq!(store.import_logs()[0].status, ImportStatus::Failed);
    }

    #[test]
    fn template_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_p = dir.path().join("parties.csv");
        run_template(&TemplateArgs {
            kind: "party".to_string(),
            out: Some(out_p.to_str().unwrap().to_string()),
        })
        .unwrap();
        let s = fs::read_to_string(&out_p).unwrap();
        assert!(s.starts_with("name,"));
        assert!(run_template(&TemplateArgs {
            kind: "ballot".to_string(),
            out: None,
        })
        .is_err());
    }

    #[test]
    fn export_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store_p = dir.path().join("store.json");
        let mut store = MemoryStore::new();
        let req = ImportRequest {
            kind: EntityKind::Division,
            file_name: "divisions.csv".to_string(),
            content: b"name,code\nDhaka,DHK\n".to_vec(),
            worksheet: None,
            dry_run: false,
            operator_id: 1,
        };
        run_import(&mut store, &req).unwrap();
        save_store(store_p.to_str().unwrap(), &store).unwrap();

        let out_p = dir.path().join("candidates.json");
        run_export(&ExportArgs {
            store: store_p.to_str().unwrap().to_string(),
            data_type: "candidates".to_string(),
            format: "json".to_string(),
            election_year: None,
            constituency_id: None,
            out: Some(out_p.to_str().unwrap().to_string()),
        })
        .unwrap();
        let js: JSValue = serde_json::from_str(&fs::read_to_string(&out_p).unwrap()).unwrap();
        assert_eq!(js, json!([]));

        assert!(run_export(&ExportArgs {
            store: dir.path().join("nope.json").to_str().unwrap().to_string(),
            data_type: "candidates".to_string(),
            format: "csv".to_string(),
            election_year: None,
            constituency_id: None,
            out: None,
        })
        .is_err());
    }
}
