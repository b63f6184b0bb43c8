use crate::admin::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

/// A batch of files to import into one store.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    #[serde(rename = "storePath")]
    pub store_path: Option<String>,
    #[serde(rename = "operatorId")]
    pub operator_id: Option<u64>,
    #[serde(default)]
    pub sources: Vec<FileSource>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub kind: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "dryRun")]
    pub dry_run: Option<bool>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

impl FileSource {
    pub fn entity_kind(&self) -> AdminResult<EntityKind> {
        parse_kind(&self.kind)
    }
}

pub fn read_job(path: &str) -> AdminResult<ImportJob> {
    let job_str = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let job: ImportJob = serde_json::from_str(&job_str).context(ParsingJsonSnafu { path })?;
    debug!("read_job: {:?}", job);
    Ok(job)
}

/// Reads a reference output, to be compared with the reports of an import.
pub fn read_reference(path: &str) -> AdminResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_job() {
        let js = r#"{
            "storePath": "store.json",
            "operatorId": 4,
            "sources": [
                {"kind": "division", "filePath": "divisions.csv"},
                {"kind": "party", "filePath": "parties.xlsx", "dryRun": true, "excelWorksheetName": "Parties"}
            ]
        }"#;
        let job: ImportJob = serde_json::from_str(js).unwrap();
        assert_eq!(job.store_path.as_deref(), Some("store.json"));
        assert_eq!(job.operator_id, Some(4));
        assert_eq!(job.sources.len(), 2);
        assert_eq!(job.sources[0].dry_run, None);
        assert_eq!(job.sources[1].entity_kind().unwrap(), EntityKind::Party);
        assert_eq!(job.sources[1].excel_worksheet_name.as_deref(), Some("Parties"));
    }

    #[test]
    fn unknown_kind() {
        let src = FileSource {
            kind: "ballots".to_string(),
            file_path: "ballots.csv".to_string(),
            dry_run: None,
            excel_worksheet_name: None,
        };
        assert!(matches!(
            src.entity_kind(),
            Err(AdminError::UnknownKind { .. })
        ));
    }
}
