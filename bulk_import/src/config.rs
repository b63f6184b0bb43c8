// ********* Input data structures ***********

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::Snafu;

use crate::model::UserId;
use crate::store::StoreError;

/// The kinds of reference data that can be imported from a table.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Division,
    District,
    Constituency,
    Party,
    Candidate,
    PollingCenter,
    PollingResult,
    VoterDemographics,
    ConstituencyResult,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Division,
        EntityKind::District,
        EntityKind::Constituency,
        EntityKind::Party,
        EntityKind::Candidate,
        EntityKind::PollingCenter,
        EntityKind::PollingResult,
        EntityKind::VoterDemographics,
        EntityKind::ConstituencyResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Division => "division",
            EntityKind::District => "district",
            EntityKind::Constituency => "constituency",
            EntityKind::Party => "party",
            EntityKind::Candidate => "candidate",
            EntityKind::PollingCenter => "polling_center",
            EntityKind::PollingResult => "polling_result",
            EntityKind::VoterDemographics => "voter_demographics",
            EntityKind::ConstituencyResult => "constituency_result",
        }
    }

    /// Human readable name, used as a prefix in messages ("Division name is required").
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Division => "Division",
            EntityKind::District => "District",
            EntityKind::Constituency => "Constituency",
            EntityKind::Party => "Party",
            EntityKind::Candidate => "Candidate",
            EntityKind::PollingCenter => "Polling center",
            EntityKind::PollingResult => "Polling result",
            EntityKind::VoterDemographics => "Voter demographics",
            EntityKind::ConstituencyResult => "Constituency result",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .find(|k| k.as_str() == s.trim())
            .copied()
            .ok_or_else(|| ImportError::UnsupportedKind {
                name: s.to_string(),
            })
    }
}

/// The physical layout of the uploaded table.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// Infers the format from the extension of the uploaded file.
    pub fn from_file_name(file_name: &str) -> Option<TableFormat> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".csv") {
            Some(TableFormat::Csv)
        } else if lower.ends_with(".xlsx") {
            Some(TableFormat::Xlsx)
        } else {
            None
        }
    }
}

/// One invocation of the import pipeline: a single file for a single entity kind.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportRequest {
    pub kind: EntityKind,
    /// The name of the uploaded file. Its extension selects the table format.
    pub file_name: String,
    pub content: Vec<u8>,
    /// For workbooks, the worksheet to read. The first one is used otherwise.
    pub worksheet: Option<String>,
    pub dry_run: bool,
    pub operator_id: UserId,
}

// ******** Output data structures *********

/// A problem attached to one row of the input.
///
/// Rows are numbered as in a spreadsheet: the header is row 1 and the first data
/// row is row 2. Row 0 designates the table as a whole.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub error: String,
}

impl RowError {
    pub fn new(row: usize, column: Option<&str>, error: impl Into<String>) -> RowError {
        RowError {
            row,
            column: column.map(|c| c.to_string()),
            error: error.into(),
        }
    }
}

/// The outcome of importing all the rows of one table.
///
/// `total_rows == successful_rows + failed_rows`, and there is exactly one
/// entry in `errors` per failed row.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    /// Among the successful rows, how many created a new record.
    pub created_rows: usize,
    /// Among the successful rows, how many updated an existing record.
    pub updated_rows: usize,
    pub errors: Vec<RowError>,
}

/// The outcome of a dry run: validation only, nothing is written.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub errors: Vec<RowError>,
    pub preview_data: Vec<JSMap<String, JSValue>>,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ImportOutcome {
    Preview(DryRunReport),
    Completed(ImportReport),
}

/// Coarse status of an import, as recorded in the audit log.
///
/// `Completed` means that the import ran to the end, not that every row succeeded.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Completed,
    Failed,
}

/// Errors that prevent an import from running to completion.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ImportError {
    #[snafu(display("Unsupported import type: {name}"))]
    UnsupportedKind { name: String },

    #[snafu(display("Only CSV or Excel (.xlsx) files are allowed, got {file_name}"))]
    UnsupportedFile { file_name: String },

    #[snafu(display("The file is empty"))]
    EmptyFile {},

    #[snafu(display("Invalid CSV format"))]
    CsvParse { source: csv::Error },

    #[snafu(display("Error opening workbook"))]
    OpeningExcel { source: calamine::XlsxError },

    #[snafu(display("Worksheet not found: {name}"))]
    MissingWorksheet { name: String },

    #[snafu(display("Validation failed with {} error(s)", errors.len()))]
    SchemaRejected { errors: Vec<RowError> },

    #[snafu(display("Error processing file: {message}"))]
    Processing { message: String },

    #[snafu(display("Could not record the import log"))]
    Audit { source: StoreError },
}

pub type ImportResult<T> = Result<T, ImportError>;
