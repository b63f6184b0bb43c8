// Flat exports of candidates and results.

use std::collections::HashMap;
use std::str::FromStr;

use bulk_import::model::*;
use bulk_import::store::{DataStore, Repository};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::admin::io_csv::records_to_csv;
use crate::admin::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DataType {
    Candidates,
    Results,
}

impl FromStr for DataType {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidates" => Ok(DataType::Candidates),
            "results" => Ok(DataType::Results),
            x => whatever!("Unsupported export type: {}", x),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            x => whatever!("Unsupported export format: {} (expected csv or json)", x),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct Filters {
    pub election_year: Option<i32>,
    pub constituency_id: Option<RecordId>,
}

impl Filters {
    fn accepts(&self, election_year: i32, constituency_id: RecordId) -> bool {
        self.election_year.map_or(true, |y| y == election_year)
            && self.constituency_id.map_or(true, |c| c == constituency_id)
    }
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct CandidateRow {
    pub id: RecordId,
    pub full_name: String,
    pub party: String,
    /// "<number>: <name>"
    pub constituency: String,
    pub election_year: i32,
    /// Total over all the polling centers.
    pub votes_received: i64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct ResultRow {
    pub constituency_id: RecordId,
    pub constituency_name: String,
    pub election_year: i32,
    pub total_votes: i64,
    pub valid_votes: i64,
    pub rejected_votes: i64,
    pub turnout_percentage: f64,
    pub winning_candidate: String,
    pub winning_party: String,
    pub margin_votes: Option<i64>,
    pub is_official: bool,
}

pub fn candidate_rows<S: DataStore>(store: &S, filters: &Filters) -> Vec<CandidateRow> {
    let mut votes: HashMap<RecordId, i64> = HashMap::new();
    for r in Repository::<PollingCenterResult>::all(store) {
        let total = votes.entry(r.candidate_id).or_insert(0);
        *total = total.saturating_add(r.votes_received);
    }
    Repository::<Candidate>::all(store)
        .into_iter()
        .filter(|c| filters.accepts(c.election_year, c.constituency_id))
        .map(|c| CandidateRow {
            id: c.id,
            full_name: c.full_name.clone(),
            party: Repository::<Party>::get(store, c.party_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            constituency: Repository::<Constituency>::get(store, c.constituency_id)
                .map(|k| format!("{}: {}", k.number, k.name))
                .unwrap_or_default(),
            election_year: c.election_year,
            votes_received: votes.get(&c.id).copied().unwrap_or(0),
        })
        .collect()
}

pub fn result_rows<S: DataStore>(store: &S, filters: &Filters) -> Vec<ResultRow> {
    Repository::<ConstituencyResult>::all(store)
        .into_iter()
        .filter(|r| filters.accepts(r.election_year, r.constituency_id))
        .map(|r| ResultRow {
            constituency_id: r.constituency_id,
            constituency_name: Repository::<Constituency>::get(store, r.constituency_id)
                .map(|k| k.name.clone())
                .unwrap_or_default(),
            election_year: r.election_year,
            total_votes: r.total_votes,
            valid_votes: r.valid_votes,
            rejected_votes: r.rejected_votes,
            turnout_percentage: r.turnout_percentage,
            winning_candidate: r
                .winning_candidate_id
                .and_then(|id| Repository::<Candidate>::get(store, id))
                .map(|c| c.full_name.clone())
                .unwrap_or_default(),
            winning_party: r
                .winning_party_id
                .and_then(|id| Repository::<Party>::get(store, id))
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            margin_votes: r.margin_votes,
            is_official: r.is_official,
        })
        .collect()
}

/// candidates_export_20240107_153000.csv
pub fn export_file_name(data_type: DataType, format: ExportFormat, now: DateTime<Utc>) -> String {
    let prefix = match data_type {
        DataType::Candidates => "candidates",
        DataType::Results => "results",
    };
    let ext = match format {
        ExportFormat::Csv => "csv",
        ExportFormat::Json => "json",
    };
    format!("{}_export_{}.{}", prefix, now.format("%Y%m%d_%H%M%S"), ext)
}

fn render<T: Serialize>(records: &[T], format: ExportFormat) -> AdminResult<String> {
    match format {
        ExportFormat::Csv => records_to_csv(records),
        ExportFormat::Json => serde_json::to_string_pretty(records).context(SerializingJsonSnafu {}),
    }
}

/// The content of an export.
pub fn export<S: DataStore>(
    store: &S,
    data_type: DataType,
    format: ExportFormat,
    filters: &Filters,
) -> AdminResult<String> {
    match data_type {
        DataType::Candidates => {
            let rows = candidate_rows(store, filters);
            info!("export: {} candidates", rows.len());
            render(&rows, format)
        }
        DataType::Results => {
            let rows = result_rows(store, filters);
            info!("export: {} results", rows.len());
            render(&rows, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulk_import::store::MemoryStore;
    use chrono::TimeZone;

    fn import(store: &mut MemoryStore, kind: EntityKind, content: &str) {
        let req = ImportRequest {
            kind,
            file_name: format!("{}.csv", kind),
            content: content.as_bytes().to_vec(),
            worksheet: None,
            dry_run: false,
            operator_id: 1,
        };
        match run_import(store, &req) {
            Ok(ImportOutcome::Completed(r)) => assert_eq!(r.failed_rows, 0, "{:?}", r.errors),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        import(&mut store, EntityKind::Division, "name,code\nDhaka,DHK\n");
        import(
            &mut store,
            EntityKind::District,
            "name,code,division_name\nDhaka,DHA,Dhaka\n",
        );
        import(
            &mut store,
            EntityKind::Constituency,
            "name,number,district_name,division_name\nDhaka-1,1,Dhaka,Dhaka\nDhaka-2,2,Dhaka,Dhaka\n",
        );
        import(&mut store, EntityKind::Party, "name\nBoat\nSheaf\n");
        import(
            &mut store,
            EntityKind::Candidate,
            "full_name,party_name,constituency_number,election_year,election_type\n\
             John Doe,Boat,1,2024,National\n\
             Jane Smith,Sheaf,2,2024,National\n\
             Old Timer,Boat,1,2018,National\n",
        );
        import(
            &mut store,
            EntityKind::PollingCenter,
            "code,name,constituency_number\nPC-1,School,1\nPC-2,College,1\n",
        );
        import(
            &mut store,
            EntityKind::PollingResult,
            "polling_center_code,candidate_name,constituency_number,election_year,votes_received\n\
             PC-1,John Doe,1,2024,1500\n\
             PC-2,John Doe,1,2024,700\n",
        );
        import(
            &mut store,
            EntityKind::ConstituencyResult,
            "constituency_number,election_year,total_votes,valid_votes,rejected_votes,turnout_percentage,winning_candidate_name,winning_party_name,margin_votes,is_official\n\
             1,2024,2300,2200,100,61.5,John Doe,Boat,800,true\n",
        );
        store
    }

    #[test]
    fn candidates() {
        let store = sample_store();
        let rows = candidate_rows(
            &store,
            &Filters {
                election_year: Some(2024),
                constituency_id: None,
            },
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].full_name, "John Doe");
        assert_eq!(rows[0].party, "Boat");
        assert_eq!(rows[0].constituency, "1: Dhaka-1");
        assert_eq!(rows[0].votes_received, 2200);
        assert_eq!(rows[1].votes_received, 0);

        let rows = candidate_rows(
            &store,
            &Filters {
                election_year: None,
                constituency_id: Some(1),
            },
        );
        let names: Vec<&str> = rows.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["John Doe", "Old Timer"]);
    }

    #[test]
    fn results_as_csv() {
        let store = sample_store();
        let s = export(&store, DataType::Results, ExportFormat::Csv, &Filters::default()).unwrap();
        let mut lines = s.lines();
        assert_eq!(
            lines.next(),
            Some("constituency_id,constituency_name,election_year,total_votes,valid_votes,rejected_votes,turnout_percentage,winning_candidate,winning_party,margin_votes,is_official")
        );
        assert_eq!(
            lines.next(),
            Some("1,Dhaka-1,2024,2300,2200,100,61.5,John Doe,Boat,800,true")
        );
    }

    #[test]
    fn results_as_json() {
        let store = sample_store();
        let s = export(&store, DataType::Results, ExportFormat::Json, &Filters::default()).unwrap();
        let js: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(js[0]["winning_party"], "Boat");
        assert_eq!(js[0]["is_official"], true);
    }

    #[test]
    fn file_names() {
        let now = Utc.with_ymd_and_hms(2024, 1, 7, 15, 30, 0).unwrap();
        assert_eq!(
            export_file_name(DataType::Candidates, ExportFormat::Csv, now),
            "candidates_export_20240107_153000.csv"
        );
        assert!("ballots".parse::<DataType>().is_err());
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
