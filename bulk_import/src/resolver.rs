// Row by row import: reference resolution, create-or-update decision and write.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::*;
use crate::model::*;
use crate::schema::{column_label, vote_sum_message};
use crate::store::{DataStore, Repository, StoreError};
use crate::table::{parse_flag, parse_float, parse_int, Field, Row, Table};

/// Why a row could not be imported.
#[derive(Eq, PartialEq, Debug, Clone)]
pub(crate) struct RowFailure {
    column: Option<String>,
    message: String,
}

impl RowFailure {
    fn new(message: impl Into<String>) -> RowFailure {
        RowFailure {
            column: None,
            message: message.into(),
        }
    }

    fn at(column: &str, message: impl Into<String>) -> RowFailure {
        RowFailure {
            column: Some(column.to_string()),
            message: message.into(),
        }
    }
}

impl From<StoreError> for RowFailure {
    fn from(e: StoreError) -> Self {
        RowFailure::new(e.to_string())
    }
}

/// What happened to a successfully imported row.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Upsert {
    Created(RecordId),
    Updated(RecordId),
}

// name -> id lookups done during one invocation. Misses are never cached, so
// that records created by earlier rows are found by later ones.
#[derive(Debug, Default)]
struct LookupCache {
    divisions: HashMap<String, RecordId>,
    districts: HashMap<(RecordId, String), RecordId>,
    constituencies: HashMap<String, RecordId>,
    parties: HashMap<String, RecordId>,
    polling_centers: HashMap<String, RecordId>,
}

impl LookupCache {
    // A write may rename a record or change which record matches first.
    fn invalidate(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Division => self.divisions.clear(),
            EntityKind::District => self.districts.clear(),
            EntityKind::Constituency => self.constituencies.clear(),
            EntityKind::Party => self.parties.clear(),
            EntityKind::PollingCenter => self.polling_centers.clear(),
            _ => {}
        }
    }
}

/// The state of one import invocation.
///
/// Rows are processed in file order. Each row is resolved against the store as
/// left by the previous rows, and results in at most one write.
pub struct ImportSession<'s, S: DataStore> {
    store: &'s mut S,
    kind: EntityKind,
    operator_id: UserId,
    started_at: DateTime<Utc>,
    cache: LookupCache,
    report: ImportReport,
}

impl<'s, S: DataStore> ImportSession<'s, S> {
    pub fn new(store: &'s mut S, kind: EntityKind, operator_id: UserId) -> ImportSession<'s, S> {
        ImportSession {
            store,
            kind,
            operator_id,
            started_at: Utc::now(),
            cache: LookupCache::default(),
            report: ImportReport::default(),
        }
    }

    pub fn import_table(mut self, table: &Table) -> ImportReport {
        info!(
            "import_table: {}: {} rows, operator {}",
            self.kind,
            table.len(),
            self.operator_id
        );
        for row in table.rows() {
            let res = self.import_row(&row);
            self.record(row.number(), res);
        }
        self.finish()
    }

    fn import_row(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        match self.kind {
            EntityKind::Division => self.import_division(row),
            EntityKind::District => self.import_district(row),
            EntityKind::Constituency => self.import_constituency(row),
            EntityKind::Party => self.import_party(row),
            EntityKind::Candidate => self.import_candidate(row),
            EntityKind::PollingCenter => self.import_polling_center(row),
            EntityKind::PollingResult => self.import_polling_result(row),
            EntityKind::VoterDemographics => self.import_voter_demographics(row),
            EntityKind::ConstituencyResult => self.import_constituency_result(row),
        }
    }

    fn record(&mut self, row_number: usize, res: Result<Upsert, RowFailure>) {
        self.report.total_rows += 1;
        match res {
            Ok(upsert) => {
                debug!("record: row {}: {:?}", row_number, upsert);
                self.report.successful_rows += 1;
                match upsert {
                    Upsert::Created(_) => self.report.created_rows += 1,
                    Upsert::Updated(_) => self.report.updated_rows += 1,
                }
            }
            Err(f) => {
                warn!("record: row {}: {}", row_number, f.message);
                self.report.failed_rows += 1;
                self.report.errors.push(RowError {
                    row: row_number,
                    column: f.column,
                    error: f.message,
                });
            }
        }
    }

    fn finish(self) -> ImportReport {
        let r = self.report;
        info!(
            "finish: {}: {} rows, {} successful ({} created, {} updated), {} failed",
            self.kind, r.total_rows, r.successful_rows, r.created_rows, r.updated_rows, r.failed_rows
        );
        r
    }

    // ******** Store access ********

    fn existing<E: Entity>(&self, key: &E::Key) -> Option<Stored<E>>
    where
        S: Repository<E>,
    {
        Repository::<E>::find_by_natural_key(&*self.store, key)
    }

    fn write<E: Entity>(&mut self, existing: Option<RecordId>, fields: E) -> Result<Upsert, RowFailure>
    where
        S: Repository<E>,
    {
        let res = match existing {
            Some(id) => {
                Repository::<E>::update(&mut *self.store, id, fields)?;
                Upsert::Updated(id)
            }
            None => Upsert::Created(Repository::<E>::insert(&mut *self.store, fields)?.id),
        };
        self.cache.invalidate(E::KIND);
        Ok(res)
    }

    fn division_id(&mut self, name: &str) -> Option<RecordId> {
        if let Some(id) = self.cache.divisions.get(name) {
            return Some(*id);
        }
        let found = Repository::<Division>::find_first(&*self.store, &|d: &Division| d.name == name)?;
        self.cache.divisions.insert(name.to_string(), found.id);
        Some(found.id)
    }

    fn district_id(&mut self, division_id: RecordId, name: &str) -> Option<RecordId> {
        let key = (division_id, name.to_string());
        if let Some(id) = self.cache.districts.get(&key) {
            return Some(*id);
        }
        let found = Repository::<District>::find_first(&*self.store, &|d: &District| {
            d.division_id == division_id && d.name == name
        })?;
        self.cache.districts.insert(key, found.id);
        Some(found.id)
    }

    fn constituency_id(&mut self, number: &str) -> Option<RecordId> {
        if let Some(id) = self.cache.constituencies.get(number) {
            return Some(*id);
        }
        let found = Repository::<Constituency>::find_first(&*self.store, &|c: &Constituency| {
            c.number == number
        })?;
        self.cache.constituencies.insert(number.to_string(), found.id);
        Some(found.id)
    }

    fn party_id(&mut self, name: &str) -> Option<RecordId> {
        if let Some(id) = self.cache.parties.get(name) {
            return Some(*id);
        }
        let found = Repository::<Party>::find_by_natural_key(&*self.store, &name.to_string())?;
        self.cache.parties.insert(name.to_string(), found.id);
        Some(found.id)
    }

    fn polling_center_id(&mut self, code: &str) -> Option<RecordId> {
        if let Some(id) = self.cache.polling_centers.get(code) {
            return Some(*id);
        }
        let found =
            Repository::<PollingCenter>::find_by_natural_key(&*self.store, &code.to_string())?;
        self.cache.polling_centers.insert(code.to_string(), found.id);
        Some(found.id)
    }

    fn candidate_id(&self, full_name: &str, constituency_id: RecordId, year: i32) -> Option<RecordId> {
        let key = (full_name.to_string(), constituency_id, year);
        Repository::<Candidate>::find_by_natural_key(&*self.store, &key).map(|c| c.id)
    }

    fn lookup_constituency(&mut self, row: &Row) -> Result<(String, RecordId), RowFailure> {
        let number = required_text(row, "constituency_number")?;
        match self.constituency_id(&number) {
            Some(id) => Ok((number, id)),
            None => not_found(format!("Constituency not found: {}", number)),
        }
    }

    // ******** Importers, one per kind ********

    fn import_division(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let code = required_text(row, "code")?;
        let existing = self.existing::<Division>(&code);
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = Division {
            name: required_text(row, "name")?,
            code,
            bengali_name: text(row, "bengali_name").merge(prev.and_then(|p| p.bengali_name.clone())),
            total_population: int(row, "total_population")?
                .merge(prev.and_then(|p| p.total_population)),
            total_voters: int(row, "total_voters")?.merge(prev.and_then(|p| p.total_voters)),
        };
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_district(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let division_name = required_text(row, "division_name")?;
        let division_id = match self.division_id(&division_name) {
            Some(id) => id,
            None => return not_found(format!("Division not found: {}", division_name)),
        };
        let code = required_text(row, "code")?;
        let existing = self.existing::<District>(&(division_id, code.clone()));
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = District {
            name: required_text(row, "name")?,
            code,
            bengali_name: text(row, "bengali_name").merge(prev.and_then(|p| p.bengali_name.clone())),
            division_id,
            area_sq_km: int(row, "area_sq_km")?.merge(prev.and_then(|p| p.area_sq_km)),
            total_voters: int(row, "total_voters")?.merge(prev.and_then(|p| p.total_voters)),
        };
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_constituency(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let division_name = required_text(row, "division_name")?;
        let district_name = required_text(row, "district_name")?;
        let division_id = match self.division_id(&division_name) {
            Some(id) => id,
            None => return not_found(format!("Division not found: {}", division_name)),
        };
        let district_id = match self.district_id(division_id, &district_name) {
            Some(id) => id,
            None => {
                return not_found(format!(
                    "District not found: {} in {}",
                    district_name, division_name
                ))
            }
        };
        let number = required_text(row, "number")?;
        let existing = self.existing::<Constituency>(&(district_id, number.clone()));
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = Constituency {
            name: required_text(row, "name")?,
            number,
            district_id,
            area_description: text(row, "area_description")
                .merge(prev.and_then(|p| p.area_description.clone())),
            total_voters: int(row, "total_voters")?.merge(prev.and_then(|p| p.total_voters)),
            is_active: flag(row, "is_active")?.or(true),
        };
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_party(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let name = required_text(row, "name")?;
        let existing = self.existing::<Party>(&name);
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = Party {
            name,
            acronym: text(row, "acronym").merge(prev.and_then(|p| p.acronym.clone())),
            symbol_name: text(row, "symbol_name").merge(prev.and_then(|p| p.symbol_name.clone())),
            color_code: text(row, "color_code").merge(prev.and_then(|p| p.color_code.clone())),
            is_registered: flag(row, "is_registered")?.or(true),
        };
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_candidate(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let party_name = required_text(row, "party_name")?;
        let party_id = match self.party_id(&party_name) {
            Some(id) => id,
            None => return not_found(format!("Party not found: {}", party_name)),
        };
        let (_, constituency_id) = self.lookup_constituency(row)?;
        let election_year = year(row)?;
        let full_name = required_text(row, "full_name")?;
        let existing =
            self.existing::<Candidate>(&(full_name.clone(), constituency_id, election_year));
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = Candidate {
            full_name,
            bengali_name: text(row, "bengali_name").merge(prev.and_then(|p| p.bengali_name.clone())),
            age: int(row, "age")?.merge(prev.and_then(|p| p.age)),
            education: text(row, "education").merge(prev.and_then(|p| p.education.clone())),
            profession: text(row, "profession").merge(prev.and_then(|p| p.profession.clone())),
            party_id,
            constituency_id,
            election_year,
            election_type: required_text(row, "election_type")?,
            candidate_number: text(row, "candidate_number")
                .merge(prev.and_then(|p| p.candidate_number.clone())),
            deposit_status: text(row, "deposit_status")
                .merge(prev.and_then(|p| p.deposit_status.clone())),
            is_active: flag(row, "is_active")?.or(true),
        };
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_polling_center(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let (_, constituency_id) = self.lookup_constituency(row)?;
        let code = required_text(row, "code")?;
        let existing = self.existing::<PollingCenter>(&code);
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = PollingCenter {
            code,
            name: required_text(row, "name")?,
            constituency_id,
            location: text(row, "location").merge(prev.and_then(|p| p.location.clone())),
            latitude: decimal(row, "latitude")?.merge(prev.and_then(|p| p.latitude)),
            longitude: decimal(row, "longitude")?.merge(prev.and_then(|p| p.longitude)),
            total_voters: int(row, "total_voters")?.merge(prev.and_then(|p| p.total_voters)),
            is_active: flag(row, "is_active")?.or(true),
        };
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_polling_result(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let center_code = required_text(row, "polling_center_code")?;
        let polling_center_id = match self.polling_center_id(&center_code) {
            Some(id) => id,
            None => return not_found(format!("Polling center not found: {}", center_code)),
        };
        let (number, constituency_id) = self.lookup_constituency(row)?;
        let election_year = year(row)?;
        let candidate_name = required_text(row, "candidate_name")?;
        let candidate_id = match self.candidate_id(&candidate_name, constituency_id, election_year)
        {
            Some(id) => id,
            None => {
                return not_found(format!(
                    "Candidate not found: {} in constituency {} for year {}",
                    candidate_name, number, election_year
                ))
            }
        };
        let existing =
            self.existing::<PollingCenterResult>(&(polling_center_id, candidate_id, election_year));
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = PollingCenterResult {
            polling_center_id,
            candidate_id,
            election_year,
            votes_received: required_int(row, "votes_received")?,
            vote_percentage: None,
            is_valid: flag(row, "is_valid")?.or(true),
            remarks: text(row, "remarks").merge(prev.and_then(|p| p.remarks.clone())),
            entered_by: Some(self.operator_id),
        };
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_voter_demographics(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let (_, constituency_id) = self.lookup_constituency(row)?;
        let election_year = year(row)?;
        let existing = self.existing::<VoterDemographics>(&(constituency_id, election_year));
        let prev = existing.as_ref().map(|r| &r.fields);
        let fields = VoterDemographics {
            constituency_id,
            election_year,
            total_voters: required_int(row, "total_voters")?,
            male_voters: int(row, "male_voters")?.or(0),
            female_voters: int(row, "female_voters")?.or(0),
            other_voters: int(row, "other_voters")?.or(0),
            age_18_25: int(row, "age_18_25")?.or(0),
            age_26_35: int(row, "age_26_35")?.or(0),
            age_36_45: int(row, "age_36_45")?.or(0),
            age_46_55: int(row, "age_46_55")?.or(0),
            age_56_65: int(row, "age_56_65")?.or(0),
            age_66_plus: int(row, "age_66_plus")?.or(0),
            last_updated: existing.as_ref().map(|_| self.started_at),
            source: text(row, "source").merge(prev.and_then(|p| p.source.clone())),
        };
        match fields.gender_total() {
            Some(sum) if sum > fields.total_voters => {
                return Err(RowFailure::new(format!(
                    "Sum of gender voters ({}) exceeds total voters ({})",
                    sum, fields.total_voters
                )));
            }
            Some(_) => {}
            None => {
                return Err(RowFailure::new(format!(
                    "Sum of gender voters ({} + {} + {}) exceeds total voters ({})",
                    fields.male_voters,
                    fields.female_voters,
                    fields.other_voters,
                    fields.total_voters
                )));
            }
        }
        self.write(existing.map(|r| r.id), fields)
    }

    fn import_constituency_result(&mut self, row: &Row) -> Result<Upsert, RowFailure> {
        let (_, constituency_id) = self.lookup_constituency(row)?;
        let election_year = year(row)?;
        let election_type = text(row, "election_type").or("National".to_string());

        let winning_candidate_id = text(row, "winning_candidate_name").try_map(|name| {
            self.candidate_id(&name, constituency_id, election_year)
                .ok_or_else(|| RowFailure::new(format!("Winning candidate not found: {}", name)))
        })?;
        let winning_party_id = match text(row, "winning_party_name") {
            Field::Present(name) => match self.party_id(&name) {
                Some(id) => Field::Present(id),
                None => return not_found(format!("Winning party not found: {}", name)),
            },
            Field::Blank => Field::Blank,
            Field::Absent => Field::Absent,
        };

        let existing = self.existing::<ConstituencyResult>(&(
            constituency_id,
            election_year,
            election_type.clone(),
        ));
        let prev = existing.as_ref().map(|r| &r.fields);
        let is_official = flag(row, "is_official")?.or(false);
        let declared_at = if is_official {
            match prev {
                Some(p) if p.is_official && p.declared_at.is_some() => p.declared_at,
                _ => Some(self.started_at),
            }
        } else {
            None
        };
        let fields = ConstituencyResult {
            constituency_id,
            election_year,
            election_type,
            total_votes: required_int(row, "total_votes")?,
            valid_votes: required_int(row, "valid_votes")?,
            rejected_votes: required_int(row, "rejected_votes")?,
            turnout_percentage: required_decimal(row, "turnout_percentage")?,
            winning_candidate_id: winning_candidate_id
                .merge(prev.and_then(|p| p.winning_candidate_id)),
            winning_party_id: winning_party_id.merge(prev.and_then(|p| p.winning_party_id)),
            margin_votes: int(row, "margin_votes")?.merge(prev.and_then(|p| p.margin_votes)),
            margin_percentage: decimal(row, "margin_percentage")?
                .merge(prev.and_then(|p| p.margin_percentage)),
            is_official,
            declared_at,
        };
        if fields.valid_votes.checked_add(fields.rejected_votes) != Some(fields.total_votes) {
            return Err(RowFailure::new(vote_sum_message(
                fields.total_votes,
                fields.valid_votes,
                fields.rejected_votes,
            )));
        }
        self.write(existing.map(|r| r.id), fields)
    }
}

// ******** Cell accessors ********

fn not_found<T>(message: String) -> Result<T, RowFailure> {
    warn!("{}", message);
    Err(RowFailure::new(message))
}

fn text(row: &Row, column: &str) -> Field<String> {
    row.field(column).map(|s| s.to_string())
}

fn required_text(row: &Row, column: &str) -> Result<String, RowFailure> {
    text(row, column)
        .present()
        .ok_or_else(|| RowFailure::at(column, format!("{} is required", column_label(column))))
}

fn int(row: &Row, column: &str) -> Result<Field<i64>, RowFailure> {
    row.field(column).try_map(|s| {
        parse_int(s).ok_or_else(|| {
            RowFailure::at(
                column,
                format!("{} must be a valid integer", column_label(column)),
            )
        })
    })
}

fn required_int(row: &Row, column: &str) -> Result<i64, RowFailure> {
    int(row, column)?
        .present()
        .ok_or_else(|| RowFailure::at(column, format!("{} is required", column_label(column))))
}

fn decimal(row: &Row, column: &str) -> Result<Field<f64>, RowFailure> {
    row.field(column).try_map(|s| {
        parse_float(s).ok_or_else(|| {
            RowFailure::at(
                column,
                format!("{} must be a valid number", column_label(column)),
            )
        })
    })
}

fn required_decimal(row: &Row, column: &str) -> Result<f64, RowFailure> {
    decimal(row, column)?
        .present()
        .ok_or_else(|| RowFailure::at(column, format!("{} is required", column_label(column))))
}

fn flag(row: &Row, column: &str) -> Result<Field<bool>, RowFailure> {
    row.field(column).try_map(|s| {
        parse_flag(s).ok_or_else(|| {
            RowFailure::at(
                column,
                format!(
                    "{} must be one of true, false, 1, 0, yes, no (got {})",
                    column_label(column),
                    s
                ),
            )
        })
    })
}

fn year(row: &Row) -> Result<i32, RowFailure> {
    let y = required_int(row, "election_year")?;
    i32::try_from(y).map_err(|_| {
        RowFailure::at("election_year", "Election year must be between 1970 and 2100")
    })
}
