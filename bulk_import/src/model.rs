// ********* Stored records ***********

use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{EntityKind, ImportStatus, RowError};

pub type RecordId = u64;
pub type UserId = u64;

/// A record as held by a store: the entity fields plus the bookkeeping columns
/// that the store manages on its own.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Stored<E> {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: E,
}

impl<E> Deref for Stored<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.fields
    }
}

/// An entity that can be upserted by the import pipeline.
///
/// The natural key is the combination of fields that identifies a record
/// independently of its surrogate id. Two records of the same kind never share
/// a natural key.
pub trait Entity: Clone + Debug {
    type Key: Eq + Hash + Clone + Debug;

    const KIND: EntityKind;

    fn natural_key(&self) -> Self::Key;
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Division {
    pub name: String,
    pub code: String,
    pub bengali_name: Option<String>,
    pub total_population: Option<i64>,
    pub total_voters: Option<i64>,
}

impl Entity for Division {
    type Key = String;
    const KIND: EntityKind = EntityKind::Division;

    fn natural_key(&self) -> String {
        self.code.clone()
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct District {
    pub name: String,
    pub code: String,
    pub bengali_name: Option<String>,
    pub division_id: RecordId,
    pub area_sq_km: Option<i64>,
    pub total_voters: Option<i64>,
}

impl Entity for District {
    type Key = (RecordId, String);
    const KIND: EntityKind = EntityKind::District;

    fn natural_key(&self) -> Self::Key {
        (self.division_id, self.code.clone())
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Constituency {
    pub name: String,
    /// Constituency numbers are labels ("101"), not quantities.
    pub number: String,
    pub district_id: RecordId,
    pub area_description: Option<String>,
    pub total_voters: Option<i64>,
    pub is_active: bool,
}

impl Entity for Constituency {
    type Key = (RecordId, String);
    const KIND: EntityKind = EntityKind::Constituency;

    fn natural_key(&self) -> Self::Key {
        (self.district_id, self.number.clone())
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub acronym: Option<String>,
    pub symbol_name: Option<String>,
    pub color_code: Option<String>,
    pub is_registered: bool,
}

impl Entity for Party {
    type Key = String;
    const KIND: EntityKind = EntityKind::Party;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub full_name: String,
    pub bengali_name: Option<String>,
    pub age: Option<i64>,
    pub education: Option<String>,
    pub profession: Option<String>,
    pub party_id: RecordId,
    pub constituency_id: RecordId,
    pub election_year: i32,
    pub election_type: String,
    pub candidate_number: Option<String>,
    pub deposit_status: Option<String>,
    pub is_active: bool,
}

impl Entity for Candidate {
    type Key = (String, RecordId, i32);
    const KIND: EntityKind = EntityKind::Candidate;

    fn natural_key(&self) -> Self::Key {
        (
            self.full_name.clone(),
            self.constituency_id,
            self.election_year,
        )
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollingCenter {
    pub code: String,
    pub name: String,
    pub constituency_id: RecordId,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_voters: Option<i64>,
    pub is_active: bool,
}

impl Entity for PollingCenter {
    type Key = String;
    const KIND: EntityKind = EntityKind::PollingCenter;

    fn natural_key(&self) -> String {
        self.code.clone()
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollingCenterResult {
    pub polling_center_id: RecordId,
    pub candidate_id: RecordId,
    pub election_year: i32,
    pub votes_received: i64,
    /// Share of the center's votes. Not computed by the import, always cleared on write.
    pub vote_percentage: Option<f64>,
    pub is_valid: bool,
    pub remarks: Option<String>,
    pub entered_by: Option<UserId>,
}

impl Entity for PollingCenterResult {
    type Key = (RecordId, RecordId, i32);
    const KIND: EntityKind = EntityKind::PollingResult;

    fn natural_key(&self) -> Self::Key {
        (self.polling_center_id, self.candidate_id, self.election_year)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct VoterDemographics {
    pub constituency_id: RecordId,
    pub election_year: i32,
    pub total_voters: i64,
    pub male_voters: i64,
    pub female_voters: i64,
    pub other_voters: i64,
    pub age_18_25: i64,
    pub age_26_35: i64,
    pub age_36_45: i64,
    pub age_46_55: i64,
    pub age_56_65: i64,
    pub age_66_plus: i64,
    pub last_updated: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl VoterDemographics {
    /// None when the sum does not fit in an i64.
    pub fn gender_total(&self) -> Option<i64> {
        self.male_voters
            .checked_add(self.female_voters)?
            .checked_add(self.other_voters)
    }
}

impl Entity for VoterDemographics {
    type Key = (RecordId, i32);
    const KIND: EntityKind = EntityKind::VoterDemographics;

    fn natural_key(&self) -> Self::Key {
        (self.constituency_id, self.election_year)
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConstituencyResult {
    pub constituency_id: RecordId,
    pub election_year: i32,
    pub election_type: String,
    pub total_votes: i64,
    pub valid_votes: i64,
    pub rejected_votes: i64,
    pub turnout_percentage: f64,
    pub winning_candidate_id: Option<RecordId>,
    pub winning_party_id: Option<RecordId>,
    pub margin_votes: Option<i64>,
    pub margin_percentage: Option<f64>,
    pub is_official: bool,
    pub declared_at: Option<DateTime<Utc>>,
}

impl Entity for ConstituencyResult {
    type Key = (RecordId, i32, String);
    const KIND: EntityKind = EntityKind::ConstituencyResult;

    fn natural_key(&self) -> Self::Key {
        (
            self.constituency_id,
            self.election_year,
            self.election_type.clone(),
        )
    }
}

/// The audit record of one import invocation. Import logs are never modified.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct ImportLog {
    pub id: RecordId,
    pub import_type: EntityKind,
    pub file_name: String,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub errors: Vec<RowError>,
    pub user_id: UserId,
    pub status: ImportStatus,
    pub created_at: DateTime<Utc>,
}

/// An import log before the store assigned its id and timestamp.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct NewImportLog {
    pub import_type: EntityKind,
    pub file_name: String,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub errors: Vec<RowError>,
    pub user_id: UserId,
    pub status: ImportStatus,
}
