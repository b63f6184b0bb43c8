// Data access used by the import pipeline.
//
// The pipeline only needs natural-key lookups, a first-match query and single
// record writes. Anything that can answer those (a database, a file) can be
// plugged in through the Repository trait; MemoryStore is the reference
// implementation.

use std::collections::HashMap;

use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt, Snafu};

use crate::config::EntityKind;
use crate::model::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("A {kind} record already exists for key {key}"))]
    DuplicateKey { kind: EntityKind, key: String },

    #[snafu(display("No {kind} record with id {id}"))]
    MissingRecord { kind: EntityKind, id: RecordId },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Access to the records of one entity kind.
pub trait Repository<E: Entity> {
    fn find_by_natural_key(&self, key: &E::Key) -> Option<Stored<E>>;

    /// The first record, in id order, that satisfies the predicate.
    fn find_first(&self, predicate: &dyn Fn(&E) -> bool) -> Option<Stored<E>>;

    fn get(&self, id: RecordId) -> Option<Stored<E>>;

    /// All the records, in id order.
    fn all(&self) -> Vec<Stored<E>>;

    /// Fails if a record with the same natural key already exists.
    fn insert(&mut self, fields: E) -> StoreResult<Stored<E>>;

    /// Replaces all the fields of a record. Fails if the new natural key is
    /// already taken by another record.
    fn update(&mut self, id: RecordId, fields: E) -> StoreResult<Stored<E>>;
}

/// The append-only log of import invocations.
pub trait AuditLog {
    fn append_import_log(&mut self, log: NewImportLog) -> StoreResult<ImportLog>;

    fn import_logs(&self) -> Vec<ImportLog>;
}

/// Everything the import pipeline reads and writes.
pub trait DataStore:
    Repository<Division>
    + Repository<District>
    + Repository<Constituency>
    + Repository<Party>
    + Repository<Candidate>
    + Repository<PollingCenter>
    + Repository<PollingCenterResult>
    + Repository<VoterDemographics>
    + Repository<ConstituencyResult>
    + AuditLog
{
}

impl<T> DataStore for T where
    T: Repository<Division>
        + Repository<District>
        + Repository<Constituency>
        + Repository<Party>
        + Repository<Candidate>
        + Repository<PollingCenter>
        + Repository<PollingCenterResult>
        + Repository<VoterDemographics>
        + Repository<ConstituencyResult>
        + AuditLog
{
}

/// The records of one kind, kept in id order and indexed by natural key.
#[derive(Debug, Clone)]
pub struct Collection<E: Entity> {
    records: Vec<Stored<E>>,
    // natural key -> position in records
    by_key: HashMap<E::Key, usize>,
    next_id: RecordId,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Collection {
            records: Vec::new(),
            by_key: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<E: Entity> Collection<E> {
    pub fn from_records(mut records: Vec<Stored<E>>) -> StoreResult<Collection<E>> {
        records.sort_by_key(|r| r.id);
        let mut by_key: HashMap<E::Key, usize> = HashMap::new();
        for (pos, r) in records.iter().enumerate() {
            let key = r.natural_key();
            ensure!(
                !by_key.contains_key(&key),
                DuplicateKeySnafu {
                    kind: E::KIND,
                    key: format!("{:?}", key)
                }
            );
            by_key.insert(key, pos);
        }
        let next_id = records.last().map(|r| r.id + 1).unwrap_or(1);
        Ok(Collection {
            records,
            by_key,
            next_id,
        })
    }

    pub fn records(&self) -> &[Stored<E>] {
        &self.records
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.binary_search_by_key(&id, |r| r.id).ok()
    }

    pub fn find_by_natural_key(&self, key: &E::Key) -> Option<Stored<E>> {
        self.by_key.get(key).map(|pos| self.records[*pos].clone())
    }

    pub fn find_first(&self, predicate: &dyn Fn(&E) -> bool) -> Option<Stored<E>> {
        self.records.iter().find(|r| predicate(&r.fields)).cloned()
    }

    pub fn get(&self, id: RecordId) -> Option<Stored<E>> {
        self.position(id).map(|pos| self.records[pos].clone())
    }

    pub fn insert(&mut self, fields: E) -> StoreResult<Stored<E>> {
        let key = fields.natural_key();
        ensure!(
            !self.by_key.contains_key(&key),
            DuplicateKeySnafu {
                kind: E::KIND,
                key: format!("{:?}", key)
            }
        );
        let now = Utc::now();
        let record = Stored {
            id: self.next_id,
            created_at: now,
            updated_at: now,
            fields,
        };
        self.next_id += 1;
        self.by_key.insert(key, self.records.len());
        self.records.push(record.clone());
        debug!("insert: {} {}", E::KIND, record.id);
        Ok(record)
    }

    pub fn update(&mut self, id: RecordId, fields: E) -> StoreResult<Stored<E>> {
        let pos = self
            .position(id)
            .context(MissingRecordSnafu { kind: E::KIND, id })?;
        let old_key = self.records[pos].natural_key();
        let new_key = fields.natural_key();
        if old_key != new_key {
            ensure!(
                !self.by_key.contains_key(&new_key),
                DuplicateKeySnafu {
                    kind: E::KIND,
                    key: format!("{:?}", new_key)
                }
            );
            self.by_key.remove(&old_key);
            self.by_key.insert(new_key, pos);
        }
        let record = &mut self.records[pos];
        record.fields = fields;
        record.updated_at = Utc::now();
        debug!("update: {} {}", E::KIND, id);
        Ok(record.clone())
    }
}

/// A store that keeps everything in memory.
///
/// It can be saved and restored through a `Snapshot`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    divisions: Collection<Division>,
    districts: Collection<District>,
    constituencies: Collection<Constituency>,
    parties: Collection<Party>,
    candidates: Collection<Candidate>,
    polling_centers: Collection<PollingCenter>,
    polling_results: Collection<PollingCenterResult>,
    voter_demographics: Collection<VoterDemographics>,
    constituency_results: Collection<ConstituencyResult>,
    import_logs: Vec<ImportLog>,
}

macro_rules! memory_repository {
    ($entity:ty, $field:ident) => {
        impl Repository<$entity> for MemoryStore {
            fn find_by_natural_key(
                &self,
                key: &<$entity as Entity>::Key,
            ) -> Option<Stored<$entity>> {
                self.$field.find_by_natural_key(key)
            }

            fn find_first(&self, predicate: &dyn Fn(&$entity) -> bool) -> Option<Stored<$entity>> {
                self.$field.find_first(predicate)
            }

            fn get(&self, id: RecordId) -> Option<Stored<$entity>> {
                self.$field.get(id)
            }

            fn all(&self) -> Vec<Stored<$entity>> {
                self.$field.records().to_vec()
            }

            fn insert(&mut self, fields: $entity) -> StoreResult<Stored<$entity>> {
                self.$field.insert(fields)
            }

            fn update(&mut self, id: RecordId, fields: $entity) -> StoreResult<Stored<$entity>> {
                self.$field.update(id, fields)
            }
        }
    };
}

memory_repository!(Division, divisions);
memory_repository!(District, districts);
memory_repository!(Constituency, constituencies);
memory_repository!(Party, parties);
memory_repository!(Candidate, candidates);
memory_repository!(PollingCenter, polling_centers);
memory_repository!(PollingCenterResult, polling_results);
memory_repository!(VoterDemographics, voter_demographics);
memory_repository!(ConstituencyResult, constituency_results);

impl AuditLog for MemoryStore {
    fn append_import_log(&mut self, log: NewImportLog) -> StoreResult<ImportLog> {
        let id = self.import_logs.last().map(|l| l.id + 1).unwrap_or(1);
        let entry = ImportLog {
            id,
            import_type: log.import_type,
            file_name: log.file_name,
            total_rows: log.total_rows,
            successful_rows: log.successful_rows,
            failed_rows: log.failed_rows,
            errors: log.errors,
            user_id: log.user_id,
            status: log.status,
            created_at: Utc::now(),
        };
        self.import_logs.push(entry.clone());
        Ok(entry)
    }

    fn import_logs(&self) -> Vec<ImportLog> {
        self.import_logs.clone()
    }
}

/// The serializable content of a MemoryStore.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub divisions: Vec<Stored<Division>>,
    pub districts: Vec<Stored<District>>,
    pub constituencies: Vec<Stored<Constituency>>,
    pub parties: Vec<Stored<Party>>,
    pub candidates: Vec<Stored<Candidate>>,
    pub polling_centers: Vec<Stored<PollingCenter>>,
    pub polling_results: Vec<Stored<PollingCenterResult>>,
    pub voter_demographics: Vec<Stored<VoterDemographics>>,
    pub constituency_results: Vec<Stored<ConstituencyResult>>,
    pub import_logs: Vec<ImportLog>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Rebuilds a store. Fails if two records of a kind share a natural key.
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<MemoryStore> {
        let mut import_logs = snapshot.import_logs;
        import_logs.sort_by_key(|l| l.id);
        Ok(MemoryStore {
            divisions: Collection::from_records(snapshot.divisions)?,
            districts: Collection::from_records(snapshot.districts)?,
            constituencies: Collection::from_records(snapshot.constituencies)?,
            parties: Collection::from_records(snapshot.parties)?,
            candidates: Collection::from_records(snapshot.candidates)?,
            polling_centers: Collection::from_records(snapshot.polling_centers)?,
            polling_results: Collection::from_records(snapshot.polling_results)?,
            voter_demographics: Collection::from_records(snapshot.voter_demographics)?,
            constituency_results: Collection::from_records(snapshot.constituency_results)?,
            import_logs,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            divisions: self.divisions.records().to_vec(),
            districts: self.districts.records().to_vec(),
            constituencies: self.constituencies.records().to_vec(),
            parties: self.parties.records().to_vec(),
            candidates: self.candidates.records().to_vec(),
            polling_centers: self.polling_centers.records().to_vec(),
            polling_results: self.polling_results.records().to_vec(),
            voter_demographics: self.voter_demographics.records().to_vec(),
            constituency_results: self.constituency_results.records().to_vec(),
            import_logs: self.import_logs.clone(),
        }
    }
}
