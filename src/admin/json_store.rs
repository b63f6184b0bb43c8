// Persistence of the store as a single JSON document.

use std::path::Path;

use bulk_import::store::{MemoryStore, Snapshot};

use crate::admin::*;

/// Loads the store saved at the given path. A missing file is an empty store.
pub fn load_store(path: &str) -> AdminResult<MemoryStore> {
    if !Path::new(path).exists() {
        info!("load_store: {} does not exist, starting from an empty store", path);
        return Ok(MemoryStore::new());
    }
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let snapshot: Snapshot =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!(
        "load_store: {} divisions, {} candidates, {} import logs",
        snapshot.divisions.len(),
        snapshot.candidates.len(),
        snapshot.import_logs.len()
    );
    MemoryStore::from_snapshot(snapshot).context(LoadingStoreSnafu { path })
}

pub fn save_store(path: &str, store: &MemoryStore) -> AdminResult<()> {
    let js = serde_json::to_string_pretty(&store.snapshot()).context(SerializingJsonSnafu {})?;
    fs::write(path, js).context(WritingFileSnafu { path })?;
    info!("save_store: saved to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulk_import::store::AuditLog;

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = load_store(path.to_str().unwrap()).unwrap();
        assert!(store.import_logs().is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let path = path.to_str().unwrap();

        let mut store = MemoryStore::new();
        let req = ImportRequest {
            kind: EntityKind::Party,
            file_name: "parties.csv".to_string(),
            content: b"name,acronym\nGreen Party,GP\n".to_vec(),
            worksheet: None,
            dry_run: false,
            operator_id: 1,
        };
        run_import(&mut store, &req).unwrap();
        save_store(path, &store).unwrap();

        let loaded = load_store(path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
        assert_eq!(loaded.import_logs().len(), 1);
    }

    #[test]
    fn corrupted_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{ not json").unwrap();
        assert!(matches!(
            load_store(file.path().to_str().unwrap()),
            Err(AdminError::ParsingJson { .. })
        ));
    }
}
