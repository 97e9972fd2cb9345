//! File-backed [`DocumentStore`].

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use synhub_app::ports::DocumentStore;
use synhub_domain::document::Document;
use synhub_domain::error::SynhubError;

use crate::error::StorageError;

/// Version written into every envelope.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    document: &'a Document,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    document: Document,
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    tracing::error!(path = %path.display(), error = %source, "document file io failed");
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Stores the document as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read(&self) -> Result<Option<Document>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(&self.path, error)),
        };
        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        if envelope.version > FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: envelope.version,
                supported: FORMAT_VERSION,
            });
        }
        tracing::debug!(path = %self.path.display(), version = envelope.version, "document read");
        Ok(Some(envelope.document))
    }

    fn write(&self, document: &Document) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(&EnvelopeRef {
            version: FORMAT_VERSION,
            document,
        })?;
        let temp = self.temp_path();
        let mut file = File::create(&temp).map_err(|e| io_error(&temp, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| io_error(&temp, e))?;
        drop(file);
        fs::rename(&temp, &self.path).map_err(|e| io_error(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "document written");
        Ok(())
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Option<Document>, SynhubError> {
        Ok(self.read()?)
    }

    fn save(&self, document: &Document) -> Result<(), SynhubError> {
        Ok(self.write(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synhub_domain::action::{Action, ActionBody, delay_seconds_template};
    use synhub_domain::event::Event;
    use synhub_domain::id::{ActionId, EventId, ParamId};
    use synhub_domain::parameter::ParamOwner;

    fn sample() -> Document {
        let mut delay = Action::new("Pause", ActionBody::Delay);
        delay.assign_id(ActionId::from_raw(0x10)).unwrap();
        let parameter = delay_seconds_template(5)
            .duplicate(ParamId::from_raw(0x20), ParamOwner::Action(delay.id()));
        delay.parameters.push(parameter.id());
        let event = Event::builder()
            .id(EventId::from_raw(0x30))
            .name("Evening")
            .action(ActionId::from_raw(0x40))
            .build()
            .unwrap();
        Document {
            actions: vec![delay],
            parameters: vec![parameter],
            events: vec![event],
            screen_triggers: Vec::new(),
        }
    }

    #[test]
    fn should_return_none_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("synhub.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn should_restore_saved_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("synhub.json"));
        let document = sample();
        store.save(&document).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.actions, document.actions);
        assert_eq!(loaded.parameters, document.parameters);
        assert_eq!(loaded.events.len(), 1);
        assert_eq!(loaded.events[0].id(), EventId::from_raw(0x30));
        assert_eq!(loaded.events[0].actions(), &[ActionId::from_raw(0x40)]);
    }

    #[test]
    fn should_replace_previous_document_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("synhub.json"));
        store.save(&sample()).unwrap();
        store.save(&Document::default()).unwrap();

        assert!(store.load().unwrap().unwrap().is_empty());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn should_create_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state").join("synhub.json"));
        store.save(&sample()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn should_write_version_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("synhub.json"));
        store.save(&Document::default()).unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], FORMAT_VERSION);
        assert!(raw["document"].is_object());
    }

    #[test]
    fn should_reject_newer_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synhub.json");
        fs::write(&path, r#"{"version": 99, "document": {}}"#).unwrap();
        let err = JsonFileStore::new(&path).read().unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedVersion { found: 99, .. }
        ));
    }

    #[test]
    fn should_report_corrupted_file_as_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synhub.json");
        fs::write(&path, "not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SynhubError::Storage(_)));
    }
}
