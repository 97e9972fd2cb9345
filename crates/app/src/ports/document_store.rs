//! Document store port: persistence of the whole object graph.

use std::sync::Arc;

use synhub_domain::document::Document;
use synhub_domain::error::SynhubError;

/// Loads and saves the persisted [`Document`].
pub trait DocumentStore: Send + Sync {
    /// Read the stored document. `Ok(None)` means nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::Storage`] when the backing store fails.
    fn load(&self) -> Result<Option<Document>, SynhubError>;

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::Storage`] when the backing store fails.
    fn save(&self, document: &Document) -> Result<(), SynhubError>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn load(&self) -> Result<Option<Document>, SynhubError> {
        (**self).load()
    }

    fn save(&self, document: &Document) -> Result<(), SynhubError> {
        (**self).save(document)
    }
}
