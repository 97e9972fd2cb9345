//! Change notification port: the presentation layer's view of the engine.

use std::sync::Arc;

use synhub_domain::change::Change;

/// Publishes [`Change`] notifications to interested subscribers.
///
/// Publishing never fails and never blocks; a change nobody listens to is
/// dropped.
pub trait ChangePublisher: Send + Sync {
    fn publish(&self, change: Change);
}

impl<T: ChangePublisher + ?Sized> ChangePublisher for Arc<T> {
    fn publish(&self, change: Change) {
        (**self).publish(change);
    }
}
