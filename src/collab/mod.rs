//! External collaborators the engine calls into.

mod blob;
mod notify;
pub mod signing;

pub use blob::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use notify::{
    dispatch, Delivery, LogNotifier, NotificationEvent, Notifier, RecordingNotifier,
    WebhookNotifier,
};
