//! `dealflow-notify`: who gets told about a mutation, and how.
//!
//! - [`fanout`]: role-aware recipient resolution
//! - [`dispatcher`]: one row per recipient, then a best-effort realtime push
//! - [`push`]: the bounded push queue and its worker thread
//! - [`store`]: notification persistence boundary (+ in-memory implementation)

pub mod dispatcher;
pub mod event;
pub mod fanout;
pub mod notification;
pub mod push;
pub mod roster;
pub mod store;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use event::{EntityAction, EntityEvent, FanoutRule};
pub use fanout::{dedup_recipients, FanoutResolver, Recipient};
pub use notification::{NewNotification, Notification, NotificationCategory, NotificationContent, PushEnvelope};
pub use push::{PushError, PushQueue, PushStats, PushWorker, PushWorkerConfig, PushWorkerHandle};
pub use roster::{RosterEntry, RosterError, UserRoster};
pub use store::{InMemoryNotificationStore, NotificationStore, NotificationStoreError};
