pub mod access;
pub mod billing;
pub mod metrics;
pub mod notification;
pub mod resolver;
pub mod sequence;
pub mod store;
pub mod tax;

pub use access::{AccessScope, Caller, Role};
pub use billing::BillingService;
pub use notification::{InvoiceNotice, NotificationDispatcher, NotifyMode};
pub use resolver::EntityResolver;
pub use sequence::SequenceAllocator;
pub use store::{BillingStore, MemoryStore, PgStore, StoreError};
