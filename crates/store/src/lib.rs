pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, SequenceGuard};
pub use postgres::PostgresStore;
pub use query::{DEFAULT_PAGE_SIZE, OrderPage, OrderQuery, StalePaymentQuery};
pub use store::{CommerceStore, CommerceStoreExt, validate_aggregate_for_insert};
