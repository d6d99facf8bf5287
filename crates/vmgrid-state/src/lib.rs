//! vmgrid-state — embedded object store for vmgrid orchestrators.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for the records orchestrators keep between calls.
//!
//! # Architecture
//!
//! One [`StateStore`] owns the database. Each record type gets a typed
//! [`ObjectStore`] view over its own table, keyed by an opaque id, with
//! values JSON-serialized into redb's `&[u8]` column. There is no secondary
//! index: lookups by a business field scan the table.
//!
//! Both handles are `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod record;
pub mod store;

pub use error::{StateError, StateResult};
pub use record::Record;
pub use store::{ObjectStore, StateStore};
