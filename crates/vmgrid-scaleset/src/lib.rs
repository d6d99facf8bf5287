//! vmgrid-scaleset — scale set orchestration.
//!
//! Turns a scale-set definition (name, template VM profile, capacity) into
//! that many replica VMs, each with its own network interfaces and cloned
//! OS disk, and persists the aggregate record in the object store.
//!
//! # Architecture
//!
//! ```text
//! ScaleSetOrchestrator
//!   ├── ObjectStore<ScaleSetRecord>   (aggregate records, unique by name)
//!   ├── Providers                     (compute, network interface, disk)
//!   └── per invocation
//!       ├── ReplicaBlueprint          (template clone + deterministic names)
//!       └── Saga                      (compensating deletes, replayed on failure)
//! ```

pub mod error;
pub mod orchestrator;
pub mod replica;
mod saga;

pub use error::{ScaleSetError, ScaleSetResult, Stage};
pub use orchestrator::{RequestOptions, ScaleSetOrchestrator};
pub use replica::{ORDINAL_TAG, SCALE_SET_TAG};
