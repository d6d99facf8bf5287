//! vmgrid-provider — the contract between orchestrators and node agents.
//!
//! Every dependent resource kind (compute, network interface, disk) is
//! reached through a [`Provider`]: batched `create_or_update`, `get`, and
//! `delete`. Orchestrators receive their providers through [`Providers`]
//! and wrap each call in [`bounded`] so it carries a timeout.
//!
//! [`StoreProvider`] is a local agent that keeps entities in the vmgrid
//! object store. It backs standalone mode and tests.

pub mod error;
pub mod local;
pub mod provider;

pub use error::{ProviderError, ProviderResult};
pub use local::StoreProvider;
pub use provider::{
    ComputeProvider, DiskProvider, Entity, NetworkInterfaceProvider, Provider, Providers, bounded,
};
