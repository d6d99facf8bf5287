//! vmgrid-core — shared domain model for the vmgrid control plane.
//!
//! Holds the entity types exchanged with node agents (virtual machines,
//! network interfaces, virtual hard disks), the scale-set definition and
//! persisted record, the deterministic replica naming grammar, and the
//! `vmgrid.toml` configuration.

pub mod config;
pub mod model;
pub mod naming;

pub use config::{ConfigError, GridConfig};
pub use model::*;
