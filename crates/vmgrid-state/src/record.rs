//! The [`Record`] trait and its implementations for vmgrid entities.
//!
//! Every record type maps to one redb table (`&str` keys, JSON `&[u8]`
//! values). Filtering by field goes through [`Record::field`], so each type
//! lists exactly which fields are queryable.

use serde::Serialize;
use serde::de::DeserializeOwned;

use vmgrid_core::{NetworkInterface, ScaleSetRecord, VirtualHardDisk, VirtualMachine};

/// A value that can live in an [`ObjectStore`](crate::ObjectStore).
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Name of the redb table holding this record type.
    const TABLE: &'static str;

    /// Primary key. Unique within the table.
    fn key(&self) -> &str;

    /// String value of a named field, or `None` when the field is unknown
    /// or unset. Unknown fields never match a filter.
    fn field(&self, name: &str) -> Option<&str>;
}

/// Scale-set records keyed by their opaque id.
impl Record for ScaleSetRecord {
    const TABLE: &'static str = "scale_sets";

    fn key(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "name" => Some(&self.name),
            "phase" => Some(self.phase.as_str()),
            _ => None,
        }
    }
}

/// Virtual machines keyed by name.
impl Record for VirtualMachine {
    const TABLE: &'static str = "virtual_machines";

    fn key(&self) -> &str {
        &self.name
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "id" => self.id.as_deref(),
            "computer_name" => self.profile.os.as_ref().map(|os| os.computer_name.as_str()),
            _ => None,
        }
    }
}

/// Network interfaces keyed by name.
impl Record for NetworkInterface {
    const TABLE: &'static str = "network_interfaces";

    fn key(&self) -> &str {
        &self.name
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "id" => self.id.as_deref(),
            "network_name" => Some(&self.network_name),
            _ => None,
        }
    }
}

/// Virtual hard disks keyed by name.
impl Record for VirtualHardDisk {
    const TABLE: &'static str = "virtual_hard_disks";

    fn key(&self) -> &str {
        &self.name
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "id" => self.id.as_deref(),
            "source" => self.source.as_deref(),
            _ => None,
        }
    }
}
