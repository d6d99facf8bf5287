//! Domain types for virtual machines, their dependents, and scale sets.
//!
//! All types are serde-serializable: they are persisted as JSON in the
//! object store and loaded from TOML definition files by the CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a persisted scale-set record.
pub type ScaleSetId = String;

// ── VM profile (template) ──────────────────────────────────────────

/// Blueprint for a virtual machine.
///
/// A scale set holds one profile as its template. Each replica receives a
/// deep clone with its per-replica fields (interface names, OS disk name,
/// computer name) filled in; the template itself is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VmProfile {
    /// Prefix folded into every replica name derived from this profile.
    pub name_prefix: String,
    #[serde(default)]
    pub hardware: HardwareProfile,
    pub network: Option<NetworkProfile>,
    pub storage: Option<StorageProfile>,
    pub os: Option<OsProfile>,
}

/// CPU and memory sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HardwareProfile {
    pub cpu_count: u32,
    pub memory_mb: u64,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            cpu_count: 2,
            memory_mb: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetworkProfile {
    #[serde(default)]
    pub interfaces: Vec<InterfaceRef>,
}

/// One network interface slot in a profile.
///
/// In a template only `network_name` is meaningful; `name` is assigned
/// when the profile is realized for a replica.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InterfaceRef {
    pub name: Option<String>,
    pub network_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageProfile {
    pub os_disk: OsDisk,
}

/// The OS disk of a profile. For a template this names the source disk
/// image that gets cloned per replica.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsDisk {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsProfile {
    pub computer_name: String,
    #[serde(default)]
    pub os_type: OsType,
    pub administrator: Option<UserConfiguration>,
}

/// Administrator account provisioned into the guest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserConfiguration {
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub ssh_public_keys: Vec<String>,
}

// ── Provider entities ──────────────────────────────────────────────

/// A compute instance as exchanged with the compute provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VirtualMachine {
    pub name: String,
    /// Agent-assigned identifier, populated by the provider.
    pub id: Option<String>,
    pub profile: VmProfile,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetworkInterface {
    pub name: String,
    pub id: Option<String>,
    pub network_name: String,
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VirtualHardDisk {
    pub name: String,
    pub id: Option<String>,
    /// Disk this one was cloned from, if any.
    pub source: Option<String>,
    pub size_bytes: Option<u64>,
}

// ── Scale sets ─────────────────────────────────────────────────────

/// Caller-supplied desired state of a scale set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaleSetDefinition {
    pub name: String,
    pub capacity: u32,
    pub profile: Option<VmProfile>,
}

/// One realized replica of a scale set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicaRef {
    pub name: String,
    /// 1-based position within the scale set.
    pub ordinal: u32,
    pub nic_names: Vec<String>,
    pub disk_name: String,
}

/// Lifecycle phase of a persisted scale set.
///
/// A `Provisioning` record is the claim a running create or scale-up holds
/// on the name; every other request for that scale set backs off until it
/// settles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScaleSetPhase {
    Provisioning,
    #[default]
    Settled,
}

impl ScaleSetPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ScaleSetPhase::Provisioning => "provisioning",
            ScaleSetPhase::Settled => "settled",
        }
    }
}

/// Persisted aggregate state of a scale set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaleSetRecord {
    pub id: ScaleSetId,
    pub name: String,
    #[serde(default)]
    pub phase: ScaleSetPhase,
    /// Target capacity. While provisioning, `replicas` may still be shorter.
    pub capacity: u32,
    pub profile: VmProfile,
    pub replicas: Vec<ReplicaRef>,
    /// Unix timestamp (seconds) when the record was first persisted.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last capacity change.
    pub updated_at: u64,
}

impl ScaleSetRecord {
    /// Allocate a fresh record id.
    pub fn new_id() -> ScaleSetId {
        uuid::Uuid::new_v4().to_string()
    }

    /// Names of every NIC across all replicas, in replica order.
    pub fn nic_names(&self) -> impl Iterator<Item = &str> {
        self.replicas
            .iter()
            .flat_map(|r| r.nic_names.iter().map(String::as_str))
    }
}
