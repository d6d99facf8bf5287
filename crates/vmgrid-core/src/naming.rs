//! Deterministic replica naming.
//!
//! ```text
//! replica-vm   := "vm_"   scaleSetName "_" profilePrefix "_" ordinal
//! replica-nic  := "vnic_" scaleSetName "_" profilePrefix "_" ordinal "_" networkName "_" nicOrdinal
//! replica-disk := "vhd_"  replicaVmName
//! ```
//!
//! Names must stay stable across releases: rollback and delete re-derive
//! them instead of reading them back from agents.

pub fn replica_vm_name(scale_set: &str, prefix: &str, ordinal: u32) -> String {
    format!("vm_{scale_set}_{prefix}_{ordinal}")
}

/// `nic_ordinal` is 1-based, like replica ordinals.
pub fn replica_nic_name(
    scale_set: &str,
    prefix: &str,
    ordinal: u32,
    network: &str,
    nic_ordinal: u32,
) -> String {
    format!("vnic_{scale_set}_{prefix}_{ordinal}_{network}_{nic_ordinal}")
}

pub fn replica_disk_name(vm_name: &str) -> String {
    format!("vhd_{vm_name}")
}

/// Guest hostname of a replica: `<templateComputerName>-<ordinal>`.
pub fn replica_computer_name(template: &str, ordinal: u32) -> String {
    format!("{template}-{ordinal}")
}
