//! Replica blueprints — per-replica clones of a scale set's template.
//!
//! A blueprint owns a deep copy of the template profile and substitutes the
//! replica's deterministic names into it, stage by stage. Nothing here talks
//! to a provider; the orchestrator submits what each stage produces.

use std::collections::BTreeMap;

use vmgrid_core::naming;
use vmgrid_core::{NetworkInterface, ReplicaRef, VirtualHardDisk, VirtualMachine, VmProfile};

use crate::error::{ScaleSetError, ScaleSetResult, Stage};

/// VM tag carrying the owning scale set's name.
pub const SCALE_SET_TAG: &str = "scale_set";
/// VM tag carrying the replica ordinal.
pub const ORDINAL_TAG: &str = "ordinal";

#[derive(Debug)]
pub(crate) struct ReplicaBlueprint<'a> {
    scale_set: &'a str,
    ordinal: u32,
    vm_name: String,
    profile: VmProfile,
    nic_names: Vec<String>,
}

impl<'a> ReplicaBlueprint<'a> {
    pub fn new(scale_set: &'a str, template: &VmProfile, ordinal: u32) -> Self {
        let profile = template.clone();
        let vm_name = naming::replica_vm_name(scale_set, &profile.name_prefix, ordinal);
        Self {
            scale_set,
            ordinal,
            vm_name,
            profile,
            nic_names: Vec::new(),
        }
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn vm_name(&self) -> &str {
        &self.vm_name
    }

    /// Network stage: one NIC per interface slot, named and bound to its
    /// network. A profile without a network section yields no NICs.
    pub fn network_interfaces(&mut self) -> ScaleSetResult<Vec<NetworkInterface>> {
        let Some(network) = self.profile.network.as_mut() else {
            return Ok(Vec::new());
        };

        let mut nics = Vec::with_capacity(network.interfaces.len());
        for (index, iface) in network.interfaces.iter_mut().enumerate() {
            let nic_ordinal = index as u32 + 1;
            let network_name = iface
                .network_name
                .clone()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ScaleSetError::InvalidTemplate {
                    ordinal: self.ordinal,
                    stage: Stage::Network,
                    reason: format!("interface {nic_ordinal} of {} names no network", self.vm_name),
                })?;
            let name = naming::replica_nic_name(
                self.scale_set,
                &self.profile.name_prefix,
                self.ordinal,
                &network_name,
                nic_ordinal,
            );
            iface.name = Some(name.clone());
            self.nic_names.push(name.clone());
            nics.push(NetworkInterface {
                name,
                network_name,
                ..Default::default()
            });
        }
        Ok(nics)
    }

    /// Storage stage: the replica's clone of the template OS disk.
    pub fn os_disk(&mut self) -> ScaleSetResult<VirtualHardDisk> {
        let ordinal = self.ordinal;
        let storage = self
            .profile
            .storage
            .as_mut()
            .ok_or_else(|| invalid(ordinal, Stage::Storage, "profile has no storage profile"))?;
        if storage.os_disk.name.is_empty() {
            return Err(invalid(ordinal, Stage::Storage, "profile names no OS disk"));
        }

        let disk = VirtualHardDisk {
            name: naming::replica_disk_name(&self.vm_name),
            source: Some(storage.os_disk.name.clone()),
            ..Default::default()
        };
        storage.os_disk.name = disk.name.clone();
        Ok(disk)
    }

    /// OS stage: per-replica computer name, administrator inherited verbatim.
    pub fn apply_os(&mut self) -> ScaleSetResult<()> {
        let ordinal = self.ordinal;
        let os = self
            .profile
            .os
            .as_mut()
            .ok_or_else(|| invalid(ordinal, Stage::Os, "profile has no OS profile"))?;
        if os.administrator.is_none() {
            return Err(invalid(
                ordinal,
                Stage::Os,
                "profile has no administrator configuration",
            ));
        }
        os.computer_name = naming::replica_computer_name(&os.computer_name, self.ordinal);
        Ok(())
    }

    /// The fully populated compute instance.
    pub fn virtual_machine(&self) -> VirtualMachine {
        let tags = BTreeMap::from([
            (SCALE_SET_TAG.to_string(), self.scale_set.to_string()),
            (ORDINAL_TAG.to_string(), self.ordinal.to_string()),
        ]);
        VirtualMachine {
            name: self.vm_name.clone(),
            id: None,
            profile: self.profile.clone(),
            tags,
        }
    }

    pub fn into_ref(self) -> ReplicaRef {
        ReplicaRef {
            disk_name: naming::replica_disk_name(&self.vm_name),
            name: self.vm_name,
            ordinal: self.ordinal,
            nic_names: self.nic_names,
        }
    }
}

fn invalid(ordinal: u32, stage: Stage, reason: &str) -> ScaleSetError {
    ScaleSetError::InvalidTemplate {
        ordinal,
        stage,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmgrid_core::{
        InterfaceRef, NetworkProfile, OsDisk, OsProfile, StorageProfile, UserConfiguration,
    };

    fn template() -> VmProfile {
        VmProfile {
            name_prefix: "front".to_string(),
            network: Some(NetworkProfile {
                interfaces: vec![
                    InterfaceRef {
                        name: None,
                        network_name: Some("lan".to_string()),
                    },
                    InterfaceRef {
                        name: None,
                        network_name: Some("mgmt".to_string()),
                    },
                ],
            }),
            storage: Some(StorageProfile {
                os_disk: OsDisk {
                    name: "ubuntu-2404".to_string(),
                },
            }),
            os: Some(OsProfile {
                computer_name: "web".to_string(),
                os_type: Default::default(),
                administrator: Some(UserConfiguration {
                    username: "ops".to_string(),
                    password: None,
                    ssh_public_keys: vec!["ssh-ed25519 AAAA".to_string()],
                }),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn full_blueprint() {
        let template = template();
        let mut bp = ReplicaBlueprint::new("web", &template, 2);

        let nics = bp.network_interfaces().unwrap();
        let disk = bp.os_disk().unwrap();
        bp.apply_os().unwrap();
        let vm = bp.virtual_machine();

        assert_eq!(vm.name, "vm_web_front_2");
        assert_eq!(nics[0].name, "vnic_web_front_2_lan_1");
        assert_eq!(nics[0].network_name, "lan");
        assert_eq!(nics[1].name, "vnic_web_front_2_mgmt_2");
        assert_eq!(disk.name, "vhd_vm_web_front_2");
        assert_eq!(disk.source.as_deref(), Some("ubuntu-2404"));

        let os = vm.profile.os.as_ref().unwrap();
        assert_eq!(os.computer_name, "web-2");
        assert_eq!(
            os.administrator,
            template.os.as_ref().unwrap().administrator
        );
        assert_eq!(vm.profile.storage.as_ref().unwrap().os_disk.name, disk.name);
        let iface_names: Vec<_> = vm
            .profile
            .network
            .as_ref()
            .unwrap()
            .interfaces
            .iter()
            .map(|i| i.name.clone().unwrap())
            .collect();
        assert_eq!(iface_names, vec![nics[0].name.clone(), nics[1].name.clone()]);
        assert_eq!(vm.tags[SCALE_SET_TAG], "web");
        assert_eq!(vm.tags[ORDINAL_TAG], "2");

        let replica = bp.into_ref();
        assert_eq!(replica.ordinal, 2);
        assert_eq!(replica.nic_names.len(), 2);
        assert_eq!(replica.disk_name, "vhd_vm_web_front_2");
    }

    #[test]
    fn template_is_never_mutated() {
        let template = template();
        let before = template.clone();

        for ordinal in 1..=3 {
            let mut bp = ReplicaBlueprint::new("web", &template, ordinal);
            bp.network_interfaces().unwrap();
            bp.os_disk().unwrap();
            bp.apply_os().unwrap();
        }

        assert_eq!(template, before);
    }

    #[test]
    fn no_network_section_is_not_an_error() {
        let mut template = template();
        template.network = None;
        let mut bp = ReplicaBlueprint::new("web", &template, 1);

        assert!(bp.network_interfaces().unwrap().is_empty());
        assert!(bp.into_ref().nic_names.is_empty());
    }

    #[test]
    fn interface_without_network_is_invalid() {
        let mut template = template();
        template.network.as_mut().unwrap().interfaces[1].network_name = None;
        let mut bp = ReplicaBlueprint::new("web", &template, 1);

        let err = bp.network_interfaces().unwrap_err();
        assert!(matches!(
            err,
            ScaleSetError::InvalidTemplate { stage: Stage::Network, ref reason, .. }
                if reason.contains("interface 2")
        ));
    }

    #[test]
    fn missing_storage_is_invalid() {
        let mut template = template();
        template.storage = None;
        let mut bp = ReplicaBlueprint::new("web", &template, 1);

        let err = bp.os_disk().unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Storage));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn missing_administrator_is_invalid() {
        let mut template = template();
        template.os.as_mut().unwrap().administrator = None;
        let mut bp = ReplicaBlueprint::new("web", &template, 3);

        assert!(matches!(
            bp.apply_os(),
            Err(ScaleSetError::InvalidTemplate {
                ordinal: 3,
                stage: Stage::Os,
                ..
            })
        ));

        template.os = None;
        let mut bp = ReplicaBlueprint::new("web", &template, 1);
        assert_eq!(bp.apply_os().unwrap_err().stage(), Some(Stage::Os));
    }
}
