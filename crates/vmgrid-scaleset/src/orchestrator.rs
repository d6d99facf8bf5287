//! ScaleSetOrchestrator — turns scale-set definitions into replica VMs.
//!
//! Per named scale set the orchestrator moves through
//! `Absent → Provisioning(k of n) → Settled(n of n) → Deleting → Absent`.
//! The `Provisioning` record is only a claim on the name (and, for a
//! scale-up, on the record): the replica list is written once every replica
//! of the invocation has been provisioned, together with `Settled`.
//!
//! Replicas are provisioned strictly one after another, and within a replica
//! stage by stage (network, storage, os, compute), so ordinal `i` never
//! starts before `i - 1` completes. The first failure stops the loop and
//! rolls back everything this invocation created.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use vmgrid_core::config::DEFAULT_PROVIDER_TIMEOUT;
use vmgrid_core::{
    NetworkInterface, ReplicaRef, ScaleSetDefinition, ScaleSetPhase, ScaleSetRecord,
    VirtualHardDisk, VirtualMachine, VmProfile,
};
use vmgrid_provider::{Entity, Provider, ProviderResult, Providers, bounded};
use vmgrid_state::{ObjectStore, StateError, StateStore};

use crate::error::{ScaleSetError, ScaleSetResult, Stage};
use crate::replica::ReplicaBlueprint;
use crate::saga::{Compensation, Saga};

/// Store field scale sets are unique on.
const NAME_FIELD: &str = "name";

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Bound on each provider call. `None` uses the orchestrator default.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

pub struct ScaleSetOrchestrator {
    providers: Providers,
    records: ObjectStore<ScaleSetRecord>,
    default_timeout: Duration,
}

impl ScaleSetOrchestrator {
    pub fn new(providers: Providers, store: &StateStore) -> ScaleSetResult<Self> {
        Ok(Self {
            providers,
            records: store.objects()?,
            default_timeout: DEFAULT_PROVIDER_TIMEOUT,
        })
    }

    /// Override the provider call timeout used when a request sets none.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Create a scale set and all of its replicas.
    ///
    /// The name is claimed with a `Provisioning` record before any provider
    /// call, so a concurrent create for the same name fails with
    /// `AlreadyExists` without touching the replicas it would collide with.
    /// On any provisioning failure the partially created replicas are rolled
    /// back, the claim is released, and the original error is returned.
    pub async fn create(
        &self,
        definition: &ScaleSetDefinition,
        opts: RequestOptions,
    ) -> ScaleSetResult<ScaleSetRecord> {
        let template = validate(definition)?;
        if definition.capacity == 0 {
            return Err(ScaleSetError::InvalidInput(format!(
                "scale set {} needs a capacity of at least 1",
                definition.name
            )));
        }

        let now = epoch_secs();
        let claim = ScaleSetRecord {
            id: ScaleSetRecord::new_id(),
            name: definition.name.clone(),
            phase: ScaleSetPhase::Provisioning,
            capacity: definition.capacity,
            profile: template.clone(),
            replicas: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = self.records.insert_if_absent(NAME_FIELD, &claim) {
            return Err(match e {
                StateError::Conflict { .. } => ScaleSetError::AlreadyExists(claim.name),
                other => other.into(),
            });
        }

        let timeout = self.timeout(opts);
        info!(
            scale_set = %claim.name,
            id = %claim.id,
            capacity = claim.capacity,
            "creating scale set"
        );

        let mut saga = Saga::new();
        let outcome = self
            .create_replicas(&claim.name, template, 1, claim.capacity, timeout, &mut saga)
            .await;
        let replicas = match outcome {
            Ok(replicas) => replicas,
            Err(e) => {
                warn!(scale_set = %claim.name, error = %e, "create failed, rolling back");
                saga.compensate(&claim.name, &self.providers, timeout).await;
                self.release(&claim);
                return Err(e);
            }
        };

        let record = ScaleSetRecord {
            phase: ScaleSetPhase::Settled,
            replicas,
            updated_at: epoch_secs(),
            ..claim.clone()
        };
        if let Err(e) = self.records.replace(&claim, &record) {
            warn!(scale_set = %record.name, error = %e, "claim lost, rolling back");
            saga.compensate(&record.name, &self.providers, timeout).await;
            return Err(settle_error(&record.name, e));
        }

        info!(scale_set = %record.name, replicas = record.replicas.len(), "scale set created");
        Ok(record)
    }

    /// Scale an existing scale set to `definition.capacity`.
    ///
    /// Equal capacity is a no-op. Growth provisions ordinals
    /// `current + 1 ..= target` and appends them; existing replicas are left
    /// untouched, including on rollback. Shrinking is rejected.
    ///
    /// New replicas are derived from `definition.profile` when given (which
    /// then becomes the stored template), otherwise from the stored template.
    /// The record is held in `Provisioning` while new replicas are created.
    pub async fn update(
        &self,
        name: &str,
        definition: &ScaleSetDefinition,
        opts: RequestOptions,
    ) -> ScaleSetResult<ScaleSetRecord> {
        if definition.name != name {
            return Err(ScaleSetError::InvalidInput(format!(
                "definition names scale set {:?}, not {name:?}",
                definition.name
            )));
        }
        let record = self.settled(name)?;
        let target = definition.capacity;

        if target == record.capacity {
            debug!(scale_set = %name, capacity = target, "already at capacity");
            return Ok(record);
        }
        if target < record.capacity {
            return Err(ScaleSetError::InvalidInput(format!(
                "scale set {name}: scaling down from {} to {target} is not supported",
                record.capacity
            )));
        }

        let template = match definition.profile {
            Some(_) => validate(definition)?.clone(),
            None => record.profile.clone(),
        };

        let claim = ScaleSetRecord {
            phase: ScaleSetPhase::Provisioning,
            capacity: target,
            ..record.clone()
        };
        if let Err(e) = self.records.replace(&record, &claim) {
            return Err(settle_error(name, e));
        }

        let timeout = self.timeout(opts);
        let first = record.capacity + 1;
        info!(scale_set = %name, from = record.capacity, to = target, "scaling up");

        let mut saga = Saga::new();
        let outcome = self
            .create_replicas(name, &template, first, target, timeout, &mut saga)
            .await;
        let added = match outcome {
            Ok(added) => added,
            Err(e) => {
                warn!(scale_set = %name, error = %e, "scale-up failed, rolling back new replicas");
                saga.compensate(name, &self.providers, timeout).await;
                if let Err(restore) = self.records.replace(&claim, &record) {
                    warn!(scale_set = %name, error = %restore, "could not restore record");
                }
                return Err(e);
            }
        };

        let mut updated = claim.clone();
        updated.phase = ScaleSetPhase::Settled;
        updated.replicas.extend(added);
        updated.profile = template;
        updated.updated_at = epoch_secs();
        if let Err(e) = self.records.replace(&claim, &updated) {
            warn!(scale_set = %name, error = %e, "claim lost, rolling back new replicas");
            saga.compensate(name, &self.providers, timeout).await;
            return Err(settle_error(name, e));
        }

        info!(scale_set = %name, capacity = target, "scale set updated");
        Ok(updated)
    }

    /// Scale to `capacity` using the stored template.
    pub async fn scale(
        &self,
        name: &str,
        capacity: u32,
        opts: RequestOptions,
    ) -> ScaleSetResult<ScaleSetRecord> {
        let definition = ScaleSetDefinition {
            name: name.to_string(),
            capacity,
            profile: None,
        };
        self.update(name, &definition, opts).await
    }

    /// All scale sets when `name` is empty, otherwise the named one.
    pub fn get(&self, name: &str) -> ScaleSetResult<Vec<ScaleSetRecord>> {
        if name.is_empty() {
            return Ok(self.records.list()?);
        }
        Ok(vec![self.lookup(name)?])
    }

    /// Tear down every replica (compute, then NICs, then cloned disks) and
    /// remove the record.
    ///
    /// Resources the agents no longer know count as deleted. Any other
    /// provider failure aborts with `Teardown` and keeps the record, so the
    /// delete can be retried.
    pub async fn delete(&self, name: &str, opts: RequestOptions) -> ScaleSetResult<()> {
        let record = self.settled(name)?;
        let timeout = self.timeout(opts);
        info!(scale_set = %name, replicas = record.replicas.len(), "deleting scale set");

        let vms = record
            .replicas
            .iter()
            .map(|r| VirtualMachine {
                name: r.name.clone(),
                ..Default::default()
            })
            .collect();
        teardown(self.providers.compute.as_ref(), vms, Stage::Compute, timeout).await?;

        let nics = record
            .nic_names()
            .map(|n| NetworkInterface {
                name: n.to_string(),
                ..Default::default()
            })
            .collect();
        teardown(self.providers.network.as_ref(), nics, Stage::Network, timeout).await?;

        let disks = record
            .replicas
            .iter()
            .map(|r| VirtualHardDisk {
                name: r.disk_name.clone(),
                ..Default::default()
            })
            .collect();
        teardown(self.providers.disk.as_ref(), disks, Stage::Storage, timeout).await?;

        self.records.delete(&record.id)?;
        info!(scale_set = %name, "scale set deleted");
        Ok(())
    }

    /// Live replica VMs as reported by the compute provider.
    pub async fn replicas(
        &self,
        name: &str,
        opts: RequestOptions,
    ) -> ScaleSetResult<Vec<VirtualMachine>> {
        let record = self.lookup(name)?;
        if record.replicas.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = record
            .replicas
            .iter()
            .map(|r| VirtualMachine {
                name: r.name.clone(),
                ..Default::default()
            })
            .collect();
        let vms = bounded(self.timeout(opts), "get", self.providers.compute.get(wanted)).await?;
        Ok(vms)
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Provision ordinals `first..=last` in order, registering every forward
    /// call with `saga`. Stops at the first failure.
    async fn create_replicas(
        &self,
        scale_set: &str,
        template: &VmProfile,
        first: u32,
        last: u32,
        timeout: Duration,
        saga: &mut Saga,
    ) -> ScaleSetResult<Vec<ReplicaRef>> {
        let mut created = Vec::new();
        for ordinal in first..=last {
            let replica = self
                .create_replica(ReplicaBlueprint::new(scale_set, template, ordinal), timeout, saga)
                .await?;
            created.push(replica);
        }
        Ok(created)
    }

    async fn create_replica(
        &self,
        mut blueprint: ReplicaBlueprint<'_>,
        timeout: Duration,
        saga: &mut Saga,
    ) -> ScaleSetResult<ReplicaRef> {
        let ordinal = blueprint.ordinal();
        debug!(vm = blueprint.vm_name(), ordinal, "provisioning replica");

        for nic in blueprint.network_interfaces()? {
            saga.record(Compensation::Network(nic.clone()));
            submit(self.providers.network.as_ref(), nic, Stage::Network, ordinal, timeout).await?;
        }

        let disk = blueprint.os_disk()?;
        saga.record(Compensation::Disk(disk.clone()));
        submit(self.providers.disk.as_ref(), disk, Stage::Storage, ordinal, timeout).await?;

        blueprint.apply_os()?;

        let vm = blueprint.virtual_machine();
        saga.record(Compensation::Compute(vm.clone()));
        submit(self.providers.compute.as_ref(), vm, Stage::Compute, ordinal, timeout).await?;

        debug!(
            vm = blueprint.vm_name(),
            ordinal,
            compensations = saga.len(),
            "replica provisioned"
        );
        Ok(blueprint.into_ref())
    }

    fn find(&self, name: &str) -> ScaleSetResult<Option<ScaleSetRecord>> {
        Ok(self.records.list_filter(NAME_FIELD, name)?)
    }

    fn lookup(&self, name: &str) -> ScaleSetResult<ScaleSetRecord> {
        self.find(name)?
            .ok_or_else(|| ScaleSetError::NotFound(name.to_string()))
    }

    /// Like `lookup`, but refuses a scale set another request is provisioning.
    fn settled(&self, name: &str) -> ScaleSetResult<ScaleSetRecord> {
        let record = self.lookup(name)?;
        if record.phase == ScaleSetPhase::Provisioning {
            return Err(ScaleSetError::Busy(name.to_string()));
        }
        Ok(record)
    }

    /// Drop a create's claim after rollback.
    fn release(&self, claim: &ScaleSetRecord) {
        if let Err(e) = self.records.delete(&claim.id) {
            warn!(scale_set = %claim.name, error = %e, "could not release name claim");
        }
    }

    fn timeout(&self, opts: RequestOptions) -> Duration {
        opts.timeout.unwrap_or(self.default_timeout)
    }
}

/// Structural checks that need no provider round trip.
fn validate(definition: &ScaleSetDefinition) -> ScaleSetResult<&VmProfile> {
    if definition.name.is_empty() {
        return Err(ScaleSetError::InvalidInput("scale set has no name".to_string()));
    }
    definition.profile.as_ref().ok_or_else(|| {
        ScaleSetError::InvalidInput(format!("scale set {} has no VM profile", definition.name))
    })
}

/// A claim that changed underneath us means another request got there first.
fn settle_error(name: &str, e: StateError) -> ScaleSetError {
    match e {
        StateError::Stale(_) => ScaleSetError::Busy(name.to_string()),
        other => other.into(),
    }
}

async fn submit<E: Entity>(
    provider: &dyn Provider<E>,
    entity: E,
    stage: Stage,
    ordinal: u32,
    timeout: Duration,
) -> ScaleSetResult<()> {
    let name = entity.name().to_string();
    let result: ProviderResult<Vec<E>> =
        bounded(timeout, "create_or_update", provider.create_or_update(vec![entity])).await;
    match result {
        Ok(_) => {
            debug!(kind = E::KIND, %name, %stage, "created");
            Ok(())
        }
        Err(source) => Err(ScaleSetError::Stage {
            ordinal,
            stage,
            source,
        }),
    }
}

/// Delete one batch. When the agent reports an entity missing, the rest of
/// the batch is retried one entity at a time, so an agent that stops at the
/// first unknown name cannot leak the ones behind it.
async fn teardown<E: Entity>(
    provider: &dyn Provider<E>,
    entities: Vec<E>,
    stage: Stage,
    timeout: Duration,
) -> ScaleSetResult<()> {
    if entities.is_empty() {
        return Ok(());
    }
    let count = entities.len();
    let retry = (count > 1).then(|| entities.clone());
    match bounded(timeout, "delete", provider.delete(entities)).await {
        Ok(()) => {
            debug!(kind = E::KIND, count, "deleted");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            let Some(entities) = retry else {
                debug!(kind = E::KIND, error = %e, "already gone");
                return Ok(());
            };
            debug!(kind = E::KIND, count, error = %e, "batch hit a missing entity, deleting one by one");
            for entity in entities {
                match bounded(timeout, "delete", provider.delete(vec![entity])).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => debug!(kind = E::KIND, error = %e, "already gone"),
                    Err(source) => return Err(ScaleSetError::Teardown { stage, source }),
                }
            }
            Ok(())
        }
        Err(source) => Err(ScaleSetError::Teardown { stage, source }),
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(profile: Option<VmProfile>) -> ScaleSetDefinition {
        ScaleSetDefinition {
            name: "web".to_string(),
            capacity: 1,
            profile,
        }
    }

    #[test]
    fn validate_requires_profile() {
        let err = validate(&definition(None)).unwrap_err();
        assert!(matches!(err, ScaleSetError::InvalidInput(_)));
    }

    #[test]
    fn validate_requires_name() {
        let mut def = definition(Some(VmProfile::default()));
        def.name.clear();
        assert!(matches!(validate(&def), Err(ScaleSetError::InvalidInput(_))));
    }

    #[test]
    fn validate_returns_template() {
        let def = definition(Some(VmProfile {
            name_prefix: "p".to_string(),
            ..Default::default()
        }));
        assert_eq!(validate(&def).unwrap().name_prefix, "p");
    }

    #[test]
    fn lost_claims_surface_as_busy() {
        let err = settle_error("web", StateError::Stale("id".to_string()));
        assert!(matches!(err, ScaleSetError::Busy(ref n) if n == "web"));

        let err = settle_error("web", StateError::Write("disk full".to_string()));
        assert!(matches!(err, ScaleSetError::State(StateError::Write(_))));
    }

    #[test]
    fn request_timeout_falls_back_to_default() {
        let store = StateStore::open_in_memory().unwrap();
        let orch = ScaleSetOrchestrator::new(Providers::local(&store).unwrap(), &store)
            .unwrap()
            .with_default_timeout(Duration::from_secs(5));

        assert_eq!(orch.timeout(RequestOptions::default()), Duration::from_secs(5));
        assert_eq!(
            orch.timeout(RequestOptions::with_timeout(Duration::from_secs(1))),
            Duration::from_secs(1)
        );
    }
}
