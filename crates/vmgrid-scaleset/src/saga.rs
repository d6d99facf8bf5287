//! Compensation log for multi-resource provisioning.
//!
//! Every forward provider call registers its compensating delete *before*
//! it is issued, so a call that failed or timed out after the agent acted
//! is still undone. On failure the log is replayed newest-first. Each
//! compensation is best effort: failures are logged and counted, never
//! returned.

use std::time::Duration;

use tracing::{debug, info, warn};

use vmgrid_core::{NetworkInterface, VirtualHardDisk, VirtualMachine};
use vmgrid_provider::{Entity, Provider, ProviderError, ProviderResult, Providers, bounded};

/// A compensating action: delete one resource.
#[derive(Debug, Clone)]
pub(crate) enum Compensation {
    Compute(VirtualMachine),
    Network(NetworkInterface),
    Disk(VirtualHardDisk),
}

#[derive(Debug, Default)]
pub(crate) struct Saga {
    steps: Vec<Compensation>,
}

impl Saga {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Replay compensations in reverse order. Returns how many failed.
    pub async fn compensate(self, scale_set: &str, providers: &Providers, timeout: Duration) -> usize {
        let total = self.steps.len();
        let mut failed = 0;
        for step in self.steps.into_iter().rev() {
            let outcome = match step {
                Compensation::Compute(vm) => undo(providers.compute.as_ref(), vm, timeout).await,
                Compensation::Network(nic) => undo(providers.network.as_ref(), nic, timeout).await,
                Compensation::Disk(disk) => undo(providers.disk.as_ref(), disk, timeout).await,
            };
            if let Err((kind, name, e)) = outcome {
                failed += 1;
                warn!(scale_set, kind, %name, error = %e, "compensation failed, resource may leak");
            }
        }
        info!(scale_set, total, failed, "rollback finished");
        failed
    }
}

async fn undo<E: Entity>(
    provider: &dyn Provider<E>,
    entity: E,
    timeout: Duration,
) -> Result<(), (&'static str, String, ProviderError)> {
    let name = entity.name().to_string();
    let result: ProviderResult<()> = bounded(timeout, "delete", provider.delete(vec![entity])).await;
    match result {
        Ok(()) => {
            debug!(kind = E::KIND, %name, "compensated");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(kind = E::KIND, %name, "nothing to compensate");
            Ok(())
        }
        Err(e) => Err((E::KIND, name, e)),
    }
}
