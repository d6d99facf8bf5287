//! The batched provider contract.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vmgrid_core::{NetworkInterface, VirtualHardDisk, VirtualMachine};
use vmgrid_state::{StateResult, StateStore};

use crate::error::{ProviderError, ProviderResult};
use crate::local::StoreProvider;

/// A resource addressed by name on a node agent.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable resource kind, used in errors and logs.
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);
}

impl Entity for VirtualMachine {
    const KIND: &'static str = "virtual machine";

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Entity for NetworkInterface {
    const KIND: &'static str = "network interface";

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Entity for VirtualHardDisk {
    const KIND: &'static str = "virtual hard disk";

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Batched CRUD over one resource kind.
///
/// All calls take a list even when the caller has a single entity.
#[async_trait]
pub trait Provider<E: Entity>: Send + Sync {
    /// Create or update every entity, returning them as the agent stored them.
    async fn create_or_update(&self, entities: Vec<E>) -> ProviderResult<Vec<E>>;

    /// Fetch the named entities. An empty list fetches everything.
    async fn get(&self, entities: Vec<E>) -> ProviderResult<Vec<E>>;

    /// Delete the named entities. `NotFound` reports that at least one was
    /// unknown; the agent may or may not have deleted the others, and callers
    /// that need them gone retry individually.
    async fn delete(&self, entities: Vec<E>) -> ProviderResult<()>;
}

pub type ComputeProvider = dyn Provider<VirtualMachine>;
pub type NetworkInterfaceProvider = dyn Provider<NetworkInterface>;
pub type DiskProvider = dyn Provider<VirtualHardDisk>;

/// The provider collaborators an orchestrator is constructed with.
#[derive(Clone)]
pub struct Providers {
    pub compute: Arc<ComputeProvider>,
    pub network: Arc<NetworkInterfaceProvider>,
    pub disk: Arc<DiskProvider>,
}

impl Providers {
    /// Local agents persisting into `store`.
    pub fn local(store: &StateStore) -> StateResult<Self> {
        Ok(Self {
            compute: Arc::new(StoreProvider::<VirtualMachine>::new(store)?),
            network: Arc::new(StoreProvider::<NetworkInterface>::new(store)?),
            disk: Arc::new(StoreProvider::<VirtualHardDisk>::new(store)?),
        })
    }
}

/// Run a provider call, failing with [`ProviderError::Timeout`] once
/// `timeout` elapses. The in-flight call is dropped on timeout.
pub async fn bounded<T, F>(timeout: Duration, operation: &'static str, call: F) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            operation,
            after: timeout,
        }),
    }
}
