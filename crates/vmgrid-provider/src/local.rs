//! StoreProvider — a local agent persisting entities in the object store.

use async_trait::async_trait;
use tracing::debug;

use vmgrid_state::{ObjectStore, Record, StateResult, StateStore};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Entity, Provider};

/// Provider that realizes entities as records in a [`StateStore`] table.
///
/// Ids are assigned on first create as `/<table>/<name>` and kept across
/// updates.
pub struct StoreProvider<E> {
    objects: ObjectStore<E>,
}

impl<E: Entity + Record> StoreProvider<E> {
    pub fn new(store: &StateStore) -> StateResult<Self> {
        Ok(Self {
            objects: store.objects()?,
        })
    }
}

#[async_trait]
impl<E: Entity + Record> Provider<E> for StoreProvider<E> {
    async fn create_or_update(&self, entities: Vec<E>) -> ProviderResult<Vec<E>> {
        let mut stored = Vec::with_capacity(entities.len());
        for mut entity in entities {
            if entity.name().is_empty() {
                return Err(ProviderError::Rejected(format!("{} without a name", E::KIND)));
            }
            let existing_id = self
                .objects
                .get(entity.name())?
                .and_then(|e| e.id().map(str::to_string));
            let id = existing_id.unwrap_or_else(|| format!("/{}/{}", E::TABLE, entity.name()));
            entity.set_id(id);
            self.objects.put(&entity)?;
            debug!(kind = E::KIND, name = entity.name(), "entity stored");
            stored.push(entity);
        }
        Ok(stored)
    }

    async fn get(&self, entities: Vec<E>) -> ProviderResult<Vec<E>> {
        if entities.is_empty() {
            return Ok(self.objects.list()?);
        }
        entities
            .iter()
            .map(|wanted| {
                self.objects
                    .get(wanted.name())?
                    .ok_or_else(|| ProviderError::NotFound {
                        kind: E::KIND,
                        name: wanted.name().to_string(),
                    })
            })
            .collect()
    }

    /// Deletes every present entity, then reports the first absent one.
    async fn delete(&self, entities: Vec<E>) -> ProviderResult<()> {
        let mut missing = None;
        for entity in &entities {
            if !self.objects.delete(entity.name())? && missing.is_none() {
                missing = Some(entity.name().to_string());
            }
        }
        match missing {
            Some(name) => Err(ProviderError::NotFound { kind: E::KIND, name }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmgrid_core::{NetworkInterface, VirtualHardDisk};

    fn nic(name: &str) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            network_name: "lan".to_string(),
            ..Default::default()
        }
    }

    fn nics() -> StoreProvider<NetworkInterface> {
        StoreProvider::new(&StateStore::open_in_memory().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn create_assigns_stable_ids() {
        let provider = nics();

        let created = provider.create_or_update(vec![nic("a")]).await.unwrap();
        assert_eq!(created[0].id.as_deref(), Some("/network_interfaces/a"));

        let mut update = nic("a");
        update.ip_address = Some("10.0.0.4".to_string());
        let updated = provider.create_or_update(vec![update]).await.unwrap();
        assert_eq!(updated[0].id, created[0].id);
        assert_eq!(updated[0].ip_address.as_deref(), Some("10.0.0.4"));
    }

    #[tokio::test]
    async fn create_rejects_unnamed() {
        let provider = nics();
        let err = provider.create_or_update(vec![nic("")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[tokio::test]
    async fn get_named_and_all() {
        let provider = nics();
        provider
            .create_or_update(vec![nic("a"), nic("b")])
            .await
            .unwrap();

        let one = provider.get(vec![nic("b")]).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].name, "b");

        assert_eq!(provider.get(Vec::new()).await.unwrap().len(), 2);

        let err = provider.get(vec![nic("c")]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_removes_present_and_reports_missing() {
        let provider = nics();
        provider
            .create_or_update(vec![nic("a"), nic("b")])
            .await
            .unwrap();

        let err = provider
            .delete(vec![nic("a"), nic("ghost")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { ref name, .. } if name == "ghost"));

        let left = provider.get(Vec::new()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "b");
    }

    #[tokio::test]
    async fn providers_share_one_store() {
        let store = StateStore::open_in_memory().unwrap();
        let disks = StoreProvider::<VirtualHardDisk>::new(&store).unwrap();
        disks
            .create_or_update(vec![VirtualHardDisk {
                name: "vhd_a".to_string(),
                source: Some("ubuntu".to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();

        let view = store.objects::<VirtualHardDisk>().unwrap();
        assert_eq!(view.list_filter_many("source", "ubuntu").unwrap().len(), 1);
    }
}
