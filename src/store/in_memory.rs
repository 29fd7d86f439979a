use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use crate::model::{Address, AddressId, CommuteSample, NewSample, Role, Route, SampleId};

use super::{AddressRegistry, SampleStore, StoreError};

#[derive(Debug, Default)]
struct InMemoryState {
    next_address_id: u64,
    next_sample_id: u64,
    addresses: BTreeMap<AddressId, Address>,
    samples: Vec<CommuteSample>,
}

/// Volatile store for tests and dry runs. Ids start at 1 like the on-disk
/// store's.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, InMemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl AddressRegistry for InMemoryStore {
    fn add_address(
        &self,
        label: &str,
        address: &str,
        role: Role,
    ) -> Result<Address, StoreError> {
        let mut state = self.state()?;
        state.next_address_id += 1;
        let address = Address {
            id: AddressId(state.next_address_id),
            label: label.to_string(),
            address: address.to_string(),
            role,
        };
        state.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    fn addresses(&self, role: Option<Role>) -> Result<Vec<Address>, StoreError> {
        Ok(self
            .state()?
            .addresses
            .values()
            .filter(|address| role.map_or(true, |role| address.role == role))
            .cloned()
            .collect())
    }

    fn address(&self, id: AddressId) -> Result<Option<Address>, StoreError> {
        Ok(self.state()?.addresses.get(&id).cloned())
    }

    fn delete_address(&self, id: AddressId) -> Result<bool, StoreError> {
        Ok(self.state()?.addresses.remove(&id).is_some())
    }
}

impl SampleStore for InMemoryStore {
    fn append(&self, sample: NewSample) -> Result<CommuteSample, StoreError> {
        let mut state = self.state()?;
        state.next_sample_id += 1;
        let sample = sample.with_id(SampleId(state.next_sample_id));
        state.samples.push(sample.clone());
        Ok(sample)
    }

    fn samples_for_route(&self, route: Route) -> Result<Vec<CommuteSample>, StoreError> {
        let mut samples: Vec<CommuteSample> = self
            .state()?
            .samples
            .iter()
            .filter(|sample| sample.route() == route)
            .cloned()
            .collect();
        samples.sort_by_key(|sample| (sample.slot, sample.id));
        Ok(samples)
    }
}
