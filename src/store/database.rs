use std::path::Path;

use log::{debug, info};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::model::{Address, AddressId, CommuteSample, NewSample, Role, Route, SampleId};

use super::{AddressRegistry, SampleStore, StoreError};

const ADDRESS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("addresses");
const SAMPLE_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("commute_samples");
/// (origin, destination, day of week, hour, sample id)
const ROUTE_INDEX_TABLE: TableDefinition<(u64, u64, u8, u8, u64), ()> =
    TableDefinition::new("route_samples");
/// Highest id ever issued per record table.
const ID_COUNTER_TABLE: TableDefinition<&str, u64> = TableDefinition::new("id_counters");
const ADDRESS_COUNTER: &str = "addresses";
const SAMPLE_COUNTER: &str = "commute_samples";

/// Durable store backed by a single redb file. redb serializes write
/// transactions, which is what keeps id assignment collision free.
pub struct RedbStore {
    database: Database,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RedbStore, StoreError> {
        let path = path.as_ref();
        info!("Opening commute database at {:?}", path);
        let database = Database::create(path)?;
        {
            let write = database.begin_write()?;
            write.open_table(ADDRESS_TABLE)?;
            write.open_table(SAMPLE_TABLE)?;
            write.open_table(ROUTE_INDEX_TABLE)?;
            write.open_table(ID_COUNTER_TABLE)?;
            write.commit()?;
        }
        Ok(RedbStore { database })
    }
}

/// Issues the next id for `counter` and records it in the same transaction,
/// so an id is never handed out twice even once its row is deleted.
/// `highest_key` covers files written before the counter table existed.
fn next_id(write: &WriteTransaction, counter: &str, highest_key: u64) -> Result<u64, StoreError> {
    let mut counters = write.open_table(ID_COUNTER_TABLE)?;
    let last_issued = counters.get(counter)?.map(|guard| guard.value()).unwrap_or(0);
    let next = last_issued.max(highest_key) + 1;
    counters.insert(counter, next)?;
    Ok(next)
}

impl AddressRegistry for RedbStore {
    fn add_address(
        &self,
        label: &str,
        address: &str,
        role: Role,
    ) -> Result<Address, StoreError> {
        let write = self.database.begin_write()?;
        let address = {
            let mut table = write.open_table(ADDRESS_TABLE)?;
            let highest = table.last()?.map(|(key, _)| key.value()).unwrap_or(0);
            let id = next_id(&write, ADDRESS_COUNTER, highest)?;
            let address = Address {
                id: AddressId(id),
                label: label.to_string(),
                address: address.to_string(),
                role,
            };
            let bytes = rmp_serde::to_vec(&address)?;
            table.insert(id, bytes.as_slice())?;
            address
        };
        write.commit()?;
        debug!("Added {} address {} ({})", address.role, address.id, address.label);
        Ok(address)
    }

    fn addresses(&self, role: Option<Role>) -> Result<Vec<Address>, StoreError> {
        let read = self.database.begin_read()?;
        let table = read.open_table(ADDRESS_TABLE)?;
        let mut addresses = Vec::new();
        for entry in table.iter()? {
            let (_, bytes) = entry?;
            let address: Address = rmp_serde::from_slice(bytes.value())?;
            if role.map_or(true, |role| address.role == role) {
                addresses.push(address);
            }
        }
        Ok(addresses)
    }

    fn address(&self, id: AddressId) -> Result<Option<Address>, StoreError> {
        let read = self.database.begin_read()?;
        let table = read.open_table(ADDRESS_TABLE)?;
        if let Some(bytes) = table.get(id.0)? {
            Ok(Some(rmp_serde::from_slice(bytes.value())?))
        } else {
            Ok(None)
        }
    }

    fn delete_address(&self, id: AddressId) -> Result<bool, StoreError> {
        let write = self.database.begin_write()?;
        let existed = {
            let mut table = write.open_table(ADDRESS_TABLE)?;
            let removed = table.remove(id.0)?.is_some();
            removed
        };
        write.commit()?;
        Ok(existed)
    }
}

impl SampleStore for RedbStore {
    fn append(&self, sample: NewSample) -> Result<CommuteSample, StoreError> {
        let write = self.database.begin_write()?;
        let sample = {
            let mut samples = write.open_table(SAMPLE_TABLE)?;
            let mut index = write.open_table(ROUTE_INDEX_TABLE)?;
            let highest = samples.last()?.map(|(key, _)| key.value()).unwrap_or(0);
            let id = next_id(&write, SAMPLE_COUNTER, highest)?;
            let sample = sample.with_id(SampleId(id));
            let bytes = rmp_serde::to_vec(&sample)?;
            samples.insert(id, bytes.as_slice())?;
            index.insert(
                (
                    sample.origin_id.0,
                    sample.destination_id.0,
                    sample.slot.day_of_week,
                    sample.slot.hour,
                    id,
                ),
                (),
            )?;
            sample
        };
        write.commit()?;
        Ok(sample)
    }

    fn samples_for_route(&self, route: Route) -> Result<Vec<CommuteSample>, StoreError> {
        let read = self.database.begin_read()?;
        let samples = read.open_table(SAMPLE_TABLE)?;
        let index = read.open_table(ROUTE_INDEX_TABLE)?;
        let (origin, destination) = (route.origin.0, route.destination.0);
        let mut result = Vec::new();
        for entry in index.range(
            (origin, destination, 0u8, 0u8, 0u64)..=(origin, destination, u8::MAX, u8::MAX, u64::MAX),
        )? {
            let (key, _) = entry?;
            let (_, _, _, _, sample_id) = key.value();
            let bytes = samples
                .get(sample_id)?
                .ok_or(StoreError::DanglingIndex(sample_id))?;
            result.push(rmp_serde::from_slice(bytes.value())?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use chrono::{TimeZone, Utc};
    use tempdir::TempDir;

    use super::RedbStore;
    use crate::{
        model::{AddressId, NewSample, Role, Route, SampleId, TimeSlot},
        store::{AddressRegistry, SampleStore},
    };

    fn sample(route: Route, day_of_week: u8, hour: u8, traffic: u32) -> NewSample {
        NewSample {
            route,
            duration_seconds: traffic - 60,
            traffic_duration_seconds: traffic,
            distance_meters: 12_000,
            collected_at: Utc.with_ymd_and_hms(2024, 3, 4, hour as u32, 15, 0).unwrap(),
            slot: TimeSlot { day_of_week, hour },
        }
    }

    #[test]
    fn addresses_survive_reopen() {
        let dir = TempDir::new("commuter").unwrap();
        let path = dir.path().join("commute.db");
        {
            let store = RedbStore::open(&path).unwrap();
            store.add_address("Home", "1 Main St", Role::Origin).unwrap();
            store
                .add_address("Office", "2 Market St", Role::Destination)
                .unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        let origins = store.addresses(Some(Role::Origin)).unwrap();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].id, AddressId(1));
        assert_eq!(origins[0].address, "1 Main St");

        let office = store
            .add_address("Gym", "3 Pine St", Role::Destination)
            .unwrap();
        assert_eq!(office.id, AddressId(3));
        assert!(store.delete_address(AddressId(1)).unwrap());
        assert!(!store.delete_address(AddressId(1)).unwrap());
        assert_eq!(store.address(AddressId(1)).unwrap(), None);
        assert_eq!(store.addresses(None).unwrap().len(), 2);
    }

    #[test]
    fn deleted_address_ids_are_never_reissued() {
        let dir = TempDir::new("commuter").unwrap();
        let path = dir.path().join("commute.db");
        let old_route = {
            let store = RedbStore::open(&path).unwrap();
            let home = store.add_address("Home", "1 Main St", Role::Origin).unwrap();
            let old_job = store
                .add_address("Old job", "2 Market St", Role::Destination)
                .unwrap();
            let route = Route::new(home.id, old_job.id);
            store.append(sample(route, 0, 8, 3000)).unwrap();
            assert!(store.delete_address(old_job.id).unwrap());

            let new_job = store
                .add_address("New job", "9 Harbor Rd", Role::Destination)
                .unwrap();
            assert_eq!(new_job.id, AddressId(3));
            assert!(store
                .samples_for_route(Route::new(home.id, new_job.id))
                .unwrap()
                .is_empty());
            assert!(store.delete_address(new_job.id).unwrap());
            route
        };

        let store = RedbStore::open(&path).unwrap();
        let after_reopen = store
            .add_address("Third job", "4 Elm St", Role::Destination)
            .unwrap();
        assert_eq!(after_reopen.id, AddressId(4));
        // History of the deleted address stays under its own id.
        assert_eq!(store.samples_for_route(old_route).unwrap().len(), 1);
        assert!(store
            .samples_for_route(Route::new(old_route.origin, after_reopen.id))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn samples_are_indexed_by_route_and_slot() {
        let dir = TempDir::new("commuter").unwrap();
        let store = RedbStore::open(dir.path().join("commute.db")).unwrap();
        let route = Route::new(AddressId(1), AddressId(2));
        let reverse = Route::new(AddressId(2), AddressId(1));

        let first = store.append(sample(route, 4, 17, 1800)).unwrap();
        store.append(sample(reverse, 0, 8, 900)).unwrap();
        store.append(sample(route, 0, 8, 1200)).unwrap();

        assert_eq!(first.id, SampleId(1));
        let samples = store.samples_for_route(route).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].id, SampleId(3));
        assert_eq!(samples[0].slot, TimeSlot { day_of_week: 0, hour: 8 });
        assert_eq!(samples[1], first);
        assert!(store
            .samples_for_route(Route::new(AddressId(9), AddressId(9)))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn concurrent_appends_get_distinct_ids() {
        let dir = TempDir::new("commuter").unwrap();
        let store = Arc::new(RedbStore::open(dir.path().join("commute.db")).unwrap());
        let route = Route::new(AddressId(1), AddressId(2));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..5)
                        .map(|_| store.append(sample(route, worker, 8, 600)).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<SampleId> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert_eq!(store.samples_for_route(route).unwrap().len(), 20);
    }
}
