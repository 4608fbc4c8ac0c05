use std::collections::HashMap;
use std::sync::Arc;

use crate::ids::IdGenerator;
use crate::model::{
    EntityId, EntityMap, NEquipmentData, NPersonnelData, NRangeRingGroup, NUnitStatus,
};

/// Id-keyed table of named definitions, deduplicated by exact name.
///
/// The first definition registered under a name is canonical; later
/// registrations with the same name resolve to its id and are dropped.
#[derive(Debug, Clone)]
pub struct ReferenceTable<T> {
    entries: EntityMap<T>,
    by_name: HashMap<String, EntityId>,
}

impl<T> Default for ReferenceTable<T> {
    fn default() -> Self {
        Self {
            entries: EntityMap::default(),
            by_name: HashMap::new(),
        }
    }
}

impl<T> ReferenceTable<T> {
    pub fn id_for_name(&self, name: &str) -> Option<&EntityId> {
        self.by_name.get(name)
    }

    /// Return the id registered for `name`, building a new entry with `make` if absent.
    pub fn intern<F>(&mut self, ids: &mut IdGenerator, name: &str, make: F) -> EntityId
    where
        F: FnOnce(EntityId) -> T,
    {
        if let Some(existing) = self.by_name.get(name) {
            return existing.clone();
        }
        let id = ids.next_id();
        self.entries.insert(id.clone(), Arc::new(make(id.clone())));
        self.by_name.insert(name.to_string(), id.clone());
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_map(self) -> EntityMap<T> {
        self.entries
    }
}

/// The four reference tables built while normalizing one scenario.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub equipment: ReferenceTable<NEquipmentData>,
    pub personnel: ReferenceTable<NPersonnelData>,
    pub range_ring_groups: ReferenceTable<NRangeRingGroup>,
    pub unit_statuses: ReferenceTable<NUnitStatus>,
}

impl ReferenceTables {
    pub fn equipment_id(&mut self, ids: &mut IdGenerator, name: &str) -> EntityId {
        self.equipment.intern(ids, name, |id| NEquipmentData {
            id,
            name: name.to_string(),
            ..NEquipmentData::default()
        })
    }

    pub fn personnel_id(&mut self, ids: &mut IdGenerator, name: &str) -> EntityId {
        self.personnel.intern(ids, name, |id| NPersonnelData {
            id,
            name: name.to_string(),
            ..NPersonnelData::default()
        })
    }

    pub fn range_ring_group_id(&mut self, ids: &mut IdGenerator, name: &str) -> EntityId {
        self.range_ring_groups.intern(ids, name, |id| NRangeRingGroup {
            id,
            name: name.to_string(),
            ..NRangeRingGroup::default()
        })
    }

    pub fn unit_status_id(&mut self, ids: &mut IdGenerator, name: &str) -> EntityId {
        self.unit_statuses.intern(ids, name, |id| NUnitStatus {
            id,
            name: name.to_string(),
            ..NUnitStatus::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_resolves_to_same_id() {
        let mut ids = IdGenerator::seeded(11);
        let mut tables = ReferenceTables::default();
        let rifle = tables.equipment_id(&mut ids, "Rifle");
        let mortar = tables.equipment_id(&mut ids, "Mortar");
        assert_ne!(rifle, mortar);
        assert_eq!(tables.equipment_id(&mut ids, "Rifle"), rifle);
        assert_eq!(tables.equipment.len(), 2);
    }

    #[test]
    fn first_definition_wins() {
        let mut ids = IdGenerator::seeded(5);
        let mut table: ReferenceTable<NEquipmentData> = ReferenceTable::default();
        let first = table.intern(&mut ids, "Radio", |id| NEquipmentData {
            id,
            name: "Radio".into(),
            description: Some("first".into()),
            ..Default::default()
        });
        let second = table.intern(&mut ids, "Radio", |id| NEquipmentData {
            id,
            name: "Radio".into(),
            description: Some("second".into()),
            ..Default::default()
        });
        assert_eq!(first, second);
        let map = table.into_map();
        assert_eq!(map[&first].description.as_deref(), Some("first"));
    }

    #[test]
    fn empty_name_is_its_own_bucket() {
        let mut ids = IdGenerator::seeded(9);
        let mut tables = ReferenceTables::default();
        let blank = tables.unit_status_id(&mut ids, "");
        assert_eq!(tables.unit_status_id(&mut ids, ""), blank);
        assert_eq!(tables.unit_statuses.id_for_name(""), Some(&blank));
    }
}
