//! Component registry and entity allocator
//!
//! Owns one [`SparseArray`] per component type (type-erased behind
//! [`ComponentStorage`]), hands out entity ids with FIFO recycling and keeps
//! a reverse index of the component types each live entity holds so that
//! [`Registry::kill_entity`] erases exactly those slots.
//!
//! Lookup asymmetry: the mutable accessors auto-register unknown component
//! types, while [`Registry::components`] reports
//! [`RegistryError::NotRegistered`]. A read of a type nobody ever wrote is a
//! programming mistake and surfaces loudly; writes are always allowed.

use std::any::{type_name, TypeId};
use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ecs::entity::Entity;
use crate::ecs::sparse_array::{ComponentStorage, SparseArray};

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Component type not registered: {0}")]
    NotRegistered(&'static str),
}

/// Owner of all component storage and the entity lifecycle
#[derive(Default)]
pub struct Registry {
    storages: FxHashMap<TypeId, Box<dyn ComponentStorage>>,
    /// Reverse index: entity index -> component types present
    entity_components: Vec<FxHashSet<TypeId>>,
    alive: Vec<bool>,
    dead_entities: VecDeque<usize>,
    next_entity: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backing storage for `T` (idempotent)
    pub fn register_component<T: Send + 'static>(&mut self) -> &mut SparseArray<T> {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseArray::<T>::new()))
            .as_any_mut()
            .downcast_mut::<SparseArray<T>>()
            .unwrap_or_else(|| unreachable!("storage keyed by TypeId::of::<T>()"))
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.storages.contains_key(&TypeId::of::<T>())
    }

    /// Read-only access to the array for `T`
    ///
    /// Fails when `T` was never registered.
    pub fn components<T: 'static>(&self) -> Result<&SparseArray<T>, RegistryError> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<SparseArray<T>>())
            .ok_or(RegistryError::NotRegistered(type_name::<T>()))
    }

    /// Mutable access to the array for `T`, registering it on first use
    pub fn components_mut<T: Send + 'static>(&mut self) -> &mut SparseArray<T> {
        self.register_component::<T>()
    }

    /// Allocate an entity, reusing the oldest freed id first
    pub fn spawn_entity(&mut self) -> Entity {
        let index = match self.dead_entities.pop_front() {
            Some(index) => index,
            None => {
                let index = self.next_entity;
                self.next_entity += 1;
                index
            }
        };

        if index >= self.alive.len() {
            self.alive.resize(index + 1, false);
            self.entity_components.resize_with(index + 1, FxHashSet::default);
        }
        self.alive[index] = true;
        self.entity_components[index].clear();

        Entity::new(index)
    }

    /// Handle for a raw index (no liveness check)
    #[inline]
    pub fn entity_from_index(&self, index: usize) -> Entity {
        Entity::new(index)
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Number of live entities
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Destroy an entity: erase its components and queue its id for reuse
    ///
    /// Killing a dead or unknown entity is a no-op.
    pub fn kill_entity(&mut self, entity: Entity) {
        let index = entity.index();
        if !self.is_alive(entity) {
            return;
        }

        let types = std::mem::take(&mut self.entity_components[index]);
        for type_id in types {
            if let Some(storage) = self.storages.get_mut(&type_id) {
                storage.erase(index);
            }
        }

        self.alive[index] = false;
        self.dead_entities.push_back(index);
    }

    /// Insert or replace component `T` on `entity`
    ///
    /// Dead entities are left untouched and yield `None`.
    pub fn add_component<T: Send + 'static>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        let index = entity.index();
        self.entity_components[index].insert(TypeId::of::<T>());
        Some(self.register_component::<T>().insert_at(index, value))
    }

    /// Insert a default `T` on `entity`
    pub fn emplace_component<T: Default + Send + 'static>(
        &mut self,
        entity: Entity,
    ) -> Option<&mut T> {
        self.add_component(entity, T::default())
    }

    /// Remove component `T` from `entity`
    pub fn remove_component<T: Send + 'static>(&mut self, entity: Entity) -> Option<T> {
        let index = entity.index();
        if let Some(types) = self.entity_components.get_mut(index) {
            types.remove(&TypeId::of::<T>());
        }
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<SparseArray<T>>())
            .and_then(|arr| arr.erase(index))
    }

    /// O(1) presence check against the reverse index
    #[inline]
    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.entity_components
            .get(entity.index())
            .map(|types| types.contains(&TypeId::of::<T>()))
            .unwrap_or(false)
    }

    /// Component `T` of `entity`, absent when unregistered or not present
    #[inline]
    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        self.components::<T>().ok()?.get(entity.index())
    }

    #[inline]
    pub fn get_mut<T: Send + 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<SparseArray<T>>()?
            .get_mut(entity.index())
    }

    /// Entities holding `A`
    pub fn view<A: 'static>(&self) -> Vec<Entity> {
        match self.components::<A>() {
            Ok(a) => a.indices().map(Entity::new).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Entities holding both `A` and `B`
    ///
    /// Returned as an owned list so callers may spawn or kill while walking it.
    pub fn join2<A: 'static, B: 'static>(&self) -> Vec<Entity> {
        let (Ok(a), Ok(b)) = (self.components::<A>(), self.components::<B>()) else {
            return Vec::new();
        };
        a.indices()
            .take_while(|&i| i < b.len())
            .filter(|&i| b.contains(i))
            .map(Entity::new)
            .collect()
    }

    /// Entities holding `A`, `B` and `C`
    pub fn join3<A: 'static, B: 'static, C: 'static>(&self) -> Vec<Entity> {
        let (Ok(a), Ok(b), Ok(c)) = (
            self.components::<A>(),
            self.components::<B>(),
            self.components::<C>(),
        ) else {
            return Vec::new();
        };
        a.indices()
            .take_while(|&i| i < b.len() && i < c.len())
            .filter(|&i| b.contains(i) && c.contains(i))
            .map(Entity::new)
            .collect()
    }

    /// Kill every live entity and forget all ids
    pub fn clear(&mut self) {
        for storage in self.storages.values_mut() {
            storage.clear_all();
        }
        self.entity_components.clear();
        self.alive.clear();
        self.dead_entities.clear();
        self.next_entity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Pos(f32);
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Vel(f32);
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Hp(i32);
    struct NeverUsed;

    #[test]
    fn test_spawn_monotonic() {
        let mut reg = Registry::new();
        let ids: Vec<usize> = (0..4).map(|_| reg.spawn_entity().index()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(reg.alive_count(), 4);
    }

    #[test]
    fn test_id_reuse_fifo() {
        let mut reg = Registry::new();
        let entities: Vec<Entity> = (0..6).map(|_| reg.spawn_entity()).collect();

        reg.kill_entity(entities[4]);
        reg.kill_entity(entities[1]);
        reg.kill_entity(entities[2]);

        // Freed ids come back in kill order
        assert_eq!(reg.spawn_entity().index(), 4);
        assert_eq!(reg.spawn_entity().index(), 1);
        assert_eq!(reg.spawn_entity().index(), 2);
        // Then monotonic growth resumes
        assert_eq!(reg.spawn_entity().index(), 6);
    }

    #[test]
    fn test_has_matches_get() {
        let mut reg = Registry::new();
        let e = reg.spawn_entity();
        reg.add_component(e, Pos(1.0));

        assert!(reg.has::<Pos>(e));
        assert_eq!(reg.get::<Pos>(e), Some(&Pos(1.0)));
        assert!(!reg.has::<Vel>(e));
        assert!(reg.get::<Vel>(e).is_none());

        reg.remove_component::<Pos>(e);
        assert!(!reg.has::<Pos>(e));
        assert!(reg.get::<Pos>(e).is_none());
    }

    #[test]
    fn test_kill_clears_components() {
        let mut reg = Registry::new();
        let e = reg.spawn_entity();
        reg.add_component(e, Pos(1.0));
        reg.add_component(e, Vel(2.0));
        reg.add_component(e, Hp(3));

        reg.kill_entity(e);

        assert!(!reg.has::<Pos>(e));
        assert!(!reg.has::<Vel>(e));
        assert!(!reg.has::<Hp>(e));
        assert!(reg.get::<Pos>(e).is_none());

        // Reused slot starts empty
        let reused = reg.spawn_entity();
        assert_eq!(reused, e);
        assert!(reg.get::<Vel>(reused).is_none());
        assert!(!reg.has::<Hp>(reused));
    }

    #[test]
    fn test_add_to_dead_entity_is_ignored() {
        let mut reg = Registry::new();
        let e = reg.spawn_entity();
        reg.kill_entity(e);

        assert!(reg.add_component(e, Pos(1.0)).is_none());
        assert!(reg.emplace_component::<Vel>(e).is_none());
        assert!(reg.add_component(Entity::new(42), Hp(1)).is_none());

        let reused = reg.spawn_entity();
        assert_eq!(reused, e);
        assert_eq!(reg.has::<Pos>(reused), reg.get::<Pos>(reused).is_some());
        assert!(reg.get::<Pos>(reused).is_none());
        assert!(reg.get::<Vel>(reused).is_none());
        assert!(reg.view::<Pos>().is_empty());
    }

    #[test]
    fn test_kill_twice_is_noop() {
        let mut reg = Registry::new();
        let e = reg.spawn_entity();
        reg.kill_entity(e);
        reg.kill_entity(e);
        reg.kill_entity(Entity::new(500));

        // Only one copy of the id went back into the pool
        assert_eq!(reg.spawn_entity().index(), 0);
        assert_eq!(reg.spawn_entity().index(), 1);
    }

    #[test]
    fn test_unregistered_const_access_fails() {
        let reg = Registry::new();
        let result = reg.components::<NeverUsed>();
        assert!(matches!(result, Err(RegistryError::NotRegistered(_))));
    }

    #[test]
    fn test_mut_access_auto_registers() {
        let mut reg = Registry::new();
        assert!(!reg.is_registered::<Hp>());
        reg.components_mut::<Hp>();
        assert!(reg.is_registered::<Hp>());
        assert!(reg.components::<Hp>().is_ok());
    }

    #[test]
    fn test_add_replaces() {
        let mut reg = Registry::new();
        let e = reg.spawn_entity();
        reg.add_component(e, Hp(10));
        reg.add_component(e, Hp(4));
        assert_eq!(reg.get::<Hp>(e), Some(&Hp(4)));

        reg.emplace_component::<Vel>(e);
        assert_eq!(reg.get::<Vel>(e), Some(&Vel(0.0)));
    }

    #[test]
    fn test_storage_grows_past_registration() {
        let mut reg = Registry::new();
        reg.register_component::<Pos>();
        let mut last = reg.spawn_entity();
        for _ in 0..1000 {
            last = reg.spawn_entity();
        }
        reg.add_component(last, Pos(9.0));
        assert_eq!(reg.get::<Pos>(last), Some(&Pos(9.0)));
    }

    #[test]
    fn test_join_skips_missing() {
        let mut reg = Registry::new();
        let a = reg.spawn_entity();
        let b = reg.spawn_entity();
        let c = reg.spawn_entity();
        reg.add_component(a, Pos(0.0));
        reg.add_component(a, Vel(0.0));
        reg.add_component(b, Pos(0.0));
        reg.add_component(c, Pos(0.0));
        reg.add_component(c, Vel(0.0));
        reg.add_component(c, Hp(1));

        assert_eq!(reg.join2::<Pos, Vel>(), vec![a, c]);
        assert_eq!(reg.join3::<Pos, Vel, Hp>(), vec![c]);
        assert!(reg.join2::<Pos, NeverUsed>().is_empty());
    }

    #[test]
    fn test_join_survives_mutation() {
        let mut reg = Registry::new();
        for _ in 0..3 {
            let e = reg.spawn_entity();
            reg.add_component(e, Pos(0.0));
            reg.add_component(e, Vel(1.0));
        }

        for e in reg.join2::<Pos, Vel>() {
            reg.kill_entity(e);
            let spawned = reg.spawn_entity();
            reg.add_component(spawned, Pos(5.0));
        }

        assert_eq!(reg.alive_count(), 3);
        assert!(reg.join2::<Pos, Vel>().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut reg = Registry::new();
        let e = reg.spawn_entity();
        reg.add_component(e, Pos(1.0));
        reg.clear();

        assert_eq!(reg.alive_count(), 0);
        assert_eq!(reg.spawn_entity().index(), 0);
        assert!(reg.get::<Pos>(e).is_none());
    }
}
