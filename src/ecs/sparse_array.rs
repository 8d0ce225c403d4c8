//! Per-type component storage: one optional slot per entity index

use std::any::Any;

/// Sparse array of optional components, indexed by entity id
///
/// Slots beyond the current length read as absent. Inserting past the end
/// grows the backing vector.
#[derive(Debug, Clone)]
pub struct SparseArray<T> {
    data: Vec<Option<T>>,
}

impl<T> SparseArray<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace the component at `index`
    pub fn insert_at(&mut self, index: usize, value: T) -> &mut T {
        if index >= self.data.len() {
            self.data.resize_with(index + 1, || None);
        }
        self.data[index].insert(value)
    }

    /// Clear the slot at `index` (no-op when out of range)
    pub fn erase(&mut self, index: usize) -> Option<T> {
        self.data.get_mut(index).and_then(Option::take)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.data.get_mut(index).and_then(Option::as_mut)
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Number of slots (present or not)
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of present components
    pub fn count(&self) -> usize {
        self.data.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate present components with their index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i, v)))
    }

    /// Indices of present components
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter().map(|(i, _)| i)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T: Default> SparseArray<T> {
    /// Insert a default-constructed component at `index`
    pub fn emplace_at(&mut self, index: usize) -> &mut T {
        self.insert_at(index, T::default())
    }
}

impl<T> Default for SparseArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a component array
pub trait ComponentStorage: Any + Send {
    /// Clear the slot for `index`
    fn erase(&mut self, index: usize);
    /// Number of slots
    fn size(&self) -> usize;
    fn clear_all(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + 'static> ComponentStorage for SparseArray<T> {
    fn erase(&mut self, index: usize) {
        SparseArray::erase(self, index);
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn clear_all(&mut self) {
        self.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_grows() {
        let mut arr: SparseArray<u32> = SparseArray::new();
        arr.insert_at(5, 7);

        assert_eq!(arr.len(), 6);
        assert_eq!(arr.get(5), Some(&7));
        assert_eq!(arr.get(4), None);
        assert_eq!(arr.get(100), None);
        assert_eq!(arr.count(), 1);
    }

    #[test]
    fn test_insert_replaces() {
        let mut arr = SparseArray::new();
        arr.insert_at(0, "a");
        arr.insert_at(0, "b");
        assert_eq!(arr.get(0), Some(&"b"));
        assert_eq!(arr.count(), 1);
    }

    #[test]
    fn test_erase() {
        let mut arr = SparseArray::new();
        arr.insert_at(2, 1.5f32);

        assert_eq!(arr.erase(2), Some(1.5));
        assert!(!arr.contains(2));
        // Out of range erase is harmless
        assert_eq!(arr.erase(99), None);
    }

    #[test]
    fn test_iter_skips_holes() {
        let mut arr = SparseArray::new();
        arr.insert_at(1, 10);
        arr.insert_at(3, 30);

        let items: Vec<_> = arr.iter().map(|(i, v)| (i, *v)).collect();
        assert_eq!(items, vec![(1, 10), (3, 30)]);
    }

    #[test]
    fn test_emplace_default() {
        let mut arr: SparseArray<Vec<u8>> = SparseArray::new();
        arr.emplace_at(0).push(3);
        assert_eq!(arr.get(0), Some(&vec![3]));
    }

    #[test]
    fn test_erased_storage_downcast() {
        let mut storage: Box<dyn ComponentStorage> = Box::new(SparseArray::<u16>::new());
        storage
            .as_any_mut()
            .downcast_mut::<SparseArray<u16>>()
            .unwrap()
            .insert_at(3, 9);

        assert_eq!(storage.size(), 4);
        storage.erase(3);
        let arr = storage.as_any().downcast_ref::<SparseArray<u16>>().unwrap();
        assert!(arr.get(3).is_none());
    }
}
