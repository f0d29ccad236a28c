use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Slot index with generation tracking to prevent stale references.
///
/// The type parameter only tags which arena the handle belongs to, so an
/// entity handle can never be used to look up a collider.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

/// Generational arena that hands out stable handles while preventing use-after-free.
///
/// Freed slots are reused in FIFO order; iteration always follows slot order.
pub struct Arena<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free_list.pop_front() {
            self.items[index] = Some(item);
            return Handle::new(index as u32, self.generations[index]);
        }

        let index = self.items.len();
        self.items.push(Some(item));
        self.generations.push(0);
        Handle::new(index as u32, 0)
    }

    /// Handle that the next call to [`Arena::insert`] will return.
    pub fn next_handle(&self) -> Handle<T> {
        match self.free_list.front() {
            Some(&index) => Handle::new(index as u32, self.generations[index]),
            None => Handle::new(self.items.len() as u32, 0),
        }
    }

    pub fn contains(&self, id: Handle<T>) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: Handle<T>) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.index()).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: Handle<T>) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.index()).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    /// Borrows two distinct live items mutably, in argument order.
    pub fn get2_mut(&mut self, id_a: Handle<T>, id_b: Handle<T>) -> Option<(&mut T, &mut T)> {
        if id_a.index() == id_b.index() {
            return None;
        }

        if !self.is_valid(id_a) || !self.is_valid(id_b) {
            return None;
        }

        let (first, second, flipped) = if id_a.index() < id_b.index() {
            (id_a, id_b, false)
        } else {
            (id_b, id_a, true)
        };

        let (left, right) = self.items.split_at_mut(second.index());
        let first_slot = left.get_mut(first.index()).and_then(|slot| slot.as_mut())?;
        let second_slot = right.get_mut(0).and_then(|slot| slot.as_mut())?;

        if flipped {
            Some((second_slot, first_slot))
        } else {
            Some((first_slot, second_slot))
        }
    }

    pub fn remove(&mut self, id: Handle<T>) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let slot = self.items.get_mut(id.index())?;
        let item = slot.take()?;
        self.generations[id.index()] = self.generations[id.index()].wrapping_add(1);
        self.free_list.push_back(id.index());
        self.len -= 1;
        Some(item)
    }

    pub fn clear(&mut self) {
        let ids: Vec<_> = self.ids().collect();
        for id in ids {
            self.remove(id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|item| (Handle::new(index as u32, self.generations[index]), item))
        })
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.items.iter_mut().filter_map(|slot| slot.as_mut())
    }

    #[cfg(feature = "parallel")]
    pub fn par_values_mut(&mut self) -> impl rayon::iter::ParallelIterator<Item = &mut T> + '_
    where
        T: Send,
    {
        use rayon::prelude::*;
        self.items.par_iter_mut().filter_map(|slot| slot.as_mut())
    }

    pub fn ids(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        self.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_valid(&self, id: Handle<T>) -> bool {
        self.generations
            .get(id.index())
            .map(|generation| *generation == id.generation())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_is_rejected_after_slot_reuse() {
        let mut arena = Arena::new();
        let first = arena.insert("a");
        assert_eq!(arena.remove(first), Some("a"));

        let second = arena.insert("b");
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&"b"));
        assert_eq!(arena.remove(first), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn get2_mut_returns_items_in_argument_order() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);

        let (right, left) = arena.get2_mut(b, a).expect("distinct live handles");
        assert_eq!((*right, *left), (2, 1));
        assert!(arena.get2_mut(a, a).is_none());
    }

    #[test]
    fn next_handle_predicts_insert() {
        let mut arena = Arena::new();
        let removed = arena.insert(1);
        arena.insert(2);
        arena.remove(removed);

        let predicted = arena.next_handle();
        assert_eq!(arena.insert(3), predicted);
        assert_eq!(arena.next_handle().index(), 2);
    }
}
