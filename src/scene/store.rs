use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::naming;

/// Stable index into a [`DataStore`]. Never reused after removal.
pub trait DataId: Copy + Eq + Ord + Hash + fmt::Debug {
	fn from_index(index: usize) -> Self;
	fn index(self) -> usize;
}

macro_rules! data_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
		pub struct $name(pub(crate) usize);

		impl $crate::scene::store::DataId for $name {
			fn from_index(index: usize) -> Self {
				Self(index)
			}

			fn index(self) -> usize {
				self.0
			}
		}
	};
}

pub(crate) use data_id;

/// A named block living in a [`DataStore`].
pub trait DataBlock {
	fn name(&self) -> &str;
	fn name_mut(&mut self) -> &mut String;
}

macro_rules! impl_data_block {
	($t:ty) => {
		impl $crate::scene::store::DataBlock for $t {
			fn name(&self) -> &str {
				&self.name
			}

			fn name_mut(&mut self) -> &mut String {
				&mut self.name
			}
		}
	};
}

pub(crate) use impl_data_block;

/// Name-unique storage of one kind of data-block.
///
/// Removed blocks leave a tombstone, so ids of live blocks stay valid.
pub struct DataStore<I, T> {
	slots: Vec<Option<T>>,
	_id: PhantomData<I>,
}

impl<I: DataId, T: DataBlock> DataStore<I, T> {
	pub fn new() -> Self {
		Self {
			slots: Vec::new(),
			_id: PhantomData,
		}
	}

	/// Adds a block, renaming it to `base.NNN` if its name is taken.
	pub fn insert(&mut self, mut block: T) -> I {
		let name = self.unique_name(block.name(), None);
		*block.name_mut() = name;
		self.slots.push(Some(block));
		I::from_index(self.slots.len() - 1)
	}

	pub fn get(&self, id: I) -> Option<&T> {
		self.slots.get(id.index())?.as_ref()
	}

	pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
		self.slots.get_mut(id.index())?.as_mut()
	}

	pub fn contains(&self, id: I) -> bool {
		self.get(id).is_some()
	}

	pub fn remove(&mut self, id: I) -> Option<T> {
		self.slots.get_mut(id.index())?.take()
	}

	/// Number of live blocks.
	pub fn len(&self) -> usize {
		self.slots.iter().filter(|slot| slot.is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Live blocks in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
		(self.slots.iter().enumerate()).filter_map(|(i, slot)| slot.as_ref().map(|block| (I::from_index(i), block)))
	}

	pub fn ids(&self) -> Vec<I> {
		self.iter().map(|(id, _)| id).collect()
	}

	/// Exact name lookup.
	pub fn find(&self, name: &str) -> Option<I> {
		self.iter().find(|(_, block)| block.name() == name).map(|(id, _)| id)
	}

	/// The alphabetically first block whose name starts with `prefix`.
	pub fn find_by_prefix(&self, prefix: &str) -> Option<I> {
		(self.iter())
			.filter(|(_, block)| block.name().starts_with(prefix))
			.min_by(|(_, a), (_, b)| a.name().cmp(b.name()))
			.map(|(id, _)| id)
	}

	/// Renames a block, returning the name it actually got.
	pub fn rename(&mut self, id: I, desired: &str) -> Option<String> {
		let name = self.unique_name(desired, Some(id));
		let block = self.get_mut(id)?;
		*block.name_mut() = name.clone();
		Some(name)
	}

	/// `desired` if free (ignoring `except`), otherwise the first free `base.NNN`.
	pub fn unique_name(&self, desired: &str, except: Option<I>) -> String {
		let taken = |name: &str| self.iter().any(|(id, block)| Some(id) != except && block.name() == name);

		if !taken(desired) {
			return desired.to_owned();
		}
		let mut n = 1;
		loop {
			let candidate = naming::numbered(desired, n);
			if !taken(&candidate) {
				return candidate;
			}
			n += 1;
		}
	}
}

impl<I: DataId, T: DataBlock> Default for DataStore<I, T> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	data_id!(TestId);

	struct Block {
		name: String,
	}
	impl_data_block!(Block);

	fn block(name: &str) -> Block {
		Block { name: name.to_owned() }
	}

	#[test]
	fn insert_uniquifies_names() {
		let mut store = DataStore::<TestId, Block>::new();
		let a = store.insert(block("Body"));
		let b = store.insert(block("Body"));
		let c = store.insert(block("Body.001"));

		assert_eq!(store.get(a).unwrap().name, "Body");
		assert_eq!(store.get(b).unwrap().name, "Body.001");
		assert_eq!(store.get(c).unwrap().name, "Body.002");
	}

	#[test]
	fn removal_keeps_ids_stable() {
		let mut store = DataStore::<TestId, Block>::new();
		let a = store.insert(block("A"));
		let b = store.insert(block("B"));

		assert!(store.remove(a).is_some());
		assert!(store.remove(a).is_none());
		assert_eq!(store.get(b).unwrap().name, "B");
		assert_eq!(store.len(), 1);
		assert_eq!(store.ids(), vec![b]);
	}

	#[test]
	fn prefix_lookup_is_alphabetical() {
		let mut store = DataStore::<TestId, Block>::new();
		store.insert(block("CharCust_2"));
		let first = store.insert(block("CharCust_1"));
		store.insert(block("Other"));

		assert_eq!(store.find_by_prefix("CharCust"), Some(first));
		assert_eq!(store.find_by_prefix("Missing"), None);
	}

	#[test]
	fn rename_to_own_name_is_noop() {
		let mut store = DataStore::<TestId, Block>::new();
		let a = store.insert(block("A"));
		store.insert(block("B"));

		assert_eq!(store.rename(a, "A").as_deref(), Some("A"));
		assert_eq!(store.rename(a, "B").as_deref(), Some("B.001"));
	}
}
