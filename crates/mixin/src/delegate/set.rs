use std::sync::Arc;

use mixin_primitives::Value;

use super::DelegateRef;

/// The ordered, immutable delegate list of one instance.
///
/// Order is priority: earlier delegates win resolution. Cloning shares storage.
#[derive(Debug, Clone)]
pub struct DelegateSet {
	items: Arc<[DelegateRef]>,
}

impl DelegateSet {
	pub fn new(items: impl IntoIterator<Item = DelegateRef>) -> Self {
		Self {
			items: items.into_iter().collect(),
		}
	}

	pub fn empty() -> Self {
		Self::new([])
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&DelegateRef> {
		self.items.get(index)
	}

	pub fn iter(&self) -> std::slice::Iter<'_, DelegateRef> {
		self.items.iter()
	}

	pub fn as_slice(&self) -> &[DelegateRef] {
		&self.items
	}

	/// Returns the first delegate of type `T`.
	pub fn find<T: std::any::Any>(&self) -> Option<&T> {
		self.items.iter().find_map(DelegateRef::downcast_ref::<T>)
	}

	/// The delegates as a dynamic list, in order.
	pub fn to_value(&self) -> Value {
		Value::List(self.items.iter().map(DelegateRef::to_value).collect())
	}
}

impl Default for DelegateSet {
	fn default() -> Self {
		Self::empty()
	}
}

impl FromIterator<DelegateRef> for DelegateSet {
	fn from_iter<I: IntoIterator<Item = DelegateRef>>(iter: I) -> Self {
		Self::new(iter)
	}
}

impl From<Vec<DelegateRef>> for DelegateSet {
	fn from(items: Vec<DelegateRef>) -> Self {
		Self { items: items.into() }
	}
}

impl<'a> IntoIterator for &'a DelegateSet {
	type Item = &'a DelegateRef;
	type IntoIter = std::slice::Iter<'a, DelegateRef>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.iter()
	}
}
