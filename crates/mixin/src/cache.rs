//! Process-wide memoization keyed by Rust type identity.
//!
//! # Role
//!
//! Contract models and delegate shapes are pure functions of their Rust type,
//! so each is computed once and shared for the lifetime of the process.
//!
//! # Concurrency
//!
//! - **Reads:** Wait-free (atomic load of the current map snapshot).
//! - **Writes:** Lock-free CAS loop. Two threads racing on the same key may both
//!   compute the value; the first published value wins and the loser's copy is
//!   dropped. No user code runs while a swap is pending.

use std::any::TypeId;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

/// Append-only map from [`TypeId`] to a shared value.
pub(crate) struct TypeCache<V> {
	label: &'static str,
	map: ArcSwap<FxHashMap<TypeId, Arc<V>>>,
}

impl<V> TypeCache<V> {
	pub(crate) fn new(label: &'static str) -> Self {
		Self {
			label,
			map: ArcSwap::from_pointee(FxHashMap::default()),
		}
	}

	pub(crate) fn get(&self, key: TypeId) -> Option<Arc<V>> {
		self.map.load().get(&key).cloned()
	}

	/// Returns the cached value for `key`, computing and publishing it on a miss.
	///
	/// Failed computations are not cached.
	pub(crate) fn get_or_try_insert<E>(
		&self,
		key: TypeId,
		compute: impl FnOnce() -> Result<V, E>,
	) -> Result<Arc<V>, E> {
		if let Some(hit) = self.get(key) {
			return Ok(hit);
		}

		let fresh = Arc::new(compute()?);
		loop {
			let old = self.map.load_full();
			if let Some(winner) = old.get(&key) {
				tracing::trace!(cache = self.label, "lost publication race; keeping first value");
				return Ok(winner.clone());
			}

			let mut next = FxHashMap::clone(&old);
			next.insert(key, fresh.clone());
			let prev = self.map.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				return Ok(fresh);
			}
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.map.load().len()
	}
}
