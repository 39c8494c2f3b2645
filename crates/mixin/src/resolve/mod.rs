//! Method resolution.
//!
//! Maps one required method to the implementation an instance will run,
//! given the instance's delegates.
//!
//! # Precedence
//!
//! 1. The first delegate, in list order, whose shape has an applicable public
//!    method. Later delegates are never consulted once one matches.
//! 2. Otherwise the contract default, if the required method has one and its
//!    declaring contract is public.
//! 3. Otherwise a restricted default yields [`Resolution::Inaccessible`] and no
//!    default at all yields [`Resolution::Unresolved`].
//!
//! Within one delegate several methods may apply. [`OverloadPolicy`] narrows
//! them to one.

use mixin_primitives::Signature;

use crate::config::OverloadPolicy;
use crate::contract::RequiredMethod;
use crate::delegate::{DelegateSet, Shape};


/// Outcome of resolving one required method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// Forward to method `method` of delegate `index`.
	Delegate { index: usize, method: usize },
	/// Run the contract-supplied default body.
	ContractDefault,
	/// A default exists but belongs to a restricted contract.
	Inaccessible,
	/// Nothing implements the method.
	Unresolved,
}

impl Resolution {
	pub fn is_resolved(self) -> bool {
		matches!(self, Self::Delegate { .. } | Self::ContractDefault)
	}
}

/// Resolves `required` against `delegates`.
pub fn resolve(required: &RequiredMethod, delegates: &DelegateSet, policy: OverloadPolicy) -> Resolution {
	for (index, delegate) in delegates.iter().enumerate() {
		if let Some(method) = best_candidate(delegate.shape(), required.signature(), policy) {
			tracing::trace!(
				method = %required.key(),
				delegate = delegate.type_name(),
				index,
				"resolved to delegate"
			);
			return Resolution::Delegate { index, method };
		}
	}

	match required.default() {
		Some(default) if default.visibility().is_public() => Resolution::ContractDefault,
		Some(default) => {
			tracing::trace!(method = %required.key(), contract = default.contract(), "default is restricted");
			Resolution::Inaccessible
		}
		None => Resolution::Unresolved,
	}
}

/// Picks the method of `shape` that best satisfies `required`.
pub(crate) fn best_candidate(shape: &Shape, required: &Signature, policy: OverloadPolicy) -> Option<usize> {
	let mut best: Option<(usize, usize)> = None;
	for (idx, method) in shape.candidates(required.name()) {
		let Some(widened) = method.sig.satisfies(required) else {
			continue;
		};
		match policy {
			OverloadPolicy::FirstDeclared => return Some(idx),
			OverloadPolicy::PreferExact => {
				if best.is_none_or(|(w, _)| widened < w) {
					best = Some((widened, idx));
				}
				if widened == 0 {
					break;
				}
			}
		}
	}
	best.map(|(_, idx)| idx)
}
