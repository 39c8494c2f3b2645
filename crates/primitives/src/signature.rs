//! Method signatures and structural compatibility.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::ty::{Assign, Ty, display_params};

/// Inline storage for parameter lists; most methods take few arguments.
pub type Params = SmallVec<[Ty; 4]>;

/// Who may call a method or default body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
	/// Callable from the synthesis site.
	#[default]
	Public,
	/// Declared but not callable from outside its owner.
	Restricted,
}

impl Visibility {
	pub const fn is_public(self) -> bool {
		matches!(self, Visibility::Public)
	}
}

/// Identity of a method within one contract: name plus parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
	pub name: Arc<str>,
	pub params: Params,
}

impl MethodKey {
	pub fn new(name: impl Into<Arc<str>>, params: impl IntoIterator<Item = Ty>) -> Self {
		Self {
			name: name.into(),
			params: params.into_iter().collect(),
		}
	}
}

impl fmt::Display for MethodKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.name, display_params(&self.params))
	}
}

/// A full method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
	pub key: MethodKey,
	pub ret: Ty,
}

impl Signature {
	pub fn new(name: impl Into<Arc<str>>, params: impl IntoIterator<Item = Ty>, ret: Ty) -> Self {
		Self {
			key: MethodKey::new(name, params),
			ret,
		}
	}

	pub fn name(&self) -> &str {
		&self.key.name
	}

	pub fn params(&self) -> &[Ty] {
		&self.key.params
	}

	/// Checks whether `self` (a provided method) can stand in for `required`.
	///
	/// Names and arity must be equal. Each provided parameter must accept the
	/// required parameter type, and the required return slot must accept the
	/// provided return type. Returns the number of widened positions, where
	/// zero means an exact match.
	pub fn satisfies(&self, required: &Signature) -> Option<usize> {
		if self.key.name != required.key.name || self.key.params.len() != required.key.params.len() {
			return None;
		}
		let mut widened = 0;
		for (provided, wanted) in self.key.params.iter().zip(&required.key.params) {
			match provided.assign_from(*wanted)? {
				Assign::Exact => {}
				Assign::Widened => widened += 1,
			}
		}
		match required.ret.assign_from(self.ret)? {
			Assign::Exact => {}
			Assign::Widened => widened += 1,
		}
		Some(widened)
	}

	/// Returns true if `args` fit this signature's parameters.
	pub fn accepts(&self, args: &[crate::Value]) -> bool {
		args.len() == self.key.params.len()
			&& self
				.key
				.params
				.iter()
				.zip(args)
				.all(|(param, arg)| param.is_assignable_from(arg.ty()))
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} -> {}", self.key, self.ret)
	}
}
