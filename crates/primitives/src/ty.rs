//! Runtime type descriptors for dispatch signatures.
//!
//! [`Ty`] is deliberately flat: assignability is either exact or a widening
//! into [`Ty::Any`]. Matching code ranks candidates by how many positions
//! needed widening, so the distinction between the two is kept explicit via
//! [`Assign`].

use std::fmt;

/// The type of a parameter, return slot, or runtime [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ty {
	/// No value (`()`).
	Unit,
	/// Boolean.
	Bool,
	/// Signed 64-bit integer.
	Int,
	/// 64-bit float.
	Float,
	/// UTF-8 string.
	Str,
	/// Raw bytes.
	Bytes,
	/// Heterogeneous list of values.
	List,
	/// Opaque host object.
	Object,
	/// Top type; every other type is assignable to it.
	Any,
}

/// How one type is assignable to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Assign {
	/// Both sides name the same type.
	Exact,
	/// The target is [`Ty::Any`] and the source is narrower.
	Widened,
}

impl Ty {
	/// Returns how `source` is assignable to `self`, or `None` if it is not.
	pub fn assign_from(self, source: Ty) -> Option<Assign> {
		if self == source {
			Some(Assign::Exact)
		} else if self == Ty::Any {
			Some(Assign::Widened)
		} else {
			None
		}
	}

	/// Returns true if a value of type `source` may be stored in a slot of type `self`.
	pub fn is_assignable_from(self, source: Ty) -> bool {
		self.assign_from(source).is_some()
	}

	/// Returns the lowercase name used in diagnostics.
	pub const fn name(self) -> &'static str {
		match self {
			Ty::Unit => "unit",
			Ty::Bool => "bool",
			Ty::Int => "int",
			Ty::Float => "float",
			Ty::Str => "str",
			Ty::Bytes => "bytes",
			Ty::List => "list",
			Ty::Object => "object",
			Ty::Any => "any",
		}
	}
}

impl fmt::Display for Ty {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Formats a parameter list as `(int, str)`.
pub fn display_params(params: &[Ty]) -> String {
	let inner: Vec<&str> = params.iter().map(|t| t.name()).collect();
	format!("({})", inner.join(", "))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_and_widened_assignment() {
		assert_eq!(Ty::Int.assign_from(Ty::Int), Some(Assign::Exact));
		assert_eq!(Ty::Any.assign_from(Ty::Str), Some(Assign::Widened));
		assert_eq!(Ty::Any.assign_from(Ty::Any), Some(Assign::Exact));
		assert_eq!(Ty::Str.assign_from(Ty::Any), None);
		assert!(!Ty::Float.is_assignable_from(Ty::Int));
	}

	#[test]
	fn params_render_in_order() {
		assert_eq!(display_params(&[Ty::Int, Ty::Str]), "(int, str)");
		assert_eq!(display_params(&[]), "()");
	}
}
