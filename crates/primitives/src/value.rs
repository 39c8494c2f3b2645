//! Dynamic values exchanged across the dispatch boundary.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ty::Ty;

/// A dynamically typed argument or return value.
#[derive(Clone)]
pub enum Value {
	/// No value.
	Unit,
	/// Boolean value.
	Bool(bool),
	/// Integer value.
	Int(i64),
	/// Float value.
	Float(f64),
	/// String value.
	Str(Arc<str>),
	/// Byte buffer.
	Bytes(Arc<[u8]>),
	/// List of values.
	List(Arc<[Value]>),
	/// Opaque host object, compared by identity.
	Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
	/// Returns the runtime type of this value.
	pub fn ty(&self) -> Ty {
		match self {
			Value::Unit => Ty::Unit,
			Value::Bool(_) => Ty::Bool,
			Value::Int(_) => Ty::Int,
			Value::Float(_) => Ty::Float,
			Value::Str(_) => Ty::Str,
			Value::Bytes(_) => Ty::Bytes,
			Value::List(_) => Ty::List,
			Value::Object(_) => Ty::Object,
		}
	}

	/// Wraps a host object.
	pub fn object<T: Any + Send + Sync>(value: T) -> Self {
		Value::Object(Arc::new(value))
	}

	/// Returns the boolean value if this is a `Bool` variant.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the integer value if this is an `Int` variant.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the string value if this is a `Str` variant.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(v) => Some(v),
			_ => None,
		}
	}

	/// Returns the list items if this is a `List` variant.
	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(items) => Some(items),
			_ => None,
		}
	}

	/// Downcasts an `Object` variant to a concrete host type.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Value::Object(obj) => obj.as_ref().downcast_ref::<T>(),
			_ => None,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Unit, Value::Unit) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::Bytes(a), Value::Bytes(b)) => a == b,
			(Value::List(a), Value::List(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
			_ => false,
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Unit => f.write_str("Unit"),
			Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
			Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
			Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
			Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
			Value::Bytes(v) => f.debug_tuple("Bytes").field(&v.len()).finish(),
			Value::List(v) => f.debug_list().entries(v.iter()).finish(),
			Value::Object(_) => f.write_str("Object(..)"),
		}
	}
}

/// Error returned when a [`Value`] cannot be converted into a Rust type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
	/// The value has a different dispatch type.
	#[error("expected {expected}, got {got}")]
	Mismatch {
		/// The type the conversion required.
		expected: Ty,
		/// The type that was present.
		got: Ty,
	},
	/// The integer does not fit the requested width.
	#[error("integer {value} out of range for {target}")]
	OutOfRange { value: i64, target: &'static str },
	/// The object is not of the requested host type.
	#[error("object is not a {expected}")]
	ObjectType { expected: &'static str },
}

/// Rust types with a fixed dispatch [`Ty`].
pub trait Typed {
	/// The dispatch type of `Self`.
	const TY: Ty;
}

/// Conversion of a Rust value into a [`Value`].
pub trait IntoValue {
	/// Converts `self` into a dynamic value.
	fn into_value(self) -> Value;
}

/// Conversion of a [`Value`] back into a Rust value.
pub trait FromValue: Sized {
	/// Converts a dynamic value, failing on a type mismatch.
	fn from_value(value: Value) -> Result<Self, ValueError>;
}

fn mismatch<T>(expected: Ty, value: &Value) -> Result<T, ValueError> {
	Err(ValueError::Mismatch {
		expected,
		got: value.ty(),
	})
}

impl Typed for Value {
	const TY: Ty = Ty::Any;
}

impl IntoValue for Value {
	fn into_value(self) -> Value {
		self
	}
}

impl FromValue for Value {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		Ok(value)
	}
}

impl Typed for () {
	const TY: Ty = Ty::Unit;
}

impl IntoValue for () {
	fn into_value(self) -> Value {
		Value::Unit
	}
}

impl FromValue for () {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Unit => Ok(()),
			other => mismatch(Ty::Unit, &other),
		}
	}
}

impl Typed for bool {
	const TY: Ty = Ty::Bool;
}

impl IntoValue for bool {
	fn into_value(self) -> Value {
		Value::Bool(self)
	}
}

impl FromValue for bool {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Bool(v) => Ok(v),
			other => mismatch(Ty::Bool, &other),
		}
	}
}

impl Typed for i64 {
	const TY: Ty = Ty::Int;
}

impl IntoValue for i64 {
	fn into_value(self) -> Value {
		Value::Int(self)
	}
}

impl FromValue for i64 {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Int(v) => Ok(v),
			other => mismatch(Ty::Int, &other),
		}
	}
}

impl Typed for i32 {
	const TY: Ty = Ty::Int;
}

impl IntoValue for i32 {
	fn into_value(self) -> Value {
		Value::Int(i64::from(self))
	}
}

impl FromValue for i32 {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Int(v) => i32::try_from(v).map_err(|_| ValueError::OutOfRange {
				value: v,
				target: "i32",
			}),
			other => mismatch(Ty::Int, &other),
		}
	}
}

impl Typed for f64 {
	const TY: Ty = Ty::Float;
}

impl IntoValue for f64 {
	fn into_value(self) -> Value {
		Value::Float(self)
	}
}

impl FromValue for f64 {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Float(v) => Ok(v),
			other => mismatch(Ty::Float, &other),
		}
	}
}

impl Typed for String {
	const TY: Ty = Ty::Str;
}

impl IntoValue for String {
	fn into_value(self) -> Value {
		Value::Str(self.into())
	}
}

impl FromValue for String {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Str(v) => Ok(v.to_string()),
			other => mismatch(Ty::Str, &other),
		}
	}
}

impl Typed for &str {
	const TY: Ty = Ty::Str;
}

impl IntoValue for &str {
	fn into_value(self) -> Value {
		Value::Str(self.into())
	}
}

impl Typed for Vec<u8> {
	const TY: Ty = Ty::Bytes;
}

impl IntoValue for Vec<u8> {
	fn into_value(self) -> Value {
		Value::Bytes(self.into())
	}
}

impl FromValue for Vec<u8> {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Bytes(v) => Ok(v.to_vec()),
			other => mismatch(Ty::Bytes, &other),
		}
	}
}

impl Typed for Vec<Value> {
	const TY: Ty = Ty::List;
}

impl IntoValue for Vec<Value> {
	fn into_value(self) -> Value {
		Value::List(self.into())
	}
}

impl FromValue for Vec<Value> {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::List(v) => Ok(v.to_vec()),
			other => mismatch(Ty::List, &other),
		}
	}
}

impl<T: Any + Send + Sync> Typed for Arc<T> {
	const TY: Ty = Ty::Object;
}

impl<T: Any + Send + Sync> IntoValue for Arc<T> {
	fn into_value(self) -> Value {
		Value::Object(self)
	}
}

impl<T: Any + Send + Sync> FromValue for Arc<T> {
	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Object(obj) => obj.downcast::<T>().map_err(|_| ValueError::ObjectType {
				expected: std::any::type_name::<T>(),
			}),
			other => mismatch(Ty::Object, &other),
		}
	}
}

/// Conversion of an argument tuple into a positional argument list.
pub trait IntoArgs {
	/// Converts `self` into positional values.
	fn into_args(self) -> Vec<Value>;
}

impl IntoArgs for Vec<Value> {
	fn into_args(self) -> Vec<Value> {
		self
	}
}

impl IntoArgs for () {
	fn into_args(self) -> Vec<Value> {
		Vec::new()
	}
}

macro_rules! impl_into_args {
	($($name:ident),+) => {
		impl<$($name: IntoValue),+> IntoArgs for ($($name,)+) {
			#[allow(non_snake_case, reason = "tuple fields bound by type name")]
			fn into_args(self) -> Vec<Value> {
				let ($($name,)+) = self;
				vec![$($name.into_value()),+]
			}
		}
	};
}

impl_into_args!(A);
impl_into_args!(A, B);
impl_into_args!(A, B, C);
impl_into_args!(A, B, C, D);
