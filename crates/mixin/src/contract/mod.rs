//! Contract declarations.
//!
//! A contract is a Rust type implementing [`Contract`]. Its `declare` function
//! describes the required methods, parent contracts, tags, and optional default
//! bodies. Declarations are turned into an immutable [`ContractModel`] once per
//! type and cached for the process lifetime.
//!
//! ```ignore
//! struct Bob;
//!
//! impl Contract for Bob {
//! 	fn declare(decl: &mut ContractDecl) {
//! 		decl.method("throw_down", [Ty::Str], Ty::Int)
//! 			.tag(Tag::new("Cool"))
//! 			.raises::<std::io::Error>();
//! 	}
//! }
//! ```

use std::any::TypeId;
use std::sync::Arc;

use mixin_primitives::{IntoValue, Signature, Tag, TagSet, Ty, Value, Visibility};

use crate::dispatch::Dispatcher;
use crate::error::InvokeError;

mod model;

pub use model::{ContractModel, DefaultImpl, MethodId, RequiredMethod};


/// Name of the introspection method every instance answers without resolution.
pub const INTROSPECT_METHOD: &str = "mixin_delegates";

/// A type describing a set of required methods.
pub trait Contract: 'static {
	/// Fills in the contract's methods, parents, and metadata.
	fn declare(decl: &mut ContractDecl);
}

/// Body of a contract-supplied default, invoked with the instance as receiver.
pub type DefaultBody = Arc<dyn Fn(&Dispatcher, &[Value]) -> Result<Value, InvokeError> + Send + Sync>;

/// The minimal introspection contract: enumerates an instance's delegates.
///
/// Contracts may extend it to make the accessor part of their declared surface;
/// every instance answers it regardless.
pub struct Introspect;

impl Contract for Introspect {
	fn declare(decl: &mut ContractDecl) {
		decl.name("Introspect");
		decl.method(INTROSPECT_METHOD, [], Ty::List);
	}
}

/// Reference to a parent contract collected during declaration.
#[derive(Clone, Copy)]
pub(crate) struct ParentRef {
	pub(crate) type_id: TypeId,
	pub(crate) type_name: &'static str,
	pub(crate) declare: fn(&mut ContractDecl),
}

impl ParentRef {
	pub(crate) fn of<C: Contract>() -> Self {
		Self {
			type_id: TypeId::of::<C>(),
			type_name: std::any::type_name::<C>(),
			declare: C::declare,
		}
	}
}

/// Builder passed to [`Contract::declare`].
pub struct ContractDecl {
	pub(crate) name: String,
	pub(crate) visibility: Visibility,
	pub(crate) tags: TagSet,
	pub(crate) parents: Vec<ParentRef>,
	pub(crate) methods: Vec<MethodDecl>,
	pub(crate) statics: Vec<Signature>,
}

impl ContractDecl {
	pub(crate) fn new(type_name: &'static str) -> Self {
		Self {
			name: short_type_name(type_name).to_string(),
			visibility: Visibility::Public,
			tags: TagSet::new(),
			parents: Vec::new(),
			methods: Vec::new(),
			statics: Vec::new(),
		}
	}

	/// Overrides the display name (defaults to the Rust type name without its path).
	pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
		self.name = name.into();
		self
	}

	/// Marks the contract as restricted; its default bodies cannot be invoked by instances.
	pub fn restricted(&mut self) -> &mut Self {
		self.visibility = Visibility::Restricted;
		self
	}

	/// Attaches a tag to the contract type.
	pub fn tag(&mut self, tag: Tag) -> &mut Self {
		self.tags.insert(tag);
		self
	}

	/// Inherits every method of `P`.
	pub fn extends<P: Contract>(&mut self) -> &mut Self {
		self.parents.push(ParentRef::of::<P>());
		self
	}

	/// Declares a required instance method.
	pub fn method(
		&mut self,
		name: &str,
		params: impl IntoIterator<Item = Ty>,
		ret: Ty,
	) -> &mut MethodDecl {
		self.methods.push(MethodDecl {
			sig: Signature::new(name, params, ret),
			tags: TagSet::new(),
			raises: Vec::new(),
			default: None,
		});
		let last = self.methods.len() - 1;
		&mut self.methods[last]
	}

	/// Declares a static member. Static members are never required and never dispatched.
	pub fn static_method(
		&mut self,
		name: &str,
		params: impl IntoIterator<Item = Ty>,
		ret: Ty,
	) -> &mut Self {
		self.statics.push(Signature::new(name, params, ret));
		self
	}
}

/// One method entry inside a [`ContractDecl`].
pub struct MethodDecl {
	pub(crate) sig: Signature,
	pub(crate) tags: TagSet,
	pub(crate) raises: Vec<&'static str>,
	pub(crate) default: Option<DefaultBody>,
}

impl MethodDecl {
	/// Attaches a tag to this method.
	pub fn tag(&mut self, tag: Tag) -> &mut Self {
		self.tags.insert(tag);
		self
	}

	/// Records an error type this method is declared to raise.
	///
	/// Purely descriptive: failures of any type pass through dispatch unchanged.
	pub fn raises<E: 'static>(&mut self) -> &mut Self {
		let name = std::any::type_name::<E>();
		if !self.raises.contains(&name) {
			self.raises.push(name);
		}
		self
	}

	/// Supplies a default body used when no delegate provides the method.
	pub fn default_body<F>(&mut self, body: F) -> &mut Self
	where
		F: Fn(&Dispatcher, &[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
	{
		self.default = Some(Arc::new(body));
		self
	}

	/// Supplies a default body that returns a constant.
	pub fn default_value<V>(&mut self, value: V) -> &mut Self
	where
		V: IntoValue + Clone + Send + Sync + 'static,
	{
		self.default_body(move |_, _| Ok(value.clone().into_value()))
	}
}

/// Strips the module path and generic arguments from a type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
	let base = full.split('<').next().unwrap_or(full);
	base.rsplit("::").next().unwrap_or(base)
}
