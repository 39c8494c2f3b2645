//! Mixin instances and call dispatch.
//!
//! # Mental Model
//!
//! A [`Dispatcher`] is one synthesized instance: a contract model, an ordered
//! delegate list, and a resolution cache with one slot per required method.
//! [`Mixin<C>`] is a cheap, cloneable handle that also records the contract
//! type statically.
//!
//! # Concurrency
//!
//! Instances are `Send + Sync`. Each cache slot is a [`OnceLock`]: the first
//! caller resolves it and concurrent first callers agree on the stored
//! outcome. Resolution itself runs no user code. Delegate bodies run with no
//! lock held, so reentrant calls on the same instance are fine.
//!
//! # Invariants
//!
//! - Delegates and config are fixed at construction.
//! - A cached resolution is never replaced.
//! - The introspection method answers without touching the cache.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use mixin_primitives::{FromValue, IntoArgs, TagSet, Ty, Value};

use crate::config::DispatchConfig;
use crate::contract::{Contract, ContractModel, INTROSPECT_METHOD, MethodId, RequiredMethod};
use crate::delegate::{DelegateRef, DelegateSet};
use crate::error::{ContractError, InvokeError};
use crate::passthrough;
use crate::resolve::{Resolution, resolve};

#[cfg(test)]
mod tests;

/// A synthesized instance that answers a contract's methods by delegation.
pub struct Dispatcher {
	contract: Arc<ContractModel>,
	delegates: DelegateSet,
	cache: Box<[OnceLock<Resolution>]>,
	config: DispatchConfig,
}

impl Dispatcher {
	/// Creates an instance over an already extracted contract.
	pub fn new(contract: Arc<ContractModel>, delegates: DelegateSet, config: DispatchConfig) -> Self {
		let cache = contract.methods().iter().map(|_| OnceLock::new()).collect();
		let this = Self {
			contract,
			delegates,
			cache,
			config,
		};
		tracing::debug!(
			contract = this.contract.name(),
			delegates = this.delegates.len(),
			eager = this.config.eager,
			"created mixin instance"
		);
		if this.config.eager {
			for method in this.contract.methods() {
				let resolution = this.resolution(method.id());
				if !resolution.is_resolved() {
					tracing::debug!(
						contract = this.contract.name(),
						method = %method.key(),
						?resolution,
						"required method has no callable implementation"
					);
				}
			}
		}
		this
	}

	pub fn contract(&self) -> &ContractModel {
		&self.contract
	}

	pub fn delegates(&self) -> &DelegateSet {
		&self.delegates
	}

	pub fn config(&self) -> &DispatchConfig {
		&self.config
	}

	/// Tags on the contract type itself.
	pub fn type_tags(&self) -> &TagSet {
		self.contract.tags()
	}

	/// Tags on the required method with this name and parameter types.
	pub fn method_tags(&self, name: &str, params: &[Ty]) -> Option<&TagSet> {
		self.contract.find(name, params).map(RequiredMethod::tags)
	}

	/// Returns the resolution for `id`, computing and caching it on first use.
	///
	/// # Panics
	///
	/// Panics if `id` does not belong to this instance's contract.
	pub fn resolution(&self, id: MethodId) -> Resolution {
		let required = self.contract.method(id);
		*self.cache[id.as_usize()].get_or_init(|| resolve(required, &self.delegates, self.config.overloads))
	}

	/// Number of required methods resolved so far.
	pub fn resolved_count(&self) -> usize {
		self.cache.iter().filter(|slot| slot.get().is_some()).count()
	}

	/// Calls the required method named `name` that accepts `args`.
	pub fn invoke(&self, name: &str, args: impl IntoArgs) -> Result<Value, InvokeError> {
		let args = args.into_args();
		if name == INTROSPECT_METHOD && args.is_empty() {
			return Ok(self.delegates.to_value());
		}
		let Some(required) = self.contract.lookup(name, &args) else {
			return Err(InvokeError::UnknownMethod {
				contract: self.contract.name().to_string(),
				method: name.to_string(),
				args: args.iter().map(Value::ty).collect(),
			});
		};
		self.dispatch(required, &args)
	}

	/// Calls a required method by id.
	///
	/// Ids taken from another contract are rejected, even when their index is
	/// in range here.
	pub fn invoke_method(&self, id: MethodId, args: &[Value]) -> Result<Value, InvokeError> {
		let required = self.contract.get(id).ok_or_else(|| InvokeError::Invocation {
			method: format!("#{}", id.as_usize()),
			reason: format!("not a method of {}", self.contract.name()),
		})?;
		self.dispatch(required, args)
	}

	/// Calls `name` and converts the result.
	pub fn call<R: FromValue>(&self, name: &str, args: impl IntoArgs) -> Result<R, InvokeError> {
		let value = self.invoke(name, args)?;
		R::from_value(value).map_err(|e| InvokeError::Invocation {
			method: name.to_string(),
			reason: e.to_string(),
		})
	}

	fn dispatch(&self, required: &RequiredMethod, args: &[Value]) -> Result<Value, InvokeError> {
		if required.name() == INTROSPECT_METHOD && required.params().is_empty() {
			return Ok(self.delegates.to_value());
		}
		let check = self.config.check_returns;
		match (self.resolution(required.id()), required.default()) {
			(Resolution::Delegate { index, method }, _) => {
				let delegate = &self.delegates.as_slice()[index];
				let target = &delegate.shape().methods()[method];
				passthrough::call_delegate(required, delegate, target, args, check)
			}
			(Resolution::ContractDefault, Some(default)) => passthrough::call_default(required, default, self, args, check),
			(Resolution::Inaccessible, Some(default)) => Err(InvokeError::AccessViolation {
				contract: self.contract.name().to_string(),
				method: required.key().clone(),
				declared_in: default.contract().to_string(),
			}),
			(Resolution::ContractDefault | Resolution::Inaccessible | Resolution::Unresolved, _) => {
				Err(InvokeError::Unimplemented {
					contract: self.contract.name().to_string(),
					method: required.key().clone(),
				})
			}
		}
	}

	fn display_delegate(&self, delegate: &DelegateRef) -> Option<String> {
		let method = delegate.shape().public_method("to_string", &[])?;
		if method.sig.ret != Ty::Str {
			return None;
		}
		match (method.raw)(delegate.object().as_ref(), &[]) {
			Ok(Value::Str(text)) => Some(text.to_string()),
			Ok(other) => {
				tracing::debug!(delegate = delegate.type_name(), got = %other.ty(), "to_string returned a non-string");
				None
			}
			Err(fault) => {
				tracing::debug!(delegate = delegate.type_name(), ?fault, "to_string failed");
				None
			}
		}
	}
}

impl fmt::Display for Dispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(text) = self.delegates.iter().find_map(|d| self.display_delegate(d)) {
			return f.write_str(&text);
		}
		write!(f, "{}[", self.contract.name())?;
		for (i, delegate) in self.delegates.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			f.write_str(delegate.type_name())?;
		}
		f.write_str("]")
	}
}

impl fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatcher")
			.field("contract", &self.contract.name())
			.field("delegates", &self.delegates)
			.field("resolved", &self.resolved_count())
			.finish_non_exhaustive()
	}
}

/// A typed handle to a mixin instance of contract `C`.
pub struct Mixin<C> {
	inner: Arc<Dispatcher>,
	_contract: PhantomData<fn() -> C>,
}

impl<C: Contract> Mixin<C> {
	/// Creates an instance of `C` over `delegates` with default settings.
	pub fn new(delegates: impl Into<DelegateSet>) -> Result<Self, ContractError> {
		Self::builder().delegates(delegates).build()
	}

	pub fn builder() -> MixinBuilder<C> {
		MixinBuilder {
			delegates: Vec::new(),
			config: DispatchConfig::default(),
			_contract: PhantomData,
		}
	}

	pub fn dispatcher(&self) -> &Arc<Dispatcher> {
		&self.inner
	}

	/// Erases the contract type.
	pub fn into_dispatcher(self) -> Arc<Dispatcher> {
		self.inner
	}
}

impl<C> Clone for Mixin<C> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
			_contract: PhantomData,
		}
	}
}

impl<C> Deref for Mixin<C> {
	type Target = Dispatcher;

	fn deref(&self) -> &Dispatcher {
		&self.inner
	}
}

impl<C> fmt::Display for Mixin<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&*self.inner, f)
	}
}

impl<C> fmt::Debug for Mixin<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.inner, f)
	}
}

/// Collects delegates and settings for a [`Mixin`].
pub struct MixinBuilder<C> {
	delegates: Vec<DelegateRef>,
	config: DispatchConfig,
	_contract: PhantomData<fn() -> C>,
}

impl<C: Contract> MixinBuilder<C> {
	/// Appends one delegate; earlier delegates take priority.
	pub fn delegate(mut self, delegate: impl Into<DelegateRef>) -> Self {
		self.delegates.push(delegate.into());
		self
	}

	/// Appends every delegate of `set`, in order.
	pub fn delegates(mut self, set: impl Into<DelegateSet>) -> Self {
		self.delegates.extend(set.into().iter().cloned());
		self
	}

	pub fn config(mut self, config: DispatchConfig) -> Self {
		self.config = config;
		self
	}

	/// Extracts the contract and creates the instance.
	pub fn build(self) -> Result<Mixin<C>, ContractError> {
		let contract = ContractModel::of::<C>()?;
		let dispatcher = Dispatcher::new(contract, DelegateSet::from(self.delegates), self.config);
		Ok(Mixin {
			inner: Arc::new(dispatcher),
			_contract: PhantomData,
		})
	}
}
