//! Runtime object composition by structural delegation.
//!
//! A mixin instance answers the methods of a *contract* by forwarding each
//! call to the first of its *delegates* that structurally provides the method,
//! falling back to a default body the contract supplies.
//!
//! # Mental Model
//!
//! - [`Contract`] types declare required methods, parents, tags, and defaults.
//!   Declarations are extracted once per type into a [`ContractModel`].
//! - [`Delegate`] types declare a [`Shape`]: the methods they expose. Delegates
//!   never implement the contract; matching is by name and signature only.
//! - [`create`] (or [`Mixin::new`]) pairs one contract with an ordered
//!   [`DelegateSet`]. Calls resolve lazily, once per method, and the result is
//!   cached for the instance lifetime.
//! - Failures raised by delegate bodies pass through as [`InvokeError::Raised`]
//!   with the original error intact; panics unwind unchanged.
//!
//! ```ignore
//! let bob = mixin::create::<Bob>(mixin::delegates![Func::of1("throw_down", |_: String| {
//! 	Ok::<_, Infallible>(13i64)
//! })])?;
//! assert_eq!(bob.call::<i64>("throw_down", ("x",))?, 13);
//! ```

mod cache;
pub mod config;
pub mod contract;
pub mod delegate;
pub mod dispatch;
pub mod error;
pub mod passthrough;
pub mod resolve;

pub use config::{ConfigError, DispatchConfig, OverloadPolicy};
pub use contract::{
	Contract, ContractDecl, ContractModel, DefaultImpl, INTROSPECT_METHOD, Introspect, MethodDecl, MethodId,
	RequiredMethod,
};
pub use delegate::{Delegate, DelegateRef, DelegateSet, Func, Shape, ShapeBuilder, ShapeMethod};
pub use dispatch::{Dispatcher, Mixin, MixinBuilder};
pub use error::{ContractError, Failure, InvokeError};
pub use mixin_primitives::{
	FromValue, IntoArgs, IntoValue, MethodKey, Signature, Tag, TagSet, Ty, Typed, Value, ValueError, Visibility,
};
pub use passthrough::CallFault;
pub use resolve::Resolution;

/// Creates an instance of contract `C` backed by `delegates`.
pub fn create<C: Contract>(delegates: impl Into<DelegateSet>) -> Result<Mixin<C>, ContractError> {
	Mixin::new(delegates)
}

/// Builds a [`DelegateSet`] from values convertible into [`DelegateRef`].
#[macro_export]
macro_rules! delegates {
	($($delegate:expr),* $(,)?) => {
		$crate::DelegateSet::new([$($crate::DelegateRef::from($delegate)),*])
	};
}

/// Safely converts a `usize` index to `u32`.
///
/// # Panics
///
/// Panics if `idx` exceeds `u32::MAX`.
pub(crate) fn u32_index(idx: usize, what: &'static str) -> u32 {
	u32::try_from(idx).unwrap_or_else(|_| panic!("{} index overflow: {}", what, idx))
}
