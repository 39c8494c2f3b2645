//! The invocation boundary between dispatch and user code.
//!
//! Raw delegate methods report two different kinds of failure. A
//! [`CallFault::NotPerformed`] means the body never ran: the receiver or an
//! argument could not be converted. A [`CallFault::Raised`] means the body ran
//! and failed. Only the second is user-visible as-is: it is unwrapped exactly
//! one level into [`InvokeError::Raised`], keeping the original error value,
//! message, and backtrace.
//!
//! Panics are not intercepted. They unwind through dispatch with their
//! original payload, and no lock is held across a call.

use mixin_primitives::{Value, display_params};

use crate::contract::{DefaultImpl, RequiredMethod};
use crate::delegate::{DelegateRef, ShapeMethod};
use crate::dispatch::Dispatcher;
use crate::error::{Failure, InvokeError, unnest};

/// Failure reported by a raw delegate method.
#[derive(Debug)]
pub enum CallFault {
	/// The call could not be performed; the body did not run.
	NotPerformed(String),
	/// The body ran and raised this failure.
	Raised(Failure),
}

impl CallFault {
	/// Wraps a failure raised by a method body.
	///
	/// A raised [`InvokeError`] from a nested instance is unwrapped to the
	/// failure it carries.
	pub fn raised(failure: impl Into<Failure>) -> Self {
		Self::Raised(unnest(failure.into()))
	}

	pub fn not_performed(reason: impl Into<String>) -> Self {
		Self::NotPerformed(reason.into())
	}
}

impl From<InvokeError> for CallFault {
	fn from(err: InvokeError) -> Self {
		match err {
			InvokeError::Raised(failure) => Self::Raised(failure),
			other => Self::Raised(Failure::new(other)),
		}
	}
}

/// Invokes a resolved delegate method on behalf of `required`.
pub(crate) fn call_delegate(
	required: &RequiredMethod,
	delegate: &DelegateRef,
	method: &ShapeMethod,
	args: &[Value],
	check_returns: bool,
) -> Result<Value, InvokeError> {
	check_args(required, args)?;
	match (method.raw)(delegate.object().as_ref(), args) {
		Ok(value) => check_return(required, value, check_returns),
		Err(CallFault::Raised(failure)) => Err(InvokeError::Raised(failure)),
		Err(CallFault::NotPerformed(reason)) => Err(InvokeError::Invocation {
			method: format!("{}::{}", delegate.type_name(), method.sig),
			reason,
		}),
	}
}

/// Invokes a contract default body with `this` as receiver.
///
/// Errors from the body, including errors of nested calls it makes on `this`,
/// are returned untouched.
pub(crate) fn call_default(
	required: &RequiredMethod,
	default: &DefaultImpl,
	this: &Dispatcher,
	args: &[Value],
	check_returns: bool,
) -> Result<Value, InvokeError> {
	check_args(required, args)?;
	let value = (default.body)(this, args)?;
	check_return(required, value, check_returns)
}

fn check_args(required: &RequiredMethod, args: &[Value]) -> Result<(), InvokeError> {
	if required.signature().accepts(args) {
		return Ok(());
	}
	let got: Vec<_> = args.iter().map(Value::ty).collect();
	Err(InvokeError::Invocation {
		method: required.key().to_string(),
		reason: format!("arguments {} do not fit", display_params(&got)),
	})
}

fn check_return(required: &RequiredMethod, value: Value, enabled: bool) -> Result<Value, InvokeError> {
	if !enabled || required.ret().is_assignable_from(value.ty()) {
		return Ok(value);
	}
	Err(InvokeError::Invocation {
		method: required.key().to_string(),
		reason: format!("returned {}, declared {}", value.ty(), required.ret()),
	})
}
