//! Construction-time and call-time failures.

use mixin_primitives::{MethodKey, Ty, display_params};

/// A failure raised by a delegate method body.
///
/// The concrete error type, message, and backtrace are preserved; use
/// [`InvokeError::downcast`] or [`InvokeError::downcast_ref`] to recover it.
pub type Failure = anyhow::Error;

/// Errors that abort instance creation. No partially-built instance is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
	/// The type passed to the factory does not describe a usable contract.
	#[error("invalid contract type {contract}: {reason}")]
	InvalidContractType { contract: String, reason: String },

	/// Two unrelated contracts supply default bodies for the same signature.
	#[error("ambiguous default for {method} in {contract}: supplied by {}", .candidates.join(", "))]
	AmbiguousDefault {
		contract: String,
		method: MethodKey,
		candidates: Vec<String>,
	},
}

impl ContractError {
	pub(crate) fn invalid(contract: &str, reason: impl Into<String>) -> Self {
		Self::InvalidContractType {
			contract: contract.to_string(),
			reason: reason.into(),
		}
	}
}

/// Errors that abort a single call. The instance remains usable afterwards.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
	/// No delegate matched and the contract supplies no default.
	#[error("unimplemented method {method} on {contract}")]
	Unimplemented { contract: String, method: MethodKey },

	/// The only implementation is a default body the synthesis site may not call.
	#[error("cannot access default {method} declared in restricted contract {declared_in} (via {contract})")]
	AccessViolation {
		contract: String,
		method: MethodKey,
		declared_in: String,
	},

	/// No required method has this name and accepts these arguments.
	#[error("no method {method}{} on {contract}", display_params(.args))]
	UnknownMethod {
		contract: String,
		method: String,
		args: Vec<Ty>,
	},

	/// The call could not be performed at the invocation boundary.
	#[error("cannot invoke {method}: {reason}")]
	Invocation { method: String, reason: String },

	/// A delegate or default body ran and failed; the original failure, unwrapped.
	#[error(transparent)]
	Raised(Failure),
}

impl InvokeError {
	/// Wraps a failure so it passes through dispatch unchanged.
	pub fn raised<E>(error: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		Self::Raised(unnest(Failure::new(error)))
	}

	/// Returns true if this error carries a failure raised by user code.
	pub fn is_raised(&self) -> bool {
		matches!(self, Self::Raised(_))
	}

	/// Returns the raised failure, if any.
	pub fn failure(&self) -> Option<&Failure> {
		match self {
			Self::Raised(failure) => Some(failure),
			_ => None,
		}
	}

	/// Borrows the original raised error as `E`.
	pub fn downcast_ref<E>(&self) -> Option<&E>
	where
		E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
	{
		self.failure()?.downcast_ref::<E>()
	}

	/// Recovers the original raised error as `E`, or returns `self` unchanged.
	pub fn downcast<E>(self) -> Result<E, Self>
	where
		E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
	{
		match self {
			Self::Raised(failure) => failure.downcast::<E>().map_err(Self::Raised),
			other => Err(other),
		}
	}
}

/// Strips the dispatch layer off a failure that is itself a raised [`InvokeError`].
///
/// A delegate that forwards to another mixin instance fails with that
/// instance's `InvokeError`; its caller must still see the innermost failure.
pub(crate) fn unnest(failure: Failure) -> Failure {
	match failure.downcast::<InvokeError>() {
		Ok(InvokeError::Raised(inner)) => inner,
		Ok(other) => Failure::new(other),
		Err(failure) => failure,
	}
}
