//! Core value and signature types shared by contracts, delegates, and dispatch.

/// Method keys, signatures, and visibility.
pub mod signature;
/// Metadata tags.
pub mod tag;
/// Runtime type descriptors.
pub mod ty;
/// Dynamic values and conversions.
pub mod value;

pub use signature::{MethodKey, Params, Signature, Visibility};
pub use tag::{Tag, TagSet};
pub use ty::{Assign, Ty, display_params};
pub use value::{FromValue, IntoArgs, IntoValue, Typed, Value, ValueError};
