//! Delegates and their shapes.
//!
//! # Mental Model
//!
//! A delegate is any host value. What dispatch can see of it is its [`Shape`]:
//! the type name, the tags placed on the type, and a table of methods, each
//! with a [`Signature`], a [`Visibility`], and a type-erased body.
//!
//! - Types implementing [`Delegate`] describe their shape once; it is built on
//!   first use and cached for the process lifetime.
//! - [`Func`] is a single closure with a shape of its own.
//! - [`DelegateRef::opaque`] wraps a value with an empty shape. It satisfies
//!   nothing but still participates in display and introspection.
//!
//! # Invariants
//!
//! - Method order within a shape is declaration order; it breaks overload ties.
//! - A method a type declares itself shadows the identically keyed method it
//!   inherits through [`ShapeBuilder::extends`].
//! - Restricted methods are never selected by dispatch.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use mixin_primitives::{FromValue, IntoValue, Signature, Tag, TagSet, Ty, Typed, Value, Visibility};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::cache::TypeCache;
use crate::contract::short_type_name;
use crate::error::Failure;
use crate::passthrough::CallFault;

mod set;

pub use set::DelegateSet;


static SHAPES: LazyLock<TypeCache<Shape>> = LazyLock::new(|| TypeCache::new("shapes"));

/// Type-erased method body: receiver and positional arguments in, value out.
pub type RawMethod = Arc<dyn Fn(&(dyn Any + Send + Sync), &[Value]) -> Result<Value, CallFault> + Send + Sync>;

/// A host type that exposes methods to dispatch.
pub trait Delegate: Any + Send + Sync {
	/// Describes the type's methods and tags.
	fn shape(shape: &mut ShapeBuilder<Self>)
	where
		Self: Sized;
}

/// One entry in a delegate's method table.
#[derive(Clone)]
pub struct ShapeMethod {
	pub sig: Signature,
	pub visibility: Visibility,
	/// Type that declared the method; differs from the shape's type for inherited entries.
	pub origin: &'static str,
	pub(crate) raw: RawMethod,
}

impl fmt::Debug for ShapeMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ShapeMethod")
			.field("sig", &self.sig)
			.field("visibility", &self.visibility)
			.field("origin", &self.origin)
			.finish_non_exhaustive()
	}
}

/// The dispatch-visible surface of a delegate type.
#[derive(Debug)]
pub struct Shape {
	type_name: &'static str,
	tags: TagSet,
	methods: Vec<ShapeMethod>,
	by_name: FxHashMap<Arc<str>, SmallVec<[usize; 2]>>,
}

impl Shape {
	/// Returns the cached shape of `T`, building it on first use.
	pub fn of<T: Delegate>() -> Arc<Shape> {
		let built = SHAPES.get_or_try_insert(TypeId::of::<T>(), || {
			let mut builder = ShapeBuilder::<T>::new();
			T::shape(&mut builder);
			let shape = builder.build();
			tracing::debug!(
				delegate = shape.type_name,
				methods = shape.methods.len(),
				tags = shape.tags.len(),
				"built delegate shape"
			);
			Ok::<_, std::convert::Infallible>(shape)
		});
		match built {
			Ok(shape) => shape,
			Err(never) => match never {},
		}
	}

	fn new(type_name: &'static str, tags: TagSet, methods: Vec<ShapeMethod>) -> Self {
		let mut by_name: FxHashMap<Arc<str>, SmallVec<[usize; 2]>> = FxHashMap::default();
		for (idx, method) in methods.iter().enumerate() {
			by_name.entry(method.sig.key.name.clone()).or_default().push(idx);
		}
		Self {
			type_name,
			tags,
			methods,
			by_name,
		}
	}

	pub(crate) fn empty(type_name: &'static str) -> Self {
		Self::new(type_name, TagSet::new(), Vec::new())
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn tags(&self) -> &TagSet {
		&self.tags
	}

	pub fn methods(&self) -> &[ShapeMethod] {
		&self.methods
	}

	pub fn method(&self, idx: usize) -> Option<&ShapeMethod> {
		self.methods.get(idx)
	}

	/// Public methods named `name`, with their indices, in declaration order.
	pub fn candidates<'a>(&'a self, name: &str) -> impl Iterator<Item = (usize, &'a ShapeMethod)> + 'a {
		self.by_name
			.get(name)
			.into_iter()
			.flatten()
			.map(|&idx| (idx, &self.methods[idx]))
			.filter(|(_, m)| m.visibility.is_public())
	}

	/// The public method with exactly these parameters, if any.
	pub fn public_method(&self, name: &str, params: &[Ty]) -> Option<&ShapeMethod> {
		self.candidates(name).map(|(_, m)| m).find(|m| m.sig.params() == params)
	}
}

/// Builder passed to [`Delegate::shape`].
pub struct ShapeBuilder<T> {
	type_name: &'static str,
	tags: TagSet,
	visibility: Visibility,
	methods: Vec<ShapeMethod>,
	inherited: Vec<ShapeMethod>,
	_marker: PhantomData<fn(&T)>,
}

fn take_arg<A: FromValue>(args: &[Value], position: usize) -> Result<A, CallFault> {
	let value = args
		.get(position)
		.cloned()
		.ok_or_else(|| CallFault::not_performed(format!("missing argument {position}")))?;
	A::from_value(value).map_err(|e| CallFault::not_performed(format!("argument {position}: {e}")))
}

macro_rules! typed_method {
	($(#[$meta:meta])* $fn_name:ident; $($arg:ident: $ty:ident @ $pos:literal),+) => {
		$(#[$meta])*
		pub fn $fn_name<$($ty,)+ R, E, F>(&mut self, name: &str, f: F) -> &mut Self
		where
			$($ty: FromValue + Typed,)+
			R: IntoValue + Typed,
			E: Into<Failure>,
			F: Fn(&T, $($ty),+) -> Result<R, E> + Send + Sync + 'static,
		{
			self.raw(name, [$(<$ty as Typed>::TY),+], R::TY, move |this, args| {
				$(let $arg = take_arg::<$ty>(args, $pos)?;)+
				f(this, $($arg),+).map(IntoValue::into_value).map_err(CallFault::raised)
			})
		}
	};
}

impl<T: Any + Send + Sync> ShapeBuilder<T> {
	fn new() -> Self {
		Self {
			type_name: short_type_name(type_name::<T>()),
			tags: TagSet::new(),
			visibility: Visibility::Public,
			methods: Vec::new(),
			inherited: Vec::new(),
			_marker: PhantomData,
		}
	}

	/// Attaches a tag to the delegate type.
	pub fn tag(&mut self, tag: Tag) -> &mut Self {
		self.tags.insert(tag);
		self
	}

	/// Sets the visibility of methods added after this call.
	pub fn with_visibility(&mut self, visibility: Visibility) -> &mut Self {
		self.visibility = visibility;
		self
	}

	/// Adds a method with an untyped body.
	pub fn raw<F>(&mut self, name: &str, params: impl IntoIterator<Item = Ty>, ret: Ty, f: F) -> &mut Self
	where
		F: Fn(&T, &[Value]) -> Result<Value, CallFault> + Send + Sync + 'static,
	{
		let type_name = self.type_name;
		let raw: RawMethod = Arc::new(move |recv: &(dyn Any + Send + Sync), args: &[Value]| {
			let this = recv
				.downcast_ref::<T>()
				.ok_or_else(|| CallFault::not_performed(format!("receiver is not a {type_name}")))?;
			f(this, args)
		});
		self.methods.push(ShapeMethod {
			sig: Signature::new(name, params, ret),
			visibility: self.visibility,
			origin: self.type_name,
			raw,
		});
		self
	}

	/// Adds a method taking no arguments.
	pub fn method0<R, E, F>(&mut self, name: &str, f: F) -> &mut Self
	where
		R: IntoValue + Typed,
		E: Into<Failure>,
		F: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
	{
		self.raw(name, [], R::TY, move |this, _| {
			f(this).map(IntoValue::into_value).map_err(CallFault::raised)
		})
	}

	typed_method!(
		/// Adds a method taking one argument.
		method1; a: A @ 0
	);
	typed_method!(method2; a: A @ 0, b: B @ 1);
	typed_method!(method3; a: A @ 0, b: B @ 1, c: C @ 2);

	/// Inherits the public methods and inherited tags of the base type `P`.
	///
	/// `project` reaches the embedded base from `T`. Methods `T` declares itself
	/// shadow inherited ones with the same name and parameters.
	pub fn extends<P: Delegate>(&mut self, project: fn(&T) -> &P) -> &mut Self {
		let base = Shape::of::<P>();
		self.tags.extend_from(&base.tags.inherited());
		let type_name = self.type_name;
		for method in base.methods.iter().filter(|m| m.visibility.is_public()) {
			let inner = method.raw.clone();
			let raw: RawMethod = Arc::new(move |recv: &(dyn Any + Send + Sync), args: &[Value]| {
				let this = recv
					.downcast_ref::<T>()
					.ok_or_else(|| CallFault::not_performed(format!("receiver is not a {type_name}")))?;
				let base: &(dyn Any + Send + Sync) = project(this);
				inner(base, args)
			});
			self.inherited.push(ShapeMethod {
				raw,
				..method.clone()
			});
		}
		self
	}

	fn build(self) -> Shape {
		let mut methods = self.methods;
		let own: Vec<_> = methods.iter().map(|m| m.sig.key.clone()).collect();
		methods.extend(self.inherited.into_iter().filter(|m| !own.contains(&m.sig.key)));
		Shape::new(self.type_name, self.tags, methods)
	}
}

/// A single-method delegate backed by a closure.
pub struct Func {
	shape: Arc<Shape>,
}

impl Func {
	/// Creates a closure delegate with an untyped body.
	pub fn new<F>(name: &str, params: impl IntoIterator<Item = Ty>, ret: Ty, body: F) -> Self
	where
		F: Fn(&[Value]) -> Result<Value, CallFault> + Send + Sync + 'static,
	{
		let raw: RawMethod = Arc::new(move |_: &(dyn Any + Send + Sync), args: &[Value]| body(args));
		let method = ShapeMethod {
			sig: Signature::new(name, params, ret),
			visibility: Visibility::Public,
			origin: "Func",
			raw,
		};
		Self {
			shape: Arc::new(Shape::new("Func", TagSet::new(), vec![method])),
		}
	}

	/// Creates a closure delegate taking no arguments.
	pub fn of0<R, E, F>(name: &str, f: F) -> Self
	where
		R: IntoValue + Typed,
		E: Into<Failure>,
		F: Fn() -> Result<R, E> + Send + Sync + 'static,
	{
		Self::new(name, [], R::TY, move |_| f().map(IntoValue::into_value).map_err(CallFault::raised))
	}

	/// Creates a closure delegate taking one argument.
	pub fn of1<A, R, E, F>(name: &str, f: F) -> Self
	where
		A: FromValue + Typed,
		R: IntoValue + Typed,
		E: Into<Failure>,
		F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
	{
		Self::new(name, [A::TY], R::TY, move |args| {
			let a = take_arg::<A>(args, 0)?;
			f(a).map(IntoValue::into_value).map_err(CallFault::raised)
		})
	}

	pub fn signature(&self) -> &Signature {
		&self.shape.methods[0].sig
	}
}

impl fmt::Debug for Func {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Func").field(&self.signature().to_string()).finish()
	}
}

/// A delegate instance paired with its shape.
#[derive(Clone)]
pub struct DelegateRef {
	object: Arc<dyn Any + Send + Sync>,
	shape: Arc<Shape>,
}

impl DelegateRef {
	pub fn new<T: Delegate>(value: T) -> Self {
		Self::shared(Arc::new(value))
	}

	/// Wraps an already shared delegate; the caller keeps its own handle.
	pub fn shared<T: Delegate>(value: Arc<T>) -> Self {
		Self {
			object: value,
			shape: Shape::of::<T>(),
		}
	}

	/// Wraps a value that exposes no methods.
	pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
		Self {
			object: Arc::new(value),
			shape: Arc::new(Shape::empty(short_type_name(type_name::<T>()))),
		}
	}

	pub fn type_name(&self) -> &'static str {
		self.shape.type_name
	}

	pub fn tags(&self) -> &TagSet {
		&self.shape.tags
	}

	pub fn shape(&self) -> &Shape {
		&self.shape
	}

	pub fn object(&self) -> &Arc<dyn Any + Send + Sync> {
		&self.object
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.object.downcast_ref::<T>()
	}

	/// Returns true if both refer to the same delegate instance.
	pub fn ptr_eq(&self, other: &DelegateRef) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(&self.object), Arc::as_ptr(&other.object))
	}

	/// The delegate as a dynamic value.
	pub fn to_value(&self) -> Value {
		Value::Object(self.object.clone())
	}
}

impl fmt::Debug for DelegateRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DelegateRef")
			.field("type", &self.shape.type_name)
			.field("methods", &self.shape.methods.len())
			.finish()
	}
}

impl<T: Delegate> From<T> for DelegateRef {
	fn from(value: T) -> Self {
		Self::new(value)
	}
}

impl<T: Delegate> From<Arc<T>> for DelegateRef {
	fn from(value: Arc<T>) -> Self {
		Self::shared(value)
	}
}

impl From<Func> for DelegateRef {
	fn from(func: Func) -> Self {
		let shape = func.shape.clone();
		Self {
			object: Arc::new(func),
			shape,
		}
	}
}
