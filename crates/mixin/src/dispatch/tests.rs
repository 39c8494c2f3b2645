use std::convert::Infallible;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use mixin_primitives::{Tag, Ty, Value};
use pretty_assertions::assert_eq;

use super::*;
use crate::config::{DispatchConfig, OverloadPolicy};
use crate::contract::{ContractDecl, Introspect};
use crate::delegate::{Delegate, Func, ShapeBuilder};
use crate::{create, delegates};

struct Bob;

impl Contract for Bob {
	fn declare(decl: &mut ContractDecl) {
		decl.method("throw_down", [Ty::Str], Ty::Int)
			.tag(Tag::new("Cool"))
			.raises::<io::Error>();
	}
}

struct Testy;

impl Contract for Testy {
	fn declare(decl: &mut ContractDecl) {
		decl.extends::<Bob>().extends::<Introspect>();
		decl.method("quack", [Ty::Int], Ty::Str);
		decl.method("die", [], Ty::Unit).raises::<io::Error>();
	}
}

const QUACKERS: &str = "Quack! Quack! Bob!";

struct Duck;

impl Delegate for Duck {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.method1("quack", |_: &Duck, _: i64| Ok::<_, Infallible>(QUACKERS));
	}
}

struct Die;

impl Delegate for Die {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.method0("die", |_: &Die| Err::<(), _>(io::Error::other("Oh noes!")));
	}
}

/// Panic payload standing in for an unchecked failure.
#[derive(Debug, PartialEq)]
struct IoFault(&'static str);

struct DieHarder;

impl Delegate for DieHarder {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.method0("die", |_: &DieHarder| -> Result<(), Infallible> {
			panic::panic_any(IoFault("Oh noes!"))
		});
	}
}

struct Named(&'static str);

impl Delegate for Named {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.method0("to_string", |n: &Named| Ok::<_, Infallible>(n.0));
	}
}

struct PreBob;

impl Delegate for PreBob {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.tag(Tag::new("Beans").inherited());
	}
}

struct UnBob {
	base: PreBob,
}

impl Delegate for UnBob {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.extends::<PreBob>(|u| &u.base);
		shape.method1("throw_down", |_: &UnBob, _: String| Ok::<_, Infallible>(0i64));
	}
}

fn roll(result: i64) -> Func {
	Func::of1("throw_down", move |_: String| Ok::<_, Infallible>(result))
}

#[test]
fn test_display_uses_delegate_to_string() {
	let testy = create::<Testy>(delegates![Named("bob")]).unwrap();
	assert_eq!(testy.to_string(), "bob");
}

#[test]
fn test_display_falls_back_to_structure() {
	let testy = create::<Testy>(delegates![Duck, Die]).unwrap();
	assert_eq!(testy.to_string(), "Testy[Duck, Die]");
}

struct Counted;

impl Delegate for Counted {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.method0("to_string", |_: &Counted| Ok::<_, Infallible>(7i64));
	}
}

/// A `to_string` with the wrong return type is skipped in favour of a later one.
#[test]
fn test_display_skips_non_string_to_string() {
	let testy = create::<Testy>(delegates![Counted, Named("bob")]).unwrap();
	assert_eq!(testy.to_string(), "bob");

	let alone = create::<Testy>(delegates![Counted]).unwrap();
	assert_eq!(alone.to_string(), "Testy[Counted]");
}

#[test]
fn test_static_type() {
	let testy = create::<Testy>(delegates![roll(13)]).unwrap();
	assert_eq!(testy.call::<i64>("throw_down", ("Hoe down!",)).unwrap(), 13);
}

#[test]
fn test_picks_first_match() {
	let testy = create::<Testy>(delegates![roll(14), roll(13)]).unwrap();
	assert_eq!(testy.call::<i64>("throw_down", ("Hoe down!",)).unwrap(), 14);
}

/// A delegate that never names the contract still serves it structurally.
#[test]
fn test_duck_type() {
	let testy = create::<Testy>(delegates![Duck]).unwrap();
	assert_eq!(testy.call::<String>("quack", (3i64,)).unwrap(), QUACKERS);
}

#[test]
fn test_passes_through_declared_failure_from_duck_typing() {
	let testy = create::<Testy>(delegates![Die]).unwrap();
	let err = testy.invoke("die", ()).unwrap_err();
	assert!(err.is_raised());
	assert_eq!(err.to_string(), "Oh noes!");
	let io = err.downcast::<io::Error>().unwrap();
	assert_eq!(io.kind(), io::ErrorKind::Other);
}

struct Forwarder {
	inner: Mixin<Testy>,
}

impl Delegate for Forwarder {
	fn shape(shape: &mut ShapeBuilder<Self>) {
		shape.method0("die", |f: &Forwarder| f.inner.call::<()>("die", ()));
	}
}

/// A delegate forwarding to another instance surfaces the innermost failure.
#[test]
fn test_passes_through_failure_across_nested_instances() {
	let inner = create::<Testy>(delegates![Die]).unwrap();
	let middle = create::<Testy>(delegates![Forwarder { inner }]).unwrap();
	let outer = create::<Testy>(delegates![Forwarder { inner: middle }]).unwrap();

	let err = outer.invoke("die", ()).unwrap_err();
	assert!(err.is_raised());
	assert_eq!(err.to_string(), "Oh noes!");
	assert!(err.downcast_ref::<InvokeError>().is_none());
	assert_eq!(err.downcast::<io::Error>().unwrap().kind(), io::ErrorKind::Other);
}

/// Non-raised errors of a nested instance arrive as the raised failure itself.
#[test]
fn test_nested_unimplemented_is_raised_once() {
	let inner = create::<Testy>(DelegateSet::empty()).unwrap();
	let outer = create::<Testy>(delegates![Forwarder { inner }]).unwrap();

	let err = outer.invoke("die", ()).unwrap_err();
	assert!(err.is_raised());
	assert!(matches!(err.downcast_ref::<InvokeError>(), Some(InvokeError::Unimplemented { .. })));
}

#[test]
fn test_passes_through_panic_from_duck_typing() {
	let testy = create::<Testy>(delegates![DieHarder, Duck]).unwrap();
	let payload = panic::catch_unwind(AssertUnwindSafe(|| testy.invoke("die", ()))).unwrap_err();
	assert_eq!(payload.downcast_ref::<IoFault>(), Some(&IoFault("Oh noes!")));

	// The instance survives the unwind.
	assert_eq!(testy.call::<String>("quack", (1i64,)).unwrap(), QUACKERS);
}

#[test]
fn test_passes_through_failure_from_static_typing() {
	let horror = Func::of1("throw_down", |_: String| Err::<i64, _>(io::Error::other("The horror!")));
	let testy = create::<Testy>(delegates![horror]).unwrap();
	let err = testy.call::<i64>("throw_down", ("not used",)).unwrap_err();
	assert_eq!(err.downcast_ref::<io::Error>().map(ToString::to_string), Some("The horror!".into()));
}

#[test]
fn test_passes_through_panic_from_static_typing() {
	let horror = Func::of1("throw_down", |_: String| -> Result<i64, Infallible> {
		panic::panic_any(IoFault("The horror!"))
	});
	let testy = create::<Testy>(delegates![horror]).unwrap();
	let payload = panic::catch_unwind(AssertUnwindSafe(|| testy.invoke("throw_down", ("not used",)))).unwrap_err();
	assert_eq!(payload.downcast_ref::<IoFault>(), Some(&IoFault("The horror!")));
}

/// Inherited delegate type tags are visible through the introspection accessor.
#[test]
fn test_delegate_type_tags_via_introspection() {
	let testy = create::<Testy>(delegates![UnBob { base: PreBob }]).unwrap();
	let listed = testy.invoke(INTROSPECT_METHOD, ()).unwrap();
	let listed = listed.as_list().unwrap();
	assert_eq!(listed.len(), 1);
	assert!(listed[0].downcast_ref::<UnBob>().is_some());
	assert!(testy.delegates().iter().any(|d| d.tags().contains("Beans")));
}

#[test]
fn test_method_tags_via_instance() {
	let testy = create::<Testy>(delegates![UnBob { base: PreBob }]).unwrap();
	assert!(testy.method_tags("throw_down", &[Ty::Str]).unwrap().contains("Cool"));
	assert!(testy.method_tags("quack", &[Ty::Int]).unwrap().is_empty());
	assert!(testy.method_tags("throw_down", &[Ty::Int]).is_none());
	assert!(testy.type_tags().is_empty());
	assert_eq!(testy.call::<i64>("throw_down", ("x",)).unwrap(), 0);
}

#[test]
fn test_unimplemented_runs_nothing() {
	let testy = create::<Testy>(delegates![DelegateRef::opaque(())]).unwrap();
	match testy.invoke("die", ()).unwrap_err() {
		InvokeError::Unimplemented { contract, method } => {
			assert_eq!(contract, "Testy");
			assert_eq!(method.to_string(), "die()");
		}
		other => panic!("unexpected error: {other}"),
	}
}

#[test]
fn test_unknown_method() {
	let testy = create::<Testy>(delegates![Duck]).unwrap();
	let err = testy.invoke("throw_down", (1i64,)).unwrap_err();
	assert_eq!(err.to_string(), "no method throw_down(int) on Testy");
}

struct DefaultMethodPublic;

impl Contract for DefaultMethodPublic {
	fn declare(decl: &mut ContractDecl) {
		decl.method("foo", [], Ty::Unit).default_value(());
	}
}

struct DefaultMethodOther;

impl Contract for DefaultMethodOther {
	fn declare(decl: &mut ContractDecl) {
		decl.method("bar", [], Ty::Unit).default_value(());
	}
}

struct DescendantWithDefaultMethod;

impl Contract for DescendantWithDefaultMethod {
	fn declare(decl: &mut ContractDecl) {
		decl.extends::<DefaultMethodPublic>().extends::<DefaultMethodOther>();
	}
}

struct DefaultMethodValue;

impl Contract for DefaultMethodValue {
	fn declare(decl: &mut ContractDecl) {
		decl.method("foo", [], Ty::Int).default_value(3i64);
	}
}

struct DefaultMethodNotPublic;

impl Contract for DefaultMethodNotPublic {
	fn declare(decl: &mut ContractDecl) {
		decl.restricted();
		decl.method("foo", [], Ty::Unit).default_value(());
	}
}

#[test]
fn test_finds_default_method() {
	let mixin = Mixin::<DefaultMethodPublic>::new(DelegateSet::empty()).unwrap();
	assert_eq!(mixin.invoke("foo", ()).unwrap(), Value::Unit);
}

#[test]
fn test_finds_default_methods_on_two_contracts() {
	let mixin = Mixin::<DescendantWithDefaultMethod>::new(DelegateSet::empty()).unwrap();
	assert_eq!(mixin.invoke("bar", ()).unwrap(), Value::Unit);
	assert_eq!(mixin.invoke("foo", ()).unwrap(), Value::Unit);
}

#[test]
fn test_uses_default_value() {
	let mixin = create::<DefaultMethodValue>(DelegateSet::empty()).unwrap();
	assert_eq!(mixin.call::<i64>("foo", ()).unwrap(), 3);
}

#[test]
fn test_delegate_overrides_default_value() {
	let mixin = create::<DefaultMethodValue>(delegates![Func::of0("foo", || Ok::<_, Infallible>(6i64))]).unwrap();
	assert_eq!(mixin.call::<i64>("foo", ()).unwrap(), 6);
}

#[test]
fn test_restricted_default_is_access_violation() {
	let mixin = create::<DefaultMethodNotPublic>(DelegateSet::empty()).unwrap();
	match mixin.invoke("foo", ()).unwrap_err() {
		InvokeError::AccessViolation { declared_in, .. } => assert_eq!(declared_in, "DefaultMethodNotPublic"),
		other => panic!("unexpected error: {other}"),
	}
}

struct WithStaticMethod;

impl Contract for WithStaticMethod {
	fn declare(decl: &mut ContractDecl) {
		decl.static_method("static_method", [], Ty::Unit);
	}
}

#[test]
fn test_static_members_are_ignored() {
	let mixin = create::<WithStaticMethod>(DelegateSet::empty()).unwrap();
	assert!(mixin.contract().methods().is_empty());
	assert!(matches!(
		mixin.invoke("static_method", ()),
		Err(InvokeError::UnknownMethod { .. })
	));
}

struct Greeter;

impl Contract for Greeter {
	fn declare(decl: &mut ContractDecl) {
		decl.method("name", [], Ty::Str);
		decl.method("greet", [], Ty::Str).default_body(|this, _| {
			let name: String = this.call("name", ())?;
			Ok(Value::Str(format!("hello, {name}").into()))
		});
	}
}

/// A default body receives the instance and may call back into it.
#[test]
fn test_default_body_calls_back_into_instance() {
	let named = create::<Greeter>(delegates![Func::of0("name", || Ok::<_, Infallible>("bob"))]).unwrap();
	assert_eq!(named.call::<String>("greet", ()).unwrap(), "hello, bob");

	let anonymous = create::<Greeter>(DelegateSet::empty()).unwrap();
	assert!(matches!(
		anonymous.invoke("greet", ()),
		Err(InvokeError::Unimplemented { .. })
	));
}

#[test]
fn test_resolution_is_cached() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counted = calls.clone();
	let testy = create::<Testy>(delegates![Func::of1("throw_down", move |_: String| {
		counted.fetch_add(1, Ordering::SeqCst);
		Ok::<_, Infallible>(3i64)
	})])
	.unwrap();
	assert_eq!(testy.resolved_count(), 0);

	assert_eq!(testy.call::<i64>("throw_down", ("a",)).unwrap(), 3);
	let id = testy.contract().find("throw_down", &[Ty::Str]).unwrap().id();
	let first = testy.resolution(id);
	assert_eq!(testy.call::<i64>("throw_down", ("b",)).unwrap(), 3);
	assert_eq!(testy.resolution(id), first);
	assert_eq!(testy.resolved_count(), 1);
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_first_calls_agree() {
	let testy = create::<Testy>(delegates![roll(14), roll(13)]).unwrap();
	let handles: Vec<_> = (0..8)
		.map(|_| {
			let testy = testy.clone();
			thread::spawn(move || testy.call::<i64>("throw_down", ("race",)).unwrap())
		})
		.collect();
	for handle in handles {
		assert_eq!(handle.join().unwrap(), 14);
	}
	assert_eq!(testy.resolved_count(), 1);
}

#[test]
fn test_eager_resolution() {
	let testy = Mixin::<Testy>::builder()
		.delegate(Duck)
		.config(DispatchConfig::default().with_eager(true))
		.build()
		.unwrap();
	assert_eq!(testy.resolved_count(), testy.contract().methods().len());
	assert_eq!(testy.call::<String>("quack", (1i64,)).unwrap(), QUACKERS);
}

#[test]
fn test_return_type_checked() {
	let liar = || Func::new("throw_down", [Ty::Str], Ty::Int, |_| Ok(Value::Str("six".into())));

	let checked = create::<Testy>(delegates![liar()]).unwrap();
	let err = checked.invoke("throw_down", ("x",)).unwrap_err();
	assert!(matches!(err, InvokeError::Invocation { .. }), "{err}");

	let unchecked = Mixin::<Testy>::builder()
		.delegates(delegates![liar()])
		.config(DispatchConfig::default().with_check_returns(false))
		.build()
		.unwrap();
	assert_eq!(unchecked.invoke("throw_down", ("x",)).unwrap(), Value::Str("six".into()));
}

#[test]
fn test_invoke_by_method_id() {
	let testy = create::<Testy>(delegates![Duck]).unwrap();
	let quack = testy.contract().find("quack", &[Ty::Int]).unwrap().id();
	assert_eq!(testy.invoke_method(quack, &[Value::Int(2)]).unwrap(), Value::Str(QUACKERS.into()));
	assert!(matches!(
		testy.invoke_method(quack, &[Value::Str("two".into())]),
		Err(InvokeError::Invocation { .. })
	));
}

/// Ids are bound to their contract; an in-range foreign id is rejected.
#[test]
fn test_invoke_rejects_foreign_method_id() {
	let testy = create::<Testy>(delegates![roll(1)]).unwrap();
	let foreign = Mixin::<DefaultMethodPublic>::new(DelegateSet::empty()).unwrap();
	let foo = foreign.contract().find("foo", &[]).unwrap().id();
	assert_eq!(foo.as_usize(), 0);
	assert_ne!(foo.contract(), testy.contract().type_id());

	match testy.invoke_method(foo, &[]).unwrap_err() {
		InvokeError::Invocation { method, reason } => {
			assert_eq!(method, "#0");
			assert_eq!(reason, "not a method of Testy");
		}
		other => panic!("unexpected error: {other}"),
	}
	assert!(testy.contract().get(foo).is_none());
	assert_eq!(testy.resolved_count(), 0);
}

#[test]
#[should_panic(expected = "method id of another contract")]
fn test_resolution_panics_on_foreign_method_id() {
	let testy = create::<Testy>(delegates![roll(1)]).unwrap();
	let foo = Mixin::<DefaultMethodPublic>::new(DelegateSet::empty())
		.unwrap()
		.contract()
		.find("foo", &[])
		.unwrap()
		.id();
	let _ = testy.resolution(foo);
}

#[test]
fn test_first_declared_policy_applies() {
	struct Loose;

	impl Delegate for Loose {
		fn shape(shape: &mut ShapeBuilder<Self>) {
			shape.method1("quack", |_: &Loose, _: Value| Ok::<_, Infallible>("loose"));
			shape.method1("quack", |_: &Loose, _: i64| Ok::<_, Infallible>("exact"));
		}
	}

	let exact = create::<Testy>(delegates![Loose]).unwrap();
	assert_eq!(exact.call::<String>("quack", (1i64,)).unwrap(), "exact");

	let first = Mixin::<Testy>::builder()
		.delegate(Loose)
		.config(DispatchConfig::default().with_overloads(OverloadPolicy::FirstDeclared))
		.build()
		.unwrap();
	assert_eq!(first.call::<String>("quack", (1i64,)).unwrap(), "loose");
}

struct Left;
struct Right;
struct Both;

impl Contract for Left {
	fn declare(decl: &mut ContractDecl) {
		decl.method("side", [], Ty::Str).default_value("left");
	}
}

impl Contract for Right {
	fn declare(decl: &mut ContractDecl) {
		decl.method("side", [], Ty::Str).default_value("right");
	}
}

impl Contract for Both {
	fn declare(decl: &mut ContractDecl) {
		decl.extends::<Left>().extends::<Right>();
	}
}

#[test]
fn test_construction_fails_on_ambiguous_default() {
	let err = create::<Both>(DelegateSet::empty()).unwrap_err();
	assert!(matches!(err, ContractError::AmbiguousDefault { .. }));
}

#[test]
fn test_erased_dispatcher_shares_state() {
	let testy = create::<Testy>(delegates![roll(5)]).unwrap();
	let erased: Arc<Dispatcher> = testy.clone().into_dispatcher();
	assert!(Arc::ptr_eq(&erased, testy.dispatcher()));
	assert_eq!(erased.call::<i64>("throw_down", ("x",)).unwrap(), 5);
	assert_eq!(testy.resolved_count(), 1);
}
