//! Contract extraction.
//!
//! # Mental Model
//!
//! 1. **Walk:** starting at the root contract, every declaration reachable via
//!    `extends` is materialized once (diamonds collapse to one node).
//! 2. **Merge:** instance methods are keyed by name and parameter types. For
//!    each key only the *maximal* declarers count: a declarer that is a strict
//!    ancestor of another declarer is overridden by it.
//! 3. **Defaults:** one default body among the maximal declarers becomes the
//!    method's default; two or more is [`ContractError::AmbiguousDefault`].
//!
//! Extraction is pure and memoized per contract type in a process-wide cache.

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, LazyLock};

use mixin_primitives::{MethodKey, Signature, TagSet, Ty, Value, Visibility};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::{Contract, ContractDecl, DefaultBody, INTROSPECT_METHOD, MethodDecl, ParentRef};
use crate::cache::TypeCache;
use crate::error::ContractError;

static CONTRACTS: LazyLock<TypeCache<ContractModel>> = LazyLock::new(|| TypeCache::new("contracts"));

/// Dense index of a required method, tagged with the contract it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
	contract: TypeId,
	index: u32,
}

impl MethodId {
	pub const fn as_usize(self) -> usize {
		self.index as usize
	}

	/// Type id of the owning contract.
	pub const fn contract(self) -> TypeId {
		self.contract
	}
}

/// A default body together with the contract that supplied it.
#[derive(Clone)]
pub struct DefaultImpl {
	pub(crate) contract: String,
	pub(crate) visibility: Visibility,
	pub(crate) body: DefaultBody,
}

impl DefaultImpl {
	/// Name of the contract whose body this is.
	pub fn contract(&self) -> &str {
		&self.contract
	}

	pub fn visibility(&self) -> Visibility {
		self.visibility
	}
}

impl fmt::Debug for DefaultImpl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DefaultImpl")
			.field("contract", &self.contract)
			.field("visibility", &self.visibility)
			.finish_non_exhaustive()
	}
}

/// A method an instance of the contract must answer.
#[derive(Debug, Clone)]
pub struct RequiredMethod {
	id: MethodId,
	sig: Signature,
	tags: TagSet,
	raises: Vec<&'static str>,
	declared_in: Vec<String>,
	default: Option<DefaultImpl>,
}

impl RequiredMethod {
	pub fn id(&self) -> MethodId {
		self.id
	}

	pub fn signature(&self) -> &Signature {
		&self.sig
	}

	pub fn key(&self) -> &MethodKey {
		&self.sig.key
	}

	pub fn name(&self) -> &str {
		self.sig.name()
	}

	pub fn params(&self) -> &[Ty] {
		self.sig.params()
	}

	pub fn ret(&self) -> Ty {
		self.sig.ret
	}

	/// Tags placed on this method by any declaring contract.
	pub fn tags(&self) -> &TagSet {
		&self.tags
	}

	/// Type names of the errors this method is declared to raise.
	pub fn raises(&self) -> &[&'static str] {
		&self.raises
	}

	/// Contracts that declare this method, most derived first.
	pub fn declared_in(&self) -> &[String] {
		&self.declared_in
	}

	pub fn default(&self) -> Option<&DefaultImpl> {
		self.default.as_ref()
	}

	pub fn has_default(&self) -> bool {
		self.default.is_some()
	}
}

/// The immutable, extracted form of a contract type.
#[derive(Debug)]
pub struct ContractModel {
	name: String,
	type_id: TypeId,
	tags: TagSet,
	all_tags: TagSet,
	hierarchy: Vec<String>,
	methods: Vec<RequiredMethod>,
	by_name: FxHashMap<Arc<str>, SmallVec<[MethodId; 2]>>,
	statics: Vec<Signature>,
}

impl ContractModel {
	/// Returns the cached model for `C`, extracting it on first use.
	pub fn of<C: Contract>() -> Result<Arc<ContractModel>, ContractError> {
		let type_id = TypeId::of::<C>();
		CONTRACTS.get_or_try_insert(type_id, || {
			let root = ParentRef::of::<C>();
			match extract(root) {
				Ok(model) => {
					tracing::debug!(
						contract = %model.name,
						methods = model.methods.len(),
						hierarchy = model.hierarchy.len(),
						cached = CONTRACTS.len(),
						"extracted contract"
					);
					Ok(model)
				}
				Err(err) => {
					tracing::warn!(contract = root.type_name, error = %err, "contract extraction failed");
					Err(err)
				}
			}
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	/// Tags attached to the root contract type.
	pub fn tags(&self) -> &TagSet {
		&self.tags
	}

	/// Tags attached to any contract in the hierarchy.
	pub fn all_tags(&self) -> &TagSet {
		&self.all_tags
	}

	/// Contract names in visit order, root first.
	pub fn hierarchy(&self) -> &[String] {
		&self.hierarchy
	}

	/// Returns true if the hierarchy includes a contract named `name`.
	pub fn extends(&self, name: &str) -> bool {
		self.hierarchy.iter().any(|h| h == name)
	}

	pub fn methods(&self) -> &[RequiredMethod] {
		&self.methods
	}

	/// # Panics
	///
	/// Panics if `id` belongs to another contract.
	pub fn method(&self, id: MethodId) -> &RequiredMethod {
		assert_eq!(id.contract, self.type_id, "method id of another contract used on {}", self.name);
		&self.methods[id.as_usize()]
	}

	/// Returns the required method for `id`, or `None` if `id` belongs to another contract.
	pub fn get(&self, id: MethodId) -> Option<&RequiredMethod> {
		if id.contract != self.type_id {
			return None;
		}
		self.methods.get(id.as_usize())
	}

	/// Static members declared anywhere in the hierarchy; never dispatched.
	pub fn statics(&self) -> &[Signature] {
		&self.statics
	}

	/// Finds a required method by exact name and parameter types.
	pub fn find(&self, name: &str, params: &[Ty]) -> Option<&RequiredMethod> {
		self.by_name
			.get(name)?
			.iter()
			.map(|id| self.method(*id))
			.find(|m| m.params() == params)
	}

	/// Selects the required method a call with `args` targets.
	///
	/// Among same-name methods accepting the argument types, one whose
	/// parameters equal the runtime types exactly is preferred.
	pub fn lookup(&self, name: &str, args: &[Value]) -> Option<&RequiredMethod> {
		let ids = self.by_name.get(name)?;
		let mut fallback = None;
		for method in ids.iter().map(|id| self.method(*id)) {
			if !method.sig.accepts(args) {
				continue;
			}
			if method.params().iter().zip(args).all(|(p, a)| *p == a.ty()) {
				return Some(method);
			}
			fallback.get_or_insert(method);
		}
		fallback
	}
}

/// One materialized declaration in the contract graph.
struct Node {
	type_id: TypeId,
	decl: ContractDecl,
	parents: Vec<usize>,
}

struct Walker {
	nodes: Vec<Node>,
	index: FxHashMap<TypeId, usize>,
	stack: Vec<TypeId>,
	root_name: String,
}

impl Walker {
	fn visit(&mut self, parent: ParentRef) -> Result<usize, ContractError> {
		if let Some(&idx) = self.index.get(&parent.type_id) {
			return Ok(idx);
		}
		if self.stack.contains(&parent.type_id) {
			return Err(ContractError::invalid(
				&self.root_name,
				format!("cyclic extends through {}", super::short_type_name(parent.type_name)),
			));
		}

		let mut decl = ContractDecl::new(parent.type_name);
		(parent.declare)(&mut decl);
		if self.root_name.is_empty() {
			self.root_name = decl.name.clone();
		}
		validate(&decl, &self.root_name)?;

		self.stack.push(parent.type_id);
		let mut parents = Vec::with_capacity(decl.parents.len());
		for grand in decl.parents.clone() {
			parents.push(self.visit(grand)?);
		}
		self.stack.pop();

		let idx = self.nodes.len();
		self.nodes.push(Node {
			type_id: parent.type_id,
			decl,
			parents,
		});
		self.index.insert(parent.type_id, idx);
		Ok(idx)
	}
}

fn validate(decl: &ContractDecl, root: &str) -> Result<(), ContractError> {
	if decl.name.trim().is_empty() {
		return Err(ContractError::invalid(root, "contract name is empty"));
	}
	let mut seen = FxHashSet::default();
	for method in &decl.methods {
		if method.sig.name().trim().is_empty() {
			return Err(ContractError::invalid(
				root,
				format!("{} declares a method with an empty name", decl.name),
			));
		}
		if method.sig.name() == INTROSPECT_METHOD && (!method.sig.params().is_empty() || method.sig.ret != Ty::List) {
			return Err(ContractError::invalid(
				root,
				format!("{} redeclares reserved method {INTROSPECT_METHOD} as {}", decl.name, method.sig),
			));
		}
		if !seen.insert(&method.sig.key) {
			return Err(ContractError::invalid(
				root,
				format!("{} declares {} twice", decl.name, method.sig.key),
			));
		}
	}
	Ok(())
}

/// Strict ancestors of every node.
fn ancestors(nodes: &[Node]) -> Vec<FxHashSet<usize>> {
	fn collect(nodes: &[Node], idx: usize, out: &mut FxHashSet<usize>) {
		for &p in &nodes[idx].parents {
			if out.insert(p) {
				collect(nodes, p, out);
			}
		}
	}
	(0..nodes.len())
		.map(|idx| {
			let mut out = FxHashSet::default();
			collect(nodes, idx, &mut out);
			out
		})
		.collect()
}

/// Node indices in pre-order from the root, each once.
fn preorder(nodes: &[Node], root: usize) -> Vec<usize> {
	fn walk(nodes: &[Node], idx: usize, seen: &mut FxHashSet<usize>, out: &mut Vec<usize>) {
		if !seen.insert(idx) {
			return;
		}
		out.push(idx);
		for &p in &nodes[idx].parents {
			walk(nodes, p, seen, out);
		}
	}
	let mut out = Vec::with_capacity(nodes.len());
	walk(nodes, root, &mut FxHashSet::default(), &mut out);
	out
}

fn extract(root: ParentRef) -> Result<ContractModel, ContractError> {
	let root_type = root.type_id;
	let mut walker = Walker {
		nodes: Vec::new(),
		index: FxHashMap::default(),
		stack: Vec::new(),
		root_name: String::new(),
	};
	let root_idx = walker.visit(root)?;
	let nodes = walker.nodes;
	let root_name = walker.root_name;
	let ancestry = ancestors(&nodes);
	let order = preorder(&nodes, root_idx);

	// Declarers per key, keyed in first-seen order.
	let mut keys: Vec<MethodKey> = Vec::new();
	let mut declarers: FxHashMap<MethodKey, Vec<(usize, &MethodDecl)>> = FxHashMap::default();
	for &n in &order {
		for method in &nodes[n].decl.methods {
			let entry = declarers.entry(method.sig.key.clone()).or_insert_with(|| {
				keys.push(method.sig.key.clone());
				Vec::new()
			});
			entry.push((n, method));
		}
	}

	let mut methods = Vec::with_capacity(keys.len());
	let mut by_name: FxHashMap<Arc<str>, SmallVec<[MethodId; 2]>> = FxHashMap::default();
	for key in keys {
		let all = &declarers[&key];
		let maximal: Vec<(usize, &MethodDecl)> = all
			.iter()
			.filter(|(n, _)| !all.iter().any(|(other, _)| ancestry[*other].contains(n)))
			.copied()
			.collect();

		let ret = narrowest_return(&maximal).ok_or_else(|| {
			ContractError::invalid(
				&root_name,
				format!("{key} has incompatible return types across contracts"),
			)
		})?;

		let mut with_default = maximal.iter().filter(|(_, m)| m.default.is_some());
		let default = match (with_default.next(), with_default.next()) {
			(None, _) => None,
			(Some((n, m)), None) => {
				let node = &nodes[*n];
				m.default.as_ref().map(|body| DefaultImpl {
					contract: node.decl.name.clone(),
					visibility: node.decl.visibility,
					body: body.clone(),
				})
			}
			(Some(_), Some(_)) => {
				let candidates = maximal
					.iter()
					.filter(|(_, m)| m.default.is_some())
					.map(|(n, _)| nodes[*n].decl.name.clone())
					.collect();
				return Err(ContractError::AmbiguousDefault {
					contract: root_name.clone(),
					method: key,
					candidates,
				});
			}
		};

		let mut tags = TagSet::new();
		let mut raises = Vec::new();
		let mut declared_in = Vec::with_capacity(all.len());
		for (n, m) in all {
			tags.extend_from(&m.tags);
			for r in &m.raises {
				if !raises.contains(r) {
					raises.push(*r);
				}
			}
			declared_in.push(nodes[*n].decl.name.clone());
		}

		let id = MethodId {
			contract: root_type,
			index: crate::u32_index(methods.len(), "contract methods"),
		};
		by_name.entry(key.name.clone()).or_default().push(id);
		methods.push(RequiredMethod {
			id,
			sig: Signature { key, ret },
			tags,
			raises,
			declared_in,
			default,
		});
	}

	let mut all_tags = TagSet::new();
	let mut statics = Vec::new();
	let mut hierarchy = Vec::with_capacity(order.len());
	for &n in &order {
		let decl = &nodes[n].decl;
		all_tags.extend_from(&decl.tags);
		statics.extend(decl.statics.iter().cloned());
		hierarchy.push(decl.name.clone());
	}

	let root_node = &nodes[root_idx];
	Ok(ContractModel {
		name: root_name,
		type_id: root_node.type_id,
		tags: root_node.decl.tags.clone(),
		all_tags,
		hierarchy,
		methods,
		by_name,
		statics,
	})
}

/// Picks the return type assignable to every maximal declarer's return slot.
fn narrowest_return(maximal: &[(usize, &MethodDecl)]) -> Option<Ty> {
	maximal
		.iter()
		.map(|(_, m)| m.sig.ret)
		.find(|candidate| maximal.iter().all(|(_, m)| m.sig.ret.is_assignable_from(*candidate)))
}
