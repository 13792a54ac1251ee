//! The type resolver: maps declarative type names to [`Constructor`]s.
//!
//! The catalogue is per-thread process state, seeded with an empty namespace for each default suffix
//! and extended additively through [`extend`].
//!
//! Resolution order for a type name like `vectorLayer`:
//!
//! 1. exact entries (`vectorLayer`, then `VectorLayer`),
//! 2. namespaces whose suffix pattern matches (`*Layer` → `Vector`), longest suffix first,
//! 3. the library's top-level namespace (`VectorLayer`).

use crate::{error::ReconcileError, object::Constructor, value::pascal_case};
use core::cell::RefCell;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{instrument, trace, warn};

pub type ConstructorRef = Rc<dyn Constructor>;

/// Key under which the library's top-level namespace is extended.
pub const LIBRARY: &str = "*";

/// Suffix patterns seeded into every catalogue.
pub const DEFAULT_NAMESPACES: [&str; 6] = ["*Layer", "*Source", "*Interaction", "*Geometry", "*Style", "*Control"];

/// A named sub-catalogue, keyed by PascalCase names without the namespace suffix.
#[derive(Clone, Default)]
pub struct Namespace(HashMap<String, ConstructorRef>);

impl Namespace {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<String>, constructor: ConstructorRef) -> Self {
		self.0.insert(name.into(), constructor);
		self
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&ConstructorRef> {
		self.0.get(name)
	}

	fn merge(&mut self, other: Namespace) {
		self.0.extend(other.0);
	}
}

/// A catalogue entry, as passed to [`extend`].
#[derive(Clone)]
pub enum Entry {
	/// Keyed by its exact type name.
	Constructor(ConstructorRef),
	/// Keyed by a suffix pattern (`"*Layer"`) or [`LIBRARY`].
	Namespace(Namespace),
}

#[derive(Clone)]
pub struct Catalogue {
	exact: HashMap<String, ConstructorRef>,
	namespaces: HashMap<String, Namespace>,
	library: Namespace,
}

impl Default for Catalogue {
	fn default() -> Self {
		Self {
			exact: HashMap::new(),
			namespaces: DEFAULT_NAMESPACES.iter().map(|&pattern| (pattern[1..].to_owned(), Namespace::new())).collect(),
			library: Namespace::new(),
		}
	}
}

impl Catalogue {
	/// Additive merge. Exact keys are last-write-wins, namespaces are merged name by name.
	pub fn extend<K: Into<String>>(&mut self, entries: impl IntoIterator<Item = (K, Entry)>) {
		for (key, entry) in entries {
			let key = key.into();
			let pattern = key.strip_prefix('*').map(str::to_owned);
			match (pattern.as_deref(), entry) {
				(Some(""), Entry::Namespace(namespace)) => self.library.merge(namespace),
				(Some(suffix), Entry::Namespace(namespace)) => self.namespaces.entry(suffix.to_owned()).or_default().merge(namespace),
				(None, Entry::Constructor(constructor)) => {
					self.exact.insert(key, constructor);
				}
				(Some(_), Entry::Constructor(_)) => warn!(key = %key, "Expected a namespace for a suffix pattern key. Ignoring the entry."),
				(None, Entry::Namespace(_)) => warn!(key = %key, "Expected a constructor for an exact key. Ignoring the entry."),
			}
		}
	}

	#[must_use]
	pub fn resolve(&self, name: &str) -> Option<ConstructorRef> {
		let pascal = pascal_case(name);
		if let Some(constructor) = self.exact.get(name).or_else(|| self.exact.get(&pascal)) {
			trace!(name, "Resolved exact entry.");
			return Some(constructor.clone());
		}

		let mut suffixes: Vec<&String> = self.namespaces.keys().filter(|suffix| !suffix.is_empty() && name.len() > suffix.len() && name.ends_with(suffix.as_str())).collect();
		suffixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
		for suffix in suffixes {
			let prefix = pascal_case(&name[..name.len() - suffix.len()]);
			if let Some(constructor) = self.namespaces[suffix].get(&prefix) {
				trace!(name, suffix = suffix.as_str(), "Resolved namespaced entry.");
				return Some(constructor.clone());
			}
		}

		self.library.get(&pascal).cloned()
	}
}

thread_local! {
	static CATALOGUE: RefCell<Catalogue> = RefCell::new(Catalogue::default());
}

/// Merges `entries` into this thread's catalogue. Calling this again with the same entries changes nothing.
#[instrument(skip(entries))]
pub fn extend<K: Into<String>>(entries: impl IntoIterator<Item = (K, Entry)>) {
	CATALOGUE.with(|catalogue| catalogue.borrow_mut().extend(entries));
}

/// Resolves `name` against this thread's catalogue.
///
/// # Errors
///
/// [`ReconcileError::Unresolved`] iff no entry matches.
pub fn resolve(name: &str) -> Result<ConstructorRef, ReconcileError> {
	CATALOGUE.with(|catalogue| catalogue.borrow().resolve(name)).ok_or_else(|| ReconcileError::Unresolved(name.to_owned()))
}
