//! The boundary to the external scene-graph library.
//!
//! Objects never get probed for arbitrary methods at mutation time. Instead, each type describes what it can do
//! through a [`Capabilities`] table once (on its [`Constructor`] and on each constructed [`SceneObject`]),
//! and the reconciler resolves operations against that table.

use crate::{
	attach::Category,
	value::{Handler, Value},
};
use core::{any::Any, cell::RefCell};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

/// A shared, mutable handle to a live scene object.
pub type ObjectRef = Rc<RefCell<dyn SceneObject>>;

/// Wraps a concrete scene object into an [`ObjectRef`].
pub fn object<T: SceneObject>(object: T) -> ObjectRef {
	Rc::new(RefCell::new(object))
}

/// Whether `a` and `b` are the same live object.
#[must_use]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
	Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

/// Returned by [`SceneObject`] operations the object doesn't support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation not supported by this scene object")]
pub struct Unsupported;

/// A live object of the external scene-graph library.
///
/// Every operation defaults to [`Unsupported`] (or nothing), so implementations only spell out what they
/// declare in their [`Capabilities`]. The reconciler checks the capabilities before calling any of these.
///
/// Slot names are singular throughout: a multi-slot `"layer"` corresponds to `getLayers`, `addLayer`,
/// `removeLayer`, `hasLayer` and `setLayers` in a reflective library.
pub trait SceneObject: Any {
	fn type_name(&self) -> &str;

	fn capabilities(&self) -> &Capabilities;

	/// The runtime category, used to infer attachments for raw (injected) instances.
	fn category(&self) -> Option<Category> {
		None
	}

	fn get(&self, _key: &str) -> Option<Value> {
		None
	}

	/// Both dedicated (`setX`) and generic (`set(key, value)`) setters land here.
	fn set(&mut self, _key: &str, _value: Value) -> Result<(), Unsupported> {
		Err(Unsupported)
	}

	/// The current members of the ordered collection `slot`.
	fn collection(&self, _slot: &str) -> Option<Vec<ObjectRef>> {
		None
	}

	fn add(&mut self, _slot: &str, _child: ObjectRef) -> Result<(), Unsupported> {
		Err(Unsupported)
	}

	fn remove(&mut self, _slot: &str, _child: &ObjectRef) -> Result<(), Unsupported> {
		Err(Unsupported)
	}

	/// A native containment check. `None` means the reconciler should search [`SceneObject::collection`] instead.
	fn contains(&self, _slot: &str, _child: &ObjectRef) -> Option<bool> {
		None
	}

	/// Replaces the whole collection `slot`.
	fn replace_collection(&mut self, _slot: &str, _children: Vec<ObjectRef>) -> Result<(), Unsupported> {
		Err(Unsupported)
	}

	fn on(&mut self, _event: &str, _handler: Handler) -> Result<(), Unsupported> {
		Err(Unsupported)
	}

	fn un(&mut self, _event: &str, _handler: &Handler) -> Result<(), Unsupported> {
		Err(Unsupported)
	}

	fn set_visible(&mut self, _visible: bool) -> Result<(), Unsupported> {
		Err(Unsupported)
	}

	/// Explicit recompute request for containers that don't observe their children through setters.
	fn changed(&mut self) {}

	fn dispose(&mut self) {}

	fn as_any(&self) -> &dyn Any;

	fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// How a single property key can be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setter {
	/// The type has a dedicated `setX`.
	Dedicated,
	/// The type only has a generic `set(key, value)`.
	Generic,
}

/// The operations available on a multi-slot collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Collection {
	/// `addX` and `removeX`.
	pub add: bool,
	/// `hasX`.
	pub contains: bool,
	/// `setXs`, replacing the whole sequence.
	pub replace: bool,
}

impl Collection {
	#[must_use]
	pub fn full() -> Self {
		Self { add: true, contains: true, replace: true }
	}
}

/// The reflection table of a scene-graph type.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
	setters: HashSet<String>,
	generic: bool,
	collections: HashMap<String, Collection>,
	events: bool,
	visibility: bool,
	changed: bool,
}

impl Capabilities {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Declares a dedicated setter for `key`. Single-slot attachments are declared this way too.
	#[must_use]
	pub fn setter(mut self, key: impl Into<String>) -> Self {
		self.setters.insert(key.into());
		self
	}

	#[must_use]
	pub fn setters<K: Into<String>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
		self.setters.extend(keys.into_iter().map(Into::into));
		self
	}

	/// Declares a generic `set(key, value)` fallback.
	#[must_use]
	pub fn generic(mut self) -> Self {
		self.generic = true;
		self
	}

	#[must_use]
	pub fn collection(mut self, slot: impl Into<String>, collection: Collection) -> Self {
		self.collections.insert(slot.into(), collection);
		self
	}

	/// Declares `on`/`un`.
	#[must_use]
	pub fn events(mut self) -> Self {
		self.events = true;
		self
	}

	/// Declares a boolean visibility setter.
	#[must_use]
	pub fn visibility(mut self) -> Self {
		self.visibility = true;
		self
	}

	/// Declares a `changed()` recompute hook.
	#[must_use]
	pub fn changed(mut self) -> Self {
		self.changed = true;
		self
	}

	#[must_use]
	pub fn resolve_setter(&self, key: &str) -> Option<Setter> {
		if self.setters.contains(key) {
			Some(Setter::Dedicated)
		} else if self.generic {
			Some(Setter::Generic)
		} else {
			None
		}
	}

	#[must_use]
	pub fn has_dedicated_setter(&self, key: &str) -> bool {
		self.setters.contains(key)
	}

	#[must_use]
	pub fn resolve_collection(&self, slot: &str) -> Option<Collection> {
		self.collections.get(slot).copied()
	}

	#[must_use]
	pub fn has_events(&self) -> bool {
		self.events
	}

	#[must_use]
	pub fn has_visibility(&self) -> bool {
		self.visibility
	}

	#[must_use]
	pub fn has_changed(&self) -> bool {
		self.changed
	}
}

/// Constructor arguments.
#[derive(Debug, Clone)]
pub enum ConstructorArgs {
	/// Ordered positional arguments.
	Positional(Vec<Value>),
	/// A single (usually [`Value::Record`]) configuration argument.
	Config(Value),
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConstructError(pub String);

/// A constructible scene-graph type, as registered in the [catalogue](`crate::catalogue`).
pub trait Constructor {
	/// The capabilities every instance of this type has, known before construction.
	fn capabilities(&self) -> &Capabilities;

	/// # Errors
	///
	/// Iff the library rejects `args`.
	fn construct(&self, args: ConstructorArgs) -> Result<ObjectRef, ConstructError>;
}
