//! Declarative node descriptors, as produced by a render pass.

use crate::{
	attach::{classify, Attachment},
	object::{same_object, ObjectRef},
	value::{Props, Value},
};
use core::{
	cell::{OnceCell, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;

/// An immutable (per render pass) declarative node: `{ kind, props, children }` plus the structural extras
/// (`key`, `ref`, the hidden signal) that never reach the scene object as props.
///
/// Cloning is cheap. The builder methods copy on write.
#[derive(Clone)]
pub struct Element(Rc<Inner>);

#[derive(Clone)]
struct Inner {
	kind: String,
	key: Option<String>,
	props: Props,
	children: Vec<Element>,
	node_ref: Option<NodeRef>,
	hidden: bool,
	attachment: OnceCell<Option<Attachment>>,
}

impl Element {
	#[must_use]
	pub fn new(kind: impl Into<String>) -> Self {
		Self(Rc::new(Inner {
			kind: kind.into(),
			key: None,
			props: Props::new(),
			children: Vec::new(),
			node_ref: None,
			hidden: false,
			attachment: OnceCell::new(),
		}))
	}

	fn inner_mut(&mut self) -> &mut Inner {
		let inner = Rc::make_mut(&mut self.0);
		inner.attachment = OnceCell::new();
		inner
	}

	#[must_use]
	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		self.inner_mut().key = Some(key.into());
		self
	}

	#[must_use]
	pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.inner_mut().props.insert(key, value);
		self
	}

	#[must_use]
	pub fn with_props(mut self, props: Props) -> Self {
		let inner = self.inner_mut();
		inner.props = inner.props.merged(&props);
		self
	}

	#[must_use]
	pub fn with_child(mut self, child: Element) -> Self {
		self.inner_mut().children.push(child);
		self
	}

	#[must_use]
	pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
		self.inner_mut().children.extend(children);
		self
	}

	#[must_use]
	pub fn with_ref(mut self, node_ref: NodeRef) -> Self {
		self.inner_mut().node_ref = Some(node_ref);
		self
	}

	/// Sets the framework's hidden signal (as used by suspense-like boundaries).
	#[must_use]
	pub fn with_hidden(mut self, hidden: bool) -> Self {
		self.inner_mut().hidden = hidden;
		self
	}

	#[must_use]
	pub fn kind(&self) -> &str {
		&self.0.kind
	}

	#[must_use]
	pub fn key(&self) -> Option<&str> {
		self.0.key.as_deref()
	}

	#[must_use]
	pub fn props(&self) -> &Props {
		&self.0.props
	}

	#[must_use]
	pub fn children(&self) -> &[Element] {
		&self.0.children
	}

	#[must_use]
	pub fn node_ref(&self) -> Option<&NodeRef> {
		self.0.node_ref.as_ref()
	}

	#[must_use]
	pub fn is_hidden(&self) -> bool {
		self.0.hidden
	}

	/// How this node attaches to its parent, computed once per descriptor.
	///
	/// An injected `object` takes part in the inference through its runtime category.
	#[must_use]
	pub fn attachment(&self) -> Option<Attachment> {
		self.0
			.attachment
			.get_or_init(|| {
				let inner = &self.0;
				match inner.props.get("object").and_then(Value::as_object).map(|object| object.try_borrow()) {
					Some(Ok(object)) => classify(&inner.kind, &inner.props, Some(&*object)),
					_ => classify(&inner.kind, &inner.props, None),
				}
			})
			.clone()
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Structural equality: same kind and key, shallowly equal props, and recursively same-shaped children.
	#[must_use]
	pub fn same_shape(&self, other: &Self) -> bool {
		self.ptr_eq(other)
			|| (self.0.kind == other.0.kind
				&& self.0.key == other.0.key
				&& self.0.props.shallow_eq(&other.0.props)
				&& self.0.children.len() == other.0.children.len()
				&& self.0.children.iter().zip(other.0.children.iter()).all(|(a, b)| a.same_shape(b)))
	}
}

impl Debug for Element {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("Element");
		debug.field("kind", &self.0.kind);
		if let Some(key) = &self.0.key {
			debug.field("key", key);
		}
		debug.field("props", &self.0.props).field("children", &self.0.children);
		if self.0.hidden {
			debug.field("hidden", &true);
		}
		debug.finish()
	}
}

/// An external reference handle that observes the live object of a node.
#[derive(Clone)]
pub enum NodeRef {
	/// A `{ current }` slot.
	Slot(Rc<RefCell<Option<ObjectRef>>>),
	/// Called with the new live object, or `None` on release.
	Callback(Rc<dyn Fn(Option<ObjectRef>)>),
}

impl NodeRef {
	#[must_use]
	pub fn new_slot() -> Self {
		Self::Slot(Rc::default())
	}

	pub fn callback(callback: impl Fn(Option<ObjectRef>) + 'static) -> Self {
		Self::Callback(Rc::new(callback))
	}

	/// The observed object, for [`NodeRef::Slot`]s.
	#[must_use]
	pub fn current(&self) -> Option<ObjectRef> {
		match self {
			Self::Slot(slot) => slot.borrow().clone(),
			Self::Callback(_) => None,
		}
	}

	pub(crate) fn set(&self, object: Option<ObjectRef>) {
		match self {
			Self::Slot(slot) => *slot.borrow_mut() = object,
			Self::Callback(callback) => callback(object),
		}
	}

	/// Whether `self` currently observes `object`.
	#[must_use]
	pub fn points_to(&self, object: &ObjectRef) -> bool {
		self.current().map_or(false, |current| same_object(&current, object))
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Slot(a), Self::Slot(b)) => Rc::ptr_eq(a, b),
			(Self::Callback(a), Self::Callback(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			_ => false,
		}
	}
}

impl Debug for NodeRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Slot(slot) => f.debug_tuple("Slot").field(&slot.try_borrow().map(|current| current.is_some()).ok()).finish(),
			Self::Callback(callback) => write!(f, "Callback({:p})", Rc::as_ptr(callback).cast::<()>()),
		}
	}
}
