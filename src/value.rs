//! Dynamic prop values as they appear in declarative element trees.
//!
//! Values compare the way the host adapter needs them to: scalars by value, everything
//! reference-counted by identity, with [`Value::shallow_eq`] looking one level into lists and records.

use crate::{
	element::Element,
	object::{same_object, ObjectRef},
};
use core::{
	fmt::{self, Debug, Formatter},
	hash::{Hash, Hasher},
};
use std::rc::Rc;

/// A single prop value.
#[derive(Clone, Default)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	List(Rc<[Value]>),
	Record(Rc<Props>),
	/// A live scene object, for example a hand-built instance injected through `object`.
	Object(ObjectRef),
	/// An event handler, registered through `on*` props.
	Handler(Handler),
	/// A plain function, for example an `object` factory or a behavior node's `fn`.
	Function(Callback),
	/// A declarative element, usually returned from a behavior function.
	Element(Element),
}

impl Value {
	/// Identity comparison: scalars by value, reference-counted payloads by address.
	#[must_use]
	pub fn identical(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Self::Number(a), Self::Number(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
			(Self::Record(a), Self::Record(b)) => Rc::ptr_eq(a, b),
			(Self::Object(a), Self::Object(b)) => same_object(a, b),
			(Self::Handler(a), Self::Handler(b)) => a == b,
			(Self::Function(a), Self::Function(b)) => a == b,
			(Self::Element(a), Self::Element(b)) => a.ptr_eq(b),
			_ => false,
		}
	}

	/// Like [`Value::identical`], but lists are compared element-wise and records key-by-key (each one level deep).
	#[must_use]
	pub fn shallow_eq(&self, other: &Self) -> bool {
		if self.identical(other) {
			return true;
		}
		match (self, other) {
			(Self::List(a), Self::List(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.identical(b)),
			(Self::Record(a), Self::Record(b)) => a.len() == b.len() && a.iter().all(|(key, a)| b.get(key).map_or(false, |b| a.identical(b))),
			_ => false,
		}
	}

	#[must_use]
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Self::Bool(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_f64(&self) -> Option<f64> {
		match *self {
			Self::Number(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Self::List(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_record(&self) -> Option<&Props> {
		match self {
			Self::Record(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_object(&self) -> Option<&ObjectRef> {
		match self {
			Self::Object(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_handler(&self) -> Option<&Handler> {
		match self {
			Self::Handler(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_function(&self) -> Option<&Callback> {
		match self {
			Self::Function(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_element(&self) -> Option<&Element> {
		match self {
			Self::Element(value) => Some(value),
			_ => None,
		}
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => f.write_str("Null"),
			Self::Bool(value) => Debug::fmt(value, f),
			Self::Number(value) => Debug::fmt(value, f),
			Self::String(value) => Debug::fmt(value, f),
			Self::List(values) => f.debug_list().entries(values.iter()).finish(),
			Self::Record(props) => Debug::fmt(props, f),
			Self::Object(object) => match object.try_borrow() {
				Ok(object) => write!(f, "Object({})", object.type_name()),
				Err(_) => f.write_str("Object(<borrowed>)"),
			},
			Self::Handler(handler) => Debug::fmt(handler, f),
			Self::Function(callback) => Debug::fmt(callback, f),
			Self::Element(element) => write!(f, "Element({})", element.kind()),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Number(value.into())
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(value.into())
	}
}

impl From<Vec<Value>> for Value {
	fn from(values: Vec<Value>) -> Self {
		Self::List(values.into())
	}
}

impl From<Props> for Value {
	fn from(props: Props) -> Self {
		Self::Record(Rc::new(props))
	}
}

impl From<ObjectRef> for Value {
	fn from(object: ObjectRef) -> Self {
		Self::Object(object)
	}
}

impl From<Handler> for Value {
	fn from(handler: Handler) -> Self {
		Self::Handler(handler)
	}
}

impl From<Callback> for Value {
	fn from(callback: Callback) -> Self {
		Self::Function(callback)
	}
}

impl From<Element> for Value {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

/// An insertion-ordered string-keyed record of [`Value`]s.
///
/// Keys are unique. Replacing an existing key keeps its position.
#[derive(Clone, Default)]
pub struct Props(Vec<(String, Value)>);

impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self(Vec::new())
	}

	#[must_use]
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		let key = key.into();
		let value = value.into();
		match self.0.iter_mut().find(|(k, _)| *k == key) {
			Some((_, slot)) => Some(core::mem::replace(slot, value)),
			None => {
				self.0.push((key, value));
				None
			}
		}
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		let index = self.0.iter().position(|(k, _)| k == key)?;
		Some(self.0.remove(index).1)
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
	}

	#[must_use]
	pub fn contains_key(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|(k, _)| k.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// `self` with every entry of `overrides` inserted on top.
	#[must_use]
	pub fn merged(&self, overrides: &Props) -> Props {
		let mut merged = self.clone();
		for (key, value) in overrides.iter() {
			merged.insert(key, value.clone());
		}
		merged
	}

	/// `self` without the given keys.
	#[must_use]
	pub fn pruned(&self, keys: &[&str]) -> Props {
		Self(self.0.iter().filter(|(k, _)| !keys.contains(&k.as_str())).cloned().collect())
	}

	/// Key-by-key [`Value::shallow_eq`] over both key sets.
	#[must_use]
	pub fn shallow_eq(&self, other: &Props) -> bool {
		self.len() == other.len() && self.iter().all(|(key, a)| other.get(key).map_or(false, |b| a.shallow_eq(b)))
	}
}

impl Debug for Props {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.iter()).finish()
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
	fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
		let mut props = Props::new();
		for (key, value) in iter {
			props.insert(key, value);
		}
		props
	}
}

/// An event delivered to a [`Handler`] by a scene object.
#[derive(Debug, Clone)]
pub struct Event {
	pub name: String,
	pub detail: Value,
}

impl Event {
	#[must_use]
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), detail: Value::Null }
	}
}

/// An event handler with identity semantics: clones compare equal, separately created handlers never do.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
	pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
		Self(Rc::new(handler))
	}

	pub fn call(&self, event: &Event) {
		(self.0)(event);
	}

	fn address(&self) -> *const () {
		Rc::as_ptr(&self.0).cast::<()>()
	}
}

impl PartialEq for Handler {
	fn eq(&self, other: &Self) -> bool {
		self.address() == other.address()
	}
}
impl Eq for Handler {}

impl Hash for Handler {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.address().hash(state);
	}
}

impl Debug for Handler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Handler({:p})", self.address())
	}
}

/// A plain function value, compared by identity.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&[Value]) -> Value>);

impl Callback {
	pub fn new(function: impl Fn(&[Value]) -> Value + 'static) -> Self {
		Self(Rc::new(function))
	}

	#[must_use]
	pub fn call(&self, arguments: &[Value]) -> Value {
		(self.0)(arguments)
	}

	fn address(&self) -> *const () {
		Rc::as_ptr(&self.0).cast::<()>()
	}
}

impl PartialEq for Callback {
	fn eq(&self, other: &Self) -> bool {
		self.address() == other.address()
	}
}
impl Eq for Callback {}

impl Debug for Callback {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Callback({:p})", self.address())
	}
}

/// Upper-cases the first character: `"vector"` → `"Vector"`.
#[must_use]
pub fn pascal_case(name: &str) -> String {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}
