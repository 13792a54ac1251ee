#![allow(dead_code)]

use scene_reconciler::{
	catalogue::{self, Entry, Namespace},
	object::{object, same_object, Capabilities, Collection, ConstructError, Constructor, ConstructorArgs, ObjectRef, SceneObject, Unsupported},
	Category, Element, Event, Handler, MountTarget, Props, RootConfig, Roots, Value,
};
use std::{any::Any, collections::HashMap, rc::Rc};
use tracing_subscriber::filter::LevelFilter;

pub fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(LevelFilter::TRACE).try_init();
}

/// A scene object of the mock library. What it can do is entirely up to its [`Capabilities`].
pub struct MockObject {
	pub kind: &'static str,
	category: Option<Category>,
	capabilities: Capabilities,
	pub values: Props,
	pub collections: HashMap<String, Vec<ObjectRef>>,
	pub handlers: Vec<(String, Handler)>,
	pub positional: Vec<Value>,
	pub visible: bool,
	pub disposed: usize,
	pub changed: usize,
	pub marker: Option<u32>,
}

impl MockObject {
	fn new(class: &Class, args: ConstructorArgs) -> Self {
		let mut mock = Self {
			kind: class.kind,
			category: class.category,
			capabilities: class.capabilities.clone(),
			values: Props::new(),
			collections: HashMap::new(),
			handlers: Vec::new(),
			positional: Vec::new(),
			visible: true,
			disposed: 0,
			changed: 0,
			marker: None,
		};
		let config = match args {
			ConstructorArgs::Positional(values) => {
				mock.positional = values.clone();
				values.last().and_then(Value::as_record).cloned()
			}
			ConstructorArgs::Config(value) => value.as_record().cloned(),
		};
		if let Some(config) = config {
			for (key, value) in config.iter() {
				mock.absorb(key, value.clone());
			}
		}
		mock
	}

	fn absorb(&mut self, key: &str, value: Value) {
		if let (Some(slot), Some(members)) = (key.strip_suffix('s'), value.as_list()) {
			if self.capabilities.resolve_collection(slot).is_some() {
				let members = members.iter().filter_map(Value::as_object).cloned().collect();
				self.collections.insert(slot.to_owned(), members);
				return;
			}
		}
		self.values.insert(key, value);
	}

	pub fn emit(&self, event: &str) {
		let handlers: Vec<Handler> = self.handlers.iter().filter(|(e, _)| e == event).map(|(_, h)| h.clone()).collect();
		for handler in handlers {
			handler.call(&Event::new(event));
		}
	}

	pub fn handler_count(&self, event: &str) -> usize {
		self.handlers.iter().filter(|(e, _)| e == event).count()
	}
}

impl SceneObject for MockObject {
	fn type_name(&self) -> &str {
		self.kind
	}

	fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	fn category(&self) -> Option<Category> {
		self.category
	}

	fn get(&self, key: &str) -> Option<Value> {
		self.values.get(key).cloned()
	}

	fn set(&mut self, key: &str, value: Value) -> Result<(), Unsupported> {
		if self.capabilities.resolve_setter(key).is_none() {
			return Err(Unsupported);
		}
		if key == "visible" {
			self.visible = value.as_bool().unwrap_or(true);
		}
		self.values.insert(key, value);
		Ok(())
	}

	fn collection(&self, slot: &str) -> Option<Vec<ObjectRef>> {
		self.capabilities.resolve_collection(slot)?;
		Some(self.collections.get(slot).cloned().unwrap_or_default())
	}

	fn add(&mut self, slot: &str, child: ObjectRef) -> Result<(), Unsupported> {
		match self.capabilities.resolve_collection(slot) {
			Some(collection) if collection.add => {
				self.collections.entry(slot.to_owned()).or_default().push(child);
				Ok(())
			}
			_ => Err(Unsupported),
		}
	}

	fn remove(&mut self, slot: &str, child: &ObjectRef) -> Result<(), Unsupported> {
		match self.capabilities.resolve_collection(slot) {
			Some(collection) if collection.add => {
				self.collections.entry(slot.to_owned()).or_default().retain(|member| !same_object(member, child));
				Ok(())
			}
			_ => Err(Unsupported),
		}
	}

	fn contains(&self, slot: &str, child: &ObjectRef) -> Option<bool> {
		match self.capabilities.resolve_collection(slot) {
			Some(collection) if collection.contains => Some(self.collections.get(slot).map_or(false, |members| members.iter().any(|member| same_object(member, child)))),
			_ => None,
		}
	}

	fn replace_collection(&mut self, slot: &str, children: Vec<ObjectRef>) -> Result<(), Unsupported> {
		match self.capabilities.resolve_collection(slot) {
			Some(collection) if collection.replace => {
				self.collections.insert(slot.to_owned(), children);
				Ok(())
			}
			_ => Err(Unsupported),
		}
	}

	fn on(&mut self, event: &str, handler: Handler) -> Result<(), Unsupported> {
		if !self.capabilities.has_events() {
			return Err(Unsupported);
		}
		self.handlers.push((event.to_owned(), handler));
		Ok(())
	}

	fn un(&mut self, event: &str, handler: &Handler) -> Result<(), Unsupported> {
		if let Some(index) = self.handlers.iter().position(|(e, h)| e == event && h == handler) {
			self.handlers.remove(index);
		}
		Ok(())
	}

	fn set_visible(&mut self, visible: bool) -> Result<(), Unsupported> {
		if !self.capabilities.has_visibility() {
			return Err(Unsupported);
		}
		self.visible = visible;
		Ok(())
	}

	fn changed(&mut self) {
		self.changed += 1;
	}

	fn dispose(&mut self) {
		self.disposed += 1;
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

pub struct Class {
	kind: &'static str,
	category: Option<Category>,
	capabilities: Capabilities,
}

impl Constructor for Class {
	fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	fn construct(&self, args: ConstructorArgs) -> Result<ObjectRef, ConstructError> {
		if let ConstructorArgs::Positional(values) = &args {
			if values.iter().any(|value| value.as_str() == Some("invalid")) {
				return Err(ConstructError(format!("{} rejects its arguments", self.kind)));
			}
		}
		Ok(object(MockObject::new(self, args)))
	}
}

pub fn class(kind: &'static str, category: Option<Category>, capabilities: Capabilities) -> Rc<dyn Constructor> {
	Rc::new(Class { kind, category, capabilities })
}

fn layer(kind: &'static str) -> Rc<dyn Constructor> {
	class(kind, Some(Category::Layer), Capabilities::new().setters(["source", "style", "opacity", "visible"]).generic().visibility().events())
}

/// Registers the mock library. Calling this more than once is fine.
pub fn install() {
	init_logging();
	catalogue::extend([
		(
			"map",
			Entry::Constructor(class(
				"Map",
				None,
				Capabilities::new()
					.collection("layer", Collection::full())
					.collection("interaction", Collection::full())
					.collection("control", Collection { add: true, contains: false, replace: false })
					.setter("view")
					.generic()
					.events()
					.changed(),
			)),
		),
		("view", Entry::Constructor(class("View", Some(Category::View), Capabilities::new().setters(["center", "zoom", "rotation"]).generic()))),
		(
			"*Layer",
			Entry::Namespace(
				Namespace::new()
					.with("Vector", layer("VectorLayer"))
					.with("Tile", layer("TileLayer"))
					.with("Image", layer("ImageLayer"))
					.with("WebGLPoints", class("WebGLPointsLayer", Some(Category::Layer), Capabilities::new().setters(["source", "opacity"]).visibility().events())),
			),
		),
		(
			"*Source",
			Entry::Namespace(
				Namespace::new()
					.with(
						"Vector",
						class("VectorSource", Some(Category::Source), Capabilities::new().collection("feature", Collection { add: true, contains: false, replace: false }).generic().events().changed()),
					)
					.with("OSM", class("OSMSource", Some(Category::Source), Capabilities::new().setter("url"))),
			),
		),
		(
			"*Style",
			Entry::Namespace(
				Namespace::new()
					.with("Style", class("Style", Some(Category::Style), Capabilities::new().setters(["fill", "stroke", "image", "text", "zIndex"])))
					.with("Fill", class("Fill", Some(Category::Fill), Capabilities::new().setter("color")))
					.with("Stroke", class("Stroke", Some(Category::Stroke), Capabilities::new().setters(["color", "width"])))
					.with("Circle", class("CircleStyle", Some(Category::Image), Capabilities::new().setter("radius")))
					.with("Text", class("Text", Some(Category::Text), Capabilities::new().setters(["text", "fill", "stroke"]))),
			),
		),
		("*Geometry", Entry::Namespace(Namespace::new().with("Point", class("Point", Some(Category::Geometry), Capabilities::new().setter("coordinates").generic().events())))),
		("*Control", Entry::Namespace(Namespace::new().with("Zoom", class("Zoom", Some(Category::Control), Capabilities::new().generic())))),
		("*Interaction", Entry::Namespace(Namespace::new().with("Select", class("Select", Some(Category::Interaction), Capabilities::new().generic().events())))),
		(
			"*",
			Entry::Namespace(
				Namespace::new()
					.with("Feature", class("Feature", Some(Category::Feature), Capabilities::new().setters(["geometry", "style"]).generic().events()))
					.with("Helper", class("Helper", None, Capabilities::new())),
			),
		),
	]);
}

/// Constructs a detached object of the catalogue entry `kind`.
pub fn make(kind: &str) -> ObjectRef {
	catalogue::resolve(kind).expect("registered").construct(ConstructorArgs::Config(Value::Null)).expect("constructible")
}

pub fn mock<R>(object: &ObjectRef, f: impl FnOnce(&MockObject) -> R) -> R {
	let object = object.borrow();
	f(object.as_any().downcast_ref::<MockObject>().expect("mock object"))
}

pub fn mock_mut<R>(object: &ObjectRef, f: impl FnOnce(&mut MockObject) -> R) -> R {
	let mut object = object.borrow_mut();
	f(object.as_any_mut().downcast_mut::<MockObject>().expect("mock object"))
}

pub fn kind(object: &ObjectRef) -> String {
	object.borrow().type_name().to_owned()
}

pub fn kinds(objects: &[ObjectRef]) -> Vec<String> {
	objects.iter().map(kind).collect()
}

pub fn member(object: &ObjectRef, slot: &str) -> Vec<ObjectRef> {
	object.borrow().collection(slot).unwrap_or_default()
}

pub fn layers(map: &ObjectRef) -> Vec<ObjectRef> {
	member(map, "layer")
}

pub fn child(object: &ObjectRef, slot: &str) -> Option<ObjectRef> {
	object.borrow().get(slot).and_then(|value| value.as_object().cloned())
}

pub fn prop(object: &ObjectRef, key: &str) -> Value {
	object.borrow().get(key).unwrap_or_default()
}

pub fn disposed(object: &ObjectRef) -> usize {
	mock(object, |mock| mock.disposed)
}

pub fn target() -> MountTarget {
	MountTarget::from("test")
}

/// Renders `elements` into a fresh or existing test root and returns the map.
pub fn render(roots: &mut Roots, elements: &[Element]) -> ObjectRef {
	roots.render(elements, &target(), &RootConfig::new()).expect("render").map
}

pub fn record(props: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
	props.into_iter().collect::<Props>().into()
}
