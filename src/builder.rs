//! The instance builder: turns a descriptor into a live scene object.

use crate::{
	attach::{category_of, Attachment, AttachmentKind, Category},
	catalogue,
	element::Element,
	error::ReconcileError,
	graph,
	object::{object, Capabilities, ConstructorArgs, ObjectRef, SceneObject},
	props::{apply_props, Applied},
	value::{Callback, Props, Value},
};
use core::any::Any;
use tracing::{error, trace, trace_span, warn};

/// Node kind for raw-instance injection through `object`. Never looked up in the catalogue.
pub const PRIMITIVE: &str = "primitive";

/// Node kind for behavior functions passed through `fn`.
pub const BEHAVIOR: &str = "function";

/// A freshly built live object, not yet wired into any graph.
pub struct Built {
	pub object: ObjectRef,
	pub attachment: Option<Attachment>,
	/// Whether `object` was injected rather than constructed.
	pub raw: bool,
	/// The wrapped behavior function, for behavior nodes.
	pub behavior: Option<Callback>,
	/// Slots filled at construction time from constructor-argument children.
	pub folded: Vec<String>,
	pub applied: Applied,
}

impl Built {
	/// The value handed to the parent: the behavior function for behavior nodes, the object otherwise.
	#[must_use]
	pub fn attach_value(&self) -> Value {
		self.behavior.clone().map_or_else(|| Value::Object(self.object.clone()), Value::Function)
	}
}

/// Builds the live object for `element` (without its declared children).
///
/// # Errors
///
/// - [`ReconcileError::Configuration`] for a primitive without `object`, a behavior node without `fn`,
///   or an `object` that is neither a scene object nor a factory returning one,
/// - [`ReconcileError::Unresolved`] if the kind isn't in the catalogue,
/// - [`ReconcileError::Construction`] if the constructor rejects its arguments.
pub fn build(element: &Element) -> Result<Built, ReconcileError> {
	let kind = element.kind();
	let props = element.props();
	let span = trace_span!("build", kind);
	let _enter = span.enter();

	if kind == BEHAVIOR {
		let function = props.get("fn").and_then(Value::as_function).ok_or_else(|| configuration(kind, "`fn` must be a function when using behavior nodes"))?;
		let wrapped = wrap_behavior(function.clone());
		return Ok(Built {
			object: object(Behavior { function: wrapped.clone(), capabilities: Capabilities::new() }),
			attachment: element.attachment(),
			raw: false,
			behavior: Some(wrapped),
			folded: Vec::new(),
			applied: Applied::default(),
		});
	}

	let (object, raw, folded) = match injected(kind, props)? {
		Some(object) => (object, true, Vec::new()),
		None if kind == PRIMITIVE => return Err(configuration(kind, "`object` must be set when using primitives")),
		None => {
			let constructor = catalogue::resolve(kind)?;
			let children = constructor_children(constructor.capabilities(), element.children());
			let mut folded = Vec::with_capacity(children.len());
			let mut children_args = Props::new();
			for child in children {
				let Some(attachment) = child.attachment() else { continue };
				let value = instantiate(child)?;
				match attachment.kind {
					AttachmentKind::Single => {
						children_args.insert(attachment.slot.clone(), value);
					}
					AttachmentKind::Multi => {
						let key = format!("{}s", attachment.slot);
						let mut values = children_args.get(&key).and_then(Value::as_list).map(<[Value]>::to_vec).unwrap_or_default();
						values.push(value);
						children_args.insert(key, values);
					}
				}
				if !folded.contains(&attachment.slot) {
					folded.push(attachment.slot);
				}
			}
			trace!(folded = folded.len(), "Resolved constructor arguments.");
			let object = constructor.construct(constructor_args(props, &children_args)).map_err(|source| ReconcileError::Construction { kind: kind.to_owned(), source })?;
			(object, false, folded)
		}
	};

	let attachment = element.attachment().or_else(|| object.try_borrow().ok().and_then(|object| category_of(kind, Some(&*object))).map(Category::attachment));

	let applied = apply_props(&object, props, None, None);
	if !applied.unsettable.is_empty() {
		warn!(keys = ?applied.unsettable, "Some props have no setter on this scene object and were ignored.");
	}

	Ok(Built { object, attachment, raw, behavior: None, folded, applied })
}

fn configuration(kind: &str, reason: &'static str) -> ReconcileError {
	ReconcileError::Configuration { kind: kind.to_owned(), reason }
}

fn injected(kind: &str, props: &Props) -> Result<Option<ObjectRef>, ReconcileError> {
	match props.get("object") {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Object(object)) => Ok(Some(object.clone())),
		Some(Value::Function(factory)) => match factory.call(&[]) {
			Value::Object(object) => Ok(Some(object)),
			_ => Err(configuration(kind, "the `object` factory must return a scene object")),
		},
		Some(_) => Err(configuration(kind, "`object` must be a scene object or a factory")),
	}
}

/// The declared children that have to be supplied at construction time: those whose attachment slot has
/// no setter (single) or neither adder nor replacer (multi) on a type with `capabilities`.
///
/// Attach-less children are never among them.
#[must_use]
pub fn constructor_children<'a>(capabilities: &Capabilities, children: &'a [Element]) -> Vec<&'a Element> {
	children
		.iter()
		.filter(|child| match child.attachment() {
			None => false,
			Some(Attachment { kind: AttachmentKind::Single, slot }) => capabilities.resolve_setter(&slot).is_none(),
			Some(Attachment { kind: AttachmentKind::Multi, slot }) => capabilities.resolve_collection(&slot).map_or(true, |collection| !collection.add && !collection.replace),
		})
		.collect()
}

/// `args` as a list is positional. Otherwise `arg` (or a non-list `args`) is a single configuration argument.
///
/// Folded children are merged into the configuration record, or into a trailing record of the positional arguments.
fn constructor_args(props: &Props, children_args: &Props) -> ConstructorArgs {
	if let Some(positional) = props.get("args").and_then(Value::as_list) {
		let mut positional = positional.to_vec();
		if !children_args.is_empty() {
			match positional.last_mut() {
				Some(Value::Record(last)) => *last = last.merged(children_args).into(),
				_ => positional.push(children_args.clone().into()),
			}
		}
		return ConstructorArgs::Positional(positional);
	}

	let config = props.get("arg").or_else(|| props.get("args")).cloned().unwrap_or_default();
	if children_args.is_empty() {
		ConstructorArgs::Config(config)
	} else {
		let base = config.as_record().cloned().unwrap_or_default();
		ConstructorArgs::Config(base.merged(children_args).into())
	}
}

/// Builds `element` together with its declared children, wired object-to-object without any bookkeeping.
///
/// # Errors
///
/// Like [`build`], for any node of the subtree.
pub fn instantiate(element: &Element) -> Result<Value, ReconcileError> {
	instantiate_built(element).map(|built| built.attach_value())
}

fn instantiate_built(element: &Element) -> Result<Built, ReconcileError> {
	let built = build(element)?;
	for child in element.children() {
		let Some(attachment) = child.attachment() else {
			instantiate_built(child)?;
			continue;
		};
		if built.folded.contains(&attachment.slot) {
			continue;
		}
		let child = instantiate_built(child)?;
		if !graph::link(&built.object, &attachment, &child.attach_value(), &child.object) {
			warn!(slot = attachment.slot.as_str(), "Failed to attach a child. Leaving it unattached.");
		}
	}
	Ok(built)
}

fn wrap_behavior(function: Callback) -> Callback {
	Callback::new(move |arguments| match function.call(arguments) {
		Value::Element(element) => instantiate(&element).unwrap_or_else(|error| {
			error!(%error, "Failed to instantiate the element returned from a behavior function.");
			Value::Null
		}),
		value => value,
	})
}

struct Behavior {
	function: Callback,
	capabilities: Capabilities,
}

impl SceneObject for Behavior {
	fn type_name(&self) -> &str {
		BEHAVIOR
	}

	fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	fn get(&self, key: &str) -> Option<Value> {
		(key == "fn").then(|| self.function.clone().into())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}
