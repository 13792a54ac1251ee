//! The property applicator: diffs declarative props onto a live scene object.

use crate::{
	attach::{explicit, Attachment},
	object::{Capabilities, ObjectRef},
	value::{Handler, Props, Value},
};
use tracing::{trace, trace_span, warn};

/// Tree-structural keys. These never reach the object.
pub const RESERVED: [&str; 3] = ["children", "key", "ref"];

/// Keys consumed during construction.
pub const CONSTRUCTION: [&str; 4] = ["args", "arg", "object", "fn"];

const ATTACH_PREFIX: &str = "attach";

/// The event name for an `on*` key: `onPostrender` → `postrender`.
#[must_use]
pub fn event_name(key: &str) -> Option<String> {
	let rest = key.strip_prefix("on")?;
	rest.starts_with(|c: char| c.is_ascii_uppercase()).then(|| rest.to_lowercase())
}

fn is_applicable(key: &str) -> bool {
	!RESERVED.contains(&key) && !CONSTRUCTION.contains(&key)
}

/// Whether `key` can be applied in place to an object with `capabilities`.
///
/// Event and attachment keys always can, since they don't go through a setter.
#[must_use]
pub fn settable(capabilities: &Capabilities, key: &str) -> bool {
	key.starts_with(ATTACH_PREFIX) || event_name(key).is_some() || capabilities.resolve_setter(key).is_some()
}

/// The applicable keys whose value changed from `old` to `new`, in `new`'s order.
///
/// Removed `on*` keys are included (so their handler gets unregistered). Other removed keys are not.
#[must_use]
pub fn changed_keys(new: &Props, old: &Props) -> Vec<String> {
	let mut keys: Vec<String> = new
		.iter()
		.filter(|&(key, value)| is_applicable(key) && !old.get(key).map_or(value.is_null(), |old| value.shallow_eq(old)))
		.map(|(key, _)| key.to_owned())
		.collect();
	keys.extend(old.keys().filter(|key| event_name(key).is_some() && !new.contains_key(key)).map(str::to_owned));
	keys
}

/// What [`apply_props`] did, beyond setting values.
#[derive(Debug, Default)]
pub struct Applied {
	/// The explicit attachment, if an `attach*` key was among the applied ones.
	pub attachment: Option<Attachment>,
	pub bound: Vec<(String, Handler)>,
	pub unbound: Vec<(String, Handler)>,
	/// Keys that could not be set in place. The owning node has to be reconstructed to apply these.
	pub unsettable: Vec<String>,
}

/// Applies `new` onto `object`.
///
/// With `old` present, only changed keys are touched. `changed` overrides the diff when the caller already computed it.
/// Without `old`, this is pure initialization: every applicable key is set and nothing is unregistered.
pub fn apply_props(object: &ObjectRef, new: &Props, old: Option<&Props>, changed: Option<&[String]>) -> Applied {
	let empty = Props::new();
	let old_props = old.unwrap_or(&empty);
	let keys = match changed {
		Some(changed) => changed.iter().filter(|key| is_applicable(key)).cloned().collect(),
		None => changed_keys(new, old_props),
	};

	let mut applied = Applied::default();
	if keys.is_empty() {
		return applied;
	}

	let span = trace_span!("apply_props", count = keys.len());
	let _enter = span.enter();

	let mut object = object.borrow_mut();
	for key in keys {
		let value = new.get(&key).cloned().unwrap_or_default();

		if key.starts_with(ATTACH_PREFIX) {
			applied.attachment = explicit(new);
			trace!(key = key.as_str(), "Recorded attachment hint.");
		} else if let Some(event) = event_name(&key) {
			if !object.capabilities().has_events() {
				warn!(key = key.as_str(), kind = object.type_name(), "Scene object doesn't support events. Ignoring the handler.");
				continue;
			}
			if let Some(previous) = old_props.get(&key).and_then(Value::as_handler) {
				match object.un(&event, previous) {
					Ok(()) => applied.unbound.push((event.clone(), previous.clone())),
					Err(error) => warn!(event = event.as_str(), %error, "Failed to unregister handler."),
				}
			}
			match value {
				Value::Handler(handler) => match object.on(&event, handler.clone()) {
					Ok(()) => applied.bound.push((event, handler)),
					Err(error) => warn!(event = event.as_str(), %error, "Failed to register handler."),
				},
				Value::Null => trace!(event = event.as_str(), "Handler removed."),
				_ => warn!(key = key.as_str(), "Expected an event handler. Ignoring the value."),
			}
		} else if object.capabilities().resolve_setter(&key).is_some() {
			#[cfg(feature = "dangerous-logging")]
			trace!(key = key.as_str(), ?value, "Setting property.");
			#[cfg(not(feature = "dangerous-logging"))]
			trace!(key = key.as_str(), "Setting property.");

			if object.set(&key, value).is_err() {
				applied.unsettable.push(key);
			}
		} else {
			applied.unsettable.push(key);
		}
	}
	applied
}
