//! The reconciliation host adapter.
//!
//! [`HostConfig`] is the contract a declarative UI framework drives once it has decided that a node must be
//! created, updated, moved or removed. [`SceneHost`] implements it for scene graphs.
//!
//! Live instances are kept in an arena and addressed through stable [`InstanceId`] handles. Parents, the
//! framework's own tree and the attachment bookkeeping only ever hold these handles, so reconstructing a node
//! swaps the object behind its handle without anyone having to be repointed.

use crate::{
	attach::Attachment,
	builder::{build, constructor_children, Built},
	element::Element,
	error::ReconcileError,
	listeners::{Listener, ListenerRegistry},
	object::ObjectRef,
	props::{apply_props, changed_keys, settable, Applied},
	value::{Callback, Props, Value},
};
use slab::Slab;
use tracing::{error, instrument, level_filters::STATIC_MAX_LEVEL, trace, warn, Level};

/// A stable handle to a live instance of a [`SceneHost`].
///
/// Arena slots are reused, so each handle also carries the generation its slot had when the instance was created.
/// A handle outliving its instance never resolves to a later occupant of the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
	index: usize,
	generation: u32,
}

/// A live scene object together with its reconciliation bookkeeping.
pub struct Instance {
	pub(crate) object: ObjectRef,
	pub(crate) type_tag: String,
	pub(crate) attachment: Option<Attachment>,
	pub(crate) raw: bool,
	pub(crate) behavior: Option<Callback>,
	pub(crate) folded: Vec<String>,
	pub(crate) parent: Option<InstanceId>,
	pub(crate) root: Option<InstanceId>,
	/// Every linked child, attached or not, in link order.
	pub(crate) children: Vec<InstanceId>,
	pub(crate) attached_single: Vec<(String, InstanceId)>,
	pub(crate) attached_multi: Vec<(String, InstanceId)>,
	pub(crate) listeners: Vec<Listener>,
	pub(crate) disposed: bool,
	pub(crate) hidden: bool,
	generation: u32,
}

impl Instance {
	fn new(built: Built, type_tag: impl Into<String>, generation: u32) -> Self {
		Self {
			object: built.object,
			type_tag: type_tag.into(),
			attachment: built.attachment,
			raw: built.raw,
			behavior: built.behavior,
			folded: built.folded,
			parent: None,
			root: None,
			children: Vec::new(),
			attached_single: Vec::new(),
			attached_multi: Vec::new(),
			listeners: built.applied.bound,
			disposed: false,
			hidden: false,
			generation,
		}
	}

	#[must_use]
	pub fn object(&self) -> &ObjectRef {
		&self.object
	}

	/// The resolved node kind, kept for reconstruction.
	#[must_use]
	pub fn type_tag(&self) -> &str {
		&self.type_tag
	}

	#[must_use]
	pub fn attachment(&self) -> Option<&Attachment> {
		self.attachment.as_ref()
	}

	#[must_use]
	pub fn is_raw(&self) -> bool {
		self.raw
	}

	#[must_use]
	pub fn parent(&self) -> Option<InstanceId> {
		self.parent
	}

	#[must_use]
	pub fn root(&self) -> Option<InstanceId> {
		self.root
	}

	#[must_use]
	pub fn attached_single(&self) -> &[(String, InstanceId)] {
		&self.attached_single
	}

	#[must_use]
	pub fn attached_multi(&self) -> &[(String, InstanceId)] {
		&self.attached_multi
	}

	#[must_use]
	pub fn is_disposed(&self) -> bool {
		self.disposed
	}

	/// Whether the framework currently has this instance hidden.
	#[must_use]
	pub fn is_hidden(&self) -> bool {
		self.hidden
	}

	pub(crate) fn attach_value(&self) -> Value {
		self.behavior.clone().map_or_else(|| Value::Object(self.object.clone()), Value::Function)
	}
}

/// The result of [`HostConfig::prepare_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePayload {
	/// Apply these changed keys in place.
	Patch(Vec<String>),
	/// Build a new object and swap it in.
	Reconstruct,
}

/// The host-configuration contract of a declarative UI framework.
///
/// Calls arrive in the framework's order: during the render phase, instances are created and their initial
/// children appended bottom-up. During the commit phase, removals come first, then updates and placements.
/// Implementations never reorder.
pub trait HostConfig {
	/// Handle to a host instance.
	type Instance: Copy + Eq + core::fmt::Debug;
	/// What refs observe.
	type PublicInstance;
	type Error;

	/// # Errors
	///
	/// Iff the instance can't be built.
	fn create_instance(&mut self, element: &Element) -> Result<Self::Instance, Self::Error>;

	/// Appends `child` to a parent that isn't placed yet.
	///
	/// # Errors
	///
	/// Iff a handle is stale.
	fn append_initial_child(&mut self, parent: Self::Instance, child: Self::Instance) -> Result<(), Self::Error>;

	/// Appends `child`, moving it to the end if it's already there.
	///
	/// # Errors
	///
	/// Iff a handle is stale.
	fn append_child(&mut self, parent: Self::Instance, child: Self::Instance) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff a handle is stale.
	fn append_child_to_container(&mut self, container: Self::Instance, child: Self::Instance) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff a handle is stale.
	fn remove_child(&mut self, parent: Self::Instance, child: Self::Instance) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff a handle is stale.
	fn remove_child_from_container(&mut self, container: Self::Instance, child: Self::Instance) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff a handle is stale.
	fn insert_before(&mut self, parent: Self::Instance, child: Self::Instance, before: Self::Instance) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff a handle is stale.
	fn insert_in_container_before(&mut self, container: Self::Instance, child: Self::Instance, before: Self::Instance) -> Result<(), Self::Error>;

	/// Decides how `instance` follows the change from `old` to `new`. `None` means there is nothing to do.
	fn prepare_update(&self, instance: Self::Instance, old: &Element, new: &Element) -> Option<UpdatePayload>;

	/// # Errors
	///
	/// Iff a handle is stale, or reconstruction fails.
	fn commit_update(&mut self, instance: Self::Instance, payload: UpdatePayload, old: &Element, new: &Element) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff a handle is stale.
	fn hide_instance(&mut self, instance: Self::Instance) -> Result<(), Self::Error>;

	/// # Errors
	///
	/// Iff a handle is stale.
	fn unhide_instance(&mut self, instance: Self::Instance, props: &Props) -> Result<(), Self::Error>;

	fn public_instance(&self, instance: Self::Instance) -> Option<Self::PublicInstance>;

	/// Releases a host instance of a deleted subtree. Called top-down for every instance of the subtree.
	fn detach_deleted_instance(&mut self, instance: Self::Instance);

	fn reset_after_commit(&mut self);
}

/// The scene-graph host: live instances, their bookkeeping and the listener registry.
#[derive(Default)]
pub struct SceneHost {
	pub(crate) instances: Slab<Instance>,
	listeners: ListenerRegistry,
	generation: u32,
}

impl SceneHost {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an externally owned root object (like a map) as container instance.
	pub fn insert_root(&mut self, object: ObjectRef) -> InstanceId {
		let type_tag = object.borrow().type_name().to_owned();
		let built = Built { object, attachment: None, raw: true, behavior: None, folded: Vec::new(), applied: Applied::default() };
		self.allocate(built, type_tag)
	}

	fn allocate(&mut self, built: Built, type_tag: impl Into<String>) -> InstanceId {
		self.generation = self.generation.wrapping_add(1);
		let generation = self.generation;
		let index = self.instances.insert(Instance::new(built, type_tag, generation));
		InstanceId { index, generation }
	}

	#[must_use]
	pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
		self.instances.get(id.index).filter(|instance| instance.generation == id.generation)
	}

	pub(crate) fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
		self.instances.get_mut(id.index).filter(|instance| instance.generation == id.generation)
	}

	/// Handles of all live instances, in no particular order.
	pub fn instance_ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
		self.instances.iter().map(|(index, instance)| InstanceId { index, generation: instance.generation })
	}

	/// The live object currently behind `id`.
	#[must_use]
	pub fn object(&self, id: InstanceId) -> Option<ObjectRef> {
		self.instance(id).map(|instance| instance.object.clone())
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}

	/// Distinct `(event, handler)` registrations, including released ones not yet collected by [`HostConfig::reset_after_commit`].
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.listeners.len()
	}

	pub(crate) fn get(&self, id: InstanceId) -> Result<&Instance, ReconcileError> {
		self.instance(id).ok_or(ReconcileError::StaleInstance(id))
	}

	pub(crate) fn get_mut(&mut self, id: InstanceId) -> Result<&mut Instance, ReconcileError> {
		self.instance_mut(id).ok_or(ReconcileError::StaleInstance(id))
	}

	/// Diffs root-level props onto the object behind `id`.
	///
	/// # Errors
	///
	/// Iff `id` is stale.
	#[instrument(skip(self, new, old))]
	pub fn apply_root_props(&mut self, id: InstanceId, new: &Props, old: &Props) -> Result<(), ReconcileError> {
		let object = self.get(id)?.object.clone();
		let applied = apply_props(&object, new, Some(old), None);
		if !applied.unsettable.is_empty() {
			warn!(keys = ?applied.unsettable, "Root object has no setter for some props. Ignoring them.");
		}
		self.record_listeners(id, &applied)
	}

	pub(crate) fn record_listeners(&mut self, id: InstanceId, applied: &Applied) -> Result<(), ReconcileError> {
		let instance = self.instances.get_mut(id.index).filter(|instance| instance.generation == id.generation).ok_or(ReconcileError::StaleInstance(id))?;
		for listener in &applied.unbound {
			if let Some(index) = instance.listeners.iter().position(|held| held == listener) {
				instance.listeners.remove(index);
			}
			if let Err(error) = self.listeners.release(listener) {
				error!(event = listener.0.as_str(), %error, "Listener bookkeeping is off.");
			}
		}
		instance.listeners.extend(applied.bound.iter().cloned());
		self.count_listeners(&applied.bound);
		Ok(())
	}

	pub(crate) fn count_listeners(&mut self, bound: &[Listener]) {
		for listener in bound {
			if let Err(error) = self.listeners.retain(listener) {
				error!(event = listener.0.as_str(), %error, "Listener bookkeeping is off.");
			}
		}
	}

	/// Unregisters `listeners` from `object`.
	pub(crate) fn release_listeners(&mut self, object: &ObjectRef, listeners: Vec<Listener>) {
		let mut object = object.borrow_mut();
		for listener in listeners {
			if let Err(error) = object.un(&listener.0, &listener.1) {
				warn!(event = listener.0.as_str(), %error, "Failed to unregister handler.");
			}
			if let Err(error) = self.listeners.release(&listener) {
				error!(event = listener.0.as_str(), %error, "Listener bookkeeping is off.");
			}
		}
	}

	/// Builds a replacement for the object behind `id` from `element` and swaps it in.
	///
	/// # Errors
	///
	/// Iff the replacement can't be built or `id` is stale. The old object stays in place in that case.
	#[instrument(skip(self, element), fields(kind = element.kind()))]
	pub fn reconstruct(&mut self, id: InstanceId, element: &Element) -> Result<(), ReconcileError> {
		let built = build(element)?;
		let bound = built.applied.bound.clone();
		self.swap_identity(id, built, element.node_ref())?;
		self.count_listeners(&bound);
		Ok(())
	}

	fn reattach(&mut self, id: InstanceId, attachment: Attachment) -> Result<(), ReconcileError> {
		let instance = self.get(id)?;
		if instance.attachment.as_ref() == Some(&attachment) {
			return Ok(());
		}
		let parent = instance.parent;
		trace!(slot = attachment.slot.as_str(), "Attachment changed. Reattaching.");
		match parent {
			Some(parent) => {
				self.detach(parent, id)?;
				self.get_mut(id)?.attachment = Some(attachment);
				self.attach(parent, id)
			}
			None => {
				self.get_mut(id)?.attachment = Some(attachment);
				Ok(())
			}
		}
	}

	fn dispose_one(&mut self, id: InstanceId) {
		let Some(instance) = self.instance_mut(id) else { return };
		if instance.disposed {
			return;
		}
		instance.disposed = true;
		let object = instance.object.clone();
		let listeners = core::mem::take(&mut instance.listeners);
		self.release_listeners(&object, listeners);
		object.borrow_mut().dispose();
		trace!(?id, "Disposed.");
	}

	/// Disposes `id`, then detaches and disposes its descendants, top-down.
	pub(crate) fn dispose_subtree(&mut self, id: InstanceId) {
		let Some(instance) = self.instance(id) else { return };
		if instance.disposed {
			return;
		}
		let children = instance.children.clone();
		self.dispose_one(id);
		for child in children {
			if let Err(error) = self.detach(id, child) {
				warn!(%error, "Failed to detach a child during teardown.");
			}
			self.dispose_subtree(child);
		}
	}
}

impl HostConfig for SceneHost {
	type Instance = InstanceId;
	type PublicInstance = ObjectRef;
	type Error = ReconcileError;

	#[instrument(skip(self, element), fields(kind = element.kind()))]
	fn create_instance(&mut self, element: &Element) -> Result<InstanceId, ReconcileError> {
		let built = build(element)?;
		self.count_listeners(&built.applied.bound);
		let id = self.allocate(built, element.kind());
		trace!(?id, "Created instance.");
		Ok(id)
	}

	fn append_initial_child(&mut self, parent: InstanceId, child: InstanceId) -> Result<(), ReconcileError> {
		self.attach(parent, child)
	}

	fn append_child(&mut self, parent: InstanceId, child: InstanceId) -> Result<(), ReconcileError> {
		self.insert(parent, child, None)
	}

	fn append_child_to_container(&mut self, container: InstanceId, child: InstanceId) -> Result<(), ReconcileError> {
		self.insert(container, child, None)
	}

	fn remove_child(&mut self, parent: InstanceId, child: InstanceId) -> Result<(), ReconcileError> {
		self.detach(parent, child)?;
		self.dispose_subtree(child);
		Ok(())
	}

	fn remove_child_from_container(&mut self, container: InstanceId, child: InstanceId) -> Result<(), ReconcileError> {
		self.remove_child(container, child)
	}

	fn insert_before(&mut self, parent: InstanceId, child: InstanceId, before: InstanceId) -> Result<(), ReconcileError> {
		self.insert(parent, child, Some(before))
	}

	fn insert_in_container_before(&mut self, container: InstanceId, child: InstanceId, before: InstanceId) -> Result<(), ReconcileError> {
		self.insert(container, child, Some(before))
	}

	fn prepare_update(&self, id: InstanceId, old: &Element, new: &Element) -> Option<UpdatePayload> {
		let Some(instance) = self.instance(id) else {
			warn!(?id, "Update for a stale instance. Ignoring it.");
			return None;
		};
		let (old_props, new_props) = (old.props(), new.props());
		let differs = |key: &str| !old_props.get(key).unwrap_or(&Value::Null).shallow_eq(new_props.get(key).unwrap_or(&Value::Null));

		if new.kind() != instance.type_tag {
			return Some(UpdatePayload::Reconstruct);
		}
		if instance.behavior.is_some() && differs("fn") {
			trace!("Behavior function changed.");
			return Some(UpdatePayload::Reconstruct);
		}
		if instance.raw && differs("object") {
			trace!("Injected object changed.");
			return Some(UpdatePayload::Reconstruct);
		}

		let object = instance.object.borrow();
		let capabilities = object.capabilities();
		if !instance.raw {
			let (old_children, new_children) = (constructor_children(capabilities, old.children()), constructor_children(capabilities, new.children()));
			if old_children.len() != new_children.len() || old_children.iter().zip(new_children.iter()).any(|(a, b)| !a.same_shape(b)) {
				trace!("Constructor-argument children changed.");
				return Some(UpdatePayload::Reconstruct);
			}
		}
		if differs("args") || differs("arg") {
			trace!("Constructor arguments changed.");
			return Some(UpdatePayload::Reconstruct);
		}

		let keys = changed_keys(new_props, old_props);
		if keys.is_empty() {
			return None;
		}
		if let Some(key) = keys.iter().find(|key| !settable(capabilities, key)) {
			trace!(key = key.as_str(), "Prop can't be set in place.");
			return Some(UpdatePayload::Reconstruct);
		}
		if STATIC_MAX_LEVEL >= Level::TRACE {
			trace!(?keys, "Patching.");
		}
		Some(UpdatePayload::Patch(keys))
	}

	#[instrument(skip(self, old, new), fields(kind = new.kind()))]
	fn commit_update(&mut self, id: InstanceId, payload: UpdatePayload, old: &Element, new: &Element) -> Result<(), ReconcileError> {
		match payload {
			UpdatePayload::Reconstruct => self.reconstruct(id, new),
			UpdatePayload::Patch(keys) => {
				let object = self.get(id)?.object.clone();
				let applied = apply_props(&object, new.props(), Some(old.props()), Some(&keys));
				self.record_listeners(id, &applied)?;
				if !applied.unsettable.is_empty() {
					warn!(keys = ?applied.unsettable, "Setters rejected some props. Reconstructing instead.");
					return self.reconstruct(id, new);
				}
				match applied.attachment {
					Some(attachment) => self.reattach(id, attachment),
					None => Ok(()),
				}
			}
		}
	}

	fn hide_instance(&mut self, id: InstanceId) -> Result<(), ReconcileError> {
		let instance = self.get_mut(id)?;
		instance.hidden = true;
		set_visible(&instance.object, false);
		Ok(())
	}

	fn unhide_instance(&mut self, id: InstanceId, props: &Props) -> Result<(), ReconcileError> {
		let instance = self.get_mut(id)?;
		instance.hidden = false;
		if props.get("visible").map_or(true, |visible| visible.is_null() || visible.as_bool() == Some(true)) {
			set_visible(&instance.object, true);
		}
		Ok(())
	}

	fn public_instance(&self, id: InstanceId) -> Option<ObjectRef> {
		self.object(id)
	}

	fn detach_deleted_instance(&mut self, id: InstanceId) {
		if self.instance(id).is_none() {
			return;
		}
		self.dispose_one(id);
		self.instances.remove(id.index);
		trace!(?id, "Released instance.");
	}

	fn reset_after_commit(&mut self) {
		let released = self.listeners.collect();
		if released > 0 {
			trace!(released, "Collected released listeners.");
		}
	}
}

pub(crate) fn set_visible(object: &ObjectRef, visible: bool) {
	let mut object = object.borrow_mut();
	if !object.capabilities().has_visibility() {
		trace!(kind = object.type_name(), "No visibility setter. Ignoring the hidden signal.");
		return;
	}
	if let Err(error) = object.set_visible(visible) {
		warn!(%error, visible, "Failed to toggle visibility.");
	}
}
