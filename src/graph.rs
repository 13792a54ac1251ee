//! The graph mutator: wires live objects into each other and keeps the bookkeeping in step.
//!
//! The free functions work on bare objects. The [`SceneHost`] methods add parent links, attachment records and
//! change notifications on top.

use crate::{
	attach::{Attachment, AttachmentKind},
	builder::Built,
	element::NodeRef,
	error::ReconcileError,
	host::{set_visible, Instance, InstanceId, SceneHost},
	object::{same_object, ObjectRef},
	value::Value,
};
use tracing::{instrument, trace, warn};

/// Sets the single slot `slot` of `parent` (to [`Value::Null`] to clear it).
pub(crate) fn set_single(parent: &ObjectRef, slot: &str, value: Value) -> bool {
	let mut parent = parent.borrow_mut();
	parent.capabilities().resolve_setter(slot).is_some() && parent.set(slot, value).is_ok()
}

/// Whether `child` is a member of the collection `slot`, through the native check if there is one.
pub(crate) fn contains(parent: &ObjectRef, slot: &str, child: &ObjectRef) -> bool {
	let parent = parent.borrow();
	let native = match parent.capabilities().resolve_collection(slot) {
		Some(collection) if collection.contains => parent.contains(slot, child),
		_ => None,
	};
	native.unwrap_or_else(|| parent.collection(slot).map_or(false, |members| members.iter().any(|member| same_object(member, child))))
}

/// Appends `child` to the collection `slot` unless it's already there.
///
/// Falls back to replacing the whole collection if there is no adder.
pub(crate) fn add_multi(parent: &ObjectRef, slot: &str, child: &ObjectRef) -> bool {
	if contains(parent, slot, child) {
		return true;
	}
	let mut parent = parent.borrow_mut();
	match parent.capabilities().resolve_collection(slot) {
		Some(collection) if collection.add => parent.add(slot, child.clone()).is_ok(),
		Some(collection) if collection.replace => {
			let mut members = parent.collection(slot).unwrap_or_default();
			members.push(child.clone());
			parent.replace_collection(slot, members).is_ok()
		}
		_ => false,
	}
}

/// Removes `child` from the collection `slot` if it's there.
pub(crate) fn remove_multi(parent: &ObjectRef, slot: &str, child: &ObjectRef) -> bool {
	if !contains(parent, slot, child) {
		return false;
	}
	let mut parent = parent.borrow_mut();
	match parent.capabilities().resolve_collection(slot) {
		Some(collection) if collection.add => parent.remove(slot, child).is_ok(),
		Some(collection) if collection.replace => {
			let members = parent.collection(slot).unwrap_or_default().into_iter().filter(|member| !same_object(member, child)).collect();
			parent.replace_collection(slot, members).is_ok()
		}
		_ => false,
	}
}

/// Writes `desired` back as the collection `slot` of `parent`.
///
/// Without a replacer, members from the first position that differs onward are removed and re-added in order.
fn rewrite_collection(parent: &ObjectRef, slot: &str, desired: Vec<ObjectRef>) -> bool {
	let mut object = parent.borrow_mut();
	let Some(collection) = object.capabilities().resolve_collection(slot) else { return false };
	if collection.replace {
		return object.replace_collection(slot, desired).is_ok();
	}
	if !collection.add {
		return false;
	}
	let members = object.collection(slot).unwrap_or_default();
	let kept = members.iter().zip(&desired).take_while(|(member, wanted)| same_object(member, wanted)).count();
	trace!(slot, kept, readded = desired.len() - kept, "Resequencing through the adder.");
	members[kept..].iter().all(|member| object.remove(slot, member).is_ok()) && desired[kept..].iter().all(|member| object.add(slot, member.clone()).is_ok())
}

/// Moves or inserts `child` right before `before` in the collection `slot`, appending if `before` isn't a member.
pub(crate) fn insert_multi(parent: &ObjectRef, slot: &str, child: &ObjectRef, before: Option<&ObjectRef>) -> bool {
	let members = parent.borrow().collection(slot);
	let Some(members) = members else { return add_multi(parent, slot, child) };
	let mut desired: Vec<ObjectRef> = members.into_iter().filter(|member| !same_object(member, child)).collect();
	let index = before.and_then(|before| desired.iter().position(|member| same_object(member, before))).unwrap_or(desired.len());
	desired.insert(index, child.clone());
	rewrite_collection(parent, slot, desired)
}

/// Puts `new` where `old` is in the collection `slot`, appending it if `old` isn't a member.
pub(crate) fn replace_member(parent: &ObjectRef, slot: &str, old: &ObjectRef, new: &ObjectRef) -> bool {
	let members = parent.borrow().collection(slot).unwrap_or_default();
	if !members.iter().any(|member| same_object(member, old)) {
		return add_multi(parent, slot, new);
	}
	let desired = members.into_iter().map(|member| if same_object(&member, old) { new.clone() } else { member }).collect();
	rewrite_collection(parent, slot, desired)
}

/// Attaches a child, given as its attach value and its object, without any bookkeeping.
pub(crate) fn link(parent: &ObjectRef, attachment: &Attachment, value: &Value, child: &ObjectRef) -> bool {
	match attachment.kind {
		AttachmentKind::Single => set_single(parent, &attachment.slot, value.clone()),
		AttachmentKind::Multi => add_multi(parent, &attachment.slot, child),
	}
}

pub(crate) fn unlink(parent: &ObjectRef, attachment: &Attachment, child: &ObjectRef) -> bool {
	match attachment.kind {
		AttachmentKind::Single => set_single(parent, &attachment.slot, Value::Null),
		AttachmentKind::Multi => remove_multi(parent, &attachment.slot, child),
	}
}

fn records(instance: &Instance, kind: AttachmentKind) -> &Vec<(String, InstanceId)> {
	match kind {
		AttachmentKind::Single => &instance.attached_single,
		AttachmentKind::Multi => &instance.attached_multi,
	}
}

fn records_mut(instance: &mut Instance, kind: AttachmentKind) -> &mut Vec<(String, InstanceId)> {
	match kind {
		AttachmentKind::Single => &mut instance.attached_single,
		AttachmentKind::Multi => &mut instance.attached_multi,
	}
}

fn is_recorded(parent: &Instance, attachment: &Attachment, child: InstanceId) -> bool {
	records(parent, attachment.kind).iter().any(|(slot, id)| *slot == attachment.slot && *id == child)
}

struct Parts {
	attachment: Option<Attachment>,
	value: Value,
	object: ObjectRef,
}

impl SceneHost {
	fn parts(&self, id: InstanceId) -> Result<Parts, ReconcileError> {
		let instance = self.get(id)?;
		Ok(Parts { attachment: instance.attachment.clone(), value: instance.attach_value(), object: instance.object.clone() })
	}

	/// Attaches `child` to `parent` and records it there.
	///
	/// A child still linked elsewhere is detached first. Attaching an already recorded child again changes nothing.
	/// If `parent` has no usable setter or adder for the child's slot, the child stays unattached (but linked).
	///
	/// # Errors
	///
	/// Iff a handle is stale.
	#[instrument(skip(self))]
	pub fn attach(&mut self, parent: InstanceId, child: InstanceId) -> Result<(), ReconcileError> {
		let Parts { attachment, value, object } = self.parts(child)?;
		let parent_instance = self.get(parent)?;
		if let Some(attachment) = &attachment {
			if is_recorded(parent_instance, attachment, child) {
				trace!("Already attached.");
				return Ok(());
			}
		}
		let previous = self.get(child)?.parent;
		if let Some(previous) = previous {
			self.detach(previous, child)?;
		}

		let parent_instance = self.get(parent)?;
		let parent_object = parent_instance.object.clone();
		let root = parent_instance.root.unwrap_or(parent);
		match attachment {
			None => trace!("Attach-less node. Linking without touching the scene graph."),
			Some(attachment) if parent_instance.folded.contains(&attachment.slot) => trace!(slot = attachment.slot.as_str(), "Slot was filled at construction time."),
			Some(attachment) => {
				if link(&parent_object, &attachment, &value, &object) {
					let records = records_mut(self.get_mut(parent)?, attachment.kind);
					if attachment.kind == AttachmentKind::Single {
						records.retain(|(slot, _)| *slot != attachment.slot);
					}
					records.push((attachment.slot, child));
				} else {
					warn!(slot = attachment.slot.as_str(), parent = parent_object.borrow().type_name(), "No usable setter or adder on the parent. Leaving the child unattached.");
				}
			}
		}

		let parent_instance = self.get_mut(parent)?;
		if !parent_instance.children.contains(&child) {
			parent_instance.children.push(child);
		}
		self.get_mut(child)?.parent = Some(parent);
		self.set_root(child, root);
		self.notify_changed(parent);
		Ok(())
	}

	/// Reverses [`SceneHost::attach`]. Returns whether `child` was recorded on `parent`.
	///
	/// Only recorded attachments touch the scene graph, so detaching twice is harmless.
	///
	/// # Errors
	///
	/// Iff a handle is stale.
	#[instrument(skip(self))]
	pub fn detach(&mut self, parent: InstanceId, child: InstanceId) -> Result<bool, ReconcileError> {
		let Parts { attachment, object, .. } = self.parts(child)?;
		let parent_instance = self.get_mut(parent)?;
		parent_instance.children.retain(|&id| id != child);
		let parent_object = parent_instance.object.clone();

		let recorded = match &attachment {
			Some(attachment) => {
				let records = records_mut(parent_instance, attachment.kind);
				match records.iter().position(|(slot, id)| *slot == attachment.slot && *id == child) {
					Some(index) => {
						records.remove(index);
						true
					}
					None => false,
				}
			}
			None => false,
		};

		let child_instance = self.get_mut(child)?;
		if child_instance.parent == Some(parent) {
			child_instance.parent = None;
			child_instance.root = None;
		}

		if let (true, Some(attachment)) = (recorded, &attachment) {
			if !unlink(&parent_object, attachment, &object) {
				warn!(slot = attachment.slot.as_str(), "Failed to clear the slot on the parent.");
			}
			self.notify_changed(parent);
		} else {
			trace!("Not attached. Nothing to clear.");
		}
		Ok(recorded)
	}

	/// Places `child` right before `before` among `parent`'s multi-slot children, or at the end if `before` is `None`
	/// or in another slot. Anything that isn't a multi-slot child is simply attached.
	///
	/// # Errors
	///
	/// Iff a handle is stale.
	#[instrument(skip(self))]
	pub fn insert(&mut self, parent: InstanceId, child: InstanceId, before: Option<InstanceId>) -> Result<(), ReconcileError> {
		let Parts { attachment, object, .. } = self.parts(child)?;
		let attachment = match attachment {
			Some(attachment) if attachment.kind == AttachmentKind::Multi && !self.get(parent)?.folded.contains(&attachment.slot) => attachment,
			_ => return self.attach(parent, child),
		};

		let previous = self.get(child)?.parent.filter(|&previous| previous != parent);
		if let Some(previous) = previous {
			self.detach(previous, child)?;
		}
		let before_object = match before {
			Some(before) => Some(self.get(before)?.object.clone()),
			None => None,
		};

		let parent_instance = self.get(parent)?;
		let parent_object = parent_instance.object.clone();
		let root = parent_instance.root.unwrap_or(parent);
		if !insert_multi(&parent_object, &attachment.slot, &object, before_object.as_ref()) {
			warn!(slot = attachment.slot.as_str(), "No usable adder or replacer on the parent. Leaving the child unattached.");
		} else {
			let records = &mut self.get_mut(parent)?.attached_multi;
			records.retain(|(slot, id)| !(*slot == attachment.slot && *id == child));
			let index = before.and_then(|before| records.iter().position(|(slot, id)| *slot == attachment.slot && *id == before)).unwrap_or(records.len());
			records.insert(index, (attachment.slot, child));
		}

		let parent_instance = self.get_mut(parent)?;
		parent_instance.children.retain(|&id| id != child);
		let index = before.and_then(|before| parent_instance.children.iter().position(|&id| id == before)).unwrap_or(parent_instance.children.len());
		parent_instance.children.insert(index, child);
		self.get_mut(child)?.parent = Some(parent);
		self.set_root(child, root);
		self.notify_changed(parent);
		Ok(())
	}

	/// Replaces the object behind `id` with `built` in one step.
	///
	/// Recorded children move over to the new object, the parent's slot (or collection position) is pointed at it,
	/// `node_ref` observes it, and the old object is unregistered from and disposed.
	///
	/// # Errors
	///
	/// Iff a handle is stale.
	#[instrument(skip(self, built, node_ref))]
	pub fn swap_identity(&mut self, id: InstanceId, built: Built, node_ref: Option<&NodeRef>) -> Result<(), ReconcileError> {
		let old = self.get(id)?;
		let (old_object, old_attachment, parent) = (old.object.clone(), old.attachment.clone(), old.parent);
		let recorded: Vec<(String, InstanceId)> = old.attached_single.iter().chain(old.attached_multi.iter()).cloned().collect();
		let new_value = built.behavior.clone().map_or_else(|| Value::Object(built.object.clone()), Value::Function);
		if old.hidden {
			set_visible(&built.object, false);
		}

		let mut attached_single = Vec::new();
		let mut attached_multi = Vec::new();
		for (slot, child) in recorded {
			let Parts { attachment, value, object } = self.parts(child)?;
			let Some(attachment) = attachment else { continue };
			if built.folded.contains(&slot) {
				trace!(slot = slot.as_str(), "Slot is now filled at construction time.");
				continue;
			}
			if link(&built.object, &attachment, &value, &object) {
				match attachment.kind {
					AttachmentKind::Single => attached_single.push((slot, child)),
					AttachmentKind::Multi => attached_multi.push((slot, child)),
				}
			} else {
				warn!(slot = slot.as_str(), "Replacement can't take a child of the old object. Leaving it unattached.");
			}
		}

		if let Some(parent) = parent {
			let parent_instance = self.get(parent)?;
			let parent_object = parent_instance.object.clone();
			let was_recorded = old_attachment.as_ref().map_or(false, |attachment| is_recorded(parent_instance, attachment, id));
			match (&old_attachment, &built.attachment) {
				(Some(old_attachment), Some(new_attachment)) if was_recorded && old_attachment == new_attachment => {
					let replaced = match new_attachment.kind {
						AttachmentKind::Single => set_single(&parent_object, &new_attachment.slot, new_value),
						AttachmentKind::Multi => replace_member(&parent_object, &new_attachment.slot, &old_object, &built.object),
					};
					if !replaced {
						warn!(slot = new_attachment.slot.as_str(), "Failed to put the replacement into the parent.");
					}
				}
				(old_attachment, new_attachment) => {
					let parent_instance = self.get_mut(parent)?;
					if let (true, Some(old_attachment)) = (was_recorded, old_attachment) {
						records_mut(parent_instance, old_attachment.kind).retain(|(slot, child)| !(*slot == old_attachment.slot && *child == id));
						unlink(&parent_object, old_attachment, &old_object);
					}
					if let Some(new_attachment) = new_attachment {
						if !parent_instance.folded.contains(&new_attachment.slot) && link(&parent_object, new_attachment, &new_value, &built.object) {
							records_mut(parent_instance, new_attachment.kind).push((new_attachment.slot.clone(), id));
						}
					}
				}
			}
		}

		let old = self.get_mut(id)?;
		let listeners = core::mem::take(&mut old.listeners);
		self.release_listeners(&old_object, listeners);
		old_object.borrow_mut().dispose();

		let instance = self.get_mut(id)?;
		instance.object = built.object.clone();
		instance.attachment = built.attachment;
		instance.raw = built.raw;
		instance.behavior = built.behavior;
		instance.folded = built.folded;
		instance.attached_single = attached_single;
		instance.attached_multi = attached_multi;
		instance.listeners = built.applied.bound;
		trace!("Swapped identity.");

		if let Some(node_ref) = node_ref {
			node_ref.set(Some(built.object));
		}
		if let Some(parent) = parent {
			self.notify_changed(parent);
		}
		Ok(())
	}

	fn set_root(&mut self, id: InstanceId, root: InstanceId) {
		let Some(instance) = self.instance_mut(id) else { return };
		instance.root = Some(root);
		for child in instance.children.clone() {
			self.set_root(child, root);
		}
	}

	/// Lets the closest ancestor (starting at `from`) that has an explicit recompute hook know that its subgraph changed.
	pub(crate) fn notify_changed(&self, from: InstanceId) {
		let mut current = Some(from);
		while let Some(id) = current {
			let Some(instance) = self.instance(id) else { break };
			let mut object = instance.object.borrow_mut();
			if object.capabilities().has_changed() {
				trace!(kind = object.type_name(), "Notifying changed.");
				object.changed();
				break;
			}
			current = instance.parent;
		}
	}
}
