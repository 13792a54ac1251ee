//! A minimal framework driver: diffs declarative child lists and drives a [`HostConfig`] in commit order.
//!
//! There is no scheduling, batching or suspension here. Every [`Container::update`] renders and commits synchronously.

use crate::{
	element::{Element, NodeRef},
	host::HostConfig,
	object::ObjectRef,
};
use core::mem;
use hashbrown::{hash_map::Entry, HashMap};
use tracing::{instrument, trace, trace_span, warn};

/// A mounted element and its host instance.
pub struct Fiber<I> {
	element: Element,
	instance: I,
	children: Vec<Fiber<I>>,
}

impl<I: Copy> Fiber<I> {
	#[must_use]
	pub fn element(&self) -> &Element {
		&self.element
	}

	#[must_use]
	pub fn instance(&self) -> I {
		self.instance
	}

	#[must_use]
	pub fn children(&self) -> &[Fiber<I>] {
		&self.children
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
	Explicit(String),
	Implicit(usize),
}

fn key_of(element: &Element, index: usize) -> Key {
	element.key().map_or(Key::Implicit(index), |key| Key::Explicit(key.to_owned()))
}

#[derive(Clone, Copy)]
enum Parent<I> {
	Container(I),
	Instance(I),
}

enum Slot<I> {
	Reused { old_index: usize, fiber: Fiber<I> },
	Created(Fiber<I>),
}

impl<I> Slot<I> {
	fn fiber(&self) -> &Fiber<I> {
		match self {
			Slot::Reused { fiber, .. } | Slot::Created(fiber) => fiber,
		}
	}
}

/// The mounted tree below one container instance.
pub struct Container<H: HostConfig> {
	root: H::Instance,
	children: Vec<Fiber<H::Instance>>,
}

impl<H: HostConfig<PublicInstance = ObjectRef>> Container<H> {
	#[must_use]
	pub fn new(root: H::Instance) -> Self {
		Self { root, children: Vec::new() }
	}

	#[must_use]
	pub fn root(&self) -> H::Instance {
		self.root
	}

	#[must_use]
	pub fn children(&self) -> &[Fiber<H::Instance>] {
		&self.children
	}

	/// Renders `elements` as the container's children and commits the result to `host`.
	///
	/// Does not call [`HostConfig::reset_after_commit`].
	///
	/// # Errors
	///
	/// The first host error aborts the update. Fibers that were already deleted or placed stay that way.
	#[instrument(skip(self, host, elements), fields(count = elements.len()))]
	pub fn update(&mut self, host: &mut H, elements: &[Element]) -> Result<(), H::Error> {
		let old = mem::take(&mut self.children);
		self.children = reconcile(host, Parent::Container(self.root), old, elements)?;
		Ok(())
	}
}

fn reconcile<H: HostConfig<PublicInstance = ObjectRef>>(host: &mut H, parent: Parent<H::Instance>, old: Vec<Fiber<H::Instance>>, new: &[Element]) -> Result<Vec<Fiber<H::Instance>>, H::Error> {
	let span = trace_span!("reconcile", "old.len()" = old.len(), "new.len()" = new.len());
	let _enter = span.enter();

	// Render phase.
	let mut slots = Vec::with_capacity(new.len());
	let mut deletions = Vec::new();

	// Common prefix:
	let mut old_rest = old.into_iter().enumerate().peekable();
	let mut new_rest = new.iter().enumerate().peekable();
	while let Some(&(new_index, element)) = new_rest.peek() {
		let Some((old_index, fiber)) = old_rest.next_if(|(old_index, fiber)| key_of(&fiber.element, *old_index) == key_of(element, new_index) && fiber.element.kind() == element.kind()) else {
			break;
		};
		new_rest.next();
		slots.push(Slot::Reused { old_index, fiber });
	}

	// Keyed remainder:
	let mut remaining = HashMap::new();
	for (old_index, fiber) in old_rest {
		match remaining.entry(key_of(&fiber.element, old_index)) {
			Entry::Occupied(_) => {
				warn!("Duplicate key among old siblings. Deleting the later one.");
				deletions.push((old_index, fiber));
			}
			Entry::Vacant(vacant) => {
				vacant.insert((old_index, fiber));
			}
		}
	}
	for (new_index, element) in new_rest {
		match remaining.remove(&key_of(element, new_index)) {
			Some((old_index, fiber)) if fiber.element.kind() == element.kind() => slots.push(Slot::Reused { old_index, fiber }),
			previous => {
				deletions.extend(previous);
				slots.push(Slot::Created(create_subtree(host, element)?));
			}
		}
	}
	deletions.extend(remaining.into_values());
	deletions.sort_by_key(|&(old_index, _)| old_index);

	// Commit phase, deletions first:
	for (_, fiber) in deletions {
		match parent {
			Parent::Container(container) => host.remove_child_from_container(container, fiber.instance)?,
			Parent::Instance(parent) => host.remove_child(parent, fiber.instance)?,
		}
		release(host, fiber);
	}

	// A reused fiber stays in place as long as old positions keep increasing.
	let mut last_placed = 0;
	let placed: Vec<bool> = slots
		.iter()
		.map(|slot| match *slot {
			Slot::Reused { old_index, .. } if old_index >= last_placed => {
				last_placed = old_index;
				false
			}
			_ => true,
		})
		.collect();

	for (index, element) in new.iter().enumerate() {
		if let Slot::Reused { fiber, .. } = &mut slots[index] {
			let children = mem::take(&mut fiber.children);
			fiber.children = reconcile(host, Parent::Instance(fiber.instance), children, element.children())?;
			if let Some(payload) = host.prepare_update(fiber.instance, &fiber.element, element) {
				host.commit_update(fiber.instance, payload, &fiber.element, element)?;
			}
			match (fiber.element.is_hidden(), element.is_hidden()) {
				(false, true) => host.hide_instance(fiber.instance)?,
				(true, false) => host.unhide_instance(fiber.instance, element.props())?,
				_ => (),
			}
			update_ref(host, fiber.instance, fiber.element.node_ref(), element.node_ref());
			fiber.element = element.clone();
		}

		if placed[index] {
			let instance = slots[index].fiber().instance;
			let before = slots[index + 1..].iter().zip(&placed[index + 1..]).find(|(_, placed)| !**placed).map(|(slot, _)| slot.fiber().instance);
			trace!(index, moved = matches!(slots[index], Slot::Reused { .. }), "Placing.");
			match (parent, before) {
				(Parent::Container(container), Some(before)) => host.insert_in_container_before(container, instance, before)?,
				(Parent::Container(container), None) => host.append_child_to_container(container, instance)?,
				(Parent::Instance(parent), Some(before)) => host.insert_before(parent, instance, before)?,
				(Parent::Instance(parent), None) => host.append_child(parent, instance)?,
			}
		}

		if let Slot::Created(fiber) = &slots[index] {
			mount_extras(host, fiber)?;
		}
	}

	Ok(slots
		.into_iter()
		.map(|slot| match slot {
			Slot::Reused { fiber, .. } | Slot::Created(fiber) => fiber,
		})
		.collect())
}

/// Creates the instances of a new subtree and appends initial children bottom-up.
fn create_subtree<H: HostConfig>(host: &mut H, element: &Element) -> Result<Fiber<H::Instance>, H::Error> {
	let instance = host.create_instance(element)?;
	let mut children = Vec::with_capacity(element.children().len());
	for child in element.children() {
		let child = create_subtree(host, child)?;
		host.append_initial_child(instance, child.instance)?;
		children.push(child);
	}
	Ok(Fiber { element: element.clone(), instance, children })
}

/// Hides and attaches refs within a freshly placed subtree.
fn mount_extras<H: HostConfig<PublicInstance = ObjectRef>>(host: &mut H, fiber: &Fiber<H::Instance>) -> Result<(), H::Error> {
	for child in &fiber.children {
		mount_extras(host, child)?;
	}
	if fiber.element.is_hidden() {
		host.hide_instance(fiber.instance)?;
	}
	if let Some(node_ref) = fiber.element.node_ref() {
		node_ref.set(host.public_instance(fiber.instance));
	}
	Ok(())
}

fn update_ref<H: HostConfig<PublicInstance = ObjectRef>>(host: &H, instance: H::Instance, old: Option<&NodeRef>, new: Option<&NodeRef>) {
	match (old, new) {
		(Some(old), Some(new)) if old.ptr_eq(new) => (),
		(old, new) => {
			if let Some(old) = old {
				old.set(None);
			}
			if let Some(new) = new {
				new.set(host.public_instance(instance));
			}
		}
	}
}

/// Releases refs and host instances of a deleted subtree, top-down.
fn release<H: HostConfig>(host: &mut H, fiber: Fiber<H::Instance>) {
	if let Some(node_ref) = fiber.element.node_ref() {
		node_ref.set(None);
	}
	host.detach_deleted_instance(fiber.instance);
	for child in fiber.children {
		release(host, child);
	}
}
