//! The attachment policy: how a node hooks into its parent.

use crate::{object::SceneObject, value::Props};

/// Whether a slot holds exactly one child or an ordered collection of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
	Single,
	Multi,
}

/// The slot a node attaches to on its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attachment {
	pub kind: AttachmentKind,
	/// Singular slot name, like `"layer"` or `"geometry"`.
	pub slot: String,
}

impl Attachment {
	#[must_use]
	pub fn single(slot: impl Into<String>) -> Self {
		Self { kind: AttachmentKind::Single, slot: slot.into() }
	}

	#[must_use]
	pub fn multi(slot: impl Into<String>) -> Self {
		Self { kind: AttachmentKind::Multi, slot: slot.into() }
	}
}

/// The node categories with an implicit attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
	Layer,
	Interaction,
	Geometry,
	Fill,
	Stroke,
	Style,
	Text,
	/// Image styles (circles, icons, shapes).
	Image,
	Source,
	Control,
	View,
	Feature,
}

impl Category {
	#[must_use]
	pub fn attachment(self) -> Attachment {
		match self {
			Self::Layer => Attachment::multi("layer"),
			Self::Interaction => Attachment::multi("interaction"),
			Self::Geometry => Attachment::single("geometry"),
			Self::Fill => Attachment::single("fill"),
			Self::Stroke => Attachment::single("stroke"),
			Self::Style => Attachment::single("style"),
			Self::Text => Attachment::single("text"),
			Self::Image => Attachment::single("image"),
			Self::Source => Attachment::single("source"),
			Self::Control => Attachment::multi("control"),
			Self::View => Attachment::single("view"),
			Self::Feature => Attachment::multi("feature"),
		}
	}
}

struct Rule {
	category: Category,
	matches_name: fn(&str) -> bool,
}

// Specific rules come before the generic `*Style` one.
const RULES: [Rule; 12] = [
	Rule { category: Category::Layer, matches_name: |name| name.ends_with("Layer") },
	Rule { category: Category::Interaction, matches_name: |name| name.ends_with("Interaction") },
	Rule { category: Category::Geometry, matches_name: |name| name.ends_with("Geometry") },
	Rule { category: Category::Fill, matches_name: |name| name == "fillStyle" },
	Rule { category: Category::Stroke, matches_name: |name| name == "strokeStyle" },
	Rule { category: Category::Style, matches_name: |name| name == "styleStyle" },
	Rule { category: Category::Text, matches_name: |name| name == "textStyle" },
	Rule { category: Category::Image, matches_name: |name| name.ends_with("Style") },
	Rule { category: Category::Source, matches_name: |name| name.ends_with("Source") },
	Rule { category: Category::Control, matches_name: |name| name.ends_with("Control") },
	Rule { category: Category::View, matches_name: |name| name.to_lowercase().ends_with("view") },
	Rule { category: Category::Feature, matches_name: |name| name.to_lowercase().ends_with("feature") },
];

/// Infers the category from the type name or, failing that, from a constructed object's runtime category.
///
/// Rules are tried in precedence order, and each rule accepts either a matching name or a matching object.
#[must_use]
pub fn category_of(type_name: &str, object: Option<&dyn SceneObject>) -> Option<Category> {
	let runtime = object.and_then(SceneObject::category);
	RULES.iter().find(|rule| (rule.matches_name)(type_name) || runtime == Some(rule.category)).map(|rule| rule.category)
}

/// The attachment explicitly declared through `attach` (single) or `attachAdd` (multi).
#[must_use]
pub fn explicit(props: &Props) -> Option<Attachment> {
	if let Some(slot) = props.get("attach").and_then(|v| v.as_str()) {
		Some(Attachment::single(slot))
	} else {
		props.get("attachAdd").and_then(|v| v.as_str()).map(Attachment::multi)
	}
}

/// Explicit props win outright. Otherwise the attachment is inferred, and `None` means attach-less.
#[must_use]
pub fn classify(type_name: &str, props: &Props, object: Option<&dyn SceneObject>) -> Option<Attachment> {
	explicit(props).or_else(|| category_of(type_name, object).map(Category::attachment))
}
