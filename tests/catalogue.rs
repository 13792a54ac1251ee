mod common;

use common::{class, init_logging, install, kind, make};
use scene_reconciler::{
	catalogue::{self, Entry, Namespace},
	Capabilities, Category, ConstructorArgs, ReconcileError, Value,
};

fn resolved_kind(name: &str) -> String {
	let object = catalogue::resolve(name).unwrap().construct(ConstructorArgs::Config(Value::Null)).unwrap();
	kind(&object)
}

#[test]
fn exact_and_pascal_case() {
	install();
	catalogue::extend([("ExactWidget", Entry::Constructor(class("Exact", None, Capabilities::new())))]);

	assert_eq!(resolved_kind("map"), "Map");
	assert_eq!(resolved_kind("ExactWidget"), "Exact");
	assert_eq!(resolved_kind("exactWidget"), "Exact");
}

#[test]
fn namespaces() {
	install();

	assert_eq!(resolved_kind("vectorLayer"), "VectorLayer");
	assert_eq!(resolved_kind("webGLPointsLayer"), "WebGLPointsLayer");
	assert_eq!(resolved_kind("vectorSource"), "VectorSource");
	assert_eq!(resolved_kind("oSMSource"), "OSMSource");
	assert_eq!(resolved_kind("circleStyle"), "CircleStyle");
	assert_eq!(kind(&make("selectInteraction")), "Select");
}

#[test]
fn longest_suffix_wins() {
	init_logging();
	catalogue::extend([
		("*Widget", Entry::Namespace(Namespace::new().with("BlueFancy", class("ShortMatch", None, Capabilities::new())))),
		("*FancyWidget", Entry::Namespace(Namespace::new().with("Blue", class("LongMatch", None, Capabilities::new())))),
	]);

	assert_eq!(resolved_kind("blueFancyWidget"), "LongMatch");
}

#[test]
fn library_fallback() {
	install();

	assert_eq!(resolved_kind("feature"), "Feature");
	assert_eq!(resolved_kind("helper"), "Helper");
}

#[test]
fn namespaces_merge() {
	init_logging();
	catalogue::extend([("*Gadget", Entry::Namespace(Namespace::new().with("Red", class("RedGadget", Some(Category::Control), Capabilities::new()))))]);
	catalogue::extend([("*Gadget", Entry::Namespace(Namespace::new().with("Green", class("GreenGadget", Some(Category::Control), Capabilities::new()))))]);

	assert_eq!(resolved_kind("redGadget"), "RedGadget");
	assert_eq!(resolved_kind("greenGadget"), "GreenGadget");
}

#[test]
fn later_entries_replace_earlier_ones() {
	init_logging();
	catalogue::extend([("replacedThing", Entry::Constructor(class("Before", None, Capabilities::new())))]);
	catalogue::extend([("replacedThing", Entry::Constructor(class("After", None, Capabilities::new())))]);

	assert_eq!(resolved_kind("replacedThing"), "After");
}

#[test]
fn unresolved() {
	install();

	assert!(matches!(catalogue::resolve("noSuchWidget"), Err(ReconcileError::Unresolved(name)) if name == "noSuchWidget"));
	assert!(matches!(catalogue::resolve("unknownLayer"), Err(ReconcileError::Unresolved(_))));
}
