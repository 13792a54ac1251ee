mod common;

use common::{child, disposed, install, kind, kinds, layers, make, member, mock, record, render, target};
use scene_reconciler::{object::same_object, Element, HostConfig, ReconcileError, Roots, SceneHost, Value};

fn keyed(kind: &str, key: &str) -> Element {
	Element::new(kind).with_key(key)
}

#[test]
fn single_layer() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[Element::new("vectorLayer")]);

	assert_eq!(kinds(&layers(&map)), ["VectorLayer"]);
}

#[test]
fn explicit_attach_add() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[Element::new("zoomControl"), Element::new("selectInteraction").with_prop("attachAdd", "control")]);

	assert_eq!(kinds(&member(&map, "control")), ["Zoom", "Select"]);
	assert!(member(&map, "interaction").is_empty());
}

#[test]
fn explicit_attach_single() {
	install();
	let mut roots = Roots::new();
	let map = render(
		&mut roots,
		&[Element::new("vectorLayer").with_child(Element::new("styleStyle").with_child(Element::new("strokeStyle").with_prop("attach", "fill").with_prop("width", 3)))],
	);

	let style = child(&layers(&map)[0], "style").unwrap();
	assert_eq!(kind(&child(&style, "fill").unwrap()), "Stroke");
	assert!(child(&style, "stroke").is_none());
}

#[test]
fn sibling_order() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[Element::new("vectorLayer"), Element::new("tileLayer"), Element::new("imageLayer")]);

	assert_eq!(kinds(&layers(&map)), ["VectorLayer", "TileLayer", "ImageLayer"]);
}

#[test]
fn insert_between_siblings() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[keyed("vectorLayer", "a"), keyed("imageLayer", "c")]);
	let c = layers(&map)[1].clone();

	render(&mut roots, &[keyed("vectorLayer", "a"), keyed("tileLayer", "b"), keyed("imageLayer", "c")]);

	let after = layers(&map);
	assert_eq!(kinds(&after), ["VectorLayer", "TileLayer", "ImageLayer"]);
	assert!(same_object(&after[2], &c));
	assert_eq!(disposed(&c), 0);
}

#[test]
fn reorder() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[keyed("vectorLayer", "a"), keyed("tileLayer", "b"), keyed("imageLayer", "c")]);
	let before = layers(&map);

	render(&mut roots, &[keyed("imageLayer", "c"), keyed("vectorLayer", "a"), keyed("tileLayer", "b")]);

	let after = layers(&map);
	assert_eq!(kinds(&after), ["ImageLayer", "VectorLayer", "TileLayer"]);
	assert!(same_object(&after[0], &before[2]));
	assert!(same_object(&after[1], &before[0]));
	assert!(same_object(&after[2], &before[1]));
	assert!(before.iter().all(|layer| disposed(layer) == 0));
}

#[test]
fn remove_middle_disposes_once() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[keyed("vectorLayer", "a"), keyed("tileLayer", "b").with_child(Element::new("oSMSource")), keyed("imageLayer", "c")]);
	let before = layers(&map);
	let source = child(&before[1], "source").unwrap();

	render(&mut roots, &[keyed("vectorLayer", "a"), keyed("imageLayer", "c")]);

	let after = layers(&map);
	assert_eq!(kinds(&after), ["VectorLayer", "ImageLayer"]);
	assert!(same_object(&after[0], &before[0]));
	assert!(same_object(&after[1], &before[2]));
	assert_eq!(disposed(&before[0]), 0);
	assert_eq!(disposed(&before[1]), 1);
	assert_eq!(disposed(&before[2]), 0);
	assert_eq!(disposed(&source), 1);

	render(&mut roots, &[keyed("vectorLayer", "a"), keyed("imageLayer", "c")]);
	assert_eq!(disposed(&before[1]), 1);
}

#[test]
fn nested_tree() {
	install();
	let mut roots = Roots::new();
	let map = render(
		&mut roots,
		&[Element::new("vectorLayer").with_child(
			Element::new("vectorSource").with_children([
				Element::new("feature").with_child(Element::new("pointGeometry").with_prop("coordinates", vec![Value::from(1), Value::from(2)])),
				Element::new("feature"),
			]),
		)],
	);

	let source = child(&layers(&map)[0], "source").unwrap();
	assert_eq!(kind(&source), "VectorSource");
	let features = member(&source, "feature");
	assert_eq!(kinds(&features), ["Feature", "Feature"]);
	let point = child(&features[0], "geometry").unwrap();
	assert_eq!(kind(&point), "Point");
	assert!(mock(&source, |source| source.changed) >= 2);
	assert!(mock(&map, |map| map.changed) >= 1);
}

#[test]
fn root_propagates() {
	install();
	let mut roots = Roots::new();
	render(&mut roots, &[Element::new("vectorLayer").with_child(Element::new("vectorSource").with_child(Element::new("feature")))]);

	let host = roots.host(&target()).unwrap();
	let root = host.instance_ids().find(|&id| host.instance(id).unwrap().type_tag() == "Map");
	let feature = host.instance_ids().find(|&id| host.instance(id).unwrap().type_tag() == "feature").unwrap();
	assert_eq!(host.instance(feature).unwrap().root(), root);
}

#[test]
fn attach_less_child_stays_unattached() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[Element::new("helper"), Element::new("vectorLayer")]);

	assert_eq!(kinds(&layers(&map)), ["VectorLayer"]);
	assert_eq!(roots.host(&target()).unwrap().len(), 3);
}

#[test]
fn unsupported_slot_is_not_an_error() {
	install();
	let mut roots = Roots::new();
	let map = render(&mut roots, &[Element::new("zoomControl").with_child(Element::new("vectorLayer"))]);

	let control = member(&map, "control");
	assert_eq!(kinds(&control), ["Zoom"]);
	assert!(layers(&map).is_empty());
}

#[test]
fn single_round_trip() {
	install();
	let mut host = SceneHost::new();
	let style = make("styleStyle");
	let root = host.insert_root(style.clone());
	let fill = host.create_instance(&Element::new("fillStyle").with_prop("color", "red")).unwrap();

	host.attach(root, fill).unwrap();
	host.attach(root, fill).unwrap();
	assert!(same_object(&child(&style, "fill").unwrap(), &host.object(fill).unwrap()));
	assert_eq!(host.instance(root).unwrap().attached_single().len(), 1);

	assert!(host.detach(root, fill).unwrap());
	assert!(child(&style, "fill").is_none());
	assert!(host.instance(root).unwrap().attached_single().is_empty());
	assert_eq!(host.instance(fill).unwrap().parent(), None);

	assert!(!host.detach(root, fill).unwrap());
}

#[test]
fn multi_round_trip() {
	install();
	let mut host = SceneHost::new();
	let map = make("map");
	let root = host.insert_root(map.clone());
	let layer = host.create_instance(&Element::new("vectorLayer")).unwrap();

	host.append_child_to_container(root, layer).unwrap();
	host.attach(root, layer).unwrap();
	assert_eq!(layers(&map).len(), 1);
	assert_eq!(host.instance(root).unwrap().attached_multi().len(), 1);

	assert!(host.detach(root, layer).unwrap());
	assert!(layers(&map).is_empty());
	assert!(host.instance(root).unwrap().attached_multi().is_empty());

	assert!(!host.detach(root, layer).unwrap());
	assert!(layers(&map).is_empty());
	assert_eq!(disposed(&host.object(layer).unwrap()), 0);
}

#[test]
fn host_insert_before() {
	install();
	let mut host = SceneHost::new();
	let map = make("map");
	let root = host.insert_root(map.clone());
	let [a, b, c] = ["vectorLayer", "tileLayer", "imageLayer"].map(|kind| host.create_instance(&Element::new(kind)).unwrap());

	host.append_child_to_container(root, a).unwrap();
	host.append_child_to_container(root, c).unwrap();
	host.insert_in_container_before(root, b, c).unwrap();

	assert_eq!(kinds(&layers(&map)), ["VectorLayer", "TileLayer", "ImageLayer"]);
	let recorded: Vec<_> = host.instance(root).unwrap().attached_multi().iter().map(|(_, id)| *id).collect();
	assert_eq!(recorded, [a, b, c]);
}

#[test]
fn insert_through_adder() {
	install();
	let mut host = SceneHost::new();
	let map = make("map");
	let root = host.insert_root(map.clone());
	let zoom = host.create_instance(&Element::new("zoomControl")).unwrap();
	let select = host.create_instance(&Element::new("selectInteraction").with_prop("attachAdd", "control")).unwrap();

	host.append_child_to_container(root, zoom).unwrap();
	host.insert_in_container_before(root, select, zoom).unwrap();

	assert_eq!(kinds(&member(&map, "control")), ["Select", "Zoom"]);
	let recorded: Vec<_> = host.instance(root).unwrap().attached_multi().iter().map(|(_, id)| *id).collect();
	assert_eq!(recorded, [select, zoom]);
}

#[test]
fn reorder_through_adder() {
	install();
	let mut roots = Roots::new();
	let tree = |order: [&str; 2]| {
		order.map(|key| match key {
			"a" => keyed("zoomControl", "a"),
			_ => keyed("selectInteraction", "b").with_prop("attachAdd", "control"),
		})
	};
	let map = render(&mut roots, &tree(["a", "b"]));
	let before = member(&map, "control");
	assert_eq!(kinds(&before), ["Zoom", "Select"]);

	render(&mut roots, &tree(["b", "a"]));

	let after = member(&map, "control");
	assert_eq!(kinds(&after), ["Select", "Zoom"]);
	assert!(same_object(&after[0], &before[1]));
	assert!(same_object(&after[1], &before[0]));
	assert_eq!(disposed(&before[0]) + disposed(&before[1]), 0);
}

#[test]
fn reconstruction_keeps_position_in_adder_collections() {
	install();
	let mut roots = Roots::new();
	let tree = |level: i32| [keyed("zoomControl", "a").with_prop("args", record([("delta", level.into())])), keyed("selectInteraction", "b").with_prop("attachAdd", "control")];
	let map = render(&mut roots, &tree(1));
	let before = member(&map, "control");

	render(&mut roots, &tree(2));

	let after = member(&map, "control");
	assert_eq!(kinds(&after), ["Zoom", "Select"]);
	assert!(!same_object(&after[0], &before[0]));
	assert!(same_object(&after[1], &before[1]));
	assert_eq!(disposed(&before[0]), 1);
}

#[test]
fn removed_instances_are_stale() {
	install();
	let mut host = SceneHost::new();
	let root = host.insert_root(make("map"));
	let layer = host.create_instance(&Element::new("vectorLayer")).unwrap();
	host.append_child_to_container(root, layer).unwrap();

	host.remove_child_from_container(root, layer).unwrap();
	host.detach_deleted_instance(layer);
	let tile = host.create_instance(&Element::new("tileLayer")).unwrap();

	assert_ne!(tile, layer);
	assert!(host.instance(layer).is_none());
	assert_eq!(host.instance(tile).unwrap().type_tag(), "tileLayer");
	assert!(matches!(host.attach(root, layer), Err(ReconcileError::StaleInstance(id)) if id == layer));
	assert!(layers(&host.object(root).unwrap()).is_empty());
	assert_eq!(host.instance_ids().filter(|&id| id == layer).count(), 0);

	host.detach_deleted_instance(layer);
	assert!(host.instance(tile).is_some());
}
