//! Mount targets and their root objects.
//!
//! Each [`MountTarget`] owns at most one root: a root object (from the catalogue entry [`ROOT_TYPE`]), the
//! [`SceneHost`] holding its live instances, and the mounted tree. Every render of a target goes through that root.

use crate::{
	catalogue,
	element::Element,
	error::ReconcileError,
	host::{HostConfig, InstanceId, SceneHost},
	object::{same_object, ConstructorArgs, ObjectRef},
	props::apply_props,
	tree::Container,
	value::{Props, Value},
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::{hash_map::Entry, HashMap};
use tracing::{instrument, trace, warn};

/// Catalogue entry the root object is constructed from.
pub const ROOT_TYPE: &str = "map";

/// Catalogue entry the default view is constructed from.
pub const VIEW_TYPE: &str = "view";

/// Projects WGS 84 longitude and latitude (in degrees) to spherical Web Mercator (EPSG:3857) meters.
#[must_use]
pub fn from_lon_lat(lon: f64, lat: f64) -> [f64; 2] {
	const RADIUS: f64 = 6_378_137.0;
	let x = RADIUS * lon.to_radians();
	let y = RADIUS * (core::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
	[x, y]
}

/// The view options every root starts from.
#[must_use]
pub fn default_view() -> Props {
	let [x, y] = from_lon_lat(37.41, 8.82);
	Props::new().with("center", vec![Value::from(x), Value::from(y)]).with("zoom", 4)
}

/// The view (camera) part of a [`RootConfig`].
#[derive(Clone)]
pub enum ViewConfig {
	/// An externally owned view object, used as-is and swapped wholesale when the reference changes.
	Object(ObjectRef),
	/// Options merged onto [`default_view`] and applied to the current view object.
	Options(Props),
}

impl Debug for ViewConfig {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Object(object) => f.debug_tuple("Object").field(&Value::Object(object.clone())).finish(),
			Self::Options(options) => f.debug_tuple("Options").field(options).finish(),
		}
	}
}

/// Root-level configuration.
#[derive(Debug, Clone, Default)]
pub struct RootConfig {
	pub view: Option<ViewConfig>,
	/// Props applied to the root object itself, `on*` handlers included.
	pub props: Props,
}

impl RootConfig {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_view(mut self, view: ViewConfig) -> Self {
		self.view = Some(view);
		self
	}

	#[must_use]
	pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.props.insert(key, value);
		self
	}
}

/// What [`render`] hands back.
#[derive(Clone)]
pub struct RootState {
	pub map: ObjectRef,
}

impl Debug for RootState {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("RootState").field("map", &Value::Object(self.map.clone())).finish()
	}
}

/// Identifies where a root is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountTarget(pub String);

impl From<&str> for MountTarget {
	fn from(target: &str) -> Self {
		Self(target.to_owned())
	}
}

struct Root {
	host: SceneHost,
	container: Container<SceneHost>,
	map: ObjectRef,
	view: ObjectRef,
	view_options: Props,
	props: Props,
}

impl Root {
	fn create(target: &MountTarget, view: Option<&ViewConfig>) -> Result<Self, ReconcileError> {
		let (view, view_options) = match view {
			Some(ViewConfig::Object(view)) => (view.clone(), Props::new()),
			Some(ViewConfig::Options(options)) => {
				let options = default_view().merged(options);
				(construct(VIEW_TYPE, options.clone())?, options)
			}
			None => (construct(VIEW_TYPE, default_view())?, default_view()),
		};
		let map = construct(ROOT_TYPE, Props::new().with("target", target.0.as_str()).with("view", view.clone()))?;

		let mut host = SceneHost::new();
		let root = host.insert_root(map.clone());
		Ok(Self { host, container: Container::new(root), map, view, view_options, props: Props::new() })
	}

	fn id(&self) -> InstanceId {
		self.container.root()
	}

	fn sync_view(&mut self, view: Option<&ViewConfig>) {
		match view {
			Some(ViewConfig::Object(view)) if !same_object(view, &self.view) => {
				trace!("Swapping the view object.");
				let accepted = {
					let mut map = self.map.borrow_mut();
					map.capabilities().resolve_setter("view").is_some() && map.set("view", view.clone().into()).is_ok()
				};
				if accepted {
					self.view = view.clone();
					self.view_options = Props::new();
				} else {
					warn!("The root object doesn't accept a new view.");
				}
			}
			Some(ViewConfig::Options(options)) => {
				let options = default_view().merged(options);
				let applied = apply_props(&self.view, &options, Some(&self.view_options), None);
				if !applied.unsettable.is_empty() {
					warn!(keys = ?applied.unsettable, "The view has no setter for some options. Ignoring them.");
				}
				self.view_options = options;
			}
			Some(ViewConfig::Object(_)) | None => (),
		}
	}
}

fn construct(kind: &str, options: Props) -> Result<ObjectRef, ReconcileError> {
	catalogue::resolve(kind)?.construct(ConstructorArgs::Config(options.into())).map_err(|source| ReconcileError::Construction { kind: kind.to_owned(), source })
}

/// All roots, by mount target.
#[derive(Default)]
pub struct Roots(HashMap<MountTarget, Root>);

impl Roots {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Renders `elements` into the root of `target`, creating the root on first use.
	///
	/// # Errors
	///
	/// Iff the root objects or any node can't be built. A root that failed to be created isn't registered.
	#[instrument(skip(self, elements, config))]
	pub fn render(&mut self, elements: &[Element], target: &MountTarget, config: &RootConfig) -> Result<RootState, ReconcileError> {
		let root = match self.0.entry(target.clone()) {
			Entry::Occupied(occupied) => {
				let root = occupied.into_mut();
				root.sync_view(config.view.as_ref());
				root
			}
			Entry::Vacant(vacant) => {
				trace!("Creating root.");
				vacant.insert(Root::create(target, config.view.as_ref())?)
			}
		};

		let id = root.id();
		root.host.apply_root_props(id, &config.props, &root.props)?;
		root.props = config.props.clone();

		let result = root.container.update(&mut root.host, elements);
		root.host.reset_after_commit();
		result?;
		Ok(RootState { map: root.map.clone() })
	}

	/// Tears down the root of `target`: every live instance is detached and disposed top-down, then the root object.
	///
	/// Returns whether there was a root.
	///
	/// # Errors
	///
	/// Iff teardown hits a stale handle.
	#[instrument(skip(self))]
	pub fn unmount(&mut self, target: &MountTarget) -> Result<bool, ReconcileError> {
		let Some(mut root) = self.0.remove(target) else {
			return Ok(false);
		};
		let id = root.id();
		let result = root.container.update(&mut root.host, &[]);
		root.host.reset_after_commit();
		root.host.detach_deleted_instance(id);
		result.map(|()| true)
	}

	#[must_use]
	pub fn get(&self, target: &MountTarget) -> Option<RootState> {
		self.0.get(target).map(|root| RootState { map: root.map.clone() })
	}

	/// The host of `target`'s root, for inspection.
	#[must_use]
	pub fn host(&self, target: &MountTarget) -> Option<&SceneHost> {
		self.0.get(target).map(|root| &root.host)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

thread_local! {
	static ROOTS: RefCell<Roots> = RefCell::new(Roots::new());
}

/// [`Roots::render`] on this thread's roots.
///
/// # Errors
///
/// Like [`Roots::render`], and [`ReconcileError::Busy`] if called from within a render on the same thread.
pub fn render(elements: &[Element], target: &MountTarget, config: &RootConfig) -> Result<RootState, ReconcileError> {
	ROOTS.with(|roots| roots.try_borrow_mut().map_err(|_| ReconcileError::Busy)?.render(elements, target, config))
}

/// [`Roots::unmount`] on this thread's roots.
///
/// # Errors
///
/// Like [`Roots::unmount`], and [`ReconcileError::Busy`] if called from within a render on the same thread.
pub fn unmount(target: &MountTarget) -> Result<bool, ReconcileError> {
	ROOTS.with(|roots| roots.try_borrow_mut().map_err(|_| ReconcileError::Busy)?.unmount(target))
}
