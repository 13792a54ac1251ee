#![doc(html_root_url = "https://docs.rs/scene-reconciler/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Keeps an externally owned scene graph (map layers, sources, styles, geometries, interactions, controls)
//! in sync with declarative element trees.
//!
//! See [`host::SceneHost`] for the reconciler and [`root::render`] for the mount API.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod attach;
pub mod builder;
pub mod catalogue;
pub mod element;
pub mod error;
pub mod graph;
pub mod host;
mod listeners;
pub mod object;
pub mod props;
pub mod root;
pub mod tree;
pub mod value;

pub use attach::{Attachment, AttachmentKind, Category};
pub use catalogue::{extend, Entry, Namespace};
pub use element::{Element, NodeRef};
pub use error::ReconcileError;
pub use host::{HostConfig, InstanceId, SceneHost, UpdatePayload};
pub use object::{object, Capabilities, Collection, ConstructError, Constructor, ConstructorArgs, ObjectRef, SceneObject, Unsupported};
pub use root::{render, unmount, MountTarget, RootConfig, RootState, Roots, ViewConfig};
pub use value::{Callback, Event, Handler, Props, Value};
