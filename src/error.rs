use crate::{host::InstanceId, object::ConstructError};
use thiserror::Error;

/// Fatal reconciliation errors.
///
/// Attachment problems are not among these: they are logged and the child stays unattached.
#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error("`{0}` is not a part of the scene-graph catalogue")]
	Unresolved(String),

	#[error("invalid `{kind}` node: {reason}")]
	Configuration { kind: String, reason: &'static str },

	#[error("failed to construct `{kind}`")]
	Construction {
		kind: String,
		#[source]
		source: ConstructError,
	},

	#[error("stale instance handle {0:?}")]
	StaleInstance(InstanceId),

	#[error("the root registry is busy (`render` and `unmount` are not reentrant)")]
	Busy,
}
