// Live view-state synchronization: pure per-message reducers over the
// cluster map, per-connection sequence validation, and the store that owns
// both and decides when a full snapshot resync is required.

pub mod handlers;
pub mod sequence;
pub mod store;

pub use handlers::{apply_message, Clusters};
pub use sequence::{SequenceState, SequenceViolation};
pub use store::{Applied, ClusterStore};
