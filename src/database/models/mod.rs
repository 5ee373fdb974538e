mod autoplaylist_url;
mod queue_snapshot;

pub use autoplaylist_url::{AutoplaylistUrl, NewAutoplaylistUrl};
pub use queue_snapshot::{NewQueueSnapshotRow, QueueSnapshotRow};
