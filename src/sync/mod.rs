pub mod queue;

#[cfg(test)]
mod queue_test;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

pub use queue::spawn;

use crate::types::{Batch, Kind, ResourceIdentifier};

/// Identities of one kind touched by a committed transaction. Groups of
/// these are enqueued atomically per commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
	pub kind: Kind,
	pub ids: Vec<ResourceIdentifier>,
}

/// What the enforcement backend receives for one kind: the current material
/// for identities that still exist, and the identities that no longer do.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementUpdate {
	pub subject: Batch,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub removed: Vec<ResourceIdentifier>,
}

#[derive(Debug, Error)]
pub enum PublishError {
	/// Worth retrying: the backend is unreachable or overloaded.
	#[error("transient publish failure: {0}")]
	Transient(String),
	/// Retrying cannot help; the entry is dropped and surfaced via conditions.
	#[error("permanent publish failure: {0}")]
	Permanent(String),
}

/// Thin outbound contract to the enforcement backend. Acknowledgement is
/// required before an entry leaves the queue (at-least-once).
#[async_trait]
pub trait EnforcementClient: Send + Sync + 'static {
	async fn publish(&self, update: &EnforcementUpdate) -> Result<(), PublishError>;
}

/// Stand-in client used when no backend address is configured: logs the
/// update and acknowledges. The real transport lives outside this crate.
#[derive(Debug, Default)]
pub struct LoggingClient;

#[async_trait]
impl EnforcementClient for LoggingClient {
	async fn publish(&self, update: &EnforcementUpdate) -> Result<(), PublishError> {
		info!(
			kind = %update.subject.kind(),
			items = update.subject.len(),
			removed = update.removed.len(),
			"dry-run publish"
		);
		Ok(())
	}
}

/// Producer side of the sync queue. Held by the facade; sends block only on
/// the bounded input channel.
#[derive(Clone, Debug)]
pub struct SyncHandle {
	pub(crate) tx: mpsc::Sender<Vec<Delta>>,
}

impl SyncHandle {
	/// Enqueue one commit's delta group. An error means the worker is gone;
	/// the caller logs and moves on, the write itself already succeeded.
	pub async fn enqueue(&self, group: Vec<Delta>) -> Result<(), Error> {
		self
			.tx
			.send(group)
			.await
			.map_err(|_| Error::WorkerGone)
	}
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("sync worker has shut down")]
	WorkerGone,
}
