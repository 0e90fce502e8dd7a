mod aggregation;
mod portmap;
mod rules;

#[cfg(test)]
mod reconcile_test;

use std::collections::BTreeSet;

use tracing::debug;

use crate::errors::Error;
use crate::store::{Change, Tx};
use crate::types::{Kind, ResourceIdentifier};

/// Identities of one kind touched by the transaction, both upserts and
/// deletes. Deletes matter: a removed binding must refresh the parents it
/// used to contribute to.
pub(crate) fn touched(changes: &[Change], kind: Kind) -> BTreeSet<ResourceIdentifier> {
	changes
		.iter()
		.filter(|c| c.kind == kind)
		.map(|c| c.id.clone())
		.collect()
}

/// Recompute all derived state affected by the transaction's change log.
/// Runs synchronously inside the write transaction, after referential
/// validation. Deterministic: identical input state yields byte-identical
/// derived state, and a rerun with no intervening writes is a no-op.
pub fn run(tx: &mut Tx<'_>) -> Result<(), Error> {
	let primaries = tx.changes().to_vec();
	if primaries.is_empty() {
		return Ok(());
	}
	debug!(changes = primaries.len(), "reconciling derived state");

	let services = aggregation::reconcile_service_aggregation(tx, &primaries)?;
	let address_groups = aggregation::reconcile_address_group_aggregation(tx, &primaries)?;
	aggregation::reconcile_network_status(tx, &primaries)?;
	aggregation::reconcile_host_status(tx, &primaries)?;
	portmap::reconcile_port_mappings(tx, &primaries, &services, &address_groups)?;
	rules::reconcile_rules(tx, &primaries, &services, &address_groups)?;
	Ok(())
}
