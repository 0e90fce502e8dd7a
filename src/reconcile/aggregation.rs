use std::collections::{BTreeMap, BTreeSet};

use crate::errors::Error;
use crate::reconcile::touched;
use crate::store::{Change, State, Tx};
use crate::types::{
	AddressGroup, AggregatedHostRef, AggregatedRef, Host, Kind, NamespacedObjectRef, Network,
	NetworkItem, ObjectRef, RefSource, Resource, ResourceIdentifier, Service,
};

fn ag_ref(id: &ResourceIdentifier) -> NamespacedObjectRef {
	NamespacedObjectRef::new(Kind::AddressGroup, id.name.clone(), id.namespace.clone())
}

fn host_ref_for(id: &ResourceIdentifier) -> NamespacedObjectRef {
	NamespacedObjectRef::new(Kind::Host, id.name.clone(), id.namespace.clone())
}

/// Merge membership entries keyed by (namespace, name). Spec-sourced entries
/// win over binding-sourced duplicates.
fn merge_refs(
	spec: impl IntoIterator<Item = NamespacedObjectRef>,
	binding: impl IntoIterator<Item = NamespacedObjectRef>,
) -> Vec<AggregatedRef> {
	let mut merged: BTreeMap<ResourceIdentifier, AggregatedRef> = BTreeMap::new();
	for target in binding {
		merged.insert(
			target.id(),
			AggregatedRef {
				target,
				source: RefSource::Binding,
			},
		);
	}
	for target in spec {
		merged.insert(
			target.id(),
			AggregatedRef {
				target,
				source: RefSource::Spec,
			},
		);
	}
	merged.into_values().collect()
}

/// Services whose aggregated membership may have changed: the ones touched
/// directly plus the ones referenced by a touched binding, before or after.
fn affected_services(changes: &[Change], base: &State, work: &State) -> BTreeSet<ResourceIdentifier> {
	let mut affected = touched(changes, Kind::Service);
	for id in touched(changes, Kind::AddressGroupBinding) {
		for state in [base, work] {
			if let Some(b) = state.address_group_bindings.get(&id) {
				affected.insert(ResourceIdentifier::new(
					b.service_ref.namespace_or(&b.self_ref.namespace),
					b.service_ref.name.clone(),
				));
			}
		}
	}
	affected
}

pub(crate) fn reconcile_service_aggregation(
	tx: &mut Tx<'_>,
	changes: &[Change],
) -> Result<BTreeSet<ResourceIdentifier>, Error> {
	let base = tx.base_arc();
	let affected = affected_services(changes, &base, tx.state());

	let work = tx.state();
	let mut updates: Vec<Service> = Vec::new();
	for id in &affected {
		let Some(svc) = work.services.get(id) else {
			continue;
		};
		let spec = svc.address_groups.iter().map(|r| {
			NamespacedObjectRef::new(
				Kind::AddressGroup,
				r.name.clone(),
				r.namespace_or(&svc.self_ref.namespace),
			)
		});
		let binding = work
			.address_group_bindings
			.iter()
			.filter(|b| {
				b.service_ref.namespace_or(&b.self_ref.namespace) == id.namespace
					&& b.service_ref.name == id.name
			})
			.map(|b| {
				let ag_id = ResourceIdentifier::new(
					b.address_group_ref.namespace_or(&b.self_ref.namespace),
					b.address_group_ref.name.clone(),
				);
				ag_ref(&ag_id)
			});
		let aggregated = merge_refs(spec, binding);
		if aggregated != svc.aggregated_address_groups {
			let mut next = svc.clone();
			next.aggregated_address_groups = aggregated;
			updates.push(next);
		}
	}
	for svc in updates {
		tx.upsert(svc)?;
	}
	Ok(affected)
}

/// Address groups whose aggregated hosts or materialised networks may have
/// changed.
fn affected_address_groups(
	changes: &[Change],
	base: &State,
	work: &State,
) -> BTreeSet<ResourceIdentifier> {
	let mut affected = touched(changes, Kind::AddressGroup);

	for id in touched(changes, Kind::HostBinding) {
		for state in [base, work] {
			if let Some(b) = state.host_bindings.get(&id) {
				affected.insert(ResourceIdentifier::new(
					b.self_ref.namespace.clone(),
					b.address_group_ref.name.clone(),
				));
			}
		}
	}
	for id in touched(changes, Kind::NetworkBinding) {
		for state in [base, work] {
			if let Some(b) = state.network_bindings.get(&id) {
				affected.insert(ResourceIdentifier::new(
					b.self_ref.namespace.clone(),
					b.address_group_ref.name.clone(),
				));
			}
		}
	}

	// A touched host refreshes every group that aggregates it (its UUID rides
	// along in the aggregated entry); a touched network refreshes the group
	// its binding materialises it into.
	let touched_hosts = touched(changes, Kind::Host);
	let touched_networks = touched(changes, Kind::Network);
	if !touched_hosts.is_empty() || !touched_networks.is_empty() {
		for state in [base, work] {
			for ag in state.address_groups.iter() {
				let uses_host = ag.hosts.iter().any(|r| {
					touched_hosts.contains(&ResourceIdentifier::new(
						r.namespace_or(&ag.self_ref.namespace),
						r.name.clone(),
					))
				});
				if uses_host {
					affected.insert(ag.id());
				}
			}
			for b in state.host_bindings.iter() {
				let host_id =
					ResourceIdentifier::new(b.self_ref.namespace.clone(), b.host_ref.name.clone());
				if touched_hosts.contains(&host_id) {
					affected.insert(ResourceIdentifier::new(
						b.self_ref.namespace.clone(),
						b.address_group_ref.name.clone(),
					));
				}
			}
			for b in state.network_bindings.iter() {
				let network_id =
					ResourceIdentifier::new(b.self_ref.namespace.clone(), b.network_ref.name.clone());
				if touched_networks.contains(&network_id) {
					affected.insert(ResourceIdentifier::new(
						b.self_ref.namespace.clone(),
						b.address_group_ref.name.clone(),
					));
				}
			}
		}
	}
	affected
}

pub(crate) fn reconcile_address_group_aggregation(
	tx: &mut Tx<'_>,
	changes: &[Change],
) -> Result<BTreeSet<ResourceIdentifier>, Error> {
	let base = tx.base_arc();
	let affected = affected_address_groups(changes, &base, tx.state());

	let work = tx.state();
	let mut updates: Vec<AddressGroup> = Vec::new();
	for id in &affected {
		let Some(ag) = work.address_groups.get(id) else {
			continue;
		};

		let uuid_of = |host_id: &ResourceIdentifier| {
			work
				.hosts
				.get(host_id)
				.map(|h| h.uuid.clone())
				.unwrap_or_default()
		};

		let spec: Vec<NamespacedObjectRef> = ag
			.hosts
			.iter()
			.map(|r| {
				host_ref_for(&ResourceIdentifier::new(
					r.namespace_or(&ag.self_ref.namespace),
					r.name.clone(),
				))
			})
			.collect();
		let binding: Vec<NamespacedObjectRef> = work
			.host_bindings
			.iter()
			.filter(|b| {
				b.self_ref.namespace == id.namespace && b.address_group_ref.name == id.name
			})
			.map(|b| {
				host_ref_for(&ResourceIdentifier::new(
					b.self_ref.namespace.clone(),
					b.host_ref.name.clone(),
				))
			})
			.collect();
		let aggregated: Vec<AggregatedHostRef> = merge_refs(spec, binding)
			.into_iter()
			.map(|r| {
				let uuid = uuid_of(&r.target.id());
				AggregatedHostRef {
					target: r.target,
					uuid,
					source: r.source,
				}
			})
			.collect();

		// Inline network items stay as declared; binding-materialised items
		// follow, ordered by network name.
		let mut networks: Vec<NetworkItem> = ag
			.networks
			.iter()
			.filter(|n| n.network_ref.is_none())
			.cloned()
			.collect();
		let mut materialised: Vec<NetworkItem> = work
			.network_bindings
			.iter()
			.filter(|b| {
				b.self_ref.namespace == id.namespace && b.address_group_ref.name == id.name
			})
			.filter_map(|b| {
				let network_id =
					ResourceIdentifier::new(b.self_ref.namespace.clone(), b.network_ref.name.clone());
				work.networks.get(&network_id).map(|n: &Network| NetworkItem {
					name: n.self_ref.name.clone(),
					cidr: n.cidr.clone(),
					network_ref: Some(NamespacedObjectRef::new(
						Kind::Network,
						n.self_ref.name.clone(),
						n.self_ref.namespace.clone(),
					)),
				})
			})
			.collect();
		materialised.sort_by(|a, b| a.name.cmp(&b.name));
		networks.extend(materialised);

		if aggregated != ag.aggregated_hosts || networks != ag.networks {
			let mut next = ag.clone();
			next.aggregated_hosts = aggregated;
			next.networks = networks;
			updates.push(next);
		}
	}
	for ag in updates {
		tx.upsert(ag)?;
	}
	Ok(affected)
}

pub(crate) fn reconcile_network_status(tx: &mut Tx<'_>, changes: &[Change]) -> Result<(), Error> {
	let base = tx.base_arc();
	let mut affected = touched(changes, Kind::Network);
	for id in touched(changes, Kind::NetworkBinding) {
		for state in [&*base, tx.state()] {
			if let Some(b) = state.network_bindings.get(&id) {
				affected.insert(ResourceIdentifier::new(
					b.self_ref.namespace.clone(),
					b.network_ref.name.clone(),
				));
			}
		}
	}

	let work = tx.state();
	let mut updates: Vec<Network> = Vec::new();
	for id in &affected {
		let Some(network) = work.networks.get(id) else {
			continue;
		};
		let binding = work.network_bindings.iter().find(|b| {
			b.self_ref.namespace == id.namespace && b.network_ref.name == id.name
		});
		let mut next = network.clone();
		match binding {
			Some(b) => {
				next.is_bound = true;
				next.binding_ref = Some(ObjectRef::new(Kind::NetworkBinding, b.self_ref.name.clone()));
				next.address_group_ref = Some(NamespacedObjectRef::new(
					Kind::AddressGroup,
					b.address_group_ref.name.clone(),
					b.self_ref.namespace.clone(),
				));
			},
			None => {
				next.is_bound = false;
				next.binding_ref = None;
				next.address_group_ref = None;
			},
		}
		if next != *network {
			updates.push(next);
		}
	}
	for n in updates {
		tx.upsert(n)?;
	}
	Ok(())
}

pub(crate) fn reconcile_host_status(tx: &mut Tx<'_>, changes: &[Change]) -> Result<(), Error> {
	let base = tx.base_arc();
	let mut affected = touched(changes, Kind::Host);
	for id in touched(changes, Kind::HostBinding) {
		for state in [&*base, tx.state()] {
			if let Some(b) = state.host_bindings.get(&id) {
				affected.insert(ResourceIdentifier::new(
					b.self_ref.namespace.clone(),
					b.host_ref.name.clone(),
				));
			}
		}
	}

	let work = tx.state();
	let mut updates: Vec<Host> = Vec::new();
	for id in &affected {
		let Some(host) = work.hosts.get(id) else {
			continue;
		};
		let binding = work
			.host_bindings
			.iter()
			.find(|b| b.self_ref.namespace == id.namespace && b.host_ref.name == id.name);
		let mut next = host.clone();
		match binding {
			Some(b) => {
				next.is_bound = true;
				next.address_group_name = b.address_group_ref.name.clone();
				next.binding_ref = Some(ObjectRef::new(Kind::HostBinding, b.self_ref.name.clone()));
				next.address_group_ref = Some(ObjectRef::new(
					Kind::AddressGroup,
					b.address_group_ref.name.clone(),
				));
			},
			None => {
				next.is_bound = false;
				next.address_group_name.clear();
				next.binding_ref = None;
				next.address_group_ref = None;
			},
		}
		if next != *host {
			updates.push(next);
		}
	}
	for h in updates {
		tx.upsert(h)?;
	}
	Ok(())
}
