use std::collections::BTreeSet;

use crate::errors::Error;
use crate::reconcile::touched;
use crate::store::{Change, State, Tx};
use crate::types::{
	AddressGroupPortMapping, Kind, PortRange, ProtocolPorts, ResourceIdentifier, Service,
	ServicePorts, TransportProtocol,
};

/// Normalised per-protocol ranges of a service's ingress ports. Assumes the
/// port strings passed structural validation.
pub(crate) fn service_ports(svc: &Service) -> ProtocolPorts {
	let mut ports = ProtocolPorts::default();
	for protocol in TransportProtocol::ALL {
		let ranges: Vec<PortRange> = svc
			.ingress_ports
			.iter()
			.filter(|p| p.protocol == protocol)
			.filter_map(|p| PortRange::parse(&p.port).ok())
			.collect();
		*ports.get_mut(protocol) = PortRange::normalize(ranges);
	}
	ports
}

/// Every address group whose member set may have shifted: the groups already
/// identified by aggregation, plus the groups named in the pre/post
/// aggregated membership of every affected service.
fn mapping_targets(
	base: &State,
	work: &State,
	services: &BTreeSet<ResourceIdentifier>,
	address_groups: &BTreeSet<ResourceIdentifier>,
) -> BTreeSet<ResourceIdentifier> {
	let mut targets = address_groups.clone();
	for id in services {
		for state in [base, work] {
			if let Some(svc) = state.services.get(id) {
				for r in &svc.aggregated_address_groups {
					targets.insert(r.target.id());
				}
			}
		}
	}
	targets
}

/// Rebuild the port mapping of every affected address group: one entry per
/// aggregated member service, carrying its merged non-overlapping ranges.
pub(crate) fn reconcile_port_mappings(
	tx: &mut Tx<'_>,
	changes: &[Change],
	services: &BTreeSet<ResourceIdentifier>,
	address_groups: &BTreeSet<ResourceIdentifier>,
) -> Result<(), Error> {
	let base = tx.base_arc();
	let mut targets = mapping_targets(&base, tx.state(), services, address_groups);
	// A touched mapping id can only come from this reconciler, but fold it in
	// so a rerun converges.
	targets.extend(touched(changes, Kind::AddressGroupPortMapping));

	let work = tx.state();
	let mut updates: Vec<AddressGroupPortMapping> = Vec::new();
	let mut removals: Vec<ResourceIdentifier> = Vec::new();
	for id in &targets {
		if !work.address_groups.contains(id) {
			if work.address_group_port_mappings.contains(id) {
				removals.push(id.clone());
			}
			continue;
		}
		// Member services are the ones aggregating this group; table order
		// keeps the mapping stable.
		let access_ports: Vec<ServicePorts> = work
			.services
			.iter()
			.filter(|svc| {
				svc
					.aggregated_address_groups
					.iter()
					.any(|r| r.target.id() == *id)
			})
			.map(|svc| ServicePorts {
				service_ref: crate::types::NamespacedObjectRef::new(
					Kind::Service,
					svc.self_ref.name.clone(),
					svc.self_ref.namespace.clone(),
				),
				ports: service_ports(svc),
			})
			.collect();

		let next = AddressGroupPortMapping {
			self_ref: id.clone(),
			meta: Default::default(),
			access_ports,
		};
		match work.address_group_port_mappings.get(id) {
			Some(prev) if prev.access_ports == next.access_ports => {},
			_ => updates.push(next),
		}
	}
	for id in removals {
		tx.delete::<AddressGroupPortMapping>(&id);
	}
	for m in updates {
		tx.upsert(m)?;
	}
	Ok(())
}
