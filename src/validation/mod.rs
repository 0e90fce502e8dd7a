
use std::collections::{BTreeMap, BTreeSet};

use ipnet::IpNet;

use crate::errors::Error;
use crate::store::State;
use crate::types::meta::API_VERSION;
use crate::types::{
	AddressGroup, AddressGroupBinding, AddressGroupBindingPolicy, Host, HostBinding, Kind,
	NamespacedObjectRef, Network, NetworkBinding, ObjectRef, PortRange, Resource,
	ResourceIdentifier, RuleS2S, Service, ServiceAlias,
};

/// Structural validation of one resource: required fields, enum ranges, port
/// and CIDR parse. Pure over the item; runs before any state is touched.
pub trait Validate: Resource {
	fn validate(&self) -> Result<(), Error>;
}

fn check_name(id: &ResourceIdentifier, kind: Kind) -> Result<(), Error> {
	if id.name.is_empty() {
		return Err(Error::invalid_argument(format!("{kind}: name is required")));
	}
	if id.name.contains('/') || id.namespace.contains('/') {
		return Err(Error::invalid_argument(format!(
			"{kind} {id}: name and namespace must not contain '/'"
		)));
	}
	Ok(())
}

fn check_ref(r: &NamespacedObjectRef, expected: Kind, ctx: &str) -> Result<(), Error> {
	if r.name.is_empty() {
		return Err(Error::invalid_argument(format!("{ctx}: reference name is required")));
	}
	if !r.kind.is_empty() && r.kind != expected.as_str() {
		return Err(Error::invalid_argument(format!(
			"{ctx}: reference kind {:?} does not match expected {expected}",
			r.kind
		)));
	}
	if !r.api_version.is_empty() && r.api_version != API_VERSION {
		return Err(Error::invalid_argument(format!(
			"{ctx}: unsupported apiVersion {:?}",
			r.api_version
		)));
	}
	Ok(())
}

fn check_object_ref(r: &ObjectRef, expected: Kind, ctx: &str) -> Result<(), Error> {
	if r.name.is_empty() {
		return Err(Error::invalid_argument(format!("{ctx}: reference name is required")));
	}
	if !r.kind.is_empty() && r.kind != expected.as_str() {
		return Err(Error::invalid_argument(format!(
			"{ctx}: reference kind {:?} does not match expected {expected}",
			r.kind
		)));
	}
	if !r.api_version.is_empty() && r.api_version != API_VERSION {
		return Err(Error::invalid_argument(format!(
			"{ctx}: unsupported apiVersion {:?}",
			r.api_version
		)));
	}
	Ok(())
}

fn check_cidr(cidr: &str, ctx: &str) -> Result<(), Error> {
	cidr
		.parse::<IpNet>()
		.map(|_| ())
		.map_err(|e| Error::invalid_argument(format!("{ctx}: invalid CIDR {cidr:?} ({e})")))
}

impl Validate for Service {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::Service)?;
		for p in &self.ingress_ports {
			PortRange::parse(&p.port)?;
		}
		for r in &self.address_groups {
			check_ref(r, Kind::AddressGroup, &format!("Service {}", self.self_ref))?;
		}
		Ok(())
	}
}

impl Validate for AddressGroup {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::AddressGroup)?;
		let ctx = format!("AddressGroup {}", self.self_ref);
		let mut seen = BTreeSet::new();
		for n in &self.networks {
			if n.name.is_empty() {
				return Err(Error::invalid_argument(format!("{ctx}: network item name is required")));
			}
			if !seen.insert(&n.name) {
				return Err(Error::invalid_argument(format!(
					"{ctx}: duplicate network item {:?}",
					n.name
				)));
			}
			check_cidr(&n.cidr, &ctx)?;
		}
		for h in &self.hosts {
			check_ref(h, Kind::Host, &ctx)?;
		}
		Ok(())
	}
}

impl Validate for AddressGroupBinding {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::AddressGroupBinding)?;
		let ctx = format!("AddressGroupBinding {}", self.self_ref);
		check_ref(&self.service_ref, Kind::Service, &ctx)?;
		check_ref(&self.address_group_ref, Kind::AddressGroup, &ctx)
	}
}

impl Validate for AddressGroupBindingPolicy {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::AddressGroupBindingPolicy)?;
		let ctx = format!("AddressGroupBindingPolicy {}", self.self_ref);
		check_ref(&self.service_ref, Kind::Service, &ctx)?;
		check_ref(&self.address_group_ref, Kind::AddressGroup, &ctx)
	}
}

impl Validate for crate::types::AddressGroupPortMapping {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::AddressGroupPortMapping)
	}
}

impl Validate for RuleS2S {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::RuleS2S)?;
		let ctx = format!("RuleS2S {}", self.self_ref);
		if self.service_local_ref.name.is_empty() || self.service_ref.name.is_empty() {
			return Err(Error::invalid_argument(format!(
				"{ctx}: both service references are required"
			)));
		}
		Ok(())
	}
}

impl Validate for ServiceAlias {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::ServiceAlias)?;
		check_ref(
			&self.service_ref,
			Kind::Service,
			&format!("ServiceAlias {}", self.self_ref),
		)
	}
}

impl Validate for crate::types::IEAgAgRule {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::IEAgAgRule)
	}
}

impl Validate for Network {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::Network)?;
		check_cidr(&self.cidr, &format!("Network {}", self.self_ref))
	}
}

impl Validate for NetworkBinding {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::NetworkBinding)?;
		let ctx = format!("NetworkBinding {}", self.self_ref);
		check_object_ref(&self.network_ref, Kind::Network, &ctx)?;
		check_object_ref(&self.address_group_ref, Kind::AddressGroup, &ctx)
	}
}

impl Validate for Host {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::Host)?;
		if self.uuid.is_empty() {
			return Err(Error::invalid_argument(format!(
				"Host {}: uuid is required",
				self.self_ref
			)));
		}
		Ok(())
	}
}

impl Validate for HostBinding {
	fn validate(&self) -> Result<(), Error> {
		check_name(&self.self_ref, Kind::HostBinding)?;
		let ctx = format!("HostBinding {}", self.self_ref);
		check_object_ref(&self.host_ref, Kind::Host, &ctx)?;
		check_object_ref(&self.address_group_ref, Kind::AddressGroup, &ctx)
	}
}

// Resolution helpers, shared with the reconciler. References resolve by name
// through the current state; the namespace defaults to the holder's.

pub(crate) fn resolve_service<'a>(
	state: &'a State,
	r: &NamespacedObjectRef,
	holder_ns: &str,
) -> Option<&'a Service> {
	state
		.services
		.get(&ResourceIdentifier::new(r.namespace_or(holder_ns), r.name.clone()))
}

pub(crate) fn resolve_address_group<'a>(
	state: &'a State,
	r: &NamespacedObjectRef,
	holder_ns: &str,
) -> Option<&'a AddressGroup> {
	state
		.address_groups
		.get(&ResourceIdentifier::new(r.namespace_or(holder_ns), r.name.clone()))
}

/// Resolve a RuleS2S service reference: through a ServiceAlias when one with
/// that name exists, directly to a Service otherwise.
pub(crate) fn resolve_service_via_alias<'a>(
	state: &'a State,
	r: &NamespacedObjectRef,
	holder_ns: &str,
) -> Option<&'a Service> {
	let id = ResourceIdentifier::new(r.namespace_or(holder_ns), r.name.clone());
	if let Some(alias) = state.service_aliases.get(&id) {
		return resolve_service(state, &alias.service_ref, &alias.self_ref.namespace);
	}
	state.services.get(&id)
}

/// Referential validation of the whole working state, run after the batch is
/// applied and before reconciliation. Covers invariants 2 and 4–7, so a
/// delete that strands a reference fails exactly like a dangling insert.
pub fn check_referential(state: &State) -> Result<(), Error> {
	// Invariant 2: spec references resolve.
	for svc in state.services.iter() {
		for r in &svc.address_groups {
			if resolve_address_group(state, r, &svc.self_ref.namespace).is_none() {
				return Err(Error::failed_precondition(format!(
					"Service {}: address group {} does not exist",
					svc.self_ref, r
				)));
			}
		}
	}
	for ag in state.address_groups.iter() {
		for r in &ag.hosts {
			let id = ResourceIdentifier::new(r.namespace_or(&ag.self_ref.namespace), r.name.clone());
			if !state.hosts.contains(&id) {
				return Err(Error::failed_precondition(format!(
					"AddressGroup {}: host {id} does not exist",
					ag.self_ref
				)));
			}
		}
	}
	for alias in state.service_aliases.iter() {
		if resolve_service(state, &alias.service_ref, &alias.self_ref.namespace).is_none() {
			return Err(Error::failed_precondition(format!(
				"ServiceAlias {}: service {} does not exist",
				alias.self_ref, alias.service_ref
			)));
		}
	}
	for policy in state.address_group_binding_policies.iter() {
		let ns = &policy.self_ref.namespace;
		if resolve_service(state, &policy.service_ref, ns).is_none() {
			return Err(Error::failed_precondition(format!(
				"AddressGroupBindingPolicy {}: service {} does not exist",
				policy.self_ref, policy.service_ref
			)));
		}
		if resolve_address_group(state, &policy.address_group_ref, ns).is_none() {
			return Err(Error::failed_precondition(format!(
				"AddressGroupBindingPolicy {}: address group {} does not exist",
				policy.self_ref, policy.address_group_ref
			)));
		}
	}

	check_bindings(state)?;
	check_rules(state)?;
	check_networks(state)?;
	check_hosts(state)?;
	Ok(())
}

fn check_bindings(state: &State) -> Result<(), Error> {
	let mut pairs: BTreeSet<(ResourceIdentifier, ResourceIdentifier)> = BTreeSet::new();
	for b in state.address_group_bindings.iter() {
		let ns = &b.self_ref.namespace;
		let Some(svc) = resolve_service(state, &b.service_ref, ns) else {
			return Err(Error::failed_precondition(format!(
				"AddressGroupBinding {}: service {} does not exist",
				b.self_ref, b.service_ref
			)));
		};
		let Some(ag) = resolve_address_group(state, &b.address_group_ref, ns) else {
			return Err(Error::failed_precondition(format!(
				"AddressGroupBinding {}: address group {} does not exist",
				b.self_ref, b.address_group_ref
			)));
		};
		// Invariant 4: at most one binding per (service, address group) pair.
		if !pairs.insert((svc.id(), ag.id())) {
			return Err(Error::failed_precondition(format!(
				"AddressGroupBinding {}: a binding for service {} and address group {} already exists",
				b.self_ref, svc.self_ref, ag.self_ref
			)));
		}
		// Invariant 5: cross-namespace binding requires a policy.
		if svc.self_ref.namespace != ag.self_ref.namespace {
			let permitted = state.address_group_binding_policies.iter().any(|p| {
				let pns = &p.self_ref.namespace;
				p.service_ref.namespace_or(pns) == svc.self_ref.namespace
					&& p.service_ref.name == svc.self_ref.name
					&& p.address_group_ref.namespace_or(pns) == ag.self_ref.namespace
					&& p.address_group_ref.name == ag.self_ref.name
			});
			if !permitted {
				return Err(Error::failed_precondition(format!(
					"AddressGroupBinding {}: cross-namespace binding requires an AddressGroupBindingPolicy",
					b.self_ref
				)));
			}
		}
	}
	Ok(())
}

fn check_rules(state: &State) -> Result<(), Error> {
	for rule in state.rules_s2s.iter() {
		let ns = &rule.self_ref.namespace;
		if resolve_service_via_alias(state, &rule.service_local_ref, ns).is_none() {
			return Err(Error::failed_precondition(format!(
				"RuleS2S {}: local service {} does not exist",
				rule.self_ref, rule.service_local_ref
			)));
		}
		if resolve_service_via_alias(state, &rule.service_ref, ns).is_none() {
			return Err(Error::failed_precondition(format!(
				"RuleS2S {}: service {} does not exist",
				rule.self_ref, rule.service_ref
			)));
		}
	}
	Ok(())
}

fn check_networks(state: &State) -> Result<(), Error> {
	// Invariant 6: a network may be referenced by at most one binding.
	let mut bound: BTreeMap<ResourceIdentifier, &ResourceIdentifier> = BTreeMap::new();
	for b in state.network_bindings.iter() {
		let ns = &b.self_ref.namespace;
		let network_id = ResourceIdentifier::new(ns.clone(), b.network_ref.name.clone());
		if !state.networks.contains(&network_id) {
			return Err(Error::failed_precondition(format!(
				"NetworkBinding {}: network {network_id} does not exist",
				b.self_ref
			)));
		}
		let ag_id = ResourceIdentifier::new(ns.clone(), b.address_group_ref.name.clone());
		if !state.address_groups.contains(&ag_id) {
			return Err(Error::failed_precondition(format!(
				"NetworkBinding {}: address group {ag_id} does not exist",
				b.self_ref
			)));
		}
		if let Some(other) = bound.insert(network_id.clone(), &b.self_ref) {
			return Err(Error::failed_precondition(format!(
				"NetworkBinding {}: network {network_id} is already bound by {other}",
				b.self_ref
			)));
		}
	}
	Ok(())
}

fn check_hosts(state: &State) -> Result<(), Error> {
	// Invariant 7: unique host UUIDs, at most one binding per host.
	let mut uuids: BTreeMap<&str, &ResourceIdentifier> = BTreeMap::new();
	for h in state.hosts.iter() {
		if let Some(other) = uuids.insert(h.uuid.as_str(), &h.self_ref) {
			return Err(Error::failed_precondition(format!(
				"Host {}: uuid {:?} is already used by {other}",
				h.self_ref, h.uuid
			)));
		}
	}
	let mut bound: BTreeMap<ResourceIdentifier, &ResourceIdentifier> = BTreeMap::new();
	for b in state.host_bindings.iter() {
		let ns = &b.self_ref.namespace;
		let host_id = ResourceIdentifier::new(ns.clone(), b.host_ref.name.clone());
		if !state.hosts.contains(&host_id) {
			return Err(Error::failed_precondition(format!(
				"HostBinding {}: host {host_id} does not exist",
				b.self_ref
			)));
		}
		let ag_id = ResourceIdentifier::new(ns.clone(), b.address_group_ref.name.clone());
		if !state.address_groups.contains(&ag_id) {
			return Err(Error::failed_precondition(format!(
				"HostBinding {}: address group {ag_id} does not exist",
				b.self_ref
			)));
		}
		if let Some(other) = bound.insert(host_id.clone(), &b.self_ref) {
			return Err(Error::failed_precondition(format!(
				"HostBinding {}: host {host_id} is already bound to an address group by {other}",
				b.self_ref
			)));
		}
	}
	Ok(())
}
