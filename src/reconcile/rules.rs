use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::errors::Error;
use crate::reconcile::portmap::service_ports;
use crate::reconcile::touched;
use crate::store::{Change, State, Tx};
use crate::types::{
	IEAgAgRule, Kind, NamespacedObjectRef, PortSpec, Resource, ResourceIdentifier, RuleS2S, Traffic,
	TransportProtocol,
};
use crate::validation::resolve_service_via_alias;

/// Pinned priority function: FNV-1a/64 over the rule and group names, folded
/// into 1..=10000. Reruns over identical input are byte-stable.
fn priority(rule: &str, ag_local: &str, ag_remote: &str) -> i32 {
	const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
	const PRIME: u64 = 0x0000_0100_0000_01b3;
	let mut h = OFFSET;
	for part in [rule, ag_local, ag_remote] {
		for b in part.as_bytes() {
			h ^= u64::from(*b);
			h = h.wrapping_mul(PRIME);
		}
		h ^= 0xff;
		h = h.wrapping_mul(PRIME);
	}
	(h % 10_000) as i32 + 1
}

fn traffic_prefix(traffic: Traffic) -> &'static str {
	match traffic {
		Traffic::Ingress => "ing",
		Traffic::Egress => "egr",
	}
}

/// Rules whose synthesised output may have changed.
fn affected_rules(
	changes: &[Change],
	base: &State,
	work: &State,
	services: &BTreeSet<ResourceIdentifier>,
	address_groups: &BTreeSet<ResourceIdentifier>,
) -> BTreeSet<ResourceIdentifier> {
	let mut affected = touched(changes, Kind::RuleS2S);
	let touched_aliases = touched(changes, Kind::ServiceAlias);

	for state in [base, work] {
		for rule in state.rules_s2s.iter() {
			if affected.contains(&rule.self_ref) {
				continue;
			}
			let ns = &rule.self_ref.namespace;
			let relevant = [&rule.service_local_ref, &rule.service_ref]
				.into_iter()
				.any(|r| {
					let target = ResourceIdentifier::new(r.namespace_or(ns), r.name.clone());
					if touched_aliases.contains(&target) {
						return true;
					}
					let Some(svc) = resolve_service_via_alias(state, r, ns) else {
						return false;
					};
					services.contains(&svc.id())
						|| svc
							.aggregated_address_groups
							.iter()
							.any(|a| address_groups.contains(&a.target.id()))
				});
			if relevant {
				affected.insert(rule.id());
			}
		}
	}
	affected
}

/// Everything a single RuleS2S expands into, keyed by rule identity.
fn synthesize(work: &State, rule: &RuleS2S) -> BTreeMap<ResourceIdentifier, IEAgAgRule> {
	let ns = &rule.self_ref.namespace;
	let Some(local) = resolve_service_via_alias(work, &rule.service_local_ref, ns) else {
		return BTreeMap::new();
	};
	let Some(remote) = resolve_service_via_alias(work, &rule.service_ref, ns) else {
		return BTreeMap::new();
	};

	let local_ports = service_ports(local);
	let remote_ports = service_ports(remote);
	// The receiver's ingress ports are the destination side of the ACL.
	let receiver_ports = match rule.traffic {
		Traffic::Ingress => &local_ports,
		Traffic::Egress => &remote_ports,
	};
	let protocols: Vec<TransportProtocol> = TransportProtocol::ALL
		.into_iter()
		.filter(|p| !local_ports.get(*p).is_empty() && !remote_ports.get(*p).is_empty())
		.collect();

	let mut out = BTreeMap::new();
	for (ag_local, ag_remote) in local
		.aggregated_address_groups
		.iter()
		.cartesian_product(remote.aggregated_address_groups.iter())
	{
		let Some(local_group) = work.address_groups.get(&ag_local.target.id()) else {
			continue;
		};
		// Positions swap for ingress so the record's local side is the
		// receiving end as the enforcement engine sees it.
		let (pos_local, pos_remote) = match rule.traffic {
			Traffic::Ingress => (&ag_remote.target, &ag_local.target),
			Traffic::Egress => (&ag_local.target, &ag_remote.target),
		};
		for protocol in &protocols {
			let ports: Vec<PortSpec> = receiver_ports
				.get(*protocol)
				.iter()
				.map(|r| PortSpec {
					source: String::new(),
					destination: r.to_string(),
				})
				.collect();
			let name = format!(
				"{}-{}-{}-{}-{}",
				traffic_prefix(rule.traffic),
				protocol.as_str().to_ascii_lowercase(),
				pos_local.name,
				pos_remote.name,
				rule.self_ref.name,
			);
			let id = ResourceIdentifier::new(ns.clone(), name);
			let synthesized = IEAgAgRule {
				self_ref: id.clone(),
				meta: Default::default(),
				transport: *protocol,
				traffic: rule.traffic,
				address_group_local: pos_local.clone(),
				address_group: pos_remote.clone(),
				action: local_group.default_action,
				logs: local_group.logs,
				trace: rule.trace || local_group.trace,
				priority: priority(
					&rule.self_ref.name,
					&ag_local.target.name,
					&ag_remote.target.name,
				),
				ports,
			};
			out.insert(id, synthesized);
		}
	}
	out
}

pub(crate) fn reconcile_rules(
	tx: &mut Tx<'_>,
	changes: &[Change],
	services: &BTreeSet<ResourceIdentifier>,
	address_groups: &BTreeSet<ResourceIdentifier>,
) -> Result<(), Error> {
	let base = tx.base_arc();
	let affected = affected_rules(changes, &base, tx.state(), services, address_groups);

	let work = tx.state();
	let mut upserts: Vec<IEAgAgRule> = Vec::new();
	let mut rule_updates: Vec<RuleS2S> = Vec::new();
	let mut removals: Vec<ResourceIdentifier> = Vec::new();

	for id in &affected {
		match work.rules_s2s.get(id) {
			Some(rule) => {
				let emitted = synthesize(work, rule);
				let refs: Vec<NamespacedObjectRef> = emitted
					.keys()
					.map(|id| NamespacedObjectRef::new(Kind::IEAgAgRule, id.name.clone(), id.namespace.clone()))
					.collect();
				// Previously owned rules that fell out of the emitted set go away.
				for old in &rule.ieagag_rule_refs {
					let old_id = old.id();
					if !emitted.contains_key(&old_id) {
						removals.push(old_id);
					}
				}
				upserts.extend(emitted.into_values());
				if refs != rule.ieagag_rule_refs {
					let mut next = rule.clone();
					next.ieagag_rule_refs = refs;
					rule_updates.push(next);
				}
			},
			None => {
				// Rule deleted in this transaction: its synthesised rules die
				// with it.
				if let Some(prev) = base.rules_s2s.get(id) {
					removals.extend(prev.ieagag_rule_refs.iter().map(|r| r.id()));
				}
			},
		}
	}

	for id in removals {
		tx.delete::<IEAgAgRule>(&id);
	}
	for rule in upserts {
		tx.upsert(rule)?;
	}
	for rule in rule_updates {
		tx.upsert(rule)?;
	}
	Ok(())
}
