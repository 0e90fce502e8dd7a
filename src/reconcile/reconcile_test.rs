use crate::reconcile;
use crate::store::{MemStore, Tx};
use crate::types::*;
use crate::validation::check_referential;

async fn apply(store: &MemStore, f: impl FnOnce(&mut Tx<'_>)) {
	let mut tx = store.begin().await;
	f(&mut tx);
	check_referential(tx.state()).unwrap();
	reconcile::run(&mut tx).unwrap();
	tx.commit();
}

fn service(ns: &str, name: &str, ports: &[(TransportProtocol, &str)]) -> Service {
	Service {
		self_ref: ResourceIdentifier::new(ns, name),
		ingress_ports: ports
			.iter()
			.map(|(protocol, port)| IngressPort {
				protocol: *protocol,
				port: port.to_string(),
				..Default::default()
			})
			.collect(),
		..Default::default()
	}
}

fn address_group(ns: &str, name: &str) -> AddressGroup {
	AddressGroup {
		self_ref: ResourceIdentifier::new(ns, name),
		..Default::default()
	}
}

fn binding(ns: &str, name: &str, svc: &str, ag: &str) -> AddressGroupBinding {
	AddressGroupBinding {
		self_ref: ResourceIdentifier::new(ns, name),
		service_ref: NamespacedObjectRef::new(Kind::Service, svc, ns),
		address_group_ref: NamespacedObjectRef::new(Kind::AddressGroup, ag, ns),
		..Default::default()
	}
}

fn id(ns: &str, name: &str) -> ResourceIdentifier {
	ResourceIdentifier::new(ns, name)
}

#[tokio::test]
async fn aggregation_unions_spec_and_binding_sources() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "spec-ag")).unwrap();
		tx.upsert(address_group("default", "bound-ag")).unwrap();
		let mut svc = service("default", "web", &[]);
		svc.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "spec-ag", "")];
		tx.upsert(svc).unwrap();
		tx.upsert(binding("default", "b1", "web", "bound-ag")).unwrap();
	})
	.await;

	let snap = store.snapshot();
	let web = snap.services.get(&id("default", "web")).unwrap();
	assert_eq!(web.aggregated_address_groups.len(), 2);
	let by_name: Vec<(&str, RefSource)> = web
		.aggregated_address_groups
		.iter()
		.map(|a| (a.target.name.as_str(), a.source))
		.collect();
	assert!(by_name.contains(&("spec-ag", RefSource::Spec)));
	assert!(by_name.contains(&("bound-ag", RefSource::Binding)));
	// The spec ref with an empty namespace resolved to the service's.
	assert!(
		web
			.aggregated_address_groups
			.iter()
			.all(|a| a.target.namespace == "default")
	);
}

#[tokio::test]
async fn aggregation_prefers_spec_over_binding_duplicates() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		let mut svc = service("default", "web", &[]);
		svc.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "internal", "default")];
		tx.upsert(svc).unwrap();
		tx.upsert(binding("default", "b1", "web", "internal")).unwrap();
	})
	.await;

	let snap = store.snapshot();
	let web = snap.services.get(&id("default", "web")).unwrap();
	assert_eq!(web.aggregated_address_groups.len(), 1);
	assert_eq!(web.aggregated_address_groups[0].source, RefSource::Spec);
}

#[tokio::test]
async fn removing_a_binding_refreshes_the_aggregation() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(service("default", "web", &[])).unwrap();
		tx.upsert(binding("default", "b1", "web", "internal")).unwrap();
	})
	.await;
	assert_eq!(
		store
			.snapshot()
			.services
			.get(&id("default", "web"))
			.unwrap()
			.aggregated_address_groups
			.len(),
		1
	);

	apply(&store, |tx| {
		tx.delete::<AddressGroupBinding>(&id("default", "b1"));
	})
	.await;
	let snap = store.snapshot();
	assert!(
		snap
			.services
			.get(&id("default", "web"))
			.unwrap()
			.aggregated_address_groups
			.is_empty()
	);
	// The group's port mapping dropped its only member as well.
	let mapping = snap
		.address_group_port_mappings
		.get(&id("default", "internal"))
		.unwrap();
	assert!(mapping.access_ports.is_empty());
}

#[tokio::test]
async fn port_mapping_merges_overlapping_and_adjacent_ranges() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(service(
			"default",
			"web",
			&[
				(TransportProtocol::Tcp, "80"),
				(TransportProtocol::Tcp, "80-100"),
				(TransportProtocol::Tcp, "200"),
			],
		))
		.unwrap();
		tx.upsert(binding("default", "b1", "web", "internal")).unwrap();
	})
	.await;

	let snap = store.snapshot();
	let mapping = snap
		.address_group_port_mappings
		.get(&id("default", "internal"))
		.unwrap();
	assert_eq!(mapping.access_ports.len(), 1);
	let entry = &mapping.access_ports[0];
	assert_eq!(entry.service_ref.name, "web");
	assert_eq!(
		entry.ports.tcp,
		vec![
			PortRange { start: 80, end: 100 },
			PortRange {
				start: 200,
				end: 200
			}
		]
	);
	assert!(entry.ports.udp.is_empty());
}

#[tokio::test]
async fn deleting_group_and_binding_removes_the_mapping() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(service("default", "web", &[(TransportProtocol::Tcp, "80")]))
			.unwrap();
		tx.upsert(binding("default", "b1", "web", "internal")).unwrap();
	})
	.await;
	assert!(
		store
			.snapshot()
			.address_group_port_mappings
			.contains(&id("default", "internal"))
	);

	apply(&store, |tx| {
		tx.delete::<AddressGroupBinding>(&id("default", "b1"));
		tx.delete::<AddressGroup>(&id("default", "internal"));
	})
	.await;
	assert!(
		!store
			.snapshot()
			.address_group_port_mappings
			.contains(&id("default", "internal"))
	);
}

fn scenario_eight(tx: &mut Tx<'_>) {
	tx.upsert(address_group("default", "internal")).unwrap();
	tx.upsert(address_group("default", "backend")).unwrap();
	let mut web = service("default", "web", &[(TransportProtocol::Tcp, "80")]);
	web.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "internal", "default")];
	tx.upsert(web).unwrap();
	let mut db = service("default", "db", &[(TransportProtocol::Tcp, "5432")]);
	db.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "backend", "default")];
	tx.upsert(db).unwrap();
	tx.upsert(RuleS2S {
		self_ref: id("default", "db-from-web"),
		traffic: Traffic::Ingress,
		service_local_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "db", "default"),
		service_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "web", "default"),
		..Default::default()
	})
	.unwrap();
}

#[tokio::test]
async fn ingress_rule_synthesis_swaps_positions_and_targets_receiver_ports() {
	let store = MemStore::new();
	apply(&store, scenario_eight).await;

	let snap = store.snapshot();
	assert_eq!(snap.ieagag_rules.len(), 1);
	let rule = snap.ieagag_rules.iter().next().unwrap();
	assert_eq!(rule.transport, TransportProtocol::Tcp);
	assert_eq!(rule.traffic, Traffic::Ingress);
	assert_eq!(rule.address_group_local.name, "internal");
	assert_eq!(rule.address_group.name, "backend");
	assert_eq!(rule.ports.len(), 1);
	assert_eq!(rule.ports[0].destination, "5432");
	assert_eq!(rule.ports[0].source, "");
	assert!(rule.priority >= 1 && rule.priority <= 10_000);

	let s2s = snap.rules_s2s.get(&id("default", "db-from-web")).unwrap();
	assert_eq!(s2s.ieagag_rule_refs.len(), 1);
	assert_eq!(s2s.ieagag_rule_refs[0].id(), rule.id());
}

#[tokio::test]
async fn egress_rule_targets_the_remote_receiver() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(address_group("default", "backend")).unwrap();
		let mut web = service("default", "web", &[(TransportProtocol::Tcp, "80")]);
		web.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "internal", "default")];
		tx.upsert(web).unwrap();
		let mut db = service("default", "db", &[(TransportProtocol::Tcp, "5432")]);
		db.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "backend", "default")];
		tx.upsert(db).unwrap();
		tx.upsert(RuleS2S {
			self_ref: id("default", "web-to-db"),
			traffic: Traffic::Egress,
			service_local_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "web", "default"),
			service_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "db", "default"),
			..Default::default()
		})
		.unwrap();
	})
	.await;

	let snap = store.snapshot();
	assert_eq!(snap.ieagag_rules.len(), 1);
	let rule = snap.ieagag_rules.iter().next().unwrap();
	assert_eq!(rule.address_group_local.name, "internal");
	assert_eq!(rule.address_group.name, "backend");
	assert_eq!(rule.ports[0].destination, "5432");
}

#[tokio::test]
async fn no_shared_protocol_means_no_rules() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(address_group("default", "backend")).unwrap();
		let mut web = service("default", "web", &[(TransportProtocol::Udp, "53")]);
		web.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "internal", "default")];
		tx.upsert(web).unwrap();
		let mut db = service("default", "db", &[(TransportProtocol::Tcp, "5432")]);
		db.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "backend", "default")];
		tx.upsert(db).unwrap();
		tx.upsert(RuleS2S {
			self_ref: id("default", "r"),
			traffic: Traffic::Ingress,
			service_local_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "db", "default"),
			service_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "web", "default"),
			..Default::default()
		})
		.unwrap();
	})
	.await;

	let snap = store.snapshot();
	assert!(snap.ieagag_rules.is_empty());
	assert!(
		snap
			.rules_s2s
			.get(&id("default", "r"))
			.unwrap()
			.ieagag_rule_refs
			.is_empty()
	);
}

#[tokio::test]
async fn rules_resolve_through_service_aliases() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(address_group("default", "backend")).unwrap();
		let mut web = service("default", "web", &[(TransportProtocol::Tcp, "80")]);
		web.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "internal", "default")];
		tx.upsert(web).unwrap();
		let mut db = service("default", "db", &[(TransportProtocol::Tcp, "5432")]);
		db.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "backend", "default")];
		tx.upsert(db).unwrap();
		tx.upsert(ServiceAlias {
			self_ref: id("default", "frontend"),
			service_ref: NamespacedObjectRef::new(Kind::Service, "web", "default"),
			..Default::default()
		})
		.unwrap();
		tx.upsert(RuleS2S {
			self_ref: id("default", "r"),
			traffic: Traffic::Ingress,
			service_local_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "db", "default"),
			service_ref: NamespacedObjectRef::new(Kind::ServiceAlias, "frontend", "default"),
			..Default::default()
		})
		.unwrap();
	})
	.await;

	let snap = store.snapshot();
	assert_eq!(snap.ieagag_rules.len(), 1);
	let rule = snap.ieagag_rules.iter().next().unwrap();
	assert_eq!(rule.address_group_local.name, "internal");
}

#[tokio::test]
async fn deleting_the_rule_deletes_its_synthesised_rules() {
	let store = MemStore::new();
	apply(&store, scenario_eight).await;
	assert_eq!(store.snapshot().ieagag_rules.len(), 1);

	apply(&store, |tx| {
		tx.delete::<RuleS2S>(&id("default", "db-from-web"));
	})
	.await;
	assert!(store.snapshot().ieagag_rules.is_empty());
}

#[tokio::test]
async fn changing_memberships_retargets_synthesised_rules() {
	let store = MemStore::new();
	apply(&store, scenario_eight).await;
	let first = store.snapshot().ieagag_rules.iter().next().unwrap().id();

	// Re-point web to a different group; the old synthesised rule is replaced.
	apply(&store, |tx| {
		tx.upsert(address_group("default", "frontier")).unwrap();
		let mut web = service("default", "web", &[(TransportProtocol::Tcp, "80")]);
		web.address_groups = vec![NamespacedObjectRef::new(Kind::AddressGroup, "frontier", "default")];
		tx.upsert(web).unwrap();
	})
	.await;

	let snap = store.snapshot();
	assert_eq!(snap.ieagag_rules.len(), 1);
	let rule = snap.ieagag_rules.iter().next().unwrap();
	assert_ne!(rule.id(), first);
	assert_eq!(rule.address_group_local.name, "frontier");
}

#[tokio::test]
async fn reconcile_is_a_fixed_point() {
	let store = MemStore::new();
	apply(&store, scenario_eight).await;
	let before = store.snapshot();

	// Pretend every primary was touched again: the rerun recomputes all
	// derived state and must change nothing.
	let mut tx = store.begin().await;
	for (kind, name) in [
		(Kind::Service, "web"),
		(Kind::Service, "db"),
		(Kind::AddressGroup, "internal"),
		(Kind::AddressGroup, "backend"),
		(Kind::RuleS2S, "db-from-web"),
	] {
		tx.record(crate::store::Change {
			kind,
			id: id("default", name),
			op: crate::store::ChangeOp::Upsert,
		});
	}
	reconcile::run(&mut tx).unwrap();
	tx.commit();
	assert_eq!(*before, *store.snapshot());
}

#[tokio::test]
async fn priorities_are_deterministic_across_reruns() {
	let a = MemStore::new();
	let b = MemStore::new();
	apply(&a, scenario_eight).await;
	apply(&b, scenario_eight).await;
	let pa = a.snapshot().ieagag_rules.iter().next().unwrap().priority;
	let pb = b.snapshot().ieagag_rules.iter().next().unwrap().priority;
	assert_eq!(pa, pb);
}

#[tokio::test]
async fn network_binding_materialises_the_network_and_sets_status() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(Network {
			self_ref: id("default", "n1"),
			cidr: "10.0.0.0/24".to_string(),
			..Default::default()
		})
		.unwrap();
		tx.upsert(NetworkBinding {
			self_ref: id("default", "nb"),
			network_ref: ObjectRef::new(Kind::Network, "n1"),
			address_group_ref: ObjectRef::new(Kind::AddressGroup, "internal"),
			..Default::default()
		})
		.unwrap();
	})
	.await;

	let snap = store.snapshot();
	let ag = snap.address_groups.get(&id("default", "internal")).unwrap();
	assert_eq!(ag.networks.len(), 1);
	assert_eq!(ag.networks[0].name, "n1");
	assert_eq!(ag.networks[0].cidr, "10.0.0.0/24");
	assert!(ag.networks[0].network_ref.is_some());

	let network = snap.networks.get(&id("default", "n1")).unwrap();
	assert!(network.is_bound);
	assert_eq!(network.binding_ref.as_ref().unwrap().name, "nb");
	assert_eq!(network.address_group_ref.as_ref().unwrap().name, "internal");

	// Unbind: the materialised item and the status are cleared.
	apply(&store, |tx| {
		tx.delete::<NetworkBinding>(&id("default", "nb"));
	})
	.await;
	let snap = store.snapshot();
	assert!(
		snap
			.address_groups
			.get(&id("default", "internal"))
			.unwrap()
			.networks
			.is_empty()
	);
	let network = snap.networks.get(&id("default", "n1")).unwrap();
	assert!(!network.is_bound);
	assert!(network.binding_ref.is_none());
}

#[tokio::test]
async fn host_binding_feeds_aggregated_hosts_with_uuids() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
		tx.upsert(Host {
			self_ref: id("default", "h1"),
			uuid: "u-1".to_string(),
			..Default::default()
		})
		.unwrap();
		tx.upsert(HostBinding {
			self_ref: id("default", "hb"),
			host_ref: ObjectRef::new(Kind::Host, "h1"),
			address_group_ref: ObjectRef::new(Kind::AddressGroup, "internal"),
			..Default::default()
		})
		.unwrap();
	})
	.await;

	let snap = store.snapshot();
	let ag = snap.address_groups.get(&id("default", "internal")).unwrap();
	assert_eq!(ag.aggregated_hosts.len(), 1);
	let h = &ag.aggregated_hosts[0];
	assert_eq!(h.target.name, "h1");
	assert_eq!(h.uuid, "u-1");
	assert_eq!(h.source, RefSource::Binding);

	let host = snap.hosts.get(&id("default", "h1")).unwrap();
	assert!(host.is_bound);
	assert_eq!(host.address_group_name, "internal");
	assert_eq!(host.address_group_ref.as_ref().unwrap().name, "internal");
}

#[tokio::test]
async fn spec_hosts_merge_with_bound_hosts_preferring_spec() {
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(Host {
			self_ref: id("default", "h1"),
			uuid: "u-1".to_string(),
			..Default::default()
		})
		.unwrap();
		let mut ag = address_group("default", "internal");
		ag.hosts = vec![NamespacedObjectRef::new(Kind::Host, "h1", "default")];
		tx.upsert(ag).unwrap();
		tx.upsert(HostBinding {
			self_ref: id("default", "hb"),
			host_ref: ObjectRef::new(Kind::Host, "h1"),
			address_group_ref: ObjectRef::new(Kind::AddressGroup, "internal"),
			..Default::default()
		})
		.unwrap();
	})
	.await;

	let snap = store.snapshot();
	let ag = snap.address_groups.get(&id("default", "internal")).unwrap();
	assert_eq!(ag.aggregated_hosts.len(), 1);
	assert_eq!(ag.aggregated_hosts[0].source, RefSource::Spec);
}

#[tokio::test]
async fn observed_generation_is_left_to_the_condition_stage() {
	// The reconciler itself never bumps ObservedGeneration; the facade sets
	// it when it marks conditions. At this layer it stays at zero.
	let store = MemStore::new();
	apply(&store, |tx| {
		tx.upsert(address_group("default", "internal")).unwrap();
	})
	.await;
	let snap = store.snapshot();
	let ag = snap.address_groups.get(&id("default", "internal")).unwrap();
	assert_eq!(ag.meta.observed_generation, 0);
}
