//! Wire-compatible DTOs for every resource kind. Reference fields tolerate
//! both the legacy nested `identifier{name,namespace}` shape and the richer
//! flat `{apiVersion,kind,name,namespace}` shape; encoding emits both for
//! one release cycle so downstream consumers can migrate.

use serde::{Deserialize, Serialize};

use crate::types::meta::{API_VERSION, ConditionStatus, Meta, condition};
use crate::types::model::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireIdentifier {
	#[serde(skip_serializing_if = "String::is_empty")]
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
}

/// A reference value on the wire. Rich callers set the flat fields; legacy
/// callers nest an identifier. Empty apiVersion/kind in the flat form are
/// preserved verbatim; the canonical defaults are only filled in when the
/// legacy form alone is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireRef {
	#[serde(skip_serializing_if = "String::is_empty")]
	pub api_version: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub kind: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub identifier: Option<WireIdentifier>,
}

impl WireRef {
	pub fn from_namespaced(r: &NamespacedObjectRef) -> WireRef {
		WireRef {
			api_version: r.api_version.clone(),
			kind: r.kind.clone(),
			name: r.name.clone(),
			namespace: r.namespace.clone(),
			identifier: Some(WireIdentifier {
				name: r.name.clone(),
				namespace: r.namespace.clone(),
			}),
		}
	}

	pub fn from_object(r: &ObjectRef) -> WireRef {
		WireRef {
			api_version: r.api_version.clone(),
			kind: r.kind.clone(),
			name: r.name.clone(),
			namespace: String::new(),
			identifier: Some(WireIdentifier {
				name: r.name.clone(),
				namespace: String::new(),
			}),
		}
	}

	/// Decode against the field's declared target kind. A nil reference
	/// decodes to the zero value.
	pub fn into_namespaced(self, target: Kind) -> NamespacedObjectRef {
		if !self.name.is_empty() {
			return NamespacedObjectRef {
				api_version: self.api_version,
				kind: self.kind,
				name: self.name,
				namespace: self.namespace,
			};
		}
		match self.identifier {
			Some(id) if !id.name.is_empty() => NamespacedObjectRef {
				api_version: API_VERSION.to_string(),
				kind: target.as_str().to_string(),
				name: id.name,
				namespace: id.namespace,
			},
			_ => NamespacedObjectRef::default(),
		}
	}

	pub fn into_object(self, target: Kind) -> ObjectRef {
		if !self.name.is_empty() {
			return ObjectRef {
				api_version: self.api_version,
				kind: self.kind,
				name: self.name,
			};
		}
		match self.identifier {
			Some(id) if !id.name.is_empty() => ObjectRef {
				api_version: API_VERSION.to_string(),
				kind: target.as_str().to_string(),
				name: id.name,
			},
			_ => ObjectRef::default(),
		}
	}
}

fn warn_defaulted(meta: &mut Meta, field: &str, value: &str) {
	let now = chrono::Utc::now();
	meta.set_condition(
		condition::WARNING,
		ConditionStatus::True,
		condition::REASON_DEFAULTED_ENUM,
		&format!("unknown {field} value {value:?} replaced with the default"),
		now,
	);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireIngressPort {
	#[serde(skip_serializing_if = "String::is_empty")]
	pub protocol: String,
	pub port: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireAggregatedRef {
	#[serde(flatten)]
	pub target: WireRef,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub source: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub uuid: String,
}

fn decode_source(s: &str) -> RefSource {
	match s {
		"binding" => RefSource::Binding,
		_ => RefSource::Spec,
	}
}

fn encode_source(s: RefSource) -> String {
	match s {
		RefSource::Spec => "spec",
		RefSource::Binding => "binding",
	}
	.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireService {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub description: String,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub ingress_ports: Vec<WireIngressPort>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub address_groups: Vec<WireRef>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub aggregated_address_groups: Vec<WireAggregatedRef>,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&Service> for WireService {
	fn from(s: &Service) -> Self {
		WireService {
			name: s.self_ref.name.clone(),
			namespace: s.self_ref.namespace.clone(),
			description: s.description.clone(),
			ingress_ports: s
				.ingress_ports
				.iter()
				.map(|p| WireIngressPort {
					protocol: p.protocol.as_str().to_string(),
					port: p.port.clone(),
					description: p.description.clone(),
				})
				.collect(),
			address_groups: s.address_groups.iter().map(WireRef::from_namespaced).collect(),
			aggregated_address_groups: s
				.aggregated_address_groups
				.iter()
				.map(|a| WireAggregatedRef {
					target: WireRef::from_namespaced(&a.target),
					source: encode_source(a.source),
					uuid: String::new(),
				})
				.collect(),
			meta: s.meta.clone(),
		}
	}
}

impl From<WireService> for Service {
	fn from(w: WireService) -> Self {
		let mut meta = w.meta;
		let ingress_ports = w
			.ingress_ports
			.into_iter()
			.map(|p| {
				let (protocol, defaulted) = TransportProtocol::from_wire(&p.protocol);
				if defaulted {
					warn_defaulted(&mut meta, "protocol", &p.protocol);
				}
				IngressPort {
					protocol,
					port: p.port,
					description: p.description,
				}
			})
			.collect();
		Service {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta,
			description: w.description,
			ingress_ports,
			address_groups: w
				.address_groups
				.into_iter()
				.map(|r| r.into_namespaced(Kind::AddressGroup))
				.collect(),
			aggregated_address_groups: w
				.aggregated_address_groups
				.into_iter()
				.map(|a| AggregatedRef {
					target: a.target.into_namespaced(Kind::AddressGroup),
					source: decode_source(&a.source),
				})
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireNetworkItem {
	pub name: String,
	pub cidr: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub network_ref: Option<WireRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireAddressGroup {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub default_action: String,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub logs: bool,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub trace: bool,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub networks: Vec<WireNetworkItem>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub hosts: Vec<WireRef>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub aggregated_hosts: Vec<WireAggregatedRef>,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&AddressGroup> for WireAddressGroup {
	fn from(ag: &AddressGroup) -> Self {
		WireAddressGroup {
			name: ag.self_ref.name.clone(),
			namespace: ag.self_ref.namespace.clone(),
			default_action: ag.default_action.as_str().to_string(),
			logs: ag.logs,
			trace: ag.trace,
			networks: ag
				.networks
				.iter()
				.map(|n| WireNetworkItem {
					name: n.name.clone(),
					cidr: n.cidr.clone(),
					network_ref: n.network_ref.as_ref().map(WireRef::from_namespaced),
				})
				.collect(),
			hosts: ag.hosts.iter().map(WireRef::from_namespaced).collect(),
			aggregated_hosts: ag
				.aggregated_hosts
				.iter()
				.map(|h| WireAggregatedRef {
					target: WireRef::from_namespaced(&h.target),
					source: encode_source(h.source),
					uuid: h.uuid.clone(),
				})
				.collect(),
			meta: ag.meta.clone(),
		}
	}
}

impl From<WireAddressGroup> for AddressGroup {
	fn from(w: WireAddressGroup) -> Self {
		let mut meta = w.meta;
		let (default_action, defaulted) = RuleAction::from_wire(&w.default_action);
		if defaulted {
			warn_defaulted(&mut meta, "defaultAction", &w.default_action);
		}
		AddressGroup {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta,
			default_action,
			logs: w.logs,
			trace: w.trace,
			networks: w
				.networks
				.into_iter()
				.map(|n| NetworkItem {
					name: n.name,
					cidr: n.cidr,
					network_ref: n.network_ref.map(|r| r.into_namespaced(Kind::Network)),
				})
				.collect(),
			hosts: w.hosts.into_iter().map(|r| r.into_namespaced(Kind::Host)).collect(),
			aggregated_hosts: w
				.aggregated_hosts
				.into_iter()
				.map(|h| AggregatedHostRef {
					target: h.target.into_namespaced(Kind::Host),
					uuid: h.uuid,
					source: decode_source(&h.source),
				})
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireAddressGroupBinding {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub service_ref: WireRef,
	pub address_group_ref: WireRef,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&AddressGroupBinding> for WireAddressGroupBinding {
	fn from(b: &AddressGroupBinding) -> Self {
		WireAddressGroupBinding {
			name: b.self_ref.name.clone(),
			namespace: b.self_ref.namespace.clone(),
			service_ref: WireRef::from_namespaced(&b.service_ref),
			address_group_ref: WireRef::from_namespaced(&b.address_group_ref),
			meta: b.meta.clone(),
		}
	}
}

impl From<WireAddressGroupBinding> for AddressGroupBinding {
	fn from(w: WireAddressGroupBinding) -> Self {
		AddressGroupBinding {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			service_ref: w.service_ref.into_namespaced(Kind::Service),
			address_group_ref: w.address_group_ref.into_namespaced(Kind::AddressGroup),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireAddressGroupBindingPolicy {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub service_ref: WireRef,
	pub address_group_ref: WireRef,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&AddressGroupBindingPolicy> for WireAddressGroupBindingPolicy {
	fn from(p: &AddressGroupBindingPolicy) -> Self {
		WireAddressGroupBindingPolicy {
			name: p.self_ref.name.clone(),
			namespace: p.self_ref.namespace.clone(),
			service_ref: WireRef::from_namespaced(&p.service_ref),
			address_group_ref: WireRef::from_namespaced(&p.address_group_ref),
			meta: p.meta.clone(),
		}
	}
}

impl From<WireAddressGroupBindingPolicy> for AddressGroupBindingPolicy {
	fn from(w: WireAddressGroupBindingPolicy) -> Self {
		AddressGroupBindingPolicy {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			service_ref: w.service_ref.into_namespaced(Kind::Service),
			address_group_ref: w.address_group_ref.into_namespaced(Kind::AddressGroup),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WirePorts {
	#[serde(rename = "TCP", skip_serializing_if = "Vec::is_empty")]
	pub tcp: Vec<String>,
	#[serde(rename = "UDP", skip_serializing_if = "Vec::is_empty")]
	pub udp: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireServicePorts {
	pub service_ref: WireRef,
	pub ports: WirePorts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireAddressGroupPortMapping {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub access_ports: Vec<WireServicePorts>,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

fn encode_ranges(ranges: &[PortRange]) -> Vec<String> {
	ranges.iter().map(|r| r.to_string()).collect()
}

fn decode_ranges(ranges: Vec<String>) -> Vec<PortRange> {
	ranges
		.into_iter()
		.filter_map(|s| PortRange::parse(&s).ok())
		.collect()
}

impl From<&AddressGroupPortMapping> for WireAddressGroupPortMapping {
	fn from(m: &AddressGroupPortMapping) -> Self {
		WireAddressGroupPortMapping {
			name: m.self_ref.name.clone(),
			namespace: m.self_ref.namespace.clone(),
			access_ports: m
				.access_ports
				.iter()
				.map(|sp| WireServicePorts {
					service_ref: WireRef::from_namespaced(&sp.service_ref),
					ports: WirePorts {
						tcp: encode_ranges(&sp.ports.tcp),
						udp: encode_ranges(&sp.ports.udp),
					},
				})
				.collect(),
			meta: m.meta.clone(),
		}
	}
}

impl From<WireAddressGroupPortMapping> for AddressGroupPortMapping {
	fn from(w: WireAddressGroupPortMapping) -> Self {
		AddressGroupPortMapping {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			access_ports: w
				.access_ports
				.into_iter()
				.map(|sp| ServicePorts {
					service_ref: sp.service_ref.into_namespaced(Kind::Service),
					ports: ProtocolPorts {
						tcp: decode_ranges(sp.ports.tcp),
						udp: decode_ranges(sp.ports.udp),
					},
				})
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireRuleS2S {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub traffic: String,
	pub service_local_ref: WireRef,
	pub service_ref: WireRef,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub trace: bool,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub ieagag_rule_refs: Vec<WireRef>,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&RuleS2S> for WireRuleS2S {
	fn from(r: &RuleS2S) -> Self {
		WireRuleS2S {
			name: r.self_ref.name.clone(),
			namespace: r.self_ref.namespace.clone(),
			traffic: r.traffic.as_str().to_string(),
			service_local_ref: WireRef::from_namespaced(&r.service_local_ref),
			service_ref: WireRef::from_namespaced(&r.service_ref),
			trace: r.trace,
			ieagag_rule_refs: r.ieagag_rule_refs.iter().map(WireRef::from_namespaced).collect(),
			meta: r.meta.clone(),
		}
	}
}

impl From<WireRuleS2S> for RuleS2S {
	fn from(w: WireRuleS2S) -> Self {
		let mut meta = w.meta;
		let (traffic, defaulted) = Traffic::from_wire(&w.traffic);
		if defaulted {
			warn_defaulted(&mut meta, "traffic", &w.traffic);
		}
		RuleS2S {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta,
			traffic,
			service_local_ref: w.service_local_ref.into_namespaced(Kind::ServiceAlias),
			service_ref: w.service_ref.into_namespaced(Kind::ServiceAlias),
			trace: w.trace,
			ieagag_rule_refs: w
				.ieagag_rule_refs
				.into_iter()
				.map(|r| r.into_namespaced(Kind::IEAgAgRule))
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireServiceAlias {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub service_ref: WireRef,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&ServiceAlias> for WireServiceAlias {
	fn from(a: &ServiceAlias) -> Self {
		WireServiceAlias {
			name: a.self_ref.name.clone(),
			namespace: a.self_ref.namespace.clone(),
			service_ref: WireRef::from_namespaced(&a.service_ref),
			meta: a.meta.clone(),
		}
	}
}

impl From<WireServiceAlias> for ServiceAlias {
	fn from(w: WireServiceAlias) -> Self {
		ServiceAlias {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			service_ref: w.service_ref.into_namespaced(Kind::Service),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WirePortSpec {
	#[serde(skip_serializing_if = "String::is_empty")]
	pub source: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireIEAgAgRule {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub transport: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub traffic: String,
	pub address_group_local: WireRef,
	pub address_group: WireRef,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub action: String,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub logs: bool,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub trace: bool,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub priority: i32,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub ports: Vec<WirePortSpec>,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&IEAgAgRule> for WireIEAgAgRule {
	fn from(r: &IEAgAgRule) -> Self {
		WireIEAgAgRule {
			name: r.self_ref.name.clone(),
			namespace: r.self_ref.namespace.clone(),
			transport: r.transport.as_str().to_string(),
			traffic: r.traffic.as_str().to_string(),
			address_group_local: WireRef::from_namespaced(&r.address_group_local),
			address_group: WireRef::from_namespaced(&r.address_group),
			action: r.action.as_str().to_string(),
			logs: r.logs,
			trace: r.trace,
			priority: r.priority,
			ports: r
				.ports
				.iter()
				.map(|p| WirePortSpec {
					source: p.source.clone(),
					destination: p.destination.clone(),
				})
				.collect(),
			meta: r.meta.clone(),
		}
	}
}

impl From<WireIEAgAgRule> for IEAgAgRule {
	fn from(w: WireIEAgAgRule) -> Self {
		let mut meta = w.meta;
		let (transport, transport_defaulted) = TransportProtocol::from_wire(&w.transport);
		if transport_defaulted {
			warn_defaulted(&mut meta, "transport", &w.transport);
		}
		let (traffic, traffic_defaulted) = Traffic::from_wire(&w.traffic);
		if traffic_defaulted {
			warn_defaulted(&mut meta, "traffic", &w.traffic);
		}
		let (action, action_defaulted) = RuleAction::from_wire(&w.action);
		if action_defaulted {
			warn_defaulted(&mut meta, "action", &w.action);
		}
		IEAgAgRule {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta,
			transport,
			traffic,
			address_group_local: w.address_group_local.into_namespaced(Kind::AddressGroup),
			address_group: w.address_group.into_namespaced(Kind::AddressGroup),
			action,
			logs: w.logs,
			trace: w.trace,
			priority: w.priority,
			ports: w
				.ports
				.into_iter()
				.map(|p| PortSpec {
					source: p.source,
					destination: p.destination,
				})
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireNetwork {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub cidr: String,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub is_bound: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub binding_ref: Option<WireRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address_group_ref: Option<WireRef>,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&Network> for WireNetwork {
	fn from(n: &Network) -> Self {
		WireNetwork {
			name: n.self_ref.name.clone(),
			namespace: n.self_ref.namespace.clone(),
			cidr: n.cidr.clone(),
			is_bound: n.is_bound,
			binding_ref: n.binding_ref.as_ref().map(WireRef::from_object),
			address_group_ref: n.address_group_ref.as_ref().map(WireRef::from_namespaced),
			meta: n.meta.clone(),
		}
	}
}

impl From<WireNetwork> for Network {
	fn from(w: WireNetwork) -> Self {
		Network {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			cidr: w.cidr,
			is_bound: w.is_bound,
			binding_ref: w.binding_ref.map(|r| r.into_object(Kind::NetworkBinding)),
			address_group_ref: w
				.address_group_ref
				.map(|r| r.into_namespaced(Kind::AddressGroup)),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireNetworkBinding {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub network_ref: WireRef,
	pub address_group_ref: WireRef,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&NetworkBinding> for WireNetworkBinding {
	fn from(b: &NetworkBinding) -> Self {
		WireNetworkBinding {
			name: b.self_ref.name.clone(),
			namespace: b.self_ref.namespace.clone(),
			network_ref: WireRef::from_object(&b.network_ref),
			address_group_ref: WireRef::from_object(&b.address_group_ref),
			meta: b.meta.clone(),
		}
	}
}

impl From<WireNetworkBinding> for NetworkBinding {
	fn from(w: WireNetworkBinding) -> Self {
		NetworkBinding {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			network_ref: w.network_ref.into_object(Kind::Network),
			address_group_ref: w.address_group_ref.into_object(Kind::AddressGroup),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireHost {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub uuid: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub host_name: String,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub ip_list: Vec<String>,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub address_group_name: String,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub is_bound: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub binding_ref: Option<WireRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address_group_ref: Option<WireRef>,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&Host> for WireHost {
	fn from(h: &Host) -> Self {
		WireHost {
			name: h.self_ref.name.clone(),
			namespace: h.self_ref.namespace.clone(),
			uuid: h.uuid.clone(),
			host_name: h.host_name.clone(),
			ip_list: h.ip_list.clone(),
			address_group_name: h.address_group_name.clone(),
			is_bound: h.is_bound,
			binding_ref: h.binding_ref.as_ref().map(WireRef::from_object),
			address_group_ref: h.address_group_ref.as_ref().map(WireRef::from_object),
			meta: h.meta.clone(),
		}
	}
}

impl From<WireHost> for Host {
	fn from(w: WireHost) -> Self {
		Host {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			uuid: w.uuid,
			host_name: w.host_name,
			ip_list: w.ip_list,
			address_group_name: w.address_group_name,
			is_bound: w.is_bound,
			binding_ref: w.binding_ref.map(|r| r.into_object(Kind::HostBinding)),
			address_group_ref: w
				.address_group_ref
				.map(|r| r.into_object(Kind::AddressGroup)),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireHostBinding {
	pub name: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub host_ref: WireRef,
	pub address_group_ref: WireRef,
	#[serde(skip_serializing_if = "crate::is_default")]
	pub meta: Meta,
}

impl From<&HostBinding> for WireHostBinding {
	fn from(b: &HostBinding) -> Self {
		WireHostBinding {
			name: b.self_ref.name.clone(),
			namespace: b.self_ref.namespace.clone(),
			host_ref: WireRef::from_object(&b.host_ref),
			address_group_ref: WireRef::from_object(&b.address_group_ref),
			meta: b.meta.clone(),
		}
	}
}

impl From<WireHostBinding> for HostBinding {
	fn from(w: WireHostBinding) -> Self {
		HostBinding {
			self_ref: ResourceIdentifier::new(w.namespace, w.name),
			meta: w.meta,
			host_ref: w.host_ref.into_object(Kind::Host),
			address_group_ref: w.address_group_ref.into_object(Kind::AddressGroup),
		}
	}
}

/// One sync request as it arrives off the wire. An absent subject is a
/// successful no-op; an unknown subject key fails to decode and surfaces as
/// an invalid-argument error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireSyncRequest {
	pub sync_op: i32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject: Option<WireSubject>,
}

/// Decode a sync request body. An unknown subject kind is an
/// invalid-argument error, not a silent drop.
pub fn decode_sync_request(raw: &str) -> Result<WireSyncRequest, crate::Error> {
	serde_json::from_str(raw)
		.map_err(|e| crate::Error::invalid_argument(format!("malformed sync request: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireSubject {
	Services(Vec<WireService>),
	AddressGroups(Vec<WireAddressGroup>),
	AddressGroupBindings(Vec<WireAddressGroupBinding>),
	AddressGroupBindingPolicies(Vec<WireAddressGroupBindingPolicy>),
	AddressGroupPortMappings(Vec<WireAddressGroupPortMapping>),
	RulesS2S(Vec<WireRuleS2S>),
	ServiceAliases(Vec<WireServiceAlias>),
	IeAgAgRules(Vec<WireIEAgAgRule>),
	Networks(Vec<WireNetwork>),
	NetworkBindings(Vec<WireNetworkBinding>),
	Hosts(Vec<WireHost>),
	HostBindings(Vec<WireHostBinding>),
}

impl From<WireSubject> for Batch {
	fn from(w: WireSubject) -> Self {
		match w {
			WireSubject::Services(v) => Batch::Services(v.into_iter().map(Into::into).collect()),
			WireSubject::AddressGroups(v) => {
				Batch::AddressGroups(v.into_iter().map(Into::into).collect())
			},
			WireSubject::AddressGroupBindings(v) => {
				Batch::AddressGroupBindings(v.into_iter().map(Into::into).collect())
			},
			WireSubject::AddressGroupBindingPolicies(v) => {
				Batch::AddressGroupBindingPolicies(v.into_iter().map(Into::into).collect())
			},
			WireSubject::AddressGroupPortMappings(v) => {
				Batch::AddressGroupPortMappings(v.into_iter().map(Into::into).collect())
			},
			WireSubject::RulesS2S(v) => Batch::RulesS2S(v.into_iter().map(Into::into).collect()),
			WireSubject::ServiceAliases(v) => {
				Batch::ServiceAliases(v.into_iter().map(Into::into).collect())
			},
			WireSubject::IeAgAgRules(v) => Batch::IEAgAgRules(v.into_iter().map(Into::into).collect()),
			WireSubject::Networks(v) => Batch::Networks(v.into_iter().map(Into::into).collect()),
			WireSubject::NetworkBindings(v) => {
				Batch::NetworkBindings(v.into_iter().map(Into::into).collect())
			},
			WireSubject::Hosts(v) => Batch::Hosts(v.into_iter().map(Into::into).collect()),
			WireSubject::HostBindings(v) => {
				Batch::HostBindings(v.into_iter().map(Into::into).collect())
			},
		}
	}
}

impl From<&Batch> for WireSubject {
	fn from(b: &Batch) -> Self {
		match b {
			Batch::Services(v) => WireSubject::Services(v.iter().map(Into::into).collect()),
			Batch::AddressGroups(v) => WireSubject::AddressGroups(v.iter().map(Into::into).collect()),
			Batch::AddressGroupBindings(v) => {
				WireSubject::AddressGroupBindings(v.iter().map(Into::into).collect())
			},
			Batch::AddressGroupBindingPolicies(v) => {
				WireSubject::AddressGroupBindingPolicies(v.iter().map(Into::into).collect())
			},
			Batch::AddressGroupPortMappings(v) => {
				WireSubject::AddressGroupPortMappings(v.iter().map(Into::into).collect())
			},
			Batch::RulesS2S(v) => WireSubject::RulesS2S(v.iter().map(Into::into).collect()),
			Batch::ServiceAliases(v) => {
				WireSubject::ServiceAliases(v.iter().map(Into::into).collect())
			},
			Batch::IEAgAgRules(v) => WireSubject::IeAgAgRules(v.iter().map(Into::into).collect()),
			Batch::Networks(v) => WireSubject::Networks(v.iter().map(Into::into).collect()),
			Batch::NetworkBindings(v) => {
				WireSubject::NetworkBindings(v.iter().map(Into::into).collect())
			},
			Batch::Hosts(v) => WireSubject::Hosts(v.iter().map(Into::into).collect()),
			Batch::HostBindings(v) => WireSubject::HostBindings(v.iter().map(Into::into).collect()),
		}
	}
}
