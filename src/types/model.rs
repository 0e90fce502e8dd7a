use std::fmt;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::is_default;
use crate::types::meta::{API_VERSION, Meta};

/// Closed set of resource kinds the registry manages. The sync dispatcher
/// matches exhaustively over this, so adding a kind is a compile-time check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
	Service,
	AddressGroup,
	AddressGroupBinding,
	AddressGroupBindingPolicy,
	AddressGroupPortMapping,
	RuleS2S,
	ServiceAlias,
	IEAgAgRule,
	Network,
	NetworkBinding,
	Host,
	HostBinding,
}

impl Kind {
	pub const ALL: [Kind; 12] = [
		Kind::Service,
		Kind::AddressGroup,
		Kind::AddressGroupBinding,
		Kind::AddressGroupBindingPolicy,
		Kind::AddressGroupPortMapping,
		Kind::RuleS2S,
		Kind::ServiceAlias,
		Kind::IEAgAgRule,
		Kind::Network,
		Kind::NetworkBinding,
		Kind::Host,
		Kind::HostBinding,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Kind::Service => "Service",
			Kind::AddressGroup => "AddressGroup",
			Kind::AddressGroupBinding => "AddressGroupBinding",
			Kind::AddressGroupBindingPolicy => "AddressGroupBindingPolicy",
			Kind::AddressGroupPortMapping => "AddressGroupPortMapping",
			Kind::RuleS2S => "RuleS2S",
			Kind::ServiceAlias => "ServiceAlias",
			Kind::IEAgAgRule => "IEAgAgRule",
			Kind::Network => "Network",
			Kind::NetworkBinding => "NetworkBinding",
			Kind::Host => "Host",
			Kind::HostBinding => "HostBinding",
		}
	}

	/// Derived kinds are owned by the reconciler and rejected on external writes.
	pub fn is_derived(&self) -> bool {
		matches!(self, Kind::AddressGroupPortMapping | Kind::IEAgAgRule)
	}
}

impl Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Primary key of a resource within its kind.
#[derive(
	Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	pub name: String,
}

impl ResourceIdentifier {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}
}

impl Display for ResourceIdentifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// Reference to a same-namespace object, carrying the wire type information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub api_version: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub kind: String,
	pub name: String,
}

impl ObjectRef {
	pub fn new(kind: Kind, name: impl Into<String>) -> Self {
		Self {
			api_version: API_VERSION.to_string(),
			kind: kind.as_str().to_string(),
			name: name.into(),
		}
	}
}

impl Display for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.kind, self.name)
	}
}

/// Reference that may cross namespaces. References are by name, never by UID:
/// a deleted-and-recreated target transparently re-resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedObjectRef {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub api_version: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub kind: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub namespace: String,
}

impl NamespacedObjectRef {
	pub fn new(kind: Kind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
		Self {
			api_version: API_VERSION.to_string(),
			kind: kind.as_str().to_string(),
			name: name.into(),
			namespace: namespace.into(),
		}
	}

	pub fn id(&self) -> ResourceIdentifier {
		ResourceIdentifier::new(self.namespace.clone(), self.name.clone())
	}

	/// Namespace to resolve against, defaulting to the holder's own.
	pub fn namespace_or(&self, fallback: &str) -> String {
		if self.namespace.is_empty() {
			fallback.to_string()
		} else {
			self.namespace.clone()
		}
	}
}

impl Display for NamespacedObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
	}
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum TransportProtocol {
	#[default]
	#[serde(rename = "TCP")]
	Tcp,
	#[serde(rename = "UDP")]
	Udp,
}

impl TransportProtocol {
	pub const ALL: [TransportProtocol; 2] = [TransportProtocol::Tcp, TransportProtocol::Udp];

	pub fn as_str(&self) -> &'static str {
		match self {
			TransportProtocol::Tcp => "TCP",
			TransportProtocol::Udp => "UDP",
		}
	}

	/// Decode a wire value. Unknown values map to the default; the caller is
	/// expected to record a warning condition when `defaulted` comes back true.
	pub fn from_wire(s: &str) -> (Self, bool) {
		match s {
			"TCP" | "" => (TransportProtocol::Tcp, false),
			"UDP" => (TransportProtocol::Udp, false),
			_ => (TransportProtocol::Tcp, true),
		}
	}
}

impl Display for TransportProtocol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Traffic {
	#[default]
	#[serde(rename = "INGRESS")]
	Ingress,
	#[serde(rename = "EGRESS")]
	Egress,
}

impl Traffic {
	pub fn as_str(&self) -> &'static str {
		match self {
			Traffic::Ingress => "INGRESS",
			Traffic::Egress => "EGRESS",
		}
	}

	pub fn from_wire(s: &str) -> (Self, bool) {
		match s {
			"INGRESS" | "" => (Traffic::Ingress, false),
			"EGRESS" => (Traffic::Egress, false),
			_ => (Traffic::Ingress, true),
		}
	}
}

impl Display for Traffic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum RuleAction {
	#[default]
	#[serde(rename = "ACCEPT")]
	Accept,
	#[serde(rename = "DROP")]
	Drop,
}

impl RuleAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			RuleAction::Accept => "ACCEPT",
			RuleAction::Drop => "DROP",
		}
	}

	pub fn from_wire(s: &str) -> (Self, bool) {
		match s {
			"ACCEPT" | "" => (RuleAction::Accept, false),
			"DROP" => (RuleAction::Drop, false),
			_ => (RuleAction::Accept, true),
		}
	}
}

impl Display for RuleAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Inclusive port range, parsed from `"N"` or `"N-M"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRange {
	pub start: u16,
	pub end: u16,
}

impl PortRange {
	pub fn parse(s: &str) -> Result<PortRange, Error> {
		let parse_one = |p: &str| -> Result<u16, Error> {
			let v: u16 = p
				.parse()
				.map_err(|_| Error::invalid_argument(format!("unparseable port {s:?}")))?;
			if v == 0 {
				return Err(Error::invalid_argument(format!(
					"port 0 is out of range in {s:?}"
				)));
			}
			Ok(v)
		};
		let range = match s.split_once('-') {
			None => {
				let p = parse_one(s)?;
				PortRange { start: p, end: p }
			},
			Some((lo, hi)) => PortRange {
				start: parse_one(lo)?,
				end: parse_one(hi)?,
			},
		};
		if range.start > range.end {
			return Err(Error::invalid_argument(format!(
				"inverted port range {s:?}"
			)));
		}
		Ok(range)
	}

	/// Sort and merge overlapping or adjacent ranges into a normalised,
	/// non-overlapping ascending list.
	pub fn normalize(mut ranges: Vec<PortRange>) -> Vec<PortRange> {
		ranges.sort();
		let mut out: Vec<PortRange> = Vec::with_capacity(ranges.len());
		for r in ranges {
			match out.last_mut() {
				Some(last) if u32::from(r.start) <= u32::from(last.end) + 1 => {
					last.end = last.end.max(r.end);
				},
				_ => out.push(r),
			}
		}
		out
	}
}

impl Display for PortRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.start == self.end {
			write!(f, "{}", self.start)
		} else {
			write!(f, "{}-{}", self.start, self.end)
		}
	}
}

/// Whether a membership entry came from the resource's own spec or from a
/// binding resource. Spec wins when both declare the same target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RefSource {
	#[serde(rename = "spec")]
	Spec,
	#[serde(rename = "binding")]
	Binding,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRef {
	#[serde(flatten)]
	pub target: NamespacedObjectRef,
	pub source: RefSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedHostRef {
	#[serde(flatten)]
	pub target: NamespacedObjectRef,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub uuid: String,
	pub source: RefSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressPort {
	pub protocol: TransportProtocol,
	pub port: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub description: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub ingress_ports: Vec<IngressPort>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub address_groups: Vec<NamespacedObjectRef>,
	/// Derived: spec refs plus refs contributed by AddressGroupBindings.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub aggregated_address_groups: Vec<AggregatedRef>,
}

/// One entry of an address group's network list. Inline entries carry no
/// `networkRef`; entries materialised from a NetworkBinding carry a ref to
/// the bound Network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkItem {
	pub name: String,
	pub cidr: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub network_ref: Option<NamespacedObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressGroup {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	#[serde(default, skip_serializing_if = "is_default")]
	pub default_action: RuleAction,
	#[serde(default, skip_serializing_if = "is_default")]
	pub logs: bool,
	#[serde(default, skip_serializing_if = "is_default")]
	pub trace: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub networks: Vec<NetworkItem>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub hosts: Vec<NamespacedObjectRef>,
	/// Derived: spec host refs plus refs contributed by HostBindings.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub aggregated_hosts: Vec<AggregatedHostRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressGroupBinding {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	pub service_ref: NamespacedObjectRef,
	pub address_group_ref: NamespacedObjectRef,
}

/// Grants a cross-namespace (Service, AddressGroup) pair the right to bind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressGroupBindingPolicy {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	pub service_ref: NamespacedObjectRef,
	pub address_group_ref: NamespacedObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolPorts {
	#[serde(default, rename = "TCP", skip_serializing_if = "Vec::is_empty")]
	pub tcp: Vec<PortRange>,
	#[serde(default, rename = "UDP", skip_serializing_if = "Vec::is_empty")]
	pub udp: Vec<PortRange>,
}

impl ProtocolPorts {
	pub fn get(&self, protocol: TransportProtocol) -> &[PortRange] {
		match protocol {
			TransportProtocol::Tcp => &self.tcp,
			TransportProtocol::Udp => &self.udp,
		}
	}

	pub fn get_mut(&mut self, protocol: TransportProtocol) -> &mut Vec<PortRange> {
		match protocol {
			TransportProtocol::Tcp => &mut self.tcp,
			TransportProtocol::Udp => &mut self.udp,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.tcp.is_empty() && self.udp.is_empty()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePorts {
	pub service_ref: NamespacedObjectRef,
	pub ports: ProtocolPorts,
}

/// Derived, one per AddressGroup: which services expose which normalised
/// port ranges inside the group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressGroupPortMapping {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub access_ports: Vec<ServicePorts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleS2S {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	#[serde(default, skip_serializing_if = "is_default")]
	pub traffic: Traffic,
	pub service_local_ref: NamespacedObjectRef,
	pub service_ref: NamespacedObjectRef,
	#[serde(default, skip_serializing_if = "is_default")]
	pub trace: bool,
	/// Derived: identities of the IEAgAgRules synthesised from this rule.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub ieagag_rule_refs: Vec<NamespacedObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub source: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub destination: String,
}

/// Derived, wire-ready ACL record consumed by the enforcement engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IEAgAgRule {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	#[serde(default, skip_serializing_if = "is_default")]
	pub transport: TransportProtocol,
	#[serde(default, skip_serializing_if = "is_default")]
	pub traffic: Traffic,
	pub address_group_local: NamespacedObjectRef,
	pub address_group: NamespacedObjectRef,
	#[serde(default, skip_serializing_if = "is_default")]
	pub action: RuleAction,
	#[serde(default, skip_serializing_if = "is_default")]
	pub logs: bool,
	#[serde(default, skip_serializing_if = "is_default")]
	pub trace: bool,
	#[serde(default, skip_serializing_if = "is_default")]
	pub priority: i32,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub ports: Vec<PortSpec>,
}

/// Named pointer to a Service, decoupling rule identity from service identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAlias {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	pub service_ref: NamespacedObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	pub cidr: String,
	// Status, maintained by the reconciler.
	#[serde(default, skip_serializing_if = "is_default")]
	pub is_bound: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub binding_ref: Option<ObjectRef>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address_group_ref: Option<NamespacedObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBinding {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	pub network_ref: ObjectRef,
	pub address_group_ref: ObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	pub uuid: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub host_name: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub ip_list: Vec<String>,
	// Status, maintained by the reconciler.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub address_group_name: String,
	#[serde(default, skip_serializing_if = "is_default")]
	pub is_bound: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub binding_ref: Option<ObjectRef>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address_group_ref: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBinding {
	#[serde(flatten)]
	pub self_ref: ResourceIdentifier,
	#[serde(default, skip_serializing_if = "is_default")]
	pub meta: Meta,
	pub host_ref: ObjectRef,
	pub address_group_ref: ObjectRef,
}

/// One typed batch of resources, the subject of a sync request and the
/// payload of a downstream publish. One arm per kind keeps dispatch an
/// exhaustive match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Batch {
	Services(Vec<Service>),
	AddressGroups(Vec<AddressGroup>),
	AddressGroupBindings(Vec<AddressGroupBinding>),
	AddressGroupBindingPolicies(Vec<AddressGroupBindingPolicy>),
	AddressGroupPortMappings(Vec<AddressGroupPortMapping>),
	RulesS2S(Vec<RuleS2S>),
	ServiceAliases(Vec<ServiceAlias>),
	#[serde(rename = "ieAgAgRules")]
	IEAgAgRules(Vec<IEAgAgRule>),
	Networks(Vec<Network>),
	NetworkBindings(Vec<NetworkBinding>),
	Hosts(Vec<Host>),
	HostBindings(Vec<HostBinding>),
}

impl Batch {
	pub fn kind(&self) -> Kind {
		match self {
			Batch::Services(_) => Kind::Service,
			Batch::AddressGroups(_) => Kind::AddressGroup,
			Batch::AddressGroupBindings(_) => Kind::AddressGroupBinding,
			Batch::AddressGroupBindingPolicies(_) => Kind::AddressGroupBindingPolicy,
			Batch::AddressGroupPortMappings(_) => Kind::AddressGroupPortMapping,
			Batch::RulesS2S(_) => Kind::RuleS2S,
			Batch::ServiceAliases(_) => Kind::ServiceAlias,
			Batch::IEAgAgRules(_) => Kind::IEAgAgRule,
			Batch::Networks(_) => Kind::Network,
			Batch::NetworkBindings(_) => Kind::NetworkBinding,
			Batch::Hosts(_) => Kind::Host,
			Batch::HostBindings(_) => Kind::HostBinding,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Batch::Services(v) => v.len(),
			Batch::AddressGroups(v) => v.len(),
			Batch::AddressGroupBindings(v) => v.len(),
			Batch::AddressGroupBindingPolicies(v) => v.len(),
			Batch::AddressGroupPortMappings(v) => v.len(),
			Batch::RulesS2S(v) => v.len(),
			Batch::ServiceAliases(v) => v.len(),
			Batch::IEAgAgRules(v) => v.len(),
			Batch::Networks(v) => v.len(),
			Batch::NetworkBindings(v) => v.len(),
			Batch::Hosts(v) => v.len(),
			Batch::HostBindings(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Behaviour shared by every managed resource.
pub trait Resource: Clone + fmt::Debug + Default + PartialEq + Send + Sync + 'static {
	const KIND: Kind;

	fn self_ref(&self) -> &ResourceIdentifier;
	fn meta(&self) -> &Meta;
	fn meta_mut(&mut self) -> &mut Meta;

	/// Whether the spec portion (everything except Meta and derived fields)
	/// is identical. Drives the Generation bump discipline.
	fn spec_eq(&self, other: &Self) -> bool;

	/// Clear reconciler-owned fields. Applied to every externally written
	/// item so callers cannot forge derived state.
	fn strip_derived(&mut self) {}

	/// Adopt the reconciler-owned fields of the stored copy, so a write that
	/// leaves the spec untouched stores byte-identical state.
	fn carry_derived(&mut self, _prev: &Self) {}

	fn id(&self) -> ResourceIdentifier {
		self.self_ref().clone()
	}
}

impl Resource for Service {
	const KIND: Kind = Kind::Service;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.description == other.description
			&& self.ingress_ports == other.ingress_ports
			&& self.address_groups == other.address_groups
	}
	fn strip_derived(&mut self) {
		self.aggregated_address_groups.clear();
	}
	fn carry_derived(&mut self, prev: &Self) {
		self.aggregated_address_groups = prev.aggregated_address_groups.clone();
	}
}

impl Resource for AddressGroup {
	const KIND: Kind = Kind::AddressGroup;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		let inline = |ag: &AddressGroup| {
			ag.networks
				.iter()
				.filter(|n| n.network_ref.is_none())
				.cloned()
				.collect::<Vec<_>>()
		};
		self.default_action == other.default_action
			&& self.logs == other.logs
			&& self.trace == other.trace
			&& inline(self) == inline(other)
			&& self.hosts == other.hosts
	}
	fn strip_derived(&mut self) {
		self.aggregated_hosts.clear();
		self.networks.retain(|n| n.network_ref.is_none());
	}
	fn carry_derived(&mut self, prev: &Self) {
		self.aggregated_hosts = prev.aggregated_hosts.clone();
		self
			.networks
			.extend(prev.networks.iter().filter(|n| n.network_ref.is_some()).cloned());
	}
}

impl Resource for AddressGroupBinding {
	const KIND: Kind = Kind::AddressGroupBinding;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.service_ref == other.service_ref && self.address_group_ref == other.address_group_ref
	}
}

impl Resource for AddressGroupBindingPolicy {
	const KIND: Kind = Kind::AddressGroupBindingPolicy;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.service_ref == other.service_ref && self.address_group_ref == other.address_group_ref
	}
}

impl Resource for AddressGroupPortMapping {
	const KIND: Kind = Kind::AddressGroupPortMapping;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.access_ports == other.access_ports
	}
}

impl Resource for RuleS2S {
	const KIND: Kind = Kind::RuleS2S;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.traffic == other.traffic
			&& self.service_local_ref == other.service_local_ref
			&& self.service_ref == other.service_ref
			&& self.trace == other.trace
	}
	fn strip_derived(&mut self) {
		self.ieagag_rule_refs.clear();
	}
	fn carry_derived(&mut self, prev: &Self) {
		self.ieagag_rule_refs = prev.ieagag_rule_refs.clone();
	}
}

impl Resource for ServiceAlias {
	const KIND: Kind = Kind::ServiceAlias;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.service_ref == other.service_ref
	}
}

impl Resource for IEAgAgRule {
	const KIND: Kind = Kind::IEAgAgRule;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.transport == other.transport
			&& self.traffic == other.traffic
			&& self.address_group_local == other.address_group_local
			&& self.address_group == other.address_group
			&& self.action == other.action
			&& self.logs == other.logs
			&& self.trace == other.trace
			&& self.priority == other.priority
			&& self.ports == other.ports
	}
}

impl Resource for Network {
	const KIND: Kind = Kind::Network;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.cidr == other.cidr
	}
	fn strip_derived(&mut self) {
		self.is_bound = false;
		self.binding_ref = None;
		self.address_group_ref = None;
	}
	fn carry_derived(&mut self, prev: &Self) {
		self.is_bound = prev.is_bound;
		self.binding_ref = prev.binding_ref.clone();
		self.address_group_ref = prev.address_group_ref.clone();
	}
}

impl Resource for NetworkBinding {
	const KIND: Kind = Kind::NetworkBinding;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.network_ref == other.network_ref && self.address_group_ref == other.address_group_ref
	}
}

impl Resource for Host {
	const KIND: Kind = Kind::Host;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.uuid == other.uuid && self.host_name == other.host_name && self.ip_list == other.ip_list
	}
	fn strip_derived(&mut self) {
		self.is_bound = false;
		self.address_group_name.clear();
		self.binding_ref = None;
		self.address_group_ref = None;
	}
	fn carry_derived(&mut self, prev: &Self) {
		self.is_bound = prev.is_bound;
		self.address_group_name = prev.address_group_name.clone();
		self.binding_ref = prev.binding_ref.clone();
		self.address_group_ref = prev.address_group_ref.clone();
	}
}

impl Resource for HostBinding {
	const KIND: Kind = Kind::HostBinding;

	fn self_ref(&self) -> &ResourceIdentifier {
		&self.self_ref
	}
	fn meta(&self) -> &Meta {
		&self.meta
	}
	fn meta_mut(&mut self) -> &mut Meta {
		&mut self.meta
	}
	fn spec_eq(&self, other: &Self) -> bool {
		self.host_ref == other.host_ref && self.address_group_ref == other.address_group_ref
	}
}
