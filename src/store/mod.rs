pub mod memory;
pub mod scope;


use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

pub use memory::{MemStore, Tx};
pub use scope::Scope;

use crate::types::meta::Meta;
use crate::types::{
	AddressGroup, AddressGroupBinding, AddressGroupBindingPolicy, AddressGroupPortMapping, Host,
	HostBinding, IEAgAgRule, Kind, Network, NetworkBinding, Resource, ResourceIdentifier, RuleS2S,
	Service, ServiceAlias,
};

/// One kind's worth of resources, keyed by identity. BTreeMap keeps
/// iteration deterministic, which the reconciler relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T: Resource> {
	items: BTreeMap<ResourceIdentifier, T>,
}

impl<T: Resource> Default for Table<T> {
	fn default() -> Self {
		Self {
			items: BTreeMap::new(),
		}
	}
}

impl<T: Resource> Table<T> {
	pub fn get(&self, id: &ResourceIdentifier) -> Option<&T> {
		self.items.get(id)
	}

	pub fn get_mut(&mut self, id: &ResourceIdentifier) -> Option<&mut T> {
		self.items.get_mut(id)
	}

	pub fn contains(&self, id: &ResourceIdentifier) -> bool {
		self.items.contains_key(id)
	}

	pub fn insert(&mut self, item: T) -> Option<T> {
		self.items.insert(item.id(), item)
	}

	pub fn remove(&mut self, id: &ResourceIdentifier) -> Option<T> {
		self.items.remove(id)
	}

	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.items.values()
	}

	pub fn ids(&self) -> impl Iterator<Item = &ResourceIdentifier> {
		self.items.keys()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// List items matching the scope, applying the visitor per item. The
	/// visitor may return an error to short-circuit iteration.
	pub fn visit<E>(
		&self,
		scope: &Scope,
		mut f: impl FnMut(&T) -> Result<(), E>,
	) -> Result<(), E> {
		for item in self.items.values() {
			if scope.matches(item.self_ref()) {
				f(item)?;
			}
		}
		Ok(())
	}

	pub fn list(&self, scope: &Scope) -> Vec<T> {
		self
			.items
			.values()
			.filter(|i| scope.matches(i.self_ref()))
			.cloned()
			.collect()
	}
}

impl<T: Resource + Serialize> Serialize for Table<T> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_seq(self.items.values())
	}
}

/// The complete registry state: one table per kind. Cloned wholesale to open
/// a transaction; swapped atomically on commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
	pub services: Table<Service>,
	pub address_groups: Table<AddressGroup>,
	pub address_group_bindings: Table<AddressGroupBinding>,
	pub address_group_binding_policies: Table<AddressGroupBindingPolicy>,
	pub address_group_port_mappings: Table<AddressGroupPortMapping>,
	pub rules_s2s: Table<RuleS2S>,
	pub service_aliases: Table<ServiceAlias>,
	pub ieagag_rules: Table<IEAgAgRule>,
	pub networks: Table<Network>,
	pub network_bindings: Table<NetworkBinding>,
	pub hosts: Table<Host>,
	pub host_bindings: Table<HostBinding>,
}

/// Compile-time mapping from a resource type to its table in [`State`].
pub trait Keyed: Resource {
	fn table(state: &State) -> &Table<Self>;
	fn table_mut(state: &mut State) -> &mut Table<Self>;
}

macro_rules! impl_keyed {
	($ty:ty, $field:ident) => {
		impl Keyed for $ty {
			fn table(state: &State) -> &Table<Self> {
				&state.$field
			}
			fn table_mut(state: &mut State) -> &mut Table<Self> {
				&mut state.$field
			}
		}
	};
}

impl_keyed!(Service, services);
impl_keyed!(AddressGroup, address_groups);
impl_keyed!(AddressGroupBinding, address_group_bindings);
impl_keyed!(AddressGroupBindingPolicy, address_group_binding_policies);
impl_keyed!(AddressGroupPortMapping, address_group_port_mappings);
impl_keyed!(RuleS2S, rules_s2s);
impl_keyed!(ServiceAlias, service_aliases);
impl_keyed!(IEAgAgRule, ieagag_rules);
impl_keyed!(Network, networks);
impl_keyed!(NetworkBinding, network_bindings);
impl_keyed!(Host, hosts);
impl_keyed!(HostBinding, host_bindings);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
	Upsert,
	Delete,
}

/// One recorded mutation inside a transaction. The reconciler and the
/// downstream sync enqueue both consume this log.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
	pub kind: Kind,
	pub id: ResourceIdentifier,
	pub op: ChangeOp,
}

/// Apply a closure to the Meta of the given identities, dispatching on the
/// runtime kind. Identities that no longer exist are skipped. The closure
/// owns any version bookkeeping: inside a write transaction the surrounding
/// upsert already bumped the version, while a standalone conditions-only
/// update must bump it itself.
pub fn for_each_meta_mut(
	state: &mut State,
	kind: Kind,
	ids: &[ResourceIdentifier],
	f: &mut dyn FnMut(&mut Meta),
) {
	fn apply<T: Keyed>(state: &mut State, ids: &[ResourceIdentifier], f: &mut dyn FnMut(&mut Meta)) {
		for id in ids {
			if let Some(item) = T::table_mut(state).get_mut(id) {
				f(item.meta_mut());
			}
		}
	}
	match kind {
		Kind::Service => apply::<Service>(state, ids, f),
		Kind::AddressGroup => apply::<AddressGroup>(state, ids, f),
		Kind::AddressGroupBinding => apply::<AddressGroupBinding>(state, ids, f),
		Kind::AddressGroupBindingPolicy => apply::<AddressGroupBindingPolicy>(state, ids, f),
		Kind::AddressGroupPortMapping => apply::<AddressGroupPortMapping>(state, ids, f),
		Kind::RuleS2S => apply::<RuleS2S>(state, ids, f),
		Kind::ServiceAlias => apply::<ServiceAlias>(state, ids, f),
		Kind::IEAgAgRule => apply::<IEAgAgRule>(state, ids, f),
		Kind::Network => apply::<Network>(state, ids, f),
		Kind::NetworkBinding => apply::<NetworkBinding>(state, ids, f),
		Kind::Host => apply::<Host>(state, ids, f),
		Kind::HostBinding => apply::<HostBinding>(state, ids, f),
	}
}
