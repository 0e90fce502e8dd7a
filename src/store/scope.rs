use std::collections::BTreeSet;

use crate::types::ResourceIdentifier;

/// Server-side filter applied by every list operation. Scopes compose by
/// intersection via [`Scope::and`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Scope {
	/// Matches everything.
	#[default]
	Empty,
	/// Matches items whose (namespace, name) appears in the set.
	Identifiers(BTreeSet<ResourceIdentifier>),
	/// Matches by name only, in any namespace. Kept for compatibility with
	/// earlier list APIs.
	Names(BTreeSet<String>),
	/// Matches whole namespaces; the implicit scope of a FullSync batch.
	Namespaces(BTreeSet<String>),
	And(Vec<Scope>),
}

impl Scope {
	pub fn ids(ids: impl IntoIterator<Item = ResourceIdentifier>) -> Scope {
		Scope::Identifiers(ids.into_iter().collect())
	}

	pub fn names(names: impl IntoIterator<Item = impl Into<String>>) -> Scope {
		Scope::Names(names.into_iter().map(Into::into).collect())
	}

	/// Scope matching all identities in the given namespaces. Used to model
	/// the implicit scope of a FullSync batch.
	pub fn namespaces(namespaces: impl IntoIterator<Item = impl Into<String>>) -> Scope {
		Scope::Namespaces(namespaces.into_iter().map(Into::into).collect())
	}

	pub fn and(self, other: Scope) -> Scope {
		match (self, other) {
			(Scope::Empty, s) | (s, Scope::Empty) => s,
			(Scope::And(mut a), Scope::And(b)) => {
				a.extend(b);
				Scope::And(a)
			},
			(Scope::And(mut a), s) | (s, Scope::And(mut a)) => {
				a.push(s);
				Scope::And(a)
			},
			(a, b) => Scope::And(vec![a, b]),
		}
	}

	pub fn matches(&self, id: &ResourceIdentifier) -> bool {
		match self {
			Scope::Empty => true,
			Scope::Identifiers(ids) => ids.contains(id),
			Scope::Names(names) => names.contains(&id.name),
			Scope::Namespaces(namespaces) => namespaces.contains(&id.namespace),
			Scope::And(scopes) => scopes.iter().all(|s| s.matches(id)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(ns: &str, name: &str) -> ResourceIdentifier {
		ResourceIdentifier::new(ns, name)
	}

	#[test]
	fn empty_matches_everything() {
		assert!(Scope::Empty.matches(&id("default", "web")));
		assert!(Scope::Empty.matches(&id("", "web")));
	}

	#[test]
	fn identifier_scope_matches_exact_pairs() {
		let s = Scope::ids([id("default", "web")]);
		assert!(s.matches(&id("default", "web")));
		assert!(!s.matches(&id("other", "web")));
		assert!(!s.matches(&id("default", "db")));
	}

	#[test]
	fn name_scope_ignores_namespace() {
		let s = Scope::names(["web"]);
		assert!(s.matches(&id("default", "web")));
		assert!(s.matches(&id("other", "web")));
		assert!(!s.matches(&id("default", "db")));
	}

	#[test]
	fn composition_is_intersection() {
		let s = Scope::names(["web"]).and(Scope::namespaces(["default"]));
		assert!(s.matches(&id("default", "web")));
		assert!(!s.matches(&id("other", "web")));
		assert!(!s.matches(&id("default", "db")));
	}

	#[test]
	fn and_with_empty_is_identity() {
		let s = Scope::names(["web"]).and(Scope::Empty);
		assert_eq!(s, Scope::names(["web"]));
	}
}
