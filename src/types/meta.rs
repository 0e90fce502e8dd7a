use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::is_default;

/// Canonical API group/version stamped into references when the caller sends
/// only the legacy identifier shape.
pub const API_VERSION: &str = "netguard.sgroups.io/v1beta1";

/// Well-known condition types. Additional types (e.g. `Warning`, attached by
/// the wire decoder) are allowed; conditions are keyed by type.
pub mod condition {
	pub const READY: &str = "Ready";
	pub const VALIDATED: &str = "Validated";
	pub const SYNCED: &str = "Synced";
	pub const WARNING: &str = "Warning";

	pub const REASON_RECONCILED: &str = "Reconciled";
	pub const REASON_VALIDATED: &str = "Validated";
	pub const REASON_PENDING_SYNC: &str = "PendingSync";
	pub const REASON_SYNCED: &str = "Synced";
	pub const REASON_SYNC_FAILED: &str = "SyncFailed";
	pub const REASON_DEFAULTED_ENUM: &str = "DefaultedEnumValue";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
	True,
	False,
	Unknown,
}

impl Default for ConditionStatus {
	fn default() -> Self {
		ConditionStatus::Unknown
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
	#[serde(rename = "type")]
	pub type_: String,
	pub status: ConditionStatus,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub reason: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_transition_time: Option<DateTime<Utc>>,
}

/// Server-owned metadata envelope carried by every resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub uid: String,
	#[serde(default, skip_serializing_if = "is_default")]
	pub resource_version: u64,
	#[serde(default, skip_serializing_if = "is_default")]
	pub generation: i64,
	#[serde(default, skip_serializing_if = "is_default")]
	pub observed_generation: i64,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub annotations: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub creation_timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub conditions: Vec<Condition>,
}

impl Meta {
	pub fn condition(&self, type_: &str) -> Option<&Condition> {
		self.conditions.iter().find(|c| c.type_ == type_)
	}

	/// Append-with-replace by type. LastTransitionTime only moves when the
	/// status actually flips.
	pub fn set_condition(
		&mut self,
		type_: &str,
		status: ConditionStatus,
		reason: &str,
		message: &str,
		now: DateTime<Utc>,
	) {
		match self.conditions.iter_mut().find(|c| c.type_ == type_) {
			Some(existing) => {
				if existing.status != status {
					existing.last_transition_time = Some(now);
				}
				existing.status = status;
				existing.reason = reason.to_string();
				existing.message = message.to_string();
			},
			None => self.conditions.push(Condition {
				type_: type_.to_string(),
				status,
				reason: reason.to_string(),
				message: message.to_string(),
				last_transition_time: Some(now),
			}),
		}
	}
}

/// Fresh opaque UID for a newly created resource.
pub fn new_uid() -> String {
	let raw: u128 = rand::rng().random();
	format!(
		"{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
		(raw >> 96) as u32,
		(raw >> 80) as u16,
		(raw >> 64) as u16,
		(raw >> 48) as u16,
		raw & 0xffff_ffff_ffff
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn condition_transition_time_only_moves_on_status_flip() {
		let t0 = Utc::now();
		let t1 = t0 + chrono::Duration::seconds(10);
		let t2 = t1 + chrono::Duration::seconds(10);

		let mut meta = Meta::default();
		meta.set_condition(condition::READY, ConditionStatus::True, "Reconciled", "", t0);
		assert_eq!(
			meta.condition(condition::READY).unwrap().last_transition_time,
			Some(t0)
		);

		// Same status, newer reason: timestamp untouched.
		meta.set_condition(condition::READY, ConditionStatus::True, "StillFine", "", t1);
		let c = meta.condition(condition::READY).unwrap();
		assert_eq!(c.reason, "StillFine");
		assert_eq!(c.last_transition_time, Some(t0));

		// Flip: timestamp moves.
		meta.set_condition(condition::READY, ConditionStatus::False, "Broken", "boom", t2);
		let c = meta.condition(condition::READY).unwrap();
		assert_eq!(c.last_transition_time, Some(t2));
		assert_eq!(c.message, "boom");
	}

	#[test]
	fn conditions_are_keyed_by_type() {
		let now = Utc::now();
		let mut meta = Meta::default();
		meta.set_condition(condition::READY, ConditionStatus::True, "a", "", now);
		meta.set_condition(condition::SYNCED, ConditionStatus::Unknown, "b", "", now);
		meta.set_condition(condition::READY, ConditionStatus::True, "c", "", now);
		assert_eq!(meta.conditions.len(), 2);
	}

	#[test]
	fn uids_are_unique_and_shaped() {
		let a = new_uid();
		let b = new_uid();
		assert_ne!(a, b);
		assert_eq!(a.len(), 36);
		assert_eq!(a.chars().filter(|c| *c == '-').count(), 4);
	}
}
