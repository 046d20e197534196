//! Bot identity generation and rotation.
//!
//! An [`Identity`] is the display name and unique identifier a slot presents
//! when connecting. Identities are immutable: rotation replaces the stored
//! value wholesale, it never mutates fields in place.

use crate::fleet::{errors::FleetError, slot::SlotId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Minimum length for an operator-supplied display name
pub const MIN_NAME_LEN: usize = 4;

/// Display name + unique identifier presented to the remote server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name (e.g. `Player_123456`)
    pub name: String,

    /// 128-bit unique identifier
    pub uuid: Uuid,
}

impl Identity {
    /// Generate a random identity (`Player_` + up to six digits, random uuid)
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self {
            name: format!("Player_{}", rng.random_range(0..1_000_000u32)),
            uuid: Uuid::new_v4(),
        }
    }
}

/// Registry mapping slot ids to their current identities
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    identities: HashMap<SlotId, Identity>,
}

impl IdentityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the identity for a slot, lazily creating a random one
    pub fn identity_for(&mut self, slot_id: SlotId) -> &Identity {
        self.identities.entry(slot_id).or_insert_with(|| {
            let identity = Identity::random();
            log::info!("New identity for slot {}: {}", slot_id, identity.name);
            identity
        })
    }

    /// Get the identity for a slot without creating one
    pub fn get(&self, slot_id: SlotId) -> Option<&Identity> {
        self.identities.get(&slot_id)
    }

    /// Replace the stored identity for a slot.
    ///
    /// Used on ban detection (random replacement) and on explicit
    /// custom-identity requests. Operator-supplied names shorter than
    /// [`MIN_NAME_LEN`] are rejected before anything is stored.
    ///
    /// # Arguments
    ///
    /// * `slot_id` - Slot whose identity is replaced
    /// * `name` - Custom display name, or `None` for a random one
    /// * `uuid` - Custom unique identifier, or `None` for a random one
    ///
    /// # Returns
    ///
    /// * `Result<Identity, FleetError>` - The new identity
    pub fn rotate(
        &mut self,
        slot_id: SlotId,
        name: Option<String>,
        uuid: Option<Uuid>,
    ) -> Result<Identity, FleetError> {
        if let Some(ref name) = name
            && name.chars().count() < MIN_NAME_LEN
        {
            return Err(FleetError::NameTooShort { name: name.clone() });
        }

        let random = Identity::random();
        let identity = Identity {
            name: name.unwrap_or(random.name),
            uuid: uuid.unwrap_or(random.uuid),
        };

        log::info!("New identity for slot {}: {}", slot_id, identity.name);
        self.identities.insert(slot_id, identity.clone());
        Ok(identity)
    }

    /// Forget the identity for a slot (permanent removal)
    pub fn remove(&mut self, slot_id: SlotId) {
        self.identities.remove(&slot_id);
    }

    /// Number of stored identities
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_identity_uses_player_prefix() {
        let identity = Identity::random();
        assert!(identity.name.starts_with("Player_"));
        let digits = &identity.name["Player_".len()..];
        assert!(digits.parse::<u32>().unwrap() < 1_000_000);
    }

    #[test]
    fn identity_for_is_lazy_and_stable() {
        let mut registry = IdentityRegistry::new();
        assert!(registry.get(1).is_none());

        let first = registry.identity_for(1).clone();
        let second = registry.identity_for(1).clone();
        assert_eq!(first, second);
    }

    #[test]
    fn rotate_replaces_wholesale() {
        let mut registry = IdentityRegistry::new();
        let original = registry.identity_for(3).clone();

        let rotated = registry.rotate(3, None, None).unwrap();
        assert_ne!(original.uuid, rotated.uuid);
        assert_eq!(registry.get(3).unwrap(), &rotated);
    }

    #[test]
    fn rotate_rejects_short_names_without_mutation() {
        let mut registry = IdentityRegistry::new();
        let original = registry.identity_for(2).clone();

        let err = registry.rotate(2, Some("abc".to_string()), None).unwrap_err();
        assert_eq!(
            err,
            FleetError::NameTooShort {
                name: "abc".to_string()
            }
        );
        assert_eq!(registry.get(2).unwrap(), &original);
    }

    #[test]
    fn rotate_accepts_custom_name_and_uuid() {
        let mut registry = IdentityRegistry::new();
        let uuid = Uuid::new_v4();
        let identity = registry
            .rotate(7, Some("Griefer99".to_string()), Some(uuid))
            .unwrap();

        assert_eq!(identity.name, "Griefer99");
        assert_eq!(identity.uuid, uuid);
    }

    #[test]
    fn remove_forgets_identity() {
        let mut registry = IdentityRegistry::new();
        registry.identity_for(4);
        registry.remove(4);
        assert!(registry.get(4).is_none());
    }
}
