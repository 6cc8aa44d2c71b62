//! # Collaborator Boundary
//!
//! The ledger core does not own identities, signatures, or custody of real
//! funds. Those live in external subsystems, and the core consumes exactly
//! three facts from them: does a profile exist (and is it active), is a
//! caller authorized to act for a profile, and "move this amount of this
//! asset to this address".
//!
//! This module defines the two traits that carry those facts across the
//! boundary, plus in-memory implementations used by the node binary and the
//! test suite. The in-memory outlet doubles as an append-only settlement
//! journal: every outbound transfer the ledger ever makes is recorded, which
//! is what the conservation tests sum over.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::asset::AssetKind;
use crate::ProfileId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the value-transfer primitive.
///
/// A transfer either moves the full amount or returns an error having moved
/// nothing -- outlets must never fail silently or partially.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The destination rejected the transfer or the outlet could not
    /// complete it.
    #[error("transfer of {amount} ({asset}) to {to} rejected")]
    Rejected {
        /// Asset the transfer was denominated in.
        asset: AssetKind,
        /// Destination address.
        to: String,
        /// Amount that was not moved.
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read-only view of the profile subsystem.
pub trait ProfileDirectory: Send + Sync {
    /// Returns `true` if the profile exists and is active.
    fn profile_exists(&self, id: ProfileId) -> bool;

    /// Returns `true` if `caller` is currently authorized to act for the
    /// profile.
    fn is_active_controller(&self, id: ProfileId, caller: &str) -> bool;
}

/// Outbound value transfer.
///
/// The ledger always debits its own books *before* invoking this, so a
/// re-entrant observer can never see a balance the transfer has not been
/// charged against. An `Err` means no value moved.
pub trait TransferOutlet: Send + Sync {
    /// Moves `amount` of `asset` to the external address `to`.
    fn transfer_out(&mut self, asset: &AssetKind, to: &str, amount: u64)
        -> Result<(), TransferError>;
}

// ---------------------------------------------------------------------------
// InMemoryDirectory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProfileEntry {
    active: bool,
    controllers: HashSet<String>,
}

/// In-memory profile directory.
///
/// Clones share the same underlying table, so the registry can hold one
/// handle while the embedding process keeps another for registrations.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    profiles: Arc<RwLock<HashMap<ProfileId, ProfileEntry>>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active profile with one initial controller address.
    /// Re-registering an existing profile reactivates it and adds the
    /// controller.
    pub fn register(&self, id: ProfileId, controller: &str) {
        let mut profiles = self.profiles.write();
        let entry = profiles.entry(id).or_default();
        entry.active = true;
        entry.controllers.insert(controller.to_string());
    }

    /// Adds a controller address to an existing profile. No-op for unknown
    /// profiles.
    pub fn add_controller(&self, id: ProfileId, controller: &str) {
        if let Some(entry) = self.profiles.write().get_mut(&id) {
            entry.controllers.insert(controller.to_string());
        }
    }

    /// Deactivates a profile. Its record is kept so controllers can be
    /// restored on reactivation.
    pub fn deactivate(&self, id: ProfileId) {
        if let Some(entry) = self.profiles.write().get_mut(&id) {
            entry.active = false;
        }
    }

    /// Number of registered profiles, active or not.
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Returns `true` if no profile was ever registered.
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

impl ProfileDirectory for InMemoryDirectory {
    fn profile_exists(&self, id: ProfileId) -> bool {
        self.profiles.read().get(&id).map_or(false, |e| e.active)
    }

    fn is_active_controller(&self, id: ProfileId, caller: &str) -> bool {
        self.profiles
            .read()
            .get(&id)
            .map_or(false, |e| e.active && e.controllers.contains(caller))
    }
}

// ---------------------------------------------------------------------------
// RecordingOutlet
// ---------------------------------------------------------------------------

/// One outbound transfer as recorded by [`RecordingOutlet`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Asset the transfer was denominated in.
    pub asset: AssetKind,
    /// Destination address.
    pub to: String,
    /// Amount moved.
    pub amount: u64,
}

#[derive(Debug, Default)]
struct OutletState {
    transfers: Vec<TransferRecord>,
    failing: bool,
}

/// An in-memory transfer outlet that journals every outbound transfer.
///
/// Clones share the same journal. The `failing` switch makes every
/// subsequent transfer return [`TransferError::Rejected`] without recording
/// anything, which is how the tests exercise the all-or-nothing guarantees.
#[derive(Clone, Debug, Default)]
pub struct RecordingOutlet {
    state: Arc<Mutex<OutletState>>,
}

impl RecordingOutlet {
    /// Creates an outlet with an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent transfer fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Returns a copy of the full transfer journal, in order.
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.state.lock().transfers.clone()
    }

    /// Sum of all amounts ever sent to `to`, across assets.
    pub fn total_to(&self, to: &str) -> u64 {
        self.state
            .lock()
            .transfers
            .iter()
            .filter(|t| t.to == to)
            .map(|t| t.amount)
            .sum()
    }

    /// Sum of all amounts ever sent, across destinations and assets.
    pub fn total_out(&self) -> u64 {
        self.state.lock().transfers.iter().map(|t| t.amount).sum()
    }
}

impl TransferOutlet for RecordingOutlet {
    fn transfer_out(
        &mut self,
        asset: &AssetKind,
        to: &str,
        amount: u64,
    ) -> Result<(), TransferError> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(TransferError::Rejected {
                asset: asset.clone(),
                to: to.to_string(),
                amount,
            });
        }
        state.transfers.push(TransferRecord {
            asset: asset.clone(),
            to: to.to_string(),
            amount,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_profile_does_not_exist() {
        let dir = InMemoryDirectory::new();
        assert!(!dir.profile_exists(7));
        assert!(!dir.is_active_controller(7, "aval:alice"));
    }

    #[test]
    fn registered_profile_exists_with_controller() {
        let dir = InMemoryDirectory::new();
        dir.register(7, "aval:alice");

        assert!(dir.profile_exists(7));
        assert!(dir.is_active_controller(7, "aval:alice"));
        assert!(!dir.is_active_controller(7, "aval:mallory"));
    }

    #[test]
    fn deactivated_profile_fails_both_checks() {
        let dir = InMemoryDirectory::new();
        dir.register(7, "aval:alice");
        dir.deactivate(7);

        assert!(!dir.profile_exists(7));
        assert!(!dir.is_active_controller(7, "aval:alice"));
    }

    #[test]
    fn reregistration_reactivates() {
        let dir = InMemoryDirectory::new();
        dir.register(7, "aval:alice");
        dir.deactivate(7);
        dir.register(7, "aval:alice-2");

        assert!(dir.profile_exists(7));
        // The original controller survives deactivation.
        assert!(dir.is_active_controller(7, "aval:alice"));
        assert!(dir.is_active_controller(7, "aval:alice-2"));
    }

    #[test]
    fn outlet_journals_transfers_in_order() {
        let outlet = RecordingOutlet::new();
        let mut handle = outlet.clone();

        handle
            .transfer_out(&AssetKind::Native, "aval:treasury", 100)
            .unwrap();
        handle
            .transfer_out(&AssetKind::Native, "aval:alice", 250)
            .unwrap();

        let journal = outlet.transfers();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].to, "aval:treasury");
        assert_eq!(journal[1].amount, 250);
        assert_eq!(outlet.total_to("aval:alice"), 250);
        assert_eq!(outlet.total_out(), 350);
    }

    #[test]
    fn failing_outlet_records_nothing() {
        let outlet = RecordingOutlet::new();
        let mut handle = outlet.clone();
        outlet.set_failing(true);

        let result = handle.transfer_out(&AssetKind::Native, "aval:alice", 100);
        assert!(matches!(result, Err(TransferError::Rejected { .. })));
        assert!(outlet.transfers().is_empty());

        outlet.set_failing(false);
        handle
            .transfer_out(&AssetKind::Native, "aval:alice", 100)
            .unwrap();
        assert_eq!(outlet.total_out(), 100);
    }
}
