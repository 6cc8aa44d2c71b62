//! # Escrow -- Per-Profile Balance Ledger
//!
//! Donation fees skimmed from incoming vouches land here, credited to the
//! subject profile. Balances are keyed by `(profile, asset)` and are created
//! implicitly on first deposit. Deposits are push-only; anyone may credit a
//! profile. Withdrawals are gated on the profile's registered controller and
//! follow a strict debit-then-transfer discipline: the balance is reduced
//! *before* the external transfer is attempted, so any callback the transfer
//! triggers observes the already-reduced balance. If the transfer itself
//! reports failure, the whole operation unwinds and the balance is restored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::asset::AssetKind;
use crate::directory::{ProfileDirectory, TransferError, TransferOutlet};
use crate::ProfileId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during escrow operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// Attempted to withdraw more than the profile's balance.
    #[error(
        "insufficient escrow balance: available {available}, requested {requested} \
         (profile {profile}, asset {asset})"
    )]
    InsufficientBalance {
        /// The profile whose balance was being debited.
        profile: ProfileId,
        /// The asset of the balance.
        asset: AssetKind,
        /// The current balance.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// Arithmetic overflow during a deposit.
    #[error("escrow balance overflow: current {current}, deposit {deposit} (profile {profile})")]
    Overflow {
        /// The profile whose balance was being credited.
        profile: ProfileId,
        /// The balance before the failed deposit.
        current: u64,
        /// The amount that caused the overflow.
        deposit: u64,
    },

    /// The caller is not a registered controller of the profile.
    #[error("caller {caller} does not control profile {profile}")]
    NotController {
        /// The profile the withdrawal targeted.
        profile: ProfileId,
        /// The unauthorized caller address.
        caller: String,
    },

    /// The outbound transfer failed; the debit has been restored.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

// ---------------------------------------------------------------------------
// EscrowLedger
// ---------------------------------------------------------------------------

/// The complete set of escrow balances, across all profiles and assets.
///
/// A plain value ledger: no shares, no exchange rate. Mutated only through
/// [`deposit`](Self::deposit) and [`withdraw`](Self::withdraw).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EscrowLedger {
    #[serde(with = "escrow_entries")]
    balances: HashMap<(ProfileId, AssetKind), u64>,
}

impl EscrowLedger {
    /// Creates an empty escrow ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` of `asset` to the profile's balance.
    ///
    /// Push-only: no authorization is required to receive value. An entry is
    /// created on first deposit. Depositing zero is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Overflow`] if the credit would exceed
    /// `u64::MAX`.
    pub fn deposit(
        &mut self,
        profile: ProfileId,
        asset: AssetKind,
        amount: u64,
    ) -> Result<u64, EscrowError> {
        if amount == 0 {
            return Ok(self.balance(profile, &asset));
        }

        let balance = self.balances.entry((profile, asset)).or_insert(0);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(EscrowError::Overflow {
                profile,
                current: *balance,
                deposit: amount,
            })?;

        *balance = new_balance;
        Ok(new_balance)
    }

    /// Withdraws `amount` of `asset` from the profile's balance and sends it
    /// to the external address `to`.
    ///
    /// Only an active controller of the profile may withdraw. The balance is
    /// debited before the outlet is invoked; a failed transfer restores it.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::NotController`] if `caller` does not control the
    ///   profile.
    /// - [`EscrowError::InsufficientBalance`] if `amount` exceeds the
    ///   balance.
    /// - [`EscrowError::Transfer`] if the outlet rejects the transfer; the
    ///   ledger is unchanged in that case.
    pub fn withdraw(
        &mut self,
        profile: ProfileId,
        caller: &str,
        asset: AssetKind,
        to: &str,
        amount: u64,
        directory: &dyn ProfileDirectory,
        outlet: &mut dyn TransferOutlet,
    ) -> Result<u64, EscrowError> {
        if !directory.is_active_controller(profile, caller) {
            return Err(EscrowError::NotController {
                profile,
                caller: caller.to_string(),
            });
        }

        let available = self.balance(profile, &asset);
        if amount > available {
            return Err(EscrowError::InsufficientBalance {
                profile,
                asset,
                available,
                requested: amount,
            });
        }

        // Debit first: a re-entrant observer must see the reduced balance.
        let remaining = available - amount;
        self.set_balance(profile, asset.clone(), remaining);

        if let Err(e) = outlet.transfer_out(&asset, to, amount) {
            // Nothing moved; unwind the debit.
            self.set_balance(profile, asset, available);
            return Err(e.into());
        }

        tracing::info!(
            profile,
            %asset,
            to,
            amount,
            remaining,
            "escrow withdrawal settled"
        );
        Ok(remaining)
    }

    /// Returns the profile's balance in `asset` (zero if never credited).
    pub fn balance(&self, profile: ProfileId, asset: &AssetKind) -> u64 {
        self.balances
            .get(&(profile, asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Returns all non-zero balances held by a profile.
    pub fn balances_for(&self, profile: ProfileId) -> Vec<(AssetKind, u64)> {
        self.balances
            .iter()
            .filter(|((p, _), amount)| *p == profile && **amount > 0)
            .map(|((_, asset), amount)| (asset.clone(), *amount))
            .collect()
    }

    /// Sum of every balance held in `asset`, across profiles.
    pub fn total_in_asset(&self, asset: &AssetKind) -> u64 {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Overwrites a balance entry. Rollback hook for the registry's
    /// all-or-nothing transitions; zero removes the entry.
    pub(crate) fn set_balance(&mut self, profile: ProfileId, asset: AssetKind, amount: u64) {
        if amount == 0 {
            self.balances.remove(&(profile, asset));
        } else {
            self.balances.insert((profile, asset), amount);
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helper: (profile, asset) keys as an entry list
// ---------------------------------------------------------------------------

/// Serializes the `(ProfileId, AssetKind) -> u64` map as a list of entry
/// objects. JSON map keys must be strings, and these keys are composite.
mod escrow_entries {
    use super::*;
    use serde::{Deserializer, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        profile: ProfileId,
        asset: AssetKind,
        amount: u64,
    }

    pub fn serialize<S>(
        map: &HashMap<(ProfileId, AssetKind), u64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries: Vec<Entry> = map
            .iter()
            .map(|((profile, asset), amount)| Entry {
                profile: *profile,
                asset: asset.clone(),
                amount: *amount,
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<HashMap<(ProfileId, AssetKind), u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|e| ((e.profile, e.asset), e.amount))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
