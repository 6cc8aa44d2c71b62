//! # Vouch Registry
//!
//! The registry owns the lifecycle of every [`Vouch`] and is the *only*
//! writer of vault, escrow, and fee state. Every externally visible
//! transition -- vouch, unvouch, mark-unhealthy, slash, fee mutation,
//! escrow withdrawal -- happens inside one `&mut self` call: serialized,
//! atomic, and all-or-nothing. A rejected operation leaves every ledger
//! byte-for-byte unchanged.
//!
//! ## Entry flow
//!
//! A new vouch of `amount` is split four ways by the fee engine:
//!
//! 1. the protocol fee is transferred out to the fee recipient,
//! 2. the donation fee is escrowed for the subject,
//! 3. the incentive fee is donated to the subject's vault, raising the
//!    exchange rate for everyone already staked there (withheld and folded
//!    into the depositor's stake when the vault is empty), and
//! 4. the net stake is deposited, minting shares to the author.
//!
//! ## Exit flow
//!
//! Unvouching redeems the author's full share balance at the current rate,
//! takes the exit fee for the recipient, and transfers the net to the
//! author's address. The record is archived, never deleted, and may be
//! flagged unhealthy within the grace window.
//!
//! Internal ledger writes happen before the external transfer is invoked;
//! if any step fails, snapshots taken up front reinstate the untouched
//! state before the error is surfaced.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::asset::AssetKind;
use crate::clock::Clock;
use crate::config::{ABSOLUTE_MINIMUM_VOUCH_AMOUNT, DEFAULT_MINIMUM_VOUCH_AMOUNT};
use crate::directory::{ProfileDirectory, TransferError, TransferOutlet};
use crate::escrow::{EscrowError, EscrowLedger};
use crate::fees::{EntryFees, FeeConfig, FeeError, FeeRateKind};
use crate::slash::{SlashEngine, SlashError, SlashEvent};
use crate::vault::{VaultBook, VaultError};
use crate::vouch::{Vouch, VouchError};
use crate::{ProfileId, VouchId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by registry operations.
///
/// Validation errors are rejected before any state is touched;
/// state-precondition errors from the inner ledgers abort the whole
/// transition with no partial effects.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The profile does not exist or has been deactivated.
    #[error("profile {0} does not exist or is inactive")]
    ProfileNotFound(ProfileId),

    /// The caller address does not control the profile it acted for.
    #[error("caller {caller} is not an active controller of profile {profile}")]
    Unauthorized {
        /// The profile the caller claimed to act for.
        profile: ProfileId,
        /// The rejected caller address.
        caller: String,
    },

    /// A profile tried to vouch for itself.
    #[error("profile {author} cannot vouch for itself")]
    SelfVouch {
        /// The offending profile.
        author: ProfileId,
    },

    /// The vouch amount is below the configured minimum.
    #[error("vouch amount {amount} is below the minimum {minimum}")]
    MinimumVouchAmount {
        /// The rejected amount.
        amount: u64,
        /// The minimum currently in force.
        minimum: u64,
    },

    /// The author already has an active vouch for this subject.
    #[error("profile {author} already has active vouch {existing} for subject {subject}")]
    DuplicateVouch {
        /// The vouching profile.
        author: ProfileId,
        /// The subject profile.
        subject: ProfileId,
        /// Id of the existing active vouch.
        existing: VouchId,
    },

    /// No vouch record with this id exists.
    #[error("no vouch with id {0}")]
    UnknownVouch(VouchId),

    /// The requested minimum is below the protocol-wide floor.
    #[error("minimum vouch amount {requested} is below the protocol floor {floor}")]
    MinimumBelowFloor {
        /// The rejected minimum.
        requested: u64,
        /// The immovable floor.
        floor: u64,
    },

    /// A vouch-record state precondition failed.
    #[error(transparent)]
    Vouch(#[from] VouchError),

    /// A vault operation failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// An escrow operation failed.
    #[error(transparent)]
    Escrow(#[from] EscrowError),

    /// A fee configuration mutation failed.
    #[error(transparent)]
    Fee(#[from] FeeError),

    /// A slash operation failed.
    #[error(transparent)]
    Slash(#[from] SlashError),

    /// The external transfer primitive rejected a transfer.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

// ---------------------------------------------------------------------------
// Read types
// ---------------------------------------------------------------------------

/// Read-only view of a subject's stake vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Total asset units held by the vault.
    pub total_assets: u64,
    /// Total share units outstanding.
    pub total_shares: u64,
}

/// Settlement summary returned by a successful unvouch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnvouchReceipt {
    /// The archived vouch.
    pub vouch_id: VouchId,
    /// Assets redeemed from the vault before the exit fee.
    pub gross: u64,
    /// Exit fee transferred to the fee recipient.
    pub exit_fee: u64,
    /// Net amount transferred to the author.
    pub net: u64,
}

// ---------------------------------------------------------------------------
// VouchRegistry
// ---------------------------------------------------------------------------

/// The staking ledger's single entry point.
///
/// Holds the fee configuration, every stake vault, the escrow ledger, the
/// slash engine, and all vouch records. Collaborators (profile directory,
/// transfer outlet, clock) are injected at construction.
pub struct VouchRegistry {
    staking_asset: AssetKind,
    minimum_vouch_amount: u64,
    fees: FeeConfig,
    vaults: VaultBook,
    escrow: EscrowLedger,
    slasher: SlashEngine,
    vouches: Vec<Vouch>,
    /// Active vouch per (author, subject). Entries are removed on unvouch,
    /// which is what re-enables vouching for the same pair.
    active: HashMap<(ProfileId, ProfileId), VouchId>,
    directory: Box<dyn ProfileDirectory>,
    outlet: Box<dyn TransferOutlet>,
    clock: Box<dyn Clock>,
}

impl VouchRegistry {
    /// Creates a registry staking `staking_asset`, with all fee rates at
    /// zero and the default minimum vouch amount.
    pub fn new(
        staking_asset: AssetKind,
        fee_recipient: impl Into<String>,
        directory: impl ProfileDirectory + 'static,
        outlet: impl TransferOutlet + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            staking_asset,
            minimum_vouch_amount: DEFAULT_MINIMUM_VOUCH_AMOUNT,
            fees: FeeConfig::new(fee_recipient),
            vaults: VaultBook::new(),
            escrow: EscrowLedger::new(),
            slasher: SlashEngine::new(),
            vouches: Vec::new(),
            active: HashMap::new(),
            directory: Box::new(directory),
            outlet: Box::new(outlet),
            clock: Box::new(clock),
        }
    }

    /// Replaces the slash engine, re-pinning the penalty scale.
    pub fn with_slash_scale(mut self, scale: u64) -> Self {
        self.slasher = SlashEngine::with_scale(scale);
        self
    }

    // -- State transitions --------------------------------------------------

    /// Stakes `amount` of the staking asset from `author` behind `subject`.
    ///
    /// Returns the id of the created vouch. See the module docs for the
    /// four-way split the amount goes through.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::ProfileNotFound`] if either profile is missing or
    ///   inactive.
    /// - [`RegistryError::SelfVouch`] if `author == subject`.
    /// - [`RegistryError::Unauthorized`] if `author_address` does not
    ///   control `author`.
    /// - [`RegistryError::MinimumVouchAmount`] if `amount` is below the
    ///   configured minimum.
    /// - [`RegistryError::DuplicateVouch`] if an active vouch for the pair
    ///   exists.
    ///
    /// All validation happens before any ledger is touched.
    pub fn vouch(
        &mut self,
        author: ProfileId,
        author_address: &str,
        subject: ProfileId,
        amount: u64,
        comment: &str,
        metadata: &str,
    ) -> Result<VouchId, RegistryError> {
        if !self.directory.profile_exists(author) {
            return Err(RegistryError::ProfileNotFound(author));
        }
        if !self.directory.profile_exists(subject) {
            return Err(RegistryError::ProfileNotFound(subject));
        }
        if author == subject {
            return Err(RegistryError::SelfVouch { author });
        }
        if !self.directory.is_active_controller(author, author_address) {
            return Err(RegistryError::Unauthorized {
                profile: author,
                caller: author_address.to_string(),
            });
        }
        if amount < self.minimum_vouch_amount {
            return Err(RegistryError::MinimumVouchAmount {
                amount,
                minimum: self.minimum_vouch_amount,
            });
        }
        if let Some(&existing) = self.active.get(&(author, subject)) {
            return Err(RegistryError::DuplicateVouch {
                author,
                subject,
                existing,
            });
        }

        let vault_is_empty = self.vaults.is_vault_empty(subject);
        let fees = self.fees.entry_fees(amount, vault_is_empty);

        // Snapshot the two ledgers this transition touches so any failure
        // below unwinds to exactly the pre-call state.
        let vault_snapshot = self.vaults.vault(subject).cloned();
        let escrow_before = self.escrow.balance(subject, &self.staking_asset);

        if let Err(e) = self.settle_entry(subject, author, &fees) {
            self.vaults.restore(subject, vault_snapshot);
            self.escrow
                .set_balance(subject, self.staking_asset.clone(), escrow_before);
            return Err(e);
        }

        let id = self.vouches.len() as VouchId;
        let vouch = Vouch::new(
            id,
            author,
            author_address,
            subject,
            self.staking_asset.clone(),
            comment,
            metadata,
            self.clock.now(),
        );
        self.vouches.push(vouch);
        self.active.insert((author, subject), id);

        tracing::info!(
            vouch_id = id,
            author,
            subject,
            amount,
            net_stake = fees.net_stake,
            incentive_donated = fees.incentive_fee,
            first_staker = vault_is_empty,
            "vouch created"
        );
        Ok(id)
    }

    /// Applies the entry split to the ledgers. Internal writes first, the
    /// external fee transfer last, so an outlet rejection aborts with
    /// nothing moved externally.
    fn settle_entry(
        &mut self,
        subject: ProfileId,
        author: ProfileId,
        fees: &EntryFees,
    ) -> Result<u64, RegistryError> {
        self.escrow
            .deposit(subject, self.staking_asset.clone(), fees.donation_fee)?;

        let vault = self.vaults.vault_mut_or_create(subject);
        if fees.incentive_fee > 0 {
            vault.donate(fees.incentive_fee)?;
        }
        let shares = vault.deposit(author, fees.net_stake)?;

        if fees.protocol_fee > 0 {
            self.outlet
                .transfer_out(&self.staking_asset, &self.fees.recipient, fees.protocol_fee)?;
        }
        Ok(shares)
    }

    /// Withdraws the author's entire stake behind this vouch and archives
    /// the record.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownVouch`] for an unknown id.
    /// - [`RegistryError::Unauthorized`] if the caller does not control the
    ///   vouch's author profile.
    /// - [`VouchError::AlreadyArchived`] if the vouch was already unvouched.
    pub fn unvouch(
        &mut self,
        vouch_id: VouchId,
        caller_address: &str,
    ) -> Result<UnvouchReceipt, RegistryError> {
        let now = self.clock.now();
        self.unvouch_at(vouch_id, caller_address, now)
    }

    /// Unvouches and immediately flags the vouch unhealthy, in one atomic
    /// transition. `unhealthy_at` equals `unvouched_at` exactly.
    pub fn unvouch_unhealthy(
        &mut self,
        vouch_id: VouchId,
        caller_address: &str,
    ) -> Result<UnvouchReceipt, RegistryError> {
        let now = self.clock.now();
        let receipt = self.unvouch_at(vouch_id, caller_address, now)?;

        let vouch = self
            .vouches
            .get_mut(vouch_id as usize)
            .expect("unvouch_at validated the id");
        // A vouch archived at `now` is inside its own grace window.
        vouch.flag_unhealthy(now)?;

        tracing::info!(vouch_id, "vouch marked unhealthy at withdrawal");
        Ok(receipt)
    }

    fn unvouch_at(
        &mut self,
        vouch_id: VouchId,
        caller_address: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<UnvouchReceipt, RegistryError> {
        let vouch = self
            .vouches
            .get(vouch_id as usize)
            .ok_or(RegistryError::UnknownVouch(vouch_id))?;
        if !self
            .directory
            .is_active_controller(vouch.author, caller_address)
        {
            return Err(RegistryError::Unauthorized {
                profile: vouch.author,
                caller: caller_address.to_string(),
            });
        }
        if !vouch.is_active() {
            return Err(VouchError::AlreadyArchived(vouch_id).into());
        }
        let author = vouch.author;
        let subject = vouch.subject;
        let asset = vouch.asset.clone();
        let author_address = vouch.author_address.clone();

        let vault_snapshot = self.vaults.vault(subject).cloned();
        let vault = self
            .vaults
            .vault_mut(subject)
            .expect("active vouch implies the subject vault exists");
        let shares = vault.max_redeem(author);
        let gross = vault.redeem(author, shares)?;
        let exit = self.fees.exit_fee(gross);

        if exit.fee > 0 {
            if let Err(e) = self
                .outlet
                .transfer_out(&asset, &self.fees.recipient, exit.fee)
            {
                self.vaults.restore(subject, vault_snapshot);
                return Err(e.into());
            }
        }
        if exit.net > 0 {
            if let Err(e) = self.outlet.transfer_out(&asset, &author_address, exit.net) {
                self.vaults.restore(subject, vault_snapshot);
                return Err(e.into());
            }
        }

        let vouch = self
            .vouches
            .get_mut(vouch_id as usize)
            .expect("validated above");
        vouch.archive(now)?;
        self.active.remove(&(author, subject));

        tracing::info!(
            vouch_id,
            author,
            subject,
            gross,
            exit_fee = exit.fee,
            net = exit.net,
            "vouch withdrawn"
        );
        Ok(UnvouchReceipt {
            vouch_id,
            gross,
            exit_fee: exit.fee,
            net: exit.net,
        })
    }

    /// Flags an unvouched vouch as unhealthy, within the 24-hour grace
    /// window after unvouching.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownVouch`] for an unknown id.
    /// - [`RegistryError::Unauthorized`] if the caller does not control the
    ///   author profile.
    /// - [`VouchError::CannotMarkUnhealthy`] if the vouch is still active,
    ///   already flagged, or the window has elapsed.
    pub fn mark_unhealthy(
        &mut self,
        vouch_id: VouchId,
        caller_address: &str,
    ) -> Result<(), RegistryError> {
        let now = self.clock.now();
        let author = self
            .vouches
            .get(vouch_id as usize)
            .ok_or(RegistryError::UnknownVouch(vouch_id))?
            .author;
        if !self.directory.is_active_controller(author, caller_address) {
            return Err(RegistryError::Unauthorized {
                profile: author,
                caller: caller_address.to_string(),
            });
        }

        self.vouches
            .get_mut(vouch_id as usize)
            .expect("validated above")
            .flag_unhealthy(now)?;

        tracing::info!(vouch_id, author, "vouch marked unhealthy");
        Ok(())
    }

    /// Slashes `profile` by `penalty` over the engine's pinned scale,
    /// across every vault the profile has staked into.
    pub fn slash(
        &mut self,
        profile: ProfileId,
        penalty: u64,
    ) -> Result<SlashEvent, RegistryError> {
        let now = self.clock.now();
        Ok(self.slasher.slash(&mut self.vaults, profile, penalty, now)?)
    }

    /// Withdraws from a profile's escrow balance to an external address.
    /// Controller-gated; see [`EscrowLedger::withdraw`].
    pub fn withdraw_escrow(
        &mut self,
        profile: ProfileId,
        caller_address: &str,
        asset: AssetKind,
        to: &str,
        amount: u64,
    ) -> Result<u64, RegistryError> {
        Ok(self.escrow.withdraw(
            profile,
            caller_address,
            asset,
            to,
            amount,
            self.directory.as_ref(),
            self.outlet.as_mut(),
        )?)
    }

    // -- Administration -----------------------------------------------------

    /// Sets one of the four fee rates. Ceiling-validated, atomic.
    pub fn set_fee_rate(&mut self, kind: FeeRateKind, bps: u64) -> Result<(), RegistryError> {
        self.fees.set_rate(kind, bps)?;
        tracing::info!(%kind, bps, "fee rate updated");
        Ok(())
    }

    /// Replaces the fee recipient address.
    pub fn set_fee_recipient(&mut self, recipient: impl Into<String>) {
        self.fees.set_recipient(recipient);
    }

    /// Raises or lowers the minimum vouch amount. Never below the protocol
    /// floor.
    pub fn set_minimum_vouch_amount(&mut self, amount: u64) -> Result<(), RegistryError> {
        if amount < ABSOLUTE_MINIMUM_VOUCH_AMOUNT {
            return Err(RegistryError::MinimumBelowFloor {
                requested: amount,
                floor: ABSOLUTE_MINIMUM_VOUCH_AMOUNT,
            });
        }
        self.minimum_vouch_amount = amount;
        Ok(())
    }

    // -- Read-only queries --------------------------------------------------

    /// The vouch record with this id, if any.
    pub fn vouch_record(&self, id: VouchId) -> Option<&Vouch> {
        self.vouches.get(id as usize)
    }

    /// Id of the active vouch from `author` to `subject`, if one exists.
    pub fn active_vouch_id(&self, author: ProfileId, subject: ProfileId) -> Option<VouchId> {
        self.active.get(&(author, subject)).copied()
    }

    /// Snapshot of the subject's vault (zeros if never created).
    pub fn vault_snapshot(&self, subject: ProfileId) -> VaultSnapshot {
        match self.vaults.vault(subject) {
            Some(v) => VaultSnapshot {
                total_assets: v.total_assets,
                total_shares: v.total_shares,
            },
            None => VaultSnapshot {
                total_assets: 0,
                total_shares: 0,
            },
        }
    }

    /// Asset amount `shares` would redeem for from the subject's vault.
    pub fn preview_redeem(&self, subject: ProfileId, shares: u64) -> u64 {
        self.vaults
            .vault(subject)
            .map_or(0, |v| v.preview_redeem(shares))
    }

    /// Shares `author` can redeem from the subject's vault.
    pub fn max_redeem(&self, subject: ProfileId, author: ProfileId) -> u64 {
        self.vaults.vault(subject).map_or(0, |v| v.max_redeem(author))
    }

    /// The profile's escrow balance in `asset`.
    pub fn escrow_balance(&self, profile: ProfileId, asset: &AssetKind) -> u64 {
        self.escrow.balance(profile, asset)
    }

    /// Total vouch records ever created, archived ones included.
    pub fn vouch_count(&self) -> usize {
        self.vouches.len()
    }

    /// Every vouch authored by `author`, oldest first.
    pub fn vouches_by_author(&self, author: ProfileId) -> Vec<&Vouch> {
        self.vouches.iter().filter(|v| v.author == author).collect()
    }

    /// Every vouch received by `subject`, oldest first.
    pub fn vouches_for_subject(&self, subject: ProfileId) -> Vec<&Vouch> {
        self.vouches.iter().filter(|v| v.subject == subject).collect()
    }

    /// The current fee configuration.
    pub fn fees(&self) -> &FeeConfig {
        &self.fees
    }

    /// The minimum vouch amount currently in force.
    pub fn minimum_vouch_amount(&self) -> u64 {
        self.minimum_vouch_amount
    }

    /// The asset this registry stakes.
    pub fn staking_asset(&self) -> &AssetKind {
        &self.staking_asset
    }

    /// Sum of `total_assets` across every vault.
    pub fn total_staked_assets(&self) -> u64 {
        self.vaults.total_assets()
    }

    /// Sum of all escrow balances held in the staking asset.
    pub fn total_escrowed(&self) -> u64 {
        self.escrow.total_in_asset(&self.staking_asset)
    }

    /// Every slash ever applied, in order.
    pub fn slash_history(&self) -> &[SlashEvent] {
        self.slasher.history()
    }

    /// Sum of assets seized by all slashes.
    pub fn total_seized(&self) -> u64 {
        self.slasher.total_seized()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ONE_STAKE_UNIT;
    use crate::directory::{InMemoryDirectory, RecordingOutlet};
    use chrono::{Duration, TimeZone, Utc};

    const ALICE: ProfileId = 1;
    const BOB: ProfileId = 2;
    const CAROL: ProfileId = 3;

    const TREASURY: &str = "aval:treasury";

    struct World {
        registry: VouchRegistry,
        outlet: RecordingOutlet,
        directory: InMemoryDirectory,
        clock: ManualClock,
    }

    /// Three profiles, the 100/100/300/100 bp fee schedule, manual clock.
    fn world() -> World {
        let directory = InMemoryDirectory::new();
        directory.register(ALICE, "aval:alice");
        directory.register(BOB, "aval:bob");
        directory.register(CAROL, "aval:carol");

        let outlet = RecordingOutlet::new();
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());

        let mut registry = VouchRegistry::new(
            AssetKind::Native,
            TREASURY,
            directory.clone(),
            outlet.clone(),
            clock.clone(),
        );
        registry
            .set_fee_rate(FeeRateKind::EntryProtocol, 100)
            .unwrap();
        registry
            .set_fee_rate(FeeRateKind::EntryDonation, 100)
            .unwrap();
        registry
            .set_fee_rate(FeeRateKind::EntryIncentive, 300)
            .unwrap();
        registry.set_fee_rate(FeeRateKind::Exit, 100).unwrap();

        World {
            registry,
            outlet,
            directory,
            clock,
        }
    }

    #[test]
    fn self_vouch_rejected() {
        let mut w = world();
        let result = w
            .registry
            .vouch(ALICE, "aval:alice", ALICE, ONE_STAKE_UNIT, "", "");
        assert!(matches!(
            result,
            Err(RegistryError::SelfVouch { author: ALICE })
        ));
        assert_eq!(w.registry.vouch_count(), 0);
    }

    #[test]
    fn unknown_profile_rejected() {
        let mut w = world();
        let result = w
            .registry
            .vouch(99, "aval:ghost", BOB, ONE_STAKE_UNIT, "", "");
        assert!(matches!(result, Err(RegistryError::ProfileNotFound(99))));

        let result = w
            .registry
            .vouch(ALICE, "aval:alice", 99, ONE_STAKE_UNIT, "", "");
        assert!(matches!(result, Err(RegistryError::ProfileNotFound(99))));
    }

    #[test]
    fn unauthorized_address_rejected() {
        let mut w = world();
        let result = w
            .registry
            .vouch(ALICE, "aval:mallory", BOB, ONE_STAKE_UNIT, "", "");
        assert!(matches!(
            result,
            Err(RegistryError::Unauthorized { profile: ALICE, .. })
        ));
    }

    #[test]
    fn below_minimum_rejected() {
        let mut w = world();
        let minimum = w.registry.minimum_vouch_amount();
        let result = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, minimum - 1, "", "");
        assert!(matches!(
            result,
            Err(RegistryError::MinimumVouchAmount { .. })
        ));
    }

    #[test]
    fn first_vouch_splits_fees_with_incentive_folded() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "solid", "")
            .unwrap();

        // 1% protocol fee out, 1% donation escrowed, incentive folded into
        // the stake because ALICE is the first staker.
        assert_eq!(w.outlet.total_to(TREASURY), 1_000_000);
        assert_eq!(
            w.registry.escrow_balance(BOB, &AssetKind::Native),
            1_000_000
        );
        let vault = w.registry.vault_snapshot(BOB);
        assert_eq!(vault.total_assets, 98_000_000);
        assert_eq!(vault.total_shares, 98_000_000);

        let vouch = w.registry.vouch_record(id).unwrap();
        assert!(vouch.is_active());
        assert_eq!(vouch.author, ALICE);
        assert_eq!(vouch.subject, BOB);
        assert_eq!(vouch.comment, "solid");
        assert_eq!(w.registry.active_vouch_id(ALICE, BOB), Some(id));
    }

    #[test]
    fn second_vouch_donates_incentive_to_existing_stakers() {
        let mut w = world();
        w.registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();

        let alice_before = w
            .registry
            .preview_redeem(BOB, w.registry.max_redeem(BOB, ALICE));
        assert_eq!(alice_before, 98_000_000);

        w.registry
            .vouch(CAROL, "aval:carol", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();

        // The 3% incentive was donated before CAROL's shares were minted,
        // so it accrues entirely to ALICE.
        let alice_after = w
            .registry
            .preview_redeem(BOB, w.registry.max_redeem(BOB, ALICE));
        assert_eq!(alice_after, 101_000_000);

        let vault = w.registry.vault_snapshot(BOB);
        assert_eq!(vault.total_assets, 196_000_000);
    }

    #[test]
    fn duplicate_active_vouch_rejected_and_state_unchanged() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();

        let vault_before = w.registry.vault_snapshot(BOB);
        let escrow_before = w.registry.escrow_balance(BOB, &AssetKind::Native);
        let transfers_before = w.outlet.transfers().len();

        let result = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "");
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateVouch {
                author: ALICE,
                subject: BOB,
                existing,
            }) if existing == id
        ));

        assert_eq!(w.registry.vault_snapshot(BOB), vault_before);
        assert_eq!(
            w.registry.escrow_balance(BOB, &AssetKind::Native),
            escrow_before
        );
        assert_eq!(w.outlet.transfers().len(), transfers_before);
        assert_eq!(w.registry.vouch_count(), 1);
    }

    #[test]
    fn failed_fee_transfer_unwinds_everything() {
        let mut w = world();
        w.outlet.set_failing(true);

        let result = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "");
        assert!(matches!(result, Err(RegistryError::Transfer(_))));

        assert_eq!(w.registry.vouch_count(), 0);
        assert_eq!(w.registry.vault_snapshot(BOB).total_assets, 0);
        assert_eq!(w.registry.escrow_balance(BOB, &AssetKind::Native), 0);
        assert!(w.outlet.transfers().is_empty());
    }

    #[test]
    fn unvouch_redeems_applies_exit_fee_and_archives() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();

        w.clock.advance(Duration::hours(2));
        let receipt = w.registry.unvouch(id, "aval:alice").unwrap();

        assert_eq!(receipt.gross, 98_000_000);
        assert_eq!(receipt.exit_fee, 980_000);
        assert_eq!(receipt.net, 97_020_000);
        assert_eq!(w.outlet.total_to("aval:alice"), 97_020_000);
        assert_eq!(w.outlet.total_to(TREASURY), 1_000_000 + 980_000);

        let vouch = w.registry.vouch_record(id).unwrap();
        assert!(vouch.archived);
        assert!(vouch.checkpoints.unvouched_at.is_some());
        assert_eq!(w.registry.active_vouch_id(ALICE, BOB), None);
        assert_eq!(w.registry.vault_snapshot(BOB).total_assets, 0);
    }

    #[test]
    fn unvouch_by_non_controller_rejected() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();

        let result = w.registry.unvouch(id, "aval:bob");
        assert!(matches!(result, Err(RegistryError::Unauthorized { .. })));
        assert!(w.registry.vouch_record(id).unwrap().is_active());
    }

    #[test]
    fn unvouch_twice_rejected() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();
        w.registry.unvouch(id, "aval:alice").unwrap();

        let result = w.registry.unvouch(id, "aval:alice");
        assert!(matches!(
            result,
            Err(RegistryError::Vouch(VouchError::AlreadyArchived(_)))
        ));
    }

    #[test]
    fn unvouch_reopens_the_pair_for_a_new_vouch() {
        let mut w = world();
        let first = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();
        w.registry.unvouch(first, "aval:alice").unwrap();

        let second = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(w.registry.active_vouch_id(ALICE, BOB), Some(second));
        // The archived record is history, never deleted.
        assert_eq!(w.registry.vouch_count(), 2);
        assert!(w.registry.vouch_record(first).unwrap().archived);
    }

    #[test]
    fn mark_unhealthy_within_grace_window() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();
        w.registry.unvouch(id, "aval:alice").unwrap();

        w.clock.advance(Duration::seconds(86_399));
        w.registry.mark_unhealthy(id, "aval:alice").unwrap();

        let vouch = w.registry.vouch_record(id).unwrap();
        assert!(vouch.unhealthy);
    }

    #[test]
    fn mark_unhealthy_after_grace_window_rejected() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();
        w.registry.unvouch(id, "aval:alice").unwrap();

        w.clock.advance(Duration::seconds(86_401));
        let result = w.registry.mark_unhealthy(id, "aval:alice");
        assert!(matches!(
            result,
            Err(RegistryError::Vouch(VouchError::CannotMarkUnhealthy { .. }))
        ));
    }

    #[test]
    fn unvouch_unhealthy_stamps_identical_checkpoints() {
        let mut w = world();
        let id = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();

        w.clock.advance(Duration::hours(5));
        w.registry.unvouch_unhealthy(id, "aval:alice").unwrap();

        let vouch = w.registry.vouch_record(id).unwrap();
        assert!(vouch.archived);
        assert!(vouch.unhealthy);
        assert_eq!(
            vouch.checkpoints.unvouched_at,
            vouch.checkpoints.unhealthy_at
        );
    }

    #[test]
    fn minimum_cannot_go_below_protocol_floor() {
        let mut w = world();
        let result = w
            .registry
            .set_minimum_vouch_amount(ABSOLUTE_MINIMUM_VOUCH_AMOUNT - 1);
        assert!(matches!(
            result,
            Err(RegistryError::MinimumBelowFloor { .. })
        ));

        w.registry
            .set_minimum_vouch_amount(5 * ONE_STAKE_UNIT)
            .unwrap();
        assert_eq!(w.registry.minimum_vouch_amount(), 5 * ONE_STAKE_UNIT);
    }

    #[test]
    fn slash_reaches_outgoing_vaults_through_the_registry() {
        let mut w = world();
        w.registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();
        w.registry
            .vouch(ALICE, "aval:alice", CAROL, ONE_STAKE_UNIT, "", "")
            .unwrap();

        let event = w.registry.slash(ALICE, 1_000).unwrap();
        assert_eq!(event.seizures.len(), 2);
        // 10% of each 98_000_000 vault.
        assert_eq!(event.total_seized, 19_600_000);
        assert_eq!(
            w.registry.vault_snapshot(BOB).total_assets,
            88_200_000
        );
        assert_eq!(w.registry.slash_history().len(), 1);
    }

    #[test]
    fn escrow_withdrawal_through_the_registry() {
        let mut w = world();
        w.registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "")
            .unwrap();

        // BOB withdraws the escrowed donation fee.
        let remaining = w
            .registry
            .withdraw_escrow(BOB, "aval:bob", AssetKind::Native, "aval:bob", 1_000_000)
            .unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(w.outlet.total_to("aval:bob"), 1_000_000);
    }

    #[test]
    fn deactivated_author_cannot_vouch() {
        let mut w = world();
        w.directory.deactivate(ALICE);

        let result = w
            .registry
            .vouch(ALICE, "aval:alice", BOB, ONE_STAKE_UNIT, "", "");
        assert!(matches!(
            result,
            Err(RegistryError::ProfileNotFound(ALICE))
        ));
    }
}
