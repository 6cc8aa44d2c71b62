//! # Slash Engine
//!
//! Slashing punishes a profile through its *outgoing* stakes: every vault
//! the profile currently holds shares in (as an author) loses a proportional
//! cut of its total assets, with share supplies untouched. Lowering the
//! assets-per-share rate spreads the loss across every co-staker in those
//! vaults, not just the punished profile -- that is the cost of shared trust
//! exposure, by design of the protocol's economics.
//!
//! Penalties are expressed over a *pinned scale* rather than a hard-coded
//! basis-point denominator. Deployments that count penalties in percent or
//! over 50_000 re-pin the scale at construction; the arithmetic is
//! unchanged. Repeated slashes compound multiplicatively: two 10% slashes
//! leave 81% of the original assets, not 80%.
//!
//! Every slash is recorded as a [`SlashEvent`] with the per-vault amounts
//! seized, so downstream accounting (and the conservation tests) can track
//! exactly how much value left the vaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::DEFAULT_SLASH_SCALE;
use crate::vault::VaultBook;
use crate::ProfileId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while slashing.
#[derive(Debug, Error)]
pub enum SlashError {
    /// The penalty exceeds the engine's scale (more than 100%).
    #[error("penalty {penalty} exceeds slash scale {scale}")]
    PenaltyExceedsScale {
        /// The requested penalty.
        penalty: u64,
        /// The engine's pinned denominator.
        scale: u64,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Assets seized from one vault during a slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSeizure {
    /// The subject whose vault was reduced.
    pub subject: ProfileId,
    /// Asset units removed from that vault.
    pub amount: u64,
}

/// Audit record of one applied slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashEvent {
    /// Unique id for this event.
    pub id: Uuid,
    /// The profile that was punished.
    pub profile: ProfileId,
    /// Penalty numerator, over `scale`.
    pub penalty: u64,
    /// Denominator the penalty was applied over.
    pub scale: u64,
    /// Per-vault amounts seized, ordered by subject id.
    pub seizures: Vec<VaultSeizure>,
    /// Sum of all seized amounts.
    pub total_seized: u64,
    /// When the slash was applied (externally supplied clock).
    pub occurred_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SlashEngine
// ---------------------------------------------------------------------------

/// Applies proportional penalties and keeps the audit trail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlashEngine {
    scale: u64,
    history: Vec<SlashEvent>,
}

impl SlashEngine {
    /// Creates an engine with the default basis-point scale.
    pub fn new() -> Self {
        Self::with_scale(DEFAULT_SLASH_SCALE)
    }

    /// Creates an engine with a pinned penalty denominator.
    pub fn with_scale(scale: u64) -> Self {
        Self {
            scale,
            history: Vec::new(),
        }
    }

    /// The pinned penalty denominator.
    pub fn scale(&self) -> u64 {
        self.scale
    }

    /// Slashes `profile` by `penalty / scale` across every vault it holds
    /// shares in.
    ///
    /// Each affected vault loses `total_assets * penalty / scale` (rounded
    /// down), with shares untouched. A profile holding no shares anywhere
    /// produces an event with no seizures; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SlashError::PenaltyExceedsScale`] if `penalty > scale`;
    /// no vault is touched in that case.
    pub fn slash(
        &mut self,
        book: &mut VaultBook,
        profile: ProfileId,
        penalty: u64,
        now: DateTime<Utc>,
    ) -> Result<SlashEvent, SlashError> {
        if penalty > self.scale {
            return Err(SlashError::PenaltyExceedsScale {
                penalty,
                scale: self.scale,
            });
        }

        let mut seizures = Vec::new();
        let mut total_seized = 0u64;

        for subject in book.subjects_staked_by(profile) {
            let vault = book
                .vault_mut(subject)
                .expect("subjects_staked_by returned a missing vault");
            let amount = (vault.total_assets as u128 * penalty as u128 / self.scale as u128) as u64;
            if amount == 0 {
                continue;
            }
            // amount <= total_assets because penalty <= scale.
            vault
                .seize(amount)
                .expect("floor-scaled seizure cannot exceed vault assets");
            seizures.push(VaultSeizure { subject, amount });
            total_seized += amount;
        }

        let event = SlashEvent {
            id: Uuid::new_v4(),
            profile,
            penalty,
            scale: self.scale,
            seizures,
            total_seized,
            occurred_at: now,
        };

        tracing::warn!(
            profile,
            penalty,
            scale = self.scale,
            total_seized,
            vaults = event.seizures.len(),
            "slash applied"
        );

        self.history.push(event.clone());
        Ok(event)
    }

    /// All slash events, in application order.
    pub fn history(&self) -> &[SlashEvent] {
        &self.history
    }

    /// Slash events that punished `profile`.
    pub fn events_for(&self, profile: ProfileId) -> Vec<&SlashEvent> {
        self.history.iter().filter(|e| e.profile == profile).collect()
    }

    /// Sum of assets seized across all slashes ever applied.
    pub fn total_seized(&self) -> u64 {
        self.history.iter().map(|e| e.total_seized).sum()
    }
}

impl Default for SlashEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ALICE: ProfileId = 1;
    const BOB: ProfileId = 2;
    const SUBJECT: ProfileId = 10;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn two_holder_book() -> VaultBook {
        let mut book = VaultBook::new();
        let vault = book.vault_mut_or_create(SUBJECT);
        vault.deposit(ALICE, 60).unwrap();
        vault.deposit(BOB, 40).unwrap();
        book
    }

    #[test]
    fn slash_reduces_every_holder_proportionally() {
        let mut book = two_holder_book();
        let mut engine = SlashEngine::new();

        let event = engine.slash(&mut book, ALICE, 1_000, now()).unwrap();

        let vault = book.vault(SUBJECT).unwrap();
        assert_eq!(vault.total_assets, 90);
        assert_eq!(vault.total_shares, 100);
        // Both holders drop by exactly 10%, not just the slashed author.
        assert_eq!(vault.preview_redeem(vault.shares_of(ALICE)), 54);
        assert_eq!(vault.preview_redeem(vault.shares_of(BOB)), 36);

        assert_eq!(event.total_seized, 10);
        assert_eq!(
            event.seizures,
            vec![VaultSeizure {
                subject: SUBJECT,
                amount: 10
            }]
        );
    }

    #[test]
    fn slash_hits_every_vault_the_profile_stakes_in() {
        let mut book = VaultBook::new();
        book.vault_mut_or_create(10).deposit(ALICE, 1_000).unwrap();
        book.vault_mut_or_create(20).deposit(ALICE, 500).unwrap();
        book.vault_mut_or_create(30).deposit(BOB, 700).unwrap();

        let mut engine = SlashEngine::new();
        let event = engine.slash(&mut book, ALICE, 2_000, now()).unwrap();

        assert_eq!(book.vault(10).unwrap().total_assets, 800);
        assert_eq!(book.vault(20).unwrap().total_assets, 400);
        // BOB's vault is not ALICE's outgoing stake; untouched.
        assert_eq!(book.vault(30).unwrap().total_assets, 700);
        assert_eq!(event.total_seized, 300);
    }

    #[test]
    fn repeated_slashes_compound_multiplicatively() {
        let mut book = VaultBook::new();
        book.vault_mut_or_create(SUBJECT)
            .deposit(ALICE, 10_000)
            .unwrap();

        let mut engine = SlashEngine::new();
        engine.slash(&mut book, ALICE, 1_000, now()).unwrap();
        engine.slash(&mut book, ALICE, 1_000, now()).unwrap();

        // 10_000 * 0.9 * 0.9 = 8_100, not 8_000.
        assert_eq!(book.vault(SUBJECT).unwrap().total_assets, 8_100);
        assert_eq!(engine.total_seized(), 1_900);
    }

    #[test]
    fn slash_with_no_outgoing_stakes_is_an_empty_event() {
        let mut book = two_holder_book();
        let mut engine = SlashEngine::new();

        let event = engine.slash(&mut book, 99, 5_000, now()).unwrap();
        assert!(event.seizures.is_empty());
        assert_eq!(event.total_seized, 0);
        assert_eq!(book.vault(SUBJECT).unwrap().total_assets, 100);
    }

    #[test]
    fn penalty_above_scale_rejected() {
        let mut book = two_holder_book();
        let mut engine = SlashEngine::new();

        let result = engine.slash(&mut book, ALICE, 10_001, now());
        assert!(matches!(
            result,
            Err(SlashError::PenaltyExceedsScale {
                penalty: 10_001,
                scale: 10_000,
            })
        ));
        assert_eq!(book.vault(SUBJECT).unwrap().total_assets, 100);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn full_slash_empties_assets_but_keeps_shares() {
        let mut book = two_holder_book();
        let mut engine = SlashEngine::new();

        engine.slash(&mut book, ALICE, 10_000, now()).unwrap();

        let vault = book.vault(SUBJECT).unwrap();
        assert_eq!(vault.total_assets, 0);
        assert_eq!(vault.total_shares, 100);
        assert_eq!(vault.preview_redeem(vault.shares_of(BOB)), 0);
    }

    #[test]
    fn custom_scale_changes_the_denominator() {
        let mut book = two_holder_book();
        // Percent scale: a penalty of 10 means 10%.
        let mut engine = SlashEngine::with_scale(100);

        let event = engine.slash(&mut book, ALICE, 10, now()).unwrap();
        assert_eq!(event.total_seized, 10);
        assert_eq!(book.vault(SUBJECT).unwrap().total_assets, 90);
    }

    #[test]
    fn history_is_queryable_per_profile() {
        let mut book = two_holder_book();
        let mut engine = SlashEngine::new();

        engine.slash(&mut book, ALICE, 100, now()).unwrap();
        engine.slash(&mut book, BOB, 200, now()).unwrap();
        engine.slash(&mut book, ALICE, 300, now()).unwrap();

        assert_eq!(engine.history().len(), 3);
        assert_eq!(engine.events_for(ALICE).len(), 2);
        assert_eq!(engine.events_for(BOB).len(), 1);
    }
}
