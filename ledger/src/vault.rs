//! # Stake Vault -- Share-Based Stake Accounting
//!
//! Each subject profile that receives vouches gets one [`StakeVault`]: a
//! ledger of `total_assets`, `total_shares`, and per-author share holdings.
//! Authors deposit asset amounts and are minted shares at the current
//! exchange rate; redeeming converts shares back at the rate in force at
//! that moment.
//!
//! The exchange rate is what makes the protocol's economics work with no
//! per-holder bookkeeping:
//!
//! - **Donations** add assets without minting shares, raising the
//!   assets-per-share rate for every existing holder at once. This is how
//!   incentive fees from new stakes reach earlier stakers.
//! - **Seizures** (slashing) remove assets without burning shares, lowering
//!   the rate for every holder at once. Everyone staked behind a punished
//!   vault absorbs a proportional cut.
//!
//! All conversions round down in `u128` intermediates. The remainder of any
//! division stays in the vault: value can be stranded as dust, never
//! fabricated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::ProfileId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Attempted to redeem more shares than the holder owns.
    #[error("insufficient shares: holder {holder} owns {available}, requested {requested}")]
    InsufficientShares {
        /// The holder whose shares were being redeemed.
        holder: ProfileId,
        /// Shares the holder actually owns in this vault.
        available: u64,
        /// Shares that were requested.
        requested: u64,
    },

    /// An asset-side total would exceed `u64::MAX`.
    #[error("vault asset overflow: current {current}, add {add}")]
    AssetOverflow {
        /// Total assets before the failed operation.
        current: u64,
        /// Amount that caused the overflow.
        add: u64,
    },

    /// A share mint would exceed `u64::MAX`.
    ///
    /// Only reachable on a heavily slashed vault, where the share supply
    /// dwarfs the remaining assets and the mint formula amplifies deposits.
    #[error("vault share overflow minting for deposit of {assets}")]
    ShareOverflow {
        /// The deposit that could not be expressed in shares.
        assets: u64,
    },

    /// Donated into a vault with no shares outstanding.
    ///
    /// There is no holder to benefit; callers must apply the first-staker
    /// guard before donating.
    #[error("donation into an empty vault")]
    DonationToEmptyVault,

    /// Seizure larger than the vault's total assets.
    #[error("seizure of {requested} exceeds vault assets {available}")]
    SeizureExceedsAssets {
        /// Total assets currently in the vault.
        available: u64,
        /// Amount the seizure requested.
        requested: u64,
    },
}

/// `value * numerator / denominator` in `u128`, rounded down.
///
/// `None` when the denominator is zero or the result does not fit in `u64`.
fn mul_div_floor(value: u64, numerator: u64, denominator: u64) -> Option<u64> {
    if denominator == 0 {
        return None;
    }
    let wide = value as u128 * numerator as u128 / denominator as u128;
    u64::try_from(wide).ok()
}

// ---------------------------------------------------------------------------
// StakeVault
// ---------------------------------------------------------------------------

/// Share-based stake ledger for a single subject profile.
///
/// Invariants maintained by the operations below:
///
/// - Under deposit/redeem flow alone, `total_shares == 0` iff
///   `total_assets == 0`.
/// - `sum(holdings.values()) == total_shares` at all times.
/// - The sum over holders of their redeemable assets never exceeds
///   `total_assets`; the difference is rounding dust owned by the vault.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeVault {
    /// Total asset units held by the vault.
    pub total_assets: u64,
    /// Total share units outstanding.
    pub total_shares: u64,
    /// Shares held per author profile.
    holdings: HashMap<ProfileId, u64>,
}

impl StakeVault {
    /// Creates an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no shares are outstanding.
    pub fn is_empty(&self) -> bool {
        self.total_shares == 0
    }

    /// Shares held by `holder` in this vault (zero if none).
    pub fn shares_of(&self, holder: ProfileId) -> u64 {
        self.holdings.get(&holder).copied().unwrap_or(0)
    }

    /// Iterates over `(holder, shares)` pairs.
    pub fn holders(&self) -> impl Iterator<Item = (ProfileId, u64)> + '_ {
        self.holdings.iter().map(|(h, s)| (*h, *s))
    }

    /// Deposits `assets` and mints shares to `holder` at the current
    /// exchange rate.
    ///
    /// An empty vault bootstraps at 1:1 -- the first depositor's shares
    /// equal their assets. Afterwards the mint is
    /// `assets * total_shares / total_assets`, rounded down; the remainder
    /// of the division stays with the vault.
    ///
    /// Depositing zero assets is a deliberate no-op: it mints zero shares
    /// and leaves both totals untouched, preserving the empty-vault
    /// invariant at bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AssetOverflow`] or [`VaultError::ShareOverflow`]
    /// if either total would exceed `u64::MAX`, or if shares are outstanding
    /// against zero assets (a fully slashed vault has no defined exchange
    /// rate; deposits resume once its shares drain out). On error nothing is
    /// mutated.
    pub fn deposit(&mut self, holder: ProfileId, assets: u64) -> Result<u64, VaultError> {
        if assets == 0 {
            return Ok(0);
        }

        let minted = if self.total_shares == 0 {
            assets
        } else {
            mul_div_floor(assets, self.total_shares, self.total_assets)
                .ok_or(VaultError::ShareOverflow { assets })?
        };

        let new_assets = self
            .total_assets
            .checked_add(assets)
            .ok_or(VaultError::AssetOverflow {
                current: self.total_assets,
                add: assets,
            })?;
        let new_shares = self
            .total_shares
            .checked_add(minted)
            .ok_or(VaultError::ShareOverflow { assets })?;

        self.total_assets = new_assets;
        self.total_shares = new_shares;
        *self.holdings.entry(holder).or_insert(0) += minted;

        Ok(minted)
    }

    /// Adds `assets` to the vault without minting shares, raising the
    /// exchange rate for every existing holder pro rata.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DonationToEmptyVault`] when no shares are
    /// outstanding, and [`VaultError::AssetOverflow`] on overflow.
    pub fn donate(&mut self, assets: u64) -> Result<(), VaultError> {
        if self.is_empty() {
            return Err(VaultError::DonationToEmptyVault);
        }

        self.total_assets = self
            .total_assets
            .checked_add(assets)
            .ok_or(VaultError::AssetOverflow {
                current: self.total_assets,
                add: assets,
            })?;
        Ok(())
    }

    /// Asset amount `shares` would redeem for right now, rounded down.
    ///
    /// Pure. Bit-identical to what [`redeem`](Self::redeem) of the same
    /// share count would return with no intervening state change.
    pub fn preview_redeem(&self, shares: u64) -> u64 {
        if self.total_shares == 0 {
            return 0;
        }
        // shares <= total_shares in every reachable call, so the result
        // fits in u64; an out-of-range query clamps to the vault total.
        mul_div_floor(shares, self.total_assets, self.total_shares).unwrap_or(self.total_assets)
    }

    /// Maximum shares `holder` can redeem: their full holding.
    pub fn max_redeem(&self, holder: ProfileId) -> u64 {
        self.shares_of(holder)
    }

    /// Burns `shares` from `holder` and returns the redeemed asset amount.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InsufficientShares`] if `shares` exceeds the
    /// holder's balance. On error nothing is mutated.
    pub fn redeem(&mut self, holder: ProfileId, shares: u64) -> Result<u64, VaultError> {
        let available = self.shares_of(holder);
        if shares > available {
            return Err(VaultError::InsufficientShares {
                holder,
                available,
                requested: shares,
            });
        }
        if shares == 0 {
            return Ok(0);
        }

        let assets = self.preview_redeem(shares);

        // shares <= holder balance <= total_shares, and the floor above
        // guarantees assets <= total_assets.
        self.total_assets -= assets;
        self.total_shares -= shares;

        let remaining = available - shares;
        if remaining == 0 {
            self.holdings.remove(&holder);
        } else {
            self.holdings.insert(holder, remaining);
        }

        Ok(assets)
    }

    /// Removes `assets` from the vault without burning shares, lowering the
    /// exchange rate for every holder pro rata. The slashing primitive.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SeizureExceedsAssets`] if `assets` exceeds the
    /// vault total.
    pub fn seize(&mut self, assets: u64) -> Result<(), VaultError> {
        if assets > self.total_assets {
            return Err(VaultError::SeizureExceedsAssets {
                available: self.total_assets,
                requested: assets,
            });
        }
        self.total_assets -= assets;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// VaultBook
// ---------------------------------------------------------------------------

/// All stake vaults, keyed by subject profile.
///
/// Vaults are created lazily on the first deposit into a subject and are
/// never removed -- an emptied vault keeps its id so later vouches rejoin
/// the same record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VaultBook {
    vaults: HashMap<ProfileId, StakeVault>,
}

impl VaultBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the subject's vault, if one was ever created.
    pub fn vault(&self, subject: ProfileId) -> Option<&StakeVault> {
        self.vaults.get(&subject)
    }

    /// Returns the subject's vault, creating an empty one if absent.
    pub fn vault_mut_or_create(&mut self, subject: ProfileId) -> &mut StakeVault {
        self.vaults.entry(subject).or_default()
    }

    /// Returns `true` if the subject's vault has no shares outstanding
    /// (or does not exist yet).
    pub fn is_vault_empty(&self, subject: ProfileId) -> bool {
        self.vaults.get(&subject).map_or(true, StakeVault::is_empty)
    }

    /// Subjects whose vaults `author` currently holds shares in.
    pub fn subjects_staked_by(&self, author: ProfileId) -> Vec<ProfileId> {
        let mut subjects: Vec<ProfileId> = self
            .vaults
            .iter()
            .filter(|(_, vault)| vault.shares_of(author) > 0)
            .map(|(subject, _)| *subject)
            .collect();
        subjects.sort_unstable();
        subjects
    }

    /// Mutable access to a subject's vault, if present.
    pub fn vault_mut(&mut self, subject: ProfileId) -> Option<&mut StakeVault> {
        self.vaults.get_mut(&subject)
    }

    /// Sum of `total_assets` over every vault.
    pub fn total_assets(&self) -> u64 {
        self.vaults.values().map(|v| v.total_assets).sum()
    }

    /// Number of vaults ever created.
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    /// Returns `true` if no vault was ever created.
    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// Reinstates a snapshot taken before a failed transition. `None`
    /// removes the vault (it did not exist at snapshot time).
    pub(crate) fn restore(&mut self, subject: ProfileId, snapshot: Option<StakeVault>) {
        match snapshot {
            Some(vault) => {
                self.vaults.insert(subject, vault);
            }
            None => {
                self.vaults.remove(&subject);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: ProfileId = 1;
    const BOB: ProfileId = 2;

    #[test]
    fn first_deposit_bootstraps_one_to_one() {
        let mut vault = StakeVault::new();
        let minted = vault.deposit(ALICE, 98_000_000).unwrap();

        assert_eq!(minted, 98_000_000);
        assert_eq!(vault.total_assets, 98_000_000);
        assert_eq!(vault.total_shares, 98_000_000);
        assert_eq!(vault.shares_of(ALICE), 98_000_000);
    }

    #[test]
    fn zero_deposit_is_a_noop_on_empty_vault() {
        let mut vault = StakeVault::new();
        let minted = vault.deposit(ALICE, 0).unwrap();

        assert_eq!(minted, 0);
        assert_eq!(vault.total_assets, 0);
        assert_eq!(vault.total_shares, 0);
        assert!(vault.is_empty());
        assert_eq!(vault.shares_of(ALICE), 0);
    }

    #[test]
    fn zero_deposit_is_a_noop_on_funded_vault() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 1_000).unwrap();
        let before = vault.clone();

        assert_eq!(vault.deposit(BOB, 0).unwrap(), 0);
        assert_eq!(vault, before);
    }

    #[test]
    fn second_deposit_mints_at_current_rate() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 100).unwrap();
        // Donation doubles the rate: 100 shares now back 200 assets.
        vault.donate(100).unwrap();

        let minted = vault.deposit(BOB, 100).unwrap();
        // 100 * 100 / 200 = 50 shares.
        assert_eq!(minted, 50);
        assert_eq!(vault.total_assets, 300);
        assert_eq!(vault.total_shares, 150);
    }

    #[test]
    fn mint_rounds_down_in_favor_of_the_vault() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 101_000_000).unwrap();
        vault.donate(1).unwrap(); // rate is now slightly above 1:1

        let minted = vault.deposit(BOB, 95_000_000).unwrap();
        // 95_000_000 * 101_000_000 / 101_000_001 rounds down.
        assert_eq!(minted, 94_999_999);
    }

    #[test]
    fn donation_raises_every_holder_preview() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 600).unwrap();
        vault.deposit(BOB, 400).unwrap();

        let alice_before = vault.preview_redeem(vault.shares_of(ALICE));
        let bob_before = vault.preview_redeem(vault.shares_of(BOB));

        vault.donate(100).unwrap();

        let alice_after = vault.preview_redeem(vault.shares_of(ALICE));
        let bob_after = vault.preview_redeem(vault.shares_of(BOB));

        assert!(alice_after > alice_before);
        assert!(bob_after > bob_before);
        // Pro rata: 60% and 40% of the donation.
        assert_eq!(alice_after, 660);
        assert_eq!(bob_after, 440);
    }

    #[test]
    fn donation_into_empty_vault_rejected() {
        let mut vault = StakeVault::new();
        assert!(matches!(
            vault.donate(100),
            Err(VaultError::DonationToEmptyVault)
        ));
        assert_eq!(vault.total_assets, 0);
    }

    #[test]
    fn redeem_more_than_held_rejected() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 100).unwrap();

        let result = vault.redeem(ALICE, 101);
        assert!(matches!(
            result,
            Err(VaultError::InsufficientShares {
                available: 100,
                requested: 101,
                ..
            })
        ));
        assert_eq!(vault.total_assets, 100);
        assert_eq!(vault.total_shares, 100);
    }

    #[test]
    fn preview_matches_immediate_redeem_exactly() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 98_000_000).unwrap();
        vault.donate(3_000_000).unwrap();
        vault.deposit(BOB, 95_000_000).unwrap();

        for holder in [ALICE, BOB] {
            let shares = vault.max_redeem(holder);
            let previewed = vault.preview_redeem(shares);
            // Pure previews are idempotent.
            assert_eq!(previewed, vault.preview_redeem(shares));

            let mut fork = vault.clone();
            let redeemed = fork.redeem(holder, shares).unwrap();
            assert_eq!(redeemed, previewed);
        }
    }

    #[test]
    fn full_exit_drains_vault_to_zero() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 600).unwrap();
        vault.deposit(BOB, 400).unwrap();
        vault.donate(57).unwrap(); // force awkward rounding

        let alice_out = vault.redeem(ALICE, vault.max_redeem(ALICE)).unwrap();
        let bob_out = vault.redeem(BOB, vault.max_redeem(BOB)).unwrap();

        // Last redeemer sweeps the rounding dust: both totals hit zero.
        assert_eq!(vault.total_assets, 0);
        assert_eq!(vault.total_shares, 0);
        assert_eq!(alice_out + bob_out, 1_057);
        assert_eq!(vault.shares_of(ALICE), 0);
        assert_eq!(vault.shares_of(BOB), 0);
    }

    #[test]
    fn holder_previews_never_exceed_total_assets() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 333).unwrap();
        vault.donate(100).unwrap();
        vault.deposit(BOB, 217).unwrap();

        let sum: u64 = [ALICE, BOB]
            .iter()
            .map(|h| vault.preview_redeem(vault.shares_of(*h)))
            .sum();
        assert!(sum <= vault.total_assets);
    }

    #[test]
    fn seize_lowers_rate_without_burning_shares() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 60).unwrap();
        vault.deposit(BOB, 40).unwrap();

        vault.seize(10).unwrap();

        assert_eq!(vault.total_assets, 90);
        assert_eq!(vault.total_shares, 100);
        assert_eq!(vault.preview_redeem(vault.shares_of(ALICE)), 54);
        assert_eq!(vault.preview_redeem(vault.shares_of(BOB)), 36);
    }

    #[test]
    fn seize_beyond_assets_rejected() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 100).unwrap();

        assert!(matches!(
            vault.seize(101),
            Err(VaultError::SeizureExceedsAssets { .. })
        ));
        assert_eq!(vault.total_assets, 100);
    }

    #[test]
    fn deposit_overflow_leaves_vault_unchanged() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, u64::MAX).unwrap();
        let before = vault.clone();

        assert!(matches!(
            vault.deposit(BOB, 1),
            Err(VaultError::AssetOverflow { .. })
        ));
        assert_eq!(vault, before);
    }

    #[test]
    fn book_creates_vaults_lazily() {
        let mut book = VaultBook::new();
        assert!(book.is_vault_empty(7));
        assert!(book.vault(7).is_none());

        book.vault_mut_or_create(7).deposit(ALICE, 100).unwrap();
        assert!(!book.is_vault_empty(7));
        assert_eq!(book.vault(7).unwrap().total_assets, 100);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn book_finds_subjects_staked_by_author() {
        let mut book = VaultBook::new();
        book.vault_mut_or_create(10).deposit(ALICE, 100).unwrap();
        book.vault_mut_or_create(20).deposit(ALICE, 50).unwrap();
        book.vault_mut_or_create(30).deposit(BOB, 75).unwrap();

        assert_eq!(book.subjects_staked_by(ALICE), vec![10, 20]);
        assert_eq!(book.subjects_staked_by(BOB), vec![30]);
        assert_eq!(book.total_assets(), 225);
    }

    #[test]
    fn book_restore_reinstates_or_removes() {
        let mut book = VaultBook::new();
        book.vault_mut_or_create(7).deposit(ALICE, 100).unwrap();
        let snapshot = book.vault(7).cloned();

        book.vault_mut(7).unwrap().deposit(BOB, 900).unwrap();
        book.restore(7, snapshot);
        assert_eq!(book.vault(7).unwrap().total_assets, 100);

        book.restore(7, None);
        assert!(book.vault(7).is_none());
    }

    #[test]
    fn vault_serialization_roundtrip() {
        let mut vault = StakeVault::new();
        vault.deposit(ALICE, 600).unwrap();
        vault.deposit(BOB, 400).unwrap();

        let json = serde_json::to_string(&vault).expect("serialize");
        let recovered: StakeVault = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(vault, recovered);
    }
}
