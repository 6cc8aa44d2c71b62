//! # Fee Engine
//!
//! Four independently configurable basis-point rates govern the protocol's
//! take: three on the way in (protocol, donation, incentive) and one on the
//! way out (exit). The sum of all four can never exceed the ceiling of
//! 10_000 bp -- enforced on every mutation, not at use, so a bad
//! configuration is unrepresentable.
//!
//! Splits always round down; `net = amount - fees` by construction, so the
//! pieces recompose to the original amount exactly and value conservation
//! costs nothing to prove.
//!
//! The one subtlety is the **first-staker exemption**: the incentive fee
//! exists to reward *earlier* stakers, so when the destination vault has no
//! shares outstanding there is no one to reward, and the incentive cut is
//! folded back into the depositor's net stake. The guard is an explicit
//! parameter here rather than a special case buried in the registry, so it
//! is independently testable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{BASIS_POINTS, FEE_CEILING_BPS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while mutating the fee configuration.
#[derive(Debug, Error)]
pub enum FeeError {
    /// The new rate would push the sum of all four rates over the ceiling.
    #[error("fee ceiling exceeded: rates would total {attempted_total} bp, ceiling {ceiling} bp")]
    CeilingExceeded {
        /// Sum of the four rates had the mutation been applied.
        attempted_total: u64,
        /// The fixed ceiling.
        ceiling: u64,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The four configurable fee rates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRateKind {
    /// Entry fee transferred to the protocol fee recipient.
    EntryProtocol,
    /// Entry fee escrowed for the subject profile.
    EntryDonation,
    /// Entry fee donated to the subject's vault for earlier stakers.
    EntryIncentive,
    /// Exit fee taken from redeemed stakes, to the fee recipient.
    Exit,
}

impl fmt::Display for FeeRateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeRateKind::EntryProtocol => write!(f, "entry-protocol"),
            FeeRateKind::EntryDonation => write!(f, "entry-donation"),
            FeeRateKind::EntryIncentive => write!(f, "entry-incentive"),
            FeeRateKind::Exit => write!(f, "exit"),
        }
    }
}

/// Breakdown of an entry (vouch) amount.
///
/// `protocol_fee + donation_fee + incentive_fee + net_stake` always equals
/// the original amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFees {
    /// Transferred out to the fee recipient.
    pub protocol_fee: u64,
    /// Escrowed for the subject.
    pub donation_fee: u64,
    /// Donated to the subject's vault. Zero when the first-staker exemption
    /// applied (the cut is folded into `net_stake` instead).
    pub incentive_fee: u64,
    /// Deposited into the vault as the author's stake.
    pub net_stake: u64,
}

impl EntryFees {
    /// Recomposes the original amount.
    pub fn gross(&self) -> u64 {
        self.protocol_fee + self.donation_fee + self.incentive_fee + self.net_stake
    }
}

/// Breakdown of an exit (unvouch) amount. `fee + net` equals the original.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitFee {
    /// Transferred out to the fee recipient.
    pub fee: u64,
    /// Returned to the author.
    pub net: u64,
}

/// `amount * rate_bps / 10_000`, rounded down.
fn bps_of(amount: u64, rate_bps: u64) -> u64 {
    (amount as u128 * rate_bps as u128 / BASIS_POINTS as u128) as u64
}

// ---------------------------------------------------------------------------
// FeeConfig
// ---------------------------------------------------------------------------

/// The process-wide fee configuration: four rates and a recipient.
///
/// Owned by the registry; all mutations funnel through the validated
/// setters here. A failed mutation leaves the previous rates fully intact
/// -- there is no partially applied state for readers to observe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    entry_protocol_bps: u64,
    entry_donation_bps: u64,
    entry_incentive_bps: u64,
    exit_bps: u64,
    /// Address that receives protocol and exit fees.
    pub recipient: String,
}

impl FeeConfig {
    /// Creates a configuration with all rates at zero.
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            entry_protocol_bps: 0,
            entry_donation_bps: 0,
            entry_incentive_bps: 0,
            exit_bps: 0,
            recipient: recipient.into(),
        }
    }

    /// Returns the current rate for `kind`, in basis points.
    pub fn rate(&self, kind: FeeRateKind) -> u64 {
        match kind {
            FeeRateKind::EntryProtocol => self.entry_protocol_bps,
            FeeRateKind::EntryDonation => self.entry_donation_bps,
            FeeRateKind::EntryIncentive => self.entry_incentive_bps,
            FeeRateKind::Exit => self.exit_bps,
        }
    }

    /// Sum of all four rates, in basis points.
    pub fn total_bps(&self) -> u64 {
        self.entry_protocol_bps + self.entry_donation_bps + self.entry_incentive_bps + self.exit_bps
    }

    /// Sets the rate for `kind`, validating the ceiling first.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::CeilingExceeded`] if the four rates would sum
    /// past [`FEE_CEILING_BPS`]; the configuration is untouched in that
    /// case.
    pub fn set_rate(&mut self, kind: FeeRateKind, bps: u64) -> Result<(), FeeError> {
        let attempted_total = self.total_bps() - self.rate(kind) + bps;
        if attempted_total > FEE_CEILING_BPS {
            return Err(FeeError::CeilingExceeded {
                attempted_total,
                ceiling: FEE_CEILING_BPS,
            });
        }

        match kind {
            FeeRateKind::EntryProtocol => self.entry_protocol_bps = bps,
            FeeRateKind::EntryDonation => self.entry_donation_bps = bps,
            FeeRateKind::EntryIncentive => self.entry_incentive_bps = bps,
            FeeRateKind::Exit => self.exit_bps = bps,
        }
        Ok(())
    }

    /// Replaces the fee recipient address.
    pub fn set_recipient(&mut self, recipient: impl Into<String>) {
        self.recipient = recipient.into();
    }

    /// Splits an entry amount into the three entry fees and the net stake.
    ///
    /// `vault_is_empty` is the first-staker guard: when the destination
    /// vault has no shares outstanding, the incentive cut is folded back
    /// into `net_stake` and reported as zero.
    pub fn entry_fees(&self, amount: u64, vault_is_empty: bool) -> EntryFees {
        let protocol_fee = bps_of(amount, self.entry_protocol_bps);
        let donation_fee = bps_of(amount, self.entry_donation_bps);
        let incentive_fee = bps_of(amount, self.entry_incentive_bps);

        // Each fee <= amount * rate / 10_000 and the rates sum to at most
        // 10_000, so the subtraction cannot underflow.
        let mut net_stake = amount - protocol_fee - donation_fee - incentive_fee;

        if vault_is_empty {
            net_stake += incentive_fee;
            return EntryFees {
                protocol_fee,
                donation_fee,
                incentive_fee: 0,
                net_stake,
            };
        }

        EntryFees {
            protocol_fee,
            donation_fee,
            incentive_fee,
            net_stake,
        }
    }

    /// Splits an exit amount into the exit fee and the author's net.
    pub fn exit_fee(&self, amount: u64) -> ExitFee {
        let fee = bps_of(amount, self.exit_bps);
        ExitFee {
            fee,
            net: amount - fee,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
