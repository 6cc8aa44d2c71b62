// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AVAL Ledger — Core Library
//!
//! AVAL is a reputation-staking ledger: any participant can *vouch* for
//! another participant by staking value behind them, and withdraw that stake
//! later. The protocol skims configurable fees on the way in and out,
//! redistributes an incentive cut of every new stake to the people who staked
//! earlier, and can punish a misbehaving participant by slashing the value
//! they currently have staked in others.
//!
//! The hard part is not any single operation -- it is that four independent
//! fee types, pro-rata incentive redistribution, and proportional slashing
//! all compose on one share-based ledger that must conserve value exactly,
//! in integer arithmetic, with no drift and no double-counting.
//!
//! ## Architecture
//!
//! The modules mirror the actual concerns of the ledger, leaf-first:
//!
//! - **config**    — Protocol constants. Every magic number lives here.
//! - **asset**     — Tagged asset kinds: native value or a specific token.
//! - **clock**     — The time boundary. The core never reads the wall clock
//!                   itself; time is injected so the grace window is exact.
//! - **directory** — Collaborator traits: profile existence/authorization
//!                   and the outbound value-transfer primitive.
//! - **escrow**    — Per-profile balance ledger for donation proceeds.
//! - **vault**     — Per-subject share-based stake vault. The exchange-rate
//!                   machinery that makes incentives and slashing pro-rata.
//! - **fees**      — Four basis-point rates, one validated ceiling.
//! - **vouch**     — The vouch record and its forward-only lifecycle.
//! - **slash**     — Proportional penalties across a profile's outgoing
//!                   stakes, with audit records.
//! - **registry**  — The orchestrator. The only writer of vouch, vault, and
//!                   escrow state; everything else is called through it.
//!
//! ## Design Philosophy
//!
//! 1. If it touches money, it uses checked arithmetic. Wrapping math and
//!    value ledgers do not mix.
//! 2. Every state transition is all-or-nothing. A rejected operation leaves
//!    every ledger byte-for-byte unchanged.
//! 3. State machines are explicit and forward-only. No flag soup.
//! 4. Every public type is serializable for wire transport and snapshots.

pub mod asset;
pub mod clock;
pub mod config;
pub mod directory;
pub mod escrow;
pub mod fees;
pub mod registry;
pub mod slash;
pub mod vault;
pub mod vouch;

/// Identifier of a participant profile.
///
/// Profiles are created and owned by the identity subsystem; the ledger only
/// ever sees their numeric ids and asks the [`directory`] whether they exist.
pub type ProfileId = u64;

/// Identifier of a vouch record. Monotonically assigned by the registry,
/// never reused, even after the vouch is archived.
pub type VouchId = u64;
