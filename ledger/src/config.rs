//! # Protocol Configuration & Constants
//!
//! Every magic number in AVAL lives here. Fee rates and the minimum vouch
//! amount are runtime-mutable (through the registry's admin surface); the
//! constants below are the fixed points those mutations are validated
//! against.

/// Denominator for all basis-point arithmetic. 1 bp = 0.01%.
///
/// Fee rates, and by default slash penalties, are expressed as a numerator
/// over this value. Integer division by `BASIS_POINTS` always rounds down,
/// so remainders accrue to the protocol side of every split.
pub const BASIS_POINTS: u64 = 10_000;

/// Upper bound on the *sum* of all four fee rates (entry protocol, entry
/// donation, entry incentive, exit), checked on every rate mutation.
///
/// The ceiling equals 100%: a configuration where fees consume the entire
/// stake is pathological but representable; anything beyond it would mint
/// value out of thin air and is rejected atomically.
pub const FEE_CEILING_BPS: u64 = 10_000;

/// Hard floor for the configurable minimum vouch amount, in smallest units.
///
/// The admin-settable minimum can be raised freely but can never be set
/// below this value. Dust-sized stakes make share rounding dominate the
/// economics, so the protocol refuses them outright.
pub const ABSOLUTE_MINIMUM_VOUCH_AMOUNT: u64 = 10_000;

/// Default value for the configurable minimum vouch amount.
pub const DEFAULT_MINIMUM_VOUCH_AMOUNT: u64 = ABSOLUTE_MINIMUM_VOUCH_AMOUNT;

/// Grace window after unvouching during which the author may still flag the
/// vouch as unhealthy, in seconds. 24 hours.
///
/// The window is evaluated against the externally supplied [`crate::clock`],
/// inclusive at the boundary: a flag at exactly `unvouched_at + 24h` is
/// accepted.
pub const UNHEALTHY_GRACE_PERIOD_SECS: i64 = 86_400;

/// Default denominator for slash penalties: basis points.
///
/// The slash engine treats the penalty scale as a pinned constant rather
/// than baking `BASIS_POINTS` into the arithmetic, so deployments that
/// express penalties over a different denominator (percent, 1/50_000) can
/// re-pin it at construction without touching the slashing code.
pub const DEFAULT_SLASH_SCALE: u64 = 10_000;

/// Number of decimal places in the staking unit, for display only.
///
/// One whole unit is `10^STAKE_DECIMALS` smallest units. The ledger never
/// divides by this -- all arithmetic is in smallest units.
pub const STAKE_DECIMALS: u8 = 8;

/// One whole staking unit in smallest units (`10^STAKE_DECIMALS`).
pub const ONE_STAKE_UNIT: u64 = 100_000_000;

/// Ledger protocol version string, reported by the node's status surface.
pub const PROTOCOL_VERSION: &str = "0.1.0";
