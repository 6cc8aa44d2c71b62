//! # Vouch Records
//!
//! A [`Vouch`] is one author profile's staked endorsement of one subject
//! profile. At most one non-archived vouch exists per (author, subject)
//! pair; archived records are kept forever as history.
//!
//! ## State Machine
//!
//! ```text
//!    ┌──────────┐  unvouch   ┌────────────┐  mark unhealthy  ┌─────────────────────┐
//!    │  Active  │──────────► │ Unvouched  │────────────────► │ UnvouchedUnhealthy  │
//!    └──────────┘            └────────────┘  (≤ 24h window)  └─────────────────────┘
//! ```
//!
//! Transitions are forward-only; no state is ever left. The unhealthy flag
//! can be set once, only after unvouching, and only within the grace window
//! measured from `unvouched_at` against the externally supplied clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::AssetKind;
use crate::config::UNHEALTHY_GRACE_PERIOD_SECS;
use crate::{ProfileId, VouchId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// State-precondition errors on a vouch record.
#[derive(Debug, Error)]
pub enum VouchError {
    /// Attempted to unvouch a vouch that is already archived.
    #[error("vouch {0} is already archived")]
    AlreadyArchived(VouchId),

    /// The unhealthy flag could not be set: the vouch was never unvouched,
    /// was already flagged, or the grace window has elapsed.
    #[error("cannot mark vouch {id} unhealthy: {reason}")]
    CannotMarkUnhealthy {
        /// The vouch in question.
        id: VouchId,
        /// Which precondition failed.
        reason: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Derived lifecycle state of a vouch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VouchStatus {
    /// Stake is in the subject's vault; the author may unvouch.
    Active,
    /// Stake has been withdrawn; the record is archived.
    Unvouched,
    /// Archived and additionally flagged unhealthy by its author.
    UnvouchedUnhealthy,
}

impl std::fmt::Display for VouchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VouchStatus::Active => write!(f, "Active"),
            VouchStatus::Unvouched => write!(f, "Unvouched"),
            VouchStatus::UnvouchedUnhealthy => write!(f, "UnvouchedUnhealthy"),
        }
    }
}

/// Timestamps of the vouch's lifecycle transitions.
///
/// `None` means "not yet occurred". Once set, a checkpoint never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VouchCheckpoints {
    /// When the vouch was created.
    pub vouched_at: DateTime<Utc>,
    /// When the author withdrew the stake.
    pub unvouched_at: Option<DateTime<Utc>>,
    /// When the author flagged the vouch unhealthy.
    ///
    /// Invariant: `Some` implies `unvouched_at` is `Some` and
    /// `unhealthy_at >= unvouched_at`, within the grace window.
    pub unhealthy_at: Option<DateTime<Utc>>,
}

/// One staked endorsement from an author profile toward a subject profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vouch {
    /// Monotonic identifier, never reused.
    pub id: VouchId,
    /// The profile that staked.
    pub author: ProfileId,
    /// The address the author acted from at creation time.
    pub author_address: String,
    /// The profile being vouched for.
    pub subject: ProfileId,
    /// Asset the stake was denominated in.
    pub asset: AssetKind,
    /// Free-form comment attached at creation.
    pub comment: String,
    /// Opaque metadata attached at creation.
    pub metadata: String,
    /// `true` once the author has unvouched. Archived records are history;
    /// they are never deleted.
    pub archived: bool,
    /// `true` once the author has flagged the withdrawal as unhealthy.
    pub unhealthy: bool,
    /// Lifecycle timestamps.
    pub checkpoints: VouchCheckpoints,
}

impl Vouch {
    /// Creates a new active vouch.
    pub fn new(
        id: VouchId,
        author: ProfileId,
        author_address: impl Into<String>,
        subject: ProfileId,
        asset: AssetKind,
        comment: impl Into<String>,
        metadata: impl Into<String>,
        vouched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author,
            author_address: author_address.into(),
            subject,
            asset,
            comment: comment.into(),
            metadata: metadata.into(),
            archived: false,
            unhealthy: false,
            checkpoints: VouchCheckpoints {
                vouched_at,
                unvouched_at: None,
                unhealthy_at: None,
            },
        }
    }

    /// Derived lifecycle state.
    pub fn status(&self) -> VouchStatus {
        if self.unhealthy {
            VouchStatus::UnvouchedUnhealthy
        } else if self.archived {
            VouchStatus::Unvouched
        } else {
            VouchStatus::Active
        }
    }

    /// Returns `true` while the stake is still in the subject's vault.
    pub fn is_active(&self) -> bool {
        !self.archived
    }

    /// Archives the vouch, stamping `unvouched_at = now`.
    ///
    /// # Errors
    ///
    /// Returns [`VouchError::AlreadyArchived`] if called twice.
    pub fn archive(&mut self, now: DateTime<Utc>) -> Result<(), VouchError> {
        if self.archived {
            return Err(VouchError::AlreadyArchived(self.id));
        }
        self.archived = true;
        self.checkpoints.unvouched_at = Some(now);
        Ok(())
    }

    /// Flags an archived vouch as unhealthy, stamping `unhealthy_at = now`.
    ///
    /// Allowed exactly once, only after archiving, and only while
    /// `now <= unvouched_at + 24h` (inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`VouchError::CannotMarkUnhealthy`] naming the failed
    /// precondition.
    pub fn flag_unhealthy(&mut self, now: DateTime<Utc>) -> Result<(), VouchError> {
        if self.unhealthy {
            return Err(VouchError::CannotMarkUnhealthy {
                id: self.id,
                reason: "already marked unhealthy",
            });
        }
        let unvouched_at = match self.checkpoints.unvouched_at {
            Some(t) => t,
            None => {
                return Err(VouchError::CannotMarkUnhealthy {
                    id: self.id,
                    reason: "vouch was never unvouched",
                })
            }
        };
        let deadline = unvouched_at + Duration::seconds(UNHEALTHY_GRACE_PERIOD_SECS);
        if now > deadline {
            return Err(VouchError::CannotMarkUnhealthy {
                id: self.id,
                reason: "grace period elapsed",
            });
        }

        self.unhealthy = true;
        self.checkpoints.unhealthy_at = Some(now);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn sample(id: VouchId) -> Vouch {
        Vouch::new(
            id,
            1,
            "aval:alice",
            2,
            AssetKind::Native,
            "solid work",
            "",
            t0(),
        )
    }

    #[test]
    fn new_vouch_is_active() {
        let vouch = sample(1);
        assert_eq!(vouch.status(), VouchStatus::Active);
        assert!(vouch.is_active());
        assert_eq!(vouch.checkpoints.vouched_at, t0());
        assert!(vouch.checkpoints.unvouched_at.is_none());
    }

    #[test]
    fn archive_stamps_checkpoint() {
        let mut vouch = sample(1);
        let later = t0() + Duration::hours(3);
        vouch.archive(later).unwrap();

        assert_eq!(vouch.status(), VouchStatus::Unvouched);
        assert_eq!(vouch.checkpoints.unvouched_at, Some(later));
    }

    #[test]
    fn double_archive_rejected() {
        let mut vouch = sample(1);
        vouch.archive(t0()).unwrap();
        assert!(matches!(
            vouch.archive(t0()),
            Err(VouchError::AlreadyArchived(1))
        ));
    }

    #[test]
    fn flag_unhealthy_inside_window() {
        let mut vouch = sample(1);
        vouch.archive(t0()).unwrap();

        let at = t0() + Duration::seconds(86_399);
        vouch.flag_unhealthy(at).unwrap();

        assert_eq!(vouch.status(), VouchStatus::UnvouchedUnhealthy);
        assert_eq!(vouch.checkpoints.unhealthy_at, Some(at));
    }

    #[test]
    fn flag_unhealthy_after_window_rejected() {
        let mut vouch = sample(1);
        vouch.archive(t0()).unwrap();

        let at = t0() + Duration::seconds(86_401);
        let result = vouch.flag_unhealthy(at);
        assert!(matches!(
            result,
            Err(VouchError::CannotMarkUnhealthy {
                reason: "grace period elapsed",
                ..
            })
        ));
        assert_eq!(vouch.status(), VouchStatus::Unvouched);
    }

    #[test]
    fn flag_unhealthy_at_exact_deadline_allowed() {
        let mut vouch = sample(1);
        vouch.archive(t0()).unwrap();
        vouch
            .flag_unhealthy(t0() + Duration::seconds(86_400))
            .unwrap();
        assert!(vouch.unhealthy);
    }

    #[test]
    fn flag_unhealthy_before_unvouch_rejected() {
        let mut vouch = sample(1);
        let result = vouch.flag_unhealthy(t0());
        assert!(matches!(
            result,
            Err(VouchError::CannotMarkUnhealthy {
                reason: "vouch was never unvouched",
                ..
            })
        ));
    }

    #[test]
    fn flag_unhealthy_twice_rejected() {
        let mut vouch = sample(1);
        vouch.archive(t0()).unwrap();
        vouch.flag_unhealthy(t0()).unwrap();

        let result = vouch.flag_unhealthy(t0());
        assert!(matches!(
            result,
            Err(VouchError::CannotMarkUnhealthy {
                reason: "already marked unhealthy",
                ..
            })
        ));
    }

    #[test]
    fn vouch_serialization_roundtrip() {
        let mut vouch = sample(42);
        vouch.archive(t0() + Duration::hours(1)).unwrap();

        let json = serde_json::to_string(&vouch).expect("serialize");
        let recovered: Vouch = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(vouch, recovered);
        assert_eq!(recovered.status(), VouchStatus::Unvouched);
    }
}
