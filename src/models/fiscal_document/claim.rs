//! Submission claims: a draft handed to the gateway whose outcome is not
//! recorded yet.
//!
//! While a claim is live nobody else may submit or edit the draft, and it
//! counts toward the account's monthly cap. Recording the outcome removes it.
//! A claim older than its lease is abandoned (the process died mid-call) and
//! may be taken over.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{error::ServiceError, schema::submission_claims};

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = submission_claims)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubmissionClaim {
    pub document_id: Uuid,
    pub account_id: Uuid,
    pub claimed_at: DateTime<Utc>,
}

impl SubmissionClaim {
    pub fn is_live(&self, live_after: DateTime<Utc>) -> bool {
        self.claimed_at >= live_after
    }
}

/// What a store checks, under one lock, before writing the claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub claim: SubmissionClaim,
    /// `None` when the account has no cap.
    pub monthly_cap: Option<i64>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Claims taken before this instant are abandoned.
    pub live_after: DateTime<Utc>,
}

impl ClaimRequest {
    pub fn cap_reached(&self, issued: i64, in_flight: i64) -> bool {
        self.monthly_cap
            .map(|cap| issued + in_flight >= cap)
            .unwrap_or(false)
    }
}

/// A live claim already holds the draft.
pub fn already_claimed(document_id: Uuid) -> ServiceError {
    ServiceError::conflict(format!("Document {} is already being submitted", document_id)).with_context(|ctx| {
        ctx.with_tag("nfe")
            .with_metadata("document_id", document_id.to_string())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// Issued documents plus live claims of the period already reach the cap.
    CapReached { issued: i64, in_flight: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(cap: Option<i64>) -> ClaimRequest {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        ClaimRequest {
            claim: SubmissionClaim {
                document_id: Uuid::new_v4(),
                account_id: Uuid::new_v4(),
                claimed_at: now,
            },
            monthly_cap: cap,
            period_start: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            period_end: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
            live_after: now - Duration::minutes(5),
        }
    }

    #[test]
    fn in_flight_claims_count_toward_the_cap() {
        let capped = request(Some(2));
        assert!(!capped.cap_reached(1, 0));
        assert!(capped.cap_reached(1, 1));
        assert!(capped.cap_reached(0, 2));
        assert!(!request(None).cap_reached(10_000, 10_000));
    }

    #[test]
    fn claims_expire_after_their_lease() {
        let req = request(None);
        assert!(req.claim.is_live(req.live_after));
        let old = SubmissionClaim {
            claimed_at: req.live_after - Duration::seconds(1),
            ..req.claim.clone()
        };
        assert!(!old.is_live(req.live_after));
    }
}
