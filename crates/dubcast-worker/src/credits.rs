//! Credit reservation for dubbing jobs.
//!
//! Credits are taken up front: a job that cannot be paid for never starts.
//! If the job later fails, the balance is put back to exactly what it was
//! before the deduction.

use tracing::{info, warn};

use dubcast_models::Transcript;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::store::CreditStore;

/// A deduction that can be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditReservation {
    pub team_id: i64,
    /// Balance before the deduction
    pub previous_balance: i64,
    pub charged: i64,
}

impl CreditReservation {
    pub fn remaining(&self) -> i64 {
        self.previous_balance - self.charged
    }
}

/// Reserves and reimburses credits against a [`CreditStore`].
pub struct CreditGuard<'a> {
    store: &'a dyn CreditStore,
}

impl<'a> CreditGuard<'a> {
    pub fn new(store: &'a dyn CreditStore) -> Self {
        Self { store }
    }

    /// Deduct the credits `transcript` needs, or fail without touching the balance.
    pub async fn reserve(
        &self,
        team_id: i64,
        transcript: &Transcript,
    ) -> WorkerResult<CreditReservation> {
        let required = transcript.required_credits();
        let balance = self.store.get_balance(team_id).await?;

        if !balance.covers(required) {
            warn!(
                team_id,
                required,
                remaining = balance.remaining_credits,
                "Rejecting job: insufficient credits"
            );
            return Err(WorkerError::InsufficientCredits {
                required,
                remaining: balance.remaining_credits,
            });
        }

        let reservation = CreditReservation {
            team_id,
            previous_balance: balance.remaining_credits,
            charged: required,
        };
        self.store
            .set_balance(team_id, reservation.remaining())
            .await?;

        info!(
            team_id,
            charged = required,
            remaining = reservation.remaining(),
            "Credits reserved"
        );
        Ok(reservation)
    }

    /// Restore the balance recorded in `reservation`.
    pub async fn refund(&self, reservation: &CreditReservation) -> WorkerResult<()> {
        self.store
            .set_balance(reservation.team_id, reservation.previous_balance)
            .await?;
        metrics::record_credits_reimbursed(reservation.charged);
        info!(
            team_id = reservation.team_id,
            restored = reservation.previous_balance,
            "Credits reimbursed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use dubcast_models::Segment;

    fn transcript(seconds: f64) -> Transcript {
        Transcript::new("english", vec![Segment::new(0, 0.0, seconds, "hi")])
    }

    #[tokio::test]
    async fn test_reserve_deducts_ceil_minutes() {
        let store = InMemoryStore::new().with_team(1, 10);
        let guard = CreditGuard::new(&store);

        let reservation = guard.reserve(1, &transcript(61.0)).await.unwrap();
        assert_eq!(reservation.charged, 2);
        assert_eq!(store.get_balance(1).await.unwrap().remaining_credits, 8);
    }

    #[tokio::test]
    async fn test_insufficient_credits_leave_balance_untouched() {
        let store = InMemoryStore::new().with_team(1, 1);
        let guard = CreditGuard::new(&store);

        let err = guard.reserve(1, &transcript(125.0)).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::InsufficientCredits {
                required: 3,
                remaining: 1
            }
        ));
        assert_eq!(store.get_balance(1).await.unwrap().remaining_credits, 1);
    }

    #[tokio::test]
    async fn test_refund_restores_previous_balance() {
        let store = InMemoryStore::new().with_team(1, 5);
        let guard = CreditGuard::new(&store);

        let reservation = guard.reserve(1, &transcript(30.0)).await.unwrap();
        assert_eq!(store.get_balance(1).await.unwrap().remaining_credits, 4);

        guard.refund(&reservation).await.unwrap();
        assert_eq!(store.get_balance(1).await.unwrap().remaining_credits, 5);
    }
}
