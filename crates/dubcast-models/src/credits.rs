//! Credit accounting types.
//!
//! One credit buys roughly one minute of source speech.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Remaining credits for a team's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreditBalance {
    pub team_id: i64,
    pub remaining_credits: i64,
}

impl CreditBalance {
    pub fn new(team_id: i64, remaining_credits: i64) -> Self {
        Self {
            team_id,
            remaining_credits,
        }
    }

    /// Whether the balance covers `required` credits.
    pub fn covers(&self, required: i64) -> bool {
        self.remaining_credits >= required
    }
}

/// Credits charged for `seconds` of speech: whole minutes, rounded up.
pub fn credits_for_seconds(seconds: f64) -> i64 {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds / 60.0).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credits_for_seconds() {
        assert_eq!(credits_for_seconds(0.0), 0);
        assert_eq!(credits_for_seconds(1.0), 1);
        assert_eq!(credits_for_seconds(60.0), 1);
        assert_eq!(credits_for_seconds(60.5), 2);
        assert_eq!(credits_for_seconds(-3.0), 0);
    }

    #[test]
    fn test_balance_covers() {
        let balance = CreditBalance::new(7, 5);
        assert!(balance.covers(5));
        assert!(!balance.covers(6));
    }
}
