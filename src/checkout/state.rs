//! Checkout state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a checkout submission currently is.
///
/// Progresses linearly: Idle → Validating → ProvisioningAccount (guests only)
/// → CreatingSetupIntent → ConfirmingCard → ConfirmingSubscription →
/// SigningIn (new accounts only) → Done. Any step up to and including
/// ConfirmingSubscription may end in Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    Validating,
    ProvisioningAccount,
    CreatingSetupIntent,
    ConfirmingCard,
    ConfirmingSubscription,
    SigningIn,
    Done,
    Failed,
}

impl CheckoutPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: CheckoutPhase) -> bool {
        use CheckoutPhase::*;
        matches!(
            (self, target),
            (Idle, Validating)
                | (Validating, ProvisioningAccount)
                | (Validating, CreatingSetupIntent)
                | (Validating, Failed)
                | (ProvisioningAccount, CreatingSetupIntent)
                | (ProvisioningAccount, Failed)
                | (CreatingSetupIntent, ConfirmingCard)
                | (CreatingSetupIntent, Failed)
                | (ConfirmingCard, ConfirmingSubscription)
                | (ConfirmingCard, Failed)
                | (ConfirmingSubscription, SigningIn)
                | (ConfirmingSubscription, Done)
                | (ConfirmingSubscription, Failed)
                // Sign-in failure is non-fatal, so SigningIn only leads to Done.
                | (SigningIn, Done)
        )
    }

    /// Whether the run has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether a network call may be in flight in this phase.
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Done | Self::Failed)
    }
}

impl Default for CheckoutPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::ProvisioningAccount => "provisioning_account",
            Self::CreatingSetupIntent => "creating_setup_intent",
            Self::ConfirmingCard => "confirming_card",
            Self::ConfirmingSubscription => "confirming_subscription",
            Self::SigningIn => "signing_in",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A recorded phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: CheckoutPhase,
    pub to: CheckoutPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Per-submission context. Lives only as long as one `submit` call.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRun {
    pub run_id: Uuid,
    pub phase: CheckoutPhase,
    /// The phase that was active when the run failed.
    pub failed_at: Option<CheckoutPhase>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub transitions: Vec<PhaseTransition>,
}

impl CheckoutRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase: CheckoutPhase::Idle,
            failed_at: None,
            started_at: Utc::now(),
            finished_at: None,
            transitions: Vec::new(),
        }
    }

    /// Move to `target`, recording the transition.
    pub fn transition_to(
        &mut self,
        target: CheckoutPhase,
        reason: Option<String>,
    ) -> Result<(), String> {
        if !self.phase.can_transition_to(target) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.phase, target
            ));
        }

        self.transitions.push(PhaseTransition {
            from: self.phase,
            to: target,
            timestamp: Utc::now(),
            reason,
        });

        if target == CheckoutPhase::Failed {
            self.failed_at = Some(self.phase);
        }
        self.phase = target;
        if target.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Phases visited so far, in order, starting with Idle.
    pub fn path(&self) -> Vec<CheckoutPhase> {
        let mut path = vec![CheckoutPhase::Idle];
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }
}

impl Default for CheckoutRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_path_is_valid() {
        use CheckoutPhase::*;
        let path = [
            Idle,
            Validating,
            ProvisioningAccount,
            CreatingSetupIntent,
            ConfirmingCard,
            ConfirmingSubscription,
            SigningIn,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} should transition to {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn member_path_skips_account_and_sign_in() {
        use CheckoutPhase::*;
        assert!(Validating.can_transition_to(CreatingSetupIntent));
        assert!(ConfirmingSubscription.can_transition_to(Done));
    }

    #[test]
    fn invalid_transitions() {
        use CheckoutPhase::*;
        // Skipping the card
        assert!(!CreatingSetupIntent.can_transition_to(ConfirmingSubscription));
        // Going backward
        assert!(!ConfirmingCard.can_transition_to(CreatingSetupIntent));
        // Sign-in never fails the run
        assert!(!SigningIn.can_transition_to(Failed));
        // Idle can't fail without validating
        assert!(!Idle.can_transition_to(Failed));
        // Terminal
        assert!(!Done.can_transition_to(Idle));
        assert!(!Failed.can_transition_to(Validating));
        // Self-transition
        assert!(!ConfirmingCard.can_transition_to(ConfirmingCard));
    }

    #[test]
    fn terminal_and_busy() {
        use CheckoutPhase::*;
        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!SigningIn.is_terminal());
        assert!(ConfirmingCard.is_busy());
        assert!(!Idle.is_busy());
        assert!(!Done.is_busy());
    }

    #[test]
    fn display_matches_serde() {
        use CheckoutPhase::*;
        for phase in [
            Idle,
            Validating,
            ProvisioningAccount,
            CreatingSetupIntent,
            ConfirmingCard,
            ConfirmingSubscription,
            SigningIn,
            Done,
            Failed,
        ] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(format!("\"{phase}\""), json);
        }
    }

    #[test]
    fn run_records_failure_phase() {
        let mut run = CheckoutRun::new();
        run.transition_to(CheckoutPhase::Validating, None).unwrap();
        run.transition_to(CheckoutPhase::CreatingSetupIntent, None)
            .unwrap();
        run.transition_to(CheckoutPhase::Failed, Some("500".into()))
            .unwrap();

        assert_eq!(run.failed_at, Some(CheckoutPhase::CreatingSetupIntent));
        assert!(run.finished_at.is_some());
        assert_eq!(
            run.path(),
            vec![
                CheckoutPhase::Idle,
                CheckoutPhase::Validating,
                CheckoutPhase::CreatingSetupIntent,
                CheckoutPhase::Failed,
            ]
        );
    }

    #[test]
    fn run_rejects_illegal_transition() {
        let mut run = CheckoutRun::new();
        assert!(run.transition_to(CheckoutPhase::ConfirmingCard, None).is_err());
        assert_eq!(run.phase, CheckoutPhase::Idle);
        assert!(run.transitions.is_empty());
    }
}
