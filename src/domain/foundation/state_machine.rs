//! Lifecycle statuses declared as a table of legal edges.

use super::ValidationError;

/// A status enum whose legal moves are listed by [`StateMachine::successors`].
///
/// Edge checks, validated transitions and terminal detection all derive
/// from that one list, so an implementor only writes the table.
///
/// ```ignore
/// let next = PaymentStatus::Pending.transition_to(PaymentStatus::Confirmed)?;
/// assert!(next.is_terminal());
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug + 'static {
    /// States reachable in one step from `self`.
    fn successors(&self) -> &'static [Self];

    fn can_transition_to(&self, target: &Self) -> bool {
        self.successors().contains(target)
    }

    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            return Ok(target);
        }
        Err(ValidationError::invalid_format(
            "state_transition",
            format!("{:?} cannot move to {:?}", self, target),
        ))
    }

    fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}
