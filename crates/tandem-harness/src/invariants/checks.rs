//! Concrete invariant implementations.

use std::collections::BTreeSet;

use tandem_server::ParticipantStatus;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A participant is in the pool, in one session, or neither. Never both.
///
/// Pool membership also agrees with the `Waiting` status in both directions.
pub struct PoolSessionExclusion;

impl Invariant for PoolSessionExclusion {
    fn name(&self) -> &'static str {
        "pool_session_exclusion"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = BTreeSet::new();
        for &id in &state.pool {
            if !seen.insert(id) {
                return Err(Violation::new(self.name(), format!("{id} queued twice")));
            }
            if state.session_index.iter().any(|(p, _)| *p == id) {
                return Err(Violation::new(
                    self.name(),
                    format!("{id} is both queued and in a session"),
                ));
            }
            match state.participant(id) {
                Some(p) if p.status == ParticipantStatus::Waiting => {},
                Some(p) => {
                    return Err(Violation::new(
                        self.name(),
                        format!("{id} queued with status {:?}", p.status),
                    ));
                },
                None => {
                    return Err(Violation::new(
                        self.name(),
                        format!("{id} queued but not registered"),
                    ));
                },
            }
        }

        for p in &state.participants {
            if p.status == ParticipantStatus::Waiting && !seen.contains(&p.id) {
                return Err(Violation::new(
                    self.name(),
                    format!("{} is Waiting but not in the pool", p.id),
                ));
            }
        }
        Ok(())
    }
}

/// Every session has two distinct registered members whose status names it,
/// and every `InSession` status names a live session containing that member.
pub struct SessionMembership;

impl Invariant for SessionMembership {
    fn name(&self) -> &'static str {
        "session_membership"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            let [a, b] = session.participants;
            if a == b {
                return Err(Violation::new(
                    self.name(),
                    format!("{} pairs {a} with itself", session.id),
                ));
            }
            for member in session.participants {
                let status = state.participant(member).map(|p| p.status);
                if status != Some(ParticipantStatus::InSession(session.id)) {
                    return Err(Violation::new(
                        self.name(),
                        format!("{} member {member} has status {status:?}", session.id),
                    ));
                }
            }
        }

        for p in &state.participants {
            if let ParticipantStatus::InSession(id) = p.status {
                let member = state.session(id).is_some_and(|s| s.participants.contains(&p.id));
                if !member {
                    return Err(Violation::new(
                        self.name(),
                        format!("{} claims {id} which does not hold it", p.id),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The actor seat is 0 or 1 and turns alternate starting with seat 0.
///
/// Seat 0 has filled either as many categories as seat 1 (its turn) or one
/// more (seat 1's turn).
pub struct TurnAlternation;

impl Invariant for TurnAlternation {
    fn name(&self) -> &'static str {
        "turn_alternation"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            let [first, second] = session.filled;
            let expected = first.checked_sub(second);
            if session.actor_index > 1 || expected != Some(session.actor_index) {
                return Err(Violation::new(
                    self.name(),
                    format!(
                        "{} actor seat {} with filled counts {:?}",
                        session.id, session.actor_index, session.filled
                    ),
                ));
            }
            if first > state.category_count || second > state.category_count {
                return Err(Violation::new(
                    self.name(),
                    format!(
                        "{} filled {:?} of {} categories",
                        session.id, session.filled, state.category_count
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Remaining budget never exceeds the per-turn allowance.
pub struct BudgetWithinAllowance;

impl Invariant for BudgetWithinAllowance {
    fn name(&self) -> &'static str {
        "budget_within_allowance"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            if session.turn_budget > state.turn_allowance {
                return Err(Violation::new(
                    self.name(),
                    format!(
                        "{} budget {} exceeds allowance {}",
                        session.id, session.turn_budget, state.turn_allowance
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// The participant → session index holds exactly the members of live
/// sessions.
pub struct IndexConsistency;

impl Invariant for IndexConsistency {
    fn name(&self) -> &'static str {
        "index_consistency"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut expected: Vec<_> = state
            .sessions
            .iter()
            .flat_map(|s| s.participants.map(|p| (p, s.id)))
            .collect();
        expected.sort_unstable();

        if expected != state.session_index {
            return Err(Violation::new(
                self.name(),
                format!(
                    "index {:?} does not match sessions {:?}",
                    state.session_index, expected
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tandem_proto::{ParticipantId, SessionId};

    use super::*;
    use crate::invariants::{ParticipantSnapshot, SessionSnapshot};

    fn participant(id: u64, status: ParticipantStatus) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: ParticipantId(id),
            display_name: format!("p{id}"),
            status,
            connection_id: id,
        }
    }

    fn session(filled: [usize; 2], actor_index: usize) -> SessionSnapshot {
        SessionSnapshot {
            id: SessionId(1),
            participants: [ParticipantId(1), ParticipantId(2)],
            actor_index,
            turn_budget: 3,
            filled,
            round_state: serde_json::Value::Null,
        }
    }

    fn in_session() -> SystemSnapshot {
        SystemSnapshot {
            participants: vec![
                participant(1, ParticipantStatus::InSession(SessionId(1))),
                participant(2, ParticipantStatus::InSession(SessionId(1))),
            ],
            sessions: vec![session([0, 0], 0)],
            session_index: vec![
                (ParticipantId(1), SessionId(1)),
                (ParticipantId(2), SessionId(1)),
            ],
            turn_allowance: 3,
            category_count: 2,
            ..SystemSnapshot::default()
        }
    }

    #[test]
    fn consistent_session_passes_every_check() {
        let state = in_session();

        assert!(PoolSessionExclusion.check(&state).is_ok());
        assert!(SessionMembership.check(&state).is_ok());
        assert!(TurnAlternation.check(&state).is_ok());
        assert!(BudgetWithinAllowance.check(&state).is_ok());
        assert!(IndexConsistency.check(&state).is_ok());
    }

    #[test]
    fn queued_session_member_is_detected() {
        let mut state = in_session();
        state.pool.push(ParticipantId(1));

        assert!(PoolSessionExclusion.check(&state).is_err());
    }

    #[test]
    fn waiting_status_outside_pool_is_detected() {
        let state = SystemSnapshot {
            participants: vec![participant(1, ParticipantStatus::Waiting)],
            ..SystemSnapshot::default()
        };

        assert!(PoolSessionExclusion.check(&state).is_err());
    }

    #[test]
    fn stale_status_is_detected() {
        let mut state = in_session();
        state.participants[1].status = ParticipantStatus::Idle;

        assert!(SessionMembership.check(&state).is_err());
    }

    #[test]
    fn out_of_turn_actor_is_detected() {
        let mut state = in_session();
        state.sessions[0] = session([1, 1], 1);

        assert!(TurnAlternation.check(&state).is_err());

        state.sessions[0] = session([1, 0], 1);
        assert!(TurnAlternation.check(&state).is_ok());
    }

    #[test]
    fn oversized_budget_is_detected() {
        let mut state = in_session();
        state.sessions[0].turn_budget = 4;

        assert!(BudgetWithinAllowance.check(&state).is_err());
    }

    #[test]
    fn dangling_index_entry_is_detected() {
        let mut state = in_session();
        state.session_index.push((ParticipantId(3), SessionId(1)));

        assert!(IndexConsistency.check(&state).is_err());
    }
}
