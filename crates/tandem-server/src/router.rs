//! Broadcast router.
//!
//! Turns "deliver this message to these participants" into per-connection
//! send actions. Participants without a live connection are skipped silently,
//! so a member that vanished mid-broadcast never blocks delivery to the other.

use tandem_proto::{ParticipantId, ServerMessage};

use crate::{driver::ServerAction, pool::WaitingPool, registry::IdentityRegistry};

/// Fan-out over the identity registry.
pub struct BroadcastRouter<'a> {
    registry: &'a IdentityRegistry,
}

impl<'a> BroadcastRouter<'a> {
    /// Create a router that resolves connections through `registry`.
    pub fn new(registry: &'a IdentityRegistry) -> Self {
        Self { registry }
    }

    /// Send `message` to one participant.
    pub fn to_participant<I>(
        &self,
        participant: ParticipantId,
        message: ServerMessage,
    ) -> Option<ServerAction<I>> {
        let connection_id = self.registry.connection_for(participant)?;
        Some(ServerAction::SendToConnection { connection_id, message })
    }

    /// Send `message` to both members of a session, in seat order.
    pub fn to_session<I>(
        &self,
        members: [ParticipantId; 2],
        message: &ServerMessage,
    ) -> Vec<ServerAction<I>> {
        self.to_all(members.into_iter(), message)
    }

    /// Send `message` to every waiting participant, in pool order.
    pub fn to_pool<I>(&self, pool: &WaitingPool, message: &ServerMessage) -> Vec<ServerAction<I>> {
        self.to_all(pool.iter(), message)
    }

    fn to_all<I>(
        &self,
        participants: impl Iterator<Item = ParticipantId>,
        message: &ServerMessage,
    ) -> Vec<ServerAction<I>> {
        participants.filter_map(|p| self.to_participant(p, message.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use tandem_proto::SessionId;

    use super::*;

    fn targets(actions: &[ServerAction<u64>]) -> Vec<u64> {
        actions
            .iter()
            .filter_map(|a| match a {
                ServerAction::SendToConnection { connection_id, .. } => Some(*connection_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn session_broadcast_reaches_both_members() {
        let mut registry = IdentityRegistry::new();
        let a = registry.register(10, "ada", 32).unwrap().id;
        let b = registry.register(20, "bob", 32).unwrap().id;

        let router = BroadcastRouter::new(&registry);
        let actions: Vec<ServerAction<u64>> =
            router.to_session([a, b], &ServerMessage::OpponentLeft { session_id: SessionId(1) });

        assert_eq!(targets(&actions), vec![10, 20]);
    }

    #[test]
    fn missing_member_is_skipped() {
        let mut registry = IdentityRegistry::new();
        let a = registry.register(10, "ada", 32).unwrap().id;

        let router = BroadcastRouter::new(&registry);
        let actions: Vec<ServerAction<u64>> = router
            .to_session([a, ParticipantId(99)], &ServerMessage::OpponentLeft {
                session_id: SessionId(1),
            });

        assert_eq!(targets(&actions), vec![10]);
    }

    #[test]
    fn pool_broadcast_follows_pool_order() {
        let mut registry = IdentityRegistry::new();
        let a = registry.register(10, "ada", 32).unwrap().id;
        let b = registry.register(20, "bob", 32).unwrap().id;
        registry.register(30, "cy", 32).unwrap();

        let mut pool = WaitingPool::new();
        pool.enqueue(b);
        pool.enqueue(a);

        let router = BroadcastRouter::new(&registry);
        let message = ServerMessage::PoolUpdate { participants: pool.list(&registry) };
        let actions: Vec<ServerAction<u64>> = router.to_pool(&pool, &message);

        assert_eq!(targets(&actions), vec![20, 10]);
    }
}
