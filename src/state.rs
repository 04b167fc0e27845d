//! Negotiation states and role legality

/// Which side of the SASL exchange this endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiating side. Selects a mechanism and answers challenges
    Client,
    /// Accepting side. Announces mechanisms and decides the outcome
    Server,
}

/// Progress marker of the SASL exchange.
///
/// The discriminants order the states by how far the exchange has advanced;
/// the state machine never moves backward in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SaslState {
    /// Nothing posted or received yet
    None = 0,
    /// Client posted the init frame
    PostedInit = 1,
    /// Server posted the mechanisms frame
    PostedMechanisms = 2,
    /// Client posted a response frame
    PostedResponse = 3,
    /// Server posted a challenge frame
    PostedChallenge = 4,
    /// Client concluded without a server round trip (forced ANONYMOUS)
    PretendOutcome = 5,
    /// Server posted the outcome frame
    PostedOutcome = 6,
    /// Client received the outcome frame
    RecvedOutcome = 7,
}

impl SaslState {
    pub(crate) fn is_client_state(self) -> bool {
        matches!(
            self,
            SaslState::None
                | SaslState::PostedInit
                | SaslState::PostedResponse
                | SaslState::PretendOutcome
                | SaslState::RecvedOutcome
        )
    }

    pub(crate) fn is_server_state(self) -> bool {
        matches!(
            self,
            SaslState::None
                | SaslState::PostedMechanisms
                | SaslState::PostedChallenge
                | SaslState::PostedOutcome
        )
    }

    pub(crate) fn is_legal_for(self, role: Role) -> bool {
        match role {
            Role::Client => self.is_client_state(),
            Role::Server => self.is_server_state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_totally_ordered() {
        assert!(SaslState::None < SaslState::PostedInit);
        assert!(SaslState::PostedInit < SaslState::PostedMechanisms);
        assert!(SaslState::PostedMechanisms < SaslState::PostedResponse);
        assert!(SaslState::PostedResponse < SaslState::PostedChallenge);
        assert!(SaslState::PostedChallenge < SaslState::PretendOutcome);
        assert!(SaslState::PretendOutcome < SaslState::PostedOutcome);
        assert!(SaslState::PostedOutcome < SaslState::RecvedOutcome);
    }

    #[test]
    fn test_role_legality_is_disjoint_except_none() {
        let all = [
            SaslState::None,
            SaslState::PostedInit,
            SaslState::PostedMechanisms,
            SaslState::PostedResponse,
            SaslState::PostedChallenge,
            SaslState::PretendOutcome,
            SaslState::PostedOutcome,
            SaslState::RecvedOutcome,
        ];
        for state in all {
            if matches!(state, SaslState::None) {
                assert!(state.is_client_state() && state.is_server_state());
            } else {
                assert_ne!(state.is_client_state(), state.is_server_state());
            }
        }
    }
}
