use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Ticket-granting ticket (`TGT-…`) issued by the CAS REST endpoint.
///
/// Identifies the user's single sign-on session at the CAS server. Service
/// tickets are derived from it; destroying it with
/// [`RestClient::logout`](crate::rest::RestClient::logout) ends the session.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct TicketGrantingTicket(pub String);

impl TicketGrantingTicket {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Single-use service ticket (`ST-…`) delegating a TGT to one service URL.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct ServiceTicket(pub String);

impl ServiceTicket {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Local browser session identifier carried in the session cookie.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Mint a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::session_id::generate_session_id())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_display_is_raw_value() {
        let tgt = TicketGrantingTicket::from("TGT-1-abc".to_string());
        assert_eq!(tgt.to_string(), "TGT-1-abc");
        let st = ServiceTicket::from("ST-1-xyz".to_string());
        assert_eq!(st.as_str(), "ST-1-xyz");
    }

    #[test]
    fn service_ticket_serde_is_transparent() {
        let st = ServiceTicket("ST-42".into());
        let json = serde_json::to_string(&st).unwrap();
        assert_eq!(json, "\"ST-42\"");
    }

    #[test]
    fn generated_session_ids_differ() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_tgt(_: &TicketGrantingTicket) {}
        fn takes_st(_: &ServiceTicket) {}

        takes_tgt(&TicketGrantingTicket::from("TGT".to_string()));
        takes_st(&ServiceTicket::from("ST".to_string()));
        // takes_tgt(&ServiceTicket::from("ST".to_string()));  // Compile error!
    }
}
