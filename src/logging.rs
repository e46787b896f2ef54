use std::fmt::{Display, Formatter};

use crate::model::event::{EventRecord, LedgerEvent, Observer};

/// An observer that logs every committed event.
#[derive(Debug, Copy, Clone, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, record: &EventRecord) {
        let seq = record.seq;
        let actor = &record.actor;
        let event = EventDisplay(&record.event);
        match record.event {
            LedgerEvent::Paused | LedgerEvent::Unpaused => warn!("#{seq} {actor}: {event}"),
            _ => info!("#{seq} {actor}: {event}"),
        }
    }
}

/// One-line rendering of an event for logs.
struct EventDisplay<'a>(&'a LedgerEvent);

impl Display for EventDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.0.name();
        match self.0 {
            LedgerEvent::LedgerInitialized { root } => write!(f, "{name} root={root}"),
            LedgerEvent::ElectionCreated { election_id, title } => {
                write!(f, "{name} {election_id} \"{title}\"")
            }
            LedgerEvent::PositionAdded {
                election_id,
                position_id,
            } => write!(f, "{name} {election_id}/{position_id}"),
            LedgerEvent::CandidateRegistered {
                election_id,
                position_id,
                candidate_id,
                ballot_number,
            } => write!(
                f,
                "{name} {election_id}/{position_id}/{candidate_id} ballot #{ballot_number}"
            ),
            LedgerEvent::CandidateWithdrawn {
                election_id,
                position_id,
                candidate_id,
            } => write!(f, "{name} {election_id}/{position_id}/{candidate_id}"),
            LedgerEvent::ElectionStarted { election_id }
            | LedgerEvent::ElectionEnded { election_id } => write!(f, "{name} {election_id}"),
            LedgerEvent::ResultsPublished {
                election_id,
                total_votes,
            } => write!(f, "{name} {election_id} with {total_votes} votes"),
            LedgerEvent::VoteCast {
                election_id,
                position_id,
                vote_hash,
            } => write!(f, "{name} {election_id}/{position_id} {vote_hash}"),
            LedgerEvent::VoterRegistered { identity } | LedgerEvent::VoterRevoked { identity } => {
                write!(f, "{name} {identity}")
            }
            LedgerEvent::RoleGranted { identity, role }
            | LedgerEvent::RoleRevoked { identity, role } => write!(f, "{name} {role} {identity}"),
            LedgerEvent::Paused | LedgerEvent::Unpaused => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::common::Role;

    #[test]
    fn renders_events() {
        let event = LedgerEvent::RoleGranted {
            identity: "auditor".into(),
            role: Role::Auditor,
        };
        assert_eq!(
            EventDisplay(&event).to_string(),
            "RoleGranted Auditor auditor"
        );
        let event = LedgerEvent::CandidateRegistered {
            election_id: "E1".to_string(),
            position_id: "P1".to_string(),
            candidate_id: "C2".to_string(),
            ballot_number: 2,
        };
        assert_eq!(
            EventDisplay(&event).to_string(),
            "CandidateRegistered E1/P1/C2 ballot #2"
        );
        assert_eq!(EventDisplay(&LedgerEvent::Paused).to_string(), "Paused");
    }
}
