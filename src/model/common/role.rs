use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Roles that can be granted to an identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Configures elections and manages roles.
    Administrator,
    /// Casts votes. Only held by registered voters.
    Voter,
    /// Reads the audit trail.
    Auditor,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Administrator => "Administrator",
            Self::Voter => "Voter",
            Self::Auditor => "Auditor",
        };
        f.write_str(name)
    }
}

/// The authority an operation demands of its caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    /// The single identity fixed at ledger genesis.
    Root,
    /// Any holder of the role.
    Role(Role),
    /// Holders of either role.
    Either(Role, Role),
}

impl Display for Authority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Role(role) => write!(f, "{role}"),
            Self::Either(a, b) => write!(f, "{a} or {b}"),
        }
    }
}
