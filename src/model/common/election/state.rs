use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// States in the Election lifecycle. Transitions only ever move forwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElectionState {
    /// Under construction; positions and candidates may be added.
    Created,
    /// Voting is open within the configured window.
    Active,
    /// Voting has closed, tallies are still provisional.
    Ended,
    /// Tallies are final.
    ResultsPublished,
}

impl ElectionState {
    /// Can positions and candidates still be added?
    pub fn is_editable(self) -> bool {
        self == Self::Created
    }

    /// Every state, in lifecycle order.
    pub fn all() -> [Self; 4] {
        [
            Self::Created,
            Self::Active,
            Self::Ended,
            Self::ResultsPublished,
        ]
    }
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Active => "Active",
            Self::Ended => "Ended",
            Self::ResultsPublished => "ResultsPublished",
        };
        f.write_str(name)
    }
}
