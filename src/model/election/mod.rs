pub use election_core::{Candidate, Election, Position};
pub use registry::ElectionRegistry;
pub use spec::{CandidateSpec, ElectionSpec, PositionSpec};

mod election_core;
mod registry;
mod spec;

#[cfg(test)]
pub use spec::t0;
