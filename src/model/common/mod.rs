pub mod election;

mod identity;
mod role;
mod vote_hash;

pub use identity::Identity;
pub use role::{Authority, Role};
pub use vote_hash::{VoteHash, VoteHashParseError};
