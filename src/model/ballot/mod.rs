pub use ledger::{CastContext, VoteLedger};
pub use receipt::{HmacSha256, Receipt, ReceiptIssuer};
pub use record::{VoteRecord, VoterKey};

mod ledger;
mod receipt;
mod record;
