#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate ledger_test;

pub mod clock;
pub mod config;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod model;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use ledger::Ledger;
