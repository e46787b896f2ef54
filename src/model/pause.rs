use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::access::AccessControl;
use super::common::{Authority, Identity};
use super::event::LedgerEvent;
use crate::error::{Error, Result};

/// Global safety gate. While engaged, no votes can be cast; everything else works.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PauseSwitch {
    paused: bool,
    changed_at: Option<DateTime<Utc>>,
    changed_by: Option<Identity>,
}

impl PauseSwitch {
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// When and by whom the switch was last flipped.
    pub fn last_change(&self) -> Option<(DateTime<Utc>, &Identity)> {
        self.changed_at.zip(self.changed_by.as_ref())
    }

    pub fn ensure_running(&self) -> Result<()> {
        if self.paused {
            Err(Error::SystemPaused)
        } else {
            Ok(())
        }
    }

    /// Check a request to set the switch to `paused`. Only the root authority may.
    pub fn check_set(
        &self,
        access: &AccessControl,
        caller: &Identity,
        paused: bool,
    ) -> Result<LedgerEvent> {
        access.require(caller, Authority::Root)?;
        match (self.paused, paused) {
            (true, true) => Err(Error::AlreadyPaused),
            (false, false) => Err(Error::NotPaused),
            (_, true) => Ok(LedgerEvent::Paused),
            (_, false) => Ok(LedgerEvent::Unpaused),
        }
    }

    pub fn apply_set(&mut self, paused: bool, by: &Identity, at: DateTime<Utc>) {
        self.paused = paused;
        self.changed_at = Some(at);
        self.changed_by = Some(by.clone());
    }
}
