use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::model::common::Identity;

/// File the configuration is read from, relative to the working directory.
pub const CONFIG_FILE: &str = "Ledger.toml";
/// Prefix of environment variables that override the file.
pub const ENV_PREFIX: &str = "LEDGER_";

/// Ledger configuration, derived from `Ledger.toml` and `LEDGER_*`
/// environment variables.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    root: Identity,
    #[serde(default)]
    journal_path: Option<PathBuf>,
    #[serde(default = "default_journal_sync")]
    journal_sync: bool,
    // secrets
    receipt_secret: String,
}

fn default_journal_sync() -> bool {
    true
}

impl Config {
    /// Configuration for a ledger without a journal.
    pub fn in_memory(root: impl Into<Identity>, receipt_secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            journal_path: None,
            journal_sync: true,
            receipt_secret: receipt_secret.into(),
        }
    }

    /// Use a journal at the given path.
    pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    /// Don't flush the journal to disk after every append.
    pub fn without_sync(mut self) -> Self {
        self.journal_sync = false;
        self
    }

    /// The providers configuration is loaded from, lowest priority first.
    pub fn figment() -> Figment {
        Figment::from(Toml::file(CONFIG_FILE)).merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load from the default providers.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    /// The identity that holds root authority, fixed at genesis.
    pub fn root(&self) -> &Identity {
        &self.root
    }

    /// Where the journal lives, if the ledger is durable.
    pub fn journal_path(&self) -> Option<&Path> {
        self.journal_path.as_deref()
    }

    /// Whether every journal append is flushed to disk before committing.
    pub fn journal_sync(&self) -> bool {
        self.journal_sync
    }

    /// Secret key used to sign voter receipts.
    pub fn receipt_secret(&self) -> &[u8] {
        self.receipt_secret.as_bytes()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("root", &self.root)
            .field("journal_path", &self.journal_path)
            .field("journal_sync", &self.journal_sync)
            .field("receipt_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn loads_file_with_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                root = "returning-officer"
                receipt_secret = "s3cret"
                "#,
            )?;
            let config = Config::load()?;
            assert_eq!(config.root(), &Identity::from("returning-officer"));
            assert_eq!(config.journal_path(), None);
            assert!(config.journal_sync());
            assert_eq!(config.receipt_secret(), b"s3cret");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                root = "returning-officer"
                receipt_secret = "s3cret"
                journal_path = "ledger.jsonl"
                "#,
            )?;
            jail.set_env("LEDGER_JOURNAL_SYNC", "false");
            jail.set_env("LEDGER_ROOT", "deputy");
            let config = Config::load()?;
            assert_eq!(config.root(), &Identity::from("deputy"));
            assert_eq!(config.journal_path(), Some(Path::new("ledger.jsonl")));
            assert!(!config.journal_sync());
            Ok(())
        });
    }

    #[test]
    fn missing_secret_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, r#"root = "returning-officer""#)?;
            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn debug_redacts_secret() {
        let config = Config::in_memory("root", "s3cret");
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
