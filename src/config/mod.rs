//! Configuration loading for embedders.
//!
//! Settings are layered: compiled-in defaults, then an optional
//! `config/default.toml`, then environment variables (`JOURNAL_PATH`,
//! `LOGGING_LEVEL`, ...). Only the journal and logging need configuration;
//! the engine itself has no tunables.

mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{JournalSettings, LoggingSettings, Settings};

/// Loads the configuration from the default file and environment variables
/// and merges it over the compiled-in defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Deserialize what is available, then fill the gaps with defaults.
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        journal: JournalSettings {
            path: partial
                .journal
                .as_ref()
                .and_then(|j| j.path.clone())
                .unwrap_or(default.journal.path),
            event_ttl_secs: partial
                .journal
                .as_ref()
                .and_then(|j| j.event_ttl_secs)
                .unwrap_or(default.journal.event_ttl_secs),
            max_events_per_conversation: partial
                .journal
                .as_ref()
                .and_then(|j| j.max_events_per_conversation)
                .unwrap_or(default.journal.max_events_per_conversation),
        },
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}
