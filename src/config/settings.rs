use serde::Deserialize;

/// Top-level configuration settings for an embedding application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub journal: JournalSettings,
    pub logging: LoggingSettings,
}

/// Configuration for the event journal.
///
/// A zero TTL or cap disables the corresponding retention policy.
#[derive(Debug, Deserialize, Clone)]
pub struct JournalSettings {
    pub path: String,
    pub event_ttl_secs: u64,
    pub max_events_per_conversation: usize,
}

/// Logging configuration, consumed by `utils::logging::init`.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled
/// using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub journal: Option<PartialJournalSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialJournalSettings {
    pub path: Option<String>,
    pub event_ttl_secs: Option<u64>,
    pub max_events_per_conversation: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            journal: JournalSettings {
                path: "chatsync_journal".to_string(),
                // One week of history, capped per conversation.
                event_ttl_secs: 604_800,
                max_events_per_conversation: 1000,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
