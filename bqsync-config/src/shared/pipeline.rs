use serde::{Deserialize, Serialize};

fn default_source_timezone() -> String {
    PipelineConfig::LOCAL_TIMEZONE.to_string()
}

/// Behaviour of the change-event pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Time zone in which the source stores `DATETIME`/`TIMESTAMP` text values.
    ///
    /// Either `local` (the time zone of the host) or a fixed offset such as `+02:00`.
    #[serde(default = "default_source_timezone")]
    pub source_timezone: String,
    /// Table name patterns whose events are processed.
    ///
    /// Events for other tables are skipped. When absent, the rule patterns are used, so every
    /// table with a rule is processed.
    #[serde(default)]
    pub include_tables: Option<Vec<String>>,
}

impl PipelineConfig {
    /// Value of [`PipelineConfig::source_timezone`] selecting the host time zone.
    pub const LOCAL_TIMEZONE: &'static str = "local";
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_timezone: default_source_timezone(),
            include_tables: None,
        }
    }
}
