//! Builder configuration.

use tracing::Level;

/// How executed statements are logged.
///
/// Statements are emitted under the `relmap.sql` target before they are sent
/// to the client.
#[derive(Debug, Clone)]
pub struct SqlLogConfig {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Whether statements are logged at all.
    pub enabled: bool,
}

impl Default for SqlLogConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            enabled: true,
        }
    }
}

impl SqlLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn truncate<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while end > 0 && !sql.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &sql[..end]).into()
            }
            _ => sql.into(),
        }
    }

    pub(crate) fn emit(&self, kind: &str, sql: &str, param_count: usize) {
        if !self.enabled {
            return;
        }

        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate(sql);
        emit_at_level!(
            self.level,
            target: "relmap.sql",
            kind,
            param_count,
            sql = %sql,
        );
    }
}

/// Per-builder settings.
#[derive(Debug, Clone)]
pub struct OrmConfig {
    /// Alias of the main table when none is set on the builder.
    pub default_alias: String,
    /// Skip leading rows in-process when the dialect has no native OFFSET.
    pub emulate_offset: bool,
    /// Statement logging.
    pub sql_log: SqlLogConfig,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            default_alias: "t0".to_string(),
            emulate_offset: true,
            sql_log: SqlLogConfig::default(),
        }
    }
}

impl OrmConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_alias(mut self, alias: impl Into<String>) -> Self {
        self.default_alias = alias.into();
        self
    }

    /// Allow or forbid offset emulation. When forbidden, a select with an
    /// offset against a dialect without OFFSET fails with `InvalidState`.
    pub fn emulate_offset(mut self, enabled: bool) -> Self {
        self.emulate_offset = enabled;
        self
    }

    pub fn sql_log(mut self, log: SqlLogConfig) -> Self {
        self.sql_log = log;
        self
    }
}
