use std::fmt;

/// Target of critical records. The OTLP log bridge skips it and
/// [`crate::critical::CriticalLogLayer`] exports it at `FATAL` instead.
pub const CRITICAL_TARGET: &str = "greenhouse_app::critical";

/// Extra log level attached to a request, chosen from `number % 10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Buckets 1 through 5 map to a level; every other bucket emits nothing extra.
    pub fn for_request(number: u64) -> Option<Self> {
        match number % 10 {
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            3 => Some(Self::Warning),
            4 => Some(Self::Error),
            5 => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Debug => {
                "This is a debug message. It provides detailed information for debugging purposes."
            }
            Self::Info => {
                "This is an info message. It confirms that things are working as expected."
            }
            Self::Warning => {
                "This is a warning message. It indicates a potential issue that might need attention."
            }
            Self::Error => {
                "This is an error message. It indicates a serious problem that has occurred."
            }
            Self::Critical => {
                "This is a critical message. It indicates a severe issue that could lead to failure."
            }
        }
    }

    /// Emits the fixed message at the matching `tracing` level.
    ///
    /// `tracing` tops out at ERROR, so critical records go out at ERROR under
    /// [`CRITICAL_TARGET`] for local output and are exported at `FATAL`.
    pub fn emit(self) {
        let severity = self.as_str();
        let message = self.message();
        match self {
            Self::Debug => tracing::debug!(severity, "{message}"),
            Self::Info => tracing::info!(severity, "{message}"),
            Self::Warning => tracing::warn!(severity, "{message}"),
            Self::Error => tracing::error!(severity, "{message}"),
            Self::Critical => tracing::error!(target: CRITICAL_TARGET, severity, "{message}"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
