//! Physical log formats and file naming.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension of binary (length-delimited protobuf) message logs.
pub const BINARY_LOG_EXTENSION: &str = ".protobuf.bin";

/// Suffix appended to a binary log holding a patch for another log.
pub const LOG_PATCH_EXTENSION: &str = ".logPatch";

/// Suffix of text logs converted from a binary log.
pub const CONVERTED_LOG_EXTENSION: &str = "_converted.log";

/// On-disk format of a message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One `<times> #ENCODING# <payload>` line per message.
    Text,
    /// Length-delimited protobuf records.
    Binary,
}

impl LogFormat {
    /// Selects the format from the file name alone.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        if is_binary_log_name(name) {
            Self::Binary
        } else {
            Self::Text
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the name carries the binary log extension, bare or patched.
#[must_use]
pub fn is_binary_log_name(name: &str) -> bool {
    name.ends_with(BINARY_LOG_EXTENSION)
        || name
            .strip_suffix(LOG_PATCH_EXTENSION)
            .is_some_and(|base| base.ends_with(BINARY_LOG_EXTENSION))
}

/// Removes the binary log extension (and any patch suffix) from a file name.
#[must_use]
pub fn strip_binary_extension(name: &str) -> &str {
    let base = name.strip_suffix(LOG_PATCH_EXTENSION).unwrap_or(name);
    base.strip_suffix(BINARY_LOG_EXTENSION).unwrap_or(base)
}

/// Name of the human-readable conversion of a binary log.
#[must_use]
pub fn converted_log_name(name: &str) -> String {
    format!("{}{CONVERTED_LOG_EXTENSION}", strip_binary_extension(name))
}

/// Whether the name is that of a converted binary log.
#[must_use]
pub fn is_converted_log_name(name: &str) -> bool {
    name.ends_with(CONVERTED_LOG_EXTENSION)
}
