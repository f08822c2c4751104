//! Strongly typed DB2 checks for Nagios-compatible monitoring systems
//!
//! Every check shipped in `src/bin` follows the same contract: parse the
//! command line, validate it, take a lock keyed by the arguments, collect a
//! single metric through the DB2 command line tools, compare it against the
//! warning and critical thresholds and print the result in either the Nagios
//! plugin format or the Check_MK local check format.
//!
//! The pieces of that contract live in this library so a check only has to
//! describe what it measures:
//!
//! ```rust,ignore
//! fn main() {
//!     db2_plugins::plugin::main::<TablespaceSize, _>(TablespaceQuery::new());
//! }
//! ```
//!
//! See the [`scripts`] module for the list of checks and their options.

use std::fmt;
use std::process;
use std::str::FromStr;

pub mod args;
pub mod config;
pub mod db2;
pub mod lock;
pub mod output;
pub mod plugin;
pub mod scripts;
pub mod thresholds;
pub mod trace;

/// All possible exit statuses for a check
///
/// The variants are ordered by their exit code, so `max` picks `Unknown` over
/// everything else. Use [`Status::aggregate`] when combining the results of
/// several sub-targets, which ranks `Unknown` lowest instead.
#[must_use]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// The process exit code the monitoring system expects for this status
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    /// Exit the process with the status code of this status
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }

    /// Combine the statuses of several sub-targets into one
    ///
    /// The worst status wins, but `Unknown` only wins if no sub-target
    /// produced a usable measurement at all (including when there are no
    /// sub-targets).
    pub fn aggregate<I: IntoIterator<Item = Status>>(statuses: I) -> Status {
        statuses
            .into_iter()
            .filter(|status| *status != Status::Unknown)
            .max()
            .unwrap_or(Status::Unknown)
    }

    pub fn str_values() -> [&'static str; 4] {
        ["ok", "warning", "critical", "unknown"]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        write!(f, "{}", msg)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Status, String> {
        match s.to_ascii_lowercase().as_ref() {
            "ok" => Ok(Status::Ok),
            "warning" | "warn" => Ok(Status::Warning),
            "critical" | "crit" => Ok(Status::Critical),
            "unknown" => Ok(Status::Unknown),
            _ => Err(format!(
                "Unexpected status `{}`, expected one of: {}",
                s,
                Status::str_values().join(", ")
            )),
        }
    }
}
