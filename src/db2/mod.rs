//! Getting measurements out of DB2
//!
//! Checks never talk to DB2 directly. They implement [`MetricCollector`],
//! usually on top of [`Db2Cli`], which runs the command line processor or
//! `db2pd` in a shell with the instance profile sourced. Tests swap in
//! collectors that return canned measurements.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

use derive_more::From;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::config::CheckConfiguration;

pub mod parse;

/// Source of the measurement for one check
pub trait MetricCollector<O> {
    type Measurement;

    fn collect(
        &mut self,
        config: &CheckConfiguration<O>,
    ) -> Result<Self::Measurement, CollectionError>;
}

/// Why no measurement could be collected
#[derive(Debug, From)]
pub enum CollectionError {
    /// The shell or tool could not be started at all
    Io(io::Error),
    /// DB2 answered with an error message, e.g. no connection or no
    /// permission
    #[from(ignore)]
    Engine { code: String, message: String },
    /// DB2 answered, but not with anything usable
    #[from(ignore)]
    NoMeasurement(String),
}

impl CollectionError {
    pub fn no_measurement<S: Into<String>>(why: S) -> CollectionError {
        CollectionError::NoMeasurement(why.into())
    }
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CollectionError::Io(ref e) => write!(f, "Could not run the DB2 tools: {}", e),
            CollectionError::Engine {
                ref code,
                ref message,
            } => write!(f, "DB2 returned {}: {}", code, message),
            CollectionError::NoMeasurement(ref why) => write!(f, "{}", why),
        }
    }
}

lazy_static! {
    /// DB2 error messages look like `SQL1032N  No start database manager ...`
    static ref ERROR_MARKER: Regex = Regex::new(r"\b(SQL\d{4,5}N|DB2\d{4,5}E)\b").unwrap();
}

/// Printed between the connection banner and the query output
const DELIMITER: &str = "--- db2-plugins result ---";

/// The first DB2 error message in `output`, if any
pub fn find_error(output: &str) -> Option<CollectionError> {
    output.lines().find_map(|line| {
        ERROR_MARKER.captures(line).map(|caps| CollectionError::Engine {
            code: caps[1].to_owned(),
            message: line.trim().to_owned(),
        })
    })
}

/// Quote `s` for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quote `s` as an SQL string literal
pub fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Runs the DB2 command line tools for one instance
#[derive(Debug, Clone)]
pub struct Db2Cli {
    shell: String,
}

impl Default for Db2Cli {
    fn default() -> Db2Cli {
        Db2Cli::new()
    }
}

impl Db2Cli {
    pub fn new() -> Db2Cli {
        Db2Cli {
            shell: "/bin/sh".to_owned(),
        }
    }

    /// Use a different shell, mostly useful for tests
    pub fn with_shell<S: Into<String>>(shell: S) -> Db2Cli {
        Db2Cli {
            shell: shell.into(),
        }
    }

    /// Run one command in the command line processor and return its output
    ///
    /// With a database, this is a full session: connect, run `command`, and
    /// terminate, with the terminate running whether or not anything before
    /// it failed. Without one only `command` and the terminate are run.
    /// `command` is passed to `db2` as is, e.g. `-x "SELECT 1 FROM SYSIBM.SYSDUMMY1"`.
    pub fn clp(
        &self,
        profile: &Path,
        database: Option<&str>,
        command: &str,
    ) -> Result<String, CollectionError> {
        let mut script = format!(". {}\n", shell_quote(&profile.to_string_lossy()));
        if let Some(db) = database {
            script.push_str(&format!("db2 connect to {}\n", shell_quote(db)));
        }
        script.push_str(&format!("echo {}\n", shell_quote(DELIMITER)));
        script.push_str(&format!("db2 {}\n", command));
        script.push_str("db2 terminate > /dev/null\n");
        let output = self.run(&script)?;
        Ok(after_delimiter(&output).to_owned())
    }

    /// Run `db2pd` with `options`
    pub fn db2pd(&self, profile: &Path, options: &str) -> Result<String, CollectionError> {
        let script = format!(
            ". {}\necho {}\ndb2pd {}\n",
            shell_quote(&profile.to_string_lossy()),
            shell_quote(DELIMITER),
            options
        );
        let output = self.run(&script)?;
        Ok(after_delimiter(&output).to_owned())
    }

    fn run(&self, script: &str) -> Result<String, CollectionError> {
        debug!(shell = %self.shell, script, "running");
        let output = Command::new(&self.shell).arg("-c").arg(script).output()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        trace!(status = ?output.status, output = %text, "finished");
        match find_error(&text) {
            Some(err) => Err(err),
            None => Ok(text),
        }
    }
}

fn after_delimiter(output: &str) -> &str {
    match output.rfind(DELIMITER) {
        Some(i) => output[i + DELIMITER.len()..].trim_start_matches(|c| c == '\r' || c == '\n'),
        None => output,
    }
}
