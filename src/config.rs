//! Turning parsed arguments into a validated `CheckConfiguration`

use std::fmt;
use std::path::{Path, PathBuf};

use crate::args::CommonArgs;
use crate::output::OutputMode;
use crate::thresholds::{ThresholdKind, Thresholds};

/// Where the instance profile lives, relative to the instance home
pub const PROFILE: &str = "sqllib/db2profile";

/// What a check is run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Instance,
    Database,
}

/// Whether a check needs a target object inside the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRule {
    None,
    NameOrId,
}

/// The static description of a check
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    /// Used in messages, lock names and Check_MK service names
    pub name: &'static str,
    pub scope: Scope,
    pub target: TargetRule,
    /// Allow a threshold of exactly `0` to mean "never trigger"
    pub disable_with_zero: bool,
}

/// A database object selected by name or by numeric id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Name(String),
    Id(u32),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Target::Name(ref name) => write!(f, "{}", name),
            Target::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Everything a check's arguments boil down to, before validation
#[derive(Debug)]
pub struct Candidate<O> {
    pub common: CommonArgs,
    pub database: Option<String>,
    pub target_name: Option<String>,
    pub target_id: Option<u32>,
    pub warning: f64,
    pub critical: f64,
    pub kind: ThresholdKind,
    /// Check-specific settings, carried through untouched
    pub options: O,
}

/// The validated inputs for one invocation
///
/// Only `validate` builds these, and nothing can change them afterwards.
#[derive(Debug)]
pub struct CheckConfiguration<O> {
    instance_home: PathBuf,
    database: Option<String>,
    target: Option<Target>,
    thresholds: Thresholds,
    verbosity: u8,
    output: OutputMode,
    trace: bool,
    options: O,
}

impl<O> CheckConfiguration<O> {
    pub fn instance_home(&self) -> &Path {
        &self.instance_home
    }

    /// The instance name, which is the last component of its home directory
    pub fn instance_name(&self) -> String {
        self.instance_home
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.instance_home.display().to_string())
    }

    pub fn profile(&self) -> PathBuf {
        self.instance_home.join(PROFILE)
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_ref().map(String::as_str)
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn output(&self) -> OutputMode {
        self.output
    }

    pub fn trace(&self) -> bool {
        self.trace
    }

    pub fn options(&self) -> &O {
        &self.options
    }

    /// The Check_MK service name: `<check>-<instance>[-<database>]`
    pub fn service_name(&self, check: &str) -> String {
        match self.database {
            Some(ref db) => format!("{}-{}-{}", check, self.instance_name(), db),
            None => format!("{}-{}", check, self.instance_name()),
        }
    }
}

/// Why a set of arguments was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingInstance,
    MissingDatabase,
    InvalidThreshold { which: &'static str, value: f64 },
    ThresholdOrder { warning: f64, critical: f64 },
    PercentageOver100 { which: &'static str, value: f64 },
    MissingTarget,
    InstanceNotFound(PathBuf),
    ProfileNotFound(PathBuf),
}

impl ValidationError {
    /// Errors in the environment rather than in the arguments themselves
    pub fn is_environment(&self) -> bool {
        match *self {
            ValidationError::InstanceNotFound(_) | ValidationError::ProfileNotFound(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ValidationError::*;
        match *self {
            MissingInstance => write!(f, "The instance home directory (-i) was not given."),
            MissingDatabase => write!(f, "The database name (-d) was not given."),
            InvalidThreshold { which, value } => write!(
                f,
                "The {} threshold must be a positive number, got {}.",
                which, value
            ),
            ThresholdOrder { warning, critical } => write!(
                f,
                "The warning threshold ({}) must be less than the critical threshold ({}).",
                warning, critical
            ),
            PercentageOver100 { which, value } => write!(
                f,
                "The {} threshold is a percentage and cannot be greater than 100, got {}.",
                which, value
            ),
            MissingTarget => write!(f, "Either a name (-n) or an id (--id) must be given."),
            InstanceNotFound(ref path) => write!(
                f,
                "The instance home directory {} does not exist.",
                path.display()
            ),
            ProfileNotFound(ref path) => {
                write!(f, "The instance profile {} was not found.", path.display())
            }
        }
    }
}

/// Check a candidate against the rules of its check
///
/// Rules are applied in order and the first failure wins:
///
/// 1. the instance home is given and not empty
/// 2. the database is given, for database checks
/// 3. thresholds are positive numbers (or exactly `0` to disable them, when
///    the check allows it) and warning is less than critical
/// 4. percentages are at most 100
/// 5. a target name or id is given, for checks that need one
/// 6. the instance home exists and holds the instance profile
pub fn validate<O>(
    descriptor: &Descriptor,
    candidate: Candidate<O>,
) -> Result<CheckConfiguration<O>, ValidationError> {
    let Candidate {
        common,
        database,
        target_name,
        target_id,
        warning,
        critical,
        kind,
        options,
    } = candidate;

    let instance_home = match common.instance {
        Some(ref path) if !path.as_os_str().is_empty() => path.clone(),
        _ => return Err(ValidationError::MissingInstance),
    };

    let database = match database {
        Some(db) => {
            let db = db.trim().to_owned();
            if db.is_empty() {
                None
            } else {
                Some(db)
            }
        }
        None => None,
    };
    if descriptor.scope == Scope::Database && database.is_none() {
        return Err(ValidationError::MissingDatabase);
    }

    let warning = threshold("warning", warning, descriptor.disable_with_zero)?;
    let critical = threshold("critical", critical, descriptor.disable_with_zero)?;
    if let (Some(w), Some(c)) = (warning, critical) {
        if w >= c {
            return Err(ValidationError::ThresholdOrder {
                warning: w,
                critical: c,
            });
        }
    }
    if kind == ThresholdKind::Percentage {
        for &(which, value) in &[("warning", warning), ("critical", critical)] {
            if let Some(value) = value {
                if value > 100.0 {
                    return Err(ValidationError::PercentageOver100 { which, value });
                }
            }
        }
    }

    let target = match (target_name, target_id) {
        (Some(ref name), _) if !name.trim().is_empty() => Some(Target::Name(name.trim().to_owned())),
        (_, Some(id)) => Some(Target::Id(id)),
        _ => None,
    };
    if descriptor.target == TargetRule::NameOrId && target.is_none() {
        return Err(ValidationError::MissingTarget);
    }

    if !instance_home.is_dir() {
        return Err(ValidationError::InstanceNotFound(instance_home));
    }
    let profile = instance_home.join(PROFILE);
    if !profile.is_file() {
        return Err(ValidationError::ProfileNotFound(profile));
    }

    Ok(CheckConfiguration {
        instance_home,
        database,
        target,
        thresholds: Thresholds {
            warning,
            critical,
            kind,
        },
        verbosity: common.verbose,
        output: common.output_mode(),
        trace: common.trace,
        options,
    })
}

/// A threshold value, `None` when disabled
fn threshold(
    which: &'static str,
    value: f64,
    disable_with_zero: bool,
) -> Result<Option<f64>, ValidationError> {
    if disable_with_zero && value == 0.0 {
        Ok(None)
    } else if value.is_finite() && value > 0.0 {
        Ok(Some(value))
    } else {
        Err(ValidationError::InvalidThreshold { which, value })
    }
}
