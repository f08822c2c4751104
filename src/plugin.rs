//! Running a check from the command line to its exit status
//!
//! Every check goes through the same steps exactly once, in order:
//!
//! 1. parse the arguments (`-h`/`-V` stop here)
//! 2. validate them into a [`CheckConfiguration`]
//! 3. take the lock for this exact set of arguments
//! 4. collect the measurement
//! 5. evaluate it against the thresholds
//! 6. render the result
//!
//! Anything that goes wrong before step 5 produces `UNKNOWN`.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use structopt::StructOpt;
use tracing::{debug, info};

use crate::config::{validate, Candidate, CheckConfiguration, Descriptor};
use crate::db2::MetricCollector;
use crate::lock::{self, Liveness, LockGuard, ProcessTable};
use crate::output::CheckResult;
use crate::trace;
use crate::Status;

/// A single check, described declaratively
pub trait Check {
    /// The check's command line, which should flatten in `CommonArgs`
    type Args: StructOpt;
    /// Check-specific settings that survive validation
    type Options;
    type Measurement;

    const DESCRIPTOR: Descriptor;

    /// Split parsed arguments into what the validator looks at
    fn candidate(args: Self::Args) -> Candidate<Self::Options>;

    /// Turn a measurement into the final result
    fn evaluate(
        config: &CheckConfiguration<Self::Options>,
        measurement: Self::Measurement,
    ) -> CheckResult;
}

/// What the process prints and how it exits
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    pub text: String,
}

impl Outcome {
    fn new<S: Into<String>>(status: Status, text: S) -> Outcome {
        Outcome {
            status,
            text: text.into(),
        }
    }

    /// Print the text and exit with the status code
    pub fn exit(self) -> ! {
        print!("{}", self.text);
        self.status.exit()
    }
}

/// Runs checks, with the side effects pointed wherever the caller likes
pub struct Runner<'a> {
    lock_dir: PathBuf,
    trace_file: PathBuf,
    liveness: &'a dyn Liveness,
}

impl Runner<'static> {
    /// Locks in the temp directory, traces in the default trace file, and
    /// the kernel deciding which processes are alive
    pub fn system() -> Runner<'static> {
        Runner {
            lock_dir: env::temp_dir(),
            trace_file: trace::default_trace_file(),
            liveness: &ProcessTable,
        }
    }
}

impl<'a> Runner<'a> {
    pub fn new(lock_dir: PathBuf, trace_file: PathBuf, liveness: &'a dyn Liveness) -> Runner<'a> {
        Runner {
            lock_dir,
            trace_file,
            liveness,
        }
    }

    /// Run the check `C` with the full argument vector `argv`, program name
    /// included
    pub fn run<C, M, I, T>(&self, argv: I, collector: &mut M) -> Outcome
    where
        C: Check,
        M: MetricCollector<C::Options, Measurement = C::Measurement>,
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        let descriptor = C::DESCRIPTOR;

        let matches = match C::Args::clap().get_matches_from_safe(&argv) {
            Ok(matches) => matches,
            // help, and malformed or unknown options
            Err(e) => return Outcome::new(Status::Unknown, format!("{}\n", e.message)),
        };
        let usage = matches.usage().to_owned();
        let candidate = C::candidate(C::Args::from_clap(&matches));

        if candidate.common.version {
            return Outcome::new(
                Status::Unknown,
                format!("{} (part of db2-plugins) {}\n", descriptor.name, env!("CARGO_PKG_VERSION")),
            );
        }

        let trace_file = if candidate.common.trace {
            Some(self.trace_file.as_path())
        } else {
            None
        };
        trace::scoped(candidate.common.verbose, trace_file, || {
            self.checked::<C, M>(&argv, candidate, &usage, collector)
        })
    }

    /// Everything from validation on
    fn checked<C, M>(
        &self,
        argv: &[OsString],
        candidate: Candidate<C::Options>,
        usage: &str,
        collector: &mut M,
    ) -> Outcome
    where
        C: Check,
        M: MetricCollector<C::Options, Measurement = C::Measurement>,
    {
        let descriptor = C::DESCRIPTOR;
        info!(check = descriptor.name, "starting");

        let config = match validate(&descriptor, candidate) {
            Ok(config) => config,
            Err(e) => {
                debug!(environment = e.is_environment(), "invalid invocation: {}", e);
                return Outcome::new(Status::Unknown, format!("{}\n{}\n", e, usage));
            }
        };

        let args: Vec<String> = argv
            .iter()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let signature = lock::signature(descriptor.name, &args);
        let result = match LockGuard::acquire(&self.lock_dir, &signature, self.liveness) {
            Ok(_guard) => match collector.collect(&config) {
                Ok(measurement) => C::evaluate(&config, measurement),
                Err(e) => CheckResult::unknown(e.to_string()),
            },
            Err(e) => CheckResult::unknown(e.to_string()),
        };
        info!(status = %result.status(), "finished");

        let service = config.service_name(descriptor.name);
        Outcome::new(result.status(), result.render(config.output(), &service))
    }
}

/// Run `C` with the process arguments, print the result and exit
///
/// The lock is released before the process exits.
pub fn main<C, M>(mut collector: M) -> !
where
    C: Check,
    M: MetricCollector<C::Options, Measurement = C::Measurement>,
{
    let outcome = Runner::system().run::<C, M, _, _>(env::args_os(), &mut collector);
    outcome.exit()
}
