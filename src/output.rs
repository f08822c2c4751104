//! Rendering check results for the monitoring system
//!
//! Two protocols are supported:
//!
//! * the Nagios plugin format (`OutputMode::Standard`):
//!
//!   ```plain
//!   <summary>|<performance fields>
//!   <long detail>|<long performance fields>
//!   ```
//!
//! * the Check_MK local check format (`OutputMode::Tabular`), a single line:
//!
//!   ```plain
//!   <exit code> <check>-<instance>-<database> <performance fields|-> <summary>
//!   ```

use std::fmt;

use itertools::Itertools;

use crate::Status;

/// Printed instead of an empty summary
pub const NOT_EXECUTED: &str = "the test was not executed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Standard,
    Tabular,
}

/// A single performance data point, for graphing
#[derive(Debug, Clone, PartialEq)]
pub struct PerfField {
    label: String,
    value: f64,
    unit: &'static str,
    warn: Option<f64>,
    crit: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl PerfField {
    pub fn new<S: Into<String>>(label: S, value: f64) -> PerfField {
        PerfField {
            label: label.into(),
            value,
            unit: "",
            warn: None,
            crit: None,
            min: None,
            max: None,
        }
    }

    pub fn unit(mut self, unit: &'static str) -> PerfField {
        self.unit = unit;
        self
    }

    pub fn thresholds(mut self, warn: Option<f64>, crit: Option<f64>) -> PerfField {
        self.warn = warn;
        self.crit = crit;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> PerfField {
        self.min = min;
        self.max = max;
        self
    }

    /// `label=value;warn;crit;min;max` with a label safe for Check_MK
    fn tabular(&self) -> String {
        let label = self.label.replace(' ', "_");
        format!("{}={}", label, self.limits(&fmt_number(self.value)))
    }

    /// `value;warn;crit;min;max` without trailing empty fields
    fn limits(&self, value: &str) -> String {
        let fields = [self.warn, self.crit, self.min, self.max];
        let used = fields
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1);
        let mut out = value.to_owned();
        for field in &fields[..used] {
            out.push(';');
            if let Some(n) = field {
                out.push_str(&fmt_number(*n));
            }
        }
        out
    }
}

impl fmt::Display for PerfField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = format!("{}{}", fmt_number(self.value), self.unit);
        write!(f, "'{}'={}", self.label, self.limits(&value))
    }
}

/// Whole numbers without a trailing `.0`, everything else with at most two
/// decimals
fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.2}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    }
}

/// The outcome of one check, ready to be printed
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    status: Status,
    summary: String,
    long_detail: String,
    perf: Vec<PerfField>,
    long_perf: Vec<PerfField>,
}

impl CheckResult {
    pub fn new<S: Into<String>>(status: Status, summary: S) -> CheckResult {
        CheckResult {
            status,
            summary: summary.into(),
            long_detail: String::new(),
            perf: Vec::new(),
            long_perf: Vec::new(),
        }
    }

    /// A result for a check that could not produce a measurement
    pub fn unknown<S: Into<String>>(summary: S) -> CheckResult {
        CheckResult::new(Status::Unknown, summary)
    }

    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> CheckResult {
        self.long_detail = detail.into();
        self
    }

    pub fn with_perf(mut self, field: PerfField) -> CheckResult {
        self.perf.push(field);
        self
    }

    pub fn with_long_perf(mut self, field: PerfField) -> CheckResult {
        self.long_perf.push(field);
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn summary(&self) -> &str {
        if self.summary.trim().is_empty() {
            NOT_EXECUTED
        } else {
            &self.summary
        }
    }

    pub fn long_detail(&self) -> &str {
        &self.long_detail
    }

    /// Render in the Nagios plugin format
    pub fn standard(&self) -> String {
        let mut out = self.summary().to_owned();
        if !self.perf.is_empty() {
            out.push('|');
            out.push_str(&self.perf.iter().join(" "));
        }
        out.push('\n');
        if !self.long_detail.is_empty() || !self.long_perf.is_empty() {
            out.push_str(&self.long_detail);
            if !self.long_perf.is_empty() {
                out.push('|');
                out.push_str(&self.long_perf.iter().join(" "));
            }
            out.push('\n');
        }
        out
    }

    /// Render as a Check_MK local check line for the service `service`
    pub fn tabular(&self, service: &str) -> String {
        let perf = if self.perf.is_empty() && self.long_perf.is_empty() {
            "-".to_owned()
        } else {
            self.perf
                .iter()
                .chain(self.long_perf.iter())
                .map(PerfField::tabular)
                .join("|")
        };
        format!(
            "{} {} {} {}\n",
            self.status.code(),
            service,
            perf,
            self.summary()
        )
    }

    pub fn render(&self, mode: OutputMode, service: &str) -> String {
        match mode {
            OutputMode::Standard => self.standard(),
            OutputMode::Tabular => self.tabular(service),
        }
    }
}
