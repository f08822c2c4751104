//! Mapping measurements onto statuses

use std::fmt;

use crate::Status;

/// How threshold values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    /// Percentages, which may not exceed 100
    Percentage,
    /// Absolute quantities such as byte counts
    Absolute,
}

/// A validated warning/critical pair
///
/// Either side may be disabled (`None`), in which case that branch never
/// triggers. When both are set `warning < critical` holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: Option<f64>,
    pub critical: Option<f64>,
    pub kind: ThresholdKind,
}

impl Thresholds {
    /// Compare a value: `>= critical` is critical, `>= warning` is warning
    pub fn status_of(&self, value: f64) -> Status {
        match (self.warning, self.critical) {
            (_, Some(crit)) if value >= crit => Status::Critical,
            (Some(warn), _) if value >= warn => Status::Warning,
            _ => Status::Ok,
        }
    }

    /// Compare a measurement that may be missing or unparseable
    ///
    /// Anything that isn't a finite number is `Unknown`, whatever the
    /// thresholds are.
    pub fn evaluate(&self, measurement: Option<f64>) -> Status {
        match measurement {
            Some(value) if value.is_finite() => self.status_of(value),
            _ => Status::Unknown,
        }
    }
}

impl fmt::Display for Thresholds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let unit = match self.kind {
            ThresholdKind::Percentage => "%",
            ThresholdKind::Absolute => "",
        };
        let side = |t: Option<f64>| match t {
            Some(v) => format!("{}{}", v, unit),
            None => "disabled".to_owned(),
        };
        write!(
            f,
            "warning {}, critical {}",
            side(self.warning),
            side(self.critical)
        )
    }
}

/// The status and text for one sub-target of a multi-target check
#[derive(Debug, Clone, PartialEq)]
pub struct SubResult {
    pub status: Status,
    pub detail: String,
}

/// Combine sub-target results
///
/// Returns the aggregated status (see [`Status::aggregate`]) and the details
/// joined in encounter order.
pub fn combine(results: &[SubResult]) -> (Status, String) {
    let status = Status::aggregate(results.iter().map(|r| r.status));
    let detail = results
        .iter()
        .map(|r| r.detail.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    (status, detail)
}

#[cfg(test)]
mod unit {
    use super::{combine, SubResult, ThresholdKind, Thresholds};
    use crate::Status;

    fn percent(warning: f64, critical: f64) -> Thresholds {
        Thresholds {
            warning: Some(warning),
            critical: Some(critical),
            kind: ThresholdKind::Percentage,
        }
    }

    #[test]
    fn percentage_bands() {
        let t = percent(80.0, 90.0);
        assert_eq!(t.status_of(0.0), Status::Ok);
        assert_eq!(t.status_of(79.9), Status::Ok);
        assert_eq!(t.status_of(80.0), Status::Warning);
        assert_eq!(t.status_of(85.0), Status::Warning);
        assert_eq!(t.status_of(89.99), Status::Warning);
        assert_eq!(t.status_of(90.0), Status::Critical);
        assert_eq!(t.status_of(100.0), Status::Critical);
    }

    #[test]
    fn bands_hold_for_every_valid_pair() {
        for warning in 1..100 {
            for critical in (warning + 1)..=100 {
                let t = percent(f64::from(warning), f64::from(critical));
                for m in 0..=100 {
                    let expected = if m < warning {
                        Status::Ok
                    } else if m < critical {
                        Status::Warning
                    } else {
                        Status::Critical
                    };
                    assert_eq!(t.status_of(f64::from(m)), expected, "w={} c={} m={}", warning, critical, m);
                }
            }
        }
    }

    #[test]
    fn disabled_sides_never_trigger() {
        let no_crit = Thresholds {
            warning: Some(1000.0),
            critical: None,
            kind: ThresholdKind::Absolute,
        };
        assert_eq!(no_crit.status_of(1e12), Status::Warning);

        let no_warn = Thresholds {
            warning: None,
            critical: Some(1000.0),
            kind: ThresholdKind::Absolute,
        };
        assert_eq!(no_warn.status_of(999.0), Status::Ok);
        assert_eq!(no_warn.status_of(1000.0), Status::Critical);

        let neither = Thresholds {
            warning: None,
            critical: None,
            kind: ThresholdKind::Absolute,
        };
        assert_eq!(neither.status_of(f64::MAX), Status::Ok);
    }

    #[test]
    fn missing_measurement_is_unknown() {
        let t = percent(80.0, 90.0);
        assert_eq!(t.evaluate(None), Status::Unknown);
        assert_eq!(t.evaluate(Some(f64::NAN)), Status::Unknown);
        assert_eq!(t.evaluate(Some(95.0)), Status::Critical);
    }

    #[test]
    fn combine_keeps_encounter_order() {
        let results = vec![
            SubResult {
                status: Status::Ok,
                detail: "Member 0 is fine.".to_owned(),
            },
            SubResult {
                status: Status::Unknown,
                detail: "Member 1 did not answer.".to_owned(),
            },
            SubResult {
                status: Status::Warning,
                detail: "Member 2 is high.".to_owned(),
            },
        ];
        let (status, detail) = combine(&results);
        assert_eq!(status, Status::Warning);
        assert_eq!(
            detail,
            "Member 0 is fine. Member 1 did not answer. Member 2 is high."
        );
    }

    #[test]
    fn display() {
        let t = Thresholds {
            warning: Some(80.0),
            critical: None,
            kind: ThresholdKind::Percentage,
        };
        assert_eq!(t.to_string(), "warning 80%, critical disabled");
    }
}
