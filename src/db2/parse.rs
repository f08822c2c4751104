//! Picking values out of DB2 tool output
//!
//! All functions here are pure and forgiving: they return `None` (or skip a
//! block) rather than failing when the text doesn't look as expected, and the
//! caller decides whether that makes the measurement unusable.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PARAMETER: Regex =
        Regex::new(r"(?m)^\s*Parameter Name\s*:\s*(\S+)\s*\n\s*Parameter Value\s*:\s*(\S+)").unwrap();
    static ref MEMBER: Regex = Regex::new(r"^\s*Database (?:Member|Partition) (\d+)").unwrap();
    static ref KILOBYTES: Regex = Regex::new(r"^\s*([A-Za-z ]+?):\s*(\d+)\s*KB").unwrap();
}

/// The numbers in the first non-empty line of `db2 -x` output
pub fn first_row(output: &str) -> Vec<f64> {
    output
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_whitespace()
                .filter_map(|token| token.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// A value from `get db cfg` or `get dbm cfg` output
///
/// `key` is matched anywhere in the description, so both the label
/// (`HADR database role`) and the parameter name (`(LOGPRIMARY)`) work.
pub fn cfg_value<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output
        .lines()
        .filter(|line| line.contains(key))
        .filter_map(|line| line.splitn(2, '=').nth(1))
        .filter_map(|value| value.split_whitespace().next())
        .next()
}

/// An output parameter of a `CALL` in the command line processor
pub fn procedure_parameter<'a>(output: &'a str, name: &str) -> Option<&'a str> {
    PARAMETER
        .captures_iter(output)
        .find(|caps| caps.get(1).map(|m| m.as_str()) == Some(name))
        .and_then(|caps| caps.get(2).map(|m| m.as_str()))
}

/// The memory controller figures `db2pd -dbptnmem` prints for one member
#[derive(Debug, Clone, PartialEq)]
pub struct MemberMemory {
    pub member: u32,
    pub limit_kb: Option<u64>,
    pub usage_kb: Option<u64>,
}

/// One entry per `Database Member` block, in the order they appear
pub fn member_memory(output: &str) -> Vec<MemberMemory> {
    let mut members: Vec<MemberMemory> = Vec::new();
    for line in output.lines() {
        if let Some(caps) = MEMBER.captures(line) {
            if let Ok(member) = caps[1].parse() {
                members.push(MemberMemory {
                    member,
                    limit_kb: None,
                    usage_kb: None,
                });
            }
            continue;
        }
        let current = match members.last_mut() {
            Some(current) => current,
            None => continue,
        };
        if let Some(caps) = KILOBYTES.captures(line) {
            let value = caps[2].parse().ok();
            match caps[1].trim() {
                "Memory Limit" if current.limit_kb.is_none() => current.limit_kb = value,
                "Current usage" if current.usage_kb.is_none() => current.usage_kb = value,
                _ => {}
            }
        }
    }
    members
}

#[cfg(test)]
mod unit {
    use super::{cfg_value, first_row, member_memory, procedure_parameter, MemberMemory};

    const DB_CFG: &str = "
       Database Configuration for Database SAMPLE

 Database configuration release level                    = 0x1400
 Number of primary log files                (LOGPRIMARY) = 3
 Number of secondary log files               (LOGSECOND) = 1
 HADR database role                                      = STANDARD
";

    const DBSIZE: &str = "
  Value of output parameters
  --------------------------
  Parameter Name  : SNAPSHOTTIMESTAMP
  Parameter Value : 2024-05-02-10.31.12.427000

  Parameter Name  : DATABASESIZE
  Parameter Value : 88031232

  Parameter Name  : DATABASECAPACITY
  Parameter Value : 104857600

  Return Status = 0
";

    const DBPTNMEM: &str = "
Database Member 0 -- Active -- Up 3 days 04:12:55 -- Date 2024-05-02-10.31.12.427000

Database Member Memory Controller Statistics

Controller Automatic: Y
Memory Limit:         8388608 KB
Current usage:        1048576 KB
HWM usage:            2097152 KB
Cached memory:        262144 KB

Individual Memory Consumers:

Name             Mem Used (KB) HWM Used (KB) Cached (KB)
========================================================
APPL-SAMPLE             160000        160000      158720

Database Member 1 -- Active -- Up 3 days 04:12:50 -- Date 2024-05-02-10.31.12.427000

Database Member Memory Controller Statistics

Controller Automatic: Y
Memory Limit:         8388608 KB
Current usage:        7340032 KB
";

    #[test]
    fn first_row_numbers() {
        assert_eq!(first_row("\n        85.43\n"), vec![85.43]);
        assert_eq!(first_row("  1024   2048  \n  1 2\n"), vec![1024.0, 2048.0]);
        assert!(first_row("\n\n").is_empty());
        assert!(first_row("SQL0100W  No row was found").is_empty());
    }

    #[test]
    fn cfg_values() {
        assert_eq!(cfg_value(DB_CFG, "(LOGPRIMARY)"), Some("3"));
        assert_eq!(cfg_value(DB_CFG, "(LOGSECOND)"), Some("1"));
        assert_eq!(cfg_value(DB_CFG, "HADR database role"), Some("STANDARD"));
        assert_eq!(cfg_value(DB_CFG, "(LOGFILSIZ)"), None);
    }

    #[test]
    fn procedure_parameters() {
        assert_eq!(procedure_parameter(DBSIZE, "DATABASESIZE"), Some("88031232"));
        assert_eq!(procedure_parameter(DBSIZE, "DATABASECAPACITY"), Some("104857600"));
        assert_eq!(procedure_parameter(DBSIZE, "OBJECTCOUNT"), None);
    }

    #[test]
    fn members_in_order() {
        assert_eq!(
            member_memory(DBPTNMEM),
            vec![
                MemberMemory {
                    member: 0,
                    limit_kb: Some(8_388_608),
                    usage_kb: Some(1_048_576),
                },
                MemberMemory {
                    member: 1,
                    limit_kb: Some(8_388_608),
                    usage_kb: Some(7_340_032),
                },
            ]
        );
    }

    #[test]
    fn members_without_figures_are_kept() {
        let out = "Database Member 3 -- Unable to attach\n";
        assert_eq!(
            member_memory(out),
            vec![MemberMemory {
                member: 3,
                limit_kb: None,
                usage_kb: None,
            }]
        );
        assert!(member_memory("nothing here").is_empty());
    }
}
