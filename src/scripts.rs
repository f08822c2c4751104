//! Documentation about the various scripts contained herein
//!
//! - [check-tablespace-size](#check-tablespace-size)
//! - [check-log-consumption](#check-log-consumption)
//! - [check-instance-memory](#check-instance-memory)
//! - [check-database-size](#check-database-size)
//!
//! All of them need to run as a user that can source the instance profile
//! (`<instance home>/sqllib/db2profile`), and all of them exit with `3`
//! (UNKNOWN) after printing the help or version.
//!
//! # check-tablespace-size
//!
//! Connects to the database.
//!
//! ```plain
//! $ check-tablespace-size --help
//! check-tablespace-size (part of db2-plugins) 0.1.0
//! Check the usage of a tablespace, as a percentage of its size.
//!
//! The tablespace is selected either by name or by id.
//!
//! USAGE:
//!     check-tablespace-size [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -K, --mk         Print the result as a Check_MK local check line
//!     -T, --trace      Append timestamped diagnostics to the trace log file
//!     -v, --verbose    Print diagnostics to stderr. Twice prints the executed commands, three times their raw output
//!     -V, --version    Prints version information
//!
//! OPTIONS:
//!     -c, --critical <critical>    Percent used to go critical at [default: 90]
//!     -d, --database <database>    Database holding the tablespace
//!         --id <id>                Id of the tablespace
//!     -i, --instance <instance>    Home directory of the DB2 instance, the one containing sqllib/db2profile
//!     -n, --name <name>            Name of the tablespace
//!     -w, --warning <warning>      Percent used to warn at [default: 80]
//! ```
//!
//! # check-log-consumption
//!
//! Connects to the database, except for HADR standby databases.
//!
//! ```plain
//! $ check-log-consumption --help
//! check-log-consumption (part of db2-plugins) 0.1.0
//! Check the transaction log utilization of a database.
//!
//! By default the used space is compared, as a percentage, against the thresholds. With --files the number of active
//! log files is compared against the configured primary and secondary log files instead, and the thresholds are
//! ignored.
//!
//! HADR standby databases are always OK.
//!
//! USAGE:
//!     check-log-consumption [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -f, --files      Count active log files against LOGPRIMARY and LOGSECOND
//!     -h, --help       Prints help information
//!     -K, --mk         Print the result as a Check_MK local check line
//!     -T, --trace      Append timestamped diagnostics to the trace log file
//!     -v, --verbose    Print diagnostics to stderr. Twice prints the executed commands, three times their raw output
//!     -V, --version    Prints version information
//!
//! OPTIONS:
//!     -c, --critical <critical>    Percent of the log used to go critical at [default: 90]
//!     -d, --database <database>    Database to check
//!     -i, --instance <instance>    Home directory of the DB2 instance, the one containing sqllib/db2profile
//!     -w, --warning <warning>      Percent of the log used to warn at [default: 80]
//! ```
//!
//! # check-instance-memory
//!
//! Runs `db2pd`, does not connect to any database.
//!
//! ```plain
//! $ check-instance-memory --help
//! check-instance-memory (part of db2-plugins) 0.1.0
//! Check the memory used by every member of an instance.
//!
//! Without --limit the usage is only reported. With it the usage of each member is compared, as a percentage of the
//! member's memory limit, against the thresholds, and the worst member decides the status.
//!
//! USAGE:
//!     check-instance-memory [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -l, --limit      Compare the usage against the memory limit of each member
//!     -K, --mk         Print the result as a Check_MK local check line
//!     -T, --trace      Append timestamped diagnostics to the trace log file
//!     -v, --verbose    Print diagnostics to stderr. Twice prints the executed commands, three times their raw output
//!     -V, --version    Prints version information
//!
//! OPTIONS:
//!     -c, --critical <critical>    Percent of the memory limit to go critical at [default: 90]
//!     -i, --instance <instance>    Home directory of the DB2 instance, the one containing sqllib/db2profile
//!     -w, --warning <warning>      Percent of the memory limit to warn at [default: 80]
//! ```
//!
//! # check-database-size
//!
//! Connects to the database.
//!
//! ```plain
//! $ check-database-size --help
//! check-database-size (part of db2-plugins) 0.1.0
//! Check the size of a database.
//!
//! The thresholds are byte counts, or with --percentage percentages of the database capacity. A threshold of 0 is
//! disabled, and both are disabled by default.
//!
//! USAGE:
//!     check-database-size [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help          Prints help information
//!     -K, --mk            Print the result as a Check_MK local check line
//!     -p, --percentage    Compare the size as a percentage of the database capacity
//!     -T, --trace         Append timestamped diagnostics to the trace log file
//!     -v, --verbose       Print diagnostics to stderr. Twice prints the executed commands, three times their raw
//!                         output
//!     -V, --version       Prints version information
//!
//! OPTIONS:
//!     -c, --critical <critical>    Size to go critical at, in bytes or percent; 0 disables [default: 0]
//!     -d, --database <database>    Database to check
//!     -i, --instance <instance>    Home directory of the DB2 instance, the one containing sqllib/db2profile
//!     -r, --refresh <refresh>      Refresh the cached size when it is older than this many minutes, -1 for the DB2
//!                                  default [default: -1]
//!     -w, --warning <warning>      Size to warn at, in bytes or percent; 0 disables [default: 0]
//! ```
