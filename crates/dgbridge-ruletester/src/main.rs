//! dgbridge-ruletester
//!
//! Checks a rules file against a list of expected transformations without
//! running a subprocess or connecting to Discord.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use dgbridge_core::tracing_init::{default_filter, init_tracing};
use dgbridge_core::{load_rules, load_user_directory};
use dgbridge_ruletester::{TestRunner, load_tests};

#[derive(Debug, Parser)]
#[command(name = "dgbridge-ruletester", version, about)]
struct Args {
    /// Rules to be tested
    #[arg(short, long)]
    rules: PathBuf,

    /// Path to test file
    #[arg(short, long)]
    test: PathBuf,

    /// Path to the file mapping in-game names to Discord user IDs for mentioning
    #[arg(short, long)]
    users: Option<PathBuf>,

    /// Log level filter (e.g. "warn", "debug")
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&default_filter("dgbridge_ruletester", &args.log_level), args.log_json);

    let rules = load_rules(&args.rules)
        .with_context(|| format!("Failed to load rules file {}", args.rules.display()))?;
    let users = load_user_directory(args.users.as_deref()).context("Failed to load user map")?;
    let tests = load_tests(&args.test)?;

    let mut out = io::stdout().lock();
    writeln!(
        out,
        "dgbridge rule tester (v{})\n",
        env!("CARGO_PKG_VERSION")
    )?;
    let summary = TestRunner::new(&rules, &users).run(&tests.tests, &mut out)?;

    Ok(if summary.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_and_logging_flags() {
        let args = Args::try_parse_from([
            "dgbridge-ruletester",
            "-r",
            "rules.json",
            "-t",
            "tests.json",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(args.rules, PathBuf::from("rules.json"));
        assert_eq!(args.test, PathBuf::from("tests.json"));
        assert!(args.users.is_none());
        assert!(args.log_json);
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn logs_are_plain_text_by_default() {
        let args = Args::try_parse_from(["dgbridge-ruletester", "-r", "a", "-t", "b"]).unwrap();
        assert!(!args.log_json);
    }

    #[test]
    fn rules_and_test_are_required() {
        assert!(Args::try_parse_from(["dgbridge-ruletester", "-r", "a"]).is_err());
    }
}
