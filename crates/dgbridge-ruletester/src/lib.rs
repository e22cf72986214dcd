//! Offline checker for dgbridge rule files.
//!
//! Test file:
//! ```json
//! {
//!   "Tests": [
//!     { "Name": "chat", "Direction": "SubprocessToDiscord",
//!       "Input": "<Steve> hi", "Expect": "**Steve**: hi" },
//!     { "Name": "say", "Direction": "DiscordToSubprocess",
//!       "Input": "hello", "Author": { "Username": "alice" }, "Expect": "say <alice> hello" }
//!   ]
//! }
//! ```
//!
//! An empty `Expect` asserts that the line is suppressed.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use dgbridge_core::{
    AuthorContext, Direction, Rules, UserDirectory, transform_inbound, transform_outbound,
};
use serde::Deserialize;
use tracing::debug;

/// Root of a test file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct TestFile {
    pub tests: Vec<TestCase>,
}

/// One expected transformation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct TestCase {
    pub name: String,
    pub direction: Direction,
    pub input: String,
    /// Author of an inbound message; ignored for outbound tests.
    #[serde(default)]
    pub author: AuthorContext,
    /// Expected output, `""` when the line must be suppressed.
    pub expect: String,
}

impl TestCase {
    /// Run the case, returning the actual output (`""` if suppressed).
    pub fn run(&self, rules: &Rules, users: &UserDirectory) -> String {
        let output = match self.direction {
            Direction::SubprocessToDiscord => transform_outbound(rules, users, &self.input),
            Direction::DiscordToSubprocess => transform_inbound(rules, &self.author, &self.input),
        };
        output.unwrap_or_default()
    }
}

/// Load and parse a test file.
pub fn load_tests(path: &Path) -> anyhow::Result<TestFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read test file {}", path.display()))?;
    let file: TestFile = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid test file {}", path.display()))?;
    if file.tests.is_empty() {
        anyhow::bail!("Test file {} contains no tests", path.display());
    }
    Ok(file)
}

/// Outcome of a test run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub const fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs test cases against a rule set and reports to a writer.
pub struct TestRunner<'a> {
    rules: &'a Rules,
    users: &'a UserDirectory,
}

impl<'a> TestRunner<'a> {
    pub const fn new(rules: &'a Rules, users: &'a UserDirectory) -> Self {
        Self { rules, users }
    }

    /// Run every case, writing one PASS/FAIL line per case and a summary.
    pub fn run(&self, tests: &[TestCase], out: &mut impl Write) -> std::io::Result<Summary> {
        let mut summary = Summary::default();
        for case in tests {
            let actual = case.run(self.rules, self.users);
            debug!(
                name = %case.name,
                direction = %case.direction,
                actual = %actual,
                "Test case ran"
            );
            if actual == case.expect {
                summary.passed += 1;
                writeln!(out, "PASS  {}", case.name)?;
            } else {
                summary.failed += 1;
                writeln!(out, "FAIL  {} ({})", case.name, case.direction)?;
                writeln!(out, "      input:    {:?}", case.input)?;
                writeln!(out, "      expected: {}", describe(&case.expect))?;
                writeln!(out, "      actual:   {}", describe(&actual))?;
            }
        }
        writeln!(
            out,
            "\n{} passed, {} failed, {} total",
            summary.passed,
            summary.failed,
            tests.len()
        )?;
        Ok(summary)
    }
}

fn describe(output: &str) -> String {
    if output.is_empty() {
        "(suppressed)".to_string()
    } else {
        format!("{output:?}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dgbridge_core::Rule;

    use super::*;

    fn rules() -> Rules {
        Rules {
            subprocess_to_discord: vec![Rule::new(r"^<(\w+)> (.*)$", "**${1}**: ${2}").unwrap()],
            discord_to_subprocess: vec![Rule::new(r"^(.+)$", "say <^U#^T> ${1}").unwrap()],
        }
    }

    fn parse(json: &str) -> TestFile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_test_file_with_optional_author() {
        let file = parse(
            r#"{"Tests":[
                {"Name":"a","Direction":"SubprocessToDiscord","Input":"x","Expect":""},
                {"Name":"b","Direction":"DiscordToSubprocess","Input":"y",
                 "Author":{"Username":"bob","Discriminator":"0001","AccentColor":255},"Expect":"z"}
            ]}"#,
        );
        assert_eq!(file.tests.len(), 2);
        assert_eq!(file.tests[0].direction, Direction::SubprocessToDiscord);
        assert_eq!(file.tests[0].author, AuthorContext::default());
        assert_eq!(file.tests[1].author.username, "bob");
        assert_eq!(file.tests[1].author.accent_color, 255);
    }

    #[test]
    fn rejects_unknown_direction() {
        let result: Result<TestFile, _> = serde_json::from_str(
            r#"{"Tests":[{"Name":"a","Direction":"Sideways","Input":"x","Expect":""}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn runs_cases_in_both_directions() {
        let users = UserDirectory::new();
        let file = parse(
            r#"{"Tests":[
                {"Name":"chat","Direction":"SubprocessToDiscord","Input":"<Steve> hi","Expect":"**Steve**: hi"},
                {"Name":"noise","Direction":"SubprocessToDiscord","Input":"[INFO] tick","Expect":""},
                {"Name":"say","Direction":"DiscordToSubprocess","Input":"hello",
                 "Author":{"Username":"alice","Discriminator":"42"},"Expect":"say <alice#42> hello"}
            ]}"#,
        );
        let mut out = Vec::new();
        let summary = TestRunner::new(&rules(), &users)
            .run(&file.tests, &mut out)
            .unwrap();

        assert_eq!(summary, Summary { passed: 3, failed: 0 });
        assert!(summary.success());
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("PASS  chat"));
        assert!(report.contains("3 passed, 0 failed, 3 total"));
    }

    #[test]
    fn reports_failures_with_expected_and_actual() {
        let users = UserDirectory::new();
        let file = parse(
            r#"{"Tests":[
                {"Name":"wrong","Direction":"SubprocessToDiscord","Input":"<Steve> hi","Expect":"Steve: hi"},
                {"Name":"leaks","Direction":"SubprocessToDiscord","Input":"[INFO] tick","Expect":"tick"}
            ]}"#,
        );
        let mut out = Vec::new();
        let summary = TestRunner::new(&rules(), &users)
            .run(&file.tests, &mut out)
            .unwrap();

        assert_eq!(summary, Summary { passed: 0, failed: 2 });
        assert!(!summary.success());
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("FAIL  wrong (SubprocessToDiscord)"));
        assert!(report.contains("actual:   \"**Steve**: hi\""));
        assert!(report.contains("actual:   (suppressed)"));
    }

    #[test]
    fn load_tests_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.json");
        std::fs::write(&path, r#"{"Tests":[]}"#).unwrap();
        assert!(load_tests(&path).is_err());
    }

    #[test]
    fn load_tests_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.json");
        std::fs::write(
            &path,
            r#"{"Tests":[{"Name":"a","Direction":"SubprocessToDiscord","Input":"x","Expect":""}]}"#,
        )
        .unwrap();
        assert_eq!(load_tests(&path).unwrap().tests.len(), 1);
    }
}
