//! Shared helpers for fasthtml golden and snapshot tests.

use fasthtml::error::ScanIssue;
use fasthtml::token::Token;
use fasthtml::token_fmt::{escape_text_into, format_token};
use serde::Deserialize;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_text_into(&mut out, text);
    out
}

pub fn format_tokens(tokens: &[Token]) -> Vec<String> {
    tokens.iter().map(format_token).collect()
}

/// `code@position`, e.g. `stray-less-than@3`.
pub fn format_issues(issues: &[ScanIssue]) -> Vec<String> {
    issues
        .iter()
        .map(|issue| format!("{}@{}", issue.code, issue.position))
        .collect()
}

pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    let max = expected.len().max(actual.len());
    let missing = "<missing>";
    let mut out = String::new();
    let mismatch = (0..max).find(|&i| {
        expected.get(i).map(String::as_str) != actual.get(i).map(String::as_str)
    });
    if let Some(i) = mismatch {
        let start = i.saturating_sub(2);
        let end = (i + 3).min(max);
        let _ = writeln!(
            &mut out,
            "first mismatch at line {} (showing {}..={}):",
            i + 1,
            start + 1,
            end
        );
        for line_idx in start..end {
            let left = expected.get(line_idx).map_or(missing, String::as_str);
            let right = actual.get(line_idx).map_or(missing, String::as_str);
            let marker = if line_idx == i { ">" } else { " " };
            let _ = writeln!(&mut out, "{marker} {:>4}  expected: {left}", line_idx + 1);
            let _ = writeln!(&mut out, "{marker} {:>4}    actual: {right}", line_idx + 1);
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

/// One golden case: an input document and the formatted tokens it must
/// produce.
#[derive(Clone, Debug, Deserialize)]
pub struct GoldenCase {
    pub name: String,
    pub input: String,
    #[serde(default = "default_true")]
    pub decode_entities: bool,
    #[serde(default)]
    pub text_limit: Option<usize>,
    #[serde(default)]
    pub encoding: Option<String>,
    pub tokens: Vec<String>,
    /// When absent, issues are not checked.
    #[serde(default)]
    pub issues: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GoldenFile {
    #[serde(rename = "case", default)]
    cases: Vec<GoldenCase>,
}

#[derive(Debug)]
pub enum FixtureError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    DuplicateName { path: PathBuf, name: String },
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            FixtureError::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
            FixtureError::DuplicateName { path, name } => {
                write!(f, "duplicate case name '{name}' in {}", path.display())
            }
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FixtureError::Io { source, .. } => Some(source),
            FixtureError::Parse { source, .. } => Some(source),
            FixtureError::DuplicateName { .. } => None,
        }
    }
}

/// Load every `*.toml` file under `dir`, in file-name order.
pub fn load_golden_cases(dir: &Path) -> Result<Vec<GoldenCase>, FixtureError> {
    let read_dir = fs::read_dir(dir).map_err(|source| FixtureError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| FixtureError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut cases: Vec<GoldenCase> = Vec::new();
    for path in paths {
        let text = fs::read_to_string(&path).map_err(|source| FixtureError::Io {
            path: path.clone(),
            source,
        })?;
        let file: GoldenFile = toml::from_str(&text).map_err(|source| FixtureError::Parse {
            path: path.clone(),
            source,
        })?;
        for case in file.cases {
            if cases.iter().any(|seen| seen.name == case.name) {
                return Err(FixtureError::DuplicateName {
                    path,
                    name: case.name,
                });
            }
            cases.push(case);
        }
    }
    Ok(cases)
}

fn default_true() -> bool {
    true
}
