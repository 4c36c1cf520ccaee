// Dependency manifest (`requirements.txt`) parsing and resolution

use crate::error::{HaikuError, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Comparison operator of a version clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    Eq,
    NotEq,
    Ge,
    Le,
    Gt,
    Lt,
    Compatible,
}

impl VersionOp {
    fn as_str(self) -> &'static str {
        match self {
            VersionOp::Eq => "==",
            VersionOp::NotEq => "!=",
            VersionOp::Ge => ">=",
            VersionOp::Le => "<=",
            VersionOp::Gt => ">",
            VersionOp::Lt => "<",
            VersionOp::Compatible => "~=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionClause {
    pub op: VersionOp,
    pub version: String,
}

impl VersionClause {
    pub fn matches(&self, installed: &str) -> bool {
        // `==1.4.*` style prefix matches
        if let Some(prefix) = self.version.strip_suffix(".*") {
            let is_prefix = version_has_prefix(installed, prefix);
            return match self.op {
                VersionOp::Eq => is_prefix,
                VersionOp::NotEq => !is_prefix,
                _ => false,
            };
        }

        let ordering = compare_versions(installed, &self.version);
        match self.op {
            VersionOp::Eq => ordering == Ordering::Equal,
            VersionOp::NotEq => ordering != Ordering::Equal,
            VersionOp::Ge => ordering != Ordering::Less,
            VersionOp::Le => ordering != Ordering::Greater,
            VersionOp::Gt => ordering == Ordering::Greater,
            VersionOp::Lt => ordering == Ordering::Less,
            VersionOp::Compatible => {
                let parts: Vec<&str> = self.version.split('.').collect();
                if parts.len() < 2 || ordering == Ordering::Less {
                    return false;
                }
                version_has_prefix(installed, &parts[..parts.len() - 1].join("."))
            }
        }
    }
}

impl fmt::Display for VersionClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// One dependency line of the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Name as written
    pub name: String,
    /// Normalized name used for lookups
    pub key: String,
    pub extras: Vec<String>,
    pub clauses: Vec<VersionClause>,
    /// Line number in the manifest (1-based)
    pub line: usize,
}

impl Requirement {
    pub fn is_satisfied_by(&self, version: &str) -> bool {
        self.clauses.iter().all(|clause| clause.matches(version))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        let clauses: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", clauses.join(","))
    }
}

/// Parsed dependency manifest
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub requirements: Vec<Requirement>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HaikuError::ConfigError(format!(
                "Failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut requirements = Vec::new();

        for (index, raw) in contents.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('-') {
                return Err(HaikuError::ManifestParseError(
                    line_no,
                    format!("unsupported option '{}'", line),
                ));
            }
            requirements.push(parse_requirement(line, line_no)?);
        }

        Ok(Self { requirements })
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Resolve every requirement against the installed set.
    ///
    /// All-or-nothing: the error lists every requirement that failed.
    pub fn resolve(&self, installed: &InstalledPackages) -> Result<Vec<(String, String)>> {
        let mut resolved = Vec::with_capacity(self.requirements.len());
        let mut unresolved = Vec::new();

        for requirement in &self.requirements {
            match installed.version_of(&requirement.key) {
                Some(version) if requirement.is_satisfied_by(version) => {
                    resolved.push((requirement.name.clone(), version.to_string()));
                }
                Some(version) => {
                    unresolved.push(format!("{} (installed {})", requirement, version));
                }
                None => unresolved.push(format!("{} (not installed)", requirement)),
            }
        }

        if !unresolved.is_empty() {
            return Err(HaikuError::UnresolvedDependencies(unresolved));
        }

        Ok(resolved)
    }
}

/// Packages found in a site-packages style directory
#[derive(Debug, Clone, Default)]
pub struct InstalledPackages {
    versions: HashMap<String, String>,
}

impl InstalledPackages {
    /// Read `<name>-<version>.dist-info` entries
    pub fn scan(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            HaikuError::ConfigError(format!(
                "Failed to read package directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut installed = Self::default();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(".dist-info")) else {
                continue;
            };
            if let Some((name, version)) = stem.split_once('-') {
                installed.insert(name, version);
            }
        }

        Ok(installed)
    }

    pub fn insert(&mut self, name: &str, version: &str) {
        self.versions
            .insert(normalize_name(name), version.to_string());
    }

    pub fn version_of(&self, key: &str) -> Option<&str> {
        self.versions.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Lowercase and collapse runs of `-`, `_`, `.` into a single `-`
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
            }
            in_separator = true;
        } else {
            normalized.extend(c.to_lowercase());
            in_separator = false;
        }
    }

    normalized
}

fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_requirement(line: &str, line_no: usize) -> Result<Requirement> {
    // Environment markers are not evaluated
    let spec = line.split(';').next().unwrap_or("").trim();

    let name_end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(spec.len());
    let name = &spec[..name_end];
    if name.is_empty() {
        return Err(HaikuError::ManifestParseError(
            line_no,
            format!("missing package name in '{}'", line),
        ));
    }

    let mut rest = spec[name_end..].trim_start();
    let mut extras = Vec::new();
    if let Some(after) = rest.strip_prefix('[') {
        let close = after.find(']').ok_or_else(|| {
            HaikuError::ManifestParseError(line_no, "unterminated extras".to_string())
        })?;
        extras = after[..close]
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        rest = after[close + 1..].trim_start();
    }

    let mut clauses = Vec::new();
    if !rest.is_empty() {
        for part in rest.split(',') {
            clauses.push(parse_clause(part.trim(), line_no)?);
        }
    }

    Ok(Requirement {
        name: name.to_string(),
        key: normalize_name(name),
        extras,
        clauses,
        line: line_no,
    })
}

fn parse_clause(clause: &str, line_no: usize) -> Result<VersionClause> {
    // Two-character operators must be tried before their one-character prefixes
    const OPERATORS: [(&str, VersionOp); 7] = [
        ("==", VersionOp::Eq),
        ("!=", VersionOp::NotEq),
        (">=", VersionOp::Ge),
        ("<=", VersionOp::Le),
        ("~=", VersionOp::Compatible),
        (">", VersionOp::Gt),
        ("<", VersionOp::Lt),
    ];

    for (symbol, op) in OPERATORS {
        if let Some(version) = clause.strip_prefix(symbol) {
            let version = version.trim();
            if version.is_empty() || version.contains(char::is_whitespace) {
                break;
            }
            return Ok(VersionClause {
                op,
                version: version.to_string(),
            });
        }
    }

    Err(HaikuError::ManifestParseError(
        line_no,
        format!("invalid version clause '{}'", clause),
    ))
}

/// Compare dotted versions component-wise, numerically where possible.
/// Missing components count as zero.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn version_has_prefix(version: &str, prefix: &str) -> bool {
    let version: Vec<&str> = version.split('.').collect();
    let prefix: Vec<&str> = prefix.split('.').collect();

    prefix.len() <= version.len()
        && prefix
            .iter()
            .zip(version.iter())
            .all(|(p, v)| compare_versions(p, v) == Ordering::Equal)
}
