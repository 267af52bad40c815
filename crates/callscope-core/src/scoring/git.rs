//! Version-control change signals.
//!
//! The change context is supplied already parsed; nothing here reads a
//! repository or a diff.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::tables::{
    contains_term, tier, API_KEYWORDS, BUSINESS_CHANGE_KEYWORDS, DELETION_VOLUME,
    ENDPOINT_ANNOTATIONS, INTENT_CHANGE_SIZE, RISK_CHANGE_SIZE, SENSITIVE_KEYWORDS,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    #[default]
    Modified,
    Deleted,
    Renamed,
}

/// One changed file with its added and deleted lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    pub added_lines: usize,
    pub deleted_lines: usize,
    pub added_content: Vec<String>,
    pub deleted_content: Vec<String>,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
            ..Default::default()
        }
    }

    /// Attach added lines and keep `added_lines` in step.
    pub fn with_added(mut self, lines: &[&str]) -> Self {
        self.added_content.extend(lines.iter().map(|l| l.to_string()));
        self.added_lines = self.added_content.len();
        self
    }

    /// Attach deleted lines and keep `deleted_lines` in step.
    pub fn with_deleted(mut self, lines: &[&str]) -> Self {
        self.deleted_content.extend(lines.iter().map(|l| l.to_string()));
        self.deleted_lines = self.deleted_content.len();
        self
    }

    fn normalized_path(&self) -> String {
        self.path.replace('\\', "/")
    }

    fn lower_path(&self) -> String {
        self.normalized_path().to_lowercase()
    }

    fn file_name(&self) -> String {
        let path = self.lower_path();
        path.rsplit('/').next().unwrap_or_default().to_string()
    }

    /// File name without its extension, in its original case.
    fn stem(&self) -> String {
        let path = self.normalized_path();
        let name = path.rsplit('/').next().unwrap_or_default();
        match name.split_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => name.to_string(),
        }
    }

    fn extension(&self) -> String {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_string(),
            None => String::new(),
        }
    }

    /// Test sources: a `test`/`tests` directory, a `*Test`/`*Tests`/`*IT`
    /// class, or the `test_*`, `*_test` and `*.test.*`/`*.spec.*` file
    /// conventions.
    pub fn is_test(&self) -> bool {
        let path = self.lower_path();
        if path
            .split('/')
            .any(|segment| matches!(segment, "test" | "tests" | "__tests__"))
        {
            return true;
        }

        let name = self.file_name();
        if name.contains(".test.") || name.contains(".spec.") {
            return true;
        }

        let stem = self.stem();
        let lower_stem = stem.to_lowercase();
        let integration = stem
            .strip_suffix("IT")
            .and_then(|head| head.chars().last())
            .is_some_and(|c| c.is_lowercase());
        stem.ends_with("Test")
            || stem.ends_with("Tests")
            || integration
            || lower_stem.starts_with("test_")
            || lower_stem.ends_with("_test")
    }

    /// Configuration files, by extension, plus dotenv files and Spring
    /// `applicationContext*.xml`.
    pub fn is_config(&self) -> bool {
        let name = self.file_name();
        let extension = self.extension();
        matches!(
            extension.as_str(),
            "yml" | "yaml" | "properties" | "toml" | "conf" | "ini" | "env"
        ) || name.starts_with(".env")
            || (extension == "xml" && name.starts_with("applicationcontext"))
    }

    pub fn is_build(&self) -> bool {
        matches!(
            self.file_name().as_str(),
            "pom.xml"
                | "build.gradle"
                | "build.gradle.kts"
                | "settings.gradle"
                | "settings.gradle.kts"
                | "cargo.toml"
                | "package.json"
                | "dockerfile"
                | "makefile"
        )
    }
}

/// Changes relevant to one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitChangeContext {
    pub files: Vec<ChangedFile>,
    pub commit_messages: Vec<String>,
}

impl GitChangeContext {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.commit_messages.is_empty()
    }

    fn total_lines(&self) -> usize {
        self.files.iter().map(|f| f.added_lines + f.deleted_lines).sum()
    }

    fn added(&self) -> impl Iterator<Item = &str> {
        self.files.iter().flat_map(|f| f.added_content.iter().map(String::as_str))
    }

    fn deleted(&self) -> impl Iterator<Item = &str> {
        self.files.iter().flat_map(|f| f.deleted_content.iter().map(String::as_str))
    }

    /// Paths and commit messages as one searchable text.
    fn metadata_text(&self) -> String {
        let mut text = String::new();
        for file in &self.files {
            text.push_str(&file.normalized_path());
            text.push('\n');
        }
        for message in &self.commit_messages {
            text.push_str(message);
            text.push('\n');
        }
        text
    }
}

/// Git sub-scores and their capped sum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitScore {
    pub total: f64,
    pub components: BTreeMap<String, f64>,
}

impl GitScore {
    fn from_parts(parts: &[(&str, f64)]) -> Self {
        let components: BTreeMap<String, f64> =
            parts.iter().map(|(name, value)| (format!("git.{}", name), *value)).collect();
        let total = components.values().sum::<f64>().min(100.0);
        Self { total, components }
    }
}

fn intent_file_impact(file: &ChangedFile) -> f64 {
    if file.is_test() {
        return 1.0;
    }
    let path = file.lower_path();
    if path.contains("controller") {
        10.0
    } else if path.contains("service") {
        8.0
    } else if path.contains("repository") || path.contains("mapper") || path.contains("dao") {
        6.0
    } else {
        match file.extension().as_str() {
            "xml" | "yml" | "yaml" | "properties" => 4.0,
            "java" | "kt" | "scala" | "groovy" | "rs" | "go" | "py" | "ts" | "js" => 3.0,
            _ => 0.0,
        }
    }
}

/// Business value signalled by a change.
pub fn intent_git_score(git: &GitChangeContext) -> GitScore {
    if git.is_empty() {
        return GitScore::default();
    }

    let file_type: f64 = git.files.iter().map(intent_file_impact).sum::<f64>().min(30.0);
    let change_size = tier(git.total_lines(), INTENT_CHANGE_SIZE);

    let metadata = git.metadata_text();
    let business = BUSINESS_CHANGE_KEYWORDS
        .iter()
        .filter(|k| contains_term(&metadata, k))
        .count();
    let business_keywords = (business as f64 * 5.0).min(20.0);

    let endpoint_lines = git
        .added()
        .filter(|line| ENDPOINT_ANNOTATIONS.iter().any(|a| line.contains(a)))
        .count();
    let new_endpoints = (endpoint_lines as f64 * 5.0).min(15.0);

    let added_text = git.added().collect::<Vec<_>>().join("\n");
    let api = API_KEYWORDS
        .iter()
        .filter(|k| contains_term(&metadata, k) || contains_term(&added_text, k))
        .count();
    let api_surface = (api as f64 * 3.0).min(15.0);

    GitScore::from_parts(&[
        ("file_type", file_type),
        ("change_size", change_size),
        ("business_keywords", business_keywords),
        ("new_endpoints", new_endpoints),
        ("api_surface", api_surface),
    ])
}

fn sensitive_file_risk(file: &ChangedFile) -> f64 {
    let path = file.lower_path();
    let mut risk = 0.0;
    if file.extension() == "sql" {
        risk += 10.0;
    }
    if path.contains("migration") {
        risk += 10.0;
    }
    if path.contains("security") || path.contains("auth") {
        risk += 10.0;
    }
    if file.is_build() || file.is_config() {
        risk += 8.0;
    }
    risk
}

/// Danger signalled by a change.
pub fn risk_git_score(git: &GitChangeContext) -> GitScore {
    if git.is_empty() {
        return GitScore::default();
    }

    let sensitive_files = git.files.iter().map(sensitive_file_risk).sum::<f64>().min(25.0);
    let change_size = tier(git.total_lines(), RISK_CHANGE_SIZE);

    let touched = git.added().chain(git.deleted()).collect::<Vec<_>>().join("\n");
    let sensitive_keywords = SENSITIVE_KEYWORDS
        .iter()
        .filter(|(keyword, _)| contains_term(&touched, keyword))
        .map(|(_, weight)| weight)
        .sum::<f64>()
        .min(30.0);

    let deleted_lines: usize = git.files.iter().map(|f| f.deleted_lines).sum();
    let deleted_files = git.files.iter().filter(|f| f.status == FileStatus::Deleted).count();
    let deletion = (tier(deleted_lines, DELETION_VOLUME) + deleted_files as f64 * 5.0).min(15.0);

    let config_files = git.files.iter().filter(|f| f.is_config()).count();
    let config_change = (config_files as f64 * 5.0).min(10.0);

    GitScore::from_parts(&[
        ("sensitive_files", sensitive_files),
        ("change_size", change_size),
        ("sensitive_keywords", sensitive_keywords),
        ("deletion", deletion),
        ("config_change", config_change),
    ])
}
