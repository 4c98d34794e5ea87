//! Push-event filtering
//!
//! A run qualifies when its branch matches one of the configured branch
//! patterns and at least one changed path matches one of the path patterns.

use crate::context::TriggerEvent;
use docpub_core::config::TriggerConfig;
use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::Path;

/// Why an event does not qualify
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The push landed on a branch no pattern matches
    BranchMismatch {
        /// Branch of the event
        branch: String,
    },
    /// None of the changed paths matched a path pattern
    NoMatchingPaths,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BranchMismatch { branch } => {
                write!(f, "branch '{branch}' is not a publishing branch")
            }
            Self::NoMatchingPaths => write!(f, "no changed path touches the documentation"),
        }
    }
}

/// Filter verdict for an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// The pipeline should run
    Run {
        /// Changed paths that matched a path pattern
        matched_paths: Vec<String>,
    },
    /// The pipeline must not run
    Skip(SkipReason),
}

impl TriggerDecision {
    /// Whether the pipeline should run
    #[must_use]
    pub fn should_run(&self) -> bool {
        matches!(self, Self::Run { .. })
    }
}

/// Branch + path filter applied before any stage runs
#[derive(Debug, Clone)]
pub struct TriggerFilter {
    branches: Vec<String>,
    paths: Vec<String>,
}

// GitHub filter semantics: `*` stops at `/`, `**` crosses it
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl TriggerFilter {
    /// Filter from explicit patterns
    #[must_use]
    pub fn new(branches: Vec<String>, paths: Vec<String>) -> Self {
        Self { branches, paths }
    }

    /// Filter from the `[trigger]` configuration section
    #[must_use]
    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(config.branches.clone(), config.paths.clone())
    }

    /// Branch patterns
    #[must_use]
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// Path patterns
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Decide whether `event` qualifies
    #[must_use]
    pub fn evaluate(&self, event: &TriggerEvent) -> TriggerDecision {
        if !self.branches.iter().any(|p| branch_matches(p, &event.branch)) {
            return TriggerDecision::Skip(SkipReason::BranchMismatch {
                branch: event.branch.clone(),
            });
        }

        let matched_paths: Vec<String> = event
            .changed_paths
            .iter()
            .filter(|path| self.paths.iter().any(|p| path_matches(p, path)))
            .cloned()
            .collect();

        if matched_paths.is_empty() {
            TriggerDecision::Skip(SkipReason::NoMatchingPaths)
        } else {
            TriggerDecision::Run { matched_paths }
        }
    }
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn branch_matches(pattern: &str, branch: &str) -> bool {
    if !has_glob_chars(pattern) {
        return pattern == branch;
    }
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches_with(branch, MATCH_OPTIONS),
        Err(_) => {
            tracing::trace!(pattern, "Skipping invalid branch pattern");
            false
        }
    }
}

/// Check if a changed path matches a pattern.
///
/// - **Simple paths** (no `*`, `?`, `[`) are component-wise prefixes, so
///   `docs` matches `docs/index.md` but not `docsite/x`.
/// - **`dir/**`** matches everything below `dir`.
/// - Other patterns use glob matching.
fn path_matches(pattern: &str, path: &str) -> bool {
    let path = path.trim_start_matches("./");
    if let Some(dir) = pattern.strip_suffix("/**")
        && !has_glob_chars(dir)
    {
        let p = Path::new(path);
        return p.starts_with(dir) && p != Path::new(dir);
    }
    if !has_glob_chars(pattern) {
        return Path::new(path).starts_with(pattern);
    }
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches_with(path, MATCH_OPTIONS),
        Err(_) => {
            tracing::trace!(pattern, "Skipping invalid path pattern");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpub_core::config::TriggerConfig;
    use proptest::prop_assert;
    use proptest::prop_assert_eq;

    fn filter() -> TriggerFilter {
        TriggerFilter::from_config(&TriggerConfig::default())
    }

    #[test]
    fn main_with_docs_change_runs() {
        let decision = filter().evaluate(&TriggerEvent::push("main", ["docs/index.md"]));
        assert_eq!(
            decision,
            TriggerDecision::Run {
                matched_paths: vec!["docs/index.md".to_string()]
            }
        );
    }

    #[test]
    fn feature_branch_is_skipped() {
        let decision = filter().evaluate(&TriggerEvent::push("feature/x", ["docs/index.md"]));
        assert_eq!(
            decision,
            TriggerDecision::Skip(SkipReason::BranchMismatch {
                branch: "feature/x".to_string()
            })
        );
    }

    #[test]
    fn main_without_docs_change_is_skipped() {
        let decision = filter().evaluate(&TriggerEvent::push("main", ["src/app.py"]));
        assert_eq!(decision, TriggerDecision::Skip(SkipReason::NoMatchingPaths));
    }

    #[test]
    fn empty_change_set_is_skipped() {
        let decision = filter().evaluate(&TriggerEvent::push("main", Vec::<String>::new()));
        assert!(!decision.should_run());
    }

    #[test]
    fn nested_docs_paths_match() {
        assert!(path_matches("docs/**", "docs/guide/setup/install.md"));
        assert!(path_matches("docs/**", "./docs/mkdocs.yml"));
        assert!(!path_matches("docs/**", "docsite/index.md"));
        assert!(!path_matches("docs/**", "src/docs/index.md"));
        assert!(!path_matches("docs/**", "docs"));
    }

    #[test]
    fn simple_path_is_prefix() {
        assert!(path_matches("docs", "docs/index.md"));
        assert!(!path_matches("docs", "docs.md"));
    }

    #[test]
    fn glob_patterns() {
        assert!(path_matches("docs/*.md", "docs/index.md"));
        assert!(!path_matches("docs/*.md", "docs/guide/index.md"));
        assert!(path_matches("docs/**/*.md", "docs/guide/index.md"));
        assert!(path_matches("mkdocs.y?ml", "mkdocs.yml"));
    }

    #[test]
    fn branch_globs_do_not_cross_separator() {
        assert!(branch_matches("release/*", "release/1.0"));
        assert!(!branch_matches("release/*", "release/1.0/hotfix"));
        assert!(!branch_matches("main", "main2"));
    }

    #[test]
    fn multiple_patterns() {
        let filter = TriggerFilter::new(
            vec!["main".into(), "docs-*".into()],
            vec!["docs/**".into(), "mkdocs.yml".into()],
        );
        assert!(filter.evaluate(&TriggerEvent::push("docs-preview", ["mkdocs.yml"])).should_run());
    }

    proptest::proptest! {
        #[test]
        fn paths_outside_docs_never_trigger(name in "[a-z]{1,8}", ext in "(md|py|yml)") {
            let path = format!("src/{name}.{ext}");
            prop_assert!(!filter().evaluate(&TriggerEvent::push("main", [path])).should_run());
        }

        #[test]
        fn any_file_below_docs_triggers_on_main(dirs in proptest::collection::vec("[a-z]{1,6}", 0..4), name in "[a-z]{1,8}") {
            let mut path = String::from("docs/");
            for dir in &dirs {
                path.push_str(dir);
                path.push('/');
            }
            path.push_str(&name);
            path.push_str(".md");
            let decision = filter().evaluate(&TriggerEvent::push("refs/heads/main", [path.clone()]));
            prop_assert_eq!(decision, TriggerDecision::Run { matched_paths: vec![path] });
        }
    }

    #[test]
    fn skip_reason_display() {
        assert_eq!(
            SkipReason::BranchMismatch { branch: "dev".into() }.to_string(),
            "branch 'dev' is not a publishing branch"
        );
    }
}
