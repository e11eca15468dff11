use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use tracing::debug;

use crate::types::DiscoveryError;

/// File name probed in every visited directory.
pub const GITIGNORE_FILE: &str = ".gitignore";

/// Compiled rules from one `.gitignore`, scoped to `base_dir` and below.
///
/// A matcher only ever speaks about paths inside its own base directory;
/// anything outside it is none of its business.
#[derive(Debug)]
pub struct IgnoreMatcher {
    base_dir: PathBuf,
    rules: Gitignore,
}

impl IgnoreMatcher {
    /// Compiles `dir/.gitignore`. A missing or unreadable file yields an
    /// empty matcher, and unparseable lines are dropped, matching what git
    /// itself does.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(GITIGNORE_FILE);
        let mut builder = GitignoreBuilder::new(dir);
        if path.is_file() {
            if let Some(err) = builder.add(&path) {
                debug!(
                    path = %path.display(),
                    error = %err,
                    "skipping unparseable .gitignore lines"
                );
            }
        }
        let rules = builder.build().unwrap_or_else(|_| Gitignore::empty());
        Self {
            base_dir: dir.to_path_buf(),
            rules,
        }
    }

    /// Compiles caller-supplied patterns as a pseudo `.gitignore` rooted at
    /// `base`. Unlike on-disk files these are direct caller input, so a bad
    /// pattern surfaces as an error instead of being dropped.
    pub fn from_patterns(base: &Path, patterns: &[String]) -> Result<Self, DiscoveryError> {
        let mut builder = GitignoreBuilder::new(base);
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|source| DiscoveryError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }
        let rules = builder
            .build()
            .map_err(|source| DiscoveryError::InvalidPattern {
                pattern: patterns.join(" "),
                source,
            })?;
        Ok(Self {
            base_dir: base.to_path_buf(),
            rules,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Verdict for `abs_path` relative to this matcher's base directory.
    ///
    /// `Some(true)` means an ignore pattern matched, `Some(false)` means a
    /// negation (`!pattern`) matched, `None` means the matcher has nothing
    /// to say. Paths outside the base directory, including the base itself,
    /// always get `None`.
    pub fn decide(&self, abs_path: &Path, is_dir: bool) -> Option<bool> {
        let rel = abs_path.strip_prefix(&self.base_dir).ok()?;
        if rel.as_os_str().is_empty() {
            return None;
        }
        match self.rules.matched(rel, is_dir) {
            Match::Ignore(_) => Some(true),
            Match::Whitelist(_) => Some(false),
            Match::None => None,
        }
    }
}

/// Ordered chain of matchers from the scan root down to the current
/// directory, one per level.
///
/// `push` returns an appended copy rather than mutating in place, so sibling
/// branches of the walk never observe each other's matchers.
#[derive(Debug, Clone, Default)]
pub struct MatcherStack {
    matchers: Vec<Arc<IgnoreMatcher>>,
}

impl MatcherStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack pre-seeded with a bottom matcher that every level inherits.
    pub fn with_base(matcher: IgnoreMatcher) -> Self {
        Self {
            matchers: vec![Arc::new(matcher)],
        }
    }

    #[must_use]
    pub fn push(&self, matcher: IgnoreMatcher) -> Self {
        let mut matchers = self.matchers.clone();
        matchers.push(Arc::new(matcher));
        Self { matchers }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Layered decision over the whole stack, shallowest matcher first.
    ///
    /// Each matcher may ignore, un-ignore, or abstain; the deepest
    /// non-abstaining verdict wins, so a nested `.gitignore` can re-include
    /// what a parent excluded and vice versa.
    pub fn is_ignored(&self, abs_path: &Path, is_dir: bool) -> bool {
        let mut ignored = false;
        for matcher in &self.matchers {
            if let Some(verdict) = matcher.decide(abs_path, is_dir) {
                ignored = verdict;
            }
        }
        ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_gitignore(dir: &Path, contents: &str) {
        fs::write(dir.join(GITIGNORE_FILE), contents).unwrap();
    }

    #[test]
    fn test_missing_file_yields_empty_matcher() {
        let tmp = TempDir::new().unwrap();
        let matcher = IgnoreMatcher::load(tmp.path());
        assert_eq!(matcher.decide(&tmp.path().join("anything"), true), None);
    }

    #[test]
    fn test_ignore_and_negation_verdicts() {
        let tmp = TempDir::new().unwrap();
        write_gitignore(tmp.path(), "build/\n!build/keep\n");
        let matcher = IgnoreMatcher::load(tmp.path());

        assert_eq!(matcher.decide(&tmp.path().join("build"), true), Some(true));
        assert_eq!(
            matcher.decide(&tmp.path().join("build/keep"), true),
            Some(false)
        );
        assert_eq!(matcher.decide(&tmp.path().join("src"), true), None);
    }

    #[test]
    fn test_paths_outside_base_are_abstained() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_gitignore(&nested, "*\n");
        let matcher = IgnoreMatcher::load(&nested);

        // Sibling of the base: the matcher has no opinion.
        assert_eq!(matcher.decide(&tmp.path().join("elsewhere"), true), None);
        // The base itself is never a candidate.
        assert_eq!(matcher.decide(&nested, true), None);
    }

    #[test]
    fn test_deeper_matcher_overrides_shallower() {
        let tmp = TempDir::new().unwrap();
        let child = tmp.path().join("child");
        fs::create_dir(&child).unwrap();
        write_gitignore(tmp.path(), "dist/\n");
        write_gitignore(&child, "!dist/\n");

        let stack = MatcherStack::new()
            .push(IgnoreMatcher::load(tmp.path()))
            .push(IgnoreMatcher::load(&child));

        // Root rule still applies at the root level.
        assert!(stack.is_ignored(&tmp.path().join("dist"), true));
        // The child's negation wins below the child.
        assert!(!stack.is_ignored(&child.join("dist"), true));
    }

    #[test]
    fn test_deeper_matcher_can_reintroduce_ignore() {
        let tmp = TempDir::new().unwrap();
        let child = tmp.path().join("child");
        fs::create_dir(&child).unwrap();
        write_gitignore(tmp.path(), "!vendor/\n");
        write_gitignore(&child, "vendor/\n");

        let stack = MatcherStack::new()
            .push(IgnoreMatcher::load(tmp.path()))
            .push(IgnoreMatcher::load(&child));

        assert!(stack.is_ignored(&child.join("vendor"), true));
    }

    #[test]
    fn test_extra_patterns_sit_beneath_directory_rules() {
        let tmp = TempDir::new().unwrap();
        write_gitignore(tmp.path(), "!target/\n");

        let base =
            IgnoreMatcher::from_patterns(tmp.path(), &["target/".to_string()]).unwrap();
        let stack = MatcherStack::with_base(base).push(IgnoreMatcher::load(tmp.path()));

        // The .gitignore negation overrides the caller-supplied exclusion.
        assert!(!stack.is_ignored(&tmp.path().join("target"), true));

        // Without a negation the caller's pattern holds everywhere below.
        let plain = MatcherStack::with_base(
            IgnoreMatcher::from_patterns(tmp.path(), &["target/".to_string()]).unwrap(),
        );
        assert!(plain.is_ignored(&tmp.path().join("deep/target"), true));
    }

    #[test]
    fn test_invalid_extra_pattern_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = IgnoreMatcher::from_patterns(tmp.path(), &["a[".to_string()]);
        assert!(matches!(
            result,
            Err(DiscoveryError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_push_leaves_the_original_stack_untouched() {
        let tmp = TempDir::new().unwrap();
        let stack = MatcherStack::new();
        let grown = stack.push(IgnoreMatcher::load(tmp.path()));

        assert!(stack.is_empty());
        assert_eq!(grown.len(), 1);
    }
}
