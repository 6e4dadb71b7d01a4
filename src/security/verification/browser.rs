//! Browser-like `User-Agent` detection.
//!
//! A substring heuristic only: any client can claim to be a browser.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

const BROWSER_TOKENS: [&str; 5] = ["mozilla", "chrome", "safari", "firefox", "edge"];

/// Matches user agents against a small allow-list of browser tokens.
#[derive(Clone)]
pub struct BrowserMatcher {
    automaton: AhoCorasick,
}

impl BrowserMatcher {
    /// Builds the matcher.
    ///
    /// # Panics
    ///
    /// Panics if the automaton for the fixed token list fails to build (impossible).
    #[must_use]
    pub fn new() -> Self {
        let automaton = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostFirst)
            .build(BROWSER_TOKENS)
            .expect("static browser token list");
        Self { automaton }
    }

    /// Whether `user_agent` contains a known browser token.
    #[must_use]
    pub fn is_browser_like(&self, user_agent: Option<&str>) -> bool {
        user_agent.is_some_and(|ua| self.automaton.is_match(ua))
    }
}

impl Default for BrowserMatcher {
    fn default() -> Self {
        Self::new()
    }
}
