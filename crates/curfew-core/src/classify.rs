//! Foreground window classification

use curfew_api::ForegroundWindow;
use curfew_config::{MatchList, RuleSet};

/// Process names of curfew's own surfaces. Focusing these never changes
/// enforcement state, so interacting with a warning does not count as
/// leaving the blocked app.
pub const SELF_PROCESS_NAMES: &[&str] = &["curfewd", "curfew-overlay", "curfew-dashboard"];

/// Outcome of classifying one foreground window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// One of our own windows
    Ignore,
    Whitelisted,
    AllowedByKeyword(String),
    Blocklisted,
    BlockedByKeyword(String),
    Neutral,
}

impl Verdict {
    /// Reason shown to the user for a blocked verdict
    pub fn block_reason(&self) -> Option<String> {
        match self {
            Verdict::Blocklisted => Some("Blocklisted App".to_string()),
            Verdict::BlockedByKeyword(keyword) => Some(format!("Keyword \"{}\"", keyword)),
            _ => None,
        }
    }
}

/// Classify a window against the rules. First match wins:
/// self, whitelist, allow keyword, blocklist, block keyword.
///
/// All matching is case-insensitive substring matching; "game" matches
/// "backgammon". Rule entries are already lowercase.
pub fn classify(window: &ForegroundWindow, rules: &RuleSet, self_pid: Option<u32>) -> Verdict {
    let app = window.app_key();
    let process = window.process_name.trim().to_lowercase();
    let title = window.normalized_title();

    if is_self(&app, &process, window.pid, self_pid) {
        return Verdict::Ignore;
    }

    if matches_list(&rules.whitelist, &app, &process, &title) {
        return Verdict::Whitelisted;
    }

    if let Some(keyword) = first_contained(&rules.allow_keywords, &title) {
        return Verdict::AllowedByKeyword(keyword.to_string());
    }

    if matches_list(&rules.blocklist, &app, &process, &title) {
        return Verdict::Blocklisted;
    }

    if let Some(keyword) = first_contained(&rules.block_keywords, &title) {
        return Verdict::BlockedByKeyword(keyword.to_string());
    }

    Verdict::Neutral
}

fn is_self(app: &str, process: &str, pid: Option<u32>, self_pid: Option<u32>) -> bool {
    if pid.is_some() && pid == self_pid {
        return true;
    }
    SELF_PROCESS_NAMES
        .iter()
        .any(|name| app == *name || process == *name)
}

fn matches_list(list: &MatchList, app: &str, process: &str, title: &str) -> bool {
    list.processes
        .iter()
        .any(|p| app.contains(p.as_str()) || process.contains(p.as_str()))
        || list.domains.iter().any(|d| title.contains(d.as_str()))
}

fn first_contained<'a>(keywords: &'a [String], haystack: &str) -> Option<&'a str> {
    keywords
        .iter()
        .map(String::as_str)
        .find(|k| haystack.contains(k))
}
