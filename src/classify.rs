//! Title-based article classification.
//!
//! [`classify`] maps a raw feed title to a [`Category`] and a cleaned title,
//! or to `None` for items that are never articles (daily quizzes).
//!
//! Rules form one ordered chain; the first match wins:
//!
//! | # | Match (case-insensitive) | Result |
//! |---|--------------------------|--------|
//! | 1 | `Daily Subject Wise Quiz` | skip |
//! | 2 | `UPSC Interview Special` | `Interview` |
//! | 3 | `UPSC Key` | `UpscKey` |
//! | 4 | `UPSC Issue at a Glance` | `IssueAtAGlance` |
//! | 5 | `Knowledge Nugget` | `KnowledgeNugget` |
//! | 6 | `Mains Answer Writing/Practice` | `MainsAnswerWeekly(week)` |
//! | 7 | `Current Affairs Pointers` | `CurrentAffairsPointer` |
//! | 8 | `Beyond Trending` | `BeyondTrending` |
//! | 9 | starts with `The world this week` | `WorldThisWeek` |
//! | 10 | anything else | `GeneralArticle` |
//!
//! The interview marker sits directly after the quiz skip so that it
//! overrides every structural marker a title may also carry.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::category::Category;
use crate::models::{ClassifiedEntry, Entry};

static QUIZ: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Daily\s+Subject[- ]?Wise\s+Quiz").unwrap());
static INTERVIEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)UPSC\s+Interview\s+Special").unwrap());
static UPSC_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)UPSC\s+Key").unwrap());
static ISSUE_AT_A_GLANCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)UPSC\s+Issue\s+at\s+a\s+Glance").unwrap());
static KNOWLEDGE_NUGGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Knowledge\s+Nuggets?").unwrap());
static MAINS_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:UPSC\s+Essentials\b[^|]*?)?Mains\s+Answer\s+(?:Writing\s+Practice|Writing|Practice)",
    )
    .unwrap()
});
static WEEK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWeek\s*(\d+)").unwrap());
static CURRENT_AFFAIRS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Current\s+Affairs\s+Pointers").unwrap());
static BEYOND_TRENDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Beyond\s+Trending").unwrap());
static WORLD_THIS_WEEK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^The\s+world\s+this\s+week").unwrap());

/// Classifies a raw title. `None` means the item must be skipped.
pub fn classify(title: &str) -> Option<(Category, String)> {
    let title = title.trim();

    if QUIZ.is_match(title) {
        return None;
    }

    let stripped = |marker: &Regex| trim_separators(&marker.replace_all(title, ""));

    if INTERVIEW.is_match(title) {
        return Some((Category::Interview, stripped(&INTERVIEW)));
    }
    if UPSC_KEY.is_match(title) {
        return Some((Category::UpscKey, stripped(&UPSC_KEY)));
    }
    if ISSUE_AT_A_GLANCE.is_match(title) {
        return Some((Category::IssueAtAGlance, stripped(&ISSUE_AT_A_GLANCE)));
    }
    if KNOWLEDGE_NUGGET.is_match(title) {
        return Some((Category::KnowledgeNugget, stripped(&KNOWLEDGE_NUGGET)));
    }
    if MAINS_ANSWER.is_match(title) {
        let week = WEEK
            .captures(title)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        let without_marker = MAINS_ANSWER.replace_all(title, "");
        let cleaned = trim_separators(&WEEK.replacen(&without_marker, 1, ""));
        return Some((Category::MainsAnswerWeekly(week), cleaned));
    }
    if CURRENT_AFFAIRS.is_match(title) {
        let cleaned = title
            .rsplit_once('|')
            .map(|(_, tail)| tail.trim().to_string())
            .unwrap_or_default();
        return Some((Category::CurrentAffairsPointer, cleaned));
    }
    if BEYOND_TRENDING.is_match(title) {
        return Some((Category::BeyondTrending, stripped(&BEYOND_TRENDING)));
    }
    if WORLD_THIS_WEEK.is_match(title) {
        return Some((Category::WorldThisWeek, stripped(&WORLD_THIS_WEEK)));
    }

    Some((Category::GeneralArticle, trim_separators(title)))
}

/// Classifies feed entries by title, dropping skipped items.
pub fn classify_entries(entries: &[Entry]) -> Vec<ClassifiedEntry> {
    entries
        .iter()
        .filter_map(|entry| {
            let (category, cleaned_title) = classify(&entry.title)?;
            Some(ClassifiedEntry {
                category,
                cleaned_title,
                url: entry.url.trim().to_string(),
            })
        })
        .collect()
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '\u{2013}' | '\u{2014}' | ':' | '|')
}

fn trim_separators(s: &str) -> String {
    s.trim_matches(is_separator).to_string()
}
