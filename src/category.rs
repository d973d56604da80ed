//! Article categories and their sequence families.
//!
//! Each [`Category`] belongs to exactly one [`SequenceFamily`]. The family
//! owns the counter key and the ID prefix; all weekly answer-writing
//! variants share the `MainsAnswerWeekly` family and keep their week only in
//! the display label.
//!
//! | Family | Label | Prefix | Counter key |
//! |--------|-------|--------|-------------|
//! | `GeneralArticle` | General Article | `genArt` | `general_article_seq` |
//! | `UpscKey` | UPSC Key | `uKey` | `upsc_key_seq` |
//! | `KnowledgeNugget` | Knowledge Nugget | `knoNugg` | `knowledge_nugget_seq` |
//! | `IssueAtAGlance` | Issue at a Glance | `issueGla` | `issue_glance_seq` |
//! | `MainsAnswerWeekly` | Mains Answer Writing - Week N | `mainsAns` | `mains_answer_weekly_seq` |
//! | `CurrentAffairsPointer` | Current Affairs Pointers | `cuAff` | `current_affair_seq` |
//! | `BeyondTrending` | Beyond Trending | `beyTre` | `beyond_trending_seq` |
//! | `WorldThisWeek` | World This Week | `worWee` | `world_this_week_seq` |
//! | `Interview` | Interview | `intView` | `interview_seq` |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed classification label of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Category {
    GeneralArticle,
    UpscKey,
    KnowledgeNugget,
    IssueAtAGlance,
    /// Weekly answer-writing practice; `None` when the title carries no week.
    MainsAnswerWeekly(Option<u32>),
    CurrentAffairsPointer,
    BeyondTrending,
    WorldThisWeek,
    Interview,
}

/// Counter bucket shared by all variants of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SequenceFamily {
    GeneralArticle,
    UpscKey,
    KnowledgeNugget,
    IssueAtAGlance,
    MainsAnswerWeekly,
    CurrentAffairsPointer,
    BeyondTrending,
    WorldThisWeek,
    Interview,
}

struct FamilyInfo {
    family: SequenceFamily,
    label: &'static str,
    prefix: &'static str,
    counter_key: &'static str,
}

const FAMILIES: [FamilyInfo; 9] = [
    FamilyInfo {
        family: SequenceFamily::GeneralArticle,
        label: "General Article",
        prefix: "genArt",
        counter_key: "general_article_seq",
    },
    FamilyInfo {
        family: SequenceFamily::UpscKey,
        label: "UPSC Key",
        prefix: "uKey",
        counter_key: "upsc_key_seq",
    },
    FamilyInfo {
        family: SequenceFamily::KnowledgeNugget,
        label: "Knowledge Nugget",
        prefix: "knoNugg",
        counter_key: "knowledge_nugget_seq",
    },
    FamilyInfo {
        family: SequenceFamily::IssueAtAGlance,
        label: "Issue at a Glance",
        prefix: "issueGla",
        counter_key: "issue_glance_seq",
    },
    FamilyInfo {
        family: SequenceFamily::MainsAnswerWeekly,
        label: "Mains Answer Writing",
        prefix: "mainsAns",
        counter_key: "mains_answer_weekly_seq",
    },
    FamilyInfo {
        family: SequenceFamily::CurrentAffairsPointer,
        label: "Current Affairs Pointers",
        prefix: "cuAff",
        counter_key: "current_affair_seq",
    },
    FamilyInfo {
        family: SequenceFamily::BeyondTrending,
        label: "Beyond Trending",
        prefix: "beyTre",
        counter_key: "beyond_trending_seq",
    },
    FamilyInfo {
        family: SequenceFamily::WorldThisWeek,
        label: "World This Week",
        prefix: "worWee",
        counter_key: "world_this_week_seq",
    },
    FamilyInfo {
        family: SequenceFamily::Interview,
        label: "Interview",
        prefix: "intView",
        counter_key: "interview_seq",
    },
];

/// Legacy labels accepted on input.
const ALIASES: [(&str, SequenceFamily); 4] = [
    ("Mains Answer Weekly", SequenceFamily::MainsAnswerWeekly),
    ("Current Affair", SequenceFamily::CurrentAffairsPointer),
    ("Current Affairs Pointer", SequenceFamily::CurrentAffairsPointer),
    ("UPSC Interview Special", SequenceFamily::Interview),
];

impl SequenceFamily {
    pub const ALL: [SequenceFamily; 9] = [
        SequenceFamily::GeneralArticle,
        SequenceFamily::UpscKey,
        SequenceFamily::KnowledgeNugget,
        SequenceFamily::IssueAtAGlance,
        SequenceFamily::MainsAnswerWeekly,
        SequenceFamily::CurrentAffairsPointer,
        SequenceFamily::BeyondTrending,
        SequenceFamily::WorldThisWeek,
        SequenceFamily::Interview,
    ];

    fn info(self) -> &'static FamilyInfo {
        // FAMILIES is declared in the same order as the enum.
        &FAMILIES[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    pub fn prefix(self) -> &'static str {
        self.info().prefix
    }

    pub fn counter_key(self) -> &'static str {
        self.info().counter_key
    }

    pub fn from_counter_key(key: &str) -> Option<Self> {
        FAMILIES
            .iter()
            .find(|f| f.counter_key == key)
            .map(|f| f.family)
    }

    /// Formats the ID for the `value`-th allocation in this family.
    pub fn format_id(self, value: u32) -> String {
        format!("{}{:04}", self.prefix(), value)
    }

    /// Splits a generated ID back into its family and sequence number.
    pub fn parse_id(id: &str) -> Option<(Self, u32)> {
        FAMILIES.iter().find_map(|f| {
            let digits = id.strip_prefix(f.prefix)?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok().map(|n| (f.family, n))
        })
    }
}

impl Category {
    pub fn family(self) -> SequenceFamily {
        match self {
            Category::GeneralArticle => SequenceFamily::GeneralArticle,
            Category::UpscKey => SequenceFamily::UpscKey,
            Category::KnowledgeNugget => SequenceFamily::KnowledgeNugget,
            Category::IssueAtAGlance => SequenceFamily::IssueAtAGlance,
            Category::MainsAnswerWeekly(_) => SequenceFamily::MainsAnswerWeekly,
            Category::CurrentAffairsPointer => SequenceFamily::CurrentAffairsPointer,
            Category::BeyondTrending => SequenceFamily::BeyondTrending,
            Category::WorldThisWeek => SequenceFamily::WorldThisWeek,
            Category::Interview => SequenceFamily::Interview,
        }
    }

    /// Display label, as stored in the `Type` field of staging records.
    pub fn label(self) -> String {
        match self {
            Category::MainsAnswerWeekly(Some(week)) => {
                format!("{} - Week {}", self.family().label(), week)
            }
            Category::MainsAnswerWeekly(None) => format!("{} - Week X", self.family().label()),
            other => other.family().label().to_string(),
        }
    }

    /// Parses a display label (or a legacy alias) back into a category.
    ///
    /// Returns `None` for anything outside the category table.
    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let mains = SequenceFamily::MainsAnswerWeekly.label();
        if let Some(rest) = raw.strip_prefix(mains) {
            return parse_week_suffix(rest).map(Category::MainsAnswerWeekly);
        }
        let family = FAMILIES
            .iter()
            .find(|f| f.label == raw)
            .map(|f| f.family)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == raw)
                    .map(|(_, family)| *family)
            })?;
        Some(match family {
            SequenceFamily::GeneralArticle => Category::GeneralArticle,
            SequenceFamily::UpscKey => Category::UpscKey,
            SequenceFamily::KnowledgeNugget => Category::KnowledgeNugget,
            SequenceFamily::IssueAtAGlance => Category::IssueAtAGlance,
            SequenceFamily::MainsAnswerWeekly => Category::MainsAnswerWeekly(None),
            SequenceFamily::CurrentAffairsPointer => Category::CurrentAffairsPointer,
            SequenceFamily::BeyondTrending => Category::BeyondTrending,
            SequenceFamily::WorldThisWeek => Category::WorldThisWeek,
            SequenceFamily::Interview => Category::Interview,
        })
    }
}

/// Accepts `""`, `" - Week 7"` or `" - Week X"`. Anything else is not a
/// valid answer-writing label.
fn parse_week_suffix(rest: &str) -> Option<Option<u32>> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Some(None);
    }
    let week = rest.strip_prefix('-')?.trim().strip_prefix("Week")?.trim();
    if week.eq_ignore_ascii_case("x") {
        Some(None)
    } else {
        week.parse().ok().map(Some)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label()
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Category::from_label(&value).ok_or_else(|| format!("unknown category: {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_table_order_matches_enum() {
        for family in SequenceFamily::ALL {
            assert_eq!(family.info().family, family);
        }
    }

    #[test]
    fn test_labels_round_trip() {
        let all = [
            Category::GeneralArticle,
            Category::UpscKey,
            Category::KnowledgeNugget,
            Category::IssueAtAGlance,
            Category::MainsAnswerWeekly(Some(7)),
            Category::MainsAnswerWeekly(None),
            Category::CurrentAffairsPointer,
            Category::BeyondTrending,
            Category::WorldThisWeek,
            Category::Interview,
        ];
        for category in all {
            assert_eq!(Category::from_label(&category.label()), Some(category));
        }
    }

    #[test]
    fn test_mains_variants_share_family() {
        assert_eq!(
            Category::MainsAnswerWeekly(Some(3)).family(),
            Category::MainsAnswerWeekly(None).family()
        );
        assert_eq!(
            Category::from_label("Mains Answer Writing"),
            Some(Category::MainsAnswerWeekly(None))
        );
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!(
            Category::from_label("Current Affair"),
            Some(Category::CurrentAffairsPointer)
        );
        assert_eq!(Category::from_label("Sports"), None);
        assert_eq!(Category::from_label("Mains Answer Writing - Weekly"), None);
    }

    #[test]
    fn test_id_format_and_parse() {
        assert_eq!(SequenceFamily::GeneralArticle.format_id(7), "genArt0007");
        assert_eq!(SequenceFamily::UpscKey.format_id(12345), "uKey12345");
        assert_eq!(
            SequenceFamily::parse_id("mainsAns0042"),
            Some((SequenceFamily::MainsAnswerWeekly, 42))
        );
        assert_eq!(SequenceFamily::parse_id("genArt"), None);
        assert_eq!(SequenceFamily::parse_id("genArtx001"), None);
        assert_eq!(SequenceFamily::parse_id("17"), None);
    }
}
