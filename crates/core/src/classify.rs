use serde::{Deserialize, Serialize};

/// Activity category assigned to every observed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Learning,
    Distraction,
    Mixed,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Learning => "learning",
            Category::Distraction => "distraction",
            Category::Mixed => "mixed",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learning" => Ok(Category::Learning),
            "distraction" => Ok(Category::Distraction),
            "mixed" => Ok(Category::Mixed),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hostnames treated as learning regardless of page title.
/// Matching is substring containment, not domain-exact.
const LEARNING_SITES: &[&str] = &[
    "github.com",
    "stackoverflow.com",
    "coursera.org",
    "udemy.com",
    "khanacademy.org",
    "edx.org",
    "leetcode.com",
    "hackerrank.com",
    "codecademy.com",
    "w3schools.com",
    "mdn.mozilla.org",
    "docs.python.org",
    "docs.microsoft.com",
    "developer.mozilla.org",
    "medium.com",
    "arxiv.org",
    "scholar.google.com",
    "researchgate.net",
    "notion.so",
    "evernote.com",
    "obsidian.md",
    "quizlet.com",
    "duolingo.com",
    "brilliant.org",
];

const DISTRACTION_SITES: &[&str] = &[
    "facebook.com",
    "youtube.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "whatsapp.com",
    "tiktok.com",
    "reddit.com",
    "twitch.tv",
    "netflix.com",
    "hulu.com",
    "disneyplus.com",
    "primevideo.com",
    "spotify.com",
    "soundcloud.com",
    "pinterest.com",
    "snapchat.com",
    "9gag.com",
    "buzzfeed.com",
    "imgur.com",
    "discord.com",
];

const EDUCATIONAL_KEYWORDS: &[&str] = &[
    "tutorial", "learn", "learning", "study", "studying", "guide", "how to",
    "step by step", "lesson", "lectures", "lecture notes", "course",
    "curriculum", "syllabus", "revision", "practice", "exercise", "notes",
    "handwritten notes", "exam", "test", "quiz", "mcq", "assignment",
    "homework", "explanation", "concept", "theory", "fundamentals", "basics",
    "introduction", "examples", "worked examples", "documentation", "docs",
    "api reference", "developer guide", "code", "coding", "programming",
    "syntax", "implementation", "algorithm", "data structure", "debug",
    "error", "exception", "stack trace", "runtime error",
    "interview questions", "system design", "open source", "repository",
    "github repo", "pull request", "commit", "formula", "derivation",
    "proof", "theorem", "corollary", "numerical", "problem solving",
    "experiment", "lab manual", "physics", "chemistry", "biology",
    "mathematics", "calculus", "algebra", "statistics", "probability",
    "thermodynamics", "mechanics", "quantum", "electromagnetism",
    "education", "development", "science", "math", "history",
];

/// Entertainment markers for video titles. Checked for expressiveness only:
/// a video page that is not provably educational is distraction either way.
const ENTERTAINMENT_KEYWORDS: &[&str] = &[
    "funny", "prank", "reaction", "vlog", "gaming", "music video", "trailer",
    "meme", "compilation", "fun", "comedy", "skit", "roast", "parody",
    "shorts", "reels", "gameplay", "playthrough", "song", "songs", "lyrics",
    "dance", "viral", "trending",
];

const VIDEO_SITE: &str = "youtube.com";

/// Classify a page into learning/distraction/mixed.
///
/// Priority order: learning-site hostname match, then distraction-site
/// hostname match (with a title sub-classifier for the video site), then
/// educational keywords in the title, then `Mixed`.
///
/// Hostname matching is substring containment, so a hostname that merely
/// embeds a listed domain in a longer label will also match.
pub fn classify(hostname: &str, title: &str) -> Category {
    if LEARNING_SITES.iter().any(|site| hostname.contains(site)) {
        return Category::Learning;
    }

    if DISTRACTION_SITES.iter().any(|site| hostname.contains(site)) {
        if hostname.contains(VIDEO_SITE) {
            return classify_video_title(title);
        }
        return Category::Distraction;
    }

    if contains_keyword(title, EDUCATIONAL_KEYWORDS) {
        return Category::Learning;
    }

    Category::Mixed
}

/// Video pages default to distraction unless the title proves otherwise.
fn classify_video_title(title: &str) -> Category {
    if contains_keyword(title, EDUCATIONAL_KEYWORDS) {
        return Category::Learning;
    }

    if contains_keyword(title, ENTERTAINMENT_KEYWORDS) {
        return Category::Distraction;
    }

    Category::Distraction
}

fn contains_keyword(title: &str, keywords: &[&str]) -> bool {
    let lower = title.to_lowercase();
    keywords.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_site_wins_regardless_of_title() {
        assert_eq!(classify("github.com", "anything"), Category::Learning);
        assert_eq!(
            classify("www.github.com", "Funny cat compilation"),
            Category::Learning
        );
    }

    #[test]
    fn video_site_defaults_to_distraction() {
        assert_eq!(
            classify("youtube.com", "Funny cat compilation"),
            Category::Distraction
        );
        // No entertainment keyword either: still distraction.
        assert_eq!(
            classify("youtube.com", "Some unremarkable clip"),
            Category::Distraction
        );
    }

    #[test]
    fn video_site_educational_title_is_learning() {
        assert_eq!(
            classify("youtube.com", "Calculus tutorial lecture 3"),
            Category::Learning
        );
    }

    #[test]
    fn distraction_site_ignores_title() {
        assert_eq!(
            classify("netflix.com", "Calculus tutorial lecture 3"),
            Category::Distraction
        );
        assert_eq!(classify("netflix.com", "anything"), Category::Distraction);
    }

    #[test]
    fn unknown_host_with_educational_title_is_learning() {
        assert_eq!(
            classify("myblog.example", "My notes on algebra basics"),
            Category::Learning
        );
    }

    #[test]
    fn unknown_host_unknown_title_is_mixed() {
        assert_eq!(classify("myblog.example", "Random thoughts"), Category::Mixed);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        assert_eq!(
            classify("myblog.example", "STUDY PLAN for the week"),
            Category::Learning
        );
    }

    #[test]
    fn hostname_match_is_substring_containment() {
        // Accepted approximation: embedded domain labels false-positive.
        assert_eq!(
            classify("notgithub.com.evil.example", "whatever"),
            Category::Learning
        );
    }

    #[test]
    fn category_round_trips_through_str() {
        for cat in [Category::Learning, Category::Distraction, Category::Mixed] {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
        }
        assert!("focused".parse::<Category>().is_err());
    }
}
