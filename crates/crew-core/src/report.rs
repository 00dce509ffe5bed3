//! Turning a crew's text into something to show and save: sections per
//! agent, simple statistics and output file names.

use serde::Serialize;

/// Line prefix that opens each agent's section in crew output
pub const AGENT_MARKER: &str = "# Agent:";

const FILENAME_STOP_WORDS: &[&str] = &[
    "a", "an", "the", "in", "on", "at", "to", "for", "of", "and", "or", "by", "with", "about",
];

const DEFAULT_RESEARCH_FILENAME: &str = "research_results.txt";

/// Truncate to at most `max` bytes, ending in "..." when cut
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max.saturating_sub(3);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// One agent's part of the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub agent: String,
    pub body: String,
}

/// Split on [`AGENT_MARKER`]. Text before the first marker is dropped; the
/// rest of the marker line names the agent.
pub fn split_sections(text: &str) -> Vec<Section> {
    text.split(AGENT_MARKER)
        .skip(1)
        .map(|piece| {
            let (first, rest) = piece.split_once('\n').unwrap_or((piece, ""));
            Section {
                agent: first.trim().to_string(),
                body: rest.trim().to_string(),
            }
        })
        .collect()
}

/// Attribute each section to the first of `roles` mentioned in it.
///
/// Sections that mention none of the roles are left out.
pub fn attribute(text: &str, roles: &[&str]) -> Vec<Section> {
    split_sections(text)
        .into_iter()
        .filter_map(|section| {
            roles
                .iter()
                .find(|role| section.agent.contains(**role) || section.body.contains(**role))
                .map(|role| Section {
                    agent: role.to_string(),
                    body: section.body,
                })
        })
        .collect()
}

/// Size figures shown after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub words: usize,
    pub chars: usize,
    /// Pieces after splitting on the agent marker, preamble included
    pub sections: usize,
}

impl ReportStats {
    pub fn of(text: &str) -> Self {
        Self {
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
            sections: text.split(AGENT_MARKER).count(),
        }
    }
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_` so a topic can't
/// introduce path separators or `..` into a file name
fn filename_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// `research_<w1>_<w2>_<w3>.txt` from the first three significant words
pub fn filename_from_topic(topic: &str) -> String {
    let lower = topic.to_lowercase();
    let words: Vec<String> = lower
        .split_whitespace()
        .filter(|w| !FILENAME_STOP_WORDS.contains(w))
        .map(|w| filename_safe(w).trim_matches('_').to_string())
        .filter(|w| !w.is_empty())
        .take(3)
        .collect();

    if words.is_empty() {
        DEFAULT_RESEARCH_FILENAME.to_string()
    } else {
        format!("research_{}.txt", words.join("_"))
    }
}

pub fn guest_filename(topic: &str) -> String {
    format!("potential_guests_{}.txt", filename_safe(topic.trim()))
}

/// Trim, and end with exactly one newline
pub fn clean_output(text: &str) -> String {
    let mut cleaned = text.trim().to_string();
    cleaned.push('\n');
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "preamble\n# Agent: Topic Analyzer\n## Task: Analyze\n\n## Final Answer:\nAngles\n\n\
                          # Agent: Expert Finder\n## Task: Find\n\n## Final Answer:\n1. Dr. A\n";

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        // Never cuts inside a multi-byte character
        assert_eq!(truncate_str("ééééé", 6), "é...");
    }

    #[test]
    fn test_split_sections_drops_preamble() {
        let sections = split_sections(OUTPUT);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].agent, "Topic Analyzer");
        assert!(sections[0].body.starts_with("## Task: Analyze"));
        assert!(sections[1].body.ends_with("1. Dr. A"));
    }

    #[test]
    fn test_attribute_skips_unknown_sections() {
        let text = format!("{}# Agent: Someone Else\nnothing\n", OUTPUT);
        let sections = attribute(&text, &["Expert Finder", "Topic Analyzer"]);
        let agents: Vec<&str> = sections.iter().map(|s| s.agent.as_str()).collect();
        assert_eq!(agents, vec!["Topic Analyzer", "Expert Finder"]);
    }

    #[test]
    fn test_stats_count_preamble_piece() {
        let stats = ReportStats::of(OUTPUT);
        assert_eq!(stats.sections, 3);
        assert_eq!(stats.chars, OUTPUT.chars().count());
        assert!(stats.words > 10);
        assert_eq!(ReportStats::of("").sections, 1);
    }

    #[test]
    fn test_filename_from_topic() {
        assert_eq!(
            filename_from_topic("Cultural transformation in Assam"),
            "research_cultural_transformation_assam.txt"
        );
        assert_eq!(filename_from_topic("The history of the tea gardens of Bengal"), "research_history_tea_gardens.txt");
        assert_eq!(filename_from_topic("of the and"), "research_results.txt");
        assert_eq!(filename_from_topic(""), "research_results.txt");
    }

    #[test]
    fn test_filenames_stay_inside_output_dir() {
        assert_eq!(filename_from_topic("../../../escape"), "research_escape.txt");
        assert_eq!(filename_from_topic("Partition of 1947: memory/trauma"), "research_partition_1947_memory_trauma.txt");
        assert_eq!(filename_from_topic("/ .. \\"), "research_results.txt");
        assert_eq!(guest_filename("AI/ML startups"), "potential_guests_AI_ML_startups.txt");
        assert_eq!(guest_filename("../etc"), "potential_guests____etc.txt");

        for name in [filename_from_topic("a/../../b c"), guest_filename("x/../../y")] {
            assert!(!name.contains('/') && !name.contains('\\') && !name.contains(".."), "{}", name);
        }
    }

    #[test]
    fn test_guest_filename_and_clean_output() {
        assert_eq!(guest_filename("urban farming"), "potential_guests_urban_farming.txt");
        assert_eq!(clean_output("  text\n\n"), "text\n");
        assert_eq!(clean_output("text"), "text\n");
    }
}
