//! Instruction template for the generation request.

use std::fmt::Write;

use serde::Deserialize;

use crate::gemini::GenerationRequest;

/// How hard the prompt pushes away from previously published posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Forbid exact repeats, tolerate similar topics, move away from the last post.
    #[default]
    Soft,
    /// Forbid anything sharing a topic or phrasing with past posts.
    Strict,
}

/// Style constraints for the generated post. Every field has a default so a
/// partial `[prompt]` table is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptTemplate {
    pub language: String,
    pub min_chars: u32,
    pub max_chars: u32,
    pub topics: Vec<String>,
    pub examples: Vec<String>,
    pub extra_instructions: Vec<String>,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            min_chars: 5,
            max_chars: 30,
            topics: Vec::new(),
            examples: Vec::new(),
            extra_instructions: Vec::new(),
            duplicate_policy: DuplicatePolicy::Soft,
        }
    }
}

impl PromptTemplate {
    /// Compose the full instruction text, with `history` listed as posts to avoid.
    pub fn render(&self, history: &[String], grounding: bool) -> String {
        let mut out = String::new();

        out.push_str("# Instruction\n");
        out.push_str(
            "Do not output any thought process, explanations, preambles, candidate lists \
             or closing remarks. Output only the text of the post itself.\n\n",
        );

        out.push_str("# Requirements\n");
        out.push_str("- Generate exactly **one** interesting one-line post.\n");
        let _ = writeln!(out, "- Write in {}.", self.language);
        out.push_str("- Do not use emojis or special characters.\n");
        out.push_str("- Never include hashtags (#).\n");
        let _ = writeln!(
            out,
            "- Keep it short, around {}-{} characters.",
            self.min_chars, self.max_chars
        );
        if grounding {
            out.push_str("- Build the post around recent topics or news found with the search tool.\n");
        }
        if !self.topics.is_empty() {
            let _ = writeln!(
                out,
                "- Involve at least one of these themes: {}.",
                self.topics.join(", ")
            );
        }
        for extra in &self.extra_instructions {
            let _ = writeln!(out, "- {extra}");
        }

        if !self.examples.is_empty() {
            out.push_str("\n# Good examples\n");
            for example in &self.examples {
                let _ = writeln!(out, "{example}");
            }
        }

        if !history.is_empty() {
            out.push_str("\n# Previously published posts\n");
            match self.duplicate_policy {
                DuplicatePolicy::Strict => {
                    out.push_str(
                        "- Do not generate anything that shares a topic, genre or phrasing \
                         with the posts below.\n",
                    );
                }
                DuplicatePolicy::Soft => {
                    out.push_str("- Do not generate a post identical to any of the posts below.\n");
                    out.push_str("- Slight similarity in genre, topic or tone is acceptable.\n");
                    out.push_str(
                        "- Move away from the genre and topic of the most recent post (the last one).\n",
                    );
                }
            }
            for past in history {
                let _ = writeln!(out, "  - {past}");
            }
        }

        out.push_str("\nFollow the instructions above strictly and output only the post text.\n");
        out
    }

    pub fn request(&self, history: &[String], grounding: bool) -> GenerationRequest {
        GenerationRequest {
            prompt: self.render(history, grounding),
            grounding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_no_avoid_section() {
        let prompt = PromptTemplate::default().render(&[], true);
        assert!(!prompt.contains("Previously published"));
        assert!(prompt.contains("Write in English."));
        assert!(prompt.contains("around 5-30 characters"));
        assert!(prompt.contains("search tool"));
    }

    #[test]
    fn history_entries_are_listed_in_order() {
        let history = vec!["first post".to_string(), "second post".to_string()];
        let prompt = PromptTemplate::default().render(&history, false);
        let first = prompt.find("first post").unwrap();
        let second = prompt.find("second post").unwrap();
        assert!(first < second);
        assert!(prompt.contains("identical"));
        assert!(!prompt.contains("search tool"));
    }

    #[test]
    fn strict_policy_forbids_shared_topics() {
        let template = PromptTemplate {
            duplicate_policy: DuplicatePolicy::Strict,
            ..Default::default()
        };
        let prompt = template.render(&["old".to_string()], true);
        assert!(prompt.contains("shares a topic"));
        assert!(!prompt.contains("Slight similarity"));
    }

    #[test]
    fn topics_and_extras_are_included() {
        let template = PromptTemplate {
            topics: vec!["mahjong".into(), "sweets".into()],
            extra_instructions: vec!["Be playful.".into()],
            ..Default::default()
        };
        let prompt = template.render(&[], true);
        assert!(prompt.contains("mahjong, sweets"));
        assert!(prompt.contains("- Be playful."));
    }

    #[test]
    fn partial_table_uses_defaults() {
        let template: PromptTemplate = toml::from_str(
            r#"
            language = "Japanese"
            duplicate_policy = "strict"
        "#,
        )
        .unwrap();
        assert_eq!(template.language, "Japanese");
        assert_eq!(template.duplicate_policy, DuplicatePolicy::Strict);
        assert_eq!(template.max_chars, 30);
    }

    #[test]
    fn request_carries_grounding_flag() {
        let req = PromptTemplate::default().request(&[], true);
        assert!(req.grounding);
        assert!(req.prompt.starts_with("# Instruction"));
    }
}
