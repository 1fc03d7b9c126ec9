//! System prompt assembly for the classifier.

use crate::models::FeedbackEntry;

/// Task description sent with every request.
pub const DEFAULT_INSTRUCTIONS: &str = "You classify the most likely ethnicity for a given personal name of a signup. \
Return a single concise label (e.g. 'Indian', 'East Asian', 'Middle Eastern', \
'African', 'European', 'Latino', 'Mixed', or 'Unknown'). \
Use 'Unknown' if the ethnicity cannot be determined confidently from the name alone.";

const EXAMPLES_HEADING: &str = "Previously approved mappings:";

/// Everything needed to ask the classifier about one name.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub subject_name: &'a str,
    /// Already capped at the few-shot count by the caller.
    pub fewshot_examples: Vec<&'a FeedbackEntry>,
    pub custom_instructions: Option<&'a str>,
}

impl<'a> PromptContext<'a> {
    pub fn new(
        subject_name: &'a str,
        fewshot_examples: Vec<&'a FeedbackEntry>,
        custom_instructions: Option<&'a str>,
    ) -> Self {
        Self {
            subject_name,
            fewshot_examples,
            custom_instructions,
        }
    }

    /// The system prompt for this request.
    pub fn render(&self) -> String {
        build_prompt(&self.fewshot_examples, self.custom_instructions)
    }

    /// The user message carrying the name to classify.
    pub fn user_message(&self) -> String {
        user_message(self.subject_name)
    }
}

/// Build the system prompt.
///
/// Custom instructions follow the task description after a blank line.
/// Examples are listed in the order given, one `- name -> label` line each.
///
/// ```text
/// You classify the most likely ethnicity ...
///
/// Previously approved mappings:
/// - Rahul Sharma -> Indian
/// - Ana Souza -> Latino (Brazilian surname)
/// ```
pub fn build_prompt(examples: &[&FeedbackEntry], custom_instructions: Option<&str>) -> String {
    let mut prompt = String::from(DEFAULT_INSTRUCTIONS);

    if let Some(custom) = custom_instructions.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(custom);
    }

    if !examples.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(EXAMPLES_HEADING);
        for entry in examples {
            prompt.push_str("\n- ");
            prompt.push_str(&entry.name);
            prompt.push_str(" -> ");
            prompt.push_str(&entry.ethnicity);
            if let Some(ref notes) = entry.notes {
                prompt.push_str(&format!(" ({})", notes));
            }
        }
    }

    prompt
}

pub fn user_message(subject_name: &str) -> String {
    format!("Name: {}", subject_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_examples_no_custom() {
        assert_eq!(build_prompt(&[], None), DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn test_custom_instructions_appended() {
        let prompt = build_prompt(&[], Some("  Prefer regional labels.\n"));
        assert_eq!(
            prompt,
            format!("{}\n\nPrefer regional labels.", DEFAULT_INSTRUCTIONS)
        );
    }

    #[test]
    fn test_blank_custom_instructions_ignored() {
        assert_eq!(build_prompt(&[], Some("   ")), DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn test_examples_rendered_in_order() {
        let first = FeedbackEntry::new("Rahul Sharma", "Indian", None);
        let second = FeedbackEntry::new("Ana Souza", "Latino", Some("Brazilian surname"));
        let prompt = build_prompt(&[&first, &second], None);

        let expected = format!(
            "{}\n\nPreviously approved mappings:\n- Rahul Sharma -> Indian\n- Ana Souza -> Latino (Brazilian surname)",
            DEFAULT_INSTRUCTIONS
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_context_renders_user_message() {
        let context = PromptContext::new("Sakura Tanaka", vec![], None);
        assert_eq!(context.user_message(), "Name: Sakura Tanaka");
        assert_eq!(context.render(), DEFAULT_INSTRUCTIONS);
    }
}
