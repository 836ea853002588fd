//! Prompt templates for LLM interactions

use crate::drift::{DocumentationDrift, DriftSuggestion};

/// Prompt asking for a structured judgement on one drift
pub struct ReviewPrompt;

impl ReviewPrompt {
    /// Generate a prompt reviewing `suggestion` for `drift`
    pub fn generate(drift: &DocumentationDrift, suggestion: &DriftSuggestion) -> String {
        let diff = &drift.diff;
        let mut prompt = String::new();

        prompt.push_str(REVIEW_SYSTEM_PROMPT);
        prompt.push('\n');

        prompt.push_str("## Code Change\n\n");
        prompt.push_str(&format!("**File:** `{}`\n", drift.file_path));
        prompt.push_str(&format!("**Symbol:** `{}` ({})\n", diff.symbol_name, diff.category));
        prompt.push_str(&format!("**Change:** {} ({} impact)\n", diff.kind, diff.impact_level));
        prompt.push_str(&format!("**Details:** {}\n", diff.details));
        if let Some(ref old) = diff.old_signature {
            prompt.push_str(&format!("**Before:** `{}`\n", old));
        }
        if let Some(ref new) = diff.new_signature {
            prompt.push_str(&format!("**After:** `{}`\n", new));
        }
        prompt.push('\n');

        prompt.push_str("## Documentation Section\n\n");
        prompt.push_str(&format!("**File:** `{}`\n", suggestion.doc_file));
        prompt.push_str(&format!("**Section:** {}\n", suggestion.section_heading));
        prompt.push_str(&format!(
            "\n**Content:**\n```markdown\n{}\n```\n\n",
            suggestion.original_content
        ));

        prompt.push_str("## Proposed Edit\n\n");
        prompt.push_str(&format!(
            "```markdown\n{}\n```\n\n",
            suggestion.suggested_content
        ));

        prompt.push_str(REVIEW_INSTRUCTIONS);

        prompt
    }
}

const REVIEW_SYSTEM_PROMPT: &str = r#"You are a documentation drift analyzer. Your task is to judge whether a documentation section still matches the code after a structural change.

You will be given:
1. The structural change detected in the code
2. The documentation section that references the changed symbol
3. A mechanically proposed edit of that section
"#;

const REVIEW_INSTRUCTIONS: &str = r#"## Instructions

Respond with a JSON object containing exactly these fields:

```json
{
  "isDrift": true,
  "explanation": "Why the documentation is or is not out of date",
  "suggestedContent": "The complete corrected section, or null to keep the proposed edit",
  "confidence": 0.9
}
```

Guidelines:
- Set isDrift to false when the section does not describe the changed behavior
- suggestedContent must be the complete section, not a diff
- Preserve the original style, tone and heading structure
- Confidence should be between 0.0 and 1.0

Respond ONLY with the JSON object, no additional text.
"#;
