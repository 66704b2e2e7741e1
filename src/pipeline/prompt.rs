//! Rendering of sequenced endpoints into oracle prompt text.
//!
//! The instruction preamble wording belongs to the prompt collaborator and
//! is injected through configuration; this module only owns the
//! deterministic structural part, which mirrors the order produced by the
//! sequencer so the oracle's keyed output can be re-associated by id.

use std::fmt::Write;

use crate::sequence::SequencedEndpoint;

/// Default instruction preamble describing the expected JSON contract.
pub const DEFAULT_PREAMBLE: &str = r#"Generate realistic and comprehensive test cases for the API endpoints below, grouped by collection. Respect the exact order the endpoints are listed in, and use the exact IDs provided.

Respond with only a JSON object of this shape, no explanation:

{
  "<id>": {
    "operation": "<operation>",
    "success": [{"payload": {...}, "expected_response": {...}, "response_code": <code>}],
    "failure": [{"payload": {...}, "expected_response": {...}, "response_code": <code>}]
  }
}

Reuse the resource id returned by the create operation across read, update, and delete cases, and reuse registered credentials across login cases.

Here are the endpoints in their collection:
"#;

/// Renders the sequenced endpoints of one collection into prompt text.
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    preamble: String,
}

impl PromptRenderer {
    /// Create a renderer with the given instruction preamble.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    /// Render the full prompt for one collection, in sequenced order.
    pub fn render(&self, collection: &str, sequenced: &[SequencedEndpoint]) -> String {
        let mut prompt = String::with_capacity(self.preamble.len() + sequenced.len() * 256);
        prompt.push_str(&self.preamble);
        let _ = writeln!(prompt, "\n# Collection: {}", collection);

        for entry in sequenced {
            let ep = &entry.endpoint;
            let params = serde_json::to_string(&ep.params).unwrap_or_else(|_| "[]".to_string());
            let responses =
                serde_json::to_string(&ep.responses).unwrap_or_else(|_| "{}".to_string());

            let _ = writeln!(prompt, "ID: {}", entry.prompt_id);
            let _ = writeln!(prompt, "Operation: {}", entry.operation);
            let _ = writeln!(prompt, "Path: {}", ep.path);
            let _ = writeln!(prompt, "Method: {}", ep.method);
            let _ = writeln!(prompt, "Handler: {}", ep.handler);
            let _ = writeln!(prompt, "Params: {}", params);
            let _ = writeln!(prompt, "Summary: {}", ep.summary);
            let _ = writeln!(prompt, "Responses: {}", responses);
            let _ = writeln!(prompt, "File: {}", ep.file);
            prompt.push('\n');
        }
        prompt
    }
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PREAMBLE)
    }
}
