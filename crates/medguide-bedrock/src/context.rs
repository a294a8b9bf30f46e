//! Message assembly for phrasing requests.
//!
//! The user message carries three XML-style blocks: recent conversation,
//! evidence excerpts keyed by locator, and the structured result the model
//! must restate.

use medguide_core::generation::GenerationRequest;

/// Evidence excerpts as a block. Empty input gives an empty string.
pub fn build_evidence_block(excerpts: &[(String, String)]) -> String {
    if excerpts.is_empty() {
        return String::new();
    }

    let mut block = String::from("<evidence_context>\n");
    for (locator, text) in excerpts {
        block.push_str(&format!("<excerpt locator=\"{locator}\">\n"));
        block.push_str(text);
        if !text.ends_with('\n') {
            block.push('\n');
        }
        block.push_str("</excerpt>\n");
    }
    block.push_str("</evidence_context>");
    block
}

pub fn build_history_block(history: &[String]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut block = String::from("<conversation>\n");
    for line in history {
        block.push_str(line);
        block.push('\n');
    }
    block.push_str("</conversation>");
    block
}

pub fn build_user_message(request: &GenerationRequest) -> String {
    let mut parts = Vec::new();
    let history = build_history_block(&request.history);
    if !history.is_empty() {
        parts.push(history);
    }
    let evidence = build_evidence_block(&request.evidence_context);
    if !evidence.is_empty() {
        parts.push(evidence);
    }
    parts.push(format!(
        "<structured_result>\n{}\n</structured_result>",
        request.structured_summary.trim_end()
    ));
    parts.join("\n\n")
}
