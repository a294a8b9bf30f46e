use std::fmt::Write;

use medguide_core::models::safety::{DirectiveTarget, SafetyDirective, Severity};

use crate::gate::RuleConflict;

/// Plain-text safety report, directives in the order given.
pub fn render_report(directives: &[SafetyDirective], conflicts: &[RuleConflict]) -> String {
    let mut out = String::from("Safety report\n");
    if directives.is_empty() {
        out.push_str("No safety concerns identified by the rule set.\n");
        return out;
    }

    for d in directives {
        let tag = match d.severity {
            Severity::Refer => format!("REFER/{}", d.pathway),
            Severity::Block => "BLOCK".to_string(),
            Severity::Warn => "WARN".to_string(),
        };
        let _ = writeln!(out, "[{tag}] {} ({})", d.message, d.trigger_rule_id);
        match &d.target {
            Some(DirectiveTarget::PlanLine { line_id }) => {
                let _ = writeln!(out, "  applies to plan line {line_id}");
            }
            Some(DirectiveTarget::Medication { code }) => {
                let _ = writeln!(out, "  applies to current medication {code}");
            }
            None => {}
        }
        let _ = writeln!(out, "  action: {}", d.required_action);
    }

    for c in conflicts {
        let target = match &c.target {
            DirectiveTarget::PlanLine { line_id } => line_id.as_str(),
            DirectiveTarget::Medication { code } => code.as_str(),
        };
        let _ = writeln!(
            out,
            "Conflict on {target}: rules {} disagree; applying {}",
            c.rule_ids.join(", "),
            c.effective
        );
    }
    out
}
