//! Terminal rendering for a reasoning session.
//!
//! Everything here returns a `String` so the layout is testable; `main`
//! decides where it gets printed.

use std::time::Duration;

use stepwise_agent::SessionEvent;
use stepwise_core::step::ReasoningStep;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const PANEL_WIDTH: usize = 72;

pub fn banner(provider: &str, model: &str, max_steps: u32, verify: bool) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("  ╔══════════════════════════════════════════════╗\n");
    out.push_str("  ║     Stepwise: Reasoning Chains for LLMs      ║\n");
    out.push_str("  ╚══════════════════════════════════════════════╝\n");
    out.push('\n');
    out.push_str(&format!("  Provider:  {provider}\n"));
    out.push_str(&format!("  Model:     {model}\n"));
    out.push_str(&format!("  Steps:     up to {max_steps}\n"));
    if verify {
        out.push_str("  Verify:    on\n");
    }
    out
}

/// A titled box around wrapped text, with an optional right-aligned footer.
pub fn panel(title: &str, body: &str, footer: Option<&str>) -> String {
    let inner = PANEL_WIDTH - 4;
    let mut out = String::new();

    let heading = truncate(title, inner - 2);
    let fill = PANEL_WIDTH.saturating_sub(heading.width() + 5);
    out.push_str(&format!("┌─ {heading} {}┐\n", "─".repeat(fill)));

    for line in wrap(body, inner) {
        let pad = inner.saturating_sub(line.width());
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(pad)));
    }

    match footer {
        Some(footer) => {
            let footer = truncate(footer, inner - 2);
            let fill = PANEL_WIDTH.saturating_sub(footer.width() + 5);
            out.push_str(&format!("└{} {footer} ─┘\n", "─".repeat(fill)));
        }
        None => out.push_str(&format!("└{}┘\n", "─".repeat(PANEL_WIDTH - 2))),
    }
    out
}

pub fn step_panel(index: u32, step: &ReasoningStep) -> String {
    panel(
        &format!("Step {index}: {}", step.title),
        &step.content,
        Some(&format_duration(step.step_duration)),
    )
}

pub fn verification_panel(step: &ReasoningStep) -> String {
    panel(
        &format!("Verification: {}", step.title),
        &step.content,
        Some(&format_duration(step.step_duration)),
    )
}

pub fn final_answer_panel(content: &str, duration: Duration) -> String {
    panel("Final Answer", content, Some(&format_duration(duration)))
}

/// Shown when the step ceiling cut the reasoning short.
pub fn ceiling_notice(steps: usize) -> String {
    format!(
        "  Note: reasoning stopped at the step limit ({steps} steps) before the model signalled a final answer.\n"
    )
}

pub fn total_time(total: Duration) -> String {
    format!("Total thinking time: {:.2}s", total.as_secs_f64())
}

/// Render one loop event, or `None` for events with nothing to show.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Started { .. } => None,
        SessionEvent::Step { index, step } => Some(step_panel(*index, step)),
        SessionEvent::Verification { step } => Some(verification_panel(step)),
        SessionEvent::StepFailed { index, message } => Some(format!(
            "  [Step {index} failed] {message}\n  Continuing to the final answer with the steps so far.\n"
        )),
        SessionEvent::FinalAnswer { content, duration } => {
            Some(final_answer_panel(content, *duration))
        }
        SessionEvent::FinalizationFailed { message } => Some(format!(
            "  No final answer available.\n  Reason: {message}\n"
        )),
        SessionEvent::Done { total_duration, .. } => Some(format!("\n{}\n", total_time(*total_duration))),
        // Returned from the loop and reported by `main`.
        SessionEvent::Error { .. } => None,
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let (mut cut, _) = split_at_width(text, max.saturating_sub(1));
    cut.push('…');
    cut
}

/// Split `text` so the head fits in `width` display columns. The head takes
/// at least one character so callers always make progress.
fn split_at_width(text: &str, width: usize) -> (String, String) {
    let mut used = 0;
    let mut split = text.len();
    for (idx, ch) in text.char_indices() {
        let w = ch.width().unwrap_or(0);
        if used + w > width && idx > 0 {
            split = idx;
            break;
        }
        used += w;
    }
    (text[..split].to_string(), text[split..].to_string())
}

/// Greedy word wrap by display width. Explicit newlines are kept; words
/// wider than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            while word.width() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let (head, rest) = split_at_width(&word, width);
                lines.push(head);
                word = rest;
            }
            if word.is_empty() {
                continue;
            }

            let needed = if current.is_empty() {
                word.width()
            } else {
                current.width() + 1 + word.width()
            };
            if needed > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
