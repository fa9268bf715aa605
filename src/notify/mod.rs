mod broadcaster;

pub use broadcaster::Broadcaster;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Stack, StackStatus};

/// One colored entry on the status card, serialized straight into the
/// Slack call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Attachment {
    pub color: String,
    pub text: String,
}

fn status_color(status: StackStatus) -> &'static str {
    match status {
        StackStatus::Skipped => "#aaa",
        StackStatus::Working => "#ffa500",
        StackStatus::Failed => "#ff4500",
        StackStatus::Done => "#0b0",
    }
}

/// Renders total elapsed seconds as MM:SS. Minutes may run past 59; this
/// is a duration, not a wall clock.
pub fn format_duration(total_seconds: i64) -> String {
    let seconds = total_seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn status_line(stack: &Stack, now: DateTime<Utc>) -> String {
    let suffix = match stack.status {
        StackStatus::Working => {
            let elapsed = (now - stack.started_at).num_seconds();
            format!(" deploying ({})", format_duration(elapsed))
        }
        StackStatus::Skipped => " skipped".to_string(),
        StackStatus::Done => {
            let finished = stack.finished_at.unwrap_or(now);
            let took = (finished - stack.started_at).num_seconds();
            format!(" succeeded (took {})", format_duration(took))
        }
        StackStatus::Failed => " FAILED".to_string(),
    };
    format!("{}{}", stack.name, suffix)
}

/// One attachment per tracked stack, in registration order.
pub fn render_attachments(stacks: &[Stack], now: DateTime<Utc>) -> Vec<Attachment> {
    stacks
        .iter()
        .map(|stack| Attachment {
            color: status_color(stack.status).to_string(),
            text: status_line(stack, now),
        })
        .collect()
}
