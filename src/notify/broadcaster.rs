use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::notify::render_attachments;
use crate::registry::StackRegistry;
use crate::slack::SlackClient;

const COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Owns the Slack status message and the command thread under it. The
/// rest of the process reaches this task only through the trigger channel
/// and the registry's public operations.
pub struct Broadcaster {
    slack: SlackClient,
    registry: StackRegistry,
    channel: String,
    header: String,
    message_ts: Option<String>,
    reply_cursor: Option<String>,
}

impl Broadcaster {
    pub fn new(
        slack: SlackClient,
        registry: StackRegistry,
        channel: String,
        header: String,
    ) -> Self {
        Self {
            slack,
            registry,
            channel,
            header,
            message_ts: None,
            reply_cursor: None,
        }
    }

    /// Runs until every trigger sender is gone.
    pub async fn run(mut self, mut triggers: mpsc::Receiver<()>) {
        let mut poll = tokio::time::interval(COMMAND_POLL_INTERVAL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                trigger = triggers.recv() => match trigger {
                    Some(()) => self.broadcast().await,
                    None => break,
                },
                _ = poll.tick() => self.poll_commands().await,
            }
        }
    }

    /// Posts the status card the first time, edits the same message
    /// afterwards. Failures are logged and swallowed; the next trigger
    /// retries.
    async fn broadcast(&mut self) {
        let attachments = render_attachments(&self.registry.snapshot(), Utc::now());

        match &self.message_ts {
            None => {
                match self
                    .slack
                    .post_message(&self.channel, &self.header, &attachments)
                    .await
                {
                    Ok(ts) => self.message_ts = Some(ts),
                    Err(e) => tracing::error!("couldn't post status message: {}", e),
                }
            }
            Some(ts) => {
                if let Err(e) = self
                    .slack
                    .update_message(&self.channel, ts, &self.header, &attachments)
                    .await
                {
                    tracing::error!("couldn't update status message: {}", e);
                }
            }
        }
    }

    async fn poll_commands(&mut self) {
        let Some(ts) = self.message_ts.clone() else {
            return;
        };

        let replies = match self
            .slack
            .thread_replies(&self.channel, &ts, self.reply_cursor.as_deref())
            .await
        {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!("couldn't fetch thread replies: {}", e);
                return;
            }
        };

        for reply in replies {
            // The parent message rides along in the replies listing.
            if reply.ts == ts {
                continue;
            }
            self.reply_cursor = Some(reply.ts.clone());

            let Some(name) = parse_skip_command(&reply.text) else {
                continue;
            };
            self.handle_skip(&name, &ts).await;
        }
    }

    async fn handle_skip(&mut self, name: &str, thread_ts: &str) {
        tracing::info!("operator asked to skip {}", name);

        let confirmation = match self.registry.mark_skipped(name) {
            Ok(true) => format!("skipping {}", name),
            Ok(false) => format!("{} already finished", name),
            Err(_) => format!("no stack named {}", name),
        };

        if let Err(e) = self
            .slack
            .post_thread_reply(&self.channel, thread_ts, &confirmation)
            .await
        {
            tracing::warn!("couldn't reply in thread: {}", e);
        }

        self.broadcast().await;
    }
}

/// `skip <stackName>` — split on the first space, trim the remainder.
/// Anything else is not a command.
pub fn parse_skip_command(text: &str) -> Option<String> {
    let (command, rest) = text.split_once(' ')?;
    if command != "skip" {
        return None;
    }
    let name = rest.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_skip_command() {
        assert_eq!(parse_skip_command("skip orders-api").as_deref(), Some("orders-api"));
    }

    #[test]
    fn the_stack_name_is_trimmed() {
        assert_eq!(parse_skip_command("skip  orders-api ").as_deref(), Some("orders-api"));
    }

    #[test]
    fn other_chatter_is_not_a_command() {
        assert_eq!(parse_skip_command("skipping orders-api"), None);
        assert_eq!(parse_skip_command("please skip orders-api"), None);
        assert_eq!(parse_skip_command("skip"), None);
        assert_eq!(parse_skip_command("skip "), None);
        assert_eq!(parse_skip_command(""), None);
    }
}
