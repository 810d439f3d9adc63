//! Application orchestrator: wires config, relay and console together.

use std::sync::Arc;
use std::time::Duration;

use linkdrop_protocol::{ChatEvent, ChatId, SessionKey};
use linkdrop_relay::{PendingTransfer, Relay};
use linkdrop_session::InMemoryStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::console::{CONSOLE_CHAT, ConsoleClient, ConsoleInput, parse_line, upload_event};

/// Runs the relay until stdin closes or Ctrl-C is pressed.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let http = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .user_agent(config.user_agent.as_str())
        .build()?;

    let client = Arc::new(ConsoleClient::new(config.outbox_dir.clone()));
    let mut relay = Relay::new(client.clone(), http, config.relay_config());

    // -- Session sweeper --
    if let Some(ttl) = config.session_ttl() {
        relay = relay.with_stores(
            Arc::new(InMemoryStore::<SessionKey, PendingTransfer>::with_ttl(ttl)),
            Arc::new(InMemoryStore::<ChatId, PendingTransfer>::with_ttl(ttl)),
        );
    }
    let relay = Arc::new(relay);

    if let Some(ttl) = config.session_ttl() {
        tokio::spawn(sweep_sessions(relay.clone(), sweep_interval(ttl), cancel.clone()));
        tracing::info!(ttl_secs = ttl.as_secs(), "session eviction enabled");
    }

    tracing::info!("ready: paste a link, /upload <path> [mime], or a JSON event");

    // -- Main loop --
    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("SIGINT received, shutting down");
                tasks.abort_all();
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("input closed, waiting for transfers in flight");
                    break;
                };
                if let Some(event) = read_event(&client, &line).await {
                    let relay = relay.clone();
                    tasks.spawn(async move { dispatch(&relay, event).await });
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "event task failed");
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Err(e) if !e.is_cancelled() => tracing::error!(error = %e, "event task failed"),
            _ => {}
        }
    }

    cancel.cancel();
    Ok(())
}

/// Turns one console line into an event, logging input mistakes.
async fn read_event(client: &ConsoleClient, line: &str) -> Option<ChatEvent> {
    match parse_line(line) {
        Ok(ConsoleInput::Event(event)) => Some(event),
        Ok(ConsoleInput::Select(data)) => Some(client.selection(CONSOLE_CHAT, data)),
        Ok(ConsoleInput::Upload { path, mime }) => match upload_event(&path, mime).await {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot offer file");
                None
            }
        },
        Ok(ConsoleInput::Empty) => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed input");
            None
        }
    }
}

async fn dispatch(relay: &Relay, event: ChatEvent) {
    let chat_id = event.chat_id();
    match relay.handle_event(event).await {
        Ok(()) => {}
        // Already answered in the chat and logged by the relay.
        Err(e) if e.is_user_facing() => {
            tracing::debug!(chat_id, error = %e, "request rejected");
        }
        Err(e) => tracing::error!(chat_id, error = %e, "chat client failure"),
    }
}

fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

async fn sweep_sessions(relay: Arc<Relay>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = relay.evict_expired();
                if evicted > 0 {
                    tracing::info!(
                        evicted,
                        pending = relay.pending_count(),
                        "abandoned sessions evicted"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_is_bounded() {
        assert_eq!(sweep_interval(Duration::from_secs(600)), Duration::from_secs(60));
        assert_eq!(sweep_interval(Duration::from_secs(30)), Duration::from_secs(15));
        assert_eq!(sweep_interval(Duration::from_millis(100)), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let client = Arc::new(ConsoleClient::new("outbox"));
        let relay = Arc::new(Relay::new(
            client,
            reqwest::Client::new(),
            Config::default().relay_config(),
        ));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sweep_sessions(relay, Duration::from_millis(10), cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn select_line_targets_last_prompt() {
        let client = ConsoleClient::new("outbox");
        let event = read_event(&client, "/select default|abc").await.unwrap();
        assert!(matches!(event, ChatEvent::Selection { data, .. } if data == "default|abc"));
        assert!(read_event(&client, "").await.is_none());
        assert!(read_event(&client, "{bad").await.is_none());
    }
}
