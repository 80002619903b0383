//! Headless playback command.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::build_cache;
use crate::config::PlayerConfig;
use crate::error::{ErrorKind, ResultExt};
use crate::player::{HeadlessMedia, LoadRequest, Player, PlayerEvent};
use crate::source::SourceDescriptor;

/// Length assumed for sources whose decoder reports none.
const UNKNOWN_LENGTH: Duration = Duration::from_secs(30);

/// Play sources in order through a headless player
pub fn cmd_play(rt: &Runtime, config: PlayerConfig, urls: &[String]) -> anyhow::Result<()> {
    rt.block_on(async {
        let poll = config.progress_interval();
        let media = Arc::new(HeadlessMedia::new().with_fallback_duration(UNKNOWN_LENGTH));
        let mut player = Player::builder()
            .cache(build_cache(&config))
            .config(config)
            .media(media)
            .build()?;
        player
            .enqueue(urls.iter().map(SourceDescriptor::new).collect())
            .with_context("queueing sources")?;

        let mut events = player.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(missed)) => debug!(missed, "event printer lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let mut played = 0usize;
        loop {
            match player.load(LoadRequest::next()).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::QueueExhausted => break,
                Err(e) => {
                    printer.abort();
                    return Err(e.context(format!("loading source {}", played + 1)).into());
                }
            }
            player
                .play()
                .await
                .with_context(format!("starting source {}", played + 1))?;
            played += 1;

            let interrupted = loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break true,
                    _ = tokio::time::sleep(poll) => {}
                }
                player.sync();
                if !player.is_playing() {
                    break false;
                }
            };
            if interrupted {
                warn!("interrupted, stopping playback");
                player.pause().await?;
                break;
            }
            // A single-entry queue would reload itself forever
            if player.queue().len() == 1 {
                break;
            }
        }

        info!(played, "playback finished");
        drop(player);
        // The printer ends once every event sender is gone
        let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
        Ok(())
    })
}

fn print_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::Metadata { title, creator } => match creator {
            Some(creator) => println!("Now playing: {} - {}", creator, title),
            None => println!("Now playing: {}", title),
        },
        PlayerEvent::Presented(url) => info!(%url, "presented"),
        PlayerEvent::Preloaded(url) => info!(%url, "next source ready"),
        PlayerEvent::Phase(phase) => debug!(?phase, "phase"),
        PlayerEvent::Progress(fraction) => debug!(fraction, "progress"),
        other => debug!(?other, "player event"),
    }
}
