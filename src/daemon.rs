//! Long-running poll loop.
//!
//! Multiplexes three event sources with `tokio::select!`:
//! - SIGTERM/SIGINT stop the loop
//! - SIGHUP reloads the settings file and reschedules the timer
//! - [`PollEvent::Tick`] from the [`PollScheduler`] refreshes every feed
//!
//! The loop is the only task that writes to the store. Refreshes run inline,
//! so a tick that arrives while one is in flight is dropped instead of
//! starting a second, overlapping refresh. A refresh in flight still races
//! SIGTERM/SIGINT: the signal cancels it, keeping the sources already stored.
use anyhow::Result;
use std::future::Future;
use std::path::Path;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::app::FeedController;
use crate::config::Settings;
use crate::scheduler::{PollEvent, PollScheduler};

/// What the loop should do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Continue,
    Quit,
}

/// SIGTERM and SIGINT (Ctrl-C off unix).
struct Shutdown {
    #[cfg(unix)]
    term: Signal,
    #[cfg(unix)]
    int: Signal,
}

impl Shutdown {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            term: signal(SignalKind::terminate())?,
            #[cfg(unix)]
            int: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next shutdown signal and return its name.
    async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.term.recv() => "SIGTERM",
                _ = self.int.recv() => "SIGINT",
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Ctrl-C handler failed");
                std::future::pending::<()>().await;
            }
            "Ctrl-C"
        }
    }
}

/// SIGHUP. Never fires off unix.
struct Hangup {
    #[cfg(unix)]
    hup: Signal,
}

impl Hangup {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            hup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        self.hup.recv().await;
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    }
}

/// Run until SIGTERM or SIGINT.
///
/// Refreshes once at startup, then on every tick of the polling interval from
/// the controller's settings. `settings_path` is re-read on SIGHUP.
pub async fn run(controller: &mut FeedController, settings_path: &Path) -> Result<()> {
    let (tick_tx, mut tick_rx) = mpsc::channel::<PollEvent>(1);
    let mut scheduler = PollScheduler::start(
        controller.context().settings.polling_interval.as_duration(),
        tick_tx,
    );

    let mut shutdown = Shutdown::install()?;
    let mut hangup = Hangup::install()?;

    tracing::info!(
        interval = %controller.context().settings.polling_interval,
        feeds = controller.feed_sources().len(),
        "Poller started"
    );
    let mut action = refresh_or_shutdown(controller, &mut tick_rx, shutdown.recv()).await;

    while action == Action::Continue {
        action = tokio::select! {
            biased;

            name = shutdown.recv() => {
                tracing::info!(signal = name, "Shutting down");
                Action::Quit
            }

            _ = hangup.recv() => {
                reload_settings(controller, &mut scheduler, settings_path);
                Action::Continue
            }

            event = tick_rx.recv() => match event {
                Some(PollEvent::Tick) => {
                    refresh_or_shutdown(controller, &mut tick_rx, shutdown.recv()).await
                }
                None => {
                    tracing::warn!("Poll timer stopped unexpectedly");
                    Action::Quit
                }
            },
        };
    }

    scheduler.cancel();
    Ok(())
}

/// Refresh every feed unless `shutdown` resolves first.
async fn refresh_or_shutdown(
    controller: &mut FeedController,
    tick_rx: &mut mpsc::Receiver<PollEvent>,
    shutdown: impl Future<Output = &'static str>,
) -> Action {
    tokio::select! {
        biased;

        name = shutdown => {
            tracing::info!(signal = name, "Shutting down, refresh cancelled");
            Action::Quit
        }

        () = refresh(controller, tick_rx) => Action::Continue,
    }
}

async fn refresh(controller: &mut FeedController, tick_rx: &mut mpsc::Receiver<PollEvent>) {
    match controller.refresh_all_feeds().await {
        Ok(summary) => {
            for report in summary.failures() {
                if let Err(e) = &report.result {
                    tracing::debug!(feed = %report.source_url, error = %e, "Source failed this cycle");
                }
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to reload after refresh"),
    }

    // Ticks that queued up while the refresh ran belong to that cycle
    while tick_rx.try_recv().is_ok() {
        tracing::debug!("Refresh was in flight, skipping tick");
    }
}

fn reload_settings(controller: &mut FeedController, scheduler: &mut PollScheduler, path: &Path) {
    let settings = match Settings::load(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Keeping previous settings");
            return;
        }
    };

    let interval = settings.polling_interval.as_duration();
    controller.set_settings(settings);
    if interval != scheduler.interval() {
        scheduler.reschedule(interval);
    } else {
        tracing::info!("Settings reloaded");
    }
}
