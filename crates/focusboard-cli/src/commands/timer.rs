use std::future::Future;
use std::io::{IsTerminal, Write};

use clap::Subcommand;
use focusboard_core::{ClockDriver, Phase, PomodoroSession};

use crate::context::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Start or resume the countdown
    Start,
    /// Pause the countdown, keeping progress
    Pause,
    /// Restore the full duration of the current phase
    Reset,
    /// Complete the current phase now
    Skip,
    /// Switch to another phase without logging the current one
    Switch {
        /// focus, short_break or long_break
        phase: Phase,
    },
    /// Run the countdown in the foreground until the timer goes idle.
    /// Ctrl-C leaves it running; the next invocation picks it up.
    Run,
}

pub async fn run(action: TimerAction) -> CliResult {
    let mut ctx = Context::open().await?;

    match action {
        TimerAction::Status => print_json(&ctx.session.status())?,
        TimerAction::Start => match ctx.session.start()? {
            Some(event) => print_json(&event)?,
            None => print_json(&ctx.session.status())?,
        },
        TimerAction::Pause => match ctx.session.pause()? {
            Some(event) => print_json(&event)?,
            None => print_json(&ctx.session.status())?,
        },
        TimerAction::Reset => print_json(&ctx.session.reset()?)?,
        TimerAction::Skip => print_json(&ctx.session.skip()?)?,
        TimerAction::Switch { phase } => print_json(&ctx.session.switch(phase)?)?,
        TimerAction::Run => run_foreground(&mut ctx).await?,
    }

    ctx.finish().await
}

async fn run_foreground(ctx: &mut Context) -> CliResult {
    if let Some(event) = ctx.session.start()? {
        print_json(&event)?;
    }
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("interrupted, timer left running");
    };
    let completed = drive(&mut ctx.session, shutdown).await?;
    tracing::debug!(completed, "foreground run finished");
    print_json(&ctx.session.status())
}

/// Feed clock ticks to the session until it goes idle or `shutdown`
/// resolves. Returns the number of phases completed.
///
/// Remote writes made by completions stay queued here. A slow store must
/// not hold up the tick stream, so delivery waits until the run is over.
async fn drive(session: &mut PomodoroSession, shutdown: impl Future<Output = ()>) -> CliResult<usize> {
    let (mut driver, mut ticks) = ClockDriver::new(ClockDriver::DEFAULT_PERIOD);
    driver.sync(session.is_running());
    let show_title = std::io::stderr().is_terminal();
    tokio::pin!(shutdown);

    let mut completed = 0;
    while session.is_running() {
        tokio::select! {
            _ = &mut shutdown => break,
            tick = ticks.recv() => {
                let Some(tick) = tick else { break };
                if tick.generation != driver.generation() {
                    continue;
                }
                if let Some(event) = session.tick()? {
                    completed += 1;
                    if show_title {
                        eprintln!();
                    }
                    print_json(&event)?;
                    // New phase, new tick stream.
                    driver.disarm();
                    driver.sync(session.is_running());
                } else if show_title {
                    let mut stderr = std::io::stderr();
                    write!(stderr, "\r{}  ", session.title())?;
                    stderr.flush()?;
                }
            }
        }
    }

    driver.disarm();
    if show_title {
        eprintln!();
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use focusboard_core::{Identity, MemoryKv, MemoryStore, SessionOptions, SystemClock, UserSettings};

    use super::*;

    async fn session(store: Arc<MemoryStore>) -> PomodoroSession {
        let options = SessionOptions {
            settings: UserSettings {
                focus_duration: 3,
                short_break_duration: 2,
                auto_start_break: true,
                ..UserSettings::default()
            },
            ..SessionOptions::default()
        };
        let (session, _) = PomodoroSession::bootstrap(
            options,
            Box::new(MemoryKv::new()),
            Arc::new(SystemClock),
            Some(Identity::new("u1", store)),
        )
        .await
        .unwrap();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn drive_leaves_remote_writes_queued() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone()).await;
        session.start().unwrap();

        let completed = drive(&mut session, std::future::pending()).await.unwrap();
        assert_eq!(completed, 2);
        assert!(!session.is_running());
        assert_eq!(session.machine().phase(), Phase::Focus);
        assert!(store.intervals().is_empty());
        assert_eq!(session.outbox().len(), 2);

        let report = session.flush().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(store.intervals().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drive_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store).await;
        session.start().unwrap();

        let completed = drive(&mut session, async {}).await.unwrap();
        assert_eq!(completed, 0);
        assert!(session.is_running());
    }
}
