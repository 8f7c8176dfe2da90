//! Shared setup for commands that drive the session.

use std::sync::Arc;

use focusboard_core::storage::RemoteConfig;
use focusboard_core::{
    Config, Database, Identity, PomodoroSession, RestStore, SessionOptions, SystemClock,
};
use serde::Serialize;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build the remote identity from config, if one is configured.
pub fn identity(remote: &RemoteConfig) -> CliResult<Option<Identity>> {
    if !remote.is_configured() {
        return Ok(None);
    }
    let mut store = RestStore::new(remote.url.trim(), remote.api_key.trim())?;
    if !remote.access_token.trim().is_empty() {
        store = store.with_access_token(remote.access_token.trim());
    }
    Ok(Some(Identity::new(remote.user_id.trim(), Arc::new(store))))
}

pub fn require_identity(remote: &RemoteConfig) -> CliResult<Identity> {
    identity(remote)?
        .ok_or_else(|| "no remote identity configured (set remote.url and remote.user_id)".into())
}

pub struct Context {
    pub config: Config,
    pub session: PomodoroSession,
}

impl Context {
    /// Load config, open the local database and restore the session.
    /// A completion replayed during restore is printed before anything else.
    pub async fn open() -> CliResult<Self> {
        let mut config = Config::load()?;
        let identity = identity(&config.remote)?;
        let options = SessionOptions {
            settings: config.settings,
            persist_focus_streak: config.timer.persist_focus_streak,
            outbox_capacity: config.outbox.capacity,
        };
        let (session, replayed) = PomodoroSession::bootstrap(
            options,
            Box::new(Database::open()?),
            Arc::new(SystemClock),
            identity,
        )
        .await?;
        for event in &replayed {
            print_json(event)?;
        }

        // Keep the cached copy in line with what the remote row says.
        if *session.settings() != config.settings {
            config.settings = *session.settings();
            config.save()?;
        }
        Ok(Self { config, session })
    }

    /// Deliver queued remote writes. Failures stay queued for the next
    /// invocation and are only logged.
    pub async fn finish(mut self) -> CliResult {
        let report = self.session.flush().await?;
        if report.failed > 0 {
            tracing::warn!(
                pending = report.pending,
                "remote writes could not be delivered, will retry next time"
            );
        }
        Ok(())
    }
}
