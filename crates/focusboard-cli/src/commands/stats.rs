use chrono::Utc;
use clap::Subcommand;
use focusboard_core::{stats, Config};

use crate::context::{print_json, require_identity, CliResult, Context};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Total focus sessions and per-task breakdown
    Summary,
    /// Interval log with minutes per phase
    History {
        /// Only print the totals
        #[arg(long)]
        totals_only: bool,
    },
    /// Global ranking by completed focus sessions
    Leaderboard {
        /// Number of entries to show
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub async fn run(action: StatsAction) -> CliResult {
    match action {
        StatsAction::Summary => {
            let ctx = Context::open().await?;
            let identity = require_identity(&ctx.config.remote)?;
            let summary =
                stats::summary(identity.store.as_ref(), &identity.user_id, ctx.session.tasks())
                    .await?;
            print_json(&summary)?;
            ctx.finish().await?;
        }
        StatsAction::History { totals_only } => {
            let identity = require_identity(&Config::load()?.remote)?;
            let history = stats::history(identity.store.as_ref(), &identity.user_id, Utc::now()).await?;
            if totals_only {
                print_json(&history.stats)?;
            } else {
                print_json(&history)?;
            }
        }
        StatsAction::Leaderboard { limit } => {
            let identity = require_identity(&Config::load()?.remote)?;
            let entries = stats::leaderboard(identity.store.as_ref(), limit).await?;
            print_json(&entries)?;
        }
    }
    Ok(())
}
