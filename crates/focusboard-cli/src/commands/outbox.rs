use clap::Subcommand;

use crate::context::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum OutboxAction {
    /// Show queued remote writes
    Status,
    /// Deliver queued remote writes now
    Flush,
}

pub async fn run(action: OutboxAction) -> CliResult {
    let mut ctx = Context::open().await?;

    match action {
        OutboxAction::Status => {
            let outbox = ctx.session.outbox();
            print_json(&serde_json::json!({
                "pending": outbox.len(),
                "capacity": outbox.capacity(),
                "remote": ctx.session.identity().is_some(),
                "entries": outbox.to_vec(),
            }))?;
            Ok(())
        }
        OutboxAction::Flush => {
            let mut failures = ctx.session.subscribe_failures();
            let report = ctx.session.flush().await?;
            let mut errors = Vec::new();
            while let Ok(failure) = failures.try_recv() {
                errors.push(failure);
            }
            print_json(&serde_json::json!({
                "report": report,
                "failures": errors,
            }))?;
            Ok(())
        }
    }
}
