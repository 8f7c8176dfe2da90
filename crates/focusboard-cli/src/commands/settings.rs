use clap::Subcommand;

use crate::context::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the effective settings
    Show,
    /// Change one setting and sync it to the remote store
    Set {
        /// Setting name (e.g. "focus_duration", "auto_start_break")
        key: String,
        /// New value; durations are in seconds
        value: String,
    },
}

pub async fn run(action: SettingsAction) -> CliResult {
    let mut ctx = Context::open().await?;

    match action {
        SettingsAction::Show => print_json(ctx.session.settings())?,
        SettingsAction::Set { key, value } => {
            let mut config = ctx.config.clone();
            config.set(&format!("settings.{key}"), &value)?;
            let event = ctx.session.apply_settings(config.settings)?;
            config.save()?;
            ctx.config = config;
            print_json(&serde_json::json!({
                "settings": ctx.session.settings(),
                "event": event,
            }))?;
        }
    }

    ctx.finish().await
}
