use clap::Subcommand;
use serde::Serialize;

use crate::context::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task; it goes to the top of the list and becomes active
    Add {
        /// Task name
        name: String,
    },
    /// List tasks, active first
    List,
    /// Make the task at INDEX active
    Activate {
        /// Position in `task list`
        index: usize,
    },
    /// Remove the task at INDEX
    Remove {
        /// Position in `task list`
        index: usize,
    },
}

#[derive(Serialize)]
struct ListedTask<'a> {
    index: usize,
    active: bool,
    #[serde(flatten)]
    task: &'a focusboard_core::Task,
}

pub async fn run(action: TaskAction) -> CliResult {
    let mut ctx = Context::open().await?;

    match action {
        TaskAction::Add { name } => {
            let task = ctx.session.add_task(&name).await?;
            print_json(&task)?;
        }
        TaskAction::List => {
            let listed: Vec<ListedTask> = ctx
                .session
                .tasks()
                .iter()
                .enumerate()
                .map(|(index, task)| ListedTask {
                    index,
                    active: index == 0,
                    task,
                })
                .collect();
            print_json(&listed)?;
        }
        TaskAction::Activate { index } => {
            let task = ctx.session.set_active_task(index)?;
            print_json(&task)?;
        }
        TaskAction::Remove { index } => {
            let task = ctx.session.remove_task(index)?;
            print_json(&task)?;
        }
    }

    ctx.finish().await
}
