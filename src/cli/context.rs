use serde::Serialize;

use crate::cli::GlobalOptions;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::storage::Storage;

#[derive(Serialize)]
struct ContextOutput {
    context: String,
    tasks_file: String,
    switched: bool,
}

/// Show the active context, or make `name` the active one.
pub fn run(name: Option<String>, global: &GlobalOptions) -> Result<()> {
    let storage = Storage::resolve(global.home.clone(), global.context.clone())?;

    let (storage, switched) = match name {
        Some(name) => {
            storage.write_active_context(&name)?;
            tracing::debug!(context = %name, "switched active context");
            (Storage::new(storage.root().to_path_buf(), name)?, true)
        }
        None => (storage, false),
    };

    let mut human = HumanOutput::new(if switched {
        format!("Switched to context '{}'", storage.context())
    } else {
        format!("Context '{}'", storage.context())
    });
    human.push_summary("Tasks", storage.tasks_file().display().to_string());

    let output = ContextOutput {
        context: storage.context().to_string(),
        tasks_file: storage.tasks_file().display().to_string(),
        switched,
    };
    emit_success(global.output(), "context", &output, Some(&human))
}
