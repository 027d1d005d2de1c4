use armada_process::Command;
use armada_task_graph::Task;
use tracing::trace;

/// Build the child process for a task: the command string runs through
/// the OS default shell, from the project folder, with the project's
/// binary directory prepended to `PATH`.
pub fn build_command(task: &Task) -> Command {
    let script = if cfg!(windows) {
        convert_head_separators(&task.command)
    } else {
        task.command.clone()
    };

    trace!(
        task = &task.name,
        cwd = ?task.project.root,
        "Building task command"
    );

    let mut command = Command::script(script);
    command.cwd(&task.project.root);

    if let Some(bin_dir) = &task.project.bin_dir {
        command.prepend_paths([bin_dir.clone()]);
    }

    command
}

/// Convert forward slashes to backslashes in the leading path segment of
/// a command line. Only the head is converted: later arguments may be
/// flags like `--foo=a/b` where slashes are meaningful.
pub fn convert_head_separators(command: &str) -> String {
    match command.find(char::is_whitespace) {
        Some(index) => format!(
            "{}{}",
            command[..index].replace('/', "\\"),
            &command[index..]
        ),
        None => command.replace('/', "\\"),
    }
}
