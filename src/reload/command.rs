//! External command execution.

use std::future::Future;
use std::io;
use std::path::Path;

/// Result of one finished admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// True when the process exited with status zero.
    pub success: bool,
    /// Human readable exit status.
    pub status: String,
    /// Stdout followed by stderr.
    pub output: String,
}

/// Runs a program with an argument vector.
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[String]) -> impl Future<Output = io::Result<CommandOutput>> + Send;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        tracing::debug!(program = %program.display(), args = ?args, "Running admin command");

        let out = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(CommandOutput {
            success: out.status.success(),
            status: out.status.to_string(),
            output: output.trim().to_string(),
        })
    }
}
