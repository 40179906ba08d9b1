//! Proxy reload subsystem.
//!
//! # Data Flow
//! ```text
//! activate()
//!     → new revision tag (vcl<unix-seconds>)
//!     → varnishadm ... vcl.load <tag> <routing file>   (compile + register)
//!         failure: abort, proxy keeps serving the active revision
//!     → varnishadm ... vcl.use <tag>                   (switch traffic)
//!         failure: reported, no rollback
//!     → optional vcl.discard <previous tag>
//! ```
//!
//! # Design Decisions
//! - Commands are argument vectors handed straight to the process spawner,
//!   never a shell string
//! - Traffic only switches to a revision that compiled
//! - `CommandRunner` is the seam tests replace

pub mod command;

use std::fmt;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::config::ReloadConfig;
use crate::observability::metrics;

pub use command::{CommandOutput, CommandRunner, ProcessRunner};

/// Name of one compiled configuration revision on the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionTag(String);

impl RevisionTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while activating a revision.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("could not run {step} for {tag}: {source}")]
    Spawn {
        step: &'static str,
        tag: RevisionTag,
        #[source]
        source: std::io::Error,
    },

    #[error("problem compiling new VCL {tag} ({status}): {output}")]
    LoadFailed {
        tag: RevisionTag,
        status: String,
        output: String,
    },

    #[error("problem switching to new VCL {tag} ({status}): {output}")]
    UseFailed {
        tag: RevisionTag,
        status: String,
        output: String,
    },
}

impl ReloadError {
    /// Result label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ReloadError::Spawn { .. } => "spawn_failed",
            ReloadError::LoadFailed { .. } => "load_failed",
            ReloadError::UseFailed { .. } => "use_failed",
        }
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Loads and activates freshly written artifacts on the proxy.
pub struct Orchestrator<R> {
    runner: R,
    program: PathBuf,
    admin_address: String,
    secret_path: PathBuf,
    routing_path: PathBuf,
    discard_previous: bool,
    clock: fn() -> u64,
    issued: Option<(u64, u32)>,
    active: Option<RevisionTag>,
}

impl<R: CommandRunner> Orchestrator<R> {
    /// Create an orchestrator that loads `routing_path` into the proxy.
    pub fn new(runner: R, config: &ReloadConfig, routing_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: config.admin_program.clone(),
            admin_address: config.admin_address.clone(),
            secret_path: config.secret_path.clone(),
            routing_path: routing_path.into(),
            discard_previous: config.discard_previous,
            clock: unix_now,
            issued: None,
            active: None,
        }
    }

    /// Replace the clock used for revision tags.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Revision most recently activated by this process.
    pub fn active(&self) -> Option<&RevisionTag> {
        self.active.as_ref()
    }

    fn next_tag(&mut self) -> RevisionTag {
        let now = (self.clock)();
        let seq = match self.issued {
            Some((second, seq)) if second == now => seq + 1,
            _ => 0,
        };
        self.issued = Some((now, seq));

        if seq == 0 {
            RevisionTag(format!("vcl{}", now))
        } else {
            RevisionTag(format!("vcl{}_{}", now, seq))
        }
    }

    fn admin_args(&self, command: &[&str]) -> Vec<String> {
        let mut args = vec![
            "-T".to_string(),
            self.admin_address.clone(),
            "-S".to_string(),
            self.secret_path.display().to_string(),
        ];
        args.extend(command.iter().map(|s| s.to_string()));
        args
    }

    /// Compile the routing file under a new tag, then switch traffic to it.
    pub async fn activate(&mut self) -> Result<RevisionTag, ReloadError> {
        let started = Instant::now();
        let tag = self.next_tag();

        let result = self.load_and_use(&tag).await;
        metrics::record_reload(
            result.as_ref().err().map_or("success", ReloadError::label),
            started,
        );
        result?;

        tracing::info!(revision = %tag, "Configuration updated");

        let previous = self.active.replace(tag.clone());
        if self.discard_previous {
            if let Some(previous) = previous {
                self.discard(&previous).await;
            }
        }

        Ok(tag)
    }

    async fn load_and_use(&self, tag: &RevisionTag) -> Result<(), ReloadError> {
        let routing = self.routing_path.display().to_string();

        let load = self.admin_args(&["vcl.load", tag.as_str(), routing.as_str()]);
        let out = self
            .runner
            .run(&self.program, &load)
            .await
            .map_err(|source| ReloadError::Spawn {
                step: "vcl.load",
                tag: tag.clone(),
                source,
            })?;
        if !out.success {
            return Err(ReloadError::LoadFailed {
                tag: tag.clone(),
                status: out.status,
                output: out.output,
            });
        }

        let activate = self.admin_args(&["vcl.use", tag.as_str()]);
        let out = self
            .runner
            .run(&self.program, &activate)
            .await
            .map_err(|source| ReloadError::Spawn {
                step: "vcl.use",
                tag: tag.clone(),
                source,
            })?;
        if !out.success {
            return Err(ReloadError::UseFailed {
                tag: tag.clone(),
                status: out.status,
                output: out.output,
            });
        }

        Ok(())
    }

    async fn discard(&self, tag: &RevisionTag) {
        let args = self.admin_args(&["vcl.discard", tag.as_str()]);
        match self.runner.run(&self.program, &args).await {
            Ok(out) if out.success => tracing::debug!(revision = %tag, "Previous revision discarded"),
            Ok(out) => tracing::warn!(revision = %tag, output = %out.output, "Could not discard previous revision"),
            Err(e) => tracing::warn!(revision = %tag, error = %e, "Could not discard previous revision"),
        }
    }
}
