//! Artifact rendering subsystem.
//!
//! # Data Flow
//! ```text
//! Definition
//!     → templates.rs (hosts → routing VCL, directors → directors VCL)
//!     → both rendered into memory
//!     → artifact.rs (temp file, 0700, rename over destination)
//! ```
//!
//! # Design Decisions
//! - Nothing is written unless both artifacts rendered
//! - Directors are written before routing, since the routing VCL includes them
//! - A rename per artifact: readers see the old file or the new one, never a
//!   partial write

pub mod artifact;
pub mod templates;

use std::path::PathBuf;
use thiserror::Error;

use crate::config::RenderConfig;
use crate::model::Definition;

pub use artifact::write_artifact;
pub use templates::{TemplateError, Templates};

/// Errors raised while producing artifacts for one cycle.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("rendering {name} failed: {message}")]
    Template { name: &'static str, message: String },

    #[error("writing {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renders a Definition and writes both artifacts.
#[derive(Debug, Clone)]
pub struct Renderer {
    templates: Templates,
    routing_out: PathBuf,
    upstreams_out: PathBuf,
}

impl Renderer {
    pub fn new(templates: Templates, routing_out: impl Into<PathBuf>, upstreams_out: impl Into<PathBuf>) -> Self {
        Self {
            templates,
            routing_out: routing_out.into(),
            upstreams_out: upstreams_out.into(),
        }
    }

    /// Load templates from the configured directory.
    pub fn from_config(config: &RenderConfig) -> Result<Self, TemplateError> {
        let templates = Templates::load(&config.template_dir)?;
        Ok(Self::new(templates, &config.routing_out, &config.upstreams_out))
    }

    /// Path of the routing artifact (the file the proxy compiles).
    pub fn routing_path(&self) -> &std::path::Path {
        &self.routing_out
    }

    /// Render both artifacts and write them.
    pub fn write(&self, def: &Definition) -> Result<(), RenderError> {
        let routing = self.templates.render_routing(&def.hosts, &self.upstreams_out)?;
        let upstreams = self.templates.render_upstreams(&def.directors)?;

        write_artifact(&self.upstreams_out, upstreams.as_bytes()).map_err(|source| RenderError::Write {
            path: self.upstreams_out.clone(),
            source,
        })?;
        write_artifact(&self.routing_out, routing.as_bytes()).map_err(|source| RenderError::Write {
            path: self.routing_out.clone(),
            source,
        })?;

        tracing::debug!(
            routing = %self.routing_out.display(),
            upstreams = %self.upstreams_out.display(),
            hosts = def.hosts.len(),
            directors = def.directors.len(),
            "Artifacts written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Director, Host, PathRule};
    use std::fs;

    fn definition() -> Definition {
        let mut def = Definition::default();
        def.hosts.push(Host {
            name: "example.com".into(),
            paths: vec![PathRule {
                path: "^/".into(),
                director: "api".into(),
                vcl: "return (pass);".into(),
            }],
        });
        let mut api = Director::new("api");
        api.push_backend("10.0.0.1".into(), 8080);
        def.directors.insert("api".into(), api);
        def
    }

    #[test]
    fn test_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let templates = Templates::new(
            "include \"{directors_path}\";\n{{ for host in hosts }}{host.name}\n{{ endfor }}",
            "{{ for d in directors }}{d.name}={{ for b in d.backends }}{b.address}:{b.port}{{ endfor }}\n{{ endfor }}",
        )
        .unwrap();
        let renderer = Renderer::new(templates, dir.path().join("default.vcl"), dir.path().join("directors.vcl"));

        renderer.write(&definition()).unwrap();

        let routing = fs::read_to_string(dir.path().join("default.vcl")).unwrap();
        let include = format!("include \"{}\";\n", dir.path().join("directors.vcl").display());
        assert_eq!(routing, format!("{}example.com\n", include));
        assert_eq!(fs::read_to_string(dir.path().join("directors.vcl")).unwrap(), "api=10.0.0.1:8080\n");
    }

    #[test]
    fn test_render_failure_keeps_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        let routing = dir.path().join("default.vcl");
        let upstreams = dir.path().join("directors.vcl");
        fs::write(&routing, "old routing").unwrap();
        fs::write(&upstreams, "old directors").unwrap();

        // Compiles, but the field does not exist at render time.
        let templates = Templates::new("{{ for host in hosts }}{host.owner}{{ endfor }}", "ok").unwrap();
        let renderer = Renderer::new(templates, &routing, &upstreams);

        let err = renderer.write(&definition()).unwrap_err();
        assert!(matches!(err, RenderError::Template { name: templates::ROUTING_TEMPLATE, .. }));
        assert_eq!(fs::read_to_string(&routing).unwrap(), "old routing");
        assert_eq!(fs::read_to_string(&upstreams).unwrap(), "old directors");
    }
}
