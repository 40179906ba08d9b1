//! Template loading and rendering.
//!
//! Templates use tinytemplate syntax. Output is not escaped, and literal
//! braces in VCL must be written as `\{`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tinytemplate::TinyTemplate;

use crate::model::{Director, Host};
use crate::render::RenderError;

/// File name of the routing template inside the template directory.
pub const ROUTING_TEMPLATE: &str = "default.vcl";
/// File name of the directors template inside the template directory.
pub const UPSTREAMS_TEMPLATE: &str = "directors.vcl";

/// Errors raised while loading templates at startup.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid template {name}: {message}")]
    Compile { name: &'static str, message: String },
}

#[derive(Serialize)]
struct RoutingContext<'a> {
    hosts: &'a [Host],
    directors_path: &'a str,
}

#[derive(Serialize)]
struct UpstreamsContext<'a> {
    directors: Vec<&'a Director>,
}

/// The two artifact templates, validated at construction.
#[derive(Debug, Clone)]
pub struct Templates {
    routing: String,
    upstreams: String,
}

impl Templates {
    /// Build from template sources, compiling both to catch syntax errors early.
    pub fn new(routing: impl Into<String>, upstreams: impl Into<String>) -> Result<Self, TemplateError> {
        let templates = Self {
            routing: routing.into(),
            upstreams: upstreams.into(),
        };
        templates
            .engine()
            .map_err(|(name, message)| TemplateError::Compile { name, message })?;
        Ok(templates)
    }

    /// Load `default.vcl` and `directors.vcl` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        let read = |file: &str| {
            let path = dir.join(file);
            fs::read_to_string(&path).map_err(|source| TemplateError::Read { path, source })
        };
        Self::new(read(ROUTING_TEMPLATE)?, read(UPSTREAMS_TEMPLATE)?)
    }

    // TinyTemplate borrows its sources, so an engine is built per render.
    fn engine(&self) -> Result<TinyTemplate<'_>, (&'static str, String)> {
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&tinytemplate::format_unescaped);
        tt.add_template(ROUTING_TEMPLATE, &self.routing)
            .map_err(|e| (ROUTING_TEMPLATE, e.to_string()))?;
        tt.add_template(UPSTREAMS_TEMPLATE, &self.upstreams)
            .map_err(|e| (UPSTREAMS_TEMPLATE, e.to_string()))?;
        Ok(tt)
    }

    fn render<C: Serialize>(&self, name: &'static str, context: &C) -> Result<String, RenderError> {
        let tt = self
            .engine()
            .map_err(|(name, message)| RenderError::Template { name, message })?;
        tt.render(name, context).map_err(|e| RenderError::Template {
            name,
            message: e.to_string(),
        })
    }

    /// Render the routing artifact.
    ///
    /// The template sees `hosts` and `directors_path`, the location the
    /// directors artifact is written to.
    pub fn render_routing(&self, hosts: &[Host], directors_path: &Path) -> Result<String, RenderError> {
        let directors_path = directors_path.display().to_string();
        self.render(
            ROUTING_TEMPLATE,
            &RoutingContext {
                hosts,
                directors_path: &directors_path,
            },
        )
    }

    /// Render the directors artifact; the template sees `directors`, ordered by name.
    pub fn render_upstreams(&self, directors: &BTreeMap<String, Director>) -> Result<String, RenderError> {
        self.render(
            UPSTREAMS_TEMPLATE,
            &UpstreamsContext {
                directors: directors.values().collect(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathRule;

    const ROUTING: &str = "include {directors_path}\n{{ for host in hosts }}{host.name}:{{ for rule in host.paths }} {rule.path}={rule.director} [{rule.vcl}]{{ endfor }}\n{{ endfor }}";
    const UPSTREAMS: &str = "{{ for d in directors }}director {d.name} \\{ {{ for b in d.backends }}{b.name}@{b.address}:{b.port} {{ endfor }}}\n{{ endfor }}";

    fn hosts() -> Vec<Host> {
        vec![Host {
            name: "example.com".into(),
            paths: vec![PathRule {
                path: "/api".into(),
                director: "api".into(),
                vcl: "set req.http.X-Forwarded-Host = \"example.com\";".into(),
            }],
        }]
    }

    #[test]
    fn test_render_routing_unescaped() {
        let templates = Templates::new(ROUTING, UPSTREAMS).unwrap();
        let out = templates.render_routing(&hosts(), Path::new("/srv/directors.vcl")).unwrap();
        assert_eq!(
            out,
            "include /srv/directors.vcl\nexample.com: /api=api [set req.http.X-Forwarded-Host = \"example.com\";]\n"
        );
    }

    #[test]
    fn test_render_upstreams_in_name_order() {
        let templates = Templates::new(ROUTING, UPSTREAMS).unwrap();
        let mut directors = BTreeMap::new();
        let mut web = Director::new("web");
        web.push_backend("10.0.0.9".into(), 80);
        directors.insert("web".to_string(), web);
        directors.insert("api".to_string(), Director::new("api"));

        let out = templates.render_upstreams(&directors).unwrap();
        assert_eq!(out, "director api { }\ndirector web { web_0@10.0.0.9:80 }\n");
    }

    #[test]
    fn test_invalid_template_rejected() {
        let err = Templates::new("{{ for host in hosts }}", UPSTREAMS).unwrap_err();
        assert!(matches!(err, TemplateError::Compile { name: ROUTING_TEMPLATE, .. }));
    }

    #[test]
    fn test_load_missing_dir() {
        let err = Templates::load(Path::new("/nonexistent/templates")).unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
    }
}
