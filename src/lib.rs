//! Folio: static site generation as composable, lazy item pipelines.
//!
//! An [`Application`] holds the processor registry, named pipes and the
//! site metadata. A pipe is a list of stage descriptors; invoking it chains
//! the named processors into one lazy stream of [`Item`]s.
//!
//! ```ignore
//! let app = Application::new(site.metadata.clone());
//! folio::processors::register_builtins(&app)?;
//! for item in app.invoke("compile", None)? {
//!     let item = item?;
//!     println!("{}", item.get_str("destination").unwrap_or_default());
//! }
//! ```

pub mod config;
pub mod item;
pub mod pipeline;
pub mod processors;

#[cfg(test)]
mod testing;

pub use self::config::{ConfigError, SiteConfig};
pub use item::{Fields, Item, ItemError};
pub use pipeline::{Application, Metadata, Options, PipelineError, Processor, Stream};

impl SiteConfig {
    /// Build an application with the built-in processors and every
    /// configured pipe registered.
    pub fn application(&self) -> Result<Application, PipelineError> {
        let app = Application::new(self.metadata.clone());
        processors::register_builtins(&app)?;
        for (name, stages) in &self.pipes {
            app.add_pipe(name.clone(), stages.clone());
        }
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_application_from_site_config() {
        let site: SiteConfig = serde_yaml::from_str(
            "metadata:\n  url: https://example.com\npipes:\n  tag:\n    - name: metadata\n      metadata:\n        site: { $ref: 'metadata://#/url' }\n",
        )
        .unwrap();
        let app = site.application().unwrap();
        assert_eq!(app.pipe_names(), vec!["tag".to_string()]);

        let out: Vec<Item> = app
            .invoke("tag", Some(pipeline::from_items(vec![Item::new()])))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out[0].get("site").unwrap(), json!("https://example.com"));
    }
}
