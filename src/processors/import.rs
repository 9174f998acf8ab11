//! Runtime processor loading.
//!
//! ```yaml
//! - name: import-processors
//!   imports:
//!     - "md = folio:markdown"
//!     - "feed = plugins:feed"
//!   from_: ./_plugins
//! ```
//!
//! Each import reads `<alias> = <module>:<callable>` and registers the
//! callable under the alias. Modules are processor catalogs registered with
//! [`Application::add_module`]. When `from_` is given, a module file
//! `<from_>/<module>.yaml` (dots in the module name become directories) is
//! tried first. It maps callable names to stage lists; each becomes a
//! processor invoking those stages. A module file shadows a same-named
//! catalog for that import only.
//!
//! Imports are registered when the stage is invoked, so later stages of the
//! same pipe can already use the aliases. The stream passes through as is.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::pipeline::{Application, Options, Parameters, PipelineError, Processor, Stream};

const NAME: &str = "import-processors";

#[derive(Deserialize)]
struct ImportArgs {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default, rename = "from_")]
    from: Option<PathBuf>,
}

pub fn processor() -> impl Processor {
    Parameters::new(&["imports", "from_"])
        .schema("imports", json!({"type": "array", "items": {"type": "string"}}))
        .schema("from_", json!({"type": "string"}))
        .wrap(process)
}

fn process(app: &Application, stream: Stream, args: ImportArgs) -> Result<Stream, PipelineError> {
    for spec in &args.imports {
        let import = Import::parse(spec)?;
        let processor = load(app, &import, args.from.as_deref())?;
        tracing::info!(
            alias = import.alias,
            "imported processor {}:{}",
            import.module,
            import.callable
        );
        app.add_shared_processor(import.alias, processor);
    }
    Ok(stream)
}

#[derive(Debug, PartialEq)]
struct Import<'a> {
    alias: &'a str,
    module: &'a str,
    callable: &'a str,
}

impl<'a> Import<'a> {
    fn parse(spec: &'a str) -> Result<Self, PipelineError> {
        let malformed = || PipelineError::MalformedImport(spec.to_string());

        let (alias, target) = spec.split_once('=').ok_or_else(malformed)?;
        let (module, callable) = target.split_once(':').ok_or_else(malformed)?;
        let (alias, module, callable) = (alias.trim(), module.trim(), callable.trim());

        if [alias, module, callable].iter().any(|part| part.is_empty()) {
            return Err(malformed());
        }
        Ok(Self {
            alias,
            module,
            callable,
        })
    }
}

fn load(
    app: &Application,
    import: &Import,
    from: Option<&Path>,
) -> Result<Rc<dyn Processor>, PipelineError> {
    if let Some(path) = from.and_then(|dir| module_file(dir, import.module)) {
        return load_module_file(&path, import);
    }

    app.module(import.module)
        .ok_or_else(|| PipelineError::NoSuchModule(import.module.to_string()))?
        .get(import.callable)
        .ok_or_else(|| PipelineError::NoSuchCallable {
            module: import.module.to_string(),
            callable: import.callable.to_string(),
        })
}

fn module_file(dir: &Path, module: &str) -> Option<PathBuf> {
    let relative: PathBuf = module.split('.').collect();
    ["yaml", "yml"]
        .iter()
        .map(|extension| dir.join(&relative).with_extension(extension))
        .find(|path| path.is_file())
}

fn load_module_file(path: &Path, import: &Import) -> Result<Rc<dyn Processor>, PipelineError> {
    let content = std::fs::read_to_string(path)?;
    let mut callables: HashMap<String, Vec<Value>> = serde_yaml::from_str(&content)
        .map_err(|e| PipelineError::processor(NAME, format!("failed to parse {}: {}", path.display(), e)))?;

    let stages = callables
        .remove(import.callable)
        .ok_or_else(|| PipelineError::NoSuchCallable {
            module: import.module.to_string(),
            callable: import.callable.to_string(),
        })?;

    Ok(Rc::new(ModulePipe { stages }))
}

/// A processor defined in a module file: a fixed list of stages.
struct ModulePipe {
    stages: Vec<Value>,
}

impl Processor for ModulePipe {
    fn process(
        &self,
        app: &Application,
        stream: Stream,
        options: Options,
    ) -> Result<Stream, PipelineError> {
        if let Some(unexpected) = options.keys().next() {
            return Err(PipelineError::InvalidParameter(format!(
                "unexpected parameter '{unexpected}'"
            )));
        }
        app.invoke(&self.stages, Some(stream))
    }
}
