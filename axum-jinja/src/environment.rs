//! Template environments and their registration on an application
//!
//! [`setup`] builds one minijinja environment from a [`Setup`], stores it in
//! the application's store and, when context processors are given, installs
//! the context-processor middleware. Handlers find the environment again
//! through the request's scope chain; bootstrap code can use [`get_env`].
//!
//! # Example
//!
//! ```rust,no_run
//! use axum_jinja::{request_processor, setup, App, Setup};
//!
//! let mut app: App = App::new();
//! let env = setup(
//!     &mut app,
//!     Setup::new()
//!         .template_dir("templates")
//!         .context_processor(request_processor),
//! );
//! assert!(env.is_async());
//! ```

use minijinja::value::{Rest, Value};
use minijinja::{AutoEscape, ErrorKind, Template};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::App;
use crate::config::TemplateConfig;
use crate::context::Context;
use crate::error::{Error, Result, TemplateError};
use crate::helpers::{self, AppObject, STATIC_ROOT_URL_KEY};
use crate::middleware::ContextProcessorLayer;
use crate::processors::{ContextProcessor, ProcessorChain};
use crate::store::AppKey;

/// Signature of filters registered through [`Setup::filter`]
pub type FilterFn =
    dyn Fn(Value, &[Value]) -> std::result::Result<Value, minijinja::Error> + Send + Sync;

type ConfigureFn = Box<dyn FnOnce(&mut minijinja::Environment<'static>) + Send>;

/// Handle to a configured template environment
///
/// Cheap to clone. The underlying engine is not modified after [`setup`]
/// returns; use [`Setup::configure`] for engine settings not covered by the
/// builder.
#[derive(Clone)]
pub struct Environment {
    engine: Arc<minijinja::Environment<'static>>,
    is_async: bool,
}

impl Environment {
    /// Wrap an already configured engine
    pub fn new(engine: minijinja::Environment<'static>, is_async: bool) -> Self {
        Self {
            engine: Arc::new(engine),
            is_async,
        }
    }

    /// Whether rendering runs off the async executor
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// The wrapped engine
    pub fn engine(&self) -> &minijinja::Environment<'static> {
        &self.engine
    }

    /// Look up a template by name
    pub fn get_template(&self, name: &str) -> Result<Template<'_, '_>> {
        self.engine.get_template(name).map_err(|err| match err.kind() {
            ErrorKind::TemplateNotFound => TemplateError::template_not_found(name).into(),
            _ => Error::from(err),
        })
    }

    /// Render `name` on the calling thread
    pub fn render_blocking(&self, name: &str, context: &Context) -> Result<String> {
        let template = self.get_template(name)?;
        Ok(template.render(context)?)
    }

    /// Render `name`
    ///
    /// Async environments render on tokio's blocking pool since the loader
    /// may read from disk; sync environments render inline.
    pub async fn render(&self, name: &str, context: Context) -> Result<String> {
        if !self.is_async {
            return self.render_blocking(name, &context);
        }

        let env = self.clone();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || env.render_blocking(&name, &context))
            .await
            .map_err(|err| Error::Internal(format!("render task failed: {}", err)))?
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("is_async", &self.is_async)
            .finish_non_exhaustive()
    }
}

/// Options for [`setup`]
pub struct Setup {
    app_key: AppKey,
    context_processors_key: AppKey,
    processors: Vec<Arc<dyn ContextProcessor>>,
    filters: Vec<(String, Arc<FilterFn>)>,
    default_helpers: bool,
    enable_async: bool,
    autoescape: bool,
    template_dir: Option<PathBuf>,
    templates: BTreeMap<String, String>,
    globals: Vec<(String, Value)>,
    trim_blocks: bool,
    lstrip_blocks: bool,
    keep_trailing_newline: bool,
    static_root_url: Option<String>,
    configure: Vec<ConfigureFn>,
}

impl Setup {
    /// Defaults: default keys, no processors, helpers on, async on, HTML
    /// autoescaping on
    pub fn new() -> Self {
        Self {
            app_key: AppKey::ENVIRONMENT,
            context_processors_key: AppKey::CONTEXT_PROCESSORS,
            processors: Vec::new(),
            filters: Vec::new(),
            default_helpers: true,
            enable_async: true,
            autoescape: true,
            template_dir: None,
            templates: BTreeMap::new(),
            globals: Vec::new(),
            trim_blocks: false,
            lstrip_blocks: false,
            keep_trailing_newline: false,
            static_root_url: None,
            configure: Vec::new(),
        }
    }

    /// Start from configuration values
    pub fn from_config(config: &TemplateConfig) -> Self {
        let mut setup = Self::new()
            .autoescape(config.autoescape)
            .enable_async(config.enable_async)
            .default_helpers(config.default_helpers)
            .trim_blocks(config.trim_blocks)
            .lstrip_blocks(config.lstrip_blocks)
            .keep_trailing_newline(config.keep_trailing_newline);
        setup.template_dir = config.template_dir.clone();
        setup.static_root_url = config.static_root_url.clone();
        setup
    }

    /// Store the environment under `key`
    #[must_use]
    pub fn app_key(mut self, key: impl Into<AppKey>) -> Self {
        self.app_key = key.into();
        self
    }

    /// Store the processor chain under `key`
    #[must_use]
    pub fn context_processors_key(mut self, key: impl Into<AppKey>) -> Self {
        self.context_processors_key = key.into();
        self
    }

    /// Append a context processor; processors run in the order added
    #[must_use]
    pub fn context_processor<P: ContextProcessor>(mut self, processor: P) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Register a filter taking the piped value and positional arguments
    #[must_use]
    pub fn filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Value, &[Value]) -> std::result::Result<Value, minijinja::Error>
            + Send
            + Sync
            + 'static,
    {
        self.filters.push((name.into(), Arc::new(filter)));
        self
    }

    /// Register the `url` and `static` helpers
    #[must_use]
    pub fn default_helpers(mut self, enabled: bool) -> Self {
        self.default_helpers = enabled;
        self
    }

    /// Render on the blocking pool instead of the async executor
    #[must_use]
    pub fn enable_async(mut self, enabled: bool) -> Self {
        self.enable_async = enabled;
        self
    }

    /// HTML-escape every template (`true`) or none (`false`)
    #[must_use]
    pub fn autoescape(mut self, enabled: bool) -> Self {
        self.autoescape = enabled;
        self
    }

    /// Load templates lazily from `dir`
    #[must_use]
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// Add an in-memory template; takes precedence over `template_dir`
    #[must_use]
    pub fn template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    /// Add a global variable
    #[must_use]
    pub fn global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn trim_blocks(mut self, enabled: bool) -> Self {
        self.trim_blocks = enabled;
        self
    }

    #[must_use]
    pub fn lstrip_blocks(mut self, enabled: bool) -> Self {
        self.lstrip_blocks = enabled;
        self
    }

    #[must_use]
    pub fn keep_trailing_newline(mut self, enabled: bool) -> Self {
        self.keep_trailing_newline = enabled;
        self
    }

    /// Root URL used by the `static()` helper
    #[must_use]
    pub fn static_root_url(mut self, url: impl Into<String>) -> Self {
        self.static_root_url = Some(url.into());
        self
    }

    /// Adjust the engine directly; runs after every other option
    #[must_use]
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut minijinja::Environment<'static>) + Send + 'static,
    {
        self.configure.push(Box::new(f));
        self
    }
}

impl Default for Setup {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setup")
            .field("app_key", &self.app_key)
            .field("context_processors_key", &self.context_processors_key)
            .field("processors", &self.processors.len())
            .field("filters", &self.filters.len())
            .field("default_helpers", &self.default_helpers)
            .field("enable_async", &self.enable_async)
            .field("autoescape", &self.autoescape)
            .field("template_dir", &self.template_dir)
            .finish_non_exhaustive()
    }
}

/// Build an environment and register it on `app`
///
/// Calling `setup` twice with the same key replaces the earlier environment.
/// Template errors are reported when rendering, never here.
pub fn setup<S>(app: &mut App<S>, options: Setup) -> Environment
where
    S: Clone + Send + Sync + 'static,
{
    let Setup {
        app_key,
        context_processors_key,
        processors,
        filters,
        default_helpers,
        enable_async,
        autoescape,
        template_dir,
        templates,
        globals,
        trim_blocks,
        lstrip_blocks,
        keep_trailing_newline,
        static_root_url,
        configure,
    } = options;

    let mut engine = minijinja::Environment::new();

    let files = template_dir.clone().map(minijinja::path_loader);
    engine.set_loader(move |name| {
        if let Some(source) = templates.get(name) {
            return Ok(Some(source.clone()));
        }
        match &files {
            Some(load) => load(name),
            None => Ok(None),
        }
    });

    engine.set_auto_escape_callback(move |_name| {
        if autoescape {
            AutoEscape::Html
        } else {
            AutoEscape::None
        }
    });
    engine.set_trim_blocks(trim_blocks);
    engine.set_lstrip_blocks(lstrip_blocks);
    engine.set_keep_trailing_newline(keep_trailing_newline);

    // Helpers go first so caller globals of the same name replace them
    if default_helpers {
        engine.add_function("url", helpers::url);
        engine.add_function("static", helpers::static_url);
    }

    for (name, value) in globals {
        engine.add_global(name, value);
    }

    for (name, filter) in filters {
        engine.add_filter(name, move |value: Value, args: Rest<Value>| {
            filter(value, &args.0)
        });
    }

    // Always bound, and after caller globals so `app` cannot be shadowed
    engine.add_global("app", Value::from_object(AppObject::new(app.store())));

    for f in configure {
        f(&mut engine);
    }

    let environment = Environment::new(engine, enable_async);
    app.store()
        .insert_environment(app_key.clone(), environment.clone());

    if let Some(url) = static_root_url {
        app.store().insert_value(STATIC_ROOT_URL_KEY, url);
    }

    let processor_count = processors.len();
    if !processors.is_empty() {
        let chain: ProcessorChain = processors.into();
        app.store()
            .insert_processors(context_processors_key.clone(), chain);
        app.push_layer(ContextProcessorLayer::new(context_processors_key.clone()));
    }

    tracing::debug!(
        app_key = %app_key,
        context_processors_key = %context_processors_key,
        processors = processor_count,
        template_dir = ?template_dir,
        enable_async,
        autoescape,
        "Template environment configured"
    );

    environment
}

/// Environment stored on `app` under `app_key`
pub fn get_env<S>(app: &App<S>, app_key: &AppKey) -> Option<Environment> {
    app.store().environment(app_key)
}
