use paths::PathContext;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_subscriber::{
    Layer, filter::LevelFilter, filter::filter_fn, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Application infrastructure context.
///
/// Contains path management, version info, and logging infrastructure.
pub struct AppContext {
    pub path_context: PathContext,
    pub version: &'static str,
    /// The log guard must be kept alive for the duration of the application
    /// to ensure log messages are properly flushed.
    _log_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl AppContext {
    pub fn app_id(&self) -> &str {
        self.path_context.app_id()
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn path_context(&self) -> &PathContext {
        &self.path_context
    }
}

/// Application metadata trait.
///
/// Define your application's identity by implementing this trait.
pub trait Application: Sized + 'static {
    const APP_ID: &'static str;
    const STUDIO: &'static str = "chicken105";
    const PROJECT_ID: &'static str = "trackfit";
}

/// Builder for creating applications with proper initialization.
pub struct AppBuilder<A: Application> {
    version: &'static str,
    base_path: Option<PathBuf>,
    level: Option<LevelFilter>,
    console: bool,
    _marker: PhantomData<A>,
}

impl<A: Application> AppBuilder<A> {
    pub fn new(version: &'static str) -> Self {
        Self {
            version,
            base_path: None,
            level: None,
            console: true,
            _marker: PhantomData,
        }
    }

    /// Use an explicit data directory instead of the platform default.
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Override the build-profile default (INFO in debug, WARN in release).
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = Some(level);
        self
    }

    /// Disable the stderr layer (file logging stays on).
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    /// Perform the common initialization:
    /// - Sets up path context (platform-specific directories)
    /// - Ensures all directories exist
    /// - Initializes logging (file + console)
    ///
    /// A global subscriber that is already installed is left in place; the
    /// context is still returned so callers (and tests) can build several.
    pub fn build(self) -> Result<AppContext, BoxError> {
        let path_context = match self.base_path {
            Some(base) => PathContext::with_base_path(base, A::STUDIO, A::PROJECT_ID, A::APP_ID),
            None => PathContext::new(A::STUDIO, A::PROJECT_ID, A::APP_ID),
        };

        path_context.ensure_directories()?;

        let log_file_path = path_context.log_file_now();
        let log_dir = log_file_path
            .parent()
            .ok_or("log file path should have parent directory")?;
        let log_filename = log_file_path
            .file_name()
            .ok_or("log file path should have filename")?;

        let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let level = self.level.unwrap_or(if cfg!(debug_assertions) {
            LevelFilter::INFO
        } else {
            LevelFilter::WARN
        });

        let file_layer = fmt::Layer::default()
            .with_target(false)
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_filter(filter_fn(move |metadata| metadata.level() <= &level));

        let console_layer = self.console.then(|| {
            fmt::Layer::default()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter_fn(move |metadata| metadata.level() <= &level))
        });

        let installed = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer)
            .with(tracing_error::ErrorLayer::default())
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!(path = %log_file_path.display(), "logging initialized");
        }

        Ok(AppContext {
            path_context,
            version: self.version,
            _log_guard: installed.then_some(guard),
        })
    }
}
