use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax, e.g. `"info"` or
/// `"sprite_ngin=debug"`. On `wasm32` only the level part is used and the
/// output goes to the browser console.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub level: log::Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            level: log::Level::Info,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger once. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut builder = env_logger::Builder::new();
            if let Some(filter) = &config.env_filter {
                builder.parse_filters(filter);
            } else if let Ok(filter) = std::env::var("RUST_LOG") {
                builder.parse_filters(&filter);
            } else {
                builder.filter_level(config.level.to_level_filter());
            }
            if let Err(e) = builder.try_init() {
                println!("Warning: Could not initialize logger: {}", e);
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            if let Err(e) = console_log::init_with_level(config.level) {
                web_sys::console::warn_1(&format!("logger already set: {}", e).into());
            }
        }

        log::debug!("logging initialized");
    });
}
