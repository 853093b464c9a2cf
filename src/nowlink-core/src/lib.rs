pub mod config;
pub mod logging;
pub mod models;
pub mod paths;

pub use config::{
    Config, ConfigError, HelperSection, ListenerSection, LogLevel, LoggingConfig, ValidationError,
};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{TrackEvent, TrackPayload};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "nowlink";
pub const APP_AUTHOR: &str = "Nowlink";
pub const APP_QUALIFIER: &str = "io";
