pub mod error;
pub mod settings;

pub use error::{LoadError, LoadResult};
pub use settings::{Settings, SettingsOverrides};
