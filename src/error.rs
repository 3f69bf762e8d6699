//! Error types for the Weft templating runtime

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplatingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Markup error in {file} at line {line}: {message}")]
    Markup { file: String, line: usize, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Compile error in {file}: {message}")]
    Compile { file: String, message: String },

    #[error("Resolution error: {message}")]
    Resolution { message: String },

    #[error("Binding error: {message}")]
    Binding { message: String },

    #[error("Lifecycle error: {message}")]
    Lifecycle { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, TemplatingError>;

impl TemplatingError {
    pub fn markup(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Markup {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Markup error raised while parsing an anonymous inline fragment.
    pub fn markup_inline(line: usize, message: impl Into<String>) -> Self {
        Self::Markup {
            file: "<inline>".to_string(),
            line,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn compile(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Self::Binding {
            message: message.into(),
        }
    }

    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }
}
