//! Engine error types.
//!
//! Most failures inside a frame are not errors at all: missing textures and
//! frames fall back to placeholders and are only logged. `NginError` covers
//! the cases a caller can act on, such as GPU object creation, shader
//! compilation and asset decoding.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NginError {
    #[error("GL error: {0}")]
    Gl(String),

    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: &'static str, log: String },

    #[error("program failed to link: {0}")]
    ProgramLink(String),

    #[error("failed to load '{key}': {source}")]
    Load {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pixel data: {0}")]
    InvalidPixelData(String),
}

pub type NginResult<T> = Result<T, NginError>;

impl NginError {
    pub fn gl(msg: impl Into<String>) -> Self {
        Self::Gl(msg.into())
    }

    pub fn load(key: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Load {
            key: key.into(),
            source: source.into(),
        }
    }
}
