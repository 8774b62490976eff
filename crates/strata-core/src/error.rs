//! Error types for strata-core

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Scene {index} does not exist ({count} scenes loaded)")]
    SceneOutOfRange { index: usize, count: usize },

    #[error("Scene change ignored: a crossfade is already running")]
    FadeInProgress,

    #[error("Unknown parameter id: {0}")]
    UnknownParam(String),

    #[error(transparent)]
    Render(#[from] crate::engine::RenderError),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}
