use thiserror::Error;

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("unknown effect: {0}")]
    UnknownEffect(String),
    #[error("pipeline {pipeline} references undeclared texture {texture_id}")]
    MissingTexture { pipeline: &'static str, texture_id: u32 },
    #[error("pipeline {0} has no passes")]
    EmptyPipeline(&'static str),
}
