use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error(transparent)]
    Tch(#[from] tch::TchError),
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0} is work in progress")]
    WorkInProgress(String),
    #[error("invalid camera name \"{0}\"")]
    CameraName(String),
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error("simulator failure: {0}")]
    Simulator(#[from] anyhow::Error),
}
