use thiserror::Error;

#[derive(Error, Debug)]
pub enum FloodsimError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP listener error: {0}")]
    Listen(String),
}
