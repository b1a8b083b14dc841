use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Reasons a line is rejected. Any of them ends the connection.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

impl ParseError {
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::Auth(_) => "auth",
            ParseError::Decode(_) => "decode",
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not read from client: {0}")]
    Read(#[from] LinesCodecError),
}
