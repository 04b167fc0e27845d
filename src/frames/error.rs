use std::io;

/// Frame codec error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error from the underlying buffer
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The bytes do not decode as a SASL frame body
    #[error("Decode Error")]
    DecodeError,

    /// The frame size, type or data offset violates the framing rules
    #[error("Framing Error")]
    FramingError,
}

impl From<serde_amqp::Error> for Error {
    fn from(err: serde_amqp::Error) -> Self {
        match err {
            serde_amqp::Error::Io(e) => Self::Io(e),
            _ => Self::DecodeError,
        }
    }
}
