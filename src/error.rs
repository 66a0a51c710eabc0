/// Coarse classification of a failure, stored alongside refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Decode,
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Network or HTTP-level failure, including an upstream error envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Precondition violated by the caller or the data it passed in.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode(_) => ErrorKind::Decode,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Error::Transport("x".into()).kind(), ErrorKind::Transport);
        assert_eq!(Error::Decode("x".into()).kind(), ErrorKind::Decode);
        assert_eq!(Error::InvalidInput("x".into()).kind(), ErrorKind::InvalidInput);
    }
}
