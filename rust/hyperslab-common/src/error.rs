use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn encoding_overflow(required: u8, allowed: u8) -> Error {
        Error(ErrorKind::EncodingOverflow { required, allowed }.into())
    }

    pub fn allocation(context: impl Into<String>, source: std::collections::TryReserveError) -> Error {
        Error(
            ErrorKind::AllocationFailed {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid selection format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error(
        "selection requires encoding version {required}, above the configured bound {allowed}"
    )]
    EncodingOverflow { required: u8, allowed: u8 },

    #[error("failed to allocate storage for '{context}'")]
    AllocationFailed {
        context: String,
        source: std::collections::TryReserveError,
    },

    #[error("IO error for '{context}': {source}'")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ErrorKind::InvalidFormat {
                element: "selection".to_string(),
                message: "truncated buffer".to_string(),
            }
            .into()
        } else {
            Error::io("", e)
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(e: std::collections::TryReserveError) -> Self {
        Error::allocation("", e)
    }
}
