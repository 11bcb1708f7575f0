use std::fmt::{Debug, Display};

pub struct Error {
    kind: ErrorKind,
    context: Vec<String>,
}

pub enum ErrorKind {
    Io(std::io::Error),
    WebDriverNewSession(fantoccini::error::NewSessionError),
    WebDriverCmd(fantoccini::error::CmdError),
    WebDriverPrint(fantoccini::error::PrintConfigurationError),
    Http(reqwest::Error),
    Template(minijinja::Error),
    Json(serde_json::Error),
    Validation(String),
    Other(String),
}

pub trait AddContext<T> {
    fn add_context(self, ctx: &str) -> Result<T, Error>;
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut context = self.context.clone();
        context.reverse();
        let context = if context.is_empty() {
            String::from("no context")
        } else {
            context.join(" -> ")
        };
        write!(f, "{context}")
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::Io(value),
        }
    }
}

impl From<fantoccini::error::PrintConfigurationError> for Error {
    fn from(value: fantoccini::error::PrintConfigurationError) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::WebDriverPrint(value),
        }
    }
}

impl From<fantoccini::error::NewSessionError> for Error {
    fn from(value: fantoccini::error::NewSessionError) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::WebDriverNewSession(value),
        }
    }
}

impl From<fantoccini::error::CmdError> for Error {
    fn from(value: fantoccini::error::CmdError) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::WebDriverCmd(value),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::Http(value),
        }
    }
}

impl From<minijinja::Error> for Error {
    fn from(value: minijinja::Error) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::Template(value),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::Json(value),
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error {
            context: vec![value.to_string()],
            kind: ErrorKind::Other(value),
        }
    }
}

impl Error {
    /// Build a validation error. Raised before anything is persisted and meant
    /// to be shown to the user verbatim.
    pub fn validation(message: &str) -> Error {
        Error {
            context: vec![message.to_string()],
            kind: ErrorKind::Validation(message.to_string()),
        }
    }

    /// Returns `true` if this error came from input validation rather than an
    /// external collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Add more context to the given error. This context will ultimately be displayed to the user
    /// and could be useful for correcting bad input or filing a help ticket.
    ///
    /// Generally a single layer of context should be added for every level that an error is
    /// surfaced. If the error is surfaced all the way to main and not handled there, then all the
    /// context will be displayed to the user in reverse order
    ///
    /// # Arguments
    /// * `context` - Any additional information that would be useful for the user to see if the
    /// error is surfaced to them
    pub fn add_context(self, context: &str) -> Error {
        let mut existing = self.context.clone();
        existing.push(context.to_string());
        Self {
            context: existing,
            ..self
        }
    }
}

impl<T> AddContext<T> for Result<T, Error> {
    fn add_context(self, ctx: &str) -> Result<T, Error> {
        match self {
            Ok(d) => Ok(d),
            Err(e) => Err(e.add_context(ctx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_chain_displays_in_reverse() {
        let err = Error::from(String::from("connection refused"))
            .add_context("upserting invoice")
            .add_context("saving invoice");
        assert_eq!(
            err.to_string(),
            "saving invoice -> upserting invoice -> connection refused"
        );
    }

    #[test]
    fn validation_errors_are_distinguishable() {
        let err = Error::validation("missing client name");
        assert!(err.is_validation());
        let err = Error::from(String::from("boom"));
        assert!(!err.is_validation());
    }
}
