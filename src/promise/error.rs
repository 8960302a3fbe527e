use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
enum Repr {
    /// A value returned through a body's error channel.
    #[error("{0}")]
    User(#[source] BoxedCause),
    /// A normalized panic payload.
    #[error("{0}")]
    Panic(String),
    /// A propagation wrap around an upstream failure.
    #[error("{context}: {cause}")]
    Wrapped {
        context: &'static str,
        #[source]
        cause: Error,
    },
}

/// The failure carried by a promise and returned from
/// [`wait`](super::Promise::wait).
///
/// Cheap to clone; every promise holding or propagating the failure shares
/// one allocation. `Display` renders the whole wrap chain, so matching on a
/// fragment of the root message works through any number of propagation
/// hops, and [`source`](StdError::source) walks the chain link by link.
#[derive(Clone)]
pub struct Error {
    repr: Arc<Repr>,
}

impl Error {
    pub(crate) fn user(cause: BoxedCause) -> Self {
        Self {
            repr: Arc::new(Repr::User(cause)),
        }
    }

    pub(crate) fn panicked(message: impl Into<String>) -> Self {
        Self {
            repr: Arc::new(Repr::Panic(message.into())),
        }
    }

    pub(crate) fn wrap(context: &'static str, cause: Error) -> Self {
        Self {
            repr: Arc::new(Repr::Wrapped { context, cause }),
        }
    }

    /// Normalizes a caught panic payload. String payloads keep their
    /// message; a payload that is itself an [`Error`] is passed through.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<&'static str>() {
            Ok(message) => return Self::panicked(*message),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<String>() {
            Ok(message) => return Self::panicked(*message),
            Err(payload) => payload,
        };
        match payload.downcast::<Error>() {
            Ok(error) => *error,
            Err(_) => Self::panicked("panic with a non-string payload"),
        }
    }

    /// The innermost failure: the user error or panic message a wrap chain
    /// started from.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.repr, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.repr, f)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.repr.source()
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::error::Error as StdError;
    use std::io;

    #[test]
    fn display_renders_the_wrap_chain() {
        let root = Error::user(Box::new(io::Error::new(io::ErrorKind::Other, "boom")));
        let wrapped = Error::wrap("error in previous promise", root);
        let surfaced = Error::wrap("panic during promise execution", wrapped);
        assert_eq!(
            "panic during promise execution: error in previous promise: boom",
            surfaced.to_string()
        );
    }

    #[test]
    fn source_walks_to_the_root() {
        let root = Error::panicked("sizzle");
        let wrapped = Error::wrap("error encountered in promise", root);
        let mut depth = 0;
        let mut current: &(dyn StdError + 'static) = &wrapped;
        while let Some(next) = current.source() {
            current = next;
            depth += 1;
        }
        assert_eq!(1, depth);
        assert_eq!("sizzle", wrapped.root_cause().to_string());
    }

    #[test]
    fn panic_payloads_are_normalized() {
        let from_str = Error::from_panic(Box::new("dropped the plate"));
        assert_eq!("dropped the plate", from_str.to_string());

        let from_string = Error::from_panic(Box::new(String::from("oven on fire")));
        assert_eq!("oven on fire", from_string.to_string());

        let opaque = Error::from_panic(Box::new(42usize));
        assert_eq!("panic with a non-string payload", opaque.to_string());
    }
}
