use std::{error::Error, fmt};

use backtrace::Backtrace;
use log::error;

/// Failure classes surfaced by the engine.
///
/// `Deadlock` is only ever produced by the lock manager; the buffer pool
/// translates it to `TransactionAborted` before it reaches an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Deadlock,
    TransactionAborted,
    Storage,
    Io,
}

#[derive(Debug)]
pub struct DbError {
    kind: Kind,
    details: String,
}

impl DbError {
    pub fn new(kind: Kind, msg: &str) -> DbError {
        DbError {
            kind,
            details: msg.to_string(),
        }
    }

    pub fn deadlock(msg: &str) -> DbError {
        Self::new(Kind::Deadlock, msg)
    }

    pub fn aborted(msg: &str) -> DbError {
        Self::new(Kind::TransactionAborted, msg)
    }

    pub fn storage(msg: &str) -> DbError {
        Self::new(Kind::Storage, msg)
    }

    pub fn io(context: &str, cause: &std::io::Error) -> DbError {
        Self::new(Kind::Io, &format!("{}: {}", context, cause))
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn show_backtrace(&self) {
        let bt = Backtrace::new();
        error!("{}, backtrace:\n{:?}", self, bt);
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.details)
    }
}

impl Error for DbError {}
