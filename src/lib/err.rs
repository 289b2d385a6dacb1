// `err.rs` - because nothing ever goes right

use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};
use std::path::PathBuf;

pub type Res<T> = Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.inner.get_context().clone()
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error { inner }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error {
            inner: e.context(ErrorKind::Io),
        }
    }
}

impl From<failure::Error> for Error {
    fn from(e: failure::Error) -> Error {
        Error {
            inner: e.context(ErrorKind::InternalBug),
        }
    }
}

/// One variant per failure mode the core can surface.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "could not load manifest or lock file")]
    FailedLoadKclMod,
    #[fail(display = "local dependency path {} does not exist", _0)]
    DependencyNotFound(PathBuf),
    #[fail(
        display = "checksum mismatch for {}: expected {}, found {}",
        full_name, expected, found
    )]
    CheckSumMismatch {
        full_name: String,
        expected: String,
        found: String,
    },
    #[fail(display = "dependency {} is invalid: name must not be empty", _0)]
    InvalidDependency(String),
    #[fail(display = "failed to pull {}: {}", _0, _1)]
    FailedPull(String, String),
    #[fail(
        display = "expected exactly one tar member in pulled package, found {}",
        _0
    )]
    InvalidKclPkg(usize),
    #[fail(display = "failed to untar package: {}", _0)]
    FailedUntarKclPkg(String),
    #[fail(display = "failed to clone {} at {}: {}", _0, _1, _2)]
    FailedCloneFromGit(String, String, String),
    #[fail(display = "failed to hash package directory {}", _0)]
    FailedHashPkg(PathBuf),
    #[fail(display = "failed to calculate checksum: {}", _0)]
    CalSumFailed(String),
    #[fail(display = "failed to vendor dependency {}: {}", _0, _1)]
    FailedToVendorDependency(String, String),
    #[fail(display = "failed to package project: {}", _0)]
    FailedToPackage(String),
    #[fail(display = "tag {} already exists for package {}", _1, _0)]
    PkgTagExists(String, String),
    #[fail(display = "invalid flag: {}", _0)]
    InvalidFlag(String),
    #[fail(display = "{} is not a valid package reference", _0)]
    IsNotRef(String),
    #[fail(display = "{} is not a valid url", _0)]
    IsNotUrl(String),
    #[fail(display = "url scheme for {} is not oci", _0)]
    UrlSchemeNotOci(String),
    #[fail(display = "I/O error")]
    Io,
    #[fail(display = "internal invariant violated: {}", _0)]
    InternalBugMsg(String),
    #[doc(hidden)]
    #[fail(display = "internal invariant violated")]
    InternalBug,
}
