use std::{fmt, io, path::PathBuf, str::Utf8Error};

use diesel::r2d2::PoolError;
use itertools::Itertools;

use crate::models::DbId;

/// Failures that end the whole run before anything is written.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("export root {} does not exist", .0.display())]
    MissingRoot(PathBuf),
    #[error("export root {} has no {} directory", .0.display(), crate::walker::USERS_DIR)]
    MissingUsers(PathBuf),
}

/// Failures scoped to one unit of work (a page, a file, a thread, ...).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot list directory: {0}")]
    Walk(#[from] ignore::Error),
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Fields(#[from] FieldMismatch),
    #[error("page metadata names slug `{declared}`, but its path names `{expected}`")]
    SlugMismatch { declared: String, expected: String },
    #[error("file {file_id} has URL `{declared}`, but the file map records `{mapped}`")]
    UrlMismatch {
        file_id: DbId,
        declared: String,
        mapped: String,
    },
    #[error("file {0} has no entry in the file map")]
    UnmappedFile(DbId),
    #[error("archive member `{0}` is not named `<revision_number>.txt`")]
    ArchiveMember(String),
    #[error("cannot read archive {}: {message}", .path.display())]
    Archive { path: PathBuf, message: String },
    #[error("revision {revision_number} is declared but has no text in the archive")]
    MissingRevisionText { revision_number: i64 },
    #[error("archived text for revision {revision_number} is not valid UTF-8: {source}")]
    UndecodableRevisionText {
        revision_number: i64,
        source: Utf8Error,
    },
    #[error("vote by user {user_id} has unsupported value `{value}`")]
    VoteValue { user_id: DbId, value: serde_json::Value },
    #[error("post nesting exceeds the maximum depth of {0}")]
    DepthExceeded(usize),
    #[error("`{0}` is not a valid identifier")]
    InvalidId(String),
    #[error("cannot encode {what}: {source}")]
    Encode {
        what: &'static str,
        source: serde_json::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How an operator should read a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Category {
    /// The export disagrees with itself or with its layout.
    Structural,
    /// Metadata declares something the export does not contain.
    IntegrityGap,
    /// Content exists but cannot be decoded.
    Decode,
    /// A value has a type the importer does not understand.
    Type,
    Io,
    Storage,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Structural => "structural mismatch",
            Category::IntegrityGap => "integrity gap",
            Category::Decode => "decode error",
            Category::Type => "type error",
            Category::Io => "I/O error",
            Category::Storage => "storage error",
        })
    }
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Error::Io { .. } | Error::Walk(_) | Error::Archive { .. } => Category::Io,
            Error::Json { .. }
            | Error::Fields(_)
            | Error::SlugMismatch { .. }
            | Error::UrlMismatch { .. }
            | Error::ArchiveMember(_)
            | Error::DepthExceeded(_)
            | Error::InvalidId(_) => Category::Structural,
            Error::UnmappedFile(_) | Error::MissingRevisionText { .. } => Category::IntegrityGap,
            Error::UndecodableRevisionText { .. } => Category::Decode,
            Error::VoteValue { .. } => Category::Type,
            Error::Encode { .. } | Error::Database(_) | Error::Pool(_) => Category::Storage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing,
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    pub field: String,
    pub problem: Problem,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::Missing => write!(f, "missing `{}`", self.field),
            Problem::Malformed(reason) => write!(f, "malformed `{}` ({reason})", self.field),
        }
    }
}

/// Every field of one document that failed to decode.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} document does not match: {}", .problems.iter().join(", "))]
pub struct FieldMismatch {
    pub entity: &'static str,
    pub problems: Vec<FieldProblem>,
}
