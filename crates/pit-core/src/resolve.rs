use std::fmt;

use thiserror::Error;

use crate::store::{Database, Project};

/// Which record namespace a token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Project,
    Pit,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Project => write!(f, "project"),
            RecordKind::Pit => write!(f, "pit"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid {kind} token: {token:?}")]
    InvalidToken { kind: RecordKind, token: String },
    #[error("No {kind} matches {token:?}")]
    NotFound { kind: RecordKind, token: String },
    #[error("More than one {kind} matches the name {token:?}")]
    Ambiguous { kind: RecordKind, token: String },
    #[error("A {kind} named {name:?} already exists")]
    NameTaken { kind: RecordKind, name: String },
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::InvalidToken { .. } => "InvalidTokenError",
            ResolveError::NotFound { .. } => "NotFoundError",
            ResolveError::Ambiguous { .. } => "AmbiguousError",
            ResolveError::NameTaken { .. } => "NameTakenError",
        }
    }
}

enum Token {
    Id(u64),
    Name(String),
}

/// A token is either a positive decimal id or a record name. `""`, `"0"` and
/// negative integers are malformed rather than names.
fn parse_token(kind: RecordKind, token: &str) -> Result<Token, ResolveError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidToken {
            kind,
            token: token.to_string(),
        });
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let id: u64 = trimmed.parse().map_err(|_| ResolveError::InvalidToken {
            kind,
            token: token.to_string(),
        })?;
        if id == 0 {
            return Err(ResolveError::InvalidToken {
                kind,
                token: token.to_string(),
            });
        }
        return Ok(Token::Id(id));
    }
    let digits = trimmed.strip_prefix('-').unwrap_or("");
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ResolveError::InvalidToken {
            kind,
            token: token.to_string(),
        });
    }
    Ok(Token::Name(trimmed.to_string()))
}

/// Maps a user-supplied token to a project id. Ids hit any record; names are
/// matched against active projects only.
pub fn resolve_project(db: &Database, token: &str) -> Result<u64, ResolveError> {
    let kind = RecordKind::Project;
    match parse_token(kind, token)? {
        Token::Id(id) => {
            if db.project(id).is_some() {
                Ok(id)
            } else {
                Err(ResolveError::NotFound {
                    kind,
                    token: token.to_string(),
                })
            }
        }
        Token::Name(name) => {
            let matches: Vec<u64> = db
                .projects
                .iter()
                .filter(|project| project.active && project.name.as_deref() == Some(name.as_str()))
                .map(|project| project.id)
                .collect();
            match matches.as_slice() {
                [] => Err(ResolveError::NotFound {
                    kind,
                    token: token.to_string(),
                }),
                [id] => Ok(*id),
                // Unreachable while the name uniqueness invariant holds.
                _ => Err(ResolveError::Ambiguous {
                    kind,
                    token: token.to_string(),
                }),
            }
        }
    }
}

/// Maps a token to a pit id within the given project.
pub fn resolve_pit(project: &Project, token: &str) -> Result<u64, ResolveError> {
    let kind = RecordKind::Pit;
    match parse_token(kind, token)? {
        Token::Id(id) => {
            if project.pit(id).is_some() {
                Ok(id)
            } else {
                Err(ResolveError::NotFound {
                    kind,
                    token: token.to_string(),
                })
            }
        }
        Token::Name(name) => {
            let matches: Vec<u64> = project
                .pits
                .iter()
                .filter(|pit| pit.name.as_deref() == Some(name.as_str()))
                .map(|pit| pit.id)
                .collect();
            match matches.as_slice() {
                [] => Err(ResolveError::NotFound {
                    kind,
                    token: token.to_string(),
                }),
                [id] => Ok(*id),
                _ => Err(ResolveError::Ambiguous {
                    kind,
                    token: token.to_string(),
                }),
            }
        }
    }
}

/// Fails with `NameTaken` when `candidate` already names one of `existing`.
pub fn ensure_unused_name<'a>(
    kind: RecordKind,
    candidate: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> Result<(), ResolveError> {
    if existing.into_iter().any(|name| name == candidate) {
        return Err(ResolveError::NameTaken {
            kind,
            name: candidate.to_string(),
        });
    }
    Ok(())
}
