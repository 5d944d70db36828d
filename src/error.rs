#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the synchronization crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.
//!
//! Variants fall into two groups. Fatal variants (`Io`, `Settings`,
//! `MalformedRecord`, `AuthFailure`, `SubjectNotFound`) abort a run.
//! `RemoteCall` is the transient failure absorbed by
//! [`retry_fixed`](crate::retry_fixed); once retries run out it surfaces as
//! `RetriesExhausted`, which the orchestrator isolates to the entity that
//! produced it.

use std::path::{Path, PathBuf};

/// Unified error type returned by the catalog parser, the remote clients,
/// the orchestrator and the CLI.
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// Wraps I/O errors that occur while reading catalog or settings files.
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// Location of the file.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps YAML decoding errors of the settings document.
    #[error("failed to parse settings: {source}")]
    Settings {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error
    },
    /// Wraps serialization errors when writing JSON output.
    #[error("failed to serialize output: {source}")]
    Serialize {
        /// Underlying serialization error.
        source: serde_json::Error
    },
    /// Returned when settings or arguments violate invariants.
    #[error("invalid configuration: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String
    },
    /// A catalog line does not match `<digits> <name>` with a 4-digit year.
    #[error("malformed catalog record on line {line}: {content:?}")]
    MalformedRecord {
        /// One-based line number inside the catalog source.
        line:    usize,
        /// Raw content of the offending line.
        content: String
    },
    /// The metadata service token exchange failed or returned no token.
    #[error("metadata service authentication failed: {message}")]
    AuthFailure {
        /// Human readable description of the failure.
        message: String
    },
    /// The subject search returned no result.
    #[error("subject '{subject}' was not found on the metadata service")]
    SubjectNotFound {
        /// Name that was searched for.
        subject: String
    },
    /// A single remote call failed. Retried by the executor.
    #[error("{operation} failed: {message}")]
    RemoteCall {
        /// Name of the remote operation.
        operation: String,
        /// Transport, status or decoding detail.
        message:   String
    },
    /// A remote call kept failing until the attempt bound was reached.
    #[error("{operation} gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Name of the remote operation.
        operation:  String,
        /// Number of attempts performed.
        attempts:   u32,
        /// Error reported by the final attempt.
        last_error: Box<Error>
    }
}

impl Error {
    /// Constructs a validation error from the provided displayable value.
    pub fn validation<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Validation {
            message: message.into()
        }
    }

    /// Constructs a remote call failure for the named operation.
    ///
    /// # Parameters
    ///
    /// * `operation` - Short label of the remote call, used in logs.
    /// * `message` - Transport, status or decoding detail.
    pub fn remote<O, M>(operation: O, message: M) -> Self
    where
        O: Into<String>,
        M: Into<String>
    {
        Self::RemoteCall {
            operation: operation.into(),
            message:   message.into()
        }
    }

    /// Returns `true` for failures that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RemoteCall { .. } | Self::RetriesExhausted { .. })
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Settings {
            source
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialize {
            source
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the file that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn validation_constructor_populates_message() {
        let error = Error::validation("something went wrong");
        match error {
            Error::Validation {
                ref message
            } => {
                assert_eq!(message, "something went wrong");
            }
            other => panic!("expected validation error, got {other:?}")
        }
    }

    #[test]
    fn to_display_string_matches_display() {
        let error = Error::remote("create card", "503 Service Unavailable");
        assert_eq!(error.to_string(), error.to_display_string());
        assert_eq!(error.to_string(), "create card failed: 503 Service Unavailable");
    }

    #[test]
    fn retries_exhausted_mentions_last_error() {
        let error = Error::RetriesExhausted {
            operation:  "create list".to_owned(),
            attempts:   3,
            last_error: Box::new(Error::remote("create list", "timeout"))
        };
        let rendered = error.to_string();
        assert!(rendered.contains("after 3 attempts"));
        assert!(rendered.contains("timeout"));
    }

    #[test]
    fn fatal_classification_separates_remote_failures() {
        assert!(!Error::remote("search", "boom").is_fatal());
        assert!(
            Error::SubjectNotFound {
                subject: "Nobody".to_owned()
            }
            .is_fatal()
        );
        assert!(
            Error::MalformedRecord {
                line:    2,
                content: "Desire".to_owned()
            }
            .is_fatal()
        );
    }

    #[test]
    fn io_error_helper_wraps_path_and_source() {
        let path = std::path::Path::new("/tmp/discography.txt");
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error = super::io_error(path, io_error);

        match error {
            Error::Io {
                path: ref stored_path,
                ref source
            } => {
                assert_eq!(stored_path, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected io error, got {other:?}")
        }
    }

    #[test]
    fn serde_yaml_conversion_maps_to_settings_variant() {
        let error = serde_yaml::from_str::<usize>("not-a-number").unwrap_err();
        let mapped: Error = error.into();
        assert!(matches!(mapped, Error::Settings { .. }));
    }
}
