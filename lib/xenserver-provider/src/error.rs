// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors surfaced by reconcilers and projectors.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::mapper::MapError;

/// An operation-fatal error.
///
/// Every variant except [`Error::InvalidObject`] carries the fixed label of
/// the step that failed; the label becomes the summary of the resulting
/// [`Diagnostic`].
#[derive(Debug, Error)]
pub enum Error {
    /// A durable UUID could not be mapped to a live reference.
    #[error("{label}: {source}")]
    Resolution {
        label: &'static str,
        #[source]
        source: xenapi_client::Error,
    },

    /// The control-plane call itself failed.
    #[error("{label}: {source}")]
    Remote {
        label: &'static str,
        #[source]
        source: xenapi_client::Error,
    },

    /// A remote value does not fit the local attribute type.
    #[error("{label}: field {field}: {detail}")]
    Conversion { label: &'static str, field: String, detail: String },

    /// A plan, state or config object did not match the schema.
    #[error("invalid object: {detail}")]
    InvalidObject { detail: String },
}

impl Error {
    pub(crate) fn resolution(
        label: &'static str,
    ) -> impl FnOnce(xenapi_client::Error) -> Error {
        move |source| Error::Resolution { label, source }
    }

    pub(crate) fn remote(
        label: &'static str,
    ) -> impl FnOnce(xenapi_client::Error) -> Error {
        move |source| Error::Remote { label, source }
    }

    pub(crate) fn mapping(
        label: &'static str,
    ) -> impl FnOnce(MapError) -> Error {
        move |e| match e {
            MapError::Conversion { field, detail } => {
                Error::Conversion { label, field, detail }
            }
            MapError::Remote { field: _, source } => {
                Error::Remote { label, source }
            }
        }
    }

    pub(crate) fn invalid(detail: impl Into<String>) -> Error {
        Error::InvalidObject { detail: detail.into() }
    }

    /// The fixed label of the failed step.
    pub fn label(&self) -> &'static str {
        match self {
            Error::Resolution { label, .. }
            | Error::Remote { label, .. }
            | Error::Conversion { label, .. } => label,
            Error::InvalidObject { .. } => "invalid object",
        }
    }

    /// The underlying message, without the label.
    pub fn detail(&self) -> String {
        match self {
            Error::Resolution { source, .. } | Error::Remote { source, .. } => {
                source.to_string()
            }
            Error::Conversion { field, detail, .. } => {
                format!("{field}: {detail}")
            }
            Error::InvalidObject { detail } => detail.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A user-visible report of a failed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl From<&Error> for Diagnostic {
    fn from(error: &Error) -> Self {
        Diagnostic {
            severity: Severity::Error,
            summary: error.label().to_string(),
            detail: error.detail(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.summary, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xenapi_client::{Failure, XenClass};

    #[test]
    fn diagnostic_carries_label_and_raw_message() {
        let err = Error::Resolution {
            label: "unable to get network ref",
            source: Failure::uuid_invalid(XenClass::Network, "abc").into(),
        };
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.summary, "unable to get network ref");
        assert_eq!(diag.detail, "API error: UUID_INVALID [network, abc]");
        assert_eq!(
            diag.to_string(),
            "unable to get network ref: API error: UUID_INVALID [network, abc]"
        );
    }

    #[test]
    fn conversion_detail_names_the_field() {
        let err = Error::mapping("unable to update VM data")(
            MapError::Conversion {
                field: "platform".to_string(),
                detail: "value for key \"acpi\" is not a string".to_string(),
            },
        );
        assert!(matches!(err, Error::Conversion { .. }));
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.summary, "unable to update VM data");
        assert!(diag.detail.starts_with("platform: "));
    }
}
