//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! an [`OrgLogin`] with an [`AppName`] even though both are `String` under the
//! hood.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, and a
// TryFrom<String> that deserialization goes through so empty values are
// rejected there too.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = &'static str;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(concat!(stringify!($name), " must not be empty"))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: GitHub-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies one GitHub Actions workflow job.
    JobId
}

u64_id! {
    /// Identifies the workflow run a job belongs to.
    RunId
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Login of a GitHub organization (e.g. `"acme"`).
    ///
    /// Runners are registered at organization scope, so this is both the key
    /// for registration token issuance and the base of the runner URL.
    OrgLogin
}

impl OrgLogin {
    /// Returns the canonical web URL of the organization, as passed to the
    /// runner's `config.sh --url`.
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}", self.0)
    }
}

string_id! {
    /// Name of the provisioning target application that ephemeral runners are
    /// started in.
    AppName
}

string_id! {
    /// Full name of a GitHub repository in `owner/name` form.
    RepositoryName
}

string_id! {
    /// A runner label requested by a workflow job (e.g. `"self-hosted"`).
    RunnerLabel
}

string_id! {
    /// The `X-GitHub-Delivery` GUID of one webhook delivery.
    ///
    /// Only used to correlate log lines; never interpreted.
    DeliveryId
}

string_id! {
    /// Identifier the provisioning API assigns to a newly created compute unit.
    ComputeUnitId
}

#[cfg(test)]
#[path = "identifiers_tests.rs"]
mod tests;
