//! Type-safe identifier wrappers.
//!
//! Domain concepts are keyed by stable string ids taken from the domain
//! document; scenario-local instances are keyed by integers handed out by an
//! [`InstanceIds`] allocator. Wrapping both in newtypes prevents accidental
//! mixing of, say, a service id and a task id at compile time.
//!
//! [`InstanceIds`]: crate::instances::InstanceIds

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around a stable domain key.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a domain key.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Return the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner key.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generates a newtype wrapper around a scenario-local instance counter.
macro_rules! define_instance_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw counter value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the raw counter value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id! {
    /// Identifier of a service (a hierarchical capability tag).
    ServiceId
}

define_id! {
    /// Identifier of an object or agent description (concrete or type).
    ObjectDescId
}

define_id! {
    /// Identifier of a task description (composite or atomic).
    TaskDescId
}

define_id! {
    /// Identifier of a decomposition schema (an HTN method).
    SchemaId
}

define_id! {
    /// Identifier of a service implementation.
    ImplementationId
}

define_id! {
    /// Identifier of a setting (the scenario's environmental context).
    SettingId
}

define_id! {
    /// Agent type tag distinguishing kinds of animate actors.
    AgentType
}

define_instance_id! {
    /// Identifier of a task instance in a scenario's planning or story sequence.
    TaskInstanceId
}

define_instance_id! {
    /// Identifier of an object or agent instance placed in a scenario.
    ObjectInstanceId
}
