//! Domain knowledge for the Drill scenario generator.
//!
//! A domain describes the world scenarios are generated in: a service
//! hierarchy, object and agent descriptions with their own inheritance
//! graph, tasks with decomposition schemas, service implementations and
//! scenario templates. This crate loads a domain from YAML, validates it and
//! exposes it as a read-only [`DomainIndex`].
//!
//! # Modules
//!
//! - [`builder`] -- Validating [`DomainBuilder`] producing a [`DomainIndex`]
//! - [`document`] -- Serde model of YAML domain files
//! - [`error`] -- [`DomainError`] for loading and lookup failures
//! - [`index`] -- The hierarchy-aware [`DomainIndex`]

pub mod builder;
pub mod document;
pub mod error;
pub mod index;

pub use builder::DomainBuilder;
pub use document::{
    DomainDocument, ImplementationEntry, ObjectEntry, ObjectEntryKind, SchemaEntry, ServiceEntry,
    SettingEntry, TaskEntry,
};
pub use error::DomainError;
pub use index::DomainIndex;
