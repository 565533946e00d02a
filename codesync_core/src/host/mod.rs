//! Host Collaborator Layer
//!
//! The engine never reads or writes source text itself. Everything it knows about
//! types comes from a [`TypeModelProvider`], every edit goes through a
//! [`DocumentWriter`], and code-block variants are chosen with the help of a
//! [`CapabilityProbe`]. An IDE integration implements these against its own
//! workspace model; [`memory::MemoryHost`] implements all three in memory.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HostError;
use crate::types::{Member, TypeDefinition, TypeKind};

pub use memory::MemoryHost;

/// A project, optionally narrowed to a folder inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub project: String,
    #[serde(default)]
    pub folder: Option<String>,
}

impl Location {
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            folder: None,
        }
    }

    pub fn folder(project: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            folder: Some(folder.into()),
        }
    }

    /// True when `other` lies inside this location.
    pub fn contains(&self, other: &Location) -> bool {
        if self.project != other.project {
            return false;
        }
        match (&self.folder, &other.folder) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(scope), Some(folder)) => {
                folder == scope
                    || folder
                        .strip_prefix(scope.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.folder {
            Some(folder) => write!(f, "{}/{}", self.project, folder),
            None => write!(f, "{}", self.project),
        }
    }
}

/// Opaque handle to a host document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// A type found by the provider together with the document that declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedType {
    pub document: Document,
    pub definition: TypeDefinition,
}

/// Supplies structured type models.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TypeModelProvider: Send + Sync {
    /// Looks a type up by simple name inside `scope`. `kind` narrows the search
    /// when given. A miss is `Ok(None)`.
    async fn find_by_name(
        &self,
        kind: Option<TypeKind>,
        name: &str,
        scope: &Location,
    ) -> Result<Option<LocatedType>, HostError>;

    /// Parses a document back into a structured type.
    async fn load(&self, document: &Document) -> Result<TypeDefinition, HostError>;

    /// Whether the project (and folder, when given) exists at all.
    async fn location_exists(&self, location: &Location) -> Result<bool, HostError>;
}

/// Applies edits to host documents.
///
/// Every method receives the structured member alongside its rendered text.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn create_document(
        &self,
        location: &Location,
        file_name: &str,
        shell: &TypeDefinition,
        text: &str,
    ) -> Result<Document, HostError>;

    /// Appends after the artifact's existing members.
    async fn append_member(
        &self,
        document: &Document,
        member: &Member,
        text: &str,
    ) -> Result<(), HostError>;

    /// Comments a member out; it must stay recoverable.
    async fn disable_member(&self, document: &Document, member: &Member)
    -> Result<(), HostError>;

    async fn replace_member(
        &self,
        document: &Document,
        existing: &Member,
        replacement: &Member,
        text: &str,
    ) -> Result<(), HostError>;

    async fn add_import(
        &self,
        document: &Document,
        namespace: &str,
        alias: Option<String>,
    ) -> Result<(), HostError>;
}

/// Answers whether a project references a library.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn project_supports(&self, project: &str, library: &str) -> Result<bool, HostError>;
}

/// The collaborators a session works against.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub types: &'a dyn TypeModelProvider,
    pub writer: &'a dyn DocumentWriter,
    pub probe: &'a dyn CapabilityProbe,
}

impl<'a> Host<'a> {
    pub fn new(
        types: &'a dyn TypeModelProvider,
        writer: &'a dyn DocumentWriter,
        probe: &'a dyn CapabilityProbe,
    ) -> Self {
        Self {
            types,
            writer,
            probe,
        }
    }

    /// One object implementing all three collaborators.
    pub fn single<H>(host: &'a H) -> Self
    where
        H: TypeModelProvider + DocumentWriter + CapabilityProbe,
    {
        Self::new(host, host, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_containment() {
        let project = Location::project("Acme.App");
        let models = Location::folder("Acme.App", "Models");
        let nested = Location::folder("Acme.App", "Models/Orders");
        let sibling = Location::folder("Acme.App", "ModelsOld");

        assert!(project.contains(&models));
        assert!(models.contains(&nested));
        assert!(models.contains(&models));
        assert!(!models.contains(&sibling));
        assert!(!models.contains(&project));
        assert!(!Location::project("Acme.Data").contains(&models));
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::folder("Acme.App", "Models").to_string(), "Acme.App/Models");
        assert_eq!(Location::project("Acme.App").to_string(), "Acme.App");
    }
}
