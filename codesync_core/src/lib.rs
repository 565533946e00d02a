// Codesync - incremental structural synchronization of generated source artifacts

// Data model and pure rules
pub mod naming;
pub mod namespace;
pub mod signature;
pub mod types;

// Engine
pub mod builders;
pub mod dependency;
pub mod diff;
pub mod sync;

// Collaborators, configuration and errors
pub mod config;
pub mod error;
pub mod host;

// Re-export commonly used items for convenience
pub use error::{CodesyncError, InputKind, MissingInputError, Result, StructuralLoadError};
pub use host::{
    CapabilityProbe, Document, DocumentWriter, Host, Location, MemoryHost, TypeModelProvider,
};
pub use naming::{AsyncSuffix, MethodNameRule, NameRule, format_name};
pub use signature::{ComparisonHash, ComparisonPolicy};
pub use sync::{
    ArtifactKind, ArtifactProfile, ClosureMode, SyncOutcome, SyncReport, SyncSession,
    SyncSettings, SyncStatus, TransformOutcome, session,
};
pub use types::{Member, MemberKind, TypeDefinition, TypeKind, TypeRef};
