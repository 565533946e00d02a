pub use codesync_core::{
    builders, config, dependency, diff, error, host, naming, namespace, signature, sync, types,
};
pub use codesync_core::{
    ArtifactKind, CodesyncError, Document, Host, Location, MemoryHost, Result, SyncReport,
    SyncSession, SyncSettings, session,
};

pub mod prelude {
    pub use codesync_core::builders::{BodyStyle, BuilderSet, MarkerAttribute, MemberBuilder};
    pub use codesync_core::config::CodesyncConfig;
    pub use codesync_core::host::{CapabilityProbe, DocumentWriter, TypeModelProvider};
    pub use codesync_core::sync::{ClosureMode, SyncOutcome, SyncStatus, TransformOutcome};
    pub use codesync_core::types::{Member, Parameter, TypeDefinition, TypeKind, TypeRef};
    pub use codesync_core::{ArtifactKind, Location, MemoryHost, SyncSession, SyncSettings, session};
    pub use convert_case::{Case, Casing};
    pub use regex;
}
