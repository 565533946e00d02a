//! Artifact Synchronizer
//!
//! A [`SyncSession`] derives generated artifacts from source types through the
//! host collaborators. Each artifact goes through the same states:
//!
//! 1. locate the target by its formatted name, creating an empty shell when
//!    it does not exist yet (the shell is re-loaded like any other target);
//! 2. diff the target's members against the projected source members;
//! 3. disable what is superseded or orphaned, then for every missing member
//!    synchronize the domain types it references and append the built text;
//! 4. re-load and return the patched definition.
//!
//! Within one session every artifact is synchronized at most once. Later
//! requests, recursive ones included, get the cached outcome back as
//! [`SyncStatus::Unchanged`] without touching the host.

mod closure;
mod profile;
mod projection;
mod report;
mod shell;
mod transform;

use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace};

use crate::builders::{
    BuildContext, BuildOptions, BuildRequest, BuilderSet, CodeBlocks, select_code_blocks,
};
use crate::dependency::ReferenceGraph;
use crate::diff::{DiffOptions, diff_members, flatten_interface_members};
use crate::error::{CodesyncError, InputKind, Result};
use crate::host::{
    CapabilityProbe, Document, DocumentWriter, Host, LocatedType, Location, TypeModelProvider,
};
use crate::namespace::NamespaceMapper;
use crate::types::{Member, TypeDefinition, TypeKind};

pub use closure::is_synchronizable;
pub use profile::{
    ArtifactKind, ArtifactProfile, ClosureMode, MemberSelection, NullablePolicy, SyncSettings,
};
pub use projection::Projection;
pub use report::{SyncOutcome, SyncReport, SyncStatus};
pub use shell::{Shell, render_shell};
pub use transform::{MemberChange, SkippedProperty, TransformOutcome};

type ArtifactKey = (ArtifactKind, String);

pub struct SyncSession<'h> {
    host: Host<'h>,
    settings: SyncSettings,
    builders: BuilderSet,
    mapper: NamespaceMapper,
    in_progress: HashSet<ArtifactKey>,
    completed: HashMap<ArtifactKey, SyncOutcome>,
    /// Code blocks per target project.
    blocks: HashMap<String, CodeBlocks>,
    /// Source-scope lookups by simple name; `None` records a miss.
    domain: HashMap<String, Option<TypeDefinition>>,
    report: SyncReport,
}

impl<'h> SyncSession<'h> {
    pub fn new(host: Host<'h>, settings: SyncSettings) -> Self {
        let mapper = NamespaceMapper::new(settings.namespaces.clone());
        Self {
            host,
            settings,
            builders: BuilderSet::default(),
            mapper,
            in_progress: HashSet::new(),
            completed: HashMap::new(),
            blocks: HashMap::new(),
            domain: HashMap::new(),
            report: SyncReport::default(),
        }
    }

    pub fn with_builders(mut self, builders: BuilderSet) -> Self {
        self.builders = builders;
        self
    }

    pub fn builders_mut(&mut self) -> &mut BuilderSet {
        &mut self.builders
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    pub fn into_report(self) -> SyncReport {
        self.report
    }

    /// Synchronizes the `kind` artifact of one source type, and transitively
    /// the artifacts of the domain types its new members reference.
    pub async fn synchronize(&mut self, source_name: &str, kind: ArtifactKind) -> Result<SyncOutcome> {
        self.synchronize_inner(kind, source_name.trim().to_string()).await
    }

    /// Synchronizes several source types, dependencies first.
    pub async fn synchronize_all<I, S>(&mut self, source_names: I, kind: ArtifactKind) -> Result<Vec<SyncOutcome>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut definitions = Vec::new();
        for name in source_names {
            definitions.push(self.locate_source(name.as_ref().trim()).await?.definition);
        }
        let graph = ReferenceGraph::from_definitions(&definitions);
        let order = graph.synchronization_order();
        info!(kind = %kind, count = order.len(), "Synchronizing batch");
        for cycle in graph.cycles() {
            self.report.record_cycle(cycle);
        }

        let mut outcomes = Vec::with_capacity(order.len());
        for name in order {
            trace!(source = %name, "Batch entry");
            outcomes.push(self.synchronize_inner(kind, name).await?);
        }
        Ok(outcomes)
    }

    fn synchronize_inner(&mut self, kind: ArtifactKind, source_name: String) -> BoxFuture<'_, Result<SyncOutcome>> {
        async move {
            let key = (kind, source_name);
            if let Some(done) = self.completed.get(&key) {
                debug!(kind = %kind, source = %key.1, "Artifact already synchronized in this session");
                return Ok(done.as_unchanged());
            }

            let profile = self.settings.profile(kind)?.clone();
            let source = self.locate_source(&key.1).await?;
            info!(kind = %kind, source = %key.1, "Synchronizing artifact");

            self.in_progress.insert(key.clone());
            let result = self.run_artifact(&profile, &source.definition).await;
            self.in_progress.remove(&key);

            let outcome = result?;
            info!(
                artifact = %outcome.artifact,
                status = %outcome.status,
                added = outcome.added.len(),
                disabled = outcome.disabled.len(),
                "Artifact synchronized"
            );
            self.report.record_artifact(&outcome);
            self.completed.insert(key, outcome.clone());
            Ok(outcome)
        }
        .boxed()
    }

    async fn run_artifact(&mut self, profile: &ArtifactProfile, source: &TypeDefinition) -> Result<SyncOutcome> {
        let host = self.host;
        let target_name = profile.target_name(&source.name);

        // Locate, or create and fall through to the same update path.
        let located = host
            .types
            .find_by_name(Some(profile.target_kind), &target_name, &profile.location)
            .await
            .map_err(|e| CodesyncError::host("find_by_name", &target_name, e))?;
        let (document, created) = match located {
            Some(located) => (located.document, false),
            None => {
                let shell = render_shell(profile, &target_name, source);
                debug!(artifact = %target_name, location = %profile.location, "Creating artifact shell");
                let document = host
                    .writer
                    .create_document(&profile.location, &shell.file_name, &shell.definition, &shell.text)
                    .await
                    .map_err(|e| CodesyncError::host("create_document", &target_name, e))?;
                (document, true)
            }
        };
        let target = self.load_target(&target_name, &document).await?;

        let sources = self.required_members(profile, source).await?;
        let domain = self.resolve_domain_types(&sources, &source.generic_parameters).await?;
        let dependency = match profile.dependency_kind {
            Some(kind) => Some(self.settings.profile(kind)?.clone()),
            None => None,
        };
        let marker = self.settings.marker.clone();

        let projection = Projection {
            profile,
            dependency: dependency.as_ref(),
            marker: marker.as_ref(),
            mapper: &self.mapper,
            domain: &domain,
        };
        let projected: Vec<Member> = sources.iter().map(|member| projection.project(member)).collect();

        let options = DiffOptions::builder()
            .prune_orphans(profile.prune_orphans && marker.is_some())
            .maybe_marker_attribute(marker.as_ref().map(|marker| marker.name.clone()))
            .build();
        let delta = diff_members(&target.members, &projected, profile.policy, &options);

        let mut outcome = SyncOutcome {
            status: if created {
                SyncStatus::Created
            } else {
                SyncStatus::Unchanged
            },
            kind: profile.kind,
            source: source.name.clone(),
            artifact: target_name.clone(),
            document: document.clone(),
            definition: target.clone(),
            added: Vec::new(),
            disabled: Vec::new(),
            dependencies: Vec::new(),
        };
        if profile.closure == ClosureMode::Full {
            let referenced = closure::referenced_domain_types(&sources, &domain);
            outcome.dependencies = self
                .ensure_dependencies(profile, &source.name, referenced)
                .await?;
        }
        if delta.is_empty() {
            debug!(artifact = %target_name, "Artifact is up to date");
            return Ok(outcome);
        }
        debug!(artifact = %target_name, delta = %delta.summary(), "Patching artifact");

        for member in &delta.to_remove {
            host.writer
                .disable_member(&document, member)
                .await
                .map_err(|e| CodesyncError::host_member("disable_member", &target_name, &member.name, e))?;
            trace!(artifact = %target_name, member = %member.name, "Disabled member");
            outcome.disabled.push(member.name.clone());
        }

        let blocks = if profile.target_kind == TypeKind::Interface || delta.to_add.is_empty() {
            CodeBlocks::default()
        } else {
            self.code_blocks(&profile.location.project).await?
        };
        let build_options = BuildOptions::builder()
            .target_kind(profile.target_kind)
            .body_style(profile.body_style.clone())
            .maybe_marker(marker.clone())
            .build();
        let ctx = BuildContext::new(host.writer, &document, &target, &blocks);

        for member in &delta.to_add {
            let Some(index) = projected.iter().position(|candidate| candidate == member) else {
                continue;
            };
            let source_member = &sources[index];

            if profile.closure == ClosureMode::AddedMembers {
                let referenced = closure::referenced_domain_types([source_member], &domain);
                let synced = self
                    .ensure_dependencies(profile, &source.name, referenced)
                    .await?;
                outcome.dependencies.extend(synced);
            }

            let request = BuildRequest {
                member,
                source: source_member,
            };
            let built = self
                .builders
                .build(&request, &ctx, 1, &build_options)
                .await
                .map_err(|e| CodesyncError::builder(&target_name, &member.name, e))?;
            let Some(text) = built else {
                trace!(artifact = %target_name, member = %member.name, "Builder emitted nothing");
                continue;
            };
            host.writer
                .append_member(&document, member, &text)
                .await
                .map_err(|e| CodesyncError::host_member("append_member", &target_name, &member.name, e))?;
            trace!(artifact = %target_name, member = %member.name, "Appended member");
            outcome.added.push(member.name.clone());
        }

        outcome.definition = self.load_target(&target_name, &document).await?;
        if !created && (!outcome.added.is_empty() || !outcome.disabled.is_empty()) {
            outcome.status = SyncStatus::Updated;
        }
        Ok(outcome)
    }

    async fn load_target(&self, artifact: &str, document: &Document) -> Result<TypeDefinition> {
        self.host
            .types
            .load(document)
            .await
            .map_err(|e| CodesyncError::structural_load(artifact, document.path.clone(), e))
    }

    pub(crate) async fn locate_source(&self, name: &str) -> Result<LocatedType> {
        let scope = &self.settings.source;
        if let Some(located) = self
            .host
            .types
            .find_by_name(None, name, scope)
            .await
            .map_err(|e| CodesyncError::host("find_by_name", name, e))?
        {
            return Ok(located);
        }
        Err(self.missing_source(name).await?)
    }

    /// Names the innermost unresolved part of a failed source lookup.
    async fn missing_source(&self, name: &str) -> Result<CodesyncError> {
        let scope = &self.settings.source;
        if !self.location_exists(&Location::project(&scope.project)).await? {
            return Ok(CodesyncError::missing(InputKind::Project, &scope.project, "no such project"));
        }
        if scope.folder.is_some() && !self.location_exists(scope).await? {
            return Ok(CodesyncError::missing(
                InputKind::Folder,
                scope.to_string(),
                format!("no such folder in project {}", scope.project),
            ));
        }
        Ok(CodesyncError::missing(InputKind::SourceType, name, format!("not found in {scope}")))
    }

    async fn location_exists(&self, location: &Location) -> Result<bool> {
        self.host
            .types
            .location_exists(location)
            .await
            .map_err(|e| CodesyncError::host("location_exists", location.to_string(), e))
    }

    async fn required_members(&self, profile: &ArtifactProfile, source: &TypeDefinition) -> Result<Vec<Member>> {
        let members = match profile.selection {
            MemberSelection::Properties => source.public_properties().cloned().collect(),
            MemberSelection::InterfaceMembers if source.is_interface() => {
                flatten_interface_members(
                    self.host.types,
                    source,
                    &self.settings.source,
                    &self.settings.ignored_interfaces,
                )
                .await?
            }
            MemberSelection::InterfaceMembers => source.public_members().cloned().collect(),
        };
        trace!(source = %source.name, count = members.len(), "Required members selected");
        Ok(members)
    }

    async fn code_blocks(&mut self, project: &str) -> Result<CodeBlocks> {
        if let Some(blocks) = self.blocks.get(project) {
            return Ok(blocks.clone());
        }
        let blocks = select_code_blocks(
            self.host.probe,
            project,
            &self.settings.blocks,
            &self.settings.capabilities,
        )
        .await?;
        debug!(project, ?blocks, "Selected code blocks");
        self.blocks.insert(project.to_string(), blocks.clone());
        Ok(blocks)
    }
}

/// Builds a session over one host object implementing every collaborator.
pub fn session<H>(host: &H, settings: SyncSettings) -> SyncSession<'_>
where
    H: TypeModelProvider + DocumentWriter + CapabilityProbe,
{
    SyncSession::new(Host::single(host), settings)
}
