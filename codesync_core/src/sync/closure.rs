//! Closure Resolver
//!
//! Before a member is appended, every source-domain type its signature mentions
//! (generic arguments included) gets its own dependency artifact. Types that
//! are well-known, the type being synchronized, or already in progress further
//! up the recursion are left alone; that last rule is what keeps reference
//! cycles from recursing forever.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

use crate::error::{CodesyncError, Result};
use crate::sync::profile::{ArtifactProfile, ClosureMode};
use crate::sync::SyncSession;
use crate::types::{Member, MemberKind, TypeDefinition, TypeKind};

/// Classes and structs get dependency artifacts; enums and interfaces are
/// referenced as they are.
pub fn is_synchronizable(definition: &TypeDefinition) -> bool {
    matches!(definition.kind, TypeKind::Class | TypeKind::Struct)
}

/// Names in `member`'s signature that could resolve in the source domain.
pub(crate) fn candidate_names(member: &Member, type_generics: &[String]) -> Vec<String> {
    let method_generics: &[String] = match &member.kind {
        MemberKind::Method {
            generic_parameters, ..
        } => generic_parameters,
        _ => &[],
    };
    let mut names = Vec::new();
    for type_ref in member.signature_types() {
        for node in type_ref.walk() {
            if node.is_well_known()
                || type_generics.contains(&node.name)
                || method_generics.contains(&node.name)
                || names.contains(&node.name)
            {
                continue;
            }
            names.push(node.name.clone());
        }
    }
    names
}

/// Synchronizable domain types referenced by `members`, in order of first
/// appearance.
pub(crate) fn referenced_domain_types<'m>(
    members: impl IntoIterator<Item = &'m Member>,
    domain: &BTreeMap<String, TypeDefinition>,
) -> Vec<String> {
    let mut names = Vec::new();
    for member in members {
        for type_ref in member.signature_types() {
            for node in type_ref.walk() {
                if let Some(definition) = domain.get(&node.name)
                    && is_synchronizable(definition)
                    && !names.contains(&node.name)
                {
                    names.push(node.name.clone());
                }
            }
        }
    }
    names
}

impl SyncSession<'_> {
    /// Looks up every candidate name in the source scope, once per session.
    pub(crate) async fn resolve_domain_types(
        &mut self,
        members: &[Member],
        type_generics: &[String],
    ) -> Result<BTreeMap<String, TypeDefinition>> {
        let mut names = BTreeSet::new();
        for member in members {
            names.extend(candidate_names(member, type_generics));
        }

        let mut domain = BTreeMap::new();
        for name in names {
            let cached = match self.domain.get(&name) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self
                        .host
                        .types
                        .find_by_name(None, &name, &self.settings.source)
                        .await
                        .map_err(|e| CodesyncError::host("find_by_name", &name, e))?
                        .map(|located| located.definition);
                    trace!(name = %name, resolved = found.is_some(), "Domain type lookup");
                    self.domain.insert(name.clone(), found.clone());
                    found
                }
            };
            if let Some(definition) = cached {
                domain.insert(name, definition);
            }
        }
        Ok(domain)
    }

    /// Ensures the dependency artifact of each referenced type exists and
    /// returns the ones synchronized as a result.
    pub(crate) async fn ensure_dependencies(
        &mut self,
        profile: &ArtifactProfile,
        source_name: &str,
        referenced: Vec<String>,
    ) -> Result<Vec<String>> {
        let Some(kind) = profile.dependency_kind else {
            return Ok(Vec::new());
        };
        let dependency = self.settings.profile(kind)?.clone();

        let mut synchronized = Vec::new();
        for name in referenced {
            let key = (kind, name.clone());
            if name == source_name || self.in_progress.contains(&key) || self.completed.contains_key(&key) {
                trace!(name = %name, "Dependency already handled");
                continue;
            }

            if profile.closure == ClosureMode::AddedMembers {
                let target_name = dependency.target_name(&name);
                let existing = self
                    .host
                    .types
                    .find_by_name(Some(dependency.target_kind), &target_name, &dependency.location)
                    .await
                    .map_err(|e| CodesyncError::host("find_by_name", &target_name, e))?;
                if existing.is_some() {
                    trace!(artifact = %target_name, "Dependency artifact exists");
                    continue;
                }
            }

            debug!(source = %source_name, dependency = %name, kind = %kind, "Synchronizing dependency");
            let outcome = self.synchronize_inner(kind, name).await?;
            synchronized.push(outcome.artifact);
        }
        Ok(synchronized)
    }
}
