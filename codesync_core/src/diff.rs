use bon::Builder;
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::error::{CodesyncError, Result};
use crate::host::{Location, TypeModelProvider};
use crate::signature::{ComparisonHash, ComparisonPolicy};
use crate::types::{Member, MemberKind, TypeDefinition, TypeKind};

/// Marker interfaces of UI component frameworks; they carry nothing to synthesize.
pub const DEFAULT_IGNORED_INTERFACES: &[&str] = &["IComponent", "IHandleEvent", "IHandleAfterRender"];

/// What one synchronization pass must change in a target artifact.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Delta {
    pub to_add: Vec<Member>,
    pub to_remove: Vec<Member>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("+{} -{}", self.to_add.len(), self.to_remove.len())
    }
}

#[derive(Debug, Default, Clone, Builder)]
pub struct DiffOptions {
    /// Disable generated members the source no longer requires.
    #[builder(default)]
    pub prune_orphans: bool,
    /// Attribute identifying generated members.
    #[builder(into)]
    pub marker_attribute: Option<String>,
}

/// Computes the delta between the members a target has and the members it must have.
///
/// Members are compared by [`ComparisonHash`] only. `to_add` keeps the order of
/// `required` with hash duplicates collapsed. A present property or event whose
/// name matches a member being added lands in `to_remove`, so a retype yields
/// both an add and a remove. With orphan pruning, present members carrying the
/// marker attribute that are no longer required are removed as well.
pub fn diff_members(
    present: &[Member],
    required: &[Member],
    policy: ComparisonPolicy,
    options: &DiffOptions,
) -> Delta {
    let present_hashes: HashSet<ComparisonHash> = present
        .iter()
        .map(|member| member.comparison_hash(policy))
        .collect();
    let required_hashes: HashSet<ComparisonHash> = required
        .iter()
        .map(|member| member.comparison_hash(policy))
        .collect();

    let mut seen = HashSet::new();
    let to_add: Vec<Member> = required
        .iter()
        .filter(|member| {
            let hash = member.comparison_hash(policy);
            !present_hashes.contains(&hash) && seen.insert(hash)
        })
        .cloned()
        .collect();

    let superseded_names: HashSet<&str> = to_add
        .iter()
        .filter(|member| member.is_single_named())
        .map(|member| member.name.as_str())
        .collect();

    let to_remove: Vec<Member> = present
        .iter()
        .filter(|member| {
            let hash = member.comparison_hash(policy);
            if required_hashes.contains(&hash) {
                return false;
            }
            let superseded =
                member.is_single_named() && superseded_names.contains(member.name.as_str());
            let orphaned = options.prune_orphans
                && !matches!(member.kind, MemberKind::Constructor { .. })
                && options
                    .marker_attribute
                    .as_deref()
                    .is_some_and(|marker| member.has_attribute(marker));
            if superseded || orphaned {
                trace!(member = %member.name, superseded, orphaned, "Member scheduled for removal");
            }
            superseded || orphaned
        })
        .cloned()
        .collect();

    let delta = Delta { to_add, to_remove };
    debug!(
        present = present.len(),
        required = required.len(),
        "Computed member delta {}",
        delta.summary()
    );
    delta
}

/// Collects the members of `root` and of every interface it inherits from,
/// transitively, de-duplicated by security-agnostic hash.
///
/// Interfaces whose simple name is in `ignored` are skipped, each interface is
/// visited once, and ancestors the provider cannot resolve (framework
/// interfaces) are skipped.
pub async fn flatten_interface_members(
    provider: &dyn TypeModelProvider,
    root: &TypeDefinition,
    scope: &Location,
    ignored: &[String],
) -> Result<Vec<Member>> {
    let mut members = Vec::new();
    let mut hashes = HashSet::new();
    let mut visited: HashSet<String> = HashSet::from([root.name.clone()]);

    let mut collect = |definition: &TypeDefinition| {
        for member in definition.public_members() {
            if hashes.insert(member.comparison_hash(ComparisonPolicy::SecurityAgnostic)) {
                members.push(member.clone());
            }
        }
    };
    collect(root);

    // Depth-first in declaration order.
    let mut pending: Vec<_> = root.inherited_interfaces.iter().rev().cloned().collect();
    while let Some(interface) = pending.pop() {
        if ignored.iter().any(|name| *name == interface.name) {
            trace!(interface = %interface.name, "Skipping ignored interface");
            continue;
        }
        if !visited.insert(interface.name.clone()) {
            continue;
        }

        let located = provider
            .find_by_name(Some(TypeKind::Interface), &interface.name, scope)
            .await
            .map_err(|e| CodesyncError::host("find_by_name", &root.name, e))?;
        let Some(located) = located else {
            debug!(interface = %interface, "Ancestor interface not resolvable, skipping");
            continue;
        };

        let definition = located.definition;
        collect(&definition);
        pending.extend(definition.inherited_interfaces.iter().rev().cloned());
    }

    Ok(members)
}
