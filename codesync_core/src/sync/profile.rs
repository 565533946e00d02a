use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::builders::{BlockSettings, BodyStyle, CapabilitySettings, MarkerAttribute};
use crate::diff::DEFAULT_IGNORED_INTERFACES;
use crate::error::{CodesyncError, InputKind, Result};
use crate::host::Location;
use crate::namespace::MappedNamespace;
use crate::naming::{AsyncSuffix, MethodNameRule, NameRule};
use crate::signature::ComparisonPolicy;
use crate::types::TypeKind;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Repository,
    Contract,
    Service,
    Client,
}

/// Which source members an artifact must carry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemberSelection {
    /// Public instance properties of a class.
    #[default]
    Properties,
    /// Public members, flattened across inherited interfaces.
    InterfaceMembers,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NullablePolicy {
    #[default]
    Preserve,
    /// `int?` becomes `int`; nullable reference types are untouched.
    StripValueTypes,
}

/// Which referenced domain types get their dependency artifacts ensured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClosureMode {
    /// Types referenced by newly added members; existing artifacts are left alone.
    #[default]
    AddedMembers,
    /// Types referenced by every required member, re-synchronized each run.
    Full,
}

/// Everything needed to derive one kind of artifact from a source type.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct ArtifactProfile {
    pub kind: ArtifactKind,
    pub location: Location,
    #[builder(into)]
    pub namespace: String,
    #[builder(default)]
    pub name_rule: NameRule,
    #[builder(into)]
    pub anchor_prefix: Option<String>,
    #[builder(default)]
    pub target_kind: TypeKind,
    #[builder(default)]
    pub selection: MemberSelection,
    #[builder(default)]
    pub policy: ComparisonPolicy,
    #[builder(default)]
    pub nullable: NullablePolicy,
    #[builder(default)]
    pub method_rule: MethodNameRule,
    #[builder(default)]
    pub body_style: BodyStyle,
    /// Kind of artifact generated for domain types this one references.
    pub dependency_kind: Option<ArtifactKind>,
    #[builder(default)]
    pub default_imports: Vec<String>,
    /// The generated type implements the source interface.
    #[builder(default)]
    pub implements_source: bool,
    #[builder(default)]
    pub prune_orphans: bool,
    #[builder(default)]
    pub closure: ClosureMode,
}

fn strip(prefixes: &[&str], suffixes: &[&str], add_suffix: &str) -> NameRule {
    NameRule::builder()
        .remove_prefixes(prefixes.iter().map(|s| s.to_string()).collect())
        .remove_suffixes(suffixes.iter().map(|s| s.to_string()).collect())
        .add_suffix(add_suffix)
        .build()
}

fn imports(namespaces: &[&str]) -> Vec<String> {
    namespaces.iter().map(|s| s.to_string()).collect()
}

impl ArtifactProfile {
    /// Conventional profile for `kind` inside `project`, whose root namespace is
    /// `root_namespace`.
    pub fn preset(kind: ArtifactKind, project: &str, root_namespace: &str) -> Self {
        match kind {
            ArtifactKind::Model => ArtifactProfile::builder()
                .kind(kind)
                .location(Location::folder(project, "Models"))
                .namespace(format!("{root_namespace}.Models"))
                .name_rule(strip(&["Db"], &["Entity"], "Model"))
                .selection(MemberSelection::Properties)
                .nullable(NullablePolicy::StripValueTypes)
                .dependency_kind(ArtifactKind::Model)
                .default_imports(imports(&["System", "System.Collections.Generic"]))
                .prune_orphans(true)
                .build(),
            ArtifactKind::Repository => ArtifactProfile::builder()
                .kind(kind)
                .location(Location::folder(project, "Repositories"))
                .namespace(format!("{root_namespace}.Repositories"))
                .name_rule(strip(&["I"], &[], ""))
                .selection(MemberSelection::InterfaceMembers)
                .policy(ComparisonPolicy::SecurityAgnostic)
                .default_imports(imports(&[
                    "System",
                    "System.Collections.Generic",
                    "System.Threading.Tasks",
                ]))
                .implements_source(true)
                .build(),
            ArtifactKind::Contract => ArtifactProfile::builder()
                .kind(kind)
                .location(Location::folder(project, "Contracts"))
                .namespace(format!("{root_namespace}.Contracts"))
                .name_rule(strip(&[], &["Logic", "Repository"], "Contract"))
                .anchor_prefix("I")
                .target_kind(TypeKind::Interface)
                .selection(MemberSelection::InterfaceMembers)
                .policy(ComparisonPolicy::SecurityAgnostic)
                .dependency_kind(ArtifactKind::Model)
                .default_imports(imports(&["System.Collections.Generic", "System.Threading.Tasks"]))
                .prune_orphans(true)
                .build(),
            ArtifactKind::Service => ArtifactProfile::builder()
                .kind(kind)
                .location(Location::folder(project, "Services"))
                .namespace(format!("{root_namespace}.Services"))
                .name_rule(strip(&["I"], &["Logic"], "Service"))
                .selection(MemberSelection::InterfaceMembers)
                .policy(ComparisonPolicy::SecurityAgnostic)
                .method_rule(
                    MethodNameRule::builder()
                        .async_suffix(AsyncSuffix::Strip)
                        .build(),
                )
                .body_style(BodyStyle::Delegate {
                    target: "_logic".to_string(),
                })
                .dependency_kind(ArtifactKind::Model)
                .default_imports(imports(&[
                    "System",
                    "System.Collections.Generic",
                    "System.Threading.Tasks",
                ]))
                .prune_orphans(true)
                .build(),
            ArtifactKind::Client => ArtifactProfile::builder()
                .kind(kind)
                .location(Location::folder(project, "Clients"))
                .namespace(format!("{root_namespace}.Clients"))
                .name_rule(strip(&["I"], &["Logic"], "Client"))
                .selection(MemberSelection::InterfaceMembers)
                .policy(ComparisonPolicy::SecurityAgnostic)
                .method_rule(
                    MethodNameRule::builder()
                        .async_suffix(AsyncSuffix::Ensure)
                        .build(),
                )
                .body_style(BodyStyle::Delegate {
                    target: "_channel".to_string(),
                })
                .dependency_kind(ArtifactKind::Model)
                .default_imports(imports(&[
                    "System",
                    "System.Collections.Generic",
                    "System.Threading.Tasks",
                ]))
                .prune_orphans(true)
                .build(),
        }
    }

    pub fn target_name(&self, source_name: &str) -> String {
        self.name_rule
            .format_name(source_name, self.anchor_prefix.as_deref())
    }
}

/// Per-invocation settings: where sources live, how each artifact kind is
/// derived, and which code blocks to use.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Where source types are looked up.
    pub source: Location,
    pub profiles: HashMap<ArtifactKind, ArtifactProfile>,
    pub namespaces: Vec<MappedNamespace>,
    /// `None` disables member marking and orphan pruning.
    pub marker: Option<MarkerAttribute>,
    pub ignored_interfaces: Vec<String>,
    pub blocks: BlockSettings,
    pub capabilities: CapabilitySettings,
    /// Refreshed conversions disable the previous function instead of
    /// overwriting it.
    pub preserve_replaced: bool,
}

impl SyncSettings {
    /// Settings with every preset profile targeting `target_project`.
    pub fn new(source: Location, target_project: &str, root_namespace: &str) -> Self {
        let profiles = ArtifactKind::iter()
            .map(|kind| (kind, ArtifactProfile::preset(kind, target_project, root_namespace)))
            .collect();
        Self {
            source,
            profiles,
            namespaces: Vec::new(),
            marker: Some(MarkerAttribute::default()),
            ignored_interfaces: DEFAULT_IGNORED_INTERFACES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blocks: BlockSettings::default(),
            capabilities: CapabilitySettings::default(),
            preserve_replaced: true,
        }
    }

    pub fn profile(&self, kind: ArtifactKind) -> Result<&ArtifactProfile> {
        self.profiles.get(&kind).ok_or_else(|| {
            CodesyncError::missing(InputKind::Profile, kind.to_string(), "no profile configured")
        })
    }

    pub fn profile_mut(&mut self, kind: ArtifactKind) -> Option<&mut ArtifactProfile> {
        self.profiles.get_mut(&kind)
    }

    pub fn with_profile(mut self, profile: ArtifactProfile) -> Self {
        self.profiles.insert(profile.kind, profile);
        self
    }

    pub fn set_closure_mode(&mut self, mode: ClosureMode) {
        for profile in self.profiles.values_mut() {
            profile.closure = mode;
        }
    }
}
