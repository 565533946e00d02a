use std::collections::BTreeMap;

use crate::builders::MarkerAttribute;
use crate::namespace::NamespaceMapper;
use crate::sync::closure::is_synchronizable;
use crate::sync::profile::{ArtifactProfile, MemberSelection, NullablePolicy};
use crate::types::{MemberKind, Member, Modifiers, TypeDefinition, TypeRef, Visibility};

/// Turns source members into the shape they take inside one target artifact.
///
/// Hashing and emission both work on the projected form, so a target that
/// already holds every projected member diffs to an empty delta.
pub struct Projection<'a> {
    pub profile: &'a ArtifactProfile,
    /// Profile of the artifacts referenced domain types are renamed to.
    pub dependency: Option<&'a ArtifactProfile>,
    pub marker: Option<&'a MarkerAttribute>,
    pub mapper: &'a NamespaceMapper,
    /// Source-domain types by simple name.
    pub domain: &'a BTreeMap<String, TypeDefinition>,
}

impl Projection<'_> {
    pub fn project(&self, source: &Member) -> Member {
        let mut member = source.clone();
        member.visibility = Visibility::Public;
        member.modifiers = Modifiers::default();
        member.body = None;
        member.attributes = self
            .marker
            .map(|marker| vec![marker.to_attribute()])
            .unwrap_or_default();

        match &mut member.kind {
            MemberKind::Property {
                type_ref,
                has_getter,
                has_setter,
            } => {
                let mut projected = self.project_type(type_ref);
                if self.profile.nullable == NullablePolicy::StripValueTypes
                    && projected.nullable
                    && projected.is_value_type()
                {
                    projected.nullable = false;
                }
                *type_ref = projected;
                if self.profile.selection == MemberSelection::Properties {
                    *has_getter = true;
                    *has_setter = true;
                }
            }
            MemberKind::Method {
                return_type,
                parameters,
                ..
            } => {
                member.name = self
                    .profile
                    .method_rule
                    .format(&member.name, return_type.is_awaitable());
                *return_type = self.project_type(return_type);
                for parameter in parameters.iter_mut() {
                    parameter.type_ref = self.project_type(&parameter.type_ref);
                }
            }
            MemberKind::Event { handler_type } => {
                *handler_type = self.project_type(handler_type);
            }
            MemberKind::Constructor { parameters } => {
                for parameter in parameters.iter_mut() {
                    parameter.type_ref = self.project_type(&parameter.type_ref);
                }
            }
        }
        member
    }

    /// Domain types become their dependency artifacts; every other qualified
    /// name goes through the namespace mapper.
    pub fn project_type(&self, type_ref: &TypeRef) -> TypeRef {
        type_ref.map_names(&mut |node| {
            if let Some(definition) = self.domain.get(&node.name)
                && node
                    .namespace
                    .as_deref()
                    .is_none_or(|namespace| namespace == definition.namespace)
            {
                return Some(match self.dependency {
                    Some(dependency) if is_synchronizable(definition) => (
                        Some(dependency.namespace.clone()),
                        dependency.target_name(&node.name),
                    ),
                    _ => (
                        Some(self.mapper.map_namespace(&definition.namespace)),
                        node.name.clone(),
                    ),
                });
            }
            node.namespace
                .as_deref()
                .map(|namespace| (Some(self.mapper.map_namespace(namespace)), node.name.clone()))
        })
    }
}
