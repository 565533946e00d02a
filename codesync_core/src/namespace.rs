use crate::types::{Import, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappedNamespace {
    pub source: String,
    pub destination: String,
}

impl MappedNamespace {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Maps source namespaces onto generated ones so emitted references point at
/// the generated siblings instead of back at the source domain.
///
/// Matching is by whole dotted segments and the longest source wins, so
/// `Acme.Data.Orders` maps through `Acme.Data` when no closer entry exists.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NamespaceMapper {
    mappings: Vec<MappedNamespace>,
}

impl NamespaceMapper {
    pub fn new(mappings: Vec<MappedNamespace>) -> Self {
        let mut mapper = Self::default();
        for mapping in mappings {
            mapper.add(mapping);
        }
        mapper
    }

    /// Adds a mapping; a later entry for the same source replaces the earlier one.
    pub fn add(&mut self, mapping: MappedNamespace) {
        if mapping.source == mapping.destination {
            return;
        }
        match self
            .mappings
            .iter_mut()
            .find(|existing| existing.source == mapping.source)
        {
            Some(existing) => existing.destination = mapping.destination,
            None => self.mappings.push(mapping),
        }
    }

    pub fn mappings(&self) -> &[MappedNamespace] {
        &self.mappings
    }

    pub fn map_namespace(&self, namespace: &str) -> String {
        let best = self
            .mappings
            .iter()
            .filter_map(|mapping| {
                segment_remainder(namespace, &mapping.source).map(|rest| (mapping, rest))
            })
            .max_by_key(|(mapping, _)| mapping.source.len());

        match best {
            Some((mapping, rest)) => {
                let mapped = format!("{}{rest}", mapping.destination);
                trace!(source = namespace, destination = %mapped, "Mapped namespace");
                mapped
            }
            None => namespace.to_string(),
        }
    }
}

/// `Some("")` for an exact match, `Some(".Rest")` for a dotted descendant.
fn segment_remainder<'a>(namespace: &'a str, source: &str) -> Option<&'a str> {
    let rest = namespace.strip_prefix(source)?;
    (rest.is_empty() || rest.starts_with('.')).then_some(rest)
}

/// Scope a type reference is rendered into: the artifact namespace plus its imports.
#[derive(Debug, Clone, Copy)]
pub struct RenderScope<'a> {
    pub namespace: &'a str,
    pub imports: &'a [Import],
}

impl<'a> RenderScope<'a> {
    pub fn new(namespace: &'a str, imports: &'a [Import]) -> Self {
        Self { namespace, imports }
    }

    /// True when a simple name from `namespace` resolves without qualification.
    pub fn sees(&self, namespace: &str) -> bool {
        segment_remainder(self.namespace, namespace).is_some()
            || self
                .imports
                .iter()
                .any(|import| import.alias.is_none() && import.namespace == namespace)
    }

    /// Renders with simple names where the scope sees the namespace and fully
    /// qualified names elsewhere.
    pub fn render(&self, type_ref: &TypeRef) -> String {
        let mut out = match &type_ref.namespace {
            Some(namespace) if !namespace.is_empty() && !self.sees(namespace) => {
                type_ref.full_name()
            }
            _ => type_ref.name.clone(),
        };
        type_ref.write_suffixes(&mut out, |argument| self.render(argument));
        out
    }

    /// Namespaces referenced by `types` that would need an import to be used
    /// by simple name, in sorted order.
    pub fn missing_imports<'t>(&self, types: impl IntoIterator<Item = &'t TypeRef>) -> Vec<String> {
        let mut missing = BTreeSet::new();
        for type_ref in types {
            for node in type_ref.walk() {
                if let Some(namespace) = &node.namespace
                    && !namespace.is_empty()
                    && !self.sees(namespace)
                {
                    missing.insert(namespace.clone());
                }
            }
        }
        missing.into_iter().collect()
    }
}
