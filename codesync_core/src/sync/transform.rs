//! Entity ⇄ model conversion functions.
//!
//! `ToModel` and `FromModel` are generated as static methods on the entity.
//! A missing function is appended and a matching one is left alone. A function
//! whose body no longer matches is commented out and the new one appended, so
//! hand edits stay recoverable; with `preserve_replaced` off it is replaced in
//! place instead.

use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use strum::Display;
use tracing::{debug, info, trace};

use crate::builders::blocks::indent;
use crate::builders::{
    BuildContext, BuildOptions, CodeBlocks, attribute_lines, documentation_lines, modifier_prefix,
};
use crate::error::{CodesyncError, InputKind, Result};
use crate::host::{Document, DocumentWriter};
use crate::namespace::RenderScope;
use crate::sync::closure::is_synchronizable;
use crate::sync::profile::{ArtifactKind, ArtifactProfile};
use crate::sync::SyncSession;
use crate::types::{Import, Member, MemberKind, Modifiers, Parameter, TypeDefinition, TypeKind, TypeRef};

/// Value a nullable entity field collapses to in a non-nullable model field.
/// `null` and the default cannot be told apart on the way back.
static DEFAULT_VALUES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bool", "false"),
        ("byte", "0"),
        ("sbyte", "0"),
        ("short", "0"),
        ("ushort", "0"),
        ("int", "0"),
        ("uint", "0"),
        ("long", "0"),
        ("ulong", "0"),
        ("float", "0f"),
        ("double", "0d"),
        ("decimal", "0m"),
        ("char", "'\\0'"),
        ("Guid", "Guid.Empty"),
        ("DateTime", "DateTime.MinValue"),
        ("DateTimeOffset", "DateTimeOffset.MinValue"),
        ("DateOnly", "DateOnly.MinValue"),
        ("TimeOnly", "TimeOnly.MinValue"),
        ("TimeSpan", "TimeSpan.Zero"),
    ])
});

const LINQ_NAMESPACE: &str = "System.Linq";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberChange {
    Added,
    Replaced,
    Unchanged,
}

/// A property present on both sides whose types cannot be converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProperty {
    pub name: String,
    pub entity_type: String,
    pub model_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformOutcome {
    pub entity: String,
    pub model: String,
    pub to_model: MemberChange,
    pub from_model: MemberChange,
    pub skipped: Vec<SkippedProperty>,
}

impl TransformOutcome {
    pub fn has_changes(&self) -> bool {
        self.to_model != MemberChange::Unchanged || self.from_model != MemberChange::Unchanged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToModel,
    FromModel,
}

impl Direction {
    fn function(self) -> &'static str {
        match self {
            Direction::ToModel => "ToModel",
            Direction::FromModel => "FromModel",
        }
    }

    fn parameter(self) -> &'static str {
        match self {
            Direction::ToModel => "entity",
            Direction::FromModel => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mapping {
    Direct,
    /// `value ?? default`
    OrDefault { default: &'static str },
    /// `value != default ? value : (T?)null`
    NullUnlessDefault { default: &'static str, target: TypeRef },
    /// Per-element conversion through the nested entity.
    Collection {
        converter: TypeRef,
        item: String,
        collect: &'static str,
    },
    /// Null-guarded conversion through the nested entity.
    Nested { converter: TypeRef },
}

#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    property: String,
    mapping: Mapping,
}

/// Decides how each shared property converts between entity and model.
struct Pairing<'a> {
    model_profile: &'a ArtifactProfile,
    domain: &'a BTreeMap<String, TypeDefinition>,
}

impl Pairing<'_> {
    /// Model name of a nested entity type, when the type is one.
    fn nested_model_name(&self, entity_type: &TypeRef) -> Option<String> {
        let definition = self.domain.get(&entity_type.name)?;
        (is_synchronizable(definition) && entity_type.array_rank == 0)
            .then(|| self.model_profile.target_name(&entity_type.name))
    }

    fn mapping(&self, direction: Direction, from: &TypeRef, to: &TypeRef) -> Option<Mapping> {
        if from.canonical() == to.canonical() {
            return Some(Mapping::Direct);
        }

        match direction {
            Direction::ToModel if from.nullable && !to.nullable => {
                if from.without_nullable().canonical() == to.canonical() {
                    return default_value(to).map(|default| Mapping::OrDefault { default });
                }
            }
            Direction::FromModel if to.nullable && !from.nullable => {
                if to.without_nullable().canonical() == from.canonical() {
                    return default_value(from).map(|default| Mapping::NullUnlessDefault {
                        default,
                        target: to.clone(),
                    });
                }
            }
            _ => {}
        }

        let (entity_type, model_type) = match direction {
            Direction::ToModel => (from, to),
            Direction::FromModel => (to, from),
        };

        if let (Some(entity_element), Some(model_element)) =
            (entity_type.collection_element(), model_type.collection_element())
        {
            let expected = self.nested_model_name(&entity_element)?;
            if model_element.name != expected || model_element.array_rank != 0 {
                return None;
            }
            let source_element = match direction {
                Direction::ToModel => &entity_element,
                Direction::FromModel => &model_element,
            };
            let collect = if to.array_rank > 0 {
                "ToArray"
            } else if matches!(to.name.as_str(), "HashSet" | "ISet") {
                "ToHashSet"
            } else {
                "ToList"
            };
            return Some(Mapping::Collection {
                converter: entity_element.without_nullable(),
                item: source_element.name.to_case(Case::Camel),
                collect,
            });
        }

        let expected = self.nested_model_name(entity_type)?;
        (model_type.name == expected && model_type.array_rank == 0 && entity_type.type_arguments.is_empty())
            .then(|| Mapping::Nested {
                converter: entity_type.without_nullable(),
            })
    }

    /// Assignments for one direction, ordered by property name, plus the
    /// properties that could not be paired.
    fn assignments(
        &self,
        direction: Direction,
        entity: &TypeDefinition,
        model: &TypeDefinition,
    ) -> (Vec<Assignment>, Vec<SkippedProperty>) {
        let (source, target) = match direction {
            Direction::ToModel => (entity, model),
            Direction::FromModel => (model, entity),
        };
        let readable: HashMap<&str, &TypeRef> = source
            .public_properties()
            .filter_map(|member| member.value_type().map(|ty| (member.name.as_str(), ty)))
            .collect();

        let mut settable: Vec<&Member> = target
            .public_properties()
            .filter(|member| member.is_settable_property())
            .collect();
        settable.sort_by(|a, b| a.name.cmp(&b.name));

        let mut assignments = Vec::new();
        let mut skipped = Vec::new();
        for member in settable {
            let (Some(to), Some(from)) = (member.value_type(), readable.get(member.name.as_str())) else {
                continue;
            };
            match self.mapping(direction, from, to) {
                Some(mapping) => assignments.push(Assignment {
                    property: member.name.clone(),
                    mapping,
                }),
                None => {
                    let (entity_type, model_type) = match direction {
                        Direction::ToModel => (*from, to),
                        Direction::FromModel => (to, *from),
                    };
                    trace!(property = %member.name, "Incompatible property pair");
                    skipped.push(SkippedProperty {
                        name: member.name.clone(),
                        entity_type: entity_type.canonical(),
                        model_type: model_type.canonical(),
                    });
                }
            }
        }
        (assignments, skipped)
    }
}

fn default_value(type_ref: &TypeRef) -> Option<&'static str> {
    if type_ref.array_rank > 0 || !type_ref.type_arguments.is_empty() {
        return None;
    }
    DEFAULT_VALUES.get(type_ref.without_nullable().canonical().as_str()).copied()
}

fn mapping_types(assignments: &[Assignment]) -> Vec<&TypeRef> {
    assignments
        .iter()
        .filter_map(|assignment| match &assignment.mapping {
            Mapping::NullUnlessDefault { target, .. } => Some(target),
            Mapping::Collection { converter, .. } | Mapping::Nested { converter } => Some(converter),
            Mapping::Direct | Mapping::OrDefault { .. } => None,
        })
        .collect()
}

fn render_expression(direction: Direction, assignment: &Assignment, scope: &RenderScope<'_>) -> String {
    let value = format!("{}.{}", direction.parameter(), assignment.property);
    let function = direction.function();
    match &assignment.mapping {
        Mapping::Direct => value,
        Mapping::OrDefault { default } => format!("{value} ?? {default}"),
        Mapping::NullUnlessDefault { default, target } => {
            format!("{value} != {default} ? {value} : ({})null", scope.render(target))
        }
        Mapping::Collection {
            converter,
            item,
            collect,
        } => format!(
            "{value}?.Select({item} => {}.{function}({item})).{collect}()",
            scope.render(converter)
        ),
        Mapping::Nested { converter } => {
            format!("{value} != null ? {}.{function}({value}) : null", scope.render(converter))
        }
    }
}

fn render_body(direction: Direction, result: &TypeRef, assignments: &[Assignment], scope: &RenderScope<'_>) -> String {
    let mut lines = vec![format!("return new {}", scope.render(result)), "{".to_string()];
    lines.extend(assignments.iter().map(|assignment| {
        format!(
            "{}{} = {},",
            indent(1),
            assignment.property,
            render_expression(direction, assignment, scope)
        )
    }));
    lines.push("};".to_string());
    lines.join("\n")
}

fn normalize(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render_function(member: &Member, scope: &RenderScope<'_>, options: &BuildOptions) -> String {
    let pad = indent(1);
    let MemberKind::Method {
        return_type,
        parameters,
        ..
    } = &member.kind
    else {
        return String::new();
    };
    let parameters = parameters
        .iter()
        .map(|parameter| format!("{} {}", scope.render(&parameter.type_ref), parameter.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = documentation_lines(member.documentation.as_deref(), &pad);
    lines.extend(attribute_lines(&member.attributes, &pad));
    lines.push(format!(
        "{pad}{}{} {}({parameters})",
        modifier_prefix(member, options, false),
        scope.render(return_type),
        member.name
    ));
    lines.push(format!("{pad}{{"));
    let body_pad = indent(2);
    for line in member.body.as_deref().unwrap_or_default().lines() {
        lines.push(format!("{body_pad}{line}"));
    }
    lines.push(format!("{pad}}}"));
    lines.join("\n")
}

/// One side of the pair, shared by both refresh passes.
struct TransformTarget<'a> {
    writer: &'a dyn DocumentWriter,
    ctx: &'a BuildContext<'a>,
    document: &'a Document,
    entity: &'a TypeDefinition,
    model: &'a TypeDefinition,
    options: &'a BuildOptions,
    preserve_replaced: bool,
}

impl TransformTarget<'_> {
    async fn refresh(&self, direction: Direction, pairing: &Pairing<'_>) -> Result<(MemberChange, Vec<SkippedProperty>)> {
        let (result, parameter) = match direction {
            Direction::ToModel => (self.model.type_ref(), self.entity.type_ref()),
            Direction::FromModel => (self.entity.type_ref(), self.model.type_ref()),
        };
        let function = direction.function();
        let (assignments, skipped) = pairing.assignments(direction, self.entity, self.model);

        let mut member = Member::method(
            function,
            result.clone(),
            vec![Parameter::new(direction.parameter(), parameter)],
        )
        .with_modifiers(Modifiers::static_())
        .with_documentation(format!(
            "Converts {} into {}.",
            match direction {
                Direction::ToModel => &self.entity.name,
                Direction::FromModel => &self.model.name,
            },
            match direction {
                Direction::ToModel => &self.model.name,
                Direction::FromModel => &self.entity.name,
            }
        ));
        if let Some(marker) = &self.options.marker {
            member = member.with_attribute(marker.to_attribute());
        }

        // Render against the imports the function will need, so the body is
        // identical before and after they are added.
        let snapshot = self.ctx.snapshot().await;
        let current = RenderScope::new(&snapshot.namespace, &snapshot.imports);
        let mut types = member.signature_types();
        types.extend(mapping_types(&assignments));
        let mut needed = current.missing_imports(types);
        if assignments
            .iter()
            .any(|assignment| matches!(assignment.mapping, Mapping::Collection { .. }))
            && !current.sees(LINQ_NAMESPACE)
        {
            needed.push(LINQ_NAMESPACE.to_string());
        }
        if let Some(marker) = &self.options.marker
            && let Some(namespace) = &marker.namespace
            && !current.sees(namespace)
        {
            needed.push(namespace.clone());
        }
        let mut imports = snapshot.imports.clone();
        imports.extend(needed.iter().map(Import::new));
        let scope = RenderScope::new(&snapshot.namespace, &imports);

        let member = member.with_body(render_body(direction, &result, &assignments, &scope));
        let existing = self.entity.members.iter().find(|candidate| {
            candidate.name == function && candidate.modifiers.is_static && candidate.parameters().len() == 1
        });
        if let Some(existing) = existing
            && normalize(existing.body.as_deref().unwrap_or_default())
                == normalize(member.body.as_deref().unwrap_or_default())
        {
            trace!(entity = %self.entity.name, function, "Conversion up to date");
            return Ok((MemberChange::Unchanged, skipped));
        }

        self.ctx.ensure_imports(needed).await?;
        let text = render_function(&member, &scope, self.options);
        let change = match existing {
            Some(existing) if self.preserve_replaced => {
                self.writer
                    .disable_member(self.document, existing)
                    .await
                    .map_err(|e| CodesyncError::host_member("disable_member", &self.entity.name, function, e))?;
                self.writer
                    .append_member(self.document, &member, &text)
                    .await
                    .map_err(|e| CodesyncError::host_member("append_member", &self.entity.name, function, e))?;
                MemberChange::Replaced
            }
            Some(existing) => {
                self.writer
                    .replace_member(self.document, existing, &member, &text)
                    .await
                    .map_err(|e| CodesyncError::host_member("replace_member", &self.entity.name, function, e))?;
                MemberChange::Replaced
            }
            None => {
                self.writer
                    .append_member(self.document, &member, &text)
                    .await
                    .map_err(|e| CodesyncError::host_member("append_member", &self.entity.name, function, e))?;
                MemberChange::Added
            }
        };
        debug!(entity = %self.entity.name, function, change = %change, "Refreshed conversion");
        Ok((change, skipped))
    }
}

impl SyncSession<'_> {
    /// Generates or refreshes `ToModel` / `FromModel` on the entity so it
    /// converts to and from the given model.
    pub async fn sync_transform(&mut self, entity_name: &str, model_name: &str) -> Result<TransformOutcome> {
        let host = self.host;
        let located = self.locate_source(entity_name.trim()).await?;
        let entity = host
            .types
            .load(&located.document)
            .await
            .map_err(|e| CodesyncError::structural_load(&located.definition.name, located.document.path.clone(), e))?;

        let model_profile = self.settings.profile(ArtifactKind::Model)?.clone();
        let model = host
            .types
            .find_by_name(Some(TypeKind::Class), model_name.trim(), &model_profile.location)
            .await
            .map_err(|e| CodesyncError::host("find_by_name", model_name, e))?
            .ok_or_else(|| {
                CodesyncError::missing(
                    InputKind::Artifact,
                    model_name,
                    format!("not found in {}", model_profile.location),
                )
            })?
            .definition;
        info!(entity = %entity.name, model = %model.name, "Synchronizing conversions");

        let properties: Vec<Member> = entity.public_properties().cloned().collect();
        let domain = self
            .resolve_domain_types(&properties, &entity.generic_parameters)
            .await?;
        let pairing = Pairing {
            model_profile: &model_profile,
            domain: &domain,
        };

        let blocks = CodeBlocks::default();
        let ctx = BuildContext::new(host.writer, &located.document, &entity, &blocks);
        let options = BuildOptions::builder()
            .maybe_marker(self.settings.marker.clone())
            .build();
        let target = TransformTarget {
            writer: host.writer,
            ctx: &ctx,
            document: &located.document,
            entity: &entity,
            model: &model,
            options: &options,
            preserve_replaced: self.settings.preserve_replaced,
        };

        let (to_model, mut skipped) = target.refresh(Direction::ToModel, &pairing).await?;
        let (from_model, skipped_back) = target.refresh(Direction::FromModel, &pairing).await?;
        for property in skipped_back {
            if !skipped.iter().any(|existing| existing.name == property.name) {
                skipped.push(property);
            }
        }
        skipped.sort_by(|a, b| a.name.cmp(&b.name));

        let outcome = TransformOutcome {
            entity: entity.name.clone(),
            model: model.name.clone(),
            to_model,
            from_model,
            skipped,
        };
        info!(
            entity = %outcome.entity,
            to_model = %outcome.to_model,
            from_model = %outcome.from_model,
            skipped = outcome.skipped.len(),
            "Conversions synchronized"
        );
        self.report.record_transform(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn domain() -> BTreeMap<String, TypeDefinition> {
        [TypeDefinition::class("Acme.Data", "DbLineEntity")]
            .into_iter()
            .map(|definition| (definition.name.clone(), definition))
            .collect()
    }

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    #[test]
    fn test_mappings() {
        let model = ArtifactProfile::preset(ArtifactKind::Model, "Acme.App", "Acme.App");
        let domain = domain();
        let pairing = Pairing {
            model_profile: &model,
            domain: &domain,
        };

        assert_eq!(pairing.mapping(Direction::ToModel, &ty("Int32"), &ty("int")), Some(Mapping::Direct));
        assert_eq!(
            pairing.mapping(Direction::ToModel, &ty("int?"), &ty("int")),
            Some(Mapping::OrDefault { default: "0" })
        );
        assert_eq!(
            pairing.mapping(Direction::FromModel, &ty("Guid"), &ty("Guid?")),
            Some(Mapping::NullUnlessDefault {
                default: "Guid.Empty",
                target: ty("Guid?"),
            })
        );
        assert_eq!(
            pairing.mapping(Direction::ToModel, &ty("List<DbLineEntity>"), &ty("List<LineModel>")),
            Some(Mapping::Collection {
                converter: ty("DbLineEntity"),
                item: "dbLineEntity".to_string(),
                collect: "ToList",
            })
        );
        assert_eq!(
            pairing.mapping(Direction::FromModel, &ty("LineModel[]"), &ty("ICollection<DbLineEntity>")),
            Some(Mapping::Collection {
                converter: ty("DbLineEntity"),
                item: "lineModel".to_string(),
                collect: "ToList",
            })
        );
        assert_eq!(
            pairing.mapping(Direction::ToModel, &ty("DbLineEntity?"), &ty("LineModel")),
            Some(Mapping::Nested {
                converter: ty("DbLineEntity"),
            })
        );
        assert_eq!(pairing.mapping(Direction::ToModel, &ty("string"), &ty("int")), None);
        assert_eq!(pairing.mapping(Direction::ToModel, &ty("Uri?"), &ty("Uri")), None);
    }

    #[test]
    fn test_render_body() {
        let assignments = vec![
            Assignment {
                property: "Id".to_string(),
                mapping: Mapping::Direct,
            },
            Assignment {
                property: "Lines".to_string(),
                mapping: Mapping::Collection {
                    converter: ty("DbLineEntity"),
                    item: "lineModel".to_string(),
                    collect: "ToList",
                },
            },
            Assignment {
                property: "ShippedOn".to_string(),
                mapping: Mapping::NullUnlessDefault {
                    default: "DateTime.MinValue",
                    target: ty("DateTime?"),
                },
            },
        ];
        let imports = [Import::new("Acme.App.Models")];
        let scope = RenderScope::new("Acme.Data", &imports);
        assert_eq!(
            render_body(Direction::FromModel, &ty("Acme.Data.DbOrderEntity"), &assignments, &scope),
            [
                "return new DbOrderEntity",
                "{",
                "    Id = model.Id,",
                "    Lines = model.Lines?.Select(lineModel => DbLineEntity.FromModel(lineModel)).ToList(),",
                "    ShippedOn = model.ShippedOn != DateTime.MinValue ? model.ShippedOn : (DateTime?)null,",
                "};",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_assignments_skip_incompatible_pairs() {
        let model_profile = ArtifactProfile::preset(ArtifactKind::Model, "Acme.App", "Acme.App");
        let domain = domain();
        let pairing = Pairing {
            model_profile: &model_profile,
            domain: &domain,
        };
        let entity = TypeDefinition::class("Acme.Data", "DbOrderEntity")
            .with_member(Member::property("Total", ty("decimal?")))
            .with_member(Member::property("Status", ty("OrderStatus")))
            .with_member(Member::property("Internal", ty("string")));
        let model = TypeDefinition::class("Acme.App.Models", "OrderModel")
            .with_member(Member::property("Status", ty("string")))
            .with_member(Member::property("Total", ty("decimal")))
            .with_member(Member::property("Computed", ty("string")).read_only());

        let (assignments, skipped) = pairing.assignments(Direction::ToModel, &entity, &model);
        assert_eq!(
            assignments,
            vec![Assignment {
                property: "Total".to_string(),
                mapping: Mapping::OrDefault { default: "0m" },
            }]
        );
        assert_eq!(
            skipped,
            vec![SkippedProperty {
                name: "Status".to_string(),
                entity_type: "OrderStatus".to_string(),
                model_type: "string".to_string(),
            }]
        );
    }

    #[test]
    fn test_normalize_ignores_layout() {
        assert_eq!(
            normalize("return new X\n{\n    Id = entity.Id,\n};"),
            normalize("return new X {   Id = entity.Id, };")
        );
    }
}
