use crate::builders::BodyStyle;
use crate::builders::blocks::INDENT;
use crate::namespace::RenderScope;
use crate::sync::profile::ArtifactProfile;
use crate::types::{Import, Member, MemberKind, Parameter, TypeDefinition, TypeKind, TypeRef};

/// An empty artifact ready to be handed to `DocumentWriter::create_document`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    pub file_name: String,
    pub definition: TypeDefinition,
    pub text: String,
}

/// Builds the empty target for `source` under `profile`: namespace, default
/// imports, a documentation stub and, when the profile asks for it, the source
/// interface as an implemented interface. Delegating classes also get the
/// delegate field and a constructor that assigns it.
pub fn render_shell(profile: &ArtifactProfile, target_name: &str, source: &TypeDefinition) -> Shell {
    let mut definition = TypeDefinition::new(&profile.namespace, target_name, profile.target_kind);
    definition.documentation = Some(format!("Generated from {}.", source.full_name()));

    for namespace in &profile.default_imports {
        push_import(&mut definition, namespace);
    }
    if profile.implements_source && source.is_interface() {
        if !source.namespace.is_empty() {
            push_import(&mut definition, &source.namespace);
        }
        definition.inherited_interfaces.push(source.type_ref());
    }

    let mut delegate = None;
    if let BodyStyle::Delegate { target } = &profile.body_style
        && profile.target_kind == TypeKind::Class
    {
        if !source.namespace.is_empty() {
            push_import(&mut definition, &source.namespace);
        }
        let parameter = Parameter::new(delegate_parameter(target), source.type_ref());
        definition.members.push(
            Member::constructor(target_name, vec![parameter.clone()])
                .with_body(format!("{target} = {};", parameter.name)),
        );
        delegate = Some((target.as_str(), source.type_ref()));
    }

    let text = render_text(&definition, delegate);
    Shell {
        file_name: format!("{target_name}.cs"),
        definition,
        text,
    }
}

fn push_import(definition: &mut TypeDefinition, namespace: &str) {
    if !definition.imports_namespace(namespace) {
        definition.imports.push(Import::new(namespace));
    }
}

/// `_logic` becomes `logic`.
fn delegate_parameter(field: &str) -> String {
    match field.trim_start_matches('_') {
        "" => "inner".to_string(),
        name => name.to_string(),
    }
}

fn render_text(definition: &TypeDefinition, delegate: Option<(&str, TypeRef)>) -> String {
    let scope = RenderScope::new(&definition.namespace, &definition.imports);
    let mut lines: Vec<String> = definition
        .imports
        .iter()
        .map(|import| format!("using {};", import.namespace))
        .collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("namespace {};", definition.namespace));
    lines.push(String::new());

    if let Some(documentation) = &definition.documentation {
        lines.push("/// <summary>".to_string());
        lines.push(format!("/// {documentation}"));
        lines.push("/// </summary>".to_string());
    }

    let mut header = format!("{} {} {}", definition.visibility, definition.kind, definition.name);
    if !definition.inherited_interfaces.is_empty() {
        let interfaces: Vec<String> = definition
            .inherited_interfaces
            .iter()
            .map(|interface| scope.render(interface))
            .collect();
        header.push_str(" : ");
        header.push_str(&interfaces.join(", "));
    }
    lines.push(header);
    lines.push("{".to_string());
    if let Some((field, field_type)) = delegate {
        lines.push(format!("{INDENT}private readonly {} {field};", scope.render(&field_type)));
        lines.push(String::new());
        for member in &definition.members {
            let MemberKind::Constructor { parameters } = &member.kind else {
                continue;
            };
            let parameters: Vec<String> = parameters
                .iter()
                .map(|parameter| format!("{} {}", scope.render(&parameter.type_ref), parameter.name))
                .collect();
            lines.push(format!("{INDENT}{} {}({})", member.visibility, member.name, parameters.join(", ")));
            lines.push(format!("{INDENT}{{"));
            lines.extend(member.body.iter().map(|body| format!("{INDENT}{INDENT}{body}")));
            lines.push(format!("{INDENT}}}"));
            lines.push(String::new());
        }
    }
    lines.push(format!("{INDENT}// Generated members are appended below."));
    lines.push("}".to_string());

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
