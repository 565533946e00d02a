mod type_ref;

pub use crate::types::type_ref::{TypeRef, is_framework_namespace};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Struct,
    Enum,
}

/// Member and type visibility ("security").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    #[strum(serialize = "public")]
    Public,
    #[strum(serialize = "internal")]
    Internal,
    #[strum(serialize = "protected")]
    Protected,
    #[strum(serialize = "protected internal")]
    ProtectedInternal,
    #[strum(serialize = "private protected")]
    PrivateProtected,
    #[strum(serialize = "private")]
    Private,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_override: bool,
    #[serde(default)]
    pub is_async: bool,
}

impl Modifiers {
    pub fn static_() -> Self {
        Self {
            is_static: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Matches `Foo`, `FooAttribute` and namespace-qualified spellings of either.
    pub fn is_named(&self, name: &str) -> bool {
        let simple = self.name.rsplit('.').next().unwrap_or(&self.name);
        let simple = simple.strip_suffix("Attribute").unwrap_or(simple);
        let wanted = name.strip_suffix("Attribute").unwrap_or(name);
        simple == wanted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_ref: TypeRef,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            default_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemberKind {
    Property {
        type_ref: TypeRef,
        #[serde(default = "default_true")]
        has_getter: bool,
        #[serde(default = "default_true")]
        has_setter: bool,
    },
    Method {
        return_type: TypeRef,
        #[serde(default)]
        parameters: Vec<Parameter>,
        #[serde(default)]
        generic_parameters: Vec<String>,
    },
    Event {
        handler_type: TypeRef,
    },
    Constructor {
        #[serde(default)]
        parameters: Vec<Parameter>,
    },
}

fn default_true() -> bool {
    true
}

/// Tag used in signatures and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MemberTag {
    Property,
    Method,
    Event,
    Constructor,
}

/// A property, method, event or constructor of a [`TypeDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(flatten)]
    pub kind: MemberKind,
}

impl Member {
    fn with_kind(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            modifiers: Modifiers::default(),
            attributes: Vec::new(),
            documentation: None,
            body: None,
            kind,
        }
    }

    pub fn property(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self::with_kind(
            name,
            MemberKind::Property {
                type_ref,
                has_getter: true,
                has_setter: true,
            },
        )
    }

    pub fn method(name: impl Into<String>, return_type: TypeRef, parameters: Vec<Parameter>) -> Self {
        Self::with_kind(
            name,
            MemberKind::Method {
                return_type,
                parameters,
                generic_parameters: Vec::new(),
            },
        )
    }

    pub fn event(name: impl Into<String>, handler_type: TypeRef) -> Self {
        Self::with_kind(name, MemberKind::Event { handler_type })
    }

    pub fn constructor(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self::with_kind(name, MemberKind::Constructor { parameters })
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        if let MemberKind::Property { has_setter, .. } = &mut self.kind {
            *has_setter = false;
        }
        self
    }

    pub fn tag(&self) -> MemberTag {
        match self.kind {
            MemberKind::Property { .. } => MemberTag::Property,
            MemberKind::Method { .. } => MemberTag::Method,
            MemberKind::Event { .. } => MemberTag::Event,
            MemberKind::Constructor { .. } => MemberTag::Constructor,
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self.kind, MemberKind::Property { .. })
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, MemberKind::Method { .. })
    }

    /// Properties and events are addressed by simple name alone; methods overload.
    pub fn is_single_named(&self) -> bool {
        matches!(
            self.kind,
            MemberKind::Property { .. } | MemberKind::Event { .. }
        )
    }

    pub fn is_settable_property(&self) -> bool {
        matches!(
            self.kind,
            MemberKind::Property {
                has_setter: true,
                ..
            }
        )
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attribute| attribute.is_named(name))
    }

    /// The property, return or handler type.
    pub fn value_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            MemberKind::Property { type_ref, .. } => Some(type_ref),
            MemberKind::Method { return_type, .. } => Some(return_type),
            MemberKind::Event { handler_type } => Some(handler_type),
            MemberKind::Constructor { .. } => None,
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        match &self.kind {
            MemberKind::Method { parameters, .. } | MemberKind::Constructor { parameters } => {
                parameters
            }
            _ => &[],
        }
    }

    /// Every type referenced by the member signature.
    pub fn signature_types(&self) -> Vec<&TypeRef> {
        let mut types: Vec<&TypeRef> = self.value_type().into_iter().collect();
        types.extend(self.parameters().iter().map(|parameter| &parameter.type_ref));
        types
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    pub namespace: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Import {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            alias: None,
        }
    }
}

/// Parsed view of a class or interface, as produced by the host.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub generic_parameters: Vec<String>,
    #[serde(default)]
    pub base_type: Option<TypeRef>,
    #[serde(default)]
    pub inherited_interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Members preserved as commented-out regions.
    #[serde(default)]
    pub disabled_members: Vec<Member>,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl TypeDefinition {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Class)
    }

    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Interface)
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.inherited_interfaces.push(interface);
        self
    }

    pub fn with_import(mut self, namespace: impl Into<String>) -> Self {
        self.imports.push(Import::new(namespace));
        self
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::qualified(self.namespace.clone(), self.name.clone())
    }

    pub fn imports_namespace(&self, namespace: &str) -> bool {
        self.imports
            .iter()
            .any(|import| import.alias.is_none() && import.namespace == namespace)
    }

    /// Public instance properties with a getter.
    pub fn public_properties(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|member| {
            member.visibility == Visibility::Public
                && !member.modifiers.is_static
                && matches!(
                    member.kind,
                    MemberKind::Property {
                        has_getter: true,
                        ..
                    }
                )
        })
    }

    /// Members visible through the type's public surface; interface members are
    /// implicitly public.
    pub fn public_members(&self) -> impl Iterator<Item = &Member> {
        let interface = self.is_interface();
        self.members.iter().filter(move |member| {
            !matches!(member.kind, MemberKind::Constructor { .. })
                && !member.modifiers.is_static
                && (interface || member.visibility == Visibility::Public)
        })
    }

    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name == name)
    }
}
