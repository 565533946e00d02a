//! Member Builders
//!
//! A builder turns one projected member into emittable member text for a
//! target artifact. Builders are tried in order and the first one whose
//! [`MemberBuilder::handles`] matches wins. Before emitting, builders pull the
//! namespaces referenced by the member signature (and by the active code
//! blocks) into the target through [`DocumentWriter::add_import`].

pub mod blocks;
mod event;
mod method;
mod property;

use async_trait::async_trait;
use bon::Builder;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{CodesyncError, Result};
use crate::host::{Document, DocumentWriter};
use crate::namespace::RenderScope;
use crate::types::{Attribute, Import, Member, Parameter, TypeDefinition, TypeKind, TypeRef};

pub use blocks::{
    BlockSettings, BoundsCheckBlock, BoundsCheckChoice, BoundsCheckStrategy, CapabilitySettings,
    CatchBlock, CodeBlocks, ErrorHandlingBlock, ErrorHandlingChoice, ErrorHandlingStrategy,
    LoggerBlock, LoggingChoice, LoggingStrategy, TryBlock, select_code_blocks,
};
pub use event::EventBuilder;
pub use method::MethodBuilder;
pub use property::PropertyBuilder;

/// How class targets implement generated methods.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyStyle {
    #[default]
    NotImplemented,
    /// Forward to the member of the same source name on `target`.
    Delegate { target: String },
}

/// Attribute stamped on every generated member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerAttribute {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl Default for MarkerAttribute {
    fn default() -> Self {
        Self {
            name: "GeneratedCode".to_string(),
            namespace: Some("System.CodeDom.Compiler".to_string()),
            arguments: vec![
                "\"codesync\"".to_string(),
                format!("\"{}\"", env!("CARGO_PKG_VERSION")),
            ],
        }
    }
}

impl MarkerAttribute {
    pub fn to_attribute(&self) -> Attribute {
        Attribute::new(self.name.clone()).with_arguments(self.arguments.clone())
    }
}

#[derive(Debug, Default, Clone, Builder)]
pub struct BuildOptions {
    /// Interface targets get signatures only.
    #[builder(default)]
    pub target_kind: TypeKind,
    #[builder(default)]
    pub body_style: BodyStyle,
    pub marker: Option<MarkerAttribute>,
}

impl BuildOptions {
    pub fn signatures_only(&self) -> bool {
        self.target_kind == TypeKind::Interface
    }
}

/// The member to emit, in target shape, next to the source member it came from.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub member: &'a Member,
    pub source: &'a Member,
}

/// Namespace and imports of the target at the time a member is rendered.
#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    pub namespace: String,
    pub imports: Vec<Import>,
}

impl ScopeSnapshot {
    pub fn render(&self, type_ref: &TypeRef) -> String {
        RenderScope::new(&self.namespace, &self.imports).render(type_ref)
    }

    pub fn render_parameters(&self, parameters: &[Parameter]) -> String {
        parameters
            .iter()
            .map(|parameter| {
                let mut text = format!("{} {}", self.render(&parameter.type_ref), parameter.name);
                if let Some(default) = &parameter.default_value {
                    text.push_str(" = ");
                    text.push_str(default);
                }
                text
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The target artifact a builder emits into.
pub struct BuildContext<'a> {
    writer: &'a dyn DocumentWriter,
    document: &'a Document,
    artifact: String,
    namespace: String,
    imports: Mutex<Vec<Import>>,
    pub blocks: &'a CodeBlocks,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        writer: &'a dyn DocumentWriter,
        document: &'a Document,
        target: &TypeDefinition,
        blocks: &'a CodeBlocks,
    ) -> Self {
        Self {
            writer,
            document,
            artifact: target.name.clone(),
            namespace: target.namespace.clone(),
            imports: Mutex::new(target.imports.clone()),
            blocks,
        }
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub async fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            namespace: self.namespace.clone(),
            imports: self.imports.lock().await.clone(),
        }
    }

    /// Adds each namespace the target cannot yet see.
    pub async fn ensure_imports<I>(&self, namespaces: I) -> Result<usize>
    where
        I: IntoIterator<Item = String> + Send,
        I::IntoIter: Send,
    {
        let mut imports = self.imports.lock().await;
        let mut added = 0;
        for namespace in namespaces {
            if namespace.is_empty() || RenderScope::new(&self.namespace, &imports[..]).sees(&namespace) {
                continue;
            }
            self.writer
                .add_import(self.document, &namespace, None)
                .await
                .map_err(|e| CodesyncError::host("add_import", &self.artifact, e))?;
            trace!(artifact = %self.artifact, namespace = %namespace, "Added import");
            imports.push(Import::new(namespace));
            added += 1;
        }
        Ok(added)
    }

    /// Import closure for a member: its signature types, its attributes and the
    /// active code blocks.
    pub async fn import_member(&self, member: &Member, options: &BuildOptions, with_blocks: bool) -> Result<()> {
        let snapshot = self.snapshot().await;
        let scope = RenderScope::new(&snapshot.namespace, &snapshot.imports);
        let mut namespaces = scope.missing_imports(member.signature_types());
        if let Some(marker) = &options.marker
            && member.has_attribute(&marker.name)
            && let Some(namespace) = &marker.namespace
        {
            namespaces.push(namespace.clone());
        }
        if with_blocks {
            namespaces.extend(self.blocks.imports());
        }
        self.ensure_imports(namespaces).await?;
        Ok(())
    }
}

#[async_trait]
pub trait MemberBuilder: Send + Sync {
    fn handles(&self, member: &Member) -> bool;

    /// Member text at `indent_level`, or `None` when nothing should be emitted.
    async fn build(
        &self,
        request: &BuildRequest<'_>,
        ctx: &BuildContext<'_>,
        indent_level: usize,
        options: &BuildOptions,
    ) -> Result<Option<String>>;
}

/// Ordered builders; the first that handles a member wins.
pub struct BuilderSet {
    builders: Vec<Box<dyn MemberBuilder>>,
}

impl Default for BuilderSet {
    fn default() -> Self {
        Self {
            builders: vec![
                Box::new(PropertyBuilder),
                Box::new(MethodBuilder),
                Box::new(EventBuilder),
            ],
        }
    }
}

impl BuilderSet {
    pub fn empty() -> Self {
        Self {
            builders: Vec::new(),
        }
    }

    /// Registers a builder ahead of the ones already present.
    pub fn register_first(&mut self, builder: Box<dyn MemberBuilder>) {
        self.builders.insert(0, builder);
    }

    pub fn push(&mut self, builder: Box<dyn MemberBuilder>) {
        self.builders.push(builder);
    }

    pub async fn build(
        &self,
        request: &BuildRequest<'_>,
        ctx: &BuildContext<'_>,
        indent_level: usize,
        options: &BuildOptions,
    ) -> Result<Option<String>> {
        match self.builders.iter().find(|builder| builder.handles(request.member)) {
            Some(builder) => builder.build(request, ctx, indent_level, options).await,
            None => {
                trace!(member = %request.member.name, "No builder handles member");
                Ok(None)
            }
        }
    }
}

pub(crate) fn documentation_lines(documentation: Option<&str>, pad: &str) -> Vec<String> {
    let Some(documentation) = documentation.map(str::trim).filter(|d| !d.is_empty()) else {
        return Vec::new();
    };
    let mut lines = vec![format!("{pad}/// <summary>")];
    lines.extend(documentation.lines().map(|line| format!("{pad}/// {}", line.trim())));
    lines.push(format!("{pad}/// </summary>"));
    lines
}

pub(crate) fn attribute_lines(attributes: &[Attribute], pad: &str) -> Vec<String> {
    attributes
        .iter()
        .map(|attribute| {
            if attribute.arguments.is_empty() {
                format!("{pad}[{}]", attribute.name)
            } else {
                format!("{pad}[{}({})]", attribute.name, attribute.arguments.join(", "))
            }
        })
        .collect()
}

/// `public static ` style prefix; empty for interface members.
pub(crate) fn modifier_prefix(member: &Member, options: &BuildOptions, is_async: bool) -> String {
    if options.signatures_only() {
        return String::new();
    }
    let mut prefix = format!("{} ", member.visibility);
    let modifiers = member.modifiers;
    for (set, keyword) in [
        (modifiers.is_static, "static "),
        (modifiers.is_abstract, "abstract "),
        (modifiers.is_virtual, "virtual "),
        (modifiers.is_override, "override "),
        (is_async, "async "),
    ] {
        if set {
            prefix.push_str(keyword);
        }
    }
    prefix
}
