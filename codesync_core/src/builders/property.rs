use async_trait::async_trait;

use crate::builders::{
    BuildContext, BuildOptions, BuildRequest, MemberBuilder, attribute_lines, documentation_lines,
    modifier_prefix,
};
use crate::builders::blocks::indent;
use crate::error::Result;
use crate::types::{Member, MemberKind};

/// Auto-properties: `public decimal Total { get; set; }`.
pub struct PropertyBuilder;

#[async_trait]
impl MemberBuilder for PropertyBuilder {
    fn handles(&self, member: &Member) -> bool {
        member.is_property()
    }

    async fn build(
        &self,
        request: &BuildRequest<'_>,
        ctx: &BuildContext<'_>,
        indent_level: usize,
        options: &BuildOptions,
    ) -> Result<Option<String>> {
        let member = request.member;
        let MemberKind::Property {
            type_ref,
            has_getter,
            has_setter,
        } = &member.kind
        else {
            return Ok(None);
        };
        if !has_getter && !has_setter {
            return Ok(None);
        }

        ctx.import_member(member, options, false).await?;
        let scope = ctx.snapshot().await;
        let pad = indent(indent_level);

        let mut accessors = Vec::new();
        if *has_getter {
            accessors.push("get;");
        }
        if *has_setter {
            accessors.push("set;");
        }

        let mut lines = documentation_lines(member.documentation.as_deref(), &pad);
        lines.extend(attribute_lines(&member.attributes, &pad));
        lines.push(format!(
            "{pad}{}{} {} {{ {} }}",
            modifier_prefix(member, options, false),
            scope.render(type_ref),
            member.name,
            accessors.join(" ")
        ));
        Ok(Some(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{CodeBlocks, MarkerAttribute};
    use crate::host::{Location, MemoryHost};
    use crate::types::{TypeDefinition, TypeKind, TypeRef};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_property_with_documentation_and_marker() {
        let host = MemoryHost::new();
        let target = TypeDefinition::class("Acme.App.Models", "OrderModel");
        let document = host.add_type(Location::project("Acme.App"), target.clone()).await;
        let blocks = CodeBlocks::default();
        let ctx = BuildContext::new(&host, &document, &target, &blocks);

        let marker = MarkerAttribute {
            name: "GeneratedCode".to_string(),
            namespace: Some("System.CodeDom.Compiler".to_string()),
            arguments: vec!["\"codesync\"".to_string(), "\"1.0\"".to_string()],
        };
        let member = Member::property(
            "Lines",
            TypeRef::parse("System.Collections.Generic.List<Acme.App.Models.LineModel>").unwrap(),
        )
        .with_documentation("Order lines.")
        .with_attribute(marker.to_attribute());
        let options = BuildOptions::builder().marker(marker).build();

        let text = PropertyBuilder
            .build(
                &BuildRequest {
                    member: &member,
                    source: &member,
                },
                &ctx,
                1,
                &options,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            text,
            [
                "    /// <summary>",
                "    /// Order lines.",
                "    /// </summary>",
                "    [GeneratedCode(\"codesync\", \"1.0\")]",
                "    public List<LineModel> Lines { get; set; }",
            ]
            .join("\n")
        );
        let imports = host.definition(&document).await.unwrap().imports;
        let namespaces: Vec<_> = imports.iter().map(|i| i.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["System.Collections.Generic", "System.CodeDom.Compiler"]);
    }

    #[tokio::test]
    async fn test_interface_property_is_signature_only() {
        let host = MemoryHost::new();
        let target = TypeDefinition::interface("Acme.App", "IOrder");
        let document = host.add_type(Location::project("Acme.App"), target.clone()).await;
        let blocks = CodeBlocks::default();
        let ctx = BuildContext::new(&host, &document, &target, &blocks);
        let member = Member::property("Id", TypeRef::new("int")).read_only();
        let options = BuildOptions::builder().target_kind(TypeKind::Interface).build();

        let text = PropertyBuilder
            .build(
                &BuildRequest {
                    member: &member,
                    source: &member,
                },
                &ctx,
                1,
                &options,
            )
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("    int Id { get; }"));
    }
}
