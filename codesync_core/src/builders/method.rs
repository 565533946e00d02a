use async_trait::async_trait;

use crate::builders::blocks::{BoundsCheckStrategy, ErrorHandlingStrategy, LoggingStrategy, indent};
use crate::builders::{
    BodyStyle, BuildContext, BuildOptions, BuildRequest, MemberBuilder, attribute_lines,
    documentation_lines, modifier_prefix,
};
use crate::error::Result;
use crate::types::{Member, MemberKind};

/// Methods. Interface targets get a signature; class targets get a body that
/// either throws `NotImplementedException` or delegates to a field, wrapped in
/// the project's code blocks.
pub struct MethodBuilder;

#[async_trait]
impl MemberBuilder for MethodBuilder {
    fn handles(&self, member: &Member) -> bool {
        member.is_method()
    }

    async fn build(
        &self,
        request: &BuildRequest<'_>,
        ctx: &BuildContext<'_>,
        indent_level: usize,
        options: &BuildOptions,
    ) -> Result<Option<String>> {
        let member = request.member;
        let MemberKind::Method {
            return_type,
            parameters,
            generic_parameters,
        } = &member.kind
        else {
            return Ok(None);
        };

        let with_body = !options.signatures_only() && !member.modifiers.is_abstract;
        let delegates = with_body && matches!(options.body_style, BodyStyle::Delegate { .. });
        ctx.import_member(member, options, with_body).await?;
        let scope = ctx.snapshot().await;

        let pad = indent(indent_level);
        let is_async = delegates && return_type.is_awaitable();
        let generics = if generic_parameters.is_empty() {
            String::new()
        } else {
            format!("<{}>", generic_parameters.join(", "))
        };
        let signature = format!(
            "{pad}{}{} {}{generics}({})",
            modifier_prefix(member, options, is_async),
            scope.render(return_type),
            member.name,
            scope.render_parameters(parameters)
        );

        let mut lines = documentation_lines(member.documentation.as_deref(), &pad);
        lines.extend(attribute_lines(&member.attributes, &pad));
        if !with_body {
            lines.push(format!("{signature};"));
            return Ok(Some(lines.join("\n")));
        }

        lines.push(signature);
        lines.push(format!("{pad}{{"));
        let body_pad = indent(indent_level + 1);
        let blocks = ctx.blocks;
        lines.extend(
            blocks
                .bounds_check
                .checks(parameters)
                .into_iter()
                .map(|check| format!("{body_pad}{check}")),
        );

        match &options.body_style {
            BodyStyle::NotImplemented => {
                lines.push(format!("{body_pad}throw new NotImplementedException();"));
            }
            BodyStyle::Delegate { target } => {
                if let Some(enter) = blocks.logger.enter(&member.name) {
                    lines.push(format!("{body_pad}{enter}"));
                }
                let arguments = parameters
                    .iter()
                    .map(|parameter| parameter.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let call = format!(
                    "{}{target}.{}({arguments})",
                    if is_async { "await " } else { "" },
                    request.source.name
                );
                let returns_value = !return_type.is_void()
                    && !(return_type.is_awaitable() && return_type.type_arguments.is_empty());
                let exit = blocks.logger.exit(&member.name);

                let statements = match (returns_value, exit) {
                    (true, Some(exit)) => {
                        vec![format!("var result = {call};"), exit, "return result;".to_string()]
                    }
                    (true, None) => vec![format!("return {call};")],
                    (false, Some(exit)) => vec![format!("{call};"), exit],
                    (false, None) => vec![format!("{call};")],
                };
                lines.extend(blocks.error_handling.wrap(
                    statements,
                    &member.name,
                    &blocks.logger,
                    indent_level + 1,
                ));
            }
        }
        lines.push(format!("{pad}}}"));
        Ok(Some(lines.join("\n")))
    }
}
