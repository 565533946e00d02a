use async_trait::async_trait;

use crate::builders::blocks::indent;
use crate::builders::{
    BuildContext, BuildOptions, BuildRequest, MemberBuilder, attribute_lines, documentation_lines,
    modifier_prefix,
};
use crate::error::Result;
use crate::types::{Member, MemberKind};

/// Field-like events: `public event EventHandler<OrderEventArgs> Changed;`.
pub struct EventBuilder;

#[async_trait]
impl MemberBuilder for EventBuilder {
    fn handles(&self, member: &Member) -> bool {
        matches!(member.kind, MemberKind::Event { .. })
    }

    async fn build(
        &self,
        request: &BuildRequest<'_>,
        ctx: &BuildContext<'_>,
        indent_level: usize,
        options: &BuildOptions,
    ) -> Result<Option<String>> {
        let member = request.member;
        let MemberKind::Event { handler_type } = &member.kind else {
            return Ok(None);
        };

        ctx.import_member(member, options, false).await?;
        let scope = ctx.snapshot().await;
        let pad = indent(indent_level);

        let mut lines = documentation_lines(member.documentation.as_deref(), &pad);
        lines.extend(attribute_lines(&member.attributes, &pad));
        lines.push(format!(
            "{pad}{}event {} {};",
            modifier_prefix(member, options, false),
            scope.render(handler_type),
            member.name
        ));
        Ok(Some(lines.join("\n")))
    }
}
