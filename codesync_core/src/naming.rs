use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::trace;

/// Prefix/suffix strip-and-append policy deriving a target name from a source name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct NameRule {
    #[builder(default)]
    #[serde(default)]
    pub remove_prefixes: Vec<String>,
    #[builder(default)]
    #[serde(default)]
    pub remove_suffixes: Vec<String>,
    #[builder(into)]
    #[serde(default)]
    pub add_prefix: Option<String>,
    #[builder(into)]
    #[serde(default)]
    pub add_suffix: Option<String>,
}

impl NameRule {
    /// Applies the rule to `name`.
    ///
    /// At most one configured prefix and one configured suffix are removed; the
    /// first match in list order wins. Prefixes only match at a word boundary,
    /// so `I` leaves `InventoryLogic` alone. When `anchor_prefix` is supplied it
    /// is stripped before the rule runs and re-prepended afterwards whether or
    /// not the input carried it.
    pub fn format_name(&self, name: &str, anchor_prefix: Option<&str>) -> String {
        let mut current = name.trim();

        if let Some(anchor) = anchor_prefix.filter(|anchor| !anchor.is_empty()) {
            current = strip_word_prefix(current, anchor).unwrap_or(current);
        }

        if let Some(stripped) = self
            .remove_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .find_map(|prefix| strip_word_prefix(current, prefix))
        {
            current = stripped;
        }

        if let Some(stripped) = self
            .remove_suffixes
            .iter()
            .filter(|suffix| !suffix.is_empty())
            .find_map(|suffix| current.strip_suffix(suffix.as_str()))
        {
            current = stripped;
        }

        let mut formatted = String::with_capacity(name.len() + 16);
        if let Some(anchor) = anchor_prefix {
            formatted.push_str(anchor);
        }
        if let Some(prefix) = &self.add_prefix {
            formatted.push_str(prefix);
        }
        formatted.push_str(current);
        if let Some(suffix) = &self.add_suffix {
            formatted.push_str(suffix);
        }

        trace!(input = name, output = %formatted, "Formatted name");
        formatted
    }
}

/// Removes `prefix` when an uppercase letter follows it.
fn strip_word_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix)
        .filter(|rest| rest.chars().next().is_some_and(char::is_uppercase))
}

/// Formats an optional name under an optional rule. A missing name stays missing
/// and a missing rule leaves the name untouched apart from trimming and anchoring.
pub fn format_name(
    rule: Option<&NameRule>,
    name: Option<&str>,
    anchor_prefix: Option<&str>,
) -> Option<String> {
    let name = name?;
    Some(match rule {
        Some(rule) => rule.format_name(name, anchor_prefix),
        None => NameRule::default().format_name(name, anchor_prefix),
    })
}

/// How a method's trailing `Async` is treated in the target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AsyncSuffix {
    #[default]
    Keep,
    /// Drop a trailing `Async` before the rule runs.
    Strip,
    /// Append `Async` to awaitable methods that lack it.
    Ensure,
}

const ASYNC_SUFFIX: &str = "Async";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct MethodNameRule {
    #[builder(default)]
    #[serde(default)]
    pub rule: NameRule,
    #[builder(default)]
    #[serde(default)]
    pub async_suffix: AsyncSuffix,
}

impl MethodNameRule {
    pub fn format(&self, name: &str, awaitable: bool) -> String {
        let name = name.trim();
        let base = match self.async_suffix {
            AsyncSuffix::Strip => strip_async(name),
            AsyncSuffix::Keep | AsyncSuffix::Ensure => name,
        };
        let mut formatted = self.rule.format_name(base, None);
        if self.async_suffix == AsyncSuffix::Ensure
            && awaitable
            && !formatted.ends_with(ASYNC_SUFFIX)
        {
            formatted.push_str(ASYNC_SUFFIX);
        }
        formatted
    }
}

/// `GetAsync` becomes `Get`; a bare `Async` is left alone.
fn strip_async(name: &str) -> &str {
    match name.strip_suffix(ASYNC_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => name,
    }
}
