use crate::types::{Member, MemberKind, Parameter};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Whether visibility takes part in member identity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonPolicy {
    /// An implementation compared with its own prior version.
    #[default]
    SecuritySensitive,
    /// An implementation compared with the interfaces it satisfies.
    SecurityAgnostic,
}

/// Structural fingerprint of a member signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComparisonHash(pub u64);

impl fmt::Display for ComparisonHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Member {
    /// Canonical signature text: kind, name, optional visibility, generic arity,
    /// parameter types and value type. Documentation, attributes, modifiers,
    /// parameter names and bodies are not part of it.
    pub fn signature_text(&self, policy: ComparisonPolicy) -> String {
        let mut text = format!("{}|{}", self.tag(), self.name);
        if policy == ComparisonPolicy::SecuritySensitive {
            text.push('|');
            text.push_str(&self.visibility.to_string());
        }
        match &self.kind {
            MemberKind::Property { type_ref, .. } => {
                text.push_str("|:");
                text.push_str(&type_ref.canonical());
            }
            MemberKind::Method {
                return_type,
                parameters,
                generic_parameters,
            } => {
                text.push_str(&format!("|`{}", generic_parameters.len()));
                push_parameters(&mut text, parameters);
                text.push_str("|:");
                text.push_str(&return_type.canonical());
            }
            MemberKind::Event { handler_type } => {
                text.push_str("|:");
                text.push_str(&handler_type.canonical());
            }
            MemberKind::Constructor { parameters } => push_parameters(&mut text, parameters),
        }
        text
    }

    pub fn comparison_hash(&self, policy: ComparisonPolicy) -> ComparisonHash {
        ComparisonHash::of(&self.signature_text(policy))
    }
}

impl ComparisonHash {
    /// First eight bytes of the blake3 digest of `text`.
    pub fn of(text: &str) -> Self {
        let digest = blake3::hash(text.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        ComparisonHash(u64::from_le_bytes(head))
    }
}

fn push_parameters(text: &mut String, parameters: &[Parameter]) {
    text.push('(');
    text.push_str(
        &parameters
            .iter()
            .map(|parameter| parameter.type_ref.canonical())
            .collect::<Vec<_>>()
            .join(","),
    );
    text.push(')');
}
