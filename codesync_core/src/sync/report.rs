use serde::Serialize;
use strum::Display;

use crate::error::Result;
use crate::host::Document;
use crate::sync::profile::ArtifactKind;
use crate::sync::transform::{MemberChange, TransformOutcome};
use crate::types::TypeDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncStatus {
    Created,
    Updated,
    /// Nothing to do; the artifact was returned untouched.
    Unchanged,
}

/// Result of synchronizing one artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub kind: ArtifactKind,
    pub source: String,
    pub artifact: String,
    pub document: Document,
    /// The target as re-loaded after patching.
    pub definition: TypeDefinition,
    pub added: Vec<String>,
    pub disabled: Vec<String>,
    /// Artifacts synchronized first because added members reference them.
    pub dependencies: Vec<String>,
}

impl SyncOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.status == SyncStatus::Unchanged
    }

    /// The same artifact reported as a no-op.
    pub(crate) fn as_unchanged(&self) -> Self {
        Self {
            status: SyncStatus::Unchanged,
            added: Vec::new(),
            disabled: Vec::new(),
            dependencies: Vec::new(),
            ..self.clone()
        }
    }
}

/// Everything a session did, in the order it happened.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub artifacts: Vec<SyncOutcome>,
    pub transforms: Vec<TransformOutcome>,
    /// Source types of a batch that reference each other.
    pub cycles: Vec<Vec<String>>,
}

impl SyncReport {
    pub(crate) fn record_artifact(&mut self, outcome: &SyncOutcome) {
        self.artifacts.push(outcome.clone());
    }

    pub(crate) fn record_transform(&mut self, outcome: &TransformOutcome) {
        self.transforms.push(outcome.clone());
    }

    pub(crate) fn record_cycle(&mut self, cycle: Vec<String>) {
        if !self.cycles.contains(&cycle) {
            self.cycles.push(cycle);
        }
    }

    fn with_status(&self, status: SyncStatus) -> Vec<String> {
        self.artifacts
            .iter()
            .filter(|outcome| outcome.status == status)
            .map(|outcome| format!("{} ({})", outcome.artifact, outcome.kind))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.artifacts.iter().any(|outcome| !outcome.is_unchanged())
            || self.transforms.iter().any(TransformOutcome::has_changes)
    }

    pub fn summary(&self) -> String {
        let mut summary = Vec::new();

        let created = self.with_status(SyncStatus::Created);
        if !created.is_empty() {
            summary.push(format!("Created artifacts: {}", created.join(", ")));
        }

        let updated = self.with_status(SyncStatus::Updated);
        if !updated.is_empty() {
            summary.push(format!("Updated artifacts: {}", updated.join(", ")));
        }

        let added: usize = self.artifacts.iter().map(|o| o.added.len()).sum();
        let disabled: usize = self.artifacts.iter().map(|o| o.disabled.len()).sum();
        if added > 0 || disabled > 0 {
            summary.push(format!("Members added: {added}, disabled: {disabled}"));
        }

        let refreshed: Vec<String> = self
            .transforms
            .iter()
            .flat_map(|transform| {
                [
                    (&transform.to_model, "ToModel"),
                    (&transform.from_model, "FromModel"),
                ]
                .into_iter()
                .filter(|(change, _)| **change != MemberChange::Unchanged)
                .map(|(change, function)| format!("{}.{function} ({change})", transform.entity))
            })
            .collect();
        if !refreshed.is_empty() {
            summary.push(format!("Transforms: {}", refreshed.join(", ")));
        }

        let skipped: Vec<String> = self
            .transforms
            .iter()
            .flat_map(|transform| {
                transform
                    .skipped
                    .iter()
                    .map(move |property| format!("{}.{}", transform.entity, property.name))
            })
            .collect();
        if !skipped.is_empty() {
            summary.push(format!("Skipped incompatible properties: {}", skipped.join(", ")));
        }

        if summary.is_empty() {
            summary.push("No changes detected".to_string());
        }
        if !self.cycles.is_empty() {
            let cycles: Vec<String> = self.cycles.iter().map(|cycle| cycle.join(" <-> ")).collect();
            summary.push(format!("Reference cycles: {}", cycles.join("; ")));
        }
        summary.join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
