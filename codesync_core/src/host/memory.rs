use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::HostError;
use crate::host::{
    CapabilityProbe, Document, DocumentWriter, Location, LocatedType, TypeModelProvider,
};
use crate::types::{Import, Member, TypeDefinition, TypeKind};

#[derive(Debug, Clone)]
struct StoredDocument {
    location: Location,
    definition: TypeDefinition,
    text: String,
    /// Text appended or replaced through the writer, keyed by member.
    member_text: Vec<(Member, String)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<String, StoredDocument>,
    libraries: HashMap<String, HashSet<String>>,
    unloadable: HashSet<String>,
    failing_operations: HashSet<String>,
    reads: usize,
    writes: usize,
}

impl MemoryState {
    fn document_mut(&mut self, document: &Document) -> Result<&mut StoredDocument, HostError> {
        self.documents
            .get_mut(&document.path)
            .ok_or_else(|| format!("no document at '{}'", document.path).into())
    }

    fn check(&self, operation: &str) -> Result<(), HostError> {
        if self.failing_operations.contains(operation) {
            return Err(format!("injected failure in {operation}").into());
        }
        Ok(())
    }
}

/// In-memory host holding structured documents next to their rendered text.
///
/// Appended member text is inserted before the type's closing brace, disabled
/// members are commented out line by line, and every writer call bumps a write
/// counter so callers can assert that a run was a no-op.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an existing (source) type and returns its document.
    pub async fn add_type(&self, location: Location, definition: TypeDefinition) -> Document {
        let path = document_path(&location, &format!("{}.cs", definition.name));
        let text = outline(&definition);
        let mut state = self.state.lock().await;
        debug!(path = %path, "Registering type {}", definition.full_name());
        state.documents.insert(
            path.clone(),
            StoredDocument {
                location,
                definition,
                text,
                member_text: Vec::new(),
            },
        );
        Document::new(path)
    }

    /// Replaces the structured definition behind a document, as an edit made
    /// outside the engine would.
    pub async fn update_type(&self, document: &Document, definition: TypeDefinition) -> bool {
        let mut state = self.state.lock().await;
        match state.documents.get_mut(&document.path) {
            Some(stored) => {
                stored.text = outline(&definition);
                stored.definition = definition;
                stored.member_text.clear();
                true
            }
            None => false,
        }
    }

    pub async fn reference_library(&self, project: &str, library: &str) {
        self.state
            .lock()
            .await
            .libraries
            .entry(project.to_string())
            .or_default()
            .insert(library.to_string());
    }

    /// Makes `load` fail for every document declaring a type with this name.
    pub async fn make_unloadable(&self, type_name: &str) {
        self.state
            .lock()
            .await
            .unloadable
            .insert(type_name.to_string());
    }

    /// Makes every call of a writer operation fail, e.g. `"append_member"`.
    pub async fn fail_operation(&self, operation: &str) {
        self.state
            .lock()
            .await
            .failing_operations
            .insert(operation.to_string());
    }

    pub async fn writes(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Provider calls served so far.
    pub async fn reads(&self) -> usize {
        self.state.lock().await.reads
    }

    pub async fn document_count(&self) -> usize {
        self.state.lock().await.documents.len()
    }

    pub async fn definition(&self, document: &Document) -> Option<TypeDefinition> {
        self.state
            .lock()
            .await
            .documents
            .get(&document.path)
            .map(|stored| stored.definition.clone())
    }

    pub async fn text(&self, document: &Document) -> Option<String> {
        self.state
            .lock()
            .await
            .documents
            .get(&document.path)
            .map(|stored| stored.text.clone())
    }

    /// Every document whose type has the given simple name.
    pub async fn documents_named(&self, name: &str) -> Vec<Document> {
        self.state
            .lock()
            .await
            .documents
            .iter()
            .filter(|(_, stored)| stored.definition.name == name)
            .map(|(path, _)| Document::new(path.clone()))
            .collect()
    }
}

#[async_trait]
impl TypeModelProvider for MemoryHost {
    async fn find_by_name(
        &self,
        kind: Option<TypeKind>,
        name: &str,
        scope: &Location,
    ) -> Result<Option<LocatedType>, HostError> {
        let mut state = self.state.lock().await;
        state.reads += 1;
        let found = state
            .documents
            .iter()
            .find(|(_, stored)| {
                stored.definition.name == name
                    && kind.is_none_or(|kind| stored.definition.kind == kind)
                    && scope.contains(&stored.location)
            })
            .map(|(path, stored)| LocatedType {
                document: Document::new(path.clone()),
                definition: stored.definition.clone(),
            });
        trace!(name, scope = %scope, found = found.is_some(), "find_by_name");
        Ok(found)
    }

    async fn load(&self, document: &Document) -> Result<TypeDefinition, HostError> {
        let mut state = self.state.lock().await;
        state.reads += 1;
        let stored = state
            .documents
            .get(&document.path)
            .ok_or_else(|| format!("no document at '{}'", document.path))?;
        if state.unloadable.contains(&stored.definition.name) {
            return Err(format!("'{}' does not parse", document.path).into());
        }
        Ok(stored.definition.clone())
    }

    async fn location_exists(&self, location: &Location) -> Result<bool, HostError> {
        let mut state = self.state.lock().await;
        state.reads += 1;
        let exists = (location.folder.is_none() && state.libraries.contains_key(&location.project))
            || state
                .documents
                .values()
                .any(|stored| location.contains(&stored.location));
        Ok(exists)
    }
}

#[async_trait]
impl DocumentWriter for MemoryHost {
    async fn create_document(
        &self,
        location: &Location,
        file_name: &str,
        shell: &TypeDefinition,
        text: &str,
    ) -> Result<Document, HostError> {
        let mut state = self.state.lock().await;
        state.check("create_document")?;
        let path = document_path(location, file_name);
        if state.documents.contains_key(&path) {
            return Err(format!("document '{path}' already exists").into());
        }
        state.documents.insert(
            path.clone(),
            StoredDocument {
                location: location.clone(),
                definition: shell.clone(),
                text: text.to_string(),
                member_text: Vec::new(),
            },
        );
        state.writes += 1;
        debug!(path = %path, "Created document");
        Ok(Document::new(path))
    }

    async fn append_member(
        &self,
        document: &Document,
        member: &Member,
        text: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().await;
        state.check("append_member")?;
        let stored = state.document_mut(document)?;
        stored.definition.members.push(member.clone());
        insert_before_closing_brace(&mut stored.text, text);
        stored.member_text.push((member.clone(), text.to_string()));
        state.writes += 1;
        Ok(())
    }

    async fn disable_member(&self, document: &Document, member: &Member) -> Result<(), HostError> {
        let mut state = self.state.lock().await;
        state.check("disable_member")?;
        let stored = state.document_mut(document)?;
        let index = stored
            .definition
            .members
            .iter()
            .position(|candidate| candidate == member)
            .ok_or_else(|| format!("member '{}' not found", member.name))?;
        let removed = stored.definition.members.remove(index);
        if let Some(position) = stored.member_text.iter().position(|(m, _)| *m == removed) {
            let (_, text) = stored.member_text.remove(position);
            let commented = comment_out(&text);
            stored.text = stored.text.replacen(&text, &commented, 1);
        }
        stored.definition.disabled_members.push(removed);
        state.writes += 1;
        Ok(())
    }

    async fn replace_member(
        &self,
        document: &Document,
        existing: &Member,
        replacement: &Member,
        text: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().await;
        state.check("replace_member")?;
        let stored = state.document_mut(document)?;
        let slot = stored
            .definition
            .members
            .iter_mut()
            .find(|candidate| *candidate == existing)
            .ok_or_else(|| format!("member '{}' not found", existing.name))?;
        *slot = replacement.clone();
        match stored.member_text.iter().position(|(m, _)| m == existing) {
            Some(position) => {
                let old = std::mem::take(&mut stored.member_text[position].1);
                stored.text = stored.text.replacen(&old, text, 1);
                stored.member_text[position] = (replacement.clone(), text.to_string());
            }
            None => {
                insert_before_closing_brace(&mut stored.text, text);
                stored.member_text.push((replacement.clone(), text.to_string()));
            }
        }
        state.writes += 1;
        Ok(())
    }

    async fn add_import(
        &self,
        document: &Document,
        namespace: &str,
        alias: Option<String>,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().await;
        state.check("add_import")?;
        let stored = state.document_mut(document)?;
        let import = Import {
            namespace: namespace.to_string(),
            alias,
        };
        if stored.definition.imports.contains(&import) {
            return Ok(());
        }
        let line = match &import.alias {
            Some(alias) => format!("using {alias} = {namespace};\n"),
            None => format!("using {namespace};\n"),
        };
        let at = using_insertion_point(&stored.text);
        stored.text.insert_str(at, &line);
        stored.definition.imports.push(import);
        state.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl CapabilityProbe for MemoryHost {
    async fn project_supports(&self, project: &str, library: &str) -> Result<bool, HostError> {
        let state = self.state.lock().await;
        Ok(state
            .libraries
            .get(project)
            .is_some_and(|libraries| libraries.contains(library)))
    }
}

fn document_path(location: &Location, file_name: &str) -> String {
    format!("{location}/{file_name}")
}

fn insert_before_closing_brace(text: &mut String, member_text: &str) {
    let at = text.rfind('}').unwrap_or(text.len());
    let mut block = member_text.to_string();
    if !block.ends_with('\n') {
        block.push('\n');
    }
    text.insert_str(at, &block);
}

fn comment_out(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let indent = &line[..line.len() - trimmed.len()];
            format!("{indent}// {trimmed}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// After the last leading `using` line, or at the top.
fn using_insertion_point(text: &str) -> usize {
    let mut offset = 0;
    let mut insertion = 0;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if line.starts_with("using ") {
            insertion = offset;
        } else if !line.trim().is_empty() {
            break;
        }
    }
    insertion
}

/// Minimal text for a registered type.
fn outline(definition: &TypeDefinition) -> String {
    let mut text = String::new();
    for import in &definition.imports {
        text.push_str(&format!("using {};\n", import.namespace));
    }
    if !definition.imports.is_empty() {
        text.push('\n');
    }
    if !definition.namespace.is_empty() {
        text.push_str(&format!("namespace {};\n\n", definition.namespace));
    }
    text.push_str(&format!(
        "{} {} {}\n{{\n}}\n",
        definition.visibility, definition.kind, definition.name
    ));
    text
}
