use crate::error::{CodesyncError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Simple type names that never need a generated counterpart.
static WELL_KNOWN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "string", "String", "int", "Int32", "long", "Int64", "short", "Int16", "byte", "Byte",
        "sbyte", "SByte", "uint", "UInt32", "ulong", "UInt64", "ushort", "UInt16", "bool",
        "Boolean", "char", "Char", "decimal", "Decimal", "double", "Double", "float", "Single",
        "object", "Object", "void", "dynamic", "DateTime", "DateTimeOffset", "DateOnly",
        "TimeOnly", "TimeSpan", "Guid", "Uri", "Task", "ValueTask", "List", "IList",
        "ICollection", "IEnumerable", "IReadOnlyList", "IReadOnlyCollection", "Collection",
        "HashSet", "ISet", "Dictionary", "IDictionary", "IReadOnlyDictionary", "KeyValuePair",
        "Nullable", "Action", "Func", "EventHandler", "EventArgs", "CancellationToken",
        "Exception", "Stream", "IAsyncEnumerable", "Tuple", "ValueTuple", "Type",
    ]
    .into_iter()
    .collect()
});

static VALUE_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "int", "Int32", "long", "Int64", "short", "Int16", "byte", "Byte", "sbyte", "SByte",
        "uint", "UInt32", "ulong", "UInt64", "ushort", "UInt16", "bool", "Boolean", "char",
        "Char", "decimal", "Decimal", "double", "Double", "float", "Single", "DateTime",
        "DateTimeOffset", "DateOnly", "TimeOnly", "TimeSpan", "Guid",
    ]
    .into_iter()
    .collect()
});

static COLLECTION_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "List", "IList", "ICollection", "IEnumerable", "IReadOnlyList", "IReadOnlyCollection",
        "Collection", "HashSet", "ISet",
    ]
    .into_iter()
    .collect()
});

/// CLR names folded onto their keyword aliases for signature purposes.
static KEYWORD_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("String", "string"),
        ("Int32", "int"),
        ("Int64", "long"),
        ("Int16", "short"),
        ("Byte", "byte"),
        ("SByte", "sbyte"),
        ("UInt32", "uint"),
        ("UInt64", "ulong"),
        ("UInt16", "ushort"),
        ("Boolean", "bool"),
        ("Char", "char"),
        ("Decimal", "decimal"),
        ("Double", "double"),
        ("Single", "float"),
        ("Object", "object"),
    ])
});

/// A structured reference to a type as it appears in a member signature.
///
/// `nullable` and `array_rank` describe the element: `int?[]` is an array of
/// nullable ints. `array_nullable` marks the array itself, as in `string[]?`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(default)]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default)]
    pub type_arguments: Vec<TypeRef>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub array_rank: u8,
    #[serde(default)]
    pub array_nullable: bool,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn void() -> Self {
        Self::new("void")
    }

    pub fn with_arguments(mut self, arguments: Vec<TypeRef>) -> Self {
        self.type_arguments = arguments;
        self
    }

    pub fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Parses type strings such as `Task<List<Acme.Order>>`, `int?` or `string[]`.
    pub fn parse(input: &str) -> Result<TypeRef> {
        let mut parser = TypeParser {
            input,
            chars: input.char_indices().peekable(),
        };
        let parsed = parser.parse_type()?;
        parser.skip_whitespace();
        if let Some((index, _)) = parser.chars.peek() {
            return Err(CodesyncError::type_parse(
                input,
                format!("unexpected trailing input at offset {index}"),
            ));
        }
        Ok(parsed)
    }

    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn is_void(&self) -> bool {
        self.name == "void" && self.array_rank == 0
    }

    /// Primitives, framework collections and anything living under `System` or
    /// `Microsoft` namespaces.
    pub fn is_well_known(&self) -> bool {
        if let Some(namespace) = &self.namespace
            && is_framework_namespace(namespace)
        {
            return true;
        }
        WELL_KNOWN_TYPES.contains(self.name.as_str())
    }

    pub fn is_value_type(&self) -> bool {
        self.array_rank == 0 && VALUE_TYPES.contains(self.name.as_str())
    }

    pub fn is_string(&self) -> bool {
        self.array_rank == 0 && matches!(self.name.as_str(), "string" | "String")
    }

    pub fn is_awaitable(&self) -> bool {
        self.array_rank == 0 && matches!(self.name.as_str(), "Task" | "ValueTask")
    }

    /// `Task<T>` yields `T`; plain `Task` and non-awaitables yield `None`.
    pub fn awaited_type(&self) -> Option<&TypeRef> {
        if self.is_awaitable() {
            self.type_arguments.first()
        } else {
            None
        }
    }

    /// Element type of arrays and single-argument framework collections.
    pub fn collection_element(&self) -> Option<TypeRef> {
        if self.array_rank > 0 {
            let mut element = self.clone();
            element.array_rank -= 1;
            element.array_nullable = false;
            return Some(element);
        }
        if COLLECTION_TYPES.contains(self.name.as_str()) && self.type_arguments.len() == 1 {
            return Some(self.type_arguments[0].clone());
        }
        None
    }

    /// Same type with both nullable flags cleared.
    pub fn without_nullable(&self) -> TypeRef {
        let mut inner = self.clone();
        inner.nullable = false;
        inner.array_nullable = false;
        inner
    }

    /// Every type node in this reference, outermost first.
    pub fn walk(&self) -> Vec<&TypeRef> {
        let mut nodes = vec![self];
        for argument in &self.type_arguments {
            nodes.extend(argument.walk());
        }
        nodes
    }

    /// Rebuilds the reference, letting `rename` replace the namespace and name of
    /// any node while generic arguments, nullability and rank are preserved.
    pub fn map_names<F>(&self, rename: &mut F) -> TypeRef
    where
        F: FnMut(&TypeRef) -> Option<(Option<String>, String)>,
    {
        let (namespace, name) =
            rename(self).unwrap_or_else(|| (self.namespace.clone(), self.name.clone()));
        TypeRef {
            namespace,
            name,
            type_arguments: self
                .type_arguments
                .iter()
                .map(|argument| argument.map_names(rename))
                .collect(),
            nullable: self.nullable,
            array_rank: self.array_rank,
            array_nullable: self.array_nullable,
        }
    }

    /// Namespace-free rendering with keyword aliases, used for signatures.
    pub fn canonical(&self) -> String {
        let name = KEYWORD_ALIASES
            .get(self.name.as_str())
            .copied()
            .unwrap_or(self.name.as_str());
        let mut out = name.to_string();
        self.write_suffixes(&mut out, |argument| argument.canonical());
        out
    }

    /// Rendering without namespaces anywhere in the tree.
    pub fn simple_name(&self) -> String {
        let mut out = self.name.clone();
        self.write_suffixes(&mut out, |argument| argument.simple_name());
        out
    }

    pub(crate) fn write_suffixes<F>(&self, out: &mut String, render: F)
    where
        F: Fn(&TypeRef) -> String,
    {
        if !self.type_arguments.is_empty() {
            out.push('<');
            out.push_str(
                &self
                    .type_arguments
                    .iter()
                    .map(render)
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            out.push('>');
        }
        if self.nullable {
            out.push('?');
        }
        for _ in 0..self.array_rank {
            out.push_str("[]");
        }
        if self.array_nullable {
            out.push('?');
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = self.full_name();
        self.write_suffixes(&mut out, |argument| argument.to_string());
        write!(f, "{out}")
    }
}

pub fn is_framework_namespace(namespace: &str) -> bool {
    ["System", "Microsoft"].iter().any(|root| {
        namespace == *root
            || namespace
                .strip_prefix(root)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

struct TypeParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl TypeParser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn error(&self, message: impl Into<String>) -> CodesyncError {
        CodesyncError::type_parse(self.input, message)
    }

    fn parse_type(&mut self) -> Result<TypeRef> {
        self.skip_whitespace();
        let mut qualified = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '.')
        {
            qualified.push(c);
        }
        if qualified.is_empty() || qualified.starts_with('.') || qualified.ends_with('.') {
            return Err(self.error("expected a type name"));
        }

        let mut parsed = match qualified.rsplit_once('.') {
            Some((namespace, name)) => TypeRef::qualified(namespace, name),
            None => TypeRef::new(qualified),
        };

        self.skip_whitespace();
        if self.chars.next_if(|(_, c)| *c == '<').is_some() {
            loop {
                parsed.type_arguments.push(self.parse_type()?);
                self.skip_whitespace();
                match self.chars.next() {
                    Some((_, ',')) => continue,
                    Some((_, '>')) => break,
                    _ => return Err(self.error("unterminated generic argument list")),
                }
            }
        }

        self.skip_whitespace();
        if self.chars.next_if(|(_, c)| *c == '?').is_some() {
            parsed.nullable = true;
        }

        loop {
            self.skip_whitespace();
            if self.chars.next_if(|(_, c)| *c == '[').is_none() {
                break;
            }
            self.skip_whitespace();
            if self.chars.next_if(|(_, c)| *c == ']').is_none() {
                return Err(self.error("expected ']'"));
            }
            parsed.array_rank = parsed
                .array_rank
                .checked_add(1)
                .ok_or_else(|| self.error(format!("array rank exceeds {}", u8::MAX)))?;
        }
        if parsed.array_rank > 0 {
            self.skip_whitespace();
            if self.chars.next_if(|(_, c)| *c == '?').is_some() {
                parsed.array_nullable = true;
            }
        }

        // Nullable<T> is folded onto T?
        if parsed.name == "Nullable" && parsed.type_arguments.len() == 1 && parsed.array_rank == 0 {
            let mut inner = parsed.type_arguments.remove(0);
            inner.nullable = true;
            return Ok(inner);
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_and_qualified() {
        assert_eq!(TypeRef::parse("int").unwrap(), TypeRef::new("int"));
        let parsed = TypeRef::parse("Acme.Data.DbOrderEntity").unwrap();
        assert_eq!(parsed.namespace.as_deref(), Some("Acme.Data"));
        assert_eq!(parsed.name, "DbOrderEntity");
    }

    #[test]
    fn test_parse_nested_generics() {
        let parsed = TypeRef::parse("Task<Dictionary<string, List<Acme.Order>>>").unwrap();
        assert_eq!(parsed.name, "Task");
        let dictionary = &parsed.type_arguments[0];
        assert_eq!(dictionary.type_arguments.len(), 2);
        assert_eq!(dictionary.type_arguments[1].type_arguments[0].full_name(), "Acme.Order");
        assert_eq!(parsed.to_string(), "Task<Dictionary<string, List<Acme.Order>>>");
    }

    #[test]
    fn test_parse_nullable_and_arrays() {
        let parsed = TypeRef::parse("int?").unwrap();
        assert!(parsed.nullable);
        assert!(parsed.is_value_type());

        let array = TypeRef::parse("string[][]").unwrap();
        assert_eq!(array.array_rank, 2);
        assert_eq!(array.collection_element().unwrap().array_rank, 1);

        let folded = TypeRef::parse("System.Nullable<Guid>").unwrap();
        assert_eq!(folded, TypeRef::new("Guid").into_nullable());
    }

    #[test]
    fn test_parse_errors() {
        assert!(TypeRef::parse("").is_err());
        assert!(TypeRef::parse("List<int").is_err());
        assert!(TypeRef::parse("int[").is_err());
        assert!(TypeRef::parse("int foo").is_err());
        assert!(TypeRef::parse(".Order").is_err());
    }

    #[test]
    fn test_array_rank_overflow_is_an_error() {
        let deepest = format!("int{}", "[]".repeat(usize::from(u8::MAX)));
        assert_eq!(TypeRef::parse(&deepest).unwrap().array_rank, u8::MAX);

        let too_deep = format!("int{}", "[]".repeat(usize::from(u8::MAX) + 1));
        match TypeRef::parse(&too_deep) {
            Err(CodesyncError::TypeParse { input, message }) => {
                assert_eq!(input, too_deep);
                assert!(message.contains("array rank"));
            }
            other => panic!("expected a type parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_nullable_array() {
        let parsed = TypeRef::parse("string[]?").unwrap();
        assert_eq!(parsed.array_rank, 1);
        assert!(parsed.array_nullable);
        assert!(!parsed.nullable);
        assert_eq!(parsed.to_string(), "string[]?");

        let both = TypeRef::parse("int?[] ?").unwrap();
        assert!(both.nullable);
        assert!(both.array_nullable);
        assert_eq!(both.to_string(), "int?[]?");

        let element = both.collection_element().unwrap();
        assert_eq!(element.to_string(), "int?");
        assert_eq!(parsed.without_nullable().to_string(), "string[]");
        assert!(TypeRef::parse("string[]??").is_err());
    }

    #[test]
    fn test_well_known_classification() {
        assert!(TypeRef::new("string").is_well_known());
        assert!(TypeRef::qualified("System.Net", "IPAddress").is_well_known());
        assert!(!TypeRef::qualified("Systematic.Models", "Order").is_well_known());
        assert!(!TypeRef::new("DbOrderEntity").is_well_known());
    }

    #[test]
    fn test_canonical_ignores_namespaces_and_aliases() {
        let a = TypeRef::parse("System.Threading.Tasks.Task<System.Int32>").unwrap();
        let b = TypeRef::parse("Task<int>").unwrap();
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(b.canonical(), "Task<int>");
    }

    #[test]
    fn test_awaited_and_collection_element() {
        let task = TypeRef::parse("Task<List<Order>>").unwrap();
        let awaited = task.awaited_type().unwrap();
        assert_eq!(awaited.collection_element().unwrap().name, "Order");
        assert!(TypeRef::parse("Task").unwrap().awaited_type().is_none());
        assert!(TypeRef::parse("Dictionary<string, int>").unwrap().collection_element().is_none());
    }

    #[test]
    fn test_map_names_preserves_shape() {
        let original = TypeRef::parse("List<Acme.Data.DbLineEntity>?").unwrap();
        let mapped = original.map_names(&mut |node| {
            (node.name == "DbLineEntity")
                .then(|| (Some("Acme.App.Models".to_string()), "LineModel".to_string()))
        });
        assert_eq!(mapped.to_string(), "List<Acme.App.Models.LineModel>?");
    }

    #[test]
    fn test_walk_visits_all_nodes() {
        let parsed = TypeRef::parse("Dictionary<Key, List<Value>>").unwrap();
        let names: Vec<_> = parsed.walk().into_iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Dictionary", "Key", "List", "Value"]);
    }
}
