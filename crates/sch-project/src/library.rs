//! Library elements and the project-local library.
//!
//! Every library element owns a [`TransactionalDirectory`] holding its
//! serialized form (`component.lp` / `symbol.lp`). Elements are
//! reconstructed *from* such a directory, which is exactly how the paste
//! transaction imports staged assets from a clipboard snapshot.

use std::collections::BTreeMap;

use sch_sexpr::{ListBuilder, Sexpr, kv};
use thiserror::Error;
use uuid::Uuid;

use crate::fs::{StorageError, TransactionalDirectory, TransactionalFileSystem};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("missing file `{0}` in library element directory")]
    MissingFile(&'static str),

    #[error("library element file is not valid UTF-8")]
    NotUtf8,

    #[error("malformed library element: {0}")]
    Parse(#[from] sch_sexpr::ParseError),

    #[error("unexpected root tag `{0}` in library element")]
    UnexpectedTag(String),

    #[error("library element is missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid uuid in library element: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("library already contains element {0}")]
    DuplicateElement(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One gate of a symbol variant: places one library symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolVariantGate {
    pub uuid: Uuid,
    pub symbol: Uuid,
}

/// A symbol variant of a component (one way to draw it as gates).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolVariant {
    pub uuid: Uuid,
    pub gates: Vec<SymbolVariantGate>,
}

impl SymbolVariant {
    pub fn gate(&self, uuid: &Uuid) -> Option<&SymbolVariantGate> {
        self.gates.iter().find(|g| g.uuid == *uuid)
    }
}

/// A library component definition.
#[derive(Debug, Clone)]
pub struct Component {
    uuid: Uuid,
    name: String,
    /// Locale → name prefix (e.g. "R" for resistors). The `"default"` key is
    /// the fallback when no locale matches.
    prefixes: BTreeMap<String, String>,
    variants: Vec<SymbolVariant>,
    directory: TransactionalDirectory,
}

impl Component {
    pub const FILE_NAME: &'static str = "component.lp";
    const TAG: &'static str = "sch_component";

    /// Create a component backed by a fresh directory containing its
    /// serialized form.
    pub fn new(
        uuid: Uuid,
        name: impl Into<String>,
        prefixes: BTreeMap<String, String>,
        variants: Vec<SymbolVariant>,
    ) -> Result<Self, LibraryError> {
        let component = Self {
            uuid,
            name: name.into(),
            prefixes,
            variants,
            directory: TransactionalDirectory::root(TransactionalFileSystem::new()),
        };
        component.directory.write_file(
            Self::FILE_NAME,
            sch_sexpr::formatter::format_tree(&component.serialize()).as_bytes(),
        )?;
        Ok(component)
    }

    /// Reconstruct a component from a directory holding `component.lp`.
    pub fn from_directory(directory: TransactionalDirectory) -> Result<Self, LibraryError> {
        let content = directory
            .read_file(Self::FILE_NAME)
            .map_err(|_| LibraryError::MissingFile(Self::FILE_NAME))?;
        let text = String::from_utf8(content).map_err(|_| LibraryError::NotUtf8)?;
        let root = sch_sexpr::parse(&text)?;
        if root.tag() != Some(Self::TAG) {
            return Err(LibraryError::UnexpectedTag(
                root.tag().unwrap_or_default().to_string(),
            ));
        }
        let items = root.as_list().unwrap_or_default();

        let mut prefixes = BTreeMap::new();
        for prefix in root.find_all_lists("prefix") {
            let locale = prefix
                .get(1)
                .and_then(Sexpr::as_str)
                .ok_or(LibraryError::MissingField("prefix locale"))?;
            let value = prefix
                .get(2)
                .and_then(Sexpr::as_str)
                .ok_or(LibraryError::MissingField("prefix value"))?;
            prefixes.insert(locale.to_string(), value.to_string());
        }

        let mut variants = Vec::new();
        for variant in root.find_all_lists("variant") {
            let mut gates = Vec::new();
            for gate in sch_sexpr::find_all_child_lists(variant, "gate") {
                gates.push(SymbolVariantGate {
                    uuid: uuid_field(gate, "uuid")?,
                    symbol: uuid_field(gate, "symbol")?,
                });
            }
            variants.push(SymbolVariant {
                uuid: uuid_field(variant, "uuid")?,
                gates,
            });
        }

        Ok(Self {
            uuid: uuid_field(items, "uuid")?,
            name: str_field(items, "name")?,
            prefixes,
            variants,
            directory,
        })
    }

    fn serialize(&self) -> Sexpr {
        let mut node = ListBuilder::node(Self::TAG);
        node.push(kv("uuid", Sexpr::string(self.uuid.to_string())));
        node.push(kv("name", Sexpr::string(&*self.name)));
        for (locale, value) in &self.prefixes {
            node.push(Sexpr::list(vec![
                Sexpr::symbol("prefix"),
                Sexpr::string(locale.clone()),
                Sexpr::string(value.clone()),
            ]));
        }
        for variant in &self.variants {
            let mut v = ListBuilder::node("variant");
            v.push(kv("uuid", Sexpr::string(variant.uuid.to_string())));
            for gate in &variant.gates {
                let mut g = ListBuilder::node("gate");
                g.push(kv("uuid", Sexpr::string(gate.uuid.to_string())));
                g.push(kv("symbol", Sexpr::string(gate.symbol.to_string())));
                v.push(g.build());
            }
            node.push(v.build());
        }
        node.build()
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &TransactionalDirectory {
        &self.directory
    }

    pub fn variant(&self, uuid: &Uuid) -> Option<&SymbolVariant> {
        self.variants.iter().find(|v| v.uuid == *uuid)
    }

    /// The name prefix for auto-generated instance names, honoring the
    /// destination's locale preference order.
    pub fn prefix_for(&self, locale_order: &[String]) -> &str {
        for locale in locale_order {
            if let Some(prefix) = self.prefixes.get(locale) {
                return prefix;
            }
        }
        self.prefixes.get("default").map(String::as_str).unwrap_or("U")
    }
}

/// A library symbol definition.
#[derive(Debug, Clone)]
pub struct Symbol {
    uuid: Uuid,
    name: String,
    directory: TransactionalDirectory,
}

impl Symbol {
    pub const FILE_NAME: &'static str = "symbol.lp";
    const TAG: &'static str = "sch_symbol";

    /// Create a symbol backed by a fresh directory containing its serialized
    /// form.
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Result<Self, LibraryError> {
        let symbol = Self {
            uuid,
            name: name.into(),
            directory: TransactionalDirectory::root(TransactionalFileSystem::new()),
        };
        symbol.directory.write_file(
            Self::FILE_NAME,
            sch_sexpr::formatter::format_tree(&symbol.serialize()).as_bytes(),
        )?;
        Ok(symbol)
    }

    /// Reconstruct a symbol from a directory holding `symbol.lp`.
    pub fn from_directory(directory: TransactionalDirectory) -> Result<Self, LibraryError> {
        let content = directory
            .read_file(Self::FILE_NAME)
            .map_err(|_| LibraryError::MissingFile(Self::FILE_NAME))?;
        let text = String::from_utf8(content).map_err(|_| LibraryError::NotUtf8)?;
        let root = sch_sexpr::parse(&text)?;
        if root.tag() != Some(Self::TAG) {
            return Err(LibraryError::UnexpectedTag(
                root.tag().unwrap_or_default().to_string(),
            ));
        }
        let items = root.as_list().unwrap_or_default();
        Ok(Self {
            uuid: uuid_field(items, "uuid")?,
            name: str_field(items, "name")?,
            directory,
        })
    }

    fn serialize(&self) -> Sexpr {
        let mut node = ListBuilder::node(Self::TAG);
        node.push(kv("uuid", Sexpr::string(self.uuid.to_string())));
        node.push(kv("name", Sexpr::string(&*self.name)));
        node.build()
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &TransactionalDirectory {
        &self.directory
    }
}

/// The project-local library: every element the project's documents may
/// reference must be present here.
#[derive(Debug, Default)]
pub struct ProjectLibrary {
    components: BTreeMap<Uuid, Component>,
    symbols: BTreeMap<Uuid, Symbol>,
}

impl ProjectLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(&self, uuid: &Uuid) -> Option<&Component> {
        self.components.get(uuid)
    }

    pub fn symbol(&self, uuid: &Uuid) -> Option<&Symbol> {
        self.symbols.get(uuid)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn add_component(&mut self, component: Component) -> Result<(), LibraryError> {
        if self.components.contains_key(&component.uuid()) {
            return Err(LibraryError::DuplicateElement(component.uuid()));
        }
        log::debug!("Adding library component {}", component.uuid());
        self.components.insert(component.uuid(), component);
        Ok(())
    }

    pub fn remove_component(&mut self, uuid: &Uuid) -> Option<Component> {
        self.components.remove(uuid)
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<(), LibraryError> {
        if self.symbols.contains_key(&symbol.uuid()) {
            return Err(LibraryError::DuplicateElement(symbol.uuid()));
        }
        log::debug!("Adding library symbol {}", symbol.uuid());
        self.symbols.insert(symbol.uuid(), symbol);
        Ok(())
    }

    pub fn remove_symbol(&mut self, uuid: &Uuid) -> Option<Symbol> {
        self.symbols.remove(uuid)
    }
}

fn field<'a>(items: &'a [Sexpr], name: &'static str) -> Result<&'a [Sexpr], LibraryError> {
    sch_sexpr::find_child_list(items, name).ok_or(LibraryError::MissingField(name))
}

fn str_field(items: &[Sexpr], name: &'static str) -> Result<String, LibraryError> {
    field(items, name)?
        .get(1)
        .and_then(Sexpr::as_str)
        .map(str::to_string)
        .ok_or(LibraryError::MissingField(name))
}

fn uuid_field(items: &[Sexpr], name: &'static str) -> Result<Uuid, LibraryError> {
    Ok(Uuid::parse_str(&str_field(items, name)?)?)
}
