//! In-memory schematic project model.
//!
//! This crate holds the live, mutable object graph an interactive schematic
//! editor operates on: the logical [`circuit::Circuit`], the project-local
//! [`library::ProjectLibrary`], [`schematic::Schematic`] pages with their
//! symbol placements, and the [`undo::UndoCommand`] seam editing operations
//! plug into.
//!
//! Entities reference each other by [`uuid::Uuid`], never by pointer; all
//! lookups go through the owning container. The graph is single-writer,
//! single-thread: nothing here is `Send`, and the asset store shares its
//! tree via `Rc`.

pub mod circuit;
pub mod fs;
pub mod geometry;
pub mod library;
pub mod project;
pub mod schematic;
pub mod undo;

pub use circuit::{Attribute, Circuit, CircuitError, ComponentInstance, NetSignal};
pub use fs::{StorageError, TransactionalDirectory, TransactionalFileSystem};
pub use geometry::{Angle, Point};
pub use library::{Component, LibraryError, ProjectLibrary, Symbol, SymbolVariant, SymbolVariantGate};
pub use project::{Project, ProjectError, ProjectSettings};
pub use schematic::{Schematic, SchematicError, SelectionQuery, SymbolPlacement};
pub use undo::{UndoCommand, UndoStack};
