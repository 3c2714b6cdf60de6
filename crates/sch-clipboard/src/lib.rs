//! Copy/paste engine for schematic editing.
//!
//! Three pieces cooperate here:
//!
//! - [`snapshot::ClipboardSnapshot`] — the portable capture of selected
//!   entities plus the library assets they depend on, serializable to a
//!   versioned clipboard payload.
//! - [`builder::SnapshotBuilder`] — walks a selection of a live document and
//!   produces a snapshot, computing and deduplicating the dependency closure
//!   of referenced library elements.
//! - [`paste::PasteTransaction`] — replays a snapshot into a destination
//!   document as one atomic, undoable operation with identifier
//!   reconciliation; any failure rolls back every applied step.
//!
//! Everything runs synchronously on the thread owning the destination
//! document; callers must not mutate the document while a transaction
//! executes.

pub mod builder;
pub mod paste;
pub mod snapshot;

pub use builder::{BuildError, SnapshotBuilder};
pub use paste::{PasteError, PasteTransaction, TransactionState};
pub use snapshot::{
    ClipboardSnapshot, ComponentInstanceRecord, NetSignalRecord, PortablePayload, SnapshotError,
    SymbolPlacementRecord, mime_type,
};
