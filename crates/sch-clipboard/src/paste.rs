//! The paste transaction: replays a snapshot into a destination document as
//! one atomic, undoable operation.
//!
//! Every mutation is recorded as a tagged reversible step. If any step
//! fails, all already-applied steps are undone in reverse order before the
//! error is returned, so a failed paste leaves the destination exactly as it
//! was.

use std::collections::HashMap;

use sch_project::fs::{StorageError, TransactionalDirectory, TransactionalFileSystem};
use sch_project::{
    Component, ComponentInstance, LibraryError, Point, Project, Symbol, SymbolPlacement,
    UndoCommand,
};
use sch_project::circuit::CircuitError;
use sch_project::schematic::SchematicError;
use thiserror::Error;
use uuid::Uuid;

use crate::snapshot::ClipboardSnapshot;

#[derive(Debug, Error)]
pub enum PasteError {
    #[error("paste transaction was already executed")]
    AlreadyExecuted,

    #[error("paste transaction is not in a state that allows this operation")]
    InvalidState,

    #[error("unknown target schematic {0}")]
    UnknownSchematic(Uuid),

    #[error("snapshot asset tree has invalid directory name `{0}`")]
    InvalidAssetDirectory(String),

    #[error("staged directory for {directory} holds library element {element}")]
    AssetIdentifierMismatch { directory: Uuid, element: Uuid },

    #[error("snapshot does not provide library component {0}")]
    MissingLibraryComponent(Uuid),

    #[error("snapshot does not provide library symbol {0}")]
    MissingLibrarySymbol(Uuid),

    #[error("library component {component} has no symbol variant {variant}")]
    MissingSymbolVariant { component: Uuid, variant: Uuid },

    #[error("symbol variant {variant} has no gate {gate}")]
    MissingVariantGate { variant: Uuid, gate: Uuid },

    #[error(
        "symbol placement {placement} references component instance {component} \
         missing from the snapshot"
    )]
    DanglingComponentInstance { placement: Uuid, component: Uuid },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Circuit(#[from] CircuitError),

    #[error(transparent)]
    Schematic(#[from] SchematicError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Executing,
    Committed,
    RolledBack,
}

/// One applied mutation, carrying enough state to reverse itself. Undoing a
/// step stashes the removed entity so redo can reinsert it.
#[derive(Debug)]
enum PasteStep {
    AddLibraryComponent {
        uuid: Uuid,
        stashed: Option<Component>,
    },
    AddLibrarySymbol {
        uuid: Uuid,
        stashed: Option<Symbol>,
    },
    AddComponentInstance {
        uuid: Uuid,
        stashed: Option<ComponentInstance>,
    },
    AddSymbolPlacement {
        schematic: Uuid,
        uuid: Uuid,
        stashed: Option<SymbolPlacement>,
    },
}

impl PasteStep {
    /// Compensate this step. Tolerates entities that have already vanished,
    /// so a partially applied transaction can always be rolled back.
    fn undo(&mut self, project: &mut Project) {
        match self {
            PasteStep::AddLibraryComponent { uuid, stashed } => {
                match project.library_mut().remove_component(uuid) {
                    Some(component) => *stashed = Some(component),
                    None => log::warn!("library component {uuid} vanished before undo"),
                }
            }
            PasteStep::AddLibrarySymbol { uuid, stashed } => {
                match project.library_mut().remove_symbol(uuid) {
                    Some(symbol) => *stashed = Some(symbol),
                    None => log::warn!("library symbol {uuid} vanished before undo"),
                }
            }
            PasteStep::AddComponentInstance { uuid, stashed } => {
                match project.circuit_mut().remove_component_instance(uuid) {
                    Some(instance) => *stashed = Some(instance),
                    None => log::warn!("component instance {uuid} vanished before undo"),
                }
            }
            PasteStep::AddSymbolPlacement {
                schematic,
                uuid,
                stashed,
            } => {
                match project
                    .schematic_mut(schematic)
                    .and_then(|s| s.remove_symbol_placement(uuid))
                {
                    Some(placement) => *stashed = Some(placement),
                    None => log::warn!("symbol placement {uuid} vanished before undo"),
                }
            }
        }
    }

    fn redo(&mut self, project: &mut Project) -> Result<(), PasteError> {
        match self {
            PasteStep::AddLibraryComponent { stashed, .. } => {
                let component = stashed.take().ok_or(PasteError::InvalidState)?;
                project.library_mut().add_component(component)?;
            }
            PasteStep::AddLibrarySymbol { stashed, .. } => {
                let symbol = stashed.take().ok_or(PasteError::InvalidState)?;
                project.library_mut().add_symbol(symbol)?;
            }
            PasteStep::AddComponentInstance { stashed, .. } => {
                let instance = stashed.take().ok_or(PasteError::InvalidState)?;
                project.circuit_mut().add_component_instance(instance)?;
            }
            PasteStep::AddSymbolPlacement {
                schematic, stashed, ..
            } => {
                let placement = stashed.take().ok_or(PasteError::InvalidState)?;
                project
                    .schematic_mut(schematic)
                    .ok_or(PasteError::UnknownSchematic(*schematic))?
                    .add_symbol_placement(placement)?;
            }
        }
        Ok(())
    }
}

/// Remap-table entry: the freshly minted instance standing in for a
/// snapshot-original component instance identifier.
#[derive(Debug, Clone, Copy)]
struct PastedInstance {
    uuid: Uuid,
    lib_component: Uuid,
    lib_variant: Uuid,
}

/// An atomic, undoable paste of one snapshot into one target schematic.
pub struct PasteTransaction {
    schematic: Uuid,
    snapshot: ClipboardSnapshot,
    offset: Point,
    steps: Vec<PasteStep>,
    state: TransactionState,
    /// Whether `execute()` ever committed. A failed execute also ends in
    /// `RolledBack`, but its partial step list must never be re-applied.
    committed: bool,
}

impl PasteTransaction {
    /// Prepare a paste of `snapshot` into the schematic `schematic` of a
    /// project, shifting every pasted coordinate by `offset`.
    pub fn new(schematic: Uuid, snapshot: ClipboardSnapshot, offset: Point) -> Self {
        Self {
            schematic,
            snapshot,
            offset,
            steps: Vec::new(),
            state: TransactionState::Pending,
            committed: false,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Execute the paste. Returns `Ok(true)` if at least one entity was
    /// placed, `Ok(false)` for a benign no-op (empty snapshot). On error the
    /// destination is left exactly as it was.
    pub fn execute(&mut self, project: &mut Project) -> Result<bool, PasteError> {
        if self.state != TransactionState::Pending {
            return Err(PasteError::AlreadyExecuted);
        }
        self.state = TransactionState::Executing;

        // Any fault below must compensate every already-applied step in
        // reverse order before surfacing.
        match self.apply(project) {
            Ok(()) => {
                self.state = TransactionState::Committed;
                self.committed = true;
                log::debug!("Paste committed with {} steps", self.steps.len());
                Ok(!self.steps.is_empty())
            }
            Err(err) => {
                log::debug!("Paste failed ({err}), rolling back {} steps", self.steps.len());
                for step in self.steps.iter_mut().rev() {
                    step.undo(project);
                }
                self.state = TransactionState::RolledBack;
                Err(err)
            }
        }
    }

    /// Revert a committed paste (for the undo history).
    pub fn undo(&mut self, project: &mut Project) -> Result<(), PasteError> {
        if self.state != TransactionState::Committed {
            return Err(PasteError::InvalidState);
        }
        for step in self.steps.iter_mut().rev() {
            step.undo(project);
        }
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    /// Re-apply an undone paste. If a step cannot be re-applied (the
    /// destination changed in a conflicting way), the already redone prefix
    /// is undone again and the error is returned.
    pub fn redo(&mut self, project: &mut Project) -> Result<(), PasteError> {
        if self.state != TransactionState::RolledBack || !self.committed {
            return Err(PasteError::InvalidState);
        }
        for i in 0..self.steps.len() {
            if let Err(err) = self.steps[i].redo(project) {
                for step in self.steps[..i].iter_mut().rev() {
                    step.undo(project);
                }
                return Err(err);
            }
        }
        self.state = TransactionState::Committed;
        Ok(())
    }

    fn apply(&mut self, project: &mut Project) -> Result<(), PasteError> {
        if project.schematic(&self.schematic).is_none() {
            return Err(PasteError::UnknownSchematic(self.schematic));
        }

        self.import_library_assets(project)?;

        // Component instances always get fresh identifiers, even when
        // pasting back into the source document: a duplicate must never
        // collide with its original.
        let mut remap: HashMap<Uuid, PastedInstance> = HashMap::new();
        for record in self.snapshot.component_instances().to_vec() {
            let name = {
                let lib_component = project
                    .library()
                    .component(&record.lib_component)
                    .ok_or(PasteError::MissingLibraryComponent(record.lib_component))?;
                if project
                    .circuit()
                    .component_instance_by_name(&record.name)
                    .is_some()
                {
                    let prefix = lib_component.prefix_for(&project.settings().locale_order);
                    project.circuit().generate_auto_name(prefix)
                } else {
                    record.name.clone()
                }
            };

            let uuid = Uuid::new_v4();
            remap.insert(
                record.uuid,
                PastedInstance {
                    uuid,
                    lib_component: record.lib_component,
                    lib_variant: record.lib_variant,
                },
            );
            project.circuit_mut().add_component_instance(ComponentInstance {
                uuid,
                lib_component: record.lib_component,
                lib_variant: record.lib_variant,
                lib_device: record.lib_device,
                name,
                value: record.value,
                attributes: record.attributes,
                signal_map: record.signal_map,
            })?;
            self.steps.push(PasteStep::AddComponentInstance {
                uuid,
                stashed: None,
            });
        }

        let same_document = self.snapshot.schematic_uuid() == self.schematic;
        for record in self.snapshot.symbol_placements().to_vec() {
            // A record whose owner is not in the remap table means the
            // snapshot is internally inconsistent; substituting some other
            // instance would silently corrupt the document.
            let owner = remap
                .get(&record.component_instance)
                .copied()
                .ok_or(PasteError::DanglingComponentInstance {
                    placement: record.uuid,
                    component: record.component_instance,
                })?;

            let lib_symbol = {
                let component = project
                    .library()
                    .component(&owner.lib_component)
                    .ok_or(PasteError::MissingLibraryComponent(owner.lib_component))?;
                let variant = component.variant(&owner.lib_variant).ok_or(
                    PasteError::MissingSymbolVariant {
                        component: owner.lib_component,
                        variant: owner.lib_variant,
                    },
                )?;
                let gate =
                    variant
                        .gate(&record.variant_gate)
                        .ok_or(PasteError::MissingVariantGate {
                            variant: owner.lib_variant,
                            gate: record.variant_gate,
                        })?;
                gate.symbol
            };
            if project.library().symbol(&lib_symbol).is_none() {
                return Err(PasteError::MissingLibrarySymbol(lib_symbol));
            }

            let schematic = project
                .schematic_mut(&self.schematic)
                .ok_or(PasteError::UnknownSchematic(self.schematic))?;

            // Reuse the snapshot's identifier only for a collision-free
            // paste back into the source schematic, so cut+paste within one
            // document keeps identities stable.
            let uuid = if same_document && schematic.symbol_placement(&record.uuid).is_none() {
                record.uuid
            } else {
                Uuid::new_v4()
            };

            schematic.add_symbol_placement(SymbolPlacement {
                uuid,
                component_instance: owner.uuid,
                variant_gate: record.variant_gate,
                lib_symbol,
                position: record.position + self.offset,
                rotation: record.rotation,
                mirrored: record.mirrored,
                // Selected immediately so the destination UI can offer
                // interactive dragging of the pasted items.
                selected: true,
            })?;
            self.steps.push(PasteStep::AddSymbolPlacement {
                schematic: self.schematic,
                uuid,
                stashed: None,
            });
        }

        Ok(())
    }

    /// Import staged library elements the destination library is missing.
    /// Elements already present by identifier are left untouched.
    fn import_library_assets(&mut self, project: &mut Project) -> Result<(), PasteError> {
        let cmp_dir = self.snapshot.directory("cmp")?;
        for dirname in cmp_dir.dir_names() {
            let uuid = Uuid::parse_str(&dirname)
                .map_err(|_| PasteError::InvalidAssetDirectory(dirname.clone()))?;
            if project.library().component(&uuid).is_some() {
                continue;
            }
            let staging = TransactionalDirectory::root(TransactionalFileSystem::new());
            cmp_dir.subdir(&dirname)?.copy_to(&staging)?;
            let component = Component::from_directory(staging)?;
            // The element must carry the identifier its directory is keyed
            // by, otherwise the presence check above and the rollback step
            // below would track the wrong entity.
            if component.uuid() != uuid {
                return Err(PasteError::AssetIdentifierMismatch {
                    directory: uuid,
                    element: component.uuid(),
                });
            }
            project.library_mut().add_component(component)?;
            self.steps.push(PasteStep::AddLibraryComponent {
                uuid,
                stashed: None,
            });
        }

        let sym_dir = self.snapshot.directory("sym")?;
        for dirname in sym_dir.dir_names() {
            let uuid = Uuid::parse_str(&dirname)
                .map_err(|_| PasteError::InvalidAssetDirectory(dirname.clone()))?;
            if project.library().symbol(&uuid).is_some() {
                continue;
            }
            let staging = TransactionalDirectory::root(TransactionalFileSystem::new());
            sym_dir.subdir(&dirname)?.copy_to(&staging)?;
            let symbol = Symbol::from_directory(staging)?;
            if symbol.uuid() != uuid {
                return Err(PasteError::AssetIdentifierMismatch {
                    directory: uuid,
                    element: symbol.uuid(),
                });
            }
            project.library_mut().add_symbol(symbol)?;
            self.steps.push(PasteStep::AddLibrarySymbol {
                uuid,
                stashed: None,
            });
        }

        Ok(())
    }
}

impl UndoCommand for PasteTransaction {
    fn description(&self) -> &str {
        "Paste schematic items"
    }

    fn execute(&mut self, project: &mut Project) -> anyhow::Result<bool> {
        Ok(PasteTransaction::execute(self, project)?)
    }

    fn undo(&mut self, project: &mut Project) -> anyhow::Result<()> {
        Ok(PasteTransaction::undo(self, project)?)
    }

    fn redo(&mut self, project: &mut Project) -> anyhow::Result<()> {
        Ok(PasteTransaction::redo(self, project)?)
    }
}
