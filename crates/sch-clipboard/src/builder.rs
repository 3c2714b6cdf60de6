//! Builds a clipboard snapshot from the current selection.

use itertools::Itertools;

use sch_project::fs::StorageError;
use sch_project::{Point, Project, Schematic, SelectionQuery};
use thiserror::Error;
use uuid::Uuid;

use crate::snapshot::{
    ClipboardSnapshot, ComponentInstanceRecord, NetSignalRecord, SymbolPlacementRecord,
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("symbol placement {placement} references unknown component instance {component}")]
    UnknownComponentInstance { placement: Uuid, component: Uuid },

    #[error("component instance {instance} references unknown library component {component}")]
    UnknownLibraryComponent { instance: Uuid, component: Uuid },

    #[error("symbol placement {placement} references unknown library symbol {symbol}")]
    UnknownLibrarySymbol { placement: Uuid, symbol: Uuid },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Walks a selection and produces a self-contained [`ClipboardSnapshot`],
/// copying the dependency closure of referenced library elements into the
/// snapshot's asset tree. Has no side effects outside the returned value.
pub struct SnapshotBuilder<'a> {
    project: &'a Project,
    schematic: &'a Schematic,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(project: &'a Project, schematic: &'a Schematic) -> Self {
        Self { project, schematic }
    }

    /// Build a snapshot of the queried selection. An empty selection yields
    /// a snapshot with empty record lists and an empty asset tree.
    pub fn build(
        &self,
        selection: &SelectionQuery<'_>,
        cursor_position: Point,
    ) -> Result<ClipboardSnapshot, BuildError> {
        let mut snapshot = ClipboardSnapshot::new(self.schematic.uuid(), cursor_position);

        // The full net-signal set of the circuit is captured, not just
        // selected nets: signals are cheap and may be referenced later.
        for signal in self.project.circuit().net_signals() {
            snapshot.push_net_signal(NetSignalRecord {
                uuid: signal.uuid,
                name: signal.name.clone(),
                auto_named: signal.auto_named,
            });
        }

        // Resolve the owning component instance of every selected symbol up
        // front so that the record pass below can iterate *distinct*
        // instances: an instance referenced by several selected symbols must
        // appear exactly once in the record list.
        let mut owners = Vec::new();
        for placement in selection.symbols() {
            let instance = self
                .project
                .circuit()
                .component_instance_by_uuid(&placement.component_instance)
                .ok_or(BuildError::UnknownComponentInstance {
                    placement: placement.uuid,
                    component: placement.component_instance,
                })?;
            owners.push(instance);
        }

        for instance in owners.into_iter().unique_by(|i| i.uuid) {
            let lib_component = self
                .project
                .library()
                .component(&instance.lib_component)
                .ok_or(BuildError::UnknownLibraryComponent {
                    instance: instance.uuid,
                    component: instance.lib_component,
                })?;

            let staged = snapshot.directory(&format!("cmp/{}", lib_component.uuid()))?;
            if staged.file_names().is_empty() {
                lib_component.directory().copy_to(&staged)?;
            }

            snapshot.push_component_instance(ComponentInstanceRecord {
                uuid: instance.uuid,
                lib_component: instance.lib_component,
                lib_variant: instance.lib_variant,
                lib_device: instance.lib_device,
                name: instance.name.clone(),
                value: instance.value.clone(),
                attributes: instance.attributes.clone(),
                // TODO: capture pin-to-net bindings once paste can re-link
                // them; see the signal map handling in the paste transaction.
                signal_map: Default::default(),
            });
        }

        for placement in selection.symbols() {
            let lib_symbol = self
                .project
                .library()
                .symbol(&placement.lib_symbol)
                .ok_or(BuildError::UnknownLibrarySymbol {
                    placement: placement.uuid,
                    symbol: placement.lib_symbol,
                })?;

            let staged = snapshot.directory(&format!("sym/{}", lib_symbol.uuid()))?;
            if staged.file_names().is_empty() {
                lib_symbol.directory().copy_to(&staged)?;
            }

            snapshot.push_symbol_placement(SymbolPlacementRecord {
                uuid: placement.uuid,
                component_instance: placement.component_instance,
                variant_gate: placement.variant_gate,
                position: placement.position,
                rotation: placement.rotation,
                mirrored: placement.mirrored,
            });
        }

        log::debug!(
            "Built clipboard snapshot: {} net signals, {} component instances, {} symbols",
            snapshot.net_signals().len(),
            snapshot.component_instances().len(),
            snapshot.symbol_placements().len()
        );
        Ok(snapshot)
    }
}
