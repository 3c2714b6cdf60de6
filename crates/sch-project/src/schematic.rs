//! Schematic documents and symbol placements.

use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{Angle, Point};

#[derive(Debug, Error)]
pub enum SchematicError {
    #[error("schematic already contains symbol placement {0}")]
    DuplicatePlacement(Uuid),
}

/// One graphical symbol instance on a schematic, belonging to a component
/// instance. References are by identifier, never by pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPlacement {
    pub uuid: Uuid,
    /// Owning component instance in the circuit.
    pub component_instance: Uuid,
    /// Gate of the component's symbol variant this placement draws.
    pub variant_gate: Uuid,
    /// Library symbol backing this placement.
    pub lib_symbol: Uuid,
    pub position: Point,
    pub rotation: Angle,
    pub mirrored: bool,
    pub selected: bool,
}

/// One schematic page of a project.
#[derive(Debug)]
pub struct Schematic {
    uuid: Uuid,
    name: String,
    placements: Vec<SymbolPlacement>,
}

impl Schematic {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            placements: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol_placements(&self) -> &[SymbolPlacement] {
        &self.placements
    }

    pub fn symbol_placement(&self, uuid: &Uuid) -> Option<&SymbolPlacement> {
        self.placements.iter().find(|p| p.uuid == *uuid)
    }

    pub fn symbol_placement_mut(&mut self, uuid: &Uuid) -> Option<&mut SymbolPlacement> {
        self.placements.iter_mut().find(|p| p.uuid == *uuid)
    }

    pub fn add_symbol_placement(
        &mut self,
        placement: SymbolPlacement,
    ) -> Result<(), SchematicError> {
        if self.symbol_placement(&placement.uuid).is_some() {
            return Err(SchematicError::DuplicatePlacement(placement.uuid));
        }
        log::debug!("Adding symbol placement {}", placement.uuid);
        self.placements.push(placement);
        Ok(())
    }

    pub fn remove_symbol_placement(&mut self, uuid: &Uuid) -> Option<SymbolPlacement> {
        let idx = self.placements.iter().position(|p| p.uuid == *uuid)?;
        Some(self.placements.remove(idx))
    }

    /// Start a selection query over this schematic.
    pub fn create_selection_query(&self) -> SelectionQuery<'_> {
        SelectionQuery {
            schematic: self,
            symbols: Vec::new(),
        }
    }
}

/// Collects selected items of a schematic for further processing.
#[derive(Debug)]
pub struct SelectionQuery<'a> {
    schematic: &'a Schematic,
    symbols: Vec<Uuid>,
}

impl<'a> SelectionQuery<'a> {
    /// Add all currently selected symbol placements to the query result.
    pub fn add_selected_symbols(&mut self) {
        for placement in &self.schematic.placements {
            if placement.selected && !self.symbols.contains(&placement.uuid) {
                self.symbols.push(placement.uuid);
            }
        }
    }

    /// The queried symbol placements, in schematic order.
    pub fn symbols(&self) -> impl Iterator<Item = &'a SymbolPlacement> + '_ {
        self.symbols
            .iter()
            .filter_map(|uuid| self.schematic.symbol_placement(uuid))
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(selected: bool) -> SymbolPlacement {
        SymbolPlacement {
            uuid: Uuid::new_v4(),
            component_instance: Uuid::new_v4(),
            variant_gate: Uuid::new_v4(),
            lib_symbol: Uuid::new_v4(),
            position: Point::new(0, 0),
            rotation: Angle::default(),
            mirrored: false,
            selected,
        }
    }

    #[test]
    fn selection_query_returns_only_selected() {
        let mut schematic = Schematic::new(Uuid::new_v4(), "Main");
        let selected = placement(true);
        let selected_uuid = selected.uuid;
        schematic.add_symbol_placement(selected).unwrap();
        schematic.add_symbol_placement(placement(false)).unwrap();

        let mut query = schematic.create_selection_query();
        query.add_selected_symbols();
        let found: Vec<_> = query.symbols().map(|p| p.uuid).collect();
        assert_eq!(found, vec![selected_uuid]);
    }

    #[test]
    fn duplicate_placements_are_rejected() {
        let mut schematic = Schematic::new(Uuid::new_v4(), "Main");
        let p = placement(false);
        let dup = p.clone();
        schematic.add_symbol_placement(p).unwrap();
        assert!(matches!(
            schematic.add_symbol_placement(dup),
            Err(SchematicError::DuplicatePlacement(_))
        ));
    }
}
