//! The project root object tying circuit, library and schematics together.

use thiserror::Error;
use uuid::Uuid;

use crate::circuit::Circuit;
use crate::library::ProjectLibrary;
use crate::schematic::Schematic;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project already contains schematic {0}")]
    DuplicateSchematic(Uuid),
}

/// Per-project settings that influence editing behavior.
#[derive(Debug, Clone, Default)]
pub struct ProjectSettings {
    /// Preferred locales, most preferred first (e.g. `["de_DE", "en_US"]`).
    /// Used to pick locale-dependent library data such as name prefixes.
    pub locale_order: Vec<String>,
}

/// One open project: the single-writer, single-thread object graph all
/// editing operations mutate.
#[derive(Debug, Default)]
pub struct Project {
    circuit: Circuit,
    library: ProjectLibrary,
    schematics: Vec<Schematic>,
    settings: ProjectSettings,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn library(&self) -> &ProjectLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut ProjectLibrary {
        &mut self.library
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ProjectSettings {
        &mut self.settings
    }

    pub fn schematics(&self) -> &[Schematic] {
        &self.schematics
    }

    pub fn schematic(&self, uuid: &Uuid) -> Option<&Schematic> {
        self.schematics.iter().find(|s| s.uuid() == *uuid)
    }

    pub fn schematic_mut(&mut self, uuid: &Uuid) -> Option<&mut Schematic> {
        self.schematics.iter_mut().find(|s| s.uuid() == *uuid)
    }

    pub fn add_schematic(&mut self, schematic: Schematic) -> Result<(), ProjectError> {
        if self.schematic(&schematic.uuid()).is_some() {
            return Err(ProjectError::DuplicateSchematic(schematic.uuid()));
        }
        self.schematics.push(schematic);
        Ok(())
    }
}
