//! Undo/redo command plumbing.
//!
//! Commands mutate the [`Project`] they are given and must be able to revert
//! exactly what they applied. The stack owns executed commands as trait
//! objects, so command errors cross this seam as `anyhow::Error`; typed
//! errors remain available on the concrete command types.

use crate::project::Project;

/// A reversible editing operation.
pub trait UndoCommand {
    /// Human-readable description for the undo history UI.
    fn description(&self) -> &str;

    /// Apply the command. Returns `false` for a benign no-op (nothing was
    /// changed, the command need not enter the history). On error the
    /// command must leave the project exactly as it was.
    fn execute(&mut self, project: &mut Project) -> anyhow::Result<bool>;

    /// Revert an executed command.
    fn undo(&mut self, project: &mut Project) -> anyhow::Result<()>;

    /// Re-apply an undone command.
    fn redo(&mut self, project: &mut Project) -> anyhow::Result<()>;
}

/// An undo history holding executed commands as single units.
#[derive(Default)]
pub struct UndoStack {
    done: Vec<Box<dyn UndoCommand>>,
    undone: Vec<Box<dyn UndoCommand>>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a command and, if it changed anything, push it onto the
    /// stack. No-op commands are dropped.
    pub fn execute(
        &mut self,
        mut command: Box<dyn UndoCommand>,
        project: &mut Project,
    ) -> anyhow::Result<bool> {
        let applied = command.execute(project)?;
        if applied {
            log::debug!("Executed undoable command: {}", command.description());
            self.done.push(command);
            self.undone.clear();
        }
        Ok(applied)
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo(&mut self, project: &mut Project) -> anyhow::Result<bool> {
        let Some(mut command) = self.done.pop() else {
            return Ok(false);
        };
        command.undo(project)?;
        self.undone.push(command);
        Ok(true)
    }

    pub fn redo(&mut self, project: &mut Project) -> anyhow::Result<bool> {
        let Some(mut command) = self.undone.pop() else {
            return Ok(false);
        };
        command.redo(project)?;
        self.done.push(command);
        Ok(true)
    }
}
