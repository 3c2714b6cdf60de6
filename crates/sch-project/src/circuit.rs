//! The logical circuit model: net signals and component instances.

use std::collections::BTreeMap;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("circuit already contains component instance {0}")]
    DuplicateInstance(Uuid),

    #[error("circuit already contains a component instance named `{0}`")]
    DuplicateName(String),

    #[error("circuit already contains net signal {0}")]
    DuplicateNetSignal(Uuid),
}

/// A logical electrical net.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetSignal {
    pub uuid: Uuid,
    pub name: String,
    /// True when the name was generated (e.g. `N#42`) rather than set by the
    /// user.
    pub auto_named: bool,
}

/// A free-form key/value attribute on a component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// One placed circuit component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInstance {
    pub uuid: Uuid,
    pub lib_component: Uuid,
    pub lib_variant: Uuid,
    pub lib_device: Option<Uuid>,
    pub name: String,
    pub value: String,
    pub attributes: Vec<Attribute>,
    /// Component signal → connected net signal (if any).
    pub signal_map: BTreeMap<Uuid, Option<Uuid>>,
}

/// The circuit of one project. Insertion order of both lists is preserved.
#[derive(Debug, Default)]
pub struct Circuit {
    net_signals: Vec<NetSignal>,
    component_instances: Vec<ComponentInstance>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn net_signals(&self) -> &[NetSignal] {
        &self.net_signals
    }

    pub fn add_net_signal(&mut self, signal: NetSignal) -> Result<(), CircuitError> {
        if self.net_signals.iter().any(|s| s.uuid == signal.uuid) {
            return Err(CircuitError::DuplicateNetSignal(signal.uuid));
        }
        self.net_signals.push(signal);
        Ok(())
    }

    pub fn component_instances(&self) -> &[ComponentInstance] {
        &self.component_instances
    }

    pub fn component_instance_by_uuid(&self, uuid: &Uuid) -> Option<&ComponentInstance> {
        self.component_instances.iter().find(|i| i.uuid == *uuid)
    }

    pub fn component_instance_by_name(&self, name: &str) -> Option<&ComponentInstance> {
        self.component_instances.iter().find(|i| i.name == name)
    }

    pub fn add_component_instance(
        &mut self,
        instance: ComponentInstance,
    ) -> Result<(), CircuitError> {
        if self.component_instance_by_uuid(&instance.uuid).is_some() {
            return Err(CircuitError::DuplicateInstance(instance.uuid));
        }
        if self.component_instance_by_name(&instance.name).is_some() {
            return Err(CircuitError::DuplicateName(instance.name));
        }
        log::debug!(
            "Adding component instance {} ({})",
            instance.name,
            instance.uuid
        );
        self.component_instances.push(instance);
        Ok(())
    }

    pub fn remove_component_instance(&mut self, uuid: &Uuid) -> Option<ComponentInstance> {
        let idx = self.component_instances.iter().position(|i| i.uuid == *uuid)?;
        Some(self.component_instances.remove(idx))
    }

    /// The smallest unused name of the form `{prefix}{n}`, n starting at 1.
    pub fn generate_auto_name(&self, prefix: &str) -> String {
        for n in 1.. {
            let candidate = format!("{prefix}{n}");
            if self.component_instance_by_name(&candidate).is_none() {
                return candidate;
            }
        }
        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(name: &str) -> ComponentInstance {
        ComponentInstance {
            uuid: Uuid::new_v4(),
            lib_component: Uuid::new_v4(),
            lib_variant: Uuid::new_v4(),
            lib_device: None,
            name: name.to_string(),
            value: String::new(),
            attributes: Vec::new(),
            signal_map: BTreeMap::new(),
        }
    }

    #[test]
    fn auto_name_skips_taken_names() {
        let mut circuit = Circuit::new();
        circuit.add_component_instance(instance("R1")).unwrap();
        circuit.add_component_instance(instance("R2")).unwrap();
        circuit.add_component_instance(instance("R4")).unwrap();
        assert_eq!(circuit.generate_auto_name("R"), "R3");
        assert_eq!(circuit.generate_auto_name("C"), "C1");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut circuit = Circuit::new();
        circuit.add_component_instance(instance("R1")).unwrap();
        assert!(matches!(
            circuit.add_component_instance(instance("R1")),
            Err(CircuitError::DuplicateName(_))
        ));
    }

    #[test]
    fn remove_returns_the_instance() {
        let mut circuit = Circuit::new();
        let inst = instance("R1");
        let uuid = inst.uuid;
        circuit.add_component_instance(inst).unwrap();
        let removed = circuit.remove_component_instance(&uuid).unwrap();
        assert_eq!(removed.name, "R1");
        assert!(circuit.component_instance_by_uuid(&uuid).is_none());
    }
}
