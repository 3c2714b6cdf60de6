//! The clipboard snapshot: a portable, self-contained capture of selected
//! schematic entities plus the library assets they depend on.
//!
//! A snapshot serializes to a structured S-expression text with
//! deterministic field order; the staged asset tree travels out-of-band as a
//! flat `path → bytes` map. Both halves together form a
//! [`PortablePayload`] guarded by a versioned MIME-style type tag, so
//! payloads written by an incompatible application version read back as
//! *absent* rather than being misinterpreted.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use sch_project::fs::{StorageError, TransactionalDirectory, TransactionalFileSystem};
use sch_project::{Angle, Attribute, Point};
use sch_sexpr::{ListBuilder, Sexpr, kv};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const ROOT_TAG: &str = "sch_clipboard_symbol";

/// The exact clipboard type tag produced and accepted by this build.
pub fn mime_type() -> String {
    format!(
        "application/x-sch-clipboard.symbol; version={}",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed clipboard payload: {0}")]
    Parse(#[from] sch_sexpr::ParseError),

    #[error("clipboard payload has unexpected root tag `{0}`")]
    UnexpectedTag(String),

    #[error("clipboard payload is missing field `{0}`")]
    MissingField(&'static str),

    #[error("clipboard payload has an invalid value for `{0}`")]
    InvalidField(&'static str),

    #[error("invalid uuid in clipboard payload: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A net signal captured at snapshot time. Purely informational for now:
/// pasted component instances are not re-linked to nets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetSignalRecord {
    pub uuid: Uuid,
    pub name: String,
    pub auto_named: bool,
}

/// One captured component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInstanceRecord {
    pub uuid: Uuid,
    pub lib_component: Uuid,
    pub lib_variant: Uuid,
    pub lib_device: Option<Uuid>,
    pub name: String,
    pub value: String,
    pub attributes: Vec<Attribute>,
    pub signal_map: BTreeMap<Uuid, Option<Uuid>>,
}

/// One captured symbol placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPlacementRecord {
    pub uuid: Uuid,
    pub component_instance: Uuid,
    pub variant_gate: Uuid,
    pub position: Point,
    pub rotation: Angle,
    pub mirrored: bool,
}

/// The two-part portable form of a snapshot: structured text plus the staged
/// asset files, tagged with the producing application version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortablePayload {
    pub mime_type: String,
    pub text: String,
    pub files: BTreeMap<String, Vec<u8>>,
}

/// A snapshot of selected schematic entities and their library assets.
///
/// Populated once (by the builder or by parsing a payload), then read-only.
/// Record lists preserve insertion order.
#[derive(Debug, PartialEq)]
pub struct ClipboardSnapshot {
    schematic: Uuid,
    cursor_position: Point,
    net_signals: Vec<NetSignalRecord>,
    component_instances: Vec<ComponentInstanceRecord>,
    symbol_placements: Vec<SymbolPlacementRecord>,
    fs: Rc<RefCell<TransactionalFileSystem>>,
}

impl ClipboardSnapshot {
    /// An empty snapshot seeded with the source schematic and the cursor
    /// position at capture time.
    pub fn new(schematic: Uuid, cursor_position: Point) -> Self {
        Self {
            schematic,
            cursor_position,
            net_signals: Vec::new(),
            component_instances: Vec::new(),
            symbol_placements: Vec::new(),
            fs: TransactionalFileSystem::new(),
        }
    }

    pub fn schematic_uuid(&self) -> Uuid {
        self.schematic
    }

    pub fn cursor_position(&self) -> Point {
        self.cursor_position
    }

    pub fn net_signals(&self) -> &[NetSignalRecord] {
        &self.net_signals
    }

    pub fn component_instances(&self) -> &[ComponentInstanceRecord] {
        &self.component_instances
    }

    pub fn symbol_placements(&self) -> &[SymbolPlacementRecord] {
        &self.symbol_placements
    }

    pub fn push_net_signal(&mut self, record: NetSignalRecord) {
        self.net_signals.push(record);
    }

    pub fn push_component_instance(&mut self, record: ComponentInstanceRecord) {
        self.component_instances.push(record);
    }

    pub fn push_symbol_placement(&mut self, record: SymbolPlacementRecord) {
        self.symbol_placements.push(record);
    }

    /// A handle into the staged asset tree, scoped to `path`
    /// (e.g. `"cmp/<uuid>"`).
    pub fn directory(&self, path: &str) -> Result<TransactionalDirectory, StorageError> {
        TransactionalDirectory::new(Rc::clone(&self.fs), path)
    }

    /// Serialize the structured-text half of the snapshot. Asset file
    /// contents are not embedded; they travel in the payload's file map.
    pub fn serialize(&self) -> String {
        sch_sexpr::formatter::format_tree(&self.to_sexpr())
    }

    /// Parse the structured-text half of a snapshot (with an empty asset
    /// tree).
    pub fn parse(text: &str) -> Result<Self, SnapshotError> {
        let root = sch_sexpr::parse(text)?;
        Self::from_sexpr(&root)
    }

    /// Wrap the snapshot into its portable clipboard form.
    pub fn to_portable_payload(&self) -> PortablePayload {
        PortablePayload {
            mime_type: mime_type(),
            text: self.serialize(),
            files: self.fs.borrow().file_entries(),
        }
    }

    /// Unwrap a portable payload.
    ///
    /// Returns `Ok(None)` when the payload does not carry this build's exact
    /// type tag (foreign or incompatible-version data is "nothing to
    /// paste", not an error). A matching tag with malformed content is a
    /// [`SnapshotError`].
    pub fn from_portable_payload(payload: &PortablePayload) -> Result<Option<Self>, SnapshotError> {
        if payload.mime_type != mime_type() {
            log::debug!(
                "Ignoring clipboard payload with foreign type tag `{}`",
                payload.mime_type
            );
            return Ok(None);
        }
        let mut snapshot = Self::parse(&payload.text)?;
        snapshot.fs = TransactionalFileSystem::from_file_entries(&payload.files)?;
        Ok(Some(snapshot))
    }

    fn to_sexpr(&self) -> Sexpr {
        let mut root = ListBuilder::node(ROOT_TAG);
        root.push(point_node("cursor_position", self.cursor_position));
        root.push(kv("schematic", Sexpr::string(self.schematic.to_string())));
        for signal in &self.net_signals {
            let mut node = ListBuilder::node("netsignal");
            node.push(kv("uuid", Sexpr::string(signal.uuid.to_string())));
            node.push(kv("name", Sexpr::string(&*signal.name)));
            node.push(kv("auto", signal.auto_named));
            root.push(node.build());
        }
        for cmp in &self.component_instances {
            let mut node = ListBuilder::node("component");
            node.push(kv("uuid", Sexpr::string(cmp.uuid.to_string())));
            node.push(kv("lib_component", Sexpr::string(cmp.lib_component.to_string())));
            node.push(kv("lib_variant", Sexpr::string(cmp.lib_variant.to_string())));
            node.push(kv("lib_device", opt_uuid_atom(cmp.lib_device)));
            node.push(kv("name", Sexpr::string(&*cmp.name)));
            node.push(kv("value", Sexpr::string(&*cmp.value)));
            for attribute in &cmp.attributes {
                node.push(Sexpr::list(vec![
                    Sexpr::symbol("attribute"),
                    Sexpr::string(attribute.key.clone()),
                    Sexpr::string(attribute.value.clone()),
                ]));
            }
            for (signal, net) in &cmp.signal_map {
                node.push(Sexpr::list(vec![
                    Sexpr::symbol("signal"),
                    Sexpr::string(signal.to_string()),
                    opt_uuid_atom(*net),
                ]));
            }
            root.push(node.build());
        }
        for sym in &self.symbol_placements {
            let mut node = ListBuilder::node("symbol");
            node.push(kv("uuid", Sexpr::string(sym.uuid.to_string())));
            node.push(kv("component", Sexpr::string(sym.component_instance.to_string())));
            node.push(kv("gate", Sexpr::string(sym.variant_gate.to_string())));
            node.push(point_node("position", sym.position));
            node.push(kv("rotation", sym.rotation.deg()));
            node.push(kv("mirror", sym.mirrored));
            root.push(node.build());
        }
        root.build()
    }

    fn from_sexpr(root: &Sexpr) -> Result<Self, SnapshotError> {
        if root.tag() != Some(ROOT_TAG) {
            return Err(SnapshotError::UnexpectedTag(
                root.tag().unwrap_or_default().to_string(),
            ));
        }
        let items = root.as_list().unwrap_or_default();

        let mut snapshot = Self::new(
            uuid_field(items, "schematic")?,
            point_field(items, "cursor_position")?,
        );

        for signal in root.find_all_lists("netsignal") {
            snapshot.push_net_signal(NetSignalRecord {
                uuid: uuid_field(signal, "uuid")?,
                name: str_field(signal, "name")?,
                auto_named: bool_field(signal, "auto")?,
            });
        }

        for cmp in root.find_all_lists("component") {
            let mut attributes = Vec::new();
            for attr in sch_sexpr::find_all_child_lists(cmp, "attribute") {
                attributes.push(Attribute {
                    key: positional_str(attr, 1, "attribute")?,
                    value: positional_str(attr, 2, "attribute")?,
                });
            }
            let mut signal_map = BTreeMap::new();
            for entry in sch_sexpr::find_all_child_lists(cmp, "signal") {
                let signal = Uuid::parse_str(&positional_str(entry, 1, "signal")?)?;
                let net = opt_uuid_atom_parse(entry.get(2), "signal")?;
                signal_map.insert(signal, net);
            }
            snapshot.push_component_instance(ComponentInstanceRecord {
                uuid: uuid_field(cmp, "uuid")?,
                lib_component: uuid_field(cmp, "lib_component")?,
                lib_variant: uuid_field(cmp, "lib_variant")?,
                lib_device: opt_uuid_field(cmp, "lib_device")?,
                name: str_field(cmp, "name")?,
                value: str_field(cmp, "value")?,
                attributes,
                signal_map,
            });
        }

        for sym in root.find_all_lists("symbol") {
            snapshot.push_symbol_placement(SymbolPlacementRecord {
                uuid: uuid_field(sym, "uuid")?,
                component_instance: uuid_field(sym, "component")?,
                variant_gate: uuid_field(sym, "gate")?,
                position: point_field(sym, "position")?,
                rotation: Angle::from_deg(number_field(sym, "rotation")?),
                mirrored: bool_field(sym, "mirror")?,
            });
        }

        Ok(snapshot)
    }
}

fn point_node(name: &str, point: Point) -> Sexpr {
    Sexpr::list(vec![
        Sexpr::symbol(name),
        Sexpr::float(point.x_mm()),
        Sexpr::float(point.y_mm()),
    ])
}

fn opt_uuid_atom(uuid: Option<Uuid>) -> Sexpr {
    match uuid {
        Some(uuid) => Sexpr::string(uuid.to_string()),
        None => Sexpr::symbol("none"),
    }
}

fn opt_uuid_atom_parse(
    atom: Option<&Sexpr>,
    name: &'static str,
) -> Result<Option<Uuid>, SnapshotError> {
    match atom {
        Some(Sexpr::Symbol(s)) if s == "none" => Ok(None),
        Some(Sexpr::String(s)) => Ok(Some(Uuid::parse_str(s)?)),
        _ => Err(SnapshotError::InvalidField(name)),
    }
}

fn field<'a>(items: &'a [Sexpr], name: &'static str) -> Result<&'a [Sexpr], SnapshotError> {
    sch_sexpr::find_child_list(items, name).ok_or(SnapshotError::MissingField(name))
}

fn positional_str(items: &[Sexpr], idx: usize, name: &'static str) -> Result<String, SnapshotError> {
    items
        .get(idx)
        .and_then(Sexpr::as_str)
        .map(str::to_string)
        .ok_or(SnapshotError::InvalidField(name))
}

fn str_field(items: &[Sexpr], name: &'static str) -> Result<String, SnapshotError> {
    positional_str(field(items, name)?, 1, name)
}

fn uuid_field(items: &[Sexpr], name: &'static str) -> Result<Uuid, SnapshotError> {
    Ok(Uuid::parse_str(&str_field(items, name)?)?)
}

fn opt_uuid_field(items: &[Sexpr], name: &'static str) -> Result<Option<Uuid>, SnapshotError> {
    opt_uuid_atom_parse(field(items, name)?.get(1), name)
}

fn bool_field(items: &[Sexpr], name: &'static str) -> Result<bool, SnapshotError> {
    match field(items, name)?.get(1).and_then(Sexpr::as_sym) {
        Some("yes") => Ok(true),
        Some("no") => Ok(false),
        _ => Err(SnapshotError::InvalidField(name)),
    }
}

fn number_field(items: &[Sexpr], name: &'static str) -> Result<f64, SnapshotError> {
    field(items, name)?
        .get(1)
        .and_then(Sexpr::as_number)
        .ok_or(SnapshotError::InvalidField(name))
}

fn point_field(items: &[Sexpr], name: &'static str) -> Result<Point, SnapshotError> {
    let node = field(items, name)?;
    let x = node.get(1).and_then(Sexpr::as_number);
    let y = node.get(2).and_then(Sexpr::as_number);
    match (x, y) {
        (Some(x), Some(y)) => Ok(Point::from_mm(x, y)),
        _ => Err(SnapshotError::InvalidField(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> ClipboardSnapshot {
        let mut snapshot =
            ClipboardSnapshot::new(Uuid::new_v4(), Point::from_mm(12.7, -5.08));
        snapshot.push_net_signal(NetSignalRecord {
            uuid: Uuid::new_v4(),
            name: "N#1".to_string(),
            auto_named: true,
        });
        snapshot.push_net_signal(NetSignalRecord {
            uuid: Uuid::new_v4(),
            name: "GND Ω".to_string(),
            auto_named: false,
        });
        let mut signal_map = BTreeMap::new();
        signal_map.insert(Uuid::new_v4(), Some(Uuid::new_v4()));
        signal_map.insert(Uuid::new_v4(), None);
        snapshot.push_component_instance(ComponentInstanceRecord {
            uuid: Uuid::new_v4(),
            lib_component: Uuid::new_v4(),
            lib_variant: Uuid::new_v4(),
            lib_device: Some(Uuid::new_v4()),
            name: "R1".to_string(),
            value: "100kΩ \"precision\"".to_string(),
            attributes: vec![Attribute {
                key: "TOLERANCE".to_string(),
                value: "1%".to_string(),
            }],
            signal_map,
        });
        snapshot.push_symbol_placement(SymbolPlacementRecord {
            uuid: Uuid::new_v4(),
            component_instance: snapshot.component_instances[0].uuid,
            variant_gate: Uuid::new_v4(),
            position: Point::from_mm(2.54, 0.0),
            rotation: Angle::from_deg(90.0),
            mirrored: true,
        });
        snapshot
    }

    #[test]
    fn serialize_parse_round_trip() {
        let snapshot = sample_snapshot();
        let parsed = ClipboardSnapshot::parse(&snapshot.serialize()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn empty_snapshot_round_trip() {
        let snapshot = ClipboardSnapshot::new(Uuid::new_v4(), Point::default());
        let parsed = ClipboardSnapshot::parse(&snapshot.serialize()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn serialization_is_deterministic() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.serialize(), snapshot.serialize());
    }

    #[test]
    fn payload_round_trip_carries_asset_files() {
        let snapshot = sample_snapshot();
        snapshot
            .directory("cmp/x")
            .unwrap()
            .write_file("component.lp", b"(sch_component)")
            .unwrap();

        let payload = snapshot.to_portable_payload();
        assert_eq!(payload.files.len(), 1);

        let restored = ClipboardSnapshot::from_portable_payload(&payload)
            .unwrap()
            .expect("payload tag must match");
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn foreign_mime_type_reads_as_absent() {
        let snapshot = sample_snapshot();
        let mut payload = snapshot.to_portable_payload();
        payload.mime_type =
            "application/x-sch-clipboard.symbol; version=0.0.0-other".to_string();
        assert!(ClipboardSnapshot::from_portable_payload(&payload)
            .unwrap()
            .is_none());
    }

    #[test]
    fn matching_tag_with_garbage_is_a_parse_error() {
        let payload = PortablePayload {
            mime_type: mime_type(),
            text: "(sch_clipboard_symbol (cursor_position 0".to_string(),
            files: BTreeMap::new(),
        };
        assert!(ClipboardSnapshot::from_portable_payload(&payload).is_err());
    }

    #[test]
    fn wrong_root_tag_is_rejected() {
        assert!(matches!(
            ClipboardSnapshot::parse("(something_else (schematic \"x\"))"),
            Err(SnapshotError::UnexpectedTag(_))
        ));
    }
}
