//! End-to-end copy/paste behavior: building snapshots from a live project,
//! moving them through the portable payload, and replaying them with the
//! paste transaction.

use std::collections::BTreeMap;

use sch_clipboard::{
    ClipboardSnapshot, PasteError, PasteTransaction, SnapshotBuilder, SymbolPlacementRecord,
    TransactionState,
};
use sch_project::{
    Angle, Component, ComponentInstance, Point, Project, Schematic, Symbol, SymbolPlacement,
    SymbolVariant, SymbolVariantGate, UndoStack,
};
use uuid::Uuid;

/// One component kind in a library: component + variant + gate + symbol.
#[derive(Debug, Clone, Copy)]
struct LibKind {
    component: Uuid,
    variant: Uuid,
    gate: Uuid,
    symbol: Uuid,
}

fn add_kind(project: &mut Project, name: &str, prefix: &str) -> LibKind {
    let symbol = Symbol::new(Uuid::new_v4(), format!("{name} symbol")).unwrap();
    let kind = LibKind {
        component: Uuid::new_v4(),
        variant: Uuid::new_v4(),
        gate: Uuid::new_v4(),
        symbol: symbol.uuid(),
    };
    project.library_mut().add_symbol(symbol).unwrap();

    let mut prefixes = BTreeMap::new();
    prefixes.insert("default".to_string(), prefix.to_string());
    prefixes.insert("de_DE".to_string(), "W".to_string());
    let component = Component::new(
        kind.component,
        name,
        prefixes,
        vec![SymbolVariant {
            uuid: kind.variant,
            gates: vec![SymbolVariantGate {
                uuid: kind.gate,
                symbol: kind.symbol,
            }],
        }],
    )
    .unwrap();
    project.library_mut().add_component(component).unwrap();
    kind
}

fn copy_kind(src: &Project, dest: &mut Project, kind: LibKind) {
    let component = src.library().component(&kind.component).unwrap().clone();
    let symbol = src.library().symbol(&kind.symbol).unwrap().clone();
    dest.library_mut().add_component(component).unwrap();
    dest.library_mut().add_symbol(symbol).unwrap();
}

struct Bench {
    project: Project,
    schematic: Uuid,
    resistor: LibKind,
}

impl Bench {
    fn new() -> Self {
        let mut project = Project::new();
        let resistor = add_kind(&mut project, "Resistor", "R");
        let schematic = Uuid::new_v4();
        project
            .add_schematic(Schematic::new(schematic, "Main"))
            .unwrap();
        Bench {
            project,
            schematic,
            resistor,
        }
    }

    fn add_instance(&mut self, name: &str, kind: LibKind) -> Uuid {
        let uuid = Uuid::new_v4();
        self.project
            .circuit_mut()
            .add_component_instance(ComponentInstance {
                uuid,
                lib_component: kind.component,
                lib_variant: kind.variant,
                lib_device: None,
                name: name.to_string(),
                value: "100k".to_string(),
                attributes: Vec::new(),
                signal_map: BTreeMap::new(),
            })
            .unwrap();
        uuid
    }

    fn place_symbol(&mut self, instance: Uuid, kind: LibKind, pos: Point, selected: bool) -> Uuid {
        let uuid = Uuid::new_v4();
        self.project
            .schematic_mut(&self.schematic)
            .unwrap()
            .add_symbol_placement(SymbolPlacement {
                uuid,
                component_instance: instance,
                variant_gate: kind.gate,
                lib_symbol: kind.symbol,
                position: pos,
                rotation: Angle::from_deg(90.0),
                mirrored: true,
                selected,
            })
            .unwrap();
        uuid
    }

    fn build_selected(&self) -> ClipboardSnapshot {
        let schematic = self.project.schematic(&self.schematic).unwrap();
        let mut query = schematic.create_selection_query();
        query.add_selected_symbols();
        SnapshotBuilder::new(&self.project, schematic)
            .build(&query, Point::default())
            .unwrap()
    }
}

fn counts(project: &Project, schematic: &Uuid) -> (usize, usize, usize, usize) {
    (
        project.library().component_count(),
        project.library().symbol_count(),
        project.circuit().component_instances().len(),
        project.schematic(schematic).unwrap().symbol_placements().len(),
    )
}

fn empty_destination() -> (Project, Uuid) {
    let mut project = Project::new();
    let schematic = Uuid::new_v4();
    project
        .add_schematic(Schematic::new(schematic, "Sheet 1"))
        .unwrap();
    (project, schematic)
}

#[test]
fn dependency_closure_is_deduplicated() {
    let mut bench = Bench::new();
    let capacitor = add_kind(&mut bench.project, "Capacitor", "C");

    // Three selected symbols over two distinct component instances and two
    // distinct library kinds; the shared instance is placed twice.
    let r1 = bench.add_instance("R1", bench.resistor);
    let c1 = bench.add_instance("C1", capacitor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), true);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(10.0, 0.0), true);
    bench.place_symbol(c1, capacitor, Point::from_mm(20.0, 0.0), true);

    let snapshot = bench.build_selected();

    assert_eq!(snapshot.component_instances().len(), 2);
    assert_eq!(snapshot.symbol_placements().len(), 3);

    let cmp_dir = snapshot.directory("cmp").unwrap();
    let sym_dir = snapshot.directory("sym").unwrap();
    assert_eq!(cmp_dir.dir_names().len(), 2);
    assert_eq!(sym_dir.dir_names().len(), 2);
    for name in cmp_dir.dir_names() {
        assert!(!cmp_dir.subdir(&name).unwrap().file_names().is_empty());
    }
    for name in sym_dir.dir_names() {
        assert!(!sym_dir.subdir(&name).unwrap().file_names().is_empty());
    }
}

#[test]
fn all_net_signals_are_captured() {
    let mut bench = Bench::new();
    bench
        .project
        .circuit_mut()
        .add_net_signal(sch_project::NetSignal {
            uuid: Uuid::new_v4(),
            name: "N#1".to_string(),
            auto_named: true,
        })
        .unwrap();
    bench
        .project
        .circuit_mut()
        .add_net_signal(sch_project::NetSignal {
            uuid: Uuid::new_v4(),
            name: "GND".to_string(),
            auto_named: false,
        })
        .unwrap();

    // Nothing selected, but signals are captured regardless.
    let snapshot = bench.build_selected();
    assert_eq!(snapshot.net_signals().len(), 2);
    assert_eq!(snapshot.symbol_placements().len(), 0);
}

#[test]
fn empty_selection_builds_empty_snapshot_and_pastes_as_no_op() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), false);

    let snapshot = bench.build_selected();
    assert!(snapshot.net_signals().is_empty());
    assert!(snapshot.component_instances().is_empty());
    assert!(snapshot.symbol_placements().is_empty());
    assert!(snapshot.directory("").unwrap().is_empty());

    let before = counts(&bench.project, &bench.schematic);
    let mut tx = PasteTransaction::new(bench.schematic, snapshot, Point::default());
    assert!(!tx.execute(&mut bench.project).unwrap());
    assert_eq!(tx.state(), TransactionState::Committed);
    assert_eq!(counts(&bench.project, &bench.schematic), before);
}

#[test]
fn snapshot_survives_the_portable_payload() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(1.27, -2.54), true);

    let snapshot = bench.build_selected();
    let payload = snapshot.to_portable_payload();
    let restored = ClipboardSnapshot::from_portable_payload(&payload)
        .unwrap()
        .expect("own payload must match the type tag");
    assert_eq!(restored, snapshot);
}

#[test]
fn paste_into_another_document_imports_assets_and_applies_offset() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(2.54, 0.0), true);
    let snapshot = bench.build_selected();

    let (mut dest, dest_schematic) = empty_destination();
    let offset = Point::from_mm(10.0, 5.0);
    let mut tx = PasteTransaction::new(dest_schematic, snapshot, offset);
    assert!(tx.execute(&mut dest).unwrap());

    // Library assets were imported from the snapshot.
    assert_eq!(dest.library().component_count(), 1);
    assert_eq!(dest.library().symbol_count(), 1);
    let imported = dest.library().component(&bench.resistor.component).unwrap();
    assert_eq!(imported.name(), "Resistor");

    // The free name is preserved verbatim; the instance identifier is fresh.
    let instance = dest.circuit().component_instance_by_name("R1").unwrap();
    assert_ne!(instance.uuid, r1);
    assert_eq!(instance.value, "100k");

    // Offset applied exactly; rotation, mirror and selection state set.
    let placements = dest.schematic(&dest_schematic).unwrap().symbol_placements();
    assert_eq!(placements.len(), 1);
    let placement = &placements[0];
    assert_eq!(placement.position, Point::from_mm(12.54, 5.0));
    assert_eq!(placement.rotation, Angle::from_deg(90.0));
    assert!(placement.mirrored);
    assert!(placement.selected);
    assert_eq!(placement.component_instance, instance.uuid);
    assert_eq!(placement.lib_symbol, bench.resistor.symbol);
}

#[test]
fn paste_back_into_source_renames_and_skips_asset_import() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    let original_placement = bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), true);
    let snapshot = bench.build_selected();

    let mut tx = PasteTransaction::new(bench.schematic, snapshot, Point::from_mm(5.0, 5.0));
    assert!(tx.execute(&mut bench.project).unwrap());

    // No duplicate library elements.
    assert_eq!(bench.project.library().component_count(), 1);
    assert_eq!(bench.project.library().symbol_count(), 1);

    // Name collision resolved with a prefix-conformant auto name.
    assert!(bench.project.circuit().component_instance_by_name("R1").is_some());
    let pasted = bench.project.circuit().component_instance_by_name("R2").unwrap();
    assert_ne!(pasted.uuid, r1);

    // The original placement still has its identifier; the pasted one got a
    // fresh identifier because the original still occupies it.
    let placements = bench
        .project
        .schematic(&bench.schematic)
        .unwrap()
        .symbol_placements();
    assert_eq!(placements.len(), 2);
    assert!(placements.iter().any(|p| p.uuid == original_placement));
    assert!(placements.iter().any(|p| p.uuid != original_placement));
}

#[test]
fn auto_name_prefix_honors_locale_order() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), true);
    let snapshot = bench.build_selected();

    bench.project.settings_mut().locale_order = vec!["de_DE".to_string()];
    let mut tx = PasteTransaction::new(bench.schematic, snapshot, Point::default());
    assert!(tx.execute(&mut bench.project).unwrap());
    assert!(bench.project.circuit().component_instance_by_name("W1").is_some());
}

#[test]
fn cut_paste_within_one_document_keeps_placement_identifier() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    let placement = bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), true);
    let snapshot = bench.build_selected();

    // Simulate the cut: the selected entities are removed before pasting.
    bench
        .project
        .schematic_mut(&bench.schematic)
        .unwrap()
        .remove_symbol_placement(&placement)
        .unwrap();
    bench
        .project
        .circuit_mut()
        .remove_component_instance(&r1)
        .unwrap();

    let mut tx = PasteTransaction::new(bench.schematic, snapshot, Point::default());
    assert!(tx.execute(&mut bench.project).unwrap());

    let placements = bench
        .project
        .schematic(&bench.schematic)
        .unwrap()
        .symbol_placements();
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].uuid, placement);
    // Component instances still get a fresh identifier even on cut+paste.
    assert_ne!(placements[0].component_instance, r1);
}

#[test]
fn failing_step_rolls_back_every_applied_step() {
    let mut bench = Bench::new();
    let capacitor = add_kind(&mut bench.project, "Capacitor", "C");
    let r1 = bench.add_instance("R1", bench.resistor);
    let c1 = bench.add_instance("C1", capacitor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), true);
    bench.place_symbol(c1, capacitor, Point::from_mm(10.0, 0.0), true);

    // Strip the asset tree by re-parsing only the structured text. The
    // destination knows the resistor kind, so the first component record
    // applies cleanly; the capacitor record then hits a missing library
    // component and must take the whole transaction down with it.
    let snapshot = ClipboardSnapshot::parse(&bench.build_selected().serialize()).unwrap();

    let (mut dest, dest_schematic) = empty_destination();
    copy_kind(&bench.project, &mut dest, bench.resistor);

    let before = counts(&dest, &dest_schematic);
    let mut tx = PasteTransaction::new(dest_schematic, snapshot, Point::default());
    let err = tx.execute(&mut dest).unwrap_err();
    assert!(matches!(err, PasteError::MissingLibraryComponent(uuid) if uuid == capacitor.component));
    assert_eq!(tx.state(), TransactionState::RolledBack);
    assert_eq!(counts(&dest, &dest_schematic), before);
}

#[test]
fn redo_is_rejected_after_a_failed_paste() {
    let mut bench = Bench::new();
    let capacitor = add_kind(&mut bench.project, "Capacitor", "C");
    let r1 = bench.add_instance("R1", bench.resistor);
    let c1 = bench.add_instance("C1", capacitor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), true);
    bench.place_symbol(c1, capacitor, Point::from_mm(10.0, 0.0), true);
    let snapshot = ClipboardSnapshot::parse(&bench.build_selected().serialize()).unwrap();

    let (mut dest, dest_schematic) = empty_destination();
    copy_kind(&bench.project, &mut dest, bench.resistor);

    let before = counts(&dest, &dest_schematic);
    let mut tx = PasteTransaction::new(dest_schematic, snapshot, Point::default());
    assert!(tx.execute(&mut dest).is_err());
    assert_eq!(tx.state(), TransactionState::RolledBack);

    // The rolled-back partial step list of a failed transaction must never
    // be re-applied; only an undone committed transaction can redo.
    assert!(matches!(tx.redo(&mut dest), Err(PasteError::InvalidState)));
    assert_eq!(tx.state(), TransactionState::RolledBack);
    assert_eq!(counts(&dest, &dest_schematic), before);
}

#[test]
fn mismatched_asset_directory_identifier_is_rejected() {
    let embedded = Uuid::new_v4();
    let mut prefixes = BTreeMap::new();
    prefixes.insert("default".to_string(), "R".to_string());
    let component = Component::new(embedded, "Resistor", prefixes, Vec::new()).unwrap();

    // Stage the component under a directory keyed by a different uuid than
    // the one its component.lp embeds.
    let directory_uuid = Uuid::new_v4();
    let snapshot = ClipboardSnapshot::new(Uuid::new_v4(), Point::default());
    component
        .directory()
        .copy_to(&snapshot.directory(&format!("cmp/{directory_uuid}")).unwrap())
        .unwrap();

    let (mut dest, dest_schematic) = empty_destination();
    let before = counts(&dest, &dest_schematic);
    let mut tx = PasteTransaction::new(dest_schematic, snapshot, Point::default());
    assert!(matches!(
        tx.execute(&mut dest),
        Err(PasteError::AssetIdentifierMismatch { directory, element })
            if directory == directory_uuid && element == embedded
    ));
    assert_eq!(tx.state(), TransactionState::RolledBack);
    assert_eq!(counts(&dest, &dest_schematic), before);
    assert!(dest.library().component(&embedded).is_none());
}

#[test]
fn inconsistent_snapshot_fails_fast_and_leaves_no_residue() {
    let mut snapshot = ClipboardSnapshot::new(Uuid::new_v4(), Point::default());
    // A symbol record whose owner is not among the component records.
    snapshot.push_symbol_placement(SymbolPlacementRecord {
        uuid: Uuid::new_v4(),
        component_instance: Uuid::new_v4(),
        variant_gate: Uuid::new_v4(),
        position: Point::default(),
        rotation: Angle::default(),
        mirrored: false,
    });

    let (mut dest, dest_schematic) = empty_destination();
    let before = counts(&dest, &dest_schematic);
    let mut tx = PasteTransaction::new(dest_schematic, snapshot, Point::default());
    assert!(matches!(
        tx.execute(&mut dest),
        Err(PasteError::DanglingComponentInstance { .. })
    ));
    assert_eq!(counts(&dest, &dest_schematic), before);
}

#[test]
fn paste_is_undoable_and_redoable_as_one_unit() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(0.0, 0.0), true);
    let snapshot = bench.build_selected();

    let (mut dest, dest_schematic) = empty_destination();
    let before = counts(&dest, &dest_schematic);

    let mut stack = UndoStack::new();
    let tx = PasteTransaction::new(dest_schematic, snapshot, Point::default());
    assert!(stack.execute(Box::new(tx), &mut dest).unwrap());
    let after = counts(&dest, &dest_schematic);
    assert_eq!(after, (1, 1, 1, 1));

    assert!(stack.undo(&mut dest).unwrap());
    assert_eq!(counts(&dest, &dest_schematic), before);

    assert!(stack.redo(&mut dest).unwrap());
    assert_eq!(counts(&dest, &dest_schematic), after);
}

#[test]
fn offset_applies_to_every_placement() {
    let mut bench = Bench::new();
    let r1 = bench.add_instance("R1", bench.resistor);
    let r2 = bench.add_instance("R2", bench.resistor);
    bench.place_symbol(r1, bench.resistor, Point::from_mm(1.0, 2.0), true);
    bench.place_symbol(r2, bench.resistor, Point::from_mm(-3.0, 4.0), true);
    let snapshot = bench.build_selected();

    let (mut dest, dest_schematic) = empty_destination();
    let offset = Point::from_mm(0.5, -0.5);
    let mut tx = PasteTransaction::new(dest_schematic, snapshot, offset);
    assert!(tx.execute(&mut dest).unwrap());

    let positions: Vec<Point> = dest
        .schematic(&dest_schematic)
        .unwrap()
        .symbol_placements()
        .iter()
        .map(|p| p.position)
        .collect();
    assert_eq!(
        positions,
        vec![Point::from_mm(1.5, 1.5), Point::from_mm(-2.5, 3.5)]
    );
}
