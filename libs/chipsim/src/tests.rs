use std::sync::Arc;

use test_log::test;

use crate::definition::{Position, SavedInputPin, SavedWire};
use crate::graph::ComponentInstance;
use crate::import::{export_bundle, import, import_bundle};
use crate::loader::FailedChip;
use crate::persist::{MemoryPersistence, SaveDir};
use crate::sim::DEFAULT_MAX_CYCLES;
use crate::issues::{Diagnostic, Severity};
use crate::validation::Cause;
use crate::*;

fn at(x: f32, y: f32) -> Position {
    Position::new(x, y)
}

/// A `SIGNAL OUT` component driven by output 0 of `driver`.
fn output(name: &str, driver: usize) -> ComponentRef {
    ComponentRef::new(SIGNAL_OUT, at(10.0, 0.0))
        .with_input(SavedInputPin::new(name, 1).driven_by(driver, 0))
}

/// A two-input gate driven by output 0 of components `a` and `b`.
fn gate(chip: &str, a: usize, b: usize) -> ComponentRef {
    ComponentRef::new(chip, at(5.0, 0.0))
        .with_input(SavedInputPin::new("a", 1).driven_by(a, 0))
        .with_input(SavedInputPin::new("b", 1).driven_by(b, 0))
        .with_output("out", 1)
}

fn not(input: usize) -> ComponentRef {
    ComponentRef::new("NOT", at(7.0, 0.0))
        .with_input(SavedInputPin::new("in", 1).driven_by(input, 0))
        .with_output("out", 1)
}

fn nand() -> ChipDefinition {
    ChipDefinition::new("NAND")
        .with_component(ComponentRef::signal_in("a", 1))
        .with_component(ComponentRef::signal_in("b", 1))
        .with_component(gate("AND", 0, 1))
        .with_component(not(2))
        .with_component(output("out", 3))
}

/// AND built from NAND, so loading it requires NAND first.
fn and2() -> ChipDefinition {
    ChipDefinition::new("AND2")
        .with_component(ComponentRef::signal_in("a", 1))
        .with_component(ComponentRef::signal_in("b", 1))
        .with_component(gate("NAND", 0, 1))
        .with_component(not(2))
        .with_component(output("out", 3))
}

/// A NOR-based SR latch. Input 0 sets, input 1 resets, output 0 is Q.
fn sr_latch() -> ChipDefinition {
    ChipDefinition::new("SR LATCH")
        .with_component(ComponentRef::signal_in("S", 1))
        .with_component(ComponentRef::signal_in("R", 1))
        .with_component(
            ComponentRef::new("OR", at(0.0, 0.0))
                .with_input(SavedInputPin::new("a", 1).driven_by(1, 0))
                .with_input(SavedInputPin::new("b", 1).driven_by(5, 0).cyclic())
                .with_output("out", 1),
        )
        .with_component(not(2))
        .with_component(gate("OR", 0, 3))
        .with_component(not(4))
        .with_component(output("Q", 3))
        .with_component(output("Qn", 5))
}

fn load(defs: impl IntoIterator<Item = ChipDefinition>) -> LoadOutcome {
    let store = ChipStore::from_definitions(defs);
    load_all(&store, builtin_chips(), |_, _| {})
}

fn settle(sim: &mut Simulation) -> Vec<Signal> {
    sim.settle(DEFAULT_MAX_CYCLES).unwrap().to_vec()
}

#[test]
fn dependencies_load_before_dependents() {
    let outcome = load([and2(), nand()]);
    assert!(outcome.report.is_success());
    assert_eq!(outcome.report.loaded, ["NAND", "AND2"]);
    assert_eq!(outcome.chips.len(), builtin_chips().len() + 2);

    let mut sim = Simulation::new(outcome.chips.get("AND2").unwrap().clone());
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        sim.set_input(0, a).unwrap();
        sim.set_input(1, b).unwrap();
        assert_eq!(settle(&mut sim), [Signal::from(a && b)]);
    }
}

#[test]
fn missing_dependency_does_not_block_siblings() {
    let broken = ChipDefinition::new("BROKEN")
        .with_component(ComponentRef::new("MISSING", at(0.0, 0.0)))
        .with_component(ComponentRef::new("NAND", at(1.0, 0.0)));
    let uses_broken =
        ChipDefinition::new("USES BROKEN").with_component(ComponentRef::new("BROKEN", at(0.0, 0.0)));
    let outcome = load([broken, nand(), uses_broken, and2()]);

    assert_eq!(outcome.report.loaded, ["NAND", "AND2"]);
    assert_eq!(
        outcome.report.failed,
        vec![
            FailedChip {
                name: "BROKEN".into(),
                missing: vec!["MISSING".into()],
            },
            FailedChip {
                name: "USES BROKEN".into(),
                missing: vec!["BROKEN".into()],
            },
        ]
    );
    assert!(!outcome.chips.contains("BROKEN"));
    assert!(outcome.chips.contains("AND2"));
    assert_eq!(
        outcome.report.to_string(),
        "loaded 2 chips, 2 failed\n  BROKEN: missing MISSING\n  USES BROKEN: missing BROKEN\n"
    );
}

#[test]
fn dependency_cycles_terminate() {
    let a = ChipDefinition::new("A").with_component(ComponentRef::new("B", at(0.0, 0.0)));
    let b = ChipDefinition::new("B").with_component(ComponentRef::new("A", at(0.0, 0.0)));
    let outcome = load([a, b, nand()]);
    assert_eq!(outcome.report.loaded, ["NAND"]);
    assert_eq!(outcome.report.num_failed(), 2);
}

#[test]
fn loader_reports_each_unit_of_work() {
    let store = ChipStore::from_definitions([nand()]);
    let mut loader = Loader::new(&store, builtin_chips());
    assert_eq!(loader.progress(), Progress { done: 0, total: 7 });

    let mut events = Vec::new();
    #[allow(clippy::while_let_on_iterator)]
    while let Some(event) = loader.next() {
        if let LoadEvent::ChipLoaded { name } = &event {
            assert!(loader.loaded().contains(name));
        }
        events.push((event, loader.progress()));
    }
    assert_eq!(loader.loaded().len(), 7);
    assert_eq!(events.len(), 10);
    assert!(events[..6]
        .iter()
        .all(|(e, _)| matches!(e, LoadEvent::BuiltinRegistered { .. })));
    assert_eq!(
        events[6..].iter().map(|(e, _)| e.clone()).collect::<Vec<_>>(),
        vec![
            LoadEvent::DependencyResolved {
                chip: "NAND".into(),
                dependency: "AND".into(),
            },
            LoadEvent::DependencyResolved {
                chip: "NAND".into(),
                dependency: "NOT".into(),
            },
            LoadEvent::ChipLoaded {
                name: "NAND".into()
            },
            LoadEvent::Finished,
        ]
    );
    assert_eq!(events[5].1, Progress { done: 6, total: 7 });
    assert_eq!(events[9].1, Progress { done: 7, total: 7 });
    assert!(loader.next().is_none());
    assert!(loader.finish().report.is_success());
}

#[test]
fn saved_chips_cannot_shadow_builtins() {
    let fake_and = ChipDefinition::new("AND").with_component(ComponentRef::signal_in("x", 1));
    let store = ChipStore::from_definitions([fake_and, nand()]);
    let loader = Loader::new(&store, builtin_chips());
    assert_eq!(loader.progress().total, 7);
    let outcome = loader.finish();
    assert_eq!(outcome.report.loaded, ["NAND"]);
    assert!(outcome.chips.get("AND").unwrap().is_primitive());
}

#[test]
fn instantiation_without_dependencies_fails() {
    let table: ChipTable = builtin_chips().into_iter().collect();
    assert_eq!(would_load(&and2(), &table), Err(vec!["NAND".into()]));
    assert_eq!(
        instantiate(&and2(), &table).unwrap_err(),
        InstantiateError::MissingDependencies(vec!["NAND".into()])
    );
    assert!(would_load(&nand(), &table).is_ok());
}

#[test]
fn interface_follows_sentinel_order() {
    let table: ChipTable = builtin_chips().into_iter().collect();
    let chip = instantiate(&sr_latch(), &table).unwrap();
    let names = |pins: &[PinSpec]| pins.iter().map(|p| p.name.to_string()).collect::<Vec<_>>();
    assert_eq!(names(&chip.inputs), ["S", "R"]);
    assert_eq!(names(&chip.outputs), ["Q", "Qn"]);

    let composite = chip.as_composite().unwrap();
    let or = composite.component(ComponentId(2));
    assert!(or.inputs[1].cyclic);
    assert!(!or.inputs[0].cyclic);
    assert_eq!(or.inputs[1].driver, Some(PinRef::output(ComponentId(5), 0)));
}

#[test]
fn saved_pins_map_onto_shared_prefix() {
    let partial = ChipDefinition::new("PARTIAL")
        .with_component(ComponentRef::signal_in("x", 1))
        .with_component(
            ComponentRef::new("AND", at(0.0, 0.0))
                .with_input(SavedInputPin::new("first", 1).driven_by(0, 0)),
        )
        .with_component(
            ComponentRef::new("NOT", at(0.0, 0.0))
                .with_input(SavedInputPin::new("in", 1).driven_by(1, 0))
                .with_input(SavedInputPin::new("ghost", 1).driven_by(0, 0))
                .with_output("out", 1)
                .with_output("ghost", 1),
        )
        .with_component(output("out", 2));
    let outcome = load([partial]);
    assert!(outcome.report.is_success());

    let chip = outcome.chips.get("PARTIAL").unwrap();
    let composite = chip.as_composite().unwrap();
    let and = composite.component(ComponentId(1));
    assert_eq!(and.inputs.len(), 2);
    assert_eq!(and.inputs[0].name, "first");
    assert!(and.inputs[0].driver.is_some());
    assert_eq!(and.inputs[1].name, "b");
    assert!(and.inputs[1].driver.is_none());
    let not = composite.component(ComponentId(2));
    assert_eq!(not.inputs.len(), 1);
    assert_eq!(not.outputs.len(), 1);
    assert_eq!(composite.wires().len(), 3);

    let mut sim = Simulation::new(chip.clone());
    sim.set_input(0, true).unwrap();
    // The unconnected AND input floats and reads as low.
    assert_eq!(settle(&mut sim), [Signal::from(true)]);
}

#[test]
fn unconnectable_saved_wires_are_skipped() {
    let def = ChipDefinition::new("WIDE")
        .with_component(ComponentRef::signal_in("x", 4))
        .with_component(not(0))
        .with_component(
            ComponentRef::new("NOT", at(0.0, 0.0))
                .with_input(SavedInputPin::new("in", 1).driven_by(7, 0))
                .with_output("out", 1),
        )
        .with_component(output("out", 1));
    let table: ChipTable = builtin_chips().into_iter().collect();
    let chip = instantiate(&def, &table).unwrap();
    let composite = chip.as_composite().unwrap();
    // Width mismatch (4 to 1) and a parent index past the end.
    assert_eq!(composite.wires().len(), 1);
    assert!(composite.component(ComponentId(1)).inputs[0].driver.is_none());
}

#[test]
fn round_trip_preserves_structure() {
    let loaded = load([nand()]).chips;
    let original = instantiate(&and2(), &loaded).unwrap();
    let saved = original.as_composite().unwrap().to_definition();
    assert_eq!(saved, and2());

    let reloaded = instantiate(&saved, &loaded).unwrap();
    let (a, b) = (
        original.as_composite().unwrap(),
        reloaded.as_composite().unwrap(),
    );
    assert_eq!(a.components().len(), b.components().len());
    assert_eq!(a.wires(), b.wires());
    for (x, y) in a.components().iter().zip(b.components()) {
        assert_eq!(x.chip.name, y.chip.name);
        assert_eq!(x.inputs, y.inputs);
        assert_eq!(x.outputs, y.outputs);
    }
    assert_eq!(original.inputs, reloaded.inputs);
    assert_eq!(original.outputs, reloaded.outputs);
}

#[test]
fn sr_latch_holds_state() {
    let outcome = load([sr_latch()]);
    let mut sim = Simulation::new(outcome.chips.get("SR LATCH").unwrap().clone());
    let q = |out: Vec<Signal>| out[0].clone();

    sim.set_input(0, true).unwrap();
    sim.set_input(1, false).unwrap();
    assert_eq!(q(settle(&mut sim)), Signal::from(true));

    sim.set_input(0, false).unwrap();
    assert_eq!(q(settle(&mut sim)), Signal::from(true));

    sim.set_input(1, true).unwrap();
    assert_eq!(q(settle(&mut sim)), Signal::from(false));

    sim.set_input(1, false).unwrap();
    let out = settle(&mut sim);
    assert_eq!(out, [Signal::from(false), Signal::from(true)]);
}

#[test]
fn ring_oscillator_never_settles() {
    let def = ChipDefinition::new("RING")
        .with_component(
            ComponentRef::new("NOT", at(0.0, 0.0))
                .with_input(SavedInputPin::new("in", 1).driven_by(0, 0).cyclic())
                .with_output("out", 1),
        )
        .with_component(output("out", 0));
    let outcome = load([def]);
    let mut sim = Simulation::new(outcome.chips.get("RING").unwrap().clone());
    assert_eq!(sim.settle(10), Err(SimError::Unstable { cycles: 10 }));
    assert_eq!(sim.cycles(), 10);

    let before = sim.outputs().to_vec();
    let after = sim.step().to_vec();
    assert_ne!(before, after);
}

#[test]
fn tri_state_buffers_share_a_bus() {
    // out = sel ? d1 : d0, built from two tri-state buffers on a bus.
    let mux = ChipDefinition::new("BUS MUX")
        .with_component(ComponentRef::signal_in("d0", 4))
        .with_component(ComponentRef::signal_in("d1", 4))
        .with_component(ComponentRef::signal_in("sel", 1))
        .with_component(not(2))
        .with_component(
            ComponentRef::new("TRI-STATE BUFFER", at(0.0, 0.0))
                .with_input(SavedInputPin::new("data", 4).driven_by(0, 0))
                .with_input(SavedInputPin::new("enable", 1).driven_by(3, 0))
                .with_output("out", 4),
        )
        .with_component(
            ComponentRef::new("TRI-STATE BUFFER", at(0.0, 1.0))
                .with_input(SavedInputPin::new("data", 4).driven_by(1, 0))
                .with_input(SavedInputPin::new("enable", 1).driven_by(2, 0))
                .with_output("out", 4),
        )
        .with_component(
            ComponentRef::new("BUS", at(1.0, 0.0))
                .with_input(SavedInputPin::new("a", 4).driven_by(4, 0))
                .with_input(SavedInputPin::new("b", 4).driven_by(5, 0))
                .with_output("out", 4),
        )
        .with_component(
            ComponentRef::new(SIGNAL_OUT, at(2.0, 0.0))
                .with_input(SavedInputPin::new("out", 4).driven_by(6, 0)),
        );
    let outcome = load([mux]);
    assert!(outcome.report.is_success());
    let mut sim = Simulation::new(outcome.chips.get("BUS MUX").unwrap().clone());
    sim.set_input(0, Signal::from_u64(0b0101, 4)).unwrap();
    sim.set_input(1, Signal::from_u64(0b1100, 4)).unwrap();

    sim.set_input(2, false).unwrap();
    assert_eq!(settle(&mut sim)[0].to_u64(), Some(0b0101));
    sim.set_input(2, true).unwrap();
    assert_eq!(settle(&mut sim)[0].to_u64(), Some(0b1100));

    assert_eq!(
        sim.set_input(3, true),
        Err(SimError::NoSuchInput { index: 3, len: 3 })
    );
}

#[test]
fn chip_save_data_applies_anchor_points() {
    let loaded = load([nand()]).chips;
    let mut persistence = MemoryPersistence::new();
    persistence.write_chip(&and2()).unwrap();
    persistence
        .write_wire(&SavedWireLayout {
            chip_name: "AND2".into(),
            wires: vec![
                SavedWire {
                    parent_chip_index: 2,
                    parent_chip_output_index: 0,
                    child_chip_index: 3,
                    child_chip_input_index: 0,
                    anchor_points: vec![at(1.0, 2.0)],
                },
                // Every pin exists but no wire runs from 3 to 2, so nothing is anchored.
                SavedWire {
                    parent_chip_index: 3,
                    parent_chip_output_index: 0,
                    child_chip_index: 2,
                    child_chip_input_index: 0,
                    anchor_points: vec![at(9.0, 9.0)],
                },
                // Roles swapped: the wire from component 1 to input 1 of component 2.
                SavedWire {
                    parent_chip_index: 2,
                    parent_chip_output_index: 1,
                    child_chip_index: 1,
                    child_chip_input_index: 0,
                    anchor_points: vec![at(3.0, 4.0), at(5.0, 6.0)],
                },
                SavedWire {
                    parent_chip_index: 9,
                    parent_chip_output_index: 0,
                    child_chip_index: 8,
                    child_chip_input_index: 0,
                    anchor_points: vec![at(7.0, 8.0)],
                },
            ],
        })
        .unwrap();

    let data = get_chip_save_data(&persistence, "AND2", &loaded)
        .unwrap()
        .unwrap();
    assert_eq!(data.definition, and2());
    let anchors = |from: usize, to: usize, slot: usize| {
        data.chip
            .wires
            .iter()
            .find(|r| {
                r.wire.from == PinRef::output(ComponentId(from), 0)
                    && r.wire.to == PinRef::input(ComponentId(to), slot)
            })
            .map(|r| r.anchor_points.clone())
            .unwrap()
    };
    assert_eq!(data.chip.wires.len(), 4);
    assert_eq!(anchors(2, 3, 0), vec![at(1.0, 2.0)]);
    assert_eq!(anchors(1, 2, 1), vec![at(3.0, 4.0), at(5.0, 6.0)]);
    assert!(anchors(0, 2, 0).is_empty());

    let layout = data.chip.wire_layout();
    assert_eq!(layout.chip_name, "AND2");
    assert_eq!(layout.wires.len(), 4);
    assert_eq!(
        layout.wires.iter().map(|w| w.anchor_points.len()).sum::<usize>(),
        3
    );

    assert!(get_chip_save_data(&persistence, "NOPE", &loaded)
        .unwrap()
        .is_none());
    let empty: ChipTable = builtin_chips().into_iter().collect();
    assert!(matches!(
        get_chip_save_data(&persistence, "AND2", &empty),
        Err(PersistError::Instantiate(_))
    ));
}

#[test]
fn import_renames_colliding_chips() {
    let custom_and = ChipDefinition::new("AND")
        .with_component(ComponentRef::signal_in("AND gate in", 1))
        .with_component(ComponentRef::signal_in("b", 1))
        .with_component(gate("NAND", 0, 1))
        .with_component(not(2))
        .with_component(output("out", 3));
    let wrap = ChipDefinition::new("WRAP")
        .with_component(ComponentRef::signal_in("a", 1))
        .with_component(gate("AND", 0, 0))
        .with_component(output("out", 1));

    let mut source = MemoryPersistence::new();
    source.write_chip(&custom_and).unwrap();
    source
        .write_wire(&SavedWireLayout {
            chip_name: "AND".into(),
            wires: Vec::new(),
        })
        .unwrap();
    source.write_chip(&wrap).unwrap();
    let bundle = export_bundle(&["AND", "WRAP"], &source).unwrap();

    let mut dest = MemoryPersistence::new();
    let existing = ChipDefinition::new("AND2").with_component(gate("AND", 0, 0));
    dest.write_chip(&existing).unwrap();
    let existing_text = dest.read_chip_text("AND2").unwrap();

    let report = import_bundle(&bundle, &mut dest).unwrap();
    let renamed: Vec<_> = report
        .renamed()
        .map(|c| (c.original.as_str(), c.name.as_str()))
        .collect();
    assert_eq!(renamed, [("AND", "AND3")]);
    assert_eq!(report.imported.len(), 2);

    let and3 = dest.read_chip("AND3").unwrap().unwrap();
    assert_eq!(and3.name, "AND3");
    assert_eq!(and3.components[0].output_pins[0].name, "AND gate in");
    assert_eq!(and3.components[2].chip_name, "NAND");
    assert_eq!(dest.read_wire("AND3").unwrap().unwrap().chip_name, "AND3");

    let wrap = dest.read_chip("WRAP").unwrap().unwrap();
    assert_eq!(wrap.components[1].chip_name, "AND3");
    assert_eq!(dest.read_wire("WRAP").unwrap().unwrap().chip_name, "WRAP");

    assert_eq!(dest.read_chip_text("AND2").unwrap(), existing_text);
    assert_eq!(dest.chip_names().unwrap(), ["AND2", "AND3", "WRAP"]);

    // The imported chips load against the renamed dependency.
    let store = get_all_saved_chips(&dest).unwrap();
    let outcome = load_all(&store, builtin_chips(), |_, _| {});
    assert_eq!(outcome.report.num_failed(), 2);
    assert_eq!(outcome.report.failed[0].missing, ["NAND"]);
}

#[test]
fn import_renames_within_a_batch() {
    let x = ChipDefinition::new("X").with_component(ComponentRef::signal_in("a", 1));
    let mut source = MemoryPersistence::new();
    source.write_chip(&x).unwrap();
    let one = export_bundle(&["X"], &source).unwrap();
    let body = one.strip_prefix("1\n").unwrap();
    let bundle = format!("3\n{body}{body}{body}");

    let mut dest = MemoryPersistence::new();
    let report = import_bundle(&bundle, &mut dest).unwrap();
    let names: Vec<_> = report.imported.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["X", "X2", "X3"]);
    assert_eq!(dest.read_chip("X3").unwrap().unwrap().name, "X3");
}

#[test]
fn malformed_bundle_writes_nothing() {
    let mut dest = MemoryPersistence::new();
    let err = import_bundle("2\nA\n1\n0\n{}\nB\n5\n", &mut dest).unwrap_err();
    assert!(matches!(err, crate::import::ImportError::Bundle(_)));
    assert!(dest.chip_names().unwrap().is_empty());
}

#[test]
fn save_dir_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut saves = SaveDir::new(dir.path());
    assert!(saves.chip_names().unwrap().is_empty());

    saves.write_chip(&nand()).unwrap();
    saves.write_chip(&and2()).unwrap();
    std::fs::write(saves.chips_dir().join("notes.txt"), "not a chip").unwrap();
    assert_eq!(saves.chip_names().unwrap(), ["AND2", "NAND"]);
    assert_eq!(saves.read_chip("NAND").unwrap(), Some(nand()));
    assert_eq!(saves.read_wire("NAND").unwrap(), None);

    let store = get_all_saved_chips(&saves).unwrap();
    assert_eq!(store.len(), 2);
    let outcome = load_all(&store, builtin_chips(), |_, _| {});
    assert!(outcome.report.is_success());

    let bundle_path = dir.path().join("bundle.txt");
    std::fs::write(&bundle_path, export_bundle(&["NAND"], &saves).unwrap()).unwrap();
    let report = import(&bundle_path, &mut saves).unwrap();
    assert_eq!(report.imported[0].name, "NAND2");
    assert_eq!(saves.read_chip("NAND2").unwrap().unwrap().name, "NAND2");

    std::fs::write(saves.chips_dir().join("BAD.json"), "{ not json").unwrap();
    assert!(matches!(
        get_all_saved_chips(&saves),
        Err(PersistError::Malformed { .. })
    ));
}

#[test]
fn imports_stay_inside_the_save_dir() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("saves");
    let mut saves = SaveDir::new(&root);

    let err = import_bundle("1\n../../escaped\n1\n0\n{}\n", &mut saves).unwrap_err();
    assert!(matches!(
        err,
        crate::import::ImportError::Bundle(crate::import::BundleError::InvalidChipName { line: 2, .. })
    ));
    assert!(!dir.path().join("escaped.json").exists());
    assert!(!root.exists());

    let mut escaping = nand();
    escaping.name = "../escaped".into();
    assert!(matches!(
        saves.write_chip(&escaping),
        Err(PersistError::InvalidName(_))
    ));
    assert!(matches!(
        saves.read_chip("../escaped"),
        Err(PersistError::InvalidName(_))
    ));
    assert!(!root.exists());
}

#[test]
fn validation_reports_causes() {
    let bad = ChipDefinition::new("BAD")
        .with_component(ComponentRef::signal_in("a", 1).with_output("extra", 1))
        .with_component(ComponentRef::new("MISSING", at(0.0, 0.0)))
        .with_component(ComponentRef::new("BAD", at(0.0, 0.0)))
        .with_component(
            ComponentRef::new("NOT", at(0.0, 0.0))
                .with_input(SavedInputPin::new("in", 1).driven_by(9, 0))
                .with_output("out", 1),
        )
        .with_component(
            ComponentRef::new("NOT", at(0.0, 0.0))
                .with_input(SavedInputPin::new("in", 1).driven_by(3, 4))
                .with_output("out", 1),
        );
    let store = ChipStore::from_definitions([nand(), bad]);
    let issues = store.validate(&builtin_chips());
    assert!(issues.has_error());
    assert_eq!(issues.num_errors(), 3);
    assert_eq!(issues.num_warnings(), 2);

    let causes: Vec<_> = issues.iter().map(|i| i.cause().clone()).collect();
    assert!(causes.contains(&Cause::MissingDependency {
        chip: "BAD".into(),
        dependency: "MISSING".into(),
    }));
    let missing = issues
        .iter()
        .find(|i| matches!(i.cause(), Cause::MissingDependency { .. }))
        .unwrap();
    assert_eq!(missing.severity(), Severity::Error);
    assert!(missing.help().unwrap().contains("`MISSING`"));
    assert_eq!(
        missing.to_string(),
        "error: missing dependency: chip `BAD` uses `MISSING`, which does not exist"
    );
    let self_reference = issues
        .iter()
        .find(|i| matches!(i.cause(), Cause::SelfReference { .. }))
        .unwrap();
    assert!(self_reference.help().is_none());
    assert!(causes.contains(&Cause::SelfReference {
        chip: "BAD".into(),
        component: 2,
    }));
    assert!(causes.iter().any(|c| matches!(
        c,
        Cause::ParentIndexOutOfRange { parent: 9, num_components: 5, .. }
    )));
    assert!(causes.iter().any(|c| matches!(
        c,
        Cause::ParentOutputIndexOutOfRange { output: 4, num_outputs: 1, .. }
    )));
    assert!(causes.iter().any(|c| matches!(
        c,
        Cause::MultipleInterfacePinRecords { count: 2, .. }
    )));

    let dupes = crate::validation::validate(
        [nand(), nand(), ChipDefinition::new("OR")].iter(),
        &builtin_chips(),
    );
    assert!(!dupes.has_error());
    assert_eq!(dupes.num_warnings(), 2);
}

#[test]
fn factory_creates_independent_instances() {
    let table: ChipTable = builtin_chips().into_iter().collect();
    let mut a = table.create_instance("NOT", at(1.0, 1.0)).unwrap();
    let b = table.create_instance("NOT", at(2.0, 2.0)).unwrap();
    a.inputs[0].name = "renamed".into();
    assert_eq!(b.inputs[0].name, "in");
    assert!(Arc::ptr_eq(&a.chip, &b.chip));
    assert!(table.create_instance("NAND", at(0.0, 0.0)).is_none());

    let mut chip = CompositeChip::new("PAIR");
    let first = chip.add_component(a);
    let second = chip.add_component(ComponentInstance::new(b.chip.clone(), b.position));
    chip.try_connect(PinRef::output(first, 0), PinRef::input(second, 0))
        .unwrap();
    assert_eq!(chip.fanout(PinRef::output(first, 0)).count(), 1);
}
