mod shared;

use elph::array_types::M33;
use elph::{run, DerivError, Settings, SymmetryInput};

use crate::shared::*;

fn unexpected<T>(result: Result<T, DerivError>) -> ! {
    panic!("unexpected: {:?}", result.map(|_| ()))
}

#[test]
fn identity_only_is_underdetermined() {
    match run(&run_input(SymmetryInput::IdentityOnly), &Settings::default()) {
        Err(DerivError::UnderdeterminedFit { atom: 0, candidates: 1 }) => {},
        other => unexpected(other),
    }
}

#[test]
fn atom_that_nothing_reaches() {
    // without the two-fold, nothing carries atom 0 onto atom 1
    let operations = operations().into_iter().take(3).collect();
    let mut input = run_input(SymmetryInput::Operations(operations));
    input.atoms = Some(vec![1]);
    match run(&input, &Settings::default()) {
        Err(DerivError::UnderdeterminedFit { atom: 1, candidates: 0 }) => {},
        other => unexpected(other),
    }
}

#[test]
fn primitive_cell_must_tile_the_supercell() {
    let mut input = run_input(SymmetryInput::Operations(operations()));
    input.cell_transform.primitive_matrix = M33::from_array([
        [0.7, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ]);
    match run(&input, &Settings::default()) {
        Err(DerivError::LatticeMismatch(_)) => {},
        other => unexpected(other),
    }
}

#[test]
fn missing_displaced_snapshot() {
    let mut input = run_input(SymmetryInput::Operations(operations()));
    input.displaced.pop();
    match run(&input, &Settings::default()) {
        Err(DerivError::InconsistentDataset(_)) => {},
        other => unexpected(other),
    }
}

#[test]
fn displaced_snapshot_missing_a_field() {
    let mut input = run_input(SymmetryInput::Operations(operations()));
    input.displaced[1].qij = None;
    match run(&input, &Settings::default()) {
        Err(DerivError::InconsistentDataset(msg)) => assert!(msg.contains("Qij"), "{}", msg),
        other => unexpected(other),
    }
}

#[test]
fn operation_that_is_not_a_symmetry() {
    // a body-centering shift of only half of the way
    let mut operations = operations();
    operations.push((M33::eye(), elph::array_types::V3([0.25, 0.25, 0.25])));
    match run(&run_input(SymmetryInput::Operations(operations)), &Settings::default()) {
        Err(DerivError::SymmetryMap(_)) => {},
        other => unexpected(other),
    }
}

#[test]
fn out_of_range_atom() {
    let mut input = run_input(SymmetryInput::Operations(operations()));
    input.atoms = Some(vec![0, 2]);
    match run(&input, &Settings::default()) {
        Err(DerivError::InconsistentDataset(_)) => {},
        other => unexpected(other),
    }
}

#[test]
fn bad_settings() {
    let settings = Settings { rank_tolerance: 0.0, ..Settings::default() };
    match run(&run_input(SymmetryInput::Operations(operations())), &settings) {
        Err(DerivError::InvalidSettings(_)) => {},
        other => unexpected(other),
    }
}
