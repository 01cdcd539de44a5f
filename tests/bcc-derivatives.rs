mod shared;

use elph::array_types::V3;
use elph_assert_close::assert_close;
use elph::structure::angular::real_spherical_harmonics;
use elph::structure::OperationInput;
use elph::{run, DerivativeStore, Settings, SymmetryInput, Interpolation, Field};

use crate::shared::*;

fn computed() -> DerivativeStore {
    run(&run_input(SymmetryInput::Operations(operations())), &Settings::default()).unwrap()
}

#[test]
fn every_atom_and_direction_from_one_pair() {
    let store = computed();
    assert_eq!(store.atom_indices(), &[0, 1]);
    store.check_complete().unwrap();

    let dv_du = store.dv_du().unwrap();
    for atom in 0..2 {
        let tensor = &dv_du[&atom];
        assert_eq!(tensor.atom, atom);
        for axis in 0..3 {
            let got = tensor.component(axis);
            assert_eq!(got.mesh(), MESH);
            assert_eq!(got.lattice_points(), &[V3([0, 0, 0])]);

            let expected = potential_derivative(atom, axis);
            let scale = expected.data().iter().fold(0.0, |acc: f64, x| acc.max(x.abs()));
            let err = max_abs_diff(got.data(), expected.data());
            assert!(err < 1e-3 * scale, "atom {} axis {}: error {} (scale {})", atom, axis, err, scale);
        }
    }
}

#[test]
fn body_centered_atoms_agree() {
    let store = computed();
    let dv_du = store.dv_du().unwrap();
    let shift = [MESH[0] / 2, MESH[1] / 2, MESH[2] / 2];
    for axis in 0..3 {
        let corner = dv_du[&0].component(axis);
        let center = dv_du[&1].component(axis);
        for i in 0..MESH[0] {
            for j in 0..MESH[1] {
                for k in 0..MESH[2] {
                    let shifted = [(i + shift[0]) % MESH[0], (j + shift[1]) % MESH[1], (k + shift[2]) % MESH[2]];
                    let a = corner.value(0, 0, [i, j, k]);
                    let b = center.value(0, 0, shifted);
                    assert!((a - b).abs() < 1e-8, "axis {} at {:?}: {} vs {}", axis, [i, j, k], a, b);
                }
            }
        }
    }
}

#[test]
fn channel_derivatives_are_exact() {
    let store = computed();
    for &(map, scale) in &[(store.ddij_du().unwrap(), 1.0), (store.dqij_du().unwrap(), 0.25)] {
        for atom in 0..2 {
            for axis in 0..3 {
                let got = map[&atom].component(axis);
                let expected = channel_derivative(atom, axis, scale);
                let err = max_abs_diff(got.values(), expected.values());
                assert!(err < 1e-10, "atom {} axis {}: error {}", atom, axis, err);

                // spot check against the harmonics themselves
                let mut direction = V3::zero();
                direction[axis] = 1.0;
                let y1 = real_spherical_harmonics(1, &direction);
                let block = got.block(atom);
                for m in 0..3 {
                    assert_close!(abs=1e-10, block[1 + m], scale * y1[m]);
                }
            }
        }
    }
}

#[test]
fn explicit_atom_maps_match_position_matching() {
    let structure = bcc();
    let with_maps = operations().into_iter().map(|(rot, trans)| {
        let atom_map = structure.to_fracs().iter().map(|x| {
            let image = (&rot.map(f64::from) * x + trans).fract_positive();
            // every operation maps the origin to the origin or to the center
            if image.iter().all(|&y| y.abs() < 1e-8 || (y - 1.0).abs() < 1e-8) { 0 } else { 1 }
        }).collect();
        OperationInput { rot, trans, atom_map }
    }).collect();

    let store = run(&run_input(SymmetryInput::WithAtomMaps(with_maps)), &Settings::default()).unwrap();
    assert_eq!(store, computed());
}

#[test]
fn parallel_fit_matches_serial() {
    let settings = Settings { parallel: true, ..Settings::default() };
    let store = run(&run_input(SymmetryInput::Operations(operations())), &settings).unwrap();
    assert_eq!(store, computed());
}

#[test]
fn explicit_atom_subset() {
    let mut input = run_input(SymmetryInput::Operations(operations()));
    input.atoms = Some(vec![1]);
    let store = run(&input, &Settings::default()).unwrap();
    assert_eq!(store.atom_indices(), &[1]);
    assert_eq!(store.dv_du().unwrap().keys().cloned().collect::<Vec<_>>(), vec![1]);
    assert_eq!(store.dv_du().unwrap()[&1], computed().dv_du().unwrap()[&1]);
}

#[test]
fn resampled_onto_the_primitive_cell() {
    let mut input = run_input(SymmetryInput::Operations(operations()));
    input.cell_transform = primitive_transform();
    let settings = Settings {
        interpolation: Some(Interpolation::new([6, 6, 6])),
        ..Settings::default()
    };
    let store = run(&input, &settings).unwrap();
    // only the corner atom lies in the primitive cell at the origin
    assert_eq!(store.atom_indices(), &[0]);

    let unresampled = computed();
    let primitive = input.cell_transform.primitive_matrix;
    for axis in 0..3 {
        let source = unresampled.dv_du().unwrap()[&0].component(axis);
        let target = store.dv_du().unwrap()[&0].component(axis);
        assert_eq!(target.mesh(), [6, 6, 6]);
        assert_eq!(target.num_cells(), 2);

        for (cell, point) in target.lattice_points().iter().enumerate() {
            for i in 0..6 {
                for j in 0..6 {
                    for k in 0..6 {
                        // (j / n + L) P, as a point of the conventional cell
                        let frac = V3([i, j, k]).map(|x| x as f64 / 6.0) + point.map(f64::from);
                        let in_source = (frac * &primitive).fract_positive();
                        let idx = [0, 1, 2].map(|a| {
                            (in_source[a] * MESH[a] as f64).round() as usize % MESH[a]
                        });
                        let expected = source.value(0, 0, idx);
                        let got = target.value(0, cell, [i, j, k]);
                        assert!((got - expected).abs() < 1e-10, "cell {} at {:?}: {} vs {}", cell, [i, j, k], got, expected);
                    }
                }
            }
        }
    }
}
