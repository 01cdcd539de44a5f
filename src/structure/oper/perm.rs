/* ************************************************************************ **
** This file is part of elph, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of elph is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

#[derive(Debug, Fail)]
#[fail(display = "not a permutation: {:?}", _0)]
pub struct BadPerm(pub Vec<usize>);

/// Represents a reordering operation on atoms.
///
/// `perm[to] == from`; this is the form consumed by `permuted_by`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Perm(Vec<usize>);

impl Perm {
    /// This performs O(n log n) validation on the data
    /// to verify that it satisfies the invariants of Perm.
    pub fn from_vec(vec: Vec<usize>) -> Result<Perm, BadPerm>
    {
        if !Self::validate_perm(&vec) {
            return Err(BadPerm(vec));
        }
        Ok(Perm(vec))
    }

    fn validate_perm(xs: &[usize]) -> bool
    {
        let mut vec = xs.to_vec();
        vec.sort_unstable();
        vec.into_iter().eq(0..xs.len())
    }

    /// The permutation that undoes this one.
    pub fn inverted(&self) -> Perm
    {
        let mut inv = vec![0; self.0.len()];
        for (to, &from) in self.0.iter().enumerate() {
            inv[from] = to;
        }
        Perm(inv)
    }
}

pub trait Permute: Sized {
    // awkward name, but it makes clear that the permutation is not in-place.
    fn permuted_by(self, perm: &Perm) -> Self;
}

impl<T> Permute for Vec<T> {
    fn permuted_by(self, perm: &Perm) -> Vec<T>
    {
        assert_eq!(self.len(), perm.0.len(),
            "Incorrect permutation length: {} vs {}",
            self.len(), perm.0.len());

        let mut slots: Vec<Option<T>> = self.into_iter().map(Some).collect();
        perm.0.iter()
            .map(|&from| match slots[from].take() {
                Some(x) => x,
                None => unreachable!("element {} taken twice by a validated Perm", from),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn random_perm(n: usize) -> Perm {
        let mut perm: Vec<_> = (0..n).collect();
        perm.shuffle(&mut rand::thread_rng());
        Perm(perm)
    }

    #[test]
    fn perm_inverse()
    {
        let perm = random_perm(20);
        let inv = perm.inverted();
        let data: Vec<_> = (100..120).collect();

        assert_eq!(data.clone().permuted_by(&perm).permuted_by(&inv), data);
        assert_eq!(data.clone().permuted_by(&inv).permuted_by(&perm), data);
        assert_eq!(inv.inverted(), perm);
    }

    #[test]
    fn invalid_perm() {
        assert!(Perm::from_vec(vec![0, 1, 3, 3]).is_err());
        assert!(Perm::from_vec(vec![1, 2, 3]).is_err());
        assert!(Perm::from_vec(vec![2, 0, 1]).is_ok());
    }

    #[test]
    #[should_panic(expected = "permutation length")]
    fn incompatible_perm() {
        let _ = vec![4, 2, 1].permuted_by(&Perm::from_vec(vec![1, 0]).unwrap());
    }

    #[test]
    fn permute_composition()
    {
        let xy = Perm::from_vec(vec![1, 0, 2]).unwrap();
        let zx = Perm::from_vec(vec![2, 1, 0]).unwrap();
        let xyzx = Perm::from_vec(vec![2, 0, 1]).unwrap();
        assert_eq!(
            vec![0, 1, 2].permuted_by(&xy).permuted_by(&zx),
            vec![0, 1, 2].permuted_by(&xyzx));
        assert_eq!(
            vec!['a', 'b', 'c'].permuted_by(&xyzx),
            vec!['c', 'a', 'b']);
    }
}
