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

use std::ops::{Add, Sub, AddAssign, SubAssign, Neg};
use std::ops::{Mul, Div, MulAssign, DivAssign};

use num_traits::Num;

use crate::types::*;

// NOTE: Operator impls are between same-typed operands, rather than
//       e.g. V3<T> and V3<U> where T: Add<U>.

// Generates an impl for each combination of owned and borrowed operands.
macro_rules! each_ref_combo {
    (
        impl [$Op:ident :: $op:ident] ($Lhs:ty, $Rhs:ty) -> $Out:ty
        |$a:ident, $b:ident| $body:expr
    ) => {
        each_ref_combo!{@one [$Op $op] [] [$Lhs] [] [$Rhs] $Out |$a, $b| $body}
        each_ref_combo!{@one [$Op $op] ['a,] [&'a $Lhs] [] [$Rhs] $Out |$a, $b| $body}
        each_ref_combo!{@one [$Op $op] ['b,] [$Lhs] [] [&'b $Rhs] $Out |$a, $b| $body}
        each_ref_combo!{@one [$Op $op] ['a,] [&'a $Lhs] ['b,] [&'b $Rhs] $Out |$a, $b| $body}
    };
    (
        @one [$Op:ident $op:ident]
        [$($lt_a:tt)*] [$L:ty] [$($lt_b:tt)*] [$R:ty]
        $Out:ty |$a:ident, $b:ident| $body:expr
    ) => {
        impl<$($lt_a)* $($lt_b)* X: Num + Copy> $Op<$R> for $L {
            type Output = $Out;

            #[inline]
            fn $op(self, other: $R) -> $Out {
                let $a = &*self;
                let $b = &*other;
                $body
            }
        }
    };
}

// ---------------------------------------------------------------------------
// vector-vector ops

each_ref_combo!{
    impl [Add::add] (V3<X>, V3<X>) -> V3<X>
    |a, b| V3::from_fn(|k| a[k] + b[k])
}

each_ref_combo!{
    impl [Sub::sub] (V3<X>, V3<X>) -> V3<X>
    |a, b| V3::from_fn(|k| a[k] - b[k])
}

impl<X: Num + Copy> AddAssign<V3<X>> for V3<X> {
    #[inline]
    fn add_assign(&mut self, other: V3<X>)
    { *self = *self + other; }
}

impl<X: Num + Copy> SubAssign<V3<X>> for V3<X> {
    #[inline]
    fn sub_assign(&mut self, other: V3<X>)
    { *self = *self - other; }
}

impl<X: Num + Copy + Neg<Output=X>> Neg for V3<X> {
    type Output = V3<X>;

    #[inline]
    fn neg(self) -> V3<X>
    { self.map(|x| -x) }
}

impl<'a, X: Num + Copy + Neg<Output=X>> Neg for &'a V3<X> {
    type Output = V3<X>;

    #[inline]
    fn neg(self) -> V3<X>
    { self.map(|x| -x) }
}

// ---------------------------------------------------------------------------
// scalar ops
//
// These are implemented per primitive type, because `impl<X> Mul<X> for V3<X>`
// would leave no room for the matrix products below.

macro_rules! impl_scalar_ops {
    ($($T:ty),*) => {$(
        impl Mul<$T> for V3<$T> {
            type Output = V3<$T>;

            #[inline]
            fn mul(self, s: $T) -> V3<$T>
            { self.map(|x| x * s) }
        }

        impl<'a> Mul<$T> for &'a V3<$T> {
            type Output = V3<$T>;

            #[inline]
            fn mul(self, s: $T) -> V3<$T>
            { self.map(|x| x * s) }
        }

        impl Div<$T> for V3<$T> {
            type Output = V3<$T>;

            #[inline]
            fn div(self, s: $T) -> V3<$T>
            { self.map(|x| x / s) }
        }

        impl<'a> Div<$T> for &'a V3<$T> {
            type Output = V3<$T>;

            #[inline]
            fn div(self, s: $T) -> V3<$T>
            { self.map(|x| x / s) }
        }

        impl MulAssign<$T> for V3<$T> {
            #[inline]
            fn mul_assign(&mut self, s: $T)
            { *self = *self * s; }
        }

        impl DivAssign<$T> for V3<$T> {
            #[inline]
            fn div_assign(&mut self, s: $T)
            { *self = *self / s; }
        }

        impl Mul<$T> for M33<$T> {
            type Output = M33<$T>;

            #[inline]
            fn mul(self, s: $T) -> M33<$T>
            { self.map(|x| x * s) }
        }

        impl Div<$T> for M33<$T> {
            type Output = M33<$T>;

            #[inline]
            fn div(self, s: $T) -> M33<$T>
            { self.map(|x| x / s) }
        }
    )*};
}

impl_scalar_ops!(f64, i32);

// ---------------------------------------------------------------------------
// matrix-matrix ops

each_ref_combo!{
    impl [Add::add] (M33<X>, M33<X>) -> M33<X>
    |a, b| M33::from_fn(|r, c| a[r][c] + b[r][c])
}

each_ref_combo!{
    impl [Sub::sub] (M33<X>, M33<X>) -> M33<X>
    |a, b| M33::from_fn(|r, c| a[r][c] - b[r][c])
}

each_ref_combo!{
    impl [Mul::mul] (M33<X>, M33<X>) -> M33<X>
    |a, b| M33::from_fn(|r, c| {
        a[r][0] * b[0][c] + a[r][1] * b[1][c] + a[r][2] * b[2][c]
    })
}

impl<X: Num + Copy + Neg<Output=X>> Neg for M33<X> {
    type Output = M33<X>;

    #[inline]
    fn neg(self) -> M33<X>
    { self.map(|x| -x) }
}

// ---------------------------------------------------------------------------
// matrix-vector ops

// matrix * column vector
each_ref_combo!{
    impl [Mul::mul] (M33<X>, V3<X>) -> V3<X>
    |m, v| V3::from_fn(|r| m[r][0] * v[0] + m[r][1] * v[1] + m[r][2] * v[2])
}

// row vector * matrix
each_ref_combo!{
    impl [Mul::mul] (V3<X>, M33<X>) -> V3<X>
    |v, m| V3::from_fn(|c| v[0] * m[0][c] + v[1] * m[1][c] + v[2] * m[2][c])
}
