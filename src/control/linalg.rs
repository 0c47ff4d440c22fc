//! Dense linear algebra helpers on top of nalgebra
//!
//! Cholesky, inversion and QR report numerical failure through `MpcResult`
//! instead of a validity flag, so a factor that failed can never be read as
//! data.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, SMatrix};

use crate::common::{MpcError, MpcResult};

/// Block diagonal matrix with `count` copies of `block`
pub fn block_diagonal<const R: usize, const C: usize>(
    block: &SMatrix<f64, R, C>,
    count: usize,
) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(R * count, C * count);
    for i in 0..count {
        out.fixed_view_mut::<R, C>(i * R, i * C).copy_from(block);
    }
    out
}

/// Copy `src` into `dst` with its top-left corner at `(row, col)`
///
/// Panics if the block does not fit.
pub fn insert_block(dst: &mut DMatrix<f64>, src: &DMatrix<f64>, row: usize, col: usize) {
    insert_block_rows(dst, src, row, col, src.nrows());
}

/// Copy only the first `rows` rows of `src` into `dst` at `(row, col)`
pub fn insert_block_rows(dst: &mut DMatrix<f64>, src: &DMatrix<f64>, row: usize, col: usize, rows: usize) {
    dst.view_mut((row, col), (rows, src.ncols()))
        .copy_from(&src.rows(0, rows));
}

/// Lower block-triangular Toeplitz matrix built from the block column `src`
///
/// Column block `k` (of width `src.ncols()`) is `src` shifted down by
/// `k * block_rows` rows, with the rows that fall off the bottom dropped.
pub fn shifted_block_columns(src: &DMatrix<f64>, block_rows: usize, count: usize) -> DMatrix<f64> {
    let (rows, width) = src.shape();
    let mut out = DMatrix::zeros(rows, width * count);
    for k in 0..count {
        let shift = k * block_rows;
        if shift >= rows {
            break;
        }
        insert_block_rows(&mut out, src, shift, k * width, rows - shift);
    }
    out
}

/// True when a squared diagonal entry of the triangle `tri` is at most
/// `zero_threshold` times the largest one
///
/// For `H = T'T` the squared diagonal of a Cholesky or QR triangle `T` are
/// the elimination pivots of `H`, so every factorization of the same
/// problem is judged on the same, scale-free criterion.
fn has_negligible_pivot(tri: &DMatrix<f64>, zero_threshold: f64) -> bool {
    let k = tri.nrows().min(tri.ncols());
    let pivot = |i: usize| tri[(i, i)] * tri[(i, i)];
    let largest = (0..k).map(pivot).fold(0.0_f64, f64::max);
    (0..k).any(|i| !(pivot(i) > zero_threshold * largest))
}

/// Cholesky factor of a symmetric positive definite matrix
///
/// Only the lower triangle of `m` is read. Fails when `m` is not positive
/// definite or when a pivot is negligible (see `zero_threshold` in
/// [`MpcConfig`](crate::control::MpcConfig)). `m` is consumed so the caller
/// can take its storage back with `unpack_dirty`.
pub fn checked_cholesky(
    m: DMatrix<f64>,
    zero_threshold: f64,
    what: &'static str,
) -> MpcResult<Cholesky<f64, Dyn>> {
    if !m.is_square() || m.iter().any(|v| !v.is_finite()) {
        return Err(MpcError::SingularMatrix(what));
    }
    let chol = Cholesky::new(m).ok_or(MpcError::SingularMatrix(what))?;
    if has_negligible_pivot(chol.l_dirty(), zero_threshold) {
        return Err(MpcError::SingularMatrix(what));
    }
    Ok(chol)
}

/// Inverse of a symmetric positive definite matrix
pub fn checked_inverse(
    m: &DMatrix<f64>,
    zero_threshold: f64,
    what: &'static str,
) -> MpcResult<DMatrix<f64>> {
    Ok(checked_cholesky(m.clone(), zero_threshold, what)?.inverse())
}

/// Thin QR factors of a tall matrix
#[derive(Debug, Clone, PartialEq)]
pub struct QrFactors {
    /// Transposed orthogonal factor, `k x rows` with `k = min(rows, cols)`
    pub q_t: DMatrix<f64>,
    /// Upper-triangular factor, `k x cols`
    pub r: DMatrix<f64>,
}

/// Householder QR, failing when a squared diagonal entry of R is negligible
/// (rank deficient input)
pub fn checked_qr(m: DMatrix<f64>, zero_threshold: f64, what: &'static str) -> MpcResult<QrFactors> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(MpcError::RankDeficient(what));
    }
    let qr = m.qr();
    let r = qr.r();
    if has_negligible_pivot(&r, zero_threshold) {
        return Err(MpcError::RankDeficient(what));
    }
    Ok(QrFactors {
        q_t: qr.q().transpose(),
        r,
    })
}

/// Solve `r * x = rhs` in place for upper-triangular `r`
pub fn back_substitute(
    r: &DMatrix<f64>,
    rhs: &mut DVector<f64>,
    zero_threshold: f64,
) -> MpcResult<()> {
    if has_negligible_pivot(r, zero_threshold) || !r.solve_upper_triangular_mut(rhs) {
        return Err(MpcError::SingularMatrix("upper-triangular factor"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix2;

    #[test]
    fn test_block_diagonal() {
        let c = Matrix2::new(1.0, 2.0, 3.0, 4.0);
        let cz = block_diagonal(&c, 3);
        assert_eq!(cz.shape(), (6, 6));
        assert_eq!(cz[(2, 2)], 1.0);
        assert_eq!(cz[(5, 4)], 3.0);
        assert_eq!(cz[(0, 2)], 0.0);
        assert_eq!(cz[(4, 1)], 0.0);
    }

    #[test]
    fn test_insert_block() {
        let mut dst = DMatrix::zeros(4, 3);
        let src = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        insert_block(&mut dst, &src, 2, 1);
        assert_eq!(dst[(2, 1)], 1.0);
        assert_eq!(dst[(3, 2)], 4.0);
        assert_eq!(dst.sum(), 10.0);

        let mut dst = DMatrix::zeros(3, 2);
        insert_block_rows(&mut dst, &src, 2, 0, 1);
        assert_eq!(dst.row(2).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0]);
        assert_eq!(dst.sum(), 3.0);
    }

    #[test]
    #[should_panic]
    fn test_insert_block_out_of_bounds() {
        let mut dst = DMatrix::zeros(2, 2);
        insert_block(&mut dst, &DMatrix::zeros(2, 2), 1, 0);
    }

    #[test]
    fn test_shifted_block_columns() {
        let src = DMatrix::from_column_slice(3, 1, &[1.0, 2.0, 3.0]);
        let theta = shifted_block_columns(&src, 1, 2);
        let expected = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 1.0, 3.0, 2.0]);
        assert_eq!(theta, expected);
    }

    #[test]
    fn test_checked_inverse() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let inv = checked_inverse(&m, 1e-12, "test").unwrap();
        assert_relative_eq!(&m * inv, DMatrix::identity(2, 2), epsilon = 1e-12);
    }

    #[test]
    fn test_checked_inverse_singular() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let result = checked_inverse(&m, 1e-12, "test");
        assert!(matches!(result, Err(MpcError::SingularMatrix("test"))));
        assert!(checked_inverse(&DMatrix::zeros(2, 2), 1e-12, "test").is_err());
    }

    #[test]
    fn test_checked_cholesky_solves_in_place() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let chol = checked_cholesky(m.clone(), 1e-12, "test").unwrap();
        let mut rhs = DVector::from_vec(vec![6.0, 5.0]);
        chol.solve_mut(&mut rhs);
        assert_relative_eq!(&m * rhs, DVector::from_vec(vec![6.0, 5.0]), epsilon = 1e-12);
        assert_eq!(chol.unpack_dirty().shape(), (2, 2));
    }

    #[test]
    fn test_pivot_check_is_scale_free() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 7.0]);
        for &scale in &[1.0, 1e-7, 1e7] {
            let scaled = &a * scale;
            assert!(checked_qr(scaled.clone(), 1e-12, "test").is_ok());
            assert!(checked_inverse(&(scaled.transpose() * &scaled), 1e-12, "test").is_ok());
        }
    }

    #[test]
    fn test_cholesky_and_qr_agree_on_near_rank_deficiency() {
        // Columns differ by 1e-7, so the pivot ratio of A'A is about 1e-15
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, 1.0 + 1e-7, 1.0, 1.0]);
        let hessian = a.transpose() * &a;
        assert!(checked_qr(a.clone(), 1e-12, "test").is_err());
        assert!(checked_inverse(&hessian, 1e-12, "test").is_err());

        // A looser threshold accepts the QR triangle and the Cholesky factor alike
        assert!(checked_qr(a, 1e-16, "test").is_ok());
    }

    #[test]
    fn test_checked_qr_reconstructs() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 7.0]);
        let factors = checked_qr(m.clone(), 1e-12, "test").unwrap();
        assert_eq!(factors.q_t.shape(), (2, 3));
        assert_eq!(factors.r.shape(), (2, 2));
        assert_relative_eq!(factors.q_t.transpose() * &factors.r, m, epsilon = 1e-12);
        assert_eq!(factors.r[(1, 0)], 0.0);
    }

    #[test]
    fn test_checked_qr_rank_deficient() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        assert!(matches!(
            checked_qr(m, 1e-12, "test"),
            Err(MpcError::RankDeficient("test"))
        ));
    }

    #[test]
    fn test_back_substitute() {
        let r = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 4.0]);
        let mut rhs = DVector::from_vec(vec![5.0, 8.0]);
        back_substitute(&r, &mut rhs, 1e-12).unwrap();
        assert_relative_eq!(rhs, DVector::from_vec(vec![1.5, 2.0]), epsilon = 1e-12);

        let singular = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 0.0]);
        let mut rhs = DVector::from_vec(vec![5.0, 8.0]);
        assert!(back_substitute(&singular, &mut rhs, 1e-12).is_err());
    }
}
