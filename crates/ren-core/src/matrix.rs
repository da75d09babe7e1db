// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Kernel Matrix Algebra
// ─────────────────────────────────────────────────────────────────────
//! Dense matrix helpers on top of `nalgebra` used by certificate
//! construction and the interconnection gain scaling.
//!
//! Every function is pure: inputs are borrowed, outputs are new values.

use nalgebra::{Cholesky, DMatrix, DVector};

use ren_types::{RenError, RenResult};

pub type Mat = DMatrix<f64>;
pub type Vector = DVector<f64>;

/// Relative residual `‖A·A⁻¹ − I‖_max` above which an inverse is
/// treated as numerically singular.
const INVERSE_RESIDUAL_TOL: f64 = 1e-6;

/// Fail with `DimensionMismatch` unless `m` is `rows × cols`.
pub fn ensure_shape(m: &Mat, rows: usize, cols: usize, context: &str) -> RenResult<()> {
    if m.shape() != (rows, cols) {
        return Err(RenError::dimension(context, (rows, cols), m.shape()));
    }
    Ok(())
}

/// Fail with `DimensionMismatch` unless `v` has `len` entries.
pub fn ensure_len(v: &Vector, len: usize, context: &str) -> RenResult<()> {
    if v.len() != len {
        return Err(RenError::dimension(context, (len, 1), (v.len(), 1)));
    }
    Ok(())
}

/// `XᵗX + εI`: symmetric positive definite for any `X` when ε > 0.
pub fn regularised_gram(x: &Mat, epsilon: f64) -> Mat {
    let n = x.ncols();
    x.tr_mul(x) + Mat::identity(n, n) * epsilon
}

/// Split a square matrix into a 3×3 block grid with boundaries `sizes`
/// along both rows and columns. `blocks[r][c]` is block `H_{r+1,c+1}`.
pub fn split3(h: &Mat, sizes: [usize; 3]) -> RenResult<[[Mat; 3]; 3]> {
    let total: usize = sizes.iter().sum();
    ensure_shape(h, total, total, "block split")?;
    let offsets = [0, sizes[0], sizes[0] + sizes[1]];
    let block = |r: usize, c: usize| -> Mat {
        h.view((offsets[r], offsets[c]), (sizes[r], sizes[c]))
            .into_owned()
    };
    Ok([
        [block(0, 0), block(0, 1), block(0, 2)],
        [block(1, 0), block(1, 1), block(1, 2)],
        [block(2, 0), block(2, 1), block(2, 2)],
    ])
}

/// Stack blocks vertically; every block must share the column count.
pub fn vstack(blocks: &[&Mat]) -> RenResult<Mat> {
    let cols = blocks.first().map_or(0, |b| b.ncols());
    let rows: usize = blocks.iter().map(|b| b.nrows()).sum();
    let mut out = Mat::zeros(rows, cols);
    let mut row = 0;
    for b in blocks {
        if b.ncols() != cols {
            return Err(RenError::dimension("vstack", (b.nrows(), cols), b.shape()));
        }
        out.view_mut((row, 0), b.shape()).copy_from(*b);
        row += b.nrows();
    }
    Ok(out)
}

/// Concatenate blocks horizontally; every block must share the row count.
pub fn hstack(blocks: &[&Mat]) -> RenResult<Mat> {
    let rows = blocks.first().map_or(0, |b| b.nrows());
    let cols: usize = blocks.iter().map(|b| b.ncols()).sum();
    let mut out = Mat::zeros(rows, cols);
    let mut col = 0;
    for b in blocks {
        if b.nrows() != rows {
            return Err(RenError::dimension("hstack", (rows, b.ncols()), b.shape()));
        }
        out.view_mut((0, col), b.shape()).copy_from(*b);
        col += b.ncols();
    }
    Ok(out)
}

/// Entries strictly below the main diagonal; everything else zero.
pub fn strict_lower(m: &Mat) -> Mat {
    Mat::from_fn(m.nrows(), m.ncols(), |i, j| if i > j { m[(i, j)] } else { 0.0 })
}

/// Main diagonal as a vector.
pub fn diag_vec(m: &Mat) -> Vector {
    m.diagonal()
}

/// Square matrix with `v` on the diagonal.
pub fn diag_matrix(v: &Vector) -> Mat {
    Mat::from_diagonal(v)
}

/// Checked inverse of a square matrix.
///
/// Fails with `SingularMatrix` when LU elimination breaks down, when the
/// result contains non-finite entries, or when `A·A⁻¹` drifts from the
/// identity by more than a fixed tolerance.
pub fn inverse(m: &Mat, context: &str) -> RenResult<Mat> {
    let n = m.nrows();
    ensure_shape(m, n, n, context)?;
    if n == 0 {
        return Ok(Mat::zeros(0, 0));
    }
    let inv = m
        .clone()
        .try_inverse()
        .ok_or_else(|| RenError::SingularMatrix(format!("{context} is not invertible")))?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(RenError::SingularMatrix(format!(
            "{context} inverse has non-finite entries"
        )));
    }
    let residual = (m * &inv - Mat::identity(n, n)).amax();
    if residual > INVERSE_RESIDUAL_TOL {
        return Err(RenError::SingularMatrix(format!(
            "{context} is numerically singular (residual {residual:.3e})"
        )));
    }
    Ok(inv)
}

/// Row-wise sums of absolute values.
pub fn row_abs_sums(m: &Mat) -> Vector {
    Vector::from_iterator(
        m.nrows(),
        m.row_iter().map(|r| r.iter().map(|v| v.abs()).sum()),
    )
}

/// Column-wise sums of absolute values.
pub fn col_abs_sums(m: &Mat) -> Vector {
    Vector::from_iterator(
        m.ncols(),
        m.column_iter().map(|c| c.iter().map(|v| v.abs()).sum()),
    )
}

/// Largest row absolute sum (induced ∞-norm); 0 for an empty matrix.
pub fn max_row_abs_sum(m: &Mat) -> f64 {
    row_abs_sums(m).iter().copied().fold(0.0, f64::max)
}

/// Largest column absolute sum (induced 1-norm); 0 for an empty matrix.
pub fn max_col_abs_sum(m: &Mat) -> f64 {
    col_abs_sums(m).iter().copied().fold(0.0, f64::max)
}

/// Kronecker product `a ⊗ b`.
pub fn kron(a: &Mat, b: &Mat) -> Mat {
    a.kronecker(b)
}

/// True when `m` is symmetric (within `tol`) and admits a Cholesky factor.
pub fn is_positive_definite(m: &Mat, tol: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    if m.is_empty() {
        return true;
    }
    if (m - m.transpose()).amax() > tol {
        return false;
    }
    Cholesky::new(m.clone()).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rows: usize, cols: usize) -> Mat {
        Mat::from_fn(rows, cols, |i, j| ((i * cols + j) as f64 * 0.37).sin())
    }

    #[test]
    fn test_regularised_gram_positive_definite() {
        // Rank-deficient X still yields an SPD Gram once regularised.
        let x = Mat::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 0.0]);
        let h = regularised_gram(&x, 0.001);
        assert!(is_positive_definite(&h, 1e-12));
    }

    #[test]
    fn test_split3_blocks() {
        let h = sample(6, 6);
        let [[h11, h12, h13], [h21, h22, _], [h31, h32, h33]] = split3(&h, [2, 1, 3]).unwrap();
        assert_eq!(h11.shape(), (2, 2));
        assert_eq!(h12.shape(), (2, 1));
        assert_eq!(h13.shape(), (2, 3));
        assert_eq!(h21.shape(), (1, 2));
        assert_eq!(h22.shape(), (1, 1));
        assert_eq!(h31.shape(), (3, 2));
        assert_eq!(h32.shape(), (3, 1));
        assert_eq!(h33.shape(), (3, 3));
        assert_eq!(h22[(0, 0)], h[(2, 2)]);
        assert_eq!(h31[(0, 1)], h[(3, 1)]);
        assert_eq!(h33[(2, 2)], h[(5, 5)]);
    }

    #[test]
    fn test_split3_empty_middle() {
        let h = sample(4, 4);
        let blocks = split3(&h, [2, 0, 2]).unwrap();
        assert_eq!(blocks[1][1].shape(), (0, 0));
        assert_eq!(blocks[2][1].shape(), (2, 0));
    }

    #[test]
    fn test_split3_wrong_size() {
        assert!(matches!(
            split3(&sample(4, 4), [2, 1, 2]),
            Err(RenError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_vstack_hstack() {
        let a = sample(2, 3);
        let b = sample(1, 3);
        let v = vstack(&[&a, &b]).unwrap();
        assert_eq!(v.shape(), (3, 3));
        assert_eq!(v[(2, 1)], b[(0, 1)]);

        let c = sample(2, 1);
        let h = hstack(&[&a, &c]).unwrap();
        assert_eq!(h.shape(), (2, 4));
        assert_eq!(h[(1, 3)], c[(1, 0)]);

        assert!(vstack(&[&a, &c]).is_err());
        assert!(hstack(&[&a, &b]).is_err());
    }

    #[test]
    fn test_strict_lower() {
        let m = sample(4, 4);
        let low = strict_lower(&m);
        for i in 0..4 {
            for j in 0..4 {
                if i > j {
                    assert_eq!(low[(i, j)], m[(i, j)]);
                } else {
                    assert_eq!(low[(i, j)], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_diag_roundtrip() {
        let v = Vector::from_vec(vec![1.0, -2.0, 3.5]);
        let d = diag_matrix(&v);
        assert_eq!(d[(1, 1)], -2.0);
        assert_eq!(d[(0, 1)], 0.0);
        assert_eq!(diag_vec(&d), v);
    }

    #[test]
    fn test_inverse_identity() {
        let h = regularised_gram(&sample(5, 5), 0.01);
        let inv = inverse(&h, "H").unwrap();
        let prod = &h * &inv;
        assert!((prod - Mat::identity(5, 5)).amax() < 1e-6);
    }

    #[test]
    fn test_inverse_singular() {
        let m = Mat::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(matches!(inverse(&m, "M"), Err(RenError::SingularMatrix(_))));
    }

    #[test]
    fn test_inverse_non_square() {
        assert!(matches!(
            inverse(&sample(2, 3), "M"),
            Err(RenError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_inverse_empty() {
        let inv = inverse(&Mat::zeros(0, 0), "E").unwrap();
        assert_eq!(inv.shape(), (0, 0));
    }

    #[test]
    fn test_abs_sums() {
        let m = Mat::from_row_slice(2, 3, &[1.0, -2.0, 0.5, -3.0, 0.0, 1.0]);
        assert_eq!(row_abs_sums(&m), Vector::from_vec(vec![3.5, 4.0]));
        assert_eq!(col_abs_sums(&m), Vector::from_vec(vec![4.0, 2.0, 1.5]));
        assert_eq!(max_row_abs_sum(&m), 4.0);
        assert_eq!(max_col_abs_sum(&m), 4.0);
        assert_eq!(max_row_abs_sum(&Mat::zeros(0, 3)), 0.0);
    }

    #[test]
    fn test_kron_shape_and_values() {
        let a = Mat::identity(2, 2);
        let b = Mat::from_row_slice(2, 1, &[3.0, 4.0]);
        let k = kron(&a, &b);
        assert_eq!(k.shape(), (4, 2));
        assert_eq!(k[(1, 0)], 4.0);
        assert_eq!(k[(2, 1)], 3.0);
        assert_eq!(k[(2, 0)], 0.0);
    }

    #[test]
    fn test_positive_definite_rejects_asymmetric() {
        let m = Mat::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 2.0]);
        assert!(!is_positive_definite(&m, 1e-12));
    }

    #[test]
    fn test_ensure_shape() {
        assert!(ensure_shape(&sample(2, 3), 2, 3, "m").is_ok());
        assert!(ensure_shape(&sample(2, 3), 3, 2, "m").is_err());
        assert!(ensure_len(&Vector::zeros(3), 3, "v").is_ok());
        assert!(ensure_len(&Vector::zeros(3), 4, "v").is_err());
    }
}
