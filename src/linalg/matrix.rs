//! Dense matrix primitive for information-form estimation
//!
//! A thin checked layer over `nalgebra::DMatrix<f64>`. Every binary
//! operation validates shapes and reports `DimensionMismatch` instead of
//! panicking, and inversion reports `SingularMatrix`. On top of the usual
//! algebra it provides the two index-remapping operations an information
//! filter needs:
//!
//! - `expand` grows a matrix, placing existing rows/columns at new positions
//!   and zero-filling the rest (used when a new unknown is introduced);
//! - `take` extracts the sub-matrix formed by a list of row and column
//!   indices (used to split a state into the block being eliminated and the
//!   block being kept).

use nalgebra::DMatrix;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::common::{RoboticsError, RoboticsResult};

/// Relative tolerance used to decide whether Cholesky applies
const SYMMETRY_TOL: f64 = 1e-9;

/// Dense row/column matrix of f64
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: DMatrix<f64>,
}

impl Matrix {
    /// Zero matrix of the given shape
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { data: DMatrix::zeros(rows, cols) }
    }

    /// Square identity matrix
    pub fn identity(n: usize) -> Self {
        Self { data: DMatrix::identity(n, n) }
    }

    /// Build from values laid out row by row
    pub fn from_row_slice(rows: usize, cols: usize, values: &[f64]) -> RoboticsResult<Self> {
        if values.len() != rows * cols {
            return Err(RoboticsError::DimensionMismatch(format!(
                "{} values cannot fill a {}x{} matrix",
                values.len(),
                rows,
                cols
            )));
        }
        Ok(Self { data: DMatrix::from_row_slice(rows, cols, values) })
    }

    /// Column vector
    pub fn column(values: &[f64]) -> Self {
        Self { data: DMatrix::from_column_slice(values.len(), 1, values) }
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    pub fn is_square(&self) -> bool {
        self.data.is_square()
    }

    /// Borrow the underlying nalgebra matrix
    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    fn mismatch(&self, op: &str, other: &Matrix) -> RoboticsError {
        let (r1, c1) = self.shape();
        let (r2, c2) = other.shape();
        RoboticsError::DimensionMismatch(format!("{} {}x{} and {}x{}", op, r1, c1, r2, c2))
    }

    /// Element-wise sum of two matrices of the same shape
    pub fn add(&self, other: &Matrix) -> RoboticsResult<Matrix> {
        if self.shape() != other.shape() {
            return Err(self.mismatch("add", other));
        }
        Ok(Self { data: &self.data + &other.data })
    }

    /// Element-wise difference of two matrices of the same shape
    pub fn sub(&self, other: &Matrix) -> RoboticsResult<Matrix> {
        if self.shape() != other.shape() {
            return Err(self.mismatch("subtract", other));
        }
        Ok(Self { data: &self.data - &other.data })
    }

    /// Matrix product
    pub fn mul(&self, other: &Matrix) -> RoboticsResult<Matrix> {
        if self.ncols() != other.nrows() {
            return Err(self.mismatch("multiply", other));
        }
        Ok(Self { data: &self.data * &other.data })
    }

    /// Multiply every element by a scalar
    pub fn scale(&self, factor: f64) -> Matrix {
        Self { data: &self.data * factor }
    }

    pub fn transpose(&self) -> Matrix {
        Self { data: self.data.transpose() }
    }

    /// Whether the matrix equals its transpose within `tol`
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        let n = self.nrows();
        (0..n).all(|i| (i + 1..n).all(|j| (self.data[(i, j)] - self.data[(j, i)]).abs() <= tol))
    }

    fn looks_symmetric(&self) -> bool {
        let scale = self.data.amax().max(1.0);
        self.is_symmetric(SYMMETRY_TOL * scale)
    }

    fn require_square(&self, op: &str) -> RoboticsResult<()> {
        if !self.is_square() {
            let (r, c) = self.shape();
            return Err(RoboticsError::DimensionMismatch(format!(
                "{} requires a square matrix, got {}x{}",
                op, r, c
            )));
        }
        Ok(())
    }

    /// Inverse of a square matrix
    ///
    /// Symmetric matrices go through Cholesky; anything else, or a
    /// symmetric matrix that is not positive definite, falls back to LU.
    pub fn inverse(&self) -> RoboticsResult<Matrix> {
        self.require_square("inverse")?;

        if self.looks_symmetric() {
            if let Some(chol) = self.data.clone().cholesky() {
                return Ok(Self { data: chol.inverse() });
            }
        }

        let (r, c) = self.shape();
        match self.data.clone().try_inverse() {
            Some(inv) if inv.iter().all(|v| v.is_finite()) => Ok(Self { data: inv }),
            _ => Err(RoboticsError::SingularMatrix(format!("cannot invert {}x{} matrix", r, c))),
        }
    }

    /// Solve `self * x = rhs` for x
    pub fn solve(&self, rhs: &Matrix) -> RoboticsResult<Matrix> {
        self.require_square("solve")?;
        if self.nrows() != rhs.nrows() {
            return Err(self.mismatch("solve", rhs));
        }

        if self.looks_symmetric() {
            if let Some(chol) = self.data.clone().cholesky() {
                return Ok(Self { data: chol.solve(&rhs.data) });
            }
        }

        let (r, c) = self.shape();
        match self.data.clone().lu().solve(&rhs.data) {
            Some(x) if x.iter().all(|v| v.is_finite()) => Ok(Self { data: x }),
            _ => Err(RoboticsError::SingularMatrix(format!("cannot solve {}x{} system", r, c))),
        }
    }

    /// Grow to `rows x cols`, moving row `i` to `row_map[i]` and column `j`
    /// to `col_map[j]`. Unmapped entries are zero.
    pub fn expand(
        &self,
        rows: usize,
        cols: usize,
        row_map: &[usize],
        col_map: &[usize],
    ) -> RoboticsResult<Matrix> {
        if row_map.len() != self.nrows() || col_map.len() != self.ncols() {
            return Err(RoboticsError::DimensionMismatch(format!(
                "expand maps of length {}/{} for a {}x{} matrix",
                row_map.len(),
                col_map.len(),
                self.nrows(),
                self.ncols()
            )));
        }
        if let Some(&bad) = row_map.iter().find(|&&r| r >= rows) {
            return Err(RoboticsError::DimensionMismatch(format!(
                "expand row target {} outside {} rows",
                bad, rows
            )));
        }
        if let Some(&bad) = col_map.iter().find(|&&c| c >= cols) {
            return Err(RoboticsError::DimensionMismatch(format!(
                "expand column target {} outside {} columns",
                bad, cols
            )));
        }

        let mut data = DMatrix::zeros(rows, cols);
        for (i, &ri) in row_map.iter().enumerate() {
            for (j, &cj) in col_map.iter().enumerate() {
                data[(ri, cj)] = self.data[(i, j)];
            }
        }
        Ok(Self { data })
    }

    /// Sub-matrix made of `rows` and `cols` (defaults to `rows`) in the given order
    pub fn take(&self, rows: &[usize], cols: Option<&[usize]>) -> RoboticsResult<Matrix> {
        let cols = cols.unwrap_or(rows);
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.nrows()) {
            return Err(RoboticsError::DimensionMismatch(format!(
                "take row {} from {} rows",
                bad,
                self.nrows()
            )));
        }
        if let Some(&bad) = cols.iter().find(|&&c| c >= self.ncols()) {
            return Err(RoboticsError::DimensionMismatch(format!(
                "take column {} from {} columns",
                bad,
                self.ncols()
            )));
        }
        let data = DMatrix::from_fn(rows.len(), cols.len(), |i, j| self.data[(rows[i], cols[j])]);
        Ok(Self { data })
    }

    /// Overwrite the block starting at (`row`, `col`) with `block`
    pub fn set_block(&mut self, row: usize, col: usize, block: &Matrix) -> RoboticsResult<()> {
        if row + block.nrows() > self.nrows() || col + block.ncols() > self.ncols() {
            return Err(RoboticsError::DimensionMismatch(format!(
                "{}x{} block at ({}, {}) does not fit in {}x{}",
                block.nrows(),
                block.ncols(),
                row,
                col,
                self.nrows(),
                self.ncols()
            )));
        }
        for i in 0..block.nrows() {
            for j in 0..block.ncols() {
                self.data[(row + i, col + j)] = block.data[(i, j)];
            }
        }
        Ok(())
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.data[index]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.data[index]
    }
}

impl From<DMatrix<f64>> for Matrix {
    fn from(data: DMatrix<f64>) -> Self {
        Self { data }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.nrows() {
            let row: Vec<String> = (0..self.ncols()).map(|j| format!("{:.3}", self.data[(i, j)])).collect();
            writeln!(f, "[{}]", row.join(", "))?;
        }
        Ok(())
    }
}
