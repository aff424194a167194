//! Dense vectors and matrices.
//!
//! Both types reject empty shapes at construction, so every `Vector` has at
//! least one element and every `Matrix` at least one row and one column.
//!
//! Products are computed as independent per-output dot products. Above
//! [`PARALLEL_THRESHOLD`] elements the output indices are split across the
//! Rayon pool; each worker writes a disjoint output element, so no locking is
//! involved.

use super::{Activation, NetError, NetResult};
use ndarray::{Array1, Array2, ArrayView1, Zip};
use ndarray_rand::rand_distr::{StandardNormal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Element count at which products and element-wise maps switch to Rayon.
pub(crate) const PARALLEL_THRESHOLD: usize = 4096;

/// Weight initialization scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    /// Uniform samples from the half-open interval `[low, high)`.
    Uniform { low: f64, high: f64 },
    /// Zero-mean normal samples scaled by `sqrt(2 / fan_in)`.
    He,
}

impl Default for WeightInit {
    fn default() -> Self {
        WeightInit::Uniform {
            low: -0.5,
            high: 0.5,
        }
    }
}

/// Fixed-length vector of reals.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    values: Array1<f64>,
}

impl Vector {
    /// Zero-filled vector of length `n`.
    ///
    /// # Errors
    /// - `Shape` if `n` is zero
    pub fn zeros(n: usize) -> NetResult<Self> {
        if n < 1 {
            return Err(NetError::Shape(
                "vector length must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            values: Array1::zeros(n),
        })
    }

    /// Copy a literal array into a new vector.
    ///
    /// # Errors
    /// - `Shape` if `values` is empty
    pub fn from_slice(values: &[f64]) -> NetResult<Self> {
        Self::from_array(Array1::from(values.to_vec()))
    }

    /// Wrap an existing ndarray.
    ///
    /// # Errors
    /// - `Shape` if `values` is empty
    pub fn from_array(values: Array1<f64>) -> NetResult<Self> {
        if values.is_empty() {
            return Err(NetError::Shape("vector array is empty".to_string()));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.values
    }

    /// Apply `f` to every element, producing a new vector.
    pub fn map(&self, f: fn(f64) -> f64) -> Vector {
        let mut values = self.values.clone();
        if values.len() >= PARALLEL_THRESHOLD {
            values.par_mapv_inplace(f);
        } else {
            values.mapv_inplace(f);
        }
        Vector { values }
    }

    /// Element-wise activation: f(x)
    pub fn activate(&self, activation: Activation) -> Vector {
        self.map(activation.kernel().evaluate)
    }

    /// Element-wise activation derivative: f'(x)
    pub fn derivative(&self, activation: Activation) -> Vector {
        self.map(activation.kernel().derivative)
    }

    /// Sum of squared elements.
    ///
    /// No square root is taken; callers accumulate several norms and take the
    /// root once.
    pub fn norm(&self) -> f64 {
        self.values.dot(&self.values)
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.values[i]
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in self.values.iter() {
            write!(f, "{v}  ")?;
        }
        Ok(())
    }
}

/// Dense `rows × cols` matrix of reals.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    values: Array2<f64>,
}

impl Matrix {
    /// Zero-filled matrix.
    ///
    /// # Errors
    /// - `Shape` if either dimension is zero
    pub fn zeros(rows: usize, cols: usize) -> NetResult<Self> {
        if rows < 1 || cols < 1 {
            return Err(NetError::Shape(format!(
                "matrix dimensions must be greater than zero, got {rows}x{cols}"
            )));
        }
        Ok(Self {
            values: Array2::zeros((rows, cols)),
        })
    }

    /// Build a matrix from row-major nested values.
    ///
    /// # Errors
    /// - `Shape` if there are no rows or the first row is empty
    /// - `ShapeMismatch` if the rows are ragged
    pub fn from_rows(rows: &[Vec<f64>]) -> NetResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut matrix = Self::zeros(rows.len(), cols)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(NetError::ShapeMismatch {
                    expected: cols,
                    actual: row.len(),
                });
            }
            matrix.values.row_mut(i).assign(&ArrayView1::from(row.as_slice()));
        }
        Ok(matrix)
    }

    /// Wrap an existing ndarray.
    ///
    /// # Errors
    /// - `Shape` if either dimension is zero
    pub fn from_array(values: Array2<f64>) -> NetResult<Self> {
        let (rows, cols) = values.dim();
        if rows < 1 || cols < 1 {
            return Err(NetError::Shape(format!(
                "matrix dimensions must be greater than zero, got {rows}x{cols}"
            )));
        }
        Ok(Self { values })
    }

    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get((i, j)).copied()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.values
    }

    /// Zero-filled matrix of the same shape.
    pub fn zeros_like(&self) -> Matrix {
        Matrix {
            values: Array2::zeros(self.values.dim()),
        }
    }

    /// Overwrite every element using `init`.
    ///
    /// # Errors
    /// - `Configuration` if a uniform interval is empty or not finite
    pub fn randomize<R: Rng + ?Sized>(&mut self, init: WeightInit, rng: &mut R) -> NetResult<()> {
        let shape = self.values.dim();
        self.values = match init {
            WeightInit::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite() && low < high) {
                    return Err(NetError::Configuration(format!(
                        "invalid uniform interval [{low}, {high})"
                    )));
                }
                Array2::random_using(shape, Uniform::new(low, high), rng)
            }
            WeightInit::He => {
                let scale = (2.0 / self.cols() as f64).sqrt();
                Array2::random_using(shape, StandardNormal, rng) * scale
            }
        };
        Ok(())
    }

    /// Fill with uniform samples from `[low, high)`.
    pub fn set_random<R: Rng + ?Sized>(&mut self, low: f64, high: f64, rng: &mut R) -> NetResult<()> {
        self.randomize(WeightInit::Uniform { low, high }, rng)
    }

    /// Matrix-vector product: `(rows × cols) · v(cols) → (rows)`.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `v.len() != cols`
    pub fn mul_vec(&self, v: &Vector) -> NetResult<Vector> {
        if v.len() != self.cols() {
            return Err(NetError::ShapeMismatch {
                expected: self.cols(),
                actual: v.len(),
            });
        }

        let x = v.as_array();
        let mut out = Array1::zeros(self.rows());
        let zip = Zip::from(&mut out).and(self.values.rows());
        if self.values.len() >= PARALLEL_THRESHOLD {
            zip.par_for_each(|o, row| *o = row.dot(x));
        } else {
            zip.for_each(|o, row| *o = row.dot(x));
        }
        Ok(Vector { values: out })
    }

    /// Transposed product without materializing the transpose:
    /// `(rows × cols)ᵗ · v(rows) → (cols)`.
    ///
    /// # Errors
    /// - `ShapeMismatch` if `v.len() != rows`
    pub fn transpose_mul_vec(&self, v: &Vector) -> NetResult<Vector> {
        if v.len() != self.rows() {
            return Err(NetError::ShapeMismatch {
                expected: self.rows(),
                actual: v.len(),
            });
        }

        let x = v.as_array();
        let mut out = Array1::zeros(self.cols());
        let zip = Zip::from(&mut out).and(self.values.columns());
        if self.values.len() >= PARALLEL_THRESHOLD {
            zip.par_for_each(|o, column| *o = column.dot(x));
        } else {
            zip.for_each(|o, column| *o = column.dot(x));
        }
        Ok(Vector { values: out })
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.values[index]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.values[index]
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix: [{} x {}]", self.rows(), self.cols())?;
        for row in self.values.rows() {
            for v in row.iter() {
                write!(f, "{v}  ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
