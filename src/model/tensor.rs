use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense row-major `f32` array with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data:  Vec<f32>,
}

impl Tensor {
    /// Builds a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(Error::ShapeMismatch {
                name: "tensor".to_owned(),
                expected: shape,
                got: vec![data.len()],
            });
        }
        Ok(Tensor { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Tensor {
        let numel = shape.iter().product();
        Tensor { shape, data: vec![0.0; numel] }
    }

    /// Rank-0 tensor holding a single value.
    pub fn scalar(value: f32) -> Tensor {
        Tensor { shape: Vec::new(), data: vec![value] }
    }

    /// Rank-1 tensor over `data`.
    pub fn vector(data: Vec<f32>) -> Tensor {
        Tensor { shape: vec![data.len()], data }
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&x| x as f64).sum()
    }

    /// The single value of a one-element tensor.
    pub fn item(&self) -> Result<f32> {
        match self.data.as_slice() {
            [value] => Ok(*value),
            _ => Err(Error::ShapeMismatch {
                name: "tensor".to_owned(),
                expected: Vec::new(),
                got: self.shape.clone(),
            }),
        }
    }

    /// Contiguous slice over the last dimension at the given leading indices.
    ///
    /// For a `[B, T, V]` tensor, `lane(&[b, t])` is the length-`V` slice.
    pub fn lane(&self, leading: &[usize]) -> Result<&[f32]> {
        let (start, len) = self.lane_bounds(leading)?;
        Ok(&self.data[start..start + len])
    }

    pub fn lane_mut(&mut self, leading: &[usize]) -> Result<&mut [f32]> {
        let (start, len) = self.lane_bounds(leading)?;
        Ok(&mut self.data[start..start + len])
    }

    fn lane_bounds(&self, leading: &[usize]) -> Result<(usize, usize)> {
        if self.shape.is_empty() || leading.len() != self.shape.len() - 1 {
            return Err(Error::ShapeMismatch {
                name: "tensor lane".to_owned(),
                expected: leading.to_vec(),
                got: self.shape.clone(),
            });
        }
        let mut offset = 0;
        for (&index, &dim) in leading.iter().zip(self.shape.iter()) {
            if index >= dim {
                return Err(Error::ShapeMismatch {
                    name: "tensor lane".to_owned(),
                    expected: leading.to_vec(),
                    got: self.shape.clone(),
                });
            }
            offset = offset * dim + index;
        }
        let len = self.shape[self.shape.len() - 1];
        Ok((offset * len, len))
    }
}
