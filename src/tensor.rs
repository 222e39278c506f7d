//! Dense NCHW tensors for driving graph evaluation.
//!
//! The binding only needs enough tensor machinery to push an example input
//! through a network once and observe the shapes arriving at each
//! placeholder. Everything is `f32`, batch-channel-height-width.

use std::fmt;

use crate::{bail, Result};

/// Four-dimensional tensor shape (batch, channels, height, width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
}

impl Shape {
    pub fn new(n: usize, c: usize, h: usize, w: usize) -> Self {
        Self { n, c, h, w }
    }

    /// Total number of elements.
    pub fn n_elements(&self) -> usize {
        self.n * self.c * self.h * self.w
    }

    /// Flat index of element `(n, c, h, w)` in row-major layout.
    pub fn index(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        ((n * self.c + c) * self.h + h) * self.w + w
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}x{}", self.n, self.c, self.h, self.w)
    }
}

/// A tensor with dense `f32` data.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Shape,
    pub data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor from a shape and matching data buffer.
    pub fn new(shape: Shape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.n_elements() {
            bail!(
                "shape {} requires {} elements, got {}",
                shape,
                shape.n_elements(),
                data.len()
            );
        }
        Ok(Self { shape, data })
    }

    /// Create a zero-filled tensor.
    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.n_elements()],
        }
    }

    /// Element at `(n, c, h, w)`.
    pub fn at(&self, n: usize, c: usize, h: usize, w: usize) -> f32 {
        self.data[self.shape.index(n, c, h, w)]
    }
}
