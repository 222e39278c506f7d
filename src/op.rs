//! The operator seam and the small stock-op set.
//!
//! Networks handed to the sampler are graphs of boxed [`Operator`]s. The
//! trait is deliberately narrow: consume input tensors, produce one output
//! tensor. Placeholder detection relies on `as_any` downcasting, so every
//! operator also exposes itself as `Any`.

use std::fmt::Debug;

use crate::tensor::{Shape, Tensor};
use crate::{bail, Result};

/// Either an owned or borrowed tensor that gets consumed by ops.
pub enum InputTensor<'a> {
    /// An owned tensor.
    Owned(Tensor),
    /// A borrowed tensor.
    Borrowed(&'a Tensor),
}

impl<'a> InputTensor<'a> {
    /// Borrow the tensor.
    pub fn borrowed(&'a self) -> &'a Tensor {
        match self {
            InputTensor::Owned(t) => t,
            InputTensor::Borrowed(t) => t,
        }
    }

    /// Unwrap or clone the tensor, depending on if it's owned or not.
    pub fn cloned(self) -> Tensor {
        match self {
            InputTensor::Owned(t) => t,
            InputTensor::Borrowed(t) => t.clone(),
        }
    }
}

/// The main operator trait.
///
/// Takes the input tensors arriving on a node's inbound edges (in slot
/// order) and produces the node's output tensor.
pub trait Operator: Debug + as_any::AsAny {
    fn process(&mut self, inp: Vec<InputTensor>) -> Result<Tensor>;
}

impl<T: Operator> Operator for Box<T> {
    fn process(&mut self, inp: Vec<InputTensor>) -> Result<Tensor> {
        <T as Operator>::process(self, inp)
    }
}

fn single<'a>(mut inp: Vec<InputTensor<'a>>, op: &str) -> Result<InputTensor<'a>> {
    if inp.len() != 1 {
        bail!("{op} expects exactly one input, got {}", inp.len());
    }
    Ok(inp.remove(0))
}

/// Rectified Linear Unit activation.
#[derive(Debug, Default, Clone)]
pub struct ReLU;

impl Operator for ReLU {
    fn process(&mut self, inp: Vec<InputTensor>) -> Result<Tensor> {
        let mut x = single(inp, "ReLU")?.cloned();
        for v in &mut x.data {
            *v = v.max(0.0);
        }
        Ok(x)
    }
}

/// Average pooling with a square window and equal stride.
///
/// Height and width must divide by the stride; the search engine enforces
/// the same rule on its side.
#[derive(Debug, Clone)]
pub struct AvgPool2d {
    pub stride: usize,
}

impl AvgPool2d {
    pub fn new(stride: usize) -> Self {
        Self { stride }
    }
}

impl Operator for AvgPool2d {
    fn process(&mut self, inp: Vec<InputTensor>) -> Result<Tensor> {
        let inp = single(inp, "AvgPool2d")?;
        let x = inp.borrowed();
        let s = self.stride;
        if s == 0 {
            bail!("AvgPool2d stride must be positive");
        }
        let shape = x.shape;
        if shape.h % s != 0 || shape.w % s != 0 {
            bail!(
                "height and width should be dividable by striding number: shape {shape}, stride {s}"
            );
        }
        let mut out = Tensor::zeros(Shape::new(shape.n, shape.c, shape.h / s, shape.w / s));
        let norm = (s * s) as f32;
        for n in 0..out.shape.n {
            for c in 0..out.shape.c {
                for h in 0..out.shape.h {
                    for w in 0..out.shape.w {
                        let mut acc = 0.0;
                        for dh in 0..s {
                            for dw in 0..s {
                                acc += x.at(n, c, h * s + dh, w * s + dw);
                            }
                        }
                        out.data[out.shape.index(n, c, h, w)] = acc / norm;
                    }
                }
            }
        }
        Ok(out)
    }
}
