//! Host-side binding for a convolutional-kernel architecture search engine.
//!
//! The engine itself is opaque: it explores a space of kernel designs under
//! constraints on primitive counts, graph width and candidate sizes, and
//! returns a generated kernel module. This crate is the thin layer in front
//! of it:
//!
//! - [`options`]: validate user-facing search parameters into an immutable
//!   [`SampleOptions`](options::SampleOptions) before any engine call.
//! - [`placeholder`]: find the substitutable sites of a network, observe the
//!   shapes flowing into them, and later splice a sampled kernel into each.
//! - [`sample`]: the [`Sampler`](sample::Sampler) glue that pairs site
//!   shapes with the engine call and hands the kernel pack back.
//!
//! Engines plug in through the [`SearchBackend`](backend::SearchBackend)
//! trait; networks are [`Graph`](graph::Graph)s of boxed operators.
//!
//! ```
//! use canvas::prelude::*;
//!
//! // A stand-in engine: every sample returns a kernel that doubles its
//! // input.
//! #[derive(Debug, Clone)]
//! struct Double;
//!
//! impl Operator for Double {
//!     fn process(&mut self, mut inp: Vec<InputTensor>) -> Result<Tensor> {
//!         let mut x = inp.remove(0).cloned();
//!         for v in &mut x.data {
//!             *v *= 2.0;
//!         }
//!         Ok(x)
//!     }
//! }
//!
//! #[derive(Debug, Clone)]
//! struct DoubleModule;
//!
//! impl KernelModule for DoubleModule {
//!     fn instantiate(&self, _spec: KernelSpec) -> Box<dyn Operator> {
//!         Box::new(Double)
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Doubler;
//!
//! impl SearchBackend for Doubler {
//!     fn sample(&self, _specs: &[KernelSpec], _options: &SampleOptions) -> Result<KernelPack> {
//!         Ok(KernelPack {
//!             name: "double".into(),
//!             module: Box::new(DoubleModule),
//!             graphviz: String::new(),
//!             source: String::new(),
//!         })
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     // relu -> placeholder
//!     let mut cx = Graph::new();
//!     let relu = cx.add_op(ReLU);
//!     let site = cx.add_op(Placeholder::new());
//!     cx.connect(relu, site, 0);
//!
//!     let options = SampleOptions::builder().timeout(30).build()?;
//!     let mut sampler = Sampler::new(Doubler);
//!
//!     let example = Tensor::zeros(Shape::new(1, 3, 32, 32));
//!     let pack = sampler.sample(&mut cx, Some(&example), &options)?.unwrap();
//!     sampler.replace(&mut cx, &pack)?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod graph;
pub mod op;
pub mod options;
pub mod placeholder;
pub mod sample;
pub mod tensor;

pub use error::{CanvasError, Result};

pub mod prelude {
    pub use crate::backend::{KernelModule, KernelPack, KernelSpec, SearchBackend};
    pub use crate::error::{CanvasError, Result};
    pub use crate::graph::{Graph, GraphId};
    pub use crate::op::{AvgPool2d, InputTensor, Operator, ReLU};
    pub use crate::options::{SampleOptions, SampleOptionsBuilder};
    pub use crate::placeholder::{Placeholder, PlaceholderSite, SiteState, SubstitutionManager};
    pub use crate::sample::Sampler;
    pub use crate::tensor::{Shape, Tensor};
    pub use as_any::AsAny;
}
