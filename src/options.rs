//! Search configuration: user-facing parameters validated into an immutable
//! record before any backend call is made.
//!
//! Malformed configuration crossing into the opaque engine would surface as
//! an unreadable engine-side failure, so every range and value check happens
//! here, with field-specific messages. Building is a pure function of the
//! inputs; the first violation is reported and nothing is accumulated.

use crate::{CanvasError, Result};

/// Validated, immutable search configuration.
///
/// Constructed once per search request via [`SampleOptions::builder`],
/// passed by value to the backend, never mutated afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOptions {
    /// Comma-separated allow list of primitive type names; empty = no filter.
    pub allowed_filter: String,
    /// Comma-separated deny list of primitive type names; empty = no filter.
    pub forbidden_filter: String,
    /// Whether to append ReLU and BatchNorm after every FC primitive.
    pub add_relu_bn_after_fc: bool,
    /// Candidate pool for kernel sizes.
    pub kernel_sizes: Vec<usize>,
    /// Candidate pool for dilation sizes.
    pub dilated_sizes: Vec<usize>,
    /// Candidate pool for shift sizes.
    pub shift_sizes: Vec<usize>,
    /// Inclusive bounds on the primitive count.
    pub num_primitive_range: (usize, usize),
    /// Inclusive bounds on the graph width during a search.
    pub num_max_width_range: (usize, usize),
    /// Inclusive bounds on the FC primitive count.
    pub num_fc_range: (usize, usize),
    /// Optional FLOPs budget as a ratio range relative to a standard
    /// convolution.
    pub flops_ratio_range: Option<(f64, f64)>,
    /// Optional parameter-count budget as a ratio range relative to a
    /// standard convolution.
    pub params_ratio_range: Option<(f64, f64)>,
    /// Sampling timeout in seconds, zero for no timeout. Enforced by the
    /// backend; only forwarded from here.
    pub timeout: u64,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            allowed_filter: String::new(),
            forbidden_filter: String::new(),
            add_relu_bn_after_fc: false,
            kernel_sizes: vec![3, 5, 7],
            dilated_sizes: vec![1, 2, 3],
            shift_sizes: vec![1, 2, 3],
            num_primitive_range: (3, 25),
            num_max_width_range: (2, 8),
            num_fc_range: (1, 8),
            flops_ratio_range: None,
            params_ratio_range: None,
            timeout: 0,
        }
    }
}

impl SampleOptions {
    /// Start from the default configuration.
    pub fn builder() -> SampleOptionsBuilder {
        SampleOptionsBuilder::default()
    }
}

/// Builder for [`SampleOptions`].
///
/// Setters take `i64` so out-of-domain inputs stay representable and are
/// rejected at [`build`](SampleOptionsBuilder::build) with a field-specific
/// error instead of being silently coerced.
#[derive(Debug, Clone)]
pub struct SampleOptionsBuilder {
    allowed_filter: String,
    forbidden_filter: String,
    add_relu_bn_after_fc: bool,
    kernel_sizes: Vec<i64>,
    dilated_sizes: Vec<i64>,
    shift_sizes: Vec<i64>,
    num_primitive_range: (i64, i64),
    num_max_width_range: (i64, i64),
    num_fc_range: (i64, i64),
    flops_ratio_range: Option<(f64, f64)>,
    params_ratio_range: Option<(f64, f64)>,
    timeout: i64,
}

impl Default for SampleOptionsBuilder {
    fn default() -> Self {
        Self {
            allowed_filter: String::new(),
            forbidden_filter: String::new(),
            add_relu_bn_after_fc: false,
            kernel_sizes: vec![3, 5, 7],
            dilated_sizes: vec![1, 2, 3],
            shift_sizes: vec![1, 2, 3],
            num_primitive_range: (3, 25),
            num_max_width_range: (2, 8),
            num_fc_range: (1, 8),
            flops_ratio_range: None,
            params_ratio_range: None,
            timeout: 0,
        }
    }
}

impl SampleOptionsBuilder {
    pub fn allowed_filter(mut self, filter: impl Into<String>) -> Self {
        self.allowed_filter = filter.into();
        self
    }

    pub fn forbidden_filter(mut self, filter: impl Into<String>) -> Self {
        self.forbidden_filter = filter.into();
        self
    }

    pub fn add_relu_bn_after_fc(mut self, enable: bool) -> Self {
        self.add_relu_bn_after_fc = enable;
        self
    }

    pub fn kernel_sizes(mut self, sizes: impl IntoIterator<Item = i64>) -> Self {
        self.kernel_sizes = sizes.into_iter().collect();
        self
    }

    pub fn dilated_sizes(mut self, sizes: impl IntoIterator<Item = i64>) -> Self {
        self.dilated_sizes = sizes.into_iter().collect();
        self
    }

    pub fn shift_sizes(mut self, sizes: impl IntoIterator<Item = i64>) -> Self {
        self.shift_sizes = sizes.into_iter().collect();
        self
    }

    pub fn num_primitive_range(mut self, low: i64, high: i64) -> Self {
        self.num_primitive_range = (low, high);
        self
    }

    pub fn num_max_width_range(mut self, low: i64, high: i64) -> Self {
        self.num_max_width_range = (low, high);
        self
    }

    pub fn num_fc_range(mut self, low: i64, high: i64) -> Self {
        self.num_fc_range = (low, high);
        self
    }

    pub fn flops_ratio_range(mut self, low: f64, high: f64) -> Self {
        self.flops_ratio_range = Some((low, high));
        self
    }

    pub fn params_ratio_range(mut self, low: f64, high: f64) -> Self {
        self.params_ratio_range = Some((low, high));
        self
    }

    pub fn timeout(mut self, seconds: i64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Validate every field and produce the immutable configuration.
    pub fn build(self) -> Result<SampleOptions> {
        let kernel_sizes = check_pool("kernel_sizes", &self.kernel_sizes)?;
        let dilated_sizes = check_pool("dilated_sizes", &self.dilated_sizes)?;
        let shift_sizes = check_pool("shift_sizes", &self.shift_sizes)?;
        let num_primitive_range = check_range("num_primitive_range", self.num_primitive_range)?;
        let num_max_width_range = check_range("num_max_width_range", self.num_max_width_range)?;
        let num_fc_range = check_range("num_fc_range", self.num_fc_range)?;
        let flops_ratio_range = check_ratio("flops_ratio_range", self.flops_ratio_range)?;
        let params_ratio_range = check_ratio("params_ratio_range", self.params_ratio_range)?;
        if self.timeout < 0 {
            return Err(CanvasError::InvalidRange {
                field: "timeout",
                reason: format!("{} is negative; use 0 for no timeout", self.timeout),
            });
        }
        Ok(SampleOptions {
            allowed_filter: self.allowed_filter,
            forbidden_filter: self.forbidden_filter,
            add_relu_bn_after_fc: self.add_relu_bn_after_fc,
            kernel_sizes,
            dilated_sizes,
            shift_sizes,
            num_primitive_range,
            num_max_width_range,
            num_fc_range,
            flops_ratio_range,
            params_ratio_range,
            timeout: self.timeout as u64,
        })
    }
}

fn check_pool(field: &'static str, pool: &[i64]) -> Result<Vec<usize>> {
    if pool.is_empty() {
        return Err(CanvasError::InvalidValue {
            field,
            reason: "candidate pool must not be empty".into(),
        });
    }
    pool.iter()
        .map(|&v| {
            if v >= 1 {
                Ok(v as usize)
            } else {
                Err(CanvasError::InvalidValue {
                    field,
                    reason: format!("candidate size {v} is not a positive integer"),
                })
            }
        })
        .collect()
}

fn check_range(field: &'static str, (low, high): (i64, i64)) -> Result<(usize, usize)> {
    if low < 1 {
        return Err(CanvasError::InvalidRange {
            field,
            reason: format!("low bound {low} must be at least 1"),
        });
    }
    if low > high {
        return Err(CanvasError::InvalidRange {
            field,
            reason: format!("low bound {low} exceeds high bound {high}"),
        });
    }
    Ok((low as usize, high as usize))
}

fn check_ratio(field: &'static str, range: Option<(f64, f64)>) -> Result<Option<(f64, f64)>> {
    let Some((low, high)) = range else {
        return Ok(None);
    };
    if !low.is_finite() || !high.is_finite() || low <= 0.0 || low > high {
        return Err(CanvasError::InvalidRange {
            field,
            reason: format!("({low}, {high}) is not a finite range with 0 < low <= high"),
        });
    }
    Ok(Some((low, high)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip() {
        let opts = SampleOptions::builder().build().unwrap();
        assert_eq!(opts, SampleOptions::default());
        assert_eq!(opts.timeout, 0);
        assert_eq!(opts.kernel_sizes, vec![3, 5, 7]);
        assert_eq!(opts.dilated_sizes, vec![1, 2, 3]);
        assert_eq!(opts.shift_sizes, vec![1, 2, 3]);
        assert_eq!(opts.num_primitive_range, (3, 25));
        assert_eq!(opts.num_max_width_range, (2, 8));
        assert_eq!(opts.num_fc_range, (1, 8));
    }

    #[test]
    fn explicit_values_are_kept_unchanged() {
        let opts = SampleOptions::builder()
            .allowed_filter("conv,pool")
            .forbidden_filter("softmax")
            .add_relu_bn_after_fc(true)
            .kernel_sizes([1, 3])
            .num_primitive_range(4, 10)
            .timeout(60)
            .build()
            .unwrap();
        assert_eq!(opts.allowed_filter, "conv,pool");
        assert_eq!(opts.forbidden_filter, "softmax");
        assert!(opts.add_relu_bn_after_fc);
        assert_eq!(opts.kernel_sizes, vec![1, 3]);
        assert_eq!(opts.num_primitive_range, (4, 10));
        assert_eq!(opts.timeout, 60);
    }

    #[test]
    fn inverted_range_names_the_field() {
        let err = SampleOptions::builder()
            .num_primitive_range(5, 2)
            .build()
            .unwrap_err();
        match err {
            CanvasError::InvalidRange { field, reason } => {
                assert_eq!(field, "num_primitive_range");
                assert!(reason.contains("5 exceeds high bound 2"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn range_low_bound_must_be_positive() {
        for low in [0, -3] {
            let err = SampleOptions::builder()
                .num_fc_range(low, 8)
                .build()
                .unwrap_err();
            assert!(matches!(
                err,
                CanvasError::InvalidRange { field: "num_fc_range", .. }
            ));
        }
    }

    #[test]
    fn pools_reject_empty_and_non_positive() {
        let err = SampleOptions::builder()
            .kernel_sizes([])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CanvasError::InvalidValue { field: "kernel_sizes", .. }
        ));

        let err = SampleOptions::builder()
            .shift_sizes([1, 0, 3])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CanvasError::InvalidValue { field: "shift_sizes", .. }
        ));
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let err = SampleOptions::builder().timeout(-1).build().unwrap_err();
        assert!(matches!(err, CanvasError::InvalidRange { field: "timeout", .. }));
    }

    #[test]
    fn ratio_ranges_are_validated() {
        let opts = SampleOptions::builder()
            .flops_ratio_range(0.1, 1.0)
            .build()
            .unwrap();
        assert_eq!(opts.flops_ratio_range, Some((0.1, 1.0)));

        for (low, high) in [(0.0, 1.0), (1.0, 0.5), (f64::NAN, 1.0)] {
            let err = SampleOptions::builder()
                .params_ratio_range(low, high)
                .build()
                .unwrap_err();
            assert!(matches!(
                err,
                CanvasError::InvalidRange { field: "params_ratio_range", .. }
            ));
        }
    }

    #[test]
    fn first_violation_wins() {
        // Both the pool and the range are malformed; the pool is checked
        // first and is the one reported.
        let err = SampleOptions::builder()
            .dilated_sizes([-1])
            .num_primitive_range(9, 1)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CanvasError::InvalidValue { field: "dilated_sizes", .. }
        ));
    }
}
