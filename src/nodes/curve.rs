//! Piecewise-linear curves used for storage, overflow, and turbine tables.

use thiserror::Error;

/// Reasons a point table cannot form a curve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("curve needs at least two points, got {0}")]
    TooFewPoints(usize),

    #[error("curve point {0} is not finite")]
    NotFinite(usize),

    #[error("curve x values must be strictly increasing at point {0}")]
    NotSorted(usize),

    #[error("curve y values must be strictly increasing at point {0}")]
    NotInvertible(usize),
}

/// A piecewise-linear function through sorted `(x, y)` points.
///
/// Values outside the table are held flat at the nearest end point.
///
/// # Examples
///
/// ```
/// use river_sim::nodes::curve::Curve;
///
/// let curve = Curve::new(&[[0.0, 0.0], [10.0, 100.0]]).unwrap();
/// assert_eq!(curve.eval(2.5), 25.0);
/// assert_eq!(curve.eval(-1.0), 0.0);
/// assert_eq!(curve.eval(11.0), 100.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    xs: Vec<f64>,
    ys: Vec<f64>,
    invertible: bool,
}

impl Curve {
    /// Builds a curve from `[x, y]` pairs with strictly increasing `x`.
    ///
    /// # Errors
    ///
    /// Returns a `CurveError` if there are fewer than two points, a value
    /// is not finite, or `x` does not strictly increase.
    pub fn new(points: &[[f64; 2]]) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }
        for (i, p) in points.iter().enumerate() {
            if !p[0].is_finite() || !p[1].is_finite() {
                return Err(CurveError::NotFinite(i));
            }
            if i > 0 && p[0] <= points[i - 1][0] {
                return Err(CurveError::NotSorted(i));
            }
        }
        let invertible = points.windows(2).all(|w| w[1][1] > w[0][1]);
        Ok(Self {
            xs: points.iter().map(|p| p[0]).collect(),
            ys: points.iter().map(|p| p[1]).collect(),
            invertible,
        })
    }

    /// Builds a curve that must also be strictly increasing in `y`, so that
    /// [`Curve::inverse`] is well defined.
    ///
    /// # Errors
    ///
    /// Same as [`Curve::new`], plus `NotInvertible` for a flat or falling segment.
    pub fn monotonic(points: &[[f64; 2]]) -> Result<Self, CurveError> {
        let curve = Self::new(points)?;
        if let Some(i) = (1..points.len()).find(|&i| points[i][1] <= points[i - 1][1]) {
            return Err(CurveError::NotInvertible(i));
        }
        Ok(curve)
    }

    /// Evaluates `y(x)`.
    pub fn eval(&self, x: f64) -> f64 {
        interpolate(&self.xs, &self.ys, x)
    }

    /// Evaluates `x(y)`; only meaningful for curves built with [`Curve::monotonic`].
    pub fn inverse(&self, y: f64) -> f64 {
        debug_assert!(self.invertible, "inverse of a non-monotonic curve");
        interpolate(&self.ys, &self.xs, y)
    }

    pub fn x_min(&self) -> f64 {
        self.xs[0]
    }

    pub fn x_max(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    pub fn y_min(&self) -> f64 {
        self.ys.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn y_max(&self) -> f64 {
        self.ys.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    // xs[i - 1] <= x < xs[i]
    let i = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}
