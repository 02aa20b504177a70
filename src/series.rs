use itertools::{Itertools, MinMaxResult};
use thiserror::Error;

/// The view of an observed light curve the model needs.
///
/// No validation happens on these values: a degenerate series (a single
/// observation, a flat light curve) yields non-finite or zero summaries and
/// whatever numeric behaviour follows from them.
pub trait ObservedSeries {
    /// Typical spacing between consecutive observations.
    fn cadence(&self) -> f64;

    /// Time between the first and the last observation.
    fn time_span(&self) -> f64;

    /// `max(magnitude) - min(magnitude)`, used as a proxy for the amplitude.
    fn magnitude_range(&self) -> f64;
}

impl<T: ObservedSeries + ?Sized> ObservedSeries for &T {
    fn cadence(&self) -> f64 {
        (**self).cadence()
    }

    fn time_span(&self) -> f64 {
        (**self).time_span()
    }

    fn magnitude_range(&self) -> f64 {
        (**self).magnitude_range()
    }
}

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum SeriesError {
    #[error("got {times} observation times, {magnitudes} magnitudes and {errors} errors")]
    LengthMismatch {
        times: usize,
        magnitudes: usize,
        errors: usize,
    },
}

/// A single-band light curve, stored sorted by observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct LightCurve {
    times: Vec<f64>,
    magnitudes: Vec<f64>,
    errors: Vec<f64>,
}

impl LightCurve {
    pub fn new(
        times: Vec<f64>,
        magnitudes: Vec<f64>,
        errors: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        if times.len() != magnitudes.len() || times.len() != errors.len() {
            return Err(SeriesError::LengthMismatch {
                times: times.len(),
                magnitudes: magnitudes.len(),
                errors: errors.len(),
            });
        }

        let (times, magnitudes, errors): (Vec<f64>, Vec<f64>, Vec<f64>) =
            itertools::multizip((times, magnitudes, errors))
                .sorted_by(|a, b| a.0.total_cmp(&b.0))
                .multiunzip();

        Ok(Self {
            times,
            magnitudes,
            errors,
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl ObservedSeries for LightCurve {
    /// Median spacing of consecutive observation times, `NaN` with fewer than
    /// two observations.
    fn cadence(&self) -> f64 {
        let mut gaps: Vec<f64> = self
            .times
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .collect();
        if gaps.is_empty() {
            return f64::NAN;
        }
        gaps.sort_by(f64::total_cmp);
        let mid = gaps.len() / 2;
        if gaps.len() % 2 == 0 {
            0.5 * (gaps[mid - 1] + gaps[mid])
        } else {
            gaps[mid]
        }
    }

    fn time_span(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => f64::NAN,
        }
    }

    fn magnitude_range(&self) -> f64 {
        match self.magnitudes.iter().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => f64::NAN,
            MinMaxResult::OneElement(_) => 0.,
            MinMaxResult::MinMax(min, max) => max - min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn curve() -> LightCurve {
        LightCurve::new(
            vec![4., 0., 1., 2.5, 3.],
            vec![18.2, 18.0, 19.5, 17.1, 18.4],
            vec![0.05; 5],
        )
        .unwrap()
    }

    #[test]
    fn sorted_by_time() {
        let lc = curve();
        assert_eq!(lc.times(), &[0., 1., 2.5, 3., 4.]);
        assert_eq!(lc.magnitudes(), &[18.0, 19.5, 17.1, 18.4, 18.2]);
        assert_eq!(lc.len(), 5);
    }

    #[test]
    fn summaries() {
        let lc = curve();
        // gaps: 1, 1.5, 0.5, 1
        assert_eq!(lc.cadence(), 1.);
        assert_eq!(lc.time_span(), 4.);
        assert!((lc.magnitude_range() - 2.4).abs() < 1e-12);
    }

    #[test]
    fn odd_number_of_gaps() {
        let lc = LightCurve::new(vec![0., 2., 3., 10.], vec![1.; 4], vec![0.1; 4]).unwrap();
        assert_eq!(lc.cadence(), 2.);
        assert_eq!(lc.magnitude_range(), 0.);
    }

    #[test]
    fn degenerate() {
        let lc = LightCurve::new(vec![5.], vec![17.], vec![0.1]).unwrap();
        assert!(lc.cadence().is_nan());
        assert_eq!(lc.time_span(), 0.);

        let empty = LightCurve::new(vec![], vec![], vec![]).unwrap();
        assert!(empty.is_empty());
        assert!(empty.time_span().is_nan());
        assert!(empty.magnitude_range().is_nan());
    }

    #[test]
    fn length_mismatch() {
        let err = LightCurve::new(vec![0., 1.], vec![1.], vec![0.1, 0.1]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::LengthMismatch {
                times: 2,
                magnitudes: 1,
                errors: 2
            }
        );
    }
}
