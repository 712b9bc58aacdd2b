//! Aggregation of cropped frames.
//!
//! Every computation in this module feeds lanes of samples through
//! [Operation::reduce](crate::operation::Operation::reduce), so the scalar, temporal and
//! spatial results of one operation always agree on how missing data is treated.

use crate::crop::CroppedFrame;
use crate::error::QueryError;
use crate::models::{AggregationResult, TimeSeriesPoint, TimestampSource};
use crate::operation::Operation;

use ndarray::{ArrayView2, Axis};
use time::OffsetDateTime;
use tracing::debug;

/// What to compute besides the scalar
#[derive(Clone, Copy, Debug)]
pub struct AggregateOptions {
    /// Compute the per-frame series
    pub temporal: bool,
    /// Compute the per-pixel map
    pub spatial: bool,
    /// Where series timestamps come from
    pub timestamps: TimestampSource,
    /// Wall-clock time of the query, used with [TimestampSource::QueryTime]
    pub query_time: OffsetDateTime,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            temporal: true,
            spatial: true,
            timestamps: TimestampSource::default(),
            query_time: OffsetDateTime::now_utc(),
        }
    }
}

/// Percentage of missing samples in a frame.
fn nan_percentage(frame: &CroppedFrame) -> f64 {
    let total = frame.data.len();
    if total == 0 {
        return 100.0;
    }
    let missing = frame.data.iter().filter(|x| x.is_nan()).count();
    100.0 * missing as f64 / total as f64
}

/// Aggregate a stack of same-shaped frames with one operation.
///
/// Frames without a single non-missing sample are dropped first.
///
/// # Arguments
///
/// * `frames`: Cropped frames, in file order
/// * `operation`: Operation to apply
/// * `options`: Which optional results to compute, and their timestamps
///
/// # Errors
///
/// Fails with [QueryError::NoValidData] if no frame holds valid data, and with
/// [QueryError::ShapeMismatch] if the frames do not share a shape.
#[tracing::instrument(level = "DEBUG", skip(frames, options), fields(count = frames.len()))]
pub fn aggregate(
    frames: &[CroppedFrame],
    operation: Operation,
    options: &AggregateOptions,
) -> Result<AggregationResult, QueryError> {
    let valid: Vec<&CroppedFrame> = frames
        .iter()
        .filter(|frame| {
            let missing = nan_percentage(frame);
            debug!(
                "Percentage of NaN values in {}: {:.2}%",
                frame.path.display(),
                missing
            );
            missing < 100.0
        })
        .collect();
    let first = valid.first().ok_or(QueryError::NoValidData)?;
    if let Some(other) = valid.iter().find(|frame| frame.data.shape() != first.data.shape()) {
        return Err(QueryError::ShapeMismatch {
            expected: first.data.shape().to_vec(),
            found: other.data.shape().to_vec(),
            path: other.path.clone(),
        });
    }

    let scalar = operation.reduce(valid.iter().flat_map(|frame| frame.data.iter()));

    let temporal = if options.temporal {
        let points = valid
            .iter()
            .map(|frame| TimeSeriesPoint {
                timestamp: match options.timestamps {
                    TimestampSource::FileDate => frame.date.midnight().assume_utc(),
                    TimestampSource::QueryTime => options.query_time,
                },
                value: operation.reduce(frame.data.iter()),
            })
            .collect();
        Some(points)
    } else {
        None
    };

    let spatial = if options.spatial {
        let views: Vec<ArrayView2<f64>> = valid.iter().map(|frame| frame.data.view()).collect();
        let stacked = ndarray::stack(Axis(0), &views)?;
        Some(stacked.map_axis(Axis(0), |lane| operation.reduce(lane.iter())))
    } else {
        None
    };

    Ok(AggregationResult {
        scalar,
        temporal,
        spatial,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{array, Array2};
    use std::path::PathBuf;
    use time::macros::{date, datetime};
    use time::Date;

    fn frame(name: &str, date: Date, data: Array2<f64>) -> CroppedFrame {
        CroppedFrame {
            path: PathBuf::from(name),
            date,
            data,
        }
    }

    fn values(result: &AggregationResult) -> Vec<f64> {
        result
            .temporal
            .as_ref()
            .unwrap()
            .iter()
            .map(|point| point.value)
            .collect()
    }

    #[test]
    fn single_frame_all_operations() {
        let frames = [frame(
            "a_20200101.tif",
            date!(2020 - 01 - 01),
            array![[1.0, 2.0], [3.0, 4.0]],
        )];
        let options = AggregateOptions::default();
        let expected = [
            (Operation::Mean, 2.5),
            (Operation::Median, 2.5),
            (Operation::Variance, 1.25),
            (Operation::Max, 4.0),
            (Operation::Min, 1.0),
            (Operation::Range, 3.0),
        ];
        for (operation, value) in expected {
            let result = aggregate(&frames, operation, &options).unwrap();
            assert_eq!(value, result.scalar, "{operation}");
            assert_eq!(vec![value], values(&result), "{operation}");
        }
        let result = aggregate(&frames, Operation::Deviation, &options).unwrap();
        assert!((result.scalar - 1.118).abs() < 1e-3);
    }

    #[test]
    fn max_over_three_frames() {
        let frames = [
            frame("a_20200101.tif", date!(2020 - 01 - 01), array![[1.0, 5.0], [2.0, 0.0]]),
            frame("a_20200102.tif", date!(2020 - 01 - 02), array![[4.0, 1.0], [f64::NAN, 3.0]]),
            frame("a_20200103.tif", date!(2020 - 01 - 03), array![[0.0, 2.0], [7.0, 1.0]]),
        ];
        let result = aggregate(&frames, Operation::Max, &AggregateOptions::default()).unwrap();
        assert_eq!(7.0, result.scalar);
        assert_eq!(vec![5.0, 4.0, 7.0], values(&result));
        assert_eq!(Some(array![[4.0, 5.0], [7.0, 3.0]]), result.spatial);
        let timestamps: Vec<OffsetDateTime> = result
            .temporal
            .unwrap()
            .iter()
            .map(|point| point.timestamp)
            .collect();
        assert_eq!(
            vec![
                datetime!(2020-01-01 0:00 UTC),
                datetime!(2020-01-02 0:00 UTC),
                datetime!(2020-01-03 0:00 UTC)
            ],
            timestamps
        );
    }

    #[test]
    fn spatial_mean_ignores_nan() {
        let frames = [
            frame("a_20200101.tif", date!(2020 - 01 - 01), array![[1.0, f64::NAN]]),
            frame("a_20200102.tif", date!(2020 - 01 - 02), array![[3.0, f64::NAN]]),
            frame("a_20200103.tif", date!(2020 - 01 - 03), array![[f64::NAN, 6.0]]),
        ];
        let result = aggregate(&frames, Operation::Mean, &AggregateOptions::default()).unwrap();
        assert_eq!(Some(array![[2.0, 6.0]]), result.spatial);
        assert!((result.scalar - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn spatial_all_nan_pixel() {
        let frames = [
            frame("a_20200101.tif", date!(2020 - 01 - 01), array![[1.0, f64::NAN]]),
            frame("a_20200102.tif", date!(2020 - 01 - 02), array![[3.0, f64::NAN]]),
        ];
        let result = aggregate(&frames, Operation::Min, &AggregateOptions::default()).unwrap();
        let spatial = result.spatial.unwrap();
        assert_eq!(1.0, spatial[[0, 0]]);
        assert!(spatial[[0, 1]].is_nan());
    }

    #[test]
    fn all_nan_frames_dropped() {
        let frames = [
            frame("a_20200101.tif", date!(2020 - 01 - 01), array![[f64::NAN, f64::NAN]]),
            frame("a_20200102.tif", date!(2020 - 01 - 02), array![[3.0, 1.0]]),
        ];
        let result = aggregate(&frames, Operation::Range, &AggregateOptions::default()).unwrap();
        assert_eq!(2.0, result.scalar);
        assert_eq!(vec![2.0], values(&result));
    }

    #[test]
    fn no_valid_data() {
        let frames = [frame(
            "a_20200101.tif",
            date!(2020 - 01 - 01),
            array![[f64::NAN, f64::NAN]],
        )];
        match aggregate(&frames, Operation::Mean, &AggregateOptions::default()) {
            Err(QueryError::NoValidData) => (),
            other => panic!("unexpected result {:?}", other),
        }
        match aggregate(&[], Operation::Mean, &AggregateOptions::default()) {
            Err(QueryError::NoValidData) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn shape_mismatch() {
        let frames = [
            frame("a_20200101.tif", date!(2020 - 01 - 01), array![[1.0, 2.0]]),
            frame("a_20200102.tif", date!(2020 - 01 - 02), array![[1.0], [2.0]]),
        ];
        match aggregate(&frames, Operation::Mean, &AggregateOptions::default()) {
            Err(QueryError::ShapeMismatch { expected, found, .. }) => {
                assert_eq!(vec![1, 2], expected);
                assert_eq!(vec![2, 1], found);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn optional_results_skipped() {
        let frames = [frame("a_20200101.tif", date!(2020 - 01 - 01), array![[1.0]])];
        let options = AggregateOptions {
            temporal: false,
            spatial: false,
            ..Default::default()
        };
        let result = aggregate(&frames, Operation::Median, &options).unwrap();
        assert_eq!(1.0, result.scalar);
        assert_eq!(None, result.temporal);
        assert_eq!(None, result.spatial);
    }

    #[test]
    fn query_time_timestamps() {
        let frames = [
            frame("a_20200101.tif", date!(2020 - 01 - 01), array![[1.0]]),
            frame("a_20200102.tif", date!(2020 - 01 - 02), array![[2.0]]),
        ];
        let query_time = datetime!(2024-05-06 7:08:09 UTC);
        let options = AggregateOptions {
            timestamps: TimestampSource::QueryTime,
            query_time,
            ..Default::default()
        };
        let result = aggregate(&frames, Operation::Mean, &options).unwrap();
        for point in result.temporal.unwrap() {
            assert_eq!(query_time, point.timestamp);
        }
    }
}
