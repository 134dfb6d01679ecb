use crate::error::{BacktestError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

//integer parameter range, start inclusive and stop exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRange {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl ParamRange {
    pub fn new(start: usize, stop: usize, step: usize) -> Result<Self> {
        let range = ParamRange { start, stop, step };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(BacktestError::invalid("ranges", "step must be positive"));
        }
        if self.start >= self.stop {
            return Err(BacktestError::invalid(
                "ranges",
                format!("{}:{} contains no value", self.start, self.stop),
            ));
        }
        Ok(())
    }

    pub fn values(&self) -> Vec<usize> {
        (self.start..self.stop).step_by(self.step).collect()
    }
}

//parses "start:stop:step" or "start,stop,step"
impl FromStr for ParamRange {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(|c: char| c == ':' || c == ',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(BacktestError::invalid(
                "ranges",
                format!("expected start:stop:step, got {:?}", s),
            ));
        }

        let mut numbers = [0usize; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                BacktestError::invalid("ranges", format!("{:?} is not a whole number", part))
            })?;
        }

        ParamRange::new(numbers[0], numbers[1], numbers[2])
    }
}

//best grid point and its objective value
#[derive(Debug, Clone, PartialEq)]
pub struct GridOptimum {
    pub point: Vec<usize>,
    pub score: f64,
}

//cartesian product of the ranges, the last range varying fastest
pub fn grid_points(ranges: &[ParamRange]) -> Result<Vec<Vec<usize>>> {
    if ranges.is_empty() || ranges.len() > 2 {
        return Err(BacktestError::invalid(
            "ranges",
            format!("{} range(s) given, 1 or 2 expected", ranges.len()),
        ));
    }
    for range in ranges {
        range.validate()?;
    }

    let mut points: Vec<Vec<usize>> = vec![Vec::new()];
    for range in ranges {
        let values = range.values();
        points = points
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |&v| {
                    let mut point = prefix.clone();
                    point.push(v);
                    point
                })
            })
            .collect();
    }
    Ok(points)
}

//exhaustive minimization of objective over the grid
//
//every point is scored, in parallel on the rayon pool when asked. the first
//point in grid order holding the lowest score wins so the outcome does not
//depend on scheduling. a failing point aborts the search; NaN scores never win.
pub fn optimize<F>(ranges: &[ParamRange], parallel: bool, objective: F) -> Result<GridOptimum>
where
    F: Fn(&[usize]) -> Result<f64> + Sync,
{
    let points = grid_points(ranges)?;
    debug!(points = points.len(), parallel, "grid search started");

    let score = |point: &Vec<usize>| {
        objective(point.as_slice()).map_err(|e| BacktestError::OptimizationFailed {
            point: point.clone(),
            source: Box::new(e),
        })
    };

    let scores: Vec<f64> = if parallel {
        points.par_iter().map(score).collect::<Result<_>>()?
    } else {
        points.iter().map(score).collect::<Result<_>>()?
    };

    let mut best: Option<usize> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        match best {
            Some(b) if scores[b] <= s => {}
            _ => best = Some(i),
        }
    }

    let best = best.ok_or_else(|| {
        BacktestError::invalid("ranges", "no grid point produced a comparable score")
    })?;

    Ok(GridOptimum {
        point: points[best].clone(),
        score: scores[best],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_and_comma_forms() {
        let a: ParamRange = "20:61:4".parse().unwrap();
        let b: ParamRange = "20, 61, 4".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.values(), vec![20, 24, 28, 32, 36, 40, 44, 48, 52, 56, 60]);
    }

    #[test]
    fn stop_is_exclusive() {
        let range = ParamRange::new(2, 11, 3).unwrap();
        assert_eq!(range.values(), vec![2, 5, 8]);
        assert_eq!(ParamRange::new(4, 5, 10).unwrap().values(), vec![4]);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!("1:5".parse::<ParamRange>().is_err());
        assert!("1:5:0".parse::<ParamRange>().is_err());
        assert!("5:5:1".parse::<ParamRange>().is_err());
        assert!("a:5:1".parse::<ParamRange>().is_err());
    }

    #[test]
    fn grid_is_row_major() {
        let ranges = [ParamRange::new(1, 3, 1).unwrap(), ParamRange::new(10, 30, 10).unwrap()];
        let points = grid_points(&ranges).unwrap();
        assert_eq!(
            points,
            vec![vec![1, 10], vec![1, 20], vec![2, 10], vec![2, 20]]
        );
    }

    #[test]
    fn three_ranges_are_rejected() {
        let r = ParamRange::new(1, 2, 1).unwrap();
        assert!(grid_points(&[r, r, r]).is_err());
        assert!(grid_points(&[]).is_err());
    }

    #[test]
    fn finds_known_minimum() {
        let ranges = [ParamRange::new(0, 10, 1).unwrap(), ParamRange::new(0, 10, 1).unwrap()];
        for parallel in [false, true] {
            let best = optimize(&ranges, parallel, |p| {
                let (x, y) = (p[0] as f64, p[1] as f64);
                Ok((x - 3.0).powi(2) + (y - 7.0).powi(2))
            })
            .unwrap();
            assert_eq!(best.point, vec![3, 7]);
            assert_eq!(best.score, 0.0);
        }
    }

    #[test]
    fn ties_go_to_the_first_point() {
        let ranges = [ParamRange::new(1, 6, 1).unwrap()];
        let best = optimize(&ranges, true, |p| Ok(if p[0] >= 3 { -1.0 } else { 0.0 })).unwrap();
        assert_eq!(best.point, vec![3]);
    }

    #[test]
    fn nan_scores_never_win() {
        let ranges = [ParamRange::new(1, 4, 1).unwrap()];
        let best = optimize(&ranges, false, |p| {
            Ok(if p[0] == 1 { f64::NAN } else { p[0] as f64 })
        })
        .unwrap();
        assert_eq!(best.point, vec![2]);
    }

    #[test]
    fn failing_point_aborts_the_search() {
        let ranges = [ParamRange::new(1, 5, 1).unwrap()];
        for parallel in [false, true] {
            let err = optimize(&ranges, parallel, |p| {
                if p[0] == 2 {
                    Err(BacktestError::invalid("SMA1", "boom"))
                } else {
                    Ok(0.0)
                }
            })
            .unwrap_err();
            assert!(matches!(
                err,
                BacktestError::OptimizationFailed { ref point, .. } if point == &vec![2]
            ));
        }
    }
}
