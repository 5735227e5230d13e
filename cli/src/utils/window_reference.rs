//! Reference points of a window over one newest-first price row.

use crate::models::{Cell, ReferencePoint, StartOption, WindowParameters, WindowReferences};

/// Window bounds in column positions. `start` is the oldest column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start: usize,
    pub end: usize,
}

impl WindowBounds {
    pub fn new(end: usize, width: usize) -> Self {
        Self {
            start: end + width,
            end,
        }
    }

    /// Positions from the end (newest) toward the start (oldest).
    pub fn positions(&self) -> std::ops::RangeInclusive<usize> {
        self.end..=self.start
    }
}

fn point(row: &[Cell], dates: &[String], position: usize) -> Option<ReferencePoint> {
    let value = (*row.get(position)?)?;
    Some(ReferencePoint {
        position,
        date: dates.get(position)?.clone(),
        value,
    })
}

/// First present position in `positions` whose value beats every earlier one
/// under `better`.
fn extreme<I, F>(row: &[Cell], positions: I, better: F) -> Option<usize>
where
    I: IntoIterator<Item = usize>,
    F: Fn(f64, f64) -> bool,
{
    let mut best: Option<(usize, f64)> = None;
    for position in positions {
        let Some(value) = row.get(position).copied().flatten() else {
            continue;
        };
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((position, value)),
        }
    }
    best.map(|(position, _)| position)
}

/// Resolve end, start, max, min, closest, base and shifted actual points.
///
/// Missing cells never take part in max/min/closest. Ties keep the first
/// position met walking from the end toward the start. The window is clipped
/// to the row.
pub fn resolve(
    row: &[Cell],
    dates: &[String],
    bounds: WindowBounds,
    params: &WindowParameters,
) -> WindowReferences {
    if row.is_empty() || bounds.end >= row.len() {
        return WindowReferences::default();
    }
    let start = bounds.start.min(row.len() - 1);
    let bounds = WindowBounds {
        start,
        end: bounds.end,
    };

    let end_point = point(row, dates, bounds.end);
    let start_point = point(row, dates, bounds.start);
    let max_pos = extreme(row, bounds.positions(), |a, b| a > b);
    let min_pos = extreme(row, bounds.positions(), |a, b| a < b);

    let closest_pos = end_point.as_ref().and_then(|end| {
        let mut best: Option<(usize, f64)> = None;
        for position in bounds.end + 1..=bounds.start {
            let Some(value) = row[position] else { continue };
            let distance = (value - end.value).abs();
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((position, distance)),
            }
        }
        best.map(|(position, _)| position)
    });

    let base_pos = match params.start_option {
        StartOption::StartValue => Some(bounds.start),
        StartOption::MaxValue => max_pos,
        StartOption::MinValue => min_pos,
        StartOption::ClosestValue => closest_pos,
    };

    let actual = base_pos.and_then(|base| {
        let shifted = base as i64 - params.shift_days;
        if shifted < 0 || shifted as usize >= row.len() {
            None
        } else {
            point(row, dates, shifted as usize)
        }
    });

    WindowReferences {
        end: end_point,
        start: start_point,
        max: max_pos.and_then(|p| point(row, dates, p)),
        min: min_pos.and_then(|p| point(row, dates, p)),
        closest: closest_pos.and_then(|p| point(row, dates, p)),
        base: base_pos.and_then(|p| point(row, dates, p)),
        actual,
    }
}

/// Max over the first `n_days` columns from the window start toward the end.
pub fn forward_n_max(
    row: &[Cell],
    dates: &[String],
    bounds: WindowBounds,
    n_days: usize,
) -> Option<ReferencePoint> {
    if n_days == 0 || bounds.start >= row.len() || bounds.start < bounds.end {
        return None;
    }
    let last = (bounds.start + 1).saturating_sub(n_days).max(bounds.end);
    let position = extreme(row, (last..=bounds.start).rev(), |a, b| a > b)?;
    point(row, dates, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("2024-02-{:02}", 28 - i)).collect()
    }

    fn row(values: &[Option<f64>]) -> Vec<Cell> {
        values.to_vec()
    }

    fn params(start_option: StartOption, shift_days: i64) -> WindowParameters {
        WindowParameters {
            width: 4,
            start_option,
            shift_days,
            ..WindowParameters::default()
        }
    }

    #[test]
    fn test_resolve_basic_points() {
        // position: 0     1     2     3     4     5
        let r = row(&[Some(10.0), Some(12.0), None, Some(8.0), Some(11.0), Some(99.0)]);
        let refs = resolve(&r, &dates(6), WindowBounds::new(0, 4), &params(StartOption::StartValue, 0));

        assert_eq!(refs.end.as_ref().map(|p| p.value), Some(10.0));
        assert_eq!(refs.start.as_ref().map(|p| p.position), Some(4));
        assert_eq!(refs.max.as_ref().map(|p| p.position), Some(1));
        assert_eq!(refs.min.as_ref().map(|p| p.position), Some(3));
        // |11-10| and |12-10|... nearest is 11 at position 4
        assert_eq!(refs.closest.as_ref().map(|p| p.position), Some(4));
        assert_eq!(refs.actual.as_ref().map(|p| p.value), Some(11.0));
    }

    #[test]
    fn test_closest_prefers_exact_match_not_end() {
        let r = row(&[Some(5.0), Some(7.0), Some(5.0), Some(4.9), Some(6.0)]);
        let refs = resolve(&r, &dates(5), WindowBounds::new(0, 4), &params(StartOption::ClosestValue, 0));
        let closest = refs.closest.unwrap();
        assert_eq!(closest.position, 2);
        assert_eq!(closest.value, 5.0);
        assert_eq!(refs.base.unwrap().position, 2);
    }

    #[test]
    fn test_closest_tie_keeps_first_from_end() {
        let r = row(&[Some(5.0), Some(6.0), Some(4.0)]);
        let refs = resolve(
            &r,
            &dates(3),
            WindowBounds::new(0, 2),
            &params(StartOption::StartValue, 0),
        );
        assert_eq!(refs.closest.unwrap().position, 1);
    }

    #[test]
    fn test_shift_moves_toward_newer_and_out_of_bounds() {
        let r = row(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)]);
        let d = dates(6);
        let refs = resolve(&r, &d, WindowBounds::new(1, 4), &params(StartOption::StartValue, 2));
        // base at 5, actual at 3
        assert_eq!(refs.actual.unwrap().position, 3);

        let refs = resolve(&r, &d, WindowBounds::new(1, 4), &params(StartOption::StartValue, -1));
        assert!(refs.actual.is_none());
    }

    #[test]
    fn test_missing_closest_gives_no_base() {
        let r = row(&[Some(5.0), None, None]);
        let refs = resolve(&r, &dates(3), WindowBounds::new(0, 2), &params(StartOption::ClosestValue, 0));
        assert!(refs.closest.is_none());
        assert!(refs.base.is_none());
        assert!(refs.actual.is_none());
        assert!(refs.start.is_none());
    }

    #[test]
    fn test_forward_n_max() {
        let r = row(&[Some(9.0), Some(3.0), Some(7.0), Some(4.0), Some(2.0)]);
        let d = dates(5);
        let bounds = WindowBounds::new(0, 4);
        // first 3 columns from the start: positions 4, 3, 2
        assert_eq!(forward_n_max(&r, &d, bounds, 3).unwrap().value, 7.0);
        // n larger than the window is clipped at the end
        assert_eq!(forward_n_max(&r, &d, bounds, 50).unwrap().value, 9.0);
        assert!(forward_n_max(&r, &d, bounds, 0).is_none());
    }
}
