use crate::{
    config::JumpConfig,
    physics::CordParameters,
    simulation::{simulate_drop, DropResult, DropSettings},
};
use anyhow::{bail, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const MAX_GRID_POINTS: usize = 10_000_000;

/// Closed range `start, start + step, ..., <= stop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl GridAxis {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.start.is_finite() && self.stop.is_finite() && self.step.is_finite()) {
            bail!("{name} range must be finite.");
        }
        if self.step <= 0.0 {
            bail!("{name} increment must be positive.");
        }
        if self.stop < self.start {
            bail!("{name} range must have stop >= start.");
        }
        if self.start <= 0.0 {
            bail!("{name} values must be positive.");
        }
        let span = (self.stop - self.start) / self.step;
        if !span.is_finite() || span >= MAX_GRID_POINTS as f64 {
            bail!("{name} range has more than {MAX_GRID_POINTS} points.");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        if self.stop < self.start || self.step <= 0.0 {
            return 0;
        }
        // Absorb round-off so a stop that is a whole number of steps away is kept.
        // `as` saturates, so an absurd span cannot wrap around.
        (((self.stop - self.start) / self.step + 1e-9).floor() as usize).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values as `start + i * step`, so no error accumulates along the axis.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.start + i as f64 * self.step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    /// k1 axis, the inner loop.
    pub stiffness: GridAxis,
    /// k2 axis, the outer loop.
    pub exponent: GridAxis,
}

impl Default for ParameterGrid {
    /// The coarse grid used to dimension a cord.
    fn default() -> Self {
        Self {
            stiffness: GridAxis::new(0.5, 19.75, 0.25),
            exponent: GridAxis::new(0.5, 19.75, 0.25),
        }
    }
}

impl ParameterGrid {
    /// The dense grid used to map out the admissible design space.
    pub fn design_scan() -> Self {
        Self {
            stiffness: GridAxis::new(0.5, 19.75, 0.25),
            exponent: GridAxis::new(1.0, 1.99, 0.01),
        }
    }

    pub fn len(&self) -> usize {
        self.stiffness.len().saturating_mul(self.exponent.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid points with k2 in the outer loop and k1 in the inner loop.
    pub fn points(&self) -> impl Iterator<Item = CordParameters> + '_ {
        self.exponent.values().flat_map(move |exponent| {
            self.stiffness.values().map(move |stiffness| CordParameters {
                stiffness,
                exponent,
            })
        })
    }

    fn validate(&self) -> Result<()> {
        self.stiffness.validate("Stiffness (k1)")?;
        self.exponent.validate("Exponent (k2)")?;
        let Some(points) = self.stiffness.len().checked_mul(self.exponent.len()) else {
            bail!("Grid point count overflows.");
        };
        if points > MAX_GRID_POINTS {
            bail!("Grid has {points} points; the limit is {MAX_GRID_POINTS}.");
        }
        Ok(())
    }
}

/// Admissible outcome of a first fall. All bounds are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchTargets {
    pub min_depth: f64,
    pub max_depth: f64,
    /// Bound on |acceleration| at the deepest point.
    pub acceleration_limit: f64,
}

impl Default for SearchTargets {
    fn default() -> Self {
        Self::from_config(&JumpConfig::default())
    }
}

impl SearchTargets {
    /// Deeper than 90% of the platform height, never past it, and under 2.5 g.
    pub fn from_config(config: &JumpConfig) -> Self {
        Self {
            min_depth: 0.9 * config.jump_height,
            max_depth: config.jump_height,
            acceleration_limit: config.acceleration_limit(),
        }
    }

    pub fn is_met_by(&self, result: &DropResult) -> bool {
        !result.is_diverged()
            && self.min_depth < result.max_depth
            && result.max_depth < self.max_depth
            && result.acceleration_at_max.abs() < self.acceleration_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Stop at the first admissible grid point.
    FirstMatch,
    /// Evaluate the whole grid and keep every admissible point.
    CollectAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridMatch {
    pub cord: CordParameters,
    pub result: DropResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchOutcome {
    FirstMatch { found: Option<GridMatch> },
    CollectAll { matches: Vec<GridMatch> },
}

impl SearchOutcome {
    pub fn matches(&self) -> &[GridMatch] {
        match self {
            SearchOutcome::FirstMatch { found } => found.as_slice(),
            SearchOutcome::CollectAll { matches } => matches,
        }
    }

    pub fn first(&self) -> Option<&GridMatch> {
        self.matches().first()
    }

    pub fn is_empty(&self) -> bool {
        self.matches().is_empty()
    }
}

/// Searches `grid` with the default drop settings (RK4, 0.01 s).
pub fn search_parameters(
    config: &JumpConfig,
    grid: &ParameterGrid,
    targets: &SearchTargets,
    drag: bool,
    mode: SearchMode,
) -> Result<SearchOutcome> {
    search_parameters_with(config, grid, targets, drag, mode, &DropSettings::default())
}

pub fn search_parameters_with(
    config: &JumpConfig,
    grid: &ParameterGrid,
    targets: &SearchTargets,
    drag: bool,
    mode: SearchMode,
    settings: &DropSettings,
) -> Result<SearchOutcome> {
    grid.validate()?;

    match mode {
        SearchMode::FirstMatch => {
            let mut evaluated = 0usize;
            for cord in grid.points() {
                let result = simulate_drop(config, cord, drag, settings)?;
                evaluated += 1;
                if targets.is_met_by(&result) {
                    info!(
                        k1 = cord.stiffness,
                        k2 = cord.exponent,
                        max_depth = result.max_depth,
                        evaluated,
                        "admissible cord found"
                    );
                    return Ok(SearchOutcome::FirstMatch {
                        found: Some(GridMatch { cord, result }),
                    });
                }
            }
            info!(evaluated, drag, "no admissible cord in grid");
            Ok(SearchOutcome::FirstMatch { found: None })
        }
        SearchMode::CollectAll => {
            let points: Vec<CordParameters> = grid.points().collect();
            debug!(points = points.len(), drag, "scanning parameter grid");
            let results = points
                .par_iter()
                .map(|&cord| simulate_drop(config, cord, drag, settings).map(|r| (cord, r)))
                .collect::<Result<Vec<_>>>()?;
            let matches: Vec<GridMatch> = results
                .into_iter()
                .filter(|(_, result)| targets.is_met_by(result))
                .map(|(cord, result)| GridMatch { cord, result })
                .collect();
            info!(
                evaluated = points.len(),
                matches = matches.len(),
                drag,
                "parameter scan complete"
            );
            Ok(SearchOutcome::CollectAll { matches })
        }
    }
}

/// Extents of a set of admissible points, for annotating a design-space plot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub count: usize,
    pub depth: (f64, f64),
    /// Range of |acceleration| at the deepest point.
    pub acceleration: (f64, f64),
    pub stiffness: (f64, f64),
    pub exponent: (f64, f64),
}

impl ScanSummary {
    pub fn from_matches(matches: &[GridMatch]) -> Option<Self> {
        let first = matches.first()?;
        let seed = |v: f64| (v, v);
        let widen = |(lo, hi): (f64, f64), v: f64| (lo.min(v), hi.max(v));

        let mut summary = Self {
            count: matches.len(),
            depth: seed(first.result.max_depth),
            acceleration: seed(first.result.acceleration_at_max.abs()),
            stiffness: seed(first.cord.stiffness),
            exponent: seed(first.cord.exponent),
        };
        for m in &matches[1..] {
            summary.depth = widen(summary.depth, m.result.max_depth);
            summary.acceleration = widen(summary.acceleration, m.result.acceleration_at_max.abs());
            summary.stiffness = widen(summary.stiffness, m.cord.stiffness);
            summary.exponent = widen(summary.exponent, m.cord.exponent);
        }
        Some(summary)
    }
}
