// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Network Interconnection
// ─────────────────────────────────────────────────────────────────────
//! N gain-bounded units coupled through a fixed mixing matrix M:
//!
//!   u = M·y_m + d,   (y_j, ξ_j⁺) = unit_j(u[input_j], ξ[state_j])
//!
//! Each unit's gain budget is rescaled from M's absolute row/column sums
//! so the interconnection satisfies a discrete small-gain condition:
//!
//!   γ_j = sqrt( (z / (‖M_rows_j‖_∞·z + 1)) / (1 + ‖M_cols_j‖_1 + y_j) )
//!
//! with y_j = |y[j]|, z = |z| taken from free scalars.

use std::ops::Range;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use ren_core::matrix::{ensure_len, ensure_shape, max_col_abs_sum, max_row_abs_sum};
use ren_core::{CertificateMode, EquilibriumUnit, FreeParameters, Mat, UnitShape, Vector};
use ren_types::{NetworkConfig, RenError, RenResult};

/// Index ranges owned by one unit in the joint vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLayout {
    /// Rows of M / entries of the mixed input `u`.
    pub input: Range<usize>,
    /// Columns of M / entries of the joint output.
    pub output: Range<usize>,
    /// Entries of the joint internal state.
    pub state: Range<usize>,
}

/// Precompute contiguous per-unit ranges in unit order.
pub fn build_layout(shapes: &[UnitShape]) -> Vec<UnitLayout> {
    let mut input = 0;
    let mut output = 0;
    let mut state = 0;
    shapes
        .iter()
        .map(|s| {
            let layout = UnitLayout {
                input: input..input + s.n,
                output: output..output + s.m,
                state: state..state + s.n_xi,
            };
            input += s.n;
            output += s.m;
            state += s.n_xi;
            layout
        })
        .collect()
}

/// Small-gain budget for one unit.
///
/// Fails with `DimensionMismatch` when the unit's input rows or output
/// columns fall outside `mixing`.
pub fn unit_gamma(mixing: &Mat, layout: &UnitLayout, y_j: f64, z: f64) -> RenResult<f64> {
    if layout.input.end > mixing.nrows() || layout.output.end > mixing.ncols() {
        return Err(RenError::dimension(
            "mixing matrix vs unit layout",
            (layout.input.end, layout.output.end),
            mixing.shape(),
        ));
    }
    let yp = y_j.abs();
    let zp = z.abs();
    let rows = mixing.rows(layout.input.start, layout.input.len());
    let cols = mixing.columns(layout.output.start, layout.output.len());
    let row_sum = max_row_abs_sum(&rows.into_owned());
    let col_sum = max_col_abs_sum(&cols.into_owned());
    Ok(((zp / (row_sum * zp + 1.0)) / (1.0 + col_sum + yp)).sqrt())
}

/// Joint output of one network step.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkOutput {
    pub y: Vector,
    pub xi: Vector,
}

/// Gain-scaled interconnection of equilibrium units.
#[derive(Debug, Clone)]
pub struct NetworkInterconnection {
    units: Vec<EquilibriumUnit>,
    mixing: Mat,
    layout: Vec<UnitLayout>,
    y: Vector,
    z: f64,
    gammas: Vec<f64>,
    gamma_w: f64,
}

impl NetworkInterconnection {
    /// Build N gain-bounded units from `shapes` and certify them against
    /// `mixing` (`Σn` rows × `Σm` columns).
    pub fn new(shapes: &[UnitShape], mixing: Mat, config: &NetworkConfig) -> RenResult<Self> {
        config.validate()?;
        let mut rng = match config.unit.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let y = Vector::from_fn(shapes.len(), |_, _| {
            config.budget_std * rng.sample::<f64, _>(StandardNormal)
        });
        let z = config.budget_std * rng.sample::<f64, _>(StandardNormal);

        let staged = shapes
            .iter()
            .enumerate()
            .map(|(j, shape)| {
                let cfg = config.unit_config(j);
                let mut unit_rng = match cfg.seed {
                    Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                    None => ChaCha8Rng::from_entropy(),
                };
                // Placeholder gain; only selects the Cayley feed-through.
                let mode = CertificateMode::GainBounded { gamma: 1.0 };
                let params = FreeParameters::random(shape, &mode, cfg.init_std, &mut unit_rng);
                (*shape, params, cfg.epsilon)
            })
            .collect();
        Self::assemble(staged, mixing, y, z)
    }

    /// Build from units whose free parameters are already known.
    ///
    /// Every unit must be gain-bounded; its current gamma is replaced by
    /// the small-gain budget.
    pub fn from_units(units: Vec<EquilibriumUnit>, mixing: Mat, y: Vector, z: f64) -> RenResult<Self> {
        let mut staged = Vec::with_capacity(units.len());
        for (j, unit) in units.into_iter().enumerate() {
            if unit.mode() == CertificateMode::Contracting {
                return Err(RenError::Validation(format!(
                    "unit {j} is contracting-only; interconnection needs gain-bounded units"
                )));
            }
            staged.push((*unit.shape(), unit.parameters().clone(), unit.epsilon()));
        }
        Self::assemble(staged, mixing, y, z)
    }

    fn assemble(
        staged: Vec<(UnitShape, FreeParameters, f64)>,
        mixing: Mat,
        y: Vector,
        z: f64,
    ) -> RenResult<Self> {
        let shapes: Vec<UnitShape> = staged.iter().map(|(s, ..)| *s).collect();
        let layout = build_layout(&shapes);
        let total_n: usize = shapes.iter().map(|s| s.n).sum();
        let total_m: usize = shapes.iter().map(|s| s.m).sum();
        ensure_shape(&mixing, total_n, total_m, "mixing matrix M")?;
        ensure_len(&y, shapes.len(), "gain budgets y")?;

        let gammas = Self::compute_gammas(&mixing, &layout, &y, z)?;
        let units = staged
            .into_iter()
            .zip(&gammas)
            .map(|((shape, params, epsilon), &gamma)| {
                EquilibriumUnit::from_parameters(
                    shape,
                    CertificateMode::GainBounded { gamma },
                    params,
                    epsilon,
                )
            })
            .collect::<RenResult<Vec<_>>>()?;

        log::debug!(
            "interconnection built: {} units, M {}x{}, gammas={gammas:?}",
            units.len(),
            mixing.nrows(),
            mixing.ncols()
        );
        Ok(Self {
            units,
            mixing,
            layout,
            y,
            z,
            gammas,
            gamma_w: z.abs().sqrt(),
        })
    }

    fn compute_gammas(mixing: &Mat, layout: &[UnitLayout], y: &Vector, z: f64) -> RenResult<Vec<f64>> {
        layout
            .iter()
            .enumerate()
            .map(|(j, lay)| {
                let gamma = unit_gamma(mixing, lay, y[j], z)?;
                if !gamma.is_finite() || gamma <= 0.0 {
                    log::warn!("gain budget exhausted for unit {j}: gamma={gamma}");
                    return Err(RenError::GainBudgetExhausted { unit: j, gamma });
                }
                Ok(gamma)
            })
            .collect()
    }

    /// Recompute every unit's gain budget from the current `y`, `z`, and
    /// mixing matrix, re-certify every unit, and commit all of them at once.
    pub fn rescale_and_rebuild(&mut self) -> RenResult<()> {
        let gammas = Self::compute_gammas(&self.mixing, &self.layout, &self.y, self.z)?;
        let units = self
            .units
            .iter()
            .zip(&gammas)
            .map(|(unit, &gamma)| unit.with_gamma(gamma))
            .collect::<RenResult<Vec<_>>>()?;
        log::debug!("interconnection rescaled: gammas={gammas:?}");
        self.units = units;
        self.gammas = gammas;
        self.gamma_w = self.z.abs().sqrt();
        Ok(())
    }

    /// Replace the free gain scalars and rescale. Nothing changes on error.
    pub fn set_budgets(&mut self, y: Vector, z: f64) -> RenResult<()> {
        ensure_len(&y, self.units.len(), "gain budgets y")?;
        let previous = (std::mem::replace(&mut self.y, y), self.z);
        self.z = z;
        if let Err(e) = self.rescale_and_rebuild() {
            (self.y, self.z) = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Update unit `j`'s free parameters, then rescale the whole network.
    pub fn update_unit<F>(&mut self, j: usize, update: F) -> RenResult<()>
    where
        F: FnOnce(&mut FreeParameters),
    {
        let count = self.units.len();
        let unit = self.units.get_mut(j).ok_or_else(|| {
            RenError::Validation(format!("unit index {j} out of range for {count} units"))
        })?;
        unit.update_parameters(update)?;
        self.rescale_and_rebuild()
    }

    /// One joint step: mix, slice, evaluate every unit, concatenate.
    pub fn step(&self, t: f64, ym: &Vector, d: &Vector, xim: &Vector) -> RenResult<NetworkOutput> {
        ensure_len(ym, self.total_output(), "joint measurement ym")?;
        ensure_len(d, self.total_input(), "disturbance d")?;
        ensure_len(xim, self.total_state(), "joint state xim")?;

        let u = &self.mixing * ym + d;
        let mut y = Vector::zeros(self.total_output());
        let mut xi = Vector::zeros(self.total_state());
        for (unit, lay) in self.units.iter().zip(&self.layout) {
            let u_j = u.rows(lay.input.start, lay.input.len()).into_owned();
            let xi_j = xim.rows(lay.state.start, lay.state.len()).into_owned();
            let (y_j, xi_next_j) = unit.step(&u_j, &xi_j)?;
            y.rows_mut(lay.output.start, lay.output.len()).copy_from(&y_j);
            xi.rows_mut(lay.state.start, lay.state.len()).copy_from(&xi_next_j);
        }
        log::trace!("network step t={t:.4}: |u|={:.4e} |y|={:.4e}", u.norm(), y.norm());
        Ok(NetworkOutput { y, xi })
    }

    pub fn units(&self) -> &[EquilibriumUnit] {
        &self.units
    }

    pub fn mixing(&self) -> &Mat {
        &self.mixing
    }

    pub fn layout(&self) -> &[UnitLayout] {
        &self.layout
    }

    /// Current free gain scalars `(y, z)`.
    pub fn budgets(&self) -> (&Vector, f64) {
        (&self.y, self.z)
    }

    pub fn gammas(&self) -> &[f64] {
        &self.gammas
    }

    /// `sqrt(|z|)`.
    pub fn gamma_w(&self) -> f64 {
        self.gamma_w
    }

    pub fn total_input(&self) -> usize {
        self.mixing.nrows()
    }

    pub fn total_output(&self) -> usize {
        self.mixing.ncols()
    }

    pub fn total_state(&self) -> usize {
        self.layout.last().map_or(0, |l| l.state.end)
    }
}
