//! Typed assembly of the truncated-quadratic VP relaxation.
//!
//! For a sample of `m` plane normals the problem has two symmetric PSD
//! variables of size `3(m+1)`. Block 0 holds the lifted VP direction `v vᵀ`;
//! block `i+1` belongs to sampled line `i`. Blocks are addressed through
//! [`Block`] and written as fixed 3×3 views, so no caller does raw index
//! arithmetic.

use nalgebra::{DMatrix, Matrix3, Vector3};

/// Side length of every block.
pub const BLOCK: usize = 3;
/// Cost entries below this magnitude are flushed to zero.
const COST_FLUSH_EPS: f64 = 1e-12;

/// The two lifted matrix variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    /// `X1`: line blocks encode "inlier" (`z_i v vᵀ`).
    Inlier,
    /// `X2`: line blocks encode "outlier" (`(1 - z_i) v vᵀ`).
    Outlier,
}

impl Variable {
    pub const ALL: [Variable; 2] = [Variable::Inlier, Variable::Outlier];

    pub fn index(self) -> usize {
        match self {
            Variable::Inlier => 0,
            Variable::Outlier => 1,
        }
    }
}

/// Address of a 3×3 block inside a lifted variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Block {
    Vp,
    Line(usize),
}

impl Block {
    pub fn offset(self) -> usize {
        match self {
            Block::Vp => 0,
            Block::Line(i) => (i + 1) * BLOCK,
        }
    }
}

/// Structural equality constraints of the relaxation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// `X[vp, line] == X[line, line]`: lifted `z² = z`.
    Idempotent { var: Variable, line: usize },
    /// `trace(X[vp, vp]) == 1`: unit VP direction.
    UnitTrace { var: Variable },
    /// `X[a, b] == X[a, b]ᵀ` for two distinct line blocks.
    SymmetricCross { var: Variable, a: usize, b: usize },
    /// `X1[vp, line] + X2[vp, line] == X1[vp, vp]`: `z + (1 - z) = 1`.
    Complementary { line: usize },
    /// `X1[vp, vp] == X2[vp, vp]`: both variables share one direction.
    SharedDirection,
}

/// One scalar entry reference `X_var[row, col]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entry {
    pub var: Variable,
    pub row: usize,
    pub col: usize,
}

/// Scalar linear equation `Σ coeff · X_var[row, col] = rhs`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarRow {
    pub terms: Vec<(Entry, f64)>,
    pub rhs: f64,
}

/// Assembled SDP: two cost matrices plus the constraint structure.
#[derive(Clone, Debug)]
pub struct SdpProblem {
    lines: usize,
    costs: [DMatrix<f64>; 2],
    constraints: Vec<Constraint>,
}

impl SdpProblem {
    /// Number of sampled lines `m`.
    pub fn num_lines(&self) -> usize {
        self.lines
    }

    /// Side length `3(m+1)` of each variable.
    pub fn dim(&self) -> usize {
        BLOCK * (self.lines + 1)
    }

    pub fn cost(&self, var: Variable) -> &DMatrix<f64> {
        &self.costs[var.index()]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Objective `trace(C1·X1) + trace(C2·X2)` for concrete values.
    pub fn objective(&self, x: &[DMatrix<f64>; 2]) -> f64 {
        Variable::ALL
            .iter()
            .map(|&v| (self.cost(v) * &x[v.index()]).trace())
            .sum()
    }

    /// Lower every structural constraint to scalar equations.
    pub fn scalar_rows(&self) -> Vec<ScalarRow> {
        let mut rows = Vec::new();
        for c in &self.constraints {
            lower_constraint(c, &mut rows);
        }
        rows
    }
}

fn entry(var: Variable, a: Block, b: Block, r: usize, c: usize) -> Entry {
    Entry {
        var,
        row: a.offset() + r,
        col: b.offset() + c,
    }
}

fn lower_constraint(constraint: &Constraint, rows: &mut Vec<ScalarRow>) {
    match *constraint {
        Constraint::Idempotent { var, line } => {
            let l = Block::Line(line);
            for r in 0..BLOCK {
                for c in 0..BLOCK {
                    rows.push(ScalarRow {
                        terms: vec![
                            (entry(var, Block::Vp, l, r, c), 1.0),
                            (entry(var, l, l, r, c), -1.0),
                        ],
                        rhs: 0.0,
                    });
                }
            }
        }
        Constraint::UnitTrace { var } => rows.push(ScalarRow {
            terms: (0..BLOCK)
                .map(|d| (entry(var, Block::Vp, Block::Vp, d, d), 1.0))
                .collect(),
            rhs: 1.0,
        }),
        Constraint::SymmetricCross { var, a, b } => {
            let (ba, bb) = (Block::Line(a), Block::Line(b));
            for r in 0..BLOCK {
                for c in (r + 1)..BLOCK {
                    rows.push(ScalarRow {
                        terms: vec![
                            (entry(var, ba, bb, r, c), 1.0),
                            (entry(var, ba, bb, c, r), -1.0),
                        ],
                        rhs: 0.0,
                    });
                }
            }
        }
        Constraint::Complementary { line } => {
            let l = Block::Line(line);
            for r in 0..BLOCK {
                for c in 0..BLOCK {
                    rows.push(ScalarRow {
                        terms: vec![
                            (entry(Variable::Inlier, Block::Vp, l, r, c), 1.0),
                            (entry(Variable::Outlier, Block::Vp, l, r, c), 1.0),
                            (entry(Variable::Inlier, Block::Vp, Block::Vp, r, c), -1.0),
                        ],
                        rhs: 0.0,
                    });
                }
            }
        }
        Constraint::SharedDirection => {
            for r in 0..BLOCK {
                for c in 0..BLOCK {
                    rows.push(ScalarRow {
                        terms: vec![
                            (entry(Variable::Inlier, Block::Vp, Block::Vp, r, c), 1.0),
                            (entry(Variable::Outlier, Block::Vp, Block::Vp, r, c), -1.0),
                        ],
                        rhs: 0.0,
                    });
                }
            }
        }
    }
}

/// Incremental builder with block-level insertion.
#[derive(Clone, Debug)]
pub struct SdpProblemBuilder {
    lines: usize,
    costs: [DMatrix<f64>; 2],
    constraints: Vec<Constraint>,
}

impl SdpProblemBuilder {
    pub fn new(lines: usize) -> Self {
        let dim = BLOCK * (lines + 1);
        Self {
            lines,
            costs: [DMatrix::<f64>::zeros(dim, dim), DMatrix::<f64>::zeros(dim, dim)],
            constraints: Vec::new(),
        }
    }

    /// Write `block` at `(a, b)` and its transpose at `(b, a)` of a cost matrix.
    pub fn set_symmetric_cost_block(
        &mut self,
        var: Variable,
        a: Block,
        b: Block,
        block: &Matrix3<f64>,
    ) -> &mut Self {
        self.check_block(a);
        self.check_block(b);
        let cost = &mut self.costs[var.index()];
        cost.fixed_view_mut::<BLOCK, BLOCK>(a.offset(), b.offset())
            .copy_from(block);
        cost.fixed_view_mut::<BLOCK, BLOCK>(b.offset(), a.offset())
            .copy_from(&block.transpose());
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    /// Add the full constraint set of the relaxation for every sampled line.
    pub fn add_relaxation_constraints(&mut self) -> &mut Self {
        let m = self.lines;
        for line in 0..m {
            for var in Variable::ALL {
                self.add_constraint(Constraint::Idempotent { var, line });
            }
        }
        for var in Variable::ALL {
            self.add_constraint(Constraint::UnitTrace { var });
        }
        for a in 0..m {
            for b in (a + 1)..m {
                for var in Variable::ALL {
                    self.add_constraint(Constraint::SymmetricCross { var, a, b });
                }
            }
        }
        for line in 0..m {
            self.add_constraint(Constraint::Complementary { line });
        }
        self.add_constraint(Constraint::SharedDirection)
    }

    pub fn build(self) -> SdpProblem {
        let mut costs = self.costs;
        for cost in costs.iter_mut() {
            cost.apply(|v| {
                if v.abs() < COST_FLUSH_EPS {
                    *v = 0.0;
                }
            });
        }
        SdpProblem {
            lines: self.lines,
            costs,
            constraints: self.constraints,
        }
    }

    fn check_block(&self, b: Block) {
        if let Block::Line(i) = b {
            assert!(
                i < self.lines,
                "line block {i} out of range for a {}-line problem",
                self.lines
            );
        }
    }
}

/// Build the robust VP problem for sampled normals, their weights and the
/// inlier cosine threshold `c`.
///
/// Per line, `C1` gets `0.5·w·n nᵀ` between the VP block and the line block
/// (inlier residual `w (nᵀv)²`), and `C2` gets `0.5·w·c²·I` (outlier penalty
/// `w c²`).
pub fn build_vp_problem(normals: &[Vector3<f64>], weights: &[f64], c: f64) -> SdpProblem {
    assert_eq!(
        normals.len(),
        weights.len(),
        "normals and weights must be index-aligned"
    );
    let mut builder = SdpProblemBuilder::new(normals.len());
    let penalty = c * c;
    for (i, (n, &w)) in normals.iter().zip(weights).enumerate() {
        let inlier = n * n.transpose() * (0.5 * w);
        let outlier = Matrix3::identity() * (0.5 * w * penalty);
        builder
            .set_symmetric_cost_block(Variable::Inlier, Block::Vp, Block::Line(i), &inlier)
            .set_symmetric_cost_block(Variable::Outlier, Block::Vp, Block::Line(i), &outlier);
    }
    builder.add_relaxation_constraints();
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifted(v: &Vector3<f64>, z: &[f64]) -> DMatrix<f64> {
        let m = z.len();
        let mut x = nalgebra::DVector::<f64>::zeros(BLOCK * (m + 1));
        x.fixed_rows_mut::<3>(0).copy_from(v);
        for (i, zi) in z.iter().enumerate() {
            x.fixed_rows_mut::<3>(Block::Line(i).offset()).copy_from(&(v * *zi));
        }
        &x * x.transpose()
    }

    fn residual(problem: &SdpProblem, x: &[DMatrix<f64>; 2]) -> f64 {
        problem
            .scalar_rows()
            .iter()
            .map(|row| {
                let lhs: f64 = row
                    .terms
                    .iter()
                    .map(|(e, coeff)| coeff * x[e.var.index()][(e.row, e.col)])
                    .sum();
                (lhs - row.rhs).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn cost_blocks_are_symmetric_and_placed_per_line() {
        let normals = vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.6, 0.8)];
        let problem = build_vp_problem(&normals, &[0.2, 0.3], 0.03);
        assert_eq!(problem.dim(), 9);
        let c1 = problem.cost(Variable::Inlier);
        assert_eq!(c1, &c1.transpose());
        assert!((c1[(0, 3)] - 0.1).abs() < 1e-15);
        // line 1 block sits at rows 6..9: entry (7, 2) is 0.5·w·n_y·n_z
        assert!((c1[(7, 2)] - 0.5 * 0.3 * 0.48).abs() < 1e-15);
        assert!((c1[(7, 1)] - 0.5 * 0.3 * 0.36).abs() < 1e-15);
        assert_eq!(c1[(3, 3)], 0.0);
        let c2 = problem.cost(Variable::Outlier);
        assert!((c2[(6, 0)] - 0.5 * 0.3 * 0.0009).abs() < 1e-15);
        assert_eq!(c2[(6, 1)], 0.0);
    }

    #[test]
    fn binary_liftings_are_feasible_with_truncated_cost() {
        let v = Vector3::new(0.0, 0.0, 1.0);
        let normals = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.6, 0.8),
        ];
        let w = [1.0, 0.5, 0.25];
        let c = 0.1;
        let problem = build_vp_problem(&normals, &w, c);
        let z = [1.0, 1.0, 0.0];
        let zc: Vec<f64> = z.iter().map(|zi| 1.0 - zi).collect();
        let x = [lifted(&v, &z), lifted(&v, &zc)];
        assert!(residual(&problem, &x) < 1e-12);
        // inliers 0 and 1 contribute (n·v)² = 0, outlier 2 pays w c²
        let expected = w[2] * c * c;
        assert!((problem.objective(&x) - expected).abs() < 1e-12);
    }

    #[test]
    fn constraint_counts_match_layout() {
        let normals = vec![Vector3::new(1.0, 0.0, 0.0); 4];
        let problem = build_vp_problem(&normals, &[1.0; 4], 0.03);
        let rows = problem.scalar_rows();
        // idempotent 2·9·m, trace 2, symmetric 2·3·C(m,2), complementary 9·m, shared 9
        let m = 4;
        let expected = 18 * m + 2 + 6 * (m * (m - 1) / 2) + 9 * m + 9;
        assert_eq!(rows.len(), expected);
    }

    #[test]
    #[should_panic]
    fn out_of_range_block_panics() {
        let mut b = SdpProblemBuilder::new(2);
        b.set_symmetric_cost_block(
            Variable::Inlier,
            Block::Vp,
            Block::Line(2),
            &Matrix3::identity(),
        );
    }
}
