//! The narrow SAT oracle behind [`Aig::fraig`].
//!
//! The merge engine never sees clauses or solver literals, only opaque
//! variables and the three gate-shaped operations below. The production
//! implementation is backed by varisat, which supports incrementality via
//! assume/solve and add_clause.
//!
//! [`Aig::fraig`]: crate::Aig::fraig

use std::collections::HashSet;

use varisat::ExtendFormula;

use crate::aig::{AigError, Result};

/// An oracle variable. Opaque: only valid for the oracle that created it,
/// and only until its next [`reset`](SatOracle::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SatVar(usize);

/// What the merge engine needs from a SAT backend, and nothing more.
///
/// One proof attempt is: `reset`, a batch of `new_var` / `add_*_clause`
/// calls, some `assume`s, one `solve`, and on a satisfiable answer `value`
/// queries against the model.
pub trait SatOracle {
    /// Drops all clauses, variables and assumptions.
    fn reset(&mut self);

    fn new_var(&mut self) -> SatVar;

    /// Constrains `out <-> ((in0 ^ inv0) & (in1 ^ inv1))` with three clauses.
    fn add_and_clause(&mut self, out: SatVar, in0: SatVar, inv0: bool, in1: SatVar, inv1: bool);

    /// Constrains `out <-> ((in0 ^ inv0) ^ (in1 ^ inv1))` with four clauses.
    fn add_xor_clause(&mut self, out: SatVar, in0: SatVar, inv0: bool, in1: SatVar, inv1: bool);

    /// Registers an assumption for the next [`solve`](SatOracle::solve).
    fn assume(&mut self, var: SatVar, value: bool);

    fn clear_assumptions(&mut self);

    /// Returns whether the clauses are satisfiable under the assumptions.
    fn solve(&mut self) -> Result<bool>;

    /// Model value of `var` after a satisfiable [`solve`](SatOracle::solve).
    fn value(&self, var: SatVar) -> bool;
}

/// Production oracle backed by varisat.
pub struct VarisatOracle {
    solver: varisat::Solver<'static>,
    lits: Vec<varisat::Lit>,
    assumptions: Vec<varisat::Lit>,
    model: HashSet<varisat::Lit>,
}

impl VarisatOracle {
    pub fn new() -> Self {
        VarisatOracle {
            solver: varisat::Solver::new(),
            lits: Vec::new(),
            assumptions: Vec::new(),
            model: HashSet::new(),
        }
    }

    fn lit(&self, var: SatVar, inverted: bool) -> varisat::Lit {
        let l = self.lits[var.0];
        if inverted { !l } else { l }
    }
}

impl Default for VarisatOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl SatOracle for VarisatOracle {
    fn reset(&mut self) {
        self.solver = varisat::Solver::new();
        self.lits.clear();
        self.assumptions.clear();
        self.model.clear();
    }

    fn new_var(&mut self) -> SatVar {
        self.lits.push(self.solver.new_lit());
        SatVar(self.lits.len() - 1)
    }

    fn add_and_clause(&mut self, out: SatVar, in0: SatVar, inv0: bool, in1: SatVar, inv1: bool) {
        let a = self.lit(in0, inv0);
        let b = self.lit(in1, inv1);
        let o = self.lit(out, false);
        self.solver.add_clause(&[!a, !b, o]);
        self.solver.add_clause(&[a, !o]);
        self.solver.add_clause(&[b, !o]);
    }

    fn add_xor_clause(&mut self, out: SatVar, in0: SatVar, inv0: bool, in1: SatVar, inv1: bool) {
        let a = self.lit(in0, inv0);
        let b = self.lit(in1, inv1);
        let o = self.lit(out, false);
        self.solver.add_clause(&[!a, !b, !o]);
        self.solver.add_clause(&[a, b, !o]);
        self.solver.add_clause(&[a, !b, o]);
        self.solver.add_clause(&[!a, b, o]);
    }

    fn assume(&mut self, var: SatVar, value: bool) {
        let l = self.lit(var, !value);
        self.assumptions.push(l);
    }

    fn clear_assumptions(&mut self) {
        self.assumptions.clear();
    }

    fn solve(&mut self) -> Result<bool> {
        self.solver.assume(&self.assumptions);
        match self.solver.solve() {
            Ok(false) => Ok(false),
            Ok(true) => {
                self.model = self
                    .solver
                    .model()
                    .map(|m| m.into_iter().collect())
                    .unwrap_or_default();
                Ok(true)
            }
            Err(e) => Err(AigError::SatError(e.to_string())),
        }
    }

    fn value(&self, var: SatVar) -> bool {
        self.model.contains(&self.lits[var.0])
    }
}
