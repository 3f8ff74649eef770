//! Optimization stage chain
//!
//! Stages form an explicit ordered list. Each stage sees an operation
//! together with the remainder of the list after it ([`Chain`]); anything a
//! stage does not resolve is forwarded to that remainder, and whatever
//! reaches the end of the list is emitted into the output trace.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::{PassKind, PipelineConfig};
use crate::error::Result;
use crate::ir::{OpKind, Operand, Operation, Trace, Type};

use super::driver::Optimizer;

/// A rewrite stage
pub trait OptimizationStage {
    /// Name of the stage
    fn name(&self) -> &'static str;

    /// Resolve `op`, or forward it to `rest`
    fn handle(&self, opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()>;
}

/// Signature of a dispatch-table entry
pub type Handler = for<'a> fn(&mut Optimizer, Chain<'a>, &Operation) -> Result<()>;

/// Default handler: leave the operation to the rest of the chain
pub fn forward(opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
    rest.forward(opt, op)
}

/// The stages after the current one
#[derive(Clone, Copy)]
pub struct Chain<'a> {
    stages: &'a [Box<dyn OptimizationStage>],
}

impl<'a> Chain<'a> {
    pub fn new(stages: &'a [Box<dyn OptimizationStage>]) -> Self {
        Self { stages }
    }

    /// Hand `op` to the next stage, or emit it if no stage is left
    pub fn forward(self, opt: &mut Optimizer, op: &Operation) -> Result<()> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                trace!("{} <- {op}", stage.name());
                opt.stats_mut().record_pass(stage.name());
                stage.handle(opt, Chain { stages: rest }, op)
            }
            None => opt.emit(op),
        }
    }

    /// Create a new operation and run it through this remainder of the chain
    pub fn append_operation(
        self,
        opt: &mut Optimizer,
        kind: OpKind,
        args: Vec<Operand>,
        ty: Option<Type>,
    ) -> Result<Operation> {
        let op = opt.create_operation(kind, args, ty);
        self.forward(opt, &op)?;
        Ok(op)
    }
}

/// Optimization pipeline
pub struct OptimizationPipeline {
    stages: Vec<Box<dyn OptimizationStage>>,
}

impl OptimizationPipeline {
    /// Create an empty pipeline; every operation passes through unchanged
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Create pipeline for the given optimization level
    pub fn for_level(level: OptLevel) -> Self {
        Self::from_passes(level.passes())
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::from_passes(&config.effective_passes())
    }

    fn from_passes(passes: &[PassKind]) -> Self {
        let mut pipeline = Self::new();
        for pass in passes {
            pipeline.add_stage(pass.stage());
        }
        pipeline
    }

    /// Append a stage to the end of the chain
    pub fn add_stage(&mut self, stage: Box<dyn OptimizationStage>) {
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Optimize `trace` in place.
    ///
    /// Operations are fed to the first stage strictly in trace order, each
    /// exactly once. On error the trace is left untouched.
    pub fn optimize(&self, trace: &mut Trace) -> Result<OptimizationStats> {
        debug!(
            "optimizing {} operation(s) through [{}]",
            trace.len(),
            self.stage_names().join(", ")
        );

        let mut opt = Optimizer::for_trace(trace);
        let chain = Chain::new(&self.stages);
        for op in &trace.ops {
            opt.stats_mut().ops_in += 1;
            chain.forward(&mut opt, op)?;
        }

        let (ops, stats) = opt.finish();
        trace.ops = ops;
        debug!("optimized: {}", stats.summary());
        Ok(stats)
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Optimization level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No stages; the trace is copied through
    #[default]
    Debug,
    /// Constant folding, guard propagation and virtualization
    Release,
}

impl OptLevel {
    pub fn passes(self) -> &'static [PassKind] {
        match self {
            OptLevel::Debug => &[],
            OptLevel::Release => &[
                PassKind::ConstantFold,
                PassKind::GuardPropagation,
                PassKind::Virtualize,
            ],
        }
    }
}

/// Statistics from one optimization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizationStats {
    /// Operations fed into the chain
    pub ops_in: usize,
    /// Operations in the output trace
    pub ops_out: usize,
    pub folded: usize,
    pub guards_elided: usize,
    pub guards_kept: usize,
    pub virtuals_created: usize,
    pub virtuals_forced: usize,
    /// Field writes absorbed into virtual objects
    pub setfields_absorbed: usize,
    /// Operations seen by each stage
    pub pass_counts: BTreeMap<String, usize>,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, name: &str) {
        *self.pass_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} -> {} ops, {} folded, {} guard(s) elided, {} virtual(s) forced of {}",
            self.ops_in,
            self.ops_out,
            self.folded,
            self.guards_elided,
            self.virtuals_forced,
            self.virtuals_created
        )
    }
}

impl fmt::Display for OptimizationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "operations:         {} -> {}", self.ops_in, self.ops_out)?;
        writeln!(f, "folded:             {}", self.folded)?;
        writeln!(f, "guards elided/kept: {}/{}", self.guards_elided, self.guards_kept)?;
        writeln!(f, "virtuals forced:    {}/{}", self.virtuals_forced, self.virtuals_created)?;
        write!(f, "setfields absorbed: {}", self.setfields_absorbed)?;
        for (name, count) in &self.pass_counts {
            write!(f, "\n  {name}: {count}")?;
        }
        Ok(())
    }
}
