//! Analysis and instrumentation passes over MIR
//!
//! Passes run one function at a time and are composed through the
//! [`PassManager`], either programmatically or from a comma-separated
//! pipeline string resolved through the [`PassRegistry`].
//!
//! ## Available Passes
//!
//! - **TaintTracking** (`taint-track`): Computes the values reachable from
//!   input-source call arguments and the subset written to memory
//! - **BoundsGuard** (`bounds-guard`): Synthesizes pointer bounds, propagates
//!   them and guards every bounded store with a range check

pub mod bounds;
pub mod guard;
pub mod taint;

pub use bounds::{BoundsPair, BoundsState, UNBOUNDED_EXTENT, instrument_bounds};
pub use guard::{BoundsGuard, GuardSummary, insert_guards};
pub use taint::{TaintState, TaintTracking, identify_tainted};

use tracing::{debug, info, info_span};

use super::GuardError;
use super::catalog::SourceCatalog;
use super::mir::{MirFunction, MirModule, SymbolTable};
use super::report::PassReport;
use super::verify::verify_function;
use crate::config::GuardConfig;

/// Module-wide facts a pass may consult while working on one function
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub config: &'a GuardConfig,
    pub catalog: &'a SourceCatalog,
    pub symbols: &'a SymbolTable,
}

impl<'a> PassContext<'a> {
    pub fn new(
        config: &'a GuardConfig,
        catalog: &'a SourceCatalog,
        symbols: &'a SymbolTable,
    ) -> Self {
        Self {
            config,
            catalog,
            symbols,
        }
    }

    /// Whether per-fact tracing is enabled
    pub fn trace(&self) -> bool {
        self.config.trace
    }
}

/// Analyses a pass leaves valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreservedAnalyses {
    /// Nothing was mutated
    All,
    /// Instructions or blocks were added; cached CFG/def-use facts are stale
    None,
}

/// Result of running a pass on one function
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub changed: bool,
    pub preserved: PreservedAnalyses,
    pub report: PassReport,
}

/// Trait for per-function MIR passes
pub trait FunctionPass {
    /// Name of the pass, as used in pipelines and logs
    fn name(&self) -> &str;

    /// Run the pass on a function
    fn run(&self, func: &mut MirFunction, ctx: &PassContext<'_>) -> PassOutcome;
}

/// Report of one pass over one function
#[derive(Debug, Clone)]
pub struct FunctionReport {
    pub function: String,
    pub pass: String,
    pub outcome: PassOutcome,
}

type PassFactory = Box<dyn Fn(&str) -> Box<dyn FunctionPass>>;

/// Name -> constructor table for pipeline strings
pub struct PassRegistry {
    entries: Vec<(String, PassFactory)>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry holding both guard passes under their configured names
    pub fn with_defaults(config: &GuardConfig) -> Self {
        let mut registry = Self::new();
        registry.register(&config.taint_pass_name, |name| -> Box<dyn FunctionPass> {
            Box::new(TaintTracking::new(name))
        });
        registry.register(&config.bounds_pass_name, |name| -> Box<dyn FunctionPass> {
            Box::new(BoundsGuard::new(name))
        });
        registry
    }

    /// Register a pass constructor; a later registration shadows an earlier one
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Box<dyn FunctionPass> + 'static,
    {
        self.entries.retain(|(existing, _)| existing != name);
        self.entries.push((name.to_string(), Box::new(factory)));
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn FunctionPass>, GuardError> {
        self.entries
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(registered, factory)| factory(registered))
            .ok_or_else(|| GuardError::UnknownPass {
                name: name.to_string(),
                registered: self.names().join(", "),
            })
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::with_defaults(&GuardConfig::default())
    }
}

/// Manages and runs guard passes
pub struct PassManager {
    passes: Vec<Box<dyn FunctionPass>>,
    config: GuardConfig,
}

impl PassManager {
    /// Create a pass manager with no passes
    pub fn new(config: GuardConfig) -> Self {
        Self {
            passes: Vec::new(),
            config,
        }
    }

    /// Taint tracking followed by bounds instrumentation
    pub fn with_default_pipeline(config: GuardConfig) -> Self {
        let mut pm = Self::new(config);
        let taint = TaintTracking::new(&pm.config.taint_pass_name);
        let bounds = BoundsGuard::new(&pm.config.bounds_pass_name);
        pm.add_pass(taint);
        pm.add_pass(bounds);
        pm
    }

    /// Build a pipeline from comma-separated registered pass names
    pub fn from_pipeline(pipeline: &str, config: GuardConfig) -> Result<Self, GuardError> {
        let registry = PassRegistry::with_defaults(&config);
        let mut pm = Self::new(config);
        for name in pipeline.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            pm.passes.push(registry.create(name)?);
        }
        if pm.passes.is_empty() {
            return Err(GuardError::EmptyPipeline);
        }
        Ok(pm)
    }

    /// Add a pass to the manager
    pub fn add_pass<P: FunctionPass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass over every function body, in pipeline order per function
    pub fn run_module(&self, module: &mut MirModule) -> Result<Vec<FunctionReport>, GuardError> {
        if self.passes.is_empty() {
            return Err(GuardError::EmptyPipeline);
        }
        let symbols = SymbolTable::from_module(module);
        let catalog = SourceCatalog::from_config(&self.config);
        let ctx = PassContext::new(&self.config, &catalog, &symbols);

        let mut reports = Vec::new();
        for func in &mut module.functions {
            for pass in &self.passes {
                let outcome = self.run_pass(pass.as_ref(), func, &ctx)?;
                reports.push(FunctionReport {
                    function: func.name.clone(),
                    pass: pass.name().to_string(),
                    outcome,
                });
            }
        }
        Ok(reports)
    }

    /// Run a single pass on a single function (useful for testing)
    pub fn run_pass(
        &self,
        pass: &dyn FunctionPass,
        func: &mut MirFunction,
        ctx: &PassContext<'_>,
    ) -> Result<PassOutcome, GuardError> {
        let _span = info_span!("pass", pass = pass.name(), function = %func.name).entered();
        let outcome = pass.run(func, ctx);
        for line in outcome.report.lines() {
            info!("{}", line);
        }
        debug!(changed = outcome.changed, "pass finished");

        if self.config.verify_after_pass && outcome.changed {
            verify_function(func).map_err(|source| GuardError::Verification {
                function: func.name.clone(),
                pass: pass.name().to_string(),
                source,
            })?;
        }
        Ok(outcome)
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::with_default_pipeline(GuardConfig::default())
    }
}
