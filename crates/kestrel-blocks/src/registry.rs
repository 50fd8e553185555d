use indexmap::IndexMap;
use kestrel_cfa::Cfa;
use tracing::info;

use crate::{
    BlockPartitioning, FunctionAndLoopPartitioning, FunctionPartitioning, LoopPartitioning,
    PartitionError, PartitioningHeuristic,
};

/// Partitioning configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitioningOptions {
    heuristics: Vec<String>,
    reject_multi_header_loops: bool,
}

#[bon::bon]
impl PartitioningOptions {
    #[builder]
    pub fn new(
        #[builder(default = vec![String::from("function")])] heuristics: Vec<String>,
        reject_multi_header_loops: Option<bool>,
    ) -> Self {
        Self {
            heuristics,
            reject_multi_header_loops: reject_multi_header_loops.unwrap_or(false),
        }
    }
}

impl Default for PartitioningOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PartitioningOptions {
    pub fn heuristics(&self) -> &[String] {
        &self.heuristics
    }

    pub fn reject_multi_header_loops(&self) -> bool {
        self.reject_multi_header_loops
    }
}

pub type HeuristicConstructor =
    fn(&Cfa, &PartitioningOptions) -> Result<Box<dyn PartitioningHeuristic>, PartitionError>;

/// Name to constructor table for partitioning heuristics.
pub struct HeuristicRegistry {
    constructors: IndexMap<&'static str, HeuristicConstructor>,
}

impl HeuristicRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// `function`, `loop` and `function-and-loop`.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry
            .register("function", |_, _| Ok(Box::new(FunctionPartitioning)))
            .register("loop", |cfa, options| {
                Ok(Box::new(LoopPartitioning::new(
                    cfa,
                    options.reject_multi_header_loops,
                )?))
            })
            .register("function-and-loop", |cfa, options| {
                Ok(Box::new(FunctionAndLoopPartitioning::new(
                    cfa,
                    options.reject_multi_header_loops,
                )?))
            });
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: HeuristicConstructor) -> &mut Self {
        self.constructors.insert(name, constructor);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    pub fn create(
        &self,
        name: &str,
        cfa: &Cfa,
        options: &PartitioningOptions,
    ) -> Result<Box<dyn PartitioningHeuristic>, PartitionError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| PartitionError::UnknownHeuristic(name.to_string()))?;
        constructor(cfa, options)
    }

    /// Build the heuristic selected by `options`. Naming both `function` and
    /// `loop` selects their union; any other combination is rejected.
    pub fn resolve(
        &self,
        cfa: &Cfa,
        options: &PartitioningOptions,
    ) -> Result<Box<dyn PartitioningHeuristic>, PartitionError> {
        let names = &options.heuristics;
        match names.as_slice() {
            [] => Err(PartitionError::NoHeuristic),
            [name] => self.create(name, cfa, options),
            [a, b] if is_function_and_loop(a, b) || is_function_and_loop(b, a) => {
                self.create("function-and-loop", cfa, options)
            }
            _ => {
                for name in names {
                    if !self.constructors.contains_key(name.as_str()) {
                        return Err(PartitionError::UnknownHeuristic(name.clone()));
                    }
                }
                Err(PartitionError::ConflictingHeuristics(names.clone()))
            }
        }
    }
}

impl Default for HeuristicRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn is_function_and_loop(a: &str, b: &str) -> bool {
    a == "function" && b == "loop"
}

/// Partition `cfa` with the standard heuristics.
pub fn partition(
    cfa: &Cfa,
    options: &PartitioningOptions,
) -> Result<BlockPartitioning, PartitionError> {
    let heuristic = HeuristicRegistry::standard().resolve(cfa, options)?;
    let partitioning = heuristic.build_partitioning(cfa);
    info!(
        heuristic = heuristic.name(),
        blocks = partitioning.len(),
        "partitioned program"
    );
    Ok(partitioning)
}
