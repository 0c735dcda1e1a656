//! Stage dependency graph

use std::collections::HashMap;

use crate::agents::{StageId, StageSpec};
use crate::error::{Error, Result};

/// Stages with their declared upstream sets, in evaluation order
#[derive(Debug, Clone)]
pub struct StageGraph {
    order: Vec<StageId>,
    upstream: HashMap<StageId, Vec<StageId>>,
}

impl StageGraph {
    /// Build from `(stage, upstream)` pairs in declaration order.
    ///
    /// Unknown upstream ids, duplicate stages, and cycles are rejected.
    pub fn new(nodes: &[(StageId, Vec<StageId>)]) -> Result<Self> {
        let position: HashMap<StageId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect();
        if position.len() != nodes.len() {
            return Err(Error::Config("stage declared more than once".to_string()));
        }

        let mut in_degree = vec![0usize; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

        for (i, (id, upstream)) in nodes.iter().enumerate() {
            for dep in upstream {
                let Some(&dep_index) = position.get(dep) else {
                    return Err(Error::Config(format!(
                        "stage '{}' depends on unknown stage '{}'",
                        id, dep
                    )));
                };
                in_degree[i] += 1;
                dependents[dep_index].push(i);
            }
        }

        // Kahn's algorithm; the ready set is kept in declaration order
        let mut ready: Vec<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());

        while !ready.is_empty() {
            let next = ready.remove(0);
            order.push(nodes[next].0);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    let at = ready.partition_point(|&r| r < dependent);
                    ready.insert(at, dependent);
                }
            }
        }

        if order.len() != nodes.len() {
            let stuck: Vec<&str> = nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, (id, _))| id.as_str())
                .collect();
            return Err(Error::Config(format!(
                "stage dependency cycle among: {}",
                stuck.join(", ")
            )));
        }

        Ok(Self {
            order,
            upstream: nodes.iter().cloned().collect(),
        })
    }

    pub fn from_specs(specs: &[StageSpec]) -> Result<Self> {
        let nodes: Vec<(StageId, Vec<StageId>)> = specs
            .iter()
            .map(|spec| (spec.id, spec.upstream.to_vec()))
            .collect();
        Self::new(&nodes)
    }

    /// Topological evaluation order
    pub fn order(&self) -> &[StageId] {
        &self.order
    }

    pub fn upstream_of(&self, stage: StageId) -> &[StageId] {
        self.upstream
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
