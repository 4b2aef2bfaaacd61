// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A preference-preserving depth-first topological ordering.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// An error indicating that a cycle was detected in the graph.
///
/// `cycle` lists the nodes along the cycle, starting and ending with the same node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// The nodes forming the cycle, first node repeated at the end.
    pub cycle: Vec<T>,
}

impl<T: fmt::Display> fmt::Display for CycleError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle detected: ")?;
        for (i, node) in self.cycle.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for CycleError<T> {}

/// Orders `preferred` so that every node comes after its dependencies.
///
/// Nodes are visited in the order given by `preferred`. Before a node is
/// emitted, its unvisited dependencies are emitted first, in the order
/// returned by `dependencies_of`. When no dependency constrains two nodes,
/// their relative order in `preferred` is kept, which makes the result fully
/// deterministic for a given input.
///
/// `dependencies_of` must only yield nodes that are part of `preferred`;
/// filtering out unknown dependencies is the caller's responsibility.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: every node of `preferred` exactly once, dependencies first.
/// * `Err(CycleError)`: if following dependencies leads back to a node still
///   being visited.
pub fn dependency_order<T, F, I>(
    preferred: &[T],
    mut dependencies_of: F,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Clone + Eq + Hash,
    F: FnMut(&T) -> I,
    I: IntoIterator<Item = T>,
{
    let mut walk = Walk {
        order: Vec::with_capacity(preferred.len()),
        visited: HashSet::with_capacity(preferred.len()),
        visiting: HashSet::new(),
        path: Vec::new(),
    };

    for node in preferred {
        walk.visit(node, &mut dependencies_of)?;
    }

    Ok(walk.order)
}

struct Walk<T> {
    order: Vec<T>,
    visited: HashSet<T>,
    visiting: HashSet<T>,
    path: Vec<T>,
}

impl<T: Clone + Eq + Hash> Walk<T> {
    fn visit<F, I>(&mut self, node: &T, dependencies_of: &mut F) -> Result<(), CycleError<T>>
    where
        F: FnMut(&T) -> I,
        I: IntoIterator<Item = T>,
    {
        if self.visited.contains(node) {
            return Ok(());
        }
        if self.visiting.contains(node) {
            let start = self.path.iter().position(|n| n == node).unwrap_or(0);
            let mut cycle = self.path[start..].to_vec();
            cycle.push(node.clone());
            return Err(CycleError { cycle });
        }

        self.visiting.insert(node.clone());
        self.path.push(node.clone());

        let dependencies: Vec<T> = dependencies_of(node).into_iter().collect();
        for dependency in &dependencies {
            self.visit(dependency, dependencies_of)?;
        }

        self.path.pop();
        self.visiting.remove(node);
        self.visited.insert(node.clone());
        self.order.push(node.clone());
        Ok(())
    }
}
