// tests/prop_graph.rs
//
// Property tests for graph construction and topological ordering.

use std::collections::HashSet;
use std::path::PathBuf;

use kiln::graph::{BuildGraph, Project};
use proptest::prelude::*;

fn project(name: String, dependencies: Vec<String>) -> Project {
    Project {
        sources: vec![PathBuf::from(format!("{name}/src"))],
        classpath: Vec::new(),
        out_dir: PathBuf::from(format!("{name}/out")),
        name,
        dependencies,
    }
}

prop_compose! {
    /// A random layered DAG: project `p_i` may only depend on `p_j` with
    /// `j < i`, which makes acyclicity hold by construction.
    fn arb_dag()
        (n in 1usize..8)
        (edges in proptest::collection::vec(
            proptest::collection::vec(any::<bool>(), 8), n), n in Just(n))
        -> Vec<Project>
    {
        (0..n)
            .map(|i| {
                let deps = (0..i)
                    .filter(|&j| edges[i][j])
                    .map(|j| format!("p{j}"))
                    .collect();
                project(format!("p{i}"), deps)
            })
            .collect()
    }
}

proptest! {
    #[test]
    fn every_dependency_precedes_its_dependent(projects in arb_dag()) {
        let names: Vec<String> = projects.iter().map(|p| p.name.clone()).collect();
        let graph = BuildGraph::new(projects).expect("layered DAG is always valid");

        for target in &names {
            let order = graph.topo_order(target).expect("target exists");
            for (position, name) in order.iter().enumerate() {
                for dep in graph.dependencies_of(name) {
                    let dep_position = order
                        .iter()
                        .position(|candidate| candidate == dep)
                        .expect("dependency must be in the reachable order");
                    prop_assert!(
                        dep_position < position,
                        "{dep} must precede {name} in {order:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn reachable_order_is_exactly_the_dependency_closure(projects in arb_dag()) {
        let names: Vec<String> = projects.iter().map(|p| p.name.clone()).collect();
        let graph = BuildGraph::new(projects).expect("layered DAG is always valid");

        for target in &names {
            let order = graph.topo_order(target).expect("target exists");
            let order_set: HashSet<&String> = order.iter().collect();

            // Closure: every dependency of a listed project is listed too.
            for name in &order {
                for dep in graph.dependencies_of(name) {
                    prop_assert!(order_set.contains(dep));
                }
            }
            // No duplicates and the target itself is last.
            prop_assert_eq!(order_set.len(), order.len());
            prop_assert_eq!(order.last(), Some(target));
        }
    }

    #[test]
    fn closing_a_chain_into_a_ring_is_always_rejected(n in 2usize..8) {
        // p0 <- p1 <- ... <- p_{n-1}, plus p0 depending on p_{n-1}.
        let projects: Vec<Project> = (0..n)
            .map(|i| {
                let deps = if i == 0 {
                    vec![format!("p{}", n - 1)]
                } else {
                    vec![format!("p{}", i - 1)]
                };
                project(format!("p{i}"), deps)
            })
            .collect();

        prop_assert!(BuildGraph::new(projects).is_err());
    }
}
