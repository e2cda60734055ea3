// tests/property_scheduler.rs

//! Property: for every acyclic task graph, driving a run to settlement
//! terminates with each selected task in exactly one terminal state, and a
//! task whose dependency failed is always skipped.

use std::collections::HashSet;

use proptest::prelude::*;

use sitepipe::dag::{SkipReason, TaskGraph, TaskOutcome, TaskRegistry, TaskState};
use sitepipe::sched::Scheduler;
use sitepipe_test_utils::builders::SpecBuilder;

/// Random DAG: task N may only depend on tasks 0..N, which guarantees
/// acyclicity by construction.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = TaskGraph> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut registry = TaskRegistry::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let mut builder = SpecBuilder::new(&format!("task_{i}"));

                let mut seen = HashSet::new();
                for dep_idx in potential_deps {
                    if i > 0 && seen.insert(dep_idx % i) {
                        builder = builder.after(&format!("task_{}", dep_idx % i));
                    }
                }

                registry
                    .register(builder.build())
                    .expect("generated names are unique");
            }
            registry.seal().expect("generated graph is acyclic")
        })
    })
}

proptest! {
    #[test]
    fn every_run_settles_with_one_terminal_state_per_task(
        graph in dag_strategy(10),
        requested_indices in proptest::collection::vec(0..10usize, 1..5),
        failing_indices in proptest::collection::vec(0..10usize, 0..5),
    ) {
        let names: Vec<String> = graph.names().map(str::to_string).collect();

        let requested: Vec<String> = requested_indices
            .iter()
            .map(|&i| names[i % names.len()].clone())
            .collect();
        let failing: HashSet<String> = failing_indices
            .iter()
            .map(|&i| names[i % names.len()].clone())
            .collect();

        let mut scheduler = Scheduler::new(graph.clone());
        let mut run = scheduler.plan(&requested).expect("requested names exist");
        let selected = run.selection().len();

        // Simulate execution without any runtime: settle each ready task
        // immediately, failing the scripted ones.
        let mut steps = 0;
        let mut executed = 0;
        while !run.is_settled() {
            steps += 1;
            prop_assert!(steps <= 1000, "run must terminate");

            let ready = run.take_ready(&graph, usize::MAX);
            prop_assert!(!ready.is_empty(), "unsettled run must always make progress");

            for name in ready {
                executed += 1;
                let outcome = if failing.contains(&name) {
                    TaskOutcome::Failed { message: "scripted failure".to_string() }
                } else {
                    TaskOutcome::Succeeded { written: vec![] }
                };
                run.record(&graph, &name, outcome);
            }
        }

        prop_assert!(executed <= selected, "no task may run twice");

        let report = run.report();
        prop_assert_eq!(report.states.len(), selected);

        for (name, state) in &report.states {
            // Exactly one terminal state per selected task.
            prop_assert!(state.is_terminal(), "{} not terminal: {:?}", name, state);

            // A task whose dependency failed is always skipped, never run.
            if let TaskState::Skipped(SkipReason::UpstreamFailed(cause)) = state {
                prop_assert!(
                    matches!(report.states[cause], TaskState::Failed),
                    "skip cause {} must reference a failed task",
                    cause
                );
            }

            // Failed tasks are exactly the scripted ones that actually ran.
            if failing.contains(name.as_str()) {
                prop_assert!(
                    !matches!(state, TaskState::Succeeded),
                    "scripted failure {} cannot succeed",
                    name
                );
            }
        }
    }
}
