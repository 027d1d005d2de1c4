use armada_project_graph::Project;
use armada_task_graph::*;
use std::path::PathBuf;
use std::sync::Arc;

fn create_task(name: &str) -> Task {
    let project = Project::new(name, PathBuf::from("/workspace").join(name), name);

    Task::new(Arc::new(project), "echo hi")
}

fn create_graph(tasks: &[&str], edges: &[(&str, &str)]) -> TaskGraph {
    let mut graph = TaskGraph::new();

    for name in tasks {
        graph.add_task(create_task(name)).unwrap();
    }

    for (name, dep) in edges {
        graph.add_dependencies(name, &[dep]).unwrap();
    }

    graph
}

fn ordered_names(graph: &mut TaskGraph) -> Vec<String> {
    graph
        .ordered_tasks()
        .unwrap()
        .into_iter()
        .map(|index| graph.get(index).unwrap().name.clone())
        .collect()
}

mod task_graph {
    use super::*;

    #[test]
    fn errors_on_duplicate_task() {
        let mut graph = TaskGraph::new();
        graph.add_task(create_task("a")).unwrap();

        let error = graph.add_task(create_task("a")).err().unwrap();

        assert!(error.to_string().contains("already been registered"));
    }

    #[test]
    fn errors_on_unknown_dependency_task() {
        let mut graph = TaskGraph::new();
        graph.add_task(create_task("a")).unwrap();

        assert!(graph.add_dependencies("a", &["missing"]).is_err());
        assert!(graph.add_dependencies("missing", &["a"]).is_err());
    }

    mod cycles {
        use super::*;

        #[test]
        fn errors_on_direct_cycle_naming_the_chain() {
            let mut graph = create_graph(&["a", "b"], &[("a", "b"), ("b", "a")]);

            let error = graph.ordered_tasks().err().unwrap();

            assert!(error.to_string().contains("a → b → a"));
        }

        #[test]
        fn errors_on_transitive_cycle() {
            let mut graph =
                create_graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);

            assert!(graph.ordered_tasks().is_err());
        }

        #[test]
        fn errors_on_self_cycle() {
            let mut graph = create_graph(&["a"], &[("a", "a")]);

            assert!(graph.ordered_tasks().is_err());
        }

        #[test]
        fn succeeds_on_acyclic_graphs() {
            let mut graph = create_graph(&["a", "b", "c"], &[("b", "a"), ("c", "b")]);

            assert!(graph.ordered_tasks().is_ok());
        }
    }

    mod critical_path {
        use super::*;

        #[test]
        fn computes_linear_chain_lengths() {
            // b depends on a, c depends on b
            let mut graph = create_graph(&["a", "b", "c"], &[("b", "a"), ("c", "b")]);
            let indices = graph.ordered_tasks().unwrap();

            let lengths = indices
                .iter()
                .map(|index| {
                    (
                        graph.get(*index).unwrap().name.clone(),
                        graph.critical_path(*index),
                    )
                })
                .collect::<Vec<_>>();

            assert_eq!(
                lengths,
                vec![
                    ("a".to_string(), 2),
                    ("b".to_string(), 1),
                    ("c".to_string(), 0),
                ]
            );
        }

        #[test]
        fn computes_diamond_lengths() {
            let mut graph = create_graph(
                &["a", "b", "c", "d"],
                &[("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")],
            );
            graph.ordered_tasks().unwrap();

            let length_of = |graph: &TaskGraph, name: &str| {
                let index = graph.index_of(name).expect("task should exist");
                graph.critical_path(index)
            };

            assert_eq!(length_of(&graph, "a"), 2);
            assert_eq!(length_of(&graph, "b"), 1);
            assert_eq!(length_of(&graph, "c"), 1);
            assert_eq!(length_of(&graph, "d"), 0);
        }
    }

    mod ordering {
        use super::*;

        #[test]
        fn orders_by_critical_path_descending() {
            let mut graph = create_graph(&["a", "b", "c"], &[("b", "a"), ("c", "b")]);

            assert_eq!(ordered_names(&mut graph), vec!["a", "b", "c"]);
        }

        #[test]
        fn breaks_ties_by_name() {
            let mut graph = create_graph(
                &["d", "c", "b", "a"],
                &[("d", "b"), ("d", "c"), ("b", "a"), ("c", "a")],
            );

            assert_eq!(ordered_names(&mut graph), vec!["a", "b", "c", "d"]);
        }

        #[test]
        fn orders_independent_tasks_by_name() {
            let mut graph = create_graph(&["z", "m", "a"], &[]);

            assert_eq!(ordered_names(&mut graph), vec!["a", "m", "z"]);
        }
    }
}
