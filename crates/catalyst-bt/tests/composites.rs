mod common;

use catalyst_bt::{
    BehaviourTree, BlackboardCondition, Comparison, Node, NodeState, Parallel, ParallelPolicy,
    RandomSelector, Selector, Sequence,
};
use proptest::prelude::*;

use common::{bindings, bindings_with_rng, Journal, Scripted};

use NodeState::{Failure, Running, Success};

#[test]
fn sequence_resumes_at_running_child() {
    let journal = Journal::default();
    let root = Sequence::new(vec![
        Scripted::always("a", &journal, Success).boxed(),
        Scripted::new("b", &journal, vec![Running, Running, Success]).boxed(),
        Scripted::always("c", &journal, Success).boxed(),
    ]);
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Running);
    assert_eq!(journal.count("start:a"), 1);
    assert_eq!(journal.count("update:a"), 1);
    assert_eq!(journal.count("start:b"), 1);
    assert_eq!(journal.count("update:b"), 2);

    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("update:a"), 1);
    assert_eq!(journal.count("update:c"), 1);
}

#[test]
fn sequence_completes_several_children_in_one_tick() {
    let journal = Journal::default();
    let root = Sequence::new(vec![
        Scripted::always("a", &journal, Success).boxed(),
        Scripted::always("b", &journal, Success).boxed(),
        Scripted::always("c", &journal, Failure).boxed(),
        Scripted::always("d", &journal, Success).boxed(),
    ]);
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Failure);
    assert_eq!(
        journal.entries(),
        vec![
            "start:a", "update:a", "stop:a", "start:b", "update:b", "stop:b", "start:c",
            "update:c", "stop:c",
        ]
    );
}

#[test]
fn selector_tries_every_child_once_before_failing() {
    let journal = Journal::default();
    let names = ["a", "b", "c", "d"];
    let children = names
        .iter()
        .map(|&name| Scripted::always(name, &journal, Failure).boxed())
        .collect();
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(Selector::new(children)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Failure);
    for name in names {
        assert_eq!(journal.count(&format!("update:{name}")), 1);
    }

    assert_eq!(tree.evaluate(), Failure);
    for name in names {
        assert_eq!(journal.count(&format!("update:{name}")), 2);
    }
}

#[test]
fn selector_stops_at_first_success() {
    let journal = Journal::default();
    let root = Selector::new(vec![
        Scripted::always("a", &journal, Failure).boxed(),
        Scripted::always("b", &journal, Success).boxed(),
        Scripted::always("c", &journal, Success).boxed(),
    ]);
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("update:c"), 0);
}

#[test]
fn empty_composites_resolve_immediately() {
    let (bindings, _timer) = bindings(1);
    let mut sequence = BehaviourTree::new(Sequence::new(Vec::new())).instantiate(bindings.clone());
    let mut selector = BehaviourTree::new(Selector::new(Vec::new())).instantiate(bindings.clone());
    let mut parallel = BehaviourTree::new(Parallel::new(
        Vec::new(),
        ParallelPolicy::RequireAll,
        ParallelPolicy::RequireOne,
    ))
    .instantiate(bindings);

    assert_eq!(sequence.evaluate(), Success);
    assert_eq!(selector.evaluate(), Failure);
    assert_eq!(parallel.evaluate(), Success);
}

#[test]
fn parallel_failure_policy_wins_the_tie_and_aborts_running_siblings() {
    let journal = Journal::default();
    let root = Parallel::new(
        vec![
            Scripted::always("ok", &journal, Success).boxed(),
            Scripted::always("bad", &journal, Failure).boxed(),
            Scripted::always("busy", &journal, Running).boxed(),
        ],
        ParallelPolicy::RequireAll,
        ParallelPolicy::RequireOne,
    );
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Failure);
    assert_eq!(journal.count("update:busy"), 1);
    assert_eq!(journal.count("abort:busy"), 1);
}

#[test]
fn parallel_polls_finished_children_again_every_tick() {
    let journal = Journal::default();
    let root = Parallel::new(
        vec![
            Scripted::always("fast", &journal, Success).boxed(),
            Scripted::new("slow", &journal, vec![Running, Running, Success]).boxed(),
        ],
        ParallelPolicy::RequireAll,
        ParallelPolicy::RequireOne,
    );
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("update:fast"), 3);
    assert_eq!(journal.count("start:fast"), 3);
    assert_eq!(journal.count("update:slow"), 3);
    assert_eq!(journal.count("start:slow"), 1);
}

#[test]
fn parallel_sees_a_finished_condition_flip() {
    let journal = Journal::default();
    let root = Parallel::new(
        vec![
            Box::new(BlackboardCondition::new(Comparison::equals("armed", true))) as Box<dyn Node>,
            Scripted::always("watch", &journal, Running).boxed(),
        ],
        ParallelPolicy::RequireAll,
        ParallelPolicy::RequireOne,
    );
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);
    tree.blackboard_mut().set("armed", true);

    assert_eq!(tree.evaluate(), Running);
    tree.blackboard_mut().set("armed", false);
    assert_eq!(tree.evaluate(), Failure);
    assert_eq!(journal.count("abort:watch"), 1);
}

#[test]
fn parallel_require_one_success_finishes_early() {
    let journal = Journal::default();
    let root = Parallel::new(
        vec![
            Scripted::always("done", &journal, Success).boxed(),
            Scripted::always("busy", &journal, Running).boxed(),
        ],
        ParallelPolicy::RequireOne,
        ParallelPolicy::RequireAll,
    );
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("abort:busy"), 1);
}

#[test]
fn parallel_with_no_policy_met_defaults_to_success() {
    let journal = Journal::default();
    let root = Parallel::new(
        vec![
            Scripted::always("ok", &journal, Success).boxed(),
            Scripted::always("bad", &journal, Failure).boxed(),
        ],
        ParallelPolicy::RequireAll,
        ParallelPolicy::RequireAll,
    );
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Success);
}

#[test]
fn random_selector_keeps_its_order_while_running() {
    let journal = Journal::default();
    let root = RandomSelector::new(vec![
        Scripted::always("a", &journal, Failure).boxed(),
        Scripted::always("b", &journal, Running).boxed(),
        Scripted::always("c", &journal, Failure).boxed(),
    ]);
    let (bindings, _timer) = bindings(42);
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    let first_pass = journal.entries();
    journal.clear();

    for _ in 0..5 {
        assert_eq!(tree.evaluate(), Running);
    }
    // only the running child is polled again; nothing is restarted
    assert_eq!(journal.entries(), vec!["update:b"; 5]);
    assert!(first_pass.contains(&"start:b".to_string()));
}

#[test]
fn random_selector_with_pinned_rng_is_deterministic() {
    let journal = Journal::default();
    let root = RandomSelector::new(vec![
        Scripted::always("a", &journal, Failure).boxed(),
        Scripted::always("b", &journal, Failure).boxed(),
        Scripted::always("c", &journal, Failure).boxed(),
    ]);
    // range() always yields `lo`, so every Fisher-Yates step swaps with index 0
    let (bindings, _timer) = bindings_with_rng(1, common::FixedRandom(0.0));
    let mut tree = BehaviourTree::new(root).instantiate(bindings);

    assert_eq!(tree.evaluate(), Failure);
    let updates: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("update:"))
        .collect();
    assert_eq!(updates, vec!["update:b", "update:c", "update:a"]);
}

proptest! {
    #[test]
    fn random_selector_visits_a_permutation(owner in any::<u64>(), n in 1usize..8) {
        const NAMES: [&str; 8] = ["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7"];
        let journal = Journal::default();
        let children = NAMES[..n]
            .iter()
            .map(|&name| Scripted::always(name, &journal, Failure).boxed())
            .collect();
        let (bindings, _timer) = bindings(owner);
        let mut tree = BehaviourTree::new(RandomSelector::new(children)).instantiate(bindings);

        prop_assert_eq!(tree.evaluate(), Failure);
        let mut visited: Vec<String> = journal
            .entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("update:").map(str::to_owned))
            .collect();
        visited.sort();
        let mut expected: Vec<String> = NAMES[..n].iter().map(|s| s.to_string()).collect();
        expected.sort();
        prop_assert_eq!(visited, expected);
    }
}
