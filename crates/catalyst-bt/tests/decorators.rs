mod common;

use catalyst_bt::{
    AbortMode, BehaviourTree, BlackboardConditional, Comparison, Cooldown, Failer, Inverter, Node,
    NodeState, Probability, Repeater, SubTree, Succeeder, TimeLimit, UntilFail, Wait,
};
use catalyst_core::{Blackboard, TimerFacility};

use common::{bindings, bindings_with_rng, FixedRandom, Journal, Scripted};

use NodeState::{Failure, Running, Success};

fn run_once(root: impl Node) -> NodeState {
    let (bindings, _timer) = bindings_with_rng(1, FixedRandom(0.0));
    BehaviourTree::new(root).instantiate(bindings).evaluate()
}

#[test]
fn childless_decorators_resolve_to_their_defaults() {
    assert_eq!(run_once(Inverter::new(None)), Failure);
    assert_eq!(run_once(Succeeder::new(None)), Success);
    assert_eq!(run_once(Failer::new(None)), Failure);
    assert_eq!(run_once(Repeater::new(None, 3, false)), Failure);
    assert_eq!(run_once(UntilFail::new(None)), Failure);
    assert_eq!(run_once(Cooldown::new(None, 1.0, Success)), Failure);
    assert_eq!(run_once(TimeLimit::new(None, 1.0)), Failure);
    assert_eq!(run_once(Probability::new(None, 0.5)), Success);
    assert_eq!(run_once(Probability::new(None, 0.0)), Failure);
    assert_eq!(run_once(SubTree::empty()), Failure);
    assert_eq!(
        run_once(BlackboardConditional::new(
            Comparison::missing("anything"),
            AbortMode::None,
            None
        )),
        Success
    );
}

#[test]
fn result_transformers() {
    let journal = Journal::default();
    assert_eq!(
        run_once(Inverter::new(Some(Scripted::always("x", &journal, Success).boxed()))),
        Failure
    );
    assert_eq!(
        run_once(Inverter::new(Some(Scripted::always("x", &journal, Failure).boxed()))),
        Success
    );
    assert_eq!(
        run_once(Inverter::new(Some(Scripted::always("x", &journal, Running).boxed()))),
        Running
    );
    assert_eq!(
        run_once(Succeeder::new(Some(Scripted::always("x", &journal, Failure).boxed()))),
        Success
    );
    assert_eq!(
        run_once(Failer::new(Some(Scripted::always("x", &journal, Success).boxed()))),
        Failure
    );
    assert_eq!(
        run_once(Failer::new(Some(Scripted::always("x", &journal, Running).boxed()))),
        Running
    );
}

#[test]
fn infinite_repeater_never_finishes() {
    let journal = Journal::default();
    let child = Scripted::new("flip", &journal, vec![Success, Failure]).boxed();
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(Repeater::new(Some(child), 0, false)).instantiate(bindings);

    for _ in 0..1000 {
        assert_eq!(tree.evaluate(), Running);
    }
    assert_eq!(journal.count("update:flip"), 1000);
    assert_eq!(journal.count("start:flip"), 1000);
}

#[test]
fn counted_repeater_succeeds_after_the_last_run() {
    let journal = Journal::default();
    let child = Scripted::always("step", &journal, Success).boxed();
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(Repeater::new(Some(child), 3, false)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("start:step"), 3);
}

#[test]
fn repeater_can_stop_on_failure() {
    let journal = Journal::default();
    let child = Scripted::new("flaky", &journal, vec![Success, Failure]).boxed();
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(Repeater::new(Some(child), 5, true)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Failure);
}

#[test]
fn until_fail_succeeds_when_the_child_fails() {
    let journal = Journal::default();
    let child = Scripted::new("scripted", &journal, vec![Success, Success, Failure]).boxed();
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(UntilFail::new(Some(child))).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("start:scripted"), 3);
}

#[test]
fn failed_probability_draw_never_starts_the_child() {
    let journal = Journal::default();
    let child = Scripted::always("lucky", &journal, Success).boxed();
    let (bindings, _timer) = bindings_with_rng(1, FixedRandom(1.0));
    let mut tree = BehaviourTree::new(Probability::new(Some(child), 0.5)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Failure);
    assert_eq!(journal.count("start:lucky"), 0);
}

#[test]
fn passed_probability_draw_holds_for_the_whole_activation() {
    let journal = Journal::default();
    let child = Scripted::new("lucky", &journal, vec![Running, Running, Success]).boxed();
    let (bindings, _timer) = bindings_with_rng(1, FixedRandom(0.25));
    let mut tree = BehaviourTree::new(Probability::new(Some(child), 0.5)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Running);
    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("start:lucky"), 1);
}

#[test]
fn cooldown_blocks_the_child_until_the_timer_fires() {
    let journal = Journal::default();
    let child = Scripted::always("shoot", &journal, Success).boxed();
    let (bindings, timer) = bindings(1);
    let mut tree =
        BehaviourTree::new(Cooldown::new(Some(child), 2.0, Failure)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("update:shoot"), 1);

    timer.borrow_mut().advance_to(0.5);
    assert_eq!(tree.evaluate(), Failure);
    timer.borrow_mut().advance_to(1.5);
    assert_eq!(tree.evaluate(), Failure);
    assert_eq!(journal.count("update:shoot"), 1);

    timer.borrow_mut().advance_to(2.5);
    assert_eq!(tree.evaluate(), Success);
    assert_eq!(journal.count("update:shoot"), 2);
}

#[test]
fn time_limit_aborts_a_slow_child() {
    let journal = Journal::default();
    let child = Scripted::always("slow", &journal, Running).boxed();
    let (bindings, timer) = bindings(1);
    let mut tree = BehaviourTree::new(TimeLimit::new(Some(child), 1.0)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    timer.borrow_mut().advance(0.5);
    assert_eq!(tree.evaluate(), Running);
    timer.borrow_mut().advance(0.5);
    assert_eq!(tree.evaluate(), Failure);
    assert_eq!(journal.count("abort:slow"), 1);
}

#[test]
fn time_limit_cancels_its_timeout_when_the_child_finishes() {
    let journal = Journal::default();
    let child = Scripted::new("quick", &journal, vec![Running, Success]).boxed();
    let (bindings, timer) = bindings(1);
    let mut tree = BehaviourTree::new(TimeLimit::new(Some(child), 5.0)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    assert_eq!(timer.borrow().pending(), 1);
    assert_eq!(tree.evaluate(), Success);
    assert_eq!(timer.borrow().pending(), 0);
}

#[test]
fn wait_runs_until_its_duration_elapses() {
    let (bindings, timer) = bindings(1);
    let mut tree = BehaviourTree::new(Wait::new(1.0)).instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    timer.borrow_mut().advance(0.5);
    assert_eq!(tree.evaluate(), Running);
    timer.borrow_mut().advance(0.5);
    assert_eq!(timer.borrow().now(), 1.0);
    assert_eq!(tree.evaluate(), Success);
}

#[test]
fn conditional_gates_and_aborts_its_child() {
    let journal = Journal::default();
    let child = Scripted::always("guarded", &journal, Running).boxed();
    let gate = BlackboardConditional::new(
        Comparison::equals("armed", true),
        AbortMode::None,
        Some(child),
    );
    let mut blackboard = Blackboard::new();
    blackboard.set("armed", true);
    let (bindings, _timer) = bindings(1);
    let mut tree = BehaviourTree::new(gate)
        .with_blackboard(blackboard)
        .instantiate(bindings);

    assert_eq!(tree.evaluate(), Running);
    tree.blackboard_mut().set("armed", false);
    assert_eq!(tree.evaluate(), Failure);
    assert_eq!(journal.count("abort:guarded"), 1);
    assert_eq!(tree.blackboard().listener_count("armed"), 0);
}
