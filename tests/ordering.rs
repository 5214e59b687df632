use phasor::{Outcome, Phase, Scheduler, State, VirtualClock};

use std::cell::RefCell;
use std::rc::Rc;

type Trace = Rc<RefCell<Vec<String>>>;

fn scheduler() -> Scheduler {
    Scheduler::builder().clock(VirtualClock::new()).build()
}

fn note(trace: &Trace, entry: &str) {
    trace.borrow_mut().push(entry.to_owned());
}

fn recorded(trace: &Trace) -> Vec<String> {
    trace.borrow().clone()
}

#[test]
fn test_sync_code_runs_before_any_queued_work() {
    let mut scheduler = scheduler();
    let trace: Trace = Trace::default();

    note(&trace, "sync start");

    {
        let t = trace.clone();
        scheduler.schedule_timer(0, move |_| note(&t, "timer"));
    }
    {
        let t = trace.clone();
        scheduler.schedule_immediate(move |_| note(&t, "immediate"));
    }
    {
        let t = trace.clone();
        scheduler.queue_microtask(move |_| note(&t, "microtask"));
    }
    {
        let t = trace.clone();
        scheduler.queue_priority_microtask(move |_| note(&t, "priority microtask"));
    }

    note(&trace, "sync end");

    let outcome = scheduler.run().unwrap();
    assert_eq!(outcome, Outcome::Drained);

    assert_eq!(
        recorded(&trace),
        vec![
            "sync start",
            "sync end",
            "priority microtask",
            "microtask",
            "timer",
            "immediate",
        ],
    );
}

#[test]
fn test_zero_delay_timer_beats_immediate_from_same_turn() {
    let mut scheduler = scheduler();
    let trace: Trace = Trace::default();

    {
        let t = trace.clone();
        scheduler.schedule_timer(0, move |_| note(&t, "timer"));
    }
    {
        let t = trace.clone();
        scheduler.schedule_immediate(move |_| note(&t, "immediate"));
    }

    scheduler.run().unwrap();

    // Timers phase precedes Check phase in every cycle.
    assert_eq!(recorded(&trace), vec!["timer", "immediate"]);
}

#[test]
fn test_equal_due_times_fire_in_registration_order() {
    let mut scheduler = scheduler();
    let trace: Trace = Trace::default();

    for name in ["first", "second", "third"] {
        let t = trace.clone();
        scheduler.schedule_timer(5, move |_| note(&t, name));
    }

    scheduler.run().unwrap();

    assert_eq!(recorded(&trace), vec!["first", "second", "third"]);
}

#[test]
fn test_close_tasks_run_after_check_phase() {
    let mut scheduler = scheduler();
    let trace: Trace = Trace::default();

    {
        let t = trace.clone();
        scheduler.schedule_close(move |_| note(&t, "close"));
    }
    {
        let t = trace.clone();
        scheduler.schedule_immediate(move |_| note(&t, "immediate"));
    }
    {
        let t = trace.clone();
        scheduler.schedule_timer(0, move |_| note(&t, "timer"));
    }

    scheduler.run().unwrap();

    assert_eq!(recorded(&trace), vec!["timer", "immediate", "close"]);
}

#[test]
fn test_timer_scheduled_inside_timers_phase_waits_for_next_cycle() {
    let mut scheduler = scheduler();
    let trace: Trace = Trace::default();

    {
        let t = trace.clone();
        scheduler.schedule_timer(0, move |s| {
            note(&t, "parent timer");

            let t2 = t.clone();
            s.schedule_timer(0, move |_| note(&t2, "child timer"));

            let t3 = t.clone();
            s.schedule_immediate(move |_| note(&t3, "immediate"));
        });
    }

    scheduler.run().unwrap();

    // The child timer is due immediately but was not part of the Timers
    // phase snapshot, so the current cycle's Check phase runs first.
    assert_eq!(
        recorded(&trace),
        vec!["parent timer", "immediate", "child timer"],
    );
}

#[test]
fn test_full_cycle_execution_order() {
    let mut scheduler = scheduler();
    let trace: Trace = Trace::default();

    note(&trace, "1 script start");

    {
        let t = trace.clone();
        scheduler.schedule_timer(0, move |s| {
            note(&t, "7 timeout one");

            let tick = t.clone();
            s.queue_priority_microtask(move |_| note(&tick, "8 priority inside timeout"));

            let normal = t.clone();
            s.queue_microtask(move |_| note(&normal, "9 microtask inside timeout"));
        });
    }
    {
        let t = trace.clone();
        scheduler.schedule_timer(0, move |_| note(&t, "10 timeout two"));
    }
    {
        let t = trace.clone();
        scheduler.schedule_immediate(move |s| {
            note(&t, "11 immediate one");

            let tick = t.clone();
            s.queue_priority_microtask(move |_| note(&tick, "12 priority inside immediate"));
        });
    }
    {
        let t = trace.clone();
        scheduler.schedule_immediate(move |_| note(&t, "13 immediate two"));
    }
    {
        let t = trace.clone();
        scheduler.queue_microtask(move |_| note(&t, "5 microtask"));
    }
    {
        let t = trace.clone();
        scheduler.queue_priority_microtask(move |_| note(&t, "3 priority one"));
    }
    {
        let t = trace.clone();
        scheduler.queue_priority_microtask(move |_| note(&t, "4 priority two"));
    }

    note(&trace, "2 script end");

    scheduler.run().unwrap();

    assert_eq!(
        recorded(&trace),
        vec![
            "1 script start",
            "2 script end",
            "3 priority one",
            "4 priority two",
            "5 microtask",
            "7 timeout one",
            "8 priority inside timeout",
            "9 microtask inside timeout",
            "10 timeout two",
            "11 immediate one",
            "12 priority inside immediate",
            "13 immediate two",
        ],
    );
}

#[test]
fn test_phase_and_state_are_observable_from_callbacks() {
    let mut scheduler = scheduler();

    scheduler.schedule_timer(0, |s| {
        assert_eq!(s.phase(), Some(Phase::Timers));
        assert_eq!(s.state(), State::Running);

        s.queue_priority_microtask(|s| {
            // Draining does not leave the surrounding macrotask phase.
            assert_eq!(s.phase(), Some(Phase::Timers));
        });
    });
    scheduler.schedule_immediate(|s| assert_eq!(s.phase(), Some(Phase::Check)));
    scheduler.schedule_close(|s| assert_eq!(s.phase(), Some(Phase::Close)));

    assert_eq!(scheduler.state(), State::Idle);
    assert_eq!(scheduler.phase(), None);

    let outcome = scheduler.run().unwrap();

    assert_eq!(outcome, Outcome::Drained);
    assert_eq!(scheduler.state(), State::Idle);
    assert_eq!(scheduler.phase(), None);
}

#[test]
fn test_stop_finishes_cycle_through_close_phase() {
    let mut scheduler = scheduler();
    let trace: Trace = Trace::default();

    {
        let t = trace.clone();
        scheduler.schedule_timer(0, move |s| {
            note(&t, "timer stops the loop");
            s.stop();
        });
    }
    {
        let t = trace.clone();
        scheduler.schedule_immediate(move |_| note(&t, "immediate"));
    }
    {
        let t = trace.clone();
        scheduler.schedule_close(move |_| note(&t, "close"));
    }

    let outcome = scheduler.run().unwrap();

    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(scheduler.state(), State::Stopped);

    // Check phase is skipped once the stop is observed, but the cycle's
    // Close phase still runs before the loop exits.
    assert_eq!(recorded(&trace), vec!["timer stops the loop", "close"]);
}

#[test]
fn test_run_is_not_reentrant() {
    let mut scheduler = scheduler();
    let observed: Rc<RefCell<Option<String>>> = Rc::default();

    {
        let observed = observed.clone();
        scheduler.schedule_timer(0, move |s| {
            let error = s.run().unwrap_err();
            *observed.borrow_mut() = Some(error.to_string());
        });
    }

    scheduler.run().unwrap();

    let message = observed.borrow().clone().unwrap();
    assert!(message.contains("Running"), "unexpected error: {message}");
}
