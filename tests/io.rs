use phasor::{IoSubsystem, Outcome, Scheduler, VirtualClock};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Trace = Arc<Mutex<Vec<String>>>;

fn note(trace: &Trace, entry: &str) {
    trace.lock().unwrap().push(entry.to_owned());
}

/// I/O subsystem standing in for a real reactor: a counter of in-flight
/// operations, decremented by each delivered completion.
struct CountingIo {
    outstanding: Arc<AtomicUsize>,
}

impl IoSubsystem for CountingIo {
    fn has_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) > 0
    }

    fn cancel_all(&mut self) {
        self.outstanding.store(0, Ordering::SeqCst);
    }
}

#[test]
fn test_completions_deliver_in_arrival_order() {
    let mut scheduler = Scheduler::builder().clock(VirtualClock::new()).build();
    let sender = scheduler.completion_sender();
    let trace: Trace = Trace::default();

    for name in ["completion one", "completion two", "completion three"] {
        let t = trace.clone();
        sender.send(move |_| note(&t, name)).unwrap();
    }

    let outcome = scheduler.run().unwrap();

    assert_eq!(outcome, Outcome::Drained);
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["completion one", "completion two", "completion three"],
    );
}

#[test]
fn test_immediate_from_completion_beats_zero_delay_timer() {
    let mut scheduler = Scheduler::builder().clock(VirtualClock::new()).build();
    let sender = scheduler.completion_sender();
    let trace: Trace = Trace::default();

    {
        let t = trace.clone();
        sender
            .send(move |s| {
                note(&t, "completion");

                let immediate = t.clone();
                s.schedule_immediate(move |_| note(&immediate, "immediate"));

                let timer = t.clone();
                s.schedule_timer(0, move |_| note(&timer, "zero-delay timer"));
            })
            .unwrap();
    }

    scheduler.run().unwrap();

    // The Check phase follows the Poll phase inside the same cycle, while
    // the new timer has to wait for the next cycle's Timers phase.
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["completion", "immediate", "zero-delay timer"],
    );
}

#[test]
fn test_outstanding_io_keeps_the_loop_alive() {
    let outstanding = Arc::new(AtomicUsize::new(1));
    let mut scheduler = Scheduler::builder()
        .clock(VirtualClock::new())
        .io(CountingIo {
            outstanding: outstanding.clone(),
        })
        .build();

    let sender = scheduler.completion_sender();
    let trace: Trace = Trace::default();

    // With an empty queue set the loop would otherwise drain instantly;
    // the outstanding operation forces it to wait for the completion.
    {
        let t = trace.clone();
        let outstanding = outstanding.clone();
        sender
            .send(move |_| {
                outstanding.fetch_sub(1, Ordering::SeqCst);
                note(&t, "late completion");
            })
            .unwrap();
    }

    let outcome = scheduler.run().unwrap();

    assert_eq!(outcome, Outcome::Drained);
    assert_eq!(*trace.lock().unwrap(), vec!["late completion"]);
    assert_eq!(outstanding.load(Ordering::SeqCst), 0);
}

#[test]
fn test_completion_sent_during_delivery_defers_to_next_cycle() {
    let mut scheduler = Scheduler::builder().clock(VirtualClock::new()).build();
    let sender = scheduler.completion_sender();
    let trace: Trace = Trace::default();

    {
        let t = trace.clone();
        let resend = sender.clone();
        sender
            .send(move |s| {
                note(&t, "first completion");

                let nested = t.clone();
                resend.send(move |_| note(&nested, "nested completion")).unwrap();

                let immediate = t.clone();
                s.schedule_immediate(move |_| note(&immediate, "immediate"));
            })
            .unwrap();
    }

    scheduler.run().unwrap();

    // The Poll phase delivers a snapshot; a completion arriving during
    // delivery waits for the next cycle, after this cycle's Check phase.
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["first completion", "immediate", "nested completion"],
    );
}

#[test]
fn test_timers_are_not_starved_by_an_idle_poll() {
    let outstanding = Arc::new(AtomicUsize::new(1));
    let clock = VirtualClock::new();
    let mut scheduler = Scheduler::builder()
        .clock(clock.clone())
        .io(CountingIo {
            outstanding: outstanding.clone(),
        })
        .build();

    let fired_at = Arc::new(AtomicUsize::new(0));

    {
        let fired_at = fired_at.clone();
        let outstanding = outstanding.clone();
        scheduler.schedule_timer(40, move |s| {
            fired_at.store(s.now() as usize, Ordering::SeqCst);
            // Pretend the operation was abandoned so the loop can drain.
            outstanding.store(0, Ordering::SeqCst);
        });
    }

    let outcome = scheduler.run().unwrap();

    // The completion never arrives, but the poll-phase wait is bounded by
    // the next timer due time.
    assert_eq!(outcome, Outcome::Drained);
    assert_eq!(fired_at.load(Ordering::SeqCst), 40);
}
