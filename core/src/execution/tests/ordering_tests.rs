//! Tests for task ordering on the continuation stack

use std::cell::RefCell;
use std::rc::Rc;

use crate::execution::{ResultCallback, Task};

use super::helpers::{context, log_line, recorder, return_line, TestSource};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn note(log: &Log, name: &'static str) -> Task<TestSource> {
    let log = Rc::clone(log);
    Task::deferred(move |_| log.borrow_mut().push(name))
}

#[test]
fn test_follow_ups_run_before_earlier_work() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    let x = {
        let log = Rc::clone(&log);
        Task::<TestSource>::deferred(move |control| {
            log.borrow_mut().push("X");
            let inner = Rc::clone(&log);
            control.queue_next(Task::<TestSource>::deferred(move |control| {
                inner.borrow_mut().push("X1");
                control.queue_next(note(&inner, "X1a"));
            }));
            control.queue_next(note(&log, "X2"));
        })
    };
    let w = note(&log, "W");

    let mut ctx = context();
    ctx.run_tasks([x, w]).unwrap();

    assert_eq!(*log.borrow(), vec!["X", "X1", "X1a", "X2", "W"]);
}

#[test]
fn test_queued_tasks_keep_queue_order() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut ctx = context();
    ctx.queue_initial_task(note(&log, "first"));
    ctx.queue_initial_task(note(&log, "second"));
    ctx.queue_initial_task(note(&log, "third"));
    ctx.run().unwrap();

    assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_return_in_one_seeded_line_keeps_the_next() {
    let source = TestSource::new("src");
    let (sink, results) = recorder();
    let mut ctx = context();
    ctx.queue_initial_command(return_line(4), source.clone(), sink);
    ctx.queue_initial_command(log_line("second", 1), source.clone(), ResultCallback::empty());
    ctx.run().unwrap();

    assert_eq!(*results.borrow(), vec![(true, 4)]);
    assert_eq!(source.logged(), vec!["second@src"]);
}

#[test]
fn test_return_in_one_seeded_task_keeps_siblings() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    let returning = {
        let log = Rc::clone(&log);
        Task::<TestSource>::deferred(move |control| {
            log.borrow_mut().push("returning");
            control.queue_next(note(&log, "dropped"));
            control.return_success(1);
        })
    };

    let mut ctx = context();
    ctx.run_tasks([note(&log, "first"), returning, note(&log, "last")])
        .unwrap();

    assert_eq!(*log.borrow(), vec!["first", "returning", "last"]);
}
