use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay::{channel, future, promise, Context, Error, Executor, Fallible, Producer, Schedule, Task};

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// A scheduler that only runs tasks when pumped, so tests control exactly
/// when contextual callbacks fire relative to the context being dropped.
#[derive(Clone)]
struct Pump(Arc<Mutex<Vec<Task>>>);

impl Pump {
    fn new() -> Pump {
        Pump(Arc::new(Mutex::new(Vec::new())))
    }

    fn run_all(&self) {
        let tasks: Vec<_> = std::mem::take(&mut *self.0.lock().unwrap());
        for task in tasks {
            task.run();
        }
    }
}

impl Schedule for Pump {
    fn schedule(&self, task: Task) {
        self.0.lock().unwrap().push(task);
    }
}

struct Owner {
    pump: Pump,
    name: &'static str,
}

impl Context for Owner {
    fn executor(&self) -> Executor {
        Executor::from_scheduler(self.pump.clone())
    }
}

#[test]
fn contextual_future_runs_with_a_live_context() {
    let pump = Pump::new();
    let owner = Arc::new(Owner {
        pump: pump.clone(),
        name: "alive",
    });

    let fut = future::with_context(&owner, |ctx| Ok(ctx.name));
    pump.run_all();

    assert_eq!(fut.completion(), Some(Fallible::Success("alive")));
}

#[test]
fn contextual_future_fails_after_the_context_drops() {
    let pump = Pump::new();
    let owner = Arc::new(Owner {
        pump: pump.clone(),
        name: "gone",
    });

    let fut = future::with_context(&owner, |ctx| Ok(ctx.name));
    drop(owner);
    pump.run_all();

    assert_eq!(
        fut.completion(),
        Some(Fallible::failure(Error::ContextDropped))
    );
}

#[test]
fn contextual_promise_fails_after_the_context_drops() {
    let pump = Pump::new();
    let owner = Arc::new(Owner {
        pump: pump.clone(),
        name: "gone",
    });

    let fut = promise::with_context(&owner, |_ctx, p: &relay::Promise<i32>| {
        p.succeed(1);
    });
    drop(owner);
    pump.run_all();

    assert_eq!(
        fut.completion(),
        Some(Fallible::failure(Error::ContextDropped))
    );
}

#[test]
fn contextual_channel_fails_after_the_context_drops() {
    let pump = Pump::new();
    let owner = Arc::new(Owner {
        pump: pump.clone(),
        name: "gone",
    });

    let chan = channel::with_context(&owner, 0, |_ctx, p: &Producer<i32, ()>| {
        p.succeed(());
    });
    drop(owner);
    pump.run_all();

    assert_eq!(
        chan.completion(),
        Some(Fallible::failure(Error::ContextDropped))
    );
}

#[test]
fn contextual_subscription_delivers_while_the_context_lives() {
    let pump = Pump::new();
    let owner = Arc::new(Owner {
        pump: pump.clone(),
        name: "alive",
    });

    let p = relay::Promise::new();
    let (tx, rx) = mpsc::channel();
    let _h = p.future().on_complete_with(&owner, move |ctx, r| {
        tx.send((ctx.name, r)).unwrap();
    });

    p.succeed(5);
    pump.run_all();

    assert_eq!(rx.recv().unwrap(), ("alive", Fallible::Success(5)));
}

#[test]
fn contextual_subscription_severs_after_the_context_drops() {
    let pump = Pump::new();
    let owner = Arc::new(Owner {
        pump: pump.clone(),
        name: "gone",
    });

    let producer = Producer::<i32, ()>::new(0);
    let (tx, rx) = mpsc::channel();
    let _h = producer.channel().on_event_with(&owner, move |_ctx, ev| {
        tx.send(ev).unwrap();
    });

    producer.update(1);
    drop(owner);
    pump.run_all();

    assert!(rx.recv_timeout(ms(50)).is_err());

    // Severed for good: later updates don't reach the callback either.
    producer.update(2);
    pump.run_all();
    assert!(rx.recv_timeout(ms(50)).is_err());
}
