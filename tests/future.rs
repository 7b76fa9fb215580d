use std::sync::mpsc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::{thread_rng, Rng};

use relay::{future, Error, Executor, Fallible, Promise};

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[test]
fn completes_at_most_once() {
    let p = Promise::new();
    assert!(p.succeed(1));
    assert!(!p.succeed(2));
    assert!(!p.fail(Error::Timeout));
    assert_eq!(p.completion(), Some(Fallible::Success(1)));
}

#[test]
fn value_future_delivers_exactly_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    let _h = future::value(7).on_success(&Executor::immediate(), move |n| {
        assert_eq!(n, 7);
        c.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn late_subscriber_sees_terminal_value() {
    let p = Promise::new();
    p.succeed("done");

    let (tx, rx) = mpsc::channel();
    let _h = p.future().on_complete(&Executor::immediate(), move |r| {
        tx.send(r).unwrap();
    });

    assert_eq!(rx.recv().unwrap(), Fallible::Success("done"));
}

#[test]
fn subscription_races_completion() {
    // A completion racing a subscription must deliver exactly once, whoever
    // wins the head swap.
    for _ in 0..200 {
        let p = Promise::new();
        let (tx, rx) = mpsc::channel();

        let completer = {
            let p = p.clone();
            thread::spawn(move || {
                if thread_rng().gen::<bool>() {
                    thread::yield_now();
                }
                p.succeed(7);
            })
        };

        let subscriber = {
            let fut = p.future();
            thread::spawn(move || {
                fut.on_complete(&Executor::immediate(), move |r| {
                    tx.send(r).unwrap();
                })
            })
        };

        completer.join().unwrap();
        let _h = subscriber.join().unwrap();

        assert_eq!(
            rx.recv_timeout(ms(1000)).unwrap(),
            Fallible::Success(7),
            "terminal value must reach the subscriber"
        );
        assert!(rx.recv_timeout(ms(10)).is_err(), "and only once");
    }
}

#[test]
fn map_chains() {
    let fut = future::value(2).map(|n| n + 1).map(|n| n * 10);

    let (tx, rx) = mpsc::channel();
    let _h = fut.on_success(&Executor::immediate(), move |n| tx.send(n).unwrap());
    assert_eq!(rx.recv().unwrap(), 30);
}

#[test]
fn map_passes_failures_through() {
    let fut = future::ready(Fallible::<i32>::failure(Error::Timeout)).map(|n| n + 1);

    let (tx, rx) = mpsc::channel();
    let _h = fut.on_failure(&Executor::immediate(), move |e| tx.send(e).unwrap());
    assert_eq!(rx.recv().unwrap(), Error::Timeout);
}

#[test]
fn try_map_converts_errors() {
    let fut = future::value(2).try_map(|_| Err::<i32, _>(Error::message("boom")));
    assert_eq!(fut.completion(), Some(Fallible::failure(Error::message("boom"))));
}

#[test]
fn recover_restores_success() {
    let fut = future::ready(Fallible::<i32>::failure(Error::Cancelled)).recover(|_| 9);
    assert_eq!(fut.completion(), Some(Fallible::Success(9)));
}

#[test]
fn zip_pairs_successes() {
    let fut = future::value(1).zip(&future::value("a"));
    assert_eq!(fut.completion(), Some(Fallible::Success((1, "a"))));
}

#[test]
fn zip_fails_with_first_failure() {
    let p = Promise::<i32>::new();
    let fut = p.future().zip(&future::ready(Fallible::<i32>::failure(Error::Timeout)));

    assert_eq!(fut.completion(), Some(Fallible::failure(Error::Timeout)));
    // The other side completing afterwards changes nothing.
    p.succeed(1);
    assert_eq!(fut.completion(), Some(Fallible::failure(Error::Timeout)));
}

#[test]
fn join_all_preserves_input_order() {
    let futures: Vec<_> = (0..8u64)
        .map(|i| {
            future::spawn(&Executor::primary(), move || {
                thread::sleep(ms(8 - i));
                Ok(i)
            })
        })
        .collect();

    let (tx, rx) = mpsc::channel();
    let joined = future::join_all(futures);
    let _h = joined.on_success(&Executor::immediate(), move |v| tx.send(v).unwrap());

    assert_eq!(rx.recv_timeout(ms(2000)).unwrap(), (0..8).collect::<Vec<_>>());
}

#[test]
fn join_all_of_nothing_completes_empty() {
    let joined = future::join_all(Vec::<relay::Future<i32>>::new());
    assert_eq!(joined.completion(), Some(Fallible::Success(vec![])));
}

#[test]
fn spawn_runs_on_the_executor() {
    let (tx, rx) = mpsc::channel();

    let fut = future::spawn(&Executor::primary(), || Ok::<_, Error>(21 * 2));
    let _h = fut.on_success(&Executor::immediate(), move |n| tx.send(n).unwrap());

    assert_eq!(rx.recv_timeout(ms(1000)).unwrap(), 42);
}

#[test]
fn spawn_after_waits_at_least_the_delay() {
    let start = Instant::now();
    let (tx, rx) = mpsc::channel();

    let fut = future::spawn_after(&Executor::primary(), ms(50), || Ok::<_, Error>(()));
    let _h = fut.on_success(&Executor::immediate(), move |_| {
        tx.send(Instant::now()).unwrap();
    });

    let fired = rx.recv_timeout(ms(2000)).unwrap();
    assert!(fired - start >= ms(50));
}

#[test]
fn timeout_fails_an_unresolved_future() {
    let p = Promise::<i32>::new();
    let fut = p.future().timeout(ms(30));

    let (tx, rx) = mpsc::channel();
    let _h = fut.on_failure(&Executor::immediate(), move |e| tx.send(e).unwrap());

    assert_eq!(rx.recv_timeout(ms(2000)).unwrap(), Error::Timeout);
    // The original promise resolving afterwards is a lost race, not an error.
    assert!(p.succeed(5));
}

#[test]
fn timeout_passes_an_early_completion() {
    let fut = future::value(3).timeout(ms(200));
    assert_eq!(fut.completion(), Some(Fallible::Success(3)));
}

#[test]
fn dropped_handler_never_fires() {
    let p = Promise::new();
    let (tx, rx) = mpsc::channel::<Fallible<i32>>();

    let h = p.future().on_complete(&Executor::immediate(), move |r| {
        tx.send(r).unwrap();
    });
    drop(h);

    p.succeed(1);
    assert!(rx.recv_timeout(ms(50)).is_err());
}

#[test]
fn retained_objects_release_on_completion() {
    struct Flag(Arc<AtomicUsize>);
    impl Drop for Flag {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let dropped = Arc::new(AtomicUsize::new(0));
    let p = Promise::<i32>::new();
    p.retain(Flag(dropped.clone()));

    assert_eq!(dropped.load(Ordering::SeqCst), 0);
    p.succeed(1);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

#[test]
fn delay_re_delivers_later() {
    let start = Instant::now();
    let (tx, rx) = mpsc::channel();

    let fut = future::value(5).delay(ms(40));
    let _h = fut.on_success(&Executor::immediate(), move |n| {
        tx.send((n, Instant::now())).unwrap();
    });

    let (n, fired) = rx.recv_timeout(ms(2000)).unwrap();
    assert_eq!(n, 5);
    assert!(fired - start >= ms(40));
}
