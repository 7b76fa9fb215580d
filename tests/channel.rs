use std::sync::mpsc;
use std::sync::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use relay::{channel, ChannelEvent, Error, Executor, Fallible, Producer};

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[test]
fn updates_then_completion_in_order() {
    let producer = Producer::new(0);
    let (tx, rx) = mpsc::channel();

    let _h = producer.channel().on_event(&Executor::immediate(), move |ev| {
        tx.send(ev).unwrap();
    });

    producer.update(1);
    producer.update(2);
    producer.succeed("end");

    assert_eq!(rx.recv().unwrap(), ChannelEvent::Update(1));
    assert_eq!(rx.recv().unwrap(), ChannelEvent::Update(2));
    assert_eq!(
        rx.recv().unwrap(),
        ChannelEvent::Completion(Fallible::Success("end"))
    );
}

#[test]
fn update_after_close_is_rejected() {
    let producer = Producer::<i32, ()>::new(0);
    assert!(producer.update(1));
    assert!(producer.succeed(()));
    assert!(!producer.update(2));
    assert!(!producer.succeed(()));
    assert!(producer.is_closed());
}

#[test]
fn late_subscriber_sees_buffer() {
    let producer = Producer::new(4);
    for i in 1..=5 {
        producer.update(i);
    }
    producer.succeed("end");

    let (tx, rx) = mpsc::channel();
    let _h = producer.channel().on_event(&Executor::immediate(), move |ev| {
        tx.send(ev).unwrap();
    });

    for i in 2..=5 {
        assert_eq!(rx.recv().unwrap(), ChannelEvent::Update(i));
    }
    assert_eq!(
        rx.recv().unwrap(),
        ChannelEvent::Completion(Fallible::Success("end"))
    );
}

#[test]
fn zero_buffer_replays_nothing() {
    let producer = Producer::<i32, ()>::new(0);
    producer.update(1);
    producer.update(2);

    let (tx, rx) = mpsc::channel();
    let _h = producer.channel().on_update(&Executor::immediate(), move |u| {
        tx.send(u).unwrap();
    });

    assert!(rx.recv_timeout(ms(50)).is_err());
    producer.update(3);
    assert_eq!(rx.recv().unwrap(), 3);
}

#[test]
fn mid_stream_subscriber_sees_replay_then_live() {
    let producer = Producer::new(2);
    producer.update(1);
    producer.update(2);
    producer.update(3);

    let (tx, rx) = mpsc::channel();
    let _h = producer.channel().on_update(&Executor::immediate(), move |u| {
        tx.send(u).unwrap();
    });

    producer.update(4);
    producer.succeed(());

    // Replay of the last two, then the live update.
    assert_eq!(rx.recv().unwrap(), 2);
    assert_eq!(rx.recv().unwrap(), 3);
    assert_eq!(rx.recv().unwrap(), 4);
}

#[test]
fn no_updates_after_completion() {
    let producer = Producer::<i32, ()>::new(8);
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = received.clone();
    let _h = producer.channel().on_event(&Executor::immediate(), move |ev| {
        sink.lock().unwrap().push(ev);
    });

    producer.update(1);
    producer.succeed(());
    producer.update(2);

    let events = received.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            ChannelEvent::Update(1),
            ChannelEvent::Completion(Fallible::Success(()))
        ]
    );
}

#[test]
fn per_subscriber_order_survives_the_pool() {
    // Events dispatched onto the concurrent pool still arrive in production
    // order for a single subscriber.
    let producer = Producer::<i32, ()>::new(0);
    let (tx, rx) = mpsc::channel();

    let _h = producer.channel().on_update(&Executor::primary(), move |u| {
        tx.send(u).unwrap();
    });

    for i in 0..500 {
        producer.update(i);
    }
    producer.succeed(());

    for i in 0..500 {
        assert_eq!(rx.recv_timeout(ms(2000)).unwrap(), i, "update {} out of order", i);
    }
}

#[test]
fn concurrent_producers_fan_in() {
    let producer = Producer::<i32, ()>::new(0);
    let (tx, rx) = mpsc::channel();

    let _h = producer.channel().on_update(&Executor::immediate(), move |u| {
        tx.send(u).unwrap();
    });

    let mut handles = Vec::new();
    for t in 0..4 {
        let producer = producer.clone();
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                producer.update(t * 100 + i);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut seen: Vec<_> = (0..400).map(|_| rx.recv_timeout(ms(2000)).unwrap()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..400).collect::<Vec<_>>());
}

#[test]
fn dropped_handler_stops_receiving() {
    let producer = Producer::<i32, ()>::new(0);
    let (tx, rx) = mpsc::channel();

    let h = producer.channel().on_update(&Executor::immediate(), move |u| {
        tx.send(u).unwrap();
    });

    producer.update(1);
    assert_eq!(rx.recv().unwrap(), 1);

    drop(h);
    producer.update(2);
    assert!(rx.recv_timeout(ms(50)).is_err());
}

#[test]
fn on_completion_filters_updates() {
    let producer = Producer::<i32, &str>::new(0);
    let (tx, rx) = mpsc::channel();

    let _h = producer.channel().on_completion(&Executor::immediate(), move |c| {
        tx.send(c).unwrap();
    });

    producer.update(1);
    producer.fail(Error::message("bad"));

    assert_eq!(rx.recv().unwrap(), Fallible::failure(Error::message("bad")));
}

#[test]
fn spawned_channel_produces() {
    let chan = channel::spawn(&Executor::primary(), 0, |p: &Producer<i32, ()>| {
        p.update(1);
        p.update(2);
        p.succeed(());
    });

    let (tx, rx) = mpsc::channel();
    let _h = chan.on_event(&Executor::immediate(), move |ev| {
        tx.send(ev).unwrap();
    });

    let mut events = Vec::new();
    loop {
        let ev = rx.recv_timeout(ms(2000)).unwrap();
        let done = matches!(ev, ChannelEvent::Completion(_));
        events.push(ev);
        if done {
            break;
        }
    }

    // The producer may have emitted before we subscribed; with no replay
    // buffer only the completion is guaranteed.
    assert!(matches!(
        events.last(),
        Some(ChannelEvent::Completion(Fallible::Success(())))
    ));
}
