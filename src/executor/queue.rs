use std::thread;

use crossbeam_channel::{unbounded, Sender};

use crate::executor::{run_contained, Task};
use crate::utils::abort_on_panic;

/// A queue executor: one channel feeding a fixed set of worker threads.
///
/// With one worker this is a serial queue. Dropping the queue disconnects the
/// channel; workers drain tasks that were already submitted, then exit, so no
/// task is leaked.
pub(super) struct Queue {
    sender: Sender<Task>,
}

impl Queue {
    pub(super) fn new(name: &str, workers: usize) -> Queue {
        let (sender, receiver) = unbounded::<Task>();

        for _ in 0..workers {
            let receiver = receiver.clone();

            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    abort_on_panic(|| {
                        // Ends when all senders are gone and the queue is empty.
                        for task in receiver {
                            run_contained(task);
                        }
                        log::trace!("queue worker exiting after disconnect");
                    })
                })
                .expect("cannot start a thread driving tasks");
        }

        Queue { sender }
    }

    pub(super) fn push(&self, task: Task) {
        // The receivers live as long as the queue does.
        let _ = self.sender.send(task);
    }
}
