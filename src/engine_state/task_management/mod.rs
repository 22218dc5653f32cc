//! # Task Management System
//!
//! A small worker-thread pool for running [`Task`]s off the calling thread.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: distributes tasks to workers and collects their outputs
//! - `Task`: a unit of work that is moved to a worker and back
//! - `TaskChannel`: the pair of channels connecting the manager to one worker
//!
//! Each worker owns a dedicated task channel and result channel. The manager
//! hands out work round-robin and never gives a worker more than
//! [`MAX_TASKS_IN_FLIGHT`] tasks at once; everything else waits in a FIFO
//! queue until a worker frees up.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. The manager sends each task to an idle worker, or queues it
//! 3. Workers process tasks and send the outputs back
//! 4. `process_completed_tasks()` drains the outputs without blocking
//! 5. `process_queued_tasks()` moves queued tasks onto freed workers
//!
//! ## Shutdown
//! Dropping the manager closes every task channel. Workers finish their current
//! task, see the closed channel and exit, and the drop joins them.
//!
//! ## Example Usage
//! ```rust,ignore
//! let mut task_manager = TaskManager::<MyTask>::new(num_workers)?;
//!
//! task_manager.publish_task(MyTask::new(...));
//!
//! // In the main loop:
//! for output in task_manager.process_completed_tasks() {
//!     handle(output);
//! }
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};

pub use task::Task;

use crate::error::TerrainError;

/// The connection between the manager and one worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from the manager to the worker
/// - `result_receiver`: Receives outputs from the worker
/// - `num_tasks_in_flight`: Tasks sent but not yet returned
/// - `disconnected`: Set once the worker has gone away (it panicked)
/// - `worker`: Handle joined when the manager is dropped
struct TaskChannel<T: Task> {
    task_sender: Sender<T>,
    result_receiver: Receiver<T::Output>,
    num_tasks_in_flight: usize,
    disconnected: bool,
    worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: One channel pair per worker
/// - `queued_tasks`: Tasks waiting for an idle worker
/// - `current_channel`: Start index for round-robin scheduling
pub struct TaskManager<T: Task> {
    channels: Vec<TaskChannel<T>>,
    queued_tasks: VecDeque<T>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// With one task per worker, a task that is still queued can be dropped or
/// replaced by its owner; once sent, it runs to completion.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl<T: Task> TaskManager<T> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to start
    ///
    /// # Errors
    /// [`TerrainError::WorkerSpawn`] if the operating system refuses to start a
    /// thread. Workers started before the failure are shut down again.
    pub fn new(num_workers: usize) -> Result<Self, TerrainError> {
        let mut manager = TaskManager {
            channels: Vec::with_capacity(num_workers),
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        };

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<T>();
            let (result_tx, result_rx) = channel::<T::Output>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = task.process();
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("terrain-worker-{index}"))
                .spawn(task_closure)
                .map_err(TerrainError::WorkerSpawn)?;

            manager.channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                disconnected: false,
                worker,
            });
        }

        debug!("Started {} worker threads", num_workers);
        Ok(manager)
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was sent
    /// - `Err(task)` if the worker is gone, handing the task back for requeueing
    fn try_send_task(&mut self, task: T, channel_idx: usize) -> Result<(), T> {
        let channel = &mut self.channels[channel_idx];
        match channel.task_sender.send(task) {
            Ok(_) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(err) => {
                channel.disconnected = true;
                Err(err.0)
            }
        }
    }

    /// Finds a worker channel that can accept a new task.
    ///
    /// Round-robin from the channel after the last one used, skipping channels
    /// that are full or disconnected.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|step| (self.current_channel + step) % count)
            .find(|&idx| {
                let channel = &self.channels[idx];
                !channel.disconnected && channel.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
            })
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was sent to a worker immediately
    /// - `false` if it was queued because every worker is busy
    pub fn publish_task(&mut self, task: T) -> bool {
        let Some(channel_idx) = self.find_available_channel() else {
            self.queued_tasks.push_back(task);
            return false;
        };

        match self.try_send_task(task, channel_idx) {
            Ok(_) => {
                self.current_channel = (channel_idx + 1) % self.channels.len();
                true
            }
            Err(task) => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Sends queued tasks to idle workers, oldest first, until either the queue
    /// is empty or no worker is free.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // The channel is now marked disconnected; try the next one.
                    self.queued_tasks.push_front(task);
                }
            }
        }
    }

    /// Collects every output the workers have produced so far.
    ///
    /// Never blocks. Outputs from one worker are returned in the order that
    /// worker finished them.
    pub fn process_completed_tasks(&mut self) -> Vec<T::Output> {
        let mut outputs = Vec::new();
        for (idx, channel) in self.channels.iter_mut().enumerate() {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(output) => {
                        channel.num_tasks_in_flight -= 1;
                        outputs.push(output);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !channel.disconnected {
                            error!(
                                "Worker {} disconnected with {} task(s) in flight",
                                idx, channel.num_tasks_in_flight
                            );
                            channel.disconnected = true;
                        }
                        break;
                    }
                }
            }
        }
        outputs
    }

    /// Tasks currently running on (or sent to) a worker.
    pub fn in_flight(&self) -> usize {
        self.channels.iter().map(|channel| channel.num_tasks_in_flight).sum()
    }

    /// Tasks waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Number of workers that are still alive.
    pub fn worker_count(&self) -> usize {
        self.channels.iter().filter(|channel| !channel.disconnected).count()
    }
}

impl<T: Task> Drop for TaskManager<T> {
    fn drop(&mut self) {
        self.queued_tasks.clear();
        for channel in self.channels.drain(..) {
            let TaskChannel {
                task_sender, worker, ..
            } = channel;
            drop(task_sender);
            if worker.join().is_err() {
                warn!("A terrain worker panicked before shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    struct Square(u64);

    impl Task for Square {
        type Output = u64;

        fn process(self) -> u64 {
            self.0 * self.0
        }
    }

    fn drain(manager: &mut TaskManager<Square>, expected: usize) -> Vec<u64> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut outputs = Vec::new();
        while outputs.len() < expected && Instant::now() < deadline {
            outputs.extend(manager.process_completed_tasks());
            manager.process_queued_tasks();
            thread::sleep(Duration::from_millis(1));
        }
        outputs
    }

    #[test]
    fn every_task_comes_back() {
        let mut manager = TaskManager::new(3).unwrap();
        for n in 0..20 {
            manager.publish_task(Square(n));
        }
        assert!(manager.in_flight() <= 3);
        assert_eq!(manager.in_flight() + manager.queued(), 20);

        let mut outputs = drain(&mut manager, 20);
        outputs.sort_unstable();
        assert_eq!(outputs, (0..20).map(|n| n * n).collect::<Vec<_>>());
        assert_eq!(manager.in_flight(), 0);
        assert_eq!(manager.queued(), 0);
    }

    #[test]
    fn without_workers_everything_queues() {
        let mut manager: TaskManager<Square> = TaskManager::new(0).unwrap();
        assert!(!manager.publish_task(Square(2)));
        manager.process_queued_tasks();
        assert_eq!(manager.queued(), 1);
        assert!(manager.process_completed_tasks().is_empty());
    }

    #[test]
    fn one_task_per_worker() {
        let mut manager = TaskManager::new(2).unwrap();
        assert!(manager.publish_task(Square(1)));
        assert!(manager.publish_task(Square(2)));
        assert!(!manager.publish_task(Square(3)));
        assert_eq!(manager.worker_count(), 2);
        assert_eq!(drain(&mut manager, 3).len(), 3);
    }
}
