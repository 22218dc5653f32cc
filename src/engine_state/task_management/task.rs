//! # Task Trait
//!
//! A [`Task`] is a self-contained unit of work that is moved onto a worker
//! thread, processed there, and moved back as its [`Task::Output`].
//!
//! ## Task Lifecycle
//! 1. A task is handed to `TaskManager::publish_task()`
//! 2. `process()` runs on a worker thread and consumes the task
//! 3. The output travels back over the worker's result channel
//! 4. `TaskManager::process_completed_tasks()` returns it on the calling thread
//!
//! Tasks own everything they touch. Nothing is shared with other tasks, so no
//! locking happens inside `process()`.

/// A unit of work that can be executed on a worker thread.
///
/// # Implementation Guidelines
/// - Should be relatively coarse-grained to amortize the channel round trip
/// - Should carry its own buffers so they can be reused after the round trip
/// - Errors belong in the output; `process()` itself cannot fail
pub trait Task: Send + 'static {
    /// What the worker sends back once the task is done.
    type Output: Send + 'static;

    /// Performs the work.
    ///
    /// Runs on a worker thread. The task is consumed and usually moved into its
    /// own output so the caller gets its buffers back.
    fn process(self) -> Self::Output;
}
