//! # Chunk Streaming
//!
//! Keeps a square window of chunks generated around a moving observer.
//!
//! * [`window`]: chunk grid coordinates, observer snapping and window diffs
//! * [`job_pool`]: reusable chunk jobs in front of the worker threads
//! * [`chunk_loader_pool`]: the scheduler tying the window, the chunks and the
//!   job pool together

pub mod chunk_loader_pool;
pub mod job_pool;
pub mod window;

pub use chunk_loader_pool::{ChunkLoaderPool, TickReport};
pub use job_pool::{JobPool, SlotState};
pub use window::{snap_to_chunk_center, ChunkCoord, ChunkWindow, WindowDiff};
