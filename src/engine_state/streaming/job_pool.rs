//! # Job Pool
//!
//! A fixed set of reusable [`ChunkJob`] slots in front of the worker threads.
//!
//! Every slot cycles `Idle -> Running -> Complete -> Idle`. A slot's job is
//! physically moved onto a worker while `Running` and comes back with its
//! buffers filled, so the pool can never read a job that is still being
//! written. The number of slots is independent of the chunk window and is
//! usually larger than the worker count, so the next chunks are already
//! queued when a worker frees up.

use std::collections::VecDeque;

use cgmath::Point3;
use log::{debug, error, warn};
use web_time::Duration;

use super::window::ChunkCoord;
use crate::{
    engine_state::{
        task_management::TaskManager,
        voxels::tasks::{ChunkJob, ChunkJobResult},
    },
    error::TerrainError,
    settings::{NoiseParameters, TerrainParameters},
};

/// Where a job slot is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Running,
    Complete,
}

struct JobSlot {
    state: SlotState,
    // `None` while the job is on a worker.
    job: Option<ChunkJob>,
    coord: Option<ChunkCoord>,
}

/// A job that came back from a worker during the last collection.
#[derive(Debug)]
pub struct CompletedJob {
    pub slot: usize,
    pub coord: Option<ChunkCoord>,
    pub elapsed: Duration,
    pub outcome: Result<usize, TerrainError>,
}

/// A bounded pool of chunk jobs driven by a [`TaskManager`].
pub struct JobPool {
    slots: Vec<JobSlot>,
    available: VecDeque<usize>,
    in_use: usize,
    max_size: usize,
    task_manager: TaskManager<ChunkJob>,
    noise: NoiseParameters,
    terrain: TerrainParameters,
    generation: u64,
}

impl JobPool {
    /// Creates `max_size` job slots served by `workers` threads.
    ///
    /// # Errors
    /// A configuration error if the parameters are unusable, or
    /// [`TerrainError::WorkerSpawn`] if a worker thread cannot start.
    pub fn new(
        max_size: usize,
        workers: usize,
        noise: NoiseParameters,
        terrain: TerrainParameters,
    ) -> Result<Self, TerrainError> {
        let slots = (0..max_size)
            .map(|slot| -> Result<JobSlot, TerrainError> {
                Ok(JobSlot {
                    state: SlotState::Idle,
                    job: Some(ChunkJob::new(slot, noise, terrain)?),
                    coord: None,
                })
            })
            .collect::<Result<Vec<_>, TerrainError>>()?;

        Ok(Self {
            slots,
            available: (0..max_size).collect(),
            in_use: 0,
            max_size,
            task_manager: TaskManager::new(workers)?,
            noise,
            terrain,
            generation: 0,
        })
    }

    /// Binds the next idle slot to `coord` and schedules it.
    ///
    /// # Returns
    /// `false` without doing anything if every slot is in use.
    pub fn try_dispatch(&mut self, coord: ChunkCoord, origin: Point3<f32>) -> bool {
        if self.in_use >= self.max_size {
            return false;
        }
        let Some(slot_idx) = self.available.pop_front() else {
            return false;
        };

        let slot = &mut self.slots[slot_idx];
        let Some(mut job) = slot.job.take() else {
            error!("Idle job slot #{} has no job", slot_idx);
            return false;
        };
        job.recenter(origin);
        slot.state = SlotState::Running;
        slot.coord = Some(coord);
        self.in_use += 1;
        self.task_manager.publish_task(job);
        true
    }

    /// Dispatches queued positions in order until the queue is empty or every
    /// slot is busy. Positions that cannot be dispatched stay queued.
    ///
    /// # Returns
    /// The positions that were dispatched.
    pub fn dispatch_from(
        &mut self,
        queue: &mut VecDeque<ChunkCoord>,
        mut origin_of: impl FnMut(ChunkCoord) -> Point3<f32>,
    ) -> Vec<ChunkCoord> {
        let mut dispatched = Vec::new();
        while let Some(&coord) = queue.front() {
            if !self.try_dispatch(coord, origin_of(coord)) {
                debug!(
                    "All {} job slots busy, deferring {} queued chunk(s)",
                    self.max_size,
                    queue.len()
                );
                break;
            }
            queue.pop_front();
            dispatched.push(coord);
        }
        self.task_manager.process_queued_tasks();
        dispatched
    }

    /// Takes back every job the workers have finished.
    ///
    /// Returned jobs are parked in their slots as `Complete`; read them with
    /// [`JobPool::completed_job`] and hand the slot back with
    /// [`JobPool::release`].
    pub fn collect_completed(&mut self) -> Vec<CompletedJob> {
        let results = self.task_manager.process_completed_tasks();
        let mut completed = Vec::with_capacity(results.len());

        for ChunkJobResult { job, elapsed, outcome } in results {
            let slot_idx = job.slot();
            let Some(slot) = self.slots.get_mut(slot_idx) else {
                error!("{}", TerrainError::UnknownJobSlot(slot_idx));
                continue;
            };
            if slot.state != SlotState::Running || !job.is_complete() {
                warn!("Job slot #{} returned in state {:?}", slot_idx, slot.state);
            }
            slot.state = SlotState::Complete;
            slot.job = Some(job);
            completed.push(CompletedJob {
                slot: slot_idx,
                coord: slot.coord,
                elapsed,
                outcome,
            });
        }
        self.task_manager.process_queued_tasks();
        completed
    }

    /// The finished job in `slot`, if the slot is `Complete`.
    pub fn completed_job(&self, slot: usize) -> Option<&ChunkJob> {
        let slot = self.slots.get(slot)?;
        match slot.state {
            SlotState::Complete => slot.job.as_ref().filter(|job| job.is_complete()),
            _ => None,
        }
    }

    /// Returns a `Complete` slot to the idle pool.
    ///
    /// Jobs that missed a parameter reset while they were running are brought
    /// up to date here.
    pub fn release(&mut self, slot_idx: usize) -> Result<(), TerrainError> {
        let slot = self
            .slots
            .get_mut(slot_idx)
            .ok_or(TerrainError::UnknownJobSlot(slot_idx))?;
        if slot.state != SlotState::Complete {
            return Ok(());
        }

        if let Some(job) = slot.job.as_mut() {
            job.clear_completion();
            if job.generation() != self.generation {
                job.reset_parameters(self.noise, self.terrain)?;
                job.set_generation(self.generation);
            }
        }
        slot.state = SlotState::Idle;
        slot.coord = None;
        self.in_use -= 1;
        self.available.push_back(slot_idx);
        Ok(())
    }

    /// Applies new parameters to every job.
    ///
    /// Idle and complete jobs are reset immediately; running jobs are reset when
    /// they are released. Results produced before the reset carry the old
    /// generation.
    ///
    /// # Errors
    /// A configuration error if the parameters are unusable; nothing changes.
    pub fn reset_parameters(
        &mut self,
        noise: NoiseParameters,
        terrain: TerrainParameters,
        generation: u64,
    ) -> Result<(), TerrainError> {
        terrain.validate()?;
        noise.validate()?;
        self.noise = noise;
        self.terrain = terrain;
        self.generation = generation;

        let mut reallocated = 0;
        for slot in &mut self.slots {
            if let Some(job) = slot.job.as_mut() {
                if job.reset_parameters(noise, terrain)? {
                    reallocated += 1;
                }
                job.set_generation(generation);
            }
        }
        debug!(
            "Job pool reset to generation {} ({} grid(s) reallocated)",
            generation, reallocated
        );
        Ok(())
    }

    /// Disposes every job that is not on a worker.
    ///
    /// Running jobs are dropped when their worker finishes; the worker threads
    /// are joined when the pool itself is dropped.
    pub fn dispose_jobs(&mut self) {
        for slot in &mut self.slots {
            if let Some(job) = slot.job.take() {
                job.dispose();
            }
        }
        self.available.clear();
    }

    /// Slots currently `Running` or `Complete`.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Jobs dispatched but not yet collected.
    pub fn running(&self) -> usize {
        self.slots.iter().filter(|slot| slot.state == SlotState::Running).count()
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).map(|slot| slot.state)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    fn small_terrain() -> TerrainParameters {
        TerrainParameters {
            sampling_width: 4,
            sampling_length: 4,
            sampling_height: 4,
            ..Default::default()
        }
    }

    fn origin_of(coord: ChunkCoord) -> Point3<f32> {
        coord.origin(4, 4)
    }

    fn wait_for(pool: &mut JobPool, expected: usize) -> Vec<CompletedJob> {
        let deadline = Instant::now() + std::time::Duration::from_secs(10);
        let mut completed = Vec::new();
        while completed.len() < expected && Instant::now() < deadline {
            completed.extend(pool.collect_completed());
            thread::sleep(std::time::Duration::from_millis(1));
        }
        completed
    }

    #[test]
    fn four_slots_dispatch_four_of_six() {
        let mut pool = JobPool::new(4, 1, NoiseParameters::default(), small_terrain()).unwrap();
        let mut queue: VecDeque<ChunkCoord> = (0..6).map(|x| ChunkCoord::new(x, 0)).collect();

        let dispatched = pool.dispatch_from(&mut queue, origin_of);
        assert_eq!(dispatched.len(), 4);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.front(), Some(&ChunkCoord::new(4, 0)));
        assert_eq!(pool.in_use(), 4);

        // Nothing frees up until results are collected and released.
        assert!(pool.dispatch_from(&mut queue, origin_of).is_empty());
        assert_eq!(queue.len(), 2);

        let completed = wait_for(&mut pool, 4);
        assert_eq!(completed.len(), 4);
        for job in &completed {
            assert!(job.outcome.is_ok());
            assert_eq!(pool.slot_state(job.slot), Some(SlotState::Complete));
            assert!(pool.completed_job(job.slot).is_some());
            pool.release(job.slot).unwrap();
            assert_eq!(pool.slot_state(job.slot), Some(SlotState::Idle));
            assert!(pool.completed_job(job.slot).is_none());
        }

        assert_eq!(pool.dispatch_from(&mut queue, origin_of).len(), 2);
        assert!(queue.is_empty());
        assert_eq!(wait_for(&mut pool, 2).len(), 2);
    }

    #[test]
    fn completed_jobs_report_their_position() {
        let mut pool = JobPool::new(2, 2, NoiseParameters::default(), small_terrain()).unwrap();
        assert!(pool.try_dispatch(ChunkCoord::new(7, -3), origin_of(ChunkCoord::new(7, -3))));
        let completed = wait_for(&mut pool, 1);
        assert_eq!(completed[0].coord, Some(ChunkCoord::new(7, -3)));
        let job = pool.completed_job(completed[0].slot).unwrap();
        assert_eq!(job.origin(), Point3::new(28.0, 0.0, -12.0));
    }

    #[test]
    fn running_jobs_pick_up_a_reset_on_release() {
        let mut pool = JobPool::new(1, 1, NoiseParameters::default(), small_terrain()).unwrap();
        assert!(pool.try_dispatch(ChunkCoord::new(0, 0), Point3::new(0.0, 0.0, 0.0)));

        let bigger = TerrainParameters { sampling_width: 8, ..small_terrain() };
        pool.reset_parameters(NoiseParameters::default(), bigger, 1).unwrap();

        let completed = wait_for(&mut pool, 1);
        let slot = completed[0].slot;
        assert_eq!(pool.completed_job(slot).unwrap().generation(), 0);
        pool.release(slot).unwrap();

        assert!(pool.try_dispatch(ChunkCoord::new(1, 0), Point3::new(4.0, 0.0, 0.0)));
        let completed = wait_for(&mut pool, 1);
        let job = pool.completed_job(completed[0].slot).unwrap();
        assert_eq!(job.generation(), 1);
        assert_eq!(job.terrain().sampling_width, 8);
    }

    #[test]
    fn invalid_reset_is_rejected() {
        let mut pool = JobPool::new(1, 1, NoiseParameters::default(), small_terrain()).unwrap();
        let broken = TerrainParameters { sampling_length: 0, ..small_terrain() };
        assert!(pool.reset_parameters(NoiseParameters::default(), broken, 1).is_err());
        assert_eq!(pool.generation(), 0);
    }
}
