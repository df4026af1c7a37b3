//! Deferred mesh jobs
//!
//! Skinned meshes that were just fractured need their normals and tangents
//! rebuilt. That work runs on worker threads in a fixed pool of slots taken
//! round-robin. A full pool refuses new work so the caller can re-queue the
//! event instead of dropping it.

use crate::types::ObjectKey;
use fracture::RenderMesh;
use std::thread::JoinHandle;

/// Number of in-flight jobs
pub const JOB_SLOTS: usize = 16;

/// Target of a mesh job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub object: ObjectKey,
    pub slot: usize,
}

struct Job {
    key: JobKey,
    handle: JoinHandle<RenderMesh>,
}

/// Fixed-size round-robin pool of background mesh jobs
pub struct DeferredJobPool {
    slots: Vec<Option<Job>>,
    next: usize,
}

impl std::fmt::Debug for DeferredJobPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredJobPool")
            .field("in_flight", &self.in_flight())
            .field("next", &self.next)
            .finish()
    }
}

impl Default for DeferredJobPool {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredJobPool {
    pub fn new() -> Self {
        Self {
            slots: (0..JOB_SLOTS).map(|_| None).collect(),
            next: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_pending(&self, key: JobKey) -> bool {
        self.slots.iter().flatten().any(|job| job.key == key)
    }

    /// Start rebuilding normals and tangents of `mesh`
    ///
    /// Hands the mesh back when every slot is busy.
    pub fn submit_skin_recompute(&mut self, key: JobKey, mesh: RenderMesh) -> Result<(), RenderMesh> {
        let Some(index) = (0..JOB_SLOTS)
            .map(|i| (self.next + i) % JOB_SLOTS)
            .find(|&i| self.slots[i].is_none())
        else {
            return Err(mesh);
        };
        let handle = std::thread::spawn(move || {
            let mut mesh = mesh;
            mesh.recompute_normals_and_tangents();
            mesh
        });
        self.slots[index] = Some(Job { key, handle });
        self.next = (index + 1) % JOB_SLOTS;
        Ok(())
    }

    /// Collect finished jobs without blocking
    pub fn poll_finished(&mut self) -> Vec<(JobKey, RenderMesh)> {
        let mut done = Vec::new();
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|job| job.handle.is_finished()) {
                if let Some(result) = slot.take().and_then(join) {
                    done.push(result);
                }
            }
        }
        done
    }

    /// Block until the job for `key` finishes
    pub fn wait(&mut self, key: JobKey) -> Option<RenderMesh> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|job| job.key == key))?;
        slot.take().and_then(join).map(|(_, mesh)| mesh)
    }

    /// Block until every job finishes
    pub fn wait_all(&mut self) -> Vec<(JobKey, RenderMesh)> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.take().and_then(join))
            .collect()
    }
}

fn join(job: Job) -> Option<(JobKey, RenderMesh)> {
    match job.handle.join() {
        Ok(mesh) => Some((job.key, mesh)),
        Err(_) => {
            tracing::error!("mesh job for {:?} panicked", job.key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;

    fn key(i: u64) -> JobKey {
        JobKey {
            object: ObjectKey::Entity(EntityId(i)),
            slot: 0,
        }
    }

    #[test]
    fn test_pool_refuses_when_full() {
        let mut pool = DeferredJobPool::new();
        for i in 0..JOB_SLOTS as u64 {
            assert!(pool.submit_skin_recompute(key(i), RenderMesh::new()).is_ok());
        }
        assert_eq!(pool.in_flight(), JOB_SLOTS);
        assert!(pool.submit_skin_recompute(key(99), RenderMesh::new()).is_err());

        let finished = pool.wait_all();
        assert_eq!(finished.len(), JOB_SLOTS);
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.submit_skin_recompute(key(99), RenderMesh::new()).is_ok());
    }

    #[test]
    fn test_wait_for_key() {
        let mut pool = DeferredJobPool::new();
        pool.submit_skin_recompute(key(1), RenderMesh::new()).unwrap();
        pool.submit_skin_recompute(key(2), RenderMesh::new()).unwrap();
        assert!(pool.is_pending(key(2)));
        assert!(pool.wait(key(2)).is_some());
        assert!(!pool.is_pending(key(2)));
        assert!(pool.wait(key(2)).is_none());
        assert!(pool.is_pending(key(1)));
    }
}
