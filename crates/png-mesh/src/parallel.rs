//! Rank communication and shared-node synchronization.
//!
//! Ranks are abstracted by [`Communicator`]. [`SerialComm`] is the single
//! rank case; [`ThreadComm`] runs several ranks as threads of one process.
//! Every reduction sums contributions in rank order so that all ranks see
//! bit-identical results.

use std::sync::{Arc, Barrier, Mutex, MutexGuard};

use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;

/// Collective operations over a fixed group of ranks.
///
/// Every rank of the group must call each collective the same number of
/// times and in the same order.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Element-wise sum of `values` across ranks, written back in place.
    fn all_reduce_sum(&self, values: &mut [f64]) -> MeshResult<()>;

    /// Gather one value from every rank, indexed by rank.
    fn all_gather_u64(&self, value: u64) -> MeshResult<Vec<u64>>;

    fn barrier(&self);

    /// Logical AND across ranks.
    fn all_agree(&self, flag: bool) -> MeshResult<bool> {
        Ok(self.all_gather_u64(u64::from(flag))?.iter().all(|&v| v == 1))
    }
}

/// The one-rank communicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, _values: &mut [f64]) -> MeshResult<()> {
        Ok(())
    }

    fn all_gather_u64(&self, value: u64) -> MeshResult<Vec<u64>> {
        Ok(vec![value])
    }

    fn barrier(&self) {}
}

#[derive(Debug)]
struct Exchange {
    barrier: Barrier,
    reals: Mutex<Vec<Vec<f64>>>,
    words: Mutex<Vec<u64>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned slot means another rank panicked; the data is still usable
    // for reporting, the panic itself propagates through the thread join.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// One rank of an in-process thread group.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Exchange>,
}

impl ThreadComm {
    /// Create the communicators of a group of `size` ranks.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(Exchange {
            barrier: Barrier::new(size),
            reals: Mutex::new(vec![Vec::new(); size]),
            words: Mutex::new(vec![0; size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> MeshResult<()> {
        lock(&self.shared.reals)[self.rank] = values.to_vec();
        self.shared.barrier.wait();

        let result = {
            let slots = lock(&self.shared.reals);
            if slots.iter().any(|s| s.len() != values.len()) {
                let lens: Vec<usize> = slots.iter().map(Vec::len).collect();
                Err(MeshError::Parallel {
                    what: format!("all_reduce_sum length mismatch across ranks: {:?}", lens),
                })
            } else {
                values.fill(0.0);
                for slot in slots.iter() {
                    for (v, s) in values.iter_mut().zip(slot) {
                        *v += s;
                    }
                }
                Ok(())
            }
        };

        // Nobody may refill the slots before every rank has read them
        self.shared.barrier.wait();
        result
    }

    fn all_gather_u64(&self, value: u64) -> MeshResult<Vec<u64>> {
        lock(&self.shared.words)[self.rank] = value;
        self.shared.barrier.wait();
        let out = lock(&self.shared.words).clone();
        self.shared.barrier.wait();
        Ok(out)
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }
}

/// Run `f` once per rank of a `size`-rank thread group and collect the
/// results in rank order.
pub fn run_ranks<F, R>(size: usize, f: F) -> Vec<R>
where
    F: Fn(ThreadComm) -> R + Sync,
    R: Send,
{
    let comms = ThreadComm::group(size);
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                scope.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(r) => r,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

/// Sum the values of shared nodes across ranks so that every copy holds
/// the total of all partial contributions.
///
/// `values` holds `components` entries per local node.
pub fn parallel_sum_nodal(
    comm: &dyn Communicator,
    mesh: &Mesh,
    values: &mut [f64],
    components: usize,
) -> MeshResult<()> {
    if comm.size() == 1 {
        return Ok(());
    }
    let mut buf = vec![0.0; mesh.global_node_count() * components];
    for &n in mesh.shared_nodes() {
        let g = mesh.nodes()[n.idx()].global_id as usize;
        let l = n.idx();
        buf[g * components..(g + 1) * components]
            .copy_from_slice(&values[l * components..(l + 1) * components]);
    }
    comm.all_reduce_sum(&mut buf)?;
    for &n in mesh.shared_nodes() {
        let g = mesh.nodes()[n.idx()].global_id as usize;
        let l = n.idx();
        values[l * components..(l + 1) * components]
            .copy_from_slice(&buf[g * components..(g + 1) * components]);
    }
    Ok(())
}

/// Overwrite every non-owned copy of a shared node with its owner's value.
pub fn copy_owned_to_shared(
    comm: &dyn Communicator,
    mesh: &Mesh,
    values: &mut [f64],
    components: usize,
) -> MeshResult<()> {
    if comm.size() == 1 {
        return Ok(());
    }
    let mut buf = vec![0.0; mesh.global_node_count() * components];
    for &n in mesh.shared_nodes() {
        if mesh.is_owned(n) {
            let g = mesh.nodes()[n.idx()].global_id as usize;
            let l = n.idx();
            buf[g * components..(g + 1) * components]
                .copy_from_slice(&values[l * components..(l + 1) * components]);
        }
    }
    comm.all_reduce_sum(&mut buf)?;
    for &n in mesh.shared_nodes() {
        if !mesh.is_owned(n) {
            let g = mesh.nodes()[n.idx()].global_id as usize;
            let l = n.idx();
            values[l * components..(l + 1) * components]
                .copy_from_slice(&buf[g * components..(g + 1) * components]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_gather_is_identity() {
        assert_eq!(SerialComm.all_gather_u64(7).unwrap(), vec![7]);
        assert!(SerialComm.all_agree(true).unwrap());
    }

    #[test]
    fn thread_reduce_sums_in_rank_order() {
        let out = run_ranks(3, |comm| {
            let mut v = vec![comm.rank() as f64, 1.0];
            comm.all_reduce_sum(&mut v).unwrap();
            v
        });
        for v in out {
            assert_eq!(v, vec![3.0, 3.0]);
        }
    }

    #[test]
    fn thread_gather_and_agree() {
        let out = run_ranks(2, |comm| {
            let g = comm.all_gather_u64(10 + comm.rank() as u64).unwrap();
            let agree = comm.all_agree(comm.rank() == 0).unwrap();
            (g, agree)
        });
        for (g, agree) in out {
            assert_eq!(g, vec![10, 11]);
            assert!(!agree);
        }
    }

    #[test]
    fn thread_reduce_detects_length_mismatch() {
        let out = run_ranks(2, |comm| {
            let mut v = vec![0.0; 1 + comm.rank()];
            comm.all_reduce_sum(&mut v)
        });
        assert!(out.iter().all(|r| matches!(r, Err(MeshError::Parallel { .. }))));
    }
}
