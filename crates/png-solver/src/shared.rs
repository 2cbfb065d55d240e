//! Rank-collective helpers over row-indexed vectors.
//!
//! Vectors here are laid out by [`DofMap`] block (one block per active
//! node), unlike the field helpers in `png_mesh::parallel` which are laid
//! out by local node.

use png_core::timing::{Timer, cycle_timing};
use png_mesh::{Communicator, DofMap, Mesh};

use crate::error::LinearSolverResult;

/// Sum the blocks of shared nodes across ranks.
///
/// `values` holds `width` entries per active block. Shared nodes that are
/// inactive on this rank contribute nothing.
pub fn sum_shared_blocks(
    comm: &dyn Communicator,
    mesh: &Mesh,
    dofs: &DofMap,
    values: &mut [f64],
    width: usize,
) -> LinearSolverResult<()> {
    if comm.size() == 1 {
        return Ok(());
    }
    let timer = Timer::start("shared sum");
    let mut buf = vec![0.0; mesh.global_node_count() * width];
    let shared: Vec<(usize, usize)> = mesh
        .shared_nodes()
        .iter()
        .filter_map(|&n| {
            dofs.block(n)
                .map(|b| (b, mesh.nodes()[n.idx()].global_id as usize))
        })
        .collect();

    for &(b, g) in &shared {
        buf[g * width..(g + 1) * width].copy_from_slice(&values[b * width..(b + 1) * width]);
    }
    comm.all_reduce_sum(&mut buf)?;
    for &(b, g) in &shared {
        values[b * width..(b + 1) * width].copy_from_slice(&buf[g * width..(g + 1) * width]);
    }
    timer.stop_into(&cycle_timing::SHARED_SUM);
    Ok(())
}

/// Per-block ownership flags in row-block order.
pub fn owned_blocks(mesh: &Mesh, dofs: &DofMap) -> Vec<bool> {
    dofs.active_nodes().iter().map(|&n| mesh.is_owned(n)).collect()
}

/// Global dot product of two consistent vectors, counting each shared
/// row once (on its owner).
pub fn dot(
    comm: &dyn Communicator,
    owned: &[bool],
    width: usize,
    a: &[f64],
    b: &[f64],
) -> LinearSolverResult<f64> {
    let mut local = 0.0;
    for (blk, &own) in owned.iter().enumerate() {
        if own {
            for r in blk * width..(blk + 1) * width {
                local += a[r] * b[r];
            }
        }
    }
    let mut buf = [local];
    comm.all_reduce_sum(&mut buf)?;
    Ok(buf[0])
}
