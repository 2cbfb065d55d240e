use png_mesh::{Face, face_points};
use png_solver::LinearSystem;

use crate::algorithm::{AssemblyContext, LocalContribution, NodalGradAlgorithm, compute_and_scatter};
use crate::bc::BoundaryKind;
use crate::error::{EqSysError, EqSysResult};

/// Boundary-value correction for inflow and open boundaries:
/// `RHS_i += ∮ N_i (q_bc - q) n dA`.
///
/// `q_bc` comes from the data-source field of the boundary kind; without
/// one the correction vanishes.
#[derive(Debug, Clone)]
pub struct BoundaryValueNodalGradAlgorithm {
    name: String,
    part: String,
    kind: BoundaryKind,
}

impl BoundaryValueNodalGradAlgorithm {
    pub fn new(part: impl Into<String>, kind: BoundaryKind) -> Self {
        let part = part.into();
        Self {
            name: format!("{}:{}", kind, part),
            part,
            kind,
        }
    }

    fn face_local(
        &self,
        ctx: &AssemblyContext<'_>,
        face: &Face,
        source: png_mesh::FieldHandle,
    ) -> EqSysResult<LocalContribution> {
        let dim = ctx.dim();
        let parent = ctx.mesh.element(face.parent).ok_or_else(|| EqSysError::NotFound {
            what: format!("parent element of face {} on part '{}'", face.id, self.part),
        })?;
        let q = ctx.scalar_values(ctx.independent, &face.nodes);
        let q_bc = ctx.scalar_values(source, &face.nodes);

        let points = face_points(
            face.topology,
            &ctx.mesh.coords_of(&face.nodes),
            dim,
            ctx.mesh.element_centroid(parent),
        )?;
        let mut local = LocalContribution::new(face.nodes.clone(), dim);
        for p in &points {
            let jump: f64 = p
                .shape
                .iter()
                .enumerate()
                .map(|(j, nj)| nj * (q_bc[j] - q[j]))
                .sum();
            for (i, &ni) in p.shape.iter().enumerate() {
                for a in 0..dim {
                    local.add_rhs(i, a, p.weight * ni * jump * p.normal[a]);
                }
            }
        }
        Ok(local)
    }
}

impl NodalGradAlgorithm for BoundaryValueNodalGradAlgorithm {
    fn name(&self) -> &str {
        &self.name
    }

    fn part_name(&self) -> &str {
        &self.part
    }

    fn execute(&self, ctx: &AssemblyContext<'_>, sys: &mut LinearSystem) -> EqSysResult<()> {
        let part = ctx.mesh.require_part(&self.part)?;
        let faces: Vec<&Face> = ctx
            .mesh
            .part_faces(part.id)
            .iter()
            .filter_map(|&f| ctx.mesh.face(f))
            .collect();
        match ctx.source_field(self.kind) {
            Some(source) => {
                compute_and_scatter(&faces, sys, true, |face| self.face_local(ctx, face, source))
            }
            None => Ok(()),
        }
    }
}
