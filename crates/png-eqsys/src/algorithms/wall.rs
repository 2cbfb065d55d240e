use png_mesh::{Face, element_measure, face_points};
use png_solver::LinearSystem;

use crate::algorithm::{AssemblyContext, LocalContribution, NodalGradAlgorithm, compute_and_scatter};
use crate::bc::BoundaryKind;
use crate::error::{EqSysError, EqSysResult};

/// Prescribed value of the normal gradient component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalConstraint {
    /// From the wall data-source field, else the given constant.
    Wall { fallback: f64 },
    /// Always zero.
    Symmetry,
}

impl NormalConstraint {
    pub fn kind(&self) -> BoundaryKind {
        match self {
            NormalConstraint::Wall { .. } => BoundaryKind::Wall,
            NormalConstraint::Symmetry => BoundaryKind::Symmetry,
        }
    }
}

/// Weak penalty on `n · dqdx`.
///
/// Per face quadrature point the row-summed terms are
/// `LHS_ii += β w N_i n nᵀ` and `RHS_i += β w N_i n g`, with
/// `β = penalty · h` and `h` the parent element size.
#[derive(Debug, Clone)]
pub struct WallNodalGradAlgorithm {
    name: String,
    part: String,
    constraint: NormalConstraint,
}

impl WallNodalGradAlgorithm {
    pub fn new(part: impl Into<String>, constraint: NormalConstraint) -> Self {
        let part = part.into();
        Self {
            name: format!("{}:{}", constraint.kind(), part),
            part,
            constraint,
        }
    }

    fn face_local(&self, ctx: &AssemblyContext<'_>, face: &Face) -> EqSysResult<LocalContribution> {
        let dim = ctx.dim();
        let parent = ctx.mesh.element(face.parent).ok_or_else(|| EqSysError::NotFound {
            what: format!("parent element of face {} on part '{}'", face.id, self.part),
        })?;
        let size = element_measure(parent.topology, &ctx.mesh.coords_of(&parent.nodes), dim)?
            .powf(1.0 / dim as f64);
        let beta = ctx.options.penalty * size;

        let g = match self.constraint {
            NormalConstraint::Symmetry => vec![0.0; face.nodes.len()],
            NormalConstraint::Wall { fallback } => match ctx.source_field(BoundaryKind::Wall) {
                Some(h) => ctx.scalar_values(h, &face.nodes),
                None => vec![fallback; face.nodes.len()],
            },
        };

        let points = face_points(
            face.topology,
            &ctx.mesh.coords_of(&face.nodes),
            dim,
            ctx.mesh.element_centroid(parent),
        )?;
        let mut local = LocalContribution::new(face.nodes.clone(), dim);
        for p in &points {
            let g_ip: f64 = p.shape.iter().zip(&g).map(|(n, g)| n * g).sum();
            for (i, &ni) in p.shape.iter().enumerate() {
                let wi = beta * p.weight * ni;
                for a in 0..dim {
                    local.add_rhs(i, a, wi * p.normal[a] * g_ip);
                    for b in 0..dim {
                        local.add_lhs(i, a, i, b, wi * p.normal[a] * p.normal[b]);
                    }
                }
            }
        }
        local.to_increment_form(ctx.fields, ctx.dqdx);
        Ok(local)
    }
}

impl NodalGradAlgorithm for WallNodalGradAlgorithm {
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
        compute_and_scatter(&faces, sys, false, |face| self.face_local(ctx, face))
    }
}
