use png_mesh::{Element, element_points};
use png_solver::LinearSystem;

use crate::algorithm::{AssemblyContext, LocalContribution, NodalGradAlgorithm, compute_and_scatter};
use crate::error::EqSysResult;
use crate::options::MassTreatment;

/// Galerkin volume contribution: `rhs_i = ∫ N_i ∇q dV` against the lumped
/// or consistent mass.
#[derive(Debug, Clone)]
pub struct InteriorNodalGradAlgorithm {
    name: String,
    part: String,
}

impl InteriorNodalGradAlgorithm {
    pub fn new(part: impl Into<String>) -> Self {
        let part = part.into();
        Self {
            name: format!("interior:{}", part),
            part,
        }
    }

    fn element_local(ctx: &AssemblyContext<'_>, elem: &Element) -> EqSysResult<LocalContribution> {
        let dim = ctx.dim();
        let n = elem.nodes.len();
        let points = element_points(elem.topology, &ctx.mesh.coords_of(&elem.nodes), dim)?;
        let q = ctx.scalar_values(ctx.independent, &elem.nodes);

        let mut local = LocalContribution::new(elem.nodes.clone(), dim);
        for p in &points {
            let mut grad = [0.0; 3];
            for (a, qa) in q.iter().enumerate() {
                for d in 0..dim {
                    grad[d] += qa * p.grad[a][d];
                }
            }
            for i in 0..n {
                let wi = p.weight * p.shape[i];
                for d in 0..dim {
                    local.add_rhs(i, d, wi * grad[d]);
                }
                match ctx.options.mass {
                    MassTreatment::Lumped => {
                        for d in 0..dim {
                            local.add_lhs(i, d, i, d, wi);
                        }
                    }
                    MassTreatment::Consistent => {
                        for j in 0..n {
                            for d in 0..dim {
                                local.add_lhs(i, d, j, d, wi * p.shape[j]);
                            }
                        }
                    }
                }
            }
        }
        local.to_increment_form(ctx.fields, ctx.dqdx);
        Ok(local)
    }
}

impl NodalGradAlgorithm for InteriorNodalGradAlgorithm {
    fn name(&self) -> &str {
        &self.name
    }

    fn part_name(&self) -> &str {
        &self.part
    }

    fn execute(&self, ctx: &AssemblyContext<'_>, sys: &mut LinearSystem) -> EqSysResult<()> {
        let part = ctx.mesh.require_part(&self.part)?;
        let elems: Vec<&Element> = ctx
            .mesh
            .part_elements(part.id)
            .iter()
            .filter_map(|&e| ctx.mesh.element(e))
            .collect();
        compute_and_scatter(&elems, sys, false, |elem| Self::element_local(ctx, elem))
    }
}
