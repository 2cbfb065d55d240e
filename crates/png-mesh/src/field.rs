//! Nodal field storage keyed by name.

use std::collections::{BTreeSet, HashMap};

use png_core::{NodeId, PartId};

use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;

/// Reusable handle to a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle(usize);

#[derive(Debug, Clone)]
struct FieldData {
    name: String,
    components: usize,
    parts: BTreeSet<PartId>,
    values: Vec<f64>,
}

/// Registry of nodal fields for one rank-local mesh.
///
/// Values are stored for every local node; the part set records where the
/// field is meaningful. Declaring an existing name again with the same
/// component count is idempotent and only extends the part set.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    num_nodes: usize,
    fields: Vec<FieldData>,
    by_name: HashMap<String, FieldHandle>,
}

impl FieldRegistry {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            ..Self::default()
        }
    }

    /// Declare `name` with `components` values per node on `parts`.
    pub fn declare(
        &mut self,
        name: &str,
        components: usize,
        parts: &[PartId],
    ) -> MeshResult<FieldHandle> {
        if let Some(&handle) = self.by_name.get(name) {
            let field = &mut self.fields[handle.0];
            if field.components != components {
                return Err(MeshError::FieldMismatch {
                    name: name.to_string(),
                    expected: field.components,
                    actual: components,
                });
            }
            field.parts.extend(parts.iter().copied());
            return Ok(handle);
        }

        let handle = FieldHandle(self.fields.len());
        self.fields.push(FieldData {
            name: name.to_string(),
            components,
            parts: parts.iter().copied().collect(),
            values: vec![0.0; self.num_nodes * components],
        });
        self.by_name.insert(name.to_string(), handle);
        tracing::debug!(field = name, components, "declared nodal field");
        Ok(handle)
    }

    pub fn handle(&self, name: &str) -> Option<FieldHandle> {
        self.by_name.get(name).copied()
    }

    /// Look up a field by name, failing with `UnknownField`.
    pub fn require(&self, name: &str) -> MeshResult<FieldHandle> {
        self.handle(name).ok_or_else(|| MeshError::UnknownField {
            name: name.to_string(),
        })
    }

    /// Declared field names, in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn name(&self, handle: FieldHandle) -> &str {
        &self.fields[handle.0].name
    }

    pub fn components(&self, handle: FieldHandle) -> usize {
        self.fields[handle.0].components
    }

    /// Parts the field is declared on, sorted.
    pub fn parts(&self, handle: FieldHandle) -> Vec<PartId> {
        self.fields[handle.0].parts.iter().copied().collect()
    }

    pub fn values(&self, handle: FieldHandle) -> &[f64] {
        &self.fields[handle.0].values
    }

    pub fn values_mut(&mut self, handle: FieldHandle) -> &mut [f64] {
        &mut self.fields[handle.0].values
    }

    /// Values of one node.
    pub fn node_value(&self, handle: FieldHandle, node: NodeId) -> &[f64] {
        let f = &self.fields[handle.0];
        let start = node.idx() * f.components;
        &f.values[start..start + f.components]
    }

    pub fn set_node_value(&mut self, handle: FieldHandle, node: NodeId, value: &[f64]) {
        let f = &mut self.fields[handle.0];
        let start = node.idx() * f.components;
        let n = f.components.min(value.len());
        f.values[start..start + n].copy_from_slice(&value[..n]);
    }

    /// Fill a field from a function of node coordinates.
    pub fn fill_with<F>(&mut self, handle: FieldHandle, mesh: &Mesh, f: F)
    where
        F: Fn(&[f64; 3]) -> Vec<f64>,
    {
        for node in mesh.nodes() {
            let v = f(&node.coords);
            self.set_node_value(handle, node.id, &v);
        }
    }

    /// Re-layout every field onto a new mesh, carrying values across by
    /// global node id. Nodes new to `new_mesh` start at zero.
    pub fn remap(&mut self, old_mesh: &Mesh, new_mesh: &Mesh) {
        let n_new = new_mesh.num_nodes();
        for f in &mut self.fields {
            let c = f.components;
            let mut values = vec![0.0; n_new * c];
            for node in new_mesh.nodes() {
                if let Some(old) = old_mesh.local_node(node.global_id) {
                    let src = old.idx() * c;
                    let dst = node.id.idx() * c;
                    values[dst..dst + c].copy_from_slice(&f.values[src..src + c]);
                }
            }
            f.values = values;
        }
        self.num_nodes = n_new;
    }
}
