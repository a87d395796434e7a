use crate::errors::{Error, Result};

/// Accumulates per-vertex float components for upload into an array buffer.
///
/// Components are kept in append order; nothing is computed on them, so
/// [`Self::export_bytes`] reproduces the appended values bit for bit.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexData {
    components: Vec<f32>,
    arity: usize,
}

impl Default for VertexData {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexData {
    /// Three components (xyz) per vertex.
    pub fn new() -> Self {
        Self::with_arity(3)
    }

    /// `arity` components per vertex, e.g. 6 for interleaved xyz + rgb.
    pub fn with_arity(arity: usize) -> Self {
        Self {
            components: Vec::new(),
            arity: arity.max(1),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn push(&mut self, component: f32) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn append_vertex(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.components.extend_from_slice(&[x, y, z]);
        self
    }

    /// A vertex on the z = 0 plane.
    pub fn append_xy(&mut self, x: f32, y: f32) -> &mut Self {
        self.append_vertex(x, y, 0.0)
    }

    pub fn rgb(&mut self, r: f32, g: f32, b: f32) -> &mut Self {
        self.components.extend_from_slice(&[r, g, b]);
        self
    }

    pub fn rgba(&mut self, r: f32, g: f32, b: f32, a: f32) -> &mut Self {
        self.components.extend_from_slice(&[r, g, b, a]);
        self
    }

    pub fn uv(&mut self, u: f32, v: f32) -> &mut Self {
        self.components.extend_from_slice(&[u, v]);
        self
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.components
    }

    /// Number of components, not vertices.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.components.len() / self.arity
    }

    pub fn clear(&mut self) {
        self.components.clear();
    }

    /// Little-endian, tightly packed 32-bit floats. Does not consume the data.
    pub fn export_bytes(&self) -> Result<Vec<u8>> {
        if self.components.len() % self.arity != 0 {
            return Err(Error::MalformedData {
                components: self.components.len(),
                arity: self.arity,
            });
        }
        Ok(self
            .components
            .iter()
            .flat_map(|c| c.to_le_bytes())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn triangle_is_36_bytes() {
        let bytes = VertexData::new()
            .append_vertex(0.0, 1.0, 0.0)
            .append_vertex(-1.0, -1.0, 0.0)
            .append_vertex(1.0, -1.0, 0.0)
            .export_bytes()
            .unwrap();
        assert_eq!(bytes.len(), 36);
        assert_eq!(
            decode(&bytes),
            vec![0.0, 1.0, 0.0, -1.0, -1.0, 0.0, 1.0, -1.0, 0.0]
        );
    }

    #[test]
    fn export_reproduces_awkward_values_exactly() {
        let values = [0.1f32, -0.0, f32::MIN_POSITIVE, 1.0e-38, f32::MAX, 1.0 / 3.0, -7.25, 1.5e7, 2.0];
        let mut data = VertexData::new();
        for chunk in values.chunks(3) {
            data.append_vertex(chunk[0], chunk[1], chunk[2]);
        }
        let decoded = decode(&data.export_bytes().unwrap());
        let bits = |v: &[f32]| v.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&decoded), bits(&values));
    }

    #[test]
    fn export_is_repeatable() {
        let mut data = VertexData::new();
        data.append_xy(0.5, 0.25);
        assert_eq!(data.export_bytes().unwrap(), data.export_bytes().unwrap());
        assert_eq!(data.as_slice(), &[0.5, 0.25, 0.0]);
        data.clear();
        assert!(data.is_empty());
        assert!(data.export_bytes().unwrap().is_empty());
    }

    #[test]
    fn partial_vertex_is_malformed() {
        let mut data = VertexData::new();
        data.append_vertex(1.0, 2.0, 3.0).push(4.0);
        assert!(matches!(
            data.export_bytes(),
            Err(Error::MalformedData {
                components: 4,
                arity: 3
            })
        ));
    }

    #[test]
    fn interleaved_position_and_color() {
        let mut data = VertexData::with_arity(6);
        data.append_vertex(-0.5, -0.5, 0.0).rgb(1.0, 0.0, 0.0);
        data.append_vertex(0.5, -0.5, 0.0).rgb(0.0, 1.0, 0.0);
        assert_eq!(data.vertex_count(), 2);
        assert_eq!(data.export_bytes().unwrap().len(), 48);

        data.uv(0.0, 1.0);
        assert!(data.export_bytes().is_err());
    }

    #[test]
    fn rgba_and_uv_rows() {
        let mut data = VertexData::with_arity(6);
        data.rgba(1.0, 1.0, 1.0, 0.5).uv(0.25, 0.75);
        assert_eq!(data.as_slice(), &[1.0, 1.0, 1.0, 0.5, 0.25, 0.75]);
        assert_eq!(data.arity(), 6);
    }
}
