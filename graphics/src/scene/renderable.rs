//! Render operations and the renderable interface.

use std::sync::Arc;

use umbra_core::Color;
use umbra_core::math::{Mat4, Vec3};
use umbra_core::mesh::GeometryData;

use crate::effects::Effect;

use super::material::Material;

/// One drawable piece of a renderable: geometry, transform, surface and
/// optionally the effect to draw it with.
#[derive(Debug, Clone)]
pub struct RenderOperation {
    pub geometry: Arc<GeometryData>,
    pub world: Mat4,
    pub material: Arc<Material>,
    /// Effect used when the pass has no override.
    pub effect: Option<Arc<Effect>>,
}

impl RenderOperation {
    pub fn new(geometry: Arc<GeometryData>) -> Self {
        Self {
            geometry,
            world: Mat4::identity(),
            material: Arc::new(Material::default()),
            effect: None,
        }
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = material;
        self
    }

    pub fn with_effect(mut self, effect: Arc<Effect>) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// The render operations a renderable produces for one LOD level.
#[derive(Debug, Clone, Default)]
pub struct RenderOperationBuffer {
    operations: Vec<RenderOperation>,
}

impl RenderOperationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: RenderOperation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderOperation> {
        self.operations.iter()
    }
}

impl From<Vec<RenderOperation>> for RenderOperationBuffer {
    fn from(operations: Vec<RenderOperation>) -> Self {
        Self { operations }
    }
}

impl FromIterator<RenderOperation> for RenderOperationBuffer {
    fn from_iter<I: IntoIterator<Item = RenderOperation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RenderOperationBuffer {
    type Item = &'a RenderOperation;
    type IntoIter = std::slice::Iter<'a, RenderOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// A scene object that scene passes can draw.
pub trait Renderable {
    /// Render operations for a level of detail. Level 0 is the default.
    ///
    /// `None` means the object has nothing to draw at this level.
    fn render_operations(&self, level: u32) -> Option<RenderOperationBuffer>;

    /// Bit `n` set means selector `n` picks this object.
    fn selector_mask(&self) -> u64 {
        u64::MAX
    }

    /// Name used in logs.
    fn name(&self) -> &str {
        "renderable"
    }
}

/// A directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Direction the light travels, normalized.
    pub direction: Vec3,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
}

impl Light {
    pub fn directional(direction: Vec3) -> Self {
        Self {
            direction: direction.try_normalize(1e-6).unwrap_or_else(|| -Vec3::y()),
            ambient: Color::rgb(0.1, 0.1, 0.1),
            diffuse: Color::WHITE,
            specular: Color::WHITE,
        }
    }

    pub fn with_diffuse(mut self, color: Color) -> Self {
        self.diffuse = color;
        self
    }
}

/// Frame state every pass of a procedure sees.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub lights: Vec<Light>,
    /// Seconds since start.
    pub time: f32,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_direction_normalized() {
        let light = Light::directional(Vec3::new(0.0, -4.0, 0.0));
        assert!((light.direction.norm() - 1.0).abs() < 1e-6);
        let light = Light::directional(Vec3::zeros());
        assert_eq!(light.direction, -Vec3::y());
    }

    #[test]
    fn test_buffer_collects() {
        let geo = Arc::new(umbra_core::mesh::generators::cube(1.0));
        let buffer: RenderOperationBuffer =
            (0..3).map(|_| RenderOperation::new(geo.clone())).collect();
        assert_eq!(buffer.len(), 3);
        assert_eq!((&buffer).into_iter().count(), 3);
    }
}
