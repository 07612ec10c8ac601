//! Material data read by material parameter sources.

use std::collections::HashMap;

use umbra_core::Color;

use crate::device::TextureRef;
use crate::effects::{MATERIAL_TEXTURE_SLOTS, ParamValue};

/// Surface description of a render operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub emissive: Color,
    /// Specular exponent.
    pub power: f32,
    textures: Vec<Option<TextureRef>>,
    custom: HashMap<String, ParamValue>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Color::rgb(0.2, 0.2, 0.2),
            diffuse: Color::WHITE,
            specular: Color::BLACK,
            emissive: Color::BLACK,
            power: 1.0,
            textures: Vec::new(),
            custom: HashMap::new(),
        }
    }
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diffuse(mut self, color: Color) -> Self {
        self.diffuse = color;
        self
    }

    pub fn with_emissive(mut self, color: Color) -> Self {
        self.emissive = color;
        self
    }

    pub fn with_specular(mut self, color: Color, power: f32) -> Self {
        self.specular = color;
        self.power = power;
        self
    }

    /// Put a texture into a slot. Slots past the last one are ignored.
    pub fn with_texture(mut self, slot: u8, texture: TextureRef) -> Self {
        if slot >= MATERIAL_TEXTURE_SLOTS {
            log::warn!("Material: texture slot {slot} out of range");
            return self;
        }
        let slot = slot as usize;
        if self.textures.len() <= slot {
            self.textures.resize(slot + 1, None);
        }
        self.textures[slot] = Some(texture);
        self
    }

    pub fn with_custom(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.custom.insert(name.into(), value);
        self
    }

    pub fn texture(&self, slot: u8) -> Option<TextureRef> {
        self.textures.get(slot as usize).copied().flatten()
    }

    pub fn custom(&self, name: &str) -> Option<&ParamValue> {
        self.custom.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_values() {
        let m = Material::new().with_custom("glow", ParamValue::Float(2.0));
        assert_eq!(m.custom("glow"), Some(&ParamValue::Float(2.0)));
        assert_eq!(m.custom("missing"), None);
    }

    #[test]
    fn test_empty_slots() {
        let m = Material::new();
        assert_eq!(m.texture(0), None);
        assert_eq!(m.texture(15), None);
    }
}
