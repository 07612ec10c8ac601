//! Resolution of parameter sources against the current frame.

use std::collections::HashMap;
use std::f32::consts::PI;

use umbra_core::math::{self, Vec2};

use crate::device::{RenderDevice, TargetId, TextureRef};
use crate::scene::{Camera, RenderContext, RenderOperation};
use crate::types::{Attachment, Viewport};

use super::parameter::{EffectParameter, ParamSource, ParamValue};

/// Time values wrap at this period so long sessions keep float precision.
const TIME_PERIOD: f32 = 5.0 * PI;

/// Everything an effect reads its parameters from, apart from the render
/// operation itself.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub camera: &'a Camera,
    pub render: &'a RenderContext,
    pub viewport: Viewport,
    /// Procedure variables, by name.
    pub variables: Option<&'a HashMap<String, ParamValue>>,
    /// Targets published by earlier passes, by name.
    pub inputs: Option<&'a HashMap<String, TargetId>>,
}

impl<'a> ApplyContext<'a> {
    pub fn new(camera: &'a Camera, render: &'a RenderContext, viewport: Viewport) -> Self {
        Self {
            camera,
            render,
            viewport,
            variables: None,
            inputs: None,
        }
    }

    pub fn with_variables(mut self, variables: &'a HashMap<String, ParamValue>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_inputs(mut self, inputs: &'a HashMap<String, TargetId>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    /// Look up the current value of `param` for `op`.
    ///
    /// Returns `None` when the source has nothing to offer: no light in the
    /// context, an empty texture slot, an unknown variable, a value of the
    /// wrong type, or a texture whose target is gone.
    pub fn resolve(
        &self,
        param: &EffectParameter,
        op: &RenderOperation,
        device: &RenderDevice,
    ) -> Option<ParamValue> {
        let camera = self.camera;
        let material = &op.material;
        let light = self.render.lights.first();

        let value = match &param.source {
            ParamSource::WorldViewProjection => {
                ParamValue::Matrix(camera.projection * camera.view * op.world)
            }
            ParamSource::World => ParamValue::Matrix(op.world),
            ParamSource::WorldView => ParamValue::Matrix(camera.view * op.world),
            ParamSource::View => ParamValue::Matrix(camera.view),
            ParamSource::ViewProjection => ParamValue::Matrix(camera.view_projection()),
            ParamSource::Projection => ParamValue::Matrix(camera.projection),
            ParamSource::InverseView => ParamValue::Matrix(math::inverse_or_identity(&camera.view)),
            ParamSource::InverseProjection => {
                ParamValue::Matrix(math::inverse_or_identity(&camera.projection))
            }
            ParamSource::CameraPosition => ParamValue::Vector3(camera.position),
            ParamSource::CameraForward => ParamValue::Vector3(camera.forward()),
            ParamSource::NearPlane => ParamValue::Float(camera.near),
            ParamSource::FarPlane => ParamValue::Float(camera.far),
            ParamSource::ViewportSize => ParamValue::Vector2(Vec2::new(
                self.viewport.width as f32,
                self.viewport.height as f32,
            )),
            ParamSource::InverseViewportSize => ParamValue::Vector2(Vec2::new(
                1.0 / self.viewport.width.max(1) as f32,
                1.0 / self.viewport.height.max(1) as f32,
            )),
            ParamSource::Time => ParamValue::Float(self.render.time.rem_euclid(TIME_PERIOD)),
            ParamSource::LightDirection => ParamValue::Vector3(light?.direction),
            ParamSource::LightAmbient => ParamValue::Vector4(light?.ambient.to_vec4()),
            ParamSource::LightDiffuse => ParamValue::Vector4(light?.diffuse.to_vec4()),
            ParamSource::LightSpecular => ParamValue::Vector4(light?.specular.to_vec4()),
            ParamSource::MaterialAmbient => ParamValue::Vector4(material.ambient.to_vec4()),
            ParamSource::MaterialDiffuse => ParamValue::Vector4(material.diffuse.to_vec4()),
            ParamSource::MaterialSpecular => ParamValue::Vector4(material.specular.to_vec4()),
            ParamSource::MaterialEmissive => ParamValue::Vector4(material.emissive.to_vec4()),
            ParamSource::MaterialPower => ParamValue::Float(material.power),
            ParamSource::MaterialTexture(slot) => {
                let texture = material.texture(*slot)?;
                texture_alive(device, texture)?
            }
            ParamSource::MaterialCustom(name) => *material.custom(name)?,
            ParamSource::Variable(name) => *self.variables?.get(name)?,
            ParamSource::Input { target, attachment } => {
                let id = *self.inputs?.get(target)?;
                texture_alive(
                    device,
                    TextureRef {
                        target: id,
                        attachment: *attachment,
                    },
                )?
            }
        };

        if value.ty() != param.ty {
            log::debug!(
                "Parameter '{}': {:?} produced {:?}, expected {:?}",
                param.name,
                param.source,
                value.ty(),
                param.ty
            );
            return None;
        }
        Some(value)
    }
}

fn texture_alive(device: &RenderDevice, texture: TextureRef) -> Option<ParamValue> {
    let target = device.target(texture.target)?;
    if texture.attachment == Attachment::Depth && !target.has_depth() {
        return None;
    }
    Some(ParamValue::Texture(texture))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::effects::ParamType;
    use crate::scene::{Light, Material};
    use crate::types::{RenderTargetDescriptor, TextureFormat};
    use std::sync::Arc;
    use umbra_core::math::{Mat4, Vec3};
    use umbra_core::mesh::generators;

    fn op() -> RenderOperation {
        RenderOperation::new(Arc::new(generators::cube(1.0)))
    }

    fn param(source: ParamSource) -> EffectParameter {
        EffectParameter::auto("p", source)
    }

    #[test]
    fn test_matrix_products() {
        let device = RenderDevice::new(Box::new(NullBackend::default()));
        let camera = Camera::perspective(
            Vec3::new(0.0, 2.0, 5.0),
            Vec3::zeros(),
            1.0,
            1.5,
            0.1,
            50.0,
        );
        let render = RenderContext::new();
        let ctx = ApplyContext::new(&camera, &render, Viewport::new(300, 200));
        let world = math::mat4_from_translation(Vec3::new(1.0, 0.0, 0.0));
        let op = op().with_world(world);

        let wvp = ctx.resolve(&param(ParamSource::WorldViewProjection), &op, &device);
        assert_eq!(
            wvp,
            Some(ParamValue::Matrix(camera.projection * camera.view * world))
        );
        let inv = ctx.resolve(&param(ParamSource::InverseView), &op, &device);
        let Some(ParamValue::Matrix(inv)) = inv else {
            panic!("expected matrix");
        };
        assert!((inv * camera.view - Mat4::identity()).norm() < 1e-4);
    }

    #[test]
    fn test_viewport_and_time() {
        let device = RenderDevice::new(Box::new(NullBackend::default()));
        let camera = Camera::default();
        let render = RenderContext::new().with_time(TIME_PERIOD + 1.0);
        let ctx = ApplyContext::new(&camera, &render, Viewport::new(200, 100));
        let op = op();

        assert_eq!(
            ctx.resolve(&param(ParamSource::InverseViewportSize), &op, &device),
            Some(ParamValue::Vector2(Vec2::new(0.005, 0.01)))
        );
        let Some(ParamValue::Float(t)) = ctx.resolve(&param(ParamSource::Time), &op, &device)
        else {
            panic!("expected float");
        };
        assert!((t - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_lights_need_a_light() {
        let device = RenderDevice::new(Box::new(NullBackend::default()));
        let camera = Camera::default();
        let dark = RenderContext::new();
        let ctx = ApplyContext::new(&camera, &dark, Viewport::new(8, 8));
        assert_eq!(ctx.resolve(&param(ParamSource::LightDirection), &op(), &device), None);

        let lit = RenderContext::new().with_light(Light::directional(Vec3::new(0.0, -1.0, 0.0)));
        let ctx = ApplyContext::new(&camera, &lit, Viewport::new(8, 8));
        assert_eq!(
            ctx.resolve(&param(ParamSource::LightDirection), &op(), &device),
            Some(ParamValue::Vector3(Vec3::new(0.0, -1.0, 0.0)))
        );
    }

    #[test]
    fn test_dynamic_sources_type_checked() {
        let device = RenderDevice::new(Box::new(NullBackend::default()));
        let camera = Camera::default();
        let render = RenderContext::new();
        let mut variables = HashMap::new();
        variables.insert("threshold".to_string(), ParamValue::Float(0.8));
        let ctx = ApplyContext::new(&camera, &render, Viewport::new(8, 8))
            .with_variables(&variables);

        let as_float = EffectParameter::new(
            "t",
            ParamType::Float,
            ParamSource::Variable("threshold".into()),
        );
        let as_vec = EffectParameter::new(
            "t",
            ParamType::Vector4,
            ParamSource::Variable("threshold".into()),
        );
        assert_eq!(ctx.resolve(&as_float, &op(), &device), Some(ParamValue::Float(0.8)));
        assert_eq!(ctx.resolve(&as_vec, &op(), &device), None);

        let material = Material::new().with_custom("glow", ParamValue::Int(3));
        let op = op().with_material(Arc::new(material));
        let glow = EffectParameter::new("g", ParamType::Int, ParamSource::MaterialCustom("glow".into()));
        assert_eq!(ctx.resolve(&glow, &op, &device), Some(ParamValue::Int(3)));
    }

    #[test]
    fn test_inputs_resolve_live_targets_only() {
        let mut device = RenderDevice::new(Box::new(NullBackend::default()));
        let id = device
            .create_render_target(&RenderTargetDescriptor::new(8, 8, TextureFormat::Rgba8Unorm))
            .unwrap();
        let camera = Camera::default();
        let render = RenderContext::new();
        let mut inputs = HashMap::new();
        inputs.insert("scene".to_string(), id);
        let ctx = ApplyContext::new(&camera, &render, Viewport::new(8, 8)).with_inputs(&inputs);

        let color = param(ParamSource::Input {
            target: "scene".into(),
            attachment: Attachment::Color,
        });
        let depth = param(ParamSource::Input {
            target: "scene".into(),
            attachment: Attachment::Depth,
        });
        assert_eq!(
            ctx.resolve(&color, &op(), &device),
            Some(ParamValue::Texture(TextureRef {
                target: id,
                attachment: Attachment::Color
            }))
        );
        // no depth buffer on this target
        assert_eq!(ctx.resolve(&depth, &op(), &device), None);

        device.release_render_target(id);
        assert_eq!(ctx.resolve(&color, &op(), &device), None);
    }
}
