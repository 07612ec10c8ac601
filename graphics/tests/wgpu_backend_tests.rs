//! wgpu backend tests.
//!
//! These need a real adapter (or a software one such as lavapipe) and skip
//! when none is found.
//!
//! ```bash
//! cargo test -p umbra-graphics --test wgpu_backend_tests
//! ```

#![cfg(feature = "wgpu-backend")]

mod common;

use common::{Backend, TestContext, TestObject, cameras, render_context};
use umbra_graphics::effects::library::names;
use umbra_graphics::{
    BindTarget, ClearFlags, ClearValue, GraphicsError, RenderTargetDescriptor, Renderable,
    TextureFormat,
};

fn context() -> Option<TestContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = TestContext::new(Backend::Wgpu);
    if ctx.is_none() {
        eprintln!("No wgpu adapter available, skipping");
    }
    ctx
}

#[test]
fn test_capabilities_reported() {
    let Some(ctx) = context() else {
        return;
    };
    assert_eq!(ctx.device.backend_name(), "wgpu");
    let caps = ctx.device.capabilities();
    assert!(caps.supports_render_target(1, TextureFormat::Rgba8Unorm, None));
    assert!(caps.supports_shader_model(3, 0));
    // never a depth format in the color list
    assert!(caps.color_formats.iter().all(|s| !s.format.is_depth_stencil()));
    assert_eq!(ctx.device.default_color_format(), TextureFormat::Rgba8Unorm);
}

#[test]
fn test_target_lifecycle() {
    let Some(mut ctx) = context() else {
        return;
    };
    let desc = RenderTargetDescriptor::new(128, 64, TextureFormat::Rgba8Unorm)
        .with_depth(TextureFormat::Depth24PlusStencil8)
        .with_label("offscreen");
    let id = ctx.device.create_render_target(&desc).unwrap();

    ctx.device.begin_frame().unwrap();
    ctx.device.bind_render_target(BindTarget::Target(id)).unwrap();
    ctx.device
        .clear(ClearFlags::COLOR | ClearFlags::DEPTH, &ClearValue::default())
        .unwrap();
    ctx.device.bind_render_target(BindTarget::BackBuffer).unwrap();
    ctx.device.end_frame().unwrap();

    assert!(ctx.device.release_render_target(id));
    assert_eq!(ctx.device.render_target_count(), 0);
}

#[test]
fn test_unsupported_sample_count_rejected() {
    let Some(mut ctx) = context() else {
        return;
    };
    let desc = RenderTargetDescriptor::new(16, 16, TextureFormat::Rgba8Unorm).with_samples(3);
    assert!(matches!(
        ctx.device.create_render_target(&desc),
        Err(GraphicsError::UnsupportedFormat { samples: 3, .. })
    ));
}

#[test]
fn test_shadow_bloom_across_resize() {
    let Some(mut ctx) = context() else {
        return;
    };
    let mut procedure = ctx.shadow_bloom().unwrap();
    if !procedure.is_available() {
        eprintln!(
            "shadow_bloom unavailable on this adapter: {:?}",
            procedure.unavailable_reason()
        );
        return;
    }
    let lit = ctx.registry.effect(names::LIT).unwrap();
    let objects = [
        TestObject::cube("left", -1.5, lit.clone()),
        TestObject::cube("right", 1.5, lit),
    ];
    let renderables: Vec<&dyn Renderable> = objects.iter().map(|o| o as &dyn Renderable).collect();

    for _ in 0..2 {
        ctx.device.begin_frame().unwrap();
        let report = procedure
            .invoke(&mut ctx.device, &cameras(), &renderables, &render_context())
            .unwrap();
        ctx.device.end_frame().unwrap();
        assert_eq!(report.total_drawn(), 8);
        assert_eq!(report.total_skipped(), 0);
    }

    ctx.device.set_viewport(200, 100).unwrap();
    assert!(procedure.check_dimensions(&mut ctx.device).unwrap());
    let bloom = procedure.render_target(&ctx.device, "bloom").unwrap();
    assert_eq!((bloom.width(), bloom.height()), (100, 50));

    ctx.device.begin_frame().unwrap();
    let report = procedure
        .invoke(&mut ctx.device, &cameras(), &renderables, &render_context())
        .unwrap();
    ctx.device.end_frame().unwrap();
    assert_eq!(report.total_drawn(), 8);
}
