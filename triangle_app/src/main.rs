//! Minimal engine demo: one staged-upload triangle spinning in place
//!
//! Run from the workspace root so the compiled shaders under
//! `target/shaders/` are found (build with `VULKAN_SDK` set).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use kestrel_engine::foundation::math::perspective_vk;
use kestrel_engine::prelude::*;

fn triangle_vertices() -> Vec<RenderingVertex> {
    vec![
        RenderingVertex {
            pos: [0.0, -0.5, 0.0],
            color: [1.0, 0.0, 0.0],
            texcoord: [0.5, 0.0],
            normal: [0.0, 0.0, 1.0],
        },
        RenderingVertex {
            pos: [0.5, 0.5, 0.0],
            color: [0.0, 1.0, 0.0],
            texcoord: [1.0, 1.0],
            normal: [0.0, 0.0, 1.0],
        },
        RenderingVertex {
            pos: [-0.5, 0.5, 0.0],
            color: [0.0, 0.0, 1.0],
            texcoord: [0.0, 1.0],
            normal: [0.0, 0.0, 1.0],
        },
    ]
}

fn view_projection(width: u32, height: u32) -> Mat4 {
    let aspect = width as f32 / height as f32;
    let projection = perspective_vk(aspect, std::f32::consts::FRAC_PI_4, 0.1, 100.0);
    let view = Mat4::look_at_rh(
        &nalgebra::Point3::new(0.0, 0.0, 2.0),
        &nalgebra::Point3::origin(),
        &Vec3::new(0.0, -1.0, 0.0),
    );
    projection * view
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    kestrel_engine::foundation::logging::init_with_default("info");

    let mut config = EngineConfig::from_file("engine.toml").unwrap_or_default();
    config.renderer.shader_dir = "target/shaders".to_string();

    let mut engine = VulkanRenderingEngine::new(&config)?;

    let shader = ShaderDefinition {
        vertex: config.shader_path("default_vert.spv"),
        fragment: config.shader_path("unlit_frag.spv"),
    };

    let triangle = Rc::new(RefCell::new(Renderer::new_mesh(
        &mut engine,
        triangle_vertices(),
        shader,
        None,
    )?));

    let extent = engine.swapchain_extent();
    triangle
        .borrow_mut()
        .set_view_projection(view_projection(extent.width, extent.height));

    let callback_triangle = Rc::clone(&triangle);
    engine.set_render_callback(Box::new(move |cmd, frame, ctx| {
        if let Err(e) = callback_triangle.borrow_mut().render(ctx, cmd, frame) {
            log::error!("Failed to render triangle: {e}");
        }
    }));

    let start = Instant::now();
    while !engine.window().should_close() {
        for (_, event) in engine.window_mut().poll_and_collect_events() {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    engine.signal_framebuffer_resize(width as u32, height as u32);
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    engine.window_mut().set_should_close(true);
                }
                _ => {}
            }
        }

        let angle = start.elapsed().as_secs_f32();
        let extent = engine.swapchain_extent();
        triangle.borrow_mut().update_transform(
            Transform {
                rotation: Vec3::new(0.0, angle, 0.0),
                ..Transform::default()
            },
            Transform::default(),
            extent,
        );
        triangle
            .borrow_mut()
            .set_view_projection(view_projection(extent.width, extent.height));

        engine.draw_frame()?;
    }

    engine.sync_device_wait_idle()?;
    // Renderers hold pipeline and buffer references; release them before
    // the engine tears the device down
    drop(triangle);

    Ok(())
}
