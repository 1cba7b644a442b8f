//! Headless pipeline tests.
//!
//! Each test returns early when the machine has no usable GPU adapter.

use attractor::gpu::pipeline::{AttractorPipeline, Pass, Phase, RenderUniform, UpdateUniform};
use attractor::math::CameraMatrices;
use attractor::prelude::*;
use attractor::program::UniformHandle;
use attractor::StateDimensions;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const SIGMA: f32 = 10.0;

fn context() -> Option<GpuContext> {
    let context = match pollster::block_on(GpuContext::headless()) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("skipping GPU test: {}", err);
            return None;
        }
    };
    if let Err(err) = context.check_capabilities() {
        eprintln!("skipping GPU test: {}", err);
        return None;
    }
    Some(context)
}

fn offscreen(context: &GpuContext, size: SurfaceSize) -> wgpu::TextureView {
    context
        .device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

/// Render target that can be copied back to the CPU.
fn capture_target(context: &GpuContext, size: SurfaceSize) -> wgpu::Texture {
    context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Capture Target"),
        size: wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// RGBA8 pixels of `texture`, row by row.
fn read_pixels(context: &GpuContext, texture: &wgpu::Texture, size: SurfaceSize) -> Vec<[u8; 4]> {
    let unpadded = size.width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let staging = context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Capture Readback"),
        size: padded as u64 * size.height as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size.height),
            },
        },
        texture.size(),
    );
    context.queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = context.device.poll(wgpu::Maintain::Wait);
    rx.recv().unwrap().unwrap();

    let data = slice.get_mapped_range();
    data.chunks(padded as usize)
        .flat_map(|row| {
            row[..unpadded as usize]
                .chunks_exact(4)
                .map(|px| [px[0], px[1], px[2], px[3]])
        })
        .collect()
}

fn is_lit(pixel: [u8; 4]) -> bool {
    pixel[0] > 0 || pixel[1] > 0 || pixel[2] > 0
}

/// Pixel covered by a state position under `view_proj`, if on screen.
fn project(position: [f32; 4], view_proj: Mat4, size: SurfaceSize) -> Option<(i64, i64)> {
    // Same axis mapping as the render vertex stage
    let world = Vec4::new(position[0], position[2] - 25.0, position[1], 1.0);
    let clip = view_proj * world;
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip / clip.w;
    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || ndc.z < 0.0 || ndc.z > 1.0 {
        return None;
    }
    let x = ((ndc.x + 1.0) * 0.5 * size.width as f32) as i64;
    let y = ((1.0 - ndc.y) * 0.5 * size.height as f32) as i64;
    Some((x, y))
}

fn small_params(trail_size: u32, vertex_size: u32) -> ParameterSnapshot {
    ParameterSnapshot {
        trail_size,
        vertex_size,
        ..Default::default()
    }
}

fn session(context: &GpuContext, params: &ParameterSnapshot) -> Session {
    Session::new(context, &ShaderLibrary::builtin(), TARGET_FORMAT, params, Camera::new()).unwrap()
}

fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846ca68b);
    x ^= x >> 16;
    x
}

fn unit(n: u32) -> f32 {
    (hash(n) & 0x00ff_ffff) as f32 / 16_777_216.0
}

fn expected_seed(particle: u32) -> [f32; 3] {
    let base = particle * 3;
    [
        1.0 + (unit(base) - 0.5) * 10.0,
        1.0 + (unit(base + 1) - 0.5) * 10.0,
        25.0 + (unit(base + 2) - 0.5) * 10.0,
    ]
}

fn euler(p: [f32; 3], params: &ParameterSnapshot) -> [f32; 3] {
    let [x, y, z] = p;
    let dt = params.step();
    [
        x + SIGMA * (y - x) * dt,
        y + (x * (params.rho - z) - y) * dt,
        z + (x * y - params.beta * z) * dt,
    ]
}

fn assert_close(actual: [f32; 4], expected: [f32; 3], tolerance: f32) {
    for i in 0..3 {
        assert!(
            (actual[i] - expected[i]).abs() <= tolerance,
            "component {}: {} vs {}",
            i,
            actual[i],
            expected[i]
        );
    }
}

#[test]
fn test_seed_is_hash_of_particle_index() {
    let Some(context) = context() else { return };
    let params = small_params(4, 16);
    let session = session(&context, &params);
    assert_eq!(session.phase(), Phase::Seeded);

    let state = session.read_state().unwrap();
    for particle in 0..16 {
        let seed = expected_seed(particle);
        for slot in 0..4 {
            let texel = state.texel(slot, particle).unwrap();
            assert_close(texel, seed, 1e-4);
            assert_eq!(texel[3], 1.0);
        }
    }
}

#[test]
fn test_seed_is_reproducible_across_sessions() {
    let Some(context) = context() else { return };
    let params = small_params(8, 32);
    let a = session(&context, &params).read_state().unwrap();
    let b = session(&context, &params).read_state().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_update_steps_head_and_shifts_history() {
    let Some(context) = context() else { return };
    let params = small_params(4, 8);
    let mut session = session(&context, &params);
    let seeded = session.read_state().unwrap();

    session.update(&params).unwrap();
    let stepped = session.read_state().unwrap();

    for particle in 0..8 {
        let seed = seeded.texel(0, particle).unwrap();
        assert_close(stepped.texel(0, particle).unwrap(), euler([seed[0], seed[1], seed[2]], &params), 1e-3);
        for slot in 1..4 {
            assert_eq!(stepped.texel(slot, particle), seeded.texel(slot - 1, particle));
        }
    }
}

#[test]
fn test_identical_runs_are_identical() {
    let Some(context) = context() else { return };
    let params = small_params(16, 16);
    let size = SurfaceSize::new(64, 64);
    let view = offscreen(&context, size);

    let mut a = session(&context, &params);
    let mut b = session(&context, &params);
    for _ in 0..50 {
        a.frame(&params, &view, size).unwrap();
        b.frame(&params, &view, size).unwrap();
    }
    assert_eq!(a.read_state().unwrap(), b.read_state().unwrap());
}

#[test]
fn test_classic_parameters_stay_bounded() {
    let Some(context) = context() else { return };
    let params = small_params(2, 16);
    let mut session = session(&context, &params);

    for step in 0..10_000 {
        session.update(&params).unwrap();
        if step % 1000 == 999 {
            let _ = context.device.poll(wgpu::Maintain::Wait);
        }
    }

    let state = session.read_state().unwrap();
    for head in state.heads() {
        assert!(head.iter().all(|v| v.is_finite()), "non-finite state {:?}", head);
        assert!(head[0].abs() < 100.0 && head[1].abs() < 100.0, "escaped: {:?}", head);
        assert!(head[2] > -10.0 && head[2] < 100.0, "escaped: {:?}", head);
    }
}

#[test]
fn test_surface_resize_keeps_state_dimensions() {
    let Some(context) = context() else { return };
    let params = small_params(8, 8);
    let mut session = session(&context, &params);
    let dims = session.dimensions();

    for size in [SurfaceSize::new(320, 240), SurfaceSize::new(97, 541), SurfaceSize::new(1, 1)] {
        let view = offscreen(&context, size);
        session.frame(&params, &view, size).unwrap();
        assert_eq!(session.dimensions(), dims);
    }
}

#[test]
fn test_dimension_change_reseeds_state() {
    let Some(context) = context() else { return };
    let size = SurfaceSize::new(32, 32);
    let view = offscreen(&context, size);
    let mut session = session(&context, &small_params(4, 4));

    let grown = small_params(6, 10);
    session.frame(&grown, &view, size).unwrap();
    assert_eq!(session.dimensions(), StateDimensions::new(6, 10, u32::MAX).unwrap());
    assert_eq!(session.phase(), Phase::Updated);

    // One step after reseeding: slot 1 holds the seed again
    let state = session.read_state().unwrap();
    for particle in 0..10 {
        assert_close(state.texel(1, particle).unwrap(), expected_seed(particle), 1e-4);
    }
}

#[test]
fn test_oversized_dimensions_are_rejected() {
    let Some(context) = context() else { return };
    let max = context.max_texture_dimension();
    let result = Session::new(
        &context,
        &ShaderLibrary::builtin(),
        TARGET_FORMAT,
        &small_params(max + 1, 4),
        Camera::new(),
    );
    assert!(matches!(result, Err(SessionError::InvalidDimensions { .. })));

    let mut session = session(&context, &small_params(4, 4));
    assert!(matches!(
        session.update(&small_params(4, 0)),
        Err(SessionError::InvalidDimensions { .. })
    ));
}

#[test]
fn test_passes_enforce_order() {
    let Some(context) = context() else { return };
    let dims = StateDimensions::new(4, 4, context.max_texture_dimension()).unwrap();
    let params = small_params(4, 4);
    let size = SurfaceSize::new(16, 16);
    let view = offscreen(&context, size);
    let view_proj = Camera::new().matrices(1.0).view_projection;

    let mut pipeline = AttractorPipeline::new(
        &context.device,
        &context.queue,
        &ShaderLibrary::builtin(),
        TARGET_FORMAT,
        dims,
    )
    .unwrap();
    assert_eq!(pipeline.phase(), Phase::Uninitialized);

    assert!(matches!(
        pipeline.update(&params),
        Err(SessionError::PassOutOfOrder { pass: Pass::Update, phase: Phase::Uninitialized })
    ));
    assert!(matches!(
        pipeline.render(&view, size, view_proj),
        Err(SessionError::PassOutOfOrder { pass: Pass::Render, .. })
    ));

    pipeline.initialize().unwrap();
    assert!(matches!(
        pipeline.initialize(),
        Err(SessionError::PassOutOfOrder { pass: Pass::Initialize, phase: Phase::Seeded })
    ));
    assert!(matches!(
        pipeline.render(&view, size, view_proj),
        Err(SessionError::PassOutOfOrder { pass: Pass::Render, phase: Phase::Seeded })
    ));

    pipeline.update(&params).unwrap();
    pipeline.render(&view, size, view_proj).unwrap();
    assert_eq!(pipeline.phase(), Phase::Updated);
}

#[test]
fn test_roles_alternate_every_pass() {
    let Some(context) = context() else { return };
    let params = small_params(4, 4);
    let dims = StateDimensions::new(4, 4, context.max_texture_dimension()).unwrap();
    let mut pipeline = AttractorPipeline::new(
        &context.device,
        &context.queue,
        &ShaderLibrary::builtin(),
        TARGET_FORMAT,
        dims,
    )
    .unwrap();

    let first = pipeline.state().read_index();
    pipeline.initialize().unwrap();
    let mut expected = first ^ 1;
    assert_eq!(pipeline.state().read_index(), expected);

    for _ in 0..5 {
        pipeline.update(&params).unwrap();
        expected ^= 1;
        assert_eq!(pipeline.state().read_index(), expected);
        assert!(!std::ptr::eq(pipeline.state().read(), pipeline.state().write()));
    }
}

#[test]
fn test_broken_shader_aborts_setup() {
    let Some(context) = context() else { return };
    let shaders = ShaderLibrary::builtin().with_source(ShaderName::UpdateFragment, "@fragment fn fs_main(");
    let result = Session::new(&context, &shaders, TARGET_FORMAT, &small_params(4, 4), Camera::new());
    assert!(matches!(
        result,
        Err(SessionError::Shader(ShaderError::Compile { .. }))
    ));

    let missing = ShaderLibrary::empty();
    let result = Session::new(&context, &missing, TARGET_FORMAT, &small_params(4, 4), Camera::new());
    assert!(matches!(
        result,
        Err(SessionError::Shader(ShaderError::MissingSource(_)))
    ));
}

#[test]
fn test_scheduler_ticks_until_stopped() {
    let Some(context) = context() else { return };
    let params = small_params(4, 4);
    let size = SurfaceSize::new(32, 32);
    let view = offscreen(&context, size);
    let mut session = session(&context, &params);

    let mut scheduler = FrameScheduler::new(params);
    for _ in 0..3 {
        assert_eq!(scheduler.tick(&mut session, &view, size).unwrap(), TickOutcome::Continue);
    }
    assert_eq!(scheduler.stats().frame(), 3);

    scheduler.stop_handle().stop();
    assert_eq!(scheduler.tick(&mut session, &view, size).unwrap(), TickOutcome::Stopped);
    assert_eq!(scheduler.stats().frame(), 3);
}

#[test]
fn test_render_draws_each_trail_where_its_head_projects() {
    let Some(context) = context() else { return };
    let params = small_params(32, 64);
    let size = SurfaceSize::new(128, 128);
    let target = capture_target(&context, size);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut session = session(&context, &params);
    for _ in 0..16 {
        session.update(&params).unwrap();
    }
    assert!(matches!(
        session.pipeline().render_handle(RenderUniform::ViewProj),
        UniformHandle::Value { .. }
    ));
    assert!(matches!(
        session.pipeline().render_handle(RenderUniform::PositionTexture),
        UniformHandle::Texture { .. }
    ));

    let matrices = session.camera().matrices(size.aspect());
    session.render(&view, size, &matrices).unwrap();
    let pixels = read_pixels(&context, &target, size);
    assert!(pixels.iter().any(|&p| is_lit(p)), "render left the target black");

    let state = session.read_state().unwrap();
    let reach = 3;
    let mut checked = 0;
    for head in state.heads() {
        let Some((cx, cy)) = project(head, matrices.view_projection, size) else {
            continue;
        };
        let lit_nearby = (cy - reach..=cy + reach).any(|y| {
            (cx - reach..=cx + reach).any(|x| {
                x >= 0
                    && y >= 0
                    && (x as u32) < size.width
                    && (y as u32) < size.height
                    && is_lit(pixels[(y as u32 * size.width + x as u32) as usize])
            })
        });
        assert!(lit_nearby, "no trail drawn near head {:?} at ({}, {})", head, cx, cy);
        checked += 1;
    }
    assert!(checked > 0, "no particle projected on screen");
}

#[test]
fn test_render_outside_view_leaves_target_black() {
    let Some(context) = context() else { return };
    let params = small_params(16, 32);
    let size = SurfaceSize::new(64, 64);
    let target = capture_target(&context, size);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut session = session(&context, &params);
    for _ in 0..8 {
        session.update(&params).unwrap();
    }

    // Collapse every point onto clip position (5, 5, 0, 1), outside the view volume
    let off_screen = Mat4::from_translation(Vec3::new(5.0, 5.0, 0.0)) * Mat4::from_scale(Vec3::ZERO);
    let matrices = CameraMatrices {
        view: Mat4::IDENTITY,
        projection: off_screen,
        view_projection: off_screen,
    };
    session.render(&view, size, &matrices).unwrap();

    let pixels = read_pixels(&context, &target, size);
    assert!(pixels.iter().all(|&p| !is_lit(p)));
}

const FIXED_BETA: f32 = 8.0 / 3.0;

const UPDATE_WITHOUT_BETA: &str = r#"
struct UpdateParams {
    delta: f32,
    delta_time: f32,
    rho: f32,
    padding: f32,
};

@group(0) @binding(0)
var position_texture: texture_2d<f32>;

@group(0) @binding(1)
var<uniform> params: UpdateParams;

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag_coord.xy);
    if texel.x == 0 {
        let p = textureLoad(position_texture, texel, 0).xyz;
        let d = vec3<f32>(
            10.0 * (p.y - p.x),
            p.x * (params.rho - p.z) - p.y,
            p.x * p.y - (8.0 / 3.0) * p.z,
        );
        return vec4<f32>(p + d * params.delta * params.delta_time, 1.0);
    }
    return textureLoad(position_texture, texel - vec2<i32>(1, 0), 0);
}
"#;

#[test]
fn test_update_without_beta_uniform_still_steps() {
    let Some(context) = context() else { return };
    let shaders = ShaderLibrary::builtin().with_source(ShaderName::UpdateFragment, UPDATE_WITHOUT_BETA);
    let params = ParameterSnapshot {
        beta: 100.0,
        ..small_params(2, 8)
    };
    let mut session = Session::new(&context, &shaders, TARGET_FORMAT, &params, Camera::new()).unwrap();

    assert_eq!(session.pipeline().update_handle(UpdateUniform::Beta), UniformHandle::Absent);
    assert!(!session.pipeline().update_handle(UpdateUniform::Rho).is_absent());

    let seeded = session.read_state().unwrap();
    session.update(&params).unwrap();
    let stepped = session.read_state().unwrap();

    let fixed = ParameterSnapshot {
        beta: FIXED_BETA,
        ..params
    };
    for particle in 0..8 {
        let seed = seeded.texel(0, particle).unwrap();
        let expected = euler([seed[0], seed[1], seed[2]], &fixed);
        assert_close(stepped.texel(0, particle).unwrap(), expected, 1e-3);
    }
}

#[test]
fn test_stage_the_device_cannot_run_is_a_compile_error() {
    let Some(context) = context() else { return };
    // SHADER_F64 is never requested, so the device rejects this stage
    let shaders = ShaderLibrary::builtin().with_source(
        ShaderName::InitFragment,
        r#"
@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let wide = f64(frag_coord.x) * 2.0lf;
    return vec4<f32>(f32(wide), 0.0, 0.0, 1.0);
}
"#,
    );
    let result = Session::new(&context, &shaders, TARGET_FORMAT, &small_params(4, 4), Camera::new());
    assert!(matches!(
        result,
        Err(SessionError::Shader(ShaderError::Compile {
            stage: attractor::shader::StageKind::Fragment,
            ..
        }))
    ));
}
