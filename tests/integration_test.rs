//! Integration tests for DiMARCo
//!
//! Exercises the public API: configuration, noise schedule, routing and the
//! denoiser forward pass.

use candle_core::{DType, Device, Tensor};

use dimarco::{
    add_noise, add_noise_with, linear_betas, DiMarcoError, DiffusionConfig, DiffusionGridDenoiser,
    GridTier, NoiseScheduler, Objective, EPS,
};

fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .max_all()
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}

/// Test the ten-step schedule built from the default epsilon bounds
#[test]
fn test_default_beta_schedule() {
    let min_noise = EPS.sqrt();
    let max_noise = EPS.sqrt().sqrt();
    let betas = linear_betas(min_noise, max_noise, 10);

    assert_eq!(betas.len(), 10);
    assert!(betas.windows(2).all(|w| w[0] <= w[1]));
    assert!((betas[0] - min_noise).abs() < 1e-12);
    assert!((betas[9] - max_noise).abs() < 1e-12);
}

/// Test that noising keeps the input shape at every step
#[test]
fn test_add_noise_shape_for_all_steps() {
    let device = Device::Cpu;
    let scheduler = NoiseScheduler::default();
    let x = Tensor::randn(0.0f32, 1.0, (3, 1, 10, 10), &device).unwrap();

    for t in 0..scheduler.len() {
        let noisy = add_noise(&x, t, scheduler.betas()).unwrap();
        assert_eq!(noisy.dims(), &[3, 1, 10, 10]);
    }
}

/// Test that an out-of-range step is an index error, not a clamp
#[test]
fn test_add_noise_rejects_out_of_range_timestep() {
    let device = Device::Cpu;
    let scheduler = NoiseScheduler::default();
    let x = Tensor::zeros((1, 1, 4, 4), DType::F32, &device).unwrap();

    match scheduler.add_noise(&x, scheduler.len()) {
        Err(DiMarcoError::TimestepOutOfRange { timestep, steps }) => {
            assert_eq!(timestep, 10);
            assert_eq!(steps, 10);
        }
        other => panic!("expected TimestepOutOfRange, got {other:?}"),
    }
}

/// Test that two draws differ only through the noise term
#[test]
fn test_noise_draws_share_clean_contribution() {
    let device = Device::Cpu;
    let scheduler = NoiseScheduler::new(0.1, 0.3, 5).unwrap();
    let t = 2;
    let x = NoiseScheduler::seeded_noise((1, 1, 6, 6), 100, &device).unwrap();
    let eps_a = NoiseScheduler::seeded_noise((1, 1, 6, 6), 101, &device).unwrap();
    let eps_b = NoiseScheduler::seeded_noise((1, 1, 6, 6), 102, &device).unwrap();

    let a = add_noise_with(&x, t, scheduler.betas(), &eps_a).unwrap();
    let b = add_noise_with(&x, t, scheduler.betas(), &eps_b).unwrap();
    assert!(max_abs_diff(&a, &b) > 1e-4);

    let sigma = scheduler.noise_scale(t).unwrap();
    let clean_a = (&a - (&eps_a * sigma).unwrap()).unwrap();
    let clean_b = (&b - (&eps_b * sigma).unwrap()).unwrap();
    assert!(max_abs_diff(&clean_a, &clean_b) < 1e-5);
}

/// Test forward shapes for one grid per tier
#[test]
fn test_forward_shape_for_each_tier() {
    let device = Device::Cpu;
    let (model, _varmap) =
        DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();

    for size in [32, 20, 8, 4] {
        let x = Tensor::randn(0.0f32, 1.0, (2, 1, size, size), &device).unwrap();
        let y = model.forward(&x).unwrap();
        assert_eq!(y.dims(), &[2, 1, size, size]);
    }
}

/// Test the inclusive upper bound of each tier
#[test]
fn test_boundary_sizes_route_down() {
    let device = Device::Cpu;
    let (model, _varmap) =
        DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();

    let cases = [
        (24, GridTier::Medium, 3),
        (11, GridTier::Small, 2),
        (6, GridTier::Tiny, 1),
    ];
    for (size, tier, depth) in cases {
        let x = model.blank_grid(1, size).unwrap();
        let routed = model.route(&x).unwrap();
        assert_eq!(routed, tier);
        assert_eq!(routed.encoder_stages().len(), depth);
        assert_eq!(routed.decoder_stages().len(), depth);
        assert_eq!(model.forward(&x).unwrap().dims(), &[1, 1, size, size]);
    }
}

/// Test the default model on a zero 32x32 grid
#[test]
fn test_end_to_end_zero_grid() {
    let device = Device::Cpu;
    let (model, _varmap) =
        DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();
    assert_eq!(model.objective(), Objective::VSpace);
    assert_eq!(model.scheduler().len(), 10);

    let x = Tensor::zeros((1, 1, 32, 32), DType::F32, &device).unwrap();
    let y = model.forward(&x).unwrap();
    assert_eq!(y.dims(), &[1, 1, 32, 32]);
}

/// Test that non-square grids are refused
#[test]
fn test_non_square_grid_rejected() {
    let device = Device::Cpu;
    let (model, _varmap) =
        DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();

    let x = Tensor::zeros((1, 1, 30, 12), DType::F32, &device).unwrap();
    assert!(matches!(
        model.forward(&x),
        Err(DiMarcoError::NonSquareGrid { height: 30, width: 12 })
    ));
}

/// Test that a 0x0 grid is refused before it reaches any layer
#[test]
fn test_empty_grid_rejected() {
    let device = Device::Cpu;
    let (model, _varmap) =
        DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();

    let x = Tensor::zeros((2, 1, 0, 0), DType::F32, &device).unwrap();
    assert!(matches!(model.forward(&x), Err(DiMarcoError::Shape { .. })));
}

/// Test loading a config file and building a model from it
#[test]
fn test_model_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dimarco.yaml");
    std::fs::write(
        &path,
        "objective: noise\ndiffusion_steps: 25\nmin_noise: 0.0001\nmax_noise: 0.02\nlearnable_bridge_activation: false\n",
    )
    .unwrap();

    let config = DiffusionConfig::load(&path).unwrap();
    let (model, _varmap) = DiffusionGridDenoiser::with_random_weights(config, &Device::Cpu).unwrap();
    assert_eq!(model.objective(), Objective::Noise);
    assert_eq!(model.scheduler().len(), 25);
    assert!(!model.bridge(GridTier::Medium).unwrap().is_learnable());
}

/// Test that parameters saved with the tensor library reload into an identical model
#[test]
fn test_safetensors_reload_matches() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dimarco.safetensors");

    let (model, varmap) =
        DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();
    varmap.save(&path).unwrap();

    let reloaded =
        DiffusionGridDenoiser::from_safetensors(DiffusionConfig::default(), &[&path], &device).unwrap();

    for size in [5, 9, 16, 28] {
        let x = NoiseScheduler::seeded_noise((1, 1, size, size), 8, &device).unwrap();
        let a = model.forward(&x).unwrap();
        let b = reloaded.forward(&x).unwrap();
        assert!(max_abs_diff(&a, &b) < 1e-6, "size {size}");
    }
}

/// Test that a model can be evaluated from several threads at once
#[test]
fn test_concurrent_forward_passes() {
    let device = Device::Cpu;
    let (model, _varmap) =
        DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();
    let model = std::sync::Arc::new(model);

    let handles: Vec<_> = [4usize, 10, 20, 26]
        .into_iter()
        .map(|size| {
            let model = std::sync::Arc::clone(&model);
            std::thread::spawn(move || {
                let x = model.blank_grid(1, size).unwrap();
                model.forward(&x).unwrap().dims().to_vec()
            })
        })
        .collect();

    for (handle, size) in handles.into_iter().zip([4usize, 10, 20, 26]) {
        assert_eq!(handle.join().unwrap(), vec![1, 1, size, size]);
    }
}
