//! DiMARCo end-to-end tests

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device, Tensor};
    use candle_nn::VarBuilder;

    use crate::config::{DiffusionConfig, Objective};
    use crate::models::dimarco::scheduler::max_abs_diff;
    use crate::models::dimarco::{DiffusionGridDenoiser, GridTier, NoiseScheduler};

    /// Noise a grid, denoise it and turn the prediction into a clean estimate
    #[test]
    fn test_noise_then_denoise_round() {
        let device = Device::Cpu;
        let (model, _varmap) =
            DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();

        let x0 = NoiseScheduler::seeded_noise((2, 1, 12, 12), 5, &device).unwrap();
        let t = model.scheduler().len() - 1;
        let x_t = model.add_noise(&x0, t).unwrap();
        assert_eq!(x_t.dims(), x0.dims());

        let prediction = model.forward(&x_t).unwrap();
        let x0_hat = model
            .scheduler()
            .predict_clean(&x_t, &prediction, t, model.objective())
            .unwrap();
        assert_eq!(x0_hat.dims(), &[2, 1, 12, 12]);
    }

    /// The objective only changes how the output is read, never the forward pass
    #[test]
    fn test_forward_is_objective_agnostic() {
        let device = Device::Cpu;
        let (v_model, varmap) =
            DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();
        let noise_config = DiffusionConfig::default().with_objective(Objective::Noise);
        let noise_model =
            DiffusionGridDenoiser::new(noise_config, VarBuilder::from_varmap(&varmap, DType::F32, &device))
                .unwrap();

        let x = NoiseScheduler::seeded_noise((1, 1, 30, 30), 9, &device).unwrap();
        let a = v_model.forward(&x).unwrap();
        let b = noise_model.forward(&x).unwrap();
        assert_eq!(max_abs_diff(&a, &b), 0.0);
        assert_eq!(noise_model.objective(), Objective::Noise);
    }

    /// Samples in a batch do not interact
    #[test]
    fn test_batch_items_are_independent() {
        let device = Device::Cpu;
        let (model, _varmap) =
            DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();

        for size in [4, 10, 18, 27] {
            let batch = NoiseScheduler::seeded_noise((2, 1, size, size), size as u64, &device).unwrap();
            let out = model.forward(&batch).unwrap();
            let first = model.forward(&batch.narrow(0, 0, 1).unwrap()).unwrap();
            let second = model.forward(&batch.narrow(0, 1, 1).unwrap()).unwrap();
            let stacked = Tensor::cat(&[first, second], 0).unwrap();
            assert!(max_abs_diff(&out, &stacked) < 1e-4, "size {size}");
        }
    }

    /// Every tier produces finite values from a noised zero grid
    #[test]
    fn test_outputs_are_finite_for_every_tier() {
        let device = Device::Cpu;
        let (model, _varmap) =
            DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device).unwrap();

        for (size, tier) in [(3, GridTier::Tiny), (9, GridTier::Small), (15, GridTier::Medium), (30, GridTier::Large)] {
            let x = model.blank_grid(1, size).unwrap();
            assert_eq!(model.route(&x).unwrap(), tier);
            let noisy = model.add_noise(&x, 0).unwrap();
            let values: Vec<f32> = model.forward(&noisy).unwrap().flatten_all().unwrap().to_vec1().unwrap();
            assert_eq!(values.len(), size * size);
            assert!(values.iter().all(|v| v.is_finite()));
        }
    }
}
