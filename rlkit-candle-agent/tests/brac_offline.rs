use anyhow::Result;
use ndarray::{Array2, ArrayD};
use rlkit_candle_agent::{
    actor::GaussianActorConfig,
    brac::{BracConfig, BracPlus},
    critic::EnsembleCriticConfig,
    mlp::{GaussianMlp, Mlp, MlpConfig},
    Activation,
};
use rlkit_core::{
    dummy::DummyVecEnv,
    record::BufferedRecorder,
    replay_buffer::ReplayBufferConfig,
    sampler::{BatchSampler, Sampler},
    storage::DataSpec,
    Agent, ExperienceBufferBase, OfflineRunner, RunnerConfig, UniformReplayBuffer, VecEnv,
};
use tempdir::TempDir;

fn brac_config() -> BracConfig<MlpConfig, MlpConfig> {
    BracConfig::default()
        .actor_config(
            GaussianActorConfig::default()
                .policy_config(MlpConfig::new(0, vec![32], 0, Activation::None)),
        )
        .critic_config(
            EnsembleCriticConfig::default()
                .q_config(MlpConfig::new(0, vec![32], 0, Activation::None)),
        )
        .n_samples(2)
}

#[test]
fn test_brac_offline_loop() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    // Dataset collected by a constant behavior policy.
    let env = DummyVecEnv::new(2, 1, 2, 10);
    let obs_space = env.single_observation_space().clone();
    let act_space = env.single_action_space().clone();
    let mut buffer = UniformReplayBuffer::build(
        &ReplayBufferConfig::default().capacity(200).batch_size(16),
        DataSpec::from_spaces(&obs_space, &act_space),
    )?;
    let mut sampler = BatchSampler::new(env);
    let mut behavior = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
        Ok(Array2::from_elem((obs.shape()[0], 1), 0.5))
    };
    sampler.sample(50, &mut behavior, &mut buffer)?;
    assert_eq!(buffer.len(), 100);

    let mut agent: BracPlus<Mlp, GaussianMlp> =
        BracPlus::build(brac_config(), &obs_space, &act_space)?;
    let nll = agent.pretrain_behavior(&mut buffer, 20)?;
    assert!(nll.is_finite());
    agent.pretrain_cloning(&mut buffer, 5)?;
    agent.set_delta_behavior(1.0);

    let dir = TempDir::new("brac_offline")?;
    let config = RunnerConfig::default()
        .epochs(2)
        .steps_per_epoch(5)
        .update_every(1)
        .update_per_step(1.0)
        .num_test_episodes(2)
        .save_freq(2)
        .model_dir(dir.path().to_string_lossy());
    let mut runner = OfflineRunner::build(config, DummyVecEnv::new(2, 1, 2, 10))?;
    let mut logger = BufferedRecorder::new();
    runner.run(&mut agent, &mut buffer, &mut logger)?;

    assert_eq!(agent.policy_updates(), 10);
    let (_, last) = &logger.flushed()[1];
    assert_eq!(last.get_scalar("GradientSteps")?, 10.0);
    assert!(last.get_scalar("KL_mean")?.is_finite());
    assert_eq!(last.get_scalar("DeltaBehavior")?, 1.0);

    let final_dir = dir.path().join("final");
    for file in ["critic.pt", "actor.pt", "actor_tgt.pt", "behavior.pt", "alpha.pt", "beta.pt"] {
        assert!(final_dir.join(file).exists(), "{} is missing", file);
    }
    let mut loaded: BracPlus<Mlp, GaussianMlp> =
        BracPlus::build(brac_config(), &obs_space, &act_space)?;
    loaded.load_params(&final_dir)?;
    let obs = Array2::<f32>::from_elem((3, 2), 0.1).into_dyn();
    assert_eq!(agent.act_batch_test(&obs)?, loaded.act_batch_test(&obs)?);
    Ok(())
}
