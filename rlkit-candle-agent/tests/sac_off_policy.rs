use anyhow::Result;
use rlkit_candle_agent::{
    actor::GaussianActorConfig,
    critic::EnsembleCriticConfig,
    mlp::{GaussianMlp, Mlp, MlpConfig},
    sac::{EntCoefMode, Sac, SacConfig},
    Activation,
};
use rlkit_core::{
    dummy::DummyVecEnv,
    record::BufferedRecorder,
    replay_buffer::ReplayBufferConfig,
    sampler::BatchSampler,
    storage::DataSpec,
    updater::Updater,
    Agent, OffPolicyRunner, RunnerConfig, UniformReplayBuffer, VecEnv,
};

#[test]
fn test_sac_off_policy_loop() -> Result<()> {
    let env = DummyVecEnv::new(2, 2, 3, 10);
    let obs_space = env.single_observation_space().clone();
    let act_space = env.single_action_space().clone();
    let mut buffer = UniformReplayBuffer::build(
        &ReplayBufferConfig::default().capacity(500).batch_size(16),
        DataSpec::from_spaces(&obs_space, &act_space),
    )?;
    let config = SacConfig::default()
        .actor_config(
            GaussianActorConfig::default()
                .policy_config(MlpConfig::new(0, vec![32], 0, Activation::None)),
        )
        .critic_config(
            EnsembleCriticConfig::default()
                .q_config(MlpConfig::new(0, vec![32], 0, Activation::None)),
        )
        .ent_coef_mode(EntCoefMode::Auto {
            init: 0.5,
            lr: 1e-3,
            target_entropy: None,
        });
    let mut agent: Sac<Mlp, GaussianMlp> = Sac::build(config, &obs_space, &act_space)?;

    let config = RunnerConfig::default()
        .epochs(3)
        .steps_per_epoch(8)
        .start_steps(6)
        .update_after(6)
        .update_every(4)
        .update_per_step(0.5)
        .num_test_episodes(3);
    let mut runner =
        OffPolicyRunner::build(config, BatchSampler::new(env), DummyVecEnv::new(2, 2, 3, 10))?;
    let mut logger = BufferedRecorder::new();
    runner.run(&mut agent, &mut buffer, &mut logger)?;

    assert_eq!(runner.global_step(), 24);
    assert_eq!(agent.policy_updates(), runner.updater().num_updates());

    let flushed = logger.flushed();
    assert_eq!(flushed.len(), 3);
    let (step, last) = &flushed[2];
    assert_eq!(*step, 3);
    assert!(last.get_scalar("LossPi_mean").is_ok());
    assert!(last.get_scalar("Alpha_mean")?.is_finite());
    Ok(())
}
