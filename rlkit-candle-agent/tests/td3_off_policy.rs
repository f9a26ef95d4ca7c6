use anyhow::Result;
use rlkit_candle_agent::{
    actor::DeterministicActorConfig,
    critic::EnsembleCriticConfig,
    mlp::{Mlp, MlpConfig},
    td3::{Td3, Td3Config},
    Activation,
};
use rlkit_core::{
    dummy::DummyVecEnv,
    record::BufferedRecorder,
    replay_buffer::{PerConfig, ReplayBufferConfig},
    sampler::BatchSampler,
    storage::DataSpec,
    updater::Updater,
    Agent, ExperienceBufferBase, OffPolicyRunner, PrioritizedReplayBuffer, RunnerConfig, VecEnv,
};
use ndarray::Array2;
use tempdir::TempDir;

fn td3_config() -> Td3Config<MlpConfig, MlpConfig> {
    Td3Config::default()
        .actor_config(
            DeterministicActorConfig::default()
                .policy_config(MlpConfig::new(0, vec![32, 32], 0, Activation::None)),
        )
        .critic_config(
            EnsembleCriticConfig::default()
                .q_config(MlpConfig::new(0, vec![32, 32], 0, Activation::None)),
        )
}

#[test]
fn test_td3_with_prioritized_buffer() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let env = DummyVecEnv::new(3, 1, 2, 20);
    let obs_space = env.single_observation_space().clone();
    let act_space = env.single_action_space().clone();
    let mut buffer = PrioritizedReplayBuffer::build(
        &ReplayBufferConfig::default()
            .capacity(1000)
            .batch_size(8)
            .per_config(Some(PerConfig::default().n_opts_final(100))),
        DataSpec::from_spaces(&obs_space, &act_space),
    )?;
    let mut agent: Td3<Mlp, Mlp> = Td3::build(td3_config(), &obs_space, &act_space)?;

    let dir = TempDir::new("td3_off_policy")?;
    let config = RunnerConfig::default()
        .epochs(2)
        .steps_per_epoch(10)
        .start_steps(4)
        .update_after(4)
        .update_every(2)
        .update_per_step(1.0)
        .num_test_episodes(2)
        .save_freq(1)
        .model_dir(dir.path().to_string_lossy());
    let mut runner =
        OffPolicyRunner::build(config, BatchSampler::new(env), DummyVecEnv::new(3, 1, 2, 20))?;
    let mut logger = BufferedRecorder::new();

    runner.run(&mut agent, &mut buffer, &mut logger)?;

    assert_eq!(buffer.len(), 40);
    assert!(runner.updater().num_updates() > 0);
    assert_eq!(agent.policy_updates(), runner.updater().num_updates());
    assert!(buffer.beta() > PerConfig::default().beta_0);

    let (_, last) = &logger.flushed()[1];
    assert!(last.get_scalar("LossQ_mean")?.is_finite());
    assert!(last.get_scalar("TDError_mean").is_ok());
    assert!(last.get_scalar("TestEpRet_mean").is_ok());

    // A fresh agent loaded from the final checkpoint acts identically.
    let final_dir = dir.path().join("final");
    assert!(final_dir.join("critic.pt").exists());
    assert!(final_dir.join("actor_tgt.pt").exists());
    let mut loaded: Td3<Mlp, Mlp> = Td3::build(td3_config(), &obs_space, &act_space)?;
    loaded.load_params(&final_dir)?;
    let obs = Array2::<f32>::from_elem((4, 3), 0.3).into_dyn();
    assert_eq!(agent.act_batch_test(&obs)?, loaded.act_batch_test(&obs)?);
    Ok(())
}
