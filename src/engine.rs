//! Episode runner: one (seed, algorithm) episode over the environment.

use crate::env::Environment;
use crate::model::PolicyModel;
use crate::policy::{Algorithm, compute_metric_action, compute_topology_action};
use crate::record::EpisodeRecord;
use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array2, s};

/// Runs episodes against an exclusively-owned environment.
pub struct Engine<E: Environment> {
    env: E,
    max_time_steps: usize,
}

impl<E: Environment> Engine<E> {
    pub fn new(env: E, max_time_steps: usize) -> Self {
        Self {
            env,
            max_time_steps,
        }
    }

    /// Run one fixed-horizon episode and return its telemetry.
    ///
    /// Seeds and resets the environment, then takes exactly `max_time_steps`
    /// steps with the action chosen by `algo`. The environment's `done` flag
    /// is deliberately not acted on: the sweep compares algorithms over a
    /// fixed horizon.
    pub fn run_episode(
        &mut self,
        seed: u64,
        algo: Algorithm,
        model: &mut dyn PolicyModel,
        explore: bool,
    ) -> Result<EpisodeRecord> {
        self.env.seed(seed);
        let mut obs = self.env.reset().context("failed to reset environment")?;

        let n_agt = self.env.n_agents();
        let dt = self.env.dt();
        let mut episode = EpisodeRecord::new(self.max_time_steps, n_agt);

        // Its shape is static across the episode, so the full-communication
        // action is built once and reused.
        let mut held_action: Option<Array2<i8>> = None;

        for t in 0..self.max_time_steps {
            let (action, action_prob) = match algo {
                Algorithm::FullComm => {
                    let action = held_action
                        .get_or_insert_with(|| Array2::ones((n_agt, n_agt)))
                        .clone();
                    let action_prob = action.mapv(|a| a as f32);
                    (action, action_prob)
                }
                Algorithm::Learned => model
                    .compute_actions(&obs, n_agt, explore)
                    .context("failed to compute model actions")?,
                Algorithm::Metric(radius) => {
                    let action = compute_metric_action(self.env.positions(), radius)
                        .context("failed to compute metric action")?;
                    let action_prob = action.mapv(|a| a as f32);
                    (action, action_prob)
                }
                Algorithm::Topology(n_neighbors) => {
                    let action = compute_topology_action(self.env.positions(), n_neighbors)
                        .context("failed to compute topology action")?;
                    let action_prob = action.mapv(|a| a as f32);
                    (action, action_prob)
                }
            };

            let outcome = self
                .env
                .step(action.view())
                .with_context(|| format!("failed to step environment at step {t}"))?;
            obs = outcome.observation;

            episode
                .trajectories
                .slice_mut(s![t, .., ..])
                .assign(&self.env.positions());
            episode
                .velocities
                .slice_mut(s![t, .., ..])
                .assign(&self.env.velocities());
            episode.actions.slice_mut(s![t, .., ..]).assign(&action);
            episode
                .action_probs
                .slice_mut(s![t, .., ..])
                .assign(&action_prob);
            episode.rewards[t] = outcome.reward;
            episode.control[t] = outcome.reward + dt;
        }

        // The environment keeps these histories itself; copy them once per
        // episode instead of once per step.
        copy_hist(self.env.std_pos_hist(), &mut episode.spatial_entropy)
            .context("failed to copy spatial dispersion history")?;
        copy_hist(self.env.std_vel_hist(), &mut episode.velocity_entropy)
            .context("failed to copy velocity dispersion history")?;

        Ok(episode)
    }
}

fn copy_hist(hist: &[f32], dest: &mut Array1<f32>) -> Result<()> {
    if hist.len() != dest.len() {
        bail!(
            "history length must be {}, but is {}",
            dest.len(),
            hist.len()
        );
    }
    for (ele, &val) in dest.iter_mut().zip(hist) {
        *ele = val;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvConfig, ModelConfig};
    use crate::env::SwarmEnv;
    use crate::model::{BernoulliPolicy, ModelRegistry, PolicyModel};

    const N_AGENTS: usize = 4;
    const N_STEPS: usize = 5;

    fn test_engine() -> Engine<SwarmEnv> {
        let cfg = EnvConfig {
            num_agents: N_AGENTS,
            ..EnvConfig::default()
        };
        Engine::new(SwarmEnv::new(cfg, N_STEPS), N_STEPS)
    }

    fn test_model() -> Box<dyn PolicyModel> {
        ModelRegistry::with_builtins()
            .build(&ModelConfig::default())
            .unwrap()
    }

    fn run(algo: Algorithm, seed: u64) -> EpisodeRecord {
        let mut engine = test_engine();
        let mut model = test_model();
        engine.run_episode(seed, algo, model.as_mut(), false).unwrap()
    }

    #[test]
    fn metric_episode_has_finite_telemetry_of_the_declared_shapes() {
        let episode = run(Algorithm::Metric(25.0), 3);

        assert_eq!(episode.trajectories.dim(), (N_STEPS, N_AGENTS, 2));
        assert_eq!(episode.actions.dim(), (N_STEPS, N_AGENTS, N_AGENTS));
        assert_eq!(episode.rewards.len(), N_STEPS);
        assert!(episode.trajectories.iter().all(|v| v.is_finite()));
        assert!(episode.action_probs.iter().all(|v| v.is_finite()));
        assert!(episode.spatial_entropy.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn control_is_reward_plus_time_increment() {
        let episode = run(Algorithm::Metric(25.0), 3);
        let dt = EnvConfig::default().dt;
        for t in 0..N_STEPS {
            assert_eq!(episode.control[t], episode.rewards[t] + dt);
        }
    }

    #[test]
    fn deterministic_algorithms_reproduce_bit_identical_episodes() {
        for algo in [
            Algorithm::FullComm,
            Algorithm::Metric(50.0),
            Algorithm::Topology(2),
        ] {
            let episode_a = run(algo, 9);
            let episode_b = run(algo, 9);
            assert_eq!(episode_a.trajectories, episode_b.trajectories);
            assert_eq!(episode_a.actions, episode_b.actions);
            assert_eq!(episode_a.rewards, episode_b.rewards);
        }
    }

    #[test]
    fn full_comm_action_is_all_ones_at_every_step() {
        let episode = run(Algorithm::FullComm, 5);
        assert!(episode.actions.iter().all(|&a| a == 1));
        assert!(episode.action_probs.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn learned_episode_uses_the_model_probabilities() {
        let mut engine = test_engine();
        let mut model = BernoulliPolicy::new(0.5, 1).unwrap();
        let episode = engine
            .run_episode(3, Algorithm::Learned, &mut model, true)
            .unwrap();
        assert!(episode.action_probs.iter().all(|&p| (p - 0.5).abs() < 1e-6));
    }
}
