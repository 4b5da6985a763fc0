//! Swarm simulation environment.
//!
//! The collection engine only relies on the narrow [`Environment`] interface;
//! [`SwarmEnv`] is the bundled implementation with simple alignment-cohesion
//! dynamics masked by the communication action matrix.

use crate::config::EnvConfig;
use crate::stats;
use anyhow::{Result, bail};
use ndarray::{Array2, ArrayView2, s};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// Per-agent observation matrix of shape `(n_agents, 4)`: position then velocity.
pub type Observation = Array2<f32>;

/// Auxiliary per-step information. Not consumed by the collection engine.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    pub time_step: usize,
}

/// Result of a single environment step.
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// The environment interface consumed by the collection engine.
///
/// A stateful, exclusively-owned resource: `seed` then `reset` start a fresh
/// episode, and each `step` depends on all prior steps of that episode.
pub trait Environment {
    fn n_agents(&self) -> usize;

    /// Fixed per-step time increment.
    fn dt(&self) -> f32;

    /// Reseed the environment; takes effect at the next `reset`.
    fn seed(&mut self, seed: u64);

    /// Start a fresh episode and return the initial observation.
    fn reset(&mut self) -> Result<Observation>;

    /// Advance one step under the given communication action matrix.
    fn step(&mut self, action: ArrayView2<i8>) -> Result<StepOutcome>;

    /// Current agent positions, shape `(n_agents, 2)`.
    fn positions(&self) -> ArrayView2<'_, f32>;

    /// Current agent velocities, shape `(n_agents, 2)`.
    fn velocities(&self) -> ArrayView2<'_, f32>;

    /// Spatial dispersion history, one entry per step taken this episode.
    fn std_pos_hist(&self) -> &[f32];

    /// Velocity dispersion history, one entry per step taken this episode.
    fn std_vel_hist(&self) -> &[f32];
}

const W_ALIGN: f32 = 1.0;
const W_COHESION: f32 = 0.05;
const MIN_DIR_NORM: f32 = 1e-6;

/// Swarm of constant-speed agents steered by the messages they listen to.
///
/// Each step, agent `i` turns towards a blend of the mean velocity of the
/// agents it attends to (alignment) and their centroid (cohesion); speed is
/// constant, only headings change. Initial conditions are drawn from the
/// seeded generator, the dynamics themselves are deterministic.
pub struct SwarmEnv {
    cfg: EnvConfig,
    max_time_steps: usize,
    pos: Array2<f32>,
    vel: Array2<f32>,
    time_step: usize,
    std_pos_hist: Vec<f32>,
    std_vel_hist: Vec<f32>,
    rng: ChaCha12Rng,
}

impl SwarmEnv {
    pub fn new(cfg: EnvConfig, max_time_steps: usize) -> Self {
        let n_agt = cfg.num_agents;
        Self {
            cfg,
            max_time_steps,
            pos: Array2::zeros((n_agt, 2)),
            vel: Array2::zeros((n_agt, 2)),
            time_step: 0,
            std_pos_hist: Vec::with_capacity(max_time_steps),
            std_vel_hist: Vec::with_capacity(max_time_steps),
            rng: ChaCha12Rng::seed_from_u64(0),
        }
    }

    fn observation(&self) -> Observation {
        let n_agt = self.cfg.num_agents;
        let mut obs = Array2::zeros((n_agt, 4));
        obs.slice_mut(s![.., 0..2]).assign(&self.pos);
        obs.slice_mut(s![.., 2..4]).assign(&self.vel);
        obs
    }
}

impl Environment for SwarmEnv {
    fn n_agents(&self) -> usize {
        self.cfg.num_agents
    }

    fn dt(&self) -> f32 {
        self.cfg.dt
    }

    fn seed(&mut self, seed: u64) {
        self.rng = ChaCha12Rng::seed_from_u64(seed);
    }

    fn reset(&mut self) -> Result<Observation> {
        let spread = self.cfg.init_pos_spread;
        let pos_dist = Uniform::new(-spread, spread)?;
        let angle_dist = Uniform::new(0.0, std::f32::consts::TAU)?;

        for i_agt in 0..self.cfg.num_agents {
            self.pos[[i_agt, 0]] = pos_dist.sample(&mut self.rng);
            self.pos[[i_agt, 1]] = pos_dist.sample(&mut self.rng);
            let angle = angle_dist.sample(&mut self.rng);
            self.vel[[i_agt, 0]] = self.cfg.init_speed * angle.cos();
            self.vel[[i_agt, 1]] = self.cfg.init_speed * angle.sin();
        }

        self.time_step = 0;
        self.std_pos_hist.clear();
        self.std_vel_hist.clear();

        Ok(self.observation())
    }

    fn step(&mut self, action: ArrayView2<i8>) -> Result<StepOutcome> {
        let n_agt = self.cfg.num_agents;
        if action.dim() != (n_agt, n_agt) {
            bail!(
                "action matrix shape must be {:?}, but is {:?}",
                (n_agt, n_agt),
                action.dim()
            );
        }

        let mut new_vel = Array2::zeros((n_agt, 2));
        for i_agt in 0..n_agt {
            let mut vel_sum = [0.0f32; 2];
            let mut pos_sum = [0.0f32; 2];
            let mut n_heard = 0usize;
            for j_agt in 0..n_agt {
                if action[[i_agt, j_agt]] != 0 {
                    vel_sum[0] += self.vel[[j_agt, 0]];
                    vel_sum[1] += self.vel[[j_agt, 1]];
                    pos_sum[0] += self.pos[[j_agt, 0]];
                    pos_sum[1] += self.pos[[j_agt, 1]];
                    n_heard += 1;
                }
            }

            // A deaf agent keeps its current heading.
            let mut dir = [self.vel[[i_agt, 0]], self.vel[[i_agt, 1]]];
            if n_heard > 0 {
                let align = [vel_sum[0] / n_heard as f32, vel_sum[1] / n_heard as f32];
                let cohesion = [
                    pos_sum[0] / n_heard as f32 - self.pos[[i_agt, 0]],
                    pos_sum[1] / n_heard as f32 - self.pos[[i_agt, 1]],
                ];
                let blended = [
                    W_ALIGN * align[0] + W_COHESION * cohesion[0],
                    W_ALIGN * align[1] + W_COHESION * cohesion[1],
                ];
                // Keep the old heading when the blend degenerates to zero.
                if (blended[0] * blended[0] + blended[1] * blended[1]).sqrt() > MIN_DIR_NORM {
                    dir = blended;
                }
            }

            let norm = (dir[0] * dir[0] + dir[1] * dir[1]).sqrt();
            new_vel[[i_agt, 0]] = self.cfg.init_speed * dir[0] / norm;
            new_vel[[i_agt, 1]] = self.cfg.init_speed * dir[1] / norm;
        }

        self.vel = new_vel;
        self.pos += &(&self.vel * self.cfg.dt);
        self.time_step += 1;

        let std_pos = stats::dispersion(self.pos.view());
        let std_vel = stats::dispersion(self.vel.view());
        self.std_pos_hist.push(std_pos);
        self.std_vel_hist.push(std_vel);

        // Heading agreement costs nothing, full disagreement costs O(dt).
        let reward = -self.cfg.dt * std_vel / self.cfg.init_speed;

        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            done: self.time_step >= self.max_time_steps,
            info: StepInfo {
                time_step: self.time_step,
            },
        })
    }

    fn positions(&self) -> ArrayView2<'_, f32> {
        self.pos.view()
    }

    fn velocities(&self) -> ArrayView2<'_, f32> {
        self.vel.view()
    }

    fn std_pos_hist(&self) -> &[f32] {
        &self.std_pos_hist
    }

    fn std_vel_hist(&self) -> &[f32] {
        &self.std_vel_hist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_env(n_agents: usize, max_time_steps: usize) -> SwarmEnv {
        let cfg = EnvConfig {
            num_agents: n_agents,
            ..EnvConfig::default()
        };
        SwarmEnv::new(cfg, max_time_steps)
    }

    #[test]
    fn reset_is_deterministic_for_a_fixed_seed() {
        let mut env_a = test_env(5, 10);
        let mut env_b = test_env(5, 10);
        env_a.seed(42);
        env_b.seed(42);
        let obs_a = env_a.reset().unwrap();
        let obs_b = env_b.reset().unwrap();
        assert_eq!(obs_a, obs_b);
    }

    #[test]
    fn episodes_are_reproducible() {
        let action = Array2::<i8>::ones((4, 4));

        let run = |seed: u64| {
            let mut env = test_env(4, 8);
            env.seed(seed);
            env.reset().unwrap();
            for _ in 0..8 {
                env.step(action.view()).unwrap();
            }
            (env.positions().to_owned(), env.velocities().to_owned())
        };

        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    #[test]
    fn step_fills_histories_and_flags_done_at_horizon() {
        let mut env = test_env(3, 4);
        env.seed(1);
        env.reset().unwrap();
        let action = Array2::<i8>::ones((3, 3));
        for t in 0..4 {
            let outcome = env.step(action.view()).unwrap();
            assert_eq!(outcome.info.time_step, t + 1);
            assert_eq!(outcome.done, t == 3);
        }
        assert_eq!(env.std_pos_hist().len(), 4);
        assert_eq!(env.std_vel_hist().len(), 4);
    }

    #[test]
    fn step_keeps_speed_constant_and_finite() {
        let mut env = test_env(6, 5);
        env.seed(3);
        env.reset().unwrap();
        let action = Array2::<i8>::eye(6);
        for _ in 0..5 {
            env.step(action.view()).unwrap();
        }
        let speed = EnvConfig::default().init_speed;
        for row in env.velocities().outer_iter() {
            let norm = (row[0] * row[0] + row[1] * row[1]).sqrt();
            assert!((norm - speed).abs() < 1e-3);
        }
        assert!(env.positions().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn step_rejects_wrong_action_shape() {
        let mut env = test_env(3, 4);
        env.seed(1);
        env.reset().unwrap();
        let action = Array2::<i8>::ones((2, 2));
        assert!(env.step(action.view()).is_err());
    }
}
