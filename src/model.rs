//! Learned-policy interface and model registry.
//!
//! The engine only sees the [`PolicyModel`] trait; concrete models are built
//! by name through an explicitly-constructed [`ModelRegistry`] before the
//! sweep starts, so there is no ambient global registration.

use crate::config::ModelConfig;
use crate::env::Observation;
use anyhow::{Context, Result, bail};
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

/// An action-selecting model standing in for a trained policy.
///
/// Returns a binary action matrix and the probability the model assigned to
/// each sampled entry; both have shape `(n_agents, n_agents)`.
pub trait PolicyModel {
    fn compute_actions(
        &mut self,
        obs: &Observation,
        n_agents: usize,
        explore: bool,
    ) -> Result<(Array2<i8>, Array2<f32>)>;
}

/// Edge-wise Bernoulli listening model.
///
/// With exploration enabled every (listener, speaker) edge is sampled
/// independently with the configured probability; without exploration the
/// more likely value is taken deterministically.
pub struct BernoulliPolicy {
    edge_dist: Bernoulli,
    prob_listen: f64,
    rng: ChaCha12Rng,
}

impl BernoulliPolicy {
    pub fn new(prob_listen: f64, seed: u64) -> Result<Self> {
        let edge_dist =
            Bernoulli::new(prob_listen).context("failed to construct edge distribution")?;
        Ok(Self {
            edge_dist,
            prob_listen,
            rng: ChaCha12Rng::seed_from_u64(seed),
        })
    }
}

impl PolicyModel for BernoulliPolicy {
    fn compute_actions(
        &mut self,
        _obs: &Observation,
        n_agents: usize,
        explore: bool,
    ) -> Result<(Array2<i8>, Array2<f32>)> {
        let mut action = Array2::<i8>::zeros((n_agents, n_agents));
        let mut action_prob = Array2::<f32>::zeros((n_agents, n_agents));

        for i_agt in 0..n_agents {
            for j_agt in 0..n_agents {
                let listen = if explore {
                    self.edge_dist.sample(&mut self.rng)
                } else {
                    self.prob_listen >= 0.5
                };
                action[[i_agt, j_agt]] = listen as i8;
                action_prob[[i_agt, j_agt]] = if listen {
                    self.prob_listen as f32
                } else {
                    1.0 - self.prob_listen as f32
                };
            }
        }

        Ok((action, action_prob))
    }
}

type ModelFactory = fn(&ModelConfig) -> Result<Box<dyn PolicyModel>>;

/// Name-to-factory table for policy models.
pub struct ModelRegistry {
    factories: Vec<(String, ModelFactory)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Registry with the bundled models pre-registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("bernoulli", |cfg| {
            Ok(Box::new(BernoulliPolicy::new(cfg.prob_listen, cfg.seed)?))
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: ModelFactory) {
        self.factories.push((name.to_string(), factory));
    }

    /// Build the model named in the configuration. Unknown names are fatal.
    pub fn build(&self, cfg: &ModelConfig) -> Result<Box<dyn PolicyModel>> {
        let factory = self
            .factories
            .iter()
            .find(|(name, _)| name == &cfg.name)
            .map(|(_, factory)| factory);
        match factory {
            Some(factory) => factory(cfg).with_context(|| format!("failed to build {:?}", cfg.name)),
            None => bail!("unknown model name {:?}", cfg.name),
        }
    }
}
