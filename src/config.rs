use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Collection-run configuration parameters.
///
/// Loaded from a TOML file and validated before use; every field has a
/// default matching the reference sweep, so a partial (or absent) file is
/// fine. See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sweep: SweepConfig,
    pub env: EnvConfig,
    pub model: ModelConfig,
}

/// Extent of the seed-by-algorithm sweep.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// First seed; the sweep covers `start_seed..start_seed + num_seeds`.
    pub start_seed: u64,
    /// Number of seeds.
    pub num_seeds: usize,
    /// Fixed episode horizon.
    pub max_time_steps: usize,
}

/// Swarm environment parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Number of agents.
    pub num_agents: usize,
    /// Per-step time increment.
    pub dt: f32,
    /// Half-width of the square the initial positions are drawn from.
    pub init_pos_spread: f32,
    /// Constant agent speed.
    pub init_speed: f32,
}

/// Learned-policy model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Registered model name.
    pub name: String,
    /// Sample actions instead of taking the deterministic ones.
    pub explore: bool,
    /// Per-edge listening probability of the bundled Bernoulli model.
    pub prob_listen: f64,
    /// Seed of the model's own exploration generator.
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start_seed: 120,
            num_seeds: 500,
            max_time_steps: 1000,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            num_agents: 20,
            dt: 0.1,
            init_pos_spread: 50.0,
            init_speed: 15.0,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "bernoulli".to_string(),
            explore: true,
            prob_listen: 0.5,
            seed: 0,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file and validate it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.sweep.num_seeds, 1..100_000).context("invalid number of seeds")?;
        check_num(self.sweep.max_time_steps, 1..1_000_000)
            .context("invalid number of time steps")?;

        check_num(self.env.num_agents, 1..10_000).context("invalid number of agents")?;
        check_pos(self.env.dt).context("invalid time increment")?;
        check_pos(self.env.init_pos_spread).context("invalid initial position spread")?;
        check_pos(self.env.init_speed).context("invalid initial speed")?;

        check_num(self.model.prob_listen, 0.0..=1.0).context("invalid listening probability")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_pos(num: f32) -> Result<()> {
    if !(num > 0.0) {
        bail!("number must be positive, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            "[sweep]\nnum_seeds = 2\nmax_time_steps = 5\n\n[env]\nnum_agents = 4\n",
        )
        .unwrap();
        assert_eq!(config.sweep.num_seeds, 2);
        assert_eq!(config.sweep.start_seed, 120);
        assert_eq!(config.env.num_agents, 4);
        assert_eq!(config.model.name, "bernoulli");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        config.env.num_agents = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sweep.max_time_steps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.env.dt = -0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.prob_listen = 1.5;
        assert!(config.validate().is_err());
    }
}
