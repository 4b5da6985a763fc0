//! Fixed-shape telemetry storage for a full collection run.

use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array3, Array5, s};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Telemetry of a single (seed, algorithm) episode.
///
/// Leading dimension is the time step; produced by the engine and copied
/// into a [`RunRecord`] slot by the sweep driver.
pub struct EpisodeRecord {
    pub trajectories: Array3<f32>,
    pub velocities: Array3<f32>,
    pub actions: Array3<i8>,
    pub action_probs: Array3<f32>,
    pub rewards: Array1<f32>,
    pub control: Array1<f32>,
    pub spatial_entropy: Array1<f32>,
    pub velocity_entropy: Array1<f32>,
}

impl EpisodeRecord {
    pub fn new(max_time_steps: usize, n_agents: usize) -> Self {
        Self {
            trajectories: Array3::zeros((max_time_steps, n_agents, 2)),
            velocities: Array3::zeros((max_time_steps, n_agents, 2)),
            actions: Array3::zeros((max_time_steps, n_agents, n_agents)),
            action_probs: Array3::zeros((max_time_steps, n_agents, n_agents)),
            rewards: Array1::zeros(max_time_steps),
            control: Array1::zeros(max_time_steps),
            spatial_entropy: Array1::zeros(max_time_steps),
            velocity_entropy: Array1::zeros(max_time_steps),
        }
    }
}

/// Full result set of a collection run.
///
/// Preallocated once with extents `(num_seeds, num_algos, max_time_steps)`
/// plus per-agent (and, for the action fields, agent-by-agent) trailing
/// dimensions; populated by the sweep driver and written out whole at the
/// end of the run.
#[derive(Serialize, Deserialize)]
pub struct RunRecord {
    pub trajectories: Array5<f32>,
    pub velocities: Array5<f32>,
    pub spatial_entropy: Array3<f32>,
    pub velocity_entropy: Array3<f32>,
    pub actions: Array5<i8>,
    pub action_probs: Array5<f32>,
    pub rewards: Array3<f32>,
    pub control: Array3<f32>,
    pub algo_str: Vec<String>,
    pub seeds: Vec<u64>,
    pub originated_from: String,
}

impl RunRecord {
    pub fn new(
        seeds: Vec<u64>,
        algo_str: Vec<String>,
        max_time_steps: usize,
        n_agents: usize,
    ) -> Self {
        let n_seeds = seeds.len();
        let n_algos = algo_str.len();
        Self {
            trajectories: Array5::zeros((n_seeds, n_algos, max_time_steps, n_agents, 2)),
            velocities: Array5::zeros((n_seeds, n_algos, max_time_steps, n_agents, 2)),
            spatial_entropy: Array3::zeros((n_seeds, n_algos, max_time_steps)),
            velocity_entropy: Array3::zeros((n_seeds, n_algos, max_time_steps)),
            actions: Array5::zeros((n_seeds, n_algos, max_time_steps, n_agents, n_agents)),
            action_probs: Array5::zeros((n_seeds, n_algos, max_time_steps, n_agents, n_agents)),
            rewards: Array3::zeros((n_seeds, n_algos, max_time_steps)),
            control: Array3::zeros((n_seeds, n_algos, max_time_steps)),
            algo_str,
            seeds,
            originated_from: format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }

    /// Copy one episode into the `(i_seed, i_algo)` slot.
    pub fn store_episode(
        &mut self,
        i_seed: usize,
        i_algo: usize,
        episode: &EpisodeRecord,
    ) -> Result<()> {
        let exp_dim = self.trajectories.dim();
        let dim = episode.trajectories.dim();
        if dim != (exp_dim.2, exp_dim.3, exp_dim.4) {
            bail!(
                "episode trajectory shape must be {:?}, but is {:?}",
                (exp_dim.2, exp_dim.3, exp_dim.4),
                dim
            );
        }
        if i_seed >= exp_dim.0 || i_algo >= exp_dim.1 {
            bail!(
                "episode slot ({i_seed}, {i_algo}) is outside the sweep extents ({}, {})",
                exp_dim.0,
                exp_dim.1
            );
        }

        self.trajectories
            .slice_mut(s![i_seed, i_algo, .., .., ..])
            .assign(&episode.trajectories);
        self.velocities
            .slice_mut(s![i_seed, i_algo, .., .., ..])
            .assign(&episode.velocities);
        self.actions
            .slice_mut(s![i_seed, i_algo, .., .., ..])
            .assign(&episode.actions);
        self.action_probs
            .slice_mut(s![i_seed, i_algo, .., .., ..])
            .assign(&episode.action_probs);
        self.rewards
            .slice_mut(s![i_seed, i_algo, ..])
            .assign(&episode.rewards);
        self.control
            .slice_mut(s![i_seed, i_algo, ..])
            .assign(&episode.control);
        self.spatial_entropy
            .slice_mut(s![i_seed, i_algo, ..])
            .assign(&episode.spatial_entropy);
        self.velocity_entropy
            .slice_mut(s![i_seed, i_algo, ..])
            .assign(&episode.velocity_entropy);

        Ok(())
    }

    /// Serialize the full record to a MessagePack archive.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize record")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved record archive.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let record = decode::from_read(&mut reader).context("failed to deserialize record")?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_record() -> RunRecord {
        RunRecord::new(vec![3, 4], vec!["full_comm".to_string()], 5, 4)
    }

    #[test]
    fn arrays_have_the_declared_extents() {
        let record = small_record();
        assert_eq!(record.trajectories.dim(), (2, 1, 5, 4, 2));
        assert_eq!(record.actions.dim(), (2, 1, 5, 4, 4));
        assert_eq!(record.rewards.dim(), (2, 1, 5));
        assert_eq!(record.spatial_entropy.dim(), (2, 1, 5));
    }

    #[test]
    fn store_episode_rejects_bad_slots_and_shapes() {
        let mut record = small_record();

        let episode = EpisodeRecord::new(5, 4);
        assert!(record.store_episode(2, 0, &episode).is_err());
        assert!(record.store_episode(0, 1, &episode).is_err());

        let episode = EpisodeRecord::new(3, 4);
        assert!(record.store_episode(0, 0, &episode).is_err());
    }

    #[test]
    fn record_round_trips_through_the_archive() {
        let mut record = small_record();
        let mut episode = EpisodeRecord::new(5, 4);
        episode.rewards[2] = -0.25;
        episode.actions[[2, 1, 3]] = 1;
        record.store_episode(1, 0, &episode).unwrap();

        let file = std::env::temp_dir().join("lazylisten-record-round-trip.msgpack");
        record.save(&file).unwrap();
        let loaded = RunRecord::load(&file).unwrap();
        std::fs::remove_file(&file).ok();

        assert_eq!(loaded.rewards, record.rewards);
        assert_eq!(loaded.actions, record.actions);
        assert_eq!(loaded.algo_str, record.algo_str);
        assert_eq!(loaded.seeds, record.seeds);
    }
}
