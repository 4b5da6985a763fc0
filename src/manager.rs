use crate::config::Config;
use crate::engine::Engine;
use crate::env::SwarmEnv;
use crate::model::ModelRegistry;
use crate::policy;
use crate::record::RunRecord;
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Instant, SystemTime},
};

pub struct Manager {
    out_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(out_dir: P, config_file: Option<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();

        let cfg = match config_file {
            Some(file) => Config::from_file(file).context("failed to load cfg")?,
            None => Config::default(),
        };
        log::info!("{cfg:#?}");

        Ok(Self { out_dir, cfg })
    }

    /// Run the full seed-by-algorithm sweep and write the result archive.
    pub fn collect(&self) -> Result<()> {
        let start = Instant::now();

        let roster = policy::roster();
        let algo_str: Vec<String> = roster.iter().map(|(label, _)| label.clone()).collect();
        let seeds: Vec<u64> = (0..self.cfg.sweep.num_seeds)
            .map(|i| self.cfg.sweep.start_seed + i as u64)
            .collect();

        let max_time_steps = self.cfg.sweep.max_time_steps;
        let n_agents = self.cfg.env.num_agents;
        let mut record = RunRecord::new(seeds.clone(), algo_str, max_time_steps, n_agents);

        let registry = ModelRegistry::with_builtins();
        let mut model = registry
            .build(&self.cfg.model)
            .context("failed to build policy model")?;

        let env = SwarmEnv::new(self.cfg.env.clone(), max_time_steps);
        let mut engine = Engine::new(env, max_time_steps);

        for (i_seed, &seed) in seeds.iter().enumerate() {
            for (i_algo, (label, algo)) in roster.iter().enumerate() {
                let episode = engine
                    .run_episode(seed, *algo, model.as_mut(), self.cfg.model.explore)
                    .with_context(|| {
                        format!("failed to run episode (seed {seed}, algorithm {label})")
                    })?;
                record
                    .store_episode(i_seed, i_algo, &episode)
                    .context("failed to store episode")?;
            }
            log::info!(
                "completed seed {}/{} ({seed}) after {:.2?}",
                i_seed + 1,
                seeds.len(),
                start.elapsed()
            );
        }

        let timestamp = file_timestamp();
        let run_dir = self.out_dir.join(&timestamp);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;

        let archive = run_dir.join(format!(
            "collect_seed_{}-{}_{}.msgpack",
            seeds[0],
            seeds[seeds.len() - 1],
            timestamp
        ));
        record
            .save(&archive)
            .context("failed to save record archive")?;
        log::info!("saved record archive at {archive:?}");

        let elapsed = start.elapsed().as_secs();
        log::info!(
            "elapsed time: {} days, {} hours, {} minutes, {} seconds",
            elapsed / 86400,
            (elapsed % 86400) / 3600,
            (elapsed % 3600) / 60,
            elapsed % 60
        );

        Ok(())
    }

    /// Validate the configuration and report the sweep without running it.
    pub fn check(&self) -> Result<()> {
        let roster = policy::roster();
        for (label, algo) in &roster {
            log::info!("algorithm {label}: {algo:?}");
        }
        log::info!(
            "sweep: {} seeds x {} algorithms x {} steps x {} agents",
            self.cfg.sweep.num_seeds,
            roster.len(),
            self.cfg.sweep.max_time_steps,
            self.cfg.env.num_agents
        );
        Ok(())
    }
}

/// Filesystem-safe timestamp, e.g. `2026-08-30_12-34-56`.
fn file_timestamp() -> String {
    let now = humantime::format_rfc3339_seconds(SystemTime::now()).to_string();
    now.trim_end_matches('Z').replace('T', "_").replace(':', "-")
}
