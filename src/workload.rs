use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::ConfigError;

/// One request to issue: `GET {base}/{path}/{entity_id}/{item_count}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Task {
    pub endpoint: String,
    pub entity_id: u64,
    pub item_count: u32,
}

/// Seeded generator when `seed` is set, OS entropy otherwise.
pub fn workload_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Builds the full workload described by `config`.
pub fn generate_tasks<R: Rng + ?Sized>(
    config: &Config,
    rng: &mut R,
) -> Result<Vec<Task>, ConfigError> {
    let endpoints = config.endpoint_keys();
    let tasks = generate(
        &endpoints,
        &config.entity_ids,
        &config.load_sizes,
        config.repetitions,
        rng,
    )?;
    info!(
        tasks = tasks.len(),
        endpoints = endpoints.len(),
        load_sizes = config.load_sizes.len(),
        repetitions = config.repetitions,
        "workload generated"
    );
    Ok(tasks)
}

/// Produces `load_sizes * repetitions * endpoints` tasks.
///
/// Each repetition draws one entity id and reuses it for every endpoint, so
/// all backends are measured against the same sample at a given load size.
pub fn generate<R: Rng + ?Sized>(
    endpoints: &[&str],
    entity_ids: &[u64],
    load_sizes: &[u32],
    repetitions: u32,
    rng: &mut R,
) -> Result<Vec<Task>, ConfigError> {
    if entity_ids.is_empty() {
        return Err(ConfigError::EmptyEntityPool);
    }

    let mut tasks =
        Vec::with_capacity(load_sizes.len() * repetitions as usize * endpoints.len());

    for &item_count in load_sizes {
        for _ in 0..repetitions {
            let Some(&entity_id) = entity_ids.choose(&mut *rng) else {
                return Err(ConfigError::EmptyEntityPool);
            };
            tasks.extend(endpoints.iter().map(|endpoint| Task {
                endpoint: (*endpoint).to_string(),
                entity_id,
                item_count,
            }));
        }
    }

    Ok(tasks)
}
