//! Worker pool for source parsing.

use anyhow::Result;

/// Initialize the global rayon thread pool with half the cores, at least one
/// worker. Fails if the global pool was already built.
pub fn init_thread_pool() -> Result<usize> {
    let cores = num_cpus::get();
    let workers = std::cmp::max(1, cores / 2);

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("callflow-parse-{i}"))
        .build_global()?;

    log::debug!("parse pool: {} workers ({} cores)", workers, cores);
    Ok(workers)
}
