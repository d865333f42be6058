use std::sync::atomic::AtomicUsize;
use std::sync::Once;
use log::debug;

static POOL_INIT: Once = Once::new();

pub trait ParallelProcessor {
    /// Configures the global rayon pool once per process. Later calls, and
    /// calls after another component already built the pool, are no-ops.
    fn init_parallel_processing(threads: Option<usize>) {
        POOL_INIT.call_once(|| {
            let threads = threads.unwrap_or_else(num_cpus::get).max(1);
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
                Ok(()) => debug!("Using {} threads for metadata extraction", threads),
                Err(err) => debug!("Keeping existing thread pool: {}", err),
            }
        });
    }

    fn get_progress_counter() -> AtomicUsize {
        AtomicUsize::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Worker;
    impl ParallelProcessor for Worker {}

    #[test]
    fn repeated_initialisation_is_harmless() {
        Worker::init_parallel_processing(Some(2));
        Worker::init_parallel_processing(Some(8));
        assert!(rayon::current_num_threads() >= 1);
    }
}
