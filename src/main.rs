//! Slotkeeper demo entry point
//!
//! Opens a file-backed store, registers the bundled save slots, plays through
//! a short session of host ticks and shuts down. Run it twice against the
//! same file to watch the data (and the run-once sentinel) carry over.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "slotkeeper.json".to_string());

    if let Err(e) = native::run(std::path::Path::new(&path)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Browser hosts drive StorageModule directly over LocalStorage
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    use slotkeeper::consts::DEFAULT_KEY_PREFIX;
    use slotkeeper::platform::FileStore;
    use slotkeeper::{
        HighScores, RecordSet, RunOnce, StorageCommon, StorageError, StorageModule,
        StorageSettings,
    };

    /// Simulated frame time (60 Hz)
    const FRAME_DT: f32 = 1.0 / 60.0;

    pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Slotkeeper demo starting ({})", path.display());

        let store = FileStore::open(path)?;
        let settings = StorageSettings::load(&store, DEFAULT_KEY_PREFIX);
        let mut storage = StorageModule::with_settings(store, settings);

        storage.initialize(
            RecordSet::new()
                .with(StorageCommon::default())
                .with(HighScores::default()),
            true,
        )?;

        let first_run = storage.run_once(|registry| {
            let common = registry.get_mut::<StorageCommon>()?;
            common.set_player_name("Player1");
            common.set_coins(100);
            Ok::<(), StorageError>(())
        })?;
        if first_run == RunOnce::Ran {
            log::info!("First run: starter pack granted");
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        {
            let common = storage.get_mut::<StorageCommon>()?;
            common.set_level(common.level() + 1);
            common.set_last_login_time(now.as_secs());
        }
        {
            let scores = storage.get_mut::<HighScores>()?;
            let score = (now.as_secs() % 5000) + 1;
            if let Some(rank) = scores.add_score(score, 3, now.as_millis() as f64) {
                log::info!("New high score {} at rank {}", score, rank);
            }
            scores.stats_mut().record_run(3);
        }

        // Rewards computed off the main thread land on the next flush
        let queue = storage.task_queue();
        std::thread::spawn(move || {
            queue.push(|registry| {
                if let Ok(common) = registry.get_mut::<StorageCommon>() {
                    common.add_coins(10);
                }
            });
        })
        .join()
        .map_err(|_| "reward thread panicked")?;

        // Two seconds of frames: one interval flush along the way
        let mut flushes = 0;
        for _ in 0..120 {
            if storage.tick(FRAME_DT) {
                flushes += 1;
            }
        }

        let common = storage.get::<StorageCommon>()?;
        log::info!(
            "{} is level {} with {} coins ({} flush(es), version {})",
            common.player_name(),
            common.level(),
            common.coins(),
            flushes,
            storage.local_version()
        );

        storage.shutdown();
        Ok(())
    }
}
