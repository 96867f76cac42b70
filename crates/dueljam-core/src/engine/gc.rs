//! Deferred deallocation of sample data
//!
//! Decoded PCM is wrapped in `basedrop::Shared`. When the last reference is
//! dropped (typically when a finished voice is pruned on the engine thread)
//! the buffer is queued for the collector thread instead of being freed in
//! place, so the render pass never pays for a large deallocation.

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

/// How often the collector thread reclaims queued allocations
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread only
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            // Without a collector thread, leak the collector so handles stay
            // valid; allocations are then reclaimed only at process exit.
            log::error!("Failed to start audio GC thread; deferred drops will not be collected");
            let collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for creating `Shared<T>` allocations
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
