//! Composition root: wires the `ThreadManager`, `ResourceManager`, and
//! `ProcessSupervisor` together and demonstrates the public surface they
//! expose (spec.md §2, §6). This binary owns no business logic of its
//! own — the worker crates and library crates do the real work.

use resource_manager::ResourceManager;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use supervisor::ProcessSupervisor;
use thread_manager::ThreadManager;
use tracing::info;
use tracing_subscriber::EnvFilter;
use worker_protocol::{MessageType, WorkerKind};

/// Binary name (as built by Cargo) for each worker kind's OS process.
const WORKER_BINARIES: [(WorkerKind, &str); 4] = [
    (WorkerKind::Image, "image-worker"),
    (WorkerKind::Rss, "rss-worker"),
    (WorkerKind::Fft, "fft-worker"),
    (WorkerKind::Transition, "transition-worker"),
];

fn main() -> anyhow::Result<()> {
    init_logging();

    let resources = ResourceManager::new();
    let threads = ThreadManager::new(&resources)?;
    let supervisor = ProcessSupervisor::new(resources.clone());

    for (kind, binary_name) in WORKER_BINARIES {
        let path = sibling_binary_path(binary_name)?;
        supervisor.register_worker_factory(kind, Box::new(move || Command::new(&path)));
    }

    supervisor.start(WorkerKind::Fft)?;
    demonstrate_fft_round_trip(&supervisor)?;

    supervisor.shutdown(Duration::from_secs(5));
    resources.cleanup_all();
    drop(threads);

    info!("screensaver-engine composition root exiting");
    Ok(())
}

/// Sends one quiet `FftFrame` through the running FFT worker and logs its
/// response, exercising `send_message`/`poll_responses`/`tick` together.
fn demonstrate_fft_round_trip(supervisor: &ProcessSupervisor) -> anyhow::Result<()> {
    let samples = vec![0.0_f64; 4410];
    supervisor.send_message(WorkerKind::Fft, MessageType::FftFrame, serde_json::json!({ "samples": samples }))?;

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        supervisor.tick();
        let responses = supervisor.poll_responses(WorkerKind::Fft, 8);
        if let Some(response) = responses.into_iter().find(|r| r.msg_type == MessageType::FftBars) {
            info!(bars = ?response.payload.get("bars"), "received fft bars from worker");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    info!("fft worker did not respond before the demo deadline");
    Ok(())
}

/// Resolves a worker binary's path as a sibling of this process's own
/// executable, the way Cargo lays out every workspace binary in one
/// `target/<profile>` directory.
fn sibling_binary_path(name: &str) -> anyhow::Result<PathBuf> {
    let mut path = std::env::current_exe()?;
    path.pop();
    path.push(exe_name(name));
    Ok(path)
}

#[cfg(windows)]
fn exe_name(name: &str) -> String {
    format!("{name}.exe")
}

#[cfg(not(windows))]
fn exe_name(name: &str) -> String {
    name.to_string()
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
}
