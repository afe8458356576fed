//! Entrypoint for the FFT worker process (spec.md §4.I).

mod bands;
mod config;
mod handler;
mod pipeline;
mod profile;

fn main() {
    worker_runtime::run_worker_main(worker_protocol::WorkerKind::Fft, handler::FftHandler::new());
}
