//! Entrypoint for the transition worker process (spec.md §4.I).

mod cache;
mod config;
mod handler;
mod precompute;

fn main() {
    worker_runtime::run_worker_main(worker_protocol::WorkerKind::Transition, handler::TransitionHandler::new());
}
