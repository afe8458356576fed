//! Entrypoint for the image worker process (spec.md §4.I).

mod handler;
mod resize;
mod shm;

fn main() {
    worker_runtime::run_worker_main(worker_protocol::WorkerKind::Image, handler::ImageHandler::new());
}
