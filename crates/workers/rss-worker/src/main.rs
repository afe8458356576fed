//! Entrypoint for the RSS worker process (spec.md §4.I).

mod feed;
mod handler;
mod ratelimit;

fn main() {
    worker_runtime::run_worker_main(worker_protocol::WorkerKind::Rss, handler::RssHandler::new());
}
