use tracing::trace;

// Counters and timings are emitted as trace events; no exporter is installed.

pub fn inc_requests(route: &'static str) {
    trace!(target = "owlow.metrics", route = route, "requests_total_inc");
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128, listings: usize) {
    trace!(
        target = "owlow.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        listings = listings,
        "stage_elapsed"
    );
}
