use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Render queue metrics, kept in a registry owned by the queue instance.
pub struct RenderMetrics {
    registry: Registry,
    jobs: IntCounterVec,
    queue_depth: IntGauge,
    render_duration: Histogram,
    engine_launches: IntCounter,
    engine_restarts: IntCounterVec,
}

impl RenderMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let jobs = IntCounterVec::new(
            Opts::new("pdf_render_jobs_total", "PDF render jobs by outcome"),
            &["outcome"],
        )?;
        let queue_depth = IntGauge::new("pdf_render_queue_depth", "Requests waiting in the queue")?;
        let render_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pdf_render_duration_seconds",
                "Time from dequeue to settled result",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        let engine_launches =
            IntCounter::new("pdf_engine_launches_total", "Render engines launched")?;
        let engine_restarts = IntCounterVec::new(
            Opts::new(
                "pdf_engine_restarts_total",
                "Render engines discarded, by reason",
            ),
            &["reason"],
        )?;

        registry.register(Box::new(jobs.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(render_duration.clone()))?;
        registry.register(Box::new(engine_launches.clone()))?;
        registry.register(Box::new(engine_restarts.clone()))?;

        Ok(Self {
            registry,
            jobs,
            queue_depth,
            render_duration,
            engine_launches,
            engine_restarts,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.jobs.with_label_values(&[outcome]).inc();
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as i64);
    }

    pub fn observe_render(&self, elapsed: Duration) {
        self.render_duration.observe(elapsed.as_secs_f64());
    }

    pub fn engine_launched(&self) {
        self.engine_launches.inc();
    }

    pub fn engine_discarded(&self, reason: &str) {
        self.engine_restarts.with_label_values(&[reason]).inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.jobs.with_label_values(&[outcome]).get()
    }

    /// Prometheus text exposition of every metric in this registry.
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
