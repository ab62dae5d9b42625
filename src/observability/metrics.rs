use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub transitions_total: IntCounterVec,
    pub otp_verifications_total: IntCounterVec,
    pub tracking_writes_total: IntCounter,
    pub simulation_ticks_total: IntCounter,
    pub active_simulations: IntGauge,
    pub geocode_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Orders created since start")
                .expect("valid orders_created_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Order status transitions by target and outcome"),
            &["to", "outcome"],
        )
        .expect("valid transitions_total metric");

        let otp_verifications_total = IntCounterVec::new(
            Opts::new("otp_verifications_total", "Delivery code checks by outcome"),
            &["outcome"],
        )
        .expect("valid otp_verifications_total metric");

        let tracking_writes_total = IntCounter::new(
            "tracking_writes_total",
            "Tracking record writes (init, advance, simulation ticks)",
        )
        .expect("valid tracking_writes_total metric");

        let simulation_ticks_total =
            IntCounter::new("simulation_ticks_total", "Simulation loop ticks processed")
                .expect("valid simulation_ticks_total metric");

        let active_simulations =
            IntGauge::new("active_simulations", "Currently running simulation loops")
                .expect("valid active_simulations metric");

        let geocode_seconds = Histogram::with_opts(HistogramOpts::new(
            "geocode_seconds",
            "Latency of mock address resolution in seconds",
        ))
        .expect("valid geocode_seconds metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(otp_verifications_total.clone()))
            .expect("register otp_verifications_total");
        registry
            .register(Box::new(tracking_writes_total.clone()))
            .expect("register tracking_writes_total");
        registry
            .register(Box::new(simulation_ticks_total.clone()))
            .expect("register simulation_ticks_total");
        registry
            .register(Box::new(active_simulations.clone()))
            .expect("register active_simulations");
        registry
            .register(Box::new(geocode_seconds.clone()))
            .expect("register geocode_seconds");

        Self {
            registry,
            orders_created_total,
            transitions_total,
            otp_verifications_total,
            tracking_writes_total,
            simulation_ticks_total,
            active_simulations,
            geocode_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
