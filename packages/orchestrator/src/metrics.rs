//! Prometheus metrics for the Peggy orchestrator
//!
//! Registered in the default registry and exposed on `/metrics` by
//! [`crate::server`].

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Gauge, GaugeVec,
};

lazy_static! {
    // Loop driver
    pub static ref LOOP_ITERATIONS: CounterVec = register_counter_vec!(
        "orchestrator_loop_iterations_total",
        "Total number of loop iterations run",
        &["loop"]
    ).expect("constant metric name is valid");

    pub static ref LOOP_ERRORS: CounterVec = register_counter_vec!(
        "orchestrator_loop_errors_total",
        "Total number of loop iterations that returned an error",
        &["loop"]
    ).expect("constant metric name is valid");

    pub static ref LOOP_LAST_SUCCESS: GaugeVec = register_gauge_vec!(
        "orchestrator_loop_last_success_timestamp",
        "Unix timestamp of the last successful iteration",
        &["loop"]
    ).expect("constant metric name is valid");

    // Oracle
    pub static ref CLAIMS_SENT: CounterVec = register_counter_vec!(
        "orchestrator_claims_sent_total",
        "Total number of Ethereum event claims submitted to Cosmos",
        &["kind"]
    ).expect("constant metric name is valid");

    pub static ref LAST_OBSERVED_ETH_HEIGHT: Gauge = register_gauge!(
        "orchestrator_last_observed_eth_height",
        "Highest Ethereum block the oracle has fully scanned"
    ).expect("constant metric name is valid");

    pub static ref ORACLE_RESYNCS: CounterVec = register_counter_vec!(
        "orchestrator_oracle_resyncs_total",
        "Times the oracle rewound to the last accepted claim",
        &["reason"]
    ).expect("constant metric name is valid");

    // Signer
    pub static ref CONFIRMATIONS_SENT: CounterVec = register_counter_vec!(
        "orchestrator_confirmations_sent_total",
        "Total number of valset and batch confirmations submitted",
        &["kind"]
    ).expect("constant metric name is valid");

    // Relayer
    pub static ref VALSETS_RELAYED: Counter = register_counter!(
        "orchestrator_valsets_relayed_total",
        "Total number of valset updates sent to Ethereum"
    ).expect("constant metric name is valid");

    pub static ref BATCHES_RELAYED: CounterVec = register_counter_vec!(
        "orchestrator_batches_relayed_total",
        "Total number of transaction batches sent to Ethereum",
        &["token"]
    ).expect("constant metric name is valid");

    // Batch requester
    pub static ref BATCH_REQUESTS: CounterVec = register_counter_vec!(
        "orchestrator_batch_requests_total",
        "Total number of batch requests submitted",
        &["denom", "status"]
    ).expect("constant metric name is valid");

    // Health
    pub static ref UP: Gauge = register_gauge!(
        "orchestrator_up",
        "Whether the orchestrator is up and running"
    ).expect("constant metric name is valid");
}

/// Record one finished loop iteration
pub fn record_iteration(loop_name: &str, success: bool) {
    LOOP_ITERATIONS.with_label_values(&[loop_name]).inc();
    if success {
        LOOP_LAST_SUCCESS
            .with_label_values(&[loop_name])
            .set(chrono::Utc::now().timestamp() as f64);
    } else {
        LOOP_ERRORS.with_label_values(&[loop_name]).inc();
    }
}

pub fn record_claim_sent(kind: &str) {
    CLAIMS_SENT.with_label_values(&[kind]).inc();
}

pub fn record_oracle_resync(reason: &str) {
    ORACLE_RESYNCS.with_label_values(&[reason]).inc();
}

pub fn set_last_observed_eth_height(height: u64) {
    LAST_OBSERVED_ETH_HEIGHT.set(height as f64);
}

pub fn record_confirmation_sent(kind: &str) {
    CONFIRMATIONS_SENT.with_label_values(&[kind]).inc();
}

pub fn record_valset_relayed() {
    VALSETS_RELAYED.inc();
}

pub fn record_batch_relayed(token: &str) {
    BATCHES_RELAYED.with_label_values(&[token]).inc();
}

pub fn record_batch_request(denom: &str, success: bool) {
    let status = if success { "success" } else { "failed" };
    BATCH_REQUESTS.with_label_values(&[denom, status]).inc();
}
