//! Prometheus metrics for the transaction pool

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};

lazy_static! {
    /// Current number of transactions per stage
    pub static ref POOL_STAGE_SIZE: IntGaugeVec = register_int_gauge_vec!(
        "tx_pool_stage_size",
        "Current number of transactions per stage",
        &["stage"]
    )
    .unwrap();

    /// Transactions processed by manager phase and outcome
    pub static ref POOL_TRANSACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tx_pool_transactions_total",
        "Transactions processed by manager phase and outcome",
        &["phase", "outcome"]
    )
    .unwrap();

    /// Transactions removed because their pool lifetime elapsed
    pub static ref POOL_EXPIRED_TOTAL: IntCounter = register_int_counter!(
        "tx_pool_expired_total",
        "Transactions removed because their pool lifetime elapsed"
    )
    .unwrap();

    /// Manager tick duration
    pub static ref POOL_TICK_DURATION: Histogram = register_histogram!(
        "tx_pool_tick_duration_seconds",
        "Manager tick duration in seconds"
    )
    .unwrap();
}
