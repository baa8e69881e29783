//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Store ---
    pub tx_committed: AtomicU64,
    pub tx_conflicts: AtomicU64,
    pub tx_aborted: AtomicU64,
    pub tx_retries_exhausted: AtomicU64,

    // --- Grants (check-in, ads, referral, signup) ---
    pub grants_ok: AtomicU64,
    pub grants_denied: AtomicU64,

    // --- Campaigns ---
    pub campaigns_created: AtomicU64,
    pub claims_ok: AtomicU64,
    pub claims_exhausted: AtomicU64,
    pub claims_rejected: AtomicU64,

    // --- Moderation ---
    pub withdrawals_requested: AtomicU64,
    pub deposits_requested: AtomicU64,
    pub requests_resolved: AtomicU64,

    // --- HTTP ---
    pub http_requests: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            tx_committed: AtomicU64::new(0),
            tx_conflicts: AtomicU64::new(0),
            tx_aborted: AtomicU64::new(0),
            tx_retries_exhausted: AtomicU64::new(0),
            grants_ok: AtomicU64::new(0),
            grants_denied: AtomicU64::new(0),
            campaigns_created: AtomicU64::new(0),
            claims_ok: AtomicU64::new(0),
            claims_exhausted: AtomicU64::new(0),
            claims_rejected: AtomicU64::new(0),
            withdrawals_requested: AtomicU64::new(0),
            deposits_requested: AtomicU64::new(0),
            requests_resolved: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
        }
    }

    /// Count a grant attempt by outcome.
    pub fn record_grant<T, E>(&self, result: &Result<T, E>) {
        let counter = if result.is_ok() {
            &self.grants_ok
        } else {
            &self.grants_denied
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, documents: usize, config_version: u64) -> String {
        let tx_committed = self.tx_committed.load(Ordering::Relaxed);
        let tx_conflicts = self.tx_conflicts.load(Ordering::Relaxed);
        let tx_aborted = self.tx_aborted.load(Ordering::Relaxed);
        let tx_exhausted = self.tx_retries_exhausted.load(Ordering::Relaxed);
        let grants_ok = self.grants_ok.load(Ordering::Relaxed);
        let grants_denied = self.grants_denied.load(Ordering::Relaxed);
        let campaigns_created = self.campaigns_created.load(Ordering::Relaxed);
        let claims_ok = self.claims_ok.load(Ordering::Relaxed);
        let claims_exhausted = self.claims_exhausted.load(Ordering::Relaxed);
        let claims_rejected = self.claims_rejected.load(Ordering::Relaxed);
        let withdrawals = self.withdrawals_requested.load(Ordering::Relaxed);
        let deposits = self.deposits_requested.load(Ordering::Relaxed);
        let resolved = self.requests_resolved.load(Ordering::Relaxed);
        let http_requests = self.http_requests.load(Ordering::Relaxed);

        format!(
            "\
# HELP earnhub_tx_committed_total Store transactions committed.\n\
# TYPE earnhub_tx_committed_total counter\n\
earnhub_tx_committed_total {tx_committed}\n\
# HELP earnhub_tx_conflicts_total Commits rejected by read-set validation and re-run.\n\
# TYPE earnhub_tx_conflicts_total counter\n\
earnhub_tx_conflicts_total {tx_conflicts}\n\
# HELP earnhub_tx_aborted_total Transactions aborted by a typed engine error.\n\
# TYPE earnhub_tx_aborted_total counter\n\
earnhub_tx_aborted_total {tx_aborted}\n\
# HELP earnhub_tx_retries_exhausted_total Transactions that gave up after repeated conflicts.\n\
# TYPE earnhub_tx_retries_exhausted_total counter\n\
earnhub_tx_retries_exhausted_total {tx_exhausted}\n\
# HELP earnhub_grants_ok_total One-time or capped grants applied.\n\
# TYPE earnhub_grants_ok_total counter\n\
earnhub_grants_ok_total {grants_ok}\n\
# HELP earnhub_grants_denied_total Grants refused (already done, cap, validation).\n\
# TYPE earnhub_grants_denied_total counter\n\
earnhub_grants_denied_total {grants_denied}\n\
# HELP earnhub_campaigns_created_total Campaigns funded by escrow.\n\
# TYPE earnhub_campaigns_created_total counter\n\
earnhub_campaigns_created_total {campaigns_created}\n\
# HELP earnhub_claims_ok_total Campaign units claimed.\n\
# TYPE earnhub_claims_ok_total counter\n\
earnhub_claims_ok_total {claims_ok}\n\
# HELP earnhub_claims_exhausted_total Claims that found no remaining inventory.\n\
# TYPE earnhub_claims_exhausted_total counter\n\
earnhub_claims_exhausted_total {claims_exhausted}\n\
# HELP earnhub_claims_rejected_total Claims refused for other reasons.\n\
# TYPE earnhub_claims_rejected_total counter\n\
earnhub_claims_rejected_total {claims_rejected}\n\
# HELP earnhub_withdrawals_requested_total Withdrawal requests escrowed.\n\
# TYPE earnhub_withdrawals_requested_total counter\n\
earnhub_withdrawals_requested_total {withdrawals}\n\
# HELP earnhub_deposits_requested_total Deposit requests recorded.\n\
# TYPE earnhub_deposits_requested_total counter\n\
earnhub_deposits_requested_total {deposits}\n\
# HELP earnhub_requests_resolved_total Moderation requests resolved.\n\
# TYPE earnhub_requests_resolved_total counter\n\
earnhub_requests_resolved_total {resolved}\n\
# HELP earnhub_http_requests_total API requests received.\n\
# TYPE earnhub_http_requests_total counter\n\
earnhub_http_requests_total {http_requests}\n\
# HELP earnhub_store_documents Documents held by the store.\n\
# TYPE earnhub_store_documents gauge\n\
earnhub_store_documents {documents}\n\
# HELP earnhub_reward_config_version Active reward config snapshot version.\n\
# TYPE earnhub_reward_config_version gauge\n\
earnhub_reward_config_version {config_version}\n"
        )
    }
}
