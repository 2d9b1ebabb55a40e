use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::domain::ports::{GatewayOrder, PaymentGateway};
use crate::error::{FestError, Result};

/// Deterministic in-process gateway for tests and script runs.
///
/// Issues sequential order ids and never talks to the network; the real HTTP
/// adapter lives outside this core, which only depends on the order-id
/// contract.
#[derive(Default)]
pub struct MockGateway {
    counter: AtomicU64,
    failing: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `create_order` calls fail, to exercise the caller's
    /// retry path.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        _receipt: &str,
    ) -> Result<GatewayOrder> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FestError::Gateway(
                "order creation failed: gateway unavailable".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder {
            order_id: format!("order_{n:06}"),
            amount_minor,
            currency: currency.to_string(),
        })
    }
}
