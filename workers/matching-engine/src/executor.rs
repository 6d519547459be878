//! The engine's execution loop: drains the job queue, mutates the books,
//! and hands struck matches to the settlement manager

use std::collections::HashMap;

use common::{
    types::{now_millis, PrivateOrder},
    CancelChannel,
};
use external_api::bus_message::{publish_event, SystemBusMessage};
use job_types::{
    matching_engine::{MatchingEngineJob, MatchingEngineReceiver, OrderSubmissionResult},
    settlement_manager::{SettlementManagerJob, SettlementManagerQueue},
};
use state::State;
use system_bus::SystemBus;
use tracing::{debug, info, warn};

use crate::{book::AssetBook, error::MatchingEngineError};

/// The executor owning every asset's book
pub struct MatchingExecutor {
    /// The queue on which the executor receives jobs
    job_queue: MatchingEngineReceiver,
    /// The books, one per asset
    books: HashMap<String, AssetBook>,
    /// The settlement manager's queue, for handing off struck matches
    settlement_queue: SettlementManagerQueue,
    /// A handle on the global state
    state: State,
    /// The system bus onto which order and match events are published
    bus: SystemBus<SystemBusMessage>,
    /// The channel on which the coordinator may cancel execution
    cancel_channel: CancelChannel,
}

impl MatchingExecutor {
    /// Construct a new executor
    pub fn new(
        job_queue: MatchingEngineReceiver,
        settlement_queue: SettlementManagerQueue,
        state: State,
        bus: SystemBus<SystemBusMessage>,
        cancel_channel: CancelChannel,
    ) -> Self {
        Self {
            job_queue,
            books: HashMap::new(),
            settlement_queue,
            state,
            bus,
            cancel_channel,
        }
    }

    /// The execution loop: blocks on the job queue until cancelled
    pub fn run(mut self) -> Result<(), MatchingEngineError> {
        info!("starting matching engine executor");
        loop {
            // Check the cancel channel before blocking on a job
            if self
                .cancel_channel
                .has_changed()
                .map_err(|err| MatchingEngineError::Cancelled(err.to_string()))?
            {
                info!("matching engine cancelled, shutting down...");
                return Err(MatchingEngineError::Cancelled(
                    "received cancel signal".to_string(),
                ));
            }

            let job = self
                .job_queue
                .recv()
                .map_err(|err| MatchingEngineError::JobQueueClosed(err.to_string()))?;
            self.handle_job(job);
        }
    }

    /// Dispatch a single job
    fn handle_job(&mut self, job: MatchingEngineJob) {
        match job {
            MatchingEngineJob::SubmitOrder { order, response_channel } => {
                let result = self.handle_submit(order);
                // The submitter may have hung up; nothing more to do
                let _ = response_channel.send(result);
            },
            MatchingEngineJob::ExpireOrders { now_ms } => self.handle_expiry(now_ms),
        }
    }

    /// Ingest an order, run a matching pass on its asset, and report back
    fn handle_submit(&mut self, order: PrivateOrder) -> OrderSubmissionResult {
        let asset = order.asset_address.clone();
        let order_id = order.id;
        let trader = order.trader.clone();
        let side = order.side;

        let book = self.books.entry(asset.clone()).or_default();
        let timestamp = book.add_order(order, now_millis());

        publish_event(
            &self.bus,
            SystemBusMessage::OrderSubmitted {
                asset: asset.clone(),
                trader,
                side,
                timestamp,
            },
        );

        let matches = book.match_orders(timestamp);

        // If the submitted order is still resting, explain the absence of a
        // match for the API surface
        let no_match_reason = if matches.is_empty() {
            book.order(order_id).and_then(|o| book.no_match_reason(o))
        } else {
            None
        };

        let book_snapshot = book.snapshot(&asset);
        self.state.publish_book_snapshot(book_snapshot.clone());

        for match_result in &matches {
            debug!(
                match_id = %match_result.match_id,
                asset = %asset,
                "struck match at price {}",
                match_result.execution_price,
            );

            self.state.record_match(match_result.clone());
            publish_event(
                &self.bus,
                SystemBusMessage::OrderMatched {
                    match_id: match_result.match_id.clone(),
                    buyer_address: match_result.buyer().to_string(),
                    seller_address: match_result.seller().to_string(),
                    asset: asset.clone(),
                    execution_price: match_result.execution_price.to_string(),
                    execution_quantity: match_result.execution_quantity.to_string(),
                    timestamp: match_result.timestamp,
                },
            );

            // Hand the match to the settlement manager to drive through
            // proving and signature collection
            if self
                .settlement_queue
                .send(SettlementManagerJob::NewMatch { match_result: match_result.clone() })
                .is_err()
            {
                warn!("settlement manager hung up; match remains in the pending queue");
            }
        }

        OrderSubmissionResult { matches, book_snapshot, no_match_reason }
    }

    /// Sweep expired orders off every book and republish affected snapshots
    fn handle_expiry(&mut self, now_ms: u64) {
        for (asset, book) in self.books.iter_mut() {
            let removed = book.expire_orders(now_ms);
            if removed > 0 {
                debug!("expired {removed} orders on {asset}");
                self.state.publish_book_snapshot(book.snapshot(asset));
            }
        }
    }
}
