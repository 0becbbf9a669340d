//! Request id allocation and response correlation
//!
//! Every outgoing call gets a strictly increasing integer id, unique while
//! outstanding. Callers suspend on a oneshot receiver registered in the
//! pending table; the reader task resolves entries as documents are parsed.
//! The table lock is never held across an await, so registration and
//! resolution stay atomic with respect to each other even though callers and
//! the reader run on different tasks.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::rpc::protocol::{IncomingMessage, Response};
use crate::rpc::subscription::SubscriptionBus;
use crate::{ClientError, ClientResult};

/// Result for one batch entry, aligned with the caller's parameter list.
/// A server-side error for one entry fails that entry only, never the batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// The caller's original parameter for this position
    pub param: Value,
    /// The server's result, or its error payload for this one entry
    pub result: Result<Value, Value>,
}

type SingleSender = oneshot::Sender<ClientResult<Value>>;
type BatchSender = oneshot::Sender<ClientResult<Vec<BatchOutcome>>>;

struct PendingBatch {
    /// Original ordered parameter list, zipped back into the outcomes
    params: Vec<Value>,
    /// id -> input position; elements are matched by id, not array order
    positions: HashMap<u64, usize>,
    slots: Vec<Option<Result<Value, Value>>>,
    filled: usize,
    tx: BatchSender,
}

enum Pending {
    Single(SingleSender),
    Batch(PendingBatch),
}

#[derive(Default)]
struct DispatchState {
    last_id: u64,
    /// Singles keyed by their id; batches keyed by the last id of the batch
    pending: HashMap<u64, Pending>,
    /// Every batch member id -> the batch's table key
    members: HashMap<u64, u64>,
}

/// Tracks pending completions and resolves them against parsed documents
#[derive(Default)]
pub struct Dispatcher {
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and register a single pending request under it.
    pub fn register_single(&self) -> (u64, oneshot::Receiver<ClientResult<Value>>) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().expect("pending table poisoned");
        state.last_id += 1;
        let id = state.last_id;
        state.pending.insert(id, Pending::Single(tx));
        (id, rx)
    }

    /// Allocate one id per parameter and register the whole set as one batch
    /// keyed by the last id allocated. The batch resolves as a unit.
    pub fn register_batch(
        &self,
        params: Vec<Value>,
    ) -> (Vec<u64>, u64, oneshot::Receiver<ClientResult<Vec<BatchOutcome>>>) {
        debug_assert!(!params.is_empty());
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().expect("pending table poisoned");

        let mut ids = Vec::with_capacity(params.len());
        let mut positions = HashMap::with_capacity(params.len());
        for position in 0..params.len() {
            state.last_id += 1;
            ids.push(state.last_id);
            positions.insert(state.last_id, position);
        }
        let key = *ids.last().expect("batch has at least one id");

        for id in &ids {
            state.members.insert(*id, key);
        }
        let slots = params.iter().map(|_| None).collect();
        state.pending.insert(
            key,
            Pending::Batch(PendingBatch {
                params,
                positions,
                slots,
                filled: 0,
                tx,
            }),
        );
        (ids, key, rx)
    }

    /// Drop a registered single whose request frame never made it out.
    pub fn discard(&self, id: u64) {
        let mut state = self.state.lock().expect("pending table poisoned");
        state.pending.remove(&id);
    }

    /// Drop a registered batch whose request frame never made it out.
    pub fn discard_batch(&self, key: u64) {
        let mut state = self.state.lock().expect("pending table poisoned");
        if let Some(Pending::Batch(batch)) = state.pending.remove(&key) {
            for id in batch.positions.keys() {
                state.members.remove(id);
            }
        }
    }

    /// Number of outstanding table entries (singles plus batch units)
    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("pending table poisoned").pending.len()
    }

    /// Classify one parsed wire document and act on it: resolve a pending
    /// completion, slot a batch element, or hand a notification to the bus.
    /// Malformed documents and unknown ids are dropped, never fatal.
    pub fn handle_document(&self, document: Value, bus: &SubscriptionBus) {
        match IncomingMessage::classify(document) {
            Ok(IncomingMessage::Response(response)) => self.resolve(response),
            Ok(IncomingMessage::BatchResponse(responses)) => {
                for response in responses {
                    self.resolve(response);
                }
            }
            Ok(IncomingMessage::Notification(notification)) => bus.publish(notification),
            Err(e) => warn!(error = %e, "dropping undispatchable document"),
        }
    }

    /// Reject every outstanding completion with ConnectionClosed and clear
    /// the table. Called on any transition into the Closed state.
    pub fn fail_all(&self) {
        let mut state = self.state.lock().expect("pending table poisoned");
        let n = state.pending.len();
        for (_, entry) in state.pending.drain() {
            match entry {
                Pending::Single(tx) => {
                    let _ = tx.send(Err(ClientError::ConnectionClosed));
                }
                Pending::Batch(batch) => {
                    let _ = batch.tx.send(Err(ClientError::ConnectionClosed));
                }
            }
        }
        state.members.clear();
        if n > 0 {
            debug!(rejected = n, "rejected pending requests on teardown");
        }
    }

    fn resolve(&self, response: Response) {
        let id = response.id;
        let mut state = self.state.lock().expect("pending table poisoned");

        if let Some(key) = state.members.get(&id).copied() {
            Self::slot_batch_element(&mut state, key, response);
            return;
        }

        match state.pending.remove(&id) {
            Some(Pending::Single(tx)) => {
                let outcome = response
                    .into_outcome()
                    .map_err(|error| ClientError::rpc(id, error));
                let _ = tx.send(outcome);
            }
            Some(other) => {
                // A batch under this key is addressed through its member
                // index; hitting it here means the index entry is gone.
                state.pending.insert(id, other);
                debug!(id, "discarding response with stale batch key");
            }
            None => {
                debug!(id, "discarding response with no pending entry");
            }
        }
    }

    fn slot_batch_element(state: &mut DispatchState, key: u64, response: Response) {
        let id = response.id;
        let completed = match state.pending.get_mut(&key) {
            Some(Pending::Batch(batch)) => {
                let Some(&position) = batch.positions.get(&id) else {
                    debug!(id, "discarding batch element with unknown position");
                    return;
                };
                if batch.slots[position].is_some() {
                    debug!(id, "discarding duplicate batch element");
                    return;
                }
                batch.slots[position] = Some(response.into_outcome());
                batch.filled += 1;
                batch.filled == batch.slots.len()
            }
            _ => {
                debug!(id, "discarding batch element for resolved batch");
                return;
            }
        };

        if completed {
            if let Some(Pending::Batch(batch)) = state.pending.remove(&key) {
                for member in batch.positions.keys() {
                    state.members.remove(member);
                }
                let outcomes = batch
                    .params
                    .into_iter()
                    .zip(batch.slots)
                    .map(|(param, slot)| BatchOutcome {
                        param,
                        result: slot.expect("completed batch has every slot filled"),
                    })
                    .collect();
                let _ = batch.tx.send(Ok(outcomes));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bus() -> SubscriptionBus {
        SubscriptionBus::new()
    }

    #[test]
    fn test_ids_strictly_increase_from_one() {
        let dispatcher = Dispatcher::new();
        let (a, _rx_a) = dispatcher.register_single();
        let (b, _rx_b) = dispatcher.register_single();
        let (batch_ids, _, _rx_c) = dispatcher.register_batch(vec![json!("x"), json!("y")]);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(batch_ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let dispatcher = Dispatcher::new();
        let bus = bus();
        let (id1, rx1) = dispatcher.register_single();
        let (id2, rx2) = dispatcher.register_single();

        dispatcher.handle_document(json!({"id": id2, "result": "second"}), &bus);
        dispatcher.handle_document(json!({"id": id1, "result": "first"}), &bus);

        assert_eq!(rx1.await.unwrap().unwrap(), json!("first"));
        assert_eq!(rx2.await.unwrap().unwrap(), json!("second"));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_member_rejects_only_its_request() {
        let dispatcher = Dispatcher::new();
        let bus = bus();
        let (id1, rx1) = dispatcher.register_single();
        let (id2, rx2) = dispatcher.register_single();

        dispatcher.handle_document(json!({"id": id1, "error": {"message": "nope"}}), &bus);
        dispatcher.handle_document(json!({"id": id2, "result": 5}), &bus);

        match rx1.await.unwrap() {
            Err(ClientError::Rpc { id, error }) => {
                assert_eq!(id, id1);
                assert_eq!(error, json!({"message": "nope"}));
            }
            other => panic!("expected rpc error, got {:?}", other),
        }
        assert_eq!(rx2.await.unwrap().unwrap(), json!(5));
    }

    #[tokio::test]
    async fn test_batch_resolves_positionally_from_shuffled_array() {
        let dispatcher = Dispatcher::new();
        let bus = bus();
        let (ids, _, rx) =
            dispatcher.register_batch(vec![json!("p1"), json!("p2"), json!("p3")]);

        // Response array deliberately out of request order.
        dispatcher.handle_document(
            json!([
                {"id": ids[2], "result": "r3"},
                {"id": ids[0], "result": "r1"},
                {"id": ids[1], "error": "e2"},
            ]),
            &bus,
        );

        let outcomes = rx.await.unwrap().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].param, json!("p1"));
        assert_eq!(outcomes[0].result, Ok(json!("r1")));
        assert_eq!(outcomes[1].param, json!("p2"));
        assert_eq!(outcomes[1].result, Err(json!("e2")));
        assert_eq!(outcomes[2].param, json!("p3"));
        assert_eq!(outcomes[2].result, Ok(json!("r3")));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_completes_across_separate_documents() {
        let dispatcher = Dispatcher::new();
        let bus = bus();
        let (ids, _, rx) = dispatcher.register_batch(vec![json!(1), json!(2)]);

        dispatcher.handle_document(json!({"id": ids[1], "result": "b"}), &bus);
        assert_eq!(dispatcher.pending_count(), 1);
        dispatcher.handle_document(json!({"id": ids[0], "result": "a"}), &bus);

        let outcomes = rx.await.unwrap().unwrap();
        assert_eq!(outcomes[0].result, Ok(json!("a")));
        assert_eq!(outcomes[1].result, Ok(json!("b")));
    }

    #[tokio::test]
    async fn test_unknown_id_discarded() {
        let dispatcher = Dispatcher::new();
        let bus = bus();
        let (id, rx) = dispatcher.register_single();

        dispatcher.handle_document(json!({"id": 999, "result": "stray"}), &bus);
        assert_eq!(dispatcher.pending_count(), 1);

        dispatcher.handle_document(json!({"id": id, "result": "mine"}), &bus);
        assert_eq!(rx.await.unwrap().unwrap(), json!("mine"));

        // Late duplicate after resolution is discarded too.
        dispatcher.handle_document(json!({"id": id, "result": "dup"}), &bus);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_all_rejects_and_clears() {
        let dispatcher = Dispatcher::new();
        let (_, rx1) = dispatcher.register_single();
        let (_, _, rx2) = dispatcher.register_batch(vec![json!("p")]);

        dispatcher.fail_all();
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(matches!(rx1.await.unwrap(), Err(ClientError::ConnectionClosed)));
        assert!(matches!(rx2.await.unwrap(), Err(ClientError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_notification_routed_to_bus() {
        let dispatcher = Dispatcher::new();
        let bus = bus();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe("ledger.tip", move |params| {
            sink.lock().unwrap().push(params);
        });

        dispatcher.handle_document(json!({"method": "ledger.tip", "params": [7]}), &bus);
        assert_eq!(seen.lock().unwrap().as_slice(), &[json!([7])]);
    }

    #[test]
    fn test_scalar_document_dropped() {
        let dispatcher = Dispatcher::new();
        dispatcher.handle_document(json!(42), &bus());
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
