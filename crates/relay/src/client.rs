//! The BTC relay client: builds header submissions, recovers committed headers and answers
//! proof-of-inclusion queries.

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use rand::Rng;
use spv_bridge_chain::{
    retry::{fetch_logs_paged, RetryPolicy},
    traits::{LogService, TraceService, TransactionService},
    types::{EventLog, LogFilter, PreparedTx},
    ChainIoError,
};
use spv_bridge_params::prelude::RelayParams;
use spv_bridge_primitives::{BtcHeader, BtcStoredHeader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    contract::{
        submitForkBlockheadersCall, submitMainBlockheadersCall, submitShortForkBlockheadersCall,
        RelayContract, StoreForkHeader, StoreHeader,
    },
    errors::RelayError,
    trace::find_stored_header,
};

/// Fork identifier of the recognized main chain.
pub const MAIN_CHAIN_FORK_ID: u64 = 0;

/// Result of preparing a header batch submission.
///
/// The stored-header chain is computed locally via repeated
/// [`BtcStoredHeader::compute_next`] so callers can reason about post-confirmation state before
/// the transaction lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveHeadersResult {
    /// Fork the submission targets; [`MAIN_CHAIN_FORK_ID`] for the main chain.
    pub fork_id: u64,

    /// The stored header the relay tip (or fork tip) will point at once the transaction
    /// confirms.
    pub last_stored_header: BtcStoredHeader,

    /// The prepared submission transaction.
    pub tx: PreparedTx,

    /// Every stored header the batch produces, in chain order.
    pub computed_headers: Vec<BtcStoredHeader>,

    /// Whether the locally computed fork work exceeds the known main-tip work, meaning the fork
    /// is expected to become the main chain.
    ///
    /// Advisory only: the on-chain promotion happens in the contract when the submission lands.
    /// Re-check on-chain state before relying on this for fund-moving decisions.
    pub fork_became_main: bool,
}

/// The current relay tip, fully resolved from its commit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipData {
    /// Commitment the contract stores as its tip pointer.
    pub commit_hash: [u8; 32],

    /// Bitcoin block hash of the tip, natural byte order.
    pub blockhash: [u8; 32],

    /// Cumulative chain work at the tip.
    pub chain_work: U256,

    /// Bitcoin block height of the tip.
    pub block_height: u32,
}

/// A confirmation requirement for one Bitcoin transaction's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequirement {
    /// Block hash the transaction was confirmed in, natural byte order.
    pub blockhash: [u8; 32],

    /// Confirmations the consumer requires on top of that block.
    pub required_confirmations: u32,
}

/// Collaborator that produces relay catch-up transactions when requested proof data is not yet
/// committed on chain.
#[async_trait]
pub trait RelaySynchronizer: Send + Sync {
    /// Prepares submission transactions bringing the relay up to (at least) the given Bitcoin
    /// block hashes.
    async fn prepare_catchup(
        &self,
        missing: &[[u8; 32]],
        fee_rate: u128,
    ) -> Result<Vec<PreparedTx>, ChainIoError>;
}

/// Client orchestrating submissions to and proof retrieval from the on-chain BTC relay.
pub struct BtcRelayClient {
    contract: Arc<dyn RelayContract>,
    trace: Arc<dyn TraceService>,
    logs: Arc<dyn LogService>,
    params: RelayParams,
    retry: RetryPolicy,
}

impl std::fmt::Debug for BtcRelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtcRelayClient")
            .field("relay", &self.contract.address())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl BtcRelayClient {
    /// Creates a relay client over the given collaborators.
    pub fn new(
        contract: Arc<dyn RelayContract>,
        trace: Arc<dyn TraceService>,
        logs: Arc<dyn LogService>,
        params: RelayParams,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            contract,
            trace,
            logs,
            params,
            retry,
        }
    }

    /// Computes the stored-header chain a batch produces on top of `parent`.
    fn compute_chain(
        &self,
        headers: &[BtcHeader],
        parent: &BtcStoredHeader,
    ) -> Result<Vec<BtcStoredHeader>, RelayError> {
        if headers.is_empty() {
            return Err(RelayError::EmptyBatch);
        }

        let mut computed = Vec::with_capacity(headers.len());
        let mut current = *parent;
        for header in headers {
            current = current.compute_next(*header, &self.params)?;
            computed.push(current);
        }
        Ok(computed)
    }

    /// Concatenates the parent stored header with each new header's compact serialization; the
    /// exact payload layout the contract parses.
    fn submission_payload(parent: &BtcStoredHeader, headers: &[BtcHeader]) -> Vec<u8> {
        let mut data = parent.serialize().to_vec();
        for header in headers {
            data.extend_from_slice(&header.serialize_compact());
        }
        data
    }

    fn prepared_tx(&self, calldata: Vec<u8>, num_headers: usize, fee_rate: u128) -> PreparedTx {
        PreparedTx {
            to: self.contract.address(),
            data: calldata.into(),
            value: U256::ZERO,
            gas_limit: self.params.submission_gas(num_headers),
            max_fee_per_gas: fee_rate,
        }
    }

    /// Prepares a main-chain extension submission.
    pub fn save_main_headers(
        &self,
        headers: &[BtcHeader],
        parent: &BtcStoredHeader,
        fee_rate: u128,
    ) -> Result<SaveHeadersResult, RelayError> {
        let computed = self.compute_chain(headers, parent)?;
        let data = Self::submission_payload(parent, headers);
        let calldata = submitMainBlockheadersCall { data: data.into() }.abi_encode();

        let last = *computed.last().expect("batch is non-empty");
        debug!(
            tip = %hex::encode(last.block_hash()),
            height = last.block_height(),
            count = headers.len(),
            "prepared main chain submission"
        );

        Ok(SaveHeadersResult {
            fork_id: MAIN_CHAIN_FORK_ID,
            last_stored_header: last,
            tx: self.prepared_tx(calldata, headers.len(), fee_rate),
            computed_headers: computed,
            fork_became_main: false,
        })
    }

    /// Prepares the first submission of a new long fork under a freshly drawn 48-bit fork
    /// identifier.
    pub async fn save_new_fork_headers(
        &self,
        headers: &[BtcHeader],
        parent: &BtcStoredHeader,
        fee_rate: u128,
    ) -> Result<SaveHeadersResult, RelayError> {
        let fork_id = rand::thread_rng().gen_range(1..(1u64 << 48));
        self.save_fork_headers(fork_id, headers, parent, fee_rate)
            .await
    }

    /// Prepares a continuation submission for an existing long fork.
    ///
    /// If the locally computed fork tip's chain work exceeds the known main-tip work, the result
    /// reports [`MAIN_CHAIN_FORK_ID`] with `fork_became_main` set so callers can react before
    /// the on-chain reorg event arrives.
    pub async fn save_fork_headers(
        &self,
        fork_id: u64,
        headers: &[BtcHeader],
        parent: &BtcStoredHeader,
        fee_rate: u128,
    ) -> Result<SaveHeadersResult, RelayError> {
        let computed = self.compute_chain(headers, parent)?;
        let data = Self::submission_payload(parent, headers);
        let calldata = submitForkBlockheadersCall {
            forkId: U256::from(fork_id),
            data: data.into(),
        }
        .abi_encode();

        let last = *computed.last().expect("batch is non-empty");
        let main_work = self.contract.chain_work().await?;
        let fork_work = U256::from_be_bytes(last.chain_work().to_be_bytes());
        let fork_became_main = fork_work > main_work;
        if fork_became_main {
            info!(
                fork_id,
                height = last.block_height(),
                "fork tip exceeds main chain work, expecting reorg"
            );
        }

        Ok(SaveHeadersResult {
            fork_id: if fork_became_main {
                MAIN_CHAIN_FORK_ID
            } else {
                fork_id
            },
            last_stored_header: last,
            tx: self.prepared_tx(calldata, headers.len(), fee_rate),
            computed_headers: computed,
            fork_became_main,
        })
    }

    /// Prepares a short-fork submission, applied atomically by the contract in one transaction.
    pub async fn save_short_fork_headers(
        &self,
        headers: &[BtcHeader],
        parent: &BtcStoredHeader,
        fee_rate: u128,
    ) -> Result<SaveHeadersResult, RelayError> {
        if headers.len() > self.params.max_short_fork_len {
            return Err(RelayError::ShortForkTooLong {
                got: headers.len(),
                max: self.params.max_short_fork_len,
            });
        }

        let computed = self.compute_chain(headers, parent)?;
        let data = Self::submission_payload(parent, headers);
        let calldata = submitShortForkBlockheadersCall { data: data.into() }.abi_encode();

        let last = *computed.last().expect("batch is non-empty");
        let main_work = self.contract.chain_work().await?;
        let fork_work = U256::from_be_bytes(last.chain_work().to_be_bytes());

        Ok(SaveHeadersResult {
            fork_id: MAIN_CHAIN_FORK_ID,
            last_stored_header: last,
            tx: self.prepared_tx(calldata, headers.len(), fee_rate),
            computed_headers: computed,
            fork_became_main: fork_work > main_work,
        })
    }

    /// Gas fee for synchronizing `num_headers` headers at the given fee rate.
    pub fn estimate_synchronize_fee(&self, num_headers: usize, fee_rate: u128) -> U256 {
        U256::from(self.params.submission_gas(num_headers)) * U256::from(fee_rate)
    }

    /// Finds the most recent `StoreHeader`/`StoreForkHeader` event matching the given indexed
    /// topic position and value.
    async fn find_latest_event(
        &self,
        topic_index: usize,
        value: B256,
    ) -> Result<Option<EventLog>, RelayError> {
        let latest = self.contract.latest_block().await?;
        let mut best: Option<EventLog> = None;

        for signature in [StoreHeader::SIGNATURE_HASH, StoreForkHeader::SIGNATURE_HASH] {
            let mut topics = vec![Some(signature), None, None];
            topics[topic_index] = Some(value);
            let filter = LogFilter {
                address: self.contract.address(),
                topics,
                from_block: self.contract.deployment_block(),
                to_block: latest,
            };
            for log in fetch_logs_paged(self.logs.as_ref(), &self.retry, &filter).await? {
                let newer = best
                    .as_ref()
                    .map(|b| (log.block_number, log.log_index) > (b.block_number, b.log_index))
                    .unwrap_or(true);
                if newer {
                    best = Some(log);
                }
            }
        }

        Ok(best)
    }

    /// Recovers the full stored header committed by the transaction that emitted `log`.
    async fn recover_from_log(
        &self,
        log: &EventLog,
        commit_hash: [u8; 32],
    ) -> Result<Option<BtcStoredHeader>, RelayError> {
        let trace = self.trace.trace_transaction(log.transaction_hash).await?;
        find_stored_header(&trace, self.contract.address(), commit_hash, &self.params)
    }

    /// Reads the current tip commitment and resolves its full contents by replaying the call
    /// trace of the transaction that produced it.
    pub async fn get_tip_data(&self) -> Result<Option<TipData>, RelayError> {
        let commit = self.contract.tip_commit_hash().await?;
        if commit == B256::ZERO {
            return Err(RelayError::Uninitialized);
        }

        let Some(log) = self.find_latest_event(1, commit).await? else {
            // Tip may have been committed by the constructor; without a log there is no
            // transaction to trace, so report not-found rather than failing.
            warn!(commit = %commit, "no submission event found for tip commitment");
            return Ok(None);
        };

        let Some(stored) = self.recover_from_log(&log, commit.0).await? else {
            return Err(RelayError::UnparseableTrace(format!(
                "transaction {} emitted commitment {commit} but its trace does not produce it",
                log.transaction_hash
            )));
        };

        Ok(Some(TipData {
            commit_hash: stored.commit_hash(),
            blockhash: stored.block_hash(),
            chain_work: U256::from_be_bytes(stored.chain_work().to_be_bytes()),
            block_height: stored.block_height(),
        }))
    }

    /// Locates the canonical stored header for a Bitcoin block hash.
    ///
    /// Returns `None` when the relay has no canonical record for the block yet, or when
    /// `required_blockheight` is given and the relay tip has not reached it; both mean "invoke
    /// the synchronizer and retry", not failure.
    pub async fn retrieve_log_and_blockheight(
        &self,
        blockhash: [u8; 32],
        required_blockheight: Option<u32>,
    ) -> Result<Option<(BtcStoredHeader, u32)>, RelayError> {
        let Some(log) = self.find_latest_event(2, B256::from(blockhash)).await? else {
            return Ok(None);
        };
        // Both event types carry the commitment as their first indexed topic.
        let commit = log.topics.get(1).copied().ok_or_else(|| {
            RelayError::UnparseableTrace("submission event missing commit topic".into())
        })?;

        let Some(stored) = self.recover_from_log(&log, commit.0).await? else {
            return Err(RelayError::UnparseableTrace(format!(
                "transaction {} emitted commitment {commit} but its trace does not produce it",
                log.transaction_hash
            )));
        };

        // The event may belong to a superseded fork; the header is only trustworthy if the
        // canonical chain records the same commitment at its height.
        let canonical = self.contract.commit_hash_at(stored.block_height()).await?;
        if canonical != commit {
            debug!(
                blockhash = %hex::encode(blockhash),
                height = stored.block_height(),
                "stored header superseded by a different canonical commitment"
            );
            return Ok(None);
        }

        if let Some(required) = required_blockheight {
            if self.contract.block_height().await? < required {
                return Ok(None);
            }
        }

        Ok(Some((stored, stored.block_height())))
    }

    /// Batch retrieval with catch-up: resolves each requested block to its canonical stored
    /// header, delegating to the synchronizer for any that are missing, then re-checking.
    ///
    /// Returns `None` if any requested block remains unresolved after synchronization; callers
    /// treat that as "not ready" and retry later.
    pub async fn get_committed_headers_and_synchronize(
        &self,
        requests: &[BlockRequirement],
        synchronizer: Option<&dyn RelaySynchronizer>,
        tx_service: &dyn TransactionService,
        fee_rate: u128,
    ) -> Result<Option<HashMap<[u8; 32], BtcStoredHeader>>, RelayError> {
        let mut resolved = HashMap::new();
        let mut missing = Vec::new();

        for req in requests {
            match self.try_resolve(req).await? {
                Some(stored) => {
                    resolved.insert(req.blockhash, stored);
                }
                None => missing.push(req.blockhash),
            }
        }

        if !missing.is_empty() {
            let Some(synchronizer) = synchronizer else {
                return Ok(None);
            };

            info!(missing = missing.len(), "synchronizing relay for missing headers");
            let txs = synchronizer.prepare_catchup(&missing, fee_rate).await?;
            if !txs.is_empty() {
                tx_service
                    .send_and_confirm(&txs, true, CancellationToken::new())
                    .await?;
            }

            for blockhash in missing {
                let req = requests
                    .iter()
                    .find(|r| r.blockhash == blockhash)
                    .expect("blockhash came from requests");
                match self.try_resolve(req).await? {
                    Some(stored) => {
                        resolved.insert(blockhash, stored);
                    }
                    None => return Ok(None),
                }
            }
        }

        Ok(Some(resolved))
    }

    /// Resolves one requirement, translating confirmations into the tip height the relay must
    /// have reached.
    async fn try_resolve(
        &self,
        req: &BlockRequirement,
    ) -> Result<Option<BtcStoredHeader>, RelayError> {
        let found = self.retrieve_log_and_blockheight(req.blockhash, None).await?;
        let Some((stored, height)) = found else {
            return Ok(None);
        };

        let required_tip = height + req.required_confirmations.saturating_sub(1);
        if self.contract.block_height().await? < required_tip {
            return Ok(None);
        }

        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy_primitives::Address;
    use spv_bridge_chain::types::{CallTrace, CallType};
    use spv_bridge_test_utils::{anchor_at, header_chain};

    use super::*;
    use crate::contract::submitMainBlockheadersCall;

    const RELAY: Address = Address::new([0x42; 20]);

    /// Mutable picture of the on-chain relay shared by all mock collaborators.
    #[derive(Debug, Default)]
    struct ChainState {
        tip_commit: B256,
        commit_by_height: HashMap<u32, B256>,
        block_height: u32,
        chain_work: U256,
        logs: Vec<EventLog>,
        traces: HashMap<B256, CallTrace>,
    }

    impl ChainState {
        /// Records a main-chain submission: one trace-able transaction plus one StoreHeader
        /// event per produced stored header.
        fn apply_submission(
            &mut self,
            tx_hash: B256,
            parent: &BtcStoredHeader,
            headers: &[BtcHeader],
            stored: &[BtcStoredHeader],
        ) {
            let mut data = parent.serialize().to_vec();
            for header in headers {
                data.extend_from_slice(&header.serialize_compact());
            }
            let calldata = submitMainBlockheadersCall { data: data.into() }.abi_encode();
            self.traces.insert(
                tx_hash,
                CallTrace {
                    to: Some(RELAY),
                    input: calldata.into(),
                    call_type: CallType::Call,
                    calls: vec![],
                },
            );

            for (i, record) in stored.iter().enumerate() {
                let commit = B256::from(record.commit_hash());
                self.logs.push(EventLog {
                    address: RELAY,
                    topics: vec![
                        StoreHeader::SIGNATURE_HASH,
                        commit,
                        B256::from(record.block_hash()),
                    ],
                    data: Default::default(),
                    block_number: 10,
                    transaction_hash: tx_hash,
                    log_index: i as u64,
                });
                self.commit_by_height.insert(record.block_height(), commit);
            }

            let last = stored.last().unwrap();
            self.tip_commit = B256::from(last.commit_hash());
            self.block_height = last.block_height();
            self.chain_work = U256::from_be_bytes(last.chain_work().to_be_bytes());
        }
    }

    #[derive(Debug, Clone)]
    struct MockChain(Arc<Mutex<ChainState>>);

    #[async_trait]
    impl RelayContract for MockChain {
        fn address(&self) -> Address {
            RELAY
        }

        fn deployment_block(&self) -> u64 {
            0
        }

        async fn latest_block(&self) -> Result<u64, ChainIoError> {
            Ok(100)
        }

        async fn tip_commit_hash(&self) -> Result<B256, ChainIoError> {
            Ok(self.0.lock().unwrap().tip_commit)
        }

        async fn commit_hash_at(&self, height: u32) -> Result<B256, ChainIoError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .commit_by_height
                .get(&height)
                .copied()
                .unwrap_or_default())
        }

        async fn chain_work(&self) -> Result<U256, ChainIoError> {
            Ok(self.0.lock().unwrap().chain_work)
        }

        async fn block_height(&self) -> Result<u32, ChainIoError> {
            Ok(self.0.lock().unwrap().block_height)
        }
    }

    #[async_trait]
    impl TraceService for MockChain {
        async fn trace_transaction(&self, tx_hash: B256) -> Result<CallTrace, ChainIoError> {
            self.0
                .lock()
                .unwrap()
                .traces
                .get(&tx_hash)
                .cloned()
                .ok_or_else(|| ChainIoError::Transport("unknown transaction".into()))
        }
    }

    #[async_trait]
    impl LogService for MockChain {
        async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<EventLog>, ChainIoError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .logs
                .iter()
                .filter(|log| {
                    log.address == filter.address
                        && filter.topics.iter().enumerate().all(|(i, t)| match t {
                            Some(t) => log.topics.get(i) == Some(t),
                            None => true,
                        })
                })
                .cloned()
                .collect())
        }
    }

    /// Transaction service that applies a pending submission to the shared chain state when
    /// driven, standing in for the confirmation of a synchronizer catch-up.
    struct ApplyOnConfirm {
        chain: Arc<Mutex<ChainState>>,
        #[allow(clippy::type_complexity)]
        pending: Mutex<Option<Box<dyn FnOnce(&mut ChainState) + Send>>>,
    }

    #[async_trait]
    impl TransactionService for ApplyOnConfirm {
        async fn send_and_confirm(
            &self,
            _txs: &[PreparedTx],
            _wait_for_confirmation: bool,
            _abort: CancellationToken,
        ) -> Result<Vec<B256>, ChainIoError> {
            if let Some(apply) = self.pending.lock().unwrap().take() {
                apply(&mut self.chain.lock().unwrap());
            }
            Ok(vec![B256::ZERO])
        }

        fn on_before_replace(&self, _callback: spv_bridge_chain::traits::BeforeReplaceFn) {}
    }

    struct CatchupStub;

    #[async_trait]
    impl RelaySynchronizer for CatchupStub {
        async fn prepare_catchup(
            &self,
            missing: &[[u8; 32]],
            fee_rate: u128,
        ) -> Result<Vec<PreparedTx>, ChainIoError> {
            assert!(!missing.is_empty());
            Ok(vec![PreparedTx {
                to: RELAY,
                data: Default::default(),
                value: U256::ZERO,
                gas_limit: 100_000,
                max_fee_per_gas: fee_rate,
            }])
        }
    }

    fn client_over(chain: &MockChain) -> BtcRelayClient {
        spv_bridge_test_utils::init_test_logging();
        BtcRelayClient::new(
            Arc::new(chain.clone()),
            Arc::new(chain.clone()),
            Arc::new(chain.clone()),
            RelayParams::default(),
            RetryPolicy {
                max_retries: 0,
                delay: std::time::Duration::from_millis(1),
                backoff_multiplier: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_get_tip_data_recovers_full_header() {
        let anchor = anchor_at(100);
        let (headers, stored) = header_chain(&anchor, 5);

        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));
        chain.0.lock().unwrap().apply_submission(
            B256::repeat_byte(1),
            &anchor,
            &headers,
            &stored,
        );

        let tip = client_over(&chain).get_tip_data().await.unwrap().unwrap();
        let expected = stored.last().unwrap();
        assert_eq!(tip.commit_hash, expected.commit_hash());
        assert_eq!(tip.blockhash, expected.block_hash());
        assert_eq!(tip.block_height, expected.block_height());
        assert_eq!(
            tip.chain_work,
            U256::from_be_bytes(expected.chain_work().to_be_bytes())
        );
    }

    #[tokio::test]
    async fn test_get_tip_data_on_uninitialized_contract() {
        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));
        let result = client_over(&chain).get_tip_data().await;
        assert!(matches!(result, Err(RelayError::Uninitialized)));
    }

    #[tokio::test]
    async fn test_retrieve_checks_canonical_chain() {
        let anchor = anchor_at(100);
        let (headers, stored) = header_chain(&anchor, 4);

        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));
        chain.0.lock().unwrap().apply_submission(
            B256::repeat_byte(1),
            &anchor,
            &headers,
            &stored,
        );
        let client = client_over(&chain);

        let target = &stored[1];
        let (found, height) = client
            .retrieve_log_and_blockheight(target.block_hash(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, *target);
        assert_eq!(height, 102);

        // Not an error when the relay is simply behind the required height.
        assert!(client
            .retrieve_log_and_blockheight(target.block_hash(), Some(1000))
            .await
            .unwrap()
            .is_none());

        // A superseded fork header is rejected even though its event exists.
        chain
            .0
            .lock()
            .unwrap()
            .commit_by_height
            .insert(102, B256::repeat_byte(0xaa));
        assert!(client
            .retrieve_log_and_blockheight(target.block_hash(), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_save_main_headers_builds_chain_and_payload() {
        let anchor = anchor_at(100);
        let (headers, stored) = header_chain(&anchor, 3);
        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));

        let result = client_over(&chain)
            .save_main_headers(&headers, &anchor, 25)
            .unwrap();

        assert_eq!(result.fork_id, MAIN_CHAIN_FORK_ID);
        assert_eq!(result.computed_headers, stored);
        assert_eq!(result.last_stored_header, stored[2]);
        assert!(!result.fork_became_main);
        assert_eq!(result.tx.to, RELAY);
        assert_eq!(result.tx.max_fee_per_gas, 25);

        // Calldata embeds the parent's 160 bytes followed by 3 compact headers.
        let call = submitMainBlockheadersCall::abi_decode(result.tx.data.as_ref(), true).unwrap();
        assert_eq!(call.data.len(), 160 + 3 * 48);
        assert_eq!(&call.data[..160], anchor.serialize().as_slice());
    }

    #[tokio::test]
    async fn test_fork_takeover_is_reported_as_main() {
        let anchor = anchor_at(100);
        let (headers, stored) = header_chain(&anchor, 3);

        // Main tip has less work than the fork tip will have.
        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));
        chain.0.lock().unwrap().chain_work = U256::from(1u64);

        let result = client_over(&chain)
            .save_fork_headers(7, &headers, &anchor, 10)
            .await
            .unwrap();
        assert!(result.fork_became_main);
        assert_eq!(result.fork_id, MAIN_CHAIN_FORK_ID);
        assert_eq!(result.last_stored_header, stored[2]);

        // With a heavier main chain the fork keeps its identifier.
        chain.0.lock().unwrap().chain_work = U256::MAX;
        let result = client_over(&chain)
            .save_fork_headers(7, &headers, &anchor, 10)
            .await
            .unwrap();
        assert!(!result.fork_became_main);
        assert_eq!(result.fork_id, 7);
    }

    #[tokio::test]
    async fn test_short_fork_length_limit() {
        let anchor = anchor_at(100);
        let (headers, _) = header_chain(&anchor, 12);
        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));

        let result = client_over(&chain)
            .save_short_fork_headers(&headers, &anchor, 10)
            .await;
        assert!(matches!(
            result,
            Err(RelayError::ShortForkTooLong { got: 12, max: 10 })
        ));
    }

    #[tokio::test]
    async fn test_synchronize_resolves_after_catchup() {
        let anchor = anchor_at(100);
        let (headers, stored) = header_chain(&anchor, 4);

        // Only the first two blocks are committed up front.
        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));
        chain.0.lock().unwrap().apply_submission(
            B256::repeat_byte(1),
            &anchor,
            &headers[..2],
            &stored[..2],
        );

        let client = client_over(&chain);
        let requests = [
            BlockRequirement {
                blockhash: stored[0].block_hash(),
                required_confirmations: 1,
            },
            BlockRequirement {
                blockhash: stored[3].block_hash(),
                required_confirmations: 1,
            },
        ];

        // Without a synchronizer the batch is simply not ready.
        let no_sync = ApplyOnConfirm {
            chain: chain.0.clone(),
            pending: Mutex::new(None),
        };
        assert!(client
            .get_committed_headers_and_synchronize(&requests, None, &no_sync, 10)
            .await
            .unwrap()
            .is_none());

        // With a synchronizer whose catch-up lands the remaining headers, the batch resolves.
        let parent = stored[1];
        let catchup_headers = headers[2..].to_vec();
        let catchup_stored = stored[2..].to_vec();
        let tx_service = ApplyOnConfirm {
            chain: chain.0.clone(),
            pending: Mutex::new(Some(Box::new(move |state: &mut ChainState| {
                state.apply_submission(
                    B256::repeat_byte(2),
                    &parent,
                    &catchup_headers,
                    &catchup_stored,
                );
            }))),
        };

        let resolved = client
            .get_committed_headers_and_synchronize(&requests, Some(&CatchupStub), &tx_service, 10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[&stored[0].block_hash()], stored[0]);
        assert_eq!(resolved[&stored[3].block_hash()], stored[3]);
    }

    #[tokio::test]
    async fn test_confirmation_requirement_gates_resolution() {
        let anchor = anchor_at(100);
        let (headers, stored) = header_chain(&anchor, 3);

        let chain = MockChain(Arc::new(Mutex::new(ChainState::default())));
        chain
            .0
            .lock()
            .unwrap()
            .apply_submission(B256::repeat_byte(1), &anchor, &headers, &stored);
        let client = client_over(&chain);
        let no_sync = ApplyOnConfirm {
            chain: chain.0.clone(),
            pending: Mutex::new(None),
        };

        // Tip is at 103; requiring 6 confirmations on block 103 needs tip >= 108.
        let requests = [BlockRequirement {
            blockhash: stored[2].block_hash(),
            required_confirmations: 6,
        }];
        assert!(client
            .get_committed_headers_and_synchronize(&requests, None, &no_sync, 10)
            .await
            .unwrap()
            .is_none());

        // One confirmation (the block itself) is already satisfied.
        let requests = [BlockRequirement {
            blockhash: stored[2].block_hash(),
            required_confirmations: 1,
        }];
        assert!(client
            .get_committed_headers_and_synchronize(&requests, None, &no_sync, 10)
            .await
            .unwrap()
            .is_some());
    }
}
