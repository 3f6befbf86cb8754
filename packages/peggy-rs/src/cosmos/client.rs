//! [`CosmosNetwork`] over LCD, Tendermint RPC and a serialized broadcaster

use super::broadcast::MsgBroadcaster;
use super::proto::{
    self, MsgConfirmBatch, MsgDepositClaim, MsgErc20DeployedClaim, MsgRequestBatch,
    MsgValsetConfirm, MsgValsetUpdatedClaim, MsgWithdrawClaim, PeggyMsg,
};
use super::queries::PeggyQueryClient;
use crate::events::{BridgeEvent, DepositEvent};
use crate::network::CosmosNetwork;
use crate::types::{
    BatchConfirm, BatchFees, BridgeParams, LastClaimEvent, OutgoingTxBatch, Valset, ValsetConfirm,
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cosmrs::{AccountId, Any};
use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info};

/// Claim messages packed into one transaction
pub const DEFAULT_CLAIMS_PER_TX: usize = 10;

pub struct LcdCosmosClient {
    queries: PeggyQueryClient,
    broadcaster: Box<dyn MsgBroadcaster>,
    account_prefix: String,
    claims_per_tx: usize,
}

impl LcdCosmosClient {
    pub fn new(
        queries: PeggyQueryClient,
        broadcaster: Box<dyn MsgBroadcaster>,
        account_prefix: &str,
    ) -> Self {
        Self {
            queries,
            broadcaster,
            account_prefix: account_prefix.to_string(),
            claims_per_tx: DEFAULT_CLAIMS_PER_TX,
        }
    }

    pub fn with_claims_per_tx(mut self, claims_per_tx: usize) -> Self {
        self.claims_per_tx = claims_per_tx.max(1);
        self
    }

    async fn broadcast_one(&self, msg: Any, what: &str) -> Result<()> {
        let result = self
            .broadcaster
            .broadcast(vec![msg], "")
            .await
            .wrap_err_with(|| format!("Failed to broadcast {}", what))?;
        debug!(tx_hash = %result.tx_hash, height = result.height, "{} included", what);
        Ok(())
    }
}

/// Bech32 receiver encoded in the low 20 bytes of a deposit destination
pub fn deposit_receiver(destination: &B256, account_prefix: &str) -> Result<String> {
    let account = AccountId::new(account_prefix, &destination[12..])
        .map_err(|e| eyre!("Invalid deposit receiver {}: {}", destination, e))?;
    Ok(account.to_string())
}

fn deposit_claim(event: &DepositEvent, orchestrator: &str, account_prefix: &str) -> Result<Any> {
    Ok(MsgDepositClaim {
        event_nonce: event.event_nonce,
        block_height: event.block_height,
        token_contract: event.token_contract.to_string(),
        amount: event.amount.to_string(),
        ethereum_sender: event.sender.to_string(),
        cosmos_receiver: deposit_receiver(&event.destination, account_prefix)?,
        orchestrator: orchestrator.to_string(),
        data: event.data.clone(),
    }
    .to_any())
}

/// Build the claim message for one observed event
pub fn claim_msg(event: &BridgeEvent, orchestrator: &str, account_prefix: &str) -> Result<Any> {
    match event {
        BridgeEvent::LegacyDeposit(e) | BridgeEvent::Deposit(e) => {
            deposit_claim(e, orchestrator, account_prefix)
        }
        BridgeEvent::WithdrawalBatchExecuted(e) => Ok(MsgWithdrawClaim {
            event_nonce: e.event_nonce,
            block_height: e.block_height,
            batch_nonce: e.batch_nonce,
            token_contract: e.token_contract.to_string(),
            orchestrator: orchestrator.to_string(),
        }
        .to_any()),
        BridgeEvent::ValsetUpdated(e) => {
            let valset = e.to_valset();
            Ok(MsgValsetUpdatedClaim {
                event_nonce: e.event_nonce,
                valset_nonce: e.new_valset_nonce,
                block_height: e.block_height,
                members: valset
                    .members
                    .iter()
                    .map(|m| proto::BridgeValidator {
                        power: m.power,
                        ethereum_address: m.ethereum_address.to_string(),
                    })
                    .collect(),
                reward_amount: e.reward_amount.to_string(),
                reward_token: e.reward_token.to_string(),
                orchestrator: orchestrator.to_string(),
            }
            .to_any())
        }
        BridgeEvent::Erc20Deployed(e) => Ok(MsgErc20DeployedClaim {
            event_nonce: e.event_nonce,
            block_height: e.block_height,
            cosmos_denom: e.cosmos_denom.clone(),
            token_contract: e.token_contract.to_string(),
            name: e.name.clone(),
            symbol: e.symbol.clone(),
            decimals: u64::from(e.decimals),
            orchestrator: orchestrator.to_string(),
        }
        .to_any()),
    }
}

#[async_trait]
impl CosmosNetwork for LcdCosmosClient {
    fn orchestrator_address(&self) -> String {
        self.broadcaster.address().to_string()
    }

    async fn bridge_params(&self) -> Result<BridgeParams> {
        self.queries.params().await
    }

    async fn current_valset(&self) -> Result<Valset> {
        self.queries.current_valset().await
    }

    async fn latest_valsets(&self) -> Result<Vec<Valset>> {
        self.queries.latest_valsets().await
    }

    async fn valset_at(&self, nonce: u64) -> Result<Option<Valset>> {
        self.queries.valset_at(nonce).await
    }

    async fn all_valset_confirms(&self, nonce: u64) -> Result<Vec<ValsetConfirm>> {
        self.queries.all_valset_confirms(nonce).await
    }

    async fn oldest_unsigned_valsets(&self, addr: &str) -> Result<Vec<Valset>> {
        self.queries.oldest_unsigned_valsets(addr).await
    }

    async fn send_valset_confirm(
        &self,
        eth_address: Address,
        bridge_id: B256,
        valset: &Valset,
        signature: Vec<u8>,
    ) -> Result<()> {
        debug!(
            nonce = valset.nonce,
            bridge_id = %bridge_id,
            eth_address = %eth_address,
            "Sending valset confirmation"
        );

        let msg = MsgValsetConfirm {
            nonce: valset.nonce,
            orchestrator: self.orchestrator_address(),
            eth_address: eth_address.to_string(),
            signature: hex::encode(signature),
        };
        self.broadcast_one(msg.to_any(), "MsgValsetConfirm").await
    }

    async fn latest_transaction_batches(&self) -> Result<Vec<OutgoingTxBatch>> {
        self.queries.latest_transaction_batches().await
    }

    async fn transaction_batch_signatures(
        &self,
        nonce: u64,
        token_contract: Address,
    ) -> Result<Vec<BatchConfirm>> {
        self.queries
            .transaction_batch_signatures(nonce, token_contract)
            .await
    }

    async fn oldest_unsigned_transaction_batch(
        &self,
        addr: &str,
    ) -> Result<Option<OutgoingTxBatch>> {
        self.queries.oldest_unsigned_transaction_batch(addr).await
    }

    async fn send_batch_confirm(
        &self,
        eth_address: Address,
        bridge_id: B256,
        batch: &OutgoingTxBatch,
        signature: Vec<u8>,
    ) -> Result<()> {
        debug!(
            nonce = batch.batch_nonce,
            token = %batch.token_contract,
            bridge_id = %bridge_id,
            "Sending batch confirmation"
        );

        let msg = MsgConfirmBatch {
            nonce: batch.batch_nonce,
            token_contract: batch.token_contract.to_string(),
            eth_signer: eth_address.to_string(),
            orchestrator: self.orchestrator_address(),
            signature: hex::encode(signature),
        };
        self.broadcast_one(msg.to_any(), "MsgConfirmBatch").await
    }

    async fn unbatched_token_fees(&self) -> Result<Vec<BatchFees>> {
        self.queries.unbatched_token_fees().await
    }

    async fn send_request_batch(&self, denom: &str) -> Result<()> {
        let msg = MsgRequestBatch {
            orchestrator: self.orchestrator_address(),
            denom: denom.to_string(),
        };
        self.broadcast_one(msg.to_any(), "MsgRequestBatch").await
    }

    async fn last_claim_event_by_addr(&self, addr: &str) -> Result<LastClaimEvent> {
        self.queries.last_claim_event_by_addr(addr).await
    }

    async fn send_ethereum_claims(
        &self,
        last_claim_event: u64,
        mut events: Vec<BridgeEvent>,
    ) -> Result<u64> {
        events.sort_by_key(BridgeEvent::nonce);

        let Some(first) = events.first() else {
            return Ok(last_claim_event);
        };
        if first.nonce() != last_claim_event + 1 {
            return Err(eyre!(
                "Claim nonce gap: expected {}, first event has {}",
                last_claim_event + 1,
                first.nonce()
            ));
        }

        let orchestrator = self.orchestrator_address();
        let msgs = events
            .iter()
            .map(|event| claim_msg(event, &orchestrator, &self.account_prefix))
            .collect::<Result<Vec<_>>>()?;

        // Each chunk is one transaction. A failed chunk leaves the earlier
        // ones delivered; the next oracle pass filters them by watermark.
        let mut last_sent = last_claim_event;
        for (claimed, chunk) in events
            .chunks(self.claims_per_tx)
            .zip(msgs.chunks(self.claims_per_tx))
        {
            let first_nonce = claimed[0].nonce();
            let last_nonce = claimed[claimed.len() - 1].nonce();

            let result = self
                .broadcaster
                .broadcast(chunk.to_vec(), "")
                .await
                .wrap_err_with(|| {
                    format!(
                        "Failed to broadcast claims {}..={}, claims up to nonce {} were delivered",
                        first_nonce, last_nonce, last_sent
                    )
                })?;

            info!(
                tx_hash = %result.tx_hash,
                height = result.height,
                first_nonce,
                last_nonce,
                claims = chunk.len(),
                "Claims included"
            );
            last_sent = last_nonce;
        }

        Ok(last_sent)
    }

    async fn get_block_time(&self, height: u64) -> Result<DateTime<Utc>> {
        self.queries.block_time(height).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Erc20DeployedEvent, WithdrawalBatchExecutedEvent};
    use alloy::primitives::U256;
    use prost::Message;

    use crate::cosmos::broadcast::TxResult;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the message count of every transaction; fails call `fail_at`
    struct RecordingBroadcaster {
        address: AccountId,
        fail_at: Option<usize>,
        calls: Mutex<Vec<usize>>,
        delivered: Mutex<Vec<usize>>,
    }

    impl RecordingBroadcaster {
        fn new(fail_at: Option<usize>) -> Self {
            Self {
                address: AccountId::new("inj", &[0x42u8; 20]).unwrap(),
                fail_at,
                calls: Mutex::new(Vec::new()),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MsgBroadcaster for std::sync::Arc<RecordingBroadcaster> {
        fn address(&self) -> &AccountId {
            &self.address
        }

        async fn broadcast(&self, msgs: Vec<Any>, _memo: &str) -> Result<TxResult> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(msgs.len());
                calls.len() - 1
            };
            if self.fail_at == Some(call) {
                return Err(eyre!("account sequence mismatch"));
            }
            self.delivered.lock().unwrap().push(msgs.len());
            Ok(TxResult {
                tx_hash: format!("TX{}", call),
                height: 100 + call as u64,
            })
        }
    }

    fn withdrawals(nonces: std::ops::RangeInclusive<u64>) -> Vec<BridgeEvent> {
        nonces
            .map(|nonce| {
                BridgeEvent::WithdrawalBatchExecuted(WithdrawalBatchExecutedEvent {
                    event_nonce: nonce,
                    block_height: 1000 + nonce,
                    batch_nonce: nonce,
                    token_contract: Address::repeat_byte(1),
                })
            })
            .collect()
    }

    fn client(broadcaster: std::sync::Arc<RecordingBroadcaster>, claims_per_tx: usize) -> LcdCosmosClient {
        let queries = PeggyQueryClient::new(
            "http://localhost:1317",
            "http://localhost:26657",
            Duration::from_secs(5),
        )
        .unwrap();
        LcdCosmosClient::new(queries, Box::new(broadcaster), "inj").with_claims_per_tx(claims_per_tx)
    }

    #[tokio::test]
    async fn test_claims_are_packed_into_chunks() {
        let broadcaster = std::sync::Arc::new(RecordingBroadcaster::new(None));
        let cosmos = client(broadcaster.clone(), 5);

        let mut events = withdrawals(1..=12);
        events.reverse();
        let last = cosmos.send_ethereum_claims(0, events).await.unwrap();

        assert_eq!(last, 12);
        assert_eq!(*broadcaster.delivered.lock().unwrap(), vec![5, 5, 2]);
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_earlier_chunks() {
        let broadcaster = std::sync::Arc::new(RecordingBroadcaster::new(Some(1)));
        let cosmos = client(broadcaster.clone(), 5);

        let err = cosmos
            .send_ethereum_claims(0, withdrawals(1..=12))
            .await
            .unwrap_err();

        // First chunk delivered, second attempted, third never sent
        assert_eq!(*broadcaster.delivered.lock().unwrap(), vec![5]);
        assert_eq!(*broadcaster.calls.lock().unwrap(), vec![5, 5]);
        assert!(format!("{:#}", err).contains("claims up to nonce 5 were delivered"));
    }

    #[tokio::test]
    async fn test_claims_with_nonce_gap_are_not_sent() {
        let broadcaster = std::sync::Arc::new(RecordingBroadcaster::new(None));
        let cosmos = client(broadcaster.clone(), 5);

        assert!(cosmos
            .send_ethereum_claims(0, withdrawals(2..=4))
            .await
            .is_err());
        assert!(broadcaster.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_claims_returns_watermark() {
        let broadcaster = std::sync::Arc::new(RecordingBroadcaster::new(None));
        let cosmos = client(broadcaster.clone(), 5);

        assert_eq!(cosmos.send_ethereum_claims(7, Vec::new()).await.unwrap(), 7);
        assert!(broadcaster.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deposit_receiver_from_low_bytes() {
        let mut destination = [0u8; 32];
        destination[12..].copy_from_slice(&[0x11u8; 20]);
        let receiver = deposit_receiver(&B256::from(destination), "inj").unwrap();

        let expected = AccountId::new("inj", &[0x11u8; 20]).unwrap().to_string();
        assert_eq!(receiver, expected);
    }

    #[test]
    fn test_claim_msg_dispatches_by_kind() {
        let deposit = BridgeEvent::Deposit(DepositEvent {
            event_nonce: 8,
            block_height: 100,
            token_contract: Address::repeat_byte(1),
            sender: Address::repeat_byte(2),
            destination: B256::ZERO,
            amount: U256::from(5u64),
            data: "payload".to_string(),
        });
        let any = claim_msg(&deposit, "inj1orch", "inj").unwrap();
        assert_eq!(any.type_url, "/injective.peggy.v1.MsgDepositClaim");
        let decoded = MsgDepositClaim::decode(any.value.as_slice()).unwrap();
        assert_eq!(decoded.event_nonce, 8);
        assert_eq!(decoded.amount, "5");
        assert_eq!(decoded.data, "payload");

        let withdrawal = BridgeEvent::WithdrawalBatchExecuted(WithdrawalBatchExecutedEvent {
            event_nonce: 9,
            block_height: 101,
            batch_nonce: 3,
            token_contract: Address::repeat_byte(1),
        });
        assert_eq!(
            claim_msg(&withdrawal, "inj1orch", "inj").unwrap().type_url,
            "/injective.peggy.v1.MsgWithdrawClaim"
        );

        let deployed = BridgeEvent::Erc20Deployed(Erc20DeployedEvent {
            event_nonce: 10,
            block_height: 102,
            cosmos_denom: "inj".to_string(),
            token_contract: Address::repeat_byte(3),
            name: "Injective".to_string(),
            symbol: "INJ".to_string(),
            decimals: 18,
        });
        let any = claim_msg(&deployed, "inj1orch", "inj").unwrap();
        let decoded = MsgErc20DeployedClaim::decode(any.value.as_slice()).unwrap();
        assert_eq!(decoded.decimals, 18);
        assert_eq!(decoded.orchestrator, "inj1orch");
    }
}
