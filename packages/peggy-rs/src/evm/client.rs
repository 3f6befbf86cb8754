//! Peggy contract client
//!
//! Implements [`EthereumNetwork`] over an HTTP JSON-RPC endpoint. Reads go
//! through a shared read-only provider; each write builds a wallet provider
//! for the call and waits for the receipt.
//!
//! Relay writes are priced with [`GasPolicy`] and refused while an identical
//! input is still in [`PendingTxInputs`].

use super::contracts::Peggy;
use super::tx::{send_error, GasPolicy, PendingTxInputs, RelayTxError};
use super::events::{
    parse_deposit_log, parse_erc20_deployed_log, parse_legacy_deposit_log,
    parse_valset_updated_log, parse_withdrawal_log,
};
use crate::events::{
    DepositEvent, Erc20DeployedEvent, ValsetUpdatedEvent, WithdrawalBatchExecutedEvent,
};
use crate::network::{EthHeader, EthereumNetwork};
use crate::signatures::check_and_repack_signatures;
use crate::types::{BatchConfirm, OutgoingTxBatch, Valset, ValsetConfirm};
use alloy::{
    eips::BlockNumberOrTag,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{BlockTransactionsKind, Filter, Log, TransactionRequest},
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default span of a single `eth_getLogs` request
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 2000;

/// Default time to wait for a relay transaction receipt
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct EvmPeggyConfig {
    pub rpc_url: String,
    pub peggy_address: Address,
    pub private_key: String,
    pub max_block_range: u64,
    pub tx_timeout: Duration,
    pub gas_policy: GasPolicy,
    /// How long a sent input blocks an identical resend
    pub pending_tx_wait: Duration,
}

impl fmt::Debug for EvmPeggyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmPeggyConfig")
            .field("rpc_url", &self.rpc_url)
            .field("peggy_address", &self.peggy_address)
            .field("private_key", &"<redacted>")
            .field("max_block_range", &self.max_block_range)
            .field("tx_timeout", &self.tx_timeout)
            .field("gas_policy", &self.gas_policy)
            .field("pending_tx_wait", &self.pending_tx_wait)
            .finish()
    }
}

pub struct EvmPeggyClient {
    provider: RootProvider<Http<Client>>,
    rpc_url: String,
    peggy_address: Address,
    signer: PrivateKeySigner,
    max_block_range: u64,
    tx_timeout: Duration,
    gas_policy: GasPolicy,
    pending_tx_wait: Duration,
    pending: Mutex<PendingTxInputs>,
}

impl EvmPeggyClient {
    pub fn new(config: EvmPeggyConfig) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            config
                .rpc_url
                .parse()
                .map_err(|e| eyre!("Invalid RPC URL: {}", e))?,
        );

        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;

        info!(
            rpc_url = %config.rpc_url,
            peggy = %config.peggy_address,
            from = %signer.address(),
            "Created Peggy contract client"
        );

        Ok(Self {
            provider,
            rpc_url: config.rpc_url,
            peggy_address: config.peggy_address,
            signer,
            max_block_range: config.max_block_range.max(1),
            tx_timeout: config.tx_timeout,
            gas_policy: config.gas_policy,
            pending_tx_wait: config.pending_tx_wait,
            pending: Mutex::new(PendingTxInputs::default()),
        })
    }

    pub fn peggy_address(&self) -> Address {
        self.peggy_address
    }

    /// Fetch logs for one event kind, split into bounded ranges
    async fn get_event_logs<E: SolEvent>(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        let mut all_logs = Vec::new();
        let mut current_from = from_block;

        while current_from <= to_block {
            let current_to =
                std::cmp::min(current_from.saturating_add(self.max_block_range - 1), to_block);

            let filter = Filter::new()
                .address(self.peggy_address)
                .event_signature(E::SIGNATURE_HASH)
                .from_block(current_from)
                .to_block(current_to);

            let logs = self.provider.get_logs(&filter).await.wrap_err_with(|| {
                format!(
                    "Failed to get {} logs from block {} to {}",
                    E::SIGNATURE,
                    current_from,
                    current_to
                )
            })?;

            all_logs.extend(logs);
            current_from = current_to + 1;
        }

        if !all_logs.is_empty() {
            debug!(
                event = E::SIGNATURE,
                count = all_logs.len(),
                from = from_block,
                to = to_block,
                "Found Peggy logs"
            );
        }

        Ok(all_logs)
    }

    /// Send `input` to the Peggy contract and wait for its receipt.
    ///
    /// The input stays recorded as pending until a receipt arrives, so a
    /// resend within `pending_tx_wait` is refused.
    async fn send_relay_tx(&self, action: &'static str, input: Bytes) -> Result<B256> {
        if self.pending.lock().await.is_pending(&input, self.pending_tx_wait) {
            warn!(action, "Identical transaction still pending, not resending");
            return Err(RelayTxError::AlreadyPending.into());
        }

        let suggested = self
            .provider
            .get_gas_price()
            .await
            .wrap_err("Failed to get gas price")?;
        let gas_price = self.gas_policy.gas_price(suggested)?;

        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.parse().wrap_err("Invalid RPC URL")?);

        let tx = TransactionRequest::default()
            .with_to(self.peggy_address)
            .with_input(input.clone())
            .with_gas_price(gas_price);

        let pending_tx = provider
            .send_transaction(tx)
            .await
            .map_err(|e| send_error(action, e.to_string()))?;
        let tx_hash = *pending_tx.tx_hash();
        self.pending.lock().await.record(input.clone());

        info!(
            action,
            tx_hash = %tx_hash,
            suggested_gas_price = suggested,
            gas_price,
            "Relay transaction sent, waiting for confirmation"
        );

        let receipt = match pending_tx
            .with_timeout(Some(self.tx_timeout))
            .get_receipt()
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(action, tx_hash = %tx_hash, error = %e, "No receipt for relay transaction");
                return Err(RelayTxError::ReceiptTimeout {
                    tx_hash,
                    timeout_secs: self.tx_timeout.as_secs(),
                }
                .into());
            }
        };
        self.pending.lock().await.remove(&input);

        if !receipt.status() {
            return Err(RelayTxError::Reverted { tx_hash }.into());
        }
        Ok(tx_hash)
    }
}

fn valset_args(valset: &Valset) -> Peggy::ValsetArgs {
    Peggy::ValsetArgs {
        validators: valset.addresses(),
        powers: valset.powers(),
        valsetNonce: U256::from(valset.nonce),
        rewardAmount: valset.reward_amount,
        rewardToken: valset.reward_token,
    }
}

fn u256_to_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| eyre!("{} {} does not fit in u64", what, value))
}

#[async_trait]
impl EthereumNetwork for EvmPeggyClient {
    fn from_address(&self) -> Address {
        self.signer.address()
    }

    async fn header_by_number(&self, number: Option<u64>) -> Result<EthHeader> {
        let tag = number
            .map(BlockNumberOrTag::Number)
            .unwrap_or(BlockNumberOrTag::Latest);

        let block = self
            .provider
            .get_block_by_number(tag, BlockTransactionsKind::Hashes)
            .await
            .wrap_err_with(|| format!("Failed to get block {}", tag))?
            .ok_or_else(|| eyre!("Block {} not found", tag))?;

        Ok(EthHeader {
            number: block.header.number,
            timestamp: block.header.timestamp,
        })
    }

    async fn get_bridge_id(&self) -> Result<B256> {
        let contract = Peggy::new(self.peggy_address, &self.provider);
        let result = contract
            .state_peggyId()
            .call()
            .await
            .map_err(|e| eyre!("Failed to query state_peggyId: {}", e))?;
        Ok(result._0)
    }

    async fn get_legacy_deposit_events(&self, start: u64, end: u64) -> Result<Vec<DepositEvent>> {
        let logs = self
            .get_event_logs::<Peggy::SendToCosmosEvent>(start, end)
            .await?;
        Ok(logs.iter().filter_map(parse_legacy_deposit_log).collect())
    }

    async fn get_deposit_events(&self, start: u64, end: u64) -> Result<Vec<DepositEvent>> {
        let logs = self
            .get_event_logs::<Peggy::SendToInjectiveEvent>(start, end)
            .await?;
        Ok(logs.iter().filter_map(parse_deposit_log).collect())
    }

    async fn get_withdrawal_batch_executed_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<WithdrawalBatchExecutedEvent>> {
        let logs = self
            .get_event_logs::<Peggy::TransactionBatchExecutedEvent>(start, end)
            .await?;
        Ok(logs.iter().filter_map(parse_withdrawal_log).collect())
    }

    async fn get_erc20_deployed_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<Erc20DeployedEvent>> {
        let logs = self
            .get_event_logs::<Peggy::ERC20DeployedEvent>(start, end)
            .await?;
        Ok(logs.iter().filter_map(parse_erc20_deployed_log).collect())
    }

    async fn get_valset_updated_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<ValsetUpdatedEvent>> {
        let logs = self
            .get_event_logs::<Peggy::ValsetUpdatedEvent>(start, end)
            .await?;
        Ok(logs.iter().filter_map(parse_valset_updated_log).collect())
    }

    async fn get_valset_nonce(&self) -> Result<u64> {
        let contract = Peggy::new(self.peggy_address, &self.provider);
        let result = contract
            .state_lastValsetNonce()
            .call()
            .await
            .map_err(|e| eyre!("Failed to query state_lastValsetNonce: {}", e))?;
        u256_to_u64(result._0, "Valset nonce")
    }

    async fn get_tx_batch_nonce(&self, token_contract: Address) -> Result<u64> {
        let contract = Peggy::new(self.peggy_address, &self.provider);
        let result = contract
            .lastBatchNonce(token_contract)
            .call()
            .await
            .map_err(|e| eyre!("Failed to query lastBatchNonce({}): {}", token_contract, e))?;
        u256_to_u64(result._0, "Batch nonce")
    }

    async fn send_eth_valset_update(
        &self,
        current: &Valset,
        new: &Valset,
        confirms: &[ValsetConfirm],
    ) -> Result<B256> {
        if new.nonce <= current.nonce {
            return Err(eyre!(
                "New valset nonce {} must be greater than current {}",
                new.nonce,
                current.nonce
            ));
        }

        let sigs = check_and_repack_signatures(current, confirms)
            .wrap_err("Confirmations cannot authorize valset update")?;

        debug!(
            current_nonce = current.nonce,
            new_nonce = new.nonce,
            signed_power = sigs.signed_power,
            "Submitting updateValset"
        );

        let input = Peggy::new(self.peggy_address, &self.provider)
            .updateValset(
                valset_args(new),
                valset_args(current),
                sigs.v,
                sigs.r,
                sigs.s,
            )
            .calldata()
            .clone();

        self.send_relay_tx("updateValset", input).await
    }

    async fn send_transaction_batch(
        &self,
        current: &Valset,
        batch: &OutgoingTxBatch,
        confirms: &[BatchConfirm],
    ) -> Result<B256> {
        let sigs = check_and_repack_signatures(current, confirms)
            .wrap_err("Confirmations cannot authorize batch")?;

        let mut amounts = Vec::with_capacity(batch.transactions.len());
        let mut destinations = Vec::with_capacity(batch.transactions.len());
        let mut fees = Vec::with_capacity(batch.transactions.len());
        for tx in &batch.transactions {
            amounts.push(tx.erc20_token.amount);
            destinations.push(tx.dest_address);
            fees.push(tx.erc20_fee.amount);
        }

        debug!(
            batch_nonce = batch.batch_nonce,
            token = %batch.token_contract,
            txs = batch.transactions.len(),
            signed_power = sigs.signed_power,
            "Submitting submitBatch"
        );

        let input = Peggy::new(self.peggy_address, &self.provider)
            .submitBatch(
                valset_args(current),
                sigs.v,
                sigs.r,
                sigs.s,
                amounts,
                destinations,
                fees,
                U256::from(batch.batch_nonce),
                batch.token_contract,
                U256::from(batch.batch_timeout),
            )
            .calldata()
            .clone();

        self.send_relay_tx("submitBatch", input).await
    }
}
