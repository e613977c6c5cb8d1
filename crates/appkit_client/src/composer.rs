use crate::config::{Config, EventData, EventType, TxnGroupSimulatedEventData};
use crate::error::AppClientError;
use crate::signer::TransactionSigner;
use crate::transport::{PendingTransactionInfo, SimulateResponse, Transport, TransportError};
use appkit_abi::{ABIError, ABIMethod, ABIReturn};
use appkit_transact::{
    MAX_TX_GROUP_SIZE, SignedTransaction, Transaction, TransactionId, Transactions,
};
use derive_more::Debug;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TransactionWithSigner {
    pub transaction: Transaction,
    #[debug(skip)]
    pub signer: Arc<dyn TransactionSigner>,
}

/// An application call to a method, together with the transactions passed as its arguments.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub call: TransactionWithSigner,
    pub method: ABIMethod,
    /// Placed in the group immediately before `call`, in order.
    pub transaction_args: Vec<TransactionWithSigner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupStatus {
    Building,
    Built,
    Signed,
    Submitted,
    Committed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupResult {
    /// Round the group was confirmed in; `None` for simulated groups.
    pub confirmed_round: Option<u64>,
    pub tx_ids: Vec<String>,
    /// One per method call, in group order.
    pub method_returns: Vec<ABIReturn>,
    /// Node results for each transaction, in group order.
    pub confirmations: Vec<PendingTransactionInfo>,
}

/// Up to 16 transactions that are signed and submitted together and succeed or fail as a unit.
#[derive(Debug)]
pub struct AtomicGroup {
    #[debug(skip)]
    transport: Arc<dyn Transport>,
    transactions: Vec<TransactionWithSigner>,
    method_calls: HashMap<usize, ABIMethod>,
    built_group: Option<Vec<TransactionWithSigner>>,
    signed_group: Option<Vec<SignedTransaction>>,
    status: GroupStatus,
}

impl AtomicGroup {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        AtomicGroup {
            transport,
            transactions: Vec::new(),
            method_calls: HashMap::new(),
            built_group: None,
            signed_group: None,
            status: GroupStatus::Building,
        }
    }

    pub fn status(&self) -> GroupStatus {
        self.status
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transactions(&self) -> &[TransactionWithSigner] {
        &self.transactions
    }

    fn ensure_capacity(&self, additional: usize) -> Result<(), AppClientError> {
        if self.status != GroupStatus::Building {
            return Err(AppClientError::StateError {
                message: "Cannot add transactions to a group that has already been built"
                    .to_string(),
            });
        }
        if self.transactions.len() + additional > MAX_TX_GROUP_SIZE {
            return Err(AppClientError::ArgumentError {
                message: format!(
                    "Atomic group cannot hold more than {} transactions",
                    MAX_TX_GROUP_SIZE
                ),
            });
        }
        Ok(())
    }

    fn push(&mut self, txn_with_signer: TransactionWithSigner) -> Result<(), AppClientError> {
        if txn_with_signer.transaction.header().group.is_some() {
            return Err(AppClientError::ArgumentError {
                message: "Transactions added to a group must not already be grouped".to_string(),
            });
        }
        self.transactions.push(txn_with_signer);
        Ok(())
    }

    pub fn add_transaction(
        &mut self,
        txn_with_signer: TransactionWithSigner,
    ) -> Result<(), AppClientError> {
        self.ensure_capacity(1)?;
        self.push(txn_with_signer)
    }

    pub fn add_method_call(&mut self, method_call: MethodCall) -> Result<(), AppClientError> {
        self.ensure_capacity(method_call.transaction_args.len() + 1)?;
        for txn_arg in method_call.transaction_args {
            self.push(txn_arg)?;
        }
        self.push(method_call.call)?;
        self.method_calls
            .insert(self.transactions.len() - 1, method_call.method);
        Ok(())
    }

    /// Assigns the group id when there is more than one transaction.
    pub fn build(&mut self) -> Result<&[TransactionWithSigner], AppClientError> {
        if self.built_group.is_none() {
            if self.transactions.is_empty() {
                return Err(AppClientError::ArgumentError {
                    message: "Cannot build an empty group".to_string(),
                });
            }

            let built = if self.transactions.len() > 1 {
                let transactions: Vec<Transaction> = self
                    .transactions
                    .iter()
                    .map(|t| t.transaction.clone())
                    .collect();
                transactions
                    .as_slice()
                    .assign_group()?
                    .into_iter()
                    .zip(&self.transactions)
                    .map(|(transaction, original)| TransactionWithSigner {
                        transaction,
                        signer: original.signer.clone(),
                    })
                    .collect()
            } else {
                self.transactions.clone()
            };

            debug!("Built group of {} transactions", built.len());
            self.built_group = Some(built);
            self.status = GroupStatus::Built;
        }

        Ok(self.built_group.as_deref().unwrap_or_default())
    }

    /// Calls each distinct signer once with the indices of the transactions it signs.
    pub async fn gather_signatures(&mut self) -> Result<&[SignedTransaction], AppClientError> {
        if self.signed_group.is_none() {
            self.build()?;
            let transactions_with_signers =
                self.built_group
                    .as_ref()
                    .ok_or_else(|| AppClientError::StateError {
                        message: "Cannot gather signatures before building the group".to_string(),
                    })?;

            let mut transactions = Vec::new();
            // Keyed by the signer's address in memory so each instance signs once
            let mut signer_groups: HashMap<usize, Vec<usize>> = HashMap::new();
            for (group_index, txn_with_signer) in transactions_with_signers.iter().enumerate() {
                signer_groups
                    .entry(Arc::as_ptr(&txn_with_signer.signer) as *const () as usize)
                    .or_default()
                    .push(group_index);
                transactions.push(txn_with_signer.transaction.clone());
            }

            let mut signed_transactions: Vec<Option<SignedTransaction>> =
                vec![None; transactions_with_signers.len()];

            for indices in signer_groups.into_values() {
                let signer = &transactions_with_signers[indices[0]].signer;
                let signed = signer
                    .sign_transactions(&transactions, &indices)
                    .await
                    .map_err(|message| AppClientError::ConfigurationError {
                        message: format!("Failed to sign transactions: {}", message),
                    })?;
                for (index, stx) in indices.into_iter().zip(signed) {
                    signed_transactions[index] = Some(stx);
                }
            }

            let unsigned_indexes: Vec<usize> = signed_transactions
                .iter()
                .enumerate()
                .filter(|(_, stx)| stx.is_none())
                .map(|(i, _)| i)
                .collect();
            if !unsigned_indexes.is_empty() {
                return Err(AppClientError::ConfigurationError {
                    message: format!(
                        "Transactions at indexes {:?} were not signed",
                        unsigned_indexes
                    ),
                });
            }

            self.signed_group = Some(signed_transactions.into_iter().flatten().collect());
            self.status = GroupStatus::Signed;
        }

        Ok(self.signed_group.as_deref().unwrap_or_default())
    }

    /// Sends the signed group and returns the id of every transaction in it.
    pub async fn submit(&mut self) -> Result<Vec<String>, AppClientError> {
        if self.status >= GroupStatus::Submitted {
            return Err(AppClientError::StateError {
                message: "Group has already been submitted".to_string(),
            });
        }

        let signed = self.gather_signatures().await?.to_vec();
        let tx_ids = signed
            .iter()
            .map(|stx| stx.id())
            .collect::<Result<Vec<_>, _>>()?;

        self.transport.submit(&signed).await.inspect_err(|e| {
            warn!("Group {:?} was rejected: {}", tx_ids, e);
        })?;
        debug!("Submitted group {:?}", tx_ids);
        self.status = GroupStatus::Submitted;
        Ok(tx_ids)
    }

    /// Submits the group, waits for it to be confirmed and decodes method returns.
    pub async fn execute(
        &mut self,
        max_rounds_to_wait: Option<u64>,
    ) -> Result<GroupResult, AppClientError> {
        let tx_ids = self.submit().await?;
        let max_rounds_to_wait = max_rounds_to_wait.unwrap_or_else(Config::max_rounds_to_wait);

        let first = wait_for_confirmation(self.transport.as_ref(), &tx_ids[0], max_rounds_to_wait)
            .await?;
        let confirmed_round = first.confirmed_round;

        let mut confirmations = vec![first];
        for tx_id in &tx_ids[1..] {
            confirmations.push(self.transport.pending_transaction_info(tx_id).await?);
        }
        self.status = GroupStatus::Committed;
        info!(
            "Group {:?} confirmed in round {}",
            tx_ids,
            confirmed_round.unwrap_or_default()
        );

        Ok(GroupResult {
            confirmed_round,
            method_returns: self.parse_method_returns(&confirmations)?,
            tx_ids,
            confirmations,
        })
    }

    /// Evaluates the group without committing it, for read-only calls.
    pub async fn simulate(&mut self) -> Result<GroupResult, AppClientError> {
        let signed = self.gather_signatures().await?.to_vec();
        let tx_ids = signed
            .iter()
            .map(|stx| stx.id())
            .collect::<Result<Vec<_>, _>>()?;

        let response: SimulateResponse = self.transport.simulate(&signed).await?;
        if Config::debug() {
            if let Ok(simulate_response) = serde_json::to_value(&response) {
                Config::events()
                    .emit(
                        EventType::TxnGroupSimulated,
                        EventData::TxnGroupSimulated(TxnGroupSimulatedEventData {
                            simulate_response,
                        }),
                    )
                    .await;
            }
        }
        if let Some(message) = response.failure_message {
            return Err(AppClientError::SubmissionError { message });
        }

        Ok(GroupResult {
            confirmed_round: None,
            method_returns: self.parse_method_returns(&response.txn_results)?,
            tx_ids,
            confirmations: response.txn_results,
        })
    }

    fn parse_method_returns(
        &self,
        confirmations: &[PendingTransactionInfo],
    ) -> Result<Vec<ABIReturn>, AppClientError> {
        let mut indexes: Vec<&usize> = self.method_calls.keys().collect();
        indexes.sort();
        indexes
            .into_iter()
            .map(|index| {
                let method = &self.method_calls[index];
                let info = confirmations.get(*index).ok_or_else(|| {
                    AppClientError::DecodeError {
                        message: format!("No result for transaction {} of the group", index),
                    }
                })?;
                method.parse_return(&info.logs).map_err(|e| match e {
                    ABIError::DecodingError { message } => AppClientError::DecodeError { message },
                    other => AppClientError::ABIError { source: other },
                })
            })
            .collect()
    }
}

/// Polls the node until `tx_id` is confirmed, rejected or `max_rounds_to_wait` rounds pass.
pub async fn wait_for_confirmation(
    transport: &dyn Transport,
    tx_id: &str,
    max_rounds_to_wait: u64,
) -> Result<PendingTransactionInfo, AppClientError> {
    let status = transport.status().await?;

    let start_round = status.last_round + 1;
    let mut current_round = start_round;

    while current_round < start_round + max_rounds_to_wait {
        match transport.pending_transaction_info(tx_id).await {
            Ok(response) => {
                if !response.pool_error.is_empty() {
                    warn!("Transaction {} evicted: {}", tx_id, response.pool_error);
                    return Err(AppClientError::SubmissionError {
                        message: format!(
                            "Transaction {} was rejected; pool error: {}",
                            tx_id, response.pool_error
                        ),
                    });
                }

                if response.confirmed_round.is_some() {
                    return Ok(response);
                }
            }
            // Not propagated to the node being queried yet
            Err(TransportError::NotFound { .. }) => {
                current_round += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let _ = transport.wait_for_block(current_round).await;
        current_round += 1;
    }

    warn!(
        "Transaction {} unconfirmed after {} rounds",
        tx_id, max_rounds_to_wait
    );
    Err(AppClientError::TimeoutError {
        message: format!(
            "Transaction {} unconfirmed after {} rounds",
            tx_id, max_rounds_to_wait
        ),
    })
}
