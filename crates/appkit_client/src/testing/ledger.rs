//! An in-memory ledger standing in for an algod node.
//!
//! Groups are verified (group id, validity window, pooled fee, signatures and rekeys) and then
//! evaluated atomically against a copy of the ledger, which only replaces the real state once
//! every transaction succeeds. Approval programs are modelled by handler closures registered
//! against the bytecode the ledger's own compiler produces. Balances are tracked but not enforced.
//!
//! Compiled programs carry an algod style source map in which pc `n` maps to source line `n`
//! (clamped to the last line). A rejecting handler is reported the way algod reports logic
//! errors, with the pc of the first `err` line of the program, or of its last line when it has
//! none.

use crate::application::ApplicationDescription;
use crate::compiler::{
    CompiledProgram, Compiler, CompilerError, declared_version, with_version_pragma,
};
use crate::transport::{
    AccountInfo, AppState, ApplicationInfo, NodeStatus, PendingTransactionInfo, SimulateResponse,
    SuggestedParams, TealValue, Transport, TransportError,
};
use appkit_abi::constants::RETURN_PREFIX;
use appkit_abi::{ABIMethod, ABIType, ABIValue};
use appkit_transact::{
    Address, AlgorandMsgpack, ApplicationCallTransactionFields, Byte32, LogicSignature,
    MAX_TX_GROUP_SIZE, MultisigSignature, OnApplicationComplete, SignedTransaction, StateSchema,
    Transaction, TransactionId, Transactions,
};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha512_256};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

pub const FIRST_APP_ID: u64 = 1001;
pub const GENESIS_ID: &str = "dockernet-v1";
pub const GENESIS_HASH: Byte32 = [9u8; 32];
pub const MIN_FEE: u64 = 1000;

/// What an approval program sees when it runs.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub app_id: u64,
    pub app_address: Address,
    pub sender: Address,
    pub on_complete: OnApplicationComplete,
    pub args: Vec<Vec<u8>>,
    pub accounts: Vec<Address>,
    pub apps: Vec<u64>,
    pub assets: Vec<u64>,
    pub global_state: AppState,
    /// `None` when the sender has not opted in.
    pub local_state: Option<AppState>,
    pub group: Vec<Transaction>,
    pub group_index: usize,
}

impl ApprovalRequest {
    pub fn is_create(&self) -> bool {
        self.group[self.group_index]
            .as_application_call()
            .is_some_and(|call| call.app_id == 0)
    }

    /// True when the first application argument is the selector of `signature`.
    pub fn is_method(&self, signature: &str) -> bool {
        let selector = ABIMethod::from_str(signature).and_then(|method| method.selector());
        match (selector, self.args.first()) {
            (Ok(selector), Some(first)) => &selector == first,
            _ => false,
        }
    }

    pub fn uint_arg(&self, index: usize) -> Result<u64, String> {
        self.decode_arg(index, &ABIType::uint64())?
            .as_u64()
            .ok_or_else(|| format!("argument {} is not a uint64", index))
    }

    pub fn string_arg(&self, index: usize) -> Result<String, String> {
        self.decode_arg(index, &ABIType::String)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("argument {} is not a string", index))
    }

    /// Decodes the application argument at `index`, where 0 is the selector.
    pub fn decode_arg(&self, index: usize, abi_type: &ABIType) -> Result<ABIValue, String> {
        let bytes = self
            .args
            .get(index)
            .ok_or_else(|| format!("missing application argument {}", index))?;
        abi_type.decode(bytes).map_err(|e| e.to_string())
    }

    pub fn global_uint(&self, key: &str) -> Option<u64> {
        self.global_state
            .get(key.as_bytes())
            .and_then(TealValue::as_uint)
    }

    pub fn local_uint(&self, key: &str) -> Option<u64> {
        self.local_state
            .as_ref()
            .and_then(|state| state.get(key.as_bytes()))
            .and_then(TealValue::as_uint)
    }

    /// The transaction placed immediately before this one, if any.
    pub fn previous_transaction(&self) -> Option<&Transaction> {
        self.group_index
            .checked_sub(1)
            .and_then(|index| self.group.get(index))
    }
}

/// State changes and logs produced by an approval program that accepted the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalEffects {
    pub logs: Vec<Vec<u8>>,
    pub global_updates: Vec<(Vec<u8>, TealValue)>,
    pub local_updates: Vec<(Vec<u8>, TealValue)>,
}

impl ApprovalEffects {
    pub fn approve() -> Self {
        Self::default()
    }

    /// Approves and logs `value` as the method's return value.
    pub fn returning(abi_type: &ABIType, value: &ABIValue) -> Result<Self, String> {
        let mut log = RETURN_PREFIX.to_vec();
        log.extend(abi_type.encode(value).map_err(|e| e.to_string())?);
        Ok(Self::default().log(log))
    }

    pub fn log(mut self, entry: Vec<u8>) -> Self {
        self.logs.push(entry);
        self
    }

    pub fn set_global(mut self, key: &str, value: TealValue) -> Self {
        self.global_updates.push((key.as_bytes().to_vec(), value));
        self
    }

    pub fn set_local(mut self, key: &str, value: TealValue) -> Self {
        self.local_updates.push((key.as_bytes().to_vec(), value));
        self
    }
}

pub type ApprovalHandler =
    Arc<dyn Fn(&ApprovalRequest) -> Result<ApprovalEffects, String> + Send + Sync>;

#[derive(Debug, Clone)]
struct AppRecord {
    creator: Address,
    approval_program: Vec<u8>,
    clear_state_program: Vec<u8>,
    global_state_schema: StateSchema,
    local_state_schema: StateSchema,
    extra_program_pages: u64,
    global_state: AppState,
}

#[derive(Debug, Clone)]
struct LedgerState {
    last_round: u64,
    next_app_id: u64,
    apps: HashMap<u64, AppRecord>,
    local_states: HashMap<(Address, u64), AppState>,
    balances: HashMap<Address, u64>,
    auth_addresses: HashMap<Address, Address>,
    pending: HashMap<String, PendingTransactionInfo>,
}

impl Default for LedgerState {
    fn default() -> Self {
        LedgerState {
            last_round: 1,
            next_app_id: FIRST_APP_ID,
            apps: HashMap::new(),
            local_states: HashMap::new(),
            balances: HashMap::new(),
            auth_addresses: HashMap::new(),
            pending: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Knobs {
    compile_error: Option<String>,
    reject_submission: Option<String>,
    pool_error: Option<String>,
    stall_confirmation: bool,
}

/// Result of evaluating a group without committing it.
struct Evaluation {
    state: LedgerState,
    round: u64,
    results: Vec<(String, PendingTransactionInfo)>,
}

#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    knobs: Mutex<Knobs>,
    handlers: Mutex<HashMap<Vec<u8>, ApprovalHandler>>,
    /// Source, pragma included, of every program compiled or registered.
    sources: Mutex<HashMap<Vec<u8>, String>>,
    submitted: Mutex<Vec<Vec<SignedTransaction>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bytecode the ledger's compiler produces for `source`: the version byte followed by the
    /// SHA-512/256 digest of the source with its version pragma.
    pub fn program_bytecode(source: &str, version: u8) -> Vec<u8> {
        let source = program_source(source, version);
        let version = declared_version(&source).unwrap_or(version);
        let mut bytecode = vec![version];
        bytecode.extend_from_slice(&Sha512_256::digest(source.as_bytes()));
        bytecode
    }

    /// The `mappings` of the source map for `source`: one segment per pc of `bytecode_len`.
    pub fn source_mappings(source: &str, bytecode_len: usize) -> String {
        let last_line = source.lines().count().saturating_sub(1);
        (0..bytecode_len)
            .map(|pc| match pc {
                0 => "AAAA",
                pc if pc <= last_line => "AACA",
                _ => "",
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// The pc a rejecting handler is reported at for `source`.
    pub fn failing_pc(source: &str, bytecode_len: usize) -> u64 {
        let lines: Vec<&str> = source.lines().collect();
        let line = lines
            .iter()
            .position(|line| line.trim() == "err")
            .unwrap_or_else(|| lines.len().saturating_sub(1));
        line.min(bytecode_len.saturating_sub(1)) as u64
    }

    fn remember_source(&self, bytecode: &[u8], source: &str, version: u8) {
        lock(&self.sources).insert(bytecode.to_vec(), program_source(source, version));
    }

    /// Runs `handler` whenever an application whose approval program was compiled from `source`
    /// is called. Programs without a handler approve everything.
    pub fn on_approval<F>(&self, source: &str, version: u8, handler: F)
    where
        F: Fn(&ApprovalRequest) -> Result<ApprovalEffects, String> + Send + Sync + 'static,
    {
        let bytecode = Self::program_bytecode(source, version);
        self.remember_source(&bytecode, source, version);
        lock(&self.handlers).insert(bytecode, Arc::new(handler));
    }

    /// Registers `handler` as the approval program of `app`.
    pub fn register<F>(&self, app: &ApplicationDescription, handler: F)
    where
        F: Fn(&ApprovalRequest) -> Result<ApprovalEffects, String> + Send + Sync + 'static,
    {
        self.on_approval(app.approval_source(), app.version(), handler);
    }

    pub fn fail_compilation(&self, message: Option<&str>) {
        lock(&self.knobs).compile_error = message.map(str::to_string);
    }

    /// Makes the node refuse every submission with `message`.
    pub fn reject_submissions(&self, message: Option<&str>) {
        lock(&self.knobs).reject_submission = message.map(str::to_string);
    }

    /// Accepts submissions but evicts them from the pool with `message`.
    pub fn evict_with_pool_error(&self, message: Option<&str>) {
        lock(&self.knobs).pool_error = message.map(str::to_string);
    }

    /// Accepts submissions but never confirms them.
    pub fn stall_confirmations(&self, stall: bool) {
        lock(&self.knobs).stall_confirmation = stall;
    }

    pub fn fund(&self, address: &Address, amount: u64) {
        *lock(&self.state)
            .balances
            .entry(address.clone())
            .or_default() += amount;
    }

    pub fn balance(&self, address: &Address) -> u64 {
        lock(&self.state)
            .balances
            .get(address)
            .copied()
            .unwrap_or_default()
    }

    pub fn last_round(&self) -> u64 {
        lock(&self.state).last_round
    }

    pub fn app_exists(&self, app_id: u64) -> bool {
        lock(&self.state).apps.contains_key(&app_id)
    }

    pub fn global_state(&self, app_id: u64) -> Option<AppState> {
        lock(&self.state)
            .apps
            .get(&app_id)
            .map(|app| app.global_state.clone())
    }

    pub fn local_state(&self, address: &Address, app_id: u64) -> Option<AppState> {
        lock(&self.state)
            .local_states
            .get(&(address.clone(), app_id))
            .cloned()
    }

    pub fn is_opted_in(&self, address: &Address, app_id: u64) -> bool {
        self.local_state(address, app_id).is_some()
    }

    /// The account authorized to sign for `address`.
    pub fn auth_address(&self, address: &Address) -> Address {
        lock(&self.state)
            .auth_addresses
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.clone())
    }

    /// Every group handed to [`Transport::submit`], in order, including rejected ones.
    pub fn submitted_groups(&self) -> Vec<Vec<SignedTransaction>> {
        lock(&self.submitted).clone()
    }

    pub fn last_submitted_group(&self) -> Option<Vec<SignedTransaction>> {
        lock(&self.submitted).last().cloned()
    }

    fn evaluate(
        &self,
        base: &LedgerState,
        signed: &[SignedTransaction],
        allow_empty_signatures: bool,
    ) -> Result<Evaluation, String> {
        if signed.is_empty() {
            return Err("empty transaction group".to_string());
        }
        if signed.len() > MAX_TX_GROUP_SIZE {
            return Err(format!(
                "group size {} exceeds maximum {}",
                signed.len(),
                MAX_TX_GROUP_SIZE
            ));
        }

        let group: Vec<Transaction> = signed.iter().map(|stx| stx.transaction.clone()).collect();
        verify_group(&group)?;

        let required_fee = MIN_FEE * group.len() as u64;
        let paid_fee: u64 = group.iter().map(|txn| txn.header().fee.unwrap_or(0)).sum();
        if paid_fee < required_fee {
            return Err(format!(
                "txgroup had {} in fees, which is less than the minimum {}",
                paid_fee, required_fee
            ));
        }

        let mut state = base.clone();
        let round = state.last_round + 1;
        let mut results = Vec::with_capacity(signed.len());
        for (index, stx) in signed.iter().enumerate() {
            let tx_id = stx.id().map_err(|e| e.to_string())?;
            let transaction_error = |message: String| format!("transaction {}: {}", tx_id, message);

            if base.pending.contains_key(&tx_id) {
                return Err(transaction_error("transaction already in ledger".to_string()));
            }
            verify_header(&stx.transaction, round).map_err(transaction_error)?;
            verify_authorization(&state, stx, allow_empty_signatures).map_err(transaction_error)?;

            let info = self
                .apply(&mut state, &group, index)
                .map_err(transaction_error)?;
            results.push((tx_id, info));
        }

        Ok(Evaluation {
            state,
            round,
            results,
        })
    }

    fn apply(
        &self,
        state: &mut LedgerState,
        group: &[Transaction],
        index: usize,
    ) -> Result<PendingTransactionInfo, String> {
        let transaction = &group[index];
        let sender = transaction.sender().clone();
        let fee = transaction.header().fee.unwrap_or(0);
        debit(state, &sender, fee);

        let info = match transaction {
            Transaction::Payment(payment) => {
                debit(state, &sender, payment.amount);
                *state
                    .balances
                    .entry(payment.receiver.clone())
                    .or_default() += payment.amount;
                if let Some(close_to) = &payment.close_remainder_to {
                    let remainder = state.balances.remove(&sender).unwrap_or_default();
                    *state.balances.entry(close_to.clone()).or_default() += remainder;
                }
                PendingTransactionInfo::default()
            }
            Transaction::ApplicationCall(call) => self.apply_app_call(state, group, index, call)?,
        };

        if let Some(rekey_to) = &transaction.header().rekey_to {
            if rekey_to == &sender {
                state.auth_addresses.remove(&sender);
            } else {
                state.auth_addresses.insert(sender, rekey_to.clone());
            }
        }
        Ok(info)
    }

    fn apply_app_call(
        &self,
        state: &mut LedgerState,
        group: &[Transaction],
        index: usize,
        call: &ApplicationCallTransactionFields,
    ) -> Result<PendingTransactionInfo, String> {
        let sender = call.header.sender.clone();

        if call.app_id == 0 {
            let (Some(approval_program), Some(clear_state_program)) =
                (&call.approval_program, &call.clear_state_program)
            else {
                return Err("application create requires both programs".to_string());
            };
            if !matches!(
                call.on_complete,
                OnApplicationComplete::NoOp | OnApplicationComplete::OptIn
            ) {
                return Err(format!("cannot create an application with {}", call.on_complete));
            }

            let app_id = state.next_app_id;
            state.next_app_id += 1;
            state.apps.insert(
                app_id,
                AppRecord {
                    creator: sender.clone(),
                    approval_program: approval_program.clone(),
                    clear_state_program: clear_state_program.clone(),
                    global_state_schema: call.global_state_schema.clone().unwrap_or_default(),
                    local_state_schema: call.local_state_schema.clone().unwrap_or_default(),
                    extra_program_pages: call.extra_program_pages.unwrap_or_default(),
                    global_state: AppState::new(),
                },
            );
            if call.on_complete == OnApplicationComplete::OptIn {
                state.local_states.insert((sender, app_id), AppState::new());
            }

            let logs = self.run_approval(state, group, index, app_id)?;
            return Ok(PendingTransactionInfo {
                application_index: Some(app_id),
                logs,
                ..Default::default()
            });
        }

        let app_id = call.app_id;
        if !state.apps.contains_key(&app_id) {
            return Err(format!("application {} does not exist", app_id));
        }
        let local_key = (sender.clone(), app_id);
        let opted_in = state.local_states.contains_key(&local_key);

        let logs = match call.on_complete {
            // Clearing local state always succeeds, whatever the approval program says
            OnApplicationComplete::ClearState => {
                if !opted_in {
                    return Err(format!("{} is not opted in to app {}", sender, app_id));
                }
                state.local_states.remove(&local_key);
                Vec::new()
            }
            OnApplicationComplete::OptIn => {
                if opted_in {
                    return Err(format!("{} has already opted in to app {}", sender, app_id));
                }
                state.local_states.insert(local_key, AppState::new());
                self.run_approval(state, group, index, app_id)?
            }
            OnApplicationComplete::CloseOut => {
                if !opted_in {
                    return Err(format!("{} is not opted in to app {}", sender, app_id));
                }
                let logs = self.run_approval(state, group, index, app_id)?;
                state.local_states.remove(&local_key);
                logs
            }
            OnApplicationComplete::UpdateApplication => {
                let (Some(approval_program), Some(clear_state_program)) =
                    (&call.approval_program, &call.clear_state_program)
                else {
                    return Err("application update requires both programs".to_string());
                };
                let logs = self.run_approval(state, group, index, app_id)?;
                if let Some(app) = state.apps.get_mut(&app_id) {
                    app.approval_program = approval_program.clone();
                    app.clear_state_program = clear_state_program.clone();
                }
                logs
            }
            OnApplicationComplete::DeleteApplication => {
                let logs = self.run_approval(state, group, index, app_id)?;
                state.apps.remove(&app_id);
                logs
            }
            OnApplicationComplete::NoOp => self.run_approval(state, group, index, app_id)?,
        };

        Ok(PendingTransactionInfo {
            logs,
            ..Default::default()
        })
    }

    fn run_approval(
        &self,
        state: &mut LedgerState,
        group: &[Transaction],
        index: usize,
        app_id: u64,
    ) -> Result<Vec<Vec<u8>>, String> {
        let Some(call) = group[index].as_application_call() else {
            return Err("not an application call".to_string());
        };
        let app = state
            .apps
            .get(&app_id)
            .ok_or_else(|| format!("application {} does not exist", app_id))?;
        let sender = call.header.sender.clone();

        let handler = lock(&self.handlers).get(&app.approval_program).cloned();
        let Some(handler) = handler else {
            return Ok(Vec::new());
        };

        let request = ApprovalRequest {
            app_id,
            app_address: Address::from_app_id(app_id),
            sender: sender.clone(),
            on_complete: call.on_complete,
            args: call.args.clone().unwrap_or_default(),
            accounts: call.account_references.clone().unwrap_or_default(),
            apps: call.app_references.clone().unwrap_or_default(),
            assets: call.asset_references.clone().unwrap_or_default(),
            global_state: app.global_state.clone(),
            local_state: state.local_states.get(&(sender.clone(), app_id)).cloned(),
            group: group.to_vec(),
            group_index: index,
        };
        let effects = handler(&request).map_err(|message| {
            let pc = lock(&self.sources)
                .get(&app.approval_program)
                .map(|source| Self::failing_pc(source, app.approval_program.len()))
                .unwrap_or_default();
            format!(
                "logic eval error: {}. Details: app={}, pc={}",
                message, app_id, pc
            )
        })?;

        if !effects.global_updates.is_empty() {
            let app = state
                .apps
                .get_mut(&app_id)
                .ok_or_else(|| format!("application {} does not exist", app_id))?;
            app.global_state.extend(effects.global_updates);
            check_schema(&app.global_state, &app.global_state_schema, "global")?;
        }
        if !effects.local_updates.is_empty() {
            let schema = state
                .apps
                .get(&app_id)
                .map(|app| app.local_state_schema.clone())
                .unwrap_or_default();
            let local_state = state
                .local_states
                .get_mut(&(sender.clone(), app_id))
                .ok_or_else(|| format!("logic eval error: {} is not opted in to app {}", sender, app_id))?;
            local_state.extend(effects.local_updates);
            check_schema(local_state, &schema, "local")?;
        }

        Ok(effects.logs)
    }
}

fn program_source(source: &str, version: u8) -> String {
    with_version_pragma(source, version).unwrap_or_else(|_| source.to_string())
}

fn debit(state: &mut LedgerState, address: &Address, amount: u64) {
    if let Some(balance) = state.balances.get_mut(address) {
        *balance = balance.saturating_sub(amount);
    }
}

fn check_schema(app_state: &AppState, schema: &StateSchema, scope: &str) -> Result<(), String> {
    let uints = app_state
        .values()
        .filter(|value| matches!(value, TealValue::Uint(_)))
        .count() as u64;
    let byte_slices = app_state.len() as u64 - uints;
    if uints > schema.num_uints {
        return Err(format!(
            "logic eval error: store integer count {} exceeds {} schema integer count {}",
            uints, scope, schema.num_uints
        ));
    }
    if byte_slices > schema.num_byte_slices {
        return Err(format!(
            "logic eval error: store bytes count {} exceeds {} schema bytes count {}",
            byte_slices, scope, schema.num_byte_slices
        ));
    }
    Ok(())
}

fn verify_group(group: &[Transaction]) -> Result<(), String> {
    if group.len() == 1 && group[0].header().group.is_none() {
        return Ok(());
    }

    let ungrouped: Vec<Transaction> = group
        .iter()
        .cloned()
        .map(|mut txn| {
            txn.header_mut().group = None;
            txn
        })
        .collect();
    let expected = ungrouped
        .as_slice()
        .assign_group()
        .map_err(|e| e.to_string())?;

    for (actual, expected) in group.iter().zip(&expected) {
        if actual.header().group != expected.header().group {
            return Err("transactionGroup: incomplete group".to_string());
        }
    }
    Ok(())
}

fn verify_header(transaction: &Transaction, round: u64) -> Result<(), String> {
    let header = transaction.header();
    if round < header.first_valid || round > header.last_valid {
        return Err(format!(
            "txn dead: round {} outside of {}--{}",
            round, header.first_valid, header.last_valid
        ));
    }
    if header.genesis_hash.is_some_and(|genesis_hash| genesis_hash != GENESIS_HASH) {
        return Err("genesis hash mismatch".to_string());
    }
    if header
        .genesis_id
        .as_deref()
        .is_some_and(|genesis_id| genesis_id != GENESIS_ID)
    {
        return Err("genesis id mismatch".to_string());
    }
    Ok(())
}

fn verify_authorization(
    state: &LedgerState,
    stx: &SignedTransaction,
    allow_empty_signatures: bool,
) -> Result<(), String> {
    let unsigned =
        stx.signature.is_none() && stx.multisignature.is_none() && stx.logic_signature.is_none();
    if unsigned && allow_empty_signatures {
        return Ok(());
    }

    let sender = stx.transaction.sender();
    let expected = state.auth_addresses.get(sender).unwrap_or(sender);
    let authorizer = stx.authorizer();
    if authorizer != expected {
        return Err(format!(
            "should have been authorized by {} but was actually authorized by {}",
            expected, authorizer
        ));
    }

    let bytes = stx.transaction.encode().map_err(|e| e.to_string())?;
    match (
        &stx.signature,
        &stx.multisignature,
        &stx.logic_signature,
    ) {
        (Some(signature), None, None) => verify_ed25519(authorizer, &bytes, signature),
        (None, Some(multisignature), None) => {
            verify_multisig(authorizer, &bytes, multisignature)
        }
        (None, None, Some(logic_signature)) => verify_logic_sig(authorizer, logic_signature),
        (None, None, None) => Err("transaction is not signed".to_string()),
        _ => Err("transaction carries more than one kind of signature".to_string()),
    }
}

fn verify_ed25519(signer: &Address, bytes: &[u8], signature: &[u8; 64]) -> Result<(), String> {
    let key = VerifyingKey::from_bytes(signer.as_bytes()).map_err(|e| e.to_string())?;
    key.verify(bytes, &Signature::from_bytes(signature))
        .map_err(|_| "signature validation failed".to_string())
}

fn verify_multisig(
    authorizer: &Address,
    bytes: &[u8],
    multisignature: &MultisigSignature,
) -> Result<(), String> {
    if &multisignature.address() != authorizer {
        return Err("multisig account does not match the authorizer".to_string());
    }

    let mut valid = 0usize;
    for subsig in &multisignature.subsignatures {
        if let Some(signature) = &subsig.signature {
            verify_ed25519(&subsig.address, bytes, signature)?;
            valid += 1;
        }
    }
    if valid < multisignature.threshold as usize {
        return Err(format!(
            "multisig has {} signatures, the threshold is {}",
            valid, multisignature.threshold
        ));
    }
    Ok(())
}

fn verify_logic_sig(authorizer: &Address, logic_signature: &LogicSignature) -> Result<(), String> {
    if logic_signature.is_delegated() {
        return Err("delegated logic signatures are not supported".to_string());
    }
    if &logic_signature.address() != authorizer {
        return Err("logic signature program does not match the authorizer".to_string());
    }
    Ok(())
}

#[async_trait]
impl Transport for MockLedger {
    async fn suggested_params(&self) -> Result<SuggestedParams, TransportError> {
        Ok(SuggestedParams {
            fee: 0,
            min_fee: MIN_FEE,
            last_round: self.last_round(),
            genesis_id: GENESIS_ID.to_string(),
            genesis_hash: GENESIS_HASH,
            consensus_version: "future".to_string(),
        })
    }

    async fn submit(&self, signed: &[SignedTransaction]) -> Result<String, TransportError> {
        lock(&self.submitted).push(signed.to_vec());

        let (reject_submission, pool_error, stall_confirmation) = {
            let knobs = lock(&self.knobs);
            (
                knobs.reject_submission.clone(),
                knobs.pool_error.clone(),
                knobs.stall_confirmation,
            )
        };
        if let Some(message) = reject_submission {
            return Err(TransportError::Rejected { message });
        }

        let mut state = lock(&self.state);
        let evaluation =
            self.evaluate(&state, signed, false)
                .map_err(|message| TransportError::Rejected {
                    message: format!("TransactionPool.Remember: {}", message),
                })?;
        let first_tx_id = evaluation
            .results
            .first()
            .map(|(tx_id, _)| tx_id.clone())
            .unwrap_or_default();

        if pool_error.is_some() || stall_confirmation {
            // The group never makes it into a block
            for (tx_id, _) in evaluation.results {
                state.pending.insert(
                    tx_id,
                    PendingTransactionInfo {
                        pool_error: pool_error.clone().unwrap_or_default(),
                        ..Default::default()
                    },
                );
            }
            return Ok(first_tx_id);
        }

        let Evaluation {
            state: mut next,
            round,
            results,
        } = evaluation;
        next.last_round = round;
        for (tx_id, mut info) in results {
            info.confirmed_round = Some(round);
            next.pending.insert(tx_id, info);
        }
        *state = next;
        Ok(first_tx_id)
    }

    async fn pending_transaction_info(
        &self,
        tx_id: &str,
    ) -> Result<PendingTransactionInfo, TransportError> {
        lock(&self.state)
            .pending
            .get(tx_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound {
                message: format!("transaction {} not found", tx_id),
            })
    }

    async fn status(&self) -> Result<NodeStatus, TransportError> {
        Ok(NodeStatus {
            last_round: self.last_round(),
        })
    }

    async fn wait_for_block(&self, round: u64) -> Result<NodeStatus, TransportError> {
        let mut state = lock(&self.state);
        state.last_round = state.last_round.max(round);
        Ok(NodeStatus {
            last_round: state.last_round,
        })
    }

    async fn application_info(&self, app_id: u64) -> Result<ApplicationInfo, TransportError> {
        let state = lock(&self.state);
        let app = state
            .apps
            .get(&app_id)
            .ok_or_else(|| TransportError::NotFound {
                message: format!("application {} does not exist", app_id),
            })?;
        Ok(ApplicationInfo {
            app_id,
            creator: app.creator.clone(),
            approval_program: app.approval_program.clone(),
            clear_state_program: app.clear_state_program.clone(),
            global_state_schema: app.global_state_schema.clone(),
            local_state_schema: app.local_state_schema.clone(),
            extra_program_pages: app.extra_program_pages,
            global_state: app.global_state.clone(),
        })
    }

    async fn account_info(&self, address: &Address) -> Result<AccountInfo, TransportError> {
        let state = lock(&self.state);
        Ok(AccountInfo {
            address: address.clone(),
            amount: state.balances.get(address).copied().unwrap_or_default(),
            auth_address: state.auth_addresses.get(address).cloned(),
            total_apps_opted_in: state
                .local_states
                .keys()
                .filter(|(account, _)| account == address)
                .count() as u64,
            total_created_apps: state
                .apps
                .values()
                .filter(|app| &app.creator == address)
                .count() as u64,
            round: state.last_round,
        })
    }

    async fn account_application_info(
        &self,
        address: &Address,
        app_id: u64,
    ) -> Result<AppState, TransportError> {
        self.local_state(address, app_id)
            .ok_or_else(|| TransportError::NotFound {
                message: format!("{} has not opted in to application {}", address, app_id),
            })
    }

    async fn simulate(
        &self,
        signed: &[SignedTransaction],
    ) -> Result<SimulateResponse, TransportError> {
        let state = lock(&self.state);
        match self.evaluate(&state, signed, true) {
            Ok(evaluation) => Ok(SimulateResponse {
                last_round: state.last_round,
                failure_message: None,
                txn_results: evaluation.results.into_iter().map(|(_, info)| info).collect(),
            }),
            Err(message) => Ok(SimulateResponse {
                last_round: state.last_round,
                failure_message: Some(message),
                txn_results: Vec::new(),
            }),
        }
    }
}

#[async_trait]
impl Compiler for MockLedger {
    async fn compile(&self, source: &str, version: u8) -> Result<CompiledProgram, CompilerError> {
        if let Some(message) = lock(&self.knobs).compile_error.clone() {
            return Err(CompilerError::Rejected { message });
        }

        let bytecode = Self::program_bytecode(source, version);
        self.remember_source(&bytecode, source, version);
        let mappings = Self::source_mappings(&program_source(source, version), bytecode.len());
        Ok(CompiledProgram {
            hash: LogicSignature::new(bytecode.clone(), None)
                .address()
                .to_string(),
            bytecode,
            source_map: Some(serde_json::json!({
                "version": 3,
                "sources": [],
                "names": [],
                "mappings": mappings,
            })),
        })
    }
}
