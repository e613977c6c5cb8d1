use super::{ApplicationClient, CallOverrides};
use crate::application::MethodSpec;
use crate::composer::{AtomicGroup, GroupResult, MethodCall, TransactionWithSigner};
use crate::error::AppClientError;
use crate::method_call::{MethodArg, References, resolve_method_args, resolve_struct_args};
use crate::signer::Signer;
use crate::transport::{SuggestedParams, genesis_id_is_localnet};
use appkit_abi::ABIReturn;
use appkit_transact::{
    Address, ApplicationCallTransactionFields, FeeParams, MAX_EXTRA_PROGRAM_PAGES,
    OnApplicationComplete, PROGRAM_PAGE_SIZE, PaymentTransactionFields, StateSchema, Transaction,
    TransactionHeader,
};
use log::{debug, info};

/// Rounds a transaction stays valid for on local development networks.
const LOCALNET_VALIDITY_WINDOW: u64 = 1000;
const DEFAULT_VALIDITY_WINDOW: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResult {
    pub app_id: u64,
    pub app_address: Address,
    pub tx_id: String,
}

/// Signer, sender and network parameters resolved for one operation.
pub(super) struct CallContext {
    pub sender: Address,
    pub signer: Signer,
    pub params: SuggestedParams,
}

/// The application-specific part of an application call.
#[derive(Default)]
pub(super) struct AppCall {
    pub app_id: u64,
    pub on_complete: OnApplicationComplete,
    pub approval_program: Option<Vec<u8>>,
    pub clear_state_program: Option<Vec<u8>>,
    pub global_state_schema: Option<StateSchema>,
    pub local_state_schema: Option<StateSchema>,
    pub extra_program_pages: Option<u64>,
}

impl AppCall {
    pub fn new(app_id: u64, on_complete: OnApplicationComplete) -> Self {
        AppCall {
            app_id,
            on_complete,
            ..Default::default()
        }
    }
}

/// Extra pages needed to fit both programs, beyond the first page.
fn required_extra_pages(program_bytes: usize) -> u64 {
    program_bytes
        .saturating_sub(PROGRAM_PAGE_SIZE)
        .div_ceil(PROGRAM_PAGE_SIZE) as u64
}

impl ApplicationClient {
    /// Deploys the application and points this client at it.
    ///
    /// `extra_pages` defaults to the number of pages the compiled programs need.
    pub async fn create(
        &mut self,
        extra_pages: Option<u64>,
        overrides: CallOverrides,
    ) -> Result<CreateResult, AppClientError> {
        if self.app_id != 0 {
            return Err(AppClientError::ConfigurationError {
                message: format!("Application {} is already deployed", self.app_id),
            });
        }

        let (approval, clear) = self.compile().await?;
        let required = required_extra_pages(approval.len() + clear.len());
        let extra_pages = match extra_pages {
            Some(pages) if pages > MAX_EXTRA_PROGRAM_PAGES => {
                return Err(AppClientError::ArgumentError {
                    message: format!(
                        "{} extra pages requested, the maximum is {}",
                        pages, MAX_EXTRA_PROGRAM_PAGES
                    ),
                });
            }
            Some(pages) => pages,
            None if required > MAX_EXTRA_PROGRAM_PAGES => {
                return Err(AppClientError::ArgumentError {
                    message: format!(
                        "Programs total {} bytes, more than fits in {} extra pages",
                        approval.len() + clear.len(),
                        MAX_EXTRA_PROGRAM_PAGES
                    ),
                });
            }
            None => required,
        };

        let handler = self.app.create_handler();
        let on_complete = handler
            .map(|(_, on_complete)| on_complete)
            .unwrap_or_default();
        let handler = handler.map(|(spec, _)| spec.clone());

        let call = AppCall {
            approval_program: Some(approval),
            clear_state_program: Some(clear),
            global_state_schema: Some(self.app.global_schema().clone()),
            local_state_schema: Some(self.app.local_schema().clone()),
            extra_program_pages: Some(extra_pages),
            ..AppCall::new(0, on_complete)
        };
        let result = self.send_lifecycle(call, handler, &overrides).await?;

        let app_id = result
            .confirmations
            .last()
            .and_then(|confirmation| confirmation.application_index)
            .ok_or_else(|| AppClientError::DecodeError {
                message: "Node did not report the id of the created application".to_string(),
            })?;
        let app_address = self.transport.application_address(app_id);
        let tx_id = last_tx_id(&result)?;

        self.app_id = app_id;
        self.app_address = Some(app_address.clone());
        info!(
            "Created application {} ({}) at {} in transaction {}",
            self.app.name(),
            app_id,
            app_address,
            tx_id
        );

        Ok(CreateResult {
            app_id,
            app_address,
            tx_id,
        })
    }

    /// Replaces the programs of the deployed application with freshly compiled ones.
    pub async fn update(&mut self, overrides: CallOverrides) -> Result<String, AppClientError> {
        let app_id = self.deployed_app_id()?;
        let (approval, clear) = self.compile().await?;
        let call = AppCall {
            approval_program: Some(approval),
            clear_state_program: Some(clear),
            ..AppCall::new(app_id, OnApplicationComplete::UpdateApplication)
        };
        let handler = self
            .app
            .handler(OnApplicationComplete::UpdateApplication)
            .cloned();

        let result = self.send_lifecycle(call, handler, &overrides).await?;
        self.app_address = Some(self.transport.application_address(app_id));
        last_tx_id(&result)
    }

    pub async fn delete(&self, overrides: CallOverrides) -> Result<String, AppClientError> {
        self.bare_or_handled(OnApplicationComplete::DeleteApplication, overrides)
            .await
    }

    pub async fn opt_in(&self, overrides: CallOverrides) -> Result<String, AppClientError> {
        self.bare_or_handled(OnApplicationComplete::OptIn, overrides)
            .await
    }

    pub async fn close_out(&self, overrides: CallOverrides) -> Result<String, AppClientError> {
        self.bare_or_handled(OnApplicationComplete::CloseOut, overrides)
            .await
    }

    /// Releases the sender's local state. Never routed through a method; the approval program
    /// does not run for this intent.
    pub async fn clear_state(&self, overrides: CallOverrides) -> Result<String, AppClientError> {
        let app_id = self.deployed_app_id()?;
        let call = AppCall::new(app_id, OnApplicationComplete::ClearState);
        let result = self.send_lifecycle(call, None, &overrides).await?;
        last_tx_id(&result)
    }

    /// Calls a method and returns its decoded result. Read-only methods are simulated.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<MethodArg>,
        on_complete: OnApplicationComplete,
        overrides: CallOverrides,
    ) -> Result<ABIReturn, AppClientError> {
        let read_only = self.app.method(method)?.hints.read_only;
        let max_rounds_to_wait = overrides.max_rounds_to_wait;
        let group = self
            .add_method_call(self.new_group(), method, args, on_complete, overrides)
            .await?;

        let simulate = read_only && on_complete == OnApplicationComplete::NoOp;
        if simulate {
            debug!("Simulating read-only method {}", method);
        }
        let mut result = self.send_group(group, simulate, max_rounds_to_wait).await?;
        result
            .method_returns
            .pop()
            .ok_or_else(|| AppClientError::DecodeError {
                message: format!("No return recorded for method {}", method),
            })
    }

    /// Appends a method call, and any transactions passed as its arguments, to `group`.
    pub async fn add_method_call(
        &self,
        mut group: AtomicGroup,
        method: &str,
        args: Vec<MethodArg>,
        on_complete: OnApplicationComplete,
        overrides: CallOverrides,
    ) -> Result<AtomicGroup, AppClientError> {
        if on_complete == OnApplicationComplete::ClearState {
            return Err(AppClientError::ArgumentError {
                message: "ClearState calls cannot invoke a method; use clear_state".to_string(),
            });
        }
        let app_id = self.deployed_app_id()?;
        let spec = self.app.method(method)?.clone();
        let context = self.call_context(&overrides).await?;

        let method_call = self
            .method_call(
                &context,
                AppCall::new(app_id, on_complete),
                &spec,
                args,
                &overrides,
            )
            .await?;
        group.add_method_call(method_call)?;
        Ok(group)
    }

    /// Appends an arbitrary transaction signed by `signer`, or by the client's signer.
    pub fn add_transaction(
        &self,
        mut group: AtomicGroup,
        transaction: Transaction,
        signer: Option<&Signer>,
    ) -> Result<AtomicGroup, AppClientError> {
        let signer = self.get_signer(signer)?;
        group.add_transaction(TransactionWithSigner {
            transaction,
            signer: signer.as_transaction_signer(),
        })?;
        Ok(group)
    }

    /// Pays `amount` microALGO from the sender to the application account.
    pub async fn fund(&self, amount: u64, overrides: CallOverrides) -> Result<String, AppClientError> {
        let app_id = self.deployed_app_id()?;
        let context = self.call_context(&overrides).await?;

        let payment = Transaction::Payment(PaymentTransactionFields {
            header: self.header(&context, &overrides),
            receiver: self.transport.application_address(app_id),
            amount,
            close_remainder_to: None,
        });
        let transaction = payment.assign_fee(fee_params(&context.params))?;

        let mut group = self.new_group();
        group.add_transaction(TransactionWithSigner {
            transaction,
            signer: context.signer.as_transaction_signer(),
        })?;
        let result = group.execute(overrides.max_rounds_to_wait).await?;
        last_tx_id(&result)
    }

    async fn bare_or_handled(
        &self,
        on_complete: OnApplicationComplete,
        overrides: CallOverrides,
    ) -> Result<String, AppClientError> {
        let app_id = self.deployed_app_id()?;
        let handler = self.app.handler(on_complete).cloned();
        let result = self
            .send_lifecycle(AppCall::new(app_id, on_complete), handler, &overrides)
            .await?;
        last_tx_id(&result)
    }

    /// Sends a lifecycle call, through `handler` when the application routes the intent to a
    /// method. Handler arguments are filled from their defaults.
    async fn send_lifecycle(
        &self,
        call: AppCall,
        handler: Option<MethodSpec>,
        overrides: &CallOverrides,
    ) -> Result<GroupResult, AppClientError> {
        let context = self.call_context(overrides).await?;
        let mut group = self.new_group();
        let on_complete = call.on_complete;

        match handler {
            Some(spec) => {
                let args = spec.method.args.iter().map(|_| MethodArg::Default).collect();
                let method_call = self
                    .method_call(&context, call, &spec, args, overrides)
                    .await?;
                group.add_method_call(method_call)?;
            }
            None => {
                let references = references(overrides);
                let app_args = overrides.args.clone().unwrap_or_default();
                group.add_transaction(self.application_call(
                    &context, call, app_args, references, overrides,
                )?)?;
            }
        }

        debug!(
            "Sending {} call to application {} from {}",
            on_complete,
            self.app_id,
            context.sender
        );
        self.send_group(group, false, overrides.max_rounds_to_wait)
            .await
    }

    /// Executes or simulates `group`. Rejections raised by this application's approval program
    /// come back as [`AppClientError::LogicError`].
    pub(super) async fn send_group(
        &self,
        mut group: AtomicGroup,
        simulate: bool,
        max_rounds_to_wait: Option<u64>,
    ) -> Result<GroupResult, AppClientError> {
        let result = if simulate {
            group.simulate().await
        } else {
            group.execute(max_rounds_to_wait).await
        };
        match result {
            Ok(result) => Ok(result),
            Err(e) => Err(self.expose_logic_error(e).await),
        }
    }

    pub(super) async fn call_context(
        &self,
        overrides: &CallOverrides,
    ) -> Result<CallContext, AppClientError> {
        let signer = self.get_signer(overrides.signer.as_ref())?;
        let sender = self.get_sender(overrides.sender.as_ref(), overrides.signer.as_ref())?;
        let params = self
            .get_suggested_params(overrides.suggested_params.as_ref())
            .await?;
        Ok(CallContext {
            sender,
            signer,
            params,
        })
    }

    async fn method_call(
        &self,
        context: &CallContext,
        call: AppCall,
        spec: &MethodSpec,
        args: Vec<MethodArg>,
        overrides: &CallOverrides,
    ) -> Result<MethodCall, AppClientError> {
        let args = self.resolve_defaults(context, spec, args).await?;
        self.resolved_method_call(context, call, spec, args, overrides)
    }

    /// Builds a method call whose arguments need no further lookups.
    pub(super) fn resolved_method_call(
        &self,
        context: &CallContext,
        call: AppCall,
        spec: &MethodSpec,
        args: Vec<MethodArg>,
        overrides: &CallOverrides,
    ) -> Result<MethodCall, AppClientError> {
        let args = resolve_struct_args(&spec.method, &spec.hints, args)?;
        let resolved = resolve_method_args(
            &spec.method,
            args,
            &context.sender,
            call.app_id,
            references(overrides),
        )?;
        let call =
            self.application_call(context, call, resolved.app_args, resolved.references, overrides)?;
        Ok(MethodCall {
            call,
            method: spec.method.clone(),
            transaction_args: resolved.transaction_args,
        })
    }

    fn application_call(
        &self,
        context: &CallContext,
        call: AppCall,
        app_args: Vec<Vec<u8>>,
        references: References,
        overrides: &CallOverrides,
    ) -> Result<TransactionWithSigner, AppClientError> {
        let fields = ApplicationCallTransactionFields {
            header: self.header(context, overrides),
            app_id: call.app_id,
            on_complete: call.on_complete,
            approval_program: call.approval_program,
            clear_state_program: call.clear_state_program,
            global_state_schema: call.global_state_schema,
            local_state_schema: call.local_state_schema,
            extra_program_pages: call.extra_program_pages,
            args: non_empty(app_args),
            account_references: non_empty(references.accounts),
            app_references: non_empty(references.apps),
            asset_references: non_empty(references.assets),
            box_references: non_empty(references.boxes),
        };
        fields.validate().map_err(|e| AppClientError::ArgumentError {
            message: e.to_string(),
        })?;

        let transaction =
            Transaction::ApplicationCall(fields).assign_fee(fee_params(&context.params))?;
        Ok(TransactionWithSigner {
            transaction,
            signer: context.signer.as_transaction_signer(),
        })
    }

    fn header(&self, context: &CallContext, overrides: &CallOverrides) -> TransactionHeader {
        let params = &context.params;
        let validity_window = if genesis_id_is_localnet(&params.genesis_id) {
            LOCALNET_VALIDITY_WINDOW
        } else {
            DEFAULT_VALIDITY_WINDOW
        };

        TransactionHeader {
            sender: context.sender.clone(),
            fee: None,
            first_valid: params.last_round,
            last_valid: params.last_round + validity_window,
            genesis_hash: Some(params.genesis_hash),
            genesis_id: Some(params.genesis_id.clone()),
            note: overrides.note.clone(),
            rekey_to: overrides.rekey_to.clone(),
            lease: overrides.lease,
            group: None,
        }
    }
}

fn fee_params(params: &SuggestedParams) -> FeeParams {
    FeeParams {
        fee_per_byte: params.fee,
        min_fee: params.min_fee,
        ..Default::default()
    }
}

fn references(overrides: &CallOverrides) -> References {
    References {
        accounts: overrides.accounts.clone().unwrap_or_default(),
        apps: overrides.foreign_apps.clone().unwrap_or_default(),
        assets: overrides.foreign_assets.clone().unwrap_or_default(),
        boxes: overrides.boxes.clone().unwrap_or_default(),
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// The id of the application call, which is always last in its group.
fn last_tx_id(result: &GroupResult) -> Result<String, AppClientError> {
    result
        .tx_ids
        .last()
        .cloned()
        .ok_or_else(|| AppClientError::DecodeError {
            message: "Group result has no transactions".to_string(),
        })
}
