//! The application client: a configuration snapshot (who signs, who sends, which application,
//! which network parameters) plus the lifecycle operations built on top of it.
//!
//! Snapshots are cheap to derive with [`ApplicationClient::prepare`]; derived clients share the
//! transport, compiler, application description and compiled programs, and copy everything else.

mod error_transformation;
mod lifecycle;
mod state;

use crate::application::ApplicationDescription;
use crate::compiler::{CompiledProgram, Compiler, with_version_pragma};
use crate::composer::AtomicGroup;
use crate::config::{AppCompiledEventData, Config, EventData, EventType};
use crate::error::AppClientError;
use crate::signer::Signer;
use crate::transport::{SuggestedParams, Transport};
use appkit_transact::{Address, BoxReference, Byte32};
use derive_builder::Builder;
use derive_more::Debug;
use log::debug;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub use lifecycle::CreateResult;

pub struct ApplicationClientParams {
    pub transport: Arc<dyn Transport>,
    pub compiler: Arc<dyn Compiler>,
    pub app: Arc<ApplicationDescription>,
    pub signer: Option<Signer>,
    pub sender: Option<Address>,
    /// 0 when the application has not been created yet.
    pub app_id: u64,
    pub suggested_params: Option<SuggestedParams>,
}

/// Fields of a snapshot that [`ApplicationClient::prepare`] can replace.
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(strip_option), default)]
pub struct ClientOverrides {
    pub signer: Option<Signer>,
    pub sender: Option<Address>,
    pub application_id: Option<u64>,
    pub suggested_params: Option<SuggestedParams>,
}

/// A value for [`ClientOverrides::from_named`].
#[derive(Debug, Clone)]
pub enum OverrideValue {
    Signer(Signer),
    Sender(Address),
    ApplicationId(u64),
    SuggestedParams(SuggestedParams),
}

impl OverrideValue {
    fn kind(&self) -> &'static str {
        match self {
            OverrideValue::Signer(_) => "a signer",
            OverrideValue::Sender(_) => "an address",
            OverrideValue::ApplicationId(_) => "an application id",
            OverrideValue::SuggestedParams(_) => "suggested params",
        }
    }
}

impl ClientOverrides {
    /// Builds overrides from `(key, value)` pairs. Keys are `signer`, `sender`,
    /// `application_id` and `suggested_params`.
    pub fn from_named<'a, I>(entries: I) -> Result<Self, AppClientError>
    where
        I: IntoIterator<Item = (&'a str, OverrideValue)>,
    {
        let mut overrides = ClientOverrides::default();
        for (key, value) in entries {
            let wrong_kind = |expected: &str, value: &OverrideValue| {
                AppClientError::ConfigurationError {
                    message: format!(
                        "Override {} expects {}, got {}",
                        key,
                        expected,
                        value.kind()
                    ),
                }
            };
            match (key, value) {
                ("signer", OverrideValue::Signer(signer)) => overrides.signer = Some(signer),
                ("sender", OverrideValue::Sender(sender)) => overrides.sender = Some(sender),
                ("application_id", OverrideValue::ApplicationId(app_id)) => {
                    overrides.application_id = Some(app_id)
                }
                ("suggested_params", OverrideValue::SuggestedParams(params)) => {
                    overrides.suggested_params = Some(params)
                }
                ("signer", value) => return Err(wrong_kind("a signer", &value)),
                ("sender", value) => return Err(wrong_kind("an address", &value)),
                ("application_id", value) => return Err(wrong_kind("an application id", &value)),
                ("suggested_params", value) => return Err(wrong_kind("suggested params", &value)),
                (unknown, _) => {
                    return Err(AppClientError::ConfigurationError {
                        message: format!("Unknown override key {}", unknown),
                    });
                }
            }
        }
        Ok(overrides)
    }
}

impl From<ClientOverridesBuilderError> for AppClientError {
    fn from(e: ClientOverridesBuilderError) -> Self {
        AppClientError::ConfigurationError {
            message: e.to_string(),
        }
    }
}

/// Per-call settings layered over the client's snapshot.
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(strip_option), default)]
pub struct CallOverrides {
    pub sender: Option<Address>,
    pub signer: Option<Signer>,
    pub suggested_params: Option<SuggestedParams>,
    pub note: Option<Vec<u8>>,
    pub lease: Option<Byte32>,
    pub rekey_to: Option<Address>,
    /// Application args for calls that are not method calls.
    pub args: Option<Vec<Vec<u8>>>,
    pub accounts: Option<Vec<Address>>,
    pub foreign_apps: Option<Vec<u64>>,
    pub foreign_assets: Option<Vec<u64>>,
    pub boxes: Option<Vec<BoxReference>>,
    pub max_rounds_to_wait: Option<u64>,
}

impl From<CallOverridesBuilderError> for AppClientError {
    fn from(e: CallOverridesBuilderError) -> Self {
        AppClientError::ArgumentError {
            message: e.to_string(),
        }
    }
}

#[derive(Default)]
struct CompiledPrograms {
    approval: OnceCell<CompiledProgram>,
    clear: OnceCell<CompiledProgram>,
}

#[derive(Debug, Clone)]
pub struct ApplicationClient {
    #[debug(skip)]
    transport: Arc<dyn Transport>,
    #[debug(skip)]
    compiler: Arc<dyn Compiler>,
    app: Arc<ApplicationDescription>,
    signer: Option<Signer>,
    sender: Option<Address>,
    app_id: u64,
    app_address: Option<Address>,
    suggested_params: Option<SuggestedParams>,
    #[debug(skip)]
    compiled: Arc<CompiledPrograms>,
}

impl ApplicationClient {
    pub fn new(params: ApplicationClientParams) -> Self {
        let app_address =
            (params.app_id != 0).then(|| params.transport.application_address(params.app_id));
        Self {
            transport: params.transport,
            compiler: params.compiler,
            app: params.app,
            signer: params.signer,
            sender: params.sender,
            app_id: params.app_id,
            app_address,
            suggested_params: params.suggested_params,
            compiled: Arc::new(CompiledPrograms::default()),
        }
    }

    /// A new client with the given fields replaced. `self` is left untouched.
    ///
    /// Replacing `application_id` keeps the current `app_address`.
    pub fn prepare(&self, overrides: ClientOverrides) -> ApplicationClient {
        let mut prepared = self.clone();
        if let Some(signer) = overrides.signer {
            prepared.signer = Some(signer);
        }
        if let Some(sender) = overrides.sender {
            prepared.sender = Some(sender);
        }
        if let Some(app_id) = overrides.application_id {
            prepared.app_id = app_id;
        }
        if let Some(params) = overrides.suggested_params {
            prepared.suggested_params = Some(params);
        }
        prepared
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    pub fn app_address(&self) -> Option<&Address> {
        self.app_address.as_ref()
    }

    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }

    pub fn suggested_params(&self) -> Option<&SuggestedParams> {
        self.suggested_params.as_ref()
    }

    pub fn app(&self) -> &ApplicationDescription {
        &self.app
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// An empty group submitted through this client's transport.
    pub fn new_group(&self) -> AtomicGroup {
        AtomicGroup::new(self.transport.clone())
    }

    /// The explicit signer, else the client's signer.
    pub fn get_signer(&self, explicit: Option<&Signer>) -> Result<Signer, AppClientError> {
        explicit
            .or(self.signer.as_ref())
            .cloned()
            .ok_or_else(|| AppClientError::ConfigurationError {
                message: "No signer provided and the client has no default signer".to_string(),
            })
    }

    /// The explicit sender, else the client's sender, else the address of the resolved signer.
    pub fn get_sender(
        &self,
        explicit_sender: Option<&Address>,
        explicit_signer: Option<&Signer>,
    ) -> Result<Address, AppClientError> {
        if let Some(sender) = explicit_sender.or(self.sender.as_ref()) {
            return Ok(sender.clone());
        }
        self.get_signer(explicit_signer)
            .map(|signer| signer.address())
            .map_err(|_| AppClientError::ConfigurationError {
                message: "No sender provided and none can be derived without a signer"
                    .to_string(),
            })
    }

    /// The explicit params, else the client's params, else fresh ones from the node.
    pub async fn get_suggested_params(
        &self,
        explicit: Option<&SuggestedParams>,
    ) -> Result<SuggestedParams, AppClientError> {
        match explicit.or(self.suggested_params.as_ref()) {
            Some(params) => Ok(params.clone()),
            None => Ok(self.transport.suggested_params().await?),
        }
    }

    pub async fn compile_approval(&self) -> Result<Vec<u8>, AppClientError> {
        Ok(self.compiled_approval().await?.bytecode.clone())
    }

    pub async fn compile_clear(&self) -> Result<Vec<u8>, AppClientError> {
        Ok(self.compiled_clear().await?.bytecode.clone())
    }

    /// Compiles both programs. In debug mode the result is announced on the event channel,
    /// unless both programs came from the cache.
    pub async fn compile(&self) -> Result<(Vec<u8>, Vec<u8>), AppClientError> {
        let (approval, approval_compiled) = self
            .cached_program(&self.compiled.approval, self.app.approval_source())
            .await?;
        let (clear, clear_compiled) = self
            .cached_program(&self.compiled.clear, self.app.clear_source())
            .await?;

        if Config::debug() && (approval_compiled || clear_compiled) {
            let event = AppCompiledEventData {
                app_name: self.app.name().to_string(),
                version: self.app.version(),
                approval_hash: approval.hash.clone(),
                clear_hash: clear.hash.clone(),
                approval_source_map: approval.source_map.clone(),
                clear_source_map: clear.source_map.clone(),
            };
            Config::events()
                .emit(EventType::AppCompiled, EventData::AppCompiled(event))
                .await;
        }

        Ok((approval.bytecode.clone(), clear.bytecode.clone()))
    }

    async fn compiled_approval(&self) -> Result<&CompiledProgram, AppClientError> {
        let (compiled, _) = self
            .cached_program(&self.compiled.approval, self.app.approval_source())
            .await?;
        Ok(compiled)
    }

    async fn compiled_clear(&self) -> Result<&CompiledProgram, AppClientError> {
        let (compiled, _) = self
            .cached_program(&self.compiled.clear, self.app.clear_source())
            .await?;
        Ok(compiled)
    }

    /// The program cached in `cell`, compiling `source` on first use. The flag is true when
    /// this call ran the compiler.
    async fn cached_program<'a>(
        &'a self,
        cell: &'a OnceCell<CompiledProgram>,
        source: &'a str,
    ) -> Result<(&'a CompiledProgram, bool), AppClientError> {
        let mut compiled_now = false;
        let program = cell
            .get_or_try_init(|| {
                compiled_now = true;
                self.compile_source(source)
            })
            .await?;
        Ok((program, compiled_now))
    }

    async fn compile_source(&self, source: &str) -> Result<CompiledProgram, AppClientError> {
        let version = self.app.version();
        let compilation_error = |e: crate::compiler::CompilerError| {
            AppClientError::CompilationError {
                message: e.to_string(),
            }
        };

        let source = with_version_pragma(source, version).map_err(compilation_error)?;
        let compiled = self
            .compiler
            .compile(&source, version)
            .await
            .map_err(compilation_error)?;

        match compiled.bytecode.first() {
            Some(&first) if first == version => {}
            first => {
                return Err(AppClientError::CompilationError {
                    message: format!(
                        "Compiled bytecode targets version {:?} but {} was requested",
                        first, version
                    ),
                });
            }
        }

        debug!(
            "Compiled {} program ({} bytes, version {})",
            self.app.name(),
            compiled.bytecode.len(),
            version
        );
        Ok(compiled)
    }

    fn deployed_app_id(&self) -> Result<u64, AppClientError> {
        if self.app_id == 0 {
            return Err(AppClientError::ConfigurationError {
                message: format!(
                    "Application {} is not deployed; create it or set application_id",
                    self.app.name()
                ),
            });
        }
        Ok(self.app_id)
    }
}
