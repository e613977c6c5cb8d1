pub mod application;
pub mod client;
pub mod clients;
pub mod compiler;
pub mod composer;
pub mod config;
pub mod error;
pub mod method_call;
pub mod signer;
pub mod testing;
pub mod transport;

pub use application::{
    ApplicationDescription, ApplicationDescriptionBuilder, DEFAULT_PROGRAM_VERSION,
    DefaultArgument, MethodHints, MethodSpec, StateDeclaration, StateKind, StateValueType,
    StorageScope, StructHint,
};
pub use client::{
    ApplicationClient, ApplicationClientParams, CallOverrides, CallOverridesBuilder,
    ClientOverrides, ClientOverridesBuilder, CreateResult, OverrideValue,
};
pub use clients::{AlgodConfig, AlgodTransport};
pub use compiler::{CompiledProgram, Compiler, CompilerError, SourceMap};
pub use composer::{
    AtomicGroup, GroupResult, GroupStatus, MethodCall, TransactionWithSigner,
    wait_for_confirmation,
};
pub use config::{
    AppCompiledEventData, AsyncEventEmitter, Config, EventData, EventType,
    TxnGroupSimulatedEventData,
};
pub use error::{AppClientError, LogicError};
pub use method_call::{MethodArg, References};
pub use signer::{AccountSigner, LogicSigSigner, MultisigSigner, Signer, TransactionSigner};
pub use transport::{
    AccountInfo, AppState, ApplicationInfo, NodeStatus, PendingTransactionInfo, SimulateResponse,
    SuggestedParams, TealValue, Transport, TransportError, genesis_id_is_localnet,
};
