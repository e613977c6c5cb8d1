//! Object mothers for applications, signers and clients backed by a [`MockLedger`].

use crate::application::{
    ApplicationDescription, DefaultArgument, MethodHints, StateDeclaration, StructHint,
};
use crate::client::{ApplicationClient, ApplicationClientParams};
use crate::signer::{AccountSigner, Signer};
use crate::transport::TealValue;
use appkit_abi::{ABIType, ABIValue};
use appkit_transact::{OnApplicationComplete, Transaction};
use std::sync::Arc;

use super::ledger::{ApprovalEffects, ApprovalRequest, MockLedger};

/// Deterministic signers; the seeds match `appkit_transact`'s account mothers.
pub struct SignerMother {}
impl SignerMother {
    pub fn creator() -> AccountSigner {
        AccountSigner::from_secret_key([1u8; 32])
    }

    pub fn user() -> AccountSigner {
        AccountSigner::from_secret_key([2u8; 32])
    }

    pub fn outsider() -> AccountSigner {
        AccountSigner::from_secret_key([3u8; 32])
    }
}

const COUNTER_APPROVAL: &str = "txn ApplicationID\nbz create\nmethod \"add(uint64,uint64)uint64\"\ntxna ApplicationArgs 0\nmatch add\nerr\ncreate:\nint 1";
const REJECTING_APPROVAL: &str = "txn ApplicationID\nbz create\nerr\ncreate:\nint 1";
const CLEAR: &str = "int 1";

pub struct ApplicationDescriptionMother {}
impl ApplicationDescriptionMother {
    /// A counter with a handful of methods, see [`ApplicationDescriptionMother::counter_approval`].
    pub fn counter() -> ApplicationDescription {
        ApplicationDescription::builder("counter", COUNTER_APPROVAL, CLEAR)
            .state(StateDeclaration::global_uint("counter").with_description("Times incremented"))
            .state(StateDeclaration::global_bytes("owner"))
            .state(StateDeclaration::local_uint("visits"))
            .method("add(uint64,uint64)uint64", MethodHints::default())
            .method("hello(string)string", MethodHints::default())
            .method("increment()uint64", MethodHints::default())
            .method("get_counter()uint64", MethodHints::read_only())
            .method(
                "double(uint64)uint64",
                MethodHints::default()
                    .with_default("arg0", DefaultArgument::GlobalState("counter".to_string())),
            )
            .method(
                "greet(string)string",
                MethodHints::default().with_default(
                    "arg0",
                    DefaultArgument::Constant(ABIValue::from("world")),
                ),
            )
            .method(
                "next_counter(uint64)uint64",
                MethodHints::default()
                    .with_default("arg0", DefaultArgument::Method("get_counter()uint64".to_string())),
            )
            .method(
                "describe((uint64,string))string",
                MethodHints::default().with_struct(
                    "arg0",
                    StructHint::new("Profile", &[("id", "uint64"), ("label", "string")]),
                ),
            )
            .method("deposit(pay,uint64)void", MethodHints::default())
            .method("opt_in()void", MethodHints::default())
            .method("visit()uint64", MethodHints::default())
            .method("delete()void", MethodHints::default())
            .handler(OnApplicationComplete::OptIn, "opt_in()void")
            .handler(OnApplicationComplete::DeleteApplication, "delete()void")
            .build()
            .expect("counter description is valid")
    }

    /// Approval logic for [`ApplicationDescriptionMother::counter`].
    ///
    /// Creation records the creator as owner; only the owner may update or delete. Bare NoOp and
    /// CloseOut calls are approved.
    pub fn counter_approval(request: &ApprovalRequest) -> Result<ApprovalEffects, String> {
        let uint64 = ABIType::uint64();

        if request.is_create() {
            return Ok(ApprovalEffects::approve()
                .set_global("counter", TealValue::Uint(0))
                .set_global("owner", TealValue::Bytes(request.sender.as_bytes().to_vec())));
        }

        let is_owner = request
            .global_state
            .get("owner".as_bytes())
            .and_then(TealValue::as_bytes)
            == Some(request.sender.as_bytes().as_slice());

        match request.on_complete {
            OnApplicationComplete::UpdateApplication if is_owner => {
                return Ok(ApprovalEffects::approve());
            }
            OnApplicationComplete::UpdateApplication => {
                return Err("only the owner may update".to_string());
            }
            OnApplicationComplete::DeleteApplication if !request.is_method("delete()void") => {
                return Err("delete must call delete()void".to_string());
            }
            OnApplicationComplete::DeleteApplication if !is_owner => {
                return Err("only the owner may delete".to_string());
            }
            OnApplicationComplete::OptIn if !request.is_method("opt_in()void") => {
                return Err("opt in must call opt_in()void".to_string());
            }
            OnApplicationComplete::CloseOut => return Ok(ApprovalEffects::approve()),
            _ => {}
        }

        if request.args.is_empty() {
            return Ok(ApprovalEffects::approve());
        }

        let counter = request.global_uint("counter").unwrap_or_default();
        if request.is_method("add(uint64,uint64)uint64") {
            let sum = request.uint_arg(1)? + request.uint_arg(2)?;
            ApprovalEffects::returning(&uint64, &ABIValue::from(sum))
        } else if request.is_method("hello(string)string") {
            let name = request.string_arg(1)?;
            ApprovalEffects::returning(&ABIType::String, &ABIValue::from(format!("Hello, {}", name)))
        } else if request.is_method("greet(string)string") {
            let name = request.string_arg(1)?;
            ApprovalEffects::returning(&ABIType::String, &ABIValue::from(format!("Greetings, {}", name)))
        } else if request.is_method("increment()uint64") {
            Ok(ApprovalEffects::returning(&uint64, &ABIValue::from(counter + 1))?
                .set_global("counter", TealValue::Uint(counter + 1)))
        } else if request.is_method("get_counter()uint64") {
            ApprovalEffects::returning(&uint64, &ABIValue::from(counter))
        } else if request.is_method("double(uint64)uint64") {
            ApprovalEffects::returning(&uint64, &ABIValue::from(request.uint_arg(1)? * 2))
        } else if request.is_method("next_counter(uint64)uint64") {
            ApprovalEffects::returning(&uint64, &ABIValue::from(request.uint_arg(1)? + 1))
        } else if request.is_method("describe((uint64,string))string") {
            let profile_type = ABIType::Tuple(vec![uint64.clone(), ABIType::String]);
            let profile = request.decode_arg(1, &profile_type)?;
            match profile.as_array() {
                Some([id, label]) => {
                    let id = id.as_u64().ok_or("profile id is not a uint64")?;
                    let label = label.as_str().ok_or("profile label is not a string")?;
                    ApprovalEffects::returning(
                        &ABIType::String,
                        &ABIValue::from(format!("#{} {}", id, label)),
                    )
                }
                _ => Err("profile must have two fields".to_string()),
            }
        } else if request.is_method("deposit(pay,uint64)void") {
            let expected = request.uint_arg(1)?;
            match request.previous_transaction() {
                Some(Transaction::Payment(payment))
                    if payment.receiver == request.app_address && payment.amount == expected =>
                {
                    Ok(ApprovalEffects::approve())
                }
                _ => Err(format!(
                    "deposit of {} must follow a payment to the application",
                    expected
                )),
            }
        } else if request.is_method("opt_in()void") {
            Ok(ApprovalEffects::approve().set_local("visits", TealValue::Uint(0)))
        } else if request.is_method("visit()uint64") {
            let visits = request
                .local_uint("visits")
                .ok_or_else(|| format!("{} has not opted in", request.sender))?
                + 1;
            Ok(ApprovalEffects::returning(&uint64, &ABIValue::from(visits))?
                .set_local("visits", TealValue::Uint(visits)))
        } else if request.is_method("delete()void") {
            Ok(ApprovalEffects::approve())
        } else {
            Err("err opcode executed".to_string())
        }
    }

    /// An application whose approval program rejects every call after creation and opt in.
    pub fn rejecting() -> ApplicationDescription {
        ApplicationDescription::builder("rejecting", REJECTING_APPROVAL, CLEAR)
            .state(StateDeclaration::local_uint("visits"))
            .method("ping()void", MethodHints::default())
            .build()
            .expect("rejecting description is valid")
    }

    pub fn rejecting_approval(request: &ApprovalRequest) -> Result<ApprovalEffects, String> {
        if request.is_create() || request.on_complete == OnApplicationComplete::OptIn {
            return Ok(ApprovalEffects::approve());
        }
        Err("err opcode executed".to_string())
    }
}

pub struct ApplicationClientMother {}
impl ApplicationClientMother {
    /// A ledger with the counter application's approval logic registered.
    pub fn counter_ledger() -> Arc<MockLedger> {
        let ledger = MockLedger::new();
        ledger.register(
            &ApplicationDescriptionMother::counter(),
            ApplicationDescriptionMother::counter_approval,
        );
        ledger.register(
            &ApplicationDescriptionMother::rejecting(),
            ApplicationDescriptionMother::rejecting_approval,
        );
        ledger
    }

    /// A client for `app` on `ledger`, which serves as both transport and compiler.
    pub fn client(
        ledger: &Arc<MockLedger>,
        app: ApplicationDescription,
        signer: Option<Signer>,
        app_id: u64,
    ) -> ApplicationClient {
        ApplicationClient::new(ApplicationClientParams {
            transport: ledger.clone(),
            compiler: ledger.clone(),
            app: Arc::new(app),
            signer,
            sender: None,
            app_id,
            suggested_params: None,
        })
    }

    /// An undeployed counter client signing as [`SignerMother::creator`].
    pub fn counter(ledger: &Arc<MockLedger>) -> ApplicationClient {
        Self::client(
            ledger,
            ApplicationDescriptionMother::counter(),
            Some(SignerMother::creator().into()),
            0,
        )
    }
}
