//! Matching caller-supplied arguments to a method's parameter list.
//!
//! Value arguments are ABI encoded. Reference arguments are placed in the call's foreign arrays
//! and replaced by a `uint8` index: accounts and applications count from 1 because index 0 is the
//! sender (or the called application), assets count from 0. Transaction arguments are lifted out
//! and placed before the call in the group.

use crate::application::MethodHints;
use crate::composer::TransactionWithSigner;
use crate::error::AppClientError;
use appkit_abi::{
    ABIMethod, ABIMethodArgType, ABIReferenceType, ABIReturn, ABITransactionType, ABIType,
    ABIValue, encode_method_args,
};
use appkit_transact::{
    Address, BoxReference, MAX_ACCOUNT_REFERENCES, MAX_APP_REFERENCES, MAX_ASSET_REFERENCES,
    MAX_OVERALL_REFERENCES, Transaction,
};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub enum MethodArg {
    Value(ABIValue),
    Account(Address),
    Asset(u64),
    Application(u64),
    Transaction(TransactionWithSigner),
    /// The decoded return of an earlier call.
    Return(ABIReturn),
    /// A tuple given by field name, ordered by the method's struct hint for the argument.
    Struct(HashMap<String, ABIValue>),
    /// Resolved from the method's default argument hint.
    Default,
}

impl From<ABIValue> for MethodArg {
    fn from(value: ABIValue) -> Self {
        MethodArg::Value(value)
    }
}

impl From<ABIReturn> for MethodArg {
    fn from(value: ABIReturn) -> Self {
        MethodArg::Return(value)
    }
}

impl From<TransactionWithSigner> for MethodArg {
    fn from(value: TransactionWithSigner) -> Self {
        MethodArg::Transaction(value)
    }
}

/// Foreign references a call already carries before its arguments are resolved.
#[derive(Debug, Clone, Default)]
pub struct References {
    pub accounts: Vec<Address>,
    pub apps: Vec<u64>,
    pub assets: Vec<u64>,
    pub boxes: Vec<BoxReference>,
}

impl References {
    fn account_index(&mut self, account: Address, sender: &Address) -> usize {
        if &account == sender {
            return 0;
        }
        position_or_push(&mut self.accounts, account) + 1
    }

    fn app_index(&mut self, app_id: u64, current_app_id: u64) -> usize {
        if app_id == current_app_id && current_app_id != 0 {
            return 0;
        }
        position_or_push(&mut self.apps, app_id) + 1
    }

    fn asset_index(&mut self, asset_id: u64) -> usize {
        position_or_push(&mut self.assets, asset_id)
    }

    fn check_capacity(&self) -> Result<(), AppClientError> {
        let limits = [
            ("accounts", self.accounts.len(), MAX_ACCOUNT_REFERENCES),
            ("applications", self.apps.len(), MAX_APP_REFERENCES),
            ("assets", self.assets.len(), MAX_ASSET_REFERENCES),
        ];
        for (kind, count, max) in limits {
            if count > max {
                return Err(AppClientError::ArgumentError {
                    message: format!(
                        "Application call references {} {}, the maximum is {}",
                        count, kind, max
                    ),
                });
            }
        }

        let total = self.accounts.len() + self.apps.len() + self.assets.len() + self.boxes.len();
        if total > MAX_OVERALL_REFERENCES {
            return Err(AppClientError::ArgumentError {
                message: format!(
                    "Application call has {} references in total, the maximum is {}",
                    total, MAX_OVERALL_REFERENCES
                ),
            });
        }
        Ok(())
    }
}

fn position_or_push<T: PartialEq>(items: &mut Vec<T>, item: T) -> usize {
    match items.iter().position(|existing| existing == &item) {
        Some(position) => position,
        None => {
            items.push(item);
            items.len() - 1
        }
    }
}

/// Replaces every [`MethodArg::Struct`] with the tuple its struct hint describes.
pub fn resolve_struct_args(
    method: &ABIMethod,
    hints: &MethodHints,
    args: Vec<MethodArg>,
) -> Result<Vec<MethodArg>, AppClientError> {
    method
        .args
        .iter()
        .map(|declared| declared.name.as_deref())
        .chain(std::iter::repeat(None))
        .zip(args)
        .map(|(name, arg)| {
            let mut fields = match arg {
                MethodArg::Struct(fields) => fields,
                other => return Ok(other),
            };
            let name = name.unwrap_or_default();
            let hint = hints
                .structs
                .get(name)
                .ok_or_else(|| AppClientError::ArgumentError {
                    message: format!(
                        "Argument {} of {} is given as a struct but has no struct hint",
                        name, method.name
                    ),
                })?;

            let values = hint
                .field_names()
                .map(|field| {
                    fields
                        .remove(field)
                        .ok_or_else(|| AppClientError::ArgumentError {
                            message: format!(
                                "Struct {} for argument {} of {} is missing field {}",
                                hint.name, name, method.name, field
                            ),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(unknown) = fields.keys().next() {
                return Err(AppClientError::ArgumentError {
                    message: format!(
                        "Struct {} for argument {} of {} has no field {}",
                        hint.name, name, method.name, unknown
                    ),
                });
            }
            Ok(MethodArg::Value(ABIValue::Array(values)))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ResolvedMethodCall {
    /// Selector followed by the encoded arguments.
    pub app_args: Vec<Vec<u8>>,
    pub references: References,
    pub transaction_args: Vec<TransactionWithSigner>,
}

/// Resolves `args` against `method`. `MethodArg::Default` must already have been replaced.
pub fn resolve_method_args(
    method: &ABIMethod,
    args: Vec<MethodArg>,
    sender: &Address,
    app_id: u64,
    mut references: References,
) -> Result<ResolvedMethodCall, AppClientError> {
    let signature = method.signature()?;
    if args.len() != method.args.len() {
        return Err(AppClientError::ArgumentError {
            message: format!(
                "Method {} expects {} arguments, got {}",
                signature,
                method.args.len(),
                args.len()
            ),
        });
    }

    let mut types = Vec::new();
    let mut values = Vec::new();
    let mut transaction_args = Vec::new();

    for (position, (declared, arg)) in method.args.iter().zip(args).enumerate() {
        let mismatch = |arg: &MethodArg| AppClientError::ArgumentError {
            message: format!(
                "Argument {} of {} must be {}, got {}",
                position,
                signature,
                declared.arg_type,
                describe(arg)
            ),
        };

        match &declared.arg_type {
            ABIMethodArgType::Value(abi_type) => {
                let value = match arg {
                    MethodArg::Value(value) => value,
                    MethodArg::Return(ABIReturn {
                        return_value: Some(value),
                        ..
                    }) => value,
                    MethodArg::Return(ABIReturn { method, .. }) => {
                        return Err(AppClientError::ArgumentError {
                            message: format!(
                                "Argument {} of {} is the return of void method {}",
                                position, signature, method.name
                            ),
                        });
                    }
                    other => return Err(mismatch(&other)),
                };
                types.push(abi_type.clone());
                values.push(value);
            }
            ABIMethodArgType::Reference(reference_type) => {
                let index = match (reference_type, arg) {
                    (ABIReferenceType::Account, MethodArg::Account(address)) => {
                        references.account_index(address, sender)
                    }
                    (ABIReferenceType::Account, MethodArg::Value(ABIValue::Address(address))) => {
                        let address = Address::from_str(&address).map_err(|e| {
                            AppClientError::ArgumentError {
                                message: format!(
                                    "Argument {} of {}: {}",
                                    position, signature, e
                                ),
                            }
                        })?;
                        references.account_index(address, sender)
                    }
                    (ABIReferenceType::Application, MethodArg::Application(id)) => {
                        references.app_index(id, app_id)
                    }
                    (ABIReferenceType::Asset, MethodArg::Asset(id)) => references.asset_index(id),
                    (ABIReferenceType::Application | ABIReferenceType::Asset, MethodArg::Value(value))
                        if value.as_u64().is_some() =>
                    {
                        let id = value.as_u64().unwrap_or_default();
                        match reference_type {
                            ABIReferenceType::Application => references.app_index(id, app_id),
                            _ => references.asset_index(id),
                        }
                    }
                    (_, other) => return Err(mismatch(&other)),
                };
                types.push(ABIType::uint8());
                values.push(ABIValue::from(index as u8));
            }
            ABIMethodArgType::Transaction(txn_type) => match arg {
                MethodArg::Transaction(txn_with_signer) => {
                    check_transaction_type(txn_type, &txn_with_signer.transaction).map_err(
                        |actual| AppClientError::ArgumentError {
                            message: format!(
                                "Argument {} of {} must be a {} transaction, got {}",
                                position, signature, txn_type, actual
                            ),
                        },
                    )?;
                    transaction_args.push(txn_with_signer);
                }
                other => return Err(mismatch(&other)),
            },
        }
    }

    references.check_capacity()?;

    let mut app_args = vec![method.selector()?];
    app_args.extend(encode_method_args(&types, &values).map_err(|e| {
        AppClientError::ArgumentError {
            message: format!("Failed to encode arguments for {}: {}", signature, e),
        }
    })?);

    Ok(ResolvedMethodCall {
        app_args,
        references,
        transaction_args,
    })
}

fn check_transaction_type(
    expected: &ABITransactionType,
    transaction: &Transaction,
) -> Result<(), &'static str> {
    let actual = match transaction {
        Transaction::Payment(_) => ABITransactionType::Payment,
        Transaction::ApplicationCall(_) => ABITransactionType::ApplicationCall,
    };
    if matches!(expected, ABITransactionType::Txn) || *expected == actual {
        return Ok(());
    }
    Err(match actual {
        ABITransactionType::Payment => "pay",
        _ => "appl",
    })
}

fn describe(arg: &MethodArg) -> &'static str {
    match arg {
        MethodArg::Value(_) => "a value",
        MethodArg::Account(_) => "an account reference",
        MethodArg::Asset(_) => "an asset reference",
        MethodArg::Application(_) => "an application reference",
        MethodArg::Transaction(_) => "a transaction",
        MethodArg::Return(_) => "a method return",
        MethodArg::Struct(_) => "a struct without a hint",
        MethodArg::Default => "an unresolved default",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::AccountSigner;
    use appkit_transact::test_utils::TransactionMother;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sender() -> Address {
        AccountSigner::from_secret_key([1; 32]).address()
    }

    fn other(seed: u8) -> Address {
        AccountSigner::from_secret_key([seed; 32]).address()
    }

    fn method(signature: &str) -> ABIMethod {
        ABIMethod::from_str(signature).unwrap()
    }

    fn payment() -> TransactionWithSigner {
        TransactionWithSigner {
            transaction: TransactionMother::simple_payment().build().unwrap(),
            signer: Arc::new(AccountSigner::from_secret_key([1; 32])),
        }
    }

    #[test]
    fn test_values_are_encoded_after_selector() {
        let resolved = resolve_method_args(
            &method("add(uint64,uint64)uint64"),
            vec![ABIValue::from(1u64).into(), ABIValue::from(2u64).into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap();

        assert_eq!(hex::encode(&resolved.app_args[0]), "fe6bdf69");
        assert_eq!(resolved.app_args[1], 1u64.to_be_bytes().to_vec());
        assert_eq!(resolved.app_args[2], 2u64.to_be_bytes().to_vec());
    }

    #[test]
    fn test_arity_mismatch() {
        let err = resolve_method_args(
            &method("add(uint64,uint64)uint64"),
            vec![ABIValue::from(1u64).into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: Method add(uint64,uint64)uint64 expects 2 arguments, got 1"
        );
    }

    #[test]
    fn test_account_indices() {
        let resolved = resolve_method_args(
            &method("transfer(account,account,account)void"),
            vec![
                MethodArg::Account(sender()),
                MethodArg::Account(other(2)),
                MethodArg::Value(ABIValue::from_address(other(3).to_string())),
            ],
            &sender(),
            5,
            References::default(),
        )
        .unwrap();

        assert_eq!(resolved.app_args[1..], [vec![0], vec![1], vec![2]]);
        assert_eq!(resolved.references.accounts, vec![other(2), other(3)]);
    }

    #[test]
    fn test_existing_references_are_reused() {
        let references = References {
            accounts: vec![other(2)],
            apps: vec![77],
            assets: vec![10, 11],
            boxes: vec![],
        };
        let resolved = resolve_method_args(
            &method("check(account,application,application,asset)void"),
            vec![
                MethodArg::Account(other(2)),
                MethodArg::Application(5),
                MethodArg::Application(77),
                MethodArg::Asset(11),
            ],
            &sender(),
            5,
            references,
        )
        .unwrap();

        assert_eq!(resolved.app_args[1..], [vec![1], vec![0], vec![1], vec![1]]);
        assert_eq!(resolved.references.apps, vec![77]);
        assert_eq!(resolved.references.assets, vec![10, 11]);
    }

    #[test]
    fn test_account_capacity_is_enforced() {
        let err = resolve_method_args(
            &method("many(account,account,account,account,account)void"),
            (2..7).map(|seed| MethodArg::Account(other(seed))).collect(),
            &sender(),
            5,
            References::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: Application call references 5 accounts, the maximum is 4"
        );
    }

    #[test]
    fn test_overall_capacity_is_enforced() {
        let references = References {
            apps: vec![1, 2, 3, 4, 6, 7],
            ..Default::default()
        };
        let err = resolve_method_args(
            &method("many(asset,asset,asset)void"),
            vec![
                MethodArg::Asset(100),
                MethodArg::Asset(101),
                MethodArg::Asset(102),
            ],
            &sender(),
            5,
            references,
        )
        .unwrap_err();
        assert!(err.to_string().contains("9 references in total"));
    }

    #[test]
    fn test_transaction_arguments_are_lifted() {
        let resolved = resolve_method_args(
            &method("deposit(pay,uint64)void"),
            vec![payment().into(), ABIValue::from(5u64).into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap();

        assert_eq!(resolved.transaction_args.len(), 1);
        assert_eq!(resolved.app_args.len(), 2);
        assert_eq!(hex::encode(&resolved.app_args[0]), "f2355b55");
    }

    #[test]
    fn test_wrong_transaction_type() {
        let err = resolve_method_args(
            &method("call(appl)void"),
            vec![payment().into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be a appl transaction, got pay"));
    }

    #[test]
    fn test_kind_mismatch() {
        let err = resolve_method_args(
            &method("deposit(pay,uint64)void"),
            vec![ABIValue::from(1u64).into(), ABIValue::from(5u64).into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: Argument 0 of deposit(pay,uint64)void must be pay, got a value"
        );
    }

    #[test]
    fn test_prior_return_is_passed_through() {
        let previous = ABIReturn {
            method: method("get()uint64"),
            raw_return_value: 9u64.to_be_bytes().to_vec(),
            return_value: Some(ABIValue::from(9u64)),
        };
        let resolved = resolve_method_args(
            &method("set(uint64)void"),
            vec![previous.into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap();
        assert_eq!(resolved.app_args[1], 9u64.to_be_bytes().to_vec());
    }

    #[test]
    fn test_more_than_fifteen_arguments_are_tuple_packed() {
        let signature = format!("wide({})void", vec!["uint64"; 16].join(","));
        let args = (0..16u64).map(|i| ABIValue::from(i).into()).collect();
        let resolved =
            resolve_method_args(&method(&signature), args, &sender(), 5, References::default())
                .unwrap();

        assert_eq!(resolved.app_args.len(), 16);
        assert_eq!(resolved.app_args[15].len(), 16);
    }

    #[test]
    fn test_encoding_failure_is_an_argument_error() {
        let err = resolve_method_args(
            &method("set(uint8)void"),
            vec![ABIValue::from(300u64).into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppClientError::ArgumentError { .. }));
    }

    fn profile_hints() -> MethodHints {
        MethodHints::default().with_struct(
            "arg0",
            crate::application::StructHint::new("Profile", &[("id", "uint64"), ("label", "string")]),
        )
    }

    fn profile(fields: &[(&str, ABIValue)]) -> MethodArg {
        MethodArg::Struct(
            fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_struct_fields_follow_the_hint_order() {
        let method = method("describe((uint64,string),uint64)string");
        let args = resolve_struct_args(
            &method,
            &profile_hints(),
            vec![
                profile(&[("label", ABIValue::from("ada")), ("id", ABIValue::from(7u64))]),
                ABIValue::from(1u64).into(),
            ],
        )
        .unwrap();

        let resolved =
            resolve_method_args(&method, args, &sender(), 5, References::default()).unwrap();
        let tuple = ABIType::from_str("(uint64,string)").unwrap();
        assert_eq!(
            tuple.decode(&resolved.app_args[1]).unwrap(),
            ABIValue::Array(vec![ABIValue::from(7u64), ABIValue::from("ada")])
        );
    }

    #[test]
    fn test_struct_with_missing_field_is_rejected() {
        let err = resolve_struct_args(
            &method("describe((uint64,string),uint64)string"),
            &profile_hints(),
            vec![profile(&[("id", ABIValue::from(7u64))]), ABIValue::from(1u64).into()],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: Struct Profile for argument arg0 of describe is missing field label"
        );
    }

    #[test]
    fn test_struct_without_hint_is_rejected() {
        let method = method("describe((uint64,string),uint64)string");
        let err = resolve_struct_args(
            &method,
            &MethodHints::default(),
            vec![profile(&[("id", ABIValue::from(7u64))]), ABIValue::from(1u64).into()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("arg0 of describe is given as a struct but has no struct hint"));

        let err = resolve_method_args(
            &method,
            vec![profile(&[]), ABIValue::from(1u64).into()],
            &sender(),
            5,
            References::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("got a struct without a hint"));
    }
}
