use super::ApplicationClient;
use super::lifecycle::{AppCall, CallContext};
use crate::application::{DefaultArgument, MethodSpec};
use crate::error::AppClientError;
use crate::method_call::MethodArg;
use crate::transport::{AccountInfo, AppState, TealValue, TransportError};
use appkit_abi::{ABIMethodArgType, ABIReferenceType, ABIType, ABIValue};
use appkit_transact::{Address, OnApplicationComplete};

impl ApplicationClient {
    /// Global state of the deployed application.
    pub async fn get_application_state(&self) -> Result<AppState, AppClientError> {
        let app_id = self.deployed_app_id()?;
        Ok(self.transport.application_info(app_id).await?.global_state)
    }

    /// Balance and standing of the deployed application's account.
    pub async fn get_application_account_info(&self) -> Result<AccountInfo, AppClientError> {
        let app_id = self.deployed_app_id()?;
        let app_address = self.transport.application_address(app_id);
        Ok(self.transport.account_info(&app_address).await?)
    }

    /// Local state of `account`, or of the resolved sender, in the deployed application.
    pub async fn get_account_state(
        &self,
        account: Option<&Address>,
    ) -> Result<AppState, AppClientError> {
        let app_id = self.deployed_app_id()?;
        let address = match account {
            Some(address) => address.clone(),
            None => self.get_sender(None, None)?,
        };

        match self
            .transport
            .account_application_info(&address, app_id)
            .await
        {
            Ok(state) => Ok(state),
            Err(TransportError::NotFound { .. }) => Err(AppClientError::StateError {
                message: format!(
                    "Account {} is not opted in to application {}",
                    address, app_id
                ),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces every [`MethodArg::Default`] with the value its hint points at.
    pub(super) async fn resolve_defaults(
        &self,
        context: &CallContext,
        spec: &MethodSpec,
        args: Vec<MethodArg>,
    ) -> Result<Vec<MethodArg>, AppClientError> {
        // Arity is reported by the resolver
        if args.len() != spec.method.args.len() {
            return Ok(args);
        }

        let mut resolved = Vec::with_capacity(args.len());
        for (declared, arg) in spec.method.args.iter().zip(args) {
            if !matches!(arg, MethodArg::Default) {
                resolved.push(arg);
                continue;
            }

            let name = declared.name.as_deref().unwrap_or_default();
            let default = spec.hints.default_arguments.get(name).ok_or_else(|| {
                AppClientError::ArgumentError {
                    message: format!(
                        "Argument {} of {} has no default value",
                        name, spec.method.name
                    ),
                }
            })?;
            resolved.push(
                self.resolve_default(context, default, &declared.arg_type)
                    .await?,
            );
        }
        Ok(resolved)
    }

    async fn resolve_default(
        &self,
        context: &CallContext,
        default: &DefaultArgument,
        arg_type: &ABIMethodArgType,
    ) -> Result<MethodArg, AppClientError> {
        match default {
            DefaultArgument::Constant(value) => Ok(MethodArg::Value(value.clone())),
            DefaultArgument::GlobalState(key) => {
                let state = self.get_application_state().await?;
                let value = lookup(&state, key, "global")?;
                state_value_to_arg(value, arg_type)
            }
            DefaultArgument::LocalState(key) => {
                let state = self.get_account_state(Some(&context.sender)).await?;
                let value = lookup(&state, key, "local")?;
                state_value_to_arg(value, arg_type)
            }
            DefaultArgument::Method(name) => {
                let spec = self.app.method(name)?;
                if !spec.method.args.is_empty() {
                    return Err(AppClientError::ArgumentError {
                        message: format!(
                            "Default argument method {} must not take arguments",
                            name
                        ),
                    });
                }

                let call = self.resolved_method_call(
                    context,
                    AppCall::new(self.deployed_app_id()?, OnApplicationComplete::NoOp),
                    spec,
                    Vec::new(),
                    &Default::default(),
                )?;
                let mut group = self.new_group();
                group.add_method_call(call)?;
                let mut result = self.send_group(group, spec.hints.read_only, None).await?;
                result
                    .method_returns
                    .pop()
                    .map(MethodArg::Return)
                    .ok_or_else(|| AppClientError::DecodeError {
                        message: format!("No return recorded for method {}", name),
                    })
            }
        }
    }
}

fn lookup<'a>(state: &'a AppState, key: &str, scope: &str) -> Result<&'a TealValue, AppClientError> {
    state
        .get(key.as_bytes())
        .ok_or_else(|| AppClientError::StateError {
            message: format!("Key {} not found in {} state", key, scope),
        })
}

/// Converts a raw state value into an argument of the declared type.
fn state_value_to_arg(
    value: &TealValue,
    arg_type: &ABIMethodArgType,
) -> Result<MethodArg, AppClientError> {
    let mismatch = || AppClientError::ArgumentError {
        message: format!("State value {} cannot be used as {}", value, arg_type),
    };

    match (arg_type, value) {
        (ABIMethodArgType::Value(ABIType::Uint(_)), TealValue::Uint(n)) => {
            Ok(MethodArg::Value(ABIValue::from(*n)))
        }
        (ABIMethodArgType::Value(ABIType::String), TealValue::Bytes(bytes)) => {
            String::from_utf8(bytes.clone())
                .map(|s| MethodArg::Value(ABIValue::String(s)))
                .map_err(|_| mismatch())
        }
        (ABIMethodArgType::Value(ABIType::Address), TealValue::Bytes(bytes))
        | (ABIMethodArgType::Reference(ABIReferenceType::Account), TealValue::Bytes(bytes)) => {
            let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| mismatch())?;
            let address = Address::from_pubkey(&key);
            Ok(match arg_type {
                ABIMethodArgType::Reference(_) => MethodArg::Account(address),
                _ => MethodArg::Value(ABIValue::from_address(address.to_string())),
            })
        }
        (ABIMethodArgType::Value(ABIType::DynamicArray(element)), TealValue::Bytes(bytes))
            if **element == ABIType::Byte =>
        {
            Ok(MethodArg::Value(ABIValue::from_bytes(bytes)))
        }
        (ABIMethodArgType::Value(abi_type), TealValue::Bytes(bytes)) => abi_type
            .decode(bytes)
            .map(MethodArg::Value)
            .map_err(|_| mismatch()),
        (ABIMethodArgType::Reference(ABIReferenceType::Application), TealValue::Uint(id)) => {
            Ok(MethodArg::Application(*id))
        }
        (ABIMethodArgType::Reference(ABIReferenceType::Asset), TealValue::Uint(id)) => {
            Ok(MethodArg::Asset(*id))
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn arg_type(s: &str) -> ABIMethodArgType {
        ABIMethodArgType::from_str(s).unwrap()
    }

    fn value(arg: MethodArg) -> ABIValue {
        match arg {
            MethodArg::Value(value) => value,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_uint_state_to_uint_arg() {
        let arg = state_value_to_arg(&TealValue::Uint(42), &arg_type("uint64")).unwrap();
        assert_eq!(value(arg), ABIValue::from(42u64));
    }

    #[test]
    fn test_bytes_state_to_string_and_byte_array() {
        let bytes = TealValue::Bytes(b"hi".to_vec());
        assert_eq!(
            value(state_value_to_arg(&bytes, &arg_type("string")).unwrap()),
            ABIValue::String("hi".to_string())
        );
        assert_eq!(
            value(state_value_to_arg(&bytes, &arg_type("byte[]")).unwrap()),
            ABIValue::from_bytes(b"hi")
        );
    }

    #[test]
    fn test_bytes_state_to_account_reference() {
        let arg = state_value_to_arg(&TealValue::Bytes(vec![9; 32]), &arg_type("account")).unwrap();
        assert!(matches!(arg, MethodArg::Account(address) if address == Address([9; 32])));
    }

    #[test]
    fn test_mismatched_state_is_rejected() {
        let err = state_value_to_arg(&TealValue::Uint(1), &arg_type("string")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: State value 1 cannot be used as string"
        );
    }
}
