//! Application call transactions: the single transaction type behind every lifecycle
//! operation (create, update, delete, opt-in, close-out, clear-state and method calls).

use crate::address::Address;
use crate::constants::{
    MAX_ACCOUNT_REFERENCES, MAX_APP_ARGS, MAX_APP_REFERENCES, MAX_ARGS_SIZE,
    MAX_ASSET_REFERENCES, MAX_BOX_REFERENCES, MAX_EXTRA_PROGRAM_PAGES, MAX_OVERALL_REFERENCES,
    PROGRAM_PAGE_SIZE,
};
use crate::error::AppkitTransactError;
use crate::utils::{is_empty_schema_opt, is_empty_vec_opt, is_zero, is_zero_opt};
use crate::{Transaction, TransactionHeader};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::{Bytes, serde_as, skip_serializing_none};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The declared side effect of an application call.
#[derive(Serialize_repr, Deserialize_repr, Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
#[repr(u8)]
pub enum OnApplicationComplete {
    /// Only run the approval program.
    #[default]
    NoOp = 0,
    /// Allocate local state for the sender.
    OptIn = 1,
    /// Release the sender's local state, subject to the approval program.
    CloseOut = 2,
    /// Release the sender's local state unconditionally. The approval program is not evaluated.
    ClearState = 3,
    /// Replace the approval and clear-state programs.
    UpdateApplication = 4,
    /// Delete the application.
    DeleteApplication = 5,
}

impl Display for OnApplicationComplete {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            OnApplicationComplete::NoOp => "NoOp",
            OnApplicationComplete::OptIn => "OptIn",
            OnApplicationComplete::CloseOut => "CloseOut",
            OnApplicationComplete::ClearState => "ClearState",
            OnApplicationComplete::UpdateApplication => "UpdateApplication",
            OnApplicationComplete::DeleteApplication => "DeleteApplication",
        };
        write!(f, "{}", name)
    }
}

/// Number of integer and byte-slice slots reserved for a state scope.
#[serde_as]
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct StateSchema {
    #[serde(rename = "nui")]
    #[serde(skip_serializing_if = "is_zero")]
    #[serde(default)]
    pub num_uints: u64,

    #[serde(rename = "nbs")]
    #[serde(skip_serializing_if = "is_zero")]
    #[serde(default)]
    pub num_byte_slices: u64,
}

impl StateSchema {
    pub fn new(num_uints: u64, num_byte_slices: u64) -> Self {
        Self {
            num_uints,
            num_byte_slices,
        }
    }

    pub fn total(&self) -> u64 {
        self.num_uints + self.num_byte_slices
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A box made available to the program at runtime. An `app_id` of 0 means the called app.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct BoxReference {
    #[serde(rename = "i")]
    #[serde(skip_serializing_if = "is_zero")]
    #[serde(default)]
    pub app_id: u64,

    #[serde(rename = "n")]
    #[serde_as(as = "Bytes")]
    pub name: Vec<u8>,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Builder)]
#[builder(
    name = "ApplicationCallTransactionBuilder",
    setter(strip_option),
    build_fn(name = "build_fields")
)]
pub struct ApplicationCallTransactionFields {
    #[serde(flatten)]
    pub header: TransactionHeader,

    /// Target application; 0 creates a new one.
    #[serde(rename = "apid")]
    #[serde(skip_serializing_if = "is_zero")]
    #[serde(default)]
    pub app_id: u64,

    #[serde(rename = "apan")]
    #[serde(skip_serializing_if = "is_no_op")]
    #[serde(default)]
    #[builder(default)]
    pub on_complete: OnApplicationComplete,

    /// Required on create and update.
    #[serde(rename = "apap")]
    #[serde_as(as = "Option<Bytes>")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    #[builder(default)]
    pub approval_program: Option<Vec<u8>>,

    /// Required on create and update.
    #[serde(rename = "apsu")]
    #[serde_as(as = "Option<Bytes>")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    #[builder(default)]
    pub clear_state_program: Option<Vec<u8>>,

    /// Fixed at creation.
    #[serde(rename = "apgs")]
    #[serde(skip_serializing_if = "is_empty_schema_opt")]
    #[serde(default)]
    #[builder(default)]
    pub global_state_schema: Option<StateSchema>,

    /// Fixed at creation.
    #[serde(rename = "apls")]
    #[serde(skip_serializing_if = "is_empty_schema_opt")]
    #[serde(default)]
    #[builder(default)]
    pub local_state_schema: Option<StateSchema>,

    /// Additional 2048 byte pages for the two programs, fixed at creation.
    #[serde(rename = "apep")]
    #[serde(skip_serializing_if = "is_zero_opt")]
    #[serde(default)]
    #[builder(default)]
    pub extra_program_pages: Option<u64>,

    #[serde(rename = "apaa")]
    #[serde_as(as = "Option<Vec<Bytes>>")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    #[builder(default)]
    pub args: Option<Vec<Vec<u8>>>,

    /// Accounts other than the sender the programs may read.
    #[serde(rename = "apat")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    #[builder(default)]
    pub account_references: Option<Vec<Address>>,

    /// Applications other than `app_id` the programs may read.
    #[serde(rename = "apfa")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    #[builder(default)]
    pub app_references: Option<Vec<u64>>,

    #[serde(rename = "apas")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    #[builder(default)]
    pub asset_references: Option<Vec<u64>>,

    #[serde(rename = "apbx")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    #[builder(default)]
    pub box_references: Option<Vec<BoxReference>>,
}

impl ApplicationCallTransactionBuilder {
    pub fn build(&self) -> Result<Transaction, ApplicationCallTransactionBuilderError> {
        self.build_fields().map(Transaction::ApplicationCall)
    }
}

impl ApplicationCallTransactionFields {
    /// Checks the network limits on arguments, references and program size.
    pub fn validate(&self) -> Result<(), AppkitTransactError> {
        let input_error = |message: String| Err(AppkitTransactError::InputError { message });

        let args = self.args.as_deref().unwrap_or_default();
        if args.len() > MAX_APP_ARGS {
            return input_error(format!(
                "Application call has {} arguments, the maximum is {}",
                args.len(),
                MAX_APP_ARGS
            ));
        }
        let args_size: usize = args.iter().map(Vec::len).sum();
        if args_size > MAX_ARGS_SIZE {
            return input_error(format!(
                "Application call arguments total {} bytes, the maximum is {}",
                args_size, MAX_ARGS_SIZE
            ));
        }

        let accounts = self.account_references.as_deref().unwrap_or_default().len();
        let apps = self.app_references.as_deref().unwrap_or_default().len();
        let assets = self.asset_references.as_deref().unwrap_or_default().len();
        let boxes = self.box_references.as_deref().unwrap_or_default().len();
        for (kind, count, max) in [
            ("account", accounts, MAX_ACCOUNT_REFERENCES),
            ("application", apps, MAX_APP_REFERENCES),
            ("asset", assets, MAX_ASSET_REFERENCES),
            ("box", boxes, MAX_BOX_REFERENCES),
        ] {
            if count > max {
                return input_error(format!(
                    "Application call has {} {} references, the maximum is {}",
                    count, kind, max
                ));
            }
        }
        if accounts + apps + assets + boxes > MAX_OVERALL_REFERENCES {
            return input_error(format!(
                "Application call has {} references in total, the maximum is {}",
                accounts + apps + assets + boxes,
                MAX_OVERALL_REFERENCES
            ));
        }

        let extra_pages = self.extra_program_pages.unwrap_or_default();
        if extra_pages > MAX_EXTRA_PROGRAM_PAGES {
            return input_error(format!(
                "Extra program pages {} exceeds the maximum of {}",
                extra_pages, MAX_EXTRA_PROGRAM_PAGES
            ));
        }
        let program_size = self.approval_program.as_deref().unwrap_or_default().len()
            + self.clear_state_program.as_deref().unwrap_or_default().len();
        let program_budget = PROGRAM_PAGE_SIZE * (1 + extra_pages as usize);
        if program_size > program_budget {
            return input_error(format!(
                "Programs total {} bytes, which exceeds {} bytes for {} extra pages",
                program_size, program_budget, extra_pages
            ));
        }

        Ok(())
    }
}

fn is_no_op(on_complete: &OnApplicationComplete) -> bool {
    matches!(on_complete, OnApplicationComplete::NoOp)
}

/// Box references travel as indexes into the app reference array: 0 for the called app,
/// position + 1 for a foreign app.
pub fn application_call_serializer<S>(
    fields: &ApplicationCallTransactionFields,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let Some(box_references) = fields.box_references.as_ref().filter(|b| !b.is_empty()) else {
        return fields.serialize(serializer);
    };

    let app_references = fields.app_references.as_deref().unwrap_or_default();
    let indexed = box_references
        .iter()
        .map(|box_ref| {
            let index = if box_ref.app_id == 0 || box_ref.app_id == fields.app_id {
                0
            } else {
                app_references
                    .iter()
                    .position(|&id| id == box_ref.app_id)
                    .map(|position| (position + 1) as u64)
                    .ok_or_else(|| {
                        format!(
                            "Box reference with app id {} not found in app references",
                            box_ref.app_id
                        )
                    })?
            };
            Ok(BoxReference {
                app_id: index,
                name: box_ref.name.clone(),
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .map_err(serde::ser::Error::custom)?;

    let mut wire_fields = fields.clone();
    wire_fields.box_references = Some(indexed);
    wire_fields.serialize(serializer)
}

pub fn application_call_deserializer<'de, D>(
    deserializer: D,
) -> Result<ApplicationCallTransactionFields, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut fields = ApplicationCallTransactionFields::deserialize(deserializer)?;

    if let Some(box_references) = fields.box_references.as_ref().filter(|b| !b.is_empty()) {
        let app_references = fields.app_references.as_deref().unwrap_or_default();
        let resolved = box_references
            .iter()
            .map(|box_ref| {
                let app_id = match box_ref.app_id {
                    0 => 0,
                    index => app_references
                        .get(index as usize - 1)
                        .copied()
                        .ok_or_else(|| format!("Cannot find app reference index {}", index - 1))?,
                };
                Ok(BoxReference {
                    app_id,
                    name: box_ref.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, String>>()
            .map_err(serde::de::Error::custom)?;
        fields.box_references = Some(resolved);
    }

    Ok(fields)
}
