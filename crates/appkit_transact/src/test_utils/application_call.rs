use crate::{
    ApplicationCallTransactionBuilder, OnApplicationComplete, StateSchema,
    test_utils::TransactionHeaderMother,
};
use base64::{Engine, prelude::BASE64_STANDARD};

// version 6; int 1; return
const ALWAYS_APPROVE: &str = "BoEBQw==";

pub struct ApplicationCallTransactionMother {}

impl ApplicationCallTransactionMother {
    pub fn application_create() -> ApplicationCallTransactionBuilder {
        ApplicationCallTransactionBuilder::default()
            .header(TransactionHeaderMother::example().build().unwrap())
            .app_id(0)
            .on_complete(OnApplicationComplete::NoOp)
            .approval_program(BASE64_STANDARD.decode(ALWAYS_APPROVE).unwrap())
            .clear_state_program(BASE64_STANDARD.decode(ALWAYS_APPROVE).unwrap())
            .global_state_schema(StateSchema::new(1, 1))
            .local_state_schema(StateSchema::new(0, 2))
            .to_owned()
    }

    pub fn application_call_example() -> ApplicationCallTransactionBuilder {
        ApplicationCallTransactionBuilder::default()
            .header(TransactionHeaderMother::example().build().unwrap())
            .app_id(12345)
            .on_complete(OnApplicationComplete::NoOp)
            .to_owned()
    }

    pub fn application_update() -> ApplicationCallTransactionBuilder {
        Self::application_call_example()
            .on_complete(OnApplicationComplete::UpdateApplication)
            .approval_program(BASE64_STANDARD.decode(ALWAYS_APPROVE).unwrap())
            .clear_state_program(BASE64_STANDARD.decode(ALWAYS_APPROVE).unwrap())
            .to_owned()
    }

    pub fn application_opt_in() -> ApplicationCallTransactionBuilder {
        Self::application_call_example()
            .on_complete(OnApplicationComplete::OptIn)
            .to_owned()
    }
}
