mod common;

use appkit_client::testing::{
    ApplicationClientMother, ApplicationDescriptionMother, FIRST_APP_ID, MockLedger, SignerMother,
};
use appkit_client::{
    AppClientError, ApplicationDescription, CallOverrides, CallOverridesBuilder,
    ClientOverridesBuilder, Signer, TealValue,
};
use appkit_transact::{Address, OnApplicationComplete, SignedTransaction, TransactionId};
use common::{DeployedAppResult, TestResult, deployed_counter, ledger};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

fn on_complete_of(group: &[SignedTransaction]) -> Option<OnApplicationComplete> {
    group
        .last()
        .and_then(|stx| stx.transaction.as_application_call())
        .map(|call| call.on_complete)
}

#[rstest]
#[tokio::test]
async fn test_compiled_programs_start_with_the_requested_version(ledger: Arc<MockLedger>) -> TestResult {
    let app = ApplicationDescription::builder("versioned", "int 1", "int 1")
        .version(10)
        .build()?;
    let client = ApplicationClientMother::client(&ledger, app, None, 0);

    let (approval, clear) = client.compile().await?;
    assert_eq!(approval[0], 10);
    assert_eq!(clear[0], 10);
    assert_eq!(client.compile_approval().await?, approval);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_conflicting_pragma_is_a_compilation_error(ledger: Arc<MockLedger>) -> TestResult {
    let app = ApplicationDescription::builder("conflict", "#pragma version 6\nint 1", "int 1")
        .version(8)
        .build()?;
    let client = ApplicationClientMother::client(&ledger, app, None, 0);

    let err = client.compile().await.unwrap_err();
    assert!(matches!(err, AppClientError::CompilationError { .. }));
    assert!(err.to_string().contains("version 6"));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_compiler_diagnostics_are_kept_verbatim(ledger: Arc<MockLedger>) {
    ledger.fail_compilation(Some("3: unknown opcode: intt"));
    let client = ApplicationClientMother::counter(&ledger);

    let err = client.compile().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Compilation error: 3: unknown opcode: intt"
    );
}

#[rstest]
#[tokio::test]
async fn test_create_deploys_and_updates_only_the_invoking_client(
    ledger: Arc<MockLedger>,
) -> TestResult {
    let mut client = ApplicationClientMother::counter(&ledger);
    let before = client.prepare(Default::default());

    let result = client.create(None, CallOverrides::default()).await?;

    assert_eq!(result.app_id, FIRST_APP_ID);
    assert_eq!(result.app_address, Address::from_app_id(result.app_id));
    assert_eq!(client.app_id(), result.app_id);
    assert_eq!(client.app_address(), Some(&result.app_address));
    assert_eq!(before.app_id(), 0);
    assert_eq!(before.app_address(), None);

    let global = ledger.global_state(result.app_id).ok_or("app missing")?;
    assert_eq!(global[&b"counter".to_vec()], TealValue::Uint(0));
    assert_eq!(
        global[&b"owner".to_vec()],
        TealValue::Bytes(SignerMother::creator().address().as_bytes().to_vec())
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_create_sends_schema_and_programs(ledger: Arc<MockLedger>) -> TestResult {
    let mut client = ApplicationClientMother::counter(&ledger);
    client.create(None, CallOverrides::default()).await?;

    let group = ledger.last_submitted_group().ok_or("nothing submitted")?;
    let call = group[0]
        .transaction
        .as_application_call()
        .ok_or("expected an application call")?;
    assert_eq!(call.app_id, 0);
    assert_eq!(call.on_complete, OnApplicationComplete::NoOp);
    let approval = client.compile_approval().await?;
    assert_eq!(call.approval_program.as_ref(), Some(&approval));
    assert_eq!(
        call.global_state_schema,
        Some(appkit_transact::StateSchema::new(1, 1))
    );
    assert_eq!(
        call.local_state_schema,
        Some(appkit_transact::StateSchema::new(1, 0))
    );
    assert_eq!(call.extra_program_pages, Some(0));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_create_twice_is_rejected(#[future] deployed_counter: DeployedAppResult) -> TestResult {
    let mut deployed = deployed_counter.await?;
    let err = deployed
        .client
        .create(None, CallOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppClientError::ConfigurationError { .. }));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_too_many_extra_pages_are_rejected(ledger: Arc<MockLedger>) {
    let mut client = ApplicationClientMother::counter(&ledger);
    let err = client
        .create(Some(4), CallOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppClientError::ArgumentError { .. }));
    assert!(ledger.submitted_groups().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_opt_in_routes_through_its_handler_method(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let user = deployed
        .client
        .prepare(ClientOverridesBuilder::default().signer(SignerMother::user().into()).build()?);

    user.opt_in(CallOverrides::default()).await?;

    let group = deployed.ledger.last_submitted_group().ok_or("nothing submitted")?;
    assert_eq!(on_complete_of(&group), Some(OnApplicationComplete::OptIn));
    assert_eq!(group[0].transaction.sender(), &SignerMother::user().address());

    let local = user.get_account_state(None).await?;
    assert_eq!(local[&b"visits".to_vec()], TealValue::Uint(0));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_close_out_and_clear_state_release_local_state(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let app_id = deployed.client.app_id();
    let user_address = SignerMother::user().address();
    let user = deployed
        .client
        .prepare(ClientOverridesBuilder::default().signer(SignerMother::user().into()).build()?);

    user.opt_in(CallOverrides::default()).await?;
    user.close_out(CallOverrides::default()).await?;
    let group = deployed.ledger.last_submitted_group().ok_or("nothing submitted")?;
    assert_eq!(on_complete_of(&group), Some(OnApplicationComplete::CloseOut));
    assert!(!deployed.ledger.is_opted_in(&user_address, app_id));

    user.opt_in(CallOverrides::default()).await?;
    user.clear_state(CallOverrides::default()).await?;
    let group = deployed.ledger.last_submitted_group().ok_or("nothing submitted")?;
    assert_eq!(on_complete_of(&group), Some(OnApplicationComplete::ClearState));
    assert!(!deployed.ledger.is_opted_in(&user_address, app_id));

    let err = user.get_account_state(None).await.unwrap_err();
    assert!(matches!(err, AppClientError::StateError { .. }));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_clear_state_succeeds_when_approval_rejects_everything(
    ledger: Arc<MockLedger>,
) -> TestResult {
    let mut client = ApplicationClientMother::client(
        &ledger,
        ApplicationDescriptionMother::rejecting(),
        Some(SignerMother::creator().into()),
        0,
    );
    client.create(None, CallOverrides::default()).await?;
    client.opt_in(CallOverrides::default()).await?;

    let err = client.close_out(CallOverrides::default()).await.unwrap_err();
    assert!(matches!(err, AppClientError::LogicError { .. }));
    assert!(err.to_string().contains("err opcode executed"));

    client.clear_state(CallOverrides::default()).await?;
    assert!(!ledger.is_opted_in(&SignerMother::creator().address(), client.app_id()));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_update_is_sent_by_the_owner(#[future] deployed_counter: DeployedAppResult) -> TestResult {
    let mut deployed = deployed_counter.await?;
    let app_id = deployed.client.app_id();

    deployed.client.update(CallOverrides::default()).await?;
    let group = deployed.ledger.last_submitted_group().ok_or("nothing submitted")?;
    assert_eq!(on_complete_of(&group), Some(OnApplicationComplete::UpdateApplication));
    assert_eq!(deployed.client.app_address(), Some(&Address::from_app_id(app_id)));

    let mut outsider = deployed.client.prepare(
        ClientOverridesBuilder::default()
            .signer(SignerMother::outsider().into())
            .build()?,
    );
    let err = outsider.update(CallOverrides::default()).await.unwrap_err();
    assert!(err.to_string().contains("only the owner may update"));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_delete_runs_the_handler_and_removes_the_app(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let app_id = deployed.client.app_id();

    let outsider = deployed.client.prepare(
        ClientOverridesBuilder::default()
            .signer(SignerMother::outsider().into())
            .build()?,
    );
    let err = outsider.delete(CallOverrides::default()).await.unwrap_err();
    assert!(matches!(err, AppClientError::LogicError { .. }));
    assert!(err.to_string().contains("only the owner may delete"));
    assert!(deployed.ledger.app_exists(app_id));

    deployed.client.delete(CallOverrides::default()).await?;
    let group = deployed.ledger.last_submitted_group().ok_or("nothing submitted")?;
    assert_eq!(on_complete_of(&group), Some(OnApplicationComplete::DeleteApplication));
    assert!(!deployed.ledger.app_exists(app_id));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_call_overrides_reach_the_transaction(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let overrides = CallOverridesBuilder::default()
        .note(b"hello".to_vec())
        .lease([4u8; 32])
        .accounts(vec![Address([8; 32])])
        .foreign_apps(vec![77])
        .build()?;

    deployed
        .client
        .call(
            "increment()uint64",
            vec![],
            OnApplicationComplete::NoOp,
            overrides,
        )
        .await?;

    let group = deployed.ledger.last_submitted_group().ok_or("nothing submitted")?;
    let call = group[0]
        .transaction
        .as_application_call()
        .ok_or("expected an application call")?;
    assert_eq!(call.header.note.as_deref(), Some(b"hello".as_slice()));
    assert_eq!(call.header.lease, Some([4u8; 32]));
    assert_eq!(call.account_references, Some(vec![Address([8; 32])]));
    assert_eq!(call.app_references, Some(vec![77]));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_fund_pays_the_application_account(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    deployed
        .ledger
        .fund(&SignerMother::creator().address(), 1_000_000);

    deployed.client.fund(200_000, CallOverrides::default()).await?;

    let app_address = deployed.client.app_address().ok_or("no app address")?;
    assert_eq!(deployed.ledger.balance(app_address), 200_000);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_application_account_info_reports_the_funded_balance(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let before = deployed.client.get_application_account_info().await?;
    assert_eq!(before.amount, 0);
    assert_eq!(before.auth_address, None);

    deployed
        .ledger
        .fund(&SignerMother::creator().address(), 1_000_000);
    deployed.client.fund(250_000, CallOverrides::default()).await?;

    let info = deployed.client.get_application_account_info().await?;
    assert_eq!(&info.address, deployed.client.app_address().ok_or("no app address")?);
    assert_eq!(info.amount, 250_000);
    assert_eq!(info.round, deployed.ledger.last_round());

    let undeployed = ApplicationClientMother::counter(&deployed.ledger);
    let err = undeployed.get_application_account_info().await.unwrap_err();
    assert!(matches!(err, AppClientError::ConfigurationError { .. }));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_explicit_signer_signs_for_its_own_address(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let user: Signer = SignerMother::user().into();

    deployed
        .client
        .opt_in(CallOverridesBuilder::default().signer(user.clone()).build()?)
        .await?;

    assert!(deployed
        .ledger
        .is_opted_in(&user.address(), deployed.client.app_id()));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_approval_rejection_is_located_in_the_source(ledger: Arc<MockLedger>) -> TestResult {
    let mut client = ApplicationClientMother::client(
        &ledger,
        ApplicationDescriptionMother::rejecting(),
        Some(SignerMother::creator().into()),
        0,
    );
    client.create(None, CallOverrides::default()).await?;

    let err = client
        .call(
            "ping()void",
            vec![],
            OnApplicationComplete::NoOp,
            CallOverrides::default(),
        )
        .await
        .unwrap_err();
    let (message, logic) = match err {
        AppClientError::LogicError { message, logic } => (message, logic),
        other => return Err(format!("expected a logic error, got {}", other).into()),
    };

    let group = ledger.last_submitted_group().ok_or("nothing submitted")?;
    let tx_id = group[0].id()?;
    assert!(logic.message.starts_with(&format!(
        "TransactionPool.Remember: transaction {}: logic eval error: err opcode executed. Details: app={}",
        tx_id,
        client.app_id()
    )));
    assert_eq!(logic.transaction_id.as_deref(), Some(tx_id.as_str()));
    assert_eq!(logic.pc, Some(3));
    assert_eq!(logic.line_no, Some(4));
    assert_eq!(
        logic.lines,
        vec![
            "   1 | #pragma version 8",
            "   2 | txn ApplicationID",
            "   3 | bz create",
            "   4 | err",
            "   5 | create:",
            "   6 | int 1",
        ]
    );
    assert!(message.contains("   4 | err\t<--- Error"));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_rejection_from_a_fresh_client_compiles_for_the_source_map(
    ledger: Arc<MockLedger>,
) -> TestResult {
    let mut creator = ApplicationClientMother::client(
        &ledger,
        ApplicationDescriptionMother::rejecting(),
        Some(SignerMother::creator().into()),
        0,
    );
    creator.create(None, CallOverrides::default()).await?;

    // Nothing compiled yet on this client
    let client = ApplicationClientMother::client(
        &ledger,
        ApplicationDescriptionMother::rejecting(),
        Some(SignerMother::user().into()),
        creator.app_id(),
    );
    client.opt_in(CallOverrides::default()).await?;
    let err = client.close_out(CallOverrides::default()).await.unwrap_err();

    match err {
        AppClientError::LogicError { logic, .. } => {
            assert_eq!(logic.line_no, Some(4));
            assert!(logic.message.contains("err opcode executed"));
        }
        other => return Err(format!("expected a logic error, got {}", other).into()),
    }
    Ok(())
}
