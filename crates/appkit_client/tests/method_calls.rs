mod common;

use appkit_abi::ABIValue;
use appkit_client::testing::{MockLedger, SignerMother};
use appkit_client::{
    AppClientError, CallOverrides, ClientOverridesBuilder, GroupStatus, MethodArg, Signer,
    TransactionWithSigner,
};
use appkit_transact::OnApplicationComplete;
use common::{DeployedAppResult, TestResult, deployed_counter, payment, string, uint};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::HashMap;

#[rstest]
#[tokio::test]
async fn test_method_returns_are_decoded(#[future] deployed_counter: DeployedAppResult) -> TestResult {
    let deployed = deployed_counter.await?;

    let sum = deployed
        .client
        .call(
            "add(uint64,uint64)uint64",
            vec![uint(40), uint(2)],
            OnApplicationComplete::NoOp,
            CallOverrides::default(),
        )
        .await?;
    assert_eq!(sum.return_value, Some(ABIValue::from(42u64)));

    let greeting = deployed
        .client
        .call(
            "hello",
            vec![string("Ada")],
            OnApplicationComplete::NoOp,
            CallOverrides::default(),
        )
        .await?;
    assert_eq!(
        greeting.return_value,
        Some(ABIValue::from("Hello, Ada"))
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_calls_change_state_and_read_only_calls_are_simulated(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let client = &deployed.client;

    for expected in 1..=2u64 {
        let result = client
            .call("increment()uint64", vec![], Default::default(), Default::default())
            .await?;
        assert_eq!(result.return_value, Some(ABIValue::from(expected)));
    }

    let submitted = deployed.ledger.submitted_groups().len();
    let counter = client
        .call("get_counter()uint64", vec![], Default::default(), Default::default())
        .await?;
    assert_eq!(counter.return_value, Some(ABIValue::from(2u64)));
    assert_eq!(deployed.ledger.submitted_groups().len(), submitted);

    let state = client.get_application_state().await?;
    assert_eq!(state[&b"counter".to_vec()].as_uint(), Some(2));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_default_arguments_are_resolved(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let client = &deployed.client;
    for _ in 0..3 {
        client
            .call("increment()uint64", vec![], Default::default(), Default::default())
            .await?;
    }

    let from_global = client
        .call(
            "double(uint64)uint64",
            vec![MethodArg::Default],
            Default::default(),
            Default::default(),
        )
        .await?;
    assert_eq!(from_global.return_value, Some(ABIValue::from(6u64)));

    let from_constant = client
        .call(
            "greet(string)string",
            vec![MethodArg::Default],
            Default::default(),
            Default::default(),
        )
        .await?;
    assert_eq!(from_constant.return_value, Some(ABIValue::from("Greetings, world")));

    let from_method = client
        .call(
            "next_counter(uint64)uint64",
            vec![MethodArg::Default],
            Default::default(),
            Default::default(),
        )
        .await?;
    assert_eq!(from_method.return_value, Some(ABIValue::from(4u64)));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_missing_default_is_an_argument_error(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let err = deployed
        .client
        .call(
            "add(uint64,uint64)uint64",
            vec![uint(1), MethodArg::Default],
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppClientError::ArgumentError { .. }));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_previous_returns_can_be_passed_on(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let sum = deployed
        .client
        .call(
            "add(uint64,uint64)uint64",
            vec![uint(2), uint(3)],
            Default::default(),
            Default::default(),
        )
        .await?;

    let doubled = deployed
        .client
        .call("double(uint64)uint64", vec![sum.into()], Default::default(), Default::default())
        .await?;
    assert_eq!(doubled.return_value, Some(ABIValue::from(10u64)));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_argument_mistakes_fail_before_submission(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let submitted = deployed.ledger.submitted_groups().len();
    let client = &deployed.client;

    let arity = client
        .call("add(uint64,uint64)uint64", vec![uint(1)], Default::default(), Default::default())
        .await
        .unwrap_err();
    assert!(matches!(arity, AppClientError::ArgumentError { .. }));
    assert!(arity.to_string().contains("expects 2 arguments, got 1"));

    let kind = client
        .call(
            "add(uint64,uint64)uint64",
            vec![string("1"), uint(1)],
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(kind, AppClientError::ArgumentError { .. }));

    let unknown = client
        .call("subtract(uint64,uint64)uint64", vec![], Default::default(), Default::default())
        .await
        .unwrap_err();
    assert!(matches!(unknown, AppClientError::ArgumentError { .. }));
    assert!(unknown.to_string().contains("not found"));

    let clear = client
        .add_method_call(
            client.new_group(),
            "increment()uint64",
            vec![],
            OnApplicationComplete::ClearState,
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(clear, AppClientError::ArgumentError { .. }));

    assert_eq!(deployed.ledger.submitted_groups().len(), submitted);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_transaction_arguments_precede_the_call(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let creator: Signer = SignerMother::creator().into();
    let app_address = deployed.client.app_address().cloned().ok_or("no app address")?;
    let pay = payment(&deployed.ledger, creator.address(), app_address.clone(), 5_000).await?;

    deployed
        .client
        .call(
            "deposit(pay,uint64)void",
            vec![
                TransactionWithSigner {
                    transaction: pay,
                    signer: creator.as_transaction_signer(),
                }
                .into(),
                uint(5_000),
            ],
            Default::default(),
            Default::default(),
        )
        .await?;

    let group = deployed.ledger.last_submitted_group().ok_or("nothing submitted")?;
    assert_eq!(group.len(), 2);
    assert!(group[0].transaction.as_application_call().is_none());
    assert!(group[1].transaction.as_application_call().is_some());
    assert!(group[0].transaction.header().group.is_some());
    assert_eq!(
        group[0].transaction.header().group,
        group[1].transaction.header().group
    );
    assert_eq!(deployed.ledger.balance(&app_address), 5_000);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_atomic_groups_commit_together(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let client = &deployed.client;

    let group = client
        .add_method_call(
            client.new_group(),
            "add(uint64,uint64)uint64",
            vec![uint(1), uint(1)],
            Default::default(),
            Default::default(),
        )
        .await?;
    let group = client
        .add_method_call(group, "increment()uint64", vec![], Default::default(), Default::default())
        .await?;
    let mut group = client
        .add_method_call(
            group,
            "hello(string)string",
            vec![string("group")],
            Default::default(),
            Default::default(),
        )
        .await?;
    assert_eq!(group.status(), GroupStatus::Building);

    let result = group.execute(None).await?;
    assert_eq!(group.status(), GroupStatus::Committed);
    assert_eq!(result.tx_ids.len(), 3);
    let returns: Vec<_> = result
        .method_returns
        .into_iter()
        .map(|r| r.return_value)
        .collect();
    assert_eq!(
        returns,
        vec![
            Some(ABIValue::from(2u64)),
            Some(ABIValue::from(1u64)),
            Some(ABIValue::from("Hello, group")),
        ]
    );
    assert!(result
        .confirmations
        .iter()
        .all(|c| c.confirmed_round == result.confirmed_round));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_failing_member_rolls_back_the_whole_group(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let client = &deployed.client;
    let app_address = client.app_address().cloned().ok_or("no app address")?;
    let creator: Signer = SignerMother::creator().into();
    let pay = payment(&deployed.ledger, creator.address(), app_address, 1).await?;

    let group = client
        .add_method_call(
            client.new_group(),
            "increment()uint64",
            vec![],
            Default::default(),
            Default::default(),
        )
        .await?;
    let mut group = client
        .add_method_call(
            group,
            "deposit(pay,uint64)void",
            vec![
                TransactionWithSigner {
                    transaction: pay,
                    signer: creator.as_transaction_signer(),
                }
                .into(),
                uint(999),
            ],
            Default::default(),
            Default::default(),
        )
        .await?;

    let err = group.execute(None).await.unwrap_err();
    assert!(matches!(err, AppClientError::SubmissionError { .. }));
    assert!(err.to_string().contains("deposit of 999"));

    let state = client.get_application_state().await?;
    assert_eq!(state[&b"counter".to_vec()].as_uint(), Some(0));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_group_capacity_is_enforced(#[future] deployed_counter: DeployedAppResult) -> TestResult {
    let deployed = deployed_counter.await?;
    let client = &deployed.client;

    let mut group = client.new_group();
    for i in 0..16u64 {
        group = client
            .add_method_call(
                group,
                "add(uint64,uint64)uint64",
                vec![uint(i), uint(0)],
                Default::default(),
                Default::default(),
            )
            .await?;
    }
    let err = client
        .add_method_call(
            group,
            "add(uint64,uint64)uint64",
            vec![uint(16), uint(0)],
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("more than 16 transactions"));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_local_state_is_read_for_the_sender(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let user = deployed.client.prepare(
        ClientOverridesBuilder::default()
            .signer(SignerMother::user().into())
            .build()?,
    );
    user.opt_in(CallOverrides::default()).await?;

    let visits = user
        .call("visit()uint64", vec![], Default::default(), Default::default())
        .await?;
    assert_eq!(visits.return_value, Some(ABIValue::from(1u64)));

    let local = user.get_account_state(None).await?;
    assert_eq!(local[&b"visits".to_vec()].as_uint(), Some(1));
    let creator_state = deployed
        .client
        .get_account_state(Some(&SignerMother::creator().address()))
        .await;
    assert!(matches!(creator_state, Err(AppClientError::StateError { .. })));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_the_ledger_can_be_shared_between_clients(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let ledger: &MockLedger = &deployed.ledger;
    let other = deployed.client.prepare(
        ClientOverridesBuilder::default()
            .signer(SignerMother::outsider().into())
            .build()?,
    );

    other
        .call("increment()uint64", vec![], Default::default(), Default::default())
        .await?;
    assert_eq!(
        ledger
            .global_state(deployed.client.app_id())
            .and_then(|state| state.get(b"counter".as_slice()).and_then(|v| v.as_uint())),
        Some(1)
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_struct_arguments_are_ordered_by_their_hint(
    #[future] deployed_counter: DeployedAppResult,
) -> TestResult {
    let deployed = deployed_counter.await?;
    let profile = MethodArg::Struct(HashMap::from([
        ("label".to_string(), ABIValue::from("ada")),
        ("id".to_string(), ABIValue::from(7u64)),
    ]));

    let result = deployed
        .client
        .call(
            "describe",
            vec![profile],
            OnApplicationComplete::NoOp,
            CallOverrides::default(),
        )
        .await?;
    assert_eq!(result.return_value, Some(ABIValue::from("#7 ada")));

    let submitted = deployed.ledger.submitted_groups().len();
    let incomplete = MethodArg::Struct(HashMap::from([("id".to_string(), ABIValue::from(7u64))]));
    let err = deployed
        .client
        .call(
            "describe",
            vec![incomplete],
            OnApplicationComplete::NoOp,
            CallOverrides::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppClientError::ArgumentError { .. }));
    assert!(err.to_string().contains("missing field label"));
    assert_eq!(deployed.ledger.submitted_groups().len(), submitted);
    Ok(())
}
