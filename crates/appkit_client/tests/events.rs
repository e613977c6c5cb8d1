//! Debug events go through process-wide configuration, so these tests live in their own binary.

mod common;

use appkit_client::testing::ApplicationClientMother;
use appkit_client::{CallOverrides, Config, EventData, EventType};
use appkit_transact::OnApplicationComplete;
use common::{TestResult, init_test_logging};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast::Receiver;

fn drain(receiver: &mut Receiver<(EventType, EventData)>) -> Vec<(EventType, EventData)> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_debug_mode_announces_compilation_and_simulation() -> TestResult {
    init_test_logging();
    Config::configure(Some(true), None);
    let mut receiver = Config::events().subscribe();

    let ledger = ApplicationClientMother::counter_ledger();
    let mut client = ApplicationClientMother::counter(&ledger);
    client.compile().await?;

    let compiled = drain(&mut receiver);
    assert_eq!(compiled.len(), 1);
    match &compiled[0] {
        (EventType::AppCompiled, EventData::AppCompiled(data)) => {
            assert_eq!(data.app_name, client.app().name());
            assert_eq!(data.version, client.app().version());
            assert!(!data.approval_hash.is_empty());
            assert!(data.approval_source_map.is_some());
        }
        other => panic!("unexpected event {:?}", other),
    }

    // Create and update reuse the cached programs
    client.create(None, CallOverrides::default()).await?;
    client.update(CallOverrides::default()).await?;
    let prepared = client.prepare(Default::default());
    prepared.compile().await?;
    assert!(
        !drain(&mut receiver)
            .iter()
            .any(|(event_type, _)| *event_type == EventType::AppCompiled)
    );

    // A client with its own cache compiles again
    let fresh = ApplicationClientMother::counter(&ledger);
    fresh.compile().await?;
    fresh.compile().await?;
    let recompiled = drain(&mut receiver);
    assert_eq!(recompiled.len(), 1);
    assert_eq!(recompiled[0].0, EventType::AppCompiled);

    client
        .call(
            "get_counter()uint64",
            vec![],
            OnApplicationComplete::NoOp,
            CallOverrides::default(),
        )
        .await?;

    let simulated = drain(&mut receiver);
    assert!(simulated.iter().any(|(event_type, data)| {
        *event_type == EventType::TxnGroupSimulated
            && matches!(data, EventData::TxnGroupSimulated(_))
    }));

    Config::configure(Some(false), None);
    client
        .call(
            "get_counter()uint64",
            vec![],
            OnApplicationComplete::NoOp,
            CallOverrides::default(),
        )
        .await?;
    assert!(drain(&mut receiver).is_empty());
    Ok(())
}
