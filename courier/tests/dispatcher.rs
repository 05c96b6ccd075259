use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier::aggregate::Tag;
use courier::command::{self, Capability, Registry};
use courier::dispatcher::Error;
use courier::event::publisher::{self, Subscriber};
use courier::event::store::{self, EventStoreExt};
use courier::message::Message;
use courier::test::{Call, Journal, RecordingPublisher, RecordingStore};
use courier::{event, Aggregate, Dispatcher, SendOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AccountCommand {
    OpenAccount { owner_id: u64 },
    Deposit { id: u64, amounts: Vec<u64> },
    Close { id: u64 },
    Freeze { id: u64 },
    Blank,
}

impl Message for AccountCommand {
    fn name(&self) -> &'static str {
        match self {
            AccountCommand::OpenAccount { .. } => "OpenAccount",
            AccountCommand::Deposit { .. } => "Deposit",
            AccountCommand::Close { .. } => "Close",
            AccountCommand::Freeze { .. } => "Freeze",
            AccountCommand::Blank => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, courier_macros::Message)]
enum AccountEvent {
    AccountOpened { id: u64 },
    Deposited { id: u64, amount: u64 },
}

struct AccountAggregate;

impl Aggregate for AccountAggregate {
    fn type_name() -> &'static str {
        "AccountAggregate"
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("account {0} is frozen")]
struct AccountFrozen(u64);

fn handle(
    command: command::Envelope<AccountCommand>,
) -> Result<command::Events<AccountEvent>, AccountFrozen> {
    match command.message {
        AccountCommand::OpenAccount { owner_id } => {
            Ok(vec![AccountEvent::AccountOpened { id: owner_id }.into()])
        }
        AccountCommand::Deposit { id, amounts } => Ok(amounts
            .into_iter()
            .map(|amount| AccountEvent::Deposited { id, amount }.into())
            .collect()),
        AccountCommand::Close { id } | AccountCommand::Freeze { id } => Err(AccountFrozen(id)),
        AccountCommand::Blank => Ok(Vec::new()),
    }
}

type TestDispatcher = Dispatcher<
    AccountCommand,
    AccountEvent,
    RecordingStore<AccountEvent>,
    RecordingPublisher<AccountEvent>,
>;

#[derive(Default)]
struct Invocations {
    blocking: Arc<AtomicUsize>,
    asynchronous: Arc<AtomicUsize>,
}

impl Invocations {
    fn blocking(&self) -> usize {
        self.blocking.load(Ordering::SeqCst)
    }

    fn asynchronous(&self) -> usize {
        self.asynchronous.load(Ordering::SeqCst)
    }
}

struct Fixture {
    journal: Journal<AccountEvent>,
    invocations: Invocations,
    dispatcher: TestDispatcher,
}

/// Every kind but "Freeze" has both a blocking and an async Handler.
fn registry(invocations: &Invocations) -> Registry<AccountCommand, AccountEvent> {
    let mut registry = Registry::new();

    for kind in ["OpenAccount", "Deposit", "Close"] {
        let counter = Arc::clone(&invocations.blocking);
        registry
            .register_blocking(kind, move |cmd: command::Envelope<AccountCommand>| {
                counter.fetch_add(1, Ordering::SeqCst);
                handle(cmd)
            })
            .expect("blocking handler should be registered");

        let counter = Arc::clone(&invocations.asynchronous);
        registry
            .register(kind, move |cmd: command::Envelope<AccountCommand>| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { handle(cmd) }
            })
            .expect("async handler should be registered");
    }

    registry
}

fn setup_with(
    store: impl FnOnce(RecordingStore<AccountEvent>) -> RecordingStore<AccountEvent>,
    publisher: impl FnOnce(RecordingPublisher<AccountEvent>) -> RecordingPublisher<AccountEvent>,
) -> Fixture {
    let journal = Journal::default();
    let invocations = Invocations::default();
    let dispatcher = Dispatcher::new(
        registry(&invocations),
        store(journal.store()),
        publisher(journal.publisher()),
    );

    Fixture {
        journal,
        invocations,
        dispatcher,
    }
}

fn setup() -> Fixture {
    setup_with(|store| store, |publisher| publisher)
}

fn account() -> Tag {
    Tag::of::<AccountAggregate>()
}

fn materialized(causation: &'static str, event: AccountEvent) -> event::Concrete<AccountEvent> {
    event::Concrete::materialize(causation, event.into())
}

fn deposited(id: u64, amount: u64) -> event::Concrete<AccountEvent> {
    materialized("Deposit", AccountEvent::Deposited { id, amount })
}

#[test]
fn open_account_is_appended_then_published() {
    let fixture = setup();

    fixture
        .dispatcher
        .send_to::<AccountAggregate>(
            AccountCommand::OpenAccount { owner_id: 42 },
            SendOptions::default(),
        )
        .expect("send should not fail");

    let expected = materialized("OpenAccount", AccountEvent::AccountOpened { id: 42 });

    assert_eq!("AccountOpened", expected.name);
    assert_eq!(
        vec![
            Call::Append {
                aggregate: account(),
                event: expected.clone(),
            },
            Call::Publish { event: expected },
        ],
        fixture.journal.calls()
    );
}

#[tokio::test]
async fn each_event_is_appended_and_published_before_the_next_one() {
    let fixture = setup();

    fixture
        .dispatcher
        .send_async_to::<AccountAggregate>(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20],
            },
            SendOptions::default(),
        )
        .await
        .expect("send should not fail");

    assert_eq!(
        vec![
            Call::Append {
                aggregate: account(),
                event: deposited(1, 10),
            },
            Call::Publish {
                event: deposited(1, 10),
            },
            Call::Append {
                aggregate: account(),
                event: deposited(1, 20),
            },
            Call::Publish {
                event: deposited(1, 20),
            },
        ],
        fixture.journal.calls()
    );
}

#[test]
fn send_publishes_in_order_without_touching_the_store() {
    let fixture = setup();

    fixture
        .dispatcher
        .send(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20, 30],
            },
            SendOptions::default(),
        )
        .expect("send should not fail");

    assert!(fixture.journal.appends().is_empty());
    assert_eq!(
        vec![deposited(1, 10), deposited(1, 20), deposited(1, 30)],
        fixture.journal.publishes()
    );
}

#[tokio::test]
async fn send_async_publishes_in_order_without_touching_the_store() {
    let fixture = setup();

    fixture
        .dispatcher
        .send_async(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20],
            },
            SendOptions::default(),
        )
        .await
        .expect("send should not fail");

    assert!(fixture.journal.appends().is_empty());
    assert_eq!(
        vec![deposited(1, 10), deposited(1, 20)],
        fixture.journal.publishes()
    );
}

#[tokio::test]
async fn missing_handlers_fail_every_entry_point_without_side_effects() {
    let fixture = setup();
    let options = SendOptions::default();
    let freeze = || AccountCommand::Freeze { id: 1 };

    let results = vec![
        (
            Capability::Blocking,
            fixture.dispatcher.send(freeze(), options),
        ),
        (
            Capability::Blocking,
            fixture
                .dispatcher
                .send_to::<AccountAggregate>(freeze(), options),
        ),
        (
            Capability::Async,
            fixture.dispatcher.send_async(freeze(), options).await,
        ),
        (
            Capability::Async,
            fixture
                .dispatcher
                .send_async_to::<AccountAggregate>(freeze(), options)
                .await,
        ),
    ];

    for (expected_capability, result) in results {
        let err = result.expect_err("send should fail");

        match &err {
            Error::HandlerNotFound {
                command,
                capability,
                ..
            } => {
                assert_eq!("Freeze", *command);
                assert_eq!(expected_capability, *capability);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(err.to_string().contains("AccountCommand"));
    }

    assert_eq!(0, fixture.invocations.blocking());
    assert_eq!(0, fixture.invocations.asynchronous());
    assert!(fixture.journal.calls().is_empty());
}

#[tokio::test]
async fn commands_without_kind_are_rejected_before_resolution() {
    let fixture = setup();
    let options = SendOptions::default();

    let results = vec![
        fixture.dispatcher.send(AccountCommand::Blank, options),
        fixture
            .dispatcher
            .send_to::<AccountAggregate>(AccountCommand::Blank, options),
        fixture
            .dispatcher
            .send_async(AccountCommand::Blank, options)
            .await,
        fixture
            .dispatcher
            .send_async_to::<AccountAggregate>(AccountCommand::Blank, options)
            .await,
    ];

    for result in results {
        assert!(matches!(result, Err(Error::InvalidCommand { .. })));
    }

    assert_eq!(0, fixture.invocations.blocking());
    assert_eq!(0, fixture.invocations.asynchronous());
    assert!(fixture.journal.calls().is_empty());
}

#[test]
fn handler_errors_are_returned_unmodified() {
    let fixture = setup();

    let err = fixture
        .dispatcher
        .send_to::<AccountAggregate>(AccountCommand::Close { id: 7 }, SendOptions::default())
        .expect_err("send should fail");

    match err {
        Error::Handler(err) => {
            assert_eq!(Some(&AccountFrozen(7)), err.downcast_ref::<AccountFrozen>());
            assert_eq!("account 7 is frozen", err.to_string());
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(fixture.journal.calls().is_empty());
}

#[tokio::test]
async fn async_handler_errors_are_returned_unmodified() {
    let fixture = setup();

    let err = fixture
        .dispatcher
        .send_async(AccountCommand::Close { id: 7 }, SendOptions::default())
        .await
        .expect_err("send should fail");

    assert_eq!("account 7 is frozen", err.to_string());
    assert!(fixture.journal.calls().is_empty());
}

#[tokio::test]
async fn disabled_publishing_without_store_has_no_side_effects() {
    let fixture = setup();
    let options = SendOptions::without_publishing();

    for amounts in [vec![], vec![10], vec![10, 20, 30]] {
        fixture
            .dispatcher
            .send(
                AccountCommand::Deposit {
                    id: 1,
                    amounts: amounts.clone(),
                },
                options,
            )
            .expect("send should not fail");

        fixture
            .dispatcher
            .send_async(AccountCommand::Deposit { id: 1, amounts }, options)
            .await
            .expect("send should not fail");
    }

    assert_eq!(3, fixture.invocations.blocking());
    assert_eq!(3, fixture.invocations.asynchronous());
    assert!(fixture.journal.calls().is_empty());
}

#[test]
fn disabled_publishing_still_appends_every_event() {
    let fixture = setup();

    fixture
        .dispatcher
        .send_to::<AccountAggregate>(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20, 30],
            },
            SendOptions::without_publishing(),
        )
        .expect("send should not fail");

    assert!(fixture.journal.publishes().is_empty());
    assert_eq!(
        vec![
            (account(), deposited(1, 10)),
            (account(), deposited(1, 20)),
            (account(), deposited(1, 30)),
        ],
        fixture.journal.appends()
    );
}

#[tokio::test]
async fn append_failures_stop_the_propagation_without_rollback() {
    let fixture = setup_with(|store| store.fail_on(3), |publisher| publisher);

    let err = fixture
        .dispatcher
        .send_async_to::<AccountAggregate>(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20, 30, 40, 50],
            },
            SendOptions::default(),
        )
        .await
        .expect_err("send should fail");

    assert!(matches!(err, Error::Append(_)));
    assert_eq!(
        vec![(account(), deposited(1, 10)), (account(), deposited(1, 20))],
        fixture.journal.appends()
    );
    assert_eq!(
        vec![deposited(1, 10), deposited(1, 20)],
        fixture.journal.publishes()
    );
}

#[test]
fn publish_failures_stop_the_propagation() {
    let fixture = setup_with(|store| store, |publisher| publisher.fail_on(2));

    let err = fixture
        .dispatcher
        .send_to::<AccountAggregate>(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20, 30],
            },
            SendOptions::default(),
        )
        .expect_err("send should fail");

    assert!(matches!(err, Error::Publish(_)));
    assert_eq!(
        vec![(account(), deposited(1, 10)), (account(), deposited(1, 20))],
        fixture.journal.appends()
    );
    assert_eq!(vec![deposited(1, 10)], fixture.journal.publishes());
}

#[tokio::test]
async fn each_entry_point_uses_its_own_capability() {
    let fixture = setup();
    let command = || AccountCommand::OpenAccount { owner_id: 1 };

    fixture
        .dispatcher
        .send(command(), SendOptions::default())
        .expect("send should not fail");

    assert_eq!(1, fixture.invocations.blocking());
    assert_eq!(0, fixture.invocations.asynchronous());

    fixture
        .dispatcher
        .send_async(command(), SendOptions::default())
        .await
        .expect("send should not fail");

    assert_eq!(1, fixture.invocations.blocking());
    assert_eq!(1, fixture.invocations.asynchronous());
}

#[test]
fn sending_the_same_command_twice_repeats_every_side_effect() {
    let fixture = setup();
    let command = command::Envelope::from(AccountCommand::OpenAccount { owner_id: 42 })
        .with_metadata("request_id".to_owned(), "abc".to_owned());

    for _ in 0..2 {
        fixture
            .dispatcher
            .send_to::<AccountAggregate>(command.clone(), SendOptions::default())
            .expect("send should not fail");
    }

    let expected = materialized("OpenAccount", AccountEvent::AccountOpened { id: 42 });

    assert_eq!(2, fixture.invocations.blocking());
    assert_eq!(
        vec![(account(), expected.clone()), (account(), expected.clone())],
        fixture.journal.appends()
    );
    assert_eq!(vec![expected.clone(), expected], fixture.journal.publishes());
}

#[tokio::test]
async fn disabled_publishing_still_appends_every_event_in_async_sends() {
    let fixture = setup();

    fixture
        .dispatcher
        .send_async_to::<AccountAggregate>(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20, 30],
            },
            SendOptions::without_publishing(),
        )
        .await
        .expect("send should not fail");

    assert!(fixture.journal.publishes().is_empty());
    assert_eq!(
        vec![
            (account(), deposited(1, 10)),
            (account(), deposited(1, 20)),
            (account(), deposited(1, 30)),
        ],
        fixture.journal.appends()
    );
}

#[tokio::test]
async fn publish_failures_stop_the_async_propagation() {
    let fixture = setup_with(|store| store, |publisher| publisher.fail_on(2));

    let err = fixture
        .dispatcher
        .send_async_to::<AccountAggregate>(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20, 30],
            },
            SendOptions::default(),
        )
        .await
        .expect_err("send should fail");

    assert!(matches!(err, Error::Publish(_)));
    assert_eq!(
        vec![(account(), deposited(1, 10)), (account(), deposited(1, 20))],
        fixture.journal.appends()
    );
    assert_eq!(vec![deposited(1, 10)], fixture.journal.publishes());
}

#[tokio::test]
async fn persisted_sends_without_events_have_no_side_effects() {
    let fixture = setup();
    let empty_deposit = || AccountCommand::Deposit {
        id: 1,
        amounts: vec![],
    };

    fixture
        .dispatcher
        .send_to::<AccountAggregate>(empty_deposit(), SendOptions::default())
        .expect("send should not fail");

    fixture
        .dispatcher
        .send_async_to::<AccountAggregate>(empty_deposit(), SendOptions::default())
        .await
        .expect("send should not fail");

    assert_eq!(1, fixture.invocations.blocking());
    assert_eq!(1, fixture.invocations.asynchronous());
    assert!(fixture.journal.calls().is_empty());
}

/// Subscriber waiting on the runtime timer before accepting each Event.
struct SlowSubscriber {
    received: Arc<AtomicUsize>,
}

#[async_trait]
impl Subscriber<AccountEvent> for SlowSubscriber {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn on_event(&self, _event: &event::Concrete<AccountEvent>) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn blocking_sends_complete_on_a_blocking_thread_with_runtime_bound_collaborators() {
    let invocations = Invocations::default();
    let received = Arc::new(AtomicUsize::new(0));

    let event_store = store::InMemory::<AccountEvent>::default().with_recorded_events_tracking();
    let event_publisher = publisher::InMemory::<AccountEvent>::default();
    event_publisher.subscribe(SlowSubscriber {
        received: Arc::clone(&received),
    });

    let dispatcher = Arc::new(Dispatcher::new(
        registry(&invocations),
        event_store.clone(),
        event_publisher,
    ));

    let blocking_dispatcher = Arc::clone(&dispatcher);
    tokio::task::spawn_blocking(move || {
        blocking_dispatcher.send_to::<AccountAggregate>(
            AccountCommand::Deposit {
                id: 1,
                amounts: vec![10, 20],
            },
            SendOptions::default(),
        )
    })
    .await
    .expect("blocking task should not panic")
    .expect("send should not fail");

    let recorded = event_store.recorded_events();

    assert_eq!(2, received.load(Ordering::SeqCst));
    assert_eq!(
        vec![1, 2],
        recorded.iter().map(|evt| evt.version).collect::<Vec<_>>()
    );
    assert!(recorded.iter().all(|evt| evt.aggregate == account()));
    assert_eq!(
        vec![deposited(1, 10), deposited(1, 20)],
        recorded.into_iter().map(|evt| evt.event).collect::<Vec<_>>()
    );
}
