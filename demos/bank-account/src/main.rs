//! Wires the bank account domain to an in-memory Event Store and Event Publisher,
//! and sends a few Commands through every [`Dispatcher`] entry point.

mod config;
mod domain;
mod logging;

use std::sync::Arc;

use anyhow::anyhow;
use courier::aggregate::Tag;
use courier::event::publisher;
use courier::event::store::{self, Streamer, VersionSelect};
use courier::tracing::{AppenderExt, PublisherExt};
use courier::{event, Dispatcher};
use envconfig::Envconfig;
use futures::{StreamExt, TryStreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::config::Config;
use crate::domain::{AccountAggregate, AccountCommand, AccountEvent, AuditLog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init_from_env()?;
    logging::initialize(&config.log_level)?;

    let options = config.send_options();

    let event_store = store::InMemory::<AccountEvent>::default();
    let event_publisher = publisher::InMemory::<AccountEvent>::default();
    event_publisher.subscribe(AuditLog);

    let watcher = tokio::spawn(count_published_events(event_publisher.watch()));

    let dispatcher = Arc::new(Dispatcher::new(
        domain::registry()?,
        event_store.clone().with_tracing(),
        event_publisher.clone().with_tracing(),
    ));

    // Blocking entry points must not run on the async runtime threads.
    let blocking_dispatcher = Arc::clone(&dispatcher);
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        blocking_dispatcher.send(AccountCommand::OpenAccount { owner_id: 1 }, options)?;
        blocking_dispatcher
            .send_to::<AccountAggregate>(AccountCommand::OpenAccount { owner_id: 42 }, options)?;

        if let Err(err) = blocking_dispatcher.send(
            AccountCommand::Deposit {
                account_id: 42,
                amount: 10,
            },
            options,
        ) {
            tracing::warn!(error = %err, "blocking deposit rejected");
        }

        Ok(())
    })
    .await
    .map_err(|e| anyhow!("blocking dispatch task failed: {}", e))??;

    dispatcher
        .send_async(
            AccountCommand::Deposit {
                account_id: 1,
                amount: 100,
            },
            options,
        )
        .await?;

    dispatcher
        .send_async_to::<AccountAggregate>(
            AccountCommand::Deposit {
                account_id: 42,
                amount: 250,
            },
            options,
        )
        .await?;

    if let Err(err) = dispatcher
        .send_async_to::<AccountAggregate>(
            AccountCommand::Deposit {
                account_id: 42,
                amount: 0,
            },
            options,
        )
        .await
    {
        tracing::warn!(error = %err, "async deposit rejected");
    }

    let history: Vec<_> = event_store
        .stream(&Tag::of::<AccountAggregate>(), VersionSelect::All)
        .try_collect()
        .await?;

    for persisted in &history {
        tracing::info!(
            aggregate = %persisted.aggregate,
            version = persisted.version,
            event = persisted.event.name,
            causation = persisted.event.causation,
            "persisted domain event"
        );
    }

    // Closing every publisher handle ends the watcher stream.
    drop(dispatcher);
    drop(event_publisher);

    let published = watcher
        .await
        .map_err(|e| anyhow!("watcher task failed: {}", e))?;

    tracing::info!(persisted = history.len(), published, "bank account demo completed");

    Ok(())
}

async fn count_published_events(
    mut events: BroadcastStream<event::Concrete<AccountEvent>>,
) -> usize {
    let mut count = 0;

    while let Some(event) = events.next().await {
        match event {
            Ok(_) => count += 1,
            Err(err) => tracing::warn!(error = %err, "watcher lagged behind"),
        }
    }

    count
}
