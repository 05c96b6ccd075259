//! The bank account domain: an Account can be opened and receive deposits.

use async_trait::async_trait;
use courier::command::{self, RegisterError, Registry};
use courier::event::publisher::Subscriber;
use courier::message::Message;
use courier::{event, Aggregate};

pub(crate) type AccountId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Message)]
pub(crate) enum AccountCommand {
    OpenAccount { owner_id: AccountId },
    Deposit { account_id: AccountId, amount: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Message)]
pub(crate) enum AccountEvent {
    AccountOpened { id: AccountId },
    Deposited { id: AccountId, amount: u64 },
}

pub(crate) struct AccountAggregate;

impl Aggregate for AccountAggregate {
    fn type_name() -> &'static str {
        "AccountAggregate"
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum AccountError {
    #[error("deposit amount must be greater than zero")]
    EmptyDeposit,

    #[error("command '{0}' is not handled here")]
    UnexpectedCommand(&'static str),
}

pub(crate) fn open_account(
    command: command::Envelope<AccountCommand>,
) -> Result<command::Events<AccountEvent>, AccountError> {
    match command.message {
        AccountCommand::OpenAccount { owner_id } => {
            Ok(vec![AccountEvent::AccountOpened { id: owner_id }.into()])
        }
        other => Err(AccountError::UnexpectedCommand(other.name())),
    }
}

/// Asynchronous Handler for the `Deposit` Command.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Deposits;

#[async_trait]
impl command::Handler<AccountCommand, AccountEvent> for Deposits {
    type Error = AccountError;

    async fn handle(
        &self,
        command: command::Envelope<AccountCommand>,
    ) -> Result<command::Events<AccountEvent>, Self::Error> {
        match command.message {
            AccountCommand::Deposit { amount: 0, .. } => Err(AccountError::EmptyDeposit),
            AccountCommand::Deposit { account_id, amount } => Ok(vec![AccountEvent::Deposited {
                id: account_id,
                amount,
            }
            .into()]),
            other => Err(AccountError::UnexpectedCommand(other.name())),
        }
    }
}

/// Binds every Handler of the domain to its Command kind.
///
/// `Deposit` has no blocking Handler.
pub(crate) fn registry() -> Result<Registry<AccountCommand, AccountEvent>, RegisterError> {
    let mut registry = Registry::new();

    registry.register_blocking("OpenAccount", open_account)?;
    registry.register(
        "OpenAccount",
        |command: command::Envelope<AccountCommand>| async move { open_account(command) },
    )?;
    registry.register("Deposit", Deposits)?;

    Ok(registry)
}

/// Logs every published Domain Event.
pub(crate) struct AuditLog;

#[async_trait]
impl Subscriber<AccountEvent> for AuditLog {
    fn name(&self) -> &'static str {
        "audit-log"
    }

    async fn on_event(&self, event: &event::Concrete<AccountEvent>) -> anyhow::Result<()> {
        tracing::info!(
            event = event.name,
            causation = event.causation,
            payload = ?event.message(),
            "domain event received"
        );

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use courier::command::{BlockingHandler, Capability, Handler};

    use super::*;

    #[test]
    fn opening_an_account_emits_account_opened() {
        let events = open_account(AccountCommand::OpenAccount { owner_id: 42 }.into())
            .expect("open account should not fail");

        assert_eq!(
            vec![event::Envelope::from(AccountEvent::AccountOpened { id: 42 })],
            events
        );
        assert_eq!("AccountOpened", events[0].name());
    }

    #[tokio::test]
    async fn empty_deposits_are_rejected() {
        let err = Handler::handle(
            &Deposits,
            AccountCommand::Deposit {
                account_id: 42,
                amount: 0,
            }
            .into(),
        )
        .await
        .expect_err("empty deposit should fail");

        assert_eq!(AccountError::EmptyDeposit, err);
    }

    #[test]
    fn handlers_reject_commands_of_other_kinds() {
        let err = BlockingHandler::handle(
            &open_account,
            AccountCommand::Deposit {
                account_id: 42,
                amount: 10,
            }
            .into(),
        )
        .expect_err("deposit should not be handled by open_account");

        assert_eq!(AccountError::UnexpectedCommand("Deposit"), err);
    }

    #[test]
    fn registry_binds_every_command_kind() {
        let registry = registry().expect("registry should be built");

        assert!(registry.contains("OpenAccount", Capability::Blocking));
        assert!(registry.contains("OpenAccount", Capability::Async));
        assert!(registry.contains("Deposit", Capability::Async));
        assert!(!registry.contains("Deposit", Capability::Blocking));
    }
}
