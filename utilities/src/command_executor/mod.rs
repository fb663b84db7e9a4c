use std::sync::mpsc::{Receiver, Sender};

use tokio::sync::oneshot;

/// Failures of the executor plumbing itself, as opposed to the device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("command executor is not running")]
    Stopped,
    #[error("command executor dropped the response")]
    ResponseDropped,
}

pub trait Command: Send {
    type Response: Send;
    type Error: From<ExecutorError> + Send;
    type Handler: DeviceHandler<Command = Self>;

    fn execute(self, handler: &mut Self::Handler) -> Result<Self::Response, Self::Error>;
}

pub trait DeviceHandler {
    type Command: Command<Handler = Self>;

    /// Name used when reporting on the handler thread.
    fn name(&self) -> &str;
}

type CommandResult<C> = Result<<C as Command>::Response, <C as Command>::Error>;

pub struct GenericCommand<C: Command> {
    command: C,
    response_ch: oneshot::Sender<CommandResult<C>>,
}

impl<C: Command> GenericCommand<C> {
    pub fn new(command: C, response_ch: oneshot::Sender<CommandResult<C>>) -> Self {
        Self {
            command,
            response_ch,
        }
    }

    pub fn execute(self, handler: &mut C::Handler) -> Result<(), ExecutorError> {
        let result = self.command.execute(handler);

        self.response_ch
            .send(result)
            .map_err(|_| ExecutorError::ResponseDropped)
    }
}

/// Runs a device handler on a dedicated blocking thread.
///
/// Commands are executed strictly one at a time in arrival order. The executor
/// stops once every [`CommandSender`] (and the executor's own sender) is gone,
/// dropping the handler and with it the device connection.
pub struct CommandExecutor<H: DeviceHandler + Send + 'static> {
    handler: H,
    commands_ch: Receiver<GenericCommand<H::Command>>,
    sender: Sender<GenericCommand<H::Command>>,
}

impl<H: DeviceHandler + Send> CommandExecutor<H> {
    pub fn new(handler: H) -> Self {
        let (sender, commands_ch) = std::sync::mpsc::channel();

        Self {
            handler,
            commands_ch,
            sender,
        }
    }

    pub fn sender(&self) -> CommandSender<H::Command> {
        CommandSender::new(self.sender.clone())
    }

    pub fn run(self) {
        let Self {
            mut handler,
            commands_ch,
            sender,
        } = self;
        drop(sender);

        while let Ok(command) = commands_ch.recv() {
            if let Err(e) = command.execute(&mut handler) {
                tracing::warn!("{}: {}", handler.name(), e);
            }
        }

        tracing::debug!("{}: command executor stopped", handler.name());
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::task::spawn_blocking(move || self.run())
    }
}

pub struct CommandSender<C: Command> {
    commands_ch: Sender<GenericCommand<C>>,
}

impl<C: Command> Clone for CommandSender<C> {
    fn clone(&self) -> Self {
        Self {
            commands_ch: self.commands_ch.clone(),
        }
    }
}

impl<C: Command> CommandSender<C> {
    pub fn new(commands_ch: Sender<GenericCommand<C>>) -> Self {
        Self { commands_ch }
    }

    pub async fn send_command(&self, command: C) -> Result<C::Response, C::Error> {
        let (response_ch, response_rx) = oneshot::channel();
        let command = GenericCommand::new(command, response_ch);

        self.commands_ch
            .send(command)
            .map_err(|_| ExecutorError::Stopped)?;

        response_rx
            .await
            .map_err(|_| ExecutorError::ResponseDropped)?
    }
}
