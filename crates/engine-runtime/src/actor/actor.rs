use crate::error::ActorError;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::mpsc;

/// Identity of a running actor, handed to every hook.
#[derive(Debug, Clone)]
pub struct ActorContext {
    name: Arc<str>,
}

impl ActorContext {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// State owned by a single task and changed only by its messages, one at a
/// time. `on_stop` runs after the last [`ActorRef`] is dropped and the
/// mailbox is empty.
#[async_trait]
pub trait Actor<M: Send + Debug + 'static>: Send + 'static {
    async fn on_start(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    async fn handle(&mut self, msg: M, ctx: &ActorContext) -> Result<(), ActorError>;

    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }
}

/// Cloneable sender into an actor's bounded mailbox.
#[derive(Debug)]
pub struct ActorRef<M> {
    ctx: ActorContext,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M: Send + Debug + 'static> ActorRef<M> {
    pub fn new(ctx: ActorContext, tx: mpsc::Sender<M>) -> Self {
        Self { ctx, tx }
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// Enqueues `msg`, waiting while the mailbox is full.
    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx.send(msg).await.map_err(|_| ActorError::MailboxClosed)
    }
}
