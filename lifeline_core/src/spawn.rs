//! Background task spawning.

use futures::{
    future::BoxFuture,
    stream::{AbortHandle, Abortable},
};

/// A trait for spawning background tasks.
///
/// The returned [`AbortHandle`] cancels the task. Dropping it does not.
pub trait Spawn {
    /// Spawn a future as a background task.
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> AbortHandle;
}

/// A spawner that uses tokio to spawn tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawn;

impl Spawn for TokioSpawn {
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> AbortHandle {
        let (handle, reg) = AbortHandle::new_pair();
        tokio::spawn(async move {
            let _ = Abortable::new(fut, reg).await;
        });
        handle
    }
}

impl<S: Spawn + ?Sized> Spawn for std::sync::Arc<S> {
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> AbortHandle {
        (**self).spawn(fut)
    }
}
