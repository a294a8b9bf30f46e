use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by the collaborator traits (evidence
/// sources, record stores, text generators).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
