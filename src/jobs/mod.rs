//! # Deferred units of work.
//!
//! A [`Job`] is a one-shot closure invoked with the resolver when a pool worker picks
//! it up. Jobs have no identity: they are fire-and-forget, errors are reported as
//! events and never returned to the submitter.
//!
//! The same shape is used for on-ready hooks.
//!
//! ## Example
//! ```rust
//! use appvisor::{Job, ResolverExt};
//!
//! struct Mailer;
//!
//! let job = Job::new(|resolver| async move {
//!     let _mailer = resolver.resolve::<Mailer>()?;
//!     Ok(())
//! });
//! # drop(job);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::container::Resolver;

/// Boxed future returned by a job.
pub type JobFuture = BoxFuture<'static, anyhow::Result<()>>;

type JobFn = Box<dyn FnOnce(Arc<dyn Resolver>) -> JobFuture + Send>;

/// One-shot deferred call resolved against the resolver at execution time.
pub struct Job {
    f: JobFn,
}

impl Job {
    /// Wraps a closure producing the job's future.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Arc<dyn Resolver>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            f: Box::new(move |resolver| Box::pin(f(resolver))),
        }
    }

    /// Consumes the job and produces its future.
    pub(crate) fn call(self, resolver: Arc<dyn Resolver>) -> JobFuture {
        (self.f)(resolver)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Job")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{BinderExt, Container, ResolverExt};

    #[tokio::test]
    async fn test_job_receives_resolver() {
        let c = Container::new();
        c.bind_value(41_u32);
        let resolver: Arc<dyn Resolver> = Arc::new(c);

        let job = Job::new(|r| async move {
            anyhow::ensure!(*r.resolve::<u32>()? == 41, "wrong value");
            Ok(())
        });
        job.call(resolver).await.unwrap();
    }
}
