//! Dispatch attachment point
//!
//! The server never looks inside a request. Whatever implements [`Dispatch`]
//! is attached once per start and receives every request of that run.

use std::future::Future;
use std::pin::Pin;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};

pub type DispatchFuture = Pin<Box<dyn Future<Output = Response<Full<Bytes>>> + Send>>;

/// Turns one HTTP request into one HTTP response.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, request: Request<Incoming>) -> DispatchFuture;
}

impl<F, Fut> Dispatch for F
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    fn dispatch(&self, request: Request<Incoming>) -> DispatchFuture {
        Box::pin(self(request))
    }
}
