use crate::{Payload, SyncConfig, TransportFault};
use reqwest::{Client, RequestBuilder};
use std::future::Future;
use std::time::Duration;

/// Delivers one payload to the remote endpoint.
///
/// The result is binary: `Ok` means the endpoint accepted the record and it may
/// be deleted locally, anything else keeps it queued.
pub trait Forwarder {
	fn forward(&self, payload: &Payload) -> impl Future<Output = Result<(), TransportFault>>;
}

/// Adapts an async closure into a [`Forwarder`]. See [`forward_fn`].
#[derive(Clone, Debug)]
pub struct FnForwarder<F>(F);

/// Wraps a closure taking the payload by value.
///
/// ```
/// use intakequeue::{forward_fn, Payload, TransportFault};
///
/// let forwarder = forward_fn(|payload: Payload| async move {
///     if payload.contains_key("email") {
///         Ok(())
///     } else {
///         Err(TransportFault::Rejected { status: 422 })
///     }
/// });
/// # let _ = forwarder;
/// ```
pub fn forward_fn<F, Fut>(f: F) -> FnForwarder<F>
where
	F: Fn(Payload) -> Fut,
	Fut: Future<Output = Result<(), TransportFault>>,
{
	FnForwarder(f)
}

impl<F, Fut> Forwarder for FnForwarder<F>
where
	F: Fn(Payload) -> Fut,
	Fut: Future<Output = Result<(), TransportFault>>,
{
	fn forward(&self, payload: &Payload) -> impl Future<Output = Result<(), TransportFault>> {
		(self.0)(payload.clone())
	}
}

/// Posts payloads as JSON to the intake endpoint.
///
/// Any 2xx response counts as accepted; the body is ignored.
#[derive(Clone, Debug)]
pub struct HttpForwarder {
	client: Client,
	endpoint: String,
	timeout: Option<Duration>,
}

impl HttpForwarder {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self::with_client(Client::new(), endpoint)
	}

	pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
		Self {
			client,
			endpoint: endpoint.into(),
			timeout: None,
		}
	}

	pub fn from_config(config: &SyncConfig) -> Self {
		let forwarder = Self::new(config.endpoint.clone());
		match config.request_timeout {
			Some(timeout) => forwarder.with_timeout(timeout),
			None => forwarder,
		}
	}

	/// Bounds each forward. Unset means the transport default.
	/// Ignored on wasm, where the browser's fetch decides.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[cfg(not(target_arch = "wasm32"))]
fn apply_timeout(request: RequestBuilder, timeout: Option<Duration>) -> RequestBuilder {
	match timeout {
		Some(timeout) => request.timeout(timeout),
		None => request,
	}
}

#[cfg(target_arch = "wasm32")]
fn apply_timeout(request: RequestBuilder, _timeout: Option<Duration>) -> RequestBuilder {
	request
}

impl Forwarder for HttpForwarder {
	async fn forward(&self, payload: &Payload) -> Result<(), TransportFault> {
		let request = apply_timeout(self.client.post(&self.endpoint).json(payload), self.timeout);
		let response = request.send().await?;

		let status = response.status();
		if !status.is_success() {
			return Err(TransportFault::Rejected {
				status: status.as_u16(),
			});
		}

		tracing::debug!(endpoint = %self.endpoint, status = status.as_u16(), "submission accepted");
		Ok(())
	}
}
