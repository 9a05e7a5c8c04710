use crate::{
	Connectivity, ConnectivitySource, DrainReport, Forwarder, OfflineQueue, StorageFault,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only view of a monitor's current status.
///
/// Handed to the submission path so it can choose between sending and
/// queuing while the monitor itself is busy awaiting signals.
#[derive(Clone, Debug)]
pub struct StatusHandle(Arc<AtomicBool>);

impl StatusHandle {
	pub fn connectivity(&self) -> Connectivity {
		Connectivity::from_online(self.is_online())
	}

	pub fn is_online(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// A status change the monitor acted on.
#[derive(Debug)]
pub enum Transition {
	/// Went online and drained the queue. `Err` means the queue could not
	/// even be listed; nothing was forwarded.
	Online(Result<DrainReport, StorageFault>),
	Offline,
}

/// Dispatches connectivity transitions to the offline queue.
///
/// Lifecycle: [`new`](Self::new) reads the environment's status once,
/// [`start`](Self::start) registers the transition listeners,
/// [`stop`](Self::stop) (or dropping the monitor) removes them.
pub struct ConnectivityMonitor<S: ConnectivitySource, F> {
	source: S,
	queue: Arc<OfflineQueue>,
	forwarder: F,
	online: StatusHandle,
	subscription: Option<S::Subscription>,
}

impl<S: ConnectivitySource, F: Forwarder> ConnectivityMonitor<S, F> {
	pub fn new(source: S, queue: Arc<OfflineQueue>, forwarder: F) -> Self {
		let initial = source.current();
		tracing::debug!(?initial, "connectivity monitor created");
		Self {
			source,
			queue,
			forwarder,
			online: StatusHandle(Arc::new(AtomicBool::new(initial.is_online()))),
			subscription: None,
		}
	}

	pub fn status(&self) -> Connectivity {
		self.online.connectivity()
	}

	pub fn status_handle(&self) -> StatusHandle {
		self.online.clone()
	}

	pub fn queue(&self) -> &Arc<OfflineQueue> {
		&self.queue
	}

	pub fn is_listening(&self) -> bool {
		self.subscription.is_some()
	}

	/// Registers the transition listeners. Returns `false` if already listening.
	pub fn start(&mut self) -> bool {
		if self.subscription.is_some() {
			return false;
		}
		self.subscription = Some(self.source.subscribe());
		true
	}

	/// Removes the transition listeners. Returns `false` if not listening.
	pub fn stop(&mut self) -> bool {
		self.subscription.take().is_some()
	}

	/// Handles an offline→online transition: marks the monitor online and
	/// drains the queue.
	///
	/// Returns `None` without draining if the monitor was already online.
	pub async fn on_online(&self) -> Option<Result<DrainReport, StorageFault>> {
		if self.online.0.swap(true, Ordering::SeqCst) {
			return None;
		}
		tracing::info!("connectivity restored");

		let result = self.queue.drain_and_sync(&self.forwarder).await;
		if let Err(e) = &result {
			tracing::error!(error = %e, "could not read offline queue");
		}
		Some(result)
	}

	/// Handles an online→offline transition. Returns `false` if the monitor
	/// was already offline.
	pub fn on_offline(&self) -> bool {
		let was_online = self.online.0.swap(false, Ordering::SeqCst);
		if was_online {
			tracing::info!("connectivity lost, submissions will be queued");
		}
		was_online
	}

	/// Waits for the next signal that changes status and dispatches it.
	///
	/// Repeated signals for the current status are swallowed. Returns `None`
	/// when not listening or when the source stops emitting.
	pub async fn next_transition(&mut self) -> Option<Transition> {
		loop {
			let signal = self.subscription.as_mut()?.next().await?;
			match signal {
				Connectivity::Online => {
					if let Some(result) = self.on_online().await {
						return Some(Transition::Online(result));
					}
				}
				Connectivity::Offline => {
					if self.on_offline() {
						return Some(Transition::Offline);
					}
				}
			}
		}
	}

	/// Dispatches transitions until the source stops emitting or the monitor
	/// is not listening.
	pub async fn run(&mut self) {
		while self.next_transition().await.is_some() {}
		tracing::debug!("connectivity monitor stopped");
	}
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
	use super::*;
	use crate::{forward_fn, ConnectivitySwitch, MemoryStore, Payload};
	use serde_json::json;
	use std::sync::atomic::AtomicUsize;

	fn queue() -> Arc<OfflineQueue> {
		Arc::new(OfflineQueue::new(MemoryStore::new()))
	}

	#[tokio::test]
	async fn test_initial_status_read_from_source() {
		let offline = ConnectivitySwitch::new(Connectivity::Offline);
		let monitor = ConnectivityMonitor::new(offline, queue(), forward_fn(|_p: Payload| async { Ok(()) }));
		assert_eq!(monitor.status(), Connectivity::Offline);
		assert!(!monitor.status_handle().is_online());

		let online = ConnectivitySwitch::new(Connectivity::Online);
		let monitor = ConnectivityMonitor::new(online, queue(), forward_fn(|_p: Payload| async { Ok(()) }));
		assert_eq!(monitor.status(), Connectivity::Online);
	}

	#[tokio::test]
	async fn test_start_registers_once_and_stop_unregisters() {
		let switch = ConnectivitySwitch::new(Connectivity::Online);
		let mut monitor =
			ConnectivityMonitor::new(switch.clone(), queue(), forward_fn(|_p: Payload| async { Ok(()) }));
		assert_eq!(switch.listener_count(), 0);
		assert!(!monitor.is_listening());

		assert!(monitor.start());
		assert!(!monitor.start());
		assert!(monitor.is_listening());
		assert_eq!(switch.listener_count(), 1);

		assert!(monitor.stop());
		assert!(!monitor.stop());
		assert!(!monitor.is_listening());
		assert_eq!(switch.listener_count(), 0);
	}

	#[tokio::test]
	async fn test_drop_unregisters() {
		let switch = ConnectivitySwitch::new(Connectivity::Online);
		{
			let mut monitor =
				ConnectivityMonitor::new(switch.clone(), queue(), forward_fn(|_p: Payload| async { Ok(()) }));
			monitor.start();
			assert_eq!(switch.listener_count(), 1);
		}
		assert_eq!(switch.listener_count(), 0);
	}

	#[tokio::test]
	async fn test_repeated_signals_dispatch_once() {
		let switch = ConnectivitySwitch::new(Connectivity::Offline);
		let q = queue();
		q.enqueue(json!({"n": 1}).as_object().cloned().unwrap()).unwrap();

		let forwards = Arc::new(AtomicUsize::new(0));
		let counter = forwards.clone();
		let forwarder = forward_fn(move |_p: Payload| {
			counter.fetch_add(1, Ordering::SeqCst);
			async { Err(crate::TransportFault::Other("still flaky".into())) }
		});
		let mut monitor = ConnectivityMonitor::new(switch.clone(), q, forwarder);
		monitor.start();

		switch.set(Connectivity::Offline);
		switch.set(Connectivity::Online);
		switch.set(Connectivity::Online);
		switch.set(Connectivity::Offline);

		match monitor.next_transition().await {
			Some(Transition::Online(Ok(report))) => assert_eq!(report.retained().len(), 1),
			other => panic!("expected online transition, got {:?}", other),
		}
		assert!(matches!(monitor.next_transition().await, Some(Transition::Offline)));
		assert_eq!(forwards.load(Ordering::SeqCst), 1, "second online signal must not drain");
	}

	#[tokio::test]
	async fn test_offline_has_no_side_effects() {
		let q = queue();
		let record = q.enqueue(Payload::new()).unwrap();
		let monitor = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Online),
			q.clone(),
			forward_fn(|_p: Payload| async { Ok(()) }),
		);

		assert!(monitor.on_offline());
		assert!(!monitor.on_offline());
		assert!(Arc::ptr_eq(monitor.queue(), &q));
		assert_eq!(monitor.queue().list_all().unwrap(), vec![record]);
	}

	#[tokio::test]
	async fn test_not_listening_yields_nothing() {
		let mut monitor = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Offline),
			queue(),
			forward_fn(|_p: Payload| async { Ok(()) }),
		);
		assert!(monitor.next_transition().await.is_none());
		monitor.run().await;
	}
}
