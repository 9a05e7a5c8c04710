use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

/// Reported network status of the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
	Online,
	Offline,
}

impl Connectivity {
	pub fn from_online(online: bool) -> Self {
		if online {
			Connectivity::Online
		} else {
			Connectivity::Offline
		}
	}

	pub fn is_online(self) -> bool {
		self == Connectivity::Online
	}
}

/// The environment's connectivity signal.
///
/// `current` is read once when a monitor is built. `subscribe` registers the
/// transition listeners; they stay registered for as long as the returned
/// subscription lives and are removed when it is dropped.
pub trait ConnectivitySource {
	type Subscription: Stream<Item = Connectivity> + Unpin;

	fn current(&self) -> Connectivity;

	fn subscribe(&self) -> Self::Subscription;
}

struct SwitchState {
	current: Connectivity,
	listeners: Vec<UnboundedSender<Connectivity>>,
}

/// A connectivity source driven by hand.
///
/// For hosts that learn about the network from their own checks, and for tests.
/// Clones share state: flipping one flips them all.
#[derive(Clone)]
pub struct ConnectivitySwitch {
	inner: Arc<Mutex<SwitchState>>,
}

impl ConnectivitySwitch {
	pub fn new(initial: Connectivity) -> Self {
		Self {
			inner: Arc::new(Mutex::new(SwitchState {
				current: initial,
				listeners: Vec::new(),
			})),
		}
	}

	/// Reports a connectivity signal to every live subscription.
	pub fn set(&self, connectivity: Connectivity) {
		let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
		state.current = connectivity;
		state
			.listeners
			.retain(|tx| tx.unbounded_send(connectivity).is_ok());
	}

	/// Number of subscriptions still registered.
	pub fn listener_count(&self) -> usize {
		let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
		state.listeners.retain(|tx| !tx.is_closed());
		state.listeners.len()
	}
}

impl ConnectivitySource for ConnectivitySwitch {
	type Subscription = SwitchSubscription;

	fn current(&self) -> Connectivity {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.current
	}

	fn subscribe(&self) -> SwitchSubscription {
		let (tx, rx) = unbounded();
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.listeners
			.push(tx);
		SwitchSubscription { rx }
	}
}

/// Signals from a [`ConnectivitySwitch`]. Dropping it unregisters the listener.
pub struct SwitchSubscription {
	rx: UnboundedReceiver<Connectivity>,
}

impl Stream for SwitchSubscription {
	type Item = Connectivity;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		Pin::new(&mut self.rx).poll_next(cx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::executor::block_on;
	use futures::StreamExt;

	#[test]
	fn test_current_reflects_last_set() {
		let switch = ConnectivitySwitch::new(Connectivity::Offline);
		assert_eq!(switch.current(), Connectivity::Offline);

		switch.set(Connectivity::Online);
		assert_eq!(switch.current(), Connectivity::Online);
		assert_eq!(switch.clone().current(), Connectivity::Online);
	}

	#[test]
	fn test_subscription_receives_signals() {
		let switch = ConnectivitySwitch::new(Connectivity::Online);
		let mut sub = switch.subscribe();

		switch.set(Connectivity::Offline);
		switch.set(Connectivity::Online);

		assert_eq!(block_on(sub.next()), Some(Connectivity::Offline));
		assert_eq!(block_on(sub.next()), Some(Connectivity::Online));
	}

	#[test]
	fn test_drop_unregisters_listener() {
		let switch = ConnectivitySwitch::new(Connectivity::Online);
		let sub = switch.subscribe();
		assert_eq!(switch.listener_count(), 1);

		drop(sub);
		assert_eq!(switch.listener_count(), 0);
	}
}
