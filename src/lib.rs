mod config;
mod connectivity;
mod directory;
mod error;
mod forward;
mod intake;
mod memory;
mod monitor;
mod queue;
mod record;
mod submit;

#[cfg(feature = "web")]
mod web;

pub use config::SyncConfig;
pub use connectivity::{Connectivity, ConnectivitySource, ConnectivitySwitch, SwitchSubscription};
pub use directory::{DirectoryConfig, DirectoryStore};
pub use error::{ConfigError, StorageFault, SubmitError, TransportFault};
pub use forward::{forward_fn, FnForwarder, Forwarder, HttpForwarder};
pub use intake::{bmi, sanitize_name, sanitize_phone, IntakeForm, KNOWN_DISEASES};
pub use memory::MemoryStore;
pub use monitor::{ConnectivityMonitor, StatusHandle, Transition};
pub use queue::{DrainOutcome, DrainReport, OfflineQueue};
pub use record::{Payload, QueuedRecord, RecordId};
pub use submit::{SubmissionOutcome, Submitter};

// MaybeSend trait - allows Send bound on native, but is a no-op on WASM
// since WASM is single-threaded and doesn't need Send.
//
// This lets WebStore (which holds Rc<IdbDatabase>) sit behind OfflineQueue
// on WASM targets while native targets keep requiring Send.

/// A trait that requires `Send` on native targets but is automatically
/// implemented for all types on WASM targets.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> MaybeSend for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSend for T {}

/// Resolves once a record returned by [`DataStore::enqueue`] is durably stored.
#[cfg(not(target_arch = "wasm32"))]
pub type PersistFuture = futures::future::BoxFuture<'static, Result<(), StorageFault>>;

/// Resolves once a record returned by [`DataStore::enqueue`] is durably stored.
#[cfg(target_arch = "wasm32")]
pub type PersistFuture = futures::future::LocalBoxFuture<'static, Result<(), StorageFault>>;

#[cfg(feature = "web")]
pub use web::{BrowserConnectivity, BrowserSubscription, PersistenceState, WebConfig, WebStore};

/// A keyed local record store backing the offline queue.
///
/// Implementations own record storage outright: they assign ids, stamp capture
/// times and keep every record until it is explicitly removed. Each operation
/// must be atomic on its own; callers never get a half-written record back.
///
/// This trait requires `MaybeSend`, which means:
/// - On native targets: implementations must be `Send` (thread-safe)
/// - On WASM targets: no restrictions (single-threaded environment)
pub trait DataStore: MaybeSend {
	/// Checks if the store holds any queued record.
	fn has_data(&self) -> bool;

	/// Removes every record. Id assignment is not rewound.
	fn reset(&mut self) -> Result<(), StorageFault>;

	/// Inserts a new record with a store-generated id and the current time.
	///
	/// Never rejects a payload on its contents; fails only if the medium does.
	fn enqueue(&mut self, payload: Payload) -> Result<QueuedRecord, StorageFault>;

	/// Returns a snapshot of all queued records, ordered by id.
	///
	/// Takes `&mut self` so a backend can forget records it finds missing
	/// from its medium while reading.
	fn list_all(&mut self) -> Result<Vec<QueuedRecord>, StorageFault>;

	/// Deletes a record. Removing an id that is not present is not an error.
	fn remove(&mut self, id: RecordId) -> Result<(), StorageFault>;

	/// Waits until the record `enqueue` returned under `id` has reached the
	/// medium.
	///
	/// Backends that write before `enqueue` returns are done already, which is
	/// the default. Backends that persist in the background report the outcome
	/// of that write here.
	fn confirm(&mut self, _id: RecordId) -> PersistFuture {
		Box::pin(futures::future::ready(Ok(())))
	}
}
