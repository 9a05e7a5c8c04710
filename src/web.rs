//! Browser support: IndexedDB-backed queue storage and `online`/`offline` events
//!
//! [`WebStore`] is a DataStore for WASM targets that:
//! - Uses an in-memory map as the source of truth for sync operations
//! - Persists to IndexedDB via background async writes whose outcome
//!   [`DataStore::confirm`] reports
//! - Refuses new records when IndexedDB is unavailable
//! - Hydrates from IndexedDB on initialization
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       WebStore                           │
//! │                                                          │
//! │  enqueue() ──► BTreeMap ──► spawn_local() ──► IndexedDB  │
//! │                  │                 │                     │
//! │  list_all() ◄────┘   confirm() ◄───┘ (write outcome)     │
//! │                                                          │
//! │  On init: IndexedDB ──► hydrate ──► BTreeMap            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`BrowserConnectivity`] reads `navigator.onLine` and turns the window's
//! `online`/`offline` events into a stream for the connectivity monitor.

use crate::{
	Connectivity, ConnectivitySource, DataStore, Payload, PersistFuture, QueuedRecord, RecordId,
	StorageFault,
};
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::channel::oneshot;
use futures::Stream;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{IdbDatabase, IdbRequest};

const DB_VERSION: u32 = 1;
const STORE_NAME: &str = "medicalForms";
const META_STORE: &str = "meta";
const NEXT_ID_KEY: &str = "next_id";

/// Configuration for the web-based data store.
#[derive(Clone, Debug)]
pub struct WebConfig {
	/// Name of the IndexedDB database.
	/// Different queues should use different database names to avoid collisions.
	pub database_name: String,
}

/// Indicates the persistence state of the WebStore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceState {
	/// IndexedDB is available and working. Records persist across page refreshes.
	Persisted,
	/// IndexedDB is unavailable (private browsing, blocked by browser policy, etc).
	/// Records hydrated earlier stay readable, but new records are refused
	/// because they would be lost on page refresh.
	MemoryOnly,
}

/// A browser-based data store using IndexedDB for persistence.
///
/// Records live in an in-memory map for synchronous access, with asynchronous
/// writes to IndexedDB so they survive page refreshes. `enqueue` starts the
/// write and returns; [`DataStore::confirm`] resolves with its outcome, which
/// is what [`OfflineQueue::enqueue_durable`](crate::OfflineQueue::enqueue_durable)
/// waits on. The next id is persisted alongside the records so ids are not
/// reused after a reload.
///
/// If IndexedDB is unavailable `enqueue` fails with
/// [`StorageFault::Unavailable`]; [`persistence_state()`](Self::persistence_state)
/// tells hosts up front.
pub struct WebStore {
	/// In-memory records - this is the source of truth for sync operations
	items: BTreeMap<RecordId, QueuedRecord>,
	/// IndexedDB database handle (None if unavailable/blocked)
	db: Option<Rc<IdbDatabase>>,
	next_id: u64,
	persistence_state: PersistenceState,
	/// Outcomes of record writes nobody has confirmed yet
	pending: HashMap<RecordId, oneshot::Receiver<Result<(), StorageFault>>>,
}

impl WebStore {
	/// Creates a new WebStore with IndexedDB persistence.
	///
	/// Opens (or creates) the database and hydrates in-memory state from any
	/// previously persisted records. Falls back to memory-only mode with a
	/// warning if IndexedDB cannot be opened.
	pub async fn new(config: WebConfig) -> Self {
		let mut store = Self {
			items: BTreeMap::new(),
			db: None,
			next_id: 0,
			persistence_state: PersistenceState::MemoryOnly,
			pending: HashMap::new(),
		};

		match Self::open_database(&config.database_name).await {
			Ok(db) => {
				store.db = Some(Rc::new(db));
				store.persistence_state = PersistenceState::Persisted;

				if let Err(e) = store.hydrate().await {
					tracing::warn!(error = %e, "failed to hydrate from IndexedDB, starting fresh");
				}
			}
			Err(e) => {
				tracing::warn!(
					error = %e,
					"IndexedDB unavailable, offline submissions will be refused"
				);
			}
		}

		store
	}

	/// Returns the current persistence state of the store.
	pub fn persistence_state(&self) -> PersistenceState {
		self.persistence_state
	}

	/// Returns `true` if IndexedDB persistence is available.
	pub fn is_persisted(&self) -> bool {
		self.persistence_state == PersistenceState::Persisted
	}

	/// Opens or creates the IndexedDB database
	async fn open_database(name: &str) -> Result<IdbDatabase, StorageFault> {
		let window = web_sys::window().ok_or_else(|| unavailable("no window object"))?;

		let idb_factory = window
			.indexed_db()
			.map_err(|e| unavailable(format!("IndexedDB error: {:?}", e)))?
			.ok_or_else(|| unavailable("IndexedDB not available"))?;

		let open_request = idb_factory
			.open_with_f64(name, DB_VERSION as f64)
			.map_err(|e| unavailable(format!("failed to open DB: {:?}", e)))?;

		// Set up upgrade handler for first-time creation
		let on_upgrade = Closure::once(move |event: web_sys::IdbVersionChangeEvent| {
			let Some(db) = event
				.target()
				.and_then(|target| target.unchecked_into::<IdbRequest>().result().ok())
				.map(|result| result.unchecked_into::<IdbDatabase>())
			else {
				tracing::error!("upgrade event without a database");
				return;
			};

			if !db.object_store_names().contains(STORE_NAME) {
				let params = web_sys::IdbObjectStoreParameters::new();
				params.set_key_path(&JsValue::from_str("id"));
				if let Err(e) = db.create_object_store_with_optional_parameters(STORE_NAME, &params) {
					tracing::error!(error = ?e, "failed to create record store");
				}
			}
			if !db.object_store_names().contains(META_STORE) {
				if let Err(e) = db.create_object_store(META_STORE) {
					tracing::error!(error = ?e, "failed to create meta store");
				}
			}
		});
		open_request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
		on_upgrade.forget(); // Prevent closure from being dropped

		Self::await_request::<IdbDatabase>(&open_request).await
	}

	/// Loads all existing records and the id counter from IndexedDB into memory
	async fn hydrate(&mut self) -> Result<(), StorageFault> {
		let db = match &self.db {
			Some(db) => db.clone(),
			None => return Ok(()),
		};

		let transaction = db
			.transaction_with_str_sequence(&js_sys::Array::of2(
				&JsValue::from_str(STORE_NAME),
				&JsValue::from_str(META_STORE),
			))
			.map_err(|e| unavailable(format!("transaction error: {:?}", e)))?;

		let records = transaction
			.object_store(STORE_NAME)
			.and_then(|store| store.get_all())
			.map_err(|e| unavailable(format!("getAll error: {:?}", e)))?;
		let next_id = transaction
			.object_store(META_STORE)
			.and_then(|store| store.get(&JsValue::from_str(NEXT_ID_KEY)))
			.map_err(|e| unavailable(format!("get error: {:?}", e)))?;

		let records = Self::await_request::<JsValue>(&records).await?;
		let next_id = Self::await_request::<JsValue>(&next_id).await?;

		if let Ok(array) = records.dyn_into::<js_sys::Array>() {
			for item in array.iter() {
				match from_js::<QueuedRecord>(&item) {
					Ok(record) => {
						self.items.insert(record.id, record);
					}
					Err(e) => tracing::warn!(error = %e, "skipping unreadable record"),
				}
			}
		}

		let persisted_next = next_id.as_f64().map(|n| n as u64).unwrap_or(0);
		let past_highest = self.items.keys().next_back().map(|id| id.0 + 1).unwrap_or(0);
		self.next_id = persisted_next.max(past_highest);

		Ok(())
	}

	/// Background write of a record and the id counter. The receiver yields
	/// the outcome.
	fn persist(
		db: Rc<IdbDatabase>,
		id: RecordId,
		value: JsValue,
		next_id: u64,
	) -> oneshot::Receiver<Result<(), StorageFault>> {
		let (done, outcome) = oneshot::channel();

		spawn_local(async move {
			let result = Self::write_to_idb(&db, &value, next_id).await;
			if let Err(e) = &result {
				tracing::warn!(record_id = %id, error = %e, "IndexedDB write failed");
			}
			let _ = done.send(result);
		});

		outcome
	}

	async fn write_to_idb(db: &IdbDatabase, value: &JsValue, next_id: u64) -> Result<(), StorageFault> {
		let transaction = db
			.transaction_with_str_sequence_and_mode(
				&js_sys::Array::of2(&JsValue::from_str(STORE_NAME), &JsValue::from_str(META_STORE)),
				web_sys::IdbTransactionMode::Readwrite,
			)
			.map_err(|e| unavailable(format!("transaction error: {:?}", e)))?;

		let meta = transaction
			.object_store(META_STORE)
			.and_then(|store| {
				store.put_with_key(&JsValue::from_f64(next_id as f64), &JsValue::from_str(NEXT_ID_KEY))
			})
			.map_err(|e| unavailable(format!("put error: {:?}", e)))?;
		let add = transaction
			.object_store(STORE_NAME)
			.and_then(|store| store.put(value))
			.map_err(|e| unavailable(format!("put error: {:?}", e)))?;

		Self::await_request::<JsValue>(&meta).await?;
		Self::await_request::<JsValue>(&add).await?;
		Ok(())
	}

	/// Fire-and-forget delete from IndexedDB
	fn remove_from_idb(&self, id: RecordId) {
		let Some(db) = &self.db else { return };
		let db = db.clone();

		spawn_local(async move {
			if let Err(e) = Self::delete_from_idb(&db, id).await {
				tracing::warn!(record_id = %id, error = %e, "IndexedDB delete failed");
			}
		});
	}

	async fn delete_from_idb(db: &IdbDatabase, id: RecordId) -> Result<(), StorageFault> {
		let transaction = db
			.transaction_with_str_and_mode(STORE_NAME, web_sys::IdbTransactionMode::Readwrite)
			.map_err(|e| unavailable(format!("transaction error: {:?}", e)))?;

		let request = transaction
			.object_store(STORE_NAME)
			.and_then(|store| store.delete(&JsValue::from_f64(id.0 as f64)))
			.map_err(|e| unavailable(format!("delete error: {:?}", e)))?;

		Self::await_request::<JsValue>(&request).await?;
		Ok(())
	}

	/// Helper to await an IdbRequest and extract the result
	async fn await_request<T: JsCast>(request: &IdbRequest) -> Result<T, StorageFault> {
		let (sender, receiver) = oneshot::channel();
		let sender = Rc::new(RefCell::new(Some(sender)));

		let success_sender = sender.clone();
		let onsuccess = Closure::once(move |_event: web_sys::Event| {
			if let Some(sender) = success_sender.borrow_mut().take() {
				let _ = sender.send(Ok(()));
			}
		});

		let error_sender = sender.clone();
		let onerror = Closure::once(move |_event: web_sys::Event| {
			if let Some(sender) = error_sender.borrow_mut().take() {
				let _ = sender.send(Err(unavailable("IndexedDB request failed")));
			}
		});

		request.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
		request.set_onerror(Some(onerror.as_ref().unchecked_ref()));

		onsuccess.forget();
		onerror.forget();

		receiver
			.await
			.map_err(|_| unavailable("channel closed"))??;

		request
			.result()
			.map_err(|e| unavailable(format!("result error: {:?}", e)))?
			.dyn_into::<T>()
			.map_err(|_| unavailable("type cast failed"))
	}
}

fn unavailable(msg: impl Into<String>) -> StorageFault {
	StorageFault::Unavailable(msg.into())
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, StorageFault> {
	let json = serde_json::to_string(value)?;
	js_sys::JSON::parse(&json).map_err(|e| unavailable(format!("JS JSON parse error: {:?}", e)))
}

fn from_js<T: serde::de::DeserializeOwned>(value: &JsValue) -> Result<T, StorageFault> {
	let json = js_sys::JSON::stringify(value)
		.ok()
		.and_then(|s| s.as_string())
		.ok_or_else(|| unavailable("value is not JSON-serializable"))?;
	Ok(serde_json::from_str(&json)?)
}

impl DataStore for WebStore {
	fn has_data(&self) -> bool {
		!self.items.is_empty()
	}

	fn reset(&mut self) -> Result<(), StorageFault> {
		let ids: Vec<RecordId> = self.items.keys().copied().collect();
		self.items.clear();
		self.pending.clear();
		for id in ids {
			self.remove_from_idb(id);
		}
		Ok(())
	}

	fn enqueue(&mut self, payload: Payload) -> Result<QueuedRecord, StorageFault> {
		let db = self
			.db
			.clone()
			.ok_or_else(|| unavailable("IndexedDB unavailable, record would not survive a refresh"))?;

		let record = QueuedRecord::new(RecordId(self.next_id), payload);
		let value = to_js(&record)?;
		self.next_id += 1;

		let outcome = Self::persist(db, record.id, value, self.next_id);
		self.pending.insert(record.id, outcome);
		self.items.insert(record.id, record.clone());
		Ok(record)
	}

	fn list_all(&mut self) -> Result<Vec<QueuedRecord>, StorageFault> {
		Ok(self.items.values().cloned().collect())
	}

	fn remove(&mut self, id: RecordId) -> Result<(), StorageFault> {
		self.pending.remove(&id);
		if self.items.remove(&id).is_some() {
			self.remove_from_idb(id);
		}
		Ok(())
	}

	fn confirm(&mut self, id: RecordId) -> PersistFuture {
		let outcome = self.pending.remove(&id);
		Box::pin(async move {
			match outcome {
				Some(outcome) => outcome
					.await
					.map_err(|_| unavailable("IndexedDB write abandoned"))?,
				None => Ok(()),
			}
		})
	}
}

/// The browser's connectivity signal.
#[derive(Clone)]
pub struct BrowserConnectivity {
	window: web_sys::Window,
}

impl BrowserConnectivity {
	/// Returns `None` outside a window context (e.g. in a worker).
	pub fn new() -> Option<Self> {
		web_sys::window().map(|window| Self { window })
	}
}

impl ConnectivitySource for BrowserConnectivity {
	type Subscription = BrowserSubscription;

	fn current(&self) -> Connectivity {
		Connectivity::from_online(self.window.navigator().on_line())
	}

	fn subscribe(&self) -> BrowserSubscription {
		let (tx, rx) = unbounded();

		let online_tx = tx.clone();
		let on_online = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
			let _ = online_tx.unbounded_send(Connectivity::Online);
		});
		let on_offline = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
			let _ = tx.unbounded_send(Connectivity::Offline);
		});

		for (event, callback) in [("online", &on_online), ("offline", &on_offline)] {
			if let Err(e) = self
				.window
				.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
			{
				tracing::warn!(event, error = ?e, "failed to register connectivity listener");
			}
		}

		BrowserSubscription {
			window: self.window.clone(),
			on_online,
			on_offline,
			rx,
		}
	}
}

/// Window `online`/`offline` events. Dropping it removes both listeners.
pub struct BrowserSubscription {
	window: web_sys::Window,
	on_online: Closure<dyn FnMut(web_sys::Event)>,
	on_offline: Closure<dyn FnMut(web_sys::Event)>,
	rx: UnboundedReceiver<Connectivity>,
}

impl Stream for BrowserSubscription {
	type Item = Connectivity;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		Pin::new(&mut self.rx).poll_next(cx)
	}
}

impl Drop for BrowserSubscription {
	fn drop(&mut self) {
		for (event, callback) in [("online", &self.on_online), ("offline", &self.on_offline)] {
			let _ = self
				.window
				.remove_event_listener_with_callback(event, callback.as_ref().unchecked_ref());
		}
	}
}
