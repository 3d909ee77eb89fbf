//! Realtime mirror of a store query.
//!
//! A [`Feed`] owns one store listener. Every snapshot the store pushes is
//! decoded and sorted in full (no incremental merge) and handed to the
//! subscriber's `on_update`, in order, from the feed's own task.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::models::{decode_all, Record};
use crate::store::{DocumentStore, Query};

type UpdateFn<T> = Box<dyn FnMut(Vec<T>) + Send>;
type ErrorFn = Box<dyn FnOnce(AppError) + Send>;

struct Subscriber<T> {
    on_update: UpdateFn<T>,
    on_error: ErrorFn,
}

type Slot<T> = Arc<Mutex<Option<Subscriber<T>>>>;

/// Handle to a live subscription; cancelling it is the only way to stop one.
///
/// `cancel` is idempotent and once it returns no callback runs again.
/// Dropping the handle cancels too. Callbacks run while the feed holds its
/// subscriber lock, so a callback must not cancel its own feed.
pub struct Feed<T: Record> {
    slot: Slot<T>,
    task: JoinHandle<()>,
    collection: &'static str,
}

impl<T: Record> Feed<T> {
    pub fn subscribe<U, E>(store: Arc<dyn DocumentStore>, query: Query, on_update: U, on_error: E) -> Self
    where
        U: FnMut(Vec<T>) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        debug_assert_eq!(query.collection, T::COLLECTION);

        let slot: Slot<T> = Arc::new(Mutex::new(Some(Subscriber {
            on_update: Box::new(on_update),
            on_error: Box::new(on_error),
        })));

        tracing::info!(collection = T::COLLECTION, filters = query.filters.len(), "feed opened");

        let mut listener = store.listen(query);
        let task_slot = Arc::clone(&slot);
        let task = tokio::spawn(async move {
            while let Some(snapshot) = listener.next().await {
                let mut guard = task_slot.lock().unwrap_or_else(PoisonError::into_inner);

                match snapshot.and_then(decode_all::<T>) {
                    Ok(records) => match guard.as_mut() {
                        Some(subscriber) => (subscriber.on_update)(records),
                        None => return,
                    },
                    Err(e) => {
                        tracing::error!(collection = T::COLLECTION, error = %e, "feed failed");
                        // Taking the subscriber guarantees on_error fires once
                        // and nothing fires after it.
                        if let Some(subscriber) = guard.take() {
                            (subscriber.on_error)(AppError::Subscription(e.to_string()));
                        }
                        return;
                    }
                }
            }
        });

        Self {
            slot,
            task,
            collection: T::COLLECTION,
        }
    }

    pub fn cancel(&self) {
        let detached = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.task.abort();
        if detached.is_some() {
            tracing::info!(collection = self.collection, "feed closed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

impl<T: Record> Drop for Feed<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
