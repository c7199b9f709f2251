use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::{ApiError, CustomerService, PageSize};
use crate::models::{Attachment, Customer, CustomerDraft, CustomerId, CustomerKey};

/// Everything the cache knows for the current session.
#[derive(Debug, Default)]
struct FetchState {
    /// A full load has succeeded at least once this session
    initialized: bool,
    /// A full load is currently awaiting the service
    load_in_flight: bool,
    customers: Vec<Customer>,
    loaded_at: Option<DateTime<Utc>>,
    /// Bumped on reset so loads started before it are discarded
    generation: u64,
}

impl FetchState {
    fn position(&self, id: CustomerId) -> Option<usize> {
        self.customers.iter().position(|c| c.id == id)
    }

    /// Replace the entry with the same id, or append.
    fn upsert(&mut self, customer: Customer) {
        match self.position(customer.id) {
            Some(idx) => self.customers[idx] = customer,
            None => self.customers.push(customer),
        }
    }
}

/// Clears the in-flight flag when a load finishes, fails, or is dropped.
struct LoadGuard<'a> {
    state: &'a Mutex<FetchState>,
    generation: u64,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.generation {
            state.load_in_flight = false;
        }
    }
}

/// Customer collection for one UI session.
///
/// Create one per session and hand it to whatever needs customer data;
/// call [`reset`](Self::reset) when the session ends. The state lock is
/// never held across an `.await`, so every mutation is applied as one
/// step and readers always see a consistent collection.
pub struct CustomerCache<S> {
    service: S,
    state: Mutex<FetchState>,
}

impl<S: CustomerService> CustomerCache<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: Mutex::new(FetchState::default()),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn lock(&self) -> MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(key: &impl CustomerKey) -> Result<CustomerId, ApiError> {
        key.to_customer_id()
            .ok_or_else(|| ApiError::InvalidId(key.to_string()))
    }

    // ===== Loading =====

    /// Load the full collection.
    ///
    /// Returns the cached collection without a network call once a load has
    /// succeeded, unless `force` is set. While another load is in flight the
    /// current snapshot is returned immediately instead of starting a second
    /// request; callers are not blocked and do not receive the eventual result.
    pub async fn load_all(&self, force: bool) -> Result<Vec<Customer>, ApiError> {
        let generation = {
            let mut state = self.lock();
            if state.initialized && !force {
                debug!(count = state.customers.len(), "Customer cache hit");
                return Ok(state.customers.clone());
            }
            if state.load_in_flight {
                debug!(
                    count = state.customers.len(),
                    "Customer load already in flight, returning current snapshot"
                );
                return Ok(state.customers.clone());
            }
            state.load_in_flight = true;
            state.generation
        };
        let _guard = LoadGuard {
            state: &self.state,
            generation,
        };

        info!(force, "Loading all customers");
        let customers = match self.service.list(PageSize::All).await {
            Ok(customers) => customers,
            Err(e) => {
                warn!(error = %e, "Failed to load customers");
                return Err(e);
            }
        };

        let mut state = self.lock();
        if state.generation != generation {
            debug!("Session reset during load, discarding result");
            return Ok(state.customers.clone());
        }
        state.customers = dedupe_by_id(customers);
        state.initialized = true;
        state.loaded_at = Some(Utc::now());
        info!(count = state.customers.len(), "Customer cache loaded");
        Ok(state.customers.clone())
    }

    /// Forced reload of the full collection
    pub async fn refresh(&self) -> Result<Vec<Customer>, ApiError> {
        self.load_all(true).await
    }

    // ===== Reads =====

    /// Read-through lookup: cached entry if present, otherwise fetched and stored.
    pub async fn get_by_id(&self, key: impl CustomerKey) -> Result<Customer, ApiError> {
        let id = Self::resolve(&key)?;
        if let Some(customer) = self.get_cached(id) {
            debug!(customer_id = %id, "Customer cache hit");
            return Ok(customer);
        }

        debug!(customer_id = %id, "Customer cache miss, fetching");
        let customer = self.service.get(id).await?;
        self.lock().upsert(customer.clone());
        Ok(customer)
    }

    /// Cached entry only, never touches the network
    pub fn get_cached(&self, key: impl CustomerKey) -> Option<Customer> {
        let id = key.to_customer_id()?;
        let state = self.lock();
        state.position(id).map(|idx| state.customers[idx].clone())
    }

    /// Copy of the current collection
    pub fn snapshot(&self) -> Vec<Customer> {
        self.lock().customers.clone()
    }

    /// Borrow the current collection without cloning it.
    /// `f` runs under the state lock and must not block.
    pub fn read<R>(&self, f: impl FnOnce(&[Customer]) -> R) -> R {
        f(&self.lock().customers)
    }

    pub fn len(&self) -> usize {
        self.lock().customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().customers.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn is_loading(&self) -> bool {
        self.lock().load_in_flight
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.lock().loaded_at
    }

    /// "Last updated" text for the status bar
    pub fn age_display(&self) -> String {
        match self.loaded_at() {
            Some(at) => format_age((Utc::now() - at).num_minutes()),
            None => "never".to_string(),
        }
    }

    // ===== Mutations =====

    /// Create a customer, optionally uploading an attachment.
    ///
    /// With an attachment the record is re-fetched after the upload so the
    /// stored copy carries server-derived fields such as the image URL.
    pub async fn add(
        &self,
        draft: &CustomerDraft,
        attachment: Option<&Attachment>,
    ) -> Result<Customer, ApiError> {
        let created = self.service.create(draft).await?;
        let customer = match attachment {
            Some(file) => {
                self.service.upload_attachment(created.id, file).await?;
                self.service.get(created.id).await?
            }
            None => created,
        };

        self.lock().upsert(customer.clone());
        info!(customer_id = %customer.id, "Customer added");
        Ok(customer)
    }

    /// Update a customer, optionally replacing its attachment.
    ///
    /// The canonical record is always re-fetched before the cached entry is
    /// replaced; nothing is written locally if any step fails.
    pub async fn edit(
        &self,
        key: impl CustomerKey,
        draft: &CustomerDraft,
        attachment: Option<&Attachment>,
    ) -> Result<Customer, ApiError> {
        let id = Self::resolve(&key)?;
        self.service.update(id, draft).await?;
        if let Some(file) = attachment {
            self.service.upload_attachment(id, file).await?;
        }
        let customer = self.service.get(id).await?;

        self.lock().upsert(customer.clone());
        info!(customer_id = %id, "Customer updated");
        Ok(customer)
    }

    pub async fn remove(&self, key: impl CustomerKey) -> Result<(), ApiError> {
        let id = Self::resolve(&key)?;
        self.service.delete(id).await?;

        self.lock().customers.retain(|c| c.id != id);
        info!(customer_id = %id, "Customer removed");
        Ok(())
    }

    /// Delete the remote attachment and clear the cached image reference
    pub async fn remove_attachment(&self, key: impl CustomerKey) -> Result<(), ApiError> {
        let id = Self::resolve(&key)?;
        self.service.delete_attachment(id).await?;

        let mut state = self.lock();
        if let Some(idx) = state.position(id) {
            state.customers[idx].image_url = None;
        }
        info!(customer_id = %id, "Customer image removed");
        Ok(())
    }

    // ===== Lifecycle =====

    /// End the session: drop the collection and all flags.
    /// A load still in flight will not repopulate the cleared cache.
    pub fn reset(&self) {
        let mut state = self.lock();
        let generation = state.generation.wrapping_add(1);
        *state = FetchState {
            generation,
            ..FetchState::default()
        };
        info!("Customer cache reset");
    }
}

/// Keep one entry per id; a later duplicate replaces the earlier one in place.
fn dedupe_by_id(customers: Vec<Customer>) -> Vec<Customer> {
    let mut seen: HashMap<CustomerId, usize> = HashMap::with_capacity(customers.len());
    let mut out: Vec<Customer> = Vec::with_capacity(customers.len());
    for customer in customers {
        match seen.get(&customer.id) {
            Some(&idx) => {
                warn!(customer_id = %customer.id, "Duplicate customer id in list response");
                out[idx] = customer;
            }
            None => {
                seen.insert(customer.id, out.len());
                out.push(customer);
            }
        }
    }
    out
}

fn format_age(minutes: i64) -> String {
    if minutes < 1 {
        // Includes negative ages from clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
