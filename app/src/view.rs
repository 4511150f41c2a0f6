//! Page-side observers of the domain stores.
//!
//! A page attaches a [`ListView`] when it is created, refreshes it every
//! time it is shown and detaches it when it is destroyed. The view always
//! holds the store's latest snapshot.

use crate::model::{Booking, Guest, Place, PlaceId, StayWindow};
use crate::services::{BookingService, PlacesService};
use crate::session::Session;
use placebook_core::{Entity, Snapshot, SyncError};
use placebook_runtime::{DomainStore, Subscription};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// A page's copy of one store
#[derive(Debug)]
pub struct ListView<T: Entity> {
    store: DomainStore<T>,
    items: Arc<Mutex<Snapshot<T>>>,
    loading: Arc<AtomicUsize>,
    subscription: Subscription,
}

impl<T: Entity> ListView<T> {
    /// Subscribe to `store`; the current snapshot is copied in immediately
    #[must_use]
    pub fn attach(store: DomainStore<T>) -> Self {
        let items = Arc::new(Mutex::new(Snapshot::empty()));
        let sink = Arc::clone(&items);
        let subscription = store.subscribe(move |snapshot: &Snapshot<T>| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        });

        Self {
            store,
            items,
            loading: Arc::new(AtomicUsize::new(0)),
            subscription,
        }
    }

    /// The last snapshot received
    #[must_use]
    pub fn items(&self) -> Snapshot<T> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any refresh of this view is still running
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire) > 0
    }

    /// Reload the store
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged; the items stay as they were.
    pub async fn refresh(&self) -> Result<Snapshot<T>, SyncError> {
        let _in_flight = InFlight::start(&self.loading);
        fetch(&self.store).await
    }

    /// Start a refresh in the background, as a page does when it is shown
    ///
    /// Must be called from within a Tokio runtime.
    pub fn will_enter(&self) -> JoinHandle<Result<Snapshot<T>, SyncError>> {
        let store = self.store.clone();
        let in_flight = InFlight::start(&self.loading);
        tokio::spawn(async move {
            let _in_flight = in_flight;
            fetch(&store).await
        })
    }

    /// Stop receiving snapshots; calling it again does nothing
    pub fn detach(&mut self) {
        self.subscription.detach();
    }

    /// Whether snapshots are still received
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.is_attached()
    }
}

/// Counts one refresh as running until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn start(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn fetch<T: Entity>(store: &DomainStore<T>) -> Result<Snapshot<T>, SyncError> {
    let result = store.fetch_all().await;
    if let Err(error) = &result {
        tracing::warn!(%error, "Refresh failed");
    }
    result
}

/// How the stay of a new booking is chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingMode {
    /// Dates picked by the user
    Select(StayWindow),
    /// A random stay inside the place's availability
    Random,
}

/// A single place, as shown on its detail page
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceDetail {
    /// The place
    pub place: Place,
    /// Whether the signed-in user may book it
    pub is_bookable: bool,
}

impl PlaceDetail {
    /// Load the place named by the route parameter
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] without a route parameter or for an
    /// unknown place, and [`SyncError::Unauthenticated`] without a user.
    #[tracing::instrument(skip(places, session))]
    pub async fn load(
        places: &PlacesService,
        session: &Session,
        route_param: Option<&str>,
    ) -> Result<Self, SyncError> {
        let id = route_param
            .map(PlaceId::from)
            .ok_or_else(|| SyncError::NotFound("placeId route parameter".into()))?;
        let user = session.require_user()?;

        let place = places.get_place(&id).await?;
        let is_bookable = place.is_bookable_by(&user);
        Ok(Self { place, is_bookable })
    }

    /// Book this place
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Invalid`] when a random stay does not fit the
    /// availability, otherwise whatever [`BookingService::book_place`]
    /// returns.
    pub async fn book<R: Rng + ?Sized>(
        &self,
        bookings: &BookingService,
        guest: Guest,
        mode: BookingMode,
        rng: &mut R,
    ) -> Result<Booking, SyncError> {
        let stay = match mode {
            BookingMode::Select(stay) => stay,
            BookingMode::Random => StayWindow::random_within(&self.place.available, rng)
                .ok_or_else(|| SyncError::Invalid("availability is shorter than one night".into()))?,
        };
        bookings.book_place(&self.place, guest, stay).await
    }
}
