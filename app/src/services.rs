//! Place and booking operations built on the domain stores.
//!
//! Services add the rules around a store: who owns an offer, who may book a
//! place, and where an offer's picture comes from. State itself lives in the
//! stores, which pages observe directly.

use crate::backend::ImageStore;
use crate::model::{
    Booking, BookingDraft, BookingId, Guest, Place, PlaceDraft, PlaceId, PlaceLocation, StayWindow,
};
use crate::session::Session;
use placebook_core::sync::RemoteLookup;
use placebook_core::{Snapshot, SyncError};
use placebook_runtime::DomainStore;
use std::fmt;
use std::sync::Arc;

/// Longest accepted offer description
pub const MAX_DESCRIPTION_LEN: usize = 180;

/// Picture attached to a new offer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OfferImage {
    /// Bytes to upload first
    Upload {
        /// Name stored with the file
        file_name: String,
        /// Image bytes
        bytes: Vec<u8>,
    },
    /// An already hosted picture
    Url(String),
}

/// A place the user wants to offer
#[derive(Clone, Debug, PartialEq)]
pub struct NewOffer {
    /// Title, required
    pub title: String,
    /// Description, at most [`MAX_DESCRIPTION_LEN`] characters
    pub description: String,
    /// Price per night, at least 1
    pub price: f64,
    /// Availability
    pub available: StayWindow,
    /// Picked location
    pub location: PlaceLocation,
    /// Picture
    pub image: OfferImage,
}

impl NewOffer {
    /// Check the offer before anything is sent
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Invalid`] naming the first rejected field.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.title.trim().is_empty() {
            return Err(SyncError::Invalid("title is required".into()));
        }
        if self.description.trim().is_empty() {
            return Err(SyncError::Invalid("description is required".into()));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(SyncError::Invalid(format!(
                "description is longer than {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.price < 1.0 {
            return Err(SyncError::Invalid("price must be at least 1".into()));
        }
        if self.available.from >= self.available.to {
            return Err(SyncError::Invalid("availability must end after it starts".into()));
        }
        Ok(())
    }
}

/// Offers: listing, lookup, creation and edits
#[derive(Clone)]
pub struct PlacesService {
    store: DomainStore<Place>,
    lookup: Arc<dyn RemoteLookup<Place>>,
    images: Arc<dyn ImageStore>,
    session: Session,
}

impl fmt::Debug for PlacesService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacesService")
            .field("store", &self.store)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl PlacesService {
    /// Service over `store`
    #[must_use]
    pub fn new(
        store: DomainStore<Place>,
        lookup: Arc<dyn RemoteLookup<Place>>,
        images: Arc<dyn ImageStore>,
        session: Session,
    ) -> Self {
        Self {
            store,
            lookup,
            images,
            session,
        }
    }

    /// The places store
    #[must_use]
    pub const fn store(&self) -> &DomainStore<Place> {
        &self.store
    }

    /// Reload every place
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged.
    pub async fn fetch_places(&self) -> Result<Snapshot<Place>, SyncError> {
        self.store.fetch_all().await
    }

    /// One place, straight from the backend
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when the backend has no such place.
    pub async fn get_place(&self, id: &PlaceId) -> Result<Place, SyncError> {
        self.lookup.get(id).await
    }

    /// Offer a new place owned by the signed-in user
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Invalid`] for a rejected offer,
    /// [`SyncError::Unauthenticated`] without a user, or the upload or
    /// remote failure unchanged.
    #[tracing::instrument(skip(self, offer), fields(title = %offer.title))]
    pub async fn offer_place(&self, offer: NewOffer) -> Result<Place, SyncError> {
        offer.validate()?;
        let owner = self.session.require_user()?;

        let image_url = match offer.image {
            OfferImage::Upload { file_name, bytes } => {
                self.images.upload(&file_name, bytes).await?.image_url
            },
            OfferImage::Url(url) => url,
        };

        self.store
            .add_one(PlaceDraft {
                title: offer.title,
                description: offer.description,
                image_url,
                price: offer.price,
                available: offer.available,
                location: offer.location,
                owner,
            })
            .await
    }

    /// Change the title and description of an offer
    ///
    /// The place is taken from the store, or fetched when the store has
    /// not loaded it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for an unknown place,
    /// [`SyncError::Permission`] when the user does not own it, or the remote
    /// failure unchanged.
    #[tracing::instrument(skip(self, title, description))]
    pub async fn update_offer(
        &self,
        id: &PlaceId,
        title: String,
        description: String,
    ) -> Result<Place, SyncError> {
        let user = self.session.require_user()?;
        let current = match self.store.current().get(id).cloned() {
            Some(place) => place,
            None => self.get_place(id).await?,
        };
        if current.owner != user {
            return Err(SyncError::Permission(format!("place {id} is not yours")));
        }

        self.store
            .update_one(Place {
                title,
                description,
                ..current
            })
            .await
    }
}

/// The signed-in user's bookings
#[derive(Clone, Debug)]
pub struct BookingService {
    store: DomainStore<Booking>,
    session: Session,
}

impl BookingService {
    /// Service over `store`
    #[must_use]
    pub const fn new(store: DomainStore<Booking>, session: Session) -> Self {
        Self { store, session }
    }

    /// The bookings store
    #[must_use]
    pub const fn store(&self) -> &DomainStore<Booking> {
        &self.store
    }

    /// Reload the user's bookings
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged.
    pub async fn fetch_bookings(&self) -> Result<Snapshot<Booking>, SyncError> {
        self.store.fetch_all().await
    }

    /// Book `place` for the signed-in user
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Permission`] for the user's own place,
    /// [`SyncError::Invalid`] for an empty stay, or the remote failure
    /// unchanged.
    #[tracing::instrument(skip(self, place, guest), fields(place = %place.id))]
    pub async fn book_place(
        &self,
        place: &Place,
        guest: Guest,
        stay: StayWindow,
    ) -> Result<Booking, SyncError> {
        let user = self.session.require_user()?;
        if !place.is_bookable_by(&user) {
            return Err(SyncError::Permission("you cannot book your own place".into()));
        }
        if stay.from >= stay.to {
            return Err(SyncError::Invalid("stay must end after it starts".into()));
        }
        if guest.guest_number == 0 {
            return Err(SyncError::Invalid("at least one guest is required".into()));
        }

        self.store
            .add_one(BookingDraft::for_place(place, user, guest, stay))
            .await
    }

    /// Cancel a booking
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged; the booking is shown again.
    pub async fn cancel_booking(&self, id: &BookingId) -> Result<(), SyncError> {
        self.store.delete_one(id).await
    }
}
