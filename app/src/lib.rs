//! # Placebook
//!
//! Client-side state layer of a places booking app. Users offer places,
//! discover places offered by others and book them.
//!
//! Places and bookings each live in one [`DomainStore`], synced with a REST
//! backend. Pages observe the stores through [`view::ListView`]; the rules
//! around offering and booking live in [`services`].
//!
//! Everything is wired in [`App::new`]; nothing is a global.

use crate::backend::{FirebaseCollection, HttpImageStore, Scope};
use crate::config::Config;
use crate::geo::{Geolocator, GoogleGeocoder, LocationPicker, StaticMap};
use crate::model::{Booking, Place, UserId};
use crate::services::{BookingService, PlacesService};
use crate::session::Session;
use placebook_core::sync::SyncConfig;
use placebook_runtime::DomainStore;
use std::sync::Arc;

pub mod backend;
pub mod config;
pub mod geo;
pub mod model;
pub mod notice;
pub mod services;
pub mod session;
pub mod view;

/// The composed application
#[derive(Debug, Clone)]
pub struct App {
    /// Signed-in user
    pub session: Session,
    /// Offers
    pub places: PlacesService,
    /// The user's bookings
    pub bookings: BookingService,
    /// Location picking for new offers
    pub locations: LocationPicker,
}

impl App {
    /// Wire stores, services and collaborators from `config`
    ///
    /// Signs in the configured user, if any.
    #[must_use]
    pub fn new(config: &Config, geolocator: Arc<dyn Geolocator>) -> Self {
        let client = reqwest::Client::new();
        let session = Session::new();
        if let Some(user_id) = &config.user_id {
            session.login(UserId::new(user_id.clone()), config.auth_token.clone());
        }
        let sync = SyncConfig::new().with_optimistic(config.optimistic);

        let place_remote = Arc::new(FirebaseCollection::<Place>::new(
            client.clone(),
            config.backend_url.clone(),
            session.clone(),
        ));
        let booking_remote = Arc::new(
            FirebaseCollection::<Booking>::new(
                client.clone(),
                config.backend_url.clone(),
                session.clone(),
            )
            .with_scope(Scope::CurrentUser),
        );

        let places = PlacesService::new(
            DomainStore::new(place_remote.clone(), sync),
            place_remote,
            Arc::new(HttpImageStore::new(
                client.clone(),
                config.upload_url.clone(),
                session.clone(),
            )),
            session.clone(),
        );
        let bookings = BookingService::new(DomainStore::new(booking_remote, sync), session.clone());

        let locations = LocationPicker::new(
            Arc::new(GoogleGeocoder::new(client, config.maps_api_key.clone())),
            StaticMap::new(config.maps_api_key.clone()).with_zoom(config.map_zoom),
            geolocator,
        );

        tracing::debug!(backend = %config.backend_url, optimistic = config.optimistic, "App wired");
        Self {
            session,
            places,
            bookings,
            locations,
        }
    }
}
