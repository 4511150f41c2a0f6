//! Domain types for places and bookings.
//!
//! Ids are backend-assigned strings wrapped in newtypes. A [`Place`] is a
//! listing offered by one user; a [`Booking`] is another user's stay at it.
//! Drafts carry every field except the id.

use chrono::{DateTime, Duration, Utc};
use placebook_core::Entity;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from its backend key
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the backend key
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Unique identifier for a place
    PlaceId
);

string_id!(
    /// Unique identifier for a booking
    BookingId
);

string_id!(
    /// Unique identifier for a signed-in user
    UserId
);

/// A point on the map
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
}

impl Coordinates {
    /// Creates a coordinate pair
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Where a place is, with the derived address and map preview
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceLocation {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Formatted address, when geocoding found one
    pub address: Option<String>,
    /// Static map preview URL
    pub static_map_image_url: Option<String>,
}

impl PlaceLocation {
    /// The coordinate pair of this location
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// A span of time between two instants
///
/// Used for a place's availability and for the stay of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayWindow {
    /// First instant
    pub from: DateTime<Utc>,
    /// Last instant
    pub to: DateTime<Utc>,
}

impl StayWindow {
    /// Longest stay picked by [`StayWindow::random_within`]
    pub const MAX_RANDOM_NIGHTS: i64 = 6;

    /// Creates a window
    #[must_use]
    pub const fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Whole nights covered by the window
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.to - self.from).num_days().max(0)
    }

    /// Whether `other` lies entirely inside this window
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    /// Pick a random stay inside `availability`
    ///
    /// The stay lasts between one and six nights and ends inside the window.
    /// Returns `None` when the window is shorter than one night.
    pub fn random_within<R: Rng + ?Sized>(availability: &Self, rng: &mut R) -> Option<Self> {
        let max_nights = availability.nights().min(Self::MAX_RANDOM_NIGHTS);
        if max_nights < 1 {
            return None;
        }
        let nights = rng.gen_range(1..=max_nights);
        let latest_start = availability.to - Duration::days(nights);
        let slack = (latest_start - availability.from).num_seconds();
        let from = availability.from + Duration::seconds(rng.gen_range(0..=slack));
        Some(Self::new(from, from + Duration::days(nights)))
    }
}

/// A place offered for booking
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    /// Backend id
    pub id: PlaceId,
    /// Title
    pub title: String,
    /// Free text description
    pub description: String,
    /// Public URL of the place's picture
    pub image_url: String,
    /// Price per night
    pub price: f64,
    /// When the place can be booked
    pub available: StayWindow,
    /// Where the place is
    pub location: PlaceLocation,
    /// The user who offered it
    pub owner: UserId,
}

/// Everything needed to create a place
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceDraft {
    /// Title
    pub title: String,
    /// Free text description
    pub description: String,
    /// Public URL of the place's picture
    pub image_url: String,
    /// Price per night
    pub price: f64,
    /// When the place can be booked
    pub available: StayWindow,
    /// Where the place is
    pub location: PlaceLocation,
    /// The user offering it
    pub owner: UserId,
}

impl Place {
    /// Whether `user` may book this place
    #[must_use]
    pub fn is_bookable_by(&self, user: &UserId) -> bool {
        &self.owner != user
    }

    /// The creatable fields of this place
    #[must_use]
    pub fn to_draft(&self) -> PlaceDraft {
        PlaceDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            price: self.price,
            available: self.available,
            location: self.location.clone(),
            owner: self.owner.clone(),
        }
    }
}

impl Entity for Place {
    type Id = PlaceId;
    type Draft = PlaceDraft;

    fn id(&self) -> &PlaceId {
        &self.id
    }

    fn from_draft(id: PlaceId, draft: PlaceDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            image_url: draft.image_url,
            price: draft.price,
            available: draft.available,
            location: draft.location,
            owner: draft.owner,
        }
    }

    fn provisional_id(sequence: u64) -> PlaceId {
        PlaceId(format!("pending-{sequence}"))
    }
}

/// Places `user` may book: everything not offered by them
#[must_use]
pub fn bookable_places(places: &[Place], user: &UserId) -> Vec<Place> {
    places
        .iter()
        .filter(|place| place.is_bookable_by(user))
        .cloned()
        .collect()
}

/// Who is staying
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Guest {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Number of guests
    pub guest_number: u32,
}

/// A user's stay at a place
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Booking {
    /// Backend id
    pub id: BookingId,
    /// The booked place
    pub place_id: PlaceId,
    /// Title of the place when it was booked
    pub place_title: String,
    /// Picture of the place when it was booked
    pub place_image: String,
    /// The booking user
    pub user_id: UserId,
    /// Guest details
    pub guest: Guest,
    /// Dates of the stay
    pub stay: StayWindow,
}

/// Everything needed to create a booking
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingDraft {
    /// The booked place
    pub place_id: PlaceId,
    /// Title of the place
    pub place_title: String,
    /// Picture of the place
    pub place_image: String,
    /// The booking user
    pub user_id: UserId,
    /// Guest details
    pub guest: Guest,
    /// Dates of the stay
    pub stay: StayWindow,
}

impl BookingDraft {
    /// Draft a booking of `place` by `user`
    #[must_use]
    pub fn for_place(place: &Place, user: UserId, guest: Guest, stay: StayWindow) -> Self {
        Self {
            place_id: place.id.clone(),
            place_title: place.title.clone(),
            place_image: place.image_url.clone(),
            user_id: user,
            guest,
            stay,
        }
    }
}

impl Entity for Booking {
    type Id = BookingId;
    type Draft = BookingDraft;

    fn id(&self) -> &BookingId {
        &self.id
    }

    fn from_draft(id: BookingId, draft: BookingDraft) -> Self {
        Self {
            id,
            place_id: draft.place_id,
            place_title: draft.place_title,
            place_image: draft.place_image,
            user_id: draft.user_id,
            guest: draft.guest,
            stay: draft.stay,
        }
    }

    fn provisional_id(sequence: u64) -> BookingId {
        BookingId(format!("pending-{sequence}"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests can unwrap

    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap()
    }

    fn place(owner: &str) -> Place {
        Place::from_draft(
            PlaceId::new("p1"),
            PlaceDraft {
                title: "Cabin".into(),
                description: "By the lake".into(),
                image_url: "https://img/cabin.jpg".into(),
                price: 89.5,
                available: StayWindow::new(day(1), day(28)),
                location: PlaceLocation {
                    lat: 40.4,
                    lng: -3.7,
                    address: None,
                    static_map_image_url: None,
                },
                owner: UserId::new(owner),
            },
        )
    }

    #[test]
    fn provisional_ids_are_distinct_from_backend_keys() {
        assert_eq!(Place::provisional_id(1).as_str(), "pending-1");
        assert_eq!(Booking::provisional_id(2), BookingId::new("pending-2"));
    }

    #[test]
    fn owner_cannot_book_own_place() {
        let cabin = place("u1");
        assert!(!cabin.is_bookable_by(&UserId::new("u1")));
        assert!(cabin.is_bookable_by(&UserId::new("u2")));
        assert!(bookable_places(&[cabin], &UserId::new("u1")).is_empty());
    }

    #[test]
    fn draft_round_trips_through_entity() {
        let cabin = place("u1");
        assert_eq!(Place::from_draft(cabin.id.clone(), cabin.to_draft()), cabin);
    }

    #[test]
    fn short_window_has_no_random_stay() {
        let window = StayWindow::new(day(1), day(1) + Duration::hours(20));
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(StayWindow::random_within(&window, &mut rng), None);
    }

    #[test]
    fn one_night_window_yields_exactly_that_night() {
        let window = StayWindow::new(day(1), day(2));
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(StayWindow::random_within(&window, &mut rng), Some(window));
    }

    proptest! {
        #[test]
        fn random_stay_fits_availability(seed in any::<u64>(), start in 1_u32..20, length in 1_i64..40) {
            let availability = StayWindow::new(day(start), day(start) + Duration::days(length));
            let mut rng = StdRng::seed_from_u64(seed);

            let stay = StayWindow::random_within(&availability, &mut rng).unwrap();

            prop_assert!(availability.contains(&stay));
            prop_assert!((1..=StayWindow::MAX_RANDOM_NIGHTS).contains(&stay.nights()));
        }
    }
}
