//! User-facing failure notices.

use placebook_core::SyncError;
use std::fmt;

/// Screens a notice can send the user back to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Places offered by others
    Discover,
    /// Places offered by the user
    Offers,
    /// The user's bookings
    Bookings,
}

impl Route {
    /// Navigation path of the screen
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Discover => "/places/tabs/discover",
            Self::Offers => "/places/tabs/offers",
            Self::Bookings => "/bookings",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// The single button of a notice
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledge {
    /// Button text
    pub label: String,
    /// Where pressing it navigates
    pub route: Route,
}

/// A failure shown to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Title
    pub header: String,
    /// Body
    pub message: String,
    /// Dismiss action
    pub acknowledge: Acknowledge,
}

impl Notice {
    /// Notice whose button reads "Okay" and navigates to `route`
    #[must_use]
    pub fn new(header: impl Into<String>, message: impl Into<String>, route: Route) -> Self {
        Self {
            header: header.into(),
            message: message.into(),
            acknowledge: Acknowledge {
                label: "Okay".to_string(),
                route,
            },
        }
    }

    /// A place detail could not be loaded
    #[must_use]
    pub fn place_load_failed() -> Self {
        Self::new(
            "An error occurred!",
            "Place could not be loaded. Please try again later.",
            Route::Discover,
        )
    }

    /// The device position could not be determined
    #[must_use]
    pub fn location_unavailable() -> Self {
        Self::new(
            "Could not fetch location",
            "Please use the map to pick a location!",
            Route::Offers,
        )
    }

    /// Notice for any failure, returning to `route`
    #[must_use]
    pub fn from_error(error: &SyncError, route: Route) -> Self {
        match error {
            SyncError::GeoUnavailable(_) => Self::location_unavailable(),
            SyncError::Unauthenticated => {
                Self::new("Not signed in", "Please sign in and try again.", route)
            },
            SyncError::Permission(reason) => Self::new("Not allowed", reason.clone(), route),
            other => Self::new("An error occurred!", other.to_string(), route),
        }
    }
}
