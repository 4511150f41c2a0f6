//! Placebook command line client.
//!
//! Loads the places and the signed-in user's bookings from the backend and
//! reports what a user would see on the discover and bookings pages.

use anyhow::Context;
use placebook::config::Config;
use placebook::geo::NoGeolocation;
use placebook::model::bookable_places;
use placebook::notice::{Notice, Route};
use placebook::view::ListView;
use placebook::App;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("loading configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    placebook_runtime::metrics::describe();

    info!(
        backend = %config.backend_url,
        optimistic = config.optimistic,
        "Configuration loaded"
    );

    let app = App::new(&config, Arc::new(NoGeolocation));

    let mut discover = ListView::attach(app.places.store().clone());
    let mut bookings = ListView::attach(app.bookings.store().clone());

    let places = match discover.will_enter().await.context("places refresh task")? {
        Ok(places) => places,
        Err(error) => {
            let notice = Notice::from_error(&error, Route::Discover);
            warn!(header = %notice.header, message = %notice.message, "Places could not be loaded");
            return Err(error).context("fetching places");
        },
    };

    match app.session.user_id() {
        Some(user) => {
            let visible = bookable_places(&places, &user);
            info!(total = places.len(), bookable = visible.len(), "Discover");
            for place in &visible {
                info!(id = %place.id, title = %place.title, price = place.price, "Place");
            }

            match bookings.refresh().await {
                Ok(mine) => {
                    info!(count = mine.len(), "Bookings");
                    for booking in mine.iter() {
                        info!(
                            id = %booking.id,
                            place = %booking.place_title,
                            nights = booking.stay.nights(),
                            "Booking"
                        );
                    }
                },
                Err(error) => {
                    let notice = Notice::from_error(&error, Route::Bookings);
                    warn!(header = %notice.header, message = %notice.message, "Bookings could not be loaded");
                },
            }
        },
        None => {
            info!(total = places.len(), "Discover (not signed in)");
        },
    }

    discover.detach();
    bookings.detach();
    Ok(())
}
