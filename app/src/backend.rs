//! REST backend for places and bookings.
//!
//! The backend is a JSON document store: each collection lives under
//! `{base}/{collection}.json` as an object keyed by record id. Creating a
//! record answers `{"name": id}`; an empty collection or a missing record is
//! `null`. Requests carry `auth=<token>` when the session has a token.

use crate::model::{
    Booking, BookingDraft, Guest, Place, PlaceDraft, PlaceLocation, StayWindow, UserId,
};
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use placebook_core::sync::{RemoteCollection, RemoteLookup};
use placebook_core::{Entity, SyncError};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// An entity stored as a backend collection
pub trait Resource: Entity<Id: From<String>> {
    /// Collection name, the first path segment
    const COLLECTION: &'static str;

    /// Wire representation, without the id
    type Record: Serialize + DeserializeOwned + Send + Sync;

    /// Wire form of an entity
    fn to_record(&self) -> Self::Record;

    /// Wire form of a draft
    fn draft_record(draft: &Self::Draft) -> Self::Record;

    /// Entity from its key and wire form
    fn from_record(id: Self::Id, record: Self::Record) -> Self;
}

/// Place as stored by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRecord {
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Picture URL
    pub image_url: String,
    /// Price per night
    pub price: f64,
    /// Start of availability
    pub available_from: DateTime<Utc>,
    /// End of availability
    pub available_to: DateTime<Utc>,
    /// Owner
    pub user_id: UserId,
    /// Location
    pub location: PlaceLocation,
}

impl From<&PlaceDraft> for PlaceRecord {
    fn from(draft: &PlaceDraft) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            image_url: draft.image_url.clone(),
            price: draft.price,
            available_from: draft.available.from,
            available_to: draft.available.to,
            user_id: draft.owner.clone(),
            location: draft.location.clone(),
        }
    }
}

impl Resource for Place {
    const COLLECTION: &'static str = "offered-places";
    type Record = PlaceRecord;

    fn to_record(&self) -> PlaceRecord {
        PlaceRecord::from(&self.to_draft())
    }

    fn draft_record(draft: &PlaceDraft) -> PlaceRecord {
        PlaceRecord::from(draft)
    }

    fn from_record(id: Self::Id, record: PlaceRecord) -> Self {
        Self::from_draft(
            id,
            PlaceDraft {
                title: record.title,
                description: record.description,
                image_url: record.image_url,
                price: record.price,
                available: StayWindow::new(record.available_from, record.available_to),
                location: record.location,
                owner: record.user_id,
            },
        )
    }
}

/// Booking as stored by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    /// Booked place
    pub place_id: String,
    /// Place title
    pub place_title: String,
    /// Place picture
    pub place_image: String,
    /// Booking user
    pub user_id: UserId,
    /// Guest given name
    pub first_name: String,
    /// Guest family name
    pub last_name: String,
    /// Number of guests
    pub guest_number: u32,
    /// First day of the stay
    pub booked_from: DateTime<Utc>,
    /// Last day of the stay
    pub booked_to: DateTime<Utc>,
}

impl From<&BookingDraft> for BookingRecord {
    fn from(draft: &BookingDraft) -> Self {
        Self {
            place_id: draft.place_id.to_string(),
            place_title: draft.place_title.clone(),
            place_image: draft.place_image.clone(),
            user_id: draft.user_id.clone(),
            first_name: draft.guest.first_name.clone(),
            last_name: draft.guest.last_name.clone(),
            guest_number: draft.guest.guest_number,
            booked_from: draft.stay.from,
            booked_to: draft.stay.to,
        }
    }
}

impl Resource for Booking {
    const COLLECTION: &'static str = "bookings";
    type Record = BookingRecord;

    fn to_record(&self) -> BookingRecord {
        BookingRecord {
            place_id: self.place_id.to_string(),
            place_title: self.place_title.clone(),
            place_image: self.place_image.clone(),
            user_id: self.user_id.clone(),
            first_name: self.guest.first_name.clone(),
            last_name: self.guest.last_name.clone(),
            guest_number: self.guest.guest_number,
            booked_from: self.stay.from,
            booked_to: self.stay.to,
        }
    }

    fn draft_record(draft: &BookingDraft) -> BookingRecord {
        BookingRecord::from(draft)
    }

    fn from_record(id: Self::Id, record: BookingRecord) -> Self {
        Self {
            id,
            place_id: record.place_id.into(),
            place_title: record.place_title,
            place_image: record.place_image,
            user_id: record.user_id,
            guest: Guest {
                first_name: record.first_name,
                last_name: record.last_name,
                guest_number: record.guest_number,
            },
            stay: StayWindow::new(record.booked_from, record.booked_to),
        }
    }
}

/// Which records of a collection are listed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Scope {
    /// Every record
    #[default]
    All,
    /// Records whose `userId` is the signed-in user
    CurrentUser,
}

#[derive(Deserialize)]
struct Created {
    name: String,
}

/// One backend collection over HTTP
pub struct FirebaseCollection<T> {
    client: Client,
    base_url: String,
    session: Session,
    scope: Scope,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for FirebaseCollection<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session: self.session.clone(),
            scope: self.scope,
            _entity: PhantomData,
        }
    }
}

impl<T: Resource> fmt::Debug for FirebaseCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseCollection")
            .field("collection", &T::COLLECTION)
            .field("base_url", &self.base_url)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<T: Resource> FirebaseCollection<T> {
    /// Collection under `base_url`, listing every record
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, session: Session) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            scope: Scope::All,
            _entity: PhantomData,
        }
    }

    /// Restrict listing to `scope`
    #[must_use]
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/{}.json", self.base_url, T::COLLECTION)
    }

    /// URL of one record; the id is percent-encoded as a single path segment
    fn record_url(&self, id: &T::Id) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SyncError::Network(format!("invalid backend url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SyncError::Network(format!("backend url has no path: {}", self.base_url)))?
            .pop_if_empty()
            .push(T::COLLECTION)
            .push(&format!("{id}.json"));
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SyncError::Server {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

async fn parse<R: DeserializeOwned>(response: Response) -> Result<R, SyncError> {
    response
        .json::<R>()
        .await
        .map_err(|e| SyncError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl<T: Resource> RemoteCollection<T> for FirebaseCollection<T> {
    async fn list(&self) -> Result<Vec<T>, SyncError> {
        let mut request = self.client.get(self.collection_url());
        if self.scope == Scope::CurrentUser {
            let user = self.session.require_user()?;
            request = request.query(&[
                ("orderBy", "\"userId\"".to_string()),
                ("equalTo", format!("\"{user}\"")),
            ]);
        }

        let records: Option<BTreeMap<String, T::Record>> = parse(self.execute(request).await?).await?;
        let entities: Vec<T> = records
            .unwrap_or_default()
            .into_iter()
            .map(|(key, record)| T::from_record(key.into(), record))
            .collect();
        tracing::debug!(collection = T::COLLECTION, count = entities.len(), "Listed records");
        Ok(entities)
    }

    async fn create(&self, draft: &T::Draft) -> Result<T::Id, SyncError> {
        let request = self
            .client
            .post(self.collection_url())
            .json(&T::draft_record(draft));
        let created: Created = parse(self.execute(request).await?).await?;
        Ok(created.name.into())
    }

    async fn update(&self, entity: &T) -> Result<(), SyncError> {
        let request = self
            .client
            .put(self.record_url(entity.id())?)
            .json(&entity.to_record());
        self.execute(request).await?;
        Ok(())
    }

    async fn delete(&self, id: &T::Id) -> Result<(), SyncError> {
        self.execute(self.client.delete(self.record_url(id)?)).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: Resource> RemoteLookup<T> for FirebaseCollection<T> {
    async fn get(&self, id: &T::Id) -> Result<T, SyncError> {
        let record: Option<T::Record> =
            parse(self.execute(self.client.get(self.record_url(id)?)).await?).await?;
        record
            .map(|record| T::from_record(id.clone(), record))
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }
}

/// Where an uploaded picture ended up
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    /// Public URL
    pub image_url: String,
    /// Storage path
    pub image_path: String,
}

/// Stores place pictures
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload `bytes` as `file_name`
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedImage, SyncError>;
}

/// Multipart upload to an HTTP endpoint
#[derive(Clone, Debug)]
pub struct HttpImageStore {
    client: Client,
    upload_url: String,
    session: Session,
}

impl HttpImageStore {
    /// Uploader posting to `upload_url`
    #[must_use]
    pub fn new(client: Client, upload_url: impl Into<String>, session: Session) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
            session,
        }
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedImage, SyncError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);

        let mut request = self.client.post(&self.upload_url).multipart(form);
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                message: body,
            });
        }
        parse(response).await
    }
}
