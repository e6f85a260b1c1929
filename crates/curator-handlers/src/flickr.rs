//! Flickr handler: REST API client, normalization, and canonical SDC.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use curator_core::constants::{
    entity, property, CALENDAR_GREGORIAN, GLOBE_EARTH, TIME_PRECISION_DAY,
};
use curator_core::models::{
    CameraInfo, ExistingPage, ImageCreator, ImageDates, ImageDimensions, ImageLocation, ImageUrls,
    MediaImage,
};
use curator_core::sdc::{
    DataValue, EntityIdValue, GlobeCoordinateValue, Snak, Statement, TimeValue,
};
use serde::Deserialize;

use crate::commons_search::CommonsSearch;
use crate::{license_entity, Handler, HandlerError};

const REST_API_URL: &str = "https://api.flickr.com/services/rest/";
const PHOTO_EXTRAS: &str = "date_taken,geo,url_o,url_m,url_t,o_dims,owner_name,license";

/// Flickr's numeric license codes, mapped to normalized tags. Only the
/// Commons-compatible licenses map; NC/ND variants stay unmapped.
fn license_tag(code: &str) -> Option<&'static str> {
    match code {
        "4" => Some("cc-by-2.0"),
        "5" => Some("cc-by-sa-2.0"),
        "9" => Some("cc0"),
        _ => None,
    }
}

mod flex {
    //! Flickr serializes numbers inconsistently (string or number).

    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }))
    }

    pub fn u32_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| match v {
            Value::Number(n) => n.as_u64().map(|n| n as u32),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlickrPhoto {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub ownername: Option<String>,
    #[serde(default)]
    pub datetaken: Option<String>,
    #[serde(default, deserialize_with = "flex::f64_opt")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::f64_opt")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub url_o: Option<String>,
    #[serde(default)]
    pub url_m: Option<String>,
    #[serde(default)]
    pub url_t: Option<String>,
    #[serde(default, deserialize_with = "flex::u32_opt")]
    pub width_o: Option<u32>,
    #[serde(default, deserialize_with = "flex::u32_opt")]
    pub height_o: Option<u32>,
    #[serde(default)]
    pub license: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotosetBody {
    #[serde(default)]
    owner: Option<String>,
    photo: Vec<FlickrPhoto>,
}

#[derive(Debug, Deserialize)]
struct PhotosetResponse {
    stat: String,
    #[serde(default)]
    photoset: Option<PhotosetBody>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    #[serde(rename = "_content", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PhotoInfoOwner {
    nsid: String,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoInfoDates {
    #[serde(default)]
    taken: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoInfo {
    id: String,
    #[serde(default)]
    title: Option<TextContent>,
    owner: PhotoInfoOwner,
    dates: PhotoInfoDates,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    location: Option<PhotoInfoLocation>,
}

#[derive(Debug, Deserialize)]
struct PhotoInfoLocation {
    #[serde(default, deserialize_with = "flex::f64_opt")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "flex::f64_opt")]
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PhotoInfoResponse {
    stat: String,
    #[serde(default)]
    photo: Option<PhotoInfo>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    label: String,
    source: String,
    #[serde(default, deserialize_with = "flex::u32_opt")]
    width: Option<u32>,
    #[serde(default, deserialize_with = "flex::u32_opt")]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PhotoSizesBody {
    size: Vec<PhotoSize>,
}

#[derive(Debug, Deserialize)]
struct PhotoSizesResponse {
    stat: String,
    #[serde(default)]
    sizes: Option<PhotoSizesBody>,
}

pub struct FlickrHandler {
    client: reqwest::Client,
    api_key: String,
    commons: CommonsSearch,
}

impl FlickrHandler {
    pub fn new(client: reqwest::Client, api_key: String, commons: CommonsSearch) -> Self {
        Self {
            client,
            api_key,
            commons,
        }
    }

    async fn fetch_photoset(&self, photoset_id: &str) -> Result<PhotosetBody, HandlerError> {
        let response = self
            .client
            .get(REST_API_URL)
            .query(&[
                ("method", "flickr.photosets.getPhotos"),
                ("api_key", self.api_key.as_str()),
                ("photoset_id", photoset_id),
                ("extras", PHOTO_EXTRAS),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandlerError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: PhotosetResponse = response.json().await?;
        if body.stat != "ok" {
            return Err(HandlerError::NotFound(
                body.message
                    .unwrap_or_else(|| format!("Photoset {} not found", photoset_id)),
            ));
        }
        body.photoset
            .ok_or_else(|| HandlerError::NotFound(format!("Photoset {} not found", photoset_id)))
    }

    /// Single-photo lookup via `photos.getInfo` + `photos.getSizes`.
    async fn fetch_single_photo(&self, photo_id: &str) -> Result<MediaImage, HandlerError> {
        let info_response = self
            .client
            .get(REST_API_URL)
            .query(&[
                ("method", "flickr.photos.getInfo"),
                ("api_key", self.api_key.as_str()),
                ("photo_id", photo_id),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .send()
            .await?;
        let status = info_response.status();
        if !status.is_success() {
            return Err(HandlerError::Upstream {
                status: status.as_u16(),
                body: info_response.text().await.unwrap_or_default(),
            });
        }
        let info: PhotoInfoResponse = info_response.json().await?;
        if info.stat != "ok" {
            return Err(HandlerError::NotFound(
                info.message
                    .unwrap_or_else(|| format!("Photo {} not found", photo_id)),
            ));
        }
        let info = info
            .photo
            .ok_or_else(|| HandlerError::NotFound(format!("Photo {} not found", photo_id)))?;

        let sizes_response = self
            .client
            .get(REST_API_URL)
            .query(&[
                ("method", "flickr.photos.getSizes"),
                ("api_key", self.api_key.as_str()),
                ("photo_id", photo_id),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .send()
            .await?;
        let sizes: PhotoSizesResponse = sizes_response.json().await?;
        let mut sizes = match (sizes.stat.as_str(), sizes.sizes) {
            ("ok", Some(body)) => body.size,
            _ => Vec::new(),
        };
        // Largest last; "Original" wins when the license permits it.
        sizes.sort_by_key(|size| size.width.unwrap_or_default());
        let original = sizes
            .iter()
            .find(|size| size.label == "Original")
            .or_else(|| sizes.last())
            .ok_or_else(|| {
                HandlerError::Other(anyhow::anyhow!("Photo {} has no usable sizes", photo_id))
            })?;

        let raw = FlickrPhoto {
            id: info.id,
            title: info.title.map(|t| t.content).unwrap_or_default(),
            owner: Some(info.owner.nsid),
            ownername: info.owner.username,
            datetaken: info.dates.taken,
            latitude: info.location.as_ref().and_then(|l| l.latitude),
            longitude: info.location.as_ref().and_then(|l| l.longitude),
            url_o: Some(original.source.clone()),
            url_m: None,
            url_t: None,
            width_o: original.width,
            height_o: original.height,
            license: info.license,
        };
        from_flickr(&raw, None)
    }

    /// Photos of an album restricted to the requested ids. An empty id list
    /// short-circuits to an empty map without touching the API.
    pub async fn fetch_photos_batch(
        &self,
        image_ids: &[String],
        photoset_id: &str,
    ) -> Result<BTreeMap<String, MediaImage>, HandlerError> {
        if image_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let collection = self.fetch_collection(photoset_id).await?;
        Ok(collection
            .into_iter()
            .filter(|(id, _)| image_ids.contains(id))
            .collect())
    }
}

#[async_trait]
impl Handler for FlickrHandler {
    fn name(&self) -> &'static str {
        "flickr"
    }

    fn photo_id_property(&self) -> &'static str {
        property::FLICKR_PHOTO_ID
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_collection(
        &self,
        input: &str,
    ) -> Result<BTreeMap<String, MediaImage>, HandlerError> {
        let photoset = self.fetch_photoset(input).await?;
        let owner = photoset.owner.clone();

        let mut images = BTreeMap::new();
        for raw in &photoset.photo {
            match from_flickr(raw, owner.as_deref()) {
                Ok(image) => {
                    images.insert(image.id.clone(), image);
                }
                Err(err) => {
                    tracing::warn!(photo_id = %raw.id, error = %err, "Skipping photo without usable metadata");
                }
            }
        }
        Ok(images)
    }

    async fn fetch_image_metadata(
        &self,
        image_id: &str,
        input: Option<&str>,
    ) -> Result<MediaImage, HandlerError> {
        match input {
            Some(photoset_id) => {
                let collection = self.fetch_collection(photoset_id).await?;
                collection.get(image_id).cloned().ok_or_else(|| {
                    HandlerError::NotFound("Image data not found in sequence".to_string())
                })
            }
            None => self.fetch_single_photo(image_id).await,
        }
    }

    async fn fetch_existing_pages(
        &self,
        image_ids: &[String],
    ) -> Result<HashMap<String, Vec<ExistingPage>>, HandlerError> {
        self.commons
            .pages_with_photo_id(self.photo_id_property(), image_ids)
            .await
    }

    fn build_sdc(&self, image: &MediaImage) -> Vec<Statement> {
        let mut statements = Vec::new();

        statements.push(
            Statement::new(Snak::somevalue(property::CREATOR))
                .with_qualifier(Snak::value(
                    property::AUTHOR_NAME_STRING,
                    DataValue::String(image.creator.username.clone()),
                ))
                .with_qualifier(Snak::value(
                    property::FLICKR_USER_ID,
                    DataValue::String(image.creator.id.clone()),
                ))
                .with_qualifier(Snak::value(
                    property::URL,
                    DataValue::String(image.creator.profile_url.clone()),
                )),
        );

        statements.push(Statement::new(Snak::value(
            property::FLICKR_PHOTO_ID,
            DataValue::String(image.id.clone()),
        )));

        statements.push(Statement::new(Snak::value(
            property::INCEPTION,
            DataValue::Time(TimeValue {
                time: format!("+{}T00:00:00Z", image.dates.taken.format("%Y-%m-%d")),
                timezone: 0,
                before: 0,
                after: 0,
                precision: TIME_PRECISION_DAY,
                calendarmodel: CALENDAR_GREGORIAN.to_string(),
            }),
        )));

        statements.push(
            Statement::new(Snak::value(
                property::SOURCE_OF_FILE,
                DataValue::EntityId(EntityIdValue::item(entity::FILE_AVAILABLE_ON_INTERNET)),
            ))
            .with_qualifier(Snak::value(
                property::OPERATOR,
                DataValue::EntityId(EntityIdValue::item(entity::FLICKR)),
            )),
        );

        if let Some(location) = &image.location {
            statements.push(Statement::new(Snak::value(
                property::COORDINATES_OF_THE_POINT_OF_VIEW,
                DataValue::GlobeCoordinate(GlobeCoordinateValue {
                    latitude: location.latitude,
                    longitude: location.longitude,
                    altitude: None,
                    precision: Some(1e-6),
                    globe: GLOBE_EARTH.to_string(),
                }),
            )));
        }

        if let Some(license) = image.license.as_deref().and_then(license_entity) {
            statements.push(Statement::new(Snak::value(
                property::COPYRIGHT_LICENSE,
                DataValue::EntityId(EntityIdValue::item(license)),
            )));
            statements.push(Statement::new(Snak::value(
                property::COPYRIGHT_STATUS,
                DataValue::EntityId(EntityIdValue::item(entity::COPYRIGHTED)),
            )));
        }

        statements
    }
}

/// Normalize a raw Flickr photo record. Photos without an original-size URL
/// cannot be uploaded and are rejected.
pub fn from_flickr(raw: &FlickrPhoto, album_owner: Option<&str>) -> Result<MediaImage, HandlerError> {
    let original = raw.url_o.clone().ok_or_else(|| {
        HandlerError::Other(anyhow::anyhow!("Photo {} has no original URL", raw.id))
    })?;

    let taken = raw
        .datetaken
        .as_deref()
        .and_then(parse_flickr_datetime)
        .ok_or_else(|| {
            HandlerError::Other(anyhow::anyhow!("Photo {} has no capture date", raw.id))
        })?;

    let owner = raw
        .owner
        .as_deref()
        .or(album_owner)
        .unwrap_or_default()
        .to_string();

    let location = match (raw.latitude, raw.longitude) {
        // Flickr reports (0, 0) for photos without geo data.
        (Some(lat), Some(lon)) if lat != 0.0 || lon != 0.0 => Some(ImageLocation {
            latitude: lat,
            longitude: lon,
            compass_angle: None,
        }),
        _ => None,
    };

    let title = if raw.title.is_empty() {
        format!("Photo from Flickr {} ({}).jpg", taken.format("%Y-%m-%d"), raw.id)
    } else {
        format!("{} ({}).jpg", raw.title, raw.id)
    };

    Ok(MediaImage {
        id: raw.id.clone(),
        title,
        dates: ImageDates { taken },
        creator: ImageCreator {
            id: owner.clone(),
            username: raw.ownername.clone().unwrap_or_else(|| owner.clone()),
            profile_url: format!("https://www.flickr.com/people/{}/", owner),
        },
        urls: ImageUrls {
            preview: raw.url_m.clone().unwrap_or_else(|| original.clone()),
            thumbnail: raw.url_t.clone().unwrap_or_else(|| original.clone()),
            page: Some(format!("https://www.flickr.com/photos/{}/{}/", owner, raw.id)),
            original,
        },
        location,
        dimensions: ImageDimensions {
            width: raw.width_o.unwrap_or_default(),
            height: raw.height_o.unwrap_or_default(),
        },
        camera: CameraInfo::default(),
        license: raw
            .license
            .as_deref()
            .and_then(license_tag)
            .map(str::to_string),
        tags: None,
        existing: None,
    })
}

/// Flickr's `datetaken` is a naive local timestamp ("2020-09-13 12:26:40").
fn parse_flickr_datetime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_photo() -> FlickrPhoto {
        FlickrPhoto {
            id: "5000001".to_string(),
            title: "Harbour at dusk".to_string(),
            owner: Some("12345@N00".to_string()),
            ownername: Some("alice".to_string()),
            datetaken: Some("2020-09-13 12:26:40".to_string()),
            latitude: Some(52.37),
            longitude: Some(4.89),
            url_o: Some("https://live.staticflickr.com/orig.jpg".to_string()),
            url_m: Some("https://live.staticflickr.com/m.jpg".to_string()),
            url_t: Some("https://live.staticflickr.com/t.jpg".to_string()),
            width_o: Some(4000),
            height_o: Some(3000),
            license: Some("4".to_string()),
        }
    }

    fn handler() -> FlickrHandler {
        FlickrHandler::new(
            reqwest::Client::new(),
            "key".to_string(),
            CommonsSearch::new(
                reqwest::Client::new(),
                "https://commons.wikimedia.org/w/api.php",
            ),
        )
    }

    #[tokio::test]
    async fn test_fetch_photos_batch_empty() {
        let handler = handler();
        let result = handler.fetch_photos_batch(&[], "album123").await.unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_from_flickr_normalization() {
        let image = from_flickr(&raw_photo(), None).unwrap();

        assert_eq!(image.title, "Harbour at dusk (5000001).jpg");
        assert_eq!(image.creator.username, "alice");
        assert_eq!(
            image.creator.profile_url,
            "https://www.flickr.com/people/12345@N00/"
        );
        assert_eq!(image.license.as_deref(), Some("cc-by-2.0"));
        assert_eq!(image.location.as_ref().unwrap().latitude, 52.37);
    }

    #[test]
    fn test_from_flickr_zero_coordinates_mean_no_location() {
        let mut raw = raw_photo();
        raw.latitude = Some(0.0);
        raw.longitude = Some(0.0);
        let image = from_flickr(&raw, None).unwrap();
        assert!(image.location.is_none());
    }

    #[test]
    fn test_from_flickr_requires_original_url() {
        let mut raw = raw_photo();
        raw.url_o = None;
        assert!(from_flickr(&raw, None).is_err());
    }

    #[test]
    fn test_build_sdc_contains_flickr_photo_id() {
        let handler = handler();
        let image = from_flickr(&raw_photo(), None).unwrap();
        let statements = handler.build_sdc(&image);

        let photo_id = statements
            .iter()
            .find(|s| s.mainsnak.property == property::FLICKR_PHOTO_ID)
            .unwrap();
        assert_eq!(
            photo_id.mainsnak.datavalue,
            Some(DataValue::String("5000001".to_string()))
        );
    }

    #[test]
    fn test_flex_number_parsing() {
        let json = serde_json::json!({
            "id": "1",
            "title": "t",
            "datetaken": "2020-01-01 00:00:00",
            "latitude": "52.37",
            "longitude": 4.89,
            "url_o": "https://example.com/o.jpg",
            "width_o": "4000",
            "height_o": 3000
        });
        let photo: FlickrPhoto = serde_json::from_value(json).unwrap();
        assert_eq!(photo.latitude, Some(52.37));
        assert_eq!(photo.longitude, Some(4.89));
        assert_eq!(photo.width_o, Some(4000));
        assert_eq!(photo.height_o, Some(3000));
    }
}
