//! Mapillary handler: Graph API client, normalization, and canonical SDC.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curator_core::constants::{
    entity, property, CALENDAR_GREGORIAN, GLOBE_EARTH, TIME_PRECISION_DAY,
};
use curator_core::models::{
    CameraInfo, ExistingPage, ImageCreator, ImageDates, ImageDimensions, ImageLocation, ImageUrls,
    MediaImage,
};
use curator_core::sdc::{
    DataValue, EntityIdValue, GlobeCoordinateValue, QuantityValue, Snak, Statement, TimeValue,
};
use lru::LruCache;
use serde::Deserialize;

use crate::commons_search::CommonsSearch;
use crate::{license_entity, Handler, HandlerError};

const GRAPH_API_BASE: &str = "https://graph.mapillary.com";
const IMAGE_FIELDS: &str = "captured_at,compass_angle,creator,geometry,height,is_pano,make,model,thumb_256_url,thumb_1024_url,thumb_original_url,width";
const SEQUENCE_CACHE_SIZE: usize = 128;

/// Mapillary publishes all imagery under CC BY-SA 4.0.
const MAPILLARY_LICENSE: &str = "cc-by-sa-4.0";

#[derive(Debug, Clone, Deserialize)]
pub struct MapillaryImage {
    pub id: String,
    pub captured_at: i64,
    #[serde(default)]
    pub compass_angle: Option<f64>,
    pub creator: MapillaryCreator,
    pub geometry: MapillaryGeometry,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub is_pano: Option<bool>,
    pub thumb_256_url: String,
    pub thumb_1024_url: String,
    pub thumb_original_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapillaryCreator {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapillaryGeometry {
    /// `[longitude, latitude]`, GeoJSON order.
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<MapillaryImage>,
}

pub struct MapillaryHandler {
    client: reqwest::Client,
    api_token: String,
    commons: CommonsSearch,
    sequence_cache: Mutex<LruCache<String, BTreeMap<String, MapillaryImage>>>,
}

impl MapillaryHandler {
    pub fn new(client: reqwest::Client, api_token: String, commons: CommonsSearch) -> Self {
        Self {
            client,
            api_token,
            commons,
            sequence_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(SEQUENCE_CACHE_SIZE).unwrap(),
            )),
        }
    }

    /// All images of a sequence, ordered by capture time, keyed by id.
    async fn fetch_sequence_data(
        &self,
        sequence_id: &str,
    ) -> Result<BTreeMap<String, MapillaryImage>, HandlerError> {
        if let Some(cached) = self.sequence_cache.lock().unwrap().get(sequence_id) {
            return Ok(cached.clone());
        }

        let response = self
            .client
            .get(format!("{}/images", GRAPH_API_BASE))
            .query(&[
                ("access_token", self.api_token.as_str()),
                ("sequence_ids", sequence_id),
                ("fields", IMAGE_FIELDS),
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

        let mut body: ImagesResponse = response.json().await?;
        body.data.sort_by_key(|image| image.captured_at);

        let sequence: BTreeMap<String, MapillaryImage> = body
            .data
            .into_iter()
            .map(|image| (image.id.clone(), image))
            .collect();

        self.sequence_cache
            .lock()
            .unwrap()
            .put(sequence_id.to_string(), sequence.clone());
        Ok(sequence)
    }

    async fn fetch_single_image(&self, image_id: &str) -> Result<MapillaryImage, HandlerError> {
        let response = self
            .client
            .get(format!("{}/{}", GRAPH_API_BASE, image_id))
            .query(&[
                ("access_token", self.api_token.as_str()),
                ("fields", IMAGE_FIELDS),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(HandlerError::NotFound(format!(
                "Image {} not found",
                image_id
            )));
        }
        if !status.is_success() {
            return Err(HandlerError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Handler for MapillaryHandler {
    fn name(&self) -> &'static str {
        "mapillary"
    }

    fn photo_id_property(&self) -> &'static str {
        property::MAPILLARY_PHOTO_ID
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_collection(
        &self,
        input: &str,
    ) -> Result<BTreeMap<String, MediaImage>, HandlerError> {
        let sequence = self.fetch_sequence_data(input).await?;
        sequence
            .values()
            .map(|raw| from_mapillary(raw).map(|image| (image.id.clone(), image)))
            .collect()
    }

    async fn fetch_image_metadata(
        &self,
        image_id: &str,
        input: Option<&str>,
    ) -> Result<MediaImage, HandlerError> {
        match input {
            Some(sequence_id) => {
                let sequence = self.fetch_sequence_data(sequence_id).await?;
                let raw = sequence.get(image_id).ok_or_else(|| {
                    HandlerError::NotFound("Image data not found in sequence".to_string())
                })?;
                from_mapillary(raw)
            }
            None => from_mapillary(&self.fetch_single_image(image_id).await?),
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

        // Creator: unknown value, qualified with the author name and profile.
        statements.push(
            Statement::new(Snak::somevalue(property::CREATOR))
                .with_qualifier(Snak::value(
                    property::AUTHOR_NAME_STRING,
                    DataValue::String(image.creator.username.clone()),
                ))
                .with_qualifier(Snak::value(
                    property::URL,
                    DataValue::String(image.creator.profile_url.clone()),
                )),
        );

        statements.push(Statement::new(Snak::value(
            property::MAPILLARY_PHOTO_ID,
            DataValue::String(image.id.clone()),
        )));

        statements.push(Statement::new(Snak::value(
            property::PUBLISHED_IN,
            DataValue::EntityId(EntityIdValue::item(entity::MAPILLARY_DATABASE)),
        )));

        statements.push(Statement::new(Snak::value(
            property::INCEPTION,
            DataValue::Time(day_precision_time(image.dates.taken)),
        )));

        statements.push(
            Statement::new(Snak::value(
                property::SOURCE_OF_FILE,
                DataValue::EntityId(EntityIdValue::item(entity::FILE_AVAILABLE_ON_INTERNET)),
            ))
            .with_qualifier(Snak::value(
                property::OPERATOR,
                DataValue::EntityId(EntityIdValue::item(entity::MAPILLARY)),
            )),
        );

        if let Some(location) = &image.location {
            let mut coordinate = Statement::new(Snak::value(
                property::COORDINATES_OF_THE_POINT_OF_VIEW,
                DataValue::GlobeCoordinate(GlobeCoordinateValue {
                    latitude: location.latitude,
                    longitude: location.longitude,
                    altitude: None,
                    precision: Some(1e-6),
                    globe: GLOBE_EARTH.to_string(),
                }),
            ));
            if let Some(angle) = location.compass_angle {
                coordinate = coordinate.with_qualifier(Snak::value(
                    property::HEADING,
                    DataValue::Quantity(QuantityValue {
                        amount: quantity_amount(angle),
                        unit: "1".to_string(),
                        upper_bound: None,
                        lower_bound: None,
                    }),
                ));
            }
            statements.push(coordinate);
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

/// Normalize a raw Graph API record.
pub fn from_mapillary(raw: &MapillaryImage) -> Result<MediaImage, HandlerError> {
    let taken = DateTime::<Utc>::from_timestamp_millis(raw.captured_at).ok_or_else(|| {
        HandlerError::Other(anyhow::anyhow!(
            "Invalid captured_at timestamp: {}",
            raw.captured_at
        ))
    })?;

    let location = match raw.geometry.coordinates.as_slice() {
        // GeoJSON order: longitude first.
        [longitude, latitude, ..] => Some(ImageLocation {
            latitude: *latitude,
            longitude: *longitude,
            compass_angle: raw.compass_angle,
        }),
        _ => None,
    };

    Ok(MediaImage {
        id: raw.id.clone(),
        title: format!(
            "Photo from Mapillary {} ({}).jpg",
            taken.format("%Y-%m-%d"),
            raw.id
        ),
        dates: ImageDates { taken },
        creator: ImageCreator {
            id: raw.creator.id.clone(),
            username: raw.creator.username.clone(),
            profile_url: format!("https://www.mapillary.com/app/user/{}", raw.creator.username),
        },
        urls: ImageUrls {
            original: raw.thumb_original_url.clone(),
            preview: raw.thumb_1024_url.clone(),
            thumbnail: raw.thumb_256_url.clone(),
            page: Some(format!(
                "https://www.mapillary.com/app/?focus=photo&pKey={}",
                raw.id
            )),
        },
        location,
        dimensions: ImageDimensions {
            width: raw.width,
            height: raw.height,
        },
        camera: CameraInfo {
            make: raw.make.clone(),
            model: raw.model.clone(),
            is_pano: raw.is_pano,
        },
        license: Some(MAPILLARY_LICENSE.to_string()),
        tags: None,
        existing: None,
    })
}

/// Wikibase `time` value at day precision for a capture date.
fn day_precision_time(taken: DateTime<Utc>) -> TimeValue {
    TimeValue {
        time: format!("+{}T00:00:00Z", taken.format("%Y-%m-%d")),
        timezone: 0,
        before: 0,
        after: 0,
        precision: TIME_PRECISION_DAY,
        calendarmodel: CALENDAR_GREGORIAN.to_string(),
    }
}

/// Wikibase decimal amount string ("+180", "+179.5").
fn quantity_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("+{}", value as i64)
    } else {
        format!("+{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_image() -> MapillaryImage {
        MapillaryImage {
            id: "123".to_string(),
            captured_at: 1_600_000_000_000,
            compass_angle: Some(180.0),
            creator: MapillaryCreator {
                id: "u1".to_string(),
                username: "user1".to_string(),
            },
            geometry: MapillaryGeometry {
                coordinates: vec![10.0, 20.0],
            },
            width: 100,
            height: 100,
            make: Some("Canon".to_string()),
            model: Some("EOS".to_string()),
            is_pano: Some(false),
            thumb_256_url: "http://thumb".to_string(),
            thumb_1024_url: "http://preview".to_string(),
            thumb_original_url: "http://original".to_string(),
        }
    }

    fn handler() -> MapillaryHandler {
        MapillaryHandler::new(
            reqwest::Client::new(),
            "token".to_string(),
            CommonsSearch::new(
                reqwest::Client::new(),
                "https://commons.wikimedia.org/w/api.php",
            ),
        )
    }

    #[test]
    fn test_from_mapillary_normalization() {
        let image = from_mapillary(&raw_image()).unwrap();

        assert_eq!(image.id, "123");
        assert_eq!(image.title, "Photo from Mapillary 2020-09-13 (123).jpg");
        // GeoJSON coordinates are [lon, lat].
        let location = image.location.unwrap();
        assert_eq!(location.latitude, 20.0);
        assert_eq!(location.longitude, 10.0);
        assert_eq!(location.compass_angle, Some(180.0));
        assert_eq!(
            image.creator.profile_url,
            "https://www.mapillary.com/app/user/user1"
        );
        assert_eq!(image.urls.original, "http://original");
        assert_eq!(image.license.as_deref(), Some(MAPILLARY_LICENSE));
    }

    #[test]
    fn test_build_sdc_claims() {
        let handler = handler();
        let image = from_mapillary(&raw_image()).unwrap();
        let statements = handler.build_sdc(&image);

        let properties: Vec<&str> = statements
            .iter()
            .map(|s| s.mainsnak.property.as_str())
            .collect();
        assert_eq!(
            properties,
            vec![
                property::CREATOR,
                property::MAPILLARY_PHOTO_ID,
                property::PUBLISHED_IN,
                property::INCEPTION,
                property::SOURCE_OF_FILE,
                property::COORDINATES_OF_THE_POINT_OF_VIEW,
                property::COPYRIGHT_LICENSE,
                property::COPYRIGHT_STATUS,
            ]
        );

        // Creator is an unknown-value claim carrying the author qualifiers.
        let creator = &statements[0];
        assert_eq!(
            creator.qualifiers_order.as_deref(),
            Some(&[
                property::AUTHOR_NAME_STRING.to_string(),
                property::URL.to_string()
            ][..])
        );

        // Inception is a day-precision time.
        let inception = &statements[3];
        match inception.mainsnak.datavalue.as_ref().unwrap() {
            DataValue::Time(time) => {
                assert_eq!(time.time, "+2020-09-13T00:00:00Z");
                assert_eq!(time.precision, TIME_PRECISION_DAY);
            }
            other => panic!("unexpected inception datavalue: {:?}", other),
        }

        // Compass angle rides the coordinate claim as a heading qualifier.
        let coordinate = &statements[5];
        let heading = &coordinate.qualifiers.as_ref().unwrap()[property::HEADING][0];
        match heading.datavalue.as_ref().unwrap() {
            DataValue::Quantity(q) => assert_eq!(q.amount, "+180"),
            other => panic!("unexpected heading datavalue: {:?}", other),
        }
    }

    #[test]
    fn test_build_sdc_is_deterministic() {
        let handler = handler();
        let image = from_mapillary(&raw_image()).unwrap();
        assert_eq!(handler.build_sdc(&image), handler.build_sdc(&image));
    }

    #[test]
    fn test_quantity_amount_formatting() {
        assert_eq!(quantity_amount(180.0), "+180");
        assert_eq!(quantity_amount(179.5), "+179.5");
    }
}
