//! Normalized provider image records.
//!
//! Every handler maps its provider payload into a `MediaImage` so the rest of
//! the pipeline never sees provider-specific shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::time::iso_z;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCreator {
    pub id: String,
    pub username: String,
    pub profile_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrls {
    pub original: String,
    pub preview: String,
    pub thumbnail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compass_angle: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pano: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDates {
    #[serde(with = "iso_z")]
    pub taken: DateTime<Utc>,
}

/// A wiki file page that already references a provider image id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingPage {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaImage {
    pub id: String,
    pub title: String,
    pub dates: ImageDates,
    pub creator: ImageCreator,
    pub urls: ImageUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ImageLocation>,
    pub dimensions: ImageDimensions,
    #[serde(default)]
    pub camera: CameraInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Filled in by the existing-page lookup before the record is sent to a
    /// client; never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<Vec<ExistingPage>>,
}

/// A MediaInfo label in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub language: String,
    pub value: String,
}

/// Label equality used when a duplicate upload carries its own labels: both
/// absent counts as equal, one-sided absence does not.
pub fn labels_equal(a: Option<&Label>, b: Option<&Label>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_equal_both_none() {
        assert!(labels_equal(None, None));
    }

    #[test]
    fn test_labels_equal_one_none() {
        let label = Label {
            language: "en".to_string(),
            value: "Test".to_string(),
        };
        assert!(!labels_equal(None, Some(&label)));
        assert!(!labels_equal(Some(&label), None));
    }

    #[test]
    fn test_labels_equal_identical() {
        let a = Label {
            language: "en".to_string(),
            value: "Photo from Mapillary".to_string(),
        };
        let b = a.clone();
        assert!(labels_equal(Some(&a), Some(&b)));
    }

    #[test]
    fn test_labels_not_equal_different_languages() {
        let a = Label {
            language: "en".to_string(),
            value: "Photo from Mapillary".to_string(),
        };
        let b = Label {
            language: "es".to_string(),
            value: "Foto de Mapillary".to_string(),
        };
        assert!(!labels_equal(Some(&a), Some(&b)));
    }

    #[test]
    fn test_media_image_times_serialize_with_z() {
        let image = MediaImage {
            id: "123".to_string(),
            title: "Photo from Mapillary 2020-09-13 (123).jpg".to_string(),
            dates: ImageDates {
                taken: chrono::DateTime::parse_from_rfc3339("2020-09-13T12:26:40+00:00")
                    .unwrap()
                    .with_timezone(&Utc),
            },
            creator: ImageCreator {
                id: "u1".to_string(),
                username: "user1".to_string(),
                profile_url: "https://www.mapillary.com/app/user/user1".to_string(),
            },
            urls: ImageUrls {
                original: "http://original".to_string(),
                preview: "http://preview".to_string(),
                thumbnail: "http://thumb".to_string(),
                page: None,
            },
            location: Some(ImageLocation {
                latitude: 20.0,
                longitude: 10.0,
                compass_angle: Some(180.0),
            }),
            dimensions: ImageDimensions {
                width: 100,
                height: 100,
            },
            camera: CameraInfo::default(),
            license: None,
            tags: None,
            existing: None,
        };

        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["dates"]["taken"], "2020-09-13T12:26:40Z");
        // Null fields are stripped from the payload.
        assert!(json.get("license").is_none());
    }
}
