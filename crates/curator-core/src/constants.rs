//! Wikidata entities and properties used when deriving SDC claims.

/// Wikidata item ids (Q-ids).
pub mod entity {
    pub const COPYRIGHTED: &str = "Q50423863";
    pub const FILE_AVAILABLE_ON_INTERNET: &str = "Q74228490";
    pub const FLICKR: &str = "Q103204";
    pub const MAPILLARY: &str = "Q17985544";
    pub const MAPILLARY_DATABASE: &str = "Q26757498";
    pub const EARTH: &str = "Q2";
    pub const CC_BY_SA_4_0: &str = "Q18199165";
    pub const CC_BY_4_0: &str = "Q20007257";
    pub const CC_BY_SA_2_0: &str = "Q19068220";
    pub const CC_BY_2_0: &str = "Q19125117";
    pub const CC_ZERO: &str = "Q6938433";
}

/// Wikidata property ids (P-ids).
pub mod property {
    pub const AUTHOR_NAME_STRING: &str = "P2093";
    pub const COORDINATES_OF_THE_POINT_OF_VIEW: &str = "P1259";
    pub const COPYRIGHT_LICENSE: &str = "P275";
    pub const COPYRIGHT_STATUS: &str = "P6216";
    pub const CREATOR: &str = "P170";
    pub const FLICKR_PHOTO_ID: &str = "P12120";
    pub const FLICKR_USER_ID: &str = "P3267";
    pub const HEADING: &str = "P7787";
    pub const INCEPTION: &str = "P571";
    pub const MAPILLARY_PHOTO_ID: &str = "P1947";
    pub const OPERATOR: &str = "P137";
    pub const PUBLISHED_IN: &str = "P1433";
    pub const SOURCE_OF_FILE: &str = "P7482";
    pub const URL: &str = "P2699";
}

/// Globe URI for terrestrial coordinates.
pub const GLOBE_EARTH: &str = "http://www.wikidata.org/entity/Q2";

/// Gregorian calendar model URI for `time` datavalues.
pub const CALENDAR_GREGORIAN: &str = "http://www.wikidata.org/entity/Q1985727";

/// `time` datavalue precision for a full day.
pub const TIME_PRECISION_DAY: u32 = 11;
