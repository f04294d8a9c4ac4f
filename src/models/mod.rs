use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

/// Well-known listing fields, keyed by the label the site prints next to them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyField {
    Area,
    Price,
    Frontage,
    AccessRoad,
    HouseDirection,
    BalconyDirection,
    Floors,
    Bedrooms,
    Toilets,
    LegalStatus,
    Furnishing,
    PostDate,
    ExpiryDate,
    ListingType,
    ListingCode,
    Address,
}

impl PropertyField {
    pub const ALL: [PropertyField; 16] = [
        PropertyField::Area,
        PropertyField::Price,
        PropertyField::Frontage,
        PropertyField::AccessRoad,
        PropertyField::HouseDirection,
        PropertyField::BalconyDirection,
        PropertyField::Floors,
        PropertyField::Bedrooms,
        PropertyField::Toilets,
        PropertyField::LegalStatus,
        PropertyField::Furnishing,
        PropertyField::PostDate,
        PropertyField::ExpiryDate,
        PropertyField::ListingType,
        PropertyField::ListingCode,
        PropertyField::Address,
    ];

    /// Column name used both for matching page titles and in the CSV header
    pub fn label(self) -> &'static str {
        match self {
            PropertyField::Area => "Diện tích",
            PropertyField::Price => "Mức giá",
            PropertyField::Frontage => "Mặt tiền",
            PropertyField::AccessRoad => "Đường vào",
            PropertyField::HouseDirection => "Hướng nhà",
            PropertyField::BalconyDirection => "Hướng ban công",
            PropertyField::Floors => "Số tầng",
            PropertyField::Bedrooms => "Số phòng ngủ",
            PropertyField::Toilets => "Số toilet",
            PropertyField::LegalStatus => "Pháp lý",
            PropertyField::Furnishing => "Nội thất",
            PropertyField::PostDate => "Ngày đăng",
            PropertyField::ExpiryDate => "Ngày hết hạn",
            PropertyField::ListingType => "Loại tin",
            PropertyField::ListingCode => "Mã tin",
            PropertyField::Address => "Địa chỉ",
        }
    }
}

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const URL: &str = "url";

/// One scraped listing.
///
/// Fields are kept in insertion order: the sixteen well-known labels come
/// first, followed by any other title seen on the page. Values are raw trimmed
/// text; only the coordinates are parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    fields: Vec<(String, Option<String>)>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub url: String,
}

impl PropertyRecord {
    /// Create a record with every well-known field absent
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            fields: PropertyField::ALL
                .iter()
                .map(|f| (f.label().to_string(), None))
                .collect(),
            latitude: None,
            longitude: None,
            url: url.into(),
        }
    }

    /// Assign a value under `key`, overwriting any earlier value.
    /// Unknown keys are appended after the existing ones. A key named like
    /// one of the record's own columns is stored as `<key> (page)`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = match key {
            LATITUDE | LONGITUDE | URL => {
                let renamed = format!("{} (page)", key);
                debug!(url = %self.url, key, renamed = %renamed, "Renamed reserved page title");
                renamed
            }
            _ => key.to_string(),
        };

        let value = Some(value.into());
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn field(&self, field: PropertyField) -> Option<&str> {
        self.get(field.label())
    }

    /// All text keys in order, including absent well-known fields
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Keys beyond the well-known set, in the order they were first assigned
    pub fn extra_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().skip(PropertyField::ALL.len())
    }

    /// Value of any column, coordinates and url included, rendered as text
    pub fn column(&self, name: &str) -> Option<String> {
        match name {
            LATITUDE => self.latitude.map(|v| v.to_string()),
            LONGITUDE => self.longitude.map(|v| v.to_string()),
            URL => Some(self.url.clone()),
            _ => self.get(name).map(str::to_string),
        }
    }
}

impl Serialize for PropertyRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 3))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(LATITUDE, &self.latitude)?;
        map.serialize_entry(LONGITUDE, &self.longitude)?;
        map.serialize_entry(URL, &self.url)?;
        map.end()
    }
}

/// One listing page to render, tagged with the base URL it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrl {
    pub base_url: String,
    /// 1-based page number within the base URL's sequence
    pub index: u32,
    pub url: String,
}
