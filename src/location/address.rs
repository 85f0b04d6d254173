//! Address breakdown returned by Nominatim and the label extraction policy.
//!
//! City and district labels are picked by walking an ordered list of address
//! fields and taking the first non-blank one.

use serde::Deserialize;

/// Label used when neither the address nor the response carries any name.
pub const UNKNOWN_PLACE: &str = "Unknown place";

/// The subset of Nominatim's `address` object we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub hamlet: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub suburb: Option<String>,
    #[serde(default)]
    pub neighbourhood: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub city_district: Option<String>,
    #[serde(default)]
    pub quarter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    City,
    Town,
    Village,
    Hamlet,
    Municipality,
    County,
    State,
    Country,
    Suburb,
    Neighbourhood,
    District,
    CityDistrict,
    Quarter,
}

/// Fields tried for the city label, most specific first.
pub const CITY_FIELDS: &[AddressField] = &[
    AddressField::City,
    AddressField::Town,
    AddressField::Village,
    AddressField::Hamlet,
    AddressField::Municipality,
    AddressField::County,
    AddressField::State,
    AddressField::Country,
];

pub const DISTRICT_FIELDS: &[AddressField] = &[
    AddressField::Suburb,
    AddressField::Neighbourhood,
    AddressField::District,
    AddressField::CityDistrict,
    AddressField::Quarter,
];

impl Address {
    pub fn get(&self, field: AddressField) -> Option<&str> {
        let value = match field {
            AddressField::City => &self.city,
            AddressField::Town => &self.town,
            AddressField::Village => &self.village,
            AddressField::Hamlet => &self.hamlet,
            AddressField::Municipality => &self.municipality,
            AddressField::County => &self.county,
            AddressField::State => &self.state,
            AddressField::Country => &self.country,
            AddressField::Suburb => &self.suburb,
            AddressField::Neighbourhood => &self.neighbourhood,
            AddressField::District => &self.district,
            AddressField::CityDistrict => &self.city_district,
            AddressField::Quarter => &self.quarter,
        };
        value.as_deref().and_then(non_blank)
    }

    /// First non-blank value among `fields`, in order.
    pub fn first_of(&self, fields: &[AddressField]) -> Option<&str> {
        fields.iter().find_map(|&f| self.get(f))
    }

    /// City label: address fields first, then `fallbacks` in order, then [`UNKNOWN_PLACE`].
    pub fn city_label(&self, fallbacks: &[Option<&str>]) -> String {
        self.first_of(CITY_FIELDS)
            .or_else(|| fallbacks.iter().find_map(|f| f.and_then(non_blank)))
            .unwrap_or(UNKNOWN_PLACE)
            .to_string()
    }

    /// District label, or an empty string when the address has none.
    pub fn district_label(&self) -> String {
        self.first_of(DISTRICT_FIELDS).unwrap_or_default().to_string()
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t) }
}
