//! Country entity and the assignment used when replacing a region's countries.

/// A country, optionally assigned to one region.
///
/// `iso_2` is the identity; reassigning a country only changes `region_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub iso_2: String,
    pub iso_3: String,
    pub num_code: i32,
    pub name: String,
    pub display_name: String,
    pub region_id: Option<String>,
}

/// A country entry in a replacement list.
///
/// Only `iso_2` is required. The other attributes are used when the country
/// does not exist yet; an existing row keeps its own values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryAssignment {
    pub iso_2: String,
    pub iso_3: Option<String>,
    pub num_code: Option<i32>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

impl CountryAssignment {
    /// Assignment carrying only the country code.
    pub fn code(iso_2: impl Into<String>) -> Self {
        Self {
            iso_2: iso_2.into(),
            ..Default::default()
        }
    }

    /// Builds the row inserted when the country is unknown, falling back to
    /// the code for every missing attribute.
    pub fn into_country(self, region_id: &str) -> Country {
        let iso_2 = self.iso_2;
        Country {
            iso_3: self.iso_3.unwrap_or_else(|| iso_2.clone()),
            num_code: self.num_code.unwrap_or(0),
            name: self.name.unwrap_or_else(|| iso_2.clone()),
            display_name: self.display_name.unwrap_or_else(|| iso_2.clone()),
            region_id: Some(region_id.to_string()),
            iso_2,
        }
    }
}
