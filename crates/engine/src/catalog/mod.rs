//! Field catalog.
//!
//! Long-lived configuration describing each listing type: its detail
//! table, custom fields, searchable-field configuration, and sort
//! options. Loaded once at startup (see [`yaml`]) and frozen; query
//! building only ever reads it.

mod schema;
mod yaml;

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

pub use schema::{ParamKind, SearchParamSpec, range_bucket_values, search_param_specs};
pub use yaml::load_catalog_dir;

/// Column names shared by every listing detail table.
pub mod columns {
    pub const ID: &str = "id";
    pub const TITLE: &str = "post_title";
    pub const CONTENT: &str = "post_content";
    pub const DATE: &str = "post_date";
    pub const ADDRESS: &str = "post_address";
    pub const LATITUDE: &str = "post_latitude";
    pub const LONGITUDE: &str = "post_longitude";
    pub const LOCATIONS: &str = "post_locations";
    pub const NEIGHBOURHOOD: &str = "post_neighbourhood";
    pub const FEATURED: &str = "is_featured";
    pub const FEATURED_IMAGE: &str = "featured_image";
    pub const VIDEO: &str = "video";
    pub const SPECIAL_OFFERS: &str = "special_offers";
    pub const OVERALL_RATING: &str = "overall_rating";
    pub const RATING_COUNT: &str = "rating_count";

    /// Event schedule table columns.
    pub const EVENT_ID: &str = "event_id";
    pub const EVENT_DATE: &str = "event_date";
    pub const EVENT_END_DATE: &str = "event_enddate";
    pub const EVENT_START_TIME: &str = "event_starttime";

    pub const ALL: &[&str] = &[
        ID,
        TITLE,
        CONTENT,
        DATE,
        ADDRESS,
        LATITUDE,
        LONGITUDE,
        LOCATIONS,
        NEIGHBOURHOOD,
        FEATURED,
        FEATURED_IMAGE,
        VIDEO,
        SPECIAL_OFFERS,
        OVERALL_RATING,
        RATING_COUNT,
    ];
}

/// Declared display/storage type of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Checkbox,
    Radio,
    Select,
    Multiselect,
    Datepicker,
    Time,
    Text,
    Textarea,
    Taxonomy,
    Address,
    Distance,
    Random,
    Fieldset,
}

/// Underlying data type of a custom field column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Text,
    Integer,
    Float,
    Date,
    Time,
    Datetime,
}

/// Search widget rendered for an advance-search field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Check,
    Link,
    Radio,
    Select,
    Range,
    Date,
    Text,
}

/// How a range/date field is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCondition {
    /// Single value, equality.
    #[default]
    Single,
    /// Independent min/max bounds.
    From,
    /// Discrete step values rendered as radios.
    Radio,
    /// Bucketed values rendered as links.
    Link,
    /// Bucketed values rendered as a select.
    Select,
}

/// Combinator for multiple values of the same field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchOperator {
    #[default]
    And,
    Or,
}

/// One selectable option of a select/radio/multiselect/taxonomy field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
    /// Option group heading; grouped entries are headings, not values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A site-configured attribute of a listing type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    /// Column name in the detail table. Unique per listing type.
    pub name: String,

    /// Admin-facing title.
    pub admin_title: String,

    /// Public-facing title; falls back to the admin title when empty.
    #[serde(default)]
    pub site_title: String,

    pub field_type: FieldType,

    #[serde(default)]
    pub data_type: DataType,

    #[serde(default)]
    pub options: Vec<FieldOption>,

    /// Display format for datepicker fields (PHP-style, e.g. "d/m/Y").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,

    #[serde(default)]
    pub search_operator: SearchOperator,
}

impl CustomField {
    /// Public title, falling back to the admin title.
    pub fn title(&self) -> &str {
        if self.site_title.is_empty() {
            &self.admin_title
        } else {
            &self.site_title
        }
    }
}

/// Search configuration layered on top of a custom field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchField {
    /// Backing custom field name.
    pub name: String,

    /// Site type of the backing field.
    pub field_type: FieldType,

    /// Widget used to search it.
    pub input_type: InputType,

    #[serde(default)]
    pub condition: SearchCondition,

    /// Title shown on the search form; falls back to the field title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Range bucket bounds; zero/absent values fall back to 10/50/10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,

    /// Collapse single-step buckets to "{n}-Less" tokens.
    #[serde(default)]
    pub range_mode: bool,

    /// Enumerable values for taxonomy fields, supplied by the term
    /// resolver at catalog build time.
    #[serde(default)]
    pub term_values: Vec<String>,

    /// For distance fields: expose `nearest` / `farthest` sorting.
    #[serde(default)]
    pub sort_nearest: bool,
    #[serde(default)]
    pub sort_farthest: bool,
}

impl SearchField {
    /// Bucket bounds with the historical 10/50/10 fallbacks.
    pub fn bucket_bounds(&self) -> (u32, u32, u32) {
        let min = self.min_value.filter(|v| *v > 0).unwrap_or(10);
        let max = self.max_value.filter(|v| *v > 0).unwrap_or(50);
        let step = self.step.filter(|v| *v > 0).unwrap_or(10);
        (min, max, step)
    }
}

/// A configurable ordering choice exposed to end users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortField {
    /// Backing field name, or a pseudo-name for the random type.
    pub name: String,

    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Whether ascending ordering is offered.
    #[serde(default)]
    pub asc: bool,

    /// Whether descending ordering is offered.
    #[serde(default)]
    pub desc: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asc_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc_title: Option<String>,

    /// Exactly one sort field per listing type should set this.
    #[serde(default)]
    pub is_default: bool,
}

/// A directory content type with its detail table and configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingType {
    /// Machine name, e.g. "place" or "event".
    pub name: String,

    /// Detail table holding one row per listing.
    pub table: String,

    /// Schedule table for event-bearing types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_table: Option<String>,

    #[serde(default)]
    pub fields: Vec<CustomField>,

    #[serde(default)]
    pub search_fields: Vec<SearchField>,

    #[serde(default)]
    pub sort_fields: Vec<SortField>,
}

impl ListingType {
    /// Whether this type carries an event schedule.
    pub fn has_events(&self) -> bool {
        self.schedule_table.is_some()
    }

    /// Look up a custom field by name.
    pub fn field(&self, name: &str) -> Option<&CustomField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` is a known column of the detail table: either a
    /// shared base column or a configured custom field.
    pub fn has_column(&self, name: &str) -> bool {
        columns::ALL.contains(&name) || self.field(name).is_some()
    }
}

/// Registry of listing types.
///
/// Populated once at startup and frozen; concurrent readers need no
/// locking discipline beyond the map itself.
#[derive(Clone, Default)]
pub struct FieldCatalog {
    types: Arc<DashMap<String, Arc<ListingType>>>,
}

impl FieldCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listing type, replacing any existing entry.
    pub fn insert(&self, listing_type: ListingType) {
        self.types
            .insert(listing_type.name.clone(), Arc::new(listing_type));
    }

    /// Get a listing type by name.
    pub fn get(&self, name: &str) -> Option<Arc<ListingType>> {
        self.types.get(name).map(|r| r.clone())
    }

    /// Custom fields for a listing type; empty when unknown.
    pub fn custom_fields(&self, name: &str) -> Vec<CustomField> {
        self.get(name).map(|t| t.fields.clone()).unwrap_or_default()
    }

    /// Advance-search fields for a listing type; empty when unknown.
    pub fn search_fields(&self, name: &str) -> Vec<SearchField> {
        self.get(name)
            .map(|t| t.search_fields.clone())
            .unwrap_or_default()
    }

    /// Sort options for a listing type; empty when unknown.
    pub fn sort_fields(&self, name: &str) -> Vec<SortField> {
        self.get(name)
            .map(|t| t.sort_fields.clone())
            .unwrap_or_default()
    }

    /// Registered listing type names.
    pub fn type_names(&self) -> Vec<String> {
        self.types.iter().map(|r| r.key().clone()).collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl std::fmt::Debug for FieldCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCatalog")
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    /// A "restaurant" listing type exercising every field kind.
    pub fn restaurant() -> ListingType {
        ListingType {
            name: "restaurant".to_string(),
            table: "restaurant_detail".to_string(),
            schedule_table: None,
            fields: vec![
                CustomField {
                    name: "price".to_string(),
                    admin_title: "Price".to_string(),
                    site_title: "Price".to_string(),
                    field_type: FieldType::Text,
                    data_type: DataType::Integer,
                    options: vec![],
                    date_format: None,
                    search_operator: SearchOperator::And,
                },
                CustomField {
                    name: "amenities".to_string(),
                    admin_title: "Amenities".to_string(),
                    site_title: String::new(),
                    field_type: FieldType::Multiselect,
                    data_type: DataType::Text,
                    options: vec![
                        FieldOption {
                            value: "wifi".to_string(),
                            label: "WiFi".to_string(),
                            group: None,
                        },
                        FieldOption {
                            value: "parking".to_string(),
                            label: "Parking".to_string(),
                            group: None,
                        },
                    ],
                    date_format: None,
                    search_operator: SearchOperator::Or,
                },
                CustomField {
                    name: "open_date".to_string(),
                    admin_title: "Opening date".to_string(),
                    site_title: String::new(),
                    field_type: FieldType::Datepicker,
                    data_type: DataType::Date,
                    options: vec![],
                    date_format: Some("d/m/Y".to_string()),
                    search_operator: SearchOperator::And,
                },
            ],
            search_fields: vec![
                SearchField {
                    name: "price".to_string(),
                    field_type: FieldType::Text,
                    input_type: InputType::Range,
                    condition: SearchCondition::From,
                    search_title: Some("Price".to_string()),
                    description: None,
                    min_value: Some(10),
                    max_value: Some(50),
                    step: Some(10),
                    range_mode: false,
                    term_values: vec![],
                    sort_nearest: false,
                    sort_farthest: false,
                },
                SearchField {
                    name: "amenities".to_string(),
                    field_type: FieldType::Multiselect,
                    input_type: InputType::Check,
                    condition: SearchCondition::Single,
                    search_title: None,
                    description: None,
                    min_value: None,
                    max_value: None,
                    step: None,
                    range_mode: false,
                    term_values: vec![],
                    sort_nearest: false,
                    sort_farthest: false,
                },
                SearchField {
                    name: "open_date".to_string(),
                    field_type: FieldType::Datepicker,
                    input_type: InputType::Date,
                    condition: SearchCondition::From,
                    search_title: None,
                    description: None,
                    min_value: None,
                    max_value: None,
                    step: None,
                    range_mode: false,
                    term_values: vec![],
                    sort_nearest: false,
                    sort_farthest: false,
                },
            ],
            sort_fields: vec![
                SortField {
                    name: "post_date".to_string(),
                    label: "Newest".to_string(),
                    field_type: None,
                    asc: false,
                    desc: true,
                    asc_title: None,
                    desc_title: Some("Newest".to_string()),
                    is_default: true,
                },
                SortField {
                    name: "overall_rating".to_string(),
                    label: "Rating".to_string(),
                    field_type: None,
                    asc: true,
                    desc: true,
                    asc_title: Some("Lowest Rating".to_string()),
                    desc_title: Some("Highest Rating".to_string()),
                    is_default: false,
                },
            ],
        }
    }

    /// An event-bearing listing type.
    pub fn event() -> ListingType {
        ListingType {
            name: "event".to_string(),
            table: "event_detail".to_string(),
            schedule_table: Some("event_schedule".to_string()),
            fields: vec![],
            search_fields: vec![SearchField {
                name: "event".to_string(),
                field_type: FieldType::Datepicker,
                input_type: InputType::Date,
                condition: SearchCondition::From,
                search_title: None,
                description: None,
                min_value: None,
                max_value: None,
                step: None,
                range_mode: false,
                term_values: vec![],
                sort_nearest: false,
                sort_farthest: false,
            }],
            sort_fields: vec![],
        }
    }
}
