//! Searchable-parameter descriptors.
//!
//! Derives, from a listing type's search-field configuration, the set of
//! request parameters a collection endpoint should accept: one `s{field}`
//! parameter per field (or `smin{field}`/`smax{field}` pairs for bounded
//! searches), enum value sets for select-style widgets, bucketed range
//! enums, and the `sort_by` parameter for sort-enabled distance fields.

use serde::{Deserialize, Serialize};

use super::{FieldType, InputType, ListingType, SearchCondition, SearchField};
use crate::config::SearchSettings;

/// Value shape of a search parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ParamKind {
    /// Single string value, optionally restricted to an enum.
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
    },
    /// Array of string values, each restricted to an enum.
    StringList { enum_values: Vec<String> },
    /// Boolean toggle.
    Boolean,
}

/// One request parameter derived from a search field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParamSpec {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl SearchParamSpec {
    fn string(name: String, description: String) -> Self {
        Self {
            name,
            description,
            kind: ParamKind::String { enum_values: None },
            default: None,
        }
    }
}

/// Generate the bucketed range values for a link/select range widget.
///
/// The first token is always `"{min}-Less"` and the last `"{max}-More"`;
/// interior tokens are `"{lower}-{upper}"` pairs (or `"{lower}-Less"`
/// when `range_mode` collapses single-step buckets). The final pair is
/// overwritten by the `More` token, matching long-standing behavior that
/// search forms depend on.
pub fn range_bucket_values(min: u32, max: u32, step: u32, range_mode: bool) -> Vec<String> {
    let step = step.max(1);
    let mut values = Vec::new();

    let mut i = min;
    let mut j = min;
    let mut first = true;

    while i <= max {
        let mut value = if first {
            first = false;
            format!("{min}-Less")
        } else {
            let v = if step == 1 && range_mode {
                format!("{j}-Less")
            } else {
                format!("{j}-{i}")
            };
            j = i;
            v
        };

        i += step;
        if i > max {
            value = format!("{max}-More");
        }

        values.push(value);
    }

    values
}

/// Derive request-parameter descriptors for every searchable field of a
/// listing type. Fieldsets and unnamed fields are skipped.
pub fn search_param_specs(
    listing_type: &ListingType,
    settings: &SearchSettings,
) -> Vec<SearchParamSpec> {
    let mut specs = Vec::new();

    for field in &listing_type.search_fields {
        if field.name.is_empty() || field.field_type == FieldType::Fieldset {
            continue;
        }

        match field.input_type {
            InputType::Check | InputType::Link | InputType::Radio | InputType::Select => {
                specs.push(choice_spec(listing_type, field));
            }
            InputType::Range => range_specs(field, settings, &mut specs),
            InputType::Date => date_specs(field, &mut specs),
            InputType::Text => specs.push(text_spec(field)),
        }

        if field.field_type == FieldType::Distance && (field.sort_nearest || field.sort_farthest) {
            specs.push(distance_sort_spec(field));
        }
    }

    specs
}

fn base_description(field: &SearchField) -> String {
    let title = field.search_title.as_deref().unwrap_or(&field.name);
    match field.description.as_deref() {
        Some(desc) if !desc.is_empty() => format!("{title}: {desc}"),
        _ => title.to_string(),
    }
}

fn param_name(field: &SearchField) -> String {
    if field.field_type == FieldType::Address {
        format!("s{}_address", field.name)
    } else {
        format!("s{}", field.name)
    }
}

/// Enum values for select-style widgets: the empty sentinel plus either
/// taxonomy term values or the backing field's ungrouped option values.
fn choice_values(listing_type: &ListingType, field: &SearchField) -> Vec<String> {
    let mut values = vec![String::new()];

    if field.field_type == FieldType::Taxonomy {
        values.extend(field.term_values.iter().cloned());
    } else if let Some(backing) = listing_type.field(&field.name) {
        for option in &backing.options {
            if option.group.is_none() && !option.value.is_empty() {
                values.push(option.value.clone());
            }
        }
    }

    values
}

fn choice_spec(listing_type: &ListingType, field: &SearchField) -> SearchParamSpec {
    let values = choice_values(listing_type, field);
    let kind = if field.input_type == InputType::Check {
        ParamKind::StringList {
            enum_values: values,
        }
    } else {
        ParamKind::String {
            enum_values: Some(values),
        }
    };

    SearchParamSpec {
        name: param_name(field),
        description: base_description(field),
        kind,
        default: Some(String::new()),
    }
}

fn range_specs(field: &SearchField, settings: &SearchSettings, out: &mut Vec<SearchParamSpec>) {
    let description = base_description(field);
    let (min, max, step) = field.bucket_bounds();

    match field.condition {
        SearchCondition::Single => {
            out.push(SearchParamSpec::string(param_name(field), description));
        }
        SearchCondition::From => {
            out.push(SearchParamSpec::string(
                format!("smin{}", field.name),
                format!("{description} (Start search value)"),
            ));
            out.push(SearchParamSpec::string(
                format!("smax{}", field.name),
                format!("{description} (End search value)"),
            ));
        }
        SearchCondition::Link | SearchCondition::Select => {
            let mut values = vec![String::new()];
            values.extend(range_bucket_values(min, max, step, field.range_mode));
            out.push(SearchParamSpec {
                name: param_name(field),
                description,
                kind: ParamKind::String {
                    enum_values: Some(values),
                },
                default: Some(String::new()),
            });
        }
        SearchCondition::Radio => {
            let mut values = vec![String::new()];
            let mut i = step;
            while i <= max {
                values.push(i.to_string());
                i += step;
            }
            // The distance widget defaults to the configured radius.
            let default = if field.name == "dist" {
                settings.default_radius.to_string()
            } else {
                String::new()
            };
            out.push(SearchParamSpec {
                name: param_name(field),
                description,
                kind: ParamKind::String {
                    enum_values: Some(values),
                },
                default: Some(default),
            });
        }
    }
}

fn date_specs(field: &SearchField, out: &mut Vec<SearchParamSpec>) {
    let description = base_description(field);

    // Event-schedule dates use fixed parameter names instead of the
    // generic s{field} convention.
    let (single, min_name, max_name) = if field.name == "event" {
        (
            "event_start".to_string(),
            "event_start".to_string(),
            "event_end".to_string(),
        )
    } else {
        (
            param_name(field),
            format!("smin{}", field.name),
            format!("smax{}", field.name),
        )
    };

    match field.condition {
        SearchCondition::From => {
            out.push(SearchParamSpec::string(
                min_name,
                format!("{description} (Start search date)"),
            ));
            out.push(SearchParamSpec::string(
                max_name,
                format!("{description} (End search date)"),
            ));
        }
        _ => out.push(SearchParamSpec::string(single, description)),
    }
}

fn text_spec(field: &SearchField) -> SearchParamSpec {
    // Checkbox-backed fields and the special-offers column are boolean
    // toggles rather than text searches.
    if field.field_type == FieldType::Checkbox || field.name == "special_offers" {
        SearchParamSpec {
            name: param_name(field),
            description: base_description(field),
            kind: ParamKind::Boolean,
            default: Some("false".to_string()),
        }
    } else {
        SearchParamSpec::string(param_name(field), base_description(field))
    }
}

fn distance_sort_spec(field: &SearchField) -> SearchParamSpec {
    let mut values = vec![String::new()];
    if field.sort_nearest {
        values.push("nearest".to_string());
    }
    if field.sort_farthest {
        values.push("farthest".to_string());
    }

    SearchParamSpec {
        name: "sort_by".to_string(),
        description: base_description(field),
        kind: ParamKind::String {
            enum_values: Some(values),
        },
        default: Some(String::new()),
    }
}
