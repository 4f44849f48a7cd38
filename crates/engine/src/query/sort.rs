//! Sort option resolution.
//!
//! Catalog sort fields expand into user-selectable keys of the form
//! `{field}_asc` / `{field}_desc` (plus the `random` pseudo-key). The
//! requested value may also be a legacy alias such as `newest` or `az`,
//! or a geo sort (`nearest` / `farthest`) that only applies when the
//! request carries coordinates.

use std::collections::BTreeMap;

use sea_query::{Expr, Order};
use tracing::warn;

use super::types::OrderTerm;
use crate::catalog::{FieldType, ListingType, SortField, columns};

/// One user-selectable ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Backing field name (`random` for the random pseudo-sort).
    pub field: String,
    pub descending: bool,
    pub label: String,
}

/// Sort keys offered by a listing type.
#[derive(Debug, Clone, Default)]
pub struct SortOptions {
    pub keys: BTreeMap<String, SortKey>,
    pub default_key: Option<String>,
}

impl SortOptions {
    /// The configured default, falling back to newest-first.
    pub fn default_or_fallback(&self) -> &str {
        self.default_key.as_deref().unwrap_or("post_date_desc")
    }
}

/// Expand catalog sort fields into selectable keys.
pub fn resolve_sort_options(sort_fields: &[SortField]) -> SortOptions {
    let mut options = SortOptions::default();

    for field in sort_fields {
        if field.field_type == Some(FieldType::Random) {
            options.keys.insert(
                "random".to_string(),
                SortKey {
                    field: "random".to_string(),
                    descending: false,
                    label: field.label.clone(),
                },
            );
            if field.is_default {
                options.default_key = Some("random".to_string());
            }
            continue;
        }

        // Review counts live in the rating_count column.
        let name = if field.name == "comment_count" {
            "rating_count"
        } else {
            &field.name
        };

        if field.asc {
            options.keys.insert(
                format!("{name}_asc"),
                SortKey {
                    field: name.to_string(),
                    descending: false,
                    label: field.asc_title.clone().unwrap_or_else(|| field.label.clone()),
                },
            );
        }
        if field.desc {
            options.keys.insert(
                format!("{name}_desc"),
                SortKey {
                    field: name.to_string(),
                    descending: true,
                    label: field
                        .desc_title
                        .clone()
                        .unwrap_or_else(|| field.label.clone()),
                },
            );
        }

        if field.is_default {
            let suffix = if field.desc { "desc" } else { "asc" };
            options.default_key = Some(format!("{name}_{suffix}"));
        }
    }

    options
}

/// Map a legacy alias to its canonical sort key.
fn resolve_alias(requested: &str) -> &str {
    match requested {
        "az" => "post_title_asc",
        "za" => "post_title_desc",
        "newest" => "post_date_desc",
        "oldest" => "post_date_asc",
        "low_review" => "rating_count_asc",
        "high_review" => "rating_count_desc",
        "low_rating" => "overall_rating_asc",
        "high_rating" => "overall_rating_desc",
        "featured" => "is_featured_asc",
        other => other,
    }
}

/// Resolve the requested sort down to a concrete key.
///
/// Geo sorts without coordinates fall back to the type's default, as
/// does an absent or empty request.
pub fn resolve_requested(options: &SortOptions, requested: Option<&str>, has_geo: bool) -> String {
    let requested = requested.map(str::trim).filter(|s| !s.is_empty());
    let Some(requested) = requested else {
        return options.default_or_fallback().to_string();
    };

    let key = resolve_alias(requested);
    if matches!(key, "nearest" | "farthest") && !has_geo {
        return options.default_or_fallback().to_string();
    }

    key.to_string()
}

/// Split a `{field}_asc` / `{field}_desc` key; bare keys sort ascending.
fn split_direction(key: &str) -> (&str, Order) {
    if let Some(field) = key.strip_suffix("_desc") {
        (field, Order::Desc)
    } else if let Some(field) = key.strip_suffix("_asc") {
        (field, Order::Asc)
    } else {
        (key, Order::Asc)
    }
}

/// Order terms for a resolved sort key.
///
/// Rating sorts carry a secondary term so ties break on the companion
/// column. Unknown fields order nothing; the stable suffix still gives
/// the query a deterministic result order.
pub fn order_terms_for_key(listing: &ListingType, key: &str) -> Vec<OrderTerm> {
    let table = listing.table.as_str();

    match key {
        "random" => {
            return vec![OrderTerm::expression(Expr::cust("RAND()"), Order::Asc)];
        }
        "nearest" => {
            return vec![OrderTerm::expression(Expr::cust("distance"), Order::Asc)];
        }
        "farthest" => {
            return vec![OrderTerm::expression(Expr::cust("distance"), Order::Desc)];
        }
        _ => {}
    }

    let (field, order) = split_direction(key);
    match field {
        columns::TITLE | columns::DATE => vec![OrderTerm::column(table, field, order)],
        columns::OVERALL_RATING => vec![
            OrderTerm::column(table, columns::OVERALL_RATING, order.clone()),
            OrderTerm::column(table, columns::RATING_COUNT, order),
        ],
        columns::RATING_COUNT => vec![
            OrderTerm::column(table, columns::RATING_COUNT, order.clone()),
            OrderTerm::column(table, columns::OVERALL_RATING, order),
        ],
        other if listing.has_column(other) => vec![OrderTerm::column(table, other, order)],
        other => {
            warn!(field = other, "unknown sort field, ignoring");
            Vec::new()
        }
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::test_fixtures;

    #[test]
    fn sort_fields_expand_to_directional_keys() {
        let listing = test_fixtures::restaurant();
        let options = resolve_sort_options(&listing.sort_fields);

        assert!(options.keys.contains_key("post_date_desc"));
        assert!(options.keys.contains_key("overall_rating_asc"));
        assert!(options.keys.contains_key("overall_rating_desc"));
        assert!(!options.keys.contains_key("post_date_asc"));
        assert_eq!(options.default_key.as_deref(), Some("post_date_desc"));
    }

    #[test]
    fn random_sort_field_yields_random_key() {
        let fields = vec![SortField {
            name: "whatever".to_string(),
            label: "Random".to_string(),
            field_type: Some(FieldType::Random),
            asc: false,
            desc: false,
            asc_title: None,
            desc_title: None,
            is_default: true,
        }];
        let options = resolve_sort_options(&fields);

        assert!(options.keys.contains_key("random"));
        assert_eq!(options.default_key.as_deref(), Some("random"));
    }

    #[test]
    fn comment_count_maps_to_rating_count() {
        let fields = vec![SortField {
            name: "comment_count".to_string(),
            label: "Reviews".to_string(),
            field_type: None,
            asc: false,
            desc: true,
            asc_title: None,
            desc_title: None,
            is_default: false,
        }];
        let options = resolve_sort_options(&fields);
        assert!(options.keys.contains_key("rating_count_desc"));
    }

    #[test]
    fn no_default_falls_back_to_newest() {
        let options = SortOptions::default();
        assert_eq!(options.default_or_fallback(), "post_date_desc");
        assert_eq!(resolve_requested(&options, None, false), "post_date_desc");
        assert_eq!(resolve_requested(&options, Some("  "), false), "post_date_desc");
    }

    #[test]
    fn aliases_resolve_to_canonical_keys() {
        let options = SortOptions::default();
        for (alias, key) in [
            ("az", "post_title_asc"),
            ("za", "post_title_desc"),
            ("newest", "post_date_desc"),
            ("oldest", "post_date_asc"),
            ("low_review", "rating_count_asc"),
            ("high_review", "rating_count_desc"),
            ("low_rating", "overall_rating_asc"),
            ("high_rating", "overall_rating_desc"),
            ("featured", "is_featured_asc"),
        ] {
            assert_eq!(resolve_requested(&options, Some(alias), false), key);
        }
    }

    #[test]
    fn geo_sort_requires_coordinates() {
        let options = SortOptions::default();
        assert_eq!(resolve_requested(&options, Some("nearest"), true), "nearest");
        assert_eq!(
            resolve_requested(&options, Some("nearest"), false),
            "post_date_desc"
        );
        assert_eq!(
            resolve_requested(&options, Some("farthest"), false),
            "post_date_desc"
        );
    }

    #[test]
    fn rating_sorts_carry_secondary_terms() {
        let listing = test_fixtures::restaurant();

        let terms = order_terms_for_key(&listing, "overall_rating_desc");
        assert_eq!(terms.len(), 2);
        assert_eq!(
            terms[0].column_hint.as_deref(),
            Some("restaurant_detail.overall_rating")
        );
        assert_eq!(
            terms[1].column_hint.as_deref(),
            Some("restaurant_detail.rating_count")
        );

        let terms = order_terms_for_key(&listing, "rating_count_asc");
        assert_eq!(
            terms[0].column_hint.as_deref(),
            Some("restaurant_detail.rating_count")
        );
    }

    #[test]
    fn custom_field_sort_uses_its_column() {
        let listing = test_fixtures::restaurant();
        let terms = order_terms_for_key(&listing, "price_asc");
        assert_eq!(terms.len(), 1);
        assert_eq!(
            terms[0].column_hint.as_deref(),
            Some("restaurant_detail.price")
        );
    }

    #[test]
    fn unknown_field_orders_nothing() {
        let listing = test_fixtures::restaurant();
        assert!(order_terms_for_key(&listing, "bogus_asc").is_empty());
    }

    #[test]
    fn random_key_orders_by_rand() {
        let listing = test_fixtures::restaurant();
        let terms = order_terms_for_key(&listing, "random");
        assert_eq!(terms.len(), 1);
        assert!(terms[0].column_hint.is_none());
    }
}
