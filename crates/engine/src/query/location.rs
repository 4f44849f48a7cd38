//! Location hierarchy filtering.
//!
//! The detail table stores a listing's place as a single
//! `post_locations` string of bracketed slugs, city first:
//! `[city],[region],[country]`. Each supplied level becomes its own
//! LIKE pattern anchored to its position in that string, ANDed with the
//! others, so partial hierarchies still match.

use sea_query::{Expr, SimpleExpr};

use super::predicate::{col, escape_like};
use super::types::SearchParameters;
use crate::catalog::columns;

fn slug(value: &str) -> String {
    format!("[{}]", escape_like(value.trim()))
}

fn locations_like(table: &str, pattern: String) -> SimpleExpr {
    col(table, columns::LOCATIONS).like(pattern)
}

/// LIKE conditions for the requested country/region/city combination.
pub(crate) fn location_predicates(table: &str, params: &SearchParameters) -> Vec<SimpleExpr> {
    let city = params.city.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let region = params
        .region
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let country = params
        .country
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match (city, region, country) {
        (Some(city), Some(region), Some(country)) => vec![locations_like(
            table,
            format!("{},{},{}", slug(city), slug(region), slug(country)),
        )],
        (Some(city), Some(region), None) => vec![locations_like(
            table,
            format!("{},{},%", slug(city), slug(region)),
        )],
        // City and country without the region level in between need two
        // independently anchored patterns.
        (Some(city), None, Some(country)) => vec![
            locations_like(table, format!("{},%", slug(city))),
            locations_like(table, format!("%,{}", slug(country))),
        ],
        (None, Some(region), Some(country)) => vec![locations_like(
            table,
            format!("%,{},{}", slug(region), slug(country)),
        )],
        (Some(city), None, None) => vec![locations_like(table, format!("{},%", slug(city)))],
        (None, Some(region), None) => {
            vec![locations_like(table, format!("%,{},%", slug(region)))]
        }
        (None, None, Some(country)) => {
            vec![locations_like(table, format!("%,{}", slug(country)))]
        }
        (None, None, None) => Vec::new(),
    }
}

/// Neighbourhood condition: one slug matches directly, several become
/// an IN over the column.
pub(crate) fn neighbourhood_predicate(
    table: &str,
    neighbourhoods: &[String],
) -> Option<SimpleExpr> {
    let slugs: Vec<&str> = neighbourhoods
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    match slugs.as_slice() {
        [] => None,
        [only] => Some(col(table, columns::NEIGHBOURHOOD).like(escape_like(only))),
        many => Some(
            Expr::col((
                sea_query::Alias::new(table),
                sea_query::Alias::new(columns::NEIGHBOURHOOD),
            ))
            .is_in(many.iter().map(|s| (*s).to_string())),
        ),
    }
}
