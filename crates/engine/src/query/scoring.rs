//! Keyword relevance scoring and the distance column.
//!
//! A keyword search selects weighted match flags alongside the listing
//! columns and orders on their sum, so exact title hits surface first,
//! then token coverage, then content mentions. The distance column is a
//! haversine over the stored coordinates, computed in the database so
//! it can both order and bound the query.

use sea_query::{Cond, Expr, Order, SimpleExpr};

use super::predicate::{col, escape_like};
use super::types::OrderTerm;
use crate::catalog::columns;
use crate::config::SearchSettings;

const WEIGHT_EXACT_TITLE: &str = "10";
const WEIGHT_TITLE: &str = "2";
const WEIGHT_FEATURED: &str = "5";
const WEIGHT_ALL_TOKENS: &str = "100";
const WEIGHT_ANY_TOKEN: &str = "50";
const WEIGHT_CONTENT: &str = "1.5";

/// Split a keyword into its scoring tokens: whitespace-separated words
/// longer than the configured limit.
pub fn significant_keywords(text: &str, word_limit: usize) -> Vec<String> {
    text.split_whitespace()
        .filter(|word| word.chars().count() > word_limit)
        .map(str::to_string)
        .collect()
}

/// Everything a keyword search adds to the plan.
pub(crate) struct Relevance {
    /// Aliased match-flag expressions for the select list.
    pub selects: Vec<(SimpleExpr, String)>,
    /// The weighted-sum ordering over those aliases.
    pub order: OrderTerm,
    /// The WHERE condition restricting to matching rows.
    pub filter: SimpleExpr,
}

/// `CASE WHEN col LIKE any-of(patterns) THEN weight ELSE 0 END`,
/// with every pattern bound.
fn weighted_like(table: &str, column: &str, patterns: &[String], weight: &str) -> SimpleExpr {
    let tests = patterns
        .iter()
        .map(|_| format!("`{table}`.`{column}` LIKE ?"))
        .collect::<Vec<_>>()
        .join(" OR ");
    Expr::cust_with_values(
        format!("CASE WHEN {tests} THEN {weight} ELSE 0 END"),
        patterns.to_vec(),
    )
}

pub(crate) fn relevance(table: &str, keyword: &str, word_limit: usize) -> Relevance {
    let tokens = significant_keywords(keyword, word_limit);
    let escaped = escape_like(keyword);
    let scored_tokens = tokens.len() >= 2;

    let mut selects = Vec::new();

    selects.push((
        weighted_like(
            table,
            columns::TITLE,
            &[escaped.clone()],
            WEIGHT_EXACT_TITLE,
        ),
        "match_exact_title".to_string(),
    ));

    selects.push((
        weighted_like(
            table,
            columns::TITLE,
            &[
                escaped.clone(),
                format!("{escaped}%"),
                format!("% {escaped}%"),
            ],
            WEIGHT_TITLE,
        ),
        "match_title".to_string(),
    ));

    selects.push((
        Expr::cust(format!(
            "CASE WHEN `{table}`.`{}` = 1 THEN {WEIGHT_FEATURED} ELSE 0 END",
            columns::FEATURED
        )),
        "match_featured".to_string(),
    ));

    if scored_tokens {
        let patterns: Vec<String> = tokens
            .iter()
            .map(|t| format!("%{}%", escape_like(t)))
            .collect();

        let all_tests = patterns
            .iter()
            .map(|_| format!("`{table}`.`{}` LIKE ?", columns::TITLE))
            .collect::<Vec<_>>()
            .join(" AND ");
        selects.push((
            Expr::cust_with_values(
                format!("CASE WHEN {all_tests} THEN {WEIGHT_ALL_TOKENS} ELSE 0 END"),
                patterns.clone(),
            ),
            "match_title_all".to_string(),
        ));

        selects.push((
            weighted_like(table, columns::TITLE, &patterns, WEIGHT_ANY_TOKEN),
            "match_title_any".to_string(),
        ));
    }

    selects.push((
        weighted_like(
            table,
            columns::CONTENT,
            &[
                escaped.clone(),
                format!("{escaped} %"),
                format!("% {escaped} %"),
                format!("% {escaped}"),
            ],
            WEIGHT_CONTENT,
        ),
        "match_content".to_string(),
    ));

    let mut sum: Vec<&str> = vec!["match_exact_title", "match_title", "match_featured"];
    if scored_tokens {
        sum.push("match_title_all");
        sum.push("match_title_any");
    }
    sum.push("match_content");
    let order = OrderTerm::expression(
        Expr::cust(format!("({})", sum.join(" + "))),
        Order::Desc,
    );

    let mut filter = Cond::any()
        .add(col(table, columns::TITLE).like(format!("%{escaped}%")))
        .add(col(table, columns::CONTENT).like(format!("%{escaped}%")));
    for token in &tokens {
        filter = filter.add(col(table, columns::TITLE).like(format!("%{}%", escape_like(token))));
    }

    Relevance {
        selects,
        order,
        filter: filter.into(),
    }
}

/// Haversine distance from the search center, in the configured unit.
/// Coordinates from the request are bound, never spliced.
pub(crate) fn distance_expr(
    settings: &SearchSettings,
    table: &str,
    latitude: f64,
    longitude: f64,
) -> SimpleExpr {
    let radius = settings.distance_unit.earth_radius();
    let lat = columns::LATITUDE;
    let lon = columns::LONGITUDE;
    Expr::cust_with_values(
        format!(
            "{radius} * 2 * ASIN(SQRT( \
             POWER(SIN((ABS(?) - ABS(`{table}`.`{lat}`)) * PI() / 180 / 2), 2) \
             + COS(ABS(?) * PI() / 180) * COS(ABS(`{table}`.`{lat}`) * PI() / 180) \
             * POWER(SIN((? - `{table}`.`{lon}`) * PI() / 180 / 2), 2)))"
        ),
        [latitude, latitude, longitude],
    )
}
