//! Field filter predicates.
//!
//! Every user-supplied value is bound through the query builder; nothing
//! from the request is ever spliced into SQL text. Unparseable values
//! are skipped (the filter just doesn't narrow the query) unless strict
//! input mode is on, in which case they fail the whole request.

use chrono::NaiveDate;
use sea_query::{Alias, Cond, Expr, SimpleExpr};
use tracing::warn;

use super::types::{ParamValue, SearchParameters};
use crate::catalog::{
    DataType, FieldType, ListingType, SearchCondition, SearchField, SearchOperator, columns,
};
use crate::error::{EngineError, EngineResult};

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub(crate) fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub(crate) fn col(table: &str, column: &str) -> Expr {
    Expr::col((Alias::new(table), Alias::new(column)))
}

/// `FIND_IN_SET(value, column)` for comma-separated set columns.
fn find_in_set(table: &str, column: &str, value: &str) -> SimpleExpr {
    Expr::cust_with_values(
        format!("FIND_IN_SET(?, `{table}`.`{column}`)"),
        [value.to_string()],
    )
}

/// Builds WHERE conditions for one listing type's search fields.
pub(crate) struct FieldFilter<'a> {
    listing: &'a ListingType,
    strict: bool,
}

impl<'a> FieldFilter<'a> {
    pub(crate) fn new(listing: &'a ListingType, strict: bool) -> Self {
        Self { listing, strict }
    }

    /// Build the condition for one search field, if its parameters are
    /// present and usable. Distance and event fields are handled by
    /// their own stages.
    pub(crate) fn build(
        &self,
        field: &SearchField,
        params: &SearchParameters,
    ) -> EngineResult<Option<SimpleExpr>> {
        if field.name.is_empty()
            || field.name == "dist"
            || field.name == "event"
            || field.field_type == FieldType::Fieldset
        {
            return Ok(None);
        }

        // Address-type fields and the legacy `post` field both search
        // the address column.
        let column = if field.field_type == FieldType::Address || field.name == "post" {
            columns::ADDRESS
        } else {
            field.name.as_str()
        };
        if !self.listing.has_column(column) {
            warn!(field = %field.name, "search field has no backing column, skipping");
            return Ok(None);
        }

        let param = if field.field_type == FieldType::Address {
            format!("s{}_address", field.name)
        } else {
            format!("s{}", field.name)
        };

        let min = params
            .field_value(&format!("smin{}", field.name))
            .and_then(ParamValue::as_single)
            .filter(|v| !v.is_empty());
        let max = params
            .field_value(&format!("smax{}", field.name))
            .and_then(ParamValue::as_single)
            .filter(|v| !v.is_empty());
        if min.is_some() || max.is_some() {
            return self.bounded(field, column, min, max);
        }

        let Some(value) = params.field_value(&param) else {
            return Ok(None);
        };
        self.exact(field, column, value)
    }

    /// Independent lower/upper bounds from `smin`/`smax` parameters.
    fn bounded(
        &self,
        field: &SearchField,
        column: &str,
        min: Option<&str>,
        max: Option<&str>,
    ) -> EngineResult<Option<SimpleExpr>> {
        let data_type = self.data_type(field);
        let mut cond = Cond::all();

        if let Some(min) = min {
            match self.comparable(field, data_type, min)? {
                Some(value) => cond = cond.add(self.compare_gte(column, data_type, value)),
                None => return Ok(None),
            }
        }
        if let Some(max) = max {
            match self.comparable(field, data_type, max)? {
                Some(value) => cond = cond.add(self.compare_lte(column, data_type, value)),
                None => return Ok(None),
            }
        }

        Ok(Some(cond.into()))
    }

    fn exact(
        &self,
        field: &SearchField,
        column: &str,
        value: &ParamValue,
    ) -> EngineResult<Option<SimpleExpr>> {
        let values: Vec<&str> = value
            .values()
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return Ok(None);
        }

        // Repeated values always go through the set column, combined
        // with the field's configured operator.
        if values.len() > 1 {
            return Ok(Some(self.set_condition(field, column, &values)));
        }
        let single = values[0];

        match field.field_type {
            FieldType::Checkbox => {
                if matches!(single, "1" | "true" | "yes") {
                    Ok(Some(col(&self.listing.table, column).eq(1)))
                } else {
                    Ok(None)
                }
            }
            FieldType::Multiselect | FieldType::Taxonomy => {
                Ok(Some(find_in_set(&self.listing.table, column, single)))
            }
            FieldType::Select | FieldType::Radio => {
                Ok(Some(col(&self.listing.table, column).eq(single)))
            }
            FieldType::Address => Ok(Some(
                col(&self.listing.table, column).like(format!("%{}%", escape_like(single))),
            )),
            _ => self.typed_single(field, column, single),
        }
    }

    /// Single value against a typed column: bucket tokens for bucketed
    /// range widgets, otherwise a typed equality.
    fn typed_single(
        &self,
        field: &SearchField,
        column: &str,
        value: &str,
    ) -> EngineResult<Option<SimpleExpr>> {
        let data_type = self.data_type(field);

        if field.input_type == crate::catalog::InputType::Range
            && matches!(
                field.condition,
                SearchCondition::Link | SearchCondition::Select
            )
        {
            // Bucket tokens come from generated enum values; a malformed
            // one is dropped in both modes rather than failing the request.
            return match bucket_condition(col(&self.listing.table, column), value) {
                Some(expr) => Ok(Some(expr)),
                None => {
                    warn!(field = %field.name, value, "ignoring malformed range bucket");
                    Ok(None)
                }
            };
        }

        match data_type {
            DataType::Integer | DataType::Float => match value.parse::<f64>() {
                Ok(number) => Ok(Some(col(&self.listing.table, column).eq(number))),
                Err(_) => self.invalid(&field.name, value, "number"),
            },
            DataType::Date => match self.comparable(field, data_type, value)? {
                Some(Comparable::Text(iso)) => Ok(Some(col(&self.listing.table, column).eq(iso))),
                Some(Comparable::Number(n)) => Ok(Some(col(&self.listing.table, column).eq(n))),
                None => Ok(None),
            },
            DataType::Time => Ok(Some(
                col(&self.listing.table, column).eq(format!("{value}:00")),
            )),
            DataType::Datetime => Ok(Some(col(&self.listing.table, column).eq(value))),
            DataType::Text => Ok(Some(
                col(&self.listing.table, column).like(format!("%{}%", escape_like(value))),
            )),
        }
    }

    fn set_condition(&self, field: &SearchField, column: &str, values: &[&str]) -> SimpleExpr {
        let operator = self
            .listing
            .field(&field.name)
            .map(|f| f.search_operator)
            .unwrap_or_default();
        let mut cond = match operator {
            SearchOperator::And => Cond::all(),
            SearchOperator::Or => Cond::any(),
        };
        for value in values {
            cond = cond.add(find_in_set(&self.listing.table, column, value));
        }
        cond.into()
    }

    /// Normalize a bound value for comparison, per the column type.
    /// Dates become ISO strings, times gain seconds, numbers parse.
    fn comparable(
        &self,
        field: &SearchField,
        data_type: DataType,
        value: &str,
    ) -> EngineResult<Option<Comparable>> {
        match data_type {
            DataType::Date => {
                let format = self
                    .listing
                    .field(&field.name)
                    .and_then(|f| f.date_format.as_deref());
                match to_iso_date(value, format) {
                    Some(iso) => Ok(Some(Comparable::Text(iso))),
                    None => self.invalid(&field.name, value, "date"),
                }
            }
            DataType::Time => Ok(Some(Comparable::Text(format!("{value}:00")))),
            DataType::Datetime => Ok(Some(Comparable::Text(value.to_string()))),
            DataType::Integer | DataType::Float | DataType::Text => {
                match value.parse::<f64>() {
                    Ok(number) => Ok(Some(Comparable::Number(number))),
                    Err(_) => self.invalid(&field.name, value, "number"),
                }
            }
        }
    }

    fn compare_gte(&self, column: &str, _data_type: DataType, value: Comparable) -> SimpleExpr {
        match value {
            Comparable::Number(n) => col(&self.listing.table, column).gte(n),
            Comparable::Text(t) => col(&self.listing.table, column).gte(t),
        }
    }

    fn compare_lte(&self, column: &str, _data_type: DataType, value: Comparable) -> SimpleExpr {
        match value {
            Comparable::Number(n) => col(&self.listing.table, column).lte(n),
            Comparable::Text(t) => col(&self.listing.table, column).lte(t),
        }
    }

    fn data_type(&self, field: &SearchField) -> DataType {
        self.listing
            .field(&field.name)
            .map(|f| f.data_type)
            .unwrap_or_default()
    }

    fn invalid<T>(&self, field: &str, value: &str, what: &str) -> EngineResult<Option<T>> {
        if self.strict {
            Err(EngineError::Validation(format!(
                "unusable {what} value `{value}` for field `{field}`"
            )))
        } else {
            warn!(field, value, what, "ignoring unusable search value");
            Ok(None)
        }
    }
}

enum Comparable {
    Number(f64),
    Text(String),
}

/// Parse a `"N-M"` / `"N-Less"` / `"N-More"` bucket token into bounds.
/// Only the first four characters of the tag matter, case-insensitively.
fn bucket_condition(column: Expr, token: &str) -> Option<SimpleExpr> {
    let (lower, upper) = token.split_once('-')?;
    let lower: f64 = lower.trim().parse().ok()?;

    let tag: String = upper
        .trim()
        .chars()
        .take(4)
        .collect::<String>()
        .to_ascii_uppercase();
    if tag == "LESS" {
        return Some(column.lte(lower));
    }
    if tag == "MORE" {
        return Some(column.gte(lower));
    }

    let upper: f64 = upper.trim().parse().ok()?;
    Some(column.between(lower, upper))
}

/// Reformat a display-format date (PHP-style format string) to ISO.
/// ISO input is accepted as-is.
fn to_iso_date(value: &str, display_format: Option<&str>) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.to_string());
    }
    let format = php_to_chrono(display_format?);
    NaiveDate::parse_from_str(value, &format)
        .ok()
        .map(|d| d.to_string())
}

/// Translate the PHP date format tokens the catalog uses (`d j m n Y y`)
/// into chrono specifiers; everything else passes through literally.
fn php_to_chrono(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    for ch in format.chars() {
        match ch {
            'd' | 'j' => out.push_str("%d"),
            'm' | 'n' => out.push_str("%m"),
            'Y' => out.push_str("%Y"),
            'y' => out.push_str("%y"),
            other => out.push(other),
        }
    }
    out
}

/// Conditions for the only-with toggles.
pub(crate) fn toggle_predicates(
    table: &str,
    params: &SearchParameters,
) -> Vec<(String, SimpleExpr)> {
    let mut out = Vec::new();

    if params.featured_only {
        out.push((
            columns::FEATURED.to_string(),
            col(table, columns::FEATURED).eq(1),
        ));
    }

    for (enabled, column) in [
        (params.pics_only, columns::FEATURED_IMAGE),
        (params.videos_only, columns::VIDEO),
        (params.special_only, columns::SPECIAL_OFFERS),
    ] {
        if enabled {
            let cond = Cond::all()
                .add(col(table, column).is_not_null())
                .add(col(table, column).ne(""));
            out.push((column.to_string(), cond.into()));
        }
    }

    out
}

/// Restrict results to the given ids. An empty list must match nothing,
/// so it pins the filter to the impossible id zero.
pub(crate) fn include_ids_predicate(table: &str, ids: &[i64]) -> SimpleExpr {
    if ids.is_empty() {
        col(table, columns::ID).eq(0)
    } else {
        col(table, columns::ID).is_in(ids.iter().copied())
    }
}
