//! Search parameter and query plan types.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use sea_query::{
    Alias, Asterisk, Expr, MysqlQueryBuilder, Order, Query, SelectStatement, SimpleExpr,
};
use serde::{Deserialize, Serialize};

use crate::catalog::columns;

/// Value of one request parameter: a lone value or a repeated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// The single value, if there is exactly one.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Many(vs) if vs.len() == 1 => vs.first().map(String::as_str),
            Self::Many(_) => None,
        }
    }

    /// All values, in request order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Temporal window for event-bearing listing types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventWindow {
    #[default]
    All,
    Today,
    Upcoming,
    Past,
}

impl EventWindow {
    /// Parse a request value; unknown values mean no window.
    pub fn parse(value: &str) -> Self {
        match value {
            "today" => Self::Today,
            "upcoming" => Self::Upcoming,
            "past" => Self::Past,
            _ => Self::All,
        }
    }
}

/// Decoded request parameters for one listing search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    /// Free-text keyword (the `s` parameter).
    pub text: Option<String>,

    /// Requested sort key or alias (e.g. "newest", "overall_rating_desc").
    pub sort: Option<String>,

    /// Geo center for radius filtering and distance sorting.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Search radius in the configured distance unit (`sdist`).
    pub radius: Option<f64>,

    /// Location hierarchy slugs.
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,

    /// Neighbourhood slugs; one yields a prefix match, several an IN.
    pub neighbourhoods: Vec<String>,

    pub featured_only: bool,
    pub pics_only: bool,
    pub videos_only: bool,
    pub special_only: bool,

    /// Restrict to these listing ids (favorites). `Some` with an empty
    /// list must match nothing rather than everything.
    pub include_ids: Option<Vec<i64>>,

    /// Event window filter, carried on the wire as `event_type`.
    #[serde(rename = "event_type")]
    pub event_window: EventWindow,

    /// Field-level parameters keyed by request name (`s{field}`,
    /// `smin{field}`, `smax{field}`, `event_start`, `event_end`).
    pub field_values: BTreeMap<String, ParamValue>,

    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            text: None,
            sort: None,
            latitude: None,
            longitude: None,
            radius: None,
            country: None,
            region: None,
            city: None,
            neighbourhoods: Vec::new(),
            featured_only: false,
            pics_only: false,
            videos_only: false,
            special_only: false,
            include_ids: None,
            event_window: EventWindow::All,
            field_values: BTreeMap::new(),
            page: 1,
            per_page: 10,
        }
    }
}

impl SearchParameters {
    /// Whether a usable geo center was supplied.
    pub fn has_geo(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// The trimmed keyword, when non-empty.
    pub fn keyword(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Field parameter by request name.
    pub fn field_value(&self, name: &str) -> Option<&ParamValue> {
        self.field_values.get(name)
    }
}

/// One WHERE condition, tagged with the field it came from.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field: String,
    pub expr: SimpleExpr,
}

/// One ORDER BY term.
///
/// `column_hint` carries a `table.column` marker so later stages can
/// avoid appending a tie-breaker on a column that already orders the
/// query.
#[derive(Debug, Clone)]
pub struct OrderTerm {
    pub expr: SimpleExpr,
    pub order: Order,
    pub column_hint: Option<String>,
}

impl OrderTerm {
    /// Order by a plain table column.
    pub fn column(table: &str, column: &str, order: Order) -> Self {
        Self {
            expr: Expr::col((Alias::new(table), Alias::new(column))).into(),
            order,
            column_hint: Some(format!("{table}.{column}")),
        }
    }

    /// Order by an arbitrary expression with no column hint.
    pub fn expression(expr: SimpleExpr, order: Order) -> Self {
        Self {
            expr,
            order,
            column_hint: None,
        }
    }
}

/// A fully assembled, renderable search query.
///
/// Built as pure computation; rendering binds every user-supplied value
/// through the query builder rather than splicing it into SQL text.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    /// Detail table, one row per listing.
    pub table: String,

    /// Event schedule table to inner-join, when the type has one.
    pub schedule_table: Option<String>,

    /// Computed select expressions with their aliases (match flags,
    /// the distance column).
    pub computed: Vec<(SimpleExpr, String)>,

    pub predicates: Vec<Predicate>,

    pub order_by: Vec<OrderTerm>,

    /// Collapse schedule-join fanout to one row per listing.
    pub group_by_id: bool,

    pub limit: u64,
    pub offset: u64,
}

impl QueryPlan {
    pub fn new(table: impl Into<String>, schedule_table: Option<String>) -> Self {
        Self {
            table: table.into(),
            schedule_table,
            ..Self::default()
        }
    }

    pub fn push_predicate(&mut self, field: impl Into<String>, expr: SimpleExpr) {
        self.predicates.push(Predicate {
            field: field.into(),
            expr,
        });
    }

    pub fn push_computed(&mut self, expr: SimpleExpr, alias: impl Into<String>) {
        self.computed.push((expr, alias.into()));
    }

    /// Whether an existing order term already covers `table.column`.
    /// Matched case-insensitively against recorded column hints.
    pub fn has_order_hint(&self, table_column: &str) -> bool {
        let needle = table_column.to_ascii_lowercase();
        self.order_by
            .iter()
            .filter_map(|t| t.column_hint.as_deref())
            .any(|hint| hint.to_ascii_lowercase() == needle)
    }

    /// Build the paginated SELECT.
    pub fn to_select(&self) -> SelectStatement {
        let mut query = Query::select();

        query.column((Alias::new(&self.table), Asterisk));
        for (expr, alias) in &self.computed {
            query.expr_as(expr.clone(), Alias::new(alias));
        }

        query.from(Alias::new(&self.table));
        self.add_schedule_join(&mut query);

        for predicate in &self.predicates {
            query.and_where(predicate.expr.clone());
        }

        if self.group_by_id {
            query.group_by_col((Alias::new(&self.table), Alias::new(columns::ID)));
        }

        for term in &self.order_by {
            query.order_by_expr(term.expr.clone(), term.order.clone());
        }

        query.limit(self.limit);
        query.offset(self.offset);

        query
    }

    /// Build the matching COUNT query (no ordering, no pagination).
    pub fn to_count_select(&self) -> SelectStatement {
        let mut query = Query::select();

        if self.schedule_table.is_some() {
            query.expr(
                Expr::col((Alias::new(&self.table), Alias::new(columns::ID))).count_distinct(),
            );
        } else {
            query.expr(Expr::col(Asterisk).count());
        }

        query.from(Alias::new(&self.table));
        self.add_schedule_join(&mut query);

        for predicate in &self.predicates {
            query.and_where(predicate.expr.clone());
        }

        query
    }

    pub fn to_sql(&self) -> String {
        self.to_select().to_string(MysqlQueryBuilder)
    }

    pub fn to_count_sql(&self) -> String {
        self.to_count_select().to_string(MysqlQueryBuilder)
    }

    fn add_schedule_join(&self, query: &mut SelectStatement) {
        if let Some(ref schedule) = self.schedule_table {
            query.join(
                sea_query::JoinType::InnerJoin,
                Alias::new(schedule),
                Expr::col((Alias::new(&self.table), Alias::new(columns::ID)))
                    .equals((Alias::new(schedule), Alias::new(columns::EVENT_ID))),
            );
        }
    }
}

/// One listing row returned by a search.
///
/// Detail tables carry arbitrary custom columns beyond these; callers
/// needing them issue their own follow-up queries by id.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ListingHit {
    pub id: i64,
    pub post_title: String,
    pub post_content: String,
    pub post_date: Option<NaiveDateTime>,
    pub post_address: Option<String>,
    pub post_latitude: Option<f64>,
    pub post_longitude: Option<f64>,
    pub post_locations: Option<String>,
    pub is_featured: bool,
    pub overall_rating: Option<f64>,
    pub rating_count: Option<i64>,

    /// Raw distance from the search center, when geo was supplied.
    #[sqlx(default)]
    pub distance: Option<f64>,

    /// Distance formatted per the configured units.
    #[sqlx(skip)]
    pub distance_display: Option<String>,
}

/// A page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub hits: Vec<ListingHit>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}
