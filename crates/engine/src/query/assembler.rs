//! Query assembly.
//!
//! Ties the pieces together: resolves the listing type, runs the plan
//! stages, layers keyword relevance on top, resolves sorting, appends
//! the stable tie-breaker suffix, and paginates.

use chrono::{Local, NaiveDate};
use sea_query::Order;
use tracing::debug;

use super::scoring;
use super::sort::{self, resolve_sort_options};
use super::stage::{PlanStage, StageContext, default_stages};
use super::types::{OrderTerm, QueryPlan, SearchParameters};
use crate::catalog::{FieldCatalog, ListingType, columns};
use crate::config::SearchSettings;
use crate::error::{EngineError, EngineResult};

/// Builds [`QueryPlan`]s from search parameters. Pure computation; the
/// catalog and settings are read-only after construction.
pub struct QueryAssembler {
    catalog: FieldCatalog,
    settings: SearchSettings,
    stages: Vec<Box<dyn PlanStage>>,
}

impl QueryAssembler {
    pub fn new(catalog: FieldCatalog, settings: SearchSettings) -> Self {
        Self {
            catalog,
            settings,
            stages: default_stages(),
        }
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Assemble a plan relative to the current date.
    pub fn assemble(
        &self,
        listing_type: &str,
        params: &SearchParameters,
    ) -> EngineResult<QueryPlan> {
        self.assemble_for_date(listing_type, params, Local::now().date_naive())
    }

    /// Assemble a plan relative to an explicit date. Event windows are
    /// the only date-sensitive part of planning.
    pub fn assemble_for_date(
        &self,
        listing_type: &str,
        params: &SearchParameters,
        today: NaiveDate,
    ) -> EngineResult<QueryPlan> {
        let listing = self
            .catalog
            .get(listing_type)
            .ok_or_else(|| EngineError::UnknownListingType(listing_type.to_string()))?;

        let mut plan = QueryPlan::new(listing.table.clone(), listing.schedule_table.clone());
        plan.group_by_id = plan.schedule_table.is_some();

        let ctx = StageContext {
            listing: listing.as_ref(),
            params,
            settings: &self.settings,
            today,
        };
        for stage in &self.stages {
            stage.apply(&ctx, &mut plan)?;
            debug!(
                stage = stage.name(),
                predicates = plan.predicates.len(),
                "applied plan stage"
            );
        }

        let relevance = params
            .keyword()
            .map(|kw| scoring::relevance(&listing.table, kw, self.settings.word_limit));
        if let Some(rel) = &relevance {
            plan.push_predicate("s", rel.filter.clone());
            for (expr, alias) in &rel.selects {
                plan.push_computed(expr.clone(), alias.clone());
            }
        }

        let options = resolve_sort_options(&listing.sort_fields);
        let key = sort::resolve_requested(&options, params.sort.as_deref(), params.has_geo());
        let mut order_terms = sort::order_terms_for_key(&listing, &key);

        // Relevance leads the ordering, except under a geo sort where
        // distance stays primary and relevance breaks ties.
        if let Some(rel) = relevance {
            if matches!(key.as_str(), "nearest" | "farthest") {
                order_terms.push(rel.order);
            } else {
                order_terms.insert(0, rel.order);
            }
        }
        plan.order_by.append(&mut order_terms);

        self.push_stable_suffix(&listing, &mut plan);

        let per_page = u64::from(params.per_page.max(1));
        let page = u64::from(params.page.max(1));
        plan.limit = per_page;
        plan.offset = (page - 1) * per_page;

        debug!(
            listing_type,
            sort = %key,
            predicates = plan.predicates.len(),
            "assembled listing search plan"
        );

        Ok(plan)
    }

    /// Deterministic tie-breakers, each skipped when the plan already
    /// orders on that column.
    fn push_stable_suffix(&self, listing: &ListingType, plan: &mut QueryPlan) {
        if let Some(schedule) = listing.schedule_table.clone() {
            for column in [columns::EVENT_DATE, columns::EVENT_START_TIME] {
                if !plan.has_order_hint(&format!("{schedule}.{column}")) {
                    plan.order_by
                        .push(OrderTerm::column(&schedule, column, Order::Asc));
                }
            }
        }

        let table = listing.table.clone();
        for (column, order) in [
            (columns::FEATURED, Order::Asc),
            (columns::DATE, Order::Desc),
            (columns::TITLE, Order::Asc),
        ] {
            if !plan.has_order_hint(&format!("{table}.{column}")) {
                plan.order_by.push(OrderTerm::column(&table, column, order));
            }
        }
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::test_fixtures;

    fn assembler() -> QueryAssembler {
        let catalog = FieldCatalog::new();
        catalog.insert(test_fixtures::restaurant());
        catalog.insert(test_fixtures::event());
        QueryAssembler::new(catalog, SearchSettings::default())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 26).unwrap()
    }

    #[test]
    fn unknown_listing_type_is_an_error() {
        let result = assembler().assemble_for_date("hotel", &SearchParameters::default(), today());
        assert!(matches!(result, Err(EngineError::UnknownListingType(t)) if t == "hotel"));
    }

    #[test]
    fn empty_parameters_yield_default_sort_and_suffix() {
        let plan = assembler()
            .assemble_for_date("restaurant", &SearchParameters::default(), today())
            .unwrap();

        let hints: Vec<_> = plan
            .order_by
            .iter()
            .filter_map(|t| t.column_hint.clone())
            .collect();
        assert_eq!(
            hints,
            vec![
                "restaurant_detail.post_date",
                "restaurant_detail.is_featured",
                "restaurant_detail.post_title",
            ]
        );
        assert!(plan.predicates.is_empty());

        let sql = plan.to_sql();
        assert!(sql.contains("ORDER BY"), "{sql}");
        assert!(sql.contains("LIMIT 10"), "{sql}");
        assert!(sql.contains("OFFSET 0"), "{sql}");
    }

    #[test]
    fn suffix_never_duplicates_the_active_sort_column() {
        let params = SearchParameters {
            sort: Some("az".to_string()),
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();

        let title_terms = plan
            .order_by
            .iter()
            .filter(|t| t.column_hint.as_deref() == Some("restaurant_detail.post_title"))
            .count();
        assert_eq!(title_terms, 1);
    }

    #[test]
    fn keyword_search_scores_and_filters() {
        let params = SearchParameters {
            text: Some("pizza house".to_string()),
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();

        let aliases: Vec<&str> = plan.computed.iter().map(|(_, a)| a.as_str()).collect();
        assert!(aliases.contains(&"match_exact_title"));
        assert!(aliases.contains(&"match_title_all"));

        // Relevance leads, then the default sort.
        assert!(plan.order_by[0].column_hint.is_none());
        assert_eq!(
            plan.order_by[1].column_hint.as_deref(),
            Some("restaurant_detail.post_date")
        );

        let sql = plan.to_sql();
        assert!(sql.contains("'%pizza house%'"), "{sql}");
        assert!(sql.contains("match_content"), "{sql}");
    }

    #[test]
    fn nearest_sort_keeps_distance_primary() {
        let params = SearchParameters {
            text: Some("pizza".to_string()),
            sort: Some("nearest".to_string()),
            latitude: Some(48.85),
            longitude: Some(2.35),
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();

        let sql = plan.to_sql();
        let distance_at = sql.find("ORDER BY distance ASC").unwrap();
        let relevance_at = sql.find("match_exact_title + match_title").unwrap();
        assert!(distance_at < relevance_at, "{sql}");
    }

    #[test]
    fn nearest_without_coordinates_falls_back_to_default() {
        let params = SearchParameters {
            sort: Some("nearest".to_string()),
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();

        assert_eq!(
            plan.order_by[0].column_hint.as_deref(),
            Some("restaurant_detail.post_date")
        );
        assert!(!plan.to_sql().contains("distance"));
    }

    #[test]
    fn event_type_joins_groups_and_orders_by_schedule() {
        let plan = assembler()
            .assemble_for_date("event", &SearchParameters::default(), today())
            .unwrap();

        assert!(plan.group_by_id);
        let sql = plan.to_sql();
        assert!(sql.contains("INNER JOIN `event_schedule`"), "{sql}");
        assert!(sql.contains("GROUP BY `event_detail`.`id`"), "{sql}");
        assert!(sql.contains("`event_schedule`.`event_date` ASC"), "{sql}");
        assert!(sql.contains("`event_schedule`.`event_starttime` ASC"), "{sql}");
    }

    #[test]
    fn favorites_sentinel_survives_assembly() {
        let params = SearchParameters {
            include_ids: Some(vec![]),
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();

        let sql = plan.to_sql();
        assert!(sql.contains("`id` = 0"), "{sql}");
    }

    #[test]
    fn pagination_is_clamped_and_offset() {
        let params = SearchParameters {
            page: 3,
            per_page: 20,
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();
        assert_eq!(plan.limit, 20);
        assert_eq!(plan.offset, 40);

        let params = SearchParameters {
            page: 0,
            per_page: 0,
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();
        assert_eq!(plan.limit, 1);
        assert_eq!(plan.offset, 0);
    }

    #[test]
    fn assembly_is_deterministic() {
        let params = SearchParameters {
            text: Some("pizza house".to_string()),
            city: Some("paris".to_string()),
            country: Some("france".to_string()),
            latitude: Some(48.85),
            longitude: Some(2.35),
            ..SearchParameters::default()
        };

        let a = assembler();
        let first = a
            .assemble_for_date("restaurant", &params, today())
            .unwrap()
            .to_sql();
        let second = a
            .assemble_for_date("restaurant", &params, today())
            .unwrap()
            .to_sql();
        assert_eq!(first, second);
    }

    #[test]
    fn count_plan_shares_the_filters() {
        let params = SearchParameters {
            city: Some("paris".to_string()),
            ..SearchParameters::default()
        };
        let plan = assembler()
            .assemble_for_date("restaurant", &params, today())
            .unwrap();

        let count_sql = plan.to_count_sql();
        assert!(count_sql.contains("COUNT(*)"), "{count_sql}");
        assert!(count_sql.contains("[paris],%"), "{count_sql}");
        assert!(!count_sql.contains("ORDER BY"), "{count_sql}");
    }
}
