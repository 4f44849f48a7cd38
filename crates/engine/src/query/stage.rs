//! Plan stages.
//!
//! Each stage contributes one concern's worth of conditions to the
//! plan. The assembler runs them in a fixed order; stages read the
//! request and catalog through [`StageContext`] and never see each
//! other.

use chrono::NaiveDate;
use sea_query::{Cond, Expr, ExprTrait, SimpleExpr};
use tracing::warn;

use super::location::{location_predicates, neighbourhood_predicate};
use super::predicate::{FieldFilter, col, include_ids_predicate, toggle_predicates};
use super::scoring::distance_expr;
use super::types::{EventWindow, QueryPlan, SearchParameters};
use crate::catalog::{ListingType, columns};
use crate::config::SearchSettings;
use crate::error::{EngineError, EngineResult};

/// Read-only inputs shared by every stage.
pub(crate) struct StageContext<'a> {
    pub listing: &'a ListingType,
    pub params: &'a SearchParameters,
    pub settings: &'a SearchSettings,
    pub today: NaiveDate,
}

/// One concern of query assembly.
pub(crate) trait PlanStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, ctx: &StageContext<'_>, plan: &mut QueryPlan) -> EngineResult<()>;
}

/// The fixed stage order.
pub(crate) fn default_stages() -> Vec<Box<dyn PlanStage>> {
    vec![
        Box::new(LocationStage),
        Box::new(ToggleStage),
        Box::new(FavoritesStage),
        Box::new(FieldFilterStage),
        Box::new(EventStage),
        Box::new(GeoStage),
    ]
}

/// Location hierarchy and neighbourhood conditions.
struct LocationStage;

impl PlanStage for LocationStage {
    fn name(&self) -> &'static str {
        "location"
    }

    fn apply(&self, ctx: &StageContext<'_>, plan: &mut QueryPlan) -> EngineResult<()> {
        for expr in location_predicates(&ctx.listing.table, ctx.params) {
            plan.push_predicate(columns::LOCATIONS, expr);
        }
        if let Some(expr) =
            neighbourhood_predicate(&ctx.listing.table, &ctx.params.neighbourhoods)
        {
            plan.push_predicate(columns::NEIGHBOURHOOD, expr);
        }
        Ok(())
    }
}

/// Featured/photos/videos/special-offers toggles.
struct ToggleStage;

impl PlanStage for ToggleStage {
    fn name(&self) -> &'static str {
        "toggles"
    }

    fn apply(&self, ctx: &StageContext<'_>, plan: &mut QueryPlan) -> EngineResult<()> {
        for (field, expr) in toggle_predicates(&ctx.listing.table, ctx.params) {
            plan.push_predicate(field, expr);
        }
        Ok(())
    }
}

/// Restriction to the caller's saved listings.
struct FavoritesStage;

impl PlanStage for FavoritesStage {
    fn name(&self) -> &'static str {
        "favorites"
    }

    fn apply(&self, ctx: &StageContext<'_>, plan: &mut QueryPlan) -> EngineResult<()> {
        if let Some(ids) = &ctx.params.include_ids {
            plan.push_predicate(columns::ID, include_ids_predicate(&ctx.listing.table, ids));
        }
        Ok(())
    }
}

/// Per-field advance search conditions.
struct FieldFilterStage;

impl PlanStage for FieldFilterStage {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn apply(&self, ctx: &StageContext<'_>, plan: &mut QueryPlan) -> EngineResult<()> {
        let filter = FieldFilter::new(ctx.listing, ctx.settings.strict);
        for field in &ctx.listing.search_fields {
            if let Some(expr) = filter.build(field, ctx.params)? {
                plan.push_predicate(field.name.clone(), expr);
            }
        }
        Ok(())
    }
}

/// Event schedule window and explicit date range.
struct EventStage;

impl EventStage {
    fn window_condition(
        schedule: &str,
        window: EventWindow,
        today: NaiveDate,
    ) -> Option<SimpleExpr> {
        let today_str = today.to_string();
        let spanning = Cond::all()
            .add(col(schedule, columns::EVENT_DATE).lte(today_str.clone()))
            .add(col(schedule, columns::EVENT_END_DATE).gte(today_str.clone()));

        match window {
            EventWindow::All => None,
            EventWindow::Today => Some(
                Cond::any()
                    .add(Expr::cust_with_values(
                        format!("`{schedule}`.`{}` LIKE ?", columns::EVENT_DATE),
                        [format!("{today_str}%")],
                    ))
                    .add(spanning)
                    .into(),
            ),
            EventWindow::Upcoming => Some(
                Cond::any()
                    .add(col(schedule, columns::EVENT_DATE).gte(today_str))
                    .add(spanning)
                    .into(),
            ),
            EventWindow::Past => Some(col(schedule, columns::EVENT_DATE).lt(today_str)),
        }
    }

    fn bound(
        ctx: &StageContext<'_>,
        param: &str,
    ) -> EngineResult<Option<String>> {
        let Some(value) = ctx
            .params
            .field_value(param)
            .and_then(super::types::ParamValue::as_single)
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };

        match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) => Ok(Some(date.to_string())),
            Err(_) if ctx.settings.strict => Err(EngineError::Validation(format!(
                "unusable date value `{value}` for `{param}`"
            ))),
            Err(_) => {
                warn!(param, value, "ignoring unusable event date");
                Ok(None)
            }
        }
    }
}

impl PlanStage for EventStage {
    fn name(&self) -> &'static str {
        "events"
    }

    fn apply(&self, ctx: &StageContext<'_>, plan: &mut QueryPlan) -> EngineResult<()> {
        let Some(schedule) = ctx.listing.schedule_table.as_deref() else {
            return Ok(());
        };

        if let Some(start) = Self::bound(ctx, "event_start")? {
            plan.push_predicate(
                columns::EVENT_DATE,
                col(schedule, columns::EVENT_DATE).gte(start),
            );
        }
        if let Some(end) = Self::bound(ctx, "event_end")? {
            plan.push_predicate(
                columns::EVENT_DATE,
                col(schedule, columns::EVENT_DATE).lte(end),
            );
        }

        if let Some(expr) = Self::window_condition(schedule, ctx.params.event_window, ctx.today) {
            plan.push_predicate(columns::EVENT_DATE, expr);
        }

        Ok(())
    }
}

/// Distance column and radius bound.
struct GeoStage;

impl PlanStage for GeoStage {
    fn name(&self) -> &'static str {
        "geo"
    }

    fn apply(&self, ctx: &StageContext<'_>, plan: &mut QueryPlan) -> EngineResult<()> {
        let (Some(latitude), Some(longitude)) = (ctx.params.latitude, ctx.params.longitude)
        else {
            return Ok(());
        };

        let distance = distance_expr(ctx.settings, &ctx.listing.table, latitude, longitude);
        plan.push_computed(distance.clone(), "distance");

        let radius = ctx.settings.effective_radius(ctx.params.radius);
        plan.push_predicate("distance", distance.lte(radius));

        Ok(())
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::test_fixtures;
    use crate::query::types::ParamValue;

    fn context<'a>(
        listing: &'a ListingType,
        params: &'a SearchParameters,
        settings: &'a SearchSettings,
    ) -> StageContext<'a> {
        StageContext {
            listing,
            params,
            settings,
            today: NaiveDate::from_ymd_opt(2026, 8, 26).unwrap(),
        }
    }

    fn apply(stage: &dyn PlanStage, ctx: &StageContext<'_>) -> QueryPlan {
        let mut plan = QueryPlan::new(
            ctx.listing.table.clone(),
            ctx.listing.schedule_table.clone(),
        );
        stage.apply(ctx, &mut plan).unwrap();
        plan
    }

    #[test]
    fn geo_stage_adds_column_and_radius_bound() {
        let listing = test_fixtures::restaurant();
        let params = SearchParameters {
            latitude: Some(48.85),
            longitude: Some(2.35),
            radius: Some(5.0),
            ..SearchParameters::default()
        };
        let settings = SearchSettings::default();
        let plan = apply(&GeoStage, &context(&listing, &params, &settings));

        assert_eq!(plan.computed.len(), 1);
        assert_eq!(plan.computed[0].1, "distance");
        assert_eq!(plan.predicates.len(), 1);

        plan.to_sql(); // must render
    }

    #[test]
    fn geo_stage_without_coordinates_is_a_no_op() {
        let listing = test_fixtures::restaurant();
        let params = SearchParameters::default();
        let settings = SearchSettings::default();
        let plan = apply(&GeoStage, &context(&listing, &params, &settings));

        assert!(plan.computed.is_empty());
        assert!(plan.predicates.is_empty());
    }

    #[test]
    fn event_window_today_matches_start_or_span() {
        let listing = test_fixtures::event();
        let params = SearchParameters {
            event_window: EventWindow::Today,
            ..SearchParameters::default()
        };
        let settings = SearchSettings::default();
        let plan = apply(&EventStage, &context(&listing, &params, &settings));

        assert_eq!(plan.predicates.len(), 1);
        let sql = plan.to_sql();
        assert!(sql.contains("'2026-08-26%'"), "{sql}");
        assert!(sql.contains("event_enddate"), "{sql}");
    }

    #[test]
    fn event_window_past_is_a_strict_cutoff() {
        let listing = test_fixtures::event();
        let params = SearchParameters {
            event_window: EventWindow::Past,
            ..SearchParameters::default()
        };
        let settings = SearchSettings::default();
        let plan = apply(&EventStage, &context(&listing, &params, &settings));

        let sql = plan.to_sql();
        assert!(sql.contains("< '2026-08-26'"), "{sql}");
    }

    #[test]
    fn event_range_binds_iso_dates() {
        let listing = test_fixtures::event();
        let mut params = SearchParameters::default();
        params.field_values.insert(
            "event_start".to_string(),
            ParamValue::Single("2026-09-01".to_string()),
        );
        params.field_values.insert(
            "event_end".to_string(),
            ParamValue::Single("2026-09-30".to_string()),
        );
        let settings = SearchSettings::default();
        let plan = apply(&EventStage, &context(&listing, &params, &settings));

        assert_eq!(plan.predicates.len(), 2);
        let sql = plan.to_sql();
        assert!(sql.contains(">= '2026-09-01'"), "{sql}");
        assert!(sql.contains("<= '2026-09-30'"), "{sql}");
    }

    #[test]
    fn bad_event_date_errors_only_in_strict_mode() {
        let listing = test_fixtures::event();
        let mut params = SearchParameters::default();
        params.field_values.insert(
            "event_start".to_string(),
            ParamValue::Single("next tuesday".to_string()),
        );

        let lenient = SearchSettings::default();
        let plan = apply(&EventStage, &context(&listing, &params, &lenient));
        assert!(plan.predicates.is_empty());

        let strict = SearchSettings {
            strict: true,
            ..SearchSettings::default()
        };
        let ctx = context(&listing, &params, &strict);
        let mut plan = QueryPlan::new("event_detail", Some("event_schedule".to_string()));
        assert!(EventStage.apply(&ctx, &mut plan).is_err());
    }

    #[test]
    fn event_stage_skips_types_without_schedule() {
        let listing = test_fixtures::restaurant();
        let params = SearchParameters {
            event_window: EventWindow::Upcoming,
            ..SearchParameters::default()
        };
        let settings = SearchSettings::default();
        let plan = apply(&EventStage, &context(&listing, &params, &settings));
        assert!(plan.predicates.is_empty());
    }

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<&str> = default_stages().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["location", "toggles", "favorites", "fields", "events", "geo"]
        );
    }
}
