//! Selector-only query evaluation.
//!
//! Instant queries pick, per series, the newest sample inside the lookback
//! window ending at the evaluation time. Range queries repeat that at every
//! step between start and end inclusive.

use crate::core::context::RequestContext;
use crate::core::time::Timestamp;
use crate::model::matcher::Matcher;
use crate::model::selector::parse_metric_selector;
use crate::model::value::{Point, Sample, Series, Value};
use crate::provider::engine::QueryFuture;
use crate::provider::{
    EngineError, Query, QueryEngine, QueryResult, QuerierGuard, Queryable, SelectHints, SeriesData,
    Warnings,
};
use chrono::TimeDelta;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Default staleness window.
pub const DEFAULT_LOOKBACK: TimeDelta = TimeDelta::minutes(5);

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Text(String),
    Selector(Vec<Matcher>),
}

fn parse_expr(input: &str) -> Result<Expr, EngineError> {
    let input = input.trim();
    if let Ok(v) = input.parse::<f64>() {
        return Ok(Expr::Number(v));
    }
    for quote in ['"', '\'', '`'] {
        if input.len() >= 2 && input.starts_with(quote) && input.ends_with(quote) {
            return Ok(Expr::Text(input[1..input.len() - 1].to_string()));
        }
    }
    parse_metric_selector(input)
        .map(Expr::Selector)
        .map_err(|e| EngineError::Parse(e.to_string()))
}

/// Engine evaluating literals and bare selectors.
#[derive(Debug, Clone)]
pub struct SelectorEngine {
    lookback: TimeDelta,
}

impl Default for SelectorEngine {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK)
    }
}

impl SelectorEngine {
    pub fn new(lookback: TimeDelta) -> Self {
        Self { lookback }
    }

    pub fn lookback(&self) -> TimeDelta {
        self.lookback
    }
}

impl QueryEngine for SelectorEngine {
    fn new_instant_query(
        &self,
        queryable: Arc<dyn Queryable>,
        expr: &str,
        ts: Timestamp,
    ) -> Result<Box<dyn Query>, EngineError> {
        let expr = parse_expr(expr)?;
        let t = ts.to_millis();
        Ok(Box::new(SelectorQuery::new(
            queryable,
            expr,
            t,
            t,
            0,
            self.lookback.num_milliseconds(),
        )))
    }

    fn new_range_query(
        &self,
        queryable: Arc<dyn Queryable>,
        expr: &str,
        start: Timestamp,
        end: Timestamp,
        step: TimeDelta,
    ) -> Result<Box<dyn Query>, EngineError> {
        let expr = parse_expr(expr)?;
        if let Expr::Text(_) = expr {
            return Err(EngineError::Parse(
                "invalid expression type \"string\" for range query, must be Scalar or instant Vector"
                    .to_string(),
            ));
        }
        let step_ms = step.num_milliseconds();
        if step_ms <= 0 {
            return Err(EngineError::Execution(
                "zero or negative query resolution step widths are not accepted".to_string(),
            ));
        }
        Ok(Box::new(SelectorQuery::new(
            queryable,
            expr,
            start.to_millis(),
            end.to_millis(),
            step_ms,
            self.lookback.num_milliseconds(),
        )))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct QueryStats {
    samples: usize,
    eval_seconds: f64,
}

/// Prepared selector query; `step_ms == 0` marks an instant query.
struct SelectorQuery {
    queryable: Arc<dyn Queryable>,
    expr: Expr,
    start: i64,
    end: i64,
    step_ms: i64,
    lookback_ms: i64,
    stats: Mutex<Option<QueryStats>>,
}

impl SelectorQuery {
    fn new(
        queryable: Arc<dyn Queryable>,
        expr: Expr,
        start: i64,
        end: i64,
        step_ms: i64,
        lookback_ms: i64,
    ) -> Self {
        Self {
            queryable,
            expr,
            start,
            end,
            step_ms,
            lookback_ms,
            stats: Mutex::new(None),
        }
    }

    fn steps(&self) -> impl Iterator<Item = i64> + '_ {
        let step = if self.step_ms > 0 { self.step_ms } else { 1 };
        std::iter::successors(Some(self.start), move |t| t.checked_add(step))
            .take_while(move |t| *t <= self.end)
    }

    fn eval(&self, ctx: &RequestContext) -> Result<(Value, Warnings), EngineError> {
        ctx.check()
            .map_err(|e| EngineError::from_context(e, "query queue"))?;

        match &self.expr {
            Expr::Number(v) => Ok((self.eval_number(*v), Vec::new())),
            Expr::Text(text) => Ok((
                Value::String {
                    t: self.start,
                    value: text.clone(),
                },
                Vec::new(),
            )),
            Expr::Selector(matchers) => self.eval_selector(ctx, matchers),
        }
    }

    fn eval_number(&self, v: f64) -> Value {
        if self.step_ms == 0 {
            return Value::Scalar(Point { t: self.start, v });
        }
        Value::Matrix(vec![Series {
            metric: Default::default(),
            points: self.steps().map(|t| Point { t, v }).collect(),
        }])
    }

    fn eval_selector(
        &self,
        ctx: &RequestContext,
        matchers: &[Matcher],
    ) -> Result<(Value, Warnings), EngineError> {
        let mint = self.start.saturating_sub(self.lookback_ms);
        let querier = QuerierGuard::new(self.queryable.querier(ctx, mint, self.end)?);
        let hints = SelectHints {
            start_ms: mint,
            end_ms: self.end,
            step_ms: self.step_ms,
            func: String::new(),
        };
        let (set, warnings) = querier.select(Some(&hints), matchers)?;

        let mut samples = 0usize;
        let mut vector = Vec::new();
        let mut matrix = Vec::new();
        for series in set {
            let series = series?;
            ctx.check()
                .map_err(|e| EngineError::from_context(e, "query execution"))?;
            samples += series.samples.len();

            if self.step_ms == 0 {
                if let Some(point) = self.newest_before(&series, self.start) {
                    vector.push(Sample {
                        metric: series.labels,
                        point,
                    });
                }
            } else {
                let points: Vec<Point> = self
                    .steps()
                    .filter_map(|t| self.newest_before(&series, t))
                    .collect();
                if !points.is_empty() {
                    matrix.push(Series {
                        metric: series.labels,
                        points,
                    });
                }
            }
        }

        if let Some(stats) = self.stats.lock().as_mut() {
            stats.samples = samples;
        }
        let value = if self.step_ms == 0 {
            Value::Vector(vector)
        } else {
            Value::Matrix(matrix)
        };
        Ok((value, warnings))
    }

    /// Newest sample in `(t - lookback, t]`, stamped at `t`.
    fn newest_before(&self, series: &SeriesData, t: i64) -> Option<Point> {
        let idx = series.samples.partition_point(|p| p.t <= t);
        let sample = series.samples.get(idx.checked_sub(1)?)?;
        (sample.t > t.saturating_sub(self.lookback_ms)).then_some(Point { t, v: sample.v })
    }
}

impl Query for SelectorQuery {
    fn exec<'a>(&'a self, ctx: &'a RequestContext) -> QueryFuture<'a> {
        Box::pin(async move {
            let started = Instant::now();
            *self.stats.lock() = Some(QueryStats::default());
            let result = self.eval(ctx);
            if let Some(stats) = self.stats.lock().as_mut() {
                stats.eval_seconds = started.elapsed().as_secs_f64();
            }
            match result {
                Ok((value, warnings)) => QueryResult::ok(value, warnings),
                Err(e) => QueryResult::err(e, Vec::new()),
            }
        })
    }

    fn stats(&self) -> Option<serde_json::Value> {
        let stats = (*self.stats.lock())?;
        Some(json!({
            "timings": { "evalTotalTime": stats.eval_seconds },
            "samples": { "totalQueryableSamples": stats.samples },
        }))
    }

    fn close(&self) {
        tracing::trace!(start = self.start, end = self.end, "query closed");
    }
}
