//! Alert and rule endpoints.

use crate::api::dispatch::{ApiHandler, HandlerFuture};
use crate::api::envelope::HandlerResult;
use crate::api::request::ApiRequest;
use crate::api::Api;
use crate::model::labels::Labels;
use crate::model::value::format_exponent;
use crate::provider::registry::{self, AlertState, Rule, RuleHealth};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub labels: Labels,
    pub annotations: Labels,
    pub state: AlertState,
    #[serde(rename = "activeAt")]
    pub active_at: DateTime<Utc>,
    pub value: String,
}

impl From<&registry::Alert> for Alert {
    fn from(alert: &registry::Alert) -> Self {
        Self {
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            state: alert.state,
            active_at: alert.active_at,
            value: format_exponent(alert.value),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertDiscovery {
    pub alerts: Vec<Alert>,
}

/// `GET /alerts`
#[derive(Debug, Default)]
pub struct Alerts;

impl ApiHandler for Alerts {
    type Payload = AlertDiscovery;
    const NAME: &'static str = "alerts";

    fn handle<'a>(&'a self, api: &'a Api, _req: &'a ApiRequest) -> HandlerFuture<'a, AlertDiscovery> {
        Box::pin(async move {
            let alerts = api
                .rules()
                .alerting_rules()
                .iter()
                .flat_map(|rule| rule.active_alerts().map(Alert::from).collect::<Vec<_>>())
                .collect();
            HandlerResult::ok(AlertDiscovery { alerts })
        })
    }
}

/// A rule as exposed by the API, tagged by kind.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleView {
    Alerting {
        name: String,
        query: String,
        duration: f64,
        labels: Labels,
        annotations: Labels,
        alerts: Vec<Alert>,
        health: RuleHealth,
        #[serde(rename = "lastError", skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },
    Recording {
        name: String,
        query: String,
        #[serde(skip_serializing_if = "Labels::is_empty")]
        labels: Labels,
        health: RuleHealth,
        #[serde(rename = "lastError", skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },
}

impl From<&Rule> for RuleView {
    fn from(rule: &Rule) -> Self {
        match rule {
            Rule::Alerting(rule) => Self::Alerting {
                name: rule.name.clone(),
                query: rule.query.clone(),
                duration: seconds(rule.duration),
                labels: rule.labels.clone(),
                annotations: rule.annotations.clone(),
                alerts: rule.active_alerts().map(Alert::from).collect(),
                health: rule.health,
                last_error: rule.last_error.clone(),
            },
            Rule::Recording(rule) => Self::Recording {
                name: rule.name.clone(),
                query: rule.query.clone(),
                labels: rule.labels.clone(),
                health: rule.health,
                last_error: rule.last_error.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleGroupView {
    pub name: String,
    pub file: String,
    pub rules: Vec<RuleView>,
    pub interval: f64,
}

#[derive(Debug, Serialize)]
pub struct RuleDiscovery {
    pub groups: Vec<RuleGroupView>,
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

/// `GET /rules`
#[derive(Debug, Default)]
pub struct Rules;

impl ApiHandler for Rules {
    type Payload = RuleDiscovery;
    const NAME: &'static str = "rules";

    fn handle<'a>(&'a self, api: &'a Api, _req: &'a ApiRequest) -> HandlerFuture<'a, RuleDiscovery> {
        Box::pin(async move {
            let groups = api
                .rules()
                .rule_groups()
                .iter()
                .map(|group| RuleGroupView {
                    name: group.name.clone(),
                    file: group.file.clone(),
                    rules: group.rules.iter().map(RuleView::from).collect(),
                    interval: seconds(group.interval),
                })
                .collect();
            HandlerResult::ok(RuleDiscovery { groups })
        })
    }
}
