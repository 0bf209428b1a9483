//! Scrape target and alertmanager discovery endpoints.

use crate::api::dispatch::{ApiHandler, HandlerFuture};
use crate::api::envelope::HandlerResult;
use crate::api::request::ApiRequest;
use crate::api::Api;
use crate::core::error::ApiError;
use crate::model::labels::Labels;
use crate::model::matcher::{matches_all, Matcher};
use crate::model::selector::parse_metric_selector;
use crate::provider::registry::{ScrapeTarget, TargetGroups, TargetHealth};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Rendered for targets that were never scraped.
const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

#[derive(Debug, Serialize)]
pub struct Target {
    #[serde(rename = "discoveredLabels")]
    pub discovered_labels: Labels,
    pub labels: Labels,
    #[serde(rename = "scrapeUrl")]
    pub scrape_url: String,
    #[serde(rename = "lastError")]
    pub last_error: String,
    #[serde(rename = "lastScrape", serialize_with = "serialize_last_scrape")]
    pub last_scrape: Option<DateTime<Utc>>,
    pub health: TargetHealth,
}

#[derive(Debug, Serialize)]
pub struct DroppedTarget {
    #[serde(rename = "discoveredLabels")]
    pub discovered_labels: Labels,
}

#[derive(Debug, Serialize)]
pub struct TargetDiscovery {
    #[serde(rename = "activeTargets")]
    pub active_targets: Vec<Target>,
    #[serde(rename = "droppedTargets")]
    pub dropped_targets: Vec<DroppedTarget>,
}

fn serialize_last_scrape<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        None => serializer.serialize_str(ZERO_TIME),
    }
}

/// Targets of all groups, groups in key order.
fn flatten(groups: TargetGroups) -> Vec<ScrapeTarget> {
    groups.into_values().flatten().collect()
}

/// `GET /targets`
#[derive(Debug, Default)]
pub struct Targets;

impl ApiHandler for Targets {
    type Payload = TargetDiscovery;
    const NAME: &'static str = "targets";

    fn handle<'a>(&'a self, api: &'a Api, _req: &'a ApiRequest) -> HandlerFuture<'a, TargetDiscovery> {
        Box::pin(async move {
            let active = flatten(api.targets().targets_active());
            let dropped = flatten(api.targets().targets_dropped());

            HandlerResult::ok(TargetDiscovery {
                active_targets: active
                    .into_iter()
                    .map(|t| Target {
                        discovered_labels: t.discovered_labels,
                        labels: t.labels,
                        scrape_url: t.scrape_url,
                        last_error: t.last_error.unwrap_or_default(),
                        last_scrape: t.last_scrape,
                        health: t.health,
                    })
                    .collect(),
                dropped_targets: dropped
                    .into_iter()
                    .map(|t| DroppedTarget {
                        discovered_labels: t.discovered_labels,
                    })
                    .collect(),
            })
        })
    }
}

/// One metadata entry; `metric` is omitted when the request named it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetMetricMetadata {
    pub target: Labels,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub metric: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub help: String,
    pub unit: String,
}

/// `GET /targets/metadata`
#[derive(Debug, Default)]
pub struct TargetMetadata;

impl ApiHandler for TargetMetadata {
    type Payload = Vec<TargetMetricMetadata>;
    const NAME: &'static str = "targets_metadata";

    fn handle<'a>(
        &'a self,
        api: &'a Api,
        req: &'a ApiRequest,
    ) -> HandlerFuture<'a, Vec<TargetMetricMetadata>> {
        Box::pin(async move {
            let limit = match req.form_value("limit") {
                Some(text) => match text.parse::<i64>() {
                    Ok(limit) => limit,
                    Err(_) => return ApiError::bad_data("limit must be a number").into(),
                },
                None => -1,
            };

            let matchers: Vec<Matcher> = match req.form_value("match_target") {
                Some(selector) => match parse_metric_selector(selector) {
                    Ok(matchers) => matchers,
                    Err(e) => return ApiError::bad_data(e.to_string()).into(),
                },
                None => Vec::new(),
            };
            let metric = req.form_value("metric");

            let mut res = Vec::new();
            for targets in api.targets().targets_active().values() {
                for target in targets {
                    // Checked per target; one target may overshoot the limit.
                    if limit >= 0 && res.len() as i64 >= limit {
                        break;
                    }
                    if !matches_all(&matchers, &target.labels) {
                        continue;
                    }
                    match metric {
                        None => res.extend(target.metadata.iter().map(|md| TargetMetricMetadata {
                            target: target.labels.clone(),
                            metric: md.metric.clone(),
                            metric_type: md.metric_type.clone(),
                            help: md.help.clone(),
                            unit: md.unit.clone(),
                        })),
                        Some(metric) => {
                            if let Some(md) = target.metadata_for(metric) {
                                res.push(TargetMetricMetadata {
                                    target: target.labels.clone(),
                                    metric: String::new(),
                                    metric_type: md.metric_type.clone(),
                                    help: md.help.clone(),
                                    unit: md.unit.clone(),
                                });
                            }
                        }
                    }
                }
            }

            if res.is_empty() {
                return ApiError::not_found("specified metadata not found").into();
            }
            HandlerResult::ok(res)
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AlertmanagerTarget {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AlertmanagerDiscovery {
    #[serde(rename = "activeAlertmanagers")]
    pub active_alertmanagers: Vec<AlertmanagerTarget>,
    #[serde(rename = "droppedAlertmanagers")]
    pub dropped_alertmanagers: Vec<AlertmanagerTarget>,
}

/// `GET /alertmanagers`
#[derive(Debug, Default)]
pub struct Alertmanagers;

impl ApiHandler for Alertmanagers {
    type Payload = AlertmanagerDiscovery;
    const NAME: &'static str = "alertmanagers";

    fn handle<'a>(
        &'a self,
        api: &'a Api,
        _req: &'a ApiRequest,
    ) -> HandlerFuture<'a, AlertmanagerDiscovery> {
        Box::pin(async move {
            let to_targets = |urls: Vec<String>| -> Vec<AlertmanagerTarget> {
                urls.into_iter()
                    .map(|url| AlertmanagerTarget { url })
                    .collect()
            };
            HandlerResult::ok(AlertmanagerDiscovery {
                active_alertmanagers: to_targets(api.alertmanagers().alertmanagers()),
                dropped_alertmanagers: to_targets(api.alertmanagers().dropped_alertmanagers()),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_target_serialization() {
        let target = Target {
            discovered_labels: Labels::from_pairs([("__address__", "host:9100")]),
            labels: Labels::from_pairs([("job", "node")]),
            scrape_url: "http://host:9100/metrics".into(),
            last_error: String::new(),
            last_scrape: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            health: TargetHealth::Up,
        };
        let body = serde_json::to_value(&target).unwrap();
        assert_eq!(body["scrapeUrl"], "http://host:9100/metrics");
        assert_eq!(body["lastScrape"], "2024-01-02T03:04:05Z");
        assert_eq!(body["health"], "up");
        assert_eq!(body["labels"]["job"], "node");
    }

    #[test]
    fn test_never_scraped_renders_zero_time() {
        let target = Target {
            discovered_labels: Labels::default(),
            labels: Labels::default(),
            scrape_url: String::new(),
            last_error: String::new(),
            last_scrape: None,
            health: TargetHealth::Unknown,
        };
        let body = serde_json::to_value(&target).unwrap();
        assert_eq!(body["lastScrape"], ZERO_TIME);
    }

    #[test]
    fn test_metadata_omits_empty_metric() {
        let md = TargetMetricMetadata {
            target: Labels::default(),
            metric: String::new(),
            metric_type: "gauge".into(),
            help: "h".into(),
            unit: String::new(),
        };
        let body = serde_json::to_value(&md).unwrap();
        assert!(body.get("metric").is_none());
        assert_eq!(body["type"], "gauge");
    }
}
