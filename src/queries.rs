// Query catalog - the fixed set of PromQL expressions collected each run
//
// Every query aggregates over a trailing window (or counts a current state),
// so a single instant-query sample per run is all the pipeline needs.
// The catalog is static: adding a metric means adding an entry here.

/// A named PromQL query.
///
/// The name becomes the `metric` column of every row the query produces;
/// the expression is sent verbatim as the `query` parameter of a Prometheus
/// instant query.
pub struct MetricQuery {
    /// Identifier recorded in the dataset (e.g. "cpu_usage")
    pub name: &'static str,

    /// PromQL expression computing one current value per pod
    pub expression: &'static str,
}

/// All queries issued by a collection run, in issue order.
///
/// Each expression groups by the `pod` label so every returned series maps
/// to exactly one (entity, metric) row.
pub const QUERIES: &[MetricQuery] = &[
    MetricQuery {
        name: "cpu_usage",
        expression: r#"sum by (pod) (rate(container_cpu_usage_seconds_total{container!="", pod!=""}[5m]))"#,
    },
    MetricQuery {
        name: "memory_usage",
        expression: r#"sum by (pod) (container_memory_usage_bytes{container!="", pod!=""})"#,
    },
    MetricQuery {
        name: "pod_pending",
        expression: r#"count by (pod) (kube_pod_status_phase{phase="Pending"})"#,
    },
    MetricQuery {
        name: "pod_restart",
        expression: r#"sum by (pod) (rate(kube_pod_container_status_restarts_total{pod!=""}[5m]))"#,
    },
    MetricQuery {
        name: "cpu_avg",
        expression: r#"avg by (pod) (rate(container_cpu_usage_seconds_total{container!="", pod!=""}[5m]))"#,
    },
    MetricQuery {
        name: "net_receive",
        expression: r#"sum by (pod) (rate(container_network_receive_bytes_total{pod!=""}[5m]))"#,
    },
    MetricQuery {
        name: "net_transmit",
        expression: r#"sum by (pod) (rate(container_network_transmit_bytes_total{pod!=""}[5m]))"#,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_query_names_are_unique() {
        let names: HashSet<&str> = QUERIES.iter().map(|q| q.name).collect();
        assert_eq!(names.len(), QUERIES.len());
    }

    #[test]
    fn test_queries_are_non_empty() {
        assert!(!QUERIES.is_empty());
        for query in QUERIES {
            assert!(!query.name.is_empty());
            assert!(!query.expression.is_empty());
        }
    }
}
