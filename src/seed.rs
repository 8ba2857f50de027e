//! Sample historical incidents for local development and tests

use crate::error::Result;
use crate::llm::Embedder;
use crate::models::{IncidentDocument, IncidentStatus, IncidentType, Severity};
use crate::search::TantivyStore;
use chrono::{Duration, Utc};
use tracing::{info, instrument};

/// Window over which generated incidents are spread
const HISTORY_DAYS: i64 = 180;

/// First generated incident number
const FIRST_INCIDENT_NUMBER: usize = 10000;

struct Template {
    title: &'static str,
    description: &'static str,
    severity: Severity,
    incident_type: IncidentType,
    error_messages: &'static str,
    resolution_steps: &'static str,
    root_cause: &'static str,
    resolution_time_minutes: u32,
    technical_terms: &'static [&'static str],
    affected_systems: &'static [&'static str],
    tags: &'static [&'static str],
}

const TEMPLATES: [Template; 5] = [
    Template {
        title: "Database Connection Pool Exhausted",
        description: "Users reporting 500 errors on checkout page. Error logs show: 'HikariCP - Connection is not available, request timed out after 30000ms'. Connection pool size currently at 20. Peak traffic time.",
        severity: Severity::P1,
        incident_type: IncidentType::Database,
        error_messages: "java.sql.SQLTransientConnectionException: HikariCP - Connection is not available\nCaused by: java.sql.SQLException: Timeout after 30000ms",
        resolution_steps: "1. Increased HikariCP maximum pool size from 20 to 50 in application.properties\n2. Increased minimum idle connections from 10 to 25\n3. Added connection leak detection with 60s threshold\n4. Deployed config change via rolling update\n5. Monitored connection pool metrics - utilization dropped from 100% to 45%",
        root_cause: "Traffic spike exceeded connection pool capacity during flash sale event",
        resolution_time_minutes: 12,
        technical_terms: &["HikariCP", "connection pool", "SQLTransientConnectionException", "timeout"],
        affected_systems: &["checkout-service", "postgres-primary"],
        tags: &["database", "performance", "connection-pool"],
    },
    Template {
        title: "Memory Leak in User Service causing OOM",
        description: "User service pods crashing every 2-3 hours with OutOfMemoryError. Heap dumps show excessive String objects in memory. GC logs indicate heap exhaustion before crash.",
        severity: Severity::P0,
        incident_type: IncidentType::Application,
        error_messages: "java.lang.OutOfMemoryError: Java heap space\nat java.util.HashMap.resize(HashMap.java:704)\nHeap dump file created [2789453312 bytes]",
        resolution_steps: "1. Analyzed heap dump with Eclipse MAT - found 850MB of String objects\n2. Identified bug in user cache implementation - not clearing expired entries\n3. Added scheduled task to evict expired cache entries every 5 minutes\n4. Increased heap size from 2GB to 4GB as temporary measure\n5. Deployed fix to production\n6. Monitored heap usage - now stable at 1.2GB",
        root_cause: "Cache implementation bug causing memory leak - expired user sessions never evicted from memory",
        resolution_time_minutes: 85,
        technical_terms: &["OutOfMemoryError", "heap dump", "memory leak", "garbage collection", "cache eviction"],
        affected_systems: &["user-service", "kubernetes-cluster"],
        tags: &["memory", "java", "production-outage"],
    },
    Template {
        title: "Redis Cluster Split-Brain causing data inconsistency",
        description: "Multiple Redis master nodes detected. Writes going to different masters causing data conflicts. Client applications reporting inconsistent user session data.",
        severity: Severity::P0,
        incident_type: IncidentType::Database,
        error_messages: "READONLY You can't write against a read only replica.\nCluster state: fail\nNot all cluster slots are covered",
        resolution_steps: "1. Checked Redis Sentinel logs - network partition 15 minutes ago\n2. Identified split-brain: 2 masters for same shard\n3. Stopped all writes by enabling maintenance mode\n4. Manually failed over to correct master using CLUSTER FAILOVER\n5. Resynced replica nodes\n6. Verified cluster topology with CLUSTER NODES\n7. Re-enabled writes after validation",
        root_cause: "Network partition between availability zones caused Redis Sentinel to elect new master while old master still responsive",
        resolution_time_minutes: 45,
        technical_terms: &["Redis", "split-brain", "cluster failover", "sentinel", "network partition"],
        affected_systems: &["redis-cluster", "session-store"],
        tags: &["redis", "distributed-systems", "data-consistency"],
    },
    Template {
        title: "Kubernetes Node Not Ready - Disk Pressure",
        description: "Worker node showing NotReady status. Pods being evicted. kubectl describe node shows 'DiskPressure' condition. Root filesystem at 98% usage.",
        severity: Severity::P1,
        incident_type: IncidentType::Infrastructure,
        error_messages: "Node condition DiskPressure is now: True\nEvicting pod: user-service-7d4f8c9b5-9k2mp\nFailed to garbage collect: failed to evict pods",
        resolution_steps: "1. SSH'd to problematic node\n2. Found /var/log/containers filling disk - 45GB of old logs\n3. Cleaned up old container logs: find /var/log/containers -type f -mtime +7 -delete\n4. Adjusted log rotation policy in /etc/logrotate.d/containers\n5. Node returned to Ready state automatically\n6. Implemented DaemonSet for automated log cleanup\n7. Added disk usage monitoring alerts at 80%",
        root_cause: "Container logs not being rotated properly, filling node's root filesystem",
        resolution_time_minutes: 25,
        technical_terms: &["Kubernetes", "DiskPressure", "pod eviction", "log rotation", "node NotReady"],
        affected_systems: &["k8s-worker-node-03", "logging-system"],
        tags: &["kubernetes", "disk-space", "node-management"],
    },
    Template {
        title: "API Gateway 504 Timeout - Upstream Service Slow",
        description: "Users reporting API timeouts. API Gateway returning 504 Gateway Timeout errors. Backend services appear healthy but response times elevated from 200ms to 8000ms.",
        severity: Severity::P1,
        incident_type: IncidentType::Application,
        error_messages: "upstream timed out (110: Connection timed out) while reading response header from upstream\n504 Gateway Time-out",
        resolution_steps: "1. Checked API Gateway logs - timeouts after 30s\n2. Investigated backend service - found N+1 database query problem\n3. Analyzed slow query log - missing index on orders.user_id\n4. Created index: CREATE INDEX idx_orders_user_id ON orders(user_id)\n5. Query time dropped from 7.2s to 45ms\n6. Added database query performance monitoring",
        root_cause: "Recent code deployment introduced N+1 query pattern without proper database indexing",
        resolution_time_minutes: 38,
        technical_terms: &["504 timeout", "N+1 query", "database index", "upstream timeout", "slow query"],
        affected_systems: &["api-gateway", "order-service", "postgres-db"],
        tags: &["performance", "database", "indexing"],
    },
];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Generate `count` resolved incidents, cycling through the templates.
///
/// Output is deterministic apart from the anchor time: ids start at
/// `INC-10000` and creation times spread over the last 180 days. No
/// embeddings are attached.
pub fn sample_incidents(count: usize) -> Vec<IncidentDocument> {
    let base = Utc::now() - Duration::days(HISTORY_DAYS);

    (0..count)
        .map(|i| {
            let template = &TEMPLATES[i % TEMPLATES.len()];
            let created_at = base
                + Duration::days((i as i64 * 37) % HISTORY_DAYS)
                + Duration::hours((i as i64 * 7) % 24);
            let resolved_at =
                created_at + Duration::minutes(i64::from(template.resolution_time_minutes));

            IncidentDocument {
                incident_id: format!("INC-{:05}", FIRST_INCIDENT_NUMBER + i),
                title: template.title.to_string(),
                description: template.description.to_string(),
                severity: template.severity,
                incident_type: template.incident_type,
                status: IncidentStatus::Resolved,
                affected_systems: owned(template.affected_systems),
                error_messages: template.error_messages.to_string(),
                stack_trace: None,
                technical_terms: owned(template.technical_terms),
                resolution_steps: template.resolution_steps.to_string(),
                resolution_time_minutes: template.resolution_time_minutes,
                root_cause: template.root_cause.to_string(),
                source_type: "incident".to_string(),
                source_url: None,
                created_at,
                resolved_at: Some(resolved_at),
                updated_at: Some(resolved_at),
                tags: owned(template.tags),
                description_embedding: None,
                related_incidents: Vec::new(),
            }
        })
        .collect()
}

/// Embed any documents that lack a vector, then index them all
#[instrument(skip_all, fields(count = documents.len()))]
pub async fn ingest(
    store: &TantivyStore,
    embedder: &dyn Embedder,
    mut documents: Vec<IncidentDocument>,
) -> Result<usize> {
    for document in documents.iter_mut() {
        if document.description_embedding.is_none() {
            let vector = embedder.embed(&document.embedding_text()).await?;
            document.description_embedding = Some(vector);
        }
    }

    let indexed = store.index_documents(&documents).await?;
    info!(indexed, "Ingested incidents");
    Ok(indexed)
}
