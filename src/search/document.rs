//! Tantivy schema for historical incidents and document conversion

use crate::models::IncidentDocument;
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::EMBEDDING_FIELD;
use tantivy::schema::*;
use tantivy::TantivyDocument;

/// Stored JSON copy of the full document
const SOURCE_FIELD: &str = "_source";

/// Field handles for the incident schema
#[derive(Debug, Clone)]
pub struct IncidentFields {
    pub incident_id: Field,
    pub title: Field,
    pub description: Field,
    pub error_messages: Field,
    pub technical_terms: Field,
    pub resolution_steps: Field,
    pub root_cause: Field,
    pub severity: Field,
    pub incident_type: Field,
    pub status: Field,
    pub source_type: Field,
    pub affected_systems: Field,
    pub tags: Field,
    pub created_at: Field,
    pub resolution_time_minutes: Field,
    pub embedding: Field,
    pub source: Field,
}

impl IncidentFields {
    /// Resolve handles against a schema built by [`build_incident_schema`]
    pub fn from_schema(schema: &Schema) -> SearchResult<Self> {
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                SearchError::IndexInitFailed(format!("Schema is missing field '{}'", name))
            })
        };

        Ok(Self {
            incident_id: field("incident_id")?,
            title: field("title")?,
            description: field("description")?,
            error_messages: field("error_messages")?,
            technical_terms: field("technical_terms")?,
            resolution_steps: field("resolution_steps")?,
            root_cause: field("root_cause")?,
            severity: field("severity")?,
            incident_type: field("incident_type")?,
            status: field("status")?,
            source_type: field("source_type")?,
            affected_systems: field("affected_systems")?,
            tags: field("tags")?,
            created_at: field("created_at")?,
            resolution_time_minutes: field("resolution_time_minutes")?,
            embedding: field(EMBEDDING_FIELD)?,
            source: field(SOURCE_FIELD)?,
        })
    }

    /// Convert an incident into a Tantivy document
    pub fn to_tantivy_doc(&self, incident: &IncidentDocument) -> SearchResult<TantivyDocument> {
        let mut doc = TantivyDocument::new();

        doc.add_text(self.incident_id, &incident.incident_id);
        doc.add_text(self.title, &incident.title);
        doc.add_text(self.description, &incident.description);
        doc.add_text(self.error_messages, &incident.error_messages);
        for term in &incident.technical_terms {
            doc.add_text(self.technical_terms, term);
        }
        doc.add_text(self.resolution_steps, &incident.resolution_steps);
        doc.add_text(self.root_cause, &incident.root_cause);

        // Keyword fields, matched exactly by filters
        doc.add_text(self.severity, incident.severity.to_string());
        doc.add_text(self.incident_type, incident.incident_type.as_str());
        doc.add_text(self.status, incident.status.to_string());
        doc.add_text(self.source_type, &incident.source_type);
        for system in &incident.affected_systems {
            doc.add_text(self.affected_systems, system);
        }
        for tag in &incident.tags {
            doc.add_text(self.tags, tag);
        }

        doc.add_date(
            self.created_at,
            tantivy::DateTime::from_timestamp_secs(incident.created_at.timestamp()),
        );
        doc.add_u64(
            self.resolution_time_minutes,
            u64::from(incident.resolution_time_minutes),
        );

        if let Some(embedding) = &incident.description_embedding {
            doc.add_bytes(self.embedding, encode_embedding(embedding).as_slice());
        }

        // The embedding lives in its own field; keep it out of the JSON copy
        let mut source = incident.clone();
        source.description_embedding = None;
        let json = serde_json::to_string(&source).map_err(|e| {
            SearchError::IndexingFailed(format!(
                "Failed to serialize incident {}: {}",
                incident.incident_id, e
            ))
        })?;
        doc.add_text(self.source, json);

        Ok(doc)
    }

    /// Rebuild an incident from its stored fields
    pub fn from_tantivy_doc(&self, doc: &TantivyDocument) -> SearchResult<IncidentDocument> {
        let json = doc
            .get_first(self.source)
            .and_then(|v| v.as_str())
            .ok_or_else(|| SearchError::CorruptDocument("missing stored source".to_string()))?;

        let mut incident: IncidentDocument = serde_json::from_str(json)
            .map_err(|e| SearchError::CorruptDocument(e.to_string()))?;
        incident.description_embedding = self.embedding_of(doc);

        Ok(incident)
    }

    /// Stored embedding of a document, if it has one
    pub fn embedding_of(&self, doc: &TantivyDocument) -> Option<Vec<f32>> {
        doc.get_first(self.embedding)
            .and_then(|v| v.as_bytes())
            .map(decode_embedding)
            .filter(|embedding| !embedding.is_empty())
    }

    /// Handle for a lexical field by name
    pub fn lexical(&self, name: &str) -> Option<Field> {
        match name {
            "title" => Some(self.title),
            "description" => Some(self.description),
            "error_messages" => Some(self.error_messages),
            "technical_terms" => Some(self.technical_terms),
            "resolution_steps" => Some(self.resolution_steps),
            "root_cause" => Some(self.root_cause),
            _ => None,
        }
    }

    /// Handle for a filterable keyword field by name
    pub fn keyword(&self, name: &str) -> Option<Field> {
        match name {
            "incident_id" => Some(self.incident_id),
            "severity" => Some(self.severity),
            "incident_type" => Some(self.incident_type),
            "status" => Some(self.status),
            "source_type" => Some(self.source_type),
            "affected_systems" => Some(self.affected_systems),
            "tags" => Some(self.tags),
            _ => None,
        }
    }
}

/// Build the search schema for historical incidents
pub fn build_incident_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // Keyword fields, exact match only
    schema_builder.add_text_field("incident_id", STRING | STORED);
    schema_builder.add_text_field("severity", STRING);
    schema_builder.add_text_field("incident_type", STRING);
    schema_builder.add_text_field("status", STRING);
    schema_builder.add_text_field("source_type", STRING);
    schema_builder.add_text_field("affected_systems", STRING);
    schema_builder.add_text_field("tags", STRING);

    // Full-text fields; stored so snippets can be generated
    schema_builder.add_text_field("title", TEXT | STORED);
    schema_builder.add_text_field("description", TEXT | STORED);
    schema_builder.add_text_field("error_messages", TEXT | STORED);
    schema_builder.add_text_field("technical_terms", TEXT | STORED);
    schema_builder.add_text_field("resolution_steps", TEXT | STORED);
    schema_builder.add_text_field("root_cause", TEXT | STORED);

    schema_builder.add_date_field("created_at", INDEXED | STORED | FAST);
    schema_builder.add_u64_field("resolution_time_minutes", STORED | FAST);

    schema_builder.add_bytes_field(EMBEDDING_FIELD, STORED);
    schema_builder.add_text_field(SOURCE_FIELD, STORED);

    schema_builder.build()
}

/// Little-endian f32 encoding used for the stored embedding
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentStatus, IncidentType, Severity};
    use chrono::Utc;

    fn sample_incident() -> IncidentDocument {
        IncidentDocument {
            incident_id: "INC-10001".to_string(),
            title: "Database connection pool exhausted".to_string(),
            description: "HikariCP pool hit its maximum size".to_string(),
            severity: Severity::P1,
            incident_type: IncidentType::Database,
            status: IncidentStatus::Resolved,
            affected_systems: vec!["payment-service".to_string()],
            error_messages: "Connection is not available, request timed out".to_string(),
            stack_trace: None,
            technical_terms: vec!["HikariCP".to_string(), "connection pool".to_string()],
            resolution_steps: "1. Increase pool size".to_string(),
            resolution_time_minutes: 12,
            root_cause: "Connection leak".to_string(),
            source_type: "incident".to_string(),
            source_url: None,
            created_at: Utc::now(),
            resolved_at: None,
            updated_at: None,
            tags: vec!["database".to_string()],
            description_embedding: Some(vec![0.25, -1.5, 3.0]),
            related_incidents: Vec::new(),
        }
    }

    #[test]
    fn test_schema_building() {
        let schema = build_incident_schema();
        assert!(IncidentFields::from_schema(&schema).is_ok());
        assert!(schema.get_field("incident_id").is_ok());
        assert!(schema.get_field(EMBEDDING_FIELD).is_ok());
    }

    #[test]
    fn test_tantivy_doc_preserves_incident() {
        let fields = IncidentFields::from_schema(&build_incident_schema()).unwrap();
        let incident = sample_incident();

        let doc = fields.to_tantivy_doc(&incident).unwrap();
        let restored = fields.from_tantivy_doc(&doc).unwrap();

        assert_eq!(restored.incident_id, incident.incident_id);
        assert_eq!(restored.technical_terms, incident.technical_terms);
        assert_eq!(restored.description_embedding, incident.description_embedding);
    }

    #[test]
    fn test_document_without_embedding() {
        let fields = IncidentFields::from_schema(&build_incident_schema()).unwrap();
        let mut incident = sample_incident();
        incident.description_embedding = None;

        let doc = fields.to_tantivy_doc(&incident).unwrap();
        assert!(fields.embedding_of(&doc).is_none());
    }

    #[test]
    fn test_field_lookup() {
        let fields = IncidentFields::from_schema(&build_incident_schema()).unwrap();
        assert!(fields.lexical("title").is_some());
        assert!(fields.lexical("severity").is_none());
        assert!(fields.keyword("affected_systems").is_some());
        assert!(fields.keyword("description").is_none());
    }
}
