//! `$metadata` parsing and the per-service schema cache.
//!
//! The parser walks the EDMX document by local element name, so namespace
//! prefixes (`edmx:`, `m:`, v2 vs v4 schema namespaces) do not matter.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ODataError, Result};
use crate::transport::Transport;

/// One entity set and the properties of its entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySetInfo {
    pub name: String,
    /// Entity type as declared, usually namespace-qualified.
    pub entity_type: String,
    pub properties: Vec<String>,
}

/// Parsed schema of a single OData service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSchema {
    entity_sets: BTreeMap<String, EntitySetInfo>,
}

struct OpenEntityType {
    name: Option<String>,
    child_depth: usize,
    properties: Vec<String>,
}

impl ServiceSchema {
    /// Parse an EDMX document.
    ///
    /// Only `Property` elements directly under an `EntityType` are collected.
    /// An `EntitySet` is linked to its type by the last dot-separated segment
    /// of its `EntityType` attribute.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut depth = 0usize;
        let mut open: Option<OpenEntityType> = None;
        let mut type_props: HashMap<String, Vec<String>> = HashMap::new();
        let mut sets: Vec<(String, String)> = Vec::new();

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(ODataError::Metadata(format!(
                        "malformed document at byte {}: {e}",
                        reader.buffer_position()
                    )))
                }
            };

            match event {
                Event::Start(e) => {
                    match e.local_name().as_ref() {
                        b"EntityType" => {
                            open = Some(OpenEntityType {
                                name: attr(&e, "Name")?,
                                child_depth: depth + 1,
                                properties: Vec::new(),
                            });
                        }
                        b"EntitySet" => collect_set(&e, &mut sets)?,
                        b"Property" => collect_property(&e, depth, open.as_mut())?,
                        _ => {}
                    }
                    depth += 1;
                }
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"EntityType" => {
                        if let Some(name) = attr(&e, "Name")? {
                            type_props.insert(name, Vec::new());
                        }
                    }
                    b"EntitySet" => collect_set(&e, &mut sets)?,
                    b"Property" => collect_property(&e, depth, open.as_mut())?,
                    _ => {}
                },
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if open.as_ref().is_some_and(|t| t.child_depth == depth + 1) {
                        if let Some(OpenEntityType {
                            name: Some(name),
                            properties,
                            ..
                        }) = open.take()
                        {
                            type_props.insert(name, properties);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let entity_sets = sets
            .into_iter()
            .map(|(name, entity_type)| {
                let short = entity_type.rsplit('.').next().unwrap_or(&entity_type);
                let properties = type_props.get(short).cloned().unwrap_or_default();
                let info = EntitySetInfo {
                    name: name.clone(),
                    entity_type,
                    properties,
                };
                (name, info)
            })
            .collect();

        Ok(Self { entity_sets })
    }

    /// Entity set names, sorted.
    pub fn entity_set_names(&self) -> Vec<String> {
        self.entity_sets.keys().cloned().collect()
    }

    pub fn entity_set(&self, name: &str) -> Option<&EntitySetInfo> {
        self.entity_sets.get(name)
    }

    /// Properties of an entity set; empty when the set is unknown.
    pub fn properties(&self, entity_set: &str) -> Vec<String> {
        self.entity_sets
            .get(entity_set)
            .map(|info| info.properties.clone())
            .unwrap_or_default()
    }

    /// Partition `fields` into `(valid, unknown)`, preserving request order.
    pub fn validate_select<S: AsRef<str>>(
        &self,
        entity_set: &str,
        fields: &[S],
    ) -> (Vec<String>, Vec<String>) {
        let props = self
            .entity_sets
            .get(entity_set)
            .map(|info| info.properties.as_slice())
            .unwrap_or_default();

        fields
            .iter()
            .map(|f| f.as_ref().to_string())
            .partition(|f| props.iter().any(|p| p == f))
    }

    pub fn is_empty(&self) -> bool {
        self.entity_sets.is_empty()
    }
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let attribute = e
        .try_get_attribute(name)
        .map_err(|err| ODataError::Metadata(format!("bad attribute {name}: {err}")))?;
    match attribute {
        Some(a) => {
            let value = a
                .unescape_value()
                .map_err(|err| ODataError::Metadata(format!("bad attribute {name}: {err}")))?;
            Ok(Some(value.into_owned()).filter(|v| !v.is_empty()))
        }
        None => Ok(None),
    }
}

fn collect_set(e: &BytesStart<'_>, sets: &mut Vec<(String, String)>) -> Result<()> {
    if let (Some(name), Some(entity_type)) = (attr(e, "Name")?, attr(e, "EntityType")?) {
        sets.push((name, entity_type));
    }
    Ok(())
}

fn collect_property(
    e: &BytesStart<'_>,
    depth: usize,
    open: Option<&mut OpenEntityType>,
) -> Result<()> {
    if let Some(entity) = open.filter(|t| t.child_depth == depth) {
        if let Some(name) = attr(e, "Name")? {
            entity.properties.push(name);
        }
    }
    Ok(())
}

// ── Cache ─────────────────────────────────────────────────────────

/// Lazily fetched schema for one service.
///
/// The first accessor fetches and parses `$metadata`; later calls reuse the
/// result (even an empty one) until [`MetadataCache::refresh`] is called.
/// Fetch failures propagate and leave the cache unfilled.
pub struct MetadataCache {
    transport: Arc<dyn Transport>,
    service: String,
    sap_client: Option<String>,
    schema: Mutex<Option<Arc<ServiceSchema>>>,
}

impl MetadataCache {
    pub fn new(
        transport: Arc<dyn Transport>,
        service: impl Into<String>,
        sap_client: Option<String>,
    ) -> Self {
        Self {
            transport,
            service: service.into(),
            sap_client,
            schema: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<ServiceSchema> {
        let xml = self
            .transport
            .get_text(&self.service, "$metadata", self.sap_client.as_deref())
            .await?;
        let schema = ServiceSchema::parse(&xml)?;
        debug!(
            service = %self.service,
            entity_sets = schema.entity_sets.len(),
            "parsed service metadata"
        );
        Ok(schema)
    }

    /// The cached schema, fetching it on first use.
    pub async fn schema(&self) -> Result<Arc<ServiceSchema>> {
        let mut guard = self.schema.lock().await;
        if let Some(schema) = guard.as_ref() {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(self.fetch().await?);
        *guard = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Re-fetch the schema unconditionally.
    pub async fn refresh(&self) -> Result<()> {
        let schema = Arc::new(self.fetch().await?);
        *self.schema.lock().await = Some(schema);
        Ok(())
    }

    pub async fn entity_sets(&self) -> Result<Vec<String>> {
        Ok(self.schema().await?.entity_set_names())
    }

    pub async fn properties(&self, entity_set: &str) -> Result<Vec<String>> {
        Ok(self.schema().await?.properties(entity_set))
    }

    pub async fn entity_set_info(&self, entity_set: &str) -> Result<Option<EntitySetInfo>> {
        Ok(self.schema().await?.entity_set(entity_set).cloned())
    }

    pub async fn validate_select<S: AsRef<str>>(
        &self,
        entity_set: &str,
        fields: &[S],
    ) -> Result<(Vec<String>, Vec<String>)> {
        Ok(self.schema().await?.validate_select(entity_set, fields))
    }
}
