//! Export row builder (§4.I): materializes path-finder/spider output into
//! row form, with type→icon and type→label-template maps loaded from a JSON
//! configuration at start-up.
//!
//! Rendering the row table to a spreadsheet file is the one leaf concern
//! this crate still has to physically produce (the job runner's contract
//! names a literal `.xlsx` file) — [`XlsxSink`] is a thin, single-purpose
//! writer around `rust_xlsxwriter`; the row model and its construction are
//! the actual deliverable.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MeshlinkError;
use crate::pathfinder::Connections;
use crate::spider::SpiderResult;
use crate::store::BipartiteStore;

/// Type→icon and type→label-template maps, loaded once at start-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(rename = "typeToIcon", default)]
    pub type_to_icon: BTreeMap<String, String>,
    #[serde(rename = "typeToLabel", default)]
    pub type_to_label: BTreeMap<String, String>,
}

impl ExportConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MeshlinkError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn icon_for(&self, entity_type: &str) -> String {
        self.type_to_icon
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }

    fn label_for(&self, entity_type: &str, attributes: &BTreeMap<String, String>) -> String {
        let template = self
            .type_to_label
            .get(entity_type)
            .map(String::as_str)
            .unwrap_or("{{id}}");
        apply_template(template, attributes)
    }
}

/// Substitutes `{{attribute}}` placeholders; missing attributes resolve to
/// the empty string.
pub fn apply_template(template: &str, attributes: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                out.push_str(attributes.get(key).map(String::as_str).unwrap_or(""));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: String,
    pub entity_type: String,
    pub icon: String,
    pub label: String,
    pub membership: BTreeSet<String>,
    pub description: String,
}

fn endpoint_info(
    bipartite: &dyn BipartiteStore,
    id: &str,
    export_config: &ExportConfig,
    membership: BTreeSet<String>,
) -> Result<EndpointInfo, MeshlinkError> {
    let entity = bipartite.get_entity(id)?;
    let (entity_type, attributes) = match &entity {
        Some(e) => (e.entity_type.clone(), e.attributes.clone()),
        None => (String::new(), BTreeMap::new()),
    };
    Ok(EndpointInfo {
        id: id.to_string(),
        icon: export_config.icon_for(&entity_type),
        label: export_config.label_for(&entity_type, &attributes),
        description: attributes.get("description").cloned().unwrap_or_default(),
        entity_type,
        membership,
    })
}

/// Summarizes the documents witnessing an entity pair: the intersection of
/// their linked-document sets, rendered as a short sentence.
fn link_summary(bipartite: &dyn BipartiteStore, a: &str, b: &str) -> Result<String, MeshlinkError> {
    let entity_a = bipartite.get_entity(a)?;
    let entity_b = bipartite.get_entity(b)?;
    let (Some(entity_a), Some(entity_b)) = (entity_a, entity_b) else {
        return Ok("0 documents".to_string());
    };
    let shared: Vec<&String> = entity_a
        .linked_documents
        .intersection(&entity_b.linked_documents)
        .collect();
    if shared.is_empty() {
        return Ok("0 documents".to_string());
    }
    let mut types = BTreeSet::new();
    let mut representative_date: Option<String> = None;
    for doc_id in &shared {
        if let Some(document) = bipartite.get_document(doc_id)? {
            types.insert(document.document_type.clone());
            if representative_date.is_none() {
                if let Some(date) = document.attributes.get("date") {
                    representative_date = Some(date.clone());
                }
            }
        }
    }
    let type_list: Vec<String> = types.into_iter().collect();
    let mut sentence = format!(
        "{} document{} ({})",
        shared.len(),
        if shared.len() == 1 { "" } else { "s" },
        type_list.join(", ")
    );
    if let Some(date) = representative_date {
        sentence.push_str(&format!(", earliest {date}"));
    }
    Ok(sentence)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExportRow {
    pub set_index: usize,
    pub endpoint1: EndpointInfo,
    pub endpoint2: EndpointInfo,
    pub link_summary: String,
}

/// Builds one row per edge of every returned path, sorted stably by
/// `(set-index-of-endpoint-1, endpoint-1 id, endpoint-2 id)`.
///
/// `sets` gives each input set's actual membership, so a node's
/// `EndpointInfo::membership` reflects every set it really belongs to —
/// not just whichever `(set_i, set_j)` pair the path happened to come
/// from. Intermediate nodes on paths longer than one hop are typically in
/// neither set.
pub fn build_path_rows(
    connections: &Connections,
    set_order: &[String],
    sets: &BTreeMap<String, BTreeSet<String>>,
    bipartite: &dyn BipartiteStore,
    export_config: &ExportConfig,
) -> Result<Vec<PathExportRow>, MeshlinkError> {
    let set_index_of = |name: &str| set_order.iter().position(|n| n == name).unwrap_or(usize::MAX);
    let membership_of = |id: &str| -> BTreeSet<String> {
        sets.iter()
            .filter(|(_, ids)| ids.contains(id))
            .map(|(name, _)| name.clone())
            .collect()
    };

    let mut rows = Vec::new();
    for ((set_i, _set_j), pair) in &connections.set_pairs {
        for ((_root, _goal), paths) in &pair.paths {
            for path in paths {
                for window in path.ids.windows(2) {
                    let (a, b) = (&window[0], &window[1]);
                    let endpoint1 = endpoint_info(bipartite, a, export_config, membership_of(a))?;
                    let endpoint2 = endpoint_info(bipartite, b, export_config, membership_of(b))?;
                    let link = link_summary(bipartite, a, b)?;
                    rows.push(PathExportRow {
                        set_index: set_index_of(set_i),
                        endpoint1,
                        endpoint2,
                        link_summary: link,
                    });
                }
            }
        }
    }
    rows.sort_by(|a, b| {
        (a.set_index, &a.endpoint1.id, &a.endpoint2.id).cmp(&(
            b.set_index,
            &b.endpoint1.id,
            &b.endpoint2.id,
        ))
    });
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiderExportRow {
    pub endpoint1: EndpointInfo,
    pub endpoint1_is_seed: bool,
    pub endpoint2: EndpointInfo,
    pub endpoint2_is_seed: bool,
}

/// Builds one row per traversed edge, sorted by `(endpoint-1 id, endpoint-2 id)`.
pub fn build_spider_rows(
    result: &SpiderResult,
    bipartite: &dyn BipartiteStore,
    export_config: &ExportConfig,
) -> Result<Vec<SpiderExportRow>, MeshlinkError> {
    let mut rows = Vec::new();
    for edge in &result.edges {
        let (_, a_is_seed) = result.visited.get(&edge.a).copied().unwrap_or((0, false));
        let (_, b_is_seed) = result.visited.get(&edge.b).copied().unwrap_or((0, false));
        let endpoint1 = endpoint_info(bipartite, &edge.a, export_config, BTreeSet::new())?;
        let endpoint2 = endpoint_info(bipartite, &edge.b, export_config, BTreeSet::new())?;
        rows.push(SpiderExportRow {
            endpoint1,
            endpoint1_is_seed: a_is_seed,
            endpoint2,
            endpoint2_is_seed: b_is_seed,
        });
    }
    rows.sort_by(|a, b| (&a.endpoint1.id, &a.endpoint2.id).cmp(&(&b.endpoint1.id, &b.endpoint2.id)));
    Ok(rows)
}

/// Destination for a built row table. The tabular spreadsheet rendering
/// itself is a leaf concern; this trait is the seam an external formatter
/// would plug into.
pub trait ExportSink {
    fn write_path_rows(&self, rows: &[PathExportRow], path: &Path) -> Result<(), MeshlinkError>;
    fn write_spider_rows(&self, rows: &[SpiderExportRow], path: &Path) -> Result<(), MeshlinkError>;
}

/// Writes the row table to a single-sheet `.xlsx` file.
pub struct XlsxSink;

impl ExportSink for XlsxSink {
    fn write_path_rows(&self, rows: &[PathExportRow], path: &Path) -> Result<(), MeshlinkError> {
        use rust_xlsxwriter::Workbook;
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let headers = [
            "Endpoint 1 ID",
            "Endpoint 1 Type",
            "Endpoint 1 Icon",
            "Endpoint 1 Label",
            "Endpoint 2 ID",
            "Endpoint 2 Type",
            "Endpoint 2 Icon",
            "Endpoint 2 Label",
            "Link Summary",
        ];
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *header)?;
        }
        for (row_idx, row) in rows.iter().enumerate() {
            let r = (row_idx + 1) as u32;
            sheet.write_string(r, 0, &row.endpoint1.id)?;
            sheet.write_string(r, 1, &row.endpoint1.entity_type)?;
            sheet.write_string(r, 2, &row.endpoint1.icon)?;
            sheet.write_string(r, 3, &row.endpoint1.label)?;
            sheet.write_string(r, 4, &row.endpoint2.id)?;
            sheet.write_string(r, 5, &row.endpoint2.entity_type)?;
            sheet.write_string(r, 6, &row.endpoint2.icon)?;
            sheet.write_string(r, 7, &row.endpoint2.label)?;
            sheet.write_string(r, 8, &row.link_summary)?;
        }
        workbook.save(path)?;
        Ok(())
    }

    fn write_spider_rows(&self, rows: &[SpiderExportRow], path: &Path) -> Result<(), MeshlinkError> {
        use rust_xlsxwriter::Workbook;
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let headers = [
            "Endpoint 1 ID",
            "Endpoint 1 Type",
            "Endpoint 1 Seed",
            "Endpoint 2 ID",
            "Endpoint 2 Type",
            "Endpoint 2 Seed",
        ];
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *header)?;
        }
        for (row_idx, row) in rows.iter().enumerate() {
            let r = (row_idx + 1) as u32;
            sheet.write_string(r, 0, &row.endpoint1.id)?;
            sheet.write_string(r, 1, &row.endpoint1.entity_type)?;
            sheet.write_boolean(r, 2, row.endpoint1_is_seed)?;
            sheet.write_string(r, 3, &row.endpoint2.id)?;
            sheet.write_string(r, 4, &row.endpoint2.entity_type)?;
            sheet.write_boolean(r, 5, row.endpoint2_is_seed)?;
        }
        workbook.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;
    use crate::pathfinder::{Path as FoundPath, SetPairConnections};
    use crate::spider::{SpiderEdge, SpiderResult};
    use crate::store::MemoryBipartiteStore;

    #[test]
    fn template_substitutes_known_and_blanks_missing() {
        let mut attrs = BTreeMap::new();
        attrs.insert("name".to_string(), "Alice".to_string());
        assert_eq!(
            apply_template("{{name}} ({{missing}})", &attrs),
            "Alice ()"
        );
    }

    #[test]
    fn template_with_no_placeholders_is_unchanged() {
        let attrs = BTreeMap::new();
        assert_eq!(apply_template("static label", &attrs), "static label");
    }

    fn store_with(ids: &[&str]) -> MemoryBipartiteStore {
        let store = MemoryBipartiteStore::new();
        for id in ids {
            store.add_entity(Entity::new(*id, "person")).unwrap();
        }
        store
    }

    /// A 3-node path e1-e3-e4 between sets A={e1} and B={e4}: the
    /// intermediate node e3 belongs to neither set, and the row for the
    /// (e3, e4) window must reflect that rather than inheriting A/B.
    #[test]
    fn intermediate_node_on_multi_hop_path_has_no_set_membership() {
        let bipartite = store_with(&["e1", "e3", "e4"]);
        let mut sets = BTreeMap::new();
        sets.insert("A".to_string(), ["e1".to_string()].into_iter().collect());
        sets.insert("B".to_string(), ["e4".to_string()].into_iter().collect());

        let mut paths = BTreeMap::new();
        paths.insert(
            ("e1".to_string(), "e4".to_string()),
            vec![FoundPath {
                ids: vec!["e1".to_string(), "e3".to_string(), "e4".to_string()],
            }],
        );
        let mut set_pairs = BTreeMap::new();
        set_pairs.insert(
            ("A".to_string(), "B".to_string()),
            SetPairConnections { paths },
        );
        let connections = Connections { set_pairs };
        let set_order = vec!["A".to_string(), "B".to_string()];

        let rows = build_path_rows(
            &connections,
            &set_order,
            &sets,
            &bipartite,
            &ExportConfig::default(),
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.endpoint1.id, "e1");
        assert_eq!(first.endpoint1.membership, ["A".to_string()].into_iter().collect());
        assert_eq!(first.endpoint2.id, "e3");
        assert!(first.endpoint2.membership.is_empty());

        let second = &rows[1];
        assert_eq!(second.endpoint1.id, "e3");
        assert!(second.endpoint1.membership.is_empty());
        assert_eq!(second.endpoint2.id, "e4");
        assert_eq!(second.endpoint2.membership, ["B".to_string()].into_iter().collect());
    }

    #[test]
    fn build_spider_rows_tags_seed_membership() {
        let bipartite = store_with(&["e1", "e2"]);
        let mut visited = BTreeMap::new();
        visited.insert("e1".to_string(), (0, true));
        visited.insert("e2".to_string(), (1, false));
        let result = SpiderResult {
            visited,
            edges: [SpiderEdge {
                a: "e1".to_string(),
                b: "e2".to_string(),
            }]
            .into_iter()
            .collect(),
        };

        let rows = build_spider_rows(&result, &bipartite, &ExportConfig::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].endpoint1_is_seed);
        assert!(!rows[0].endpoint2_is_seed);
    }

    #[test]
    fn link_summary_counts_shared_documents() {
        let bipartite = store_with(&["e1", "e2"]);
        bipartite.add_document(crate::model::Document::new("d1", "article")).unwrap();
        bipartite.add_link("e1", "d1").unwrap();
        bipartite.add_link("e2", "d1").unwrap();

        let summary = link_summary(&bipartite, "e1", "e2").unwrap();
        assert!(summary.starts_with('1'));
    }

    #[test]
    fn link_summary_is_zero_with_no_shared_documents() {
        let bipartite = store_with(&["e1", "e2"]);
        assert_eq!(link_summary(&bipartite, "e1", "e2").unwrap(), "0 documents");
    }
}
