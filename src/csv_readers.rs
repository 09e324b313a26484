//! Streaming typed row readers over entity/document/link CSV files (§4.C).
//!
//! Each reader resolves the declared `idField`/`fieldToAttribute` column
//! names to indices once, at construction, so a missing required column
//! fails fast with `MissingField` rather than per-row.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::{DocumentsFileConfig, EntitiesFileConfig, LinksFileConfig};
use crate::error::MeshlinkError;
use crate::model::{Document, Entity, Link};

fn delimiter_byte(delimiter: &str) -> Result<u8, MeshlinkError> {
    let bytes = delimiter.as_bytes();
    if bytes.len() != 1 {
        return Err(MeshlinkError::InvalidDelimiter(delimiter.to_string()));
    }
    Ok(bytes[0])
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, MeshlinkError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| MeshlinkError::MissingField(name.to_string()))
}

/// Columns resolved at construction time: the id field plus every declared
/// `fieldToAttribute` mapping.
struct FieldMap {
    id_index: usize,
    attribute_indices: Vec<(usize, String)>,
}

impl FieldMap {
    fn resolve(
        headers: &csv::StringRecord,
        id_field: &str,
        field_to_attribute: &BTreeMap<String, String>,
    ) -> Result<Self, MeshlinkError> {
        let id_index = column_index(headers, id_field)?;
        let mut attribute_indices = Vec::new();
        for (field, attribute) in field_to_attribute {
            attribute_indices.push((column_index(headers, field)?, attribute.clone()));
        }
        Ok(FieldMap {
            id_index,
            attribute_indices,
        })
    }
}

/// Streaming reader over an entities CSV file.
pub struct EntityCsvReader {
    reader: csv::Reader<BufReader<File>>,
    fields: FieldMap,
    entity_type: String,
    peeked: Option<Entity>,
}

impl EntityCsvReader {
    pub fn open(path: impl AsRef<Path>, cfg: &EntitiesFileConfig) -> Result<Self, MeshlinkError> {
        let delimiter = delimiter_byte(&cfg.delimiter)?;
        let file = File::open(path.as_ref())?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(BufReader::new(file));
        let headers = reader.headers()?.clone();
        let fields = FieldMap::resolve(&headers, &cfg.entity_id_field, &cfg.field_to_attribute)?;
        let mut this = EntityCsvReader {
            reader,
            fields,
            entity_type: cfg.entity_type.clone(),
            peeked: None,
        };
        this.advance();
        Ok(this)
    }

    fn row_to_entity(&self, record: &csv::StringRecord) -> Option<Entity> {
        let id = record.get(self.fields.id_index)?.trim();
        if id.is_empty() {
            return None;
        }
        let mut entity = Entity::new(id, self.entity_type.clone());
        for (idx, attribute) in &self.fields.attribute_indices {
            if let Some(value) = record.get(*idx) {
                entity.attributes.insert(attribute.clone(), value.to_string());
            }
        }
        Some(entity)
    }

    fn advance(&mut self) {
        loop {
            let mut record = csv::StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(true) => match self.row_to_entity(&record) {
                    Some(entity) => {
                        self.peeked = Some(entity);
                        return;
                    }
                    None => {
                        tracing::warn!("skipping malformed entity row: {:?}", record);
                        continue;
                    }
                },
                Ok(false) => {
                    self.peeked = None;
                    return;
                }
                Err(e) => {
                    tracing::warn!("skipping unparseable entity row: {e}");
                    continue;
                }
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.peeked.is_some()
    }

    pub fn next_record(&mut self) -> Option<Entity> {
        let next = self.peeked.take();
        self.advance();
        next
    }

    pub fn read_all(mut self) -> Vec<Entity> {
        let mut out = Vec::new();
        while let Some(e) = self.next_record() {
            out.push(e);
        }
        out
    }
}

impl Iterator for EntityCsvReader {
    type Item = Entity;
    fn next(&mut self) -> Option<Entity> {
        self.next_record()
    }
}

/// Streaming reader over a documents CSV file.
pub struct DocumentCsvReader {
    reader: csv::Reader<BufReader<File>>,
    fields: FieldMap,
    document_type: String,
    peeked: Option<Document>,
}

impl DocumentCsvReader {
    pub fn open(
        path: impl AsRef<Path>,
        cfg: &DocumentsFileConfig,
    ) -> Result<Self, MeshlinkError> {
        let delimiter = delimiter_byte(&cfg.delimiter)?;
        let file = File::open(path.as_ref())?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(BufReader::new(file));
        let headers = reader.headers()?.clone();
        let fields =
            FieldMap::resolve(&headers, &cfg.document_id_field, &cfg.field_to_attribute)?;
        let mut this = DocumentCsvReader {
            reader,
            fields,
            document_type: cfg.document_type.clone(),
            peeked: None,
        };
        this.advance();
        Ok(this)
    }

    fn row_to_document(&self, record: &csv::StringRecord) -> Option<Document> {
        let id = record.get(self.fields.id_index)?.trim();
        if id.is_empty() {
            return None;
        }
        let mut document = Document::new(id, self.document_type.clone());
        for (idx, attribute) in &self.fields.attribute_indices {
            if let Some(value) = record.get(*idx) {
                document
                    .attributes
                    .insert(attribute.clone(), value.to_string());
            }
        }
        Some(document)
    }

    fn advance(&mut self) {
        loop {
            let mut record = csv::StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(true) => match self.row_to_document(&record) {
                    Some(document) => {
                        self.peeked = Some(document);
                        return;
                    }
                    None => {
                        tracing::warn!("skipping malformed document row: {:?}", record);
                        continue;
                    }
                },
                Ok(false) => {
                    self.peeked = None;
                    return;
                }
                Err(e) => {
                    tracing::warn!("skipping unparseable document row: {e}");
                    continue;
                }
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.peeked.is_some()
    }

    pub fn next_record(&mut self) -> Option<Document> {
        let next = self.peeked.take();
        self.advance();
        next
    }

    pub fn read_all(mut self) -> Vec<Document> {
        let mut out = Vec::new();
        while let Some(d) = self.next_record() {
            out.push(d);
        }
        out
    }
}

impl Iterator for DocumentCsvReader {
    type Item = Document;
    fn next(&mut self) -> Option<Document> {
        self.next_record()
    }
}

/// Streaming reader over a links CSV file.
pub struct LinkCsvReader {
    reader: csv::Reader<BufReader<File>>,
    entity_id_index: usize,
    document_id_index: usize,
    peeked: Option<Link>,
}

impl LinkCsvReader {
    pub fn open(path: impl AsRef<Path>, cfg: &LinksFileConfig) -> Result<Self, MeshlinkError> {
        let delimiter = delimiter_byte(&cfg.delimiter)?;
        let file = File::open(path.as_ref())?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(BufReader::new(file));
        let headers = reader.headers()?.clone();
        let entity_id_index = column_index(&headers, &cfg.entity_id_field)?;
        let document_id_index = column_index(&headers, &cfg.document_id_field)?;
        let mut this = LinkCsvReader {
            reader,
            entity_id_index,
            document_id_index,
            peeked: None,
        };
        this.advance();
        Ok(this)
    }

    fn row_to_link(&self, record: &csv::StringRecord) -> Option<Link> {
        let entity_id = record.get(self.entity_id_index)?.trim();
        let document_id = record.get(self.document_id_index)?.trim();
        if entity_id.is_empty() || document_id.is_empty() {
            return None;
        }
        Some(Link {
            entity_id: entity_id.to_string(),
            document_id: document_id.to_string(),
        })
    }

    fn advance(&mut self) {
        loop {
            let mut record = csv::StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(true) => match self.row_to_link(&record) {
                    Some(link) => {
                        self.peeked = Some(link);
                        return;
                    }
                    None => {
                        tracing::warn!("skipping malformed link row: {:?}", record);
                        continue;
                    }
                },
                Ok(false) => {
                    self.peeked = None;
                    return;
                }
                Err(e) => {
                    tracing::warn!("skipping unparseable link row: {e}");
                    continue;
                }
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.peeked.is_some()
    }

    pub fn next_record(&mut self) -> Option<Link> {
        let next = self.peeked.take();
        self.advance();
        next
    }

    pub fn read_all(mut self) -> Vec<Link> {
        let mut out = Vec::new();
        while let Some(l) = self.next_record() {
            out.push(l);
        }
        out
    }
}

impl Iterator for LinkCsvReader {
    type Item = Link;
    fn next(&mut self) -> Option<Link> {
        self.next_record()
    }
}

/// Reads a line-delimited skip-entities file, dropping blank lines.
pub fn read_skip_entities(path: impl AsRef<Path>) -> Result<std::collections::BTreeSet<String>, MeshlinkError> {
    use std::io::BufRead;
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let mut out = std::collections::BTreeSet::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            out.insert(trimmed.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_entities_and_maps_attributes() {
        let file = write_csv("id,name,kind\ne1,Alice,person\ne2,Bob,person\n");
        let mut field_to_attribute = BTreeMap::new();
        field_to_attribute.insert("name".to_string(), "displayName".to_string());
        let cfg = EntitiesFileConfig {
            path: file.path().to_string_lossy().into_owned(),
            entity_type: "person".to_string(),
            delimiter: ",".to_string(),
            entity_id_field: "id".to_string(),
            field_to_attribute,
        };
        let entities = EntityCsvReader::open(file.path(), &cfg).unwrap().read_all();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].id, "e1");
        assert_eq!(
            entities[0].attributes.get("displayName"),
            Some(&"Alice".to_string())
        );
    }

    #[test]
    fn missing_id_column_fails() {
        let file = write_csv("name\nAlice\n");
        let cfg = EntitiesFileConfig {
            path: file.path().to_string_lossy().into_owned(),
            entity_type: "person".to_string(),
            delimiter: ",".to_string(),
            entity_id_field: "id".to_string(),
            field_to_attribute: BTreeMap::new(),
        };
        let err = EntityCsvReader::open(file.path(), &cfg).unwrap_err();
        assert!(matches!(err, MeshlinkError::MissingField(_)));
    }

    #[test]
    fn blank_rows_are_skipped_not_fatal() {
        let file = write_csv("id,name\ne1,Alice\n,Nobody\ne2,Bob\n");
        let cfg = EntitiesFileConfig {
            path: file.path().to_string_lossy().into_owned(),
            entity_type: "person".to_string(),
            delimiter: ",".to_string(),
            entity_id_field: "id".to_string(),
            field_to_attribute: BTreeMap::new(),
        };
        let entities = EntityCsvReader::open(file.path(), &cfg).unwrap().read_all();
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn skip_entities_drops_blank_lines() {
        let file = write_csv("e1\ne2\n\ne3\n");
        let skip = read_skip_entities(file.path()).unwrap();
        assert_eq!(skip.len(), 3);
        assert!(skip.contains("e2"));
    }
}
