//! Filesystem-backed [`DocumentStore`]: one pretty-printed JSON file per document under
//! `{root}/tenants/{tenant}/{collection}/{key}.json`.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use revrec_core::{
    storage::{generate_key, merge_fields},
    CollectionPath, CoreError, DocPath, Document, DocumentStore, Query,
};
use serde_json::Value;

const DOC_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = "tmp";

/// Persists documents as individual JSON files.
///
/// Creation is exclusive: the document is written to a temporary file and then hard-linked
/// into place, which fails if another writer got there first. Updates rewrite through a
/// temporary file and rename, so readers never observe a partial document.
#[derive(Debug)]
pub struct JsonDocumentStore {
    root: PathBuf,
    update_lock: Mutex<()>,
}

impl JsonDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            update_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_dir(&self, collection: &CollectionPath) -> PathBuf {
        self.root
            .join("tenants")
            .join(encode_segment(collection.tenant_id()))
            .join(encode_segment(collection.name()))
    }

    pub fn document_path(&self, path: &DocPath) -> PathBuf {
        self.collection_dir(&path.collection)
            .join(format!("{}.{}", encode_segment(&path.key), DOC_EXTENSION))
    }

    fn read_document(path: &Path) -> Result<Option<Value>, CoreError> {
        match fs::read_to_string(path) {
            Ok(data) => Ok(Some(serde_json::from_str(&data).map_err(|err| {
                CoreError::Serde(format!("{} is malformed: {}", path.display(), err))
            })?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl DocumentStore for JsonDocumentStore {
    fn get(&self, path: &DocPath) -> Result<Option<Value>, CoreError> {
        Self::read_document(&self.document_path(path))
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, CoreError> {
        let dir = self.collection_dir(&query.collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut documents = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(DOC_EXTENSION)
            {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_segment)
            else {
                continue;
            };
            // Deleted between listing and reading.
            if let Some(data) = Self::read_document(&path)? {
                documents.push(Document { key, data });
            }
        }
        documents.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(query.apply(documents))
    }

    fn create_if_absent(
        &self,
        collection: &CollectionPath,
        key: &str,
        data: Value,
    ) -> Result<(), CoreError> {
        let target = self.document_path(&collection.doc(key));
        if target.exists() {
            return Err(CoreError::AlreadyExists(collection.doc(key).to_string()));
        }
        let tmp = unique_tmp_path(&target);
        write_atomic(&tmp, &serialize(&data)?)?;
        let linked = fs::hard_link(&tmp, &target);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(CoreError::AlreadyExists(collection.doc(key).to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn add(&self, collection: &CollectionPath, data: Value) -> Result<String, CoreError> {
        let key = generate_key();
        self.create_if_absent(collection, &key, data)?;
        Ok(key)
    }

    fn update(&self, path: &DocPath, partial: Value) -> Result<(), CoreError> {
        let _guard = self
            .update_lock
            .lock()
            .map_err(|_| CoreError::Internal("document store lock poisoned".into()))?;
        let target = self.document_path(path);
        let mut existing =
            Self::read_document(&target)?.ok_or_else(|| CoreError::NotFound(path.to_string()))?;
        merge_fields(&mut existing, partial)?;
        let tmp = unique_tmp_path(&target);
        write_atomic(&tmp, &serialize(&existing)?)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn batch_delete(&self, paths: &[DocPath]) -> Result<(), CoreError> {
        for path in paths {
            match fs::remove_file(self.document_path(path)) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

/// Percent-encodes everything outside `[A-Za-z0-9_-]` so any key maps to a safe file name.
fn encode_segment(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => encoded.push(byte as char),
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

fn decode_segment(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = value.get(index + 1..index + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

fn unique_tmp_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("doc");
    path.with_file_name(format!(".{}.{}.{}", stem, generate_key(), TMP_SUFFIX))
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn serialize(value: &Value) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|err| CoreError::Serde(err.to_string()))
}
