use serde::{Deserialize, Serialize};

/// One corpus entry, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
}

impl Document {
    /// Derive a stable id from a document's content.
    pub fn generate_id(title: &str, text: &str) -> String {
        use sha2::{Digest, Sha256};
        let input = format!("{}:{}", title, text);
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..16])
    }

    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let title = title.into();
        let text = text.into();
        let id = Self::generate_id(&title, &text);
        Self { id, title, text }
    }

    /// Fill in a generated id when the source corpus carries none.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = Self::generate_id(&self.title, &self.text);
        }
    }
}

/// A vector paired with the payload handed to the store on upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub title: String,
    pub text: String,
}

impl VectorRecord {
    pub fn new(document: Document, vector: Vec<f32>) -> Self {
        Self {
            id: document.id,
            vector,
            title: document.title,
            text: document.text,
        }
    }
}
