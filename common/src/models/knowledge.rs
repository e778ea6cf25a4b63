// common/src/models/knowledge.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsureCompanyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureCompanyResponse {
    pub company_id: String,
    pub existed: bool,
}

// Timestamps are kept as the backend sends them; it does not always
// include a zone offset.

/// Aggregate knowledge-base statistics for a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub total_documents: u64,
    pub total_chunks: u64,
    pub total_tokens: u64,
    pub total_storage_bytes: u64,
    pub last_updated: Option<String>,
    pub voice_settings: Option<VoiceSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub id: String,
    pub company_id: String,
    pub voice_guidelines: Option<String>,
    pub brand_tone: Option<String>,
    pub positioning: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update; absent fields are left untouched by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_guidelines: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positioning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettingsEnvelope {
    pub voice_settings: Option<VoiceSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
    Md,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub company_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub file_size: Option<u64>,
    pub source_url: Option<String>,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub total_chunks: u64,
    pub total_tokens: u64,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn display_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// A document as the page lists it, with its size already formatted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    pub display_size: String,
}

impl From<Document> for DocumentView {
    fn from(document: Document) -> Self {
        let display_size = document.display_size();
        Self {
            document,
            display_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrlRequest {
    pub url: String,
}

/// A file picked for upload, held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Everything the knowledge page shows, loaded in one go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeOverview {
    pub stats: CompanyStats,
    pub documents: Vec<DocumentView>,
    pub voice_settings: Option<VoiceSettings>,
}

/// Render a byte count the way the document list shows it
pub fn format_file_size(bytes: Option<u64>) -> String {
    match bytes {
        None | Some(0) => "N/A".to_string(),
        Some(b) if b < 1024 => format!("{} B", b),
        Some(b) if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        Some(b) => format!("{:.1} MB", b as f64 / 1024.0 / 1024.0),
    }
}
