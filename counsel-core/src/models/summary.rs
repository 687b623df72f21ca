use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizationResponse {
    pub transcript: String,
    pub summary: String,
    pub notes: String,
}
