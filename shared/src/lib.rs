use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Classes the leaf classifier can emit. Declaration order is the order of
/// the classifier's output vector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
pub enum DiseaseClass {
    Anthracnose,
    #[serde(rename = "Bacterial Canker")]
    #[strum(serialize = "Bacterial Canker")]
    BacterialCanker,
    #[serde(rename = "Cutting Weevil")]
    #[strum(serialize = "Cutting Weevil")]
    CuttingWeevil,
    #[serde(rename = "Die Back")]
    #[strum(serialize = "Die Back")]
    DieBack,
    #[serde(rename = "Gall Midge")]
    #[strum(serialize = "Gall Midge")]
    GallMidge,
    Healthy,
}

impl DiseaseClass {
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn label(self) -> &'static str {
        self.into()
    }

    pub fn labels() -> Vec<&'static str> {
        Self::iter().map(DiseaseClass::label).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    pub description: String,
    pub symptoms: Vec<String>,
    pub prevention: Vec<String>,
    pub treatment: Vec<String>,
    pub product: ResourceLink,
    pub more_info: ResourceLink,
    pub icon: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResponse {
    pub success: bool,
    pub image_path: String,
    pub disease: DiseaseClass,
    pub confidence: f64,
    pub info: AdvisoryRecord,
}

impl DiagnosisResponse {
    pub fn new(
        image_path: String,
        disease: DiseaseClass,
        confidence: f64,
        info: AdvisoryRecord,
    ) -> Self {
        Self {
            success: true,
            image_path,
            disease,
            confidence,
            info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Body of every `/upload` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Success(DiagnosisResponse),
    Failure(ErrorResponse),
}
