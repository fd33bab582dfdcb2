use babybeats_core::codec::{Gender, NameSuggestion, NamingRequest};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ServerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenderParam {
    Boy,
    Girl,
    #[default]
    Unknown,
}

impl From<GenderParam> for Gender {
    fn from(value: GenderParam) -> Self {
        match value {
            GenderParam::Boy => Gender::Boy,
            GenderParam::Girl => Gender::Girl,
            GenderParam::Unknown => Gender::Unknown,
        }
    }
}

impl From<Gender> for GenderParam {
    fn from(value: Gender) -> Self {
        match value {
            Gender::Boy => GenderParam::Boy,
            Gender::Girl => GenderParam::Girl,
            Gender::Unknown => GenderParam::Unknown,
        }
    }
}

/// Body of `POST /v1/names`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateNamesRequest {
    /// Caller-chosen task id; a random one is generated when absent.
    pub id: Option<String>,
    pub father: String,
    pub mother: String,
    #[serde(default)]
    pub gender: GenderParam,
    pub expectations: Option<String>,
    /// Model tried first.
    pub model: Option<String>,
    /// Fallback models; defaults to the configured catalog.
    pub candidates: Option<Vec<String>>,
}

impl CreateNamesRequest {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.father.trim().is_empty() || self.mother.trim().is_empty() {
            return Err(ServerError::BadRequest(
                "father and mother must not be empty".to_owned(),
            ));
        }
        if self.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ServerError::BadRequest("id must not be blank".to_owned()));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ServerError::BadRequest("model must not be blank".to_owned()));
        }
        Ok(())
    }

    pub fn naming_request(&self) -> NamingRequest {
        NamingRequest {
            father: self.father.trim().to_owned(),
            mother: self.mother.trim().to_owned(),
            gender: self.gender.into(),
            expectations: self.expectations.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NamingRequestView {
    pub father: String,
    pub mother: String,
    pub gender: GenderParam,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expectations: Option<String>,
}

impl From<&NamingRequest> for NamingRequestView {
    fn from(req: &NamingRequest) -> Self {
        Self {
            father: req.father.clone(),
            mother: req.mother.clone(),
            gender: req.gender.into(),
            expectations: req.expectations.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NameSuggestionView {
    pub name: String,
    pub meaning: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
}

impl From<&NameSuggestion> for NameSuggestionView {
    fn from(s: &NameSuggestion) -> Self {
        Self {
            name: s.name.clone(),
            meaning: s.meaning.clone(),
            kind: s.kind.clone(),
            source: s.source.clone(),
            structure: s.structure.clone(),
            score: s.score,
            elements: s.elements.clone(),
            pronunciation: s.pronunciation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> CreateNamesRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn minimal_body_is_valid() {
        let req = body(r#"{"father": " 王强 ", "mother": "刘芳"}"#);
        assert!(req.validate().is_ok());
        let naming = req.naming_request();
        assert_eq!(naming.father, "王强");
        assert_eq!(naming.gender, Gender::Unknown);
    }

    #[test]
    fn blank_parents_or_id_are_rejected() {
        assert!(body(r#"{"father": "", "mother": "B"}"#).validate().is_err());
        assert!(body(r#"{"father": "A", "mother": "B", "id": "  "}"#)
            .validate()
            .is_err());
    }
}
