use crate::{
    error::{EngineError, Result},
    SessionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image_url: String,
    pub artisan_id: String,
    pub artisan_name: String,
    pub verified: bool,
    pub can_bargain: bool,
    pub certificate: Option<Certificate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub product_id: String,
    pub artisan_id: String,
    pub issue_date: DateTime<Utc>,
    pub story: String,
    pub qr_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
    pub artisan_id: String,
    pub artisan_name: String,
    pub status: ProjectStatus,
    pub posted_at: DateTime<Utc>,
    pub applicant_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Open,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub title: String,
    pub goal: f64,
    pub raised: f64,
    pub description: String,
    pub artisan_id: String,
    pub image_url: String,
}

/// Listing fields produced by the market assistant for a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Buyer,
    Seller,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Product identity and pricing captured when a negotiation opens. The
/// discount floor derives from `list_price` here, not from the live store,
/// so a concurrent price update elsewhere cannot shift an open session's
/// bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub artisan_name: String,
    pub list_price: f64,
}

impl ProductSnapshot {
    pub fn of(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            artisan_name: product.artisan_name.clone(),
            list_price: product.price,
        }
    }
}

/// A single buyer/seller bargaining conversation. Sessions are ephemeral:
/// created when the chat opens, discarded when it closes, never persisted.
///
/// States are Open and Terminal. A session becomes Terminal exactly once,
/// when a deal price is recorded, and no transition leaves Terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationSession {
    pub id: SessionId,
    pub snapshot: ProductSnapshot,
    transcript: Vec<Turn>,
    deal_price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl NegotiationSession {
    pub fn open(product: &Product) -> Result<Self> {
        if !product.can_bargain {
            return Err(EngineError::Validation(format!(
                "Product {} is not open to bargaining",
                product.id
            )));
        }
        if product.price <= 0.0 {
            return Err(EngineError::Validation(
                "List price must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            snapshot: ProductSnapshot::of(product),
            transcript: Vec::new(),
            deal_price: None,
            created_at: Utc::now(),
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.deal_price.is_some()
    }

    pub fn deal_price(&self) -> Option<f64> {
        self.deal_price
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub(crate) fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(Turn {
            speaker,
            text: text.into(),
        });
    }

    pub(crate) fn close(&mut self, price: f64) -> Result<()> {
        if self.deal_price.is_some() {
            return Err(EngineError::InvalidState(
                "Session already closed with a deal price".to_string(),
            ));
        }
        self.deal_price = Some(price);
        Ok(())
    }
}

/// Outcome of a single `submit_offer` call.
#[derive(Debug, Clone)]
pub struct OfferOutcome {
    pub seller_reply: String,
    pub deal: Option<DealTerms>,
}

/// An agreed price, ready to be applied to shared product state by the
/// caller. The negotiation engine itself never touches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DealTerms {
    pub product_id: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Image,
    Video,
    StyleTransfer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Submitted,
    Polling,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Wide,
    Tall,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    pub prompt: String,
    pub source_image: Option<Vec<u8>>,
    pub aspect_ratio: AspectRatio,
}

impl GenerationRequest {
    pub fn image(prompt: impl Into<String>) -> Self {
        Self {
            kind: GenerationKind::Image,
            prompt: prompt.into(),
            source_image: None,
            aspect_ratio: AspectRatio::Square,
        }
    }

    pub fn video(prompt: impl Into<String>, source_image: Option<Vec<u8>>) -> Self {
        Self {
            kind: GenerationKind::Video,
            prompt: prompt.into(),
            source_image,
            aspect_ratio: AspectRatio::Wide,
        }
    }

    pub fn style_transfer(prompt: impl Into<String>, source_image: Vec<u8>) -> Self {
        Self {
            kind: GenerationKind::StyleTransfer,
            prompt: prompt.into(),
            source_image: Some(source_image),
            aspect_ratio: AspectRatio::Square,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(EngineError::Validation(
                "Generation prompt cannot be empty".to_string(),
            ));
        }
        if self.kind == GenerationKind::StyleTransfer && self.source_image.is_none() {
            return Err(EngineError::Validation(
                "Style transfer requires a source image".to_string(),
            ));
        }
        Ok(())
    }
}

/// A generated output the UI can bind directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: f64, can_bargain: bool) -> Product {
        Product {
            id: "p1".to_string(),
            name: "Silk Scarf".to_string(),
            description: "Hand-woven silk".to_string(),
            price,
            category: "Textiles".to_string(),
            image_url: String::new(),
            artisan_id: "a1".to_string(),
            artisan_name: "Meera".to_string(),
            verified: false,
            can_bargain,
            certificate: None,
        }
    }

    #[test]
    fn session_opens_only_for_bargainable_products() {
        assert!(NegotiationSession::open(&product(45.0, true)).is_ok());
        assert!(NegotiationSession::open(&product(45.0, false)).is_err());
        assert!(NegotiationSession::open(&product(0.0, true)).is_err());
    }

    #[test]
    fn deal_price_is_set_at_most_once() {
        let mut session = NegotiationSession::open(&product(45.0, true)).unwrap();
        session.close(38.5).unwrap();
        assert!(session.is_terminal());
        assert_eq!(session.deal_price(), Some(38.5));
        assert!(session.close(40.0).is_err());
        assert_eq!(session.deal_price(), Some(38.5));
    }

    #[test]
    fn style_transfer_requires_source_image() {
        let mut request = GenerationRequest::image("studio backdrop");
        request.kind = GenerationKind::StyleTransfer;
        assert!(request.validate().is_err());
    }
}
