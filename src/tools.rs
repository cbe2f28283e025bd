use crate::{
    error::Result,
    model::{Certificate, Product, ProductDetails},
    provider::{ChatRequest, GroundedAnswer, ReasoningProvider},
    store::AppStore,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// High-effort reasoning budget for network-intelligence queries.
const REASONING_BUDGET_TOKENS: u32 = 16_000;

/// Listing, pricing, and provenance helpers for artisans. Thin prompt
/// wrappers over the reasoning provider; the structured paths degrade to
/// safe defaults rather than failing the UI.
pub struct MarketAssistant<P> {
    provider: Arc<P>,
}

impl<P: ReasoningProvider> MarketAssistant<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Draft listing fields from a product photo and/or a dictated note.
    pub async fn generate_product_details(
        &self,
        photo: Option<Vec<u8>>,
        voice_note: Option<&str>,
    ) -> Result<ProductDetails> {
        let prompt = voice_note.unwrap_or(
            "Analyze this product and provide a creative name, detailed description, \
             and appropriate category in JSON format.",
        );
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "description": { "type": "string" },
                "category": { "type": "string" }
            },
            "required": ["name", "description", "category"]
        });

        let mut request = ChatRequest::single(prompt);
        request.inline_image = photo;
        let value = self.provider.chat_structured(request, schema).await?;

        Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Listing details malformed, using defaults");
            ProductDetails {
                name: "New Artisan Craft".to_string(),
                description: "A beautiful handmade item.".to_string(),
                category: "General".to_string(),
            }
        }))
    }

    /// Real-time market pricing advice, grounded in web search. The cited
    /// sources come back alongside the text so the UI can link them.
    pub async fn pricing_advice(
        &self,
        product_name: &str,
        description: &str,
    ) -> Result<GroundedAnswer> {
        let mut request = ChatRequest::single(format!(
            "Find real-time market prices for: {}. Context: {}. Cite sources.",
            product_name, description
        ));
        request.web_search = true;
        self.provider.chat_grounded(request).await
    }

    /// Local supplier lookup, grounded in maps results.
    pub async fn find_local_materials(
        &self,
        location: &str,
        material: &str,
    ) -> Result<GroundedAnswer> {
        let mut request = ChatRequest::single(format!(
            "Where can I find {} suppliers in or near {}? Provide addresses and links.",
            material, location
        ));
        request.maps_search = true;
        self.provider.chat_grounded(request).await
    }

    /// Extract text, line items, and totals from a photographed document.
    pub async fn scan_document(&self, image: Vec<u8>) -> Result<String> {
        let mut request = ChatRequest::single(
            "Act as a document scanner. Extract all text, line items, and totals \
             from this document. Provide a clean summary.",
        );
        request.inline_image = Some(image);
        self.provider.chat(request).await
    }

    /// Answer a complex query with a high internal reasoning budget.
    pub async fn complex_reasoning(&self, prompt: &str) -> Result<String> {
        let mut request = ChatRequest::single(prompt);
        request.thinking_budget = Some(REASONING_BUDGET_TOKENS);
        self.provider.chat(request).await
    }

    /// A short heritage story for a certificate of authenticity.
    pub async fn certificate_story(&self, product: &Product) -> Result<String> {
        self.provider
            .chat(ChatRequest::single(format!(
                "Generate a short, soulful heritage story for a certificate of authenticity. \
                 Product: \"{}\", Category: \"{}\", Artisan: \"{}\". \
                 Focus on the lineage of the technique and the soul of the maker. Max 45 words.",
                product.name, product.category, product.artisan_name
            )))
            .await
    }

    /// Generate a story, mint the certificate into the store, and mark the
    /// product verified.
    pub async fn issue_certificate(
        &self,
        store: &AppStore,
        product_id: &str,
    ) -> Result<Certificate> {
        let product = store
            .product(product_id)
            .ok_or_else(|| crate::error::EngineError::ProductNotFound(product_id.to_string()))?;

        let story = self.certificate_story(&product).await?;
        let id = Uuid::new_v4().to_string();
        let certificate = Certificate {
            qr_code: format!("cert:{}:{}", product.id, id),
            id,
            product_id: product.id.clone(),
            artisan_id: product.artisan_id.clone(),
            issue_date: Utc::now(),
            story,
        };

        store.mint_certificate(product_id, certificate.clone())?;
        tracing::info!(product = %product_id, certificate = %certificate.id, "Certificate minted");
        Ok(certificate)
    }
}
