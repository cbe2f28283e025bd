use crate::{
    config::NegotiationConfig,
    error::{EngineError, Result},
    model::{DealTerms, NegotiationSession, OfferOutcome, ProductSnapshot, Speaker},
    provider::{ChatRequest, ChatRole, ChatTurn, ReasoningProvider},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

static DOLLAR_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+(?:\.\d+)?)").expect("dollar amount pattern"));

const ACCEPTANCE_PHRASES: [&str; 2] = ["it's a deal", "accept your offer"];

/// Seller line callers substitute when the backend is unreachable. It is not
/// appended to the transcript, so the buyer's offer stays retryable.
pub fn fallback_reply() -> &'static str {
    "I'm sorry, I'm experiencing some connectivity issues. Please try again in a moment."
}

/// Greeting shown when a bargain chat opens. UI convenience, not a turn the
/// engine tracks.
pub fn opening_greeting(snapshot: &ProductSnapshot) -> String {
    format!(
        "Welcome! I'm the AI co-pilot for {}. We take great pride in this \"{}\". \
         The craftsmanship involved is extensive. The current value is ${}. \
         Would you like to make a fair offer?",
        snapshot.artisan_name, snapshot.name, snapshot.list_price
    )
}

/// Conventional opening counter: 90% of list, rounded down.
pub fn suggested_opening_offer(list_price: f64) -> f64 {
    (list_price * 0.9).floor()
}

/// Bounds the seller persona is held to for one session. Derived once from
/// the session snapshot; later store updates do not move the floor.
#[derive(Debug, Clone)]
pub struct NegotiationPolicy {
    pub list_price: f64,
    pub floor: f64,
    pub max_step_discount: f64,
}

impl NegotiationPolicy {
    pub fn for_snapshot(snapshot: &ProductSnapshot, config: &NegotiationConfig) -> Self {
        Self {
            list_price: snapshot.list_price,
            floor: (snapshot.list_price * (1.0 - config.max_total_discount)).floor(),
            max_step_discount: config.max_step_discount,
        }
    }

    pub fn permits(&self, price: f64) -> bool {
        price >= self.floor && price <= self.list_price
    }

    fn system_instruction(&self, snapshot: &ProductSnapshot) -> String {
        format!(
            "You are the AI co-pilot for {artisan}, a master craftsman specializing in {category}.\n\
             You are negotiating the price for \"{name}\".\n\
             Current list price: ${list}.\n\n\
             RULES:\n\
             1. Be sophisticated, respectful, and emphasize the hours of human labor, material quality, and heritage.\n\
             2. Never drop the price by more than {step}% in a single step.\n\
             3. Minimum acceptable price is ${floor}.\n\
             4. If the buyer offers a fair price within your range, enthusiastically say \"It's a deal!\" and confirm the final price (e.g., \"$38\").\n\
             5. If the offer is too low, explain why the craftsmanship is worth more, but offer a smaller alternative discount.\n\
             6. Use short, persuasive responses.",
            artisan = snapshot.artisan_name,
            category = snapshot.category,
            name = snapshot.name,
            list = self.list_price,
            step = (self.max_step_discount * 100.0).round() as u32,
            floor = self.floor,
        )
    }
}

/// What the seller persona said and whether it committed to a price.
#[derive(Debug, Clone, Deserialize)]
pub struct SellerVerdict {
    pub reply: String,
    pub deal_confirmed: bool,
    pub price: Option<f64>,
}

impl SellerVerdict {
    fn confirmed_price(&self) -> Option<f64> {
        if self.deal_confirmed {
            self.price
        } else {
            None
        }
    }
}

fn verdict_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "reply": { "type": "string" },
            "deal_confirmed": { "type": "boolean" },
            "price": { "type": "number", "nullable": true }
        },
        "required": ["reply", "deal_confirmed"]
    })
}

/// Scan a free-text seller reply for a confirmed deal: an acceptance phrase
/// plus a parsable dollar amount. A phrase without an amount is ambiguous
/// and deliberately not treated as a deal.
pub fn detect_deal(reply: &str) -> Option<f64> {
    let lowered = reply.to_lowercase();
    if !ACCEPTANCE_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return None;
    }
    DOLLAR_AMOUNT
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|amount| amount.as_str().parse::<f64>().ok())
}

/// Mediates a bounded price negotiation between a human buyer and the
/// AI seller persona. Owns no product state; deal outcomes are returned to
/// the caller to apply.
pub struct NegotiationEngine<P> {
    provider: Arc<P>,
    config: NegotiationConfig,
}

impl<P: ReasoningProvider> NegotiationEngine<P> {
    pub fn new(provider: Arc<P>, config: NegotiationConfig) -> Self {
        Self { provider, config }
    }

    /// Submit one buyer message and resolve the seller's response.
    ///
    /// The exclusive borrow of the session makes turn processing strictly
    /// sequential; a second in-flight call on the same session cannot be
    /// expressed. The transcript is only mutated once a reply has been fully
    /// resolved, so provider failures and policy violations leave the
    /// session exactly as it was.
    pub async fn submit_offer(
        &self,
        session: &mut NegotiationSession,
        buyer_message: &str,
    ) -> Result<OfferOutcome> {
        if session.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "Session {} already closed at ${}",
                session.id,
                session.deal_price().unwrap_or_default()
            )));
        }
        if buyer_message.trim().is_empty() {
            return Err(EngineError::Validation(
                "Buyer message cannot be empty".to_string(),
            ));
        }

        let policy = NegotiationPolicy::for_snapshot(&session.snapshot, &self.config);
        let request = self.chat_request(session, buyer_message, &policy);
        let verdict = self.resolve_verdict(request).await?;

        let confirmed = verdict.confirmed_price();
        if let Some(price) = confirmed {
            if !policy.permits(price) {
                tracing::warn!(
                    session = %session.id,
                    price,
                    floor = policy.floor,
                    "Seller persona confirmed a price outside policy bounds"
                );
                return Err(EngineError::PolicyViolation {
                    price,
                    floor: policy.floor,
                    ceiling: policy.list_price,
                });
            }
        }

        session.push_turn(Speaker::Buyer, buyer_message);
        session.push_turn(Speaker::Seller, verdict.reply.clone());

        let deal = match confirmed {
            Some(price) => {
                session.close(price)?;
                tracing::info!(session = %session.id, price, "Deal confirmed");
                Some(DealTerms {
                    product_id: session.snapshot.product_id.clone(),
                    price,
                })
            }
            None => None,
        };

        Ok(OfferOutcome {
            seller_reply: verdict.reply,
            deal,
        })
    }

    fn chat_request(
        &self,
        session: &NegotiationSession,
        buyer_message: &str,
        policy: &NegotiationPolicy,
    ) -> ChatRequest {
        let mut turns: Vec<ChatTurn> = session
            .transcript()
            .iter()
            .map(|turn| ChatTurn {
                role: match turn.speaker {
                    Speaker::Buyer => ChatRole::User,
                    Speaker::Seller => ChatRole::Model,
                },
                text: turn.text.clone(),
            })
            .collect();
        turns.push(ChatTurn {
            role: ChatRole::User,
            text: buyer_message.to_string(),
        });

        ChatRequest {
            system_instruction: Some(policy.system_instruction(&session.snapshot)),
            turns,
            ..ChatRequest::default()
        }
    }

    /// Structured output first; if the provider cannot produce it, fall back
    /// to plain text and the prose scanner.
    async fn resolve_verdict(&self, request: ChatRequest) -> Result<SellerVerdict> {
        match self
            .provider
            .chat_structured(request.clone(), verdict_schema())
            .await
        {
            Ok(value) => {
                let verdict: SellerVerdict = serde_json::from_value(value)?;
                Ok(verdict)
            }
            Err(EngineError::Serialization(reason)) => {
                tracing::debug!(%reason, "Structured reply unusable, retrying as plain text");
                let reply = self.provider.chat(request).await?;
                let price = detect_deal(&reply);
                Ok(SellerVerdict {
                    deal_confirmed: price.is_some(),
                    price,
                    reply,
                })
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_is_75_percent_rounded_down() {
        let snapshot = ProductSnapshot {
            product_id: "p1".to_string(),
            name: "Terracotta Vase".to_string(),
            category: "Pottery".to_string(),
            artisan_name: "Ravi".to_string(),
            list_price: 45.0,
        };
        let policy = NegotiationPolicy::for_snapshot(&snapshot, &NegotiationConfig::default());
        assert_eq!(policy.floor, 33.0);
        assert!(policy.permits(33.0));
        assert!(policy.permits(45.0));
        assert!(!policy.permits(30.0));
        assert!(!policy.permits(46.0));
    }

    #[test]
    fn detects_acceptance_with_amount() {
        let price = detect_deal("Wonderful, it's a deal! Let's finalize at $38.50.");
        assert_eq!(price, Some(38.50));
    }

    #[test]
    fn acceptance_without_amount_is_not_a_deal() {
        assert_eq!(detect_deal("I think we have a deal, let me check."), None);
        assert_eq!(detect_deal("It's a deal, my friend!"), None);
    }

    #[test]
    fn counter_offer_without_acceptance_is_not_a_deal() {
        assert_eq!(detect_deal("The best I can do is $42 for this piece."), None);
    }

    #[test]
    fn acceptance_phrase_is_case_insensitive() {
        assert_eq!(detect_deal("IT'S A DEAL at $40!"), Some(40.0));
    }

    #[test]
    fn suggested_opening_offer_rounds_down() {
        assert_eq!(suggested_opening_offer(45.0), 40.0);
    }
}
