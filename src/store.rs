use crate::{
    error::{EngineError, Result},
    model::{Campaign, Certificate, DealTerms, Product, Project, ProjectStatus},
};
use parking_lot::RwLock;

#[derive(Default)]
struct StoreState {
    products: Vec<Product>,
    projects: Vec<Project>,
    campaigns: Vec<Campaign>,
}

/// Partial product mutation, applied field-by-field.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl ProductUpdate {
    pub fn price(price: f64) -> Self {
        Self {
            price: Some(price),
            ..Self::default()
        }
    }
}

/// Partial project mutation, applied field-by-field.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skills: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
}

impl ProjectUpdate {
    pub fn status(status: ProjectStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// In-memory shared application state. Single-process, no persistence.
///
/// The engines never call into this directly; they return typed results and
/// a thin adapter (`apply_deal`) maps them onto the store. Each mutation
/// holds the write lock for its full duration, so a session's update is
/// atomic.
#[derive(Default)]
pub struct AppStore {
    inner: RwLock<StoreState>,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            inner: RwLock::new(StoreState {
                products,
                ..StoreState::default()
            }),
        }
    }

    pub fn products(&self) -> Vec<Product> {
        self.inner.read().products.clone()
    }

    pub fn product(&self, product_id: &str) -> Option<Product> {
        self.inner
            .read()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
    }

    pub fn add_product(&self, product: Product) {
        self.inner.write().products.insert(0, product);
    }

    pub fn update_product(&self, product_id: &str, updates: ProductUpdate) -> Result<()> {
        let mut state = self.inner.write();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| EngineError::ProductNotFound(product_id.to_string()))?;

        if let Some(name) = updates.name {
            product.name = name;
        }
        if let Some(description) = updates.description {
            product.description = description;
        }
        if let Some(price) = updates.price {
            product.price = price;
        }
        if let Some(category) = updates.category {
            product.category = category;
        }
        if let Some(image_url) = updates.image_url {
            product.image_url = image_url;
        }
        Ok(())
    }

    /// Apply a confirmed negotiation outcome to the canonical product price.
    pub fn apply_deal(&self, terms: &DealTerms) -> Result<()> {
        tracing::info!(product = %terms.product_id, price = terms.price, "Applying deal price");
        self.update_product(&terms.product_id, ProductUpdate::price(terms.price))
    }

    pub fn projects(&self) -> Vec<Project> {
        self.inner.read().projects.clone()
    }

    pub fn add_project(&self, project: Project) {
        self.inner.write().projects.insert(0, project);
    }

    pub fn update_project(&self, project_id: &str, updates: ProjectUpdate) -> Result<()> {
        let mut state = self.inner.write();
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| EngineError::Validation(format!("Project not found: {}", project_id)))?;

        if let Some(title) = updates.title {
            project.title = title;
        }
        if let Some(description) = updates.description {
            project.description = description;
        }
        if let Some(skills) = updates.skills {
            project.skills = skills;
        }
        if let Some(status) = updates.status {
            project.status = status;
        }
        Ok(())
    }

    pub fn apply_to_project(&self, project_id: &str, user_id: &str) -> Result<()> {
        let mut state = self.inner.write();
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| EngineError::Validation(format!("Project not found: {}", project_id)))?;

        if !project.applicant_ids.iter().any(|id| id == user_id) {
            project.applicant_ids.push(user_id.to_string());
        }
        Ok(())
    }

    pub fn campaigns(&self) -> Vec<Campaign> {
        self.inner.read().campaigns.clone()
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.inner.write().campaigns.insert(0, campaign);
    }

    /// Attach a certificate of authenticity and mark the product verified.
    pub fn mint_certificate(&self, product_id: &str, certificate: Certificate) -> Result<()> {
        let mut state = self.inner.write();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| EngineError::ProductNotFound(product_id.to_string()))?;

        product.certificate = Some(certificate);
        product.verified = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_product() -> Product {
        Product {
            id: "p1".to_string(),
            name: "Silk Scarf".to_string(),
            description: "Hand-woven silk".to_string(),
            price: 45.0,
            category: "Textiles".to_string(),
            image_url: String::new(),
            artisan_id: "a1".to_string(),
            artisan_name: "Meera".to_string(),
            verified: false,
            can_bargain: true,
            certificate: None,
        }
    }

    #[test]
    fn apply_deal_updates_price() {
        let store = AppStore::with_products(vec![sample_product()]);
        store
            .apply_deal(&DealTerms {
                product_id: "p1".to_string(),
                price: 38.5,
            })
            .unwrap();
        assert_eq!(store.product("p1").unwrap().price, 38.5);
    }

    #[test]
    fn apply_deal_for_unknown_product_fails() {
        let store = AppStore::new();
        let result = store.apply_deal(&DealTerms {
            product_id: "missing".to_string(),
            price: 10.0,
        });
        assert!(matches!(result, Err(EngineError::ProductNotFound(_))));
    }

    #[test]
    fn minting_marks_product_verified() {
        let store = AppStore::with_products(vec![sample_product()]);
        let certificate = Certificate {
            id: "c1".to_string(),
            product_id: "p1".to_string(),
            artisan_id: "a1".to_string(),
            issue_date: Utc::now(),
            story: "Woven on a family loom.".to_string(),
            qr_code: "cert:c1".to_string(),
        };
        store.mint_certificate("p1", certificate).unwrap();

        let product = store.product("p1").unwrap();
        assert!(product.verified);
        assert!(product.certificate.is_some());
    }

    #[test]
    fn project_applications_are_deduplicated() {
        let store = AppStore::new();
        store.add_project(Project {
            id: "j1".to_string(),
            title: "Photograph the kiln".to_string(),
            description: String::new(),
            skills: vec!["photography".to_string()],
            artisan_id: "a1".to_string(),
            artisan_name: "Meera".to_string(),
            status: crate::model::ProjectStatus::Open,
            posted_at: Utc::now(),
            applicant_ids: Vec::new(),
        });

        store.apply_to_project("j1", "v1").unwrap();
        store.apply_to_project("j1", "v1").unwrap();
        assert_eq!(store.projects()[0].applicant_ids, vec!["v1".to_string()]);
    }

    #[test]
    fn update_project_applies_partial_changes() {
        let store = AppStore::new();
        store.add_project(Project {
            id: "j1".to_string(),
            title: "Photograph the kiln".to_string(),
            description: String::new(),
            skills: vec!["photography".to_string()],
            artisan_id: "a1".to_string(),
            artisan_name: "Meera".to_string(),
            status: ProjectStatus::Open,
            posted_at: Utc::now(),
            applicant_ids: Vec::new(),
        });

        store
            .update_project("j1", ProjectUpdate::status(ProjectStatus::InProgress))
            .unwrap();

        let project = &store.projects()[0];
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert_eq!(project.title, "Photograph the kiln");

        let missing = store.update_project("nope", ProjectUpdate::default());
        assert!(missing.is_err());
    }
}
