//! Catalog and promotion administration.

use common::{CategoryId, ProductId, PromotionId};
use rust_decimal::Decimal;
use store::{
    Category, Product, ProductDraft, ProductFilter, Promotion, PromotionDraft, Store, StoreError,
};

use crate::error::{CatalogError, DomainError};

/// Service used by staff to maintain the menu and the promotions, and by
/// customers to browse the menu.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Active products with stock, ordered by name.
    pub async fn menu(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products(ProductFilter::menu()).await?)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products(ProductFilter::all()).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, DomainError> {
        Ok(self.store.list_categories().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<Category, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyName { entity: "Category" }.into());
        }
        Ok(self.store.create_category(name).await?)
    }

    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product, DomainError> {
        let draft = self.validate_product(draft).await?;
        let product = self.store.create_product(draft).await?;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self, draft))]
    pub async fn update_product(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Product, DomainError> {
        let draft = self.validate_product(draft).await?;
        Ok(self.store.update_product(id, draft).await?)
    }

    /// Deletes a product. Placed orders keep their line snapshots.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), DomainError> {
        Ok(self.store.delete_product(id).await?)
    }

    pub async fn list_promotions(&self, active_only: bool) -> Result<Vec<Promotion>, DomainError> {
        Ok(self.store.list_promotions(active_only).await?)
    }

    pub async fn get_promotion(&self, id: PromotionId) -> Result<Promotion, DomainError> {
        self.store
            .get_promotion(id)
            .await?
            .ok_or_else(|| {
                StoreError::NotFound {
                    entity: "Promotion",
                    id: id.to_string(),
                }
                .into()
            })
    }

    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_promotion(&self, draft: PromotionDraft) -> Result<Promotion, DomainError> {
        let draft = validate_promotion(draft)?;
        let promotion = self.store.create_promotion(draft).await?;
        tracing::info!(promotion_id = %promotion.id, "Promotion created");
        Ok(promotion)
    }

    #[tracing::instrument(skip(self, draft))]
    pub async fn update_promotion(
        &self,
        id: PromotionId,
        draft: PromotionDraft,
    ) -> Result<Promotion, DomainError> {
        let draft = validate_promotion(draft)?;
        Ok(self.store.update_promotion(id, draft).await?)
    }

    async fn validate_product(&self, mut draft: ProductDraft) -> Result<ProductDraft, DomainError> {
        draft.name = draft.name.trim().to_string();
        if draft.name.is_empty() {
            return Err(CatalogError::EmptyName { entity: "Product" }.into());
        }
        if draft.price.is_negative() {
            return Err(CatalogError::NegativeAmount { field: "price" }.into());
        }
        if let Some(category_id) = draft.category_id {
            self.ensure_category(category_id).await?;
        }
        Ok(draft)
    }

    async fn ensure_category(&self, id: CategoryId) -> Result<(), DomainError> {
        let categories = self.store.list_categories().await?;
        if categories.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(CatalogError::UnknownCategory(id).into())
        }
    }
}

fn validate_promotion(mut draft: PromotionDraft) -> Result<PromotionDraft, CatalogError> {
    draft.name = draft.name.trim().to_string();
    if draft.name.is_empty() {
        return Err(CatalogError::EmptyName {
            entity: "Promotion",
        });
    }
    if draft.discount_percent < Decimal::ZERO || draft.discount_percent > Decimal::ONE_HUNDRED {
        return Err(CatalogError::DiscountOutOfRange(draft.discount_percent));
    }
    if draft.minimum_amount.is_some_and(|m| m.is_negative()) {
        return Err(CatalogError::NegativeAmount {
            field: "minimum_amount",
        });
    }
    if let (Some(start), Some(end)) = (draft.starts_on, draft.ends_on) {
        if end < start {
            return Err(CatalogError::InvalidDateWindow);
        }
    }
    Ok(draft)
}
