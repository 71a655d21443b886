//! In-memory implementation of ProductRepository
//!
//! Same contract as the MongoDB repository, including slug uniqueness and
//! version-checked saves. Used by tests and for running the API without a
//! database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::Product;
use crate::query::{Predicate, SortOrder};
use crate::repository::ProductRepository;

#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn slug_taken(products: &HashMap<Uuid, Product>, slug: &str, except: Option<Uuid>) -> bool {
        products
            .values()
            .any(|p| p.slug == slug && Some(p.id) != except)
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn insert(&self, product: Product) -> CatalogResult<Product> {
        let mut products = self.products.write().await;
        if Self::slug_taken(&products, &product.slug, None) {
            return Err(CatalogError::DuplicateSlug(product.slug));
        }
        products.insert(product.id, product.clone());
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn get_by_slug(&self, slug: &str) -> CatalogResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.values().find(|p| p.slug == slug).cloned())
    }

    #[instrument(skip(self))]
    async fn exists_by_slug(&self, slug: &str) -> CatalogResult<bool> {
        Ok(Self::slug_taken(&*self.products.read().await, slug, None))
    }

    #[instrument(skip(self))]
    async fn find(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        offset: u64,
        limit: Option<u64>,
    ) -> CatalogResult<Vec<Product>> {
        let products = self.products.read().await;
        let mut matching: Vec<&Product> =
            products.values().filter(|p| predicate.matches(p)).collect();
        matching.sort_by(|a, b| order.compare(a, b));

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(skip).take(take).cloned().collect())
    }

    #[instrument(skip(self))]
    async fn count_matching(&self, predicate: &Predicate) -> CatalogResult<u64> {
        let products = self.products.read().await;
        Ok(products.values().filter(|p| predicate.matches(p)).count() as u64)
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> CatalogResult<Vec<String>> {
        let products = self.products.read().await;
        let mut categories: Vec<String> = products.values().map(|p| p.category.clone()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id, version = product.version))]
    async fn save(&self, mut product: Product) -> CatalogResult<Product> {
        let mut products = self.products.write().await;
        let stored = products
            .get(&product.id)
            .ok_or(CatalogError::NotFound(product.id))?;
        if stored.version != product.version {
            return Err(CatalogError::Conflict {
                id: product.id,
                expected: product.version,
            });
        }
        if Self::slug_taken(&products, &product.slug, Some(product.id)) {
            return Err(CatalogError::DuplicateSlug(product.slug));
        }
        product.version += 1;
        products.insert(product.id, product.clone());
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> CatalogResult<bool> {
        Ok(self.products.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateProduct;
    use crate::query::{Clause, SortField};

    fn product(name: &str, category: &str, price: f64) -> Product {
        Product::new(CreateProduct {
            name: Some(name.to_string()),
            category: Some(category.to_string()),
            price: Some(price),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_slug() {
        let repo = InMemoryProductRepository::new();
        repo.insert(product("Shirt", "Shirts", 1.0)).await.unwrap();
        let err = repo.insert(product("Shirt", "Shirts", 2.0)).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateSlug(slug) if slug == "shirt"));
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_detects_conflicts() {
        let repo = InMemoryProductRepository::new();
        let original = repo.insert(product("Shirt", "Shirts", 1.0)).await.unwrap();

        let saved = repo.save(original.clone()).await.unwrap();
        assert_eq!(saved.version, 1);

        let err = repo.save(original.clone()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { expected: 0, .. }));
    }

    #[tokio::test]
    async fn test_save_missing_product_is_not_found() {
        let repo = InMemoryProductRepository::new();
        let err = repo.save(product("Ghost", "x", 1.0)).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_pages() {
        let repo = InMemoryProductRepository::new();
        for (name, price) in [("a", 5.0), ("b", 15.0), ("c", 12.0), ("d", 30.0), ("e", 18.0)] {
            repo.insert(product(name, "Shirts", price)).await.unwrap();
        }
        let predicate = Predicate::all().and(Clause::PriceBetween { min: 10.0, max: 20.0 });
        let order = SortOrder::descending(SortField::Price);

        let page = repo.find(&predicate, order, 1, Some(2)).await.unwrap();
        let names: Vec<_> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(repo.count_matching(&predicate).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_default_order_is_newest_first() {
        let repo = InMemoryProductRepository::new();
        for name in ["first", "second", "third"] {
            repo.insert(product(name, "x", 1.0)).await.unwrap();
        }
        let all = repo
            .find(&Predicate::all(), SortOrder::default(), 0, None)
            .await
            .unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_categories_are_distinct_and_sorted() {
        let repo = InMemoryProductRepository::new();
        for (name, category) in [("a", "Shirts"), ("b", "Pants"), ("c", "Shirts")] {
            repo.insert(product(name, category, 1.0)).await.unwrap();
        }
        assert_eq!(repo.categories().await.unwrap(), vec!["Pants", "Shirts"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryProductRepository::new();
        let p = repo.insert(product("a", "x", 1.0)).await.unwrap();
        assert!(repo.delete(p.id).await.unwrap());
        assert!(!repo.delete(p.id).await.unwrap());
        assert!(repo.get_by_id(p.id).await.unwrap().is_none());
    }
}
