//! MongoDB implementation of ProductRepository

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, spec::BinarySubtype, Binary, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Collection, Database, IndexModel,
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::Product;
use crate::query::{Clause, Predicate, SortDirection, SortField, SortOrder};
use crate::repository::ProductRepository;

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB implementation of the ProductRepository
pub struct MongoProductRepository {
    collection: Collection<Product>,
}

impl MongoProductRepository {
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, "products")
    }

    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        let collection = db.collection::<Product>(collection_name);
        Self { collection }
    }

    /// Create the unique slug index and the indexes backing the search filters and sort keys
    pub async fn init_indexes(&self) -> CatalogResult<()> {
        let index = |keys: Document, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build()
        };

        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("idx_slug_unique".to_string())
                        .build(),
                )
                .build(),
            index(doc! { "category": 1 }, "idx_category"),
            index(doc! { "price": 1 }, "idx_price"),
            index(doc! { "rating": -1 }, "idx_rating"),
            index(doc! { "createdAt": -1 }, "idx_created_at"),
            index(doc! { "featured": -1 }, "idx_featured"),
        ];

        self.collection.create_indexes(indexes).await?;
        tracing::info!("Product indexes created successfully");
        Ok(())
    }

    fn id_filter(id: Uuid) -> Document {
        doc! { "_id": stored_id(id) }
    }

    /// Matches the product only while it still carries `version`
    fn version_filter(id: Uuid, version: u64) -> CatalogResult<Document> {
        let version = i64::try_from(version)
            .map_err(|_| CatalogError::Internal(format!("version {} out of range", version)))?;
        let mut filter = Self::id_filter(id);
        filter.insert("version", version);
        Ok(filter)
    }

    fn map_write_error(err: mongodb::error::Error, slug: &str) -> CatalogError {
        let duplicate = matches!(
            *err.kind,
            ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
        );
        if duplicate {
            CatalogError::DuplicateSlug(slug.to_string())
        } else {
            err.into()
        }
    }
}

/// A `Uuid` as the document serializer writes it: generic binary, not a string
fn stored_id(id: Uuid) -> Bson {
    Bson::Binary(Binary {
        subtype: BinarySubtype::Generic,
        bytes: id.as_bytes().to_vec(),
    })
}

/// Timestamps are BSON datetimes in the collection so `createdAt` sorts by
/// time. Human-readable formats keep chrono's RFC 3339 strings.
pub(crate) mod stored_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            value.serialize(serializer)
        } else {
            bson::DateTime::from_millis(value.timestamp_millis()).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        if deserializer.is_human_readable() {
            DateTime::<Utc>::deserialize(deserializer)
        } else {
            let stored = bson::DateTime::deserialize(deserializer)?;
            DateTime::from_timestamp_millis(stored.timestamp_millis())
                .ok_or_else(|| D::Error::custom("stored datetime out of range"))
        }
    }
}

fn clause_filter(clause: &Clause) -> (&'static str, Bson) {
    match clause {
        Clause::NameContains(text) => (
            "name",
            Bson::Document(doc! { "$regex": regex::escape(text), "$options": "i" }),
        ),
        Clause::CategoryEquals(category) => ("category", Bson::String(category.clone())),
        Clause::PriceBetween { min, max } => {
            ("price", Bson::Document(doc! { "$gte": *min, "$lte": *max }))
        }
        Clause::RatingAtLeast(min) => ("rating", Bson::Document(doc! { "$gte": *min })),
    }
}

/// Translate a predicate into a filter document.
///
/// Clauses on distinct fields are merged into one document; if a field is
/// constrained twice the clauses are wrapped in `$and` instead.
pub fn predicate_filter(predicate: &Predicate) -> Document {
    let parts: Vec<(&'static str, Bson)> = predicate.clauses().iter().map(clause_filter).collect();

    let mut keys: Vec<&str> = parts.iter().map(|(key, _)| *key).collect();
    keys.sort_unstable();
    keys.dedup();

    if keys.len() == parts.len() {
        let mut merged = Document::new();
        for (key, value) in parts {
            merged.insert(key, value);
        }
        return merged;
    }

    let all: Vec<Document> = parts
        .into_iter()
        .map(|(key, value)| {
            let mut single = Document::new();
            single.insert(key, value);
            single
        })
        .collect();
    doc! { "$and": all }
}

/// Sort document for an ordering, always ending in the `_id` descending tiebreak
pub fn sort_document(order: SortOrder) -> Document {
    let field = match order.field {
        SortField::Featured => "featured",
        SortField::Price => "price",
        SortField::Rating => "rating",
        SortField::CreatedAt => "createdAt",
        SortField::Id => "_id",
    };
    let direction = match order.direction {
        SortDirection::Ascending => 1,
        SortDirection::Descending => -1,
    };

    let mut sort = Document::new();
    sort.insert(field, direction);
    if field != "_id" {
        sort.insert("_id", -1);
    }
    sort
}

#[async_trait]
impl ProductRepository for MongoProductRepository {
    #[instrument(skip(self, product), fields(product_id = %product.id, slug = %product.slug))]
    async fn insert(&self, product: Product) -> CatalogResult<Product> {
        self.collection
            .insert_one(&product)
            .await
            .map_err(|e| Self::map_write_error(e, &product.slug))?;

        tracing::info!(product_id = %product.id, "Product created successfully");
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Product>> {
        let product = self.collection.find_one(Self::id_filter(id)).await?;
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn get_by_slug(&self, slug: &str) -> CatalogResult<Option<Product>> {
        let product = self.collection.find_one(doc! { "slug": slug }).await?;
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn exists_by_slug(&self, slug: &str) -> CatalogResult<bool> {
        let count = self
            .collection
            .count_documents(doc! { "slug": slug })
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn find(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        offset: u64,
        limit: Option<u64>,
    ) -> CatalogResult<Vec<Product>> {
        let mut options = FindOptions::builder()
            .sort(sort_document(order))
            .skip(offset)
            .build();
        options.limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let cursor = self
            .collection
            .find(predicate_filter(predicate))
            .with_options(options)
            .await?;
        let products: Vec<Product> = cursor.try_collect().await?;

        Ok(products)
    }

    #[instrument(skip(self))]
    async fn count_matching(&self, predicate: &Predicate) -> CatalogResult<u64> {
        let count = self
            .collection
            .count_documents(predicate_filter(predicate))
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> CatalogResult<Vec<String>> {
        let values = self.collection.distinct("category", doc! {}).await?;
        let mut categories: Vec<String> = values
            .into_iter()
            .filter_map(|value| match value {
                Bson::String(category) => Some(category),
                _ => None,
            })
            .collect();
        categories.sort();
        Ok(categories)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id, version = product.version))]
    async fn save(&self, mut product: Product) -> CatalogResult<Product> {
        let expected = product.version;
        let filter = Self::version_filter(product.id, expected)?;

        product.version = expected + 1;
        let result = self
            .collection
            .replace_one(filter, &product)
            .await
            .map_err(|e| Self::map_write_error(e, &product.slug))?;

        if result.matched_count == 0 {
            let exists = self
                .collection
                .count_documents(Self::id_filter(product.id))
                .await?
                > 0;
            return Err(if exists {
                tracing::debug!(product_id = %product.id, expected, "Version mismatch on save");
                CatalogError::Conflict {
                    id: product.id,
                    expected,
                }
            } else {
                CatalogError::NotFound(product.id)
            });
        }

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> CatalogResult<bool> {
        let result = self.collection.delete_one(Self::id_filter(id)).await?;

        if result.deleted_count > 0 {
            tracing::info!(product_id = %id, "Product deleted successfully");
        }
        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateProduct;
    use crate::reviews::{submit_at, NewReview};
    use chrono::{DateTime, Utc};
    use mongodb::bson::{from_slice, to_raw_document_buf};

    fn whole_millis(at: DateTime<Utc>) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap()
    }

    fn reviewed_product() -> Product {
        let mut product = Product::new(CreateProduct {
            name: Some("Nike Slim Shirt".to_string()),
            category: Some("Shirts".to_string()),
            price: Some(12.5),
            featured: true,
            ..Default::default()
        });
        product.created_at = whole_millis(product.created_at);
        product.updated_at = whole_millis(product.updated_at);
        let submission = submit_at(
            &product.reviews,
            NewReview {
                reviewer_identity: "u1".to_string(),
                rating: 4,
                comment: "fits well".to_string(),
            },
            whole_millis(Utc::now()),
        )
        .unwrap();
        product.record_reviews(&submission);
        product.updated_at = whole_millis(product.updated_at);
        product.version = 3;
        product
    }

    /// The document the driver writes for `insert_one` and `replace_one`
    fn stored(product: &Product) -> Document {
        let raw = to_raw_document_buf(product).unwrap();
        from_slice(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_id_filter_matches_stored_id() {
        let product = reviewed_product();
        let stored = stored(&product);

        let filter = MongoProductRepository::id_filter(product.id);
        assert!(matches!(stored.get("_id"), Some(Bson::Binary(_))));
        assert_eq!(filter.get("_id"), stored.get("_id"));
    }

    #[test]
    fn test_version_filter_matches_stored_document() {
        let product = reviewed_product();
        let stored = stored(&product);

        let filter = MongoProductRepository::version_filter(product.id, product.version).unwrap();
        assert_eq!(filter.get("_id"), stored.get("_id"));
        assert_eq!(filter.get("version"), stored.get("version"));
        assert_eq!(filter.get_i64("version").unwrap(), 3);
    }

    #[test]
    fn test_version_filter_rejects_out_of_range_version() {
        let err = MongoProductRepository::version_filter(Uuid::now_v7(), u64::MAX).unwrap_err();
        assert!(matches!(err, CatalogError::Internal(_)));
    }

    #[test]
    fn test_timestamps_are_stored_as_datetimes() {
        let product = reviewed_product();
        let stored = stored(&product);

        for key in ["createdAt", "updatedAt"] {
            assert!(matches!(stored.get(key), Some(Bson::DateTime(_))), "{} not a datetime", key);
        }
        assert_eq!(
            stored.get_datetime("createdAt").unwrap().timestamp_millis(),
            product.created_at.timestamp_millis()
        );
        let review = stored.get_array("reviews").unwrap()[0].as_document().unwrap();
        assert!(matches!(review.get("createdAt"), Some(Bson::DateTime(_))));

        let json = serde_json::to_value(&product).unwrap();
        assert!(json["createdAt"].is_string());
        assert!(json["reviews"][0]["createdAt"].is_string());
    }

    #[test]
    fn test_newer_product_sorts_after_in_stored_order() {
        let older = reviewed_product();
        let mut newer = reviewed_product();
        newer.created_at = older.created_at + chrono::Duration::milliseconds(1500);

        let older = stored(&older).get_datetime("createdAt").unwrap().timestamp_millis();
        let newer = stored(&newer).get_datetime("createdAt").unwrap().timestamp_millis();
        assert!(newer > older);
    }

    #[test]
    fn test_stored_document_decodes_back() {
        let product = reviewed_product();
        let raw = to_raw_document_buf(&product).unwrap();
        let decoded: Product = from_slice(raw.as_bytes()).unwrap();
        assert_eq!(decoded, product);
    }

    #[test]
    fn test_sort_and_filter_fields_exist_in_stored_document() {
        let stored = stored(&reviewed_product());

        for field in [
            SortField::Featured,
            SortField::Price,
            SortField::Rating,
            SortField::CreatedAt,
            SortField::Id,
        ] {
            let sort = sort_document(SortOrder::descending(field));
            for key in sort.keys() {
                assert!(stored.contains_key(key), "sort key {} not stored", key);
            }
        }
        assert!(matches!(stored.get("featured"), Some(Bson::Boolean(true))));

        let predicate = Predicate::all()
            .and(Clause::NameContains("slim".to_string()))
            .and(Clause::CategoryEquals("Shirts".to_string()))
            .and(Clause::PriceBetween { min: 10.0, max: 20.0 })
            .and(Clause::RatingAtLeast(3.0));
        for key in predicate_filter(&predicate).keys() {
            assert!(stored.contains_key(key), "filter key {} not stored", key);
        }
    }

    #[test]
    fn test_empty_predicate_is_empty_filter() {
        assert_eq!(predicate_filter(&Predicate::all()), doc! {});
    }

    #[test]
    fn test_clauses_merge_into_one_document() {
        let predicate = Predicate::all()
            .and(Clause::NameContains("slim (fit)".to_string()))
            .and(Clause::CategoryEquals("Shirts".to_string()))
            .and(Clause::PriceBetween { min: 10.0, max: 20.0 })
            .and(Clause::RatingAtLeast(3.0));

        assert_eq!(
            predicate_filter(&predicate),
            doc! {
                "name": { "$regex": "slim \\(fit\\)", "$options": "i" },
                "category": "Shirts",
                "price": { "$gte": 10.0, "$lte": 20.0 },
                "rating": { "$gte": 3.0 },
            }
        );
    }

    #[test]
    fn test_repeated_field_uses_and() {
        let predicate = Predicate::all()
            .and(Clause::RatingAtLeast(2.0))
            .and(Clause::RatingAtLeast(4.0));

        assert_eq!(
            predicate_filter(&predicate),
            doc! { "$and": [ { "rating": { "$gte": 2.0 } }, { "rating": { "$gte": 4.0 } } ] }
        );
    }

    #[test]
    fn test_sort_document_has_id_tiebreak() {
        assert_eq!(
            sort_document(SortOrder::ascending(SortField::Price)),
            doc! { "price": 1, "_id": -1 }
        );
        assert_eq!(
            sort_document(SortOrder::descending(SortField::CreatedAt)),
            doc! { "createdAt": -1, "_id": -1 }
        );
        assert_eq!(sort_document(SortOrder::default()), doc! { "_id": -1 });
    }
}
