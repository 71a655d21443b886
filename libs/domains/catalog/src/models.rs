use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::reviews::{Review, Submission};

const SAMPLE_NAME: &str = "sample name";
const SAMPLE_IMAGE: &str = "/images/p1.jpg";
const SAMPLE_CATEGORY: &str = "sample category";
const SAMPLE_BRAND: &str = "sample brand";
const SAMPLE_DESCRIPTION: &str = "sample description";

/// Product entity - represents a product document in MongoDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (stored as _id in MongoDB), UUIDv7 so it grows with creation time
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    pub name: String,
    /// URL-friendly unique name
    pub slug: String,
    /// Primary image path
    pub image: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub brand: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    pub count_in_stock: i32,
    /// Mean review rating, 0 when there are no reviews
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub num_reviews: u64,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub featured: bool,
    #[serde(with = "crate::mongodb::stored_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::mongodb::stored_datetime")]
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every successful save
    #[serde(default)]
    pub version: u64,
}

/// DTO for creating a new product. Absent fields get sample values.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    /// Timestamped sample name when absent
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    /// Derived from the name when absent
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0))]
    pub count_in_stock: Option<i32>,
    #[serde(default)]
    pub featured: bool,
}

/// DTO for updating an existing product
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0))]
    pub count_in_stock: Option<i32>,
    pub featured: Option<bool>,
}

/// Review submission body. The reviewer comes from the authenticated request.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReviewInput {
    /// Star rating, 1 to 5
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
}

/// Authenticated reviewer identity, attached to the request by the gateway layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer(pub String);

/// One page of search or admin listing results
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub products: Vec<Product>,
    /// Total number of products matching the filters
    pub count_products: u64,
    pub page: u64,
    pub pages: u64,
}

/// Response to an accepted review
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReceipt {
    pub message: String,
    pub review: Review,
    pub num_reviews: u64,
    /// New mean rating of the product
    pub rating: f64,
}

impl Product {
    /// Create a new product from CreateProduct DTO
    pub fn new(input: CreateProduct) -> Self {
        let now = Utc::now();
        let name = input.name.unwrap_or_else(sample_name);
        let slug = input.slug.unwrap_or_else(|| slugify(&name));
        Self {
            id: Uuid::now_v7(),
            name,
            slug,
            image: input.image.unwrap_or_else(|| SAMPLE_IMAGE.to_string()),
            images: input.images,
            brand: input.brand.unwrap_or_else(|| SAMPLE_BRAND.to_string()),
            category: input.category.unwrap_or_else(|| SAMPLE_CATEGORY.to_string()),
            description: input
                .description
                .unwrap_or_else(|| SAMPLE_DESCRIPTION.to_string()),
            price: input.price.unwrap_or_default(),
            count_in_stock: input.count_in_stock.unwrap_or_default(),
            rating: 0.0,
            num_reviews: 0,
            reviews: Vec::new(),
            featured: input.featured,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Apply updates from UpdateProduct DTO
    pub fn apply_update(&mut self, update: UpdateProduct) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(slug) = update.slug {
            self.slug = slug;
        }
        if let Some(image) = update.image {
            self.image = image;
        }
        if let Some(images) = update.images {
            self.images = images;
        }
        if let Some(brand) = update.brand {
            self.brand = brand;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(count_in_stock) = update.count_in_stock {
            self.count_in_stock = count_in_stock;
        }
        if let Some(featured) = update.featured {
            self.featured = featured;
        }
        self.updated_at = Utc::now();
    }

    /// Replace the review collection and its aggregate with an accepted submission
    pub fn record_reviews(&mut self, submission: &Submission) {
        self.reviews = submission.reviews.clone();
        self.num_reviews = submission.aggregate.count;
        self.rating = submission.aggregate.mean;
        self.updated_at = Utc::now();
    }
}

/// Placeholder name for products created without one, e.g. `"sample name 1700000000000"`
pub fn sample_name() -> String {
    format!("{} {}", SAMPLE_NAME, Utc::now().timestamp_millis())
}

/// Lowercase, dash-separated form of a name: `"Nike Slim Shirt"` -> `"nike-slim-shirt"`
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
