//! Review aggregation
//!
//! Enforces one review per reviewer per product and recomputes the
//! product's rating summary from the full review collection. Everything here
//! works on values; persisting the outcome is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::query::ValidationError;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// A stored review. Immutable once appended to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Identity of the reviewer, unique per product
    pub reviewer_identity: String,
    /// Star rating, 1 to 5
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    #[serde(with = "crate::mongodb::stored_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A review that has not yet been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub reviewer_identity: String,
    pub rating: i32,
    pub comment: String,
}

impl NewReview {
    fn stamp(self, now: DateTime<Utc>) -> Review {
        Review {
            reviewer_identity: self.reviewer_identity,
            rating: self.rating,
            comment: self.comment,
            created_at: now,
        }
    }
}

/// Count and mean rating over a review collection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingAggregate {
    pub count: u64,
    pub mean: f64,
}

impl RatingAggregate {
    /// Re-reduces the whole collection. The sum is kept in integers so the mean
    /// is exactly `sum / count`; an empty collection has mean 0.
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self::default();
        }
        let sum: i64 = reviews.iter().map(|review| i64::from(review.rating)).sum();
        let count = reviews.len() as u64;
        Self {
            count,
            mean: sum as f64 / count as f64,
        }
    }
}

/// Successful outcome of [`submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub reviews: Vec<Review>,
    pub aggregate: RatingAggregate,
    pub inserted: Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("You already submitted a review")]
    Duplicate { reviewer: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Appends `candidate` to `existing` unless its reviewer already reviewed the
/// product, and returns the next review collection and aggregate.
pub fn submit(existing: &[Review], candidate: NewReview) -> Result<Submission, ReviewError> {
    submit_at(existing, candidate, Utc::now())
}

/// [`submit`] with an explicit submission time.
pub fn submit_at(
    existing: &[Review],
    candidate: NewReview,
    now: DateTime<Utc>,
) -> Result<Submission, ReviewError> {
    validate(&candidate)?;

    if existing
        .iter()
        .any(|review| review.reviewer_identity == candidate.reviewer_identity)
    {
        return Err(ReviewError::Duplicate {
            reviewer: candidate.reviewer_identity,
        });
    }

    let inserted = candidate.stamp(now);
    let mut reviews = Vec::with_capacity(existing.len() + 1);
    reviews.extend_from_slice(existing);
    reviews.push(inserted.clone());
    let aggregate = RatingAggregate::from_reviews(&reviews);

    Ok(Submission {
        reviews,
        aggregate,
        inserted,
    })
}

fn validate(candidate: &NewReview) -> Result<(), ValidationError> {
    if candidate.reviewer_identity.trim().is_empty() {
        return Err(ValidationError::new("reviewer", "must not be empty"));
    }
    if !(MIN_RATING..=MAX_RATING).contains(&candidate.rating) {
        return Err(ValidationError::new(
            "rating",
            format!(
                "{} is outside {}..={}",
                candidate.rating, MIN_RATING, MAX_RATING
            ),
        ));
    }
    Ok(())
}
