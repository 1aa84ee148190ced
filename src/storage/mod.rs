pub mod sqlite;

pub use sqlite::{NewReview, RatingStats, Review, ReviewStore, StorageError};
