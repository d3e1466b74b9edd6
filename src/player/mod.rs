pub use handlers::{get_rating, set_rating};
pub use rating_service::{InMemoryPlayerRatingService, PlayerRatingService, RatingError};

mod handlers;
pub mod rating_service;
