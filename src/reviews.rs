use crate::database::{
    encode, mark_tx, review_ids_tx, serialize_id, MovieDb, OrAbort, ReviewDb, Store, UserDb,
};
use crate::error::{Error, Result};
use crate::model::{MovieMark, Review};
use crate::rating::recompute_tx;
use chrono::{Local, NaiveDate};
use log::info;
use serde::Deserialize;
use sled::transaction::abort;
use sled::Transactional;

/// A review as submitted by a client.
#[derive(Deserialize, Debug, Clone)]
pub struct ReviewSubmission {
    pub user_id: u64,
    pub movie_id: u64,
    pub note_visual: i32,
    pub note_action: i32,
    pub note_scenario: i32,
    pub date_reviewed: Option<NaiveDate>,
    /// Only drives the favorite marker; never stored on the review.
    #[serde(default)]
    pub favorite: bool,
}

impl ReviewSubmission {
    fn into_review(self, id: u64) -> (Review, bool) {
        let review = Review {
            id,
            user_id: self.user_id,
            movie_id: self.movie_id,
            note_visual: self.note_visual,
            note_action: self.note_action,
            note_scenario: self.note_scenario,
            date_reviewed: self
                .date_reviewed
                .unwrap_or_else(|| Local::now().date_naive()),
        };
        (review, self.favorite)
    }
}

/// Stores a review together with its side effects.
///
/// In a single transaction: checks that the user and movie exist, inserts
/// the review, marks the movie watched (and favorite when asked) for the
/// user if not already, and recomputes the movie's global rating. Nothing is
/// written when any step fails.
pub fn submit_review(store: &Store, submission: ReviewSubmission) -> Result<Review> {
    let (review, favorite) = submission.into_review(store.next_id()?);
    let encoded = encode(&review)?;
    let watched = MovieMark {
        id: store.next_id()?,
        user_id: review.user_id,
        movie_id: review.movie_id,
    };
    let favorite = if favorite {
        Some(MovieMark {
            id: store.next_id()?,
            ..watched.clone()
        })
    } else {
        None
    };

    let rating = (
        &store.users,
        &store.movies,
        &store.reviews,
        &store.reviews_by_movie,
        &store.watched,
        &store.favorites,
    )
        .transaction(
            |(users, movies, reviews, reviews_by_movie, watched_tree, favorites_tree)| {
                if users.get(serialize_id(review.user_id))?.is_none() {
                    return abort(Error::InvalidReference("Invalid user_id".to_owned()));
                }
                if movies.get(serialize_id(review.movie_id))?.is_none() {
                    return abort(Error::InvalidReference("Invalid movie_id".to_owned()));
                }

                reviews.insert(&serialize_id(review.id), encoded.as_slice())?;
                let mut ids = review_ids_tx(reviews_by_movie, review.movie_id)?;
                ids.push(review.id);
                reviews_by_movie.insert(&serialize_id(review.movie_id), encode(&ids).or_abort()?)?;

                mark_tx(watched_tree, &watched)?;
                if let Some(favorite) = &favorite {
                    mark_tx(favorites_tree, favorite)?;
                }

                recompute_tx(movies, reviews, reviews_by_movie, review.movie_id)
            },
        )?;

    info!(
        "user {} reviewed movie {}, rating now {:?}",
        review.user_id, review.movie_id, rating
    );
    Ok(review)
}

pub fn reviews_for_movie(store: &Store, movie_id: u64) -> Result<Vec<Review>> {
    if store.get_movie(movie_id)?.is_none() {
        return Err(Error::NotFound("Movie not found".to_owned()));
    }
    store.reviews_for_movie(movie_id)
}

pub fn reviews_by_user(store: &Store, user_id: u64) -> Result<Vec<Review>> {
    if store.get_user(user_id)?.is_none() {
        return Err(Error::NotFound("User not found".to_owned()));
    }
    store.reviews_by_user(user_id)
}
