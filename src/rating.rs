use crate::database::{decode, encode, review_ids_tx, serialize_id, OrAbort, Store};
use crate::error::{Error, Result};
use crate::model::{Movie, Review};
use log::debug;
use sled::transaction::{abort, ConflictableTransactionResult, TransactionalTree};
use sled::Transactional;

pub fn review_score(review: &Review) -> f64 {
    (f64::from(review.note_visual)
        + f64::from(review.note_action)
        + f64::from(review.note_scenario))
        / 3.0
}

/// Mean of the review scores, `None` when there are no reviews.
pub fn global_rating<'a, I>(reviews: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Review>,
{
    let (total, count) = reviews
        .into_iter()
        .fold((0.0, 0usize), |(total, count), review| {
            (total + review_score(review), count + 1)
        });
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Recomputes and stores the rating of `movie_id` inside a running transaction.
pub(crate) fn recompute_tx(
    movies: &TransactionalTree,
    reviews: &TransactionalTree,
    reviews_by_movie: &TransactionalTree,
    movie_id: u64,
) -> ConflictableTransactionResult<Option<f64>, Error> {
    let mut movie: Movie = match movies.get(serialize_id(movie_id))? {
        Some(bytes) => decode(bytes).or_abort()?,
        None => return abort(Error::NotFound("Movie not found".to_owned())),
    };

    let mut movie_reviews = Vec::new();
    for id in review_ids_tx(reviews_by_movie, movie_id)? {
        if let Some(bytes) = reviews.get(serialize_id(id))? {
            movie_reviews.push(decode::<Review, _>(bytes).or_abort()?);
        }
    }

    movie.global_rating = global_rating(&movie_reviews);
    movies.insert(&serialize_id(movie_id), encode(&movie).or_abort()?)?;
    Ok(movie.global_rating)
}

/// Recomputes the rating of `movie_id` in its own transaction.
pub fn recompute(store: &Store, movie_id: u64) -> Result<Option<f64>> {
    let rating = (&store.movies, &store.reviews, &store.reviews_by_movie).transaction(
        |(movies, reviews, reviews_by_movie)| {
            recompute_tx(movies, reviews, reviews_by_movie, movie_id)
        },
    )?;
    debug!("movie {} rated {:?}", movie_id, rating);
    Ok(rating)
}
