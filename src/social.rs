use crate::database::{FriendDb, MarkDb, MarkList, MovieDb, Store, UserDb};
use crate::error::{Error, Result};
use crate::model::{Change, Movie, User};
use log::info;
use serde::Deserialize;

#[derive(Deserialize, Debug, Default)]
pub struct FriendRequest {
    pub user_id: Option<u64>,
    pub friend_id: Option<u64>,
}

fn require_user(store: &Store, user_id: u64) -> Result<User> {
    store
        .get_user(user_id)?
        .ok_or_else(|| Error::NotFound("User not found".to_owned()))
}

fn require_movie(store: &Store, movie_id: u64) -> Result<Movie> {
    store
        .get_movie(movie_id)?
        .ok_or_else(|| Error::NotFound("Movie not found".to_owned()))
}

/// Returns the message reported to the client.
pub fn add_friend(store: &Store, request: FriendRequest) -> Result<&'static str> {
    let (user_id, friend_id) = match (request.user_id, request.friend_id) {
        (Some(user_id), Some(friend_id)) => (user_id, friend_id),
        _ => {
            return Err(Error::Validation(
                "user_id and friend_id required".to_owned(),
            ))
        }
    };
    if user_id == friend_id {
        return Err(Error::Validation("cannot befriend oneself".to_owned()));
    }
    require_user(store, user_id)?;
    require_user(store, friend_id)?;

    Ok(match store.add_friendship(user_id, friend_id)? {
        Change::Applied => {
            info!("users {} and {} are now friends", user_id, friend_id);
            "Friend added"
        }
        Change::Unchanged => "Already friends",
    })
}

/// Friends of a user, in the order the friendships were made.
pub fn list_friends(store: &Store, user_id: u64) -> Result<Vec<User>> {
    let mut friends = Vec::new();
    for friendship in store.friendships_of(user_id)? {
        if let Some(friend) = store.get_user(friendship.other(user_id))? {
            friends.push(friend);
        }
    }
    Ok(friends)
}

fn already_message(list: MarkList) -> &'static str {
    match list {
        MarkList::Watched => "Already watched",
        MarkList::Favorites => "Already favorite",
    }
}

pub fn mark(store: &Store, list: MarkList, user_id: u64, movie_id: u64) -> Result<&'static str> {
    require_user(store, user_id)?;
    require_movie(store, movie_id)?;
    Ok(match store.mark(list, user_id, movie_id)? {
        Change::Applied => match list {
            MarkList::Watched => "Marked as watched",
            MarkList::Favorites => "Marked as favorite",
        },
        Change::Unchanged => already_message(list),
    })
}

pub fn unmark(store: &Store, list: MarkList, user_id: u64, movie_id: u64) -> Result<&'static str> {
    Ok(match store.unmark(list, user_id, movie_id)? {
        Change::Applied => "Removed",
        Change::Unchanged => "Not found",
    })
}

/// Movies a user marked, oldest mark first.
pub fn marked_movies(store: &Store, list: MarkList, user_id: u64) -> Result<Vec<Movie>> {
    require_user(store, user_id)?;
    let mut movies = Vec::new();
    for mark in store.marks_of(list, user_id)? {
        if let Some(movie) = store.get_movie(mark.movie_id)? {
            movies.push(movie);
        }
    }
    Ok(movies)
}
