use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
    pub profile_picture: Option<String>,
}

/// What the HTTP surface shows of a user; never carries the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub created_at: String,
    pub profile_picture: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: u64,
    pub username: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            created_at: user.created_at.clone(),
            profile_picture: user.profile_picture.clone(),
        }
    }
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// A movie keyed by the metadata provider's own id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub director: String,
    pub release_year: Option<i32>,
    pub genre: String,
    pub poster_path: String,
    pub runtime: Option<u32>,
    pub synopsis: Option<String>,
    pub global_rating: Option<f64>,
}

/// Client payload for creating a movie directly. The rating is always derived.
#[derive(Deserialize, Debug, Clone)]
pub struct NewMovie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub director: String,
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub poster_path: String,
    pub runtime: Option<u32>,
    pub synopsis: Option<String>,
}

impl From<NewMovie> for Movie {
    fn from(new: NewMovie) -> Self {
        Movie {
            id: new.id,
            title: new.title,
            director: new.director,
            release_year: new.release_year,
            genre: new.genre,
            poster_path: new.poster_path,
            runtime: new.runtime,
            synopsis: new.synopsis,
            global_rating: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieSummary {
    pub id: u64,
    pub title: String,
    pub release_year: Option<i32>,
    pub poster_path: String,
    pub global_rating: Option<f64>,
}

impl From<&Movie> for MovieSummary {
    fn from(movie: &Movie) -> Self {
        MovieSummary {
            id: movie.id,
            title: movie.title.clone(),
            release_year: movie.release_year,
            poster_path: movie.poster_path.clone(),
            global_rating: movie.global_rating,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    pub id: u64,
    pub user_id: u64,
    pub movie_id: u64,
    pub note_visual: i32,
    pub note_action: i32,
    pub note_scenario: i32,
    pub date_reviewed: NaiveDate,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Friendship {
    pub id: u64,
    pub user_id: u64,
    pub friend_id: u64,
}

impl Friendship {
    /// The endpoint of this edge that is not `user_id`.
    pub fn other(&self, user_id: u64) -> u64 {
        if self.user_id == user_id {
            self.friend_id
        } else {
            self.user_id
        }
    }
}

/// A (user, movie) marker row, used for both watched and favorite movies.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieMark {
    pub id: u64,
    pub user_id: u64,
    pub movie_id: u64,
}

/// Outcome of an idempotent insert or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    Unchanged,
}
