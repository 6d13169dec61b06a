use crate::auth::{Accounts, SignupRequest};
use crate::database::{MovieDb, Store, UserDb};
use crate::error::Result;
use crate::model::Movie;
use crate::reviews::{submit_review, ReviewSubmission};
use crate::social::{add_friend, FriendRequest};
use log::info;

fn demo_movie(id: u64, title: &str, director: &str, release_year: i32, genre: &str) -> Movie {
    Movie {
        id,
        title: title.to_owned(),
        director: director.to_owned(),
        release_year: Some(release_year),
        genre: genre.to_owned(),
        poster_path: String::new(),
        runtime: None,
        synopsis: None,
        global_rating: None,
    }
}

fn demo_review(
    user_id: u64,
    movie_id: u64,
    notes: (i32, i32, i32),
    favorite: bool,
) -> ReviewSubmission {
    ReviewSubmission {
        user_id,
        movie_id,
        note_visual: notes.0,
        note_action: notes.1,
        note_scenario: notes.2,
        date_reviewed: None,
        favorite,
    }
}

/// Fills an empty store with a couple of users, movies and reviews.
///
/// Returns `false` without touching anything if the store already has users.
pub fn seed_demo_data(store: &Store, accounts: &Accounts) -> Result<bool> {
    if !store.users()?.is_empty() {
        return Ok(false);
    }

    for movie in &[
        demo_movie(27205, "Inception", "Christopher Nolan", 2010, "Sci-Fi"),
        demo_movie(238, "The Godfather", "Francis Ford Coppola", 1972, "Crime"),
        demo_movie(680, "Pulp Fiction", "Quentin Tarantino", 1994, "Crime"),
    ] {
        store.insert_movie(movie)?;
    }

    let john = accounts.signup(
        store,
        SignupRequest {
            username: Some("john_doe".to_owned()),
            password_hash: Some("hashed_password_1".to_owned()),
            profile_picture: None,
        },
    )?;
    let jane = accounts.signup(
        store,
        SignupRequest {
            username: Some("jane_smith".to_owned()),
            password_hash: Some("hashed_password_2".to_owned()),
            profile_picture: None,
        },
    )?;

    submit_review(store, demo_review(john.id, 27205, (9, 8, 9), false))?;
    submit_review(store, demo_review(jane.id, 238, (10, 9, 10), true))?;
    add_friend(
        store,
        FriendRequest {
            user_id: Some(john.id),
            friend_id: Some(jane.id),
        },
    )?;

    info!("seeded demo data");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordScheme, TokenIssuer};
    use crate::database::{MarkDb, MarkList};
    use crate::social::list_friends;

    #[test]
    fn seeds_only_once() {
        let store = Store::temporary().unwrap();
        let accounts = Accounts::new(PasswordScheme::Plain, TokenIssuer::new("secret"));

        assert!(seed_demo_data(&store, &accounts).unwrap());
        assert!(!seed_demo_data(&store, &accounts).unwrap());

        assert_eq!(store.users().unwrap().len(), 2);
        assert_eq!(store.movies().unwrap().len(), 3);

        let jane = store.get_user_by_username("jane_smith").unwrap().unwrap();
        assert!(store.is_marked(MarkList::Favorites, jane.id, 238).unwrap());
        assert_eq!(list_friends(&store, jane.id).unwrap()[0].username, "john_doe");

        let godfather = store.get_movie(238).unwrap().unwrap();
        assert!((godfather.global_rating.unwrap() - 29.0 / 3.0).abs() < 1e-9);
        assert_eq!(store.get_movie(680).unwrap().unwrap().global_rating, None);
    }
}
