use crate::database::{MovieDb, Store};
use crate::error::{Error, Result};
use crate::model::{Change, Movie, MovieSummary, NewMovie};
use crate::provider::{MovieDetails, MovieProvider, SearchResult};
use log::info;

/// Builds a local movie record from provider details. The provider id is kept.
pub fn movie_from_details(details: MovieDetails) -> Movie {
    let director = details
        .credits
        .crew
        .iter()
        .filter(|member| member.job == "Director")
        .map(|member| member.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let genre = details
        .genres
        .iter()
        .map(|genre| genre.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let release_year = details
        .release_date
        .as_deref()
        .filter(|date| !date.is_empty())
        .and_then(|date| date.split('-').next())
        .and_then(|year| year.parse().ok());

    Movie {
        id: details.id,
        title: details.title,
        director,
        release_year,
        genre,
        poster_path: details.poster_path.unwrap_or_default(),
        runtime: details.runtime,
        synopsis: details.overview,
        global_rating: None,
    }
}

/// Looks movies up locally, importing them from the provider on a miss.
pub struct MovieResolver<'a> {
    store: &'a Store,
    provider: &'a dyn MovieProvider,
}

impl<'a> MovieResolver<'a> {
    pub fn new(store: &'a Store, provider: &'a dyn MovieProvider) -> Self {
        MovieResolver { store, provider }
    }

    pub async fn resolve(&self, movie_id: u64) -> Result<Movie> {
        if let Some(movie) = self.store.get_movie(movie_id)? {
            return Ok(movie);
        }

        let movie = movie_from_details(self.provider.movie_details(movie_id).await?);
        let id = movie.id;
        if self.store.insert_movie(&movie)? == Change::Applied {
            info!("imported movie {} ({})", id, movie.title);
        }
        self.store
            .get_movie(id)?
            .ok_or_else(|| Error::NotFound("Movie not found".to_owned()))
    }

    pub async fn search_by_title(&self, title: &str) -> Result<Vec<SearchResult>> {
        if title.trim().is_empty() {
            return Err(Error::Validation("title required".to_owned()));
        }
        Ok(self.provider.search_by_title(title).await?)
    }
}

pub fn create_movie(store: &Store, new: NewMovie) -> Result<Movie> {
    if new.title.trim().is_empty() {
        return Err(Error::Validation("title required".to_owned()));
    }
    let movie = Movie::from(new);
    match store.insert_movie(&movie)? {
        Change::Applied => Ok(movie),
        Change::Unchanged => Err(Error::Conflict(format!(
            "Movie {} already exists",
            movie.id
        ))),
    }
}

pub fn list_movies(store: &Store) -> Result<Vec<MovieSummary>> {
    Ok(store.movies()?.iter().map(MovieSummary::from).collect())
}
