use crate::error::{Error, Result};
use crate::model::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{Transactional, Tree};

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"users_username";
const MOVIES: &[u8] = b"movies";
const REVIEWS: &[u8] = b"reviews";
const REVIEWS_BY_MOVIE: &[u8] = b"reviews_by_movie";
const FRIENDSHIPS: &[u8] = b"friendships";
const FRIENDSHIP_PAIRS: &[u8] = b"friendship_pairs";
const WATCHED: &[u8] = b"watched";
const FAVORITES: &[u8] = b"favorites";

// Big-endian so that tree iteration follows id order.
pub(crate) fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<u64> {
    let bytes: [u8; 8] = id.as_ref().try_into().map_err(|_| {
        Error::Codec(Box::new(bincode::ErrorKind::Custom(
            "malformed id key".to_owned(),
        )))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Key of a directed (left, right) pair; used for friendships and movie marks.
pub(crate) fn pair_key(left: u64, right: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(left));
    key[8..].copy_from_slice(&serialize_id(right));
    key
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned, V: AsRef<[u8]>>(bytes: V) -> Result<T> {
    Ok(bincode::deserialize(bytes.as_ref())?)
}

/// Lifts a crate error into a transaction abort.
pub(crate) trait OrAbort<T> {
    fn or_abort(self) -> ConflictableTransactionResult<T, Error>;
}

impl<T> OrAbort<T> for Result<T> {
    fn or_abort(self) -> ConflictableTransactionResult<T, Error> {
        self.map_err(ConflictableTransactionError::Abort)
    }
}

/// Handle on the embedded database and every tree the service uses.
///
/// Built once at startup and shared between workers.
pub struct Store {
    db: sled::Db,
    pub(crate) users: Tree,
    pub(crate) users_username: Tree,
    pub(crate) movies: Tree,
    pub(crate) reviews: Tree,
    pub(crate) reviews_by_movie: Tree,
    pub(crate) friendships: Tree,
    pub(crate) friendship_pairs: Tree,
    pub(crate) watched: Tree,
    pub(crate) favorites: Tree,
}

impl Store {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Self::with_db(sled::open(path)?)
    }

    pub fn temporary() -> Result<Self> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    fn with_db(db: sled::Db) -> Result<Self> {
        Ok(Store {
            users: db.open_tree(USERS)?,
            users_username: db.open_tree(USERS_USERNAME)?,
            movies: db.open_tree(MOVIES)?,
            reviews: db.open_tree(REVIEWS)?,
            reviews_by_movie: db.open_tree(REVIEWS_BY_MOVIE)?,
            friendships: db.open_tree(FRIENDSHIPS)?,
            friendship_pairs: db.open_tree(FRIENDSHIP_PAIRS)?,
            watched: db.open_tree(WATCHED)?,
            favorites: db.open_tree(FAVORITES)?,
            db,
        })
    }

    /// Generated ids start at 1.
    pub fn next_id(&self) -> Result<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn marks(&self, list: MarkList) -> &Tree {
        match list {
            MarkList::Watched => &self.watched,
            MarkList::Favorites => &self.favorites,
        }
    }
}

fn collect_values<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>> {
    tree.iter()
        .values()
        .map(|value| decode(value?))
        .collect()
}

pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
    pub profile_picture: Option<String>,
}

pub trait UserDb {
    /// Returns `None` when the username is already taken.
    fn add_user(&self, user: NewUser) -> Result<Option<User>>;
    fn get_user(&self, id: u64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn users(&self) -> Result<Vec<User>>;
    fn rename_user(&self, id: u64, username: &str) -> Result<User>;
}

impl UserDb for Store {
    fn add_user(&self, user: NewUser) -> Result<Option<User>> {
        let id = self.next_id()?;
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            created_at: user.created_at,
            profile_picture: user.profile_picture,
        };
        let encoded = encode(&user)?;
        let inserted = (&self.users, &self.users_username).transaction(|(users, users_username)| {
            users.insert(&serialize_id(id), encoded.as_slice())?;
            if users_username
                .insert(user.username.as_bytes(), &serialize_id(id))?
                .is_some()
            {
                return abort(Error::Conflict("Username already exists".to_owned()));
            }
            Ok(())
        });
        match inserted {
            Ok(()) => Ok(Some(user)),
            Err(err) => match Error::from(err) {
                Error::Conflict(_) => Ok(None),
                err => Err(err),
            },
        }
    }

    fn get_user(&self, id: u64) -> Result<Option<User>> {
        self.users.get(serialize_id(id))?.map(decode).transpose()
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.users_username.get(username)? {
            Some(id) => self.get_user(deserialize_id(id)?),
            None => Ok(None),
        }
    }

    fn users(&self) -> Result<Vec<User>> {
        collect_values(&self.users)
    }

    fn rename_user(&self, id: u64, username: &str) -> Result<User> {
        let user = (&self.users, &self.users_username).transaction(|(users, users_username)| {
            let mut user: User = match users.get(serialize_id(id))? {
                Some(bytes) => decode(bytes).or_abort()?,
                None => return abort(Error::NotFound("User not found".to_owned())),
            };
            if user.username == username {
                return Ok(user);
            }
            if users_username.get(username.as_bytes())?.is_some() {
                return abort(Error::Conflict("Username already exists".to_owned()));
            }
            users_username.remove(user.username.as_bytes())?;
            users_username.insert(username.as_bytes(), &serialize_id(id))?;
            user.username = username.to_owned();
            users.insert(&serialize_id(id), encode(&user).or_abort()?)?;
            Ok(user)
        })?;
        Ok(user)
    }
}

pub trait MovieDb {
    fn get_movie(&self, id: u64) -> Result<Option<Movie>>;
    /// Inserts the movie unless its id is already present.
    fn insert_movie(&self, movie: &Movie) -> Result<Change>;
    fn movies(&self) -> Result<Vec<Movie>>;
}

impl MovieDb for Store {
    fn get_movie(&self, id: u64) -> Result<Option<Movie>> {
        self.movies.get(serialize_id(id))?.map(decode).transpose()
    }

    fn insert_movie(&self, movie: &Movie) -> Result<Change> {
        let swapped = self.movies.compare_and_swap(
            serialize_id(movie.id),
            None as Option<&[u8]>,
            Some(encode(movie)?),
        )?;
        Ok(match swapped {
            Ok(()) => Change::Applied,
            Err(_) => Change::Unchanged,
        })
    }

    fn movies(&self) -> Result<Vec<Movie>> {
        collect_values(&self.movies)
    }
}

/// Review ids of a movie, in insertion order, read inside a transaction.
pub(crate) fn review_ids_tx(
    reviews_by_movie: &TransactionalTree,
    movie_id: u64,
) -> ConflictableTransactionResult<Vec<u64>, Error> {
    match reviews_by_movie.get(serialize_id(movie_id))? {
        Some(bytes) => decode(bytes).or_abort(),
        None => Ok(Vec::new()),
    }
}

pub trait ReviewDb {
    fn get_review(&self, id: u64) -> Result<Option<Review>>;
    fn reviews(&self) -> Result<Vec<Review>>;
    fn reviews_for_movie(&self, movie_id: u64) -> Result<Vec<Review>>;
    fn reviews_by_user(&self, user_id: u64) -> Result<Vec<Review>>;
}

impl ReviewDb for Store {
    fn get_review(&self, id: u64) -> Result<Option<Review>> {
        self.reviews.get(serialize_id(id))?.map(decode).transpose()
    }

    fn reviews(&self) -> Result<Vec<Review>> {
        collect_values(&self.reviews)
    }

    fn reviews_for_movie(&self, movie_id: u64) -> Result<Vec<Review>> {
        let ids: Vec<u64> = match self.reviews_by_movie.get(serialize_id(movie_id))? {
            Some(bytes) => decode(bytes)?,
            None => return Ok(Vec::new()),
        };
        let mut reviews = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(review) = self.get_review(id)? {
                reviews.push(review);
            }
        }
        Ok(reviews)
    }

    fn reviews_by_user(&self, user_id: u64) -> Result<Vec<Review>> {
        Ok(self
            .reviews()?
            .into_iter()
            .filter(|review| review.user_id == user_id)
            .collect())
    }
}

pub trait FriendDb {
    /// Stores one edge per unordered pair; `Unchanged` if either ordering exists.
    fn add_friendship(&self, user_id: u64, friend_id: u64) -> Result<Change>;
    fn friendships_of(&self, user_id: u64) -> Result<Vec<Friendship>>;
}

impl FriendDb for Store {
    fn add_friendship(&self, user_id: u64, friend_id: u64) -> Result<Change> {
        let id = self.next_id()?;
        let friendship = Friendship {
            id,
            user_id,
            friend_id,
        };
        let encoded = encode(&friendship)?;
        let change = (&self.friendships, &self.friendship_pairs).transaction(
            |(friendships, pairs)| -> ConflictableTransactionResult<Change, Error> {
                if pairs.get(pair_key(user_id, friend_id))?.is_some()
                    || pairs.get(pair_key(friend_id, user_id))?.is_some()
                {
                    return Ok(Change::Unchanged);
                }
                friendships.insert(&serialize_id(id), encoded.as_slice())?;
                pairs.insert(&pair_key(user_id, friend_id), &serialize_id(id))?;
                Ok(Change::Applied)
            },
        )?;
        Ok(change)
    }

    fn friendships_of(&self, user_id: u64) -> Result<Vec<Friendship>> {
        Ok(collect_values::<Friendship>(&self.friendships)?
            .into_iter()
            .filter(|f| f.user_id == user_id || f.friend_id == user_id)
            .collect())
    }
}

/// Which per-user movie list a mark belongs to; named as in request paths.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkList {
    Watched,
    Favorites,
}

/// Inserts a (user, movie) mark inside a transaction unless it already exists.
pub(crate) fn mark_tx(
    marks: &TransactionalTree,
    mark: &MovieMark,
) -> ConflictableTransactionResult<Change, Error> {
    let key = pair_key(mark.user_id, mark.movie_id);
    if marks.get(key)?.is_some() {
        return Ok(Change::Unchanged);
    }
    marks.insert(&key, encode(mark).or_abort()?)?;
    Ok(Change::Applied)
}

pub trait MarkDb {
    fn mark(&self, list: MarkList, user_id: u64, movie_id: u64) -> Result<Change>;
    fn unmark(&self, list: MarkList, user_id: u64, movie_id: u64) -> Result<Change>;
    fn is_marked(&self, list: MarkList, user_id: u64, movie_id: u64) -> Result<bool>;
    /// Marks of one user, oldest first.
    fn marks_of(&self, list: MarkList, user_id: u64) -> Result<Vec<MovieMark>>;
}

impl MarkDb for Store {
    fn mark(&self, list: MarkList, user_id: u64, movie_id: u64) -> Result<Change> {
        let mark = MovieMark {
            id: self.next_id()?,
            user_id,
            movie_id,
        };
        let swapped = self.marks(list).compare_and_swap(
            pair_key(user_id, movie_id),
            None as Option<&[u8]>,
            Some(encode(&mark)?),
        )?;
        Ok(match swapped {
            Ok(()) => Change::Applied,
            Err(_) => Change::Unchanged,
        })
    }

    fn unmark(&self, list: MarkList, user_id: u64, movie_id: u64) -> Result<Change> {
        Ok(match self.marks(list).remove(pair_key(user_id, movie_id))? {
            Some(_) => Change::Applied,
            None => Change::Unchanged,
        })
    }

    fn is_marked(&self, list: MarkList, user_id: u64, movie_id: u64) -> Result<bool> {
        Ok(self
            .marks(list)
            .contains_key(pair_key(user_id, movie_id))?)
    }

    fn marks_of(&self, list: MarkList, user_id: u64) -> Result<Vec<MovieMark>> {
        let mut marks = self
            .marks(list)
            .scan_prefix(serialize_id(user_id))
            .values()
            .map(|value| decode::<MovieMark, _>(value?))
            .collect::<Result<Vec<_>>>()?;
        marks.sort_by_key(|mark| mark.id);
        Ok(marks)
    }
}
