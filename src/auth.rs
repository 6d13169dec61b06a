use crate::database::{NewUser, Store, UserDb};
use crate::error::{Error, Result};
use crate::model::{User, UserSummary};
use chrono::Local;
use jsonwebtoken::{EncodingKey, Header};
use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the `password_hash` field sent by clients is stored and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordScheme {
    /// Stored as sent and compared verbatim.
    Plain,
    Bcrypt { cost: u32 },
}

impl PasswordScheme {
    fn store(&self, password: &str) -> Result<String> {
        match self {
            PasswordScheme::Plain => Ok(password.to_owned()),
            PasswordScheme::Bcrypt { cost } => Ok(bcrypt::hash(password, *cost)?),
        }
    }

    fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        match self {
            PasswordScheme::Plain => Ok(password == stored),
            PasswordScheme::Bcrypt { .. } => Ok(bcrypt::verify(password, stored)?),
        }
    }
}

impl FromStr for PasswordScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(PasswordScheme::Plain),
            "bcrypt" => Ok(PasswordScheme::Bcrypt {
                cost: bcrypt::DEFAULT_COST,
            }),
            other => Err(Error::Config(format!("unknown password scheme {:?}", other))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct Claims {
    user_id: u64,
}

/// Signs bearer tokens naming a user. Tokens carry no expiry.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        TokenIssuer {
            key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: u64) -> Result<String> {
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &Claims { user_id },
            &self.key,
        )?)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct SignupRequest {
    pub username: Option<String>,
    #[serde(alias = "password")]
    pub password_hash: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginRequest {
    pub username: Option<String>,
    #[serde(alias = "password")]
    pub password_hash: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

pub struct Accounts {
    scheme: PasswordScheme,
    tokens: TokenIssuer,
}

impl Accounts {
    pub fn new(scheme: PasswordScheme, tokens: TokenIssuer) -> Self {
        Accounts { scheme, tokens }
    }

    pub fn signup(&self, store: &Store, request: SignupRequest) -> Result<User> {
        let username = required(request.username)
            .ok_or_else(|| Error::Validation("username required".to_owned()))?;
        let password = required(request.password_hash)
            .ok_or_else(|| Error::Validation("password required".to_owned()))?;

        let user = store
            .add_user(NewUser {
                username,
                password_hash: self.scheme.store(&password)?,
                created_at: Local::now().date_naive().to_string(),
                profile_picture: request.profile_picture,
            })?
            .ok_or_else(|| Error::Conflict("Username already exists".to_owned()))?;
        info!("signed up user {} ({})", user.id, user.username);
        Ok(user)
    }

    pub fn login(&self, store: &Store, request: LoginRequest) -> Result<AccessToken> {
        let (username, password) = match (required(request.username), request.password_hash) {
            (Some(username), Some(password)) if !password.is_empty() => (username, password),
            _ => {
                return Err(Error::Validation(
                    "username and password required".to_owned(),
                ))
            }
        };

        let user = store
            .get_user_by_username(&username)?
            .ok_or(Error::Unauthorized)?;
        if !self.scheme.verify(&password, &user.password_hash)? {
            return Err(Error::Unauthorized);
        }

        Ok(AccessToken {
            access_token: self.tokens.issue(user.id)?,
            token_type: "bearer".to_owned(),
        })
    }
}

pub fn get_user(store: &Store, id: u64) -> Result<User> {
    store
        .get_user(id)?
        .ok_or_else(|| Error::NotFound("User not found".to_owned()))
}

pub fn list_users(store: &Store) -> Result<Vec<UserSummary>> {
    Ok(store.users()?.iter().map(UserSummary::from).collect())
}

/// Renames the user when a non-empty username is given.
pub fn update_user(store: &Store, id: u64, update: UserUpdate) -> Result<User> {
    match required(update.username) {
        Some(username) => store.rename_user(id, &username),
        None => get_user(store, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation};

    fn accounts(scheme: PasswordScheme) -> Accounts {
        Accounts::new(scheme, TokenIssuer::new("secret"))
    }

    fn signup_request(username: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: Some(username.to_owned()),
            password_hash: Some(password.to_owned()),
            profile_picture: None,
        }
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: Some(username.to_owned()),
            password_hash: Some(password.to_owned()),
        }
    }

    #[test]
    fn duplicate_signup_leaves_users_unchanged() {
        let store = Store::temporary().unwrap();
        let accounts = accounts(PasswordScheme::Plain);
        let user = accounts
            .signup(&store, signup_request("jane_smith", "hashed_password_2"))
            .unwrap();
        assert_eq!(user.created_at, Local::now().date_naive().to_string());
        assert_eq!(user.password_hash, "hashed_password_2");

        let before = store.users().unwrap().len();
        let err = accounts
            .signup(&store, signup_request("jane_smith", "other"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.users().unwrap().len(), before);
    }

    #[test]
    fn signup_requires_fields() {
        let store = Store::temporary().unwrap();
        let accounts = accounts(PasswordScheme::Plain);
        let err = accounts
            .signup(&store, signup_request("  ", "pw"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = accounts
            .signup(&store, SignupRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.users().unwrap().is_empty());
    }

    #[test]
    fn plain_login_compares_verbatim() {
        let store = Store::temporary().unwrap();
        let accounts = accounts(PasswordScheme::Plain);
        let user = accounts
            .signup(&store, signup_request("john_doe", "hashed_password_1"))
            .unwrap();

        let token = accounts
            .login(&store, login_request("john_doe", "hashed_password_1"))
            .unwrap();
        assert_eq!(token.token_type, "bearer");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        let claims = jsonwebtoken::decode::<Claims>(
            &token.access_token,
            &DecodingKey::from_secret(b"secret"),
            &validation,
        )
        .unwrap()
        .claims;
        assert_eq!(claims.user_id, user.id);

        assert!(matches!(
            accounts.login(&store, login_request("john_doe", "HASHED_PASSWORD_1")),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            accounts.login(&store, login_request("nobody", "hashed_password_1")),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            accounts.login(&store, LoginRequest::default()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn bcrypt_scheme_hashes_and_verifies() {
        let store = Store::temporary().unwrap();
        let accounts = accounts(PasswordScheme::Bcrypt { cost: 4 });
        let user = accounts
            .signup(&store, signup_request("admin", "password"))
            .unwrap();
        assert_ne!(user.password_hash, "password");

        assert!(accounts
            .login(&store, login_request("admin", "password"))
            .is_ok());
        assert!(matches!(
            accounts.login(&store, login_request("admin", "1234")),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn parses_scheme_names() {
        assert_eq!("plain".parse::<PasswordScheme>().unwrap(), PasswordScheme::Plain);
        assert_eq!(
            "BCRYPT".parse::<PasswordScheme>().unwrap(),
            PasswordScheme::Bcrypt {
                cost: bcrypt::DEFAULT_COST
            }
        );
        assert!("argon2".parse::<PasswordScheme>().is_err());
    }

    #[test]
    fn update_without_username_keeps_user() {
        let store = Store::temporary().unwrap();
        let accounts = accounts(PasswordScheme::Plain);
        let user = accounts
            .signup(&store, signup_request("foo", "1234"))
            .unwrap();

        let same = update_user(&store, user.id, UserUpdate::default()).unwrap();
        assert_eq!(same, user);

        let renamed = update_user(
            &store,
            user.id,
            UserUpdate {
                username: Some("bar".to_owned()),
            },
        )
        .unwrap();
        assert_eq!(renamed.username, "bar");
        assert_eq!(list_users(&store).unwrap()[0].username, "bar");
        assert!(matches!(get_user(&store, 999), Err(Error::NotFound(_))));
    }
}
