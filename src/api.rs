use crate::auth::{self, Accounts, LoginRequest, SignupRequest, UserUpdate};
use crate::database::{MarkList, ReviewDb, Store};
use crate::error::{Error, Result};
use crate::model::{NewMovie, UserProfile};
use crate::provider::MovieProvider;
use crate::resolver::{self, MovieResolver};
use crate::reviews::{self, ReviewSubmission};
use crate::social::{self, FriendRequest};
use actix_web::{cookie::Cookie, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

type Db = web::Data<Store>;
type Provider = web::Data<dyn MovieProvider>;
type AccountsData = web::Data<Accounts>;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| Error::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| Error::Validation(err.to_string()).into()),
    )
    .route("/", web::get().to(index))
    .route("/signup", web::post().to(signup))
    .route("/login", web::post().to(login))
    .route("/logout", web::post().to(logout))
    .route("/users", web::get().to(list_users))
    .service(
        web::resource("/users/{user_id}")
            .route(web::get().to(read_user))
            .route(web::patch().to(update_user)),
    )
    .route("/users/{user_id}/reviews", web::get().to(reviews_by_user))
    .route("/users/{user_id}/friends", web::get().to(list_friends))
    .service(
        web::resource("/users/{user_id}/{list}")
            .route(web::get().to(list_marked))
            .route(web::post().to(mark)),
    )
    .route("/users/{user_id}/{list}/{movie_id}", web::delete().to(unmark))
    .route("/friends", web::post().to(add_friend))
    .service(
        web::resource("/movies")
            .route(web::get().to(list_movies))
            .route(web::post().to(create_movie)),
    )
    .service(
        web::resource(vec!["/movies/search", "/movies/search/"])
            .route(web::get().to(search_movies)),
    )
    .route("/movies/{movie_id}", web::get().to(read_movie))
    .service(
        web::resource("/reviews")
            .route(web::get().to(list_reviews))
            .route(web::post().to(create_review)),
    )
    .route("/reviews/{movie_id}", web::get().to(reviews_by_movie));
}

fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": text }))
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "Hello": "World" }))
}

async fn signup(
    params: web::Json<SignupRequest>,
    db: Db,
    accounts: AccountsData,
) -> Result<HttpResponse> {
    // bcrypt must not run on the worker thread
    let user = web::block(move || accounts.signup(&db, params.into_inner())).await??;
    Ok(HttpResponse::Created().json(UserProfile::from(&user)))
}

async fn login(
    params: web::Json<LoginRequest>,
    db: Db,
    accounts: AccountsData,
) -> Result<HttpResponse> {
    let token = web::block(move || accounts.login(&db, params.into_inner())).await??;
    Ok(HttpResponse::Ok().json(token))
}

async fn logout() -> HttpResponse {
    let mut cookie = Cookie::new("access_token", "");
    cookie.make_removal();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "message": "Logged out" }))
}

async fn list_users(db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(auth::list_users(&db)?))
}

async fn read_user(user_id: web::Path<u64>, db: Db) -> Result<HttpResponse> {
    let user = auth::get_user(&db, user_id.into_inner())?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

async fn update_user(
    user_id: web::Path<u64>,
    params: web::Json<UserUpdate>,
    db: Db,
) -> Result<HttpResponse> {
    let user = auth::update_user(&db, user_id.into_inner(), params.into_inner())?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

async fn reviews_by_user(user_id: web::Path<u64>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(reviews::reviews_by_user(&db, user_id.into_inner())?))
}

async fn list_friends(user_id: web::Path<u64>, db: Db) -> Result<HttpResponse> {
    let friends: Vec<UserProfile> = social::list_friends(&db, user_id.into_inner())?
        .iter()
        .map(UserProfile::from)
        .collect();
    Ok(HttpResponse::Ok().json(friends))
}

async fn add_friend(params: web::Json<FriendRequest>, db: Db) -> Result<HttpResponse> {
    Ok(message(social::add_friend(&db, params.into_inner())?))
}

#[derive(Deserialize)]
struct ListPath {
    user_id: u64,
    list: MarkList,
}

#[derive(Deserialize)]
struct MarkPath {
    user_id: u64,
    list: MarkList,
    movie_id: u64,
}

#[derive(Deserialize)]
struct MarkParams {
    movie_id: u64,
}

async fn list_marked(path: web::Path<ListPath>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(social::marked_movies(&db, path.list, path.user_id)?))
}

async fn mark(
    path: web::Path<ListPath>,
    params: web::Json<MarkParams>,
    db: Db,
) -> Result<HttpResponse> {
    Ok(message(social::mark(
        &db,
        path.list,
        path.user_id,
        params.movie_id,
    )?))
}

async fn unmark(path: web::Path<MarkPath>, db: Db) -> Result<HttpResponse> {
    Ok(message(social::unmark(
        &db,
        path.list,
        path.user_id,
        path.movie_id,
    )?))
}

async fn list_movies(db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(resolver::list_movies(&db)?))
}

async fn create_movie(params: web::Json<NewMovie>, db: Db) -> Result<HttpResponse> {
    let movie = resolver::create_movie(&db, params.into_inner())?;
    Ok(HttpResponse::Created().json(movie))
}

#[derive(Deserialize)]
struct SearchParams {
    title: String,
}

async fn search_movies(
    params: web::Query<SearchParams>,
    db: Db,
    provider: Provider,
) -> Result<HttpResponse> {
    let results = MovieResolver::new(&db, provider.get_ref())
        .search_by_title(&params.title)
        .await?;
    Ok(HttpResponse::Ok().json(results))
}

async fn read_movie(movie_id: web::Path<u64>, db: Db, provider: Provider) -> Result<HttpResponse> {
    let movie = MovieResolver::new(&db, provider.get_ref())
        .resolve(movie_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(movie))
}

async fn create_review(params: web::Json<ReviewSubmission>, db: Db) -> Result<HttpResponse> {
    let review = reviews::submit_review(&db, params.into_inner())?;
    Ok(HttpResponse::Created().json(review))
}

async fn list_reviews(db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.reviews()?))
}

async fn reviews_by_movie(movie_id: web::Path<u64>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(reviews::reviews_for_movie(&db, movie_id.into_inner())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordScheme, TokenIssuer};
    use crate::database::UserDb;
    use crate::provider::testing::{pulp_fiction, StubProvider};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;
    use std::sync::Arc;

    macro_rules! test_app {
        ($store:expr, $provider:expr) => {
            test_app!($store, $provider, PasswordScheme::Plain)
        };
        ($store:expr, $provider:expr, $scheme:expr) => {
            test::init_service(
                App::new()
                    .app_data($store.clone())
                    .app_data(web::Data::from($provider.clone() as Arc<dyn MovieProvider>))
                    .app_data(web::Data::new(Accounts::new(
                        $scheme,
                        TokenIssuer::new("secret"),
                    )))
                    .configure(configure),
            )
            .await
        };
    }

    fn fixtures() -> (web::Data<Store>, Arc<StubProvider>) {
        (
            web::Data::new(Store::temporary().unwrap()),
            Arc::new(StubProvider::with_movie(pulp_fiction())),
        )
    }

    #[actix_rt::test]
    async fn signup_and_login() {
        let (store, provider) = fixtures();
        let app = test_app!(store, provider);

        let signup = json!({"username": "admin", "password_hash": "password"});
        let req = test::TestRequest::post()
            .uri("/signup")
            .set_json(&signup)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let user: Value = test::read_body_json(resp).await;
        assert_eq!(user["username"], "admin");
        assert!(user.get("password_hash").is_none());

        let req = test::TestRequest::post()
            .uri("/signup")
            .set_json(&signup)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Username already exists");

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(&json!({"username": "admin", "password": "password"}))
            .to_request();
        let token: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(token["token_type"], "bearer");

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(&json!({"username": "admin", "password_hash": "nope"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get().uri("/users").to_request();
        let users: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(users, json!([{"id": user["id"], "username": "admin"}]));
    }

    #[actix_rt::test]
    async fn bcrypt_accounts_over_http() {
        let (store, provider) = fixtures();
        let app = test_app!(store, provider, PasswordScheme::Bcrypt { cost: 4 });

        let req = test::TestRequest::post()
            .uri("/signup")
            .set_json(&json!({"username": "jane_smith", "password": "hunter2"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let stored = store.get_user_by_username("jane_smith").unwrap().unwrap();
        assert_ne!(stored.password_hash, "hunter2");

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(&json!({"username": "jane_smith", "password": "hunter2"}))
            .to_request();
        let token: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(token["token_type"], "bearer");

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(&json!({"username": "jane_smith", "password": "hunter3"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn movie_is_imported_on_first_read() {
        let (store, provider) = fixtures();
        let app = test_app!(store, provider);

        for _ in 0..2 {
            let req = test::TestRequest::get().uri("/movies/680").to_request();
            let movie: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(movie["id"], 680);
            assert_eq!(movie["director"], "Quentin Tarantino");
            assert_eq!(movie["global_rating"], Value::Null);
        }
        assert_eq!(provider.lookups(), 1);

        let req = test::TestRequest::get().uri("/movies/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/movies").to_request();
        let movies: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(movies.as_array().unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn review_flow() {
        let (store, provider) = fixtures();
        let app = test_app!(store, provider);

        let req = test::TestRequest::post()
            .uri("/signup")
            .set_json(&json!({"username": "john_doe", "password_hash": "x"}))
            .to_request();
        let user: Value = test::call_and_read_body_json(&app, req).await;
        let user_id = user["id"].as_u64().unwrap();

        let req = test::TestRequest::post()
            .uri("/reviews")
            .set_json(&json!({
                "user_id": user_id, "movie_id": 680,
                "note_visual": 9, "note_action": 8, "note_scenario": 9
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Invalid movie_id");

        let req = test::TestRequest::get().uri("/movies/680").to_request();
        test::call_service(&app, req).await;

        for notes in &[(9, 8, 9), (10, 9, 10)] {
            let req = test::TestRequest::post()
                .uri("/reviews")
                .set_json(&json!({
                    "user_id": user_id, "movie_id": 680, "favorite": true,
                    "note_visual": notes.0, "note_action": notes.1, "note_scenario": notes.2
                }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
            let review: Value = test::read_body_json(resp).await;
            assert!(review.get("favorite").is_none());
        }

        let req = test::TestRequest::get().uri("/reviews/680").to_request();
        let reviews: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reviews.as_array().unwrap().len(), 2);

        let req = test::TestRequest::get().uri("/movies/680").to_request();
        let movie: Value = test::call_and_read_body_json(&app, req).await;
        let rating = movie["global_rating"].as_f64().unwrap();
        assert!((rating - 55.0 / 6.0).abs() < 1e-9);

        let req = test::TestRequest::get()
            .uri(&format!("/users/{}/watched", user_id))
            .to_request();
        let watched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(watched.as_array().unwrap().len(), 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/users/{}/favorites/680", user_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Removed");

        let req = test::TestRequest::delete()
            .uri(&format!("/users/{}/favorites/680", user_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Not found");

        let req = test::TestRequest::post()
            .uri("/reviews")
            .set_json(&json!({"user_id": user_id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn friends_and_logout() {
        let (store, provider) = fixtures();
        let app = test_app!(store, provider);

        let mut ids = Vec::new();
        for name in &["john_doe", "jane_smith"] {
            let req = test::TestRequest::post()
                .uri("/signup")
                .set_json(&json!({"username": name, "password_hash": "x"}))
                .to_request();
            let user: Value = test::call_and_read_body_json(&app, req).await;
            ids.push(user["id"].as_u64().unwrap());
        }

        let expected = ["Friend added", "Already friends"];
        for (pair, expected) in [(ids[0], ids[1]), (ids[1], ids[0])].iter().zip(&expected) {
            let req = test::TestRequest::post()
                .uri("/friends")
                .set_json(&json!({"user_id": pair.0, "friend_id": pair.1}))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["message"], *expected);
        }

        let req = test::TestRequest::get()
            .uri(&format!("/users/{}/friends", ids[1]))
            .to_request();
        let friends: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(friends[0]["username"], "john_doe");

        let req = test::TestRequest::post().uri("/logout").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "access_token")
            .unwrap();
        assert_eq!(cookie.value(), "");
    }
}
