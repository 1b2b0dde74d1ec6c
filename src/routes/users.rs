use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::AppError;
use crate::models::{
    PageQuery, PhotoRequest, PhotosResponse, PreferencesPatch, ProfilePatch, RegisterUserRequest,
};
use crate::routes::{AppState, AuthenticatedUser};

/// Configure profile and discovery routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::post().to(register))
        .route("/users/profile", web::get().to(get_profile))
        .route("/users/profile", web::put().to(update_profile))
        .route("/users/preferences", web::put().to(update_preferences))
        .route("/users/photos", web::post().to(add_photo))
        .route("/users/photos/main", web::put().to(set_main_photo))
        .route("/users/photos", web::delete().to(remove_photo))
        .route("/users/discover", web::get().to(discover));
}

/// POST /api/v1/users
async fn register(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    req: web::Json<RegisterUserRequest>,
) -> Result<HttpResponse, AppError> {
    let profile = state.profiles.register(actor.id(), req.into_inner()).await?;
    Ok(HttpResponse::Created().json(profile))
}

/// GET /api/v1/users/profile
async fn get_profile(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let profile = state.profiles.get(actor.id()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PUT /api/v1/users/profile
async fn update_profile(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    req: web::Json<ProfilePatch>,
) -> Result<HttpResponse, AppError> {
    let profile = state.profiles.update_profile(actor.id(), req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PUT /api/v1/users/preferences
async fn update_preferences(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    req: web::Json<PreferencesPatch>,
) -> Result<HttpResponse, AppError> {
    let profile = state.profiles.update_preferences(actor.id(), req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// POST /api/v1/users/photos
async fn add_photo(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    req: web::Json<PhotoRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let photos = state.profiles.add_photo(actor.id(), req.into_inner().url).await?;
    Ok(HttpResponse::Created().json(PhotosResponse { photos }))
}

/// PUT /api/v1/users/photos/main
async fn set_main_photo(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    req: web::Json<PhotoRequest>,
) -> Result<HttpResponse, AppError> {
    let photos = state.profiles.set_main_photo(actor.id(), &req.url).await?;
    Ok(HttpResponse::Ok().json(PhotosResponse { photos }))
}

/// DELETE /api/v1/users/photos
async fn remove_photo(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    req: web::Json<PhotoRequest>,
) -> Result<HttpResponse, AppError> {
    let photos = state.profiles.remove_photo(actor.id(), &req.url).await?;
    Ok(HttpResponse::Ok().json(PhotosResponse { photos }))
}

/// GET /api/v1/users/discover?page&limit
async fn discover(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let response = state.discovery.discover(actor.id(), query.page, query.limit).await?;
    Ok(HttpResponse::Ok().json(response))
}
