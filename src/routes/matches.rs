use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ActionResponse, MatchesResponse};
use crate::routes::{AppState, AuthenticatedUser};

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches/like/{user_id}", web::post().to(like))
        .route("/matches/dislike/{user_id}", web::post().to(dislike))
        .route("/matches/undo/{user_id}", web::post().to(undo))
        .route("/matches", web::get().to(list_matches))
        .route("/matches/{match_id}", web::get().to(get_match))
        .route("/matches/{match_id}", web::delete().to(unmatch));
}

/// POST /api/v1/matches/like/{userId}
///
/// Responds with `{ "isMatch": bool, "match": Match | null }`.
async fn like(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let outcome = state.matches.like(actor.id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/v1/matches/dislike/{userId}
async fn dislike(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    state.matches.dislike(actor.id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ActionResponse::ok("User disliked")))
}

/// POST /api/v1/matches/undo/{userId}
async fn undo(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let outcome = state.matches.undo(actor.id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /api/v1/matches
async fn list_matches(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let matches = state.matches.list_matches(actor.id()).await?;
    Ok(HttpResponse::Ok().json(MatchesResponse {
        count: matches.len(),
        matches,
    }))
}

/// GET /api/v1/matches/{matchId}
async fn get_match(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = state.matches.get_match(path.into_inner(), actor.id()).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// DELETE /api/v1/matches/{matchId}
async fn unmatch(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    state.matches.unmatch(path.into_inner(), actor.id()).await?;
    Ok(HttpResponse::Ok().json(ActionResponse::ok("Unmatched successfully")))
}
