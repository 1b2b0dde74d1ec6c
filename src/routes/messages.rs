use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{
    ActionResponse, MarkReadResponse, MessagesResponse, PageQuery, SendMessageRequest, UnreadCountResponse,
};
use crate::routes::{AppState, AuthenticatedUser};

/// Configure message thread routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/messages/unread/count", web::get().to(unread_count))
        .route("/messages/{match_id}", web::post().to(send))
        .route("/messages/{match_id}", web::get().to(list))
        .route("/messages/{match_id}/read", web::put().to(mark_read))
        .route("/messages/{message_id}", web::delete().to(delete));
}

/// POST /api/v1/messages/{matchId}
async fn send(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let SendMessageRequest { content, message_type, image_url } = req.into_inner();

    let message = state
        .messages
        .send(path.into_inner(), actor.id(), &content, message_type, image_url)
        .await?;
    Ok(HttpResponse::Created().json(message))
}

/// GET /api/v1/messages/{matchId}?page&limit
async fn list(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, limit) = state.messages.page_bounds(query.page, query.limit);
    let messages = state.messages.list(path.into_inner(), actor.id(), page, limit).await?;

    Ok(HttpResponse::Ok().json(MessagesResponse {
        count: messages.len(),
        messages,
        page,
        limit,
    }))
}

/// PUT /api/v1/messages/{matchId}/read
async fn mark_read(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let modified_count = state.messages.mark_read(path.into_inner(), actor.id()).await?;
    Ok(HttpResponse::Ok().json(MarkReadResponse { modified_count }))
}

/// GET /api/v1/messages/unread/count
async fn unread_count(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let unread_count = state.messages.unread_count(actor.id()).await?;
    Ok(HttpResponse::Ok().json(UnreadCountResponse { unread_count }))
}

/// DELETE /api/v1/messages/{messageId}
async fn delete(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    state.messages.delete(path.into_inner(), actor.id()).await?;
    Ok(HttpResponse::Ok().json(ActionResponse::ok("Message deleted")))
}
