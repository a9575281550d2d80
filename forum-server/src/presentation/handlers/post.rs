use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use futures_util::StreamExt;
use tracing::info;
use uuid::Uuid;

use crate::application::post_service::PostService;
use crate::domain::error::DomainError;
use crate::domain::post::{AttachmentKind, Post};
use crate::infrastructure::media::MAX_TEXT_FILE_BYTES;
use crate::presentation::dto::{
    CreatePostRequest, DeletePostResponse, ListPostsQuery, ListResponse, UpdatePostRequest,
};
use crate::presentation::utils::{AuthenticatedUser, request_id};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[get("/posts")]
pub async fn list_posts(
    posts: web::Data<PostService>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse, DomainError> {
    let sort = query.sort();
    let page = posts.list_posts(sort, query.page, query.page_size).await?;

    Ok(HttpResponse::Ok().json(ListResponse {
        items: page.items,
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        sort_by: sort.sort_by(),
        order: sort.order(),
    }))
}

#[get("/posts/threads")]
pub async fn list_threads(
    posts: web::Data<PostService>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse, DomainError> {
    let sort = query.sort();
    let page = posts.list_threads(sort, query.page, query.page_size).await?;

    Ok(HttpResponse::Ok().json(ListResponse {
        items: page.items,
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        sort_by: sort.sort_by(),
        order: sort.order(),
    }))
}

#[get("/posts/{id}")]
pub async fn get_post(
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[get("/posts/{id}/comments")]
pub async fn post_comments(
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let comments = posts.post_comments(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[post("/posts")]
pub async fn create_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    payload: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.create_post(&user, payload.into_inner().into()).await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id = %post.id,
        "post created"
    );

    Ok(HttpResponse::Created().json(post))
}

#[put("/posts/{id}")]
pub async fn update_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    payload: web::Json<UpdatePostRequest>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post = posts
        .update_post(&user, path.into_inner(), payload.into_inner().into())
        .await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id = %post.id,
        "post updated"
    );

    Ok(HttpResponse::Ok().json(post))
}

#[delete("/posts/{id}")]
pub async fn delete_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let deleted = posts.delete_post(&user, post_id).await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id = %post_id,
        "post deleted"
    );

    Ok(HttpResponse::Ok().json(DeletePostResponse { deleted }))
}

/// Multipart upload with an `image` and/or a `text_file` field.
#[post("/posts/{id}/attachments")]
pub async fn upload_attachments(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
    mut payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let mut updated: Option<Post> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(invalid_upload)?;

        let kind = match field.name() {
            Some("image") => AttachmentKind::Image,
            Some("text_file") => AttachmentKind::TextFile,
            _ => continue,
        };
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned)
            .ok_or_else(|| DomainError::validation("uploaded file must have a name"))?;
        let limit = match kind {
            AttachmentKind::Image => MAX_IMAGE_BYTES,
            // one byte over so the size rule reports it
            AttachmentKind::TextFile => MAX_TEXT_FILE_BYTES + 1,
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(invalid_upload)?;
            if bytes.len() + chunk.len() > limit {
                return Err(DomainError::validation(format!(
                    "uploaded file {filename} is too large"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        updated = Some(posts.attach(&user, post_id, kind, &filename, bytes).await?);
        info!(
            request_id = %request_id(&req),
            username = %user.username,
            post_id = %post_id,
            filename = %filename,
            "attachment stored"
        );
    }

    match updated {
        Some(post) => Ok(HttpResponse::Ok().json(post)),
        None => Err(DomainError::validation(
            "expected an image or text_file field",
        )),
    }
}

fn invalid_upload(err: actix_multipart::MultipartError) -> DomainError {
    DomainError::validation(format!("invalid multipart payload: {err}"))
}
