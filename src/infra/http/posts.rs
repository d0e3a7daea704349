//! Post authoring: create, edit and comment.

use axum::{
    Form,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        error::HttpError,
        posts::{EditAccess, EditOutcome, FieldErrors, ImageUpload, PostError, PostSubmission},
    },
    domain::entities::{GroupRecord, UserRecord},
    presentation::views::{
        LayoutChrome, LayoutContext, PostFormTemplate, PostFormView, post_href, profile_href,
        render_template_response,
    },
};

use super::{HttpState, RequireUser, error_page, parse_post_id, public};

const SOURCE_BASE: &str = "infra::http::posts";
const CREATE_ACTION: &str = "/create/";

pub(super) async fn create_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    let groups = match state.posts.groups().await {
        Ok(groups) => groups,
        Err(err) => return error_page(HttpError::from(err), Some(&user)),
    };
    let form = PostFormView::new(CREATE_ACTION.to_string(), false, &groups, None, "");
    render_form(form, CREATE_ACTION, &user)
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    mut multipart: Multipart,
) -> Response {
    let submission = match read_post_form(&mut multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };
    let text = submission.text.clone();
    let group = submission.group.clone();

    match state.posts.create_post(&user, submission).await {
        Ok(_) => Redirect::to(&profile_href(&user.username)).into_response(),
        Err(PostError::Validation(errors)) => {
            let groups = match state.posts.groups().await {
                Ok(groups) => groups,
                Err(err) => return error_page(HttpError::from(err), Some(&user)),
            };
            let form = invalid_form(CREATE_ACTION.to_string(), false, &groups, group, &text, &errors);
            render_form(form, CREATE_ACTION, &user)
        }
        Err(err) => error_page(HttpError::from(err), Some(&user)),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return public::not_found(uri.path(), Some(&user));
    };

    let post = match state.posts.edit_access(&user, id).await {
        Ok(EditAccess::Allowed(post)) => post,
        Ok(EditAccess::NotAuthor) => return Redirect::to(&post_href(id)).into_response(),
        Err(err) => return public::post_error_response(err, uri.path(), Some(&user)),
    };
    let groups = match state.posts.groups().await {
        Ok(groups) => groups,
        Err(err) => return error_page(HttpError::from(err), Some(&user)),
    };

    let selected = post.group.as_ref().map(|group| group.id.to_string());
    let form = PostFormView::new(
        uri.path().to_string(),
        true,
        &groups,
        selected.as_deref(),
        &post.text,
    )
    .with_current_image(post.image.as_deref());
    render_form(form, uri.path(), &user)
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
    mut multipart: Multipart,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return public::not_found(uri.path(), Some(&user));
    };
    let submission = match read_post_form(&mut multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };
    let text = submission.text.clone();
    let group = submission.group.clone();

    match state.posts.edit_post(&user, id, submission).await {
        Ok(EditOutcome::Updated(_)) | Ok(EditOutcome::NotAuthor) => {
            Redirect::to(&post_href(id)).into_response()
        }
        Err(PostError::Validation(errors)) => {
            let current = match state.posts.find_post(id).await {
                Ok(post) => post,
                Err(err) => return public::post_error_response(err, uri.path(), Some(&user)),
            };
            let groups = match state.posts.groups().await {
                Ok(groups) => groups,
                Err(err) => return error_page(HttpError::from(err), Some(&user)),
            };
            let form = invalid_form(uri.path().to_string(), true, &groups, group, &text, &errors)
                .with_current_image(current.image.as_deref());
            render_form(form, uri.path(), &user)
        }
        Err(err) => public::post_error_response(err, uri.path(), Some(&user)),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return public::not_found(uri.path(), Some(&user));
    };

    match state.posts.add_comment(&user, id, &form.text).await {
        Ok(_) => Redirect::to(&post_href(id)).into_response(),
        Err(err) => public::post_error_response(err, uri.path(), Some(&user)),
    }
}

fn invalid_form(
    action: String,
    is_edit: bool,
    groups: &[GroupRecord],
    group: Option<String>,
    text: &str,
    errors: &FieldErrors,
) -> PostFormView {
    PostFormView::new(action, is_edit, groups, group.as_deref(), text).with_errors(errors)
}

fn render_form(form: PostFormView, path: &str, user: &UserRecord) -> Response {
    let title = if form.is_edit { "Edit post" } else { "New post" };
    let chrome = LayoutChrome::new(title, path, Some(user));
    render_template_response(
        PostFormTemplate {
            view: LayoutContext::new(chrome, form),
        },
        StatusCode::OK,
    )
}

/// Collect `text`, `group`, `image` and `image-clear` from a post form.
/// Unknown fields are ignored; an image part without a filename or bytes
/// counts as no upload.
async fn read_post_form(multipart: &mut Multipart) -> Result<PostSubmission, HttpError> {
    let mut submission = PostSubmission::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE_BASE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(HttpError::new(
                    SOURCE_BASE,
                    status,
                    "Invalid form submission",
                    err.to_string(),
                ));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => submission.text = field_text(field).await?,
            Some("group") => submission.group = Some(field_text(field).await?),
            Some("image-clear") => {
                let value = field_text(field).await?.trim().to_ascii_lowercase();
                submission.clear_image = matches!(value.as_str(), "on" | "true" | "1" | "yes");
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|value| !value.trim().is_empty());
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    HttpError::new(
                        SOURCE_BASE,
                        err.status(),
                        "Invalid form submission",
                        err.to_string(),
                    )
                })?;
                submission.image = filename
                    .filter(|_| !data.is_empty())
                    .map(|filename| ImageUpload {
                        filename,
                        content_type,
                        data,
                    });
            }
            _ => continue,
        }
    }

    Ok(submission)
}

async fn field_text(field: axum_extra::extract::multipart::Field) -> Result<String, HttpError> {
    field.text().await.map_err(|err| {
        HttpError::new(
            SOURCE_BASE,
            err.status(),
            "Invalid form submission",
            err.to_string(),
        )
    })
}
