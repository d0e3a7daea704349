//! Post and comment mutations plus the post detail view.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, FeedScope, GroupsRepo, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{
    COMMENT_TEXT_FIELD, POST_GROUP_FIELD, POST_IMAGE_FIELD, POST_TEXT_FIELD, normalize_text,
};
use crate::infra::uploads::{UploadStorage, UploadStorageError};

const INVALID_GROUP_MESSAGE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const METRIC_POSTS_CREATED: &str = "inkpost_posts_created_total";
pub const METRIC_COMMENTS_CREATED: &str = "inkpost_comments_created_total";

const INVALID_IMAGE_MESSAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Field-level messages for a rejected form, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: Vec<(&'static str, String)>,
}

impl FieldErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.entries.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    fn absorb(&mut self, error: DomainError) {
        match error {
            DomainError::Validation { field, message } => self.push(field, message),
            DomainError::NotFound { entity } => self.push(entity, "not found"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post submission rejected")]
    Validation(FieldErrors),
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Raw form values for creating or editing a post.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    /// Group id as submitted; blank means no group.
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    /// Drop the current image when editing and no new one is sent.
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub enum EditOutcome {
    Updated(PostRecord),
    /// The editor is not the author; nothing was written.
    NotAuthor,
}

#[derive(Debug, Clone)]
pub enum EditAccess {
    Allowed(PostRecord),
    NotAuthor,
}

#[derive(Debug, Clone)]
pub enum CommentOutcome {
    Created(CommentRecord),
    /// Blank text; no comment stored.
    Skipped,
}

pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
    pub is_author: bool,
}

struct ValidatedPost {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    storage: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            comments,
            storage,
        }
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn find_post(&self, id: i64) -> Result<PostRecord, PostError> {
        self.posts.find_by_id(id).await?.ok_or(PostError::NotFound)
    }

    pub async fn post_detail(
        &self,
        id: i64,
        viewer: Option<&UserRecord>,
    ) -> Result<PostDetail, PostError> {
        let post = self.find_post(id).await?;
        let comments = self.comments.list_for_post(post.id).await?;
        let author_post_count = self
            .posts
            .count_posts(FeedScope::Author(post.author.id))
            .await?;
        let is_author = viewer.is_some_and(|viewer| post.is_authored_by(viewer.id));
        Ok(PostDetail {
            post,
            comments,
            author_post_count,
            is_author,
        })
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let validated = self.validate(submission).await?;
        let image = self.store_image(validated.image).await?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: validated.text,
                group_id: validated.group_id,
                image,
            })
            .await?;

        info!(
            target = "inkpost::application::posts",
            post_id = post.id,
            author = %author.username,
            "post created"
        );
        counter!(METRIC_POSTS_CREATED).increment(1);
        Ok(post)
    }

    /// Check whether `editor` may open the edit form for post `id`.
    pub async fn edit_access(&self, editor: &UserRecord, id: i64) -> Result<EditAccess, PostError> {
        let post = self.find_post(id).await?;
        if post.is_authored_by(editor.id) {
            Ok(EditAccess::Allowed(post))
        } else {
            Ok(EditAccess::NotAuthor)
        }
    }

    pub async fn edit_post(
        &self,
        editor: &UserRecord,
        id: i64,
        submission: PostSubmission,
    ) -> Result<EditOutcome, PostError> {
        let current = self.find_post(id).await?;
        if !current.is_authored_by(editor.id) {
            debug!(
                target = "inkpost::application::posts",
                post_id = id,
                editor = %editor.username,
                "edit skipped for non-author"
            );
            return Ok(EditOutcome::NotAuthor);
        }

        let clear_image = submission.clear_image;
        let validated = self.validate(submission).await?;
        let image = match self.store_image(validated.image).await? {
            Some(stored) => Some(stored),
            None if clear_image => None,
            None => current.image.clone(),
        };

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: current.id,
                text: validated.text,
                group_id: validated.group_id,
                image,
            })
            .await?;

        if let Some(previous) = current.image.as_deref()
            && post.image.as_deref() != Some(previous)
        {
            self.discard_image(previous).await;
        }

        info!(
            target = "inkpost::application::posts",
            post_id = post.id,
            "post updated"
        );
        Ok(EditOutcome::Updated(post))
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        text: &str,
    ) -> Result<CommentOutcome, PostError> {
        let post = self.find_post(post_id).await?;
        let Ok(text) = normalize_text(COMMENT_TEXT_FIELD, text) else {
            return Ok(CommentOutcome::Skipped);
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
            })
            .await?;
        counter!(METRIC_COMMENTS_CREATED).increment(1);
        Ok(CommentOutcome::Created(comment))
    }

    async fn validate(&self, submission: PostSubmission) -> Result<ValidatedPost, PostError> {
        let mut errors = FieldErrors::default();

        let text = match normalize_text(POST_TEXT_FIELD, &submission.text) {
            Ok(text) => Some(text),
            Err(err) => {
                errors.absorb(err);
                None
            }
        };

        let group_id = match submission
            .group
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
        {
            None => None,
            Some(raw) => {
                let known = match raw.parse::<i64>() {
                    Ok(id) => self.groups.find_by_id(id).await?.map(|group| group.id),
                    Err(_) => None,
                };
                if known.is_none() {
                    errors.push(POST_GROUP_FIELD, INVALID_GROUP_MESSAGE);
                }
                known
            }
        };

        let image = submission.image.filter(|image| !image.data.is_empty());
        if let Some(image) = image.as_ref()
            && !is_image(image)
        {
            errors.push(POST_IMAGE_FIELD, INVALID_IMAGE_MESSAGE);
        }

        match text {
            Some(text) if errors.is_empty() => Ok(ValidatedPost {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Validation(errors)),
        }
    }

    /// Best effort: the post already points at its new image.
    async fn discard_image(&self, stored_path: &str) {
        if let Err(err) = self.storage.delete(stored_path).await {
            warn!(
                target = "inkpost::application::posts",
                stored_path,
                error = %err,
                "failed to remove replaced post image"
            );
        }
    }

    async fn store_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        let Some(image) = image else {
            return Ok(None);
        };
        let stored = self.storage.store(&image.filename, image.data).await?;
        Ok(Some(stored.stored_path))
    }
}

/// An upload counts as an image when its declared (or guessed) type is
/// `image/*` and the bytes carry a decodable image header.
fn is_image(upload: &ImageUpload) -> bool {
    let declared = upload
        .content_type
        .as_deref()
        .filter(|value| !value.is_empty() && *value != "application/octet-stream");
    let typed = match declared {
        Some(value) => value.starts_with("image/"),
        None => mime_guess::from_path(&upload.filename)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE),
    };
    typed && imagesize::blob_size(&upload.data).is_ok()
}
