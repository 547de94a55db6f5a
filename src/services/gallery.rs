// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Community gallery: uploads, listing and chat screenshot import.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Principal;
use crate::providers::{ChatImage, ChatImageSource, ChatSession, ChatSourceError, ObjectStore};
use crate::storage::{
    AccessDatabase, GalleryRepository, NewGalleryImage, StoredGalleryImage, UserRepository,
};

use super::{check_length, non_blank, ServiceError, ServiceResult};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];
pub const TITLE_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 1000;
pub const DEFAULT_IMPORT_LIMIT: u32 = 100;
pub const MAX_IMPORT_LIMIT: u32 = 500;

/// Gallery image with the uploader's display name.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GalleryImageView {
    #[serde(flatten)]
    pub image: StoredGalleryImage,
    pub uploader_name: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UploadImageRequest {
    /// Base64 image bytes, optionally as a `data:` URL.
    pub image_data: String,
    pub mime_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadImageResponse {
    pub success: bool,
    pub url: String,
    pub image: StoredGalleryImage,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ImportRequest {
    /// Messages to scan (1-500, default 100).
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportSummary {
    pub success: bool,
    pub imported: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Every gallery image, newest first.
pub fn list_public(db: &AccessDatabase) -> ServiceResult<Vec<GalleryImageView>> {
    let users = UserRepository::new(db);
    GalleryRepository::new(db)
        .list_all()?
        .into_iter()
        .map(|image| -> ServiceResult<GalleryImageView> {
            let uploader_name = users
                .find(image.user_id)?
                .and_then(|user| user.display_name)
                .unwrap_or_else(|| "Unknown".to_string());
            Ok(GalleryImageView {
                image,
                uploader_name,
            })
        })
        .collect()
}

/// The caller's uploads, newest first.
pub fn mine(db: &AccessDatabase, principal: &Principal) -> ServiceResult<Vec<StoredGalleryImage>> {
    let user = principal.require_user()?;
    Ok(GalleryRepository::new(db).list_for_user(user.id)?)
}

/// Validate, store and record an uploaded image.
pub async fn upload(
    db: &AccessDatabase,
    objects: &dyn ObjectStore,
    principal: &Principal,
    request: UploadImageRequest,
) -> ServiceResult<UploadImageResponse> {
    let user = principal.require_user()?;

    let content_type = request.mime_type.trim().to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ServiceError::Validation(
            "Invalid file type. Only JPEG, PNG, WebP, and GIF are allowed.".to_string(),
        ));
    }
    let title = non_blank(request.title);
    if let Some(title) = &title {
        check_length("Title", title, 0, TITLE_MAX)?;
    }
    let description = non_blank(request.description);
    if let Some(description) = &description {
        check_length("Description", description, 0, DESCRIPTION_MAX)?;
    }

    let bytes = decode_image_data(&request.image_data)?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ServiceError::Validation(
            "File size must be less than 10MB".to_string(),
        ));
    }

    let extension = content_type.rsplit('/').next().unwrap_or("png");
    let object_key = format!("gallery/{}/{}.{extension}", user.id, Uuid::new_v4());
    let image_url = objects.put(&object_key, &bytes, &content_type).await?;

    let created = GalleryRepository::new(db).create(NewGalleryImage {
        user_id: user.id,
        title,
        description,
        object_key: object_key.clone(),
        image_url: image_url.clone(),
        content_type,
        size_bytes: bytes.len() as u64,
        reactions: Vec::new(),
        source_key: None,
        created_at: None,
    });
    let image = match created {
        Ok(image) => image,
        Err(err) => {
            if let Err(cleanup) = objects.delete(&object_key).await {
                warn!(object_key = %object_key, error = %cleanup, "Failed to remove orphaned object");
            }
            return Err(err.into());
        }
    };

    info!(user_id = user.id, image_id = image.id, "Gallery image uploaded");
    Ok(UploadImageResponse {
        success: true,
        url: image_url,
        image,
    })
}

/// Delete one of the caller's images and its stored object.
///
/// Images owned by someone else are reported as missing.
pub async fn delete(
    db: &AccessDatabase,
    objects: &dyn ObjectStore,
    principal: &Principal,
    image_id: u64,
) -> ServiceResult<()> {
    let user = principal.require_user()?;
    let repo = GalleryRepository::new(db);

    let image = repo.get(image_id)?;
    if image.user_id != user.id {
        return Err(ServiceError::NotFound(format!(
            "Gallery image {image_id} not found"
        )));
    }
    repo.delete(image_id)?;

    if let Err(err) = objects.delete(&image.object_key).await {
        warn!(object_key = %image.object_key, error = %err, "Failed to remove image object");
    }
    info!(user_id = user.id, image_id, "Gallery image deleted");
    Ok(())
}

/// Import screenshots posted in the configured chat channel. Admin only.
///
/// The chat session is opened for this call and always closed before
/// returning. Imported rows are owned by the calling admin.
pub async fn import_from_chat(
    db: &AccessDatabase,
    objects: &dyn ObjectStore,
    source: Option<&dyn ChatImageSource>,
    principal: &Principal,
    limit: Option<u32>,
) -> ServiceResult<ImportSummary> {
    let admin = principal.require_admin()?;

    let limit = limit.unwrap_or(DEFAULT_IMPORT_LIMIT);
    if !(1..=MAX_IMPORT_LIMIT).contains(&limit) {
        return Err(ServiceError::Validation(format!(
            "Limit must be between 1 and {MAX_IMPORT_LIMIT}"
        )));
    }
    let source = source.ok_or(ChatSourceError::NotConfigured)?;

    let mut session = source.connect().await?;
    let result = run_import(db, objects, session.as_mut(), admin.id, limit as usize).await;
    session.close().await;

    let summary = result?;
    info!(
        admin_id = admin.id,
        imported = summary.imported,
        skipped = summary.skipped,
        total = summary.total,
        "Chat import finished"
    );
    Ok(summary)
}

async fn run_import(
    db: &AccessDatabase,
    objects: &dyn ObjectStore,
    session: &mut dyn ChatSession,
    owner_id: u64,
    limit: usize,
) -> ServiceResult<ImportSummary> {
    let images = session.fetch_images(limit).await?;
    let repo = GalleryRepository::new(db);

    let mut imported = 0;
    let mut skipped = 0;
    for image in &images {
        match import_one(&repo, objects, &*session, owner_id, image).await {
            Ok(true) => imported += 1,
            Ok(false) => skipped += 1,
            Err(err) => {
                warn!(
                    message_id = %image.message_id,
                    error = %err,
                    "Failed to import chat image"
                );
                skipped += 1;
            }
        }
    }

    Ok(ImportSummary {
        success: true,
        imported,
        skipped,
        total: images.len(),
    })
}

/// Returns `Ok(false)` when the attachment was imported before.
async fn import_one(
    repo: &GalleryRepository<'_>,
    objects: &dyn ObjectStore,
    session: &dyn ChatSession,
    owner_id: u64,
    image: &ChatImage,
) -> ServiceResult<bool> {
    let source_key = image.source_key();
    if repo.source_exists(&source_key)? {
        return Ok(false);
    }

    let downloaded = session.download(image).await?;
    let object_key = format!("chat-import/{}.{}", Uuid::new_v4(), image.extension());
    let image_url = objects
        .put(&object_key, &downloaded.bytes, &downloaded.content_type)
        .await?;

    let caption = image.caption.trim();
    let description = if caption.is_empty() {
        format!("Posted on {}", image.posted_at.format("%-m/%-d/%Y"))
    } else {
        caption.to_string()
    };

    let created = repo.create(NewGalleryImage {
        user_id: owner_id,
        title: Some(image.author.clone()),
        description: Some(description),
        object_key: object_key.clone(),
        image_url,
        content_type: downloaded.content_type,
        size_bytes: downloaded.bytes.len() as u64,
        reactions: image.reactions.clone(),
        source_key: Some(source_key),
        created_at: Some(image.posted_at),
    });
    if let Err(err) = created {
        if let Err(cleanup) = objects.delete(&object_key).await {
            warn!(object_key = %object_key, error = %cleanup, "Failed to remove orphaned object");
        }
        return Err(err.into());
    }
    Ok(true)
}

fn decode_image_data(raw: &str) -> ServiceResult<Vec<u8>> {
    let data = match raw.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| ServiceError::Validation("Image data is not valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(ServiceError::Validation("Image data is empty".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::auth::{AuthError, Role};
    use crate::providers::discord::fake::{chat_image, FakeChatSource};
    use crate::state::test_state;
    use crate::storage::LoginProfile;

    fn login(db: &AccessDatabase, subject: &str, role: Role) -> Principal {
        Principal::from_user(
            UserRepository::new(db)
                .upsert_login(&LoginProfile {
                    external_id: subject,
                    display_name: Some(subject),
                    email: None,
                    role,
                })
                .unwrap(),
        )
    }

    fn png_upload() -> UploadImageRequest {
        UploadImageRequest {
            image_data: format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG fake")),
            mime_type: "image/png".to_string(),
            title: Some("Castle".to_string()),
            description: None,
        }
    }

    #[tokio::test]
    async fn upload_stores_object_and_row() {
        let (state, dir) = test_state();
        let user = login(&state.db, "alice", Role::User);

        let response = upload(&state.db, state.objects.as_ref(), &user, png_upload())
            .await
            .unwrap();

        assert!(response.success);
        assert!(response.url.starts_with("https://cdn.example.com/gallery/1/"));
        assert!(response.url.ends_with(".png"));
        let stored = dir.path().join("objects").join(&response.image.object_key);
        assert_eq!(std::fs::read(stored).unwrap(), b"\x89PNG fake");

        let listed = list_public(&state.db).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].uploader_name, "alice");
        assert_eq!(mine(&state.db, &user).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_rejects_bad_type_and_payload() {
        let (state, _dir) = test_state();
        let user = login(&state.db, "alice", Role::User);

        let mut request = png_upload();
        request.mime_type = "image/svg+xml".to_string();
        assert!(matches!(
            upload(&state.db, state.objects.as_ref(), &user, request).await,
            Err(ServiceError::Validation(_))
        ));

        let mut request = png_upload();
        request.image_data = "not base64!!".to_string();
        assert!(matches!(
            upload(&state.db, state.objects.as_ref(), &user, request).await,
            Err(ServiceError::Validation(_))
        ));

        let mut request = png_upload();
        request.image_data = STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES + 1]);
        assert!(matches!(
            upload(&state.db, state.objects.as_ref(), &user, request).await,
            Err(ServiceError::Validation(_))
        ));

        assert!(list_public(&state.db).unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_owner_can_delete() {
        let (state, dir) = test_state();
        let alice = login(&state.db, "alice", Role::User);
        let bob = login(&state.db, "bob", Role::User);
        let uploaded = upload(&state.db, state.objects.as_ref(), &alice, png_upload())
            .await
            .unwrap();

        let err = delete(&state.db, state.objects.as_ref(), &bob, uploaded.image.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        delete(&state.db, state.objects.as_ref(), &alice, uploaded.image.id)
            .await
            .unwrap();
        assert!(list_public(&state.db).unwrap().is_empty());
        assert!(!dir
            .path()
            .join("objects")
            .join(&uploaded.image.object_key)
            .exists());
    }

    #[tokio::test]
    async fn import_copies_images_and_is_idempotent() {
        let (state, _dir) = test_state();
        let admin = login(&state.db, "admin", Role::Admin);

        let mut source = FakeChatSource::default();
        let with_caption = chat_image("m1", "my base");
        let without_caption = chat_image("m2", "");
        let broken = chat_image("m3", "");
        source.files.insert(with_caption.url.clone(), vec![1, 2, 3]);
        source.files.insert(without_caption.url.clone(), vec![4, 5]);
        source.images = vec![with_caption, without_caption, broken];
        let source = Arc::new(source);

        let summary = import_from_chat(
            &state.db,
            state.objects.as_ref(),
            Some(source.as_ref() as &dyn ChatImageSource),
            &admin,
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                success: true,
                imported: 2,
                skipped: 1,
                total: 3
            }
        );

        let images = GalleryRepository::new(&state.db).list_all().unwrap();
        let captioned = images
            .iter()
            .find(|i| i.source_key.as_deref() == Some("chan/m1/attm1"))
            .unwrap();
        assert_eq!(captioned.title.as_deref(), Some("builder_bob"));
        assert_eq!(captioned.description.as_deref(), Some("my base"));
        assert_eq!(captioned.reactions.len(), 1);
        assert_eq!(captioned.user_id, admin.user().unwrap().id);
        assert!(captioned.object_key.starts_with("chat-import/"));

        let dated = images
            .iter()
            .find(|i| i.source_key.as_deref() == Some("chan/m2/attm2"))
            .unwrap();
        assert_eq!(dated.description.as_deref(), Some("Posted on 3/14/2026"));

        let again = import_from_chat(
            &state.db,
            state.objects.as_ref(),
            Some(source.as_ref() as &dyn ChatImageSource),
            &admin,
            Some(10),
        )
        .await
        .unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.skipped, 3);

        assert_eq!(source.connects.load(Ordering::SeqCst), 2);
        assert_eq!(source.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn import_is_admin_only_and_validates_limit() {
        let (state, _dir) = test_state();
        let user = login(&state.db, "alice", Role::User);
        let admin = login(&state.db, "admin", Role::Admin);
        let source = FakeChatSource::default();

        let err = import_from_chat(
            &state.db,
            state.objects.as_ref(),
            Some(&source as &dyn ChatImageSource),
            &user,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::AdminRequired)));

        let err = import_from_chat(
            &state.db,
            state.objects.as_ref(),
            Some(&source as &dyn ChatImageSource),
            &admin,
            Some(501),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(source.connects.load(Ordering::SeqCst), 0);

        let err = import_from_chat(&state.db, state.objects.as_ref(), None, &admin, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ChatSource(ChatSourceError::NotConfigured)
        ));
    }
}
